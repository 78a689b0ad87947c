//! Web search capability and the DuckDuckGo HTML provider behind it.

use scraper::{Html, Selector};
use std::sync::Arc;
use std::time::Duration;

use super::{Capability, CapabilityPayload, CapabilityResult};
use crate::error::CapabilityFailure;

const DDG_HTML_ENDPOINT: &str = "https://html.duckduckgo.com/html/";
const USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHit {
    pub title: String,
    pub url: String,
    pub snippet: String,
}

#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("search endpoint returned status {0}")]
    Status(u16),
}

#[async_trait::async_trait]
pub trait SearchProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn search(&self, query: &str) -> Result<Vec<SearchHit>, SearchError>;
}

/// Keyless search over DuckDuckGo's HTML endpoint.
pub struct DuckDuckGoSearch {
    client: reqwest::Client,
    limit: usize,
}

impl DuckDuckGoSearch {
    pub fn new(limit: usize, timeout_secs: u64) -> Result<Self, SearchError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self { client, limit })
    }
}

#[async_trait::async_trait]
impl SearchProvider for DuckDuckGoSearch {
    fn name(&self) -> &str {
        "duckduckgo"
    }

    async fn search(&self, query: &str) -> Result<Vec<SearchHit>, SearchError> {
        tracing::debug!(query = %query, limit = self.limit, "web search request");
        let resp = self
            .client
            .get(DDG_HTML_ENDPOINT)
            .query(&[("q", query)])
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(SearchError::Status(resp.status().as_u16()));
        }
        let html = resp.text().await?;
        Ok(parse_results(&html, self.limit))
    }
}

/// Pull result cards out of a DuckDuckGo HTML page.
pub fn parse_results(html: &str, limit: usize) -> Vec<SearchHit> {
    let document = Html::parse_document(html);
    let (Ok(result_sel), Ok(title_sel), Ok(snippet_sel)) = (
        Selector::parse(".result"),
        Selector::parse("a.result__a"),
        Selector::parse(".result__snippet"),
    ) else {
        return Vec::new();
    };

    let mut hits = Vec::new();
    for element in document.select(&result_sel) {
        if hits.len() >= limit {
            break;
        }
        let Some(link) = element.select(&title_sel).next() else { continue };
        let title = collapse(&link.text().collect::<String>());
        if title.is_empty() {
            continue;
        }
        let url = link.value().attr("href").map(resolve_redirect).unwrap_or_default();
        let snippet = element
            .select(&snippet_sel)
            .next()
            .map(|e| collapse(&e.text().collect::<String>()))
            .unwrap_or_default();
        hits.push(SearchHit { title, url, snippet });
    }
    hits
}

/// DuckDuckGo wraps result links in `/l/?uddg=<target>`; unwrap to the target.
fn resolve_redirect(href: &str) -> String {
    let absolute = if href.starts_with("//") { format!("https:{href}") } else { href.to_string() };
    match reqwest::Url::parse(&absolute) {
        Ok(url) => url
            .query_pairs()
            .find(|(k, _)| k == "uddg")
            .map(|(_, v)| v.into_owned())
            .unwrap_or(absolute),
        Err(_) => href.to_string(),
    }
}

fn collapse(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Numbered text blob handed back to the reasoning step.
pub fn render_hits(query: &str, hits: &[SearchHit]) -> String {
    if hits.is_empty() {
        return format!("No search results for '{query}'.");
    }
    let mut out = format!("Search results for '{query}':\n");
    for (i, hit) in hits.iter().enumerate() {
        out.push_str(&format!("\n{}. {}\n", i + 1, hit.title));
        if !hit.url.is_empty() {
            out.push_str(&format!("   {}\n", hit.url));
        }
        if !hit.snippet.is_empty() {
            out.push_str(&format!("   {}\n", hit.snippet));
        }
    }
    out
}

pub struct SearchCapability {
    provider: Arc<dyn SearchProvider>,
}

impl SearchCapability {
    pub fn new(provider: Arc<dyn SearchProvider>) -> Self {
        Self { provider }
    }
}

#[async_trait::async_trait]
impl Capability for SearchCapability {
    fn name(&self) -> &str {
        "search"
    }

    fn description(&self) -> &str {
        "Search the web. Use for finding jobs, internships, salaries, news, or researching companies and technologies."
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "query": { "type": "string", "description": "Specific search query, e.g. 'Python internships Bangalore'" }
            },
            "required": ["query"]
        })
    }

    fn progress_label(&self) -> &str {
        "Searching the web..."
    }

    async fn execute(&self, args: serde_json::Value) -> CapabilityResult {
        let query = args
            .get("query")
            .and_then(|v| v.as_str())
            .map(str::trim)
            .unwrap_or_default();
        if query.is_empty() {
            return Err(CapabilityFailure::invalid_input("query must not be empty"));
        }
        match self.provider.search(query).await {
            Ok(hits) => Ok(CapabilityPayload::Text(render_hits(query, &hits))),
            Err(e) => Err(CapabilityFailure::provider(format!(
                "{} search failed: {e}",
                self.provider.name()
            ))),
        }
    }
}
