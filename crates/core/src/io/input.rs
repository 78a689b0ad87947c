use tokio::sync::mpsc;

/// One unit of work submitted to a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserInput {
    /// A chat message, routed normally.
    Text(String),
    /// Extracted document text to summarise and remember.
    Upload { name: String, text: String },
    /// Direct roadmap + schedule request.
    Plan { skill: String, hours_per_day: Option<u32> },
}

/// Input channel sender: front ends push work here.
pub type InputSender = mpsc::Sender<UserInput>;
/// Input channel receiver: the session consumes from here.
pub type InputReceiver = mpsc::Receiver<UserInput>;

/// Create an input channel with the given buffer size.
pub fn channel(buffer: usize) -> (InputSender, InputReceiver) {
    mpsc::channel(buffer)
}

/// Submit user text as a chat turn.
pub async fn submit_text(
    tx: &InputSender,
    text: impl Into<String>,
) -> Result<(), mpsc::error::SendError<UserInput>> {
    tx.send(UserInput::Text(text.into())).await
}

/// Parse a `/plan <skill> [hours]` argument string.
pub fn parse_plan_args(args: &str) -> Option<UserInput> {
    let args = args.trim();
    if args.is_empty() {
        return None;
    }
    let (skill, hours) = match args.rsplit_once(char::is_whitespace) {
        Some((head, tail)) => match tail.parse::<u32>() {
            Ok(h) => (head.trim(), Some(h)),
            Err(_) => (args, None),
        },
        None => (args, None),
    };
    if skill.is_empty() {
        return None;
    }
    Some(UserInput::Plan { skill: skill.to_string(), hours_per_day: hours })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn submit_text_creates_text_input() {
        let (tx, mut rx) = channel(4);
        submit_text(&tx, "hello").await.unwrap();
        assert_eq!(rx.recv().await.unwrap(), UserInput::Text("hello".into()));
    }

    #[tokio::test]
    async fn channel_respects_buffer() {
        let (tx, _rx) = channel(2);
        tx.send(UserInput::Text("a".into())).await.unwrap();
        tx.send(UserInput::Text("b".into())).await.unwrap();
        assert!(tx.try_send(UserInput::Text("c".into())).is_err());
    }

    #[test]
    fn plan_args() {
        assert_eq!(
            parse_plan_args("machine learning 3"),
            Some(UserInput::Plan { skill: "machine learning".into(), hours_per_day: Some(3) })
        );
        assert_eq!(
            parse_plan_args("Rust"),
            Some(UserInput::Plan { skill: "Rust".into(), hours_per_day: None })
        );
        assert_eq!(parse_plan_args("  "), None);
    }
}
