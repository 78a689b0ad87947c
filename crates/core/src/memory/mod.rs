pub mod db;
pub mod embedding;
pub mod extraction;
pub mod file;
pub mod index;
pub mod semantic;

pub use extraction::{FactExtractor, KeywordExtractor, LlmExtractor};
pub use file::FileIndex;
pub use index::{InMemoryIndex, VectorIndex};
pub use semantic::SemanticMemory;
