pub mod ingest;
pub mod pipeline;
pub mod prompt;
pub mod retriever;
pub mod splitter;
pub mod sqlite;
pub mod store;

pub use ingest::DocumentIngestor;
pub use pipeline::{ChatAnswer, RagPipeline, StreamEvent};
pub use retriever::Retriever;
pub use splitter::TextSplitter;
pub use sqlite::SqliteVectorStore;
pub use store::VectorStore;
