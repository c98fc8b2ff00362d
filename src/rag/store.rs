//! VectorStore trait — abstract interface for the chunk index.
//!
//! The pipeline only needs similarity search plus document-keyed chunk
//! management; the primary implementation is `SqliteVectorStore` in the
//! `sqlite` module.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::core::errors::ApiError;

/// A chunk as persisted, without its vector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredChunk {
    pub doc_id: String,
    pub doc_name: String,
    pub doc_type: String,
    pub content: String,
    pub chunk_index: i64,
}

/// One similarity-search result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub doc_id: String,
    pub doc_name: String,
    pub content: String,
    pub chunk_index: i64,
    /// Cosine similarity (higher = better).
    pub score: f32,
}

/// Per-document summary for the listing endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentInfo {
    pub doc_id: String,
    pub doc_name: String,
    pub doc_type: String,
    pub chunk_count: i64,
    pub created_at: String,
}

/// Abstract trait for the chunk index.
///
/// Implementations must keep a document's chunks together: insertion is
/// one batch, deletion removes every chunk of the document.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Insert a document's chunks with their embeddings in one batch.
    /// Returns the number of rows written.
    async fn insert(
        &self,
        doc_id: &str,
        doc_name: &str,
        doc_type: &str,
        chunks: Vec<(String, Vec<f32>)>,
    ) -> Result<usize, ApiError>;

    /// Nearest-neighbour search, optionally scoped to one document.
    /// Results are sorted by descending score, at most `top_k` of them.
    async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        doc_id: Option<&str>,
    ) -> Result<Vec<SearchHit>, ApiError>;

    /// One summary row per stored document.
    async fn list_documents(&self) -> Result<Vec<DocumentInfo>, ApiError>;

    /// Delete every chunk of a document. Returns whether anything was
    /// removed.
    async fn delete_document(&self, doc_id: &str) -> Result<bool, ApiError>;

    async fn document_exists(&self, doc_id: &str) -> Result<bool, ApiError>;

    /// All chunks of a document, ordered by `chunk_index`.
    async fn get_chunks(&self, doc_id: &str) -> Result<Vec<StoredChunk>, ApiError>;
}
