//! Document ingestion: extract → split → embed → store.
//!
//! Nothing is persisted unless every step succeeds; the store insert is
//! a single batch, so a failed extraction, chunking or embedding leaves
//! the index untouched.

use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use super::splitter::TextSplitter;
use super::store::VectorStore;
use crate::core::errors::ApiError;
use crate::extract::{allowed_file_type, TextExtractor};
use crate::llm::embeddings::EmbeddingGateway;

#[derive(Debug, Clone, Serialize)]
pub struct IngestReceipt {
    pub doc_id: String,
    pub doc_name: String,
    pub chunk_count: usize,
}

#[derive(Clone)]
pub struct DocumentIngestor {
    extractor: Arc<dyn TextExtractor>,
    splitter: TextSplitter,
    gateway: EmbeddingGateway,
    store: Arc<dyn VectorStore>,
}

impl DocumentIngestor {
    pub fn new(
        extractor: Arc<dyn TextExtractor>,
        splitter: TextSplitter,
        gateway: EmbeddingGateway,
        store: Arc<dyn VectorStore>,
    ) -> Self {
        Self {
            extractor,
            splitter,
            gateway,
            store,
        }
    }

    /// Ingest one file into the knowledge base.
    pub async fn ingest(&self, path: &Path, file_name: &str) -> Result<IngestReceipt, ApiError> {
        let file_type = allowed_file_type(file_name)?;

        let text = self.extractor.extract(path, &file_type).await?;
        if text.trim().is_empty() {
            return Err(ApiError::Validation(
                "document is empty after extraction".to_string(),
            ));
        }

        let chunks = self.splitter.split(&text);
        if chunks.is_empty() {
            return Err(ApiError::Validation(
                "document produced no chunks; content may be too short".to_string(),
            ));
        }

        let doc_id = generate_doc_id(file_name);
        let embeddings = self.gateway.embed(&chunks).await?;

        let rows: Vec<(String, Vec<f32>)> = chunks.into_iter().zip(embeddings).collect();
        let inserted = self
            .store
            .insert(&doc_id, file_name, &file_type, rows)
            .await?;

        tracing::info!(
            "ingested document {} ({}) as {} chunks",
            file_name,
            doc_id,
            inserted
        );

        Ok(IngestReceipt {
            doc_id,
            doc_name: file_name.to_string(),
            chunk_count: inserted,
        })
    }
}

/// Opaque, collision-resistant document id: hash of the file name plus
/// a random uuid, hex-encoded, truncated to 32 chars.
pub fn generate_doc_id(file_name: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(file_name.as_bytes());
    hasher.update(Uuid::new_v4().as_bytes());
    let digest = hasher.finalize();
    hex::encode(digest)[..32].to_string()
}
