//! Similarity retrieval with a relevance floor.

use std::sync::Arc;

use super::store::{SearchHit, VectorStore};
use crate::core::errors::ApiError;

/// Hits scoring at or below this cosine similarity are discarded. An
/// irrelevant passage is worse than no passage, so the floor trades
/// recall for precision and fewer than `top_k` hits may come back.
pub const SCORE_FLOOR: f32 = 0.3;

#[derive(Clone)]
pub struct Retriever {
    store: Arc<dyn VectorStore>,
}

impl Retriever {
    pub fn new(store: Arc<dyn VectorStore>) -> Self {
        Self { store }
    }

    /// Query the store for `top_k` nearest chunks, optionally scoped to
    /// one document, and drop everything at or below the floor. An empty
    /// result is a valid outcome.
    pub async fn retrieve(
        &self,
        query_vector: &[f32],
        top_k: usize,
        scope_doc_id: Option<&str>,
    ) -> Result<Vec<SearchHit>, ApiError> {
        let hits = self.store.query(query_vector, top_k, scope_doc_id).await?;
        Ok(hits.into_iter().filter(|h| h.score > SCORE_FLOOR).collect())
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;

    struct CannedStore {
        hits: Vec<SearchHit>,
    }

    #[async_trait]
    impl VectorStore for CannedStore {
        async fn insert(
            &self,
            _doc_id: &str,
            _doc_name: &str,
            _doc_type: &str,
            _chunks: Vec<(String, Vec<f32>)>,
        ) -> Result<usize, ApiError> {
            Ok(0)
        }

        async fn query(
            &self,
            _vector: &[f32],
            top_k: usize,
            doc_id: Option<&str>,
        ) -> Result<Vec<SearchHit>, ApiError> {
            let mut hits: Vec<SearchHit> = self
                .hits
                .iter()
                .filter(|h| doc_id.map_or(true, |d| h.doc_id == d))
                .cloned()
                .collect();
            hits.truncate(top_k);
            Ok(hits)
        }

        async fn list_documents(
            &self,
        ) -> Result<Vec<crate::rag::store::DocumentInfo>, ApiError> {
            Ok(Vec::new())
        }

        async fn delete_document(&self, _doc_id: &str) -> Result<bool, ApiError> {
            Ok(false)
        }

        async fn document_exists(&self, _doc_id: &str) -> Result<bool, ApiError> {
            Ok(false)
        }

        async fn get_chunks(
            &self,
            _doc_id: &str,
        ) -> Result<Vec<crate::rag::store::StoredChunk>, ApiError> {
            Ok(Vec::new())
        }
    }

    fn hit(doc_id: &str, score: f32) -> SearchHit {
        SearchHit {
            doc_id: doc_id.to_string(),
            doc_name: format!("{}.txt", doc_id),
            content: "passage".to_string(),
            chunk_index: 0,
            score,
        }
    }

    #[tokio::test]
    async fn drops_hits_at_or_below_floor() {
        let store = Arc::new(CannedStore {
            hits: vec![hit("a", 0.9), hit("b", 0.3), hit("c", 0.1)],
        });
        let retriever = Retriever::new(store);

        let hits = retriever.retrieve(&[1.0], 5, None).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].doc_id, "a");
    }

    #[tokio::test]
    async fn scoped_query_with_no_matches_is_empty_not_error() {
        let store = Arc::new(CannedStore {
            hits: vec![hit("a", 0.9)],
        });
        let retriever = Retriever::new(store);

        let hits = retriever.retrieve(&[1.0], 5, Some("zz")).await.unwrap();
        assert!(hits.is_empty());
    }
}
