//! Batched embedding calls over an `LlmProvider`.
//!
//! The provider caps batch size and input length, so the gateway slices
//! the input into sequential batches and truncates each text before
//! submission. Output order always matches input order; any batch
//! failure fails the whole call, since storage assumes one vector per
//! chunk.

use std::sync::Arc;

use super::provider::LlmProvider;
use crate::core::errors::ApiError;

/// Provider-side limit on inputs per embedding request.
pub const EMBED_BATCH_SIZE: usize = 25;
/// Maximum characters submitted per input text.
pub const EMBED_MAX_CHARS: usize = 2000;

#[derive(Clone)]
pub struct EmbeddingGateway {
    provider: Arc<dyn LlmProvider>,
    model: String,
}

impl EmbeddingGateway {
    pub fn new(provider: Arc<dyn LlmProvider>, model: String) -> Self {
        Self { provider, model }
    }

    /// Embed every text, preserving input order.
    pub async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ApiError> {
        let mut all = Vec::with_capacity(texts.len());

        for batch in texts.chunks(EMBED_BATCH_SIZE) {
            let truncated: Vec<String> = batch
                .iter()
                .map(|t| truncate_chars(t, EMBED_MAX_CHARS))
                .collect();

            let vectors = self.provider.embed(&truncated, &self.model).await?;
            if vectors.len() != truncated.len() {
                return Err(ApiError::Provider(format!(
                    "embedding count mismatch: sent {}, got {}",
                    truncated.len(),
                    vectors.len()
                )));
            }
            all.extend(vectors);
        }

        Ok(all)
    }

    pub async fn embed_one(&self, text: &str) -> Result<Vec<f32>, ApiError> {
        let inputs = [text.to_string()];
        let mut vectors = self.embed(&inputs).await?;
        vectors
            .pop()
            .ok_or_else(|| ApiError::Provider("empty embedding response".to_string()))
    }
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;
    use tokio::sync::mpsc;

    use super::*;
    use crate::llm::types::ChatRequest;

    struct RecordingProvider {
        calls: AtomicUsize,
        batches: Mutex<Vec<Vec<String>>>,
        fail_on_call: Option<usize>,
    }

    impl RecordingProvider {
        fn new(fail_on_call: Option<usize>) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                batches: Mutex::new(Vec::new()),
                fail_on_call,
            }
        }
    }

    #[async_trait]
    impl LlmProvider for RecordingProvider {
        fn name(&self) -> &str {
            "recording"
        }

        async fn chat(&self, _request: ChatRequest, _model_id: &str) -> Result<String, ApiError> {
            unimplemented!("not used by the gateway")
        }

        async fn stream_chat(
            &self,
            _request: ChatRequest,
            _model_id: &str,
        ) -> Result<mpsc::Receiver<Result<String, ApiError>>, ApiError> {
            unimplemented!("not used by the gateway")
        }

        async fn embed(
            &self,
            inputs: &[String],
            _model_id: &str,
        ) -> Result<Vec<Vec<f32>>, ApiError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_on_call == Some(call) {
                return Err(ApiError::Provider("quota exceeded".to_string()));
            }
            self.batches.lock().unwrap().push(inputs.to_vec());
            // encode the global input index into the vector so order is checkable
            let base = call * EMBED_BATCH_SIZE;
            Ok(inputs
                .iter()
                .enumerate()
                .map(|(i, _)| vec![(base + i) as f32])
                .collect())
        }
    }

    fn texts(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("text {}", i)).collect()
    }

    #[tokio::test]
    async fn splits_into_batches_and_preserves_order() {
        let provider = Arc::new(RecordingProvider::new(None));
        let gateway = EmbeddingGateway::new(provider.clone(), "m".to_string());

        let vectors = gateway.embed(&texts(26)).await.unwrap();
        assert_eq!(vectors.len(), 26);
        for (i, v) in vectors.iter().enumerate() {
            assert_eq!(v[0], i as f32);
        }

        let batches = provider.batches.lock().unwrap();
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0].len(), 25);
        assert_eq!(batches[1].len(), 1);
    }

    #[tokio::test]
    async fn truncates_long_inputs() {
        let provider = Arc::new(RecordingProvider::new(None));
        let gateway = EmbeddingGateway::new(provider.clone(), "m".to_string());

        let long = "字".repeat(EMBED_MAX_CHARS + 100);
        gateway.embed(&[long]).await.unwrap();

        let batches = provider.batches.lock().unwrap();
        assert_eq!(batches[0][0].chars().count(), EMBED_MAX_CHARS);
    }

    #[tokio::test]
    async fn second_batch_failure_fails_everything() {
        let provider = Arc::new(RecordingProvider::new(Some(1)));
        let gateway = EmbeddingGateway::new(provider.clone(), "m".to_string());

        let err = gateway.embed(&texts(30)).await.unwrap_err();
        assert!(matches!(err, ApiError::Provider(_)));
    }

    #[tokio::test]
    async fn empty_input_issues_no_calls() {
        let provider = Arc::new(RecordingProvider::new(None));
        let gateway = EmbeddingGateway::new(provider.clone(), "m".to_string());

        let vectors = gateway.embed(&[]).await.unwrap();
        assert!(vectors.is_empty());
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }
}
