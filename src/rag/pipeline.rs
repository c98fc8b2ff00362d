//! RAG orchestration: retrieve → assemble prompt → generate.
//!
//! The streaming path emits an ordered event sequence — one `Sources`
//! event, zero or more `Content` events, one terminal `Done` or `Error`
//! — into an mpsc channel so the HTTP layer can forward it as SSE
//! without blocking the dispatch path. The non-streaming path shares
//! the exact same prepare step and differs only in how the answer is
//! delivered.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::mpsc;

use super::prompt;
use super::retriever::Retriever;
use super::store::SearchHit;
use crate::core::errors::ApiError;
use crate::llm::embeddings::EmbeddingGateway;
use crate::llm::provider::LlmProvider;
use crate::llm::types::{ChatMessage, ChatRequest};

/// Per-source content preview length in the `sources` event.
pub const SOURCE_PREVIEW_CHARS: usize = 200;

const CHAT_TEMPERATURE: f64 = 0.7;
const CHAT_MAX_TOKENS: i32 = 2048;

/// Reduced view of a retrieval hit, as sent to clients.
#[derive(Debug, Clone, Serialize)]
pub struct SourceSummary {
    pub doc_name: String,
    pub content: String,
    pub score: f64,
}

/// One message of the streaming wire protocol. Consumers ignore
/// unknown `type` values.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StreamEvent {
    Sources { sources: Vec<SourceSummary> },
    Content { content: String },
    Done,
    Error { message: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatAnswer {
    pub answer: String,
    pub sources: Vec<SourceSummary>,
}

#[derive(Clone)]
pub struct RagPipeline {
    gateway: EmbeddingGateway,
    retriever: Retriever,
    llm: Arc<dyn LlmProvider>,
    chat_model: String,
}

struct Prepared {
    sources: Vec<SourceSummary>,
    messages: Vec<ChatMessage>,
}

impl RagPipeline {
    pub fn new(
        gateway: EmbeddingGateway,
        retriever: Retriever,
        llm: Arc<dyn LlmProvider>,
        chat_model: String,
    ) -> Self {
        Self {
            gateway,
            retriever,
            llm,
            chat_model,
        }
    }

    /// Retrieval + prompt assembly shared by both chat variants.
    ///
    /// Without a user turn, retrieval is skipped entirely — no embedding
    /// call is made and the fallback prompt is used.
    async fn prepare(
        &self,
        messages: &[ChatMessage],
        top_k: usize,
        scope_doc_id: Option<&str>,
        scope_doc_name: Option<&str>,
    ) -> Result<Prepared, ApiError> {
        let user_question = messages
            .iter()
            .rev()
            .find(|m| m.role == "user")
            .map(|m| m.content.as_str())
            .unwrap_or_default();

        let hits: Vec<SearchHit> = if user_question.trim().is_empty() {
            Vec::new()
        } else {
            let query_vector = self.gateway.embed_one(user_question).await?;
            self.retriever
                .retrieve(&query_vector, top_k, scope_doc_id)
                .await?
        };

        let sources = hits.iter().map(source_summary).collect();
        let context = prompt::build_context(&hits);
        let system_prompt = prompt::build_system_prompt(&context, scope_doc_name);

        let history = prompt::bounded_history(messages);
        let mut model_messages = Vec::with_capacity(history.len() + 1);
        model_messages.push(ChatMessage::new("system", system_prompt));
        model_messages.extend(history.iter().cloned());

        Ok(Prepared {
            sources,
            messages: model_messages,
        })
    }

    fn chat_request(&self, messages: Vec<ChatMessage>) -> ChatRequest {
        ChatRequest::new(messages)
            .with_temperature(CHAT_TEMPERATURE)
            .with_max_tokens(CHAT_MAX_TOKENS)
    }

    /// Streaming chat. Returns immediately; the pipeline runs in a
    /// spawned task and pushes events into the returned channel.
    pub fn stream_chat(
        &self,
        messages: Vec<ChatMessage>,
        top_k: usize,
        scope_doc_id: Option<String>,
        scope_doc_name: Option<String>,
    ) -> mpsc::Receiver<StreamEvent> {
        let (tx, rx) = mpsc::channel(32);
        let pipeline = self.clone();

        tokio::spawn(async move {
            let outcome = pipeline
                .run_stream(
                    &messages,
                    top_k,
                    scope_doc_id.as_deref(),
                    scope_doc_name.as_deref(),
                    &tx,
                )
                .await;

            if let Err(err) = outcome {
                tracing::warn!("chat stream failed: {}", err);
                let _ = tx
                    .send(StreamEvent::Error {
                        message: err.to_string(),
                    })
                    .await;
            }
        });

        rx
    }

    async fn run_stream(
        &self,
        messages: &[ChatMessage],
        top_k: usize,
        scope_doc_id: Option<&str>,
        scope_doc_name: Option<&str>,
        tx: &mpsc::Sender<StreamEvent>,
    ) -> Result<(), ApiError> {
        let prepared = self
            .prepare(messages, top_k, scope_doc_id, scope_doc_name)
            .await?;

        // Sources go out before any token, even when empty.
        if tx
            .send(StreamEvent::Sources {
                sources: prepared.sources,
            })
            .await
            .is_err()
        {
            return Ok(()); // consumer disconnected
        }

        let request = self.chat_request(prepared.messages);
        let mut tokens = self.llm.stream_chat(request, &self.chat_model).await?;

        while let Some(item) = tokens.recv().await {
            let delta = item?;
            if tx.send(StreamEvent::Content { content: delta }).await.is_err() {
                return Ok(());
            }
        }

        let _ = tx.send(StreamEvent::Done).await;
        Ok(())
    }

    /// Non-streaming chat: identical retrieval, threshold and prompt
    /// logic; the answer is returned in one piece.
    pub async fn chat(
        &self,
        messages: Vec<ChatMessage>,
        top_k: usize,
        scope_doc_id: Option<&str>,
        scope_doc_name: Option<&str>,
    ) -> Result<ChatAnswer, ApiError> {
        let prepared = self
            .prepare(&messages, top_k, scope_doc_id, scope_doc_name)
            .await?;

        let request = self.chat_request(prepared.messages);
        let answer = self.llm.chat(request, &self.chat_model).await?;

        Ok(ChatAnswer {
            answer,
            sources: prepared.sources,
        })
    }
}

fn source_summary(hit: &SearchHit) -> SourceSummary {
    SourceSummary {
        doc_name: hit.doc_name.clone(),
        content: hit.content.chars().take(SOURCE_PREVIEW_CHARS).collect(),
        score: round4(hit.score),
    }
}

fn round4(score: f32) -> f64 {
    (score as f64 * 10_000.0).round() / 10_000.0
}
