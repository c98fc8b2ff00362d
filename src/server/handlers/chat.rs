use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::IntoResponse;
use axum::Json;
use futures_util::stream::{self, Stream};
use serde::Deserialize;

use crate::core::errors::ApiError;
use crate::llm::types::ChatMessage;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ChatRequestBody {
    pub messages: Vec<ChatMessage>,
    pub top_k: Option<usize>,
    /// Restrict retrieval to one document; `None` searches everything.
    pub doc_id: Option<String>,
}

impl ChatRequestBody {
    fn validate(&self) -> Result<(), ApiError> {
        if self.messages.is_empty() {
            return Err(ApiError::Validation("messages must not be empty".to_string()));
        }
        Ok(())
    }
}

/// Display name for a scoped document, best-effort: a failed lookup
/// only widens the prompt wording, never the search itself.
async fn resolve_doc_name(state: &AppState, doc_id: Option<&str>) -> Option<String> {
    let doc_id = doc_id?;
    match state.store.list_documents().await {
        Ok(docs) => docs
            .into_iter()
            .find(|d| d.doc_id == doc_id)
            .map(|d| d.doc_name),
        Err(err) => {
            tracing::warn!("failed to resolve document name for {}: {}", doc_id, err);
            None
        }
    }
}

pub async fn chat(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<ChatRequestBody>,
) -> Result<impl IntoResponse, ApiError> {
    payload.validate()?;

    let top_k = payload.top_k.unwrap_or(state.settings.top_k);
    let doc_name = resolve_doc_name(&state, payload.doc_id.as_deref()).await;

    let answer = state
        .pipeline
        .chat(
            payload.messages,
            top_k,
            payload.doc_id.as_deref(),
            doc_name.as_deref(),
        )
        .await?;

    Ok(Json(answer))
}

pub async fn chat_stream(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<ChatRequestBody>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    payload.validate()?;

    let top_k = payload.top_k.unwrap_or(state.settings.top_k);
    let doc_name = resolve_doc_name(&state, payload.doc_id.as_deref()).await;

    let rx = state
        .pipeline
        .stream_chat(payload.messages, top_k, payload.doc_id.clone(), doc_name);

    let stream = stream::unfold(rx, |mut rx| async move {
        let event = rx.recv().await?;
        let sse = match Event::default().json_data(&event) {
            Ok(sse) => sse,
            Err(err) => {
                tracing::error!("failed to encode stream event: {}", err);
                Event::default().data(r#"{"type":"error","message":"event encoding failed"}"#)
            }
        };
        Some((Ok::<_, Infallible>(sse), rx))
    });

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}
