use std::sync::Arc;

use axum::extract::{Multipart, Path, State};
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;
use uuid::Uuid;

use crate::core::errors::ApiError;
use crate::state::AppState;

/// Upload one document: save → extract → chunk → embed → store.
pub async fn upload_document(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let mut file_name: Option<String> = None;
    let mut payload: Option<Vec<u8>> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::Validation(format!("invalid multipart body: {}", e)))?
    {
        if field.name() == Some("file") {
            file_name = field.file_name().map(|n| n.to_string());
            let bytes = field
                .bytes()
                .await
                .map_err(|e| ApiError::Validation(format!("failed to read upload: {}", e)))?;
            payload = Some(bytes.to_vec());
            break;
        }
    }

    let file_name = file_name
        .filter(|n| !n.is_empty())
        .ok_or_else(|| ApiError::Validation("file name must not be empty".to_string()))?;
    let payload = payload
        .ok_or_else(|| ApiError::Validation("missing \"file\" field".to_string()))?;

    if payload.len() > state.settings.max_file_size {
        return Err(ApiError::TooLarge(format!(
            "file exceeds the {} MB limit",
            state.settings.max_file_size / (1024 * 1024)
        )));
    }

    let temp_path = state
        .paths
        .upload_dir
        .join(format!("{}_{}", Uuid::new_v4(), file_name));
    tokio::fs::write(&temp_path, &payload)
        .await
        .map_err(ApiError::internal)?;

    let result = state.ingestor.ingest(&temp_path, &file_name).await;

    if let Err(err) = tokio::fs::remove_file(&temp_path).await {
        tracing::warn!("failed to remove upload {}: {}", temp_path.display(), err);
    }

    let receipt = result?;

    Ok(Json(json!({
        "doc_id": receipt.doc_id,
        "doc_name": receipt.doc_name,
        "chunk_count": receipt.chunk_count,
        "message": format!("document ingested as {} chunks", receipt.chunk_count),
    })))
}

pub async fn list_documents(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let docs = state.store.list_documents().await?;
    Ok(Json(docs))
}

pub async fn remove_document(
    State(state): State<Arc<AppState>>,
    Path(doc_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    if !state.store.document_exists(&doc_id).await? {
        return Err(ApiError::NotFound("document not found".to_string()));
    }

    state.store.delete_document(&doc_id).await?;

    Ok(Json(json!({
        "doc_id": doc_id,
        "message": "document deleted",
    })))
}

pub async fn preview_document(
    State(state): State<Arc<AppState>>,
    Path(doc_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    if !state.store.document_exists(&doc_id).await? {
        return Err(ApiError::NotFound("document not found".to_string()));
    }

    let chunks = state.store.get_chunks(&doc_id).await?;
    let first = chunks
        .first()
        .ok_or_else(|| ApiError::NotFound("document has no content".to_string()))?;

    let doc_name = first.doc_name.clone();
    let doc_type = first.doc_type.clone();
    let chunk_payload: Vec<_> = chunks
        .iter()
        .map(|c| {
            json!({
                "chunk_index": c.chunk_index,
                "content": c.content,
            })
        })
        .collect();

    Ok(Json(json!({
        "doc_id": doc_id,
        "doc_name": doc_name,
        "doc_type": doc_type,
        "chunk_count": chunk_payload.len(),
        "chunks": chunk_payload,
    })))
}
