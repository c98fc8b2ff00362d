//! SQLite-backed chunk index.
//!
//! Chunk text and metadata live in SQLite; embeddings are stored as
//! little-endian f32 BLOBs and searched with brute-force cosine
//! similarity. No external server required.

use std::path::PathBuf;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};

use super::store::{DocumentInfo, SearchHit, StoredChunk, VectorStore};
use crate::core::errors::ApiError;

/// Stored chunk text is capped to keep rows bounded.
const MAX_STORED_CONTENT_CHARS: usize = 4000;

pub struct SqliteVectorStore {
    pool: SqlitePool,
    #[allow(dead_code)]
    db_path: PathBuf,
}

impl SqliteVectorStore {
    /// Open (or create) the index at `db_path`. If the persisted
    /// embedding dimension differs from `embedding_dim` — the embedding
    /// model changed — all stored vectors are invalid and the chunk
    /// table is rebuilt.
    pub async fn open(db_path: PathBuf, embedding_dim: usize) -> Result<Self, ApiError> {
        let options = SqliteConnectOptions::new()
            .filename(&db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);

        let pool = SqlitePoolOptions::new()
            .min_connections(1)
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(ApiError::internal)?;

        let store = Self { pool, db_path };
        store.init_schema(embedding_dim).await?;
        Ok(store)
    }

    async fn init_schema(&self, embedding_dim: usize) -> Result<(), ApiError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS kb_meta (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(ApiError::internal)?;

        let existing_dim: Option<i64> =
            sqlx::query_scalar("SELECT CAST(value AS INTEGER) FROM kb_meta WHERE key = 'embedding_dim'")
                .fetch_optional(&self.pool)
                .await
                .map_err(ApiError::internal)?;

        if let Some(dim) = existing_dim {
            if dim != embedding_dim as i64 {
                tracing::warn!(
                    "stored embedding dimension {} does not match configured {}; rebuilding index",
                    dim,
                    embedding_dim
                );
                sqlx::query("DROP TABLE IF EXISTS kb_chunks")
                    .execute(&self.pool)
                    .await
                    .map_err(ApiError::internal)?;
            }
        }

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS kb_chunks (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                doc_id TEXT NOT NULL,
                doc_name TEXT NOT NULL,
                doc_type TEXT NOT NULL DEFAULT '',
                content TEXT NOT NULL,
                chunk_index INTEGER NOT NULL,
                created_at TEXT NOT NULL,
                embedding BLOB NOT NULL
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(ApiError::internal)?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_kb_doc ON kb_chunks(doc_id)")
            .execute(&self.pool)
            .await
            .map_err(ApiError::internal)?;

        sqlx::query("INSERT OR REPLACE INTO kb_meta (key, value) VALUES ('embedding_dim', ?1)")
            .bind(embedding_dim as i64)
            .execute(&self.pool)
            .await
            .map_err(ApiError::internal)?;

        Ok(())
    }

    /// Serialize embedding to bytes (little-endian f32).
    fn serialize_embedding(embedding: &[f32]) -> Vec<u8> {
        embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
    }

    /// Deserialize embedding from bytes.
    fn deserialize_embedding(bytes: &[u8]) -> Vec<f32> {
        bytes
            .chunks_exact(4)
            .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect()
    }

    fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
        if a.len() != b.len() || a.is_empty() {
            return 0.0;
        }

        let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
        let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
        let denom = norm_a * norm_b;

        if denom <= f32::EPSILON {
            0.0
        } else {
            dot / denom
        }
    }
}

#[async_trait]
impl VectorStore for SqliteVectorStore {
    async fn insert(
        &self,
        doc_id: &str,
        doc_name: &str,
        doc_type: &str,
        chunks: Vec<(String, Vec<f32>)>,
    ) -> Result<usize, ApiError> {
        if chunks.is_empty() {
            return Ok(0);
        }

        let created_at = Utc::now().to_rfc3339();
        let mut tx = self.pool.begin().await.map_err(ApiError::internal)?;

        for (index, (content, embedding)) in chunks.iter().enumerate() {
            let blob = Self::serialize_embedding(embedding);
            let stored: String = content.chars().take(MAX_STORED_CONTENT_CHARS).collect();

            sqlx::query(
                "INSERT INTO kb_chunks (doc_id, doc_name, doc_type, content, chunk_index, created_at, embedding)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            )
            .bind(doc_id)
            .bind(doc_name)
            .bind(doc_type)
            .bind(&stored)
            .bind(index as i64)
            .bind(&created_at)
            .bind(&blob)
            .execute(&mut *tx)
            .await
            .map_err(ApiError::internal)?;
        }

        tx.commit().await.map_err(ApiError::internal)?;
        tracing::debug!("inserted {} chunks for document {}", chunks.len(), doc_id);
        Ok(chunks.len())
    }

    async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        doc_id: Option<&str>,
    ) -> Result<Vec<SearchHit>, ApiError> {
        let rows = if let Some(doc) = doc_id {
            sqlx::query(
                "SELECT doc_id, doc_name, content, chunk_index, embedding
                 FROM kb_chunks WHERE doc_id = ?1",
            )
            .bind(doc)
            .fetch_all(&self.pool)
            .await
            .map_err(ApiError::internal)?
        } else {
            sqlx::query(
                "SELECT doc_id, doc_name, content, chunk_index, embedding FROM kb_chunks",
            )
            .fetch_all(&self.pool)
            .await
            .map_err(ApiError::internal)?
        };

        let mut scored: Vec<SearchHit> = rows
            .iter()
            .filter_map(|row| {
                let embedding_bytes: Vec<u8> = row.get("embedding");
                if embedding_bytes.is_empty() {
                    return None;
                }
                let stored_emb = Self::deserialize_embedding(&embedding_bytes);
                let score = Self::cosine_similarity(vector, &stored_emb);

                Some(SearchHit {
                    doc_id: row.get("doc_id"),
                    doc_name: row.get("doc_name"),
                    content: row.get("content"),
                    chunk_index: row.get("chunk_index"),
                    score,
                })
            })
            .collect();

        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(top_k);

        Ok(scored)
    }

    async fn list_documents(&self) -> Result<Vec<DocumentInfo>, ApiError> {
        let rows = sqlx::query(
            "SELECT doc_id, doc_name, doc_type, created_at
             FROM kb_chunks WHERE chunk_index = 0 ORDER BY created_at DESC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(ApiError::internal)?;

        let mut docs = Vec::with_capacity(rows.len());
        for row in rows {
            let doc_id: String = row.get("doc_id");

            // Degraded read: a failed count demotes to 0 instead of
            // failing the whole listing.
            let chunk_count: i64 =
                sqlx::query_scalar("SELECT COUNT(*) FROM kb_chunks WHERE doc_id = ?1")
                    .bind(&doc_id)
                    .fetch_one(&self.pool)
                    .await
                    .unwrap_or_else(|err| {
                        tracing::warn!("chunk count failed for {}: {}", doc_id, err);
                        0
                    });

            docs.push(DocumentInfo {
                doc_id,
                doc_name: row.get("doc_name"),
                doc_type: row.get("doc_type"),
                chunk_count,
                created_at: row.get("created_at"),
            });
        }

        Ok(docs)
    }

    async fn delete_document(&self, doc_id: &str) -> Result<bool, ApiError> {
        let result = sqlx::query("DELETE FROM kb_chunks WHERE doc_id = ?1")
            .bind(doc_id)
            .execute(&self.pool)
            .await
            .map_err(ApiError::internal)?;

        Ok(result.rows_affected() > 0)
    }

    async fn document_exists(&self, doc_id: &str) -> Result<bool, ApiError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM kb_chunks WHERE doc_id = ?1")
            .bind(doc_id)
            .fetch_one(&self.pool)
            .await
            .map_err(ApiError::internal)?;

        Ok(count > 0)
    }

    async fn get_chunks(&self, doc_id: &str) -> Result<Vec<StoredChunk>, ApiError> {
        let rows = sqlx::query(
            "SELECT doc_id, doc_name, doc_type, content, chunk_index
             FROM kb_chunks WHERE doc_id = ?1 ORDER BY chunk_index ASC",
        )
        .bind(doc_id)
        .fetch_all(&self.pool)
        .await
        .map_err(ApiError::internal)?;

        Ok(rows
            .iter()
            .map(|row| StoredChunk {
                doc_id: row.get("doc_id"),
                doc_name: row.get("doc_name"),
                doc_type: row.get("doc_type"),
                content: row.get("content"),
                chunk_index: row.get("chunk_index"),
            })
            .collect())
    }
}
