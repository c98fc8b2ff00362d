//! Paths and settings for the backend process.
//!
//! `AppPaths` decides where data, logs, uploads and the chunk database
//! live. `Settings` carries everything tunable, loaded from an optional
//! `config.toml` in the data directory with environment overrides for
//! the values that differ between deployments.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::errors::ApiError;

#[derive(Debug, Clone)]
pub struct AppPaths {
    pub data_dir: PathBuf,
    pub log_dir: PathBuf,
    pub upload_dir: PathBuf,
    pub db_path: PathBuf,
}

impl AppPaths {
    pub fn new() -> Self {
        let data_dir = discover_data_dir();
        let log_dir = data_dir.join("logs");
        let upload_dir = data_dir.join("uploads");
        let db_path = data_dir.join("corpora.db");

        for dir in [&data_dir, &log_dir, &upload_dir] {
            let _ = fs::create_dir_all(dir);
        }

        AppPaths {
            data_dir,
            log_dir,
            upload_dir,
            db_path,
        }
    }
}

impl Default for AppPaths {
    fn default() -> Self {
        Self::new()
    }
}

fn discover_data_dir() -> PathBuf {
    if let Ok(dir) = env::var("CORPORA_DATA_DIR") {
        return PathBuf::from(dir);
    }

    if cfg!(debug_assertions) {
        return env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join("data");
    }

    if cfg!(target_os = "windows") {
        let base = env::var("LOCALAPPDATA")
            .unwrap_or_else(|_| env::var("USERPROFILE").unwrap_or_else(|_| ".".to_string()));
        return PathBuf::from(base).join("Corpora");
    }

    if cfg!(target_os = "macos") {
        return home_dir()
            .join("Library")
            .join("Application Support")
            .join("Corpora");
    }

    let xdg = env::var("XDG_DATA_HOME").unwrap_or_else(|_| {
        home_dir()
            .join(".local/share")
            .to_string_lossy()
            .to_string()
    });
    PathBuf::from(xdg).join("corpora")
}

fn home_dir() -> PathBuf {
    env::var("HOME")
        .or_else(|_| env::var("USERPROFILE"))
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("."))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// API key for the embedding/chat provider.
    pub api_key: String,
    /// Base URL of the OpenAI-compatible provider API.
    pub api_base_url: String,
    pub embedding_model: String,
    pub chat_model: String,
    /// Dimension of the configured embedding model's vectors.
    pub embedding_dim: usize,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub top_k: usize,
    /// Maximum accepted upload size in bytes.
    pub max_file_size: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            api_base_url: "https://open.bigmodel.cn/api/paas/v4".to_string(),
            embedding_model: "embedding-3".to_string(),
            chat_model: "glm-4.7".to_string(),
            embedding_dim: 2048,
            chunk_size: 500,
            chunk_overlap: 50,
            top_k: 5,
            max_file_size: 20 * 1024 * 1024,
        }
    }
}

impl Settings {
    /// Load settings from `config.toml` under the data dir, falling back
    /// to defaults, then apply environment overrides.
    pub fn load(paths: &AppPaths) -> Result<Self, ApiError> {
        let mut settings = match read_config_file(&paths.data_dir.join("config.toml"))? {
            Some(parsed) => parsed,
            None => Settings::default(),
        };

        if let Ok(key) = env::var("CORPORA_API_KEY") {
            settings.api_key = key;
        }
        if let Ok(url) = env::var("CORPORA_API_BASE_URL") {
            settings.api_base_url = url;
        }

        if settings.chunk_overlap >= settings.chunk_size {
            return Err(ApiError::Internal(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                settings.chunk_overlap, settings.chunk_size
            )));
        }

        Ok(settings)
    }
}

fn read_config_file(path: &Path) -> Result<Option<Settings>, ApiError> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path).map_err(ApiError::internal)?;
    let parsed = toml::from_str(&raw)
        .map_err(|e| ApiError::Internal(format!("invalid config.toml: {}", e)))?;
    Ok(Some(parsed))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_consistent() {
        let settings = Settings::default();
        assert!(settings.chunk_overlap < settings.chunk_size);
        assert_eq!(settings.top_k, 5);
        assert_eq!(settings.embedding_dim, 2048);
    }

    #[test]
    fn config_file_round_trip() {
        let settings = Settings::default();
        let raw = toml::to_string(&settings).unwrap();
        let parsed: Settings = toml::from_str(&raw).unwrap();
        assert_eq!(parsed.chunk_size, settings.chunk_size);
        assert_eq!(parsed.chat_model, settings.chat_model);
    }

    #[test]
    fn partial_config_keeps_defaults() {
        let parsed: Settings = toml::from_str("chunk_size = 800").unwrap();
        assert_eq!(parsed.chunk_size, 800);
        assert_eq!(parsed.chunk_overlap, 50);
        assert_eq!(parsed.embedding_model, "embedding-3");
    }
}
