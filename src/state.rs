use std::sync::Arc;

use crate::core::config::{AppPaths, Settings};
use crate::extract::{FileExtractor, TextExtractor};
use crate::llm::embeddings::EmbeddingGateway;
use crate::llm::provider::LlmProvider;
use crate::llm::zhipu::ZhipuProvider;
use crate::rag::ingest::DocumentIngestor;
use crate::rag::pipeline::RagPipeline;
use crate::rag::retriever::Retriever;
use crate::rag::splitter::TextSplitter;
use crate::rag::sqlite::SqliteVectorStore;
use crate::rag::store::VectorStore;

/// Everything a request handler needs, constructed once at startup.
/// Clients are shared behind `Arc`s; per-request state stays in the
/// handlers.
pub struct AppState {
    pub paths: Arc<AppPaths>,
    pub settings: Arc<Settings>,
    pub store: Arc<dyn VectorStore>,
    pub pipeline: RagPipeline,
    pub ingestor: DocumentIngestor,
}

impl AppState {
    pub async fn initialize() -> anyhow::Result<Arc<Self>> {
        let paths = Arc::new(AppPaths::new());
        let settings = Arc::new(Settings::load(&paths)?);

        let store: Arc<dyn VectorStore> = Arc::new(
            SqliteVectorStore::open(paths.db_path.clone(), settings.embedding_dim).await?,
        );
        let llm: Arc<dyn LlmProvider> = Arc::new(ZhipuProvider::new(
            settings.api_base_url.clone(),
            settings.api_key.clone(),
        ));

        let gateway = EmbeddingGateway::new(llm.clone(), settings.embedding_model.clone());
        let retriever = Retriever::new(store.clone());
        let pipeline = RagPipeline::new(
            gateway.clone(),
            retriever,
            llm.clone(),
            settings.chat_model.clone(),
        );

        let extractor: Arc<dyn TextExtractor> = Arc::new(FileExtractor);
        let splitter = TextSplitter::new(settings.chunk_size, settings.chunk_overlap);
        let ingestor = DocumentIngestor::new(extractor, splitter, gateway, store.clone());

        Ok(Arc::new(AppState {
            paths,
            settings,
            store,
            pipeline,
            ingestor,
        }))
    }
}
