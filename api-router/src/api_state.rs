use std::{sync::Arc, time::Duration};

use common::{
    error::AppError,
    storage::{
        chunk_store::{ChunkStore, SurrealChunkStore},
        db::SurrealDbClient,
        store::StorageManager,
    },
    utils::{
        config::AppConfig,
        embedding::{Embedder, EmbeddingProvider},
        generation::{AnswerGenerator, OpenAiGenerator},
    },
};
use ingestion_pipeline::{
    DefaultIngestionServices, IngestionConfig, IngestionPipeline, IngestionServices,
};
use retrieval_pipeline::{AnswerService, RetrievalTuning};
use tracing::info;

#[derive(Clone)]
pub struct ApiState {
    pub db: Arc<SurrealDbClient>,
    pub config: AppConfig,
    pub storage: StorageManager,
    pub store: Arc<dyn ChunkStore>,
    pub ingestion: Arc<IngestionPipeline>,
    pub answers: Arc<AnswerService>,
}

impl ApiState {
    pub async fn new(
        config: &AppConfig,
        storage: StorageManager,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let surreal_db_client = Arc::new(
            SurrealDbClient::new(
                &config.surrealdb_address,
                &config.surrealdb_username,
                &config.surrealdb_password,
                &config.surrealdb_namespace,
                &config.surrealdb_database,
            )
            .await?,
        );

        surreal_db_client.ensure_initialized().await?;

        let openai_client = Arc::new(async_openai::Client::with_config(
            async_openai::config::OpenAIConfig::new()
                .with_api_key(&config.openai_api_key)
                .with_api_base(&config.openai_base_url),
        ));

        let embedding_provider = Arc::new(
            EmbeddingProvider::from_config(config, Some(Arc::clone(&openai_client))).await?,
        );
        info!(
            embedding_backend = ?config.embedding_backend,
            embedding_dimension = embedding_provider.dimension(),
            "Embedding provider initialized"
        );
        let embedder = Embedder::new(
            embedding_provider.clone(),
            embedding_provider.dimension(),
            Duration::from_secs(config.embedding_timeout_secs),
        );

        let generator = Arc::new(OpenAiGenerator::new(
            Arc::clone(&openai_client),
            config.generation_model.clone(),
            Duration::from_secs(config.generation_timeout_secs),
        ));
        let services = Arc::new(DefaultIngestionServices::new(
            openai_client,
            storage.clone(),
            config.vision_model.clone(),
            Duration::from_secs(config.generation_timeout_secs),
        ));

        Ok(Self::from_resources(
            config.clone(),
            surreal_db_client,
            storage,
            embedder,
            generator,
            services,
        )?)
    }

    /// Wires the pipelines around already constructed clients.
    pub fn from_resources(
        config: AppConfig,
        db: Arc<SurrealDbClient>,
        storage: StorageManager,
        embedder: Embedder,
        generator: Arc<dyn AnswerGenerator>,
        services: Arc<dyn IngestionServices>,
    ) -> Result<Self, AppError> {
        let store: Arc<dyn ChunkStore> = Arc::new(SurrealChunkStore::new(
            Arc::clone(&db),
            config.hybrid_search_enabled,
            Duration::from_secs(config.store_timeout_secs),
        ));

        let ingestion = Arc::new(IngestionPipeline::new(
            Arc::clone(&store),
            embedder.clone(),
            services,
            IngestionConfig::from_app_config(&config),
        ));
        let answers = Arc::new(AnswerService::new(
            Arc::clone(&store),
            embedder,
            generator,
            RetrievalTuning::from_app_config(&config),
        )?);

        Ok(Self {
            db,
            config,
            storage,
            store,
            ingestion,
            answers,
        })
    }
}
