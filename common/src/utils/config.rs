use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

use crate::utils::embedding::EmbeddingBackend;

#[derive(Clone, Deserialize, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    Local,
    Memory,
}

fn default_storage_kind() -> StorageKind {
    StorageKind::Local
}

#[derive(Clone, Deserialize, Debug)]
pub struct AppConfig {
    pub openai_api_key: String,
    pub surrealdb_address: String,
    pub surrealdb_username: String,
    pub surrealdb_password: String,
    pub surrealdb_namespace: String,
    pub surrealdb_database: String,
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    #[serde(default = "default_http_port")]
    pub http_port: u16,
    #[serde(default = "default_base_url")]
    pub openai_base_url: String,
    #[serde(default = "default_storage_kind")]
    pub storage: StorageKind,
    /// Prefix prepended to object paths when handing out document urls.
    #[serde(default = "default_public_files_url")]
    pub public_files_url: String,
    #[serde(default = "default_generation_model")]
    pub generation_model: String,
    #[serde(default = "default_generation_model")]
    pub vision_model: String,
    #[serde(default)]
    pub embedding_backend: EmbeddingBackend,
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,
    #[serde(default = "default_embedding_dimension")]
    pub embedding_dimension: usize,
    #[serde(default)]
    pub fastembed_model: Option<String>,
    #[serde(default = "default_embedding_timeout_secs")]
    pub embedding_timeout_secs: u64,
    #[serde(default = "default_generation_timeout_secs")]
    pub generation_timeout_secs: u64,
    #[serde(default = "default_store_timeout_secs")]
    pub store_timeout_secs: u64,
    #[serde(default = "default_true")]
    pub hybrid_search_enabled: bool,
    #[serde(default = "default_true")]
    pub ocr_enabled: bool,
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
    #[serde(default = "default_upload_max_body_bytes")]
    pub upload_max_body_bytes: usize,
    /// Weight of the vector term in hybrid search.
    #[serde(default = "default_hybrid_alpha")]
    pub hybrid_alpha: f32,
    #[serde(default = "default_confidence_high")]
    pub confidence_high: f32,
    #[serde(default = "default_confidence_medium")]
    pub confidence_medium: f32,
}

fn default_data_dir() -> String {
    "./data".to_string()
}

const fn default_http_port() -> u16 {
    3000
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_public_files_url() -> String {
    "http://localhost:3000/files".to_string()
}

fn default_generation_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}

const fn default_embedding_dimension() -> usize {
    768
}

const fn default_embedding_timeout_secs() -> u64 {
    30
}

const fn default_generation_timeout_secs() -> u64 {
    120
}

const fn default_store_timeout_secs() -> u64 {
    30
}

const fn default_true() -> bool {
    true
}

const fn default_chunk_size() -> usize {
    1200
}

const fn default_chunk_overlap() -> usize {
    200
}

const fn default_upload_max_body_bytes() -> usize {
    100 * 1024 * 1024
}

const fn default_hybrid_alpha() -> f32 {
    0.7
}

const fn default_confidence_high() -> f32 {
    0.72
}

const fn default_confidence_medium() -> f32 {
    0.60
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            openai_api_key: String::new(),
            surrealdb_address: String::new(),
            surrealdb_username: String::new(),
            surrealdb_password: String::new(),
            surrealdb_namespace: String::new(),
            surrealdb_database: String::new(),
            data_dir: default_data_dir(),
            http_port: default_http_port(),
            openai_base_url: default_base_url(),
            storage: default_storage_kind(),
            public_files_url: default_public_files_url(),
            generation_model: default_generation_model(),
            vision_model: default_generation_model(),
            embedding_backend: EmbeddingBackend::default(),
            embedding_model: default_embedding_model(),
            embedding_dimension: default_embedding_dimension(),
            fastembed_model: None,
            embedding_timeout_secs: default_embedding_timeout_secs(),
            generation_timeout_secs: default_generation_timeout_secs(),
            store_timeout_secs: default_store_timeout_secs(),
            hybrid_search_enabled: true,
            ocr_enabled: true,
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            upload_max_body_bytes: default_upload_max_body_bytes(),
            hybrid_alpha: default_hybrid_alpha(),
            confidence_high: default_confidence_high(),
            confidence_medium: default_confidence_medium(),
        }
    }
}

pub fn get_config() -> Result<AppConfig, ConfigError> {
    let config = Config::builder()
        .add_source(File::with_name("config").required(false))
        .add_source(Environment::default())
        .build()?;

    config.try_deserialize()
}
