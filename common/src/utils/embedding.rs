use std::{
    collections::hash_map::DefaultHasher,
    hash::{Hash, Hasher},
    str::FromStr,
    sync::Arc,
    time::Duration,
};

use anyhow::{anyhow, Context, Result};
use async_openai::{config::OpenAIConfig, types::CreateEmbeddingRequestArgs, Client};
use async_trait::async_trait;
use fastembed::{EmbeddingModel, ModelTrait, TextEmbedding, TextInitOptions};
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{debug, instrument};

use crate::{error::AppError, utils::config::AppConfig};

/// Norms below this are treated as a zero vector.
const NORM_EPSILON: f32 = 1e-12;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingBackend {
    #[default]
    #[serde(alias = "open-ai")]
    OpenAI,
    #[serde(alias = "fast-embed", alias = "fast")]
    FastEmbed,
    Hashed,
}

impl std::str::FromStr for EmbeddingBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "openai" | "open-ai" => Ok(Self::OpenAI),
            "hashed" => Ok(Self::Hashed),
            "fastembed" | "fast-embed" | "fast" => Ok(Self::FastEmbed),
            other => Err(anyhow!(
                "unknown embedding backend '{other}'. Expected 'openai', 'hashed', or 'fastembed'."
            )),
        }
    }
}

/// Raw text-to-vector capability offered by an embedding model.
///
/// Implementations return the model's vector as-is; normalization and dimension
/// checks live in [`Embedder`].
#[async_trait]
pub trait TextEmbedder: Send + Sync {
    async fn embed_raw(&self, text: &str) -> Result<Vec<f32>>;

    fn backend_label(&self) -> &'static str;
}

#[derive(Clone)]
pub struct EmbeddingProvider {
    inner: EmbeddingInner,
}

#[derive(Clone)]
enum EmbeddingInner {
    OpenAI {
        client: Arc<Client<OpenAIConfig>>,
        model: String,
        dimensions: u32,
    },
    Hashed {
        dimension: usize,
    },
    FastEmbed {
        model: Arc<Mutex<TextEmbedding>>,
        model_name: EmbeddingModel,
        dimension: usize,
    },
}

impl EmbeddingProvider {
    pub fn dimension(&self) -> usize {
        match &self.inner {
            EmbeddingInner::Hashed { dimension } | EmbeddingInner::FastEmbed { dimension, .. } => {
                *dimension
            }
            EmbeddingInner::OpenAI { dimensions, .. } => *dimensions as usize,
        }
    }

    pub fn model_code(&self) -> Option<String> {
        match &self.inner {
            EmbeddingInner::FastEmbed { model_name, .. } => Some(model_name.to_string()),
            EmbeddingInner::OpenAI { model, .. } => Some(model.clone()),
            EmbeddingInner::Hashed { .. } => None,
        }
    }

    pub async fn from_config(
        config: &AppConfig,
        openai_client: Option<Arc<Client<OpenAIConfig>>>,
    ) -> Result<Self> {
        match config.embedding_backend {
            EmbeddingBackend::OpenAI => {
                let client = openai_client
                    .ok_or_else(|| anyhow!("OpenAI embedding backend requires an OpenAI client"))?;
                let dimensions = u32::try_from(config.embedding_dimension)
                    .context("embedding dimension does not fit in u32")?;
                Ok(Self::new_openai(client, config.embedding_model.clone(), dimensions))
            }
            EmbeddingBackend::FastEmbed => {
                Self::new_fastembed(config.fastembed_model.clone()).await
            }
            EmbeddingBackend::Hashed => Ok(Self::new_hashed(config.embedding_dimension)),
        }
    }

    pub fn new_openai(client: Arc<Client<OpenAIConfig>>, model: String, dimensions: u32) -> Self {
        EmbeddingProvider {
            inner: EmbeddingInner::OpenAI {
                client,
                model,
                dimensions,
            },
        }
    }

    pub async fn new_fastembed(model_override: Option<String>) -> Result<Self> {
        let model_name = if let Some(code) = model_override {
            EmbeddingModel::from_str(&code).map_err(|err| anyhow!(err))?
        } else {
            EmbeddingModel::default()
        };

        let options = TextInitOptions::new(model_name.clone()).with_show_download_progress(true);
        let model_name_for_task = model_name.clone();
        let model_name_code = model_name.to_string();

        let (model, dimension) = tokio::task::spawn_blocking(move || -> Result<_> {
            let model =
                TextEmbedding::try_new(options).context("initialising FastEmbed text model")?;
            let info = EmbeddingModel::get_model_info(&model_name_for_task)
                .ok_or_else(|| anyhow!("FastEmbed model metadata missing for {model_name_code}"))?;
            Ok((model, info.dim))
        })
        .await
        .context("joining FastEmbed initialisation task")??;

        Ok(EmbeddingProvider {
            inner: EmbeddingInner::FastEmbed {
                model: Arc::new(Mutex::new(model)),
                model_name,
                dimension,
            },
        })
    }

    pub fn new_hashed(dimension: usize) -> Self {
        EmbeddingProvider {
            inner: EmbeddingInner::Hashed {
                dimension: dimension.max(1),
            },
        }
    }
}

#[async_trait]
impl TextEmbedder for EmbeddingProvider {
    async fn embed_raw(&self, text: &str) -> Result<Vec<f32>> {
        match &self.inner {
            EmbeddingInner::Hashed { dimension } => Ok(hashed_embedding(text, *dimension)),
            EmbeddingInner::FastEmbed { model, .. } => {
                let mut guard = model.lock().await;
                let embeddings = guard
                    .embed(vec![text.to_owned()], None)
                    .context("generating fastembed vector")?;
                embeddings
                    .into_iter()
                    .next()
                    .ok_or_else(|| anyhow!("fastembed returned no embedding for input"))
            }
            EmbeddingInner::OpenAI {
                client,
                model,
                dimensions,
            } => {
                let request = CreateEmbeddingRequestArgs::default()
                    .model(model.clone())
                    .input([text])
                    .dimensions(*dimensions)
                    .build()?;

                let response = client.embeddings().create(request).await?;

                let embedding = response
                    .data
                    .into_iter()
                    .next()
                    .ok_or_else(|| anyhow!("No embedding data received from OpenAI API"))?
                    .embedding;

                Ok(embedding)
            }
        }
    }

    fn backend_label(&self) -> &'static str {
        match self.inner {
            EmbeddingInner::Hashed { .. } => "hashed",
            EmbeddingInner::FastEmbed { .. } => "fastembed",
            EmbeddingInner::OpenAI { .. } => "openai",
        }
    }
}

/// Scales `vector` to unit length in place.
///
/// A vector whose norm is ~0 is divided by 1.0, i.e. it is returned unchanged.
pub fn l2_normalize(vector: &mut [f32]) {
    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    let norm = if norm < NORM_EPSILON { 1.0 } else { norm };
    for value in vector.iter_mut() {
        *value /= norm;
    }
}

/// Normalizing wrapper around a [`TextEmbedder`].
///
/// Every vector handed out has the configured dimension and unit L2 norm. Backend
/// failures and timeouts surface as [`AppError::Embedding`].
#[derive(Clone)]
pub struct Embedder {
    backend: Arc<dyn TextEmbedder>,
    dimension: usize,
    timeout: Duration,
}

impl Embedder {
    pub fn new(backend: Arc<dyn TextEmbedder>, dimension: usize, timeout: Duration) -> Self {
        Self {
            backend,
            dimension,
            timeout,
        }
    }

    pub const fn dimension(&self) -> usize {
        self.dimension
    }

    #[instrument(level = "debug", skip_all, fields(backend = self.backend.backend_label(), chars = text.len()))]
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>, AppError> {
        let mut vector = tokio::time::timeout(self.timeout, self.backend.embed_raw(text))
            .await
            .map_err(|_| {
                AppError::Embedding(format!("embedding call timed out after {:?}", self.timeout))
            })?
            .map_err(|err| AppError::Embedding(err.to_string()))?;

        if vector.len() != self.dimension {
            return Err(AppError::Embedding(format!(
                "embedding has {} dimensions, expected {}",
                vector.len(),
                self.dimension
            )));
        }

        l2_normalize(&mut vector);
        debug!(dimension = vector.len(), "Embedding normalized");

        Ok(vector)
    }
}

// Helper functions for hashed embeddings
fn hashed_embedding(text: &str, dimension: usize) -> Vec<f32> {
    let dim = dimension.max(1);
    let mut vector = vec![0.0f32; dim];

    for token in tokens(text) {
        let idx = bucket(&token, dim);
        if let Some(slot) = vector.get_mut(idx) {
            *slot += 1.0;
        }
    }

    vector
}

fn tokens(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(|token| token.to_ascii_lowercase())
}

fn bucket(token: &str, dimension: usize) -> usize {
    let mut hasher = DefaultHasher::new();
    token.hash(&mut hasher);
    (hasher.finish() % dimension as u64) as usize
}
