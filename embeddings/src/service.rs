use crate::DEFAULT_EMBEDDING_DIM;
use crate::Embedder;
use crate::error::EmbeddingError;
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use log::{debug, info};
use serde::{Deserialize, Serialize};

/// Configuration for the local embedding model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    #[serde(default)]
    pub model: EmbeddingModelType,

    /// Output dimension; vectors longer than this are truncated. Must not
    /// exceed the model's native dimension.
    #[serde(default = "default_dimension")]
    pub dimension: usize,

    /// Texts per inference call
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    #[serde(default)]
    pub show_download_progress: bool,
}

fn default_dimension() -> usize {
    DEFAULT_EMBEDDING_DIM
}

fn default_batch_size() -> usize {
    32
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: EmbeddingModelType::default(),
            dimension: default_dimension(),
            batch_size: default_batch_size(),
            show_download_progress: false,
        }
    }
}

impl EmbeddingConfig {
    pub fn validate(&self) -> Result<(), EmbeddingError> {
        let native = self.model.native_dimension();
        if self.dimension == 0 || self.dimension > native {
            return Err(EmbeddingError::InvalidInput(format!(
                "dimension must be in 1..={native} for {:?}, got {}",
                self.model, self.dimension
            )));
        }
        if self.batch_size == 0 {
            return Err(EmbeddingError::InvalidInput(
                "batch_size must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Sentence-embedding models small enough to run next to the store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EmbeddingModelType {
    #[default]
    AllMiniLmL6V2,
    BgeSmallEnV15,
    BgeBaseEnV15,
}

impl EmbeddingModelType {
    pub fn native_dimension(self) -> usize {
        match self {
            EmbeddingModelType::AllMiniLmL6V2 | EmbeddingModelType::BgeSmallEnV15 => 384,
            EmbeddingModelType::BgeBaseEnV15 => 768,
        }
    }

    fn to_fastembed_model(self) -> EmbeddingModel {
        match self {
            EmbeddingModelType::AllMiniLmL6V2 => EmbeddingModel::AllMiniLML6V2,
            EmbeddingModelType::BgeSmallEnV15 => EmbeddingModel::BGESmallENV15,
            EmbeddingModelType::BgeBaseEnV15 => EmbeddingModel::BGEBaseENV15,
        }
    }
}

/// Local ONNX embedding model
pub struct EmbeddingService {
    model: TextEmbedding,
    config: EmbeddingConfig,
}

impl EmbeddingService {
    /// All-MiniLM-L6-v2 at its native 384 dimensions
    pub fn new() -> Result<Self, EmbeddingError> {
        Self::with_config(EmbeddingConfig::default())
    }

    /// Load the configured model, downloading its weights on first use
    pub fn with_config(config: EmbeddingConfig) -> Result<Self, EmbeddingError> {
        config.validate()?;
        info!(
            "Loading embedding model {:?} ({} dimensions)",
            config.model, config.dimension
        );

        let init_options = InitOptions::new(config.model.to_fastembed_model())
            .with_show_download_progress(config.show_download_progress);
        let model = TextEmbedding::try_new(init_options)
            .map_err(|e| EmbeddingError::ModelInitialization(e.to_string()))?;

        Ok(Self { model, config })
    }

    /// Get the configuration of this service
    pub fn config(&self) -> &EmbeddingConfig {
        &self.config
    }
}

impl Embedder for EmbeddingService {
    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let refs: Vec<&str> = texts.iter().map(String::as_str).collect();
        let mut vectors = Vec::with_capacity(texts.len());
        for batch in refs.chunks(self.config.batch_size) {
            let embedded = self
                .model
                .embed(batch.to_vec(), None)
                .map_err(|e| EmbeddingError::EmbeddingGeneration(e.to_string()))?;
            vectors.extend(embedded.into_iter().map(|mut v| {
                v.truncate(self.config.dimension);
                v
            }));
        }

        debug!("Embedded {} texts with {:?}", vectors.len(), self.config.model);
        Ok(vectors)
    }

    fn dimension(&self) -> usize {
        self.config.dimension
    }
}
