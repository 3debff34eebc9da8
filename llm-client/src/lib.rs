//! # LLM client
//!
//! Minimal text-generation clients used for query expansion.
//!
//! Two wire protocols are supported: Ollama's `/api/generate` and the
//! OpenAI-compatible `/chat/completions` (Groq by default). [`build_generator`]
//! picks one from a [`GenerationConfig`] and wraps it in a
//! [`ResilientGenerator`] (retry with exponential backoff plus a circuit
//! breaker).

mod config;
mod error;
mod ollama;
mod openai;
mod resilience;

pub use config::{GenerationConfig, Provider, ResilienceConfig};
pub use error::{GenerationError, Result};
pub use ollama::OllamaClient;
pub use openai::OpenAiClient;
pub use resilience::{CircuitBreaker, CircuitState, ResilientGenerator};

use async_trait::async_trait;
use log::info;
use std::sync::Arc;
use std::time::Duration;

/// Anything that turns a prompt into text
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String>;
}

/// Build the configured provider client, wrapped with retry and circuit breaking
pub fn build_generator(config: &GenerationConfig) -> Result<Arc<dyn TextGenerator>> {
    config.validate().map_err(GenerationError::Config)?;

    let base_url = config.resolved_base_url();
    let model = config.resolved_model();
    let timeout = Duration::from_secs(config.timeout_secs);

    let client: Arc<dyn TextGenerator> = match config.provider {
        Provider::Ollama => Arc::new(OllamaClient::new(
            &base_url,
            &model,
            config.temperature,
            timeout,
        )?),
        Provider::OpenAi => {
            let api_key = std::env::var(&config.api_key_env).map_err(|_| {
                GenerationError::Config(format!("{} is not set", config.api_key_env))
            })?;
            Arc::new(OpenAiClient::new(
                &base_url,
                &api_key,
                &model,
                config.temperature,
                timeout,
            )?)
        }
    };

    info!(
        "Text generation via {:?} at {} (model {})",
        config.provider, base_url, model
    );

    Ok(Arc::new(ResilientGenerator::new(client, &config.resilience)))
}
