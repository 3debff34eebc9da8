use anyhow::{Context, Result, bail};
use apidocs_doc_store::StoreConfig;
use apidocs_llm_client::{GenerationConfig, Provider};
use apidocs_retrieval::RetrievalConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Overrides the generation provider (`ollama`, `openai`, `groq`)
pub const PROVIDER_ENV_VAR: &str = "APIDOCS_LLM_PROVIDER";

/// Overrides the store persistence file
pub const STORE_PATH_ENV_VAR: &str = "APIDOCS_STORE_PATH";

/// Store file used when neither the config nor the environment names one
pub const DEFAULT_STORE_PATH: &str = ".apidocs/store.json";

/// Contents of the `--config` TOML file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub retrieval: RetrievalConfig,

    /// Query expansion is off unless this section (or the provider override)
    /// is present
    #[serde(default)]
    pub generation: Option<GenerationConfig>,

    #[serde(default)]
    pub store: StoreConfig,
}

impl AppConfig {
    /// Read `path` if given, then apply environment overrides and defaults
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read config {}", path.display()))?;
                Self::from_toml(&raw)
                    .with_context(|| format!("Invalid config {}", path.display()))?
            }
            None => Self::default(),
        };

        config.apply_overrides(|name| std::env::var(name).ok())?;
        Ok(config)
    }

    pub fn from_toml(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    /// Apply environment overrides looked up through `lookup`, then fill in
    /// the default store path
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(raw) = lookup(PROVIDER_ENV_VAR).filter(|v| !v.trim().is_empty()) {
            let provider = parse_provider(&raw)?;
            self.generation
                .get_or_insert_with(GenerationConfig::default)
                .provider = provider;
        }

        if let Some(path) = lookup(STORE_PATH_ENV_VAR).filter(|v| !v.trim().is_empty()) {
            self.store.path = Some(PathBuf::from(path));
        }

        if self.store.path.is_none() {
            self.store.path = Some(PathBuf::from(DEFAULT_STORE_PATH));
        }

        Ok(())
    }

    pub fn store_path(&self) -> &Path {
        self.store
            .path
            .as_deref()
            .unwrap_or_else(|| Path::new(DEFAULT_STORE_PATH))
    }
}

fn parse_provider(raw: &str) -> Result<Provider> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "ollama" => Ok(Provider::Ollama),
        "openai" | "groq" => Ok(Provider::OpenAi),
        other => bail!("unknown {PROVIDER_ENV_VAR} '{other}' (expected ollama, openai or groq)"),
    }
}
