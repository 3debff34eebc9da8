use serde::{Deserialize, Serialize};

/// Which wire protocol to speak
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    /// Local Ollama server (`/api/generate`)
    #[default]
    Ollama,
    /// OpenAI-compatible chat completions (Groq, OpenAI, vLLM, ...)
    #[serde(alias = "groq")]
    OpenAi,
}

/// Configuration for the text-generation client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Provider protocol
    #[serde(default)]
    pub provider: Provider,

    /// Base URL; defaults depend on the provider
    #[serde(default)]
    pub base_url: Option<String>,

    /// Model name; defaults depend on the provider
    #[serde(default)]
    pub model: Option<String>,

    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Environment variable holding the API key (OpenAI-compatible only)
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Retry and circuit-breaker settings
    #[serde(default)]
    pub resilience: ResilienceConfig,
}

/// Retry with exponential backoff plus a circuit breaker
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResilienceConfig {
    /// Total attempts per call (1 = no retry)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Lower bound of the backoff between attempts, in milliseconds
    #[serde(default = "default_min_backoff_ms")]
    pub min_backoff_ms: u64,

    /// Upper bound of the backoff between attempts, in milliseconds
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,

    /// Consecutive failures that open the circuit
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,

    /// Seconds the circuit stays open before a trial call is allowed
    #[serde(default = "default_recovery_timeout_secs")]
    pub recovery_timeout_secs: u64,
}

const OLLAMA_BASE_URL: &str = "http://localhost:11434";
const OLLAMA_MODEL: &str = "llama3.2:3b";
const GROQ_BASE_URL: &str = "https://api.groq.com/openai/v1";
const GROQ_MODEL: &str = "llama-3.1-8b-instant";

fn default_temperature() -> f32 {
    0.6
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_api_key_env() -> String {
    "GROQ_API_KEY".to_string()
}

fn default_max_attempts() -> u32 {
    3
}

fn default_min_backoff_ms() -> u64 {
    2_000
}

fn default_max_backoff_ms() -> u64 {
    10_000
}

fn default_failure_threshold() -> u32 {
    3
}

fn default_recovery_timeout_secs() -> u64 {
    60
}

impl Default for ResilienceConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            min_backoff_ms: default_min_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            failure_threshold: default_failure_threshold(),
            recovery_timeout_secs: default_recovery_timeout_secs(),
        }
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            provider: Provider::default(),
            base_url: None,
            model: None,
            temperature: default_temperature(),
            timeout_secs: default_timeout_secs(),
            api_key_env: default_api_key_env(),
            resilience: ResilienceConfig::default(),
        }
    }
}

impl GenerationConfig {
    /// Base URL with the provider default applied
    pub fn resolved_base_url(&self) -> String {
        let url = match (&self.base_url, self.provider) {
            (Some(url), _) => url.as_str(),
            (None, Provider::Ollama) => OLLAMA_BASE_URL,
            (None, Provider::OpenAi) => GROQ_BASE_URL,
        };
        url.trim_end_matches('/').to_string()
    }

    /// Model name with the provider default applied
    pub fn resolved_model(&self) -> String {
        match (&self.model, self.provider) {
            (Some(model), _) => model.clone(),
            (None, Provider::Ollama) => OLLAMA_MODEL.to_string(),
            (None, Provider::OpenAi) => GROQ_MODEL.to_string(),
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(format!(
                "temperature must be in [0.0, 2.0], got {}",
                self.temperature
            ));
        }

        if self.timeout_secs == 0 {
            return Err("timeout_secs must be > 0".to_string());
        }

        let r = &self.resilience;
        if r.max_attempts == 0 {
            return Err("max_attempts must be > 0".to_string());
        }

        if r.min_backoff_ms > r.max_backoff_ms {
            return Err(format!(
                "min_backoff_ms ({}) cannot exceed max_backoff_ms ({})",
                r.min_backoff_ms, r.max_backoff_ms
            ));
        }

        if r.failure_threshold == 0 {
            return Err("failure_threshold must be > 0".to_string());
        }

        Ok(())
    }
}
