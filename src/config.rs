use serde::Deserialize;
use std::env;
use std::path::PathBuf;
use std::sync::OnceLock;

/// Default base URL for the Tika extraction server.
pub const DEFAULT_TIKA_URL: &str = "http://127.0.0.1:9998";
/// Default base URL for the Ollama runtime used by summarization.
pub const DEFAULT_OLLAMA_URL: &str = "http://127.0.0.1:11434";
/// Default model requested from Ollama for summaries.
pub const DEFAULT_SUMMARIZATION_MODEL: &str = "llama3.1";
/// Default base URL for the zero-shot inference endpoint.
pub const DEFAULT_ZERO_SHOT_URL: &str = "http://127.0.0.1:8080";
/// Default NLI model identifier passed to the zero-shot endpoint.
pub const DEFAULT_ZERO_SHOT_MODEL: &str = "facebook/bart-large-mnli";
/// Default deadline, in seconds, for one entity-worker invocation.
pub const DEFAULT_NER_WORKER_TIMEOUT_SECS: u64 = 120;

/// Runtime configuration for the eznlp collaborators.
#[derive(Debug, Deserialize)]
pub struct Config {
    /// Base URL of the Tika server used for document extraction.
    pub tika_url: String,
    /// Base URL of the Ollama runtime used for summarization.
    pub ollama_url: String,
    /// Model identifier requested from Ollama for summaries.
    pub summarization_model: String,
    /// Base URL of the zero-shot classification endpoint.
    pub zero_shot_url: String,
    /// Model identifier appended to the zero-shot endpoint path.
    pub zero_shot_model: String,
    /// Optional bearer token sent to the zero-shot endpoint.
    pub zero_shot_api_token: Option<String>,
    /// Directory holding the entity-recognition ONNX model and tokenizer.
    pub ner_model_dir: Option<PathBuf>,
    /// Optional override for the entity-worker executable path.
    pub ner_worker_bin: Option<PathBuf>,
    /// Deadline in seconds for one entity-worker invocation.
    pub ner_worker_timeout_secs: u64,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Every setting has a usable default, so loading never fails: a value
    /// that does not parse is logged and replaced by its default rather than
    /// aborting the host process mid-call.
    pub fn from_env() -> Self {
        Self {
            tika_url: load_env_or("TIKA_URL", DEFAULT_TIKA_URL),
            ollama_url: load_env_or("OLLAMA_URL", DEFAULT_OLLAMA_URL),
            summarization_model: load_env_or("SUMMARIZATION_MODEL", DEFAULT_SUMMARIZATION_MODEL),
            zero_shot_url: load_env_or("ZERO_SHOT_URL", DEFAULT_ZERO_SHOT_URL),
            zero_shot_model: load_env_or("ZERO_SHOT_MODEL", DEFAULT_ZERO_SHOT_MODEL),
            zero_shot_api_token: load_env_optional("ZERO_SHOT_API_TOKEN"),
            ner_model_dir: load_env_optional("NER_MODEL_DIR").map(PathBuf::from),
            ner_worker_bin: load_env_optional("NER_WORKER_BIN").map(PathBuf::from),
            ner_worker_timeout_secs: load_env_parsed(
                "NER_WORKER_TIMEOUT_SECS",
                DEFAULT_NER_WORKER_TIMEOUT_SECS,
            ),
        }
    }
}

fn load_env_or(key: &str, default: &str) -> String {
    load_env_optional(key).unwrap_or_else(|| default.to_string())
}

fn load_env_optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn load_env_parsed<T: std::str::FromStr + Copy>(key: &str, default: T) -> T {
    match load_env_optional(key) {
        None => default,
        Some(raw) => raw.parse().unwrap_or_else(|_| {
            tracing::warn!(key, value = %raw, "Unparseable environment value; using default");
            default
        }),
    }
}

/// Global configuration cache populated on first access.
pub static CONFIG: OnceLock<Config> = OnceLock::new();

/// Retrieve the loaded configuration, reading the environment on first use.
///
/// This crate is consumed as a library with no single entry point, so the
/// cache fills lazily. Call [`init_config`] first when a `.env` file should be
/// honored.
pub fn get_config() -> &'static Config {
    CONFIG.get_or_init(Config::from_env)
}

/// Load `.env`, read configuration from the environment, and install it in the
/// global cache.
pub fn init_config() {
    dotenvy::dotenv().ok();
    let config = get_config();
    tracing::debug!(
        tika_url = %config.tika_url,
        ollama_url = %config.ollama_url,
        zero_shot_url = %config.zero_shot_url,
        ner_model_dir = ?config.ner_model_dir,
        "Loaded configuration"
    );
}
