//! Configuration loader and path helpers.
//!
//! Uses Figment to merge built-in defaults + `config.toml` + `config.<env>.toml`
//! + `APP_*` env vars (`__` separates nested keys, e.g. `APP_PIPELINE__CHUNK_SIZE`).
//! The embedding API key is read once here and carried in [`Settings`].

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub pipeline: PipelineConfig,
    pub remote: RemoteConfig,
    pub local: LocalConfig,
    pub clickhouse: ClickHouseConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Rows handed to the provider per call; the provider may split further.
    pub chunk_size: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self { chunk_size: 64 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    pub model: String,
    pub base_url: String,
    pub dimensions: usize,
    pub max_items: usize,
    /// Hard per-request cap enforced by the API.
    pub max_tokens: usize,
    /// Cap the packer works against; must stay below `max_tokens`.
    pub effective_max_tokens: usize,
    /// tiktoken encoding used for exact token counts.
    pub encoding: String,
    pub timeout_secs: u64,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            model: "text-embedding-3-small".to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
            dimensions: 1536,
            max_items: 96,
            max_tokens: 8192,
            effective_max_tokens: 7900,
            encoding: "cl100k_base".to_string(),
            timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalConfig {
    pub model_name: String,
    /// Directory holding `tokenizer.json`, `config.json` and `pytorch_model.bin`.
    pub model_dir: String,
    pub dimensions: usize,
    pub max_seq_length: usize,
    pub batch_size: usize,
}

impl Default for LocalConfig {
    fn default() -> Self {
        Self {
            model_name: "sentence-transformers/all-MiniLM-L6-v2".to_string(),
            model_dir: "models/all-MiniLM-L6-v2".to_string(),
            dimensions: 384,
            max_seq_length: 512,
            batch_size: 64,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClickHouseConfig {
    /// clickhouse-client config holding the named connection profiles.
    pub config_file: String,
    pub connection: String,
    /// Overrides the HTTP port derived from the profile's native port.
    pub http_port: Option<u16>,
    pub source_table: String,
    pub repo: String,
    pub target_table: String,
    pub timeout_secs: u64,
}

impl Default for ClickHouseConfig {
    fn default() -> Self {
        Self {
            config_file: "~/.clickhouse-client/config.xml".to_string(),
            connection: "github".to_string(),
            http_port: None,
            source_table: "github_events".to_string(),
            repo: "ClickHouse/ClickHouse".to_string(),
            target_table: "clickcomments".to_string(),
            timeout_secs: 300,
        }
    }
}

impl AppConfig {
    /// Loads from the working directory using `RUST_ENV` (default `dev`).
    pub fn load() -> Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());
        Self::load_from(Path::new("."), &env_name)
    }

    pub fn load_from(base: &Path, env_name: &str) -> Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(AppConfig::default()))
            .merge(Toml::file(base.join("config.toml")));
        match env_name {
            "dev" | "development" => figment = figment.merge(Toml::file(base.join("config.dev.toml"))),
            "prod" | "production" => figment = figment.merge(Toml::file(base.join("config.prod.toml"))),
            "test" | "testing" => figment = figment.merge(Toml::file(base.join("config.test.toml"))),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        let config: AppConfig = figment
            .extract()
            .map_err(|e| Error::Configuration(format!("failed to load config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.pipeline.chunk_size == 0 {
            return Err(Error::Configuration("pipeline.chunk_size must be > 0".to_string()));
        }
        let r = &self.remote;
        if r.max_items == 0 || r.effective_max_tokens == 0 {
            return Err(Error::Configuration("remote limits must be > 0".to_string()));
        }
        if r.effective_max_tokens >= r.max_tokens {
            return Err(Error::Configuration(format!(
                "remote.effective_max_tokens ({}) must be below remote.max_tokens ({})",
                r.effective_max_tokens, r.max_tokens
            )));
        }
        if self.local.batch_size == 0 || self.local.max_seq_length == 0 {
            return Err(Error::Configuration("local.batch_size and local.max_seq_length must be > 0".to_string()));
        }
        Ok(())
    }
}

/// Everything the run needs, resolved once at startup.
#[derive(Clone)]
pub struct Settings {
    pub app: AppConfig,
    pub openai_api_key: Option<String>,
}

impl Settings {
    pub fn load() -> Result<Self> {
        let app = AppConfig::load()?;
        let openai_api_key = env::var(API_KEY_ENV).ok().filter(|k| !k.trim().is_empty());
        Ok(Self { app, openai_api_key })
    }
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("app", &self.app)
            .field("openai_api_key", &self.openai_api_key.as_ref().map(|_| "***"))
            .finish()
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}
