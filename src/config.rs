//! Configuration: a TOML file for tunables plus environment credentials.
//!
//! The TOML file is optional. When it does not exist every section falls
//! back to its defaults, so `docqa ask "..."` works with nothing but the
//! environment. Credentials are never read from TOML; they come from the
//! process environment after the dotenv file named in `[env] file` (default
//! `keys.env`) has been loaded with override semantics.
//!
//! Missing credentials are not an error. [`Credentials::missing`] reports
//! them so callers can show a warning and carry on with reduced
//! functionality.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

pub const ENV_OPENAI_DEPLOYMENT_NAME: &str = "OPENAI_DEPLOYMENT_NAME";
pub const ENV_OPENAI_API_KEY: &str = "OPENAI_API_KEY";
pub const ENV_AZURE_OPENAI_ENDPOINT: &str = "AZURE_OPENAI_ENDPOINT";
pub const ENV_AZURE_SEARCH_SERVICE: &str = "AZURE_SEARCH_SERVICE";
pub const ENV_AZURE_SEARCH_KEY: &str = "AZURE_SEARCH_KEY";
pub const ENV_AZURE_SEARCH_INDEX: &str = "AZURE_SEARCH_INDEX";

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub completion: CompletionConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub env: EnvConfig,
    /// Filled from the environment by [`load_config`], never from TOML.
    #[serde(skip)]
    pub credentials: Credentials,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SearchConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default = "default_search_api_version")]
    pub api_version: String,
    /// Overrides the `https://<service>.search.windows.net` endpoint.
    #[serde(default)]
    pub endpoint: Option<String>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            api_version: default_search_api_version(),
            endpoint: None,
        }
    }
}

fn default_top_k() -> usize {
    50
}
fn default_search_api_version() -> String {
    "2023-11-01".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct CompletionConfig {
    #[serde(default = "default_completion_api_version")]
    pub api_version: String,
    /// Request timeout. Unset means the HTTP client default (none).
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            api_version: default_completion_api_version(),
            timeout_secs: None,
        }
    }
}

fn default_completion_api_version() -> String {
    "2024-02-01".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct CacheConfig {
    #[serde(default = "default_cache_capacity")]
    pub capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: default_cache_capacity(),
        }
    }
}

fn default_cache_capacity() -> usize {
    1024
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8501".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct EnvConfig {
    #[serde(default = "default_env_file")]
    pub file: PathBuf,
}

impl Default for EnvConfig {
    fn default() -> Self {
        Self {
            file: default_env_file(),
        }
    }
}

fn default_env_file() -> PathBuf {
    PathBuf::from("keys.env")
}

/// Secrets and identifiers for the two Azure services.
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    pub openai_deployment_name: Option<String>,
    pub openai_api_key: Option<String>,
    pub azure_openai_endpoint: Option<String>,
    pub azure_search_service: Option<String>,
    pub azure_search_key: Option<String>,
    pub azure_search_index: Option<String>,
}

impl Credentials {
    /// Reads credentials from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads credentials through an arbitrary lookup. Blank values count as
    /// missing.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        Self {
            openai_deployment_name: get(ENV_OPENAI_DEPLOYMENT_NAME),
            openai_api_key: get(ENV_OPENAI_API_KEY),
            azure_openai_endpoint: get(ENV_AZURE_OPENAI_ENDPOINT),
            azure_search_service: get(ENV_AZURE_SEARCH_SERVICE),
            azure_search_key: get(ENV_AZURE_SEARCH_KEY),
            azure_search_index: get(ENV_AZURE_SEARCH_INDEX),
        }
    }

    /// Each required setting paired with whether it is present.
    pub fn entries(&self) -> [(&'static str, bool); 6] {
        [
            (ENV_OPENAI_DEPLOYMENT_NAME, self.openai_deployment_name.is_some()),
            (ENV_OPENAI_API_KEY, self.openai_api_key.is_some()),
            (ENV_AZURE_OPENAI_ENDPOINT, self.azure_openai_endpoint.is_some()),
            (ENV_AZURE_SEARCH_SERVICE, self.azure_search_service.is_some()),
            (ENV_AZURE_SEARCH_KEY, self.azure_search_key.is_some()),
            (ENV_AZURE_SEARCH_INDEX, self.azure_search_index.is_some()),
        ]
    }

    /// Names of the settings that are absent, in a stable order.
    pub fn missing(&self) -> Vec<&'static str> {
        self.entries()
            .into_iter()
            .filter(|(_, present)| !present)
            .map(|(name, _)| name)
            .collect()
    }
}

impl Config {
    /// The search endpoint: the configured override, or the URL derived
    /// from the service name. `None` when neither is available.
    pub fn search_endpoint(&self) -> Option<String> {
        if let Some(endpoint) = &self.search.endpoint {
            return Some(endpoint.trim_end_matches('/').to_string());
        }
        self.credentials
            .azure_search_service
            .as_ref()
            .map(|service| format!("https://{}.search.windows.net", service))
    }
}

/// Loads the TOML file (if present), the dotenv file (if present) and the
/// environment credentials, then validates the result.
pub fn load_config(path: &Path) -> Result<Config> {
    let mut config = if path.exists() {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        parse_config(&content)?
    } else {
        tracing::debug!(path = %path.display(), "config file not found, using defaults");
        let config = Config::default();
        validate(&config)?;
        config
    };

    if config.env.file.exists() {
        dotenvy::from_path_override(&config.env.file).with_context(|| {
            format!("Failed to load env file: {}", config.env.file.display())
        })?;
        tracing::debug!(file = %config.env.file.display(), "loaded environment file");
    }

    config.credentials = Credentials::from_env();
    Ok(config)
}

/// Parses and validates TOML content without touching the environment.
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    if config.search.top_k < 1 {
        anyhow::bail!("search.top_k must be >= 1");
    }
    if config.search.api_version.trim().is_empty() {
        anyhow::bail!("search.api_version must not be empty");
    }
    if config.completion.api_version.trim().is_empty() {
        anyhow::bail!("completion.api_version must not be empty");
    }
    if config.completion.timeout_secs == Some(0) {
        anyhow::bail!("completion.timeout_secs must be > 0 when set");
    }
    if config.cache.capacity < 1 {
        anyhow::bail!("cache.capacity must be >= 1");
    }
    config
        .server
        .bind
        .parse::<SocketAddr>()
        .with_context(|| format!("server.bind is not a socket address: {}", config.server.bind))?;
    Ok(())
}
