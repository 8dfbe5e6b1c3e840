//! Project configuration
//!
//! Settings are resolved from three sources, lowest precedence first:
//!
//! 1. a TOML file (`--config`, or `<config dir>/supabase-admin/config.toml` when present)
//! 2. a `.env` file loaded with dotenvy (`--env-file`, or `./.env` when present)
//! 3. the process environment
//!
//! Keys are wrapped in [`SecretKey`] so they never end up in logs or debug output.

use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::api::resilience::{ConcurrencyConfig, ResilienceConfig};

pub const ENV_URL: &str = "SUPABASE_URL";
pub const ENV_SERVICE_ROLE_KEY: &str = "SUPABASE_SERVICE_ROLE_KEY";
pub const ENV_SERVICE_KEY_ALIAS: &str = "SUPABASE_SERVICE_KEY";
pub const ENV_ANON_KEY: &str = "SUPABASE_ANON_KEY";

const CONFIG_DIR_NAME: &str = "supabase-admin";
const CONFIG_FILE_NAME: &str = "config.toml";

/// Errors raised while resolving configuration. All of them are fatal.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required setting {0} (set it in the environment, a .env file or the config file)")]
    Missing(&'static str),
    #[error("invalid project URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("failed to load env file {path}: {source}")]
    EnvFile {
        path: PathBuf,
        #[source]
        source: dotenvy::Error,
    },
}

/// An API key. Debug and Display never print the value.
#[derive(Clone, PartialEq, Eq)]
pub struct SecretKey(String);

impl SecretKey {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The raw key, for request headers only
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretKey(***)")
    }
}

impl fmt::Display for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("***")
    }
}

/// Shape of the TOML config file
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub project_url: Option<String>,
    pub service_role_key: Option<String>,
    pub anon_key: Option<String>,
    pub api: ApiSection,
}

/// `[api]` table of the config file
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ApiSection {
    pub request_timeout_secs: u64,
    pub connect_timeout_secs: u64,
    pub page_size: usize,
    pub max_concurrent_deletes: usize,
    pub rpc_function: String,
    pub rpc_argument: String,
    pub request_logging: bool,
}

impl Default for ApiSection {
    fn default() -> Self {
        Self {
            request_timeout_secs: 30,
            connect_timeout_secs: 10,
            page_size: 1000,
            max_concurrent_deletes: 1,
            rpc_function: "exec_sql".to_string(),
            rpc_argument: "sql".to_string(),
            request_logging: true,
        }
    }
}

impl FileConfig {
    /// Read and parse a config file
    pub fn read(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }
}

/// Options for the PostgREST side of the client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestOptions {
    /// Rows requested per page when enumerating a table
    pub page_size: usize,
    /// Name of the SQL function used to run raw statements
    pub rpc_function: String,
    /// Name of the text argument that function takes
    pub rpc_argument: String,
}

impl Default for RestOptions {
    fn default() -> Self {
        let api = ApiSection::default();
        Self {
            page_size: api.page_size,
            rpc_function: api.rpc_function,
            rpc_argument: api.rpc_argument,
        }
    }
}

/// Fully resolved configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Project base URL without a trailing slash, e.g. `https://abc.supabase.co`
    pub project_url: String,
    pub service_role_key: Option<SecretKey>,
    pub anon_key: Option<SecretKey>,
    pub resilience: ResilienceConfig,
    pub rest: RestOptions,
}

impl Config {
    /// Resolve configuration from the config file, the env file and the process environment
    pub fn load(config_path: Option<&Path>, env_file: Option<&Path>) -> Result<Self, ConfigError> {
        load_env_file(env_file)?;

        let file = match config_path {
            Some(path) => FileConfig::read(path)?,
            None => match default_config_path() {
                Some(path) if path.is_file() => {
                    log::debug!("Using config file {}", path.display());
                    FileConfig::read(&path)?
                }
                _ => FileConfig::default(),
            },
        };

        Self::from_sources(file, |name| std::env::var(name).ok())
    }

    /// Merge a parsed config file with an environment lookup. Environment values win.
    pub fn from_sources<F>(file: FileConfig, env: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |name: &str| non_empty(env(name));

        let url = lookup(ENV_URL)
            .or_else(|| non_empty(file.project_url))
            .ok_or(ConfigError::Missing(ENV_URL))?;
        let project_url = normalize_project_url(&url)?;

        let service_role_key = lookup(ENV_SERVICE_ROLE_KEY)
            .or_else(|| lookup(ENV_SERVICE_KEY_ALIAS))
            .or_else(|| non_empty(file.service_role_key))
            .map(SecretKey::new);

        let anon_key = lookup(ENV_ANON_KEY)
            .or_else(|| non_empty(file.anon_key))
            .map(SecretKey::new);

        let api = file.api;
        if api.page_size == 0 {
            return Err(ConfigError::Invalid {
                name: "api.page_size",
                reason: "must be at least 1".to_string(),
            });
        }
        if api.max_concurrent_deletes == 0 {
            return Err(ConfigError::Invalid {
                name: "api.max_concurrent_deletes",
                reason: "must be at least 1".to_string(),
            });
        }
        if api.rpc_function.trim().is_empty() || api.rpc_argument.trim().is_empty() {
            return Err(ConfigError::Invalid {
                name: "api.rpc_function",
                reason: "function and argument names must not be empty".to_string(),
            });
        }

        let resilience = ResilienceConfig::builder()
            .request_timeout(Duration::from_secs(api.request_timeout_secs))
            .connect_timeout(Duration::from_secs(api.connect_timeout_secs))
            .concurrency_config(ConcurrencyConfig::bounded(api.max_concurrent_deletes))
            .request_logging(api.request_logging)
            .build();

        Ok(Self {
            project_url,
            service_role_key,
            anon_key,
            resilience,
            rest: RestOptions {
                page_size: api.page_size,
                rpc_function: api.rpc_function.trim().to_string(),
                rpc_argument: api.rpc_argument.trim().to_string(),
            },
        })
    }

    /// Key for admin calls. Missing is fatal for every admin command.
    pub fn service_role_key(&self) -> Result<&SecretKey, ConfigError> {
        self.service_role_key
            .as_ref()
            .ok_or(ConfigError::Missing(ENV_SERVICE_ROLE_KEY))
    }

    /// Public key used for end-user sign-in
    pub fn anon_key(&self) -> Result<&SecretKey, ConfigError> {
        self.anon_key
            .as_ref()
            .ok_or(ConfigError::Missing(ENV_ANON_KEY))
    }
}

/// `<config dir>/supabase-admin/config.toml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
}

fn load_env_file(env_file: Option<&Path>) -> Result<(), ConfigError> {
    match env_file {
        Some(path) => dotenvy::from_path(path).map_err(|source| ConfigError::EnvFile {
            path: path.to_path_buf(),
            source,
        }),
        None => {
            // A missing ./.env is normal
            if let Ok(path) = dotenvy::dotenv() {
                log::debug!("Loaded environment from {}", path.display());
            }
            Ok(())
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn normalize_project_url(raw: &str) -> Result<String, ConfigError> {
    let parsed = reqwest::Url::parse(raw).map_err(|e| ConfigError::InvalidUrl {
        url: raw.to_string(),
        reason: e.to_string(),
    })?;

    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidUrl {
            url: raw.to_string(),
            reason: format!("unsupported scheme '{}'", parsed.scheme()),
        });
    }
    if parsed.host_str().is_none() {
        return Err(ConfigError::InvalidUrl {
            url: raw.to_string(),
            reason: "missing host".to_string(),
        });
    }

    Ok(raw.trim_end_matches('/').to_string())
}
