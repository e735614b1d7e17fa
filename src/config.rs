use std::net::SocketAddr;
use std::path::PathBuf;

use thiserror::Error;

/// Application-level constants
pub const APP_NAME: &str = "Assessment Vault";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

pub const DEFAULT_MODEL: &str = "gemini-3-flash-preview";
pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_AI_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_REMOTE_TABLE: &str = "tests";
pub const DEFAULT_BIND: &str = "127.0.0.1:8787";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Unknown store kind: {0} (expected 'local' or 'remote')")]
    UnknownStore(String),

    #[error("Remote store selected but VAULT_REMOTE_URL is not set")]
    MissingRemoteUrl,

    #[error("Invalid value for {var}: {value}")]
    InvalidValue { var: &'static str, value: String },

    #[error("Cannot determine home directory")]
    NoHomeDir,
}

/// Which record store backend to use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreConfig {
    Local { db_path: PathBuf },
    Remote {
        base_url: String,
        api_key: Option<String>,
        table: String,
    },
}

#[derive(Debug, Clone)]
pub struct AiConfig {
    /// `None` when no credential is configured. Requests then fail with
    /// `AuthenticationRequired` instead of failing at startup.
    pub api_key: Option<String>,
    pub model: String,
    pub api_base: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub ai: AiConfig,
    pub store: StoreConfig,
    pub bind: SocketAddr,
}

impl AppConfig {
    /// Build the configuration from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build the configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let api_key = var("GEMINI_API_KEY").or_else(|| var("API_KEY"));

        let timeout_secs = match var("VAULT_AI_TIMEOUT_SECS") {
            Some(raw) => raw.parse::<u64>().map_err(|_| ConfigError::InvalidValue {
                var: "VAULT_AI_TIMEOUT_SECS",
                value: raw,
            })?,
            None => DEFAULT_AI_TIMEOUT_SECS,
        };

        let ai = AiConfig {
            api_key,
            model: var("VAULT_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            api_base: var("VAULT_API_BASE").unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
            timeout_secs,
        };

        let store = match var("VAULT_STORE").as_deref().unwrap_or("local") {
            "local" => {
                let db_path = match var("VAULT_DB_PATH") {
                    Some(p) => PathBuf::from(p),
                    None => database_path()?,
                };
                StoreConfig::Local { db_path }
            }
            "remote" => StoreConfig::Remote {
                base_url: var("VAULT_REMOTE_URL").ok_or(ConfigError::MissingRemoteUrl)?,
                api_key: var("VAULT_REMOTE_KEY"),
                table: var("VAULT_REMOTE_TABLE").unwrap_or_else(|| DEFAULT_REMOTE_TABLE.to_string()),
            },
            other => return Err(ConfigError::UnknownStore(other.to_string())),
        };

        let bind_raw = var("VAULT_BIND").unwrap_or_else(|| DEFAULT_BIND.to_string());
        let bind = bind_raw.parse().map_err(|_| ConfigError::InvalidValue {
            var: "VAULT_BIND",
            value: bind_raw,
        })?;

        Ok(Self { ai, store, bind })
    }
}

/// Get the application data directory
/// ~/AssessmentVault/ on all platforms
pub fn app_data_dir() -> Result<PathBuf, ConfigError> {
    let home = dirs::home_dir().ok_or(ConfigError::NoHomeDir)?;
    Ok(home.join("AssessmentVault"))
}

/// Default location of the local record database
pub fn database_path() -> Result<PathBuf, ConfigError> {
    Ok(app_data_dir()?.join("vault.db"))
}

/// Log filter used when `RUST_LOG` is not set.
pub fn default_log_filter() -> &'static str {
    "assessment_vault_lib=info,assessment_vault=info,tower_http=warn"
}
