/// Configuration management for the social sync worker
///
/// Loads configuration from environment variables.
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Application settings
    pub app: AppConfig,
    /// Document store configuration
    pub store: StoreConfig,
    /// Search index; sync to it is skipped when unset
    pub search: Option<SearchConfig>,
    /// Push endpoint registry; sync to it is skipped when unset
    pub push: Option<PushConfig>,
    /// Outbound HTTP client settings
    pub clients: ClientConfig,
    /// Change-stream input
    pub stream: StreamConfig,
    /// Log output
    pub logging: LoggingConfig,
}

/// Application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Application environment (dev, staging, prod)
    pub env: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Memory,
    Dynamodb,
}

/// Document store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    /// Table name (DynamoDB backend only)
    #[serde(default = "default_table_name")]
    pub table_name: String,
}

/// Search index configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Elasticsearch base URL
    pub url: String,
    /// Index holding user documents
    #[serde(default = "default_user_index")]
    pub user_index: String,
}

/// Push endpoint registry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushConfig {
    pub url: String,
}

/// HTTP client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// Change-stream input configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamConfig {
    /// NDJSON file of change records; stdin when unset
    pub change_log_path: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub format: LogFormat,
}

// Default values
fn default_table_name() -> String {
    "social-main".to_string()
}

fn default_user_index() -> String {
    "users".to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|value| !value.trim().is_empty())
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let app = AppConfig {
            env: std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        };

        let backend = match non_empty_var("STORE_BACKEND").as_deref() {
            None | Some("memory") => StoreBackend::Memory,
            Some("dynamodb") => StoreBackend::Dynamodb,
            Some(other) => bail!("STORE_BACKEND must be `memory` or `dynamodb`, got `{other}`"),
        };
        let store = StoreConfig {
            backend,
            table_name: non_empty_var("DYNAMODB_TABLE").unwrap_or_else(default_table_name),
        };
        if store.backend == StoreBackend::Dynamodb && non_empty_var("DYNAMODB_TABLE").is_none() {
            bail!("DYNAMODB_TABLE environment variable not set");
        }

        let search = non_empty_var("SEARCH_URL").map(|url| SearchConfig {
            url,
            user_index: non_empty_var("SEARCH_USER_INDEX").unwrap_or_else(default_user_index),
        });

        let push = non_empty_var("PUSH_URL").map(|url| PushConfig { url });

        let clients = ClientConfig {
            timeout_secs: match non_empty_var("CLIENT_TIMEOUT_SECS") {
                Some(raw) => raw
                    .parse()
                    .with_context(|| format!("CLIENT_TIMEOUT_SECS is not a number: `{raw}`"))?,
                None => default_timeout_secs(),
            },
        };

        let stream = StreamConfig {
            change_log_path: non_empty_var("CHANGE_LOG_PATH"),
        };

        let logging = LoggingConfig {
            format: match non_empty_var("LOG_FORMAT").as_deref() {
                Some("json") => LogFormat::Json,
                _ => LogFormat::Pretty,
            },
        };

        Ok(Config {
            app,
            store,
            search,
            push,
            clients,
            stream,
            logging,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // one test touches the process environment so runs cannot interleave
    #[test]
    fn test_from_env() {
        for name in [
            "APP_ENV",
            "STORE_BACKEND",
            "DYNAMODB_TABLE",
            "SEARCH_URL",
            "SEARCH_USER_INDEX",
            "PUSH_URL",
            "CLIENT_TIMEOUT_SECS",
            "CHANGE_LOG_PATH",
            "LOG_FORMAT",
        ] {
            std::env::remove_var(name);
        }

        let config = Config::from_env().unwrap();
        assert_eq!(config.app.env, "development");
        assert_eq!(config.store.backend, StoreBackend::Memory);
        assert_eq!(config.store.table_name, "social-main");
        assert!(config.search.is_none());
        assert!(config.push.is_none());
        assert_eq!(config.clients.timeout_secs, 10);
        assert_eq!(config.logging.format, LogFormat::Pretty);

        std::env::set_var("SEARCH_URL", "http://localhost:9200");
        std::env::set_var("PUSH_URL", "http://localhost:8088");
        std::env::set_var("LOG_FORMAT", "json");
        let config = Config::from_env().unwrap();
        let search = config.search.unwrap();
        assert_eq!(search.url, "http://localhost:9200");
        assert_eq!(search.user_index, "users");
        assert_eq!(config.push.unwrap().url, "http://localhost:8088");
        assert_eq!(config.logging.format, LogFormat::Json);

        std::env::set_var("STORE_BACKEND", "dynamodb");
        assert!(Config::from_env().is_err());
        std::env::set_var("DYNAMODB_TABLE", "main");
        assert_eq!(Config::from_env().unwrap().store.table_name, "main");

        std::env::set_var("STORE_BACKEND", "postgres");
        assert!(Config::from_env().is_err());

        for name in [
            "STORE_BACKEND",
            "DYNAMODB_TABLE",
            "SEARCH_URL",
            "PUSH_URL",
            "LOG_FORMAT",
        ] {
            std::env::remove_var(name);
        }
    }
}
