/// Configuration management for the actor cache service
use crate::error::{CastError, CastResult};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

/// Main server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub service: ServiceConfig,
    pub storage: StorageConfig,
    pub directory: DirectoryConfig,
    pub chart: ChartConfig,
    pub logging: LoggingConfig,
}

/// Service-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub hostname: String,
    pub port: u16,
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub data_directory: PathBuf,
    pub actor_db: PathBuf,
    pub max_connections: u32,
}

/// External actor directory (TVmaze) configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectoryConfig {
    pub base_url: String,
    pub user_agent: String,
    pub timeout_secs: u64,
}

/// Statistics chart dimensions, per pie panel
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChartConfig {
    pub panel_width: u32,
    pub panel_height: u32,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        let data_directory = PathBuf::from("./data");
        Self {
            service: ServiceConfig {
                hostname: "127.0.0.1".to_string(),
                port: 5000,
            },
            storage: StorageConfig {
                actor_db: data_directory.join("actors.sqlite"),
                data_directory,
                max_connections: 5,
            },
            directory: DirectoryConfig {
                base_url: "https://api.tvmaze.com".to_string(),
                user_agent: format!("cast-cache/{}", env!("CARGO_PKG_VERSION")),
                timeout_secs: 30,
            },
            chart: ChartConfig {
                panel_width: 400,
                panel_height: 520,
            },
            logging: LoggingConfig {
                level: "cast_cache=debug,tower_http=debug".to_string(),
            },
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> CastResult<Self> {
        dotenv::dotenv().ok();

        let defaults = Self::default();

        let hostname = env::var("CAST_HOSTNAME").unwrap_or(defaults.service.hostname);
        let port = match env::var("CAST_PORT") {
            Ok(raw) => raw
                .parse()
                .map_err(|_| CastError::Validation(format!("Invalid port number: {}", raw)))?,
            Err(_) => defaults.service.port,
        };

        let data_directory: PathBuf = env::var("CAST_DATA_DIRECTORY")
            .map(PathBuf::from)
            .unwrap_or(defaults.storage.data_directory);
        let actor_db = env::var("CAST_DB_LOCATION")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_directory.join("actors.sqlite"));
        let max_connections = env::var("CAST_DB_MAX_CONNECTIONS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.storage.max_connections);

        let base_url = env::var("CAST_DIRECTORY_URL")
            .map(|s| s.trim_end_matches('/').to_string())
            .unwrap_or(defaults.directory.base_url);
        let user_agent = env::var("CAST_DIRECTORY_USER_AGENT")
            .unwrap_or(defaults.directory.user_agent);
        let timeout_secs = env::var("CAST_DIRECTORY_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.directory.timeout_secs);

        let panel_width = env::var("CAST_CHART_PANEL_WIDTH")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.chart.panel_width);
        let panel_height = env::var("CAST_CHART_PANEL_HEIGHT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.chart.panel_height);

        let log_level = env::var("RUST_LOG").unwrap_or(defaults.logging.level);

        Ok(ServerConfig {
            service: ServiceConfig { hostname, port },
            storage: StorageConfig {
                data_directory,
                actor_db,
                max_connections,
            },
            directory: DirectoryConfig {
                base_url,
                user_agent,
                timeout_secs,
            },
            chart: ChartConfig {
                panel_width,
                panel_height,
            },
            logging: LoggingConfig { level: log_level },
        })
    }

    /// Validate configuration
    pub fn validate(&self) -> CastResult<()> {
        if self.service.hostname.is_empty() {
            return Err(CastError::Validation("Hostname cannot be empty".to_string()));
        }

        if self.storage.max_connections == 0 {
            return Err(CastError::Validation(
                "Database pool needs at least one connection".to_string(),
            ));
        }

        if self.directory.timeout_secs == 0 {
            return Err(CastError::Validation(
                "Directory timeout must be greater than zero".to_string(),
            ));
        }

        // Pie plus a legend row needs some room
        if self.chart.panel_width < 120 || self.chart.panel_height < 160 {
            return Err(CastError::Validation(
                "Chart panels must be at least 120x160 pixels".to_string(),
            ));
        }

        Ok(())
    }
}
