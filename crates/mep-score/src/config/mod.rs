use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use crate::data::cache::CacheConfig;
use crate::scoring::{RoleTablePreset, ScoringConfig, ScoringConfigError};
use crate::telemetry::LogFormat;

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub data: DataConfig,
    pub scoring: ScoringSettings,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
        let log_format = match env::var("APP_LOG_FORMAT") {
            Ok(raw) => raw
                .parse::<LogFormat>()
                .map_err(|_| ConfigError::InvalidLogFormat(raw))?,
            Err(_) => LogFormat::default(),
        };

        let data_dir = env::var("DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("data"));
        let cache = CacheConfig {
            ttl: Duration::from_secs(env_u64("CACHE_TTL_SECS", 3600)?),
            sweep_interval: Duration::from_secs(env_u64("CACHE_SWEEP_INTERVAL_SECS", 300)?),
            max_entries: usize::try_from(env_u64("CACHE_MAX_ENTRIES", 3)?)
                .map_err(|_| ConfigError::InvalidNumber("CACHE_MAX_ENTRIES"))?,
            load_timeout: Duration::from_secs(env_u64("DATA_LOAD_TIMEOUT_SECS", 120)?),
        };
        if cache.max_entries == 0 {
            return Err(ConfigError::ZeroCacheEntries);
        }
        if cache.sweep_interval.is_zero() {
            return Err(ConfigError::InvalidNumber("CACHE_SWEEP_INTERVAL_SECS"));
        }

        let role_table = match env::var("SCORING_ROLE_TABLE") {
            Ok(raw) => raw
                .parse::<RoleTablePreset>()
                .map_err(ConfigError::InvalidRoleTable)?,
            Err(_) => RoleTablePreset::default(),
        };
        let config_path = env::var("SCORING_CONFIG_PATH")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .map(PathBuf::from);

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig {
                log_level,
                format: log_format,
            },
            data: DataConfig { data_dir, cache },
            scoring: ScoringSettings {
                role_table,
                config_path,
            },
        })
    }
}

fn env_u64(var: &'static str, default: u64) -> Result<u64, ConfigError> {
    match env::var(var) {
        Ok(raw) => raw
            .trim()
            .parse::<u64>()
            .map_err(|_| ConfigError::InvalidNumber(var)),
        Err(_) => Ok(default),
    }
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
    pub format: LogFormat,
}

/// Where datasets live and how long they stay in memory.
#[derive(Debug, Clone)]
pub struct DataConfig {
    pub data_dir: PathBuf,
    pub cache: CacheConfig,
}

/// Which role-bonus table to use, optionally replaced by a JSON file.
#[derive(Debug, Clone)]
pub struct ScoringSettings {
    pub role_table: RoleTablePreset,
    pub config_path: Option<PathBuf>,
}

impl ScoringSettings {
    /// A config file, when given, takes precedence over the preset.
    pub fn build(&self) -> Result<ScoringConfig, ScoringConfigError> {
        match &self.config_path {
            Some(path) => ScoringConfig::from_json_file(path),
            None => Ok(ScoringConfig::with_preset(self.role_table)),
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidNumber(&'static str),
    ZeroCacheEntries,
    InvalidRoleTable(String),
    InvalidLogFormat(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidNumber(var) => {
                write!(f, "{var} must be a positive whole number")
            }
            ConfigError::ZeroCacheEntries => write!(f, "CACHE_MAX_ENTRIES must be at least 1"),
            ConfigError::InvalidRoleTable(value) => write!(
                f,
                "SCORING_ROLE_TABLE must be `primary` or `alternate`, got '{value}'"
            ),
            ConfigError::InvalidLogFormat(value) => write!(
                f,
                "APP_LOG_FORMAT must be `compact` or `json`, got '{value}'"
            ),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::{Mutex, OnceLock};

    fn env_guard() -> &'static Mutex<()> {
        static GUARD: OnceLock<Mutex<()>> = OnceLock::new();
        GUARD.get_or_init(|| Mutex::new(()))
    }

    fn reset_env() {
        for var in [
            "APP_ENV",
            "APP_HOST",
            "APP_PORT",
            "APP_LOG_LEVEL",
            "APP_LOG_FORMAT",
            "DATA_DIR",
            "CACHE_TTL_SECS",
            "CACHE_SWEEP_INTERVAL_SECS",
            "CACHE_MAX_ENTRIES",
            "DATA_LOAD_TIMEOUT_SECS",
            "SCORING_ROLE_TABLE",
            "SCORING_CONFIG_PATH",
        ] {
            env::remove_var(var);
        }
    }

    #[test]
    fn load_uses_defaults_when_env_missing() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        let config = AppConfig::load().expect("config loads with defaults");
        assert_eq!(config.environment, AppEnvironment::Development);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.telemetry.log_level, "info");
        assert_eq!(config.telemetry.format, LogFormat::Compact);
        assert_eq!(config.data.data_dir, PathBuf::from("data"));
        assert_eq!(config.data.cache, CacheConfig::default());
        assert_eq!(config.scoring.role_table, RoleTablePreset::Primary);
        assert!(config.scoring.config_path.is_none());
    }

    #[test]
    fn accepts_localhost_host() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_HOST", "localhost");
        let config = AppConfig::load().expect("config loads");
        let addr = config.server.socket_addr().expect("localhost resolves");
        assert_eq!(addr, SocketAddr::new(IpAddr::from([127, 0, 0, 1]), 3000));
    }

    #[test]
    fn reads_cache_and_scoring_overrides() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("CACHE_TTL_SECS", "30");
        env::set_var("CACHE_MAX_ENTRIES", "6");
        env::set_var("SCORING_ROLE_TABLE", "alternate");
        env::set_var("APP_LOG_FORMAT", "json");

        let config = AppConfig::load().expect("config loads");
        assert_eq!(config.data.cache.ttl, Duration::from_secs(30));
        assert_eq!(config.data.cache.max_entries, 6);
        assert_eq!(config.telemetry.format, LogFormat::Json);
        let scoring = config.scoring.build().expect("preset builds");
        assert_eq!(scoring.role_bonuses.committee_chair, 0.15);
        reset_env();
    }

    #[test]
    fn rejects_zero_cache_entries_and_bad_numbers() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("CACHE_MAX_ENTRIES", "0");
        assert!(matches!(
            AppConfig::load(),
            Err(ConfigError::ZeroCacheEntries)
        ));

        reset_env();
        env::set_var("CACHE_TTL_SECS", "an hour");
        let err = AppConfig::load().unwrap_err();
        assert!(err.to_string().contains("CACHE_TTL_SECS"));

        reset_env();
        env::set_var("SCORING_ROLE_TABLE", "generous");
        assert!(matches!(
            AppConfig::load(),
            Err(ConfigError::InvalidRoleTable(value)) if value == "generous"
        ));
        reset_env();
    }
}
