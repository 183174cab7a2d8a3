use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use crate::workflows::application::domain::Language;

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
    pub intake: IntakeConfig,
}

const DEFAULT_DEBOUNCE_MS: u64 = 800;
const DEFAULT_IMMEDIATE_FIELDS: &[&str] = &["intake", "destinations"];

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
        let log_format = LogFormat::from_str(
            &env::var("APP_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string()),
        );

        let raw_language =
            env::var("APP_DEFAULT_DOCUMENT_LANGUAGE").unwrap_or_else(|_| "en".to_string());
        let default_document_language = raw_language
            .parse::<Language>()
            .map_err(|_| ConfigError::InvalidLanguage(raw_language.clone()))?;

        let save_debounce_ms = match env::var("APP_SAVE_DEBOUNCE_MS") {
            Ok(raw) => raw
                .trim()
                .parse::<u64>()
                .map_err(|_| ConfigError::InvalidDebounce(raw.clone()))?,
            Err(_) => DEFAULT_DEBOUNCE_MS,
        };

        let immediate_fields = match env::var("APP_IMMEDIATE_FIELDS") {
            Ok(raw) => raw
                .split(',')
                .map(str::trim)
                .filter(|field| !field.is_empty())
                .map(str::to_string)
                .collect(),
            Err(_) => IntakeConfig::default_immediate_fields(),
        };

        let checkpoint_dir = env::var("APP_CHECKPOINT_DIR")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .map(PathBuf::from);
        let document_catalog_csv = env::var("APP_DOCUMENT_CATALOG_CSV")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .map(PathBuf::from);

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig {
                log_level,
                log_format,
            },
            intake: IntakeConfig {
                default_document_language,
                save_debounce_ms,
                immediate_fields,
                checkpoint_dir,
                document_catalog_csv,
            },
        })
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

/// Tracing and metrics controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
    pub log_format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Compact,
    Pretty,
}

impl LogFormat {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "pretty" => Self::Pretty,
            _ => Self::Compact,
        }
    }
}

/// Knobs for the application intake engine.
#[derive(Debug, Clone)]
pub struct IntakeConfig {
    /// Language required for documents when a destination has no explicit policy.
    pub default_document_language: Language,
    /// Trailing-edge debounce window for continuous text edits.
    pub save_debounce_ms: u64,
    /// Fields dispatched immediately instead of being coalesced.
    pub immediate_fields: Vec<String>,
    pub checkpoint_dir: Option<PathBuf>,
    pub document_catalog_csv: Option<PathBuf>,
}

impl IntakeConfig {
    fn default_immediate_fields() -> Vec<String> {
        DEFAULT_IMMEDIATE_FIELDS
            .iter()
            .map(|field| field.to_string())
            .collect()
    }

    pub fn debounce_window(&self) -> chrono::Duration {
        chrono::Duration::milliseconds(self.save_debounce_ms.min(i64::MAX as u64) as i64)
    }
}

impl Default for IntakeConfig {
    fn default() -> Self {
        Self {
            default_document_language: Language::english(),
            save_debounce_ms: DEFAULT_DEBOUNCE_MS,
            immediate_fields: Self::default_immediate_fields(),
            checkpoint_dir: None,
            document_catalog_csv: None,
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidLanguage(String),
    InvalidDebounce(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidLanguage(value) => write!(
                f,
                "APP_DEFAULT_DOCUMENT_LANGUAGE '{}' is not a recognised language",
                value
            ),
            ConfigError::InvalidDebounce(value) => write!(
                f,
                "APP_SAVE_DEBOUNCE_MS '{}' must be a whole number of milliseconds",
                value
            ),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            ConfigError::InvalidPort
            | ConfigError::InvalidLanguage(_)
            | ConfigError::InvalidDebounce(_) => None,
        }
    }
}
