//! services/api/src/config.rs
//!
//! Defines the service's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use tracing::Level;
use ully_core::Coordinates;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Which remote answers chat requests.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChatBackend {
    /// The hosted chat proxy function (rate limited per user).
    Proxy { url: String, token: Option<String> },
    /// Direct provider access with a local API key.
    Anthropic {
        api_key: String,
        model: String,
        timeout: Duration,
    },
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub log_level: Level,
    pub database_url: Option<String>,
    pub data_dir: PathBuf,
    pub chat_backend: ChatBackend,
    pub weather_base_url: String,
    pub home_location: Option<Coordinates>,
    pub camera_device: Option<String>,
    pub camera_input_format: String,
    pub capture_dir: PathBuf,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination.
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key lookup.
    pub fn from_lookup<F>(var: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // --- Server Settings ---
        let bind_address_str = var("BIND_ADDRESS").unwrap_or_else(|| "0.0.0.0:3000".to_string());
        let bind_address = bind_address_str.parse::<SocketAddr>().map_err(|e| {
            ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string())
        })?;

        let log_level_str = var("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        // --- Storage Settings ---
        let database_url = var("DATABASE_URL").filter(|url| !url.trim().is_empty());
        let data_dir = var("DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./data"));

        // --- Chat Backend ---
        let backend = var("CHAT_BACKEND").unwrap_or_else(|| "proxy".to_string());
        let chat_backend = match backend.to_lowercase().as_str() {
            "proxy" => ChatBackend::Proxy {
                url: var("CHAT_PROXY_URL")
                    .ok_or_else(|| ConfigError::MissingVar("CHAT_PROXY_URL".to_string()))?,
                token: var("CHAT_PROXY_TOKEN"),
            },
            "anthropic" => {
                let timeout_secs = match var("ANTHROPIC_TIMEOUT_SECS") {
                    Some(raw) => raw.parse::<u64>().map_err(|e| {
                        ConfigError::InvalidValue("ANTHROPIC_TIMEOUT_SECS".to_string(), e.to_string())
                    })?,
                    None => 30,
                };
                ChatBackend::Anthropic {
                    api_key: var("ANTHROPIC_API_KEY")
                        .ok_or_else(|| ConfigError::MissingVar("ANTHROPIC_API_KEY".to_string()))?,
                    model: var("ANTHROPIC_MODEL")
                        .unwrap_or_else(|| "claude-3-5-sonnet-20241022".to_string()),
                    timeout: Duration::from_secs(timeout_secs),
                }
            }
            other => {
                return Err(ConfigError::InvalidValue(
                    "CHAT_BACKEND".to_string(),
                    format!("'{}' is not one of proxy, anthropic", other),
                ))
            }
        };

        // --- Context and Device Settings ---
        let weather_base_url =
            var("WEATHER_BASE_URL").unwrap_or_else(|| "https://wttr.in".to_string());

        let home_location = match (var("ULLY_LATITUDE"), var("ULLY_LONGITUDE")) {
            (Some(lat), Some(lon)) => Some(Coordinates {
                latitude: parse_coordinate("ULLY_LATITUDE", &lat, 90.0)?,
                longitude: parse_coordinate("ULLY_LONGITUDE", &lon, 180.0)?,
            }),
            _ => None,
        };

        let camera_device = var("CAMERA_DEVICE");
        let camera_input_format = var("CAMERA_INPUT_FORMAT").unwrap_or_else(|| "v4l2".to_string());
        let capture_dir = var("CAPTURE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| data_dir.join("captures"));

        Ok(Self {
            bind_address,
            log_level,
            database_url,
            data_dir,
            chat_backend,
            weather_base_url,
            home_location,
            camera_device,
            camera_input_format,
            capture_dir,
        })
    }
}

fn parse_coordinate(name: &str, raw: &str, limit: f64) -> Result<f64, ConfigError> {
    let value = raw
        .trim()
        .parse::<f64>()
        .map_err(|e| ConfigError::InvalidValue(name.to_string(), e.to_string()))?;
    if !(-limit..=limit).contains(&value) {
        return Err(ConfigError::InvalidValue(
            name.to_string(),
            format!("{} is outside ±{}", value, limit),
        ));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn proxy_defaults() {
        let config = load(&[("CHAT_PROXY_URL", "https://example.test/chat")]).unwrap();
        assert_eq!(config.bind_address.port(), 3000);
        assert_eq!(config.log_level, Level::INFO);
        assert!(config.database_url.is_none());
        assert_eq!(config.capture_dir, PathBuf::from("./data/captures"));
        assert_eq!(config.weather_base_url, "https://wttr.in");
        assert!(config.home_location.is_none());
        assert_eq!(
            config.chat_backend,
            ChatBackend::Proxy {
                url: "https://example.test/chat".into(),
                token: None
            }
        );
    }

    #[test]
    fn proxy_requires_url() {
        assert!(matches!(load(&[]), Err(ConfigError::MissingVar(v)) if v == "CHAT_PROXY_URL"));
    }

    #[test]
    fn anthropic_backend_reads_key_and_timeout() {
        let config = load(&[
            ("CHAT_BACKEND", "anthropic"),
            ("ANTHROPIC_API_KEY", "sk-test"),
            ("ANTHROPIC_TIMEOUT_SECS", "12"),
        ])
        .unwrap();
        match config.chat_backend {
            ChatBackend::Anthropic { api_key, timeout, .. } => {
                assert_eq!(api_key, "sk-test");
                assert_eq!(timeout, Duration::from_secs(12));
            }
            other => panic!("unexpected backend {:?}", other),
        }
    }

    #[test]
    fn rejects_unknown_backend_and_bad_coordinates() {
        assert!(load(&[("CHAT_BACKEND", "carrier-pigeon")]).is_err());
        assert!(load(&[
            ("CHAT_PROXY_URL", "https://example.test/chat"),
            ("ULLY_LATITUDE", "123"),
            ("ULLY_LONGITUDE", "0"),
        ])
        .is_err());
    }

    #[test]
    fn home_location_needs_both_coordinates() {
        let config = load(&[
            ("CHAT_PROXY_URL", "https://example.test/chat"),
            ("ULLY_LATITUDE", "45.52"),
            ("ULLY_LONGITUDE", "-122.68"),
        ])
        .unwrap();
        let home = config.home_location.unwrap();
        assert_eq!(home.latitude, 45.52);

        let partial = load(&[
            ("CHAT_PROXY_URL", "https://example.test/chat"),
            ("ULLY_LATITUDE", "45.52"),
        ])
        .unwrap();
        assert!(partial.home_location.is_none());
    }
}
