use std::net::SocketAddr;
use std::path::PathBuf;

use chrono::{FixedOffset, Offset, Utc};
use thiserror::Error;

/// Application-level constants
pub const APP_NAME: &str = "Clinica";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8080";
const DEFAULT_PUBLIC_URL: &str = "http://localhost:8080";
const DEFAULT_SESSION_TTL_HOURS: i64 = 12;

/// Default `tracing` filter when `RUST_LOG` is unset.
pub fn default_log_filter() -> &'static str {
    "clinica_lib=info,clinica=info,tower_http=warn"
}

/// Get the application data directory
/// ~/Clinica/ on all platforms
pub fn app_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },
}

/// Runtime configuration, read from `CLINICA_*` environment variables.
#[derive(Debug, Clone)]
pub struct ClinicConfig {
    pub data_dir: PathBuf,
    pub bind_addr: SocketAddr,
    /// Clinic wall-clock offset used for calendar days and message dates.
    pub utc_offset: FixedOffset,
    /// Base URL placed in password reset links.
    pub public_url: String,
    pub session_ttl_hours: i64,
}

impl ClinicConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup (env in production, a map in tests).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let data_dir = lookup("CLINICA_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(app_data_dir);

        let bind_raw = lookup("CLINICA_BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.into());
        let bind_addr: SocketAddr = bind_raw.parse().map_err(|_| ConfigError::Invalid {
            key: "CLINICA_BIND_ADDR",
            value: bind_raw.clone(),
        })?;

        let utc_offset = match lookup("CLINICA_UTC_OFFSET_MINUTES") {
            Some(raw) => raw
                .trim()
                .parse::<i32>()
                .ok()
                .and_then(|minutes| FixedOffset::east_opt(minutes * 60))
                .ok_or(ConfigError::Invalid {
                    key: "CLINICA_UTC_OFFSET_MINUTES",
                    value: raw,
                })?,
            None => Utc.fix(),
        };

        let public_url = lookup("CLINICA_PUBLIC_URL")
            .unwrap_or_else(|| DEFAULT_PUBLIC_URL.into())
            .trim_end_matches('/')
            .to_string();

        let session_ttl_hours = match lookup("CLINICA_SESSION_TTL_HOURS") {
            Some(raw) => raw
                .trim()
                .parse::<i64>()
                .ok()
                .filter(|h| *h > 0)
                .ok_or(ConfigError::Invalid {
                    key: "CLINICA_SESSION_TTL_HOURS",
                    value: raw,
                })?,
            None => DEFAULT_SESSION_TTL_HOURS,
        };

        Ok(Self {
            data_dir,
            bind_addr,
            utc_offset,
            public_url,
            session_ttl_hours,
        })
    }

    /// Path of the SQLite database file.
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join("clinica.db")
    }
}
