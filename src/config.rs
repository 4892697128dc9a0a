use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Application-level constants
pub const APP_NAME: &str = "MedTrack";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

pub const DEFAULT_BIND: &str = "127.0.0.1:8080";
pub const DEFAULT_SESSION_TTL_SECS: u64 = 8 * 60 * 60;

const ENV_BIND: &str = "MEDTRACK_BIND";
const ENV_DB: &str = "MEDTRACK_DB";
const ENV_SESSION_TTL: &str = "MEDTRACK_SESSION_TTL_SECS";
const ENV_SEED_DEMO: &str = "MEDTRACK_SEED_DEMO";

/// Get the application data directory
/// ~/MedTrack/ on all platforms. Falls back to the working directory when
/// no home directory can be determined.
pub fn app_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
}

/// Default database file
pub fn default_db_path() -> PathBuf {
    app_data_dir().join("medtrack.db")
}

/// Log filter used when `RUST_LOG` is unset.
pub fn default_log_filter() -> &'static str {
    "info,medtrack=debug,medtrack_lib=debug,tower_http=info"
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {var}: {value}")]
    InvalidValue { var: &'static str, value: String },
}

/// Runtime settings resolved from the environment.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind: SocketAddr,
    pub db_path: PathBuf,
    pub session_ttl: Duration,
    pub seed_demo: bool,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolve settings through an arbitrary lookup (tests pass a map).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let bind_raw = lookup(ENV_BIND).unwrap_or_else(|| DEFAULT_BIND.to_string());
        let bind = bind_raw.parse().map_err(|_| ConfigError::InvalidValue {
            var: ENV_BIND,
            value: bind_raw.clone(),
        })?;

        let db_path = lookup(ENV_DB)
            .filter(|p| !p.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(default_db_path);

        let session_ttl = match lookup(ENV_SESSION_TTL) {
            Some(raw) => {
                let secs: u64 = raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
                    var: ENV_SESSION_TTL,
                    value: raw.clone(),
                })?;
                Duration::from_secs(secs)
            }
            None => Duration::from_secs(DEFAULT_SESSION_TTL_SECS),
        };

        let seed_demo = match lookup(ENV_SEED_DEMO) {
            Some(raw) => parse_flag(&raw).ok_or(ConfigError::InvalidValue {
                var: ENV_SEED_DEMO,
                value: raw,
            })?,
            None => false,
        };

        Ok(Self {
            bind,
            db_path,
            session_ttl,
            seed_demo,
        })
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}
