//! Application configuration from environment variables.
//!
//! Load configuration using `Config::from_env()` after calling `dotenvy::dotenv()`.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_API_URL: &str = "http://127.0.0.1:3000";
const DEFAULT_SERVER_ADDR: ([u8; 4], u16) = ([127, 0, 0, 1], 3000);
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;
const DEFAULT_JWT_EXPIRATION_HOURS: i64 = 24;

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{key} must be {expected}, got {value:?}")]
    Invalid {
        key: &'static str,
        expected: &'static str,
        value: String,
    },
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the auth API the client talks to
    /// Example: http://127.0.0.1:3000
    pub api_url: String,

    /// Directory holding the persisted session; in-memory when absent
    pub session_dir: Option<PathBuf>,

    /// Per-request timeout for auth API calls
    pub request_timeout: Duration,

    /// Address the development auth API binds to
    pub server_addr: SocketAddr,

    /// Secret for signing session tokens
    /// Should be a long random string in production
    pub jwt_secret: Option<String>,

    /// Session token lifetime in hours
    pub jwt_expiration_hours: i64,

    /// Seed the demo consumer/farmer/admin accounts on startup
    pub seed_demo_accounts: bool,

    /// Artificial delay added by the in-process API
    pub mock_latency: Duration,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Call `dotenvy::dotenv()` before this to load from `.env` file.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let server_addr = match lookup("AGRIMARKET_SERVER_ADDR") {
            Some(value) => value.parse::<SocketAddr>().map_err(|_| ConfigError::Invalid {
                key: "AGRIMARKET_SERVER_ADDR",
                expected: "a socket address",
                value,
            })?,
            None => defaults.server_addr,
        };

        let request_timeout = parse_number(&lookup, "AGRIMARKET_REQUEST_TIMEOUT_SECS")?
            .map(Duration::from_secs)
            .unwrap_or(defaults.request_timeout);

        let mock_latency = parse_number(&lookup, "AGRIMARKET_MOCK_LATENCY_MS")?
            .map(Duration::from_millis)
            .unwrap_or(defaults.mock_latency);

        let jwt_expiration_hours = match parse_number(&lookup, "JWT_EXPIRATION_HOURS")? {
            Some(hours) => i64::try_from(hours).map_err(|_| ConfigError::Invalid {
                key: "JWT_EXPIRATION_HOURS",
                expected: "a number of hours",
                value: hours.to_string(),
            })?,
            None => defaults.jwt_expiration_hours,
        };

        let seed_demo_accounts = match lookup("AGRIMARKET_SEED_DEMO") {
            Some(value) => parse_bool(&value).ok_or(ConfigError::Invalid {
                key: "AGRIMARKET_SEED_DEMO",
                expected: "a boolean",
                value,
            })?,
            None => defaults.seed_demo_accounts,
        };

        Ok(Self {
            api_url: lookup("AGRIMARKET_API_URL").unwrap_or(defaults.api_url),
            session_dir: lookup("AGRIMARKET_SESSION_DIR").map(PathBuf::from),
            request_timeout,
            server_addr,
            jwt_secret: lookup("JWT_SECRET"),
            jwt_expiration_hours,
            seed_demo_accounts,
            mock_latency,
        })
    }

    /// Check if a session directory is configured
    pub fn has_session_dir(&self) -> bool {
        self.session_dir.is_some()
    }

    /// Check if a signing secret is configured
    pub fn has_jwt_secret(&self) -> bool {
        self.jwt_secret.is_some()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            session_dir: None,
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            server_addr: SocketAddr::from(DEFAULT_SERVER_ADDR),
            jwt_secret: None,
            jwt_expiration_hours: DEFAULT_JWT_EXPIRATION_HOURS,
            seed_demo_accounts: true,
            mock_latency: Duration::ZERO,
        }
    }
}

fn parse_number(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
) -> Result<Option<u64>, ConfigError> {
    lookup(key)
        .map(|value| {
            value.trim().parse::<u64>().map_err(|_| ConfigError::Invalid {
                key,
                expected: "a non-negative integer",
                value,
            })
        })
        .transpose()
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
