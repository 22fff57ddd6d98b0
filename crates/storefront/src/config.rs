//! Storefront configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Backend
//! - `STOREFRONT_BACKEND` - `postgres` (default) or `memory`
//! - `STOREFRONT_DATABASE_URL` - `PostgreSQL` connection string, required for
//!   the `postgres` backend (falls back to `DATABASE_URL`)
//! - `STOREFRONT_CATALOG_FILE` - JSON product list loaded into the `memory`
//!   backend at startup
//!
//! ## Optional
//! - `STOREFRONT_HOST` - Bind address (default: 127.0.0.1)
//! - `STOREFRONT_PORT` - Listen port (default: 3000)
//! - `STOREFRONT_BASE_URL` - Public URL (default: `http://localhost:3000`);
//!   `https` enables secure cookies
//! - `STOREFRONT_CACHE_TTL_SECS` - Cart/favorites cache TTL (default: 60)
//! - `STOREFRONT_RECENTLY_VIEWED_LIMIT` - Recently viewed cap (default: 12)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name
//! - `SENTRY_SAMPLE_RATE` - Error sample rate, 0.0 to 1.0 (default: 1.0)
//! - `SENTRY_TRACES_SAMPLE_RATE` - Trace sample rate, 0.0 to 1.0 (default: 0.1)

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use secrecy::SecretString;
use thiserror::Error;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Where remote rows are stored.
#[derive(Debug, Clone)]
pub enum Backend {
    /// `PostgreSQL` tables and session store.
    Postgres { database_url: SecretString },
    /// In-process store, optionally seeded from a JSON catalog.
    Memory { catalog: Option<PathBuf> },
}

impl Backend {
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Postgres { .. } => "postgres",
            Self::Memory { .. } => "memory",
        }
    }
}

/// Sentry settings.
#[derive(Debug, Clone)]
pub struct SentryConfig {
    pub dsn: String,
    pub environment: Option<String>,
    pub sample_rate: f32,
    pub traces_sample_rate: f32,
}

/// Storefront application configuration.
#[derive(Debug, Clone)]
pub struct StorefrontConfig {
    /// Remote store backend
    pub backend: Backend,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL for the storefront
    pub base_url: String,
    /// Lifetime of cached carts and favorite lists
    pub cache_ttl: Duration,
    /// Maximum length of the recently viewed list
    pub recently_viewed_limit: usize,
    /// Sentry error tracking, when a DSN is set
    pub sentry: Option<SentryConfig>,
}

impl StorefrontConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable source.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let env = Env(lookup);

        let backend = match env.or_default("STOREFRONT_BACKEND", "postgres").as_str() {
            "postgres" => Backend::Postgres {
                database_url: env
                    .get("STOREFRONT_DATABASE_URL")
                    .or_else(|| env.get("DATABASE_URL"))
                    .map(SecretString::from)
                    .ok_or_else(|| {
                        ConfigError::MissingEnvVar("STOREFRONT_DATABASE_URL".to_string())
                    })?,
            },
            "memory" => Backend::Memory {
                catalog: env.get("STOREFRONT_CATALOG_FILE").map(PathBuf::from),
            },
            other => {
                return Err(ConfigError::InvalidEnvVar(
                    "STOREFRONT_BACKEND".to_string(),
                    format!("unknown backend '{other}' (expected postgres or memory)"),
                ));
            }
        };

        let sentry = match env.get("SENTRY_DSN") {
            Some(dsn) => Some(SentryConfig {
                dsn,
                environment: env.get("SENTRY_ENVIRONMENT"),
                sample_rate: env.parse_rate("SENTRY_SAMPLE_RATE", 1.0)?,
                traces_sample_rate: env.parse_rate("SENTRY_TRACES_SAMPLE_RATE", 0.1)?,
            }),
            None => None,
        };

        Ok(Self {
            backend,
            host: env.parse_or("STOREFRONT_HOST", "127.0.0.1")?,
            port: env.parse_or("STOREFRONT_PORT", "3000")?,
            base_url: env.or_default("STOREFRONT_BASE_URL", "http://localhost:3000"),
            cache_ttl: Duration::from_secs(env.parse_or("STOREFRONT_CACHE_TTL_SECS", "60")?),
            recently_viewed_limit: env.parse_or("STOREFRONT_RECENTLY_VIEWED_LIMIT", "12")?,
            sentry,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Whether cookies should carry the `Secure` attribute.
    #[must_use]
    pub fn is_secure(&self) -> bool {
        self.base_url.starts_with("https://")
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

struct Env<F>(F);

impl<F: Fn(&str) -> Option<String>> Env<F> {
    fn get(&self, key: &str) -> Option<String> {
        (self.0)(key).filter(|v| !v.is_empty())
    }

    fn or_default(&self, key: &str, default: &str) -> String {
        self.get(key).unwrap_or_else(|| default.to_string())
    }

    fn parse_or<T>(&self, key: &str, default: &str) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        self.or_default(key, default)
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
    }

    fn parse_rate(&self, key: &str, default: f32) -> Result<f32, ConfigError> {
        let Some(raw) = self.get(key) else {
            return Ok(default);
        };
        raw.parse::<f32>()
            .ok()
            .filter(|rate| (0.0..=1.0).contains(rate))
            .ok_or_else(|| {
                ConfigError::InvalidEnvVar(key.to_string(), format!("'{raw}' is not in 0.0..=1.0"))
            })
    }
}
