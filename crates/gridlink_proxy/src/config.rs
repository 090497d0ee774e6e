//! Proxy configuration loaded from environment variables.

use std::collections::HashSet;
use std::env;
use thiserror::Error;

/// Configuration errors that abort startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// `PORT` is not a valid port number.
    #[error("PORT is not a valid port number")]
    InvalidPort,
    /// A required variable is missing or empty.
    #[error("missing required environment variable {0}")]
    Missing(&'static str),
}

/// Proxy configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server host (default: 0.0.0.0)
    pub host: String,
    /// Server port (default: 8484)
    pub port: u16,
    /// Upstream platform API base URL (e.g. https://grid.example.com/api)
    pub upstream_base_url: String,
    /// Upstream API key, injected server-side and never exposed
    pub upstream_api_key: String,
    /// Document id all requests are scoped to
    pub doc_id: String,
    /// Tables the widget surface may touch at all
    pub allowed_tables: HashSet<String>,
    /// Tables whose reads/updates additionally require a record token
    pub link_tables: HashSet<String>,
    /// Signing key for record tokens (link features off when empty)
    pub link_signing_key: String,
    /// Base URL embedded in generated magic links
    pub link_base_url: String,
    /// Record token expiry in minutes (default: 1440)
    pub link_expiry_minutes: i64,
    /// Shared secret required to mint links (default: none, minting off)
    pub admin_secret: Option<String>,
    /// CORS allowed origins (comma-separated)
    pub cors_origins: Vec<String>,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let host = env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port = env::var("PORT")
            .unwrap_or_else(|_| "8484".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidPort)?;

        let upstream_base_url = required("GRIDLINK_UPSTREAM_URL")?;
        let upstream_api_key = required("GRIDLINK_UPSTREAM_API_KEY")?;
        let doc_id = required("GRIDLINK_DOC_ID")?;

        let allowed_tables: HashSet<String> = split_list(
            &env::var("GRIDLINK_TABLES").unwrap_or_default(),
        );
        if allowed_tables.is_empty() {
            return Err(ConfigError::Missing("GRIDLINK_TABLES"));
        }

        let link_tables = split_list(&env::var("GRIDLINK_LINK_TABLES").unwrap_or_default());

        let link_expiry_minutes = env::var("GRIDLINK_LINK_EXPIRY_MINUTES")
            .unwrap_or_else(|_| "1440".to_string())
            .parse()
            .unwrap_or(1440);

        let cors_origins = env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        Ok(Config {
            host,
            port,
            upstream_base_url,
            upstream_api_key,
            doc_id,
            allowed_tables,
            link_tables,
            link_signing_key: env::var("GRIDLINK_LINK_SIGNING_KEY").unwrap_or_default(),
            link_base_url: env::var("GRIDLINK_LINK_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),
            link_expiry_minutes,
            admin_secret: env::var("GRIDLINK_ADMIN_SECRET").ok().filter(|s| !s.is_empty()),
            cors_origins,
        })
    }

    /// True when record tokens can be issued and verified.
    pub fn links_configured(&self) -> bool {
        !self.link_signing_key.is_empty()
    }
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or(ConfigError::Missing(name))
}

fn split_list(raw: &str) -> HashSet<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
