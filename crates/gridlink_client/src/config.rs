//! Client configuration loaded from environment variables.
//!
//! Everything here is an opaque string validated for presence only; a
//! missing proxy URL simply removes the REST mode from the probe order.

use std::env;

/// Access level requested from the host on `ready`.
pub const DEFAULT_REQUIRED_ACCESS: &str = "full";

/// Widget-side configuration.
#[derive(Debug, Clone, Default)]
pub struct ClientConfig {
    /// REST proxy base URL; absence disables REST mode.
    pub proxy_base_url: Option<String>,
    /// Magic-link record token sent as a bearer header in REST mode.
    pub link_token: Option<String>,
    /// Endpoint pinged (fire-and-forget) after a successful create.
    pub notify_url: Option<String>,
    /// Access level requested from the host (default: `full`).
    pub required_access: String,
}

impl ClientConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        ClientConfig {
            proxy_base_url: non_empty(env::var("GRIDLINK_PROXY_URL").ok()),
            link_token: non_empty(env::var("GRIDLINK_LINK_TOKEN").ok()),
            notify_url: non_empty(env::var("GRIDLINK_NOTIFY_URL").ok()),
            required_access: env::var("GRIDLINK_REQUIRED_ACCESS")
                .unwrap_or_else(|_| DEFAULT_REQUIRED_ACCESS.to_string()),
        }
    }

    /// Configuration with just a proxy URL (tests, embedding code).
    pub fn with_proxy(base_url: impl Into<String>) -> Self {
        ClientConfig {
            proxy_base_url: Some(base_url.into()),
            required_access: DEFAULT_REQUIRED_ACCESS.to_string(),
            ..ClientConfig::default()
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_proxy() {
        let config = ClientConfig::with_proxy("http://localhost:8484");
        assert_eq!(
            config.proxy_base_url.as_deref(),
            Some("http://localhost:8484")
        );
        assert_eq!(config.required_access, "full");
        assert!(config.link_token.is_none());
    }

    #[test]
    fn test_non_empty() {
        assert_eq!(non_empty(Some("  ".to_string())), None);
        assert_eq!(non_empty(Some("x".to_string())), Some("x".to_string()));
        assert_eq!(non_empty(None), None);
    }
}
