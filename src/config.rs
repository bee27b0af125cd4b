// Service configuration
// Loaded once at startup from an optional TOML file overlaid with
// CATALOG_-prefixed environment variables (environment wins).

use figment::Figment;
use figment::providers::{Env, Format, Toml};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] Box<figment::Error>),

    #[error("Invalid configuration for {key}: {reason}")]
    Invalid { key: String, reason: String },
}

impl ConfigError {
    fn invalid(key: &str, reason: &str) -> Self {
        Self::Invalid {
            key: key.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Top-level configuration tree.
///
/// Every field without a serde default is required; startup fails before any
/// socket is bound when one is missing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    pub session: SessionConfig,

    pub oidc: OidcConfig,

    pub groups: GroupsConfig,

    pub database: DatabaseConfig,

    /// Origin of the browser front-end, used for CORS and post-login
    /// redirects (no trailing slash).
    pub frontend_url: String,

    /// Enables the `/auth/debug/session` diagnostic route.
    #[serde(default)]
    pub debug: bool,
}

impl Config {
    /// Load configuration from a TOML file (if given) and the environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut figment = Figment::new();
        if let Some(path) = path {
            figment = figment.merge(Toml::file(path));
        }
        let config: Config = figment
            .merge(Env::prefixed("CATALOG_").split("__"))
            .extract()
            .map_err(Box::new)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.session.validate()?;
        self.oidc.validate()?;
        self.groups.validate()?;
        self.database.validate()?;

        if self.frontend_url.is_empty() {
            return Err(ConfigError::invalid("frontend_url", "cannot be empty"));
        }
        if !is_http_url(&self.frontend_url) {
            return Err(ConfigError::invalid(
                "frontend_url",
                "must start with http:// or https://",
            ));
        }

        Ok(())
    }
}

/// Listen address settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|_| ConfigError::invalid("server.host", "not a valid bind address"))
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Session cookie settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Secret the cookie sealing key is derived from (minimum 32 characters).
    pub secret: String,

    /// Cookie name presented to the browser.
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,

    /// Cookie lifetime in seconds (default: 24 hours).
    #[serde(default = "default_session_max_age")]
    pub max_age_secs: u64,

    /// Secure flag (HTTPS only), should be true in production.
    #[serde(default)]
    pub secure: bool,
}

impl SessionConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.secret.len() < 32 {
            return Err(ConfigError::invalid(
                "session.secret",
                "must be at least 32 characters",
            ));
        }
        if self.cookie_name.is_empty() {
            return Err(ConfigError::invalid("session.cookie_name", "cannot be empty"));
        }
        if self.max_age_secs < 60 {
            return Err(ConfigError::invalid(
                "session.max_age_secs",
                "must be at least 60 seconds",
            ));
        }
        if self.max_age_secs > 86400 * 7 {
            return Err(ConfigError::invalid(
                "session.max_age_secs",
                "must not exceed 7 days",
            ));
        }
        Ok(())
    }

    pub fn max_age(&self) -> time::Duration {
        time::Duration::seconds(self.max_age_secs as i64)
    }
}

/// Identity provider settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OidcConfig {
    pub client_id: String,

    pub client_secret: String,

    /// Issuer URL; the discovery document is fetched from
    /// `{issuer_url}/.well-known/openid-configuration` at startup.
    pub issuer_url: String,

    /// Redirect URI registered with the provider, pointing at
    /// `/auth/callback` on this service.
    pub redirect_uri: String,

    /// Provider single-logout URL returned to the front-end on logout.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logout_url: Option<String>,

    #[serde(default = "default_scopes")]
    pub scopes: Vec<String>,
}

impl OidcConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.client_id.is_empty() {
            return Err(ConfigError::invalid("oidc.client_id", "cannot be empty"));
        }
        if self.client_secret.is_empty() {
            return Err(ConfigError::invalid("oidc.client_secret", "cannot be empty"));
        }
        if !is_http_url(&self.issuer_url) {
            return Err(ConfigError::invalid(
                "oidc.issuer_url",
                "must start with http:// or https://",
            ));
        }
        if !is_http_url(&self.redirect_uri) {
            return Err(ConfigError::invalid(
                "oidc.redirect_uri",
                "must start with http:// or https://",
            ));
        }
        Ok(())
    }
}

/// Group directory settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupsConfig {
    /// Base URL of the membership directory service.
    pub directory_url: String,

    /// Lookup timeout in seconds.
    #[serde(default = "default_groups_timeout")]
    pub timeout_secs: u64,
}

impl GroupsConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if !is_http_url(&self.directory_url) {
            return Err(ConfigError::invalid(
                "groups.directory_url",
                "must start with http:// or https://",
            ));
        }
        Ok(())
    }
}

/// Database pool settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    #[serde(default = "default_acquire_timeout")]
    pub acquire_timeout_secs: u64,
}

impl DatabaseConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.url.is_empty() {
            return Err(ConfigError::invalid("database.url", "cannot be empty"));
        }
        if self.max_connections == 0 {
            return Err(ConfigError::invalid(
                "database.max_connections",
                "must be at least 1",
            ));
        }
        Ok(())
    }
}

fn is_http_url(value: &str) -> bool {
    value.starts_with("http://") || value.starts_with("https://")
}

// Default value functions
fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_cookie_name() -> String {
    "session".to_string()
}

fn default_session_max_age() -> u64 {
    86400 // 24 hours
}

fn default_scopes() -> Vec<String> {
    vec![
        "openid".to_string(),
        "email".to_string(),
        "profile".to_string(),
    ]
}

fn default_groups_timeout() -> u64 {
    10
}

fn default_max_connections() -> u32 {
    5
}

fn default_acquire_timeout() -> u64 {
    2
}
