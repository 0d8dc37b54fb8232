//! Configuration management for Promocast

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{ConfigError, Result};
use crate::types::Platform;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub oauth: OAuthConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Timeout in seconds applied to every outbound platform call.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Frontend URL the OAuth callback redirects to after completion.
    #[serde(default = "default_frontend_url")]
    pub frontend_url: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            frontend_url: default_frontend_url(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_frontend_url() -> String {
    "http://localhost:5173".to_string()
}

/// Per-platform OAuth client registrations. A platform with no section
/// here cannot begin an authorization flow.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OAuthConfig {
    pub x: Option<ProviderConfig>,
    pub tiktok: Option<ProviderConfig>,
    pub facebook: Option<ProviderConfig>,
}

impl OAuthConfig {
    pub fn provider(&self, platform: Platform) -> Option<&ProviderConfig> {
        match platform {
            Platform::X => self.x.as_ref(),
            Platform::Tiktok => self.tiktok.as_ref(),
            Platform::Facebook => self.facebook.as_ref(),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    #[serde(default)]
    pub scopes: Vec<String>,
    /// Endpoint overrides, mainly for tests; platform defaults apply
    /// when unset.
    pub authorize_url: Option<String>,
    pub token_url: Option<String>,
    pub userinfo_url: Option<String>,
}

impl Config {
    /// Load configuration from the default location
    pub fn load() -> Result<Self> {
        let config_path = resolve_config_path()?;
        Self::load_from_path(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &PathBuf) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadError)?;
        let config: Config = toml::from_str(&content).map_err(ConfigError::ParseError)?;
        Ok(config)
    }

    /// Create a default configuration
    pub fn default_config() -> Self {
        Self {
            database: DatabaseConfig {
                path: "~/.local/share/promocast/promocast.db".to_string(),
            },
            http: HttpConfig::default(),
            oauth: OAuthConfig::default(),
        }
    }
}

/// Resolve the configuration file path following XDG Base Directory spec
pub fn resolve_config_path() -> Result<PathBuf> {
    if let Ok(path) = std::env::var("PROMOCAST_CONFIG") {
        return Ok(PathBuf::from(shellexpand::tilde(&path).to_string()));
    }

    let config_dir = dirs::config_dir()
        .ok_or_else(|| ConfigError::MissingField("config directory".to_string()))?;

    Ok(config_dir.join("promocast").join("config.toml"))
}
