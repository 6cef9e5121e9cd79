//! Configuration management for the client core.

use crate::{CoreError, CoreResult, Paths};
use serde::{Deserialize, Serialize};
use std::path::Path;
use url::Url;

/// Default Session Store URL (can be overridden at compile time via FIGURA_API_URL).
pub const DEFAULT_API_URL: &str = match option_env!("FIGURA_API_URL") {
    Some(url) => url,
    None => "https://figura.supabase.co",
};

/// Default publishable API key (public, safe to ship in the client; overridable
/// at compile time via FIGURA_PUBLISHABLE_KEY).
pub const DEFAULT_PUBLISHABLE_KEY: &str = match option_env!("FIGURA_PUBLISHABLE_KEY") {
    Some(key) => key,
    None => "figura-publishable-key",
};

/// Default web app URL, used for email-verification redirects and the OAuth
/// return address (overridable at compile time via FIGURA_WEB_APP_URL).
pub const DEFAULT_WEB_APP_URL: &str = match option_env!("FIGURA_WEB_APP_URL") {
    Some(url) => url,
    None => "https://figura.studio",
};

/// Default log level.
const DEFAULT_LOG_LEVEL: &str = "info";

/// Main client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
    /// Session Store project URL.
    #[serde(default = "default_api_url")]
    pub api_url: String,
    /// Publishable API key (public, safe to expose).
    #[serde(default = "default_publishable_key")]
    pub publishable_key: String,
    /// Web app URL used to build redirect addresses.
    #[serde(default = "default_web_app_url")]
    pub web_app_url: String,
}

fn default_api_url() -> String {
    DEFAULT_API_URL.to_string()
}

fn default_publishable_key() -> String {
    DEFAULT_PUBLISHABLE_KEY.to_string()
}

fn default_web_app_url() -> String {
    DEFAULT_WEB_APP_URL.to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            api_url: DEFAULT_API_URL.to_string(),
            publishable_key: DEFAULT_PUBLISHABLE_KEY.to_string(),
            web_app_url: DEFAULT_WEB_APP_URL.to_string(),
        }
    }
}

impl Config {
    /// Create a new Config with default values, then override from environment.
    pub fn new() -> Self {
        let mut config = Self::default();
        config.load_from_env();
        config
    }

    /// Load configuration from a file, falling back to defaults.
    /// Note: api_url, publishable_key, and web_app_url are compile-time only
    /// and always use the built-in defaults, regardless of the config file.
    pub fn load(paths: &Paths) -> CoreResult<Self> {
        let config_path = paths.config_file();

        let mut config = if config_path.exists() {
            Self::load_from_file(&config_path)?
        } else {
            Self::default()
        };

        // Force compile-time values (never from config file)
        config.api_url = DEFAULT_API_URL.to_string();
        config.publishable_key = DEFAULT_PUBLISHABLE_KEY.to_string();
        config.web_app_url = DEFAULT_WEB_APP_URL.to_string();

        // Environment variables can only override log_level
        config.load_from_env();

        Ok(config)
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: &Path) -> CoreResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a file.
    pub fn save(&self, paths: &Paths) -> CoreResult<()> {
        paths.ensure_dirs()?;
        let config_path = paths.config_file();
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(config_path, content)?;
        Ok(())
    }

    /// Override configuration from environment variables.
    fn load_from_env(&mut self) {
        if let Ok(log_level) = std::env::var("FIGURA_LOG_LEVEL") {
            self.log_level = log_level;
        }
    }

    /// Get the Session Store URL as a parsed URL.
    pub fn api_url(&self) -> CoreResult<Url> {
        Url::parse(&self.api_url).map_err(CoreError::from)
    }

    /// The route users land on to authenticate.
    pub fn auth_entry_url(&self) -> String {
        format!("{}/auth", self.web_app_url.trim_end_matches('/'))
    }

    /// The address OAuth and verification emails redirect back to.
    pub fn auth_redirect_url(&self) -> String {
        format!("{}/auth/callback", self.web_app_url.trim_end_matches('/'))
    }
}
