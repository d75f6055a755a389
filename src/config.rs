//! Application configuration persistence
//!
//! Stores endpoint overrides and token tuning in ~/.config/tubeport/config.json.
//! Every field has a default, so a missing or partial file is fine.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use crate::auth::TokenCache;
use crate::platform::Visibility;

pub const SPOTIFY_API_URL: &str = "https://api.spotify.com/v1";
pub const SPOTIFY_TOKEN_URL: &str = "https://accounts.spotify.com/api/token";
pub const YOUTUBE_API_URL: &str = "https://www.googleapis.com/youtube/v3";
pub const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub spotify_api_url: String,
    pub spotify_token_url: String,
    pub youtube_api_url: String,
    pub google_token_url: String,
    /// How long a resolved access token is reused before the store is re-read
    pub token_cache_ttl_secs: u64,
    /// Tokens this close to expiry are refreshed early
    pub expiry_buffer_secs: i64,
    pub default_visibility: Visibility,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            spotify_api_url: SPOTIFY_API_URL.to_string(),
            spotify_token_url: SPOTIFY_TOKEN_URL.to_string(),
            youtube_api_url: YOUTUBE_API_URL.to_string(),
            google_token_url: GOOGLE_TOKEN_URL.to_string(),
            token_cache_ttl_secs: TokenCache::DEFAULT_TTL.as_secs(),
            expiry_buffer_secs: TokenCache::DEFAULT_EXPIRY_BUFFER_SECS,
            default_visibility: Visibility::Private,
        }
    }
}

impl AppConfig {
    /// Load the config from the default location
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("No config found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {:?}", path))?;

        let config: Self = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse config at {:?}", path))?;

        config.validate()?;
        debug!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Save the config to the default location
    pub fn save(&self) -> Result<PathBuf> {
        let path = Self::config_path()?;
        self.save_to(&path)?;
        Ok(path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        self.validate()?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory {:?}", parent))?;
        }

        let contents = serde_json::to_string_pretty(self).context("Failed to serialize config")?;

        fs::write(path, contents)
            .with_context(|| format!("Failed to write config to {:?}", path))?;

        debug!("Saved config to {:?}", path);
        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;
        Ok(config_dir.join("tubeport").join("config.json"))
    }

    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("spotify_api_url", &self.spotify_api_url),
            ("spotify_token_url", &self.spotify_token_url),
            ("youtube_api_url", &self.youtube_api_url),
            ("google_token_url", &self.google_token_url),
        ] {
            let url = url::Url::parse(value)
                .with_context(|| format!("Invalid {} '{}'", name, value))?;
            if !matches!(url.scheme(), "http" | "https") {
                anyhow::bail!("Invalid {} '{}': expected an http(s) URL", name, value);
            }
        }

        if self.expiry_buffer_secs < 0 {
            anyhow::bail!("expiry_buffer_secs must not be negative");
        }

        Ok(())
    }

    pub fn token_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.token_cache_ttl_secs)
    }

    pub fn expiry_buffer(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.expiry_buffer_secs)
    }
}
