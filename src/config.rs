//! Configuration file parser for ~/.config/newsroll/config.toml.
//!
//! The config file is optional; a missing file yields `Config::default()`.
//! Unknown keys are silently ignored by serde (with `deny_unknown_fields` off),
//! though we log a warning when the file contains potential typos.
use secrecy::SecretString;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use url::Url;

use crate::feed::SourceSettings;
use crate::loader::LoaderConfig;
use crate::util::validate_url;

/// Environment variable holding the upstream API key. Takes precedence over the file.
pub const API_KEY_ENV: &str = "NEWSROLL_API_KEY";

const DEFAULT_PRIMARY_ENDPOINT: &str = "https://api.nytimes.com/svc/topstories/v2/science.json";
const DEFAULT_SECONDARY_ENDPOINT: &str = "https://api.nytimes.com/svc/news/v3/content/all/all.json";
const DEFAULT_IMAGE_BASE_URL: &str = "https://static01.nyt.com/";
const DEFAULT_PLACEHOLDER_IMAGE: &str = "assets/images/01.jpg";

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// Config file exceeds maximum allowed size.
    #[error("Config file too large: {0}")]
    TooLarge(String),

    /// A source endpoint or image base is not an absolute HTTP(S) URL.
    #[error("Invalid {field} URL: {value}")]
    InvalidUrl { field: &'static str, value: String },
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Per-source overrides from the `[primary]` / `[secondary]` tables.
///
/// Every key is optional; anything left out falls back to the built-in
/// default for that particular source.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SourceOverrides {
    pub endpoint: Option<String>,
    pub image_base_url: Option<String>,
    pub default_section: Option<String>,
    pub cache_key: Option<String>,
}

/// Top-level application configuration.
///
/// All fields use `#[serde(default)]` so any subset of keys can be specified.
/// Missing keys fall back to `Default::default()`.
///
/// Custom Debug impl masks `api_key`.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Upstream API key (alternative to the NEWSROLL_API_KEY env var).
    pub api_key: Option<String>,

    /// Items served per trigger.
    pub page_size: usize,

    /// Minutes a cached upstream payload stays fresh.
    pub cache_ttl_minutes: u64,

    /// Quiet period before a burst of scroll events becomes one trigger.
    pub debounce_ms: u64,

    /// Pixels from the bottom at which a scroll position counts as "near bottom".
    pub scroll_threshold: u32,

    /// Image shown when an item has no usable media, and on image load errors.
    pub placeholder_image: String,

    pub primary: SourceOverrides,
    pub secondary: SourceOverrides,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: None,
            page_size: 5,
            cache_ttl_minutes: 60,
            debounce_ms: 200,
            scroll_threshold: 50,
            placeholder_image: DEFAULT_PLACEHOLDER_IMAGE.to_string(),
            primary: SourceOverrides::default(),
            secondary: SourceOverrides::default(),
        }
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("page_size", &self.page_size)
            .field("cache_ttl_minutes", &self.cache_ttl_minutes)
            .field("debounce_ms", &self.debounce_ms)
            .field("scroll_threshold", &self.scroll_threshold)
            .field("placeholder_image", &self.placeholder_image)
            .field("primary", &self.primary)
            .field("secondary", &self.secondary)
            .finish()
    }
}

impl Config {
    /// Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Unknown keys → silently accepted (serde default behavior), logged as warning
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // File deleted between metadata and read
                tracing::debug!(path = %path.display(), "Config file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        Self::from_toml(&content)
    }

    /// Parse configuration from TOML text. Blank input yields the defaults.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        if content.trim().is_empty() {
            tracing::debug!("Config file is empty, using defaults");
            return Ok(Self::default());
        }

        if let Ok(raw) = content.parse::<toml::Table>() {
            let known_keys = [
                "api_key",
                "page_size",
                "cache_ttl_minutes",
                "debounce_ms",
                "scroll_threshold",
                "placeholder_image",
                "primary",
                "secondary",
            ];
            for key in raw.keys() {
                if !known_keys.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }

        let config: Config = toml::from_str(content)?;
        tracing::info!(page_size = config.page_size, ttl_minutes = config.cache_ttl_minutes, "Loaded configuration");
        Ok(config)
    }

    /// Resolve the API key, preferring the environment over the config file.
    pub fn api_key(&self) -> Option<SecretString> {
        self.api_key_with_env(std::env::var(API_KEY_ENV).ok())
    }

    fn api_key_with_env(&self, env_value: Option<String>) -> Option<SecretString> {
        env_value
            .filter(|v| !v.trim().is_empty())
            .or_else(|| self.api_key.clone().filter(|v| !v.trim().is_empty()))
            .map(SecretString::from)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    /// Build the loader settings, applying per-source defaults and validating URLs.
    pub fn loader_config(&self) -> Result<LoaderConfig, ConfigError> {
        Ok(LoaderConfig {
            page_size: self.page_size.max(1),
            cache_ttl: Duration::from_secs(self.cache_ttl_minutes.max(1).saturating_mul(60)),
            placeholder_image: self.placeholder_image.clone(),
            api_key: self.api_key(),
            primary: resolve_source(
                &self.primary,
                DEFAULT_PRIMARY_ENDPOINT,
                "science",
                "newsroll.cache.primary",
            )?,
            secondary: resolve_source(
                &self.secondary,
                DEFAULT_SECONDARY_ENDPOINT,
                "news",
                "newsroll.cache.secondary",
            )?,
        })
    }
}

fn resolve_source(
    overrides: &SourceOverrides,
    endpoint: &str,
    section: &str,
    cache_key: &str,
) -> Result<SourceSettings, ConfigError> {
    let endpoint_str = overrides.endpoint.as_deref().unwrap_or(endpoint);
    let endpoint = parse_http_url("endpoint", endpoint_str)?;

    let image_base_str = overrides
        .image_base_url
        .as_deref()
        .unwrap_or(DEFAULT_IMAGE_BASE_URL);
    let image_base_url = if image_base_str.trim().is_empty() {
        None
    } else {
        Some(parse_http_url("image_base_url", image_base_str)?)
    };

    Ok(SourceSettings {
        endpoint,
        image_base_url,
        default_section: overrides
            .default_section
            .clone()
            .unwrap_or_else(|| section.to_string()),
        cache_key: overrides
            .cache_key
            .clone()
            .unwrap_or_else(|| cache_key.to_string()),
    })
}

fn parse_http_url(field: &'static str, value: &str) -> Result<Url, ConfigError> {
    validate_url(value).map_err(|e| {
        tracing::debug!(field = field, error = %e, "Rejected configured URL");
        ConfigError::InvalidUrl {
            field,
            value: value.to_string(),
        }
    })
}

// ============================================================================
// Tests
// ============================================================================
