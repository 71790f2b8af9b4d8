//! Configuration module for Mediaflow
//!
//! Handles loading and parsing of the YAML configuration file with support
//! for environment variable expansion and load-time validation of upload
//! profiles (including their object-key templates).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

mod loader;

pub use loader::ConfigLoader;

/// Expand environment variables in a string.
///
/// Supports two syntaxes:
/// - `${VAR_NAME}` - Simple expansion, keeps placeholder if var not found
/// - `${VAR_NAME:-default}` - Expansion with default value
///
/// Variable names must start with a letter or underscore and contain only
/// uppercase letters, digits, and underscores.
fn expand_env_vars(s: &str) -> String {
    let re = regex_lite::Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)(?::-([^}]*))?\}").unwrap();
    let mut last_match = 0;
    let mut result = String::with_capacity(s.len());

    for cap in re.captures_iter(s) {
        let full_match = cap.get(0).unwrap();
        let var_name = cap.get(1).unwrap().as_str();

        result.push_str(&s[last_match..full_match.start()]);

        let value = match std::env::var(var_name) {
            Ok(val) => val,
            Err(_) => {
                if let Some(default) = cap.get(2) {
                    default.as_str().to_string()
                } else {
                    // No env var and no default. Keep the original placeholder.
                    full_match.as_str().to_string()
                }
            }
        };
        result.push_str(&value);

        last_match = full_match.end();
    }

    result.push_str(&s[last_match..]);

    result
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub s3: S3Config,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub media: MediaConfig,
    pub profiles: HashMap<String, Profile>,
}

impl Config {
    /// Load configuration from a file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        ConfigLoader::load(path)
    }

    /// Resolve a named upload profile
    pub fn profile(&self, name: &str) -> Option<&Profile> {
        self.profiles.get(name)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.profiles.is_empty() {
            return Err(ConfigError::ValidationError(
                "At least one upload profile must be configured".into(),
            ));
        }

        for (name, profile) in &self.profiles {
            profile.validate().map_err(|msg| {
                ConfigError::ValidationError(format!("profile '{}': {}", name, msg))
            })?;
        }

        if !(1..=100).contains(&self.media.quality) {
            return Err(ConfigError::ValidationError(format!(
                "media.quality {} out of range: must be 1-100",
                self.media.quality
            )));
        }

        Ok(())
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub address: String,
    /// Base URL advertised in complete/abort action descriptors.
    /// Falls back to the request Host header when unset.
    #[serde(default)]
    pub public_base_url: Option<String>,
}

/// S3 backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct S3Config {
    pub bucket: String,
    pub region: String,
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub access_key: Option<String>,
    #[serde(default)]
    pub secret_key: Option<String>,
}

/// Authentication configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthConfig {
    /// API key required on mutating requests. Empty disables auth
    /// (development mode).
    #[serde(default)]
    pub api_key: Option<String>,
}

/// Metrics configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_enabled")]
    pub enabled: bool,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: default_metrics_enabled(),
        }
    }
}

fn default_metrics_enabled() -> bool {
    true
}

/// Image variant serving configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaConfig {
    #[serde(default = "default_origin_folder")]
    pub origin_folder: String,
    #[serde(default = "default_variant_width")]
    pub default_width: u32,
    #[serde(default = "default_quality")]
    pub quality: u8,
    /// Target encoding for variants ("jpeg", "png", "webp").
    /// Unset keeps the source format.
    #[serde(default)]
    pub convert_to: Option<String>,
    #[serde(default = "default_cache_max_age")]
    pub cache_max_age: u64,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            origin_folder: default_origin_folder(),
            default_width: default_variant_width(),
            quality: default_quality(),
            convert_to: None,
            cache_max_age: default_cache_max_age(),
        }
    }
}

fn default_origin_folder() -> String {
    "originals".to_string()
}

fn default_variant_width() -> u32 {
    256
}

fn default_quality() -> u8 {
    80
}

fn default_cache_max_age() -> u64 {
    86400
}

/// Media kind covered by an upload profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProfileKind {
    Image,
    Video,
}

impl ProfileKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProfileKind::Image => "image",
            ProfileKind::Video => "video",
        }
    }
}

/// Named upload profile: the policy bundle resolved per presign request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub kind: ProfileKind,
    pub allowed_mimes: Vec<String>,
    pub size_max_bytes: u64,
    #[serde(default = "default_multipart_threshold_mb")]
    pub multipart_threshold_mb: u64,
    #[serde(default = "default_part_size_mb")]
    pub part_size_mb: u64,
    #[serde(default = "default_token_ttl_seconds")]
    pub token_ttl_seconds: u64,
    /// Object-key template with `{key_base}`, `{ext}` and optional
    /// `{shard?}`/`{shard}` placeholders.
    pub path_template: String,
    #[serde(default)]
    pub enable_sharding: bool,
}

fn default_multipart_threshold_mb() -> u64 {
    15
}

fn default_part_size_mb() -> u64 {
    8
}

fn default_token_ttl_seconds() -> u64 {
    900
}

/// Placeholders the object-key builder resolves. Anything else in a
/// template is a misconfiguration and is rejected at load time.
const KNOWN_PLACEHOLDERS: [&str; 4] = ["key_base", "ext", "shard", "shard?"];

impl Profile {
    fn validate(&self) -> Result<(), String> {
        if self.path_template.is_empty() {
            return Err("path_template must not be empty".into());
        }
        if self.allowed_mimes.is_empty() {
            return Err("allowed_mimes must not be empty".into());
        }
        if self.size_max_bytes == 0 {
            return Err("size_max_bytes must be greater than 0".into());
        }
        if self.part_size_mb == 0 {
            return Err("part_size_mb must be greater than 0".into());
        }
        if self.token_ttl_seconds == 0 {
            return Err("token_ttl_seconds must be greater than 0".into());
        }

        let re = regex_lite::Regex::new(r"\{([^{}]*)\}").unwrap();
        for cap in re.captures_iter(&self.path_template) {
            let name = cap.get(1).unwrap().as_str();
            if !KNOWN_PLACEHOLDERS.contains(&name) {
                return Err(format!(
                    "path_template contains unknown placeholder '{{{}}}'",
                    name
                ));
            }
        }

        Ok(())
    }
}
