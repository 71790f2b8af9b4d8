//! Configuration loader with environment variable expansion

use super::{expand_env_vars, Config, ConfigError};
use std::path::Path;

/// Configuration loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from a file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let expanded = expand_env_vars(&content);
        let config: Config = serde_yaml::from_str(&expanded)?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = r#"
server:
  address: "127.0.0.1:8080"
s3:
  bucket: media
  region: us-east-1
profiles:
  photo:
    kind: image
    allowed_mimes: ["image/jpeg", "image/png"]
    size_max_bytes: 10485760
    multipart_threshold_mb: 15
    part_size_mb: 8
    token_ttl_seconds: 900
    path_template: "originals/{shard?}/{key_base}.{ext}"
    enable_sharding: true
"#;

    #[test]
    fn test_load_sample_config() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let config = ConfigLoader::load(file.path()).unwrap();
        assert_eq!(config.server.address, "127.0.0.1:8080");
        assert_eq!(config.s3.bucket, "media");

        let profile = config.profile("photo").unwrap();
        assert_eq!(profile.multipart_threshold_mb, 15);
        assert!(profile.enable_sharding);
    }

    #[test]
    fn test_load_missing_file() {
        let result = ConfigLoader::load("/nonexistent/mediaflow.yaml");
        assert!(matches!(result, Err(ConfigError::IoError(_))));
    }

    #[test]
    fn test_load_rejects_invalid_template() {
        let bad = SAMPLE.replace("{shard?}", "{tenant}");
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(bad.as_bytes()).unwrap();

        let result = ConfigLoader::load(file.path());
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }
}
