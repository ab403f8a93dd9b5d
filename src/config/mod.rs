mod types;

pub use types::*;

use crate::{Error, Result};
use std::{env, path::Path};
use tracing::debug;

const DEFAULT_CONFIG_PATH: &str = "config.yaml";

/// Loads the configuration named by `CONFIG_PATH`, falling back to
/// `config.yaml`. Built-in defaults apply only when neither is present.
pub async fn load() -> Result<Config> {
    let config = match env::var("CONFIG_PATH") {
        Ok(path) => load_from(&path).await?,
        Err(_) if Path::new(DEFAULT_CONFIG_PATH).exists() => load_from(DEFAULT_CONFIG_PATH).await?,
        Err(_) => {
            debug!("No configuration file found, using defaults");
            Config::default()
        }
    };

    config.validate()?;
    Ok(config)
}

pub async fn load_from(config_path: impl AsRef<Path>) -> Result<Config> {
    let config_path = config_path.as_ref();
    debug!("Loading configuration from: {}", config_path.display());

    let config_str = tokio::fs::read_to_string(config_path).await?;
    parse(&config_str)
}

pub fn parse(config_str: &str) -> Result<Config> {
    // An empty document deserializes to null, not to an empty mapping
    if config_str.trim().is_empty() {
        return Ok(Config::default());
    }
    Ok(serde_yaml::from_str(config_str)?)
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        let model = &self.model;

        if !(0.0..=1.0).contains(&model.score_threshold) {
            return Err(Error::config(format!(
                "model.score_threshold must be within [0, 1], got {}",
                model.score_threshold
            )));
        }
        if !(0.0..=1.0).contains(&model.mask_threshold) {
            return Err(Error::config(format!(
                "model.mask_threshold must be within [0, 1], got {}",
                model.mask_threshold
            )));
        }
        if model.num_classes == 0 {
            return Err(Error::config("model.num_classes must be at least 1"));
        }
        if model.input_width == 0 || model.input_height == 0 {
            return Err(Error::config("model input size must be non-zero"));
        }
        if !model.class_names.is_empty() && model.class_names.len() != model.num_classes {
            return Err(Error::config(format!(
                "model.class_names has {} entries but model.num_classes is {}",
                model.class_names.len(),
                model.num_classes
            )));
        }
        if !(0.0..=1.0).contains(&self.render.mask_alpha) {
            return Err(Error::config(format!(
                "render.mask_alpha must be within [0, 1], got {}",
                self.render.mask_alpha
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::path::PathBuf;

    #[test]
    fn test_defaults_match_deployment_constants() {
        let config = Config::default();

        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 7008);
        assert_eq!(config.storage.input_root, PathBuf::from("/mnt/input"));
        assert_eq!(config.storage.output_root, PathBuf::from("/mnt/output"));
        assert_eq!(config.model.device, Device::Cpu);
        assert_eq!(config.model.score_threshold, 0.7);
        assert_eq!(config.model.num_classes, 1);
        assert_eq!(config.model.channel_order, ChannelOrder::Bgr);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_yaml_fills_defaults() {
        let config = parse(
            r#"
storage:
  input_root: "/data/in"
model:
  score_threshold: 0.5
"#,
        )
        .unwrap();

        assert_eq!(config.storage.input_root, PathBuf::from("/data/in"));
        assert_eq!(config.storage.output_root, PathBuf::from("/mnt/output"));
        assert_eq!(config.model.score_threshold, 0.5);
        assert_eq!(config.server.port, 7008);
    }

    #[test]
    fn test_empty_document_is_default() {
        let config = parse("  \n").unwrap();
        assert_eq!(config.server.port, 7008);
    }

    #[test]
    fn test_unknown_device_is_rejected() {
        let result = parse("model:\n  device: cuda\n");
        assert!(matches!(result, Err(Error::Yaml(_))));
    }

    #[test]
    fn test_validate_rejects_out_of_range_threshold() {
        let mut config = Config::default();
        config.model.score_threshold = 1.5;
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_validate_rejects_mismatched_class_names() {
        let mut config = Config::default();
        config.model.class_names = vec!["part".to_string(), "defect".to_string()];
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_validate_rejects_zero_classes() {
        let mut config = Config::default();
        config.model.num_classes = 0;
        assert!(config.validate().is_err());
    }
}
