use crate::models::AppConfig;
use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use config::{Config, Environment, File, FileFormat};
use std::fs;

/// Name of the configuration file inside the config directory
pub const CONFIG_FILE_NAME: &str = "wms-scan.yaml";

/// Prefix of environment overrides, e.g. `WMS_SCAN__API__ORIGIN`
pub const ENV_PREFIX: &str = "WMS_SCAN";

/// Configuration manager for loading and saving the YAML configuration file.
///
/// [`load()`](Self::load) layers, lowest to highest precedence:
/// - built-in defaults ([`AppConfig::default()`])
/// - `<config_dir>/wms-scan.yaml`, if present
/// - `WMS_SCAN__<SECTION>__<KEY>` environment variables
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config_dir: Utf8PathBuf,
    config_path: Utf8PathBuf,
}

impl ConfigManager {
    /// Create a new ConfigManager, creating `config_dir` if it doesn't exist.
    pub fn new<P: AsRef<Utf8Path>>(config_dir: P) -> Result<Self> {
        let config_dir = config_dir.as_ref().to_path_buf();

        if !config_dir.exists() {
            fs::create_dir_all(&config_dir)
                .with_context(|| format!("Failed to create config directory: {}", config_dir))?;
        }

        Ok(Self {
            config_path: config_dir.join(CONFIG_FILE_NAME),
            config_dir,
        })
    }

    pub fn load(&self) -> Result<AppConfig> {
        if self.config_path.exists() {
            tracing::info!("Loading config from {}", self.config_path);
        } else {
            tracing::warn!(
                "Config file not found at {}, using defaults",
                self.config_path
            );
        }

        let config = Config::builder()
            .add_source(
                File::from(self.config_path.as_std_path())
                    .format(FileFormat::Yaml)
                    .required(false),
            )
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .with_context(|| format!("Failed to read config: {}", self.config_path))?;

        config
            .try_deserialize::<AppConfig>()
            .with_context(|| format!("Failed to parse config: {}", self.config_path))
    }

    pub fn save(&self, config: &AppConfig) -> Result<()> {
        let yaml_string =
            serde_yaml_ng::to_string(config).context("Failed to serialize config to YAML")?;

        fs::write(&self.config_path, yaml_string)
            .with_context(|| format!("Failed to write config: {}", self.config_path))?;

        tracing::info!("Saved config to {}", self.config_path);
        Ok(())
    }

    pub fn config_dir(&self) -> &Utf8Path {
        &self.config_dir
    }

    pub fn config_path(&self) -> &Utf8Path {
        &self.config_path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_config_manager() -> (ConfigManager, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let config_path = Utf8PathBuf::try_from(temp_dir.path().to_path_buf()).unwrap();
        let manager = ConfigManager::new(&config_path).unwrap();
        (manager, temp_dir)
    }

    #[test]
    fn test_creates_missing_directory() {
        let temp_dir = TempDir::new().unwrap();
        let nested = Utf8PathBuf::try_from(temp_dir.path().join("a").join("b")).unwrap();

        let manager = ConfigManager::new(&nested).unwrap();
        assert!(nested.exists());
        assert_eq!(manager.config_path(), nested.join(CONFIG_FILE_NAME));
    }

    #[test]
    fn test_load_without_file_uses_defaults() {
        let (manager, _temp_dir) = create_test_config_manager();

        let config = manager.load().unwrap();
        assert_eq!(config.scanner.debounce_ms, 180);
        assert_eq!(config.scanner.dedupe_ms, 600);
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let (manager, _temp_dir) = create_test_config_manager();
        fs::write(manager.config_path(), "scanner:\n  dedupe_ms: 900\n").unwrap();

        let config = manager.load().unwrap();
        assert_eq!(config.scanner.dedupe_ms, 900);
        assert_eq!(config.scanner.debounce_ms, 180);
        assert_eq!(config.api.csrf_cookie_path, "/sanctum/csrf-cookie");
    }
}
