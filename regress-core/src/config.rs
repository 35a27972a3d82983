use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::db::{create_backend, BackendType, DocumentBackend, DEFAULT_QUOTA_BYTES};

/// Environment variable pointing at the config file
pub const CONFIG_ENV: &str = "REGRESS_CONFIG";

/// Environment variable overriding the data location
pub const DATA_ENV: &str = "REGRESS_DATA";

/// Settings read from `~/.regress.yaml`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Config {
    /// Data directory, or a `.db` file for the SQLite backend
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_path: Option<PathBuf>,

    /// Explicit backend; inferred from `data_path` when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backend: Option<BackendType>,

    /// Byte budget for everything stored
    #[serde(default = "default_quota_bytes")]
    pub quota_bytes: usize,
}

fn default_quota_bytes() -> usize {
    DEFAULT_QUOTA_BYTES
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_path: None,
            backend: None,
            quota_bytes: DEFAULT_QUOTA_BYTES,
        }
    }
}

impl Config {
    /// Loads the config from the provided path
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;

        serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path.as_ref()))
    }

    /// Loads the config, or returns the defaults when the file does not exist
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        if !path.as_ref().exists() {
            return Ok(Self::default());
        }
        Self::load(path)
    }

    /// Save the config to the specified path
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_yaml::to_string(&self)?;

        // Ensure parent directories exist
        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent)?;
        }

        fs::write(&path, content)
            .with_context(|| format!("Failed to write config to {:?}", path.as_ref()))?;

        Ok(())
    }

    /// Opens the configured backend, honouring a command-line path override
    /// and the `REGRESS_DATA` environment variable
    pub fn open_backend(&self, path_override: Option<&Path>) -> Result<Box<dyn DocumentBackend>> {
        let path = resolve_data_path(path_override, env::var(DATA_ENV).ok(), self)?;
        let backend = create_backend(&path, self.backend, self.quota_bytes)
            .with_context(|| format!("Failed to open store at {:?}", path))?;
        Ok(backend)
    }
}

/// Picks the data location: command line, then environment, then config
/// file, then the platform data directory
pub fn resolve_data_path(
    path_override: Option<&Path>,
    env_value: Option<String>,
    config: &Config,
) -> Result<PathBuf> {
    if let Some(path) = path_override {
        return Ok(path.to_path_buf());
    }
    if let Some(path) = env_value.filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(path));
    }
    if let Some(path) = &config.data_path {
        return Ok(path.clone());
    }
    default_data_path()
}

/// `<platform data dir>/regression-assistant`
pub fn default_data_path() -> Result<PathBuf> {
    let base = dirs::data_dir()
        .or_else(dirs::home_dir)
        .context("Failed to determine data directory")?;
    Ok(base.join("regression-assistant"))
}

/// Gets the path to the config file
pub fn get_config_path() -> Result<PathBuf> {
    // Check if REGRESS_CONFIG environment variable is set
    if let Ok(path) = env::var(CONFIG_ENV) {
        return Ok(PathBuf::from(path));
    }

    // Default to ~/.regress.yaml
    let home_dir = dirs::home_dir().context("Failed to determine home directory")?;

    Ok(home_dir.join(".regress.yaml"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_config_uses_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config = Config::load_or_default(temp_dir.path().join("none.yaml")).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.quota_bytes, 5 * 1024 * 1024);
    }

    #[test]
    fn test_config_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("regress.yaml");
        let config = Config {
            data_path: Some(PathBuf::from("/tmp/store.db")),
            backend: Some(BackendType::Sqlite),
            quota_bytes: 1024,
        };
        config.save(&path).unwrap();

        assert_eq!(Config::load(&path).unwrap(), config);
    }

    #[test]
    fn test_partial_config_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("regress.yaml");
        fs::write(&path, "backend: file\n").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.backend, Some(BackendType::File));
        assert_eq!(config.quota_bytes, DEFAULT_QUOTA_BYTES);
        assert!(config.data_path.is_none());
    }

    #[test]
    fn test_invalid_config_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("regress.yaml");
        fs::write(&path, "backend: floppy\n").unwrap();
        assert!(Config::load(&path).is_err());
    }

    #[test]
    fn test_resolve_data_path_priority() {
        let config = Config {
            data_path: Some(PathBuf::from("from-config")),
            ..Default::default()
        };
        let cli = PathBuf::from("from-cli");

        assert_eq!(
            resolve_data_path(Some(&cli), Some("from-env".into()), &config).unwrap(),
            cli
        );
        assert_eq!(
            resolve_data_path(None, Some("from-env".into()), &config).unwrap(),
            PathBuf::from("from-env")
        );
        assert_eq!(
            resolve_data_path(None, Some(String::new()), &config).unwrap(),
            PathBuf::from("from-config")
        );
        assert!(resolve_data_path(None, None, &Config::default())
            .unwrap()
            .ends_with("regression-assistant"));
    }

    #[test]
    fn test_open_backend_with_override() {
        let temp_dir = TempDir::new().unwrap();
        let config = Config::default();
        let backend = config
            .open_backend(Some(&temp_dir.path().join("store.db")))
            .unwrap();
        assert_eq!(backend.backend_type(), BackendType::Sqlite);
    }
}
