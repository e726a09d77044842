//! Configuration discovery and loading
//!
//! This module handles the configuration discovery hierarchy:
//! 1. Explicit path: `--config <FILE>`
//! 2. Current directory: ./taskwave.toml or ./.taskwave/config.toml
//! 3. User config: ~/.taskwave/config.toml
//! 4. System config: /etc/taskwave/config.toml
//! 5. Built-in defaults

use crate::env;
use crate::executor::CommandWorkerConfig;
use crate::scheduler::SchedulerConfig;
use serde::{Deserialize, Serialize};
use std::env as std_env;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read configuration '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid configuration in '{path}': {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Failed to serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Configuration file '{0}' not found")]
    NotFound(PathBuf),

    #[error("Could not determine home directory")]
    NoHomeDir,

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Contents of a taskwave configuration file
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TaskwaveConfig {
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// Worker used when `taskwave run` is given no program
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub worker: Option<CommandWorkerConfig>,
}

impl TaskwaveConfig {
    /// Load from TOML file
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: TaskwaveConfig = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Save to TOML file
    pub fn to_toml_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.scheduler.validate().map_err(ConfigError::Invalid)?;
        if let Some(ref worker) = self.worker
            && worker.program.trim().is_empty()
        {
            return Err(ConfigError::Invalid(
                "worker.program must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Configuration discovery system
pub struct ConfigDiscovery;

impl ConfigDiscovery {
    /// Load the explicit file if given, otherwise the first file found in the
    /// hierarchy, otherwise defaults. Returns the file the config came from.
    pub fn discover_config(
        config_override: Option<&Path>,
    ) -> Result<(TaskwaveConfig, Option<PathBuf>), ConfigError> {
        if let Some(path) = config_override {
            if !path.is_file() {
                return Err(ConfigError::NotFound(path.to_path_buf()));
            }
            info!("Loading configuration from: {:?}", path);
            return Ok((TaskwaveConfig::from_toml_file(path)?, Some(path.to_path_buf())));
        }

        if let Some(config_path) = Self::find_config_file() {
            info!("Loading configuration from: {:?}", config_path);
            let config = TaskwaveConfig::from_toml_file(&config_path)?;
            return Ok((config, Some(config_path)));
        }

        info!("No configuration file found, using defaults");
        Ok((TaskwaveConfig::default(), None))
    }

    /// Find configuration file using discovery hierarchy
    pub fn find_config_file() -> Option<PathBuf> {
        Self::get_config_candidates()
            .into_iter()
            .inspect(|candidate| debug!("Checking for config file: {:?}", candidate))
            .find(|candidate| candidate.is_file())
    }

    /// Configuration file candidates in priority order
    pub fn get_config_candidates() -> Vec<PathBuf> {
        let current_dir = std_env::current_dir().ok();
        Self::candidates_for(current_dir.as_deref(), env::home_dir().as_deref())
    }

    fn candidates_for(current_dir: Option<&Path>, home_dir: Option<&Path>) -> Vec<PathBuf> {
        let mut candidates = Vec::new();

        if let Some(current_dir) = current_dir {
            candidates.push(env::project_config_file_path(current_dir));
            candidates.push(env::local_config_file_path(current_dir));
        }

        if let Some(home_dir) = home_dir {
            candidates.push(env::user_config_file_path(home_dir));
        }

        #[cfg(unix)]
        candidates.push(PathBuf::from(env::SYSTEM_CONFIG_FILE));

        candidates
    }

    /// Create a default config file in the user's home directory
    pub fn create_default_user_config() -> Result<PathBuf, ConfigError> {
        let home_dir = env::home_dir().ok_or(ConfigError::NoHomeDir)?;
        Self::create_default_config_in(&home_dir)
    }

    fn create_default_config_in(home_dir: &Path) -> Result<PathBuf, ConfigError> {
        let config_dir = env::user_config_dir_path(home_dir);
        let config_path = env::user_config_file_path(home_dir);

        if !config_dir.exists() {
            fs::create_dir_all(&config_dir).map_err(|source| ConfigError::Io {
                path: config_dir.clone(),
                source,
            })?;
            info!("Created configuration directory: {:?}", config_dir);
        }

        if config_path.exists() {
            warn!("Configuration file already exists: {:?}", config_path);
        } else {
            TaskwaveConfig::default().to_toml_file(&config_path)?;
            info!("Created default configuration file: {:?}", config_path);
        }

        Ok(config_path)
    }

    /// Show configuration discovery information
    pub fn show_discovery_info(config_override: Option<&Path>) {
        println!("Configuration Discovery Hierarchy:");
        println!();

        if let Some(path) = config_override {
            let status = if path.is_file() { "✓ EXISTS" } else { "✗ NOT FOUND" };
            println!("  0. {:?} (--config) - {}", path, status);
        }

        for (i, candidate) in Self::get_config_candidates().iter().enumerate() {
            let status = if candidate.exists() {
                if candidate.is_file() {
                    "✓ EXISTS"
                } else {
                    "✗ NOT A FILE"
                }
            } else {
                "✗ NOT FOUND"
            };
            println!("  {}. {:?} - {}", i + 1, candidate, status);
        }

        println!();
        match Self::discover_config(config_override) {
            Ok((config, source)) => {
                match source {
                    Some(path) => println!("Active configuration: {:?}", path),
                    None => println!("Active configuration: Built-in defaults"),
                }
                println!();
                match toml::to_string_pretty(&config) {
                    Ok(rendered) => println!("{}", rendered),
                    Err(e) => println!("(could not render configuration: {})", e),
                }
            }
            Err(e) => println!("Active configuration: error - {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = TaskwaveConfig::default();
        assert_eq!(config.scheduler, SchedulerConfig::default());
        assert!(config.worker.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_file_operations() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("taskwave.toml");

        let original = TaskwaveConfig {
            scheduler: SchedulerConfig {
                max_concurrent: 5,
                ..Default::default()
            },
            worker: Some(
                CommandWorkerConfig::new("python3", vec!["worker.py".to_string()])
                    .with_timeout_secs(60),
            ),
        };

        original.to_toml_file(&config_path).unwrap();
        let loaded = TaskwaveConfig::from_toml_file(&config_path).unwrap();
        assert_eq!(loaded, original);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("taskwave.toml");
        fs::write(&config_path, "[scheduler]\nmax_waves = 4\n").unwrap();

        let config = TaskwaveConfig::from_toml_file(&config_path).unwrap();
        assert_eq!(config.scheduler.max_waves, 4);
        assert_eq!(config.scheduler.max_concurrent, 3);
        assert!(config.worker.is_none());
    }

    #[test]
    fn test_invalid_configs() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("taskwave.toml");

        fs::write(&config_path, "[scheduler]\nmax_concurrent = 0\n").unwrap();
        assert!(matches!(
            TaskwaveConfig::from_toml_file(&config_path),
            Err(ConfigError::Invalid(_))
        ));

        fs::write(&config_path, "[scheduler\n").unwrap();
        assert!(matches!(
            TaskwaveConfig::from_toml_file(&config_path),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn test_config_candidates_order() {
        let candidates = ConfigDiscovery::candidates_for(
            Some(Path::new("/work")),
            Some(Path::new("/home/dev")),
        );

        assert_eq!(candidates[0], PathBuf::from("/work/taskwave.toml"));
        assert_eq!(candidates[1], PathBuf::from("/work/.taskwave/config.toml"));
        assert_eq!(candidates[2], PathBuf::from("/home/dev/.taskwave/config.toml"));
    }

    #[test]
    fn test_explicit_config_must_exist() {
        let temp_dir = TempDir::new().unwrap();
        let missing = temp_dir.path().join("missing.toml");
        assert!(matches!(
            ConfigDiscovery::discover_config(Some(&missing)),
            Err(ConfigError::NotFound(_))
        ));
    }

    #[test]
    #[serial]
    fn test_discovers_project_config_in_current_dir() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(
            temp_dir.path().join("taskwave.toml"),
            "[scheduler]\nmax_retries = 7\n",
        )
        .unwrap();

        let previous = std_env::current_dir().unwrap();
        std_env::set_current_dir(temp_dir.path()).unwrap();
        let result = ConfigDiscovery::discover_config(None);
        std_env::set_current_dir(previous).unwrap();

        let (config, source) = result.unwrap();
        assert_eq!(config.scheduler.max_retries, 7);
        assert_eq!(
            source.unwrap().file_name().unwrap(),
            env::PROJECT_CONFIG_FILE_NAME
        );
    }

    #[test]
    fn test_create_default_config() {
        let home = TempDir::new().unwrap();
        let path = ConfigDiscovery::create_default_config_in(home.path()).unwrap();
        assert_eq!(path, env::user_config_file_path(home.path()));

        let loaded = TaskwaveConfig::from_toml_file(&path).unwrap();
        assert_eq!(loaded, TaskwaveConfig::default());

        // A second call keeps the existing file
        fs::write(&path, "[scheduler]\nmax_waves = 2\n").unwrap();
        ConfigDiscovery::create_default_config_in(home.path()).unwrap();
        assert_eq!(
            TaskwaveConfig::from_toml_file(&path).unwrap().scheduler.max_waves,
            2
        );
    }
}
