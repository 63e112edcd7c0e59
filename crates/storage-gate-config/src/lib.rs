use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

mod store;

pub use store::{SettingsStore, WorkdirReader};

/// Directory name used for the working directory when nothing has been chosen yet
pub const DEFAULT_WORKDIR_NAME: &str = "storage-gate";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {config_path}: {source}")]
    ConfigReadError {
        config_path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file at {config_path}: {source}")]
    ConfigParseError {
        config_path: PathBuf,
        source: toml::de::Error,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Absolute path of the active working directory. Unset until the first
    /// successful initialization.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workdir: Option<PathBuf>,

    /// Whether the non-legacy storage warning has been shown on this install
    #[serde(default)]
    pub storage_warning_shown: bool,
}

impl Config {
    pub fn load_from_path<P: AsRef<Path>>(config_path: P) -> Result<Option<Self>, ConfigError> {
        let config_path = config_path.as_ref();
        if !config_path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(config_path).map_err(|source| {
            ConfigError::ConfigReadError {
                config_path: config_path.to_path_buf(),
                source,
            }
        })?;

        let mut config: Config =
            toml::from_str(&content).map_err(|source| ConfigError::ConfigParseError {
                config_path: config_path.to_path_buf(),
                source,
            })?;

        // Committed workdirs are absolute and kept verbatim; only hand-written
        // entries such as "~/games" or "$EXTERNAL_STORAGE/games" are expanded
        config.workdir = config.workdir.map(|workdir| {
            if workdir.is_absolute() {
                workdir
            } else {
                Self::expand_path(&workdir).unwrap_or(workdir)
            }
        });

        Ok(Some(config))
    }

    pub fn load() -> Result<Option<Self>, ConfigError> {
        let config_path = Self::config_path();
        Self::load_from_path(&config_path)
    }

    pub fn save_to_path<P: AsRef<Path>>(&self, config_path: P) -> anyhow::Result<()> {
        let config_path = config_path.as_ref();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(config_path, content)?;
        Ok(())
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let config_path = Self::config_path();
        self.save_to_path(&config_path)
    }

    pub fn config_path() -> PathBuf {
        let config_dir = shellexpand::tilde("~/.config/storage-gate");
        PathBuf::from(config_dir.as_ref()).join("config.toml")
    }

    /// Storage root for desktop hosts, which have no shared external storage: the home directory.
    pub fn desktop_external_root() -> PathBuf {
        PathBuf::from(shellexpand::tilde("~").as_ref())
    }

    /// First-run workdir: the fixed directory name under the host's external storage root.
    pub fn default_workdir(external_root: &Path) -> PathBuf {
        external_root.join(DEFAULT_WORKDIR_NAME)
    }

    /// Stored workdir, or the first-run default when none was ever committed.
    pub fn workdir_or_default(&self, external_root: &Path) -> PathBuf {
        self.workdir
            .clone()
            .unwrap_or_else(|| Self::default_workdir(external_root))
    }

    fn expand_path(path: &Path) -> Option<PathBuf> {
        let path_str = path.to_string_lossy();
        match shellexpand::full(&path_str) {
            Ok(expanded) => Some(PathBuf::from(expanded.as_ref())),
            Err(_) => None,
        }
    }
}
