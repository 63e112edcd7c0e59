//! Process-wide settings state.
//!
//! `SettingsStore` is the single writer: it is not `Clone`, and every mutation takes
//! `&mut self`. Everything else reads through `WorkdirReader` handles, which observe
//! a generation counter and can subscribe to workdir changes.

use crate::{Config, ConfigError};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, RwLock};

#[derive(Debug)]
struct StoreState {
    config: Config,
    generation: u64,
}

#[derive(Debug)]
struct Shared {
    state: RwLock<StoreState>,
    watchers: Mutex<Vec<Sender<PathBuf>>>,
}

impl Shared {
    fn read<T>(&self, f: impl FnOnce(&StoreState) -> T) -> T {
        // Recover from a poisoned lock; the state is always replaced wholesale
        let state = self.state.read().unwrap_or_else(|e| e.into_inner());
        f(&state)
    }
}

/// Owner of the persisted settings. Only one exists per flow.
#[derive(Debug)]
pub struct SettingsStore {
    shared: Arc<Shared>,
    config_path: Option<PathBuf>,
}

impl SettingsStore {
    /// Load settings from `config_path`, starting from defaults when the file is absent.
    pub fn open<P: AsRef<Path>>(config_path: P) -> Result<Self, ConfigError> {
        let config_path = config_path.as_ref();
        let config = Config::load_from_path(config_path)?.unwrap_or_default();
        log::info!(
            "Loaded settings from {} (workdir: {:?})",
            config_path.display(),
            config.workdir
        );
        Ok(Self::with_config(config, Some(config_path.to_path_buf())))
    }

    /// Settings that live only for this process.
    pub fn in_memory(config: Config) -> Self {
        Self::with_config(config, None)
    }

    fn with_config(config: Config, config_path: Option<PathBuf>) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: RwLock::new(StoreState {
                    config,
                    generation: 0,
                }),
                watchers: Mutex::new(Vec::new()),
            }),
            config_path,
        }
    }

    pub fn reader(&self) -> WorkdirReader {
        WorkdirReader {
            shared: Arc::clone(&self.shared),
        }
    }

    pub fn config(&self) -> Config {
        self.shared.read(|state| state.config.clone())
    }

    pub fn workdir(&self) -> Option<PathBuf> {
        self.shared.read(|state| state.config.workdir.clone())
    }

    pub fn storage_warning_shown(&self) -> bool {
        self.shared.read(|state| state.config.storage_warning_shown)
    }

    pub fn mark_storage_warning_shown(&mut self) -> anyhow::Result<()> {
        let mut config = self.config();
        if config.storage_warning_shown {
            return Ok(());
        }
        config.storage_warning_shown = true;
        self.replace(config)?;
        Ok(())
    }

    /// Record `path` as the active workdir.
    ///
    /// Returns `false` without touching disk when `path` is already the stored value.
    /// On a persistence failure the in-memory state is left unchanged.
    pub fn commit_workdir(&mut self, path: &Path) -> anyhow::Result<bool> {
        let mut config = self.config();
        if config.workdir.as_deref() == Some(path) {
            return Ok(false);
        }
        config.workdir = Some(path.to_path_buf());
        self.replace(config)?;
        log::info!("Workdir set to {}", path.display());

        let mut watchers = self.shared.watchers.lock().unwrap_or_else(|e| e.into_inner());
        watchers.retain(|watcher| watcher.send(path.to_path_buf()).is_ok());
        Ok(true)
    }

    fn replace(&mut self, config: Config) -> anyhow::Result<()> {
        if let Some(config_path) = &self.config_path {
            config.save_to_path(config_path)?;
        }
        let mut state = self
            .shared
            .state
            .write()
            .unwrap_or_else(|e| e.into_inner());
        state.config = config;
        state.generation += 1;
        Ok(())
    }
}

/// Read-only view of the active workdir, shared with any consumer of stored data.
#[derive(Debug, Clone)]
pub struct WorkdirReader {
    shared: Arc<Shared>,
}

impl WorkdirReader {
    pub fn workdir(&self) -> Option<PathBuf> {
        self.shared.read(|state| state.config.workdir.clone())
    }

    /// Bumped on every persisted change; compare against a cached value to detect re-reads.
    pub fn generation(&self) -> u64 {
        self.shared.read(|state| state.generation)
    }

    /// Receive every workdir committed after this call.
    pub fn watch(&self) -> Receiver<PathBuf> {
        let (tx, rx) = mpsc::channel();
        self.shared
            .watchers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(tx);
        rx
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn test_open_missing_file_starts_from_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let store = SettingsStore::open(temp_dir.path().join("config.toml")).unwrap();

        assert_eq!(store.workdir(), None);
        assert!(!store.storage_warning_shown());
    }

    #[test]
    fn test_commit_workdir_persists_and_notifies() {
        let temp_dir = TempDir::new().unwrap();
        let config_file = temp_dir.path().join("config.toml");
        let mut store = SettingsStore::open(&config_file).unwrap();
        let reader = store.reader();
        let changes = reader.watch();

        let changed = store.commit_workdir(Path::new("/storage/app/dir")).unwrap();

        assert!(changed);
        assert_eq!(reader.workdir(), Some(PathBuf::from("/storage/app/dir")));
        assert_eq!(reader.generation(), 1);
        assert_eq!(changes.try_recv().unwrap(), PathBuf::from("/storage/app/dir"));

        let on_disk = Config::load_from_path(&config_file).unwrap().unwrap();
        assert_eq!(on_disk.workdir, Some(PathBuf::from("/storage/app/dir")));
    }

    #[test]
    fn test_commit_same_workdir_is_noop() {
        let mut store = SettingsStore::in_memory(Config {
            workdir: Some(PathBuf::from("/storage/app/dir")),
            storage_warning_shown: false,
        });
        let reader = store.reader();
        let changes = reader.watch();

        let changed = store.commit_workdir(Path::new("/storage/app/dir")).unwrap();

        assert!(!changed);
        assert_eq!(reader.generation(), 0);
        assert!(changes.try_recv().is_err());
    }

    #[test]
    fn test_failed_persist_leaves_state_unchanged() {
        let temp_dir = TempDir::new().unwrap();
        // A directory where the config file should be makes the write fail
        let config_file = temp_dir.path().join("config.toml");
        std::fs::create_dir(&config_file).unwrap();
        let mut store = SettingsStore::with_config(Config::default(), Some(config_file));

        let result = store.commit_workdir(Path::new("/storage/app/dir"));

        assert!(result.is_err());
        assert_eq!(store.workdir(), None);
        assert_eq!(store.reader().generation(), 0);
    }

    #[test]
    fn test_mark_storage_warning_shown_once() {
        let mut store = SettingsStore::in_memory(Config::default());

        store.mark_storage_warning_shown().unwrap();
        store.mark_storage_warning_shown().unwrap();

        assert!(store.storage_warning_shown());
        assert_eq!(store.reader().generation(), 1);
    }
}
