//! UniFFI bindings for the storage-gate Android host
//!
//! The Kotlin side implements `StorageHost` (permission primitives plus dialog and
//! picker surfaces) and forwards its activity callbacks into a `FlowSession`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock, Weak};
use storage_gate_config::SettingsStore;
use storage_gate_engine::{
    Capability, CapabilityPlatform, CapabilityTable, FlowUi, FsWorker, Orchestrator,
    PickerOutcome, RecoveryChoice, RecoveryDialog, Trigger, WorkdirLayout,
};

uniffi::setup_scaffolding!();

// ============ Errors ============

/// Errors that can cross the FFI boundary
/// Note: Field is named `reason` not `message` to avoid conflict with Throwable.message in Kotlin
#[derive(Debug, thiserror::Error, uniffi::Error)]
pub enum FfiError {
    #[error("Config error: {reason}")]
    ConfigError { reason: String },
    #[error("Capability table error: {reason}")]
    TableError { reason: String },
    #[error("Worker error: {reason}")]
    WorkerError { reason: String },
    #[error("Flow error: {reason}")]
    FlowError { reason: String },
}

impl From<storage_gate_engine::FlowError> for FfiError {
    fn from(e: storage_gate_engine::FlowError) -> Self {
        FfiError::FlowError {
            reason: e.to_string(),
        }
    }
}

// ============ Host Callbacks ============

/// Implemented by the Android activity.
///
/// Every UI method is called with the session lock held. Implementations must post
/// the work to the main thread and answer through the session later, never from
/// inside the callback.
#[uniffi::export(with_foreign)]
pub trait StorageHost: Send + Sync {
    fn sdk_version(&self) -> u32;
    /// `identifier` is the platform permission name, e.g. `android.permission.READ_EXTERNAL_STORAGE`
    fn is_granted(&self, identifier: String) -> bool;
    fn launch_permission_prompt(&self, identifiers: Vec<String>);
    fn open_broad_access_settings(&self);
    fn is_legacy_storage(&self) -> bool;
    fn present_dialog(&self, dialog: DialogDto);
    fn open_folder_picker(&self, hint: Option<String>);
    fn show_storage_warning(&self, workdir: String);
    fn workdir_ready(&self, workdir: String, changed: bool);
    fn exit(&self);
}

struct HostPlatform(Arc<dyn StorageHost>);

impl CapabilityPlatform for HostPlatform {
    fn sdk_version(&self) -> u32 {
        self.0.sdk_version()
    }

    fn is_granted(&self, capability: Capability) -> bool {
        self.0.is_granted(capability.identifier().to_string())
    }

    fn launch_permission_prompt(&mut self, capabilities: &[Capability]) {
        let identifiers = capabilities
            .iter()
            .map(|capability| capability.identifier().to_string())
            .collect();
        self.0.launch_permission_prompt(identifiers);
    }

    fn open_broad_access_settings(&mut self) {
        self.0.open_broad_access_settings();
    }

    fn is_legacy_storage(&self) -> bool {
        self.0.is_legacy_storage()
    }
}

struct HostUi(Arc<dyn StorageHost>);

impl FlowUi for HostUi {
    fn present(&mut self, dialog: &RecoveryDialog) {
        self.0.present_dialog(DialogDto::from_engine(dialog));
    }

    fn open_folder_picker(&mut self, hint: Option<&Path>) {
        self.0.open_folder_picker(hint.map(path_string));
    }

    fn show_storage_warning(&mut self, workdir: &Path) {
        self.0.show_storage_warning(path_string(workdir));
    }

    fn workdir_ready(&mut self, workdir: &Path, changed: bool) {
        self.0.workdir_ready(path_string(workdir), changed);
    }

    fn exit(&mut self) {
        self.0.exit();
    }
}

fn path_string(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

// ============ Flow Session ============

type HostFlow = Orchestrator<HostPlatform, HostUi, FsWorker>;

/// One storage flow bound to an activity.
///
/// Filesystem work runs on a worker thread that reports back into the same session,
/// so callbacks may arrive on either thread.
#[derive(uniffi::Object)]
pub struct FlowSession {
    inner: Arc<Mutex<HostFlow>>,
}

#[uniffi::export]
impl FlowSession {
    /// `capability_table` is TOML; the built-in Android table is used when absent.
    #[uniffi::constructor]
    pub fn new(
        host: Arc<dyn StorageHost>,
        config_path: String,
        external_root: String,
        capability_table: Option<String>,
    ) -> Result<Self, FfiError> {
        let table = match capability_table {
            Some(content) => {
                CapabilityTable::from_toml_str(&content).map_err(|e| FfiError::TableError {
                    reason: e.to_string(),
                })?
            }
            None => CapabilityTable::android_default(),
        };
        let store = SettingsStore::open(&config_path).map_err(|e| FfiError::ConfigError {
            reason: e.to_string(),
        })?;

        let slot: Arc<OnceLock<Weak<Mutex<HostFlow>>>> = Arc::new(OnceLock::new());
        let worker_slot = Arc::clone(&slot);
        let worker = FsWorker::spawn(WorkdirLayout::default(), move |event| {
            let Some(flow) = worker_slot.get().and_then(Weak::upgrade) else {
                log::warn!("Session gone, dropping worker report {event:?}");
                return;
            };
            // Recover from poisoned mutex (another thread panicked while holding lock)
            let mut flow = flow.lock().unwrap_or_else(|e| e.into_inner());
            if let Err(e) = flow.handle(event) {
                log::error!("Worker report rejected: {e}");
            }
        })
        .map_err(|e| FfiError::WorkerError {
            reason: e.to_string(),
        })?;

        let flow = Orchestrator::new(
            HostPlatform(Arc::clone(&host)),
            HostUi(host),
            worker,
            store,
            table,
            PathBuf::from(external_root),
        );
        let inner = Arc::new(Mutex::new(flow));
        // Set once, before any job can be submitted
        let _ = slot.set(Arc::downgrade(&inner));

        Ok(Self { inner })
    }

    /// Run the startup flow
    pub fn launch(&self) -> Result<(), FfiError> {
        self.lock().trigger(Trigger::Launch)?;
        Ok(())
    }

    /// Entry from the settings screen
    pub fn change_folder(&self) -> Result<(), FfiError> {
        self.lock().trigger(Trigger::ChangeFolder)?;
        Ok(())
    }

    /// Answer to `launch_permission_prompt`. Unknown identifiers are ignored.
    pub fn on_permission_result(&self, results: Vec<PermissionResultDto>) -> Result<(), FfiError> {
        let mut grants = HashMap::new();
        for result in results {
            match result.identifier.parse::<Capability>() {
                Ok(capability) => {
                    grants.insert(capability, result.granted);
                }
                Err(e) => log::warn!("{e}"),
            }
        }
        self.lock().on_permission_result(&grants)?;
        Ok(())
    }

    /// Activity returned to the foreground
    pub fn on_resume(&self) -> Result<(), FfiError> {
        self.lock().on_resume()?;
        Ok(())
    }

    pub fn on_choice(&self, choice: RecoveryChoiceDto) -> Result<(), FfiError> {
        self.lock().on_choice(choice.into())?;
        Ok(())
    }

    /// `location` is the picker result (URI or path), or None when the picker was cancelled
    pub fn on_folder_picked(&self, location: Option<String>) -> Result<(), FfiError> {
        let outcome = match location {
            Some(location) => PickerOutcome::Picked(location),
            None => PickerOutcome::Cancelled,
        };
        self.lock().on_folder_picked(outcome)?;
        Ok(())
    }

    /// Persisted workdir, if one has been committed
    pub fn current_workdir(&self) -> Option<String> {
        self.lock().reader().workdir().as_deref().map(path_string)
    }

    /// Name of the current flow state, for diagnostics
    pub fn state_name(&self) -> String {
        self.lock().state().name().to_string()
    }
}

impl FlowSession {
    fn lock(&self) -> std::sync::MutexGuard<'_, HostFlow> {
        // Recover from poisoned mutex (another thread panicked while holding lock)
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

// ============ DTOs ============

#[derive(Debug, Clone, Copy, PartialEq, Eq, uniffi::Enum)]
pub enum RecoveryChoiceDto {
    Retry,
    RetryPermissions,
    PickOther,
    CreateHere,
    Exit,
}

impl From<RecoveryChoice> for RecoveryChoiceDto {
    fn from(choice: RecoveryChoice) -> Self {
        match choice {
            RecoveryChoice::Retry => Self::Retry,
            RecoveryChoice::RetryPermissions => Self::RetryPermissions,
            RecoveryChoice::PickOther => Self::PickOther,
            RecoveryChoice::CreateHere => Self::CreateHere,
            RecoveryChoice::Exit => Self::Exit,
        }
    }
}

impl From<RecoveryChoiceDto> for RecoveryChoice {
    fn from(choice: RecoveryChoiceDto) -> Self {
        match choice {
            RecoveryChoiceDto::Retry => Self::Retry,
            RecoveryChoiceDto::RetryPermissions => Self::RetryPermissions,
            RecoveryChoiceDto::PickOther => Self::PickOther,
            RecoveryChoiceDto::CreateHere => Self::CreateHere,
            RecoveryChoiceDto::Exit => Self::Exit,
        }
    }
}

/// A modal recovery dialog. The host must not offer a cancel action.
#[derive(Debug, Clone, PartialEq, Eq, uniffi::Record)]
pub struct DialogDto {
    /// Failure branch: "RecoveringDenied", "RecoveringCreatable" or "RecoveringUnusable"
    pub branch: String,
    /// Path the dialog is about, if any
    pub path: Option<String>,
    /// String resource keys, localized by the host
    pub title_key: String,
    pub message_key: String,
    /// In display order
    pub choices: Vec<RecoveryChoiceDto>,
}

impl DialogDto {
    fn from_engine(dialog: &RecoveryDialog) -> Self {
        Self {
            branch: dialog.branch.name().to_string(),
            path: dialog.branch.path().map(path_string),
            title_key: dialog.title_key.to_string(),
            message_key: dialog.message_key.to_string(),
            choices: dialog.choices.iter().copied().map(Into::into).collect(),
        }
    }
}

/// One entry of the permission prompt result
#[derive(Debug, Clone, uniffi::Record)]
pub struct PermissionResultDto {
    pub identifier: String,
    pub granted: bool,
}

// ============ Standalone Functions ============

/// Route `log` output to logcat on Android, or to stderr elsewhere. Safe to call twice.
#[uniffi::export]
pub fn init_logging() {
    #[cfg(target_os = "android")]
    android_logger::init_once(
        android_logger::Config::default()
            .with_max_level(log::LevelFilter::Debug)
            .with_tag("StorageGate"),
    );

    #[cfg(not(target_os = "android"))]
    {
        let _ = env_logger::Builder::from_default_env()
            .filter_level(log::LevelFilter::Info)
            .try_init();
    }
}
