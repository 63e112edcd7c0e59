//! Test fixtures shared by the unit tests

use crate::capability::{Capability, CapabilityPlatform};
use crate::error::FlowError;
use crate::flow::{FlowEvent, FlowUi, FsExecutor, FsJob};
use crate::recovery::{RecoveryBranch, RecoveryDialog};
use crate::workdir::WorkdirLayout;
use std::cell::RefCell;
use std::collections::{HashSet, VecDeque};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Create an empty directory to stand in for external storage
pub fn create_test_root() -> TempDir {
    TempDir::new().expect("Failed to create temp dir")
}

/// Platform whose grants are set by the test
#[derive(Debug, Default)]
pub struct FakePlatform {
    pub sdk_version: u32,
    pub legacy_storage: bool,
    pub granted: HashSet<Capability>,
    pub prompts: Vec<Vec<Capability>>,
    pub settings_opened: usize,
}

impl FakePlatform {
    pub fn legacy(sdk_version: u32) -> Self {
        Self {
            sdk_version,
            legacy_storage: true,
            ..Self::default()
        }
    }

    pub fn scoped(sdk_version: u32) -> Self {
        Self {
            sdk_version,
            legacy_storage: false,
            ..Self::default()
        }
    }

    pub fn with_granted(mut self, capabilities: &[Capability]) -> Self {
        self.grant(capabilities);
        self
    }

    pub fn grant(&mut self, capabilities: &[Capability]) {
        self.granted.extend(capabilities.iter().copied());
    }
}

impl CapabilityPlatform for FakePlatform {
    fn sdk_version(&self) -> u32 {
        self.sdk_version
    }

    fn is_granted(&self, capability: Capability) -> bool {
        self.granted.contains(&capability)
    }

    fn launch_permission_prompt(&mut self, capabilities: &[Capability]) {
        self.prompts.push(capabilities.to_vec());
    }

    fn open_broad_access_settings(&mut self) {
        self.settings_opened += 1;
    }

    fn is_legacy_storage(&self) -> bool {
        self.legacy_storage
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiCall {
    Dialog(RecoveryBranch),
    Picker(Option<PathBuf>),
    StorageWarning(PathBuf),
    Ready(PathBuf, bool),
    Exit,
}

#[derive(Debug, Default)]
pub struct RecordingUi {
    pub calls: Vec<UiCall>,
    pub dialogs: Vec<RecoveryDialog>,
}

impl RecordingUi {
    pub fn last_dialog(&self) -> Option<&RecoveryDialog> {
        self.dialogs.last()
    }
}

impl FlowUi for RecordingUi {
    fn present(&mut self, dialog: &RecoveryDialog) {
        self.calls.push(UiCall::Dialog(dialog.branch.clone()));
        self.dialogs.push(dialog.clone());
    }

    fn open_folder_picker(&mut self, hint: Option<&Path>) {
        self.calls.push(UiCall::Picker(hint.map(Path::to_path_buf)));
    }

    fn show_storage_warning(&mut self, workdir: &Path) {
        self.calls.push(UiCall::StorageWarning(workdir.to_path_buf()));
    }

    fn workdir_ready(&mut self, workdir: &Path, changed: bool) {
        self.calls.push(UiCall::Ready(workdir.to_path_buf(), changed));
    }

    fn exit(&mut self) {
        self.calls.push(UiCall::Exit);
    }
}

/// Runs jobs immediately but holds the results until the test delivers them,
/// the way a worker thread would report back later.
#[derive(Debug)]
pub struct InlineFs {
    layout: WorkdirLayout,
    results: RefCell<VecDeque<FlowEvent>>,
}

impl InlineFs {
    pub fn new(layout: WorkdirLayout) -> Self {
        Self {
            layout,
            results: RefCell::new(VecDeque::new()),
        }
    }

    pub fn next_result(&self) -> Option<FlowEvent> {
        self.results.borrow_mut().pop_front()
    }
}

impl FsExecutor for InlineFs {
    fn submit(&self, job: FsJob) -> Result<(), FlowError> {
        let event = job.run(&self.layout);
        self.results.borrow_mut().push_back(event);
        Ok(())
    }
}
