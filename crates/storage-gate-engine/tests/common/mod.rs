#![allow(dead_code)]

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver};
use std::time::Duration;
use storage_gate_config::{Config, SettingsStore};
use storage_gate_engine::{
    Capability, CapabilityPlatform, CapabilityTable, FlowEvent, FlowState, FlowUi, FsWorker,
    Orchestrator, RecoveryDialog, WorkdirLayout,
};

pub struct Platform {
    pub sdk_version: u32,
    pub granted: HashSet<Capability>,
    pub prompts: usize,
}

impl Platform {
    pub fn itemized(granted: &[Capability]) -> Self {
        Self {
            sdk_version: 28,
            granted: granted.iter().copied().collect(),
            prompts: 0,
        }
    }
}

impl CapabilityPlatform for Platform {
    fn sdk_version(&self) -> u32 {
        self.sdk_version
    }

    fn is_granted(&self, capability: Capability) -> bool {
        self.granted.contains(&capability)
    }

    fn launch_permission_prompt(&mut self, _capabilities: &[Capability]) {
        self.prompts += 1;
    }

    fn open_broad_access_settings(&mut self) {}

    fn is_legacy_storage(&self) -> bool {
        true
    }
}

#[derive(Default)]
pub struct Ui {
    pub dialogs: Vec<RecoveryDialog>,
    pub pickers: Vec<Option<PathBuf>>,
    pub ready: Vec<(PathBuf, bool)>,
    pub exited: bool,
}

impl FlowUi for Ui {
    fn present(&mut self, dialog: &RecoveryDialog) {
        self.dialogs.push(dialog.clone());
    }

    fn open_folder_picker(&mut self, hint: Option<&Path>) {
        self.pickers.push(hint.map(Path::to_path_buf));
    }

    fn show_storage_warning(&mut self, _workdir: &Path) {}

    fn workdir_ready(&mut self, workdir: &Path, changed: bool) {
        self.ready.push((workdir.to_path_buf(), changed));
    }

    fn exit(&mut self) {
        self.exited = true;
    }
}

pub type Flow = Orchestrator<Platform, Ui, FsWorker>;

pub const LEGACY: [Capability; 2] = [
    Capability::ReadExternalStorage,
    Capability::WriteExternalStorage,
];

/// Build a flow backed by a real worker thread. Worker reports arrive on the receiver.
pub fn flow(platform: Platform, workdir: Option<PathBuf>) -> (Flow, Receiver<FlowEvent>) {
    let (tx, rx) = mpsc::channel();
    let worker = FsWorker::spawn(WorkdirLayout::default(), move |event| {
        let _ = tx.send(event);
    })
    .expect("Failed to spawn worker");
    let store = SettingsStore::in_memory(Config {
        workdir,
        storage_warning_shown: true,
    });
    let flow = Orchestrator::new(
        platform,
        Ui::default(),
        worker,
        store,
        CapabilityTable::android_default(),
        "/storage/emulated/0",
    );
    (flow, rx)
}

/// Deliver worker reports while the flow waits on the filesystem
pub fn pump(flow: &mut Flow, rx: &Receiver<FlowEvent>) {
    while matches!(
        flow.state(),
        FlowState::ValidatingWorkdir { .. } | FlowState::Initializing { .. }
    ) {
        let event = rx
            .recv_timeout(Duration::from_secs(5))
            .expect("Worker did not report");
        flow.handle(event).expect("Worker event rejected");
    }
}
