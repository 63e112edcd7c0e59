use super::state::{Effect, Entry, FlowEvent, FlowState, Transition, transition};
use super::worker::{FsExecutor, FsJob};
use crate::capability::{
    Capability, CapabilityPlatform, CapabilityProbe, CapabilityRequester, CapabilityTable,
    RequestOutcome, StorageCapabilityState, reduce_grants,
};
use crate::error::FlowError;
use crate::location::{LocationResolver, StorageLocationResolver};
use crate::recovery::{RecoveryChoice, RecoveryDialog};
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use storage_gate_config::{Config, SettingsStore, WorkdirReader};

/// Host-side UI surface the flow drives
pub trait FlowUi {
    /// Show a modal recovery dialog. The answer comes back via `Orchestrator::on_choice`.
    fn present(&mut self, dialog: &RecoveryDialog);

    /// Open the native folder picker. The answer comes back via
    /// `Orchestrator::on_folder_picked`.
    fn open_folder_picker(&mut self, hint: Option<&Path>);

    /// One-time notice that storage outside the app sandbox is restricted
    fn show_storage_warning(&mut self, workdir: &Path);

    /// The flow reached `Ready`; consumers may use `workdir`. `changed` is set when
    /// the persisted workdir differs from before this pass.
    fn workdir_ready(&mut self, workdir: &Path, changed: bool);

    /// Terminate the application
    fn exit(&mut self);
}

/// What started a flow pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    Launch,
    ChangeFolder,
}

/// Raw answer from the folder picker
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PickerOutcome {
    Picked(String),
    Cancelled,
}

/// Drives the storage access flow.
///
/// Owns the state and the only writer of the settings store. Not reentrant: triggers
/// that arrive while a pass is in progress are queued and started once it settles.
pub struct Orchestrator<P, U, X> {
    state: FlowState,
    platform: P,
    ui: U,
    fs: X,
    store: SettingsStore,
    probe: CapabilityProbe,
    requester: CapabilityRequester,
    resolver: Box<dyn LocationResolver + Send>,
    external_root: PathBuf,
    requested: Vec<Capability>,
    pending: VecDeque<Trigger>,
}

impl<P, U, X> Orchestrator<P, U, X>
where
    P: CapabilityPlatform,
    U: FlowUi,
    X: FsExecutor,
{
    pub fn new(
        platform: P,
        ui: U,
        fs: X,
        store: SettingsStore,
        table: CapabilityTable,
        external_root: impl Into<PathBuf>,
    ) -> Self {
        let external_root = external_root.into();
        Self {
            state: FlowState::Idle,
            platform,
            ui,
            fs,
            store,
            probe: CapabilityProbe::new(table.clone()),
            requester: CapabilityRequester::new(table),
            resolver: Box::new(StorageLocationResolver::new(external_root.clone())),
            external_root,
            requested: Vec::new(),
            pending: VecDeque::new(),
        }
    }

    pub fn with_resolver(mut self, resolver: impl LocationResolver + Send + 'static) -> Self {
        self.resolver = Box::new(resolver);
        self
    }

    pub fn state(&self) -> &FlowState {
        &self.state
    }

    pub fn reader(&self) -> WorkdirReader {
        self.store.reader()
    }

    pub fn platform_mut(&mut self) -> &mut P {
        &mut self.platform
    }

    pub fn ui(&self) -> &U {
        &self.ui
    }

    pub fn ui_mut(&mut self) -> &mut U {
        &mut self.ui
    }

    /// Start a flow pass, or queue it behind the one in progress.
    pub fn trigger(&mut self, trigger: Trigger) -> Result<(), FlowError> {
        if self.state == FlowState::Exited {
            return Err(FlowError::Terminated);
        }
        if !self.state.is_settled() {
            if trigger == Trigger::Launch || self.pending.contains(&trigger) {
                log::info!(
                    "Ignoring {trigger:?}: flow already in {}",
                    self.state.name()
                );
            } else {
                log::info!("Queueing {trigger:?} behind {}", self.state.name());
                self.pending.push_back(trigger);
            }
            return Ok(());
        }
        self.start(trigger)
    }

    /// Result of the itemized permission prompt
    pub fn on_permission_result(
        &mut self,
        results: &HashMap<Capability, bool>,
    ) -> Result<(), FlowError> {
        let reduced = reduce_grants(&self.requested, results);
        log::info!("Permission prompt result: {reduced:?}");
        self.handle(FlowEvent::PermissionResult(reduced))
    }

    /// The host returned to the foreground
    pub fn on_resume(&mut self) -> Result<(), FlowError> {
        self.handle(FlowEvent::HostResumed)
    }

    pub fn on_choice(&mut self, choice: RecoveryChoice) -> Result<(), FlowError> {
        log::info!("Recovery choice: {choice:?}");
        self.handle(FlowEvent::ChoiceMade(choice))
    }

    pub fn on_folder_picked(&mut self, outcome: PickerOutcome) -> Result<(), FlowError> {
        let event = match outcome {
            PickerOutcome::Cancelled => FlowEvent::PickerCancelled,
            PickerOutcome::Picked(location) => match self.resolver.resolve(&location) {
                Some(path) => FlowEvent::FolderChosen(path),
                None => FlowEvent::FolderUnresolvable(location),
            },
        };
        self.handle(event)
    }

    /// Feed one event, run the resulting effects, and follow any synchronous events
    /// they produce. Worker reports also enter here.
    pub fn handle(&mut self, event: FlowEvent) -> Result<(), FlowError> {
        let mut events = VecDeque::from([event]);
        while let Some(event) = events.pop_front() {
            let Transition { state, effects } = transition(&self.state, event)?;
            if state != self.state {
                log::debug!("Flow {} -> {}", self.state.name(), state.name());
            }
            self.state = state;
            for effect in effects {
                if let Some(follow_up) = self.run(effect)? {
                    events.push_back(follow_up);
                }
            }
        }

        if matches!(self.state, FlowState::Ready { .. })
            && let Some(next) = self.pending.pop_front()
        {
            self.start(next)?;
        }
        Ok(())
    }

    fn start(&mut self, trigger: Trigger) -> Result<(), FlowError> {
        let config = self.store.config();
        let entry = match trigger {
            Trigger::Launch => {
                let workdir = config.workdir_or_default(&self.external_root);
                self.warn_about_scoped_storage(&config, &workdir);
                Entry::Startup { workdir }
            }
            Trigger::ChangeFolder => match &self.state {
                FlowState::Ready { workdir } => Entry::ChangeFolder {
                    current: workdir.clone(),
                    validated: true,
                },
                _ => Entry::ChangeFolder {
                    current: config.workdir_or_default(&self.external_root),
                    validated: false,
                },
            },
        };
        log::info!("Starting storage flow: {entry:?}");
        self.handle(FlowEvent::Start(entry))
    }

    fn warn_about_scoped_storage(&mut self, config: &Config, workdir: &Path) {
        if self.platform.is_legacy_storage() || config.storage_warning_shown {
            return;
        }
        self.ui.show_storage_warning(workdir);
        if let Err(e) = self.store.mark_storage_warning_shown() {
            log::error!("Failed to record storage warning: {e}");
        }
    }

    fn run(&mut self, effect: Effect) -> Result<Option<FlowEvent>, FlowError> {
        match effect {
            Effect::ProbeCapabilities => Ok(Some(FlowEvent::CapabilitiesProbed(
                self.probe.probe(&self.platform),
            ))),
            Effect::RequestCapabilities => match self.requester.request_all(&mut self.platform) {
                RequestOutcome::PromptShown(capabilities) => {
                    self.requested = capabilities;
                    Ok(Some(FlowEvent::PromptShown))
                }
                RequestOutcome::RedirectedToSettings => Ok(Some(FlowEvent::SettingsOpened)),
                RequestOutcome::NothingToRequest => Ok(Some(FlowEvent::PermissionResult(
                    StorageCapabilityState::Granted,
                ))),
            },
            Effect::Validate(path) => {
                self.fs.submit(FsJob::Validate(path))?;
                Ok(None)
            }
            Effect::Initialize(path) => {
                self.fs.submit(FsJob::Initialize(path))?;
                Ok(None)
            }
            Effect::Present(branch) => {
                let dialog = RecoveryDialog::for_branch(&branch);
                log::info!(
                    "Presenting {} dialog ({})",
                    branch.name(),
                    dialog.message_key
                );
                self.ui.present(&dialog);
                Ok(None)
            }
            Effect::OpenPicker { hint } => {
                self.ui.open_folder_picker(hint.as_deref());
                Ok(None)
            }
            Effect::Commit(path) => match self.store.commit_workdir(&path) {
                Ok(changed) => {
                    log::info!("Workdir ready: {}", path.display());
                    self.ui.workdir_ready(&path, changed);
                    Ok(None)
                }
                Err(e) => Ok(Some(FlowEvent::CommitFailed {
                    path,
                    reason: e.to_string(),
                })),
            },
            Effect::Exit => {
                log::info!("Exiting at user request");
                self.ui.exit();
                Ok(None)
            }
        }
    }
}
