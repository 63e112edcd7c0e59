use crate::capability::StorageCapabilityState;
use crate::error::{FlowError, StorageFailure};
use crate::recovery::{NextAction, RecoveryBranch, RecoveryChoice, resolve_choice};
use crate::workdir::ValidationResult;
use std::path::PathBuf;

/// Why a flow pass was started
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entry {
    /// Application launch; validates the stored (or default) workdir
    Startup { workdir: PathBuf },
    /// Folder change from settings; opens the picker once access is granted
    ChangeFolder {
        current: PathBuf,
        /// `current` is the workdir of a completed pass, not a first-run default
        validated: bool,
    },
}

/// What a capability request round is waiting on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Awaiting {
    /// The request has not been sent to the platform yet
    Dispatch,
    /// The itemized prompt is showing
    PromptResult,
    /// The user was sent to the broad-access settings screen
    Resume,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum FlowState {
    #[default]
    Idle,
    ProbingCapabilities {
        entry: Entry,
        /// Set once a request round has completed; a second miss shows the denial dialog
        after_request: bool,
    },
    /// Waiting for the permission prompt result or for the return from settings
    RequestingCapabilities { entry: Entry, awaiting: Awaiting },
    ValidatingWorkdir { entry: Entry, path: PathBuf },
    Recovering { entry: Entry, branch: RecoveryBranch },
    PickingFolder {
        entry: Entry,
        /// Dialog to return to on cancel; `None` for the settings entry
        origin: Option<RecoveryBranch>,
    },
    Initializing { entry: Entry, path: PathBuf },
    Ready { workdir: PathBuf },
    Exited,
}

impl FlowState {
    pub fn name(&self) -> &'static str {
        match self {
            FlowState::Idle => "Idle",
            FlowState::ProbingCapabilities { .. } => "ProbingCapabilities",
            FlowState::RequestingCapabilities { .. } => "RequestingCapabilities",
            FlowState::ValidatingWorkdir { .. } => "ValidatingWorkdir",
            FlowState::Recovering { branch, .. } => branch.name(),
            FlowState::PickingFolder { .. } => "PickingFolder",
            FlowState::Initializing { .. } => "Initializing",
            FlowState::Ready { .. } => "Ready",
            FlowState::Exited => "Exited",
        }
    }

    /// No flow pass is in progress
    pub fn is_settled(&self) -> bool {
        matches!(
            self,
            FlowState::Idle | FlowState::Ready { .. } | FlowState::Exited
        )
    }
}

/// Inputs to the state machine. Host callbacks and worker reports are converted
/// into these by the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowEvent {
    Start(Entry),
    CapabilitiesProbed(StorageCapabilityState),
    /// The itemized prompt was launched
    PromptShown,
    /// The broad-access settings screen was opened
    SettingsOpened,
    /// Reduced result of the itemized permission prompt
    PermissionResult(StorageCapabilityState),
    /// The host came back to the foreground
    HostResumed,
    Validated(ValidationResult),
    Initialized(PathBuf),
    InitializeFailed { path: PathBuf, reason: String },
    /// The chosen workdir could not be persisted
    CommitFailed { path: PathBuf, reason: String },
    ChoiceMade(RecoveryChoice),
    FolderChosen(PathBuf),
    /// The picker returned a location that does not map to a path
    FolderUnresolvable(String),
    PickerCancelled,
}

/// Work the orchestrator performs after a transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    ProbeCapabilities,
    RequestCapabilities,
    Validate(PathBuf),
    Initialize(PathBuf),
    Present(RecoveryBranch),
    OpenPicker { hint: Option<PathBuf> },
    /// Confirm `path` as the persisted workdir and release the application
    Commit(PathBuf),
    Exit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub state: FlowState,
    pub effects: Vec<Effect>,
}

impl Transition {
    fn to(state: FlowState, effects: Vec<Effect>) -> Self {
        Self { state, effects }
    }

    fn stay(state: &FlowState) -> Self {
        Self::to(state.clone(), Vec::new())
    }
}

fn recover(entry: &Entry, branch: RecoveryBranch) -> Transition {
    Transition::to(
        FlowState::Recovering {
            entry: entry.clone(),
            branch: branch.clone(),
        },
        vec![Effect::Present(branch)],
    )
}

fn validating(entry: &Entry, path: PathBuf) -> Transition {
    Transition::to(
        FlowState::ValidatingWorkdir {
            entry: entry.clone(),
            path: path.clone(),
        },
        vec![Effect::Validate(path)],
    )
}

fn probing(entry: &Entry, after_request: bool) -> Transition {
    Transition::to(
        FlowState::ProbingCapabilities {
            entry: entry.clone(),
            after_request,
        },
        vec![Effect::ProbeCapabilities],
    )
}

fn requesting(entry: &Entry) -> Transition {
    Transition::to(
        FlowState::RequestingCapabilities {
            entry: entry.clone(),
            awaiting: Awaiting::Dispatch,
        },
        vec![Effect::RequestCapabilities],
    )
}

fn access_granted(entry: &Entry) -> Transition {
    match entry {
        Entry::Startup { workdir } => validating(entry, workdir.clone()),
        Entry::ChangeFolder { current, .. } => Transition::to(
            FlowState::PickingFolder {
                entry: entry.clone(),
                origin: None,
            },
            vec![Effect::OpenPicker {
                hint: Some(current.clone()),
            }],
        ),
    }
}

fn unexpected(state: &FlowState, event: &FlowEvent) -> FlowError {
    FlowError::UnexpectedEvent {
        state: state.name(),
        event: format!("{event:?}"),
    }
}

/// Compute the next state and the effects to run. Pure: no I/O, no host calls.
pub fn transition(state: &FlowState, event: FlowEvent) -> Result<Transition, FlowError> {
    // Resumes arrive on every foreground; they only matter after a settings redirect
    if event == FlowEvent::HostResumed {
        return Ok(match state {
            FlowState::RequestingCapabilities {
                entry,
                awaiting: Awaiting::Resume,
            } => probing(entry, true),
            _ => Transition::stay(state),
        });
    }

    let next = match (state, event) {
        (FlowState::Exited, _) => return Err(FlowError::Terminated),

        (FlowState::Idle | FlowState::Ready { .. }, FlowEvent::Start(entry)) => {
            probing(&entry, false)
        }

        (
            FlowState::ProbingCapabilities {
                entry,
                after_request,
            },
            FlowEvent::CapabilitiesProbed(capabilities),
        ) => {
            if capabilities.is_granted() {
                access_granted(entry)
            } else if *after_request {
                log::warn!("{}", StorageFailure::CapabilityDenied);
                recover(entry, StorageFailure::CapabilityDenied.branch())
            } else {
                requesting(entry)
            }
        }

        (
            FlowState::RequestingCapabilities {
                entry,
                awaiting: Awaiting::Dispatch,
            },
            FlowEvent::PromptShown,
        ) => Transition::to(
            FlowState::RequestingCapabilities {
                entry: entry.clone(),
                awaiting: Awaiting::PromptResult,
            },
            Vec::new(),
        ),

        (
            FlowState::RequestingCapabilities {
                entry,
                awaiting: Awaiting::Dispatch,
            },
            FlowEvent::SettingsOpened,
        ) => Transition::to(
            FlowState::RequestingCapabilities {
                entry: entry.clone(),
                awaiting: Awaiting::Resume,
            },
            Vec::new(),
        ),

        (
            FlowState::RequestingCapabilities {
                entry,
                awaiting: Awaiting::Dispatch | Awaiting::PromptResult,
            },
            FlowEvent::PermissionResult(_),
        ) => {
            // The reduced result is advisory; the probe is authoritative
            probing(entry, true)
        }

        (FlowState::ValidatingWorkdir { entry, path }, FlowEvent::Validated(result))
            if result.path() == path.as_path() =>
        {
            match result {
                ValidationResult::Ready(path) => Transition::to(
                    FlowState::Initializing {
                        entry: entry.clone(),
                        path: path.clone(),
                    },
                    vec![Effect::Initialize(path)],
                ),
                ValidationResult::CreatableAtPath(path) => {
                    recover(entry, RecoveryBranch::Creatable(path))
                }
                ValidationResult::Unusable(path) => {
                    recover(entry, StorageFailure::PathUnusable(path).branch())
                }
            }
        }

        (FlowState::Initializing { path, .. }, FlowEvent::Initialized(done))
            if &done == path =>
        {
            Transition::to(
                FlowState::Ready {
                    workdir: done.clone(),
                },
                vec![Effect::Commit(done)],
            )
        }

        (
            FlowState::Initializing { entry, path },
            FlowEvent::InitializeFailed {
                path: failed,
                reason,
            },
        ) if &failed == path => {
            let failure = StorageFailure::CreationRaceFailure {
                path: failed,
                reason,
            };
            log::warn!("{failure}");
            recover(entry, failure.branch())
        }

        (
            FlowState::Ready { workdir },
            FlowEvent::CommitFailed {
                path: failed,
                reason,
            },
        ) if &failed == workdir => {
            log::error!("Failed to persist workdir {}: {reason}", failed.display());
            let entry = Entry::Startup {
                workdir: failed.clone(),
            };
            recover(&entry, StorageFailure::PathUnusable(failed).branch())
        }

        (FlowState::Recovering { entry, branch }, FlowEvent::ChoiceMade(choice)) => {
            match resolve_choice(branch, choice)? {
                NextAction::RequestCapabilities => requesting(entry),
                NextAction::Revalidate(path) => validating(entry, path),
                NextAction::Initialize(path) => Transition::to(
                    FlowState::Initializing {
                        entry: entry.clone(),
                        path: path.clone(),
                    },
                    vec![Effect::Initialize(path)],
                ),
                NextAction::OpenPicker { hint } => Transition::to(
                    FlowState::PickingFolder {
                        entry: entry.clone(),
                        origin: Some(branch.clone()),
                    },
                    vec![Effect::OpenPicker { hint }],
                ),
                NextAction::Exit => Transition::to(FlowState::Exited, vec![Effect::Exit]),
            }
        }

        (FlowState::PickingFolder { entry, .. }, FlowEvent::FolderChosen(path)) => {
            validating(entry, path)
        }

        (FlowState::PickingFolder { entry, .. }, FlowEvent::FolderUnresolvable(location)) => {
            recover(
                entry,
                StorageFailure::PathUnusable(PathBuf::from(location)).branch(),
            )
        }

        (FlowState::PickingFolder { entry, origin }, FlowEvent::PickerCancelled) => {
            match (origin, entry) {
                (Some(branch), _) => recover(entry, branch.clone()),
                (
                    None,
                    Entry::ChangeFolder {
                        current,
                        validated: true,
                    },
                ) => Transition::to(
                    FlowState::Ready {
                        workdir: current.clone(),
                    },
                    vec![Effect::Commit(current.clone())],
                ),
                // Nothing validated to fall back on: check the current path like a launch would
                (
                    None,
                    Entry::ChangeFolder {
                        current: workdir, ..
                    }
                    | Entry::Startup { workdir },
                ) => validating(entry, workdir.clone()),
            }
        }

        (state, event) => return Err(unexpected(state, &event)),
    };

    Ok(next)
}
