use crate::recovery::{RecoveryBranch, RecoveryChoice};
use std::path::PathBuf;

/// Recoverable storage failures. Each one is answered with a recovery dialog,
/// never by proceeding.
///
/// A cancelled folder pick is not a failure: the flow re-presents the dialog the
/// pick was started from.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StorageFailure {
    #[error("Storage access was not granted")]
    CapabilityDenied,
    #[error("Working directory {} cannot be used", .0.display())]
    PathUnusable(PathBuf),
    #[error("Working directory {} became unusable during creation: {reason}", .path.display())]
    CreationRaceFailure { path: PathBuf, reason: String },
}

impl StorageFailure {
    /// Dialog branch that handles this failure
    pub fn branch(&self) -> RecoveryBranch {
        match self {
            StorageFailure::CapabilityDenied => RecoveryBranch::CapabilityDenied,
            StorageFailure::PathUnusable(path)
            | StorageFailure::CreationRaceFailure { path, .. } => {
                RecoveryBranch::Unusable(path.clone())
            }
        }
    }
}

/// Misuse of the flow by its host, or host-side breakage
#[derive(Debug, thiserror::Error)]
pub enum FlowError {
    #[error("{choice:?} is not offered for {branch:?}")]
    InvalidChoice {
        choice: RecoveryChoice,
        branch: RecoveryBranch,
    },
    #[error("Event {event} is not valid in state {state}")]
    UnexpectedEvent { state: &'static str, event: String },
    #[error("The flow has exited")]
    Terminated,
    #[error("Filesystem worker is no longer running")]
    WorkerGone,
}
