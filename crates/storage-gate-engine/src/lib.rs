//! Storage access acquisition and working-directory validation.
//!
//! The engine is split into policy and plumbing:
//!
//! - **`capability`**: the OS-version capability table, the probe and the two request
//!   strategies (itemized prompt, broad-access settings redirect)
//! - **`workdir`**: directory validation precedence and initialization of the layout
//! - **`recovery`**: branch-specific dialog choice sets and the action each choice leads to
//! - **`flow`**: the tagged-variant state machine, its pure transition function, and the
//!   orchestrator that turns host callbacks into events
//!
//! Hosts (the Android bindings, the terminal frontend) implement `CapabilityPlatform`
//! and `FlowUi`, then feed their callbacks into `Orchestrator`.

pub mod capability;
pub mod error;
pub mod flow;
pub mod location;
pub mod recovery;
pub mod workdir;

#[cfg(test)]
pub mod tests;

// Re-export key types for easier usage
pub use capability::{
    Capability, CapabilityPlatform, CapabilityProbe, CapabilityRequester, CapabilityRule,
    CapabilityTable, RequestOutcome, RequestStrategy, StorageCapabilityState,
};
pub use error::{FlowError, StorageFailure};
pub use flow::{
    Awaiting, Effect, Entry, FlowEvent, FlowState, FlowUi, FsExecutor, FsJob, FsWorker,
    Orchestrator, PickerOutcome, Transition, Trigger, transition,
};
pub use location::{LocationResolver, StorageLocationResolver};
pub use recovery::{NextAction, RecoveryBranch, RecoveryChoice, RecoveryDialog};
pub use workdir::{InitError, PathKind, ValidationResult, WorkdirLayout};
