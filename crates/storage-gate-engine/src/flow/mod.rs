//! The storage access flow.
//!
//! `state` holds the tagged-variant state and the pure `transition` function. The
//! `Orchestrator` owns the state, executes the effects each transition asks for, and
//! accepts host callbacks as events. Blocking filesystem work goes to the `FsWorker`.

mod orchestrator;
mod state;
mod worker;

pub use orchestrator::{FlowUi, Orchestrator, PickerOutcome, Trigger};
pub use state::{Awaiting, Effect, Entry, FlowEvent, FlowState, Transition, transition};
pub use worker::{FsExecutor, FsJob, FsWorker};
