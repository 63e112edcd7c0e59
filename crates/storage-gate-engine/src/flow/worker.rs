use super::state::FlowEvent;
use crate::error::FlowError;
use crate::workdir::{WorkdirLayout, initialize, validate};
use std::io;
use std::path::PathBuf;
use std::sync::mpsc::{self, Sender};
use std::thread::{self, JoinHandle};

/// Blocking filesystem work requested by the flow
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FsJob {
    Validate(PathBuf),
    Initialize(PathBuf),
}

impl FsJob {
    /// Run the job on the current thread and describe the outcome as a flow event
    pub fn run(self, layout: &WorkdirLayout) -> FlowEvent {
        match self {
            FsJob::Validate(path) => FlowEvent::Validated(validate(&path)),
            FsJob::Initialize(path) => match initialize(&path, layout) {
                Ok(()) => FlowEvent::Initialized(path),
                Err(e) => {
                    log::error!("Failed to initialize {}: {e}", path.display());
                    FlowEvent::InitializeFailed {
                        path,
                        reason: e.to_string(),
                    }
                }
            },
        }
    }
}

/// Somewhere to send filesystem jobs. Results come back as `FlowEvent`s through
/// whatever channel the executor was built with.
pub trait FsExecutor {
    fn submit(&self, job: FsJob) -> Result<(), FlowError>;
}

/// Dedicated thread for validation and creation, keeping them off the UI thread.
///
/// Each finished job is handed to the `deliver` callback, which routes the event
/// back to whichever thread owns the orchestrator.
#[derive(Debug)]
pub struct FsWorker {
    jobs: Option<Sender<FsJob>>,
    handle: Option<JoinHandle<()>>,
}

impl FsWorker {
    pub fn spawn<F>(layout: WorkdirLayout, deliver: F) -> io::Result<Self>
    where
        F: Fn(FlowEvent) + Send + 'static,
    {
        let (jobs, inbox) = mpsc::channel::<FsJob>();
        let handle = thread::Builder::new()
            .name("workdir-fs".to_string())
            .spawn(move || {
                for job in inbox {
                    log::debug!("Running {job:?}");
                    deliver(job.run(&layout));
                }
                log::debug!("Filesystem worker stopped");
            })?;

        Ok(Self {
            jobs: Some(jobs),
            handle: Some(handle),
        })
    }
}

impl FsExecutor for FsWorker {
    fn submit(&self, job: FsJob) -> Result<(), FlowError> {
        self.jobs
            .as_ref()
            .ok_or(FlowError::WorkerGone)?
            .send(job)
            .map_err(|_| FlowError::WorkerGone)
    }
}

impl Drop for FsWorker {
    fn drop(&mut self) {
        // Closing the channel ends the worker loop
        self.jobs.take();
        let Some(handle) = self.handle.take() else {
            return;
        };
        // The last owner can be dropped from inside `deliver`; the loop ends by itself then
        if handle.thread().id() == thread::current().id() {
            return;
        }
        if handle.join().is_err() {
            log::error!("Filesystem worker panicked");
        }
    }
}
