//! # Aggregation Orchestrator
//!
//! Runs one [`AggregationJob`] per planned repository on a bounded worker
//! pool and collects failures without letting one repository stop its
//! siblings.
//!
//! ## Job lifecycle
//!
//! ```text
//! Pending ──(dirmatch)──> Skipped
//!    │
//!    └──> Admitted ──> Running ──> Completed | Failed
//!            │
//!            └──(earlier failure, StopOnError)──> NotStarted
//! ```
//!
//! Jobs that fail the directory filter are dropped before the pool is
//! involved, so they never occupy a worker. A job is admitted when a worker
//! picks it up. With [`AdmissionPolicy::StopOnError`] a worker that finds the
//! error collection non-empty at that moment leaves the job unstarted; jobs
//! already running always finish. [`AdmissionPolicy::KeepGoing`] admits every
//! job.
//!
//! Failures, including panics inside the [`RepoSync`] implementation, become
//! [`ErrorRecord`]s in a shared `Mutex<Vec<_>>`. The collection is read only
//! after every worker has returned.
//!
//! With a single job slot everything runs on the calling thread.

use std::any::Any;
use std::backtrace::{Backtrace, BacktraceStatus};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::thread;

use log::{debug, error, info};
use rayon::prelude::*;

use crate::error::{Error, Result};
use crate::path::DirMatch;
use crate::planner::RepoSpec;
use crate::repository::RepoSync;

/// One repository synchronization request.
#[derive(Debug, Clone)]
pub struct AggregationJob {
    pub spec: RepoSpec,
    pub dirmatch: Option<DirMatch>,
    /// Passed through to the sync implementation.
    pub force: bool,
}

impl AggregationJob {
    pub fn new(spec: RepoSpec, force: bool) -> Self {
        Self {
            spec,
            dirmatch: None,
            force,
        }
    }

    pub fn with_dirmatch(mut self, dirmatch: Option<DirMatch>) -> Self {
        self.dirmatch = dirmatch;
        self
    }

    /// Whether the job passes its directory filter.
    pub fn selected(&self) -> bool {
        self.dirmatch
            .as_ref()
            .map_or(true, |dirmatch| dirmatch.matches(&self.spec.path))
    }
}

/// What happens to pending jobs once a failure has been recorded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AdmissionPolicy {
    /// Stop admitting new jobs. Running jobs finish.
    #[default]
    StopOnError,
    /// Admit every job regardless of earlier failures.
    KeepGoing,
}

#[derive(Debug, Clone)]
pub struct AggregationOptions {
    /// Worker count. Zero is treated as one.
    pub jobs: usize,
    /// Directory glob selecting the repositories to synchronize.
    pub dirmatch: Option<String>,
    pub force: bool,
    pub policy: AdmissionPolicy,
    /// Base for relative `dirmatch` patterns.
    pub root: PathBuf,
}

impl Default for AggregationOptions {
    fn default() -> Self {
        Self {
            jobs: default_jobs(),
            dirmatch: None,
            force: false,
            policy: AdmissionPolicy::default(),
            root: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
        }
    }
}

/// Number of logical cores, or one if it cannot be determined.
pub fn default_jobs() -> usize {
    thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// A failed job.
#[derive(Debug)]
pub struct ErrorRecord {
    /// Filesystem target of the job.
    pub path: PathBuf,
    pub error: Error,
    /// Where a panic was caught, when `RUST_BACKTRACE` enables capturing.
    pub backtrace: Option<Backtrace>,
}

impl ErrorRecord {
    pub fn new(path: PathBuf, error: Error) -> Self {
        Self {
            path,
            error,
            backtrace: None,
        }
    }

    /// Attach `backtrace` if it actually holds frames.
    pub fn with_backtrace(mut self, backtrace: Backtrace) -> Self {
        if backtrace.status() == BacktraceStatus::Captured {
            self.backtrace = Some(backtrace);
        }
        self
    }

    pub fn kind(&self) -> &'static str {
        self.error.kind()
    }
}

impl fmt::Display for ErrorRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]: {}", self.path.display(), self.kind(), self.error)?;
        if let Some(backtrace) = &self.backtrace {
            write!(f, "\n  stack backtrace:\n{}", backtrace)?;
        }
        Ok(())
    }
}

/// Outcome of a run.
#[derive(Debug, Default)]
pub struct AggregationReport {
    pub completed: Vec<PathBuf>,
    /// Rejected by the directory filter.
    pub skipped: Vec<PathBuf>,
    /// Admission refused after an earlier failure.
    pub not_started: Vec<PathBuf>,
    pub errors: Vec<ErrorRecord>,
}

impl AggregationReport {
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn total(&self) -> usize {
        self.completed.len() + self.skipped.len() + self.not_started.len() + self.errors.len()
    }

    /// Turn a report with failures into [`Error::AggregationAbort`].
    pub fn into_result(self) -> Result<AggregationReport> {
        if self.errors.is_empty() {
            Ok(self)
        } else {
            Err(Error::AggregationAbort {
                errors: self.errors,
            })
        }
    }
}

#[derive(Default)]
struct RunState {
    completed: Mutex<Vec<PathBuf>>,
    not_started: Mutex<Vec<PathBuf>>,
    errors: Mutex<Vec<ErrorRecord>>,
}

// Panics are turned into records, so a poisoned lock still holds valid data.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn into_inner<T>(mutex: Mutex<T>) -> T {
    mutex.into_inner().unwrap_or_else(PoisonError::into_inner)
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Runs aggregation jobs against a [`RepoSync`] implementation.
pub struct Aggregator<S: RepoSync> {
    sync: S,
}

impl<S: RepoSync> Aggregator<S> {
    pub fn new(sync: S) -> Self {
        Self { sync }
    }

    pub fn sync(&self) -> &S {
        &self.sync
    }

    /// Synchronize every spec that passes the filter.
    ///
    /// Only setup problems (an invalid glob, a pool that cannot be built) are
    /// returned as `Err`. Job failures are in the report.
    pub fn run(&self, specs: Vec<RepoSpec>, options: &AggregationOptions) -> Result<AggregationReport> {
        let dirmatch = options
            .dirmatch
            .as_deref()
            .map(|glob| DirMatch::new(glob, &options.root))
            .transpose()?;

        let (admitted, filtered): (Vec<AggregationJob>, Vec<AggregationJob>) = specs
            .into_iter()
            .map(|spec| AggregationJob::new(spec, options.force).with_dirmatch(dirmatch.clone()))
            .partition(AggregationJob::selected);

        let skipped: Vec<PathBuf> = filtered.into_iter().map(|job| job.spec.path).collect();
        for path in &skipped {
            debug!("Skipping {} (no dirmatch)", path.display());
        }

        let state = RunState::default();
        let workers = options.jobs.max(1);
        if workers == 1 {
            for job in &admitted {
                self.execute(job, options.policy, &state);
            }
        } else {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(workers)
                .build()?;
            pool.install(|| {
                admitted
                    .par_iter()
                    .for_each(|job| self.execute(job, options.policy, &state));
            });
        }

        let report = AggregationReport {
            completed: into_inner(state.completed),
            skipped,
            not_started: into_inner(state.not_started),
            errors: into_inner(state.errors),
        };
        for record in &report.errors {
            error!("{}", record);
        }
        Ok(report)
    }

    fn execute(&self, job: &AggregationJob, policy: AdmissionPolicy, state: &RunState) {
        let path = job.spec.path.clone();
        if policy == AdmissionPolicy::StopOnError && !lock(&state.errors).is_empty() {
            info!("Not starting {} after an earlier failure", path.display());
            lock(&state.not_started).push(path);
            return;
        }

        debug!("Starting {}", path.display());
        let record = match panic::catch_unwind(AssertUnwindSafe(|| self.sync.aggregate(job))) {
            Ok(Ok(())) => None,
            Ok(Err(error)) => Some(ErrorRecord::new(path.clone(), error)),
            Err(payload) => {
                let error = Error::Panic {
                    message: panic_message(payload.as_ref()),
                };
                Some(ErrorRecord::new(path.clone(), error).with_backtrace(Backtrace::capture()))
            }
        };

        match record {
            None => {
                info!("Completed {}", path.display());
                lock(&state.completed).push(path);
            }
            Some(record) => {
                debug!("Failed {}: {}", path.display(), record.error);
                lock(&state.errors).push(record);
            }
        }
    }
}
