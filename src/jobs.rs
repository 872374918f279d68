//! Bounded polling for long-running remote operations
//!
//! The remote API acknowledges job submissions immediately and expects
//! the client to poll for a terminal state. `JobWaiter` owns that loop:
//! fixed starting interval, exponential backoff capped at a maximum
//! interval, and a hard overall wait bound that surfaces as
//! `CaravanError::Timeout` instead of spinning forever against a stuck
//! resource.
//!
//! Sleeping goes through the `Sleeper` trait so tests can substitute an
//! instant fake and drive the loop deterministically.

use std::time::Duration;

use crate::error::{CaravanError, CaravanResult};
use crate::models::{JobHandle, JobStatus};
use crate::remote::JobRunner;

/// Abstraction over blocking sleep
pub trait Sleeper {
    fn sleep(&self, duration: Duration);
}

/// Default sleeper: blocks the calling thread
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Sleeper that returns immediately, for tests
#[derive(Debug, Clone, Copy, Default)]
pub struct InstantSleeper;

impl Sleeper for InstantSleeper {
    fn sleep(&self, _duration: Duration) {}
}

/// Poll timing contract for one wait
#[derive(Debug, Clone, Copy)]
pub struct WaitPolicy {
    /// Interval before the first and second poll
    pub initial_interval: Duration,
    /// Backoff ceiling; intervals double until they reach this
    pub max_interval: Duration,
    /// Hard bound on total time slept before `Timeout`
    pub max_wait: Duration,
}

impl Default for WaitPolicy {
    fn default() -> Self {
        Self {
            initial_interval: Duration::from_secs(5),
            max_interval: Duration::from_secs(60),
            max_wait: Duration::from_secs(900),
        }
    }
}

impl WaitPolicy {
    pub fn from_secs(initial: u64, max_interval: u64, max_wait: u64) -> Self {
        Self {
            initial_interval: Duration::from_secs(initial),
            max_interval: Duration::from_secs(max_interval),
            max_wait: Duration::from_secs(max_wait),
        }
    }
}

/// Terminal result of a polled job
///
/// Failed, Cancelled and Deduped are outcomes, not errors: the engine
/// reports them and continues with the next artifact.
#[derive(Debug, Clone)]
pub struct JobOutcome {
    pub handle: JobHandle,
    pub status: JobStatus,
}

impl JobOutcome {
    pub fn succeeded(&self) -> bool {
        self.status == JobStatus::Completed
    }

    /// Failure reason for reporting, if the job did not complete
    pub fn failure_reason(&self) -> Option<String> {
        match &self.status {
            JobStatus::Completed => None,
            JobStatus::Failed { reason } => Some(reason.clone()),
            JobStatus::Cancelled => Some("cancelled".to_string()),
            JobStatus::Deduped => Some("deduped with an identical running job".to_string()),
            JobStatus::NotStarted | JobStatus::InProgress => None,
        }
    }
}

/// Submit/poll loop for long-running remote operations
pub struct JobWaiter<S: Sleeper = ThreadSleeper> {
    policy: WaitPolicy,
    sleeper: S,
}

impl JobWaiter<ThreadSleeper> {
    pub fn new(policy: WaitPolicy) -> Self {
        Self {
            policy,
            sleeper: ThreadSleeper,
        }
    }
}

impl<S: Sleeper> JobWaiter<S> {
    pub fn with_sleeper(policy: WaitPolicy, sleeper: S) -> Self {
        Self { policy, sleeper }
    }

    /// Poll a submitted job until it reaches a terminal state.
    ///
    /// `operation` names the wait in timeout errors and events.
    pub fn poll_until_terminal(
        &self,
        runner: &dyn JobRunner,
        handle: JobHandle,
        operation: &str,
    ) -> CaravanResult<JobOutcome> {
        let mut interval = self.policy.initial_interval;
        let mut waited = Duration::ZERO;

        loop {
            let status = runner.status(&handle)?;
            if status.is_terminal() {
                return Ok(JobOutcome { handle, status });
            }

            if waited >= self.policy.max_wait {
                return Err(CaravanError::Timeout {
                    operation: operation.to_string(),
                    waited_secs: waited.as_secs(),
                });
            }

            self.sleeper.sleep(interval);
            waited += interval;
            interval = (interval * 2).min(self.policy.max_interval);
        }
    }

    /// Poll a readiness probe until it reports true.
    ///
    /// Same timing contract as job polling, different terminal
    /// predicate: used for resources that expose a provisioning flag
    /// rather than a job id (query endpoints).
    pub fn wait_until_ready<F>(&self, operation: &str, mut probe: F) -> CaravanResult<()>
    where
        F: FnMut() -> CaravanResult<bool>,
    {
        let mut interval = self.policy.initial_interval;
        let mut waited = Duration::ZERO;

        loop {
            if probe()? {
                return Ok(());
            }

            if waited >= self.policy.max_wait {
                return Err(CaravanError::Timeout {
                    operation: operation.to_string(),
                    waited_secs: waited.as_secs(),
                });
            }

            self.sleeper.sleep(interval);
            waited += interval;
            interval = (interval * 2).min(self.policy.max_interval);
        }
    }
}
