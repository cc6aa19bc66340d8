//! Burn job state machine
//!
//! Each disc plan runs through an explicit tagged state enum driven by a
//! pure transition function, so the legal edges are testable without any
//! of the I/O that triggers them. Jobs never move backward; the single
//! sanctioned reset is Failed -> Pending for a retry under the attempt
//! limit, which restages the disc from scratch.

use crate::core::DiscPlan;
use crate::error::Error;
use crate::staging::DiscImage;

/// Lifecycle state of one burn job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Pending,
    Staging,
    Staged,
    Burning,
    Verifying,
    Done,
    Failed,
}

impl JobStatus {
    /// Done and Failed accept no further events
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Done | JobStatus::Failed)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            JobStatus::Pending => "pending",
            JobStatus::Staging => "staging",
            JobStatus::Staged => "staged",
            JobStatus::Burning => "burning",
            JobStatus::Verifying => "verifying",
            JobStatus::Done => "done",
            JobStatus::Failed => "failed",
        };
        write!(f, "{}", name)
    }
}

/// Events that advance a job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobEvent {
    /// The orchestrator dequeued this job and staging begins
    StagingStarted,
    /// Image assembly succeeded
    ImageReady,
    /// Device acquired; the burner process is running
    BurnStarted,
    /// Burner exited cleanly
    BurnFinished,
    /// TOC read-back matched the plan
    VerifyPassed,
    /// The current step failed
    StepFailed,
    /// A retry was granted; the job restages from scratch
    RetryScheduled,
}

/// A transition the state machine does not allow
#[derive(Debug, Clone, thiserror::Error)]
#[error("job cannot apply {event:?} while {status}")]
pub struct InvalidTransition {
    pub status: JobStatus,
    pub event: JobEvent,
}

impl From<InvalidTransition> for Error {
    fn from(t: InvalidTransition) -> Self {
        Error::Internal(t.to_string())
    }
}

/// Pure transition function over the job lifecycle
pub fn next_status(status: JobStatus, event: JobEvent) -> Result<JobStatus, InvalidTransition> {
    use JobEvent::*;
    use JobStatus::*;

    let next = match (status, event) {
        (Pending, StagingStarted) => Staging,
        (Staging, ImageReady) => Staged,
        (Staged, BurnStarted) => Burning,
        (Burning, BurnFinished) => Verifying,
        (Verifying, VerifyPassed) => Done,
        (s, StepFailed) if !s.is_terminal() => Failed,
        (Failed, RetryScheduled) => Pending,
        _ => return Err(InvalidTransition { status, event }),
    };
    Ok(next)
}

/// One disc plan moving through staging, burning, and verification.
///
/// Owned exclusively by the session driving it.
#[derive(Debug)]
pub struct BurnJob {
    pub plan: DiscPlan,
    /// Present from Staged until the job finishes or restages
    pub image: Option<DiscImage>,
    status: JobStatus,
    pub attempts: u32,
    pub last_error: Option<String>,
}

impl BurnJob {
    pub fn new(plan: DiscPlan) -> Self {
        Self {
            plan,
            image: None,
            status: JobStatus::Pending,
            attempts: 0,
            last_error: None,
        }
    }

    pub fn status(&self) -> JobStatus {
        self.status
    }

    pub fn disc_index(&self) -> u32 {
        self.plan.index
    }

    /// Advance the job, returning (from, to) for event reporting
    pub fn apply(&mut self, event: JobEvent) -> Result<(JobStatus, JobStatus), InvalidTransition> {
        let from = self.status;
        let to = next_status(from, event)?;
        log::debug!("Disc {} job: {} -> {}", self.plan.index, from, to);
        self.status = to;
        Ok((from, to))
    }

    /// Record a step failure and its cause
    pub fn fail(&mut self, error: &Error) -> Result<(JobStatus, JobStatus), InvalidTransition> {
        self.last_error = Some(error.to_string());
        self.apply(JobEvent::StepFailed)
    }

    /// Whether another attempt is allowed under `max_retries`
    pub fn can_retry(&self, max_retries: u32) -> bool {
        self.status == JobStatus::Failed && self.attempts < max_retries
    }

    /// Consume one retry: back to Pending with staged state discarded
    pub fn begin_retry(&mut self) -> Result<(JobStatus, JobStatus), InvalidTransition> {
        self.attempts += 1;
        self.image = None;
        self.apply(JobEvent::RetryScheduled)
    }
}
