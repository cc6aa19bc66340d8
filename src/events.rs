//! Session events and shared progress
//!
//! The orchestrator publishes a read-only event stream for whatever front
//! end is attached; the front end never mutates core state and talks back
//! only through the cancel token.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use crate::burning::JobStatus;

/// Events emitted while a session runs
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// Planning finished; staging is about to begin
    PlanReady {
        discs: usize,
        tracks: usize,
        total_frames: u64,
    },
    /// A burn job moved through its state machine
    JobStatusChanged {
        disc: u32,
        from: JobStatus,
        to: JobStatus,
    },
    /// One track finished transcoding
    TrackStaged { disc: u32, title: String, frames: u64 },
    /// Burner progress for the disc currently writing
    BurnProgress { disc: u32, percent: f32 },
    /// A job failed; it may still be retried
    JobFailed {
        disc: u32,
        attempts: u32,
        error: String,
    },
    /// A failed job is going around again, restaging from scratch
    JobRetrying { disc: u32, attempt: u32 },
    /// A job reached Done
    JobDone { disc: u32 },
    /// Terminal summary
    SessionFinished {
        completed: usize,
        failed: usize,
        cancelled: usize,
    },
}

/// Sender half of the session event stream
pub type EventSender = tokio::sync::mpsc::UnboundedSender<SessionEvent>;

/// Receiver half handed to the presentation layer
pub type EventReceiver = tokio::sync::mpsc::UnboundedReceiver<SessionEvent>;

/// Cooperative cancellation signal, checked at task and step boundaries
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Aggregate progress counters shared across staging tasks
#[derive(Debug)]
pub struct SessionProgress {
    frames_transcoded: AtomicU64,
    tracks_staged: AtomicUsize,
    discs_completed: AtomicUsize,
    discs_failed: AtomicUsize,
    /// Total planned frames across all discs, gaps excluded
    pub total_track_frames: u64,
}

impl SessionProgress {
    pub fn new(total_track_frames: u64) -> Self {
        Self {
            frames_transcoded: AtomicU64::new(0),
            tracks_staged: AtomicUsize::new(0),
            discs_completed: AtomicUsize::new(0),
            discs_failed: AtomicUsize::new(0),
            total_track_frames,
        }
    }

    pub fn add_transcoded_frames(&self, frames: u64) {
        self.frames_transcoded.fetch_add(frames, Ordering::SeqCst);
    }

    pub fn increment_staged(&self) -> usize {
        self.tracks_staged.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn increment_completed(&self) -> usize {
        self.discs_completed.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn increment_failed(&self) -> usize {
        self.discs_failed.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn transcoded_frames(&self) -> u64 {
        self.frames_transcoded.load(Ordering::SeqCst)
    }

    pub fn staged_count(&self) -> usize {
        self.tracks_staged.load(Ordering::SeqCst)
    }

    pub fn completed_count(&self) -> usize {
        self.discs_completed.load(Ordering::SeqCst)
    }

    pub fn failed_count(&self) -> usize {
        self.discs_failed.load(Ordering::SeqCst)
    }
}
