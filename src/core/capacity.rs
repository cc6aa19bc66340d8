//! Red Book capacity accounting
//!
//! Pure frame arithmetic shared by the planner, the image stager, and the
//! burn pipeline. All disc math is done in frames (1/75 second), never in
//! rounded seconds.

use serde::{Deserialize, Serialize};

use crate::core::Track;
use crate::error::{Error, Result};

/// Smallest addressable audio time unit: 75 frames per second
pub const FRAMES_PER_SECOND: u64 = 75;

/// One frame of 16-bit, 44.1 kHz stereo PCM: 588 samples * 4 bytes
pub const BYTES_PER_FRAME: u64 = 2352;

/// Inter-track gap charged per track after the first in TAO mode (2 seconds)
pub const TAO_GAP_FRAMES: u64 = 150;

/// Write mode for a disc; affects gap overhead only
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiscMode {
    /// Disk-At-Once: one continuous stream, no inter-track silence
    Dao,
    /// Track-At-Once: a fixed 2-second gap before every track after the first
    Tao,
}

impl std::fmt::Display for DiscMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DiscMode::Dao => write!(f, "DAO"),
            DiscMode::Tao => write!(f, "TAO"),
        }
    }
}

/// Physical disc size
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiscLength {
    /// 74-minute Red Book disc
    Minutes74,
    /// 80-minute Red Book disc
    Minutes80,
}

impl DiscLength {
    /// Total audio capacity in frames
    pub fn capacity_frames(&self) -> u64 {
        match self {
            DiscLength::Minutes74 => 333_000,
            DiscLength::Minutes80 => 360_000,
        }
    }
}

impl std::fmt::Display for DiscLength {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DiscLength::Minutes74 => write!(f, "74min"),
            DiscLength::Minutes80 => write!(f, "80min"),
        }
    }
}

/// Capacity charge of a single track, rejecting degenerate durations
pub fn frames_of(track: &Track) -> Result<u64> {
    if track.duration_frames == 0 {
        return Err(Error::InvalidTrack {
            path: track.path.clone(),
            reason: "track has zero duration".to_string(),
        });
    }
    Ok(track.duration_frames)
}

/// Total gap overhead for a disc holding `track_count` tracks
pub fn disc_overhead_frames(mode: DiscMode, track_count: usize) -> u64 {
    match mode {
        DiscMode::Dao => 0,
        DiscMode::Tao => TAO_GAP_FRAMES * track_count.saturating_sub(1) as u64,
    }
}

/// Incremental gap cost of appending one more track to a disc that already
/// holds `tracks_on_disc` tracks
pub fn gap_delta(mode: DiscMode, tracks_on_disc: usize) -> u64 {
    match mode {
        DiscMode::Dao => 0,
        DiscMode::Tao => {
            if tracks_on_disc == 0 {
                0
            } else {
                TAO_GAP_FRAMES
            }
        }
    }
}

/// Exact frame count of `samples` at `sample_rate`, rounded up to whole frames
pub fn frames_from_samples(samples: u64, sample_rate: u32) -> u64 {
    if sample_rate == 0 {
        return 0;
    }
    (samples * FRAMES_PER_SECOND).div_ceil(sample_rate as u64)
}

/// Render a frame offset as MM:SS:FF for cue sheets
pub fn msf(frames: u64) -> String {
    let ff = frames % FRAMES_PER_SECOND;
    let total_secs = frames / FRAMES_PER_SECOND;
    let ss = total_secs % 60;
    let mm = total_secs / 60;
    format!("{:02}:{:02}:{:02}", mm, ss, ff)
}

/// Render a frame count as a human-readable M:SS duration
pub fn format_duration(frames: u64) -> String {
    let total_secs = frames / FRAMES_PER_SECOND;
    format!("{}:{:02}", total_secs / 60, total_secs % 60)
}
