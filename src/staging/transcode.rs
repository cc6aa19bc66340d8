//! Parallel track transcoding
//!
//! Converts source tracks to canonical staged PCM using a bounded ffmpeg
//! worker pool. The semaphore is shared by every disc in the session, so
//! tracks of different discs transcode concurrently and out of order while
//! total parallelism stays at the configured limit.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::stream::{FuturesUnordered, StreamExt};
use tokio::process::Command;
use tokio::sync::Semaphore;

use crate::core::{DiscPlan, Track};
use crate::error::{Error, Result};
use crate::events::{CancelToken, EventSender, SessionEvent, SessionProgress};
use crate::staging::pcm::{self, PcmPayload};

/// Staged payloads may drift from the probed duration by at most one second
/// before the output is considered malformed
const DURATION_TOLERANCE_FRAMES: u64 = 75;

/// A track with its transcoded payload staged on disk
#[derive(Debug, Clone)]
pub struct StagedTrack {
    pub track: Arc<Track>,
    pub wav_path: PathBuf,
    pub payload: PcmPayload,
}

/// Calculate the optimal number of parallel workers based on CPU cores
fn calculate_worker_count() -> usize {
    let available = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4);

    // Use 75% of cores, clamped between 2 and 8
    ((available as f32 * 0.75).ceil() as usize).clamp(2, 8)
}

/// Locate ffmpeg on PATH
pub fn find_ffmpeg() -> Result<PathBuf> {
    let path_var = std::env::var_os("PATH").unwrap_or_default();
    for dir in std::env::split_paths(&path_var) {
        let candidate = dir.join("ffmpeg");
        if candidate.is_file() {
            return Ok(candidate);
        }
    }
    Err(Error::InvalidConfig(
        "ffmpeg is not installed or not on PATH".to_string(),
    ))
}

/// Bounded transcoder pool shared across all discs of a session
pub struct TranscodePool {
    ffmpeg: PathBuf,
    semaphore: Arc<Semaphore>,
    workers: usize,
}

impl TranscodePool {
    pub fn new(max_workers: Option<usize>) -> Result<Self> {
        Ok(Self::with_ffmpeg(find_ffmpeg()?, max_workers))
    }

    pub fn with_ffmpeg(ffmpeg: PathBuf, max_workers: Option<usize>) -> Self {
        let workers = max_workers
            .filter(|&n| n > 0)
            .unwrap_or_else(calculate_worker_count);
        Self {
            ffmpeg,
            semaphore: Arc::new(Semaphore::new(workers)),
            workers,
        }
    }

    pub fn worker_count(&self) -> usize {
        self.workers
    }

    /// Stage every track of `plan` into `staging_dir`.
    ///
    /// Tracks transcode concurrently under the pool limit; the result is
    /// ordered by the plan's track order. The first failure fails the whole
    /// disc. Cancellation is checked before each track starts; tracks
    /// already running finish their encode.
    pub async fn stage_disc(
        &self,
        plan: &DiscPlan,
        staging_dir: &Path,
        cancel: &CancelToken,
        events: &EventSender,
        progress: &Arc<SessionProgress>,
    ) -> Result<Vec<StagedTrack>> {
        tokio::fs::create_dir_all(staging_dir).await?;

        let mut futures = FuturesUnordered::new();
        let mut cancelled = false;

        for (position, track) in plan.tracks.iter().enumerate() {
            if cancel.is_cancelled() {
                log::info!(
                    "Cancellation requested - not starting remaining tracks of disc {}",
                    plan.index
                );
                cancelled = true;
                break;
            }

            let permit = self
                .semaphore
                .clone()
                .acquire_owned()
                .await
                .map_err(|_| Error::Cancelled)?;
            let ffmpeg = self.ffmpeg.clone();
            let track = track.clone();
            let wav_path = staging_dir.join(format!("track{:02}.wav", position + 1));
            let disc_index = plan.index;
            let events = events.clone();
            let progress = progress.clone();

            futures.push(tokio::spawn(async move {
                let result = stage_track(&ffmpeg, &track, &wav_path).await;

                if let Ok(staged) = &result {
                    progress.add_transcoded_frames(track.duration_frames);
                    progress.increment_staged();
                    let _ = events.send(SessionEvent::TrackStaged {
                        disc: disc_index,
                        title: track.title.clone(),
                        frames: staged.payload.frames,
                    });
                }

                drop(permit);
                (position, result)
            }));
        }

        let mut staged: Vec<Option<StagedTrack>> = vec![None; plan.tracks.len()];
        let mut first_error: Option<Error> = None;

        while let Some(joined) = futures.next().await {
            match joined {
                Ok((position, Ok(track))) => staged[position] = Some(track),
                Ok((_, Err(e))) => {
                    if first_error.is_none() {
                        first_error = Some(e);
                    }
                }
                Err(e) => {
                    if first_error.is_none() {
                        first_error = Some(Error::Transcode {
                            title: format!("disc {}", plan.index),
                            cause: format!("transcode task panicked: {}", e),
                        });
                    }
                }
            }
        }

        if let Some(e) = first_error {
            return Err(e);
        }
        if cancelled {
            return Err(Error::Cancelled);
        }

        Ok(staged.into_iter().flatten().collect())
    }
}

/// Transcode one track to canonical PCM and sanity-check the output
async fn stage_track(ffmpeg: &Path, track: &Arc<Track>, wav_path: &Path) -> Result<StagedTrack> {
    let transcode_err = |cause: String| Error::Transcode {
        title: track.title.clone(),
        cause,
    };

    log::debug!("Transcoding {:?} -> {:?}", track.path, wav_path);

    let output = Command::new(ffmpeg)
        .arg("-y")
        .arg("-v")
        .arg("error")
        .arg("-i")
        .arg(&track.path)
        .arg("-ar")
        .arg("44100")
        .arg("-ac")
        .arg("2")
        .arg("-f")
        .arg("wav")
        .arg("-c:a")
        .arg("pcm_s16le")
        .arg(wav_path)
        .output()
        .await
        .map_err(|e| transcode_err(format!("failed to spawn transcoder: {}", e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(transcode_err(format!(
            "transcoder exited with status {}: {}",
            output.status,
            stderr.lines().last().unwrap_or("unknown error")
        )));
    }

    let inspect_path = wav_path.to_path_buf();
    let payload = tokio::task::spawn_blocking(move || pcm::inspect_wav(&inspect_path))
        .await
        .map_err(|e| transcode_err(format!("inspection task failed: {}", e)))?
        .map_err(transcode_err)?;

    let drift = payload.frames.abs_diff(track.duration_frames);
    if drift > DURATION_TOLERANCE_FRAMES {
        return Err(transcode_err(format!(
            "staged payload is {} frames but the track was probed at {} frames",
            payload.frames, track.duration_frames
        )));
    }

    log::debug!(
        "Staged '{}': {} frames, checksum {}",
        track.title,
        payload.frames,
        &payload.checksum[..12]
    );

    Ok(StagedTrack {
        track: track.clone(),
        wav_path: wav_path.to_path_buf(),
        payload,
    })
}
