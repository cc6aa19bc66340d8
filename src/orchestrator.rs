//! Session orchestration
//!
//! Drives a full run: plan once, stage every disc through the shared
//! transcoder pool, then burn strictly in disc order. Staging for later
//! discs overlaps earlier burns, but a later disc never starts burning
//! before the earlier disc reaches a terminal state. Failed jobs restage
//! from scratch until their retry budget runs out; cancellation stops new
//! work at step boundaries and never interrupts an active write.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;

use crate::burning::{self, wodim, BurnerDevice, BurnJob, JobEvent, JobStatus};
use crate::core::{plan_discs, plan_discs_filling_gaps, DiscPlan, SessionSettings, Track};
use crate::error::{Error, Result};
use crate::events::{CancelToken, EventSender, SessionEvent, SessionProgress};
use crate::staging::{assemble_image, DiscImage, TranscodePool};

/// How tracks are packed onto discs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PackingStrategy {
    /// Preserve play order across all discs (first-fit in order)
    #[default]
    Sequential,
    /// Minimize disc count by filling leftover space with later tracks
    FillGaps,
}

/// Outcome of one session
#[derive(Debug)]
pub struct SessionReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Disc indices that reached Done
    pub completed: Vec<u32>,
    /// Disc indices that failed permanently, with the final cause
    pub failed: Vec<(u32, String)>,
    /// Disc indices reported as cancelled rather than failed
    pub cancelled: Vec<u32>,
    pub frames_transcoded: u64,
}

impl SessionReport {
    pub fn all_done(&self) -> bool {
        self.failed.is_empty() && self.cancelled.is_empty()
    }
}

/// Sequences planning, staging, burning, and verification for one session
pub struct Orchestrator {
    settings: SessionSettings,
    pool: Arc<TranscodePool>,
    device: BurnerDevice,
    events: EventSender,
    cancel: CancelToken,
    staging_root: PathBuf,
}

impl Orchestrator {
    pub fn new(
        settings: SessionSettings,
        pool: TranscodePool,
        events: EventSender,
        cancel: CancelToken,
        staging_root: PathBuf,
    ) -> Self {
        let device = BurnerDevice::new(settings.device.clone());
        Self {
            settings,
            pool: Arc::new(pool),
            device,
            events,
            cancel,
            staging_root,
        }
    }

    /// Run the whole session over `tracks`.
    ///
    /// Fatal planning errors abort before any staging starts; from then on
    /// a disc's failure is localized to its own job unless
    /// `abort_on_failure` is set.
    pub async fn run(
        &self,
        tracks: Vec<Track>,
        strategy: PackingStrategy,
    ) -> Result<SessionReport> {
        let started_at = Utc::now();
        let tracks: Vec<Arc<Track>> = tracks.into_iter().map(Arc::new).collect();

        let capacity = self.settings.capacity_frames();
        let plans = match strategy {
            PackingStrategy::Sequential => plan_discs(&tracks, capacity, self.settings.mode)?,
            PackingStrategy::FillGaps => {
                plan_discs_filling_gaps(&tracks, capacity, self.settings.mode)?
            }
        };

        let total_track_frames: u64 = plans
            .iter()
            .flat_map(|p| p.tracks.iter())
            .map(|t| t.duration_frames)
            .sum();
        let progress = Arc::new(SessionProgress::new(total_track_frames));

        let _ = self.events.send(SessionEvent::PlanReady {
            discs: plans.len(),
            tracks: tracks.len(),
            total_frames: plans.iter().map(|p| p.total_frames).sum(),
        });
        log::info!(
            "Planned {} disc(s) for {} tracks ({} mode, {} capacity)",
            plans.len(),
            tracks.len(),
            self.settings.mode,
            self.settings.disc_length
        );

        let run_dir = self.staging_root.join(format!("run-{}", short_run_id()));
        let mut jobs: Vec<BurnJob> = plans.iter().cloned().map(BurnJob::new).collect();

        // Kick off staging for every disc up front; the shared semaphore
        // keeps total transcode parallelism at the pool limit.
        let mut prestaged: Vec<Option<JoinHandle<Result<DiscImage>>>> = plans
            .iter()
            .map(|plan| {
                Some(tokio::spawn(stage_and_assemble(
                    self.pool.clone(),
                    plan.clone(),
                    disc_dir(&run_dir, plan.index),
                    self.cancel.clone(),
                    self.events.clone(),
                    progress.clone(),
                )))
            })
            .collect();

        let mut completed = Vec::new();
        let mut failed = Vec::new();
        let mut cancelled = Vec::new();

        for (position, job) in jobs.iter_mut().enumerate() {
            let disc = job.disc_index();

            if self.cancel.is_cancelled() {
                log::info!("Disc {} not started: session cancelled", disc);
                cancelled.push(disc);
                continue;
            }

            match self
                .run_job(job, prestaged[position].take(), &run_dir, &progress)
                .await
            {
                Ok(()) => {
                    progress.increment_completed();
                    let _ = self.events.send(SessionEvent::JobDone { disc });
                    log::info!("Disc {} complete", disc);
                    completed.push(disc);
                }
                Err(Error::Cancelled) => {
                    log::info!("Disc {} cancelled", disc);
                    cancelled.push(disc);
                }
                Err(e) => {
                    progress.increment_failed();
                    let cause = job.last_error.clone().unwrap_or_else(|| e.to_string());
                    log::error!("Disc {} failed permanently: {}", disc, cause);
                    failed.push((disc, cause));
                    if self.settings.abort_on_failure {
                        log::warn!("Aborting session on first failure");
                        self.cancel.cancel();
                    }
                }
            }
        }

        log::info!(
            "Staged {} track(s), {} of {} frames transcoded; {} disc(s) done, {} failed",
            progress.staged_count(),
            progress.transcoded_frames(),
            progress.total_track_frames,
            progress.completed_count(),
            progress.failed_count()
        );
        let _ = self.events.send(SessionEvent::SessionFinished {
            completed: completed.len(),
            failed: failed.len(),
            cancelled: cancelled.len(),
        });

        Ok(SessionReport {
            started_at,
            finished_at: Utc::now(),
            completed,
            failed,
            cancelled,
            frames_transcoded: progress.transcoded_frames(),
        })
    }

    /// Drive one job to a terminal state, consuming retries as needed
    async fn run_job(
        &self,
        job: &mut BurnJob,
        prestaged: Option<JoinHandle<Result<DiscImage>>>,
        run_dir: &Path,
        progress: &Arc<SessionProgress>,
    ) -> Result<()> {
        let mut prestaged = prestaged;

        loop {
            match self.attempt(job, prestaged.take(), run_dir, progress).await {
                Ok(()) => return Ok(()),
                Err(Error::Cancelled) => return Err(Error::Cancelled),
                Err(e) => {
                    let retryable = e.is_retryable();
                    self.send_transition(job.disc_index(), job.fail(&e)?);
                    let _ = self.events.send(SessionEvent::JobFailed {
                        disc: job.disc_index(),
                        attempts: job.attempts,
                        error: e.to_string(),
                    });

                    if retryable && job.can_retry(self.settings.max_retries)
                        && !self.cancel.is_cancelled()
                    {
                        self.send_transition(job.disc_index(), job.begin_retry()?);
                        let _ = self.events.send(SessionEvent::JobRetrying {
                            disc: job.disc_index(),
                            attempt: job.attempts,
                        });
                        log::warn!(
                            "Disc {} retrying (attempt {} of {}): {}",
                            job.disc_index(),
                            job.attempts + 1,
                            self.settings.max_retries + 1,
                            e
                        );
                        continue;
                    }
                    return Err(e);
                }
            }
        }
    }

    /// One pass through staging, burning, and verification
    async fn attempt(
        &self,
        job: &mut BurnJob,
        prestaged: Option<JoinHandle<Result<DiscImage>>>,
        run_dir: &Path,
        progress: &Arc<SessionProgress>,
    ) -> Result<()> {
        let disc = job.disc_index();

        self.send_transition(disc, job.apply(JobEvent::StagingStarted)?);
        let image = match prestaged {
            Some(handle) => handle
                .await
                .map_err(|e| Error::Internal(format!("staging task failed: {}", e)))??,
            // Retry attempts restage inline, from scratch
            None => {
                stage_and_assemble(
                    self.pool.clone(),
                    job.plan.clone(),
                    disc_dir(run_dir, disc),
                    self.cancel.clone(),
                    self.events.clone(),
                    progress.clone(),
                )
                .await?
            }
        };
        self.send_transition(disc, job.apply(JobEvent::ImageReady)?);
        log::info!(
            "Disc {} image ready: {} ({} frames)",
            disc,
            image.bin_path.display(),
            image.total_frames
        );
        job.image = Some(image);

        if self.cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        if self.settings.simulate {
            log::info!("Simulate mode - skipping physical burn of disc {}", disc);
            self.send_transition(disc, job.apply(JobEvent::BurnStarted)?);
            self.send_transition(disc, job.apply(JobEvent::BurnFinished)?);
            self.send_transition(disc, job.apply(JobEvent::VerifyPassed)?);
            return Ok(());
        }

        let timeout = Duration::from_secs(self.settings.device_timeout_secs);
        let guard = self.device.acquire(timeout).await?;
        burning::wait_for_blank_media(guard.path(), timeout, &self.cancel).await?;

        // Last safe boundary: once the write starts it is never interrupted
        if self.cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        self.send_transition(disc, job.apply(JobEvent::BurnStarted)?);
        let image = job
            .image
            .as_ref()
            .ok_or_else(|| Error::Internal(format!("disc {} lost its image", disc)))?;

        let progress_events = self.events.clone();
        let on_progress: wodim::ProgressCallback = Box::new(move |percent| {
            let _ = progress_events.send(SessionEvent::BurnProgress { disc, percent });
        });
        let options = wodim::BurnOptions {
            speed: self.settings.speed,
            eject: self.settings.eject,
        };
        wodim::burn_image(
            image,
            guard.path(),
            self.settings.mode,
            &options,
            Some(on_progress),
        )
        .await
        .map_err(|cause| Error::Burn { disc, cause })?;
        self.send_transition(disc, job.apply(JobEvent::BurnFinished)?);

        let image = job
            .image
            .as_ref()
            .ok_or_else(|| Error::Internal(format!("disc {} lost its image", disc)))?;
        wodim::verify_disc(image, guard.path())
            .await
            .map_err(|cause| Error::Verify { disc, cause })?;
        self.send_transition(disc, job.apply(JobEvent::VerifyPassed)?);

        Ok(())
    }

    fn send_transition(&self, disc: u32, transition: (JobStatus, JobStatus)) {
        let _ = self.events.send(SessionEvent::JobStatusChanged {
            disc,
            from: transition.0,
            to: transition.1,
        });
    }
}

fn short_run_id() -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    id[..8].to_string()
}

fn disc_dir(run_dir: &Path, disc: u32) -> PathBuf {
    run_dir.join(format!("disc{:02}", disc))
}

/// Stage one disc's tracks and assemble its image.
///
/// The staging directory is wiped first so retry attempts never reuse
/// stale payloads; staged WAV files are discarded once the image holds
/// their audio.
async fn stage_and_assemble(
    pool: Arc<TranscodePool>,
    plan: DiscPlan,
    staging_dir: PathBuf,
    cancel: CancelToken,
    events: EventSender,
    progress: Arc<SessionProgress>,
) -> Result<DiscImage> {
    if cancel.is_cancelled() {
        return Err(Error::Cancelled);
    }
    if staging_dir.exists() {
        tokio::fs::remove_dir_all(&staging_dir).await?;
    }

    let staged = pool
        .stage_disc(&plan, &staging_dir, &cancel, &events, &progress)
        .await?;

    let image = tokio::task::spawn_blocking(move || {
        let image = assemble_image(&plan, &staged, &staging_dir)?;
        // The image now holds the audio; drop the intermediate WAVs
        for track in &staged {
            if let Err(e) = std::fs::remove_file(&track.wav_path) {
                log::debug!("Could not remove staged file {:?}: {}", track.wav_path, e);
            }
        }
        Ok::<DiscImage, Error>(image)
    })
    .await
    .map_err(|e| Error::Internal(format!("image assembly task failed: {}", e)))??;

    Ok(image)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use tokio::sync::mpsc;

    fn make_tracks(durations: &[u64]) -> Vec<Track> {
        durations
            .iter()
            .enumerate()
            .map(|(i, &frames)| {
                Track::new(
                    PathBuf::from(format!("/music/{:02}.mp3", i + 1)),
                    format!("track-{:02}", i + 1),
                    frames,
                )
            })
            .collect()
    }

    fn simulate_settings() -> SessionSettings {
        SessionSettings {
            simulate: true,
            max_retries: 1,
            ..SessionSettings::default()
        }
    }

    #[tokio::test]
    async fn test_empty_track_list_finishes_cleanly() {
        let staging = TempDir::new().unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let pool = TranscodePool::with_ffmpeg(PathBuf::from("/nonexistent/ffmpeg"), Some(2));
        let orchestrator = Orchestrator::new(
            simulate_settings(),
            pool,
            tx,
            CancelToken::new(),
            staging.path().to_path_buf(),
        );

        let report = orchestrator
            .run(Vec::new(), PackingStrategy::Sequential)
            .await
            .unwrap();
        assert!(report.all_done());
        assert!(report.completed.is_empty());

        let first = rx.recv().await.unwrap();
        assert!(matches!(first, SessionEvent::PlanReady { discs: 0, .. }));
    }

    #[tokio::test]
    async fn test_oversized_track_fails_planning_before_staging() {
        let staging = TempDir::new().unwrap();
        let (tx, _rx) = mpsc::unbounded_channel();
        let pool = TranscodePool::with_ffmpeg(PathBuf::from("/nonexistent/ffmpeg"), Some(2));
        let orchestrator = Orchestrator::new(
            simulate_settings(),
            pool,
            tx,
            CancelToken::new(),
            staging.path().to_path_buf(),
        );

        let err = orchestrator
            .run(make_tracks(&[400_000]), PackingStrategy::Sequential)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::TrackExceedsCapacity { .. }));
    }

    #[tokio::test]
    async fn test_transcode_failure_exhausts_retries_and_reports() {
        let staging = TempDir::new().unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let pool = TranscodePool::with_ffmpeg(PathBuf::from("/nonexistent/ffmpeg"), Some(2));
        let orchestrator = Orchestrator::new(
            simulate_settings(),
            pool,
            tx,
            CancelToken::new(),
            staging.path().to_path_buf(),
        );

        let report = orchestrator
            .run(make_tracks(&[75]), PackingStrategy::Sequential)
            .await
            .unwrap();
        assert_eq!(report.completed.len(), 0);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, 1);

        drop(orchestrator);
        let mut retry_events = 0;
        let mut fail_events = 0;
        while let Some(event) = rx.recv().await {
            match event {
                SessionEvent::JobRetrying { .. } => retry_events += 1,
                SessionEvent::JobFailed { .. } => fail_events += 1,
                _ => {}
            }
        }
        // max_retries = 1: the first failure retries once, then sticks
        assert_eq!(retry_events, 1);
        assert_eq!(fail_events, 2);
    }

    #[tokio::test]
    async fn test_pre_cancelled_session_reports_cancelled_jobs() {
        let staging = TempDir::new().unwrap();
        let (tx, _rx) = mpsc::unbounded_channel();
        let pool = TranscodePool::with_ffmpeg(PathBuf::from("/nonexistent/ffmpeg"), Some(2));
        let cancel = CancelToken::new();
        cancel.cancel();
        let orchestrator = Orchestrator::new(
            simulate_settings(),
            pool,
            tx,
            cancel,
            staging.path().to_path_buf(),
        );

        let report = orchestrator
            .run(make_tracks(&[75, 75]), PackingStrategy::Sequential)
            .await
            .unwrap();
        assert!(report.completed.is_empty());
        assert!(report.failed.is_empty());
        assert_eq!(report.cancelled, vec![1]);
    }

    #[cfg(unix)]
    mod with_fake_transcoder {
        use super::*;
        use crate::test_fixtures::fake_ffmpeg;

        #[tokio::test]
        async fn test_simulated_session_completes_disc() {
            let tools = TempDir::new().unwrap();
            let staging = TempDir::new().unwrap();
            let ffmpeg = fake_ffmpeg(tools.path(), 44_100);

            let (tx, mut rx) = mpsc::unbounded_channel();
            let pool = TranscodePool::with_ffmpeg(ffmpeg, Some(2));
            let orchestrator = Orchestrator::new(
                simulate_settings(),
                pool,
                tx,
                CancelToken::new(),
                staging.path().to_path_buf(),
            );

            let report = orchestrator
                .run(make_tracks(&[75, 75]), PackingStrategy::Sequential)
                .await
                .unwrap();

            assert!(report.all_done());
            assert_eq!(report.completed, vec![1]);
            assert_eq!(report.frames_transcoded, 150);

            drop(orchestrator);
            let mut transitions = Vec::new();
            while let Some(event) = rx.recv().await {
                if let SessionEvent::JobStatusChanged { from, to, .. } = event {
                    transitions.push((from, to));
                }
            }
            assert_eq!(
                transitions,
                vec![
                    (JobStatus::Pending, JobStatus::Staging),
                    (JobStatus::Staging, JobStatus::Staged),
                    (JobStatus::Staged, JobStatus::Burning),
                    (JobStatus::Burning, JobStatus::Verifying),
                    (JobStatus::Verifying, JobStatus::Done),
                ]
            );
        }

        #[tokio::test]
        async fn test_staged_wavs_are_discarded_after_imaging() {
            let tools = TempDir::new().unwrap();
            let staging = TempDir::new().unwrap();
            let ffmpeg = fake_ffmpeg(tools.path(), 44_100);

            let (tx, _rx) = mpsc::unbounded_channel();
            let pool = TranscodePool::with_ffmpeg(ffmpeg, Some(2));
            let orchestrator = Orchestrator::new(
                simulate_settings(),
                pool,
                tx,
                CancelToken::new(),
                staging.path().to_path_buf(),
            );

            orchestrator
                .run(make_tracks(&[75]), PackingStrategy::Sequential)
                .await
                .unwrap();

            let mut wavs = 0;
            let mut bins = 0;
            for entry in walkdir::WalkDir::new(staging.path()) {
                let entry = entry.unwrap();
                match entry.path().extension().and_then(|e| e.to_str()) {
                    Some("wav") => wavs += 1,
                    Some("bin") => bins += 1,
                    _ => {}
                }
            }
            assert_eq!(wavs, 0, "staged WAVs should be discarded");
            assert_eq!(bins, 1, "assembled image should remain");
        }
    }
}
