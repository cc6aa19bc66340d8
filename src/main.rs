//! discpress - audio CD mastering and burning
//!
//! Scans a source folder for audio tracks, partitions them across the
//! minimum number of discs without reordering, transcodes and assembles a
//! burn image per disc, and burns the discs in order.

mod audio;
mod burning;
mod core;
mod error;
mod events;
mod logging;
mod orchestrator;
mod staging;
#[cfg(test)]
mod test_fixtures;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, ValueEnum};

use crate::core::capacity::format_duration;
use crate::core::{
    find_audio_files, plan_discs, plan_discs_filling_gaps, DiscLength, DiscMode, DiscPlan,
    SessionSettings, Track,
};
use crate::error::{Error, Result};
use crate::events::{CancelToken, EventReceiver, SessionEvent};
use crate::orchestrator::{Orchestrator, PackingStrategy, SessionReport};
use crate::staging::TranscodePool;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ModeArg {
    /// Disk-At-Once: gapless
    Dao,
    /// Track-At-Once: 2-second gaps between tracks
    Tao,
}

impl From<ModeArg> for DiscMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Dao => DiscMode::Dao,
            ModeArg::Tao => DiscMode::Tao,
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    name = "discpress",
    version,
    about = "Master a folder of audio tracks onto audio CDs and burn them"
)]
struct Cli {
    /// Folder of audio tracks to master, in filename order
    source: Option<PathBuf>,

    /// Staging directory for transcoded audio and disc images
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Burner device path
    #[arg(long)]
    device: Option<String>,

    /// Write speed
    #[arg(long)]
    speed: Option<u32>,

    /// Disc write mode
    #[arg(long, value_enum)]
    mode: Option<ModeArg>,

    /// Disc length in minutes (74 or 80)
    #[arg(long)]
    disc: Option<u32>,

    /// Maximum parallel transcodes
    #[arg(long)]
    workers: Option<usize>,

    /// Retries per disc before giving up on it
    #[arg(long)]
    max_retries: Option<u32>,

    /// Seconds to wait for the device and blank media
    #[arg(long)]
    device_timeout: Option<u64>,

    /// Fill leftover disc space with later tracks (changes play order)
    #[arg(long)]
    smart_fill: bool,

    /// Run the full pipeline but skip the physical burn
    #[arg(long)]
    simulate: bool,

    /// Stop the session when a disc fails permanently
    #[arg(long)]
    abort_on_failure: bool,

    /// Leave the disc in the tray after burning
    #[arg(long)]
    no_eject: bool,

    /// Print the disc layout and exit without staging or burning
    #[arg(long)]
    plan_only: bool,

    /// List available burner devices and exit
    #[arg(long)]
    list_devices: bool,

    /// Persist the effective settings as defaults for future runs
    #[arg(long)]
    save_settings: bool,
}

/// Fold CLI flags over the persisted settings
fn apply_overrides(settings: &mut SessionSettings, cli: &Cli) -> Result<()> {
    if let Some(device) = &cli.device {
        settings.device = device.clone();
    }
    if let Some(speed) = cli.speed {
        settings.speed = speed;
    }
    if let Some(mode) = cli.mode {
        settings.mode = mode.into();
    }
    if let Some(minutes) = cli.disc {
        settings.disc_length = match minutes {
            74 => DiscLength::Minutes74,
            80 => DiscLength::Minutes80,
            other => {
                return Err(Error::InvalidConfig(format!(
                    "unsupported disc length {} (use 74 or 80)",
                    other
                )));
            }
        };
    }
    if cli.workers.is_some() {
        settings.max_workers = cli.workers;
    }
    if let Some(max_retries) = cli.max_retries {
        settings.max_retries = max_retries;
    }
    if let Some(timeout) = cli.device_timeout {
        settings.device_timeout_secs = timeout;
    }
    if cli.simulate {
        settings.simulate = true;
    }
    if cli.abort_on_failure {
        settings.abort_on_failure = true;
    }
    if cli.no_eject {
        settings.eject = false;
    }
    Ok(())
}

fn print_plan(plans: &[DiscPlan], settings: &SessionSettings) {
    let capacity = settings.capacity_frames();
    for plan in plans {
        let estimated_bytes: u64 = plan.tracks.iter().map(|t| t.estimated_bytes).sum();
        log::info!(
            "Disc {}: {} tracks, {} of {} ({} mode, ~{} MB image)",
            plan.index,
            plan.tracks.len(),
            format_duration(plan.total_frames),
            format_duration(capacity),
            plan.mode,
            estimated_bytes / (1024 * 1024)
        );
        for (number, track) in plan.tracks.iter().enumerate() {
            log::info!(
                "  {:2}. {:<40} {}",
                number + 1,
                track.title,
                format_duration(track.duration_frames)
            );
        }
    }
}

/// Presentation side of the event stream: render everything through the
/// logger. This consumer is read-only; its only signal back into the
/// session is the cancel token wired to Ctrl-C.
async fn print_events(mut rx: EventReceiver) {
    while let Some(event) = rx.recv().await {
        match event {
            SessionEvent::PlanReady {
                discs,
                tracks,
                total_frames,
            } => log::info!(
                "Session: {} disc(s), {} tracks, {} total",
                discs,
                tracks,
                format_duration(total_frames)
            ),
            SessionEvent::JobStatusChanged { disc, from, to } => {
                log::debug!("Disc {}: {} -> {}", disc, from, to)
            }
            SessionEvent::TrackStaged { disc, title, .. } => {
                log::info!("Staged (disc {}): {}", disc, title)
            }
            SessionEvent::BurnProgress { disc, percent } => {
                log::info!("Burning disc {}: {:.0}%", disc, percent)
            }
            SessionEvent::JobFailed {
                disc,
                attempts,
                error,
            } => log::warn!("Disc {} failed (attempt {}): {}", disc, attempts + 1, error),
            SessionEvent::JobRetrying { disc, attempt } => {
                log::info!("Disc {}: restaging for attempt {}", disc, attempt + 1)
            }
            SessionEvent::JobDone { disc } => log::info!("Disc {} done", disc),
            SessionEvent::SessionFinished {
                completed,
                failed,
                cancelled,
            } => log::info!(
                "Session finished: {} completed, {} failed, {} cancelled",
                completed,
                failed,
                cancelled
            ),
        }
    }
}

fn print_report(report: &SessionReport) {
    let elapsed = report.finished_at - report.started_at;
    log::info!(
        "Run took {}s: {} disc(s) burned, {} transcoded",
        elapsed.num_seconds(),
        report.completed.len(),
        format_duration(report.frames_transcoded)
    );
    for (disc, cause) in &report.failed {
        log::error!("Disc {} failed: {}", disc, cause);
    }
    for disc in &report.cancelled {
        log::warn!("Disc {} cancelled", disc);
    }
}

async fn run(cli: Cli) -> Result<bool> {
    let source = cli
        .source
        .clone()
        .ok_or_else(|| Error::InvalidConfig("a source folder is required".to_string()))?;

    let mut settings = SessionSettings::load();
    apply_overrides(&mut settings, &cli)?;
    if cli.save_settings {
        if let Err(e) = settings.save() {
            log::warn!("Could not save settings: {}", e);
        }
    }

    let paths = find_audio_files(&source);
    if paths.is_empty() {
        return Err(Error::InvalidConfig(format!(
            "no audio files found under {}",
            source.display()
        )));
    }
    log::info!("Found {} audio files under {}", paths.len(), source.display());

    // Unreadable files fail only themselves; the rest of the set proceeds
    let mut tracks = Vec::new();
    for path in &paths {
        match audio::load_track(path) {
            Ok(track) => tracks.push(track),
            Err(e) => log::warn!("Skipping {}: {}", path.display(), e),
        }
    }
    if tracks.is_empty() {
        return Err(Error::InvalidConfig(
            "none of the source files were readable audio".to_string(),
        ));
    }

    let strategy = if cli.smart_fill {
        PackingStrategy::FillGaps
    } else {
        PackingStrategy::Sequential
    };

    let shared: Vec<Arc<Track>> = tracks.iter().cloned().map(Arc::new).collect();
    let plans = match strategy {
        PackingStrategy::Sequential => {
            plan_discs(&shared, settings.capacity_frames(), settings.mode)?
        }
        PackingStrategy::FillGaps => {
            plan_discs_filling_gaps(&shared, settings.capacity_frames(), settings.mode)?
        }
    };
    print_plan(&plans, &settings);
    if cli.plan_only {
        return Ok(true);
    }

    let staging_root = cli
        .output
        .clone()
        .unwrap_or_else(|| std::env::temp_dir().join("discpress"));
    let pool = TranscodePool::new(settings.max_workers)?;
    log::info!("Transcoding with {} workers", pool.worker_count());

    let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
    let cancel = CancelToken::new();

    let ctrl_c_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("Cancellation requested - letting in-flight work reach a safe boundary");
            ctrl_c_cancel.cancel();
        }
    });

    let printer = tokio::spawn(print_events(rx));

    let orchestrator = Orchestrator::new(settings, pool, tx, cancel, staging_root);
    let report = orchestrator.run(tracks, strategy).await?;
    drop(orchestrator);
    let _ = printer.await;

    print_report(&report);
    Ok(report.all_done())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init_logging();

    if cli.list_devices {
        let devices = burning::list_devices().await;
        if devices.is_empty() {
            println!("No burner devices found");
        } else {
            for device in devices {
                println!("{}", device);
            }
        }
        return ExitCode::SUCCESS;
    }

    match run(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            log::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
