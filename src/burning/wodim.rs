//! wodim invocation and output parsing
//!
//! Drives the external burner process for one disc image and reads the
//! table of contents back for verification. Progress lines are parsed into
//! overall percentages for the event stream. A started burn is never
//! killed; cancellation takes effect between jobs, not mid-write.

use std::path::Path;
use std::process::Stdio;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;

use crate::core::DiscMode;
use crate::staging::DiscImage;

/// Progress callback fed with overall percent complete (0-100)
pub type ProgressCallback = Box<dyn Fn(f32) + Send>;

/// Options for one burn invocation
#[derive(Debug, Clone)]
pub struct BurnOptions {
    pub speed: u32,
    pub eject: bool,
}

/// A parsed line of burner output
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BurnerLine {
    /// "Track NN:  x of  y MB written"
    TrackProgress {
        track: u32,
        written_mb: u32,
        total_mb: u32,
    },
    /// Lead-out/fixation has begun
    Fixating,
    /// Anything else
    Other,
}

/// Parse one line of wodim stdout
pub fn parse_burner_line(line: &str) -> BurnerLine {
    if line.to_lowercase().contains("fixat") {
        return BurnerLine::Fixating;
    }

    // "Track 01:   12 of   45 MB written (fifo 100%) [buf  99%]   4.0x."
    let mut tokens = line.split_whitespace();
    if tokens.next() == Some("Track") {
        let track = tokens
            .next()
            .and_then(|t| t.trim_end_matches(':').parse::<u32>().ok());
        let written = tokens.next().and_then(|t| t.parse::<u32>().ok());
        let of = tokens.next();
        let total = tokens.next().and_then(|t| t.parse::<u32>().ok());
        if let (Some(track), Some(written_mb), Some("of"), Some(total_mb)) =
            (track, written, of, total)
        {
            return BurnerLine::TrackProgress {
                track,
                written_mb,
                total_mb,
            };
        }
    }

    BurnerLine::Other
}

/// Overall completion estimate from a per-track progress report
pub fn overall_percent(track: u32, written_mb: u32, total_mb: u32, total_tracks: u32) -> f32 {
    if total_tracks == 0 || track == 0 {
        return 0.0;
    }
    let track_fraction = if total_mb > 0 {
        written_mb as f32 / total_mb as f32
    } else {
        0.0
    };
    let done_tracks = (track - 1) as f32;
    (((done_tracks + track_fraction) / total_tracks as f32) * 100.0).min(99.0)
}

/// Burn an assembled image.
///
/// Invokes `wodim -v <mode> -audio speed=N dev=PATH cuefile=IMG.cue`,
/// streaming stdout for progress. Returns Err with the failure cause on a
/// non-zero exit; device-busy failures land here too and are retryable
/// from the caller's point of view.
pub async fn burn_image(
    image: &DiscImage,
    device: &str,
    mode: DiscMode,
    options: &BurnOptions,
    on_progress: Option<ProgressCallback>,
) -> Result<(), String> {
    if !image.cue_path.exists() {
        return Err(format!("cue sheet not found: {}", image.cue_path.display()));
    }

    let mode_flag = match mode {
        DiscMode::Dao => "-dao",
        DiscMode::Tao => "-tao",
    };
    let total_tracks = image.entries.len() as u32;

    log::info!(
        "Starting burn of {} ({} mode, speed {}x, device {})",
        image.cue_path.display(),
        mode,
        options.speed,
        device
    );

    let mut command = Command::new("wodim");
    command
        .arg("-v")
        .arg(mode_flag)
        .arg("-audio")
        .arg(format!("speed={}", options.speed))
        .arg(format!("dev={}", device))
        .arg(format!("cuefile={}", image.cue_path.display()));
    if options.eject {
        command.arg("-eject");
    }

    let mut child = command
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| format!("failed to execute wodim: {}", e))?;

    if let Some(stdout) = child.stdout.take() {
        let mut lines = BufReader::new(stdout).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            match parse_burner_line(&line) {
                BurnerLine::TrackProgress {
                    track,
                    written_mb,
                    total_mb,
                } => {
                    if let Some(ref callback) = on_progress {
                        callback(overall_percent(track, written_mb, total_mb, total_tracks));
                    }
                }
                BurnerLine::Fixating => {
                    log::info!("Fixating disc...");
                    if let Some(ref callback) = on_progress {
                        callback(99.0);
                    }
                }
                BurnerLine::Other => log::debug!("wodim: {}", line),
            }
        }
    }

    let output = child
        .wait_with_output()
        .await
        .map_err(|e| format!("error waiting for wodim: {}", e))?;

    if output.status.success() {
        log::info!("Burn completed successfully");
        Ok(())
    } else {
        let stderr = String::from_utf8_lossy(&output.stderr);
        Err(format!(
            "wodim exited with status {}: {}",
            output.status,
            stderr.lines().last().unwrap_or("unknown error")
        ))
    }
}

/// Count audio tracks in a `wodim -toc` report, excluding the lead-out
pub fn parse_toc_track_count(output: &str) -> u32 {
    output
        .lines()
        .filter_map(|line| {
            let rest = line.trim().strip_prefix("track:")?;
            let first = rest.split_whitespace().next()?;
            first.parse::<u32>().ok()
        })
        .count() as u32
}

/// Read the burned disc's table of contents back and compare it to the
/// image. A mismatched track count or an unreadable TOC is a verification
/// failure reported with its cause.
pub async fn verify_disc(image: &DiscImage, device: &str) -> Result<(), String> {
    let output = Command::new("wodim")
        .arg(format!("dev={}", device))
        .arg("-toc")
        .output()
        .await
        .map_err(|e| format!("failed to execute wodim -toc: {}", e))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(format!(
            "TOC read-back failed: {}",
            stderr.lines().last().unwrap_or("unknown error")
        ));
    }

    let burned = parse_toc_track_count(&String::from_utf8_lossy(&output.stdout));
    let expected = image.entries.len() as u32;
    if burned != expected {
        return Err(format!(
            "disc reports {} tracks, image has {}",
            burned, expected
        ));
    }

    log::info!("Verified {} tracks on {}", burned, device);
    Ok(())
}
