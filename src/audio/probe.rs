//! Track probing
//!
//! Reads duration and sample format from source files via symphonia and the
//! display title from tags via lofty. Called once per track at load time,
//! before planning; frame counts computed here are what the planner packs.

use std::fs::File;
use std::path::Path;

use lofty::{Accessor, TaggedFileExt};
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::core::capacity::frames_from_samples;
use crate::core::Track;
use crate::error::{Error, Result};

/// Duration and sample format of a source file
#[derive(Debug, Clone)]
pub struct ProbeInfo {
    /// Exact Red Book frame count, rounded up from the sample count
    pub duration_frames: u64,
    pub sample_rate: u32,
    pub channels: usize,
}

/// Probe a source file for duration and sample format
pub fn probe(path: &Path) -> Result<ProbeInfo> {
    let invalid = |reason: String| Error::InvalidTrack {
        path: path.to_path_buf(),
        reason,
    };

    let file = File::open(path).map_err(|e| invalid(format!("failed to open file: {}", e)))?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension() {
        hint.with_extension(&ext.to_string_lossy());
    }

    let format_opts = FormatOptions::default();
    let metadata_opts = MetadataOptions::default();

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &format_opts, &metadata_opts)
        .map_err(|e| invalid(format!("failed to probe audio format: {}", e)))?;

    let format = probed.format;
    let track = format
        .default_track()
        .ok_or_else(|| invalid("no default audio track".to_string()))?;

    let sample_rate = track
        .codec_params
        .sample_rate
        .ok_or_else(|| invalid("unknown sample rate".to_string()))?;
    let samples = track.codec_params.n_frames.unwrap_or(0);
    let channels = track
        .codec_params
        .channels
        .map(|c| c.count())
        .unwrap_or(0);

    let duration_frames = frames_from_samples(samples, sample_rate);
    if duration_frames == 0 {
        return Err(invalid("could not determine duration".to_string()));
    }

    Ok(ProbeInfo {
        duration_frames,
        sample_rate,
        channels,
    })
}

/// Read the title tag, if any
fn read_title(path: &Path) -> Option<String> {
    let tagged = lofty::Probe::open(path).ok()?.read().ok()?;
    let tag = tagged.primary_tag().or_else(|| tagged.first_tag())?;
    tag.title().map(|t| t.to_string())
}

/// Probe a source file and build a [`Track`] from it.
///
/// The title comes from the file's tags, falling back to the filename stem.
pub fn load_track(path: &Path) -> Result<Track> {
    let info = probe(path)?;

    let title = read_title(path).unwrap_or_else(|| {
        path.file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "Unknown".to_string())
    });

    log::debug!(
        "Probed {:?}: {} frames, {} Hz, {} ch",
        path.file_name().unwrap_or_default(),
        info.duration_frames,
        info.sample_rate,
        info.channels
    );

    Ok(Track::new(path.to_path_buf(), title, info.duration_frames))
}
