//! Burn image assembly
//!
//! Concatenates a disc's staged PCM payloads into a single `.bin` stream
//! and writes the matching cue sheet. Each track is padded (or trimmed) to
//! its exact planned frame count so the cue arithmetic is frame-accurate,
//! and the finished layout is checked against the plan's computed total.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::core::capacity::{self, BYTES_PER_FRAME};
use crate::core::{DiscMode, DiscPlan};
use crate::error::{Error, Result};
use crate::staging::transcode::StagedTrack;

/// One row of the track-boundary table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CueEntry {
    /// 1-based track number on this disc
    pub number: u32,
    /// On-disc start frame, gaps included
    pub start_frame: u64,
    /// Audio length in frames (the planned track duration)
    pub length_frames: u64,
    /// Silence inserted before this track (TAO gap policy)
    pub pregap_frames: u64,
}

/// A burn-ready image: concatenated audio plus its cue sheet
#[derive(Debug, Clone)]
pub struct DiscImage {
    pub bin_path: PathBuf,
    pub cue_path: PathBuf,
    pub entries: Vec<CueEntry>,
    /// On-disc frames, gaps included; must equal the plan's total
    pub total_frames: u64,
}

/// Assemble the burn image for `plan` from its staged tracks.
///
/// Blocking; run on a blocking thread from async contexts. The staged set
/// must be complete and in plan order - anything else is a staging defect,
/// as is a finished layout whose frame total disagrees with the plan.
pub fn assemble_image(plan: &DiscPlan, staged: &[StagedTrack], dir: &Path) -> Result<DiscImage> {
    if staged.len() != plan.tracks.len() {
        return Err(Error::Staging(format!(
            "disc {} staged {} of {} tracks",
            plan.index,
            staged.len(),
            plan.tracks.len()
        )));
    }
    for (position, (staged_track, planned)) in staged.iter().zip(&plan.tracks).enumerate() {
        if staged_track.track.id != planned.id {
            return Err(Error::Staging(format!(
                "disc {} track {} staged out of order",
                plan.index,
                position + 1
            )));
        }
    }

    std::fs::create_dir_all(dir)?;
    let bin_path = dir.join(format!("disc{:02}.bin", plan.index));
    let cue_path = dir.join(format!("disc{:02}.cue", plan.index));

    log::info!(
        "Assembling image for disc {} ({} tracks, {} frames) at {:?}",
        plan.index,
        plan.tracks.len(),
        plan.total_frames,
        bin_path
    );

    let mut writer = BufWriter::new(File::create(&bin_path)?);
    let mut entries = Vec::with_capacity(staged.len());
    let mut disc_offset: u64 = 0;

    for (position, staged_track) in staged.iter().enumerate() {
        let pregap_frames = capacity::gap_delta(plan.mode, position);
        let length_frames = staged_track.track.duration_frames;

        disc_offset += pregap_frames;
        entries.push(CueEntry {
            number: position as u32 + 1,
            start_frame: disc_offset,
            length_frames,
            pregap_frames,
        });
        disc_offset += length_frames;

        write_payload(&mut writer, staged_track, length_frames * BYTES_PER_FRAME)?;
    }
    writer.flush()?;

    let layout_total: u64 = entries
        .iter()
        .map(|e| e.length_frames + e.pregap_frames)
        .sum();
    if layout_total != plan.total_frames {
        return Err(Error::Staging(format!(
            "disc {} assembled {} frames but the plan computed {}",
            plan.index, layout_total, plan.total_frames
        )));
    }

    write_cue_sheet(&cue_path, &bin_path, plan, staged, &entries)?;
    for entry in &entries {
        log::debug!(
            "  track {:02} @ {} ({} frames)",
            entry.number,
            capacity::msf(entry.start_frame),
            entry.length_frames
        );
    }

    Ok(DiscImage {
        bin_path,
        cue_path,
        entries,
        total_frames: layout_total,
    })
}

/// Copy one staged payload, padded or trimmed to exactly `target_bytes`
fn write_payload<W: Write>(
    writer: &mut W,
    staged: &StagedTrack,
    target_bytes: u64,
) -> Result<()> {
    let mut reader = BufReader::new(File::open(&staged.wav_path)?);
    reader.seek(SeekFrom::Start(staged.payload.data_offset))?;

    let copy_bytes = staged.payload.data_len.min(target_bytes);
    let copied = std::io::copy(&mut reader.take(copy_bytes), writer)?;
    if copied < copy_bytes {
        return Err(Error::Staging(format!(
            "staged payload {:?} ended after {} of {} bytes",
            staged.wav_path, copied, copy_bytes
        )));
    }

    // Silence-pad up to the planned frame boundary
    let mut padding = target_bytes - copied;
    let zeros = [0u8; 8192];
    while padding > 0 {
        let chunk = padding.min(zeros.len() as u64) as usize;
        writer.write_all(&zeros[..chunk])?;
        padding -= chunk as u64;
    }

    Ok(())
}

/// Write the cue sheet describing the assembled bin.
///
/// INDEX times are offsets into the bin file; TAO gaps appear as PREGAP
/// directives, which the burner synthesizes rather than reading from file.
fn write_cue_sheet(
    cue_path: &Path,
    bin_path: &Path,
    plan: &DiscPlan,
    staged: &[StagedTrack],
    entries: &[CueEntry],
) -> Result<()> {
    let bin_name = bin_path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "disc.bin".to_string());

    let mut out = String::new();
    out.push_str(&format!("FILE \"{}\" BINARY\n", bin_name));

    let mut file_offset: u64 = 0;
    for (entry, staged_track) in entries.iter().zip(staged) {
        out.push_str(&format!("  TRACK {:02} AUDIO\n", entry.number));
        out.push_str(&format!(
            "    TITLE \"{}\"\n",
            staged_track.track.title.replace('"', "'")
        ));
        if plan.mode == DiscMode::Tao && entry.pregap_frames > 0 {
            out.push_str(&format!(
                "    PREGAP {}\n",
                capacity::msf(entry.pregap_frames)
            ));
        }
        out.push_str(&format!("    INDEX 01 {}\n", capacity::msf(file_offset)));
        file_offset += entry.length_frames;
    }

    std::fs::write(cue_path, out)?;
    Ok(())
}
