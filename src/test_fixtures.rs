//! Test fixtures for audio pipeline tests
//!
//! Generates canonical-format WAV files (44.1 kHz, stereo, 16-bit PCM)
//! without shelling out to an encoder, so probing, payload inspection, and
//! image assembly can be tested hermetically.

#![cfg(test)]

use std::path::Path;

/// Build an in-memory WAV file holding `sample_frames` interleaved stereo
/// sample frames (4 bytes each) of the repeating byte `fill`.
pub fn wav_bytes_with(sample_frames: u64, fill: u8) -> Vec<u8> {
    let data_len = (sample_frames * 4) as u32;
    let mut out = Vec::with_capacity(44 + data_len as usize);

    out.extend_from_slice(b"RIFF");
    out.extend_from_slice(&(36 + data_len).to_le_bytes());
    out.extend_from_slice(b"WAVE");

    out.extend_from_slice(b"fmt ");
    out.extend_from_slice(&16u32.to_le_bytes());
    out.extend_from_slice(&1u16.to_le_bytes()); // PCM
    out.extend_from_slice(&2u16.to_le_bytes()); // stereo
    out.extend_from_slice(&44_100u32.to_le_bytes());
    out.extend_from_slice(&(44_100u32 * 4).to_le_bytes()); // byte rate
    out.extend_from_slice(&4u16.to_le_bytes()); // block align
    out.extend_from_slice(&16u16.to_le_bytes()); // bits per sample

    out.extend_from_slice(b"data");
    out.extend_from_slice(&data_len.to_le_bytes());
    out.resize(44 + data_len as usize, fill);

    out
}

/// Silence variant of [`wav_bytes_with`]
pub fn wav_bytes(sample_frames: u64) -> Vec<u8> {
    wav_bytes_with(sample_frames, 0)
}

/// Write a canonical WAV file of `sample_frames` stereo sample frames
pub fn write_wav(path: &Path, sample_frames: u64) {
    std::fs::write(path, wav_bytes(sample_frames)).expect("failed to write wav fixture");
}

/// Write a WAV file whose payload bytes are all `fill`
pub fn write_wav_with(path: &Path, sample_frames: u64, fill: u8) {
    std::fs::write(path, wav_bytes_with(sample_frames, fill)).expect("failed to write wav fixture");
}

/// Install a fake transcoder that copies a prepared WAV of `sample_frames`
/// stereo sample frames to its final argument, mimicking a successful
/// encode. Returns the path of the executable.
#[cfg(unix)]
pub fn fake_ffmpeg(dir: &Path, sample_frames: u64) -> std::path::PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let fixture = dir.join("fixture.wav");
    write_wav(&fixture, sample_frames);

    let script = dir.join("ffmpeg");
    std::fs::write(
        &script,
        format!(
            "#!/bin/sh\nfor last; do :; done\ncp \"{}\" \"$last\"\n",
            fixture.display()
        ),
    )
    .expect("failed to write fake transcoder");
    let mut perms = std::fs::metadata(&script).unwrap().permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&script, perms).unwrap();
    script
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wav_bytes_layout() {
        let bytes = wav_bytes(588);
        assert_eq!(&bytes[0..4], b"RIFF");
        assert_eq!(&bytes[8..12], b"WAVE");
        assert_eq!(&bytes[12..16], b"fmt ");
        assert_eq!(&bytes[36..40], b"data");
        // 588 stereo frames = 2352 payload bytes
        assert_eq!(bytes.len(), 44 + 2352);
    }

    #[test]
    fn test_fill_byte_reaches_payload() {
        let bytes = wav_bytes_with(10, 0xAB);
        assert!(bytes[44..].iter().all(|&b| b == 0xAB));
    }
}
