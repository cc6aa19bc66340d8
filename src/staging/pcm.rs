//! Staged WAV payload inspection
//!
//! The transcoder's output must be canonical Red Book source material:
//! 44.1 kHz, stereo, 16-bit little-endian PCM. This module parses the
//! RIFF container, locates the payload, and fingerprints it.

use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::Path;

use crate::core::capacity::BYTES_PER_FRAME;

/// Bytes of one interleaved stereo 16-bit sample frame
const BLOCK_ALIGN: u64 = 4;

/// Location and shape of the PCM payload inside a staged WAV file
#[derive(Debug, Clone)]
pub struct PcmPayload {
    /// Byte offset of the data chunk payload
    pub data_offset: u64,
    /// Payload length in bytes
    pub data_len: u64,
    /// Red Book frames covered, rounded up to whole frames
    pub frames: u64,
    /// blake3 fingerprint of the payload bytes
    pub checksum: String,
}

fn read_exact_at<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<(), String> {
    reader
        .read_exact(buf)
        .map_err(|e| format!("truncated WAV file: {}", e))
}

/// Parse a staged WAV file and verify it holds canonical CD audio.
///
/// Returns the payload location, its frame count, and its checksum. Any
/// structural problem or non-canonical format is an error string naming
/// what was wrong.
pub fn inspect_wav(path: &Path) -> Result<PcmPayload, String> {
    let file = File::open(path).map_err(|e| format!("failed to open staged file: {}", e))?;
    let mut reader = BufReader::new(file);

    let mut riff = [0u8; 12];
    read_exact_at(&mut reader, &mut riff)?;
    if &riff[0..4] != b"RIFF" || &riff[8..12] != b"WAVE" {
        return Err("not a RIFF/WAVE file".to_string());
    }

    let mut fmt_seen = false;
    let mut offset: u64 = 12;

    loop {
        let mut header = [0u8; 8];
        read_exact_at(&mut reader, &mut header)?;
        let chunk_id = [header[0], header[1], header[2], header[3]];
        let chunk_len = u32::from_le_bytes([header[4], header[5], header[6], header[7]]) as u64;
        offset += 8;

        match &chunk_id {
            b"fmt " => {
                if chunk_len < 16 {
                    return Err("fmt chunk too short".to_string());
                }
                let mut fmt = [0u8; 16];
                read_exact_at(&mut reader, &mut fmt)?;
                let audio_format = u16::from_le_bytes([fmt[0], fmt[1]]);
                let channels = u16::from_le_bytes([fmt[2], fmt[3]]);
                let sample_rate = u32::from_le_bytes([fmt[4], fmt[5], fmt[6], fmt[7]]);
                let bits = u16::from_le_bytes([fmt[14], fmt[15]]);

                if audio_format != 1 {
                    return Err(format!("not PCM (format tag {})", audio_format));
                }
                if channels != 2 {
                    return Err(format!("expected stereo, got {} channel(s)", channels));
                }
                if sample_rate != 44_100 {
                    return Err(format!("expected 44100 Hz, got {}", sample_rate));
                }
                if bits != 16 {
                    return Err(format!("expected 16-bit samples, got {}", bits));
                }
                fmt_seen = true;

                // Skip any fmt extension bytes
                let remainder = chunk_len - 16;
                if remainder > 0 {
                    reader
                        .seek(SeekFrom::Current(remainder as i64))
                        .map_err(|e| format!("seek failed: {}", e))?;
                }
                offset += chunk_len;
            }
            b"data" => {
                if !fmt_seen {
                    return Err("data chunk before fmt chunk".to_string());
                }
                if chunk_len == 0 {
                    return Err("empty audio payload".to_string());
                }
                if chunk_len % BLOCK_ALIGN != 0 {
                    return Err(format!(
                        "payload length {} is not sample-frame aligned",
                        chunk_len
                    ));
                }
                let checksum = checksum_payload(&mut reader, chunk_len)?;
                return Ok(PcmPayload {
                    data_offset: offset,
                    data_len: chunk_len,
                    frames: (chunk_len).div_ceil(BYTES_PER_FRAME),
                    checksum,
                });
            }
            _ => {
                // LIST, fact and friends: skip
                reader
                    .seek(SeekFrom::Current(chunk_len as i64))
                    .map_err(|e| format!("seek failed: {}", e))?;
                offset += chunk_len;
            }
        }
    }
}

fn checksum_payload<R: Read>(reader: &mut R, len: u64) -> Result<String, String> {
    let mut hasher = blake3::Hasher::new();
    let mut remaining = len;
    let mut buf = [0u8; 64 * 1024];

    while remaining > 0 {
        let want = remaining.min(buf.len() as u64) as usize;
        let got = reader
            .read(&mut buf[..want])
            .map_err(|e| format!("read failed: {}", e))?;
        if got == 0 {
            return Err("payload shorter than data chunk header claims".to_string());
        }
        hasher.update(&buf[..got]);
        remaining -= got as u64;
    }

    Ok(hasher.finalize().to_hex().to_string())
}
