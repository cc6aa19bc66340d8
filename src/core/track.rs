//! Track model
//!
//! A `Track` is one source audio file with an exact frame-accurate duration,
//! loaded once at session start and shared immutably into disc plans.

use std::path::PathBuf;

use crate::core::capacity::BYTES_PER_FRAME;

/// Unique identity for a track within one run
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TrackId(pub String);

impl TrackId {
    fn generate() -> Self {
        TrackId(uuid::Uuid::new_v4().to_string())
    }
}

impl std::fmt::Display for TrackId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One source audio file, immutable once loaded
#[derive(Debug, Clone)]
pub struct Track {
    pub id: TrackId,
    /// Source file on disk
    pub path: PathBuf,
    /// Display title (tag title, or the filename stem)
    pub title: String,
    /// Exact duration in Red Book frames (1/75 s), never rounded seconds
    pub duration_frames: u64,
    /// Estimated size of the staged PCM payload in bytes
    pub estimated_bytes: u64,
}

impl Track {
    pub fn new(path: PathBuf, title: String, duration_frames: u64) -> Self {
        Self {
            id: TrackId::generate(),
            path,
            title,
            duration_frames,
            estimated_bytes: duration_frames * BYTES_PER_FRAME,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_estimated_bytes_follows_duration() {
        let t = Track::new(PathBuf::from("/music/a.flac"), "a".to_string(), 75);
        // One second of CD audio is 75 frames * 2352 bytes
        assert_eq!(t.estimated_bytes, 176_400);
    }

    #[test]
    fn test_track_ids_are_unique() {
        let a = Track::new(PathBuf::from("/music/a.flac"), "a".to_string(), 10);
        let b = Track::new(PathBuf::from("/music/a.flac"), "a".to_string(), 10);
        assert_ne!(a.id, b.id);
    }
}
