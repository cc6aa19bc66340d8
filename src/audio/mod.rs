//! Audio probing and detection
//!
//! The metadata collaborator: duration/sample-format probing and audio file
//! detection used at load time.

mod detection;
mod probe;

pub use detection::is_audio_file;
pub use probe::{load_track, probe, ProbeInfo};
