//! Source discovery
//!
//! Finds the audio files under a source directory in a stable order. The
//! sorted path order is the play order the planner preserves.

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::audio::is_audio_file;

/// Collect supported audio files under `source`, sorted by path.
///
/// Hidden files and directories are skipped, matching what a user sees in
/// their file browser.
pub fn find_audio_files(source: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(source)
        .follow_links(true)
        .into_iter()
        .filter_entry(|e| !is_hidden(e.path()))
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| is_audio_file(p))
        .collect();

    files.sort();
    files
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.starts_with('.'))
        .unwrap_or(false)
}
