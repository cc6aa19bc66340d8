//! Core domain model
//!
//! This module contains:
//! - Red Book capacity accounting (frames, gaps, disc sizes)
//! - The track model and disc planner
//! - Session settings persistence
//! - Source directory scanning

pub mod capacity;
mod plan;
mod scanning;
mod settings;
mod track;

pub use capacity::{DiscLength, DiscMode};
pub use plan::{plan_discs, plan_discs_filling_gaps, DiscPlan};
pub use scanning::find_audio_files;
pub use settings::SessionSettings;
pub use track::{Track, TrackId};
