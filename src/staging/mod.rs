//! Track staging and image assembly
//!
//! Converts source tracks to canonical PCM through a bounded transcoder
//! pool and assembles each disc's staged tracks into a burn-ready image.

mod image;
pub mod pcm;
mod transcode;

pub use image::{assemble_image, CueEntry, DiscImage};
pub use transcode::{find_ffmpeg, StagedTrack, TranscodePool};
