//! Disc planning
//!
//! Partitions an ordered track list across the minimum number of discs a
//! first-fit walk can manage without ever reordering across discs. Play
//! order is the hard requirement here; disc count is secondary.

use std::sync::Arc;

use crate::core::capacity::{self, DiscMode, TAO_GAP_FRAMES};
use crate::core::Track;
use crate::error::{Error, Result};

/// An ordered subset of tracks assigned to one physical disc.
///
/// Immutable after planning; runtime state lives on the owning burn job.
#[derive(Debug, Clone)]
pub struct DiscPlan {
    /// 1-based disc number; burn order follows this
    pub index: u32,
    pub tracks: Vec<Arc<Track>>,
    /// Sum of track frames plus gap overhead for `mode`
    pub total_frames: u64,
    pub mode: DiscMode,
}

impl DiscPlan {
    fn from_tracks(index: u32, tracks: Vec<Arc<Track>>, mode: DiscMode) -> Self {
        let track_frames: u64 = tracks.iter().map(|t| t.duration_frames).sum();
        let total_frames = track_frames + capacity::disc_overhead_frames(mode, tracks.len());
        Self {
            index,
            tracks,
            total_frames,
            mode,
        }
    }
}

/// Reject configurations the packing loop could never satisfy.
///
/// A TAO disc must hold at least one gap plus one frame beyond a first
/// track, otherwise every second track is unplaceable no matter how short.
fn validate_capacity(capacity_frames: u64, mode: DiscMode) -> Result<()> {
    if capacity_frames == 0 {
        return Err(Error::InvalidConfig(
            "disc capacity is zero frames".to_string(),
        ));
    }
    if mode == DiscMode::Tao && capacity_frames <= TAO_GAP_FRAMES {
        return Err(Error::InvalidConfig(format!(
            "capacity of {} frames cannot hold a TAO gap ({} frames) plus audio",
            capacity_frames, TAO_GAP_FRAMES
        )));
    }
    Ok(())
}

fn check_fits_alone(track: &Track, frames: u64, capacity_frames: u64) -> Result<()> {
    // A lone track on a fresh disc pays no gap, so compare bare frames.
    if frames > capacity_frames {
        return Err(Error::TrackExceedsCapacity {
            title: track.title.clone(),
            frames,
            capacity: capacity_frames,
        });
    }
    Ok(())
}

/// Greedy first-fit in original order.
///
/// Walks tracks in sequence, accumulating onto the current disc while the
/// next track plus its gap delta still fits; a track that fits exactly to
/// the last frame is included, not deferred. Closing a disc opens the next.
pub fn plan_discs(
    tracks: &[Arc<Track>],
    capacity_frames: u64,
    mode: DiscMode,
) -> Result<Vec<DiscPlan>> {
    validate_capacity(capacity_frames, mode)?;

    let mut plans: Vec<DiscPlan> = Vec::new();
    let mut current: Vec<Arc<Track>> = Vec::new();
    let mut current_frames: u64 = 0;

    for track in tracks {
        let frames = capacity::frames_of(track)?;
        check_fits_alone(track, frames, capacity_frames)?;

        let delta = frames + capacity::gap_delta(mode, current.len());
        if current_frames + delta <= capacity_frames {
            current.push(track.clone());
            current_frames += delta;
        } else {
            plans.push(DiscPlan::from_tracks(
                plans.len() as u32 + 1,
                std::mem::take(&mut current),
                mode,
            ));
            current.push(track.clone());
            current_frames = frames;
        }
    }

    if !current.is_empty() {
        plans.push(DiscPlan::from_tracks(plans.len() as u32 + 1, current, mode));
    }

    Ok(plans)
}

/// Space-optimizing variant: fill each disc with every still-unplaced track
/// that fits, walking the remainder in order.
///
/// Relative order survives within a disc but not across discs, so this is
/// only offered as an explicit opt-in. Oversized tracks are rejected the
/// same way as in [`plan_discs`] rather than isolated on their own disc.
pub fn plan_discs_filling_gaps(
    tracks: &[Arc<Track>],
    capacity_frames: u64,
    mode: DiscMode,
) -> Result<Vec<DiscPlan>> {
    validate_capacity(capacity_frames, mode)?;

    for track in tracks {
        let frames = capacity::frames_of(track)?;
        check_fits_alone(track, frames, capacity_frames)?;
    }

    let mut remaining: Vec<Arc<Track>> = tracks.to_vec();
    let mut plans: Vec<DiscPlan> = Vec::new();

    while !remaining.is_empty() {
        let mut current: Vec<Arc<Track>> = Vec::new();
        let mut current_frames: u64 = 0;
        let mut skipped: Vec<Arc<Track>> = Vec::new();

        for track in remaining {
            let delta = track.duration_frames + capacity::gap_delta(mode, current.len());
            if current_frames + delta <= capacity_frames {
                current_frames += delta;
                current.push(track);
            } else {
                skipped.push(track);
            }
        }

        plans.push(DiscPlan::from_tracks(plans.len() as u32 + 1, current, mode));
        remaining = skipped;
    }

    Ok(plans)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn tracks(durations: &[u64]) -> Vec<Arc<Track>> {
        durations
            .iter()
            .enumerate()
            .map(|(i, &frames)| {
                Arc::new(Track::new(
                    PathBuf::from(format!("/music/{:02}.mp3", i + 1)),
                    format!("track-{:02}", i + 1),
                    frames,
                ))
            })
            .collect()
    }

    fn titles(plan: &DiscPlan) -> Vec<&str> {
        plan.tracks.iter().map(|t| t.title.as_str()).collect()
    }

    #[test]
    fn test_empty_input_yields_no_plans() {
        let plans = plan_discs(&[], 333_000, DiscMode::Dao).unwrap();
        assert!(plans.is_empty());
    }

    #[test]
    fn test_single_disc_when_everything_fits() {
        let ts = tracks(&[10_000, 20_000, 30_000]);
        let plans = plan_discs(&ts, 333_000, DiscMode::Dao).unwrap();
        assert_eq!(plans.len(), 1);
        assert_eq!(plans[0].index, 1);
        assert_eq!(plans[0].total_frames, 60_000);
    }

    #[test]
    fn test_split_example_from_overflow() {
        // 300000 + 40000 exceeds 333000, so the 40000 track opens disc 2
        let ts = tracks(&[300_000, 40_000, 20_000]);
        let plans = plan_discs(&ts, 333_000, DiscMode::Dao).unwrap();
        assert_eq!(plans.len(), 2);
        assert_eq!(titles(&plans[0]), vec!["track-01"]);
        assert_eq!(titles(&plans[1]), vec!["track-02", "track-03"]);
        assert_eq!(plans[0].total_frames, 300_000);
        assert_eq!(plans[1].total_frames, 60_000);
    }

    #[test]
    fn test_concatenation_reproduces_input_order() {
        let ts = tracks(&[90_000, 90_000, 90_000, 90_000, 90_000, 90_000, 90_000]);
        let plans = plan_discs(&ts, 333_000, DiscMode::Dao).unwrap();

        let replay: Vec<_> = plans
            .iter()
            .flat_map(|p| p.tracks.iter().map(|t| t.id.clone()))
            .collect();
        let original: Vec<_> = ts.iter().map(|t| t.id.clone()).collect();
        assert_eq!(replay, original);
    }

    #[test]
    fn test_disc_indices_are_contiguous_from_one() {
        let ts = tracks(&[200_000, 200_000, 200_000, 200_000]);
        let plans = plan_discs(&ts, 333_000, DiscMode::Dao).unwrap();
        let indices: Vec<u32> = plans.iter().map(|p| p.index).collect();
        assert_eq!(indices, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_every_plan_within_capacity() {
        let ts = tracks(&[120_000, 95_000, 87_500, 66_000, 140_000, 3_000, 45_000]);
        for mode in [DiscMode::Dao, DiscMode::Tao] {
            let plans = plan_discs(&ts, 333_000, mode).unwrap();
            for plan in &plans {
                assert!(plan.total_frames <= 333_000);
            }
        }
    }

    #[test]
    fn test_first_fit_fills_each_disc_maximally() {
        // The first track of disc N+1 must not have fit on disc N
        let ts = tracks(&[120_000, 95_000, 87_500, 66_000, 140_000, 3_000, 45_000]);
        let plans = plan_discs(&ts, 333_000, DiscMode::Dao).unwrap();
        for pair in plans.windows(2) {
            let head = pair[1].tracks[0].duration_frames;
            assert!(pair[0].total_frames + head > 333_000);
        }
    }

    #[test]
    fn test_exact_fit_is_included_not_deferred() {
        let ts = tracks(&[300_000, 33_000, 10]);
        let plans = plan_discs(&ts, 333_000, DiscMode::Dao).unwrap();
        assert_eq!(titles(&plans[0]), vec!["track-01", "track-02"]);
        assert_eq!(plans[0].total_frames, 333_000);
        assert_eq!(titles(&plans[1]), vec!["track-03"]);
    }

    #[test]
    fn test_dao_total_is_bare_sum() {
        let ts = tracks(&[1_000, 2_000, 3_000]);
        let plans = plan_discs(&ts, 333_000, DiscMode::Dao).unwrap();
        assert_eq!(plans[0].total_frames, 6_000);
    }

    #[test]
    fn test_tao_total_adds_inter_track_gaps() {
        let ts = tracks(&[1_000, 2_000, 3_000]);
        let plans = plan_discs(&ts, 333_000, DiscMode::Tao).unwrap();
        assert_eq!(plans[0].total_frames, 6_000 + 150 * 2);
    }

    #[test]
    fn test_tao_gap_can_force_a_split() {
        // Bare frames fit exactly, but the TAO gap pushes past capacity
        let ts = tracks(&[200_000, 133_000]);
        let dao = plan_discs(&ts, 333_000, DiscMode::Dao).unwrap();
        assert_eq!(dao.len(), 1);
        let tao = plan_discs(&ts, 333_000, DiscMode::Tao).unwrap();
        assert_eq!(tao.len(), 2);
    }

    #[test]
    fn test_oversized_track_halts_planning() {
        let ts = tracks(&[5_000, 400_000, 5_000]);
        let err = plan_discs(&ts, 333_000, DiscMode::Dao).unwrap_err();
        match err {
            Error::TrackExceedsCapacity {
                frames, capacity, ..
            } => {
                assert_eq!(frames, 400_000);
                assert_eq!(capacity, 333_000);
            }
            other => panic!("expected TrackExceedsCapacity, got {:?}", other),
        }
    }

    #[test]
    fn test_track_exactly_at_capacity_is_allowed_alone() {
        let ts = tracks(&[333_000]);
        let plans = plan_discs(&ts, 333_000, DiscMode::Tao).unwrap();
        assert_eq!(plans.len(), 1);
        assert_eq!(plans[0].total_frames, 333_000);
    }

    #[test]
    fn test_zero_duration_track_is_invalid() {
        let ts = tracks(&[5_000, 0]);
        let err = plan_discs(&ts, 333_000, DiscMode::Dao).unwrap_err();
        assert!(matches!(err, Error::InvalidTrack { .. }));
    }

    #[test]
    fn test_capacity_smaller_than_tao_gap_is_config_error() {
        let ts = tracks(&[10]);
        let err = plan_discs(&ts, 150, DiscMode::Tao).unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
        // The same capacity is fine in DAO mode
        assert!(plan_discs(&ts, 150, DiscMode::Dao).is_ok());
    }

    #[test]
    fn test_zero_capacity_is_config_error() {
        let err = plan_discs(&[], 0, DiscMode::Dao).unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
    }

    #[test]
    fn test_fill_gaps_places_every_track_once() {
        let ts = tracks(&[200_000, 200_000, 100_000, 30_000, 120_000]);
        let plans = plan_discs_filling_gaps(&ts, 333_000, DiscMode::Dao).unwrap();

        let mut placed: Vec<_> = plans
            .iter()
            .flat_map(|p| p.tracks.iter().map(|t| t.id.clone()))
            .collect();
        placed.sort_by(|a, b| a.0.cmp(&b.0));
        let mut original: Vec<_> = ts.iter().map(|t| t.id.clone()).collect();
        original.sort_by(|a, b| a.0.cmp(&b.0));
        assert_eq!(placed, original);
        for plan in &plans {
            assert!(plan.total_frames <= 333_000);
        }
    }

    #[test]
    fn test_fill_gaps_pulls_later_tracks_forward() {
        // Sequential packing needs three discs; gap filling pairs the long
        // and short tracks and saves one
        let ts = tracks(&[200_000, 200_000, 133_000, 133_000]);
        let sequential = plan_discs(&ts, 333_000, DiscMode::Dao).unwrap();
        assert_eq!(sequential.len(), 3);

        let filled = plan_discs_filling_gaps(&ts, 333_000, DiscMode::Dao).unwrap();
        assert_eq!(filled.len(), 2);
        assert_eq!(titles(&filled[0]), vec!["track-01", "track-03"]);
        assert_eq!(titles(&filled[1]), vec!["track-02", "track-04"]);
    }

    #[test]
    fn test_fill_gaps_keeps_relative_order_within_disc() {
        let ts = tracks(&[150_000, 150_000, 20_000, 150_000, 5_000]);
        let plans = plan_discs_filling_gaps(&ts, 333_000, DiscMode::Dao).unwrap();
        for plan in &plans {
            let positions: Vec<usize> = plan
                .tracks
                .iter()
                .map(|t| ts.iter().position(|o| o.id == t.id).unwrap())
                .collect();
            let mut sorted = positions.clone();
            sorted.sort_unstable();
            assert_eq!(positions, sorted);
        }
    }

    #[test]
    fn test_fill_gaps_rejects_oversized_track() {
        let ts = tracks(&[5_000, 400_000]);
        let err = plan_discs_filling_gaps(&ts, 333_000, DiscMode::Dao).unwrap_err();
        assert!(matches!(err, Error::TrackExceedsCapacity { .. }));
    }
}
