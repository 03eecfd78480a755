//! Produces an ordered checkpoint list over a video's timeline.

/// Fixed chunk length sampled at each checkpoint.
pub const CHUNK_DURATION: f64 = 30.0;

const MAX_CHECKPOINTS: usize = 6;

/// Primary checkpoints come first (15%/50%/85% of duration), then fallbacks
/// (25%/35%/65%/75%), filtered to leave room for a full chunk before the end, capped at 6.
pub fn checkpoints(duration: f64) -> Vec<f64> {
    let primary = [0.15, 0.50, 0.85];
    let fallback = [0.25, 0.35, 0.65, 0.75];

    primary
        .iter()
        .chain(fallback.iter())
        .map(|fraction| fraction * duration)
        .filter(|t| *t <= duration - 10.0)
        .take(MAX_CHECKPOINTS)
        .collect()
}

/// Number of checkpoints considered "primary" for the matcher's early-exit/stop rules —
/// always the first 3 entries of the unfiltered schedule that survived filtering.
pub const PRIMARY_COUNT: usize = 3;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn produces_primary_then_fallback_in_order() {
        let cps = checkpoints(1800.0);
        assert_eq!(cps, vec![270.0, 900.0, 1530.0, 450.0, 630.0, 1170.0]);
    }

    #[test]
    fn caps_at_six_entries() {
        let cps = checkpoints(10_000.0);
        assert!(cps.len() <= 6);
    }

    #[test]
    fn filters_checkpoints_too_close_to_end() {
        // duration - 10 = 50; 0.85*60 = 51 > 50, must be filtered
        let cps = checkpoints(60.0);
        assert!(cps.iter().all(|t| *t <= 50.0));
    }

    #[test]
    fn boundary_duration_sixty_keeps_first_checkpoint() {
        let cps = checkpoints(60.0);
        assert!(cps.contains(&9.0));
    }

    #[test]
    fn every_checkpoint_leaves_room_for_a_full_chunk() {
        for duration in [60.0, 90.5, 1234.0, 7200.0] {
            for t in checkpoints(duration) {
                assert!(t > 0.0 && t <= duration - 10.0);
            }
        }
    }
}
