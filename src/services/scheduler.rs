use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const MIN_EASE_FACTOR: f64 = 1.3;
pub const INITIAL_EASE_FACTOR: f64 = 2.5;
pub const INITIAL_INTERVAL_DAYS: i64 = 1;
pub const GRADUATION_INTERVAL_DAYS: i64 = 6;

/// Per-(user, word) spaced-repetition state, SM-2 style.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewState {
    pub interval_days: i64,
    pub ease_factor: f64,
}

impl Default for ReviewState {
    fn default() -> Self {
        Self {
            interval_days: INITIAL_INTERVAL_DAYS,
            ease_factor: INITIAL_EASE_FACTOR,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum ScheduleError {
    #[error("质量评分必须是0-5之间的整数")]
    InvalidQuality(i64),
}

pub fn validate_quality(quality: i64) -> Result<(), ScheduleError> {
    if (0..=5).contains(&quality) {
        Ok(())
    } else {
        Err(ScheduleError::InvalidQuality(quality))
    }
}

pub fn is_passing(quality: i64) -> bool {
    quality >= 3
}

/// Computes the next interval and ease factor from a 0-5 recall quality.
///
/// A failed recall (quality < 3) hard-resets the interval to 1 day and
/// penalizes the ease factor. A successful recall grades the ease factor by
/// how far the quality fell short of 5 and grows the interval.
pub fn next_state(current: ReviewState, quality: i64) -> Result<ReviewState, ScheduleError> {
    validate_quality(quality)?;

    if !is_passing(quality) {
        return Ok(ReviewState {
            interval_days: INITIAL_INTERVAL_DAYS,
            ease_factor: (current.ease_factor - 0.2).max(MIN_EASE_FACTOR),
        });
    }

    let shortfall = (5 - quality) as f64;
    let ease_factor = (current.ease_factor + (0.1 - shortfall * (0.08 + shortfall * 0.02)))
        .max(MIN_EASE_FACTOR);

    // TODO: a 6-day interval falls back to 1 here instead of continuing to
    // grow; product has not yet decided whether to switch to pure geometric
    // growth, so the observed behavior is kept.
    let interval_days = match current.interval_days {
        1 => GRADUATION_INTERVAL_DAYS,
        6 => 1,
        days => ((days as f64) * ease_factor).round() as i64,
    };

    Ok(ReviewState {
        interval_days: interval_days.max(1),
        ease_factor,
    })
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn failed_recall_resets_interval() {
        for quality in 0..3 {
            let current = ReviewState {
                interval_days: 42,
                ease_factor: 2.5,
            };
            let next = next_state(current, quality).unwrap();
            assert_eq!(next.interval_days, 1);
            assert!((next.ease_factor - 2.3).abs() < 1e-9);
        }
    }

    #[test]
    fn failed_recall_respects_ease_floor() {
        let current = ReviewState {
            interval_days: 10,
            ease_factor: 1.35,
        };
        let next = next_state(current, 0).unwrap();
        assert_eq!(next.ease_factor, MIN_EASE_FACTOR);
    }

    #[test]
    fn first_success_graduates_to_six_days() {
        for ease in [1.3, 2.5, 3.0] {
            let current = ReviewState {
                interval_days: 1,
                ease_factor: ease,
            };
            let next = next_state(current, 3).unwrap();
            assert_eq!(next.interval_days, 6);
        }
    }

    #[test]
    fn six_day_interval_falls_back_to_one() {
        let current = ReviewState {
            interval_days: 6,
            ease_factor: 2.5,
        };
        let next = next_state(current, 5).unwrap();
        assert_eq!(next.interval_days, 1);
    }

    #[test]
    fn longer_intervals_grow_by_ease() {
        let current = ReviewState {
            interval_days: 10,
            ease_factor: 2.5,
        };
        let next = next_state(current, 5).unwrap();
        // ease 2.5 + 0.1 = 2.6, 10 * 2.6 = 26
        assert_eq!(next.interval_days, 26);
        assert!((next.ease_factor - 2.6).abs() < 1e-9);
    }

    #[test]
    fn quality_four_keeps_ease_unchanged() {
        let current = ReviewState::default();
        let next = next_state(current, 4).unwrap();
        assert!((next.ease_factor - 2.5).abs() < 1e-9);
        assert_eq!(next.interval_days, 6);
    }

    #[test]
    fn quality_three_penalizes_ease() {
        let current = ReviewState::default();
        let next = next_state(current, 3).unwrap();
        // 2.5 + (0.1 - 2 * (0.08 + 2 * 0.02)) = 2.36
        assert!((next.ease_factor - 2.36).abs() < 1e-9);
    }

    #[test]
    fn out_of_range_quality_rejected() {
        let current = ReviewState::default();
        assert_eq!(next_state(current, -1), Err(ScheduleError::InvalidQuality(-1)));
        assert_eq!(next_state(current, 6), Err(ScheduleError::InvalidQuality(6)));
    }

    #[test]
    fn review_then_lapse_example() {
        // New word, first review quality=4.
        let first = next_state(ReviewState::default(), 4).unwrap();
        assert_eq!(first.interval_days, 6);
        assert!(first.ease_factor >= 2.5);

        // Six days later the recall fails with quality=2.
        let second = next_state(first, 2).unwrap();
        assert_eq!(second.interval_days, 1);
        assert!((second.ease_factor - (first.ease_factor - 0.2)).abs() < 1e-9);
    }

    proptest! {
        #[test]
        fn ease_never_drops_below_floor(qualities in prop::collection::vec(0i64..=5, 1..50)) {
            let mut state = ReviewState::default();
            for quality in qualities {
                state = next_state(state, quality).unwrap();
                prop_assert!(state.ease_factor >= MIN_EASE_FACTOR);
                prop_assert!(state.interval_days >= 1);
            }
        }
    }
}
