//! Reputation scoring
//!
//! Pure functions turning raw performance counters into a 0-100 score, a
//! qualitative tier, and the validation-eligibility flag, plus the
//! era-proportional reward estimator. All arithmetic is saturating integer
//! math; chain amounts never go through floats.

use crate::types::{PerformanceRecord, ReputationTier};

/// Inclusive lower bound of the Excellent tier
pub const EXCELLENT_THRESHOLD: u8 = 90;
/// Inclusive lower bound of the Good tier
pub const GOOD_THRESHOLD: u8 = 70;
/// Inclusive lower bound of the Fair tier
pub const FAIR_THRESHOLD: u8 = 50;

/// Scoring outcome for one performance record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoreReport {
    /// Reputation score in 0-100
    pub score: u8,
    pub tier: ReputationTier,
    /// Whether this score qualifies for validation duty
    pub can_validate: bool,
}

/// Classify a performance record.
///
/// Thresholds are evaluated high-to-low, first match wins; 90, 70 and 50
/// are inclusive lower bounds of their tier. `can_validate` uses the same
/// literal 70 as the pool's active flag but is computed independently of
/// it.
pub fn score(performance: &PerformanceRecord) -> ScoreReport {
    let score = performance.reputation_score;
    let (tier, can_validate) = if score >= EXCELLENT_THRESHOLD {
        (ReputationTier::Excellent, true)
    } else if score >= GOOD_THRESHOLD {
        (ReputationTier::Good, true)
    } else if score >= FAIR_THRESHOLD {
        (ReputationTier::Fair, false)
    } else {
        (ReputationTier::Poor, false)
    };

    ScoreReport {
        score,
        tier,
        can_validate,
    }
}

/// Estimate a validator's share of the era reward pot.
///
/// Proportional split `era_points / total_era_points * total_rewards`,
/// computed as scaled u128 integer arithmetic so on-chain amounts keep full
/// precision up to the chain's own truncating division. Returns 0 when no
/// points were earned pool-wide.
pub fn estimate_reward(era_points: u64, total_era_points: u64, total_rewards: u128) -> u128 {
    if total_era_points == 0 {
        return 0;
    }
    u128::from(era_points)
        .saturating_mul(total_rewards)
        .checked_div(u128::from(total_era_points))
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(score: u8) -> PerformanceRecord {
        PerformanceRecord {
            reputation_score: score,
            ..Default::default()
        }
    }

    #[test]
    fn test_tier_boundaries_are_inclusive_lower_bounds() {
        let cases = [
            (100, ReputationTier::Excellent, true),
            (90, ReputationTier::Excellent, true),
            (89, ReputationTier::Good, true),
            (70, ReputationTier::Good, true),
            (69, ReputationTier::Fair, false),
            (50, ReputationTier::Fair, false),
            (49, ReputationTier::Poor, false),
            (0, ReputationTier::Poor, false),
        ];

        for (value, tier, can_validate) in cases {
            let report = score(&record(value));
            assert_eq!(report.tier, tier, "score {value}");
            assert_eq!(report.can_validate, can_validate, "score {value}");
            assert_eq!(report.score, value);
        }
    }

    #[test]
    fn test_every_score_maps_to_exactly_one_tier() {
        for value in 0..=100u8 {
            let report = score(&record(value));
            let expected = match value {
                90..=100 => ReputationTier::Excellent,
                70..=89 => ReputationTier::Good,
                50..=69 => ReputationTier::Fair,
                _ => ReputationTier::Poor,
            };
            assert_eq!(report.tier, expected, "score {value}");
        }
    }

    #[test]
    fn test_high_performer_scenario() {
        let performance = PerformanceRecord {
            blocks_produced: 100,
            blocks_missed: 5,
            era_points: 950,
            last_active_era: 12,
            reputation_score: 92,
        };

        let report = score(&performance);
        assert_eq!(report.tier, ReputationTier::Excellent);
        assert!(report.can_validate);
    }

    #[test]
    fn test_estimate_reward_zero_total_points() {
        assert_eq!(estimate_reward(0, 0, 0), 0);
        assert_eq!(estimate_reward(500, 0, 1_000_000), 0);
        assert_eq!(estimate_reward(u64::MAX, 0, u128::MAX), 0);
    }

    #[test]
    fn test_estimate_reward_proportional_split() {
        // 950 of 10_000 points over a 1_000_000 pot
        assert_eq!(estimate_reward(950, 10_000, 1_000_000), 95_000);
        // Full share
        assert_eq!(estimate_reward(10_000, 10_000, 1_000_000), 1_000_000);
        // Truncates toward zero like the chain's own division
        assert_eq!(estimate_reward(1, 3, 100), 33);
    }

    #[test]
    fn test_estimate_reward_large_amounts_keep_precision() {
        // Planck-denominated pot near u64::MAX would overflow f64 precision;
        // the u128 path must stay exact.
        let pot: u128 = 10_000_000_000_000_000_000;
        assert_eq!(estimate_reward(1, 4, pot), pot / 4);
    }
}
