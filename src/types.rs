//! Core types for the CVN validator pool
//!
//! Shared definitions used across the registry, scorer, era clock and
//! command gateway. Chain-owned records (`ValidatorCategory`,
//! `PerformanceRecord`) carry SCALE derives matching their on-chain shape.

use parity_scale_codec::{Decode, Encode};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

use crate::error::PoolError;

/// Minimum reputation score for a member to count as active in the pool
pub const ACTIVE_SCORE_THRESHOLD: u8 = 70;

/// Opaque account address identifying a validator
///
/// Unique across the whole pool; a validator belongs to at most one
/// category at a time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ValidatorId(String);

impl ValidatorId {
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ValidatorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ValidatorId {
    fn from(address: &str) -> Self {
        Self(address.to_string())
    }
}

impl From<String> for ValidatorId {
    fn from(address: String) -> Self {
        Self(address)
    }
}

/// Admission category of a pool member
///
/// Closed set; unknown categories are a decode error, never silently
/// ignored.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Encode, Decode,
)]
pub enum ValidatorCategory {
    /// Admitted via economic stake
    Stake,
    /// Delegated by the governance parliament
    Parliamentary,
    /// Admitted on merit (technical contribution record)
    Merit,
}

impl ValidatorCategory {
    /// All categories, in canonical listing order
    pub const ALL: [ValidatorCategory; 3] = [
        ValidatorCategory::Stake,
        ValidatorCategory::Parliamentary,
        ValidatorCategory::Merit,
    ];

    /// Human-readable label
    pub fn label(&self) -> &'static str {
        match self {
            ValidatorCategory::Stake => "Stake Validator",
            ValidatorCategory::Parliamentary => "Parliamentary Validator",
            ValidatorCategory::Merit => "Merit Validator",
        }
    }

    /// Static description of the admission requirement
    pub fn requirements(&self) -> &'static str {
        match self {
            ValidatorCategory::Stake => "Bond the minimum self-stake for the current era",
            ValidatorCategory::Parliamentary => "Hold an active delegation from parliament",
            ValidatorCategory::Merit => "Approved merit record from the technical committee",
        }
    }
}

impl fmt::Display for ValidatorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Block-production counters for one validator, as stored on chain
///
/// Chain-owned: refreshed wholesale on every poll, never mutated locally.
/// The `reputation_score` field is recomputed locally by the scorer but is
/// treated as derived until the next hydration confirms it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Encode, Decode)]
pub struct PerformanceRecord {
    pub blocks_produced: u64,
    pub blocks_missed: u64,
    pub era_points: u64,
    pub last_active_era: u32,
    /// Reputation score in 0-100
    pub reputation_score: u8,
}

/// A registered pool member with its derived active flag
///
/// Serializes for read-only consumers; not deserializable, so the derived
/// flag cannot be reintroduced out of sync with the performance record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PoolMember {
    pub id: ValidatorId,
    pub category: ValidatorCategory,
    pub performance: PerformanceRecord,
    /// Derived: true iff `performance.reputation_score >= ACTIVE_SCORE_THRESHOLD`
    is_active: bool,
}

impl PoolMember {
    /// Build a member, deriving `is_active` from the performance record.
    ///
    /// This is the only constructor; the flag is never set independently.
    pub fn new(
        id: ValidatorId,
        category: ValidatorCategory,
        performance: PerformanceRecord,
    ) -> Self {
        let is_active = performance.reputation_score >= ACTIVE_SCORE_THRESHOLD;
        Self {
            id,
            category,
            performance,
            is_active,
        }
    }

    pub fn is_active(&self) -> bool {
        self.is_active
    }
}

/// Era timing snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EraState {
    pub era_index: u32,
    /// Era length in blocks
    pub era_length: u32,
    pub era_start_block: u64,
    pub current_block: u64,
}

impl EraState {
    /// Blocks remaining until the next rotation boundary, floored at zero.
    ///
    /// Never negative, even when the local view lags behind a boundary the
    /// chain has already rotated past.
    pub fn blocks_until_rotation(&self) -> u64 {
        let boundary = self.era_start_block.saturating_add(u64::from(self.era_length));
        boundary.saturating_sub(self.current_block)
    }

    /// Whether the rotation boundary has been reached or passed.
    ///
    /// Advisory only: crossing triggers no local mutation, it tells a
    /// caller that a re-poll is worthwhile.
    pub fn rotation_crossed(&self) -> bool {
        self.current_block >= self.era_start_block.saturating_add(u64::from(self.era_length))
    }
}

/// Immutable per-era snapshot of the active validator set
///
/// The three category sets are pairwise disjoint; construction enforces it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidatorSet {
    pub era_index: u32,
    pub stake: HashSet<ValidatorId>,
    pub parliamentary: HashSet<ValidatorId>,
    pub merit: HashSet<ValidatorId>,
}

impl ValidatorSet {
    /// Build a set, rejecting any identity that appears in more than one
    /// category.
    pub fn new(
        era_index: u32,
        stake: HashSet<ValidatorId>,
        parliamentary: HashSet<ValidatorId>,
        merit: HashSet<ValidatorId>,
    ) -> Result<Self, PoolError> {
        Self::check_disjoint(era_index, &stake, &parliamentary)?;
        Self::check_disjoint(era_index, &stake, &merit)?;
        Self::check_disjoint(era_index, &parliamentary, &merit)?;
        Ok(Self {
            era_index,
            stake,
            parliamentary,
            merit,
        })
    }

    fn check_disjoint(
        era: u32,
        a: &HashSet<ValidatorId>,
        b: &HashSet<ValidatorId>,
    ) -> Result<(), PoolError> {
        if let Some(id) = a.intersection(b).next() {
            return Err(PoolError::OverlappingValidatorSet {
                era,
                id: id.to_string(),
            });
        }
        Ok(())
    }

    /// Empty set for an era (how an absent on-chain set is modelled)
    pub fn empty(era_index: u32) -> Self {
        Self {
            era_index,
            ..Default::default()
        }
    }

    pub fn contains(&self, id: &ValidatorId) -> bool {
        self.stake.contains(id) || self.parliamentary.contains(id) || self.merit.contains(id)
    }

    pub fn len(&self) -> usize {
        self.stake.len() + self.parliamentary.len() + self.merit.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Qualitative reputation bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReputationTier {
    Excellent,
    Good,
    Fair,
    Poor,
}

impl fmt::Display for ReputationTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ReputationTier::Excellent => "Excellent",
            ReputationTier::Good => "Good",
            ReputationTier::Fair => "Fair",
            ReputationTier::Poor => "Poor",
        };
        f.write_str(name)
    }
}
