//! Era clock
//!
//! Computes era timing from chain-fed inputs and tracks rotation
//! boundaries across observations:
//! - `compute_era_state`: pure arithmetic, countdown floored at zero
//! - `EraClock`: remembers the last observed state and reports when a
//!   rotation boundary was crossed since the previous observation
//!
//! Crossing a boundary triggers no local mutation; it is advisory
//! information for a caller deciding whether to re-poll the chain.

use crate::types::EraState;

/// Build an [`EraState`] from raw chain inputs.
///
/// Tolerates a local view that lags the authoritative rotation: when
/// `current_block` is already past `era_start_block + era_length` the
/// countdown reports zero rather than going negative.
pub fn compute_era_state(
    era_index: u32,
    era_length: u32,
    era_start_block: u64,
    current_block: u64,
) -> EraState {
    EraState {
        era_index,
        era_length,
        era_start_block,
        current_block,
    }
}

/// Tracks era state across poll cycles
#[derive(Debug, Clone, Default)]
pub struct EraClock {
    last: Option<EraState>,
}

impl EraClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last observed era state, if any
    pub fn current(&self) -> Option<&EraState> {
        self.last.as_ref()
    }

    /// Record a freshly computed era state.
    ///
    /// Returns true when a rotation happened since the previous
    /// observation: either the era index advanced, or the new state itself
    /// sits on or past its rotation boundary.
    pub fn observe(&mut self, state: EraState) -> bool {
        let rotated = match self.last {
            Some(prev) => state.era_index > prev.era_index || state.rotation_crossed(),
            None => state.rotation_crossed(),
        };

        if let Some(prev) = self.last {
            if state.era_index > prev.era_index {
                tracing::info!(
                    from_era = prev.era_index,
                    to_era = state.era_index,
                    "Era rotated"
                );
            }
        }

        self.last = Some(state);
        rotated
    }

    /// Blocks remaining in the currently observed era, if one was observed
    pub fn blocks_until_rotation(&self) -> Option<u64> {
        self.last.map(|state| state.blocks_until_rotation())
    }
}
