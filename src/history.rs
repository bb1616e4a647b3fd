//! Selection history tracking
//!
//! Append-only per-validator record of the eras in which a validator was
//! selected into the active set. Appends are idempotent against duplicate
//! recording within the same era and strictly monotonic otherwise; a
//! backdated era is a logic error surfaced to the caller, never silently
//! dropped.

use std::collections::HashMap;
use std::sync::RwLock;

use tracing::debug;

use crate::error::{PoolError, Result};
use crate::types::ValidatorId;

/// Append-only selection history, keyed by validator
#[derive(Debug, Default)]
pub struct SelectionHistoryTracker {
    histories: RwLock<HashMap<ValidatorId, Vec<u32>>>,
}

impl SelectionHistoryTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that a validator was selected for `era_index`.
    ///
    /// Recording the same era twice is a no-op (idempotent within an era).
    /// An era at or below the last recorded entry other than an exact
    /// duplicate fails with [`PoolError::OutOfOrderEra`] and leaves the
    /// history unchanged.
    pub fn record_selection(&self, id: &ValidatorId, era_index: u32) -> Result<()> {
        let mut histories = self
            .histories
            .write()
            .expect("selection history lock poisoned");
        let history = histories.entry(id.clone()).or_default();

        if let Some(&last) = history.last() {
            if era_index == last {
                return Ok(());
            }
            if era_index < last {
                return Err(PoolError::OutOfOrderEra {
                    id: id.to_string(),
                    attempted: era_index,
                    last,
                });
            }
        }

        history.push(era_index);
        debug!(validator = %id, era = era_index, "Recorded era selection");
        Ok(())
    }

    /// Bulk-load a chain-provided history for a validator.
    ///
    /// Entries pass through the same idempotence and monotonicity checks as
    /// individual appends, so a malformed chain response cannot corrupt a
    /// locally consistent history.
    pub fn seed(&self, id: &ValidatorId, entries: &[u32]) -> Result<()> {
        for &era_index in entries {
            self.record_selection(id, era_index)?;
        }
        Ok(())
    }

    /// Eras in which the validator was selected, ascending.
    ///
    /// Re-readable any number of times without side effects; unknown
    /// validators yield an empty history.
    pub fn history_of(&self, id: &ValidatorId) -> Vec<u32> {
        self.histories
            .read()
            .expect("selection history lock poisoned")
            .get(id)
            .cloned()
            .unwrap_or_default()
    }

    /// Number of eras the validator was ever selected in
    pub fn eras_selected(&self, id: &ValidatorId) -> usize {
        self.histories
            .read()
            .expect("selection history lock poisoned")
            .get(id)
            .map(Vec::len)
            .unwrap_or(0)
    }

    /// Number of validators with at least one recorded selection
    pub fn tracked_validators(&self) -> usize {
        self.histories
            .read()
            .expect("selection history lock poisoned")
            .len()
    }
}
