//! Pool registry
//!
//! Queryable view of all pool members, hydrated wholesale from the chain
//! on a fixed poll cadence. Each poll builds one immutable
//! [`PoolSnapshot`] and publishes it with an atomic `Arc` swap: readers
//! clone the current snapshot handle and are never blocked by a poll in
//! progress. A failed poll keeps the previous snapshot and degrades to
//! stale-but-available; only a registry that has never hydrated reports
//! itself unavailable.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::{PoolError, Result};
use crate::metrics::PoolMetrics;
use crate::provider::ChainStateProvider;
use crate::scoring::{self, ScoreReport};
use crate::types::{
    EraState, PoolMember, ValidatorCategory, ValidatorId, ValidatorSet,
};

/// Snapshot availability, as seen by read queries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotStatus {
    /// No hydration has ever succeeded; queries are unavailable
    NotReady,
    /// Serving the result of the most recent poll
    Fresh,
    /// Last poll failed; serving the previous snapshot
    Stale,
}

/// Immutable point-in-time view of the pool
///
/// Member order is the chain's enumeration order; it carries no semantic
/// meaning, but category filters preserve it.
#[derive(Debug)]
pub struct PoolSnapshot {
    members: Vec<PoolMember>,
    by_id: HashMap<ValidatorId, usize>,
    era: EraState,
    validator_set: ValidatorSet,
}

impl PoolSnapshot {
    /// All members, in hydration order
    pub fn members(&self) -> &[PoolMember] {
        &self.members
    }

    /// Members of one category, preserving the full listing's relative
    /// order (stable filter)
    pub fn members_in(&self, category: ValidatorCategory) -> Vec<&PoolMember> {
        self.members
            .iter()
            .filter(|member| member.category == category)
            .collect()
    }

    pub fn member(&self, id: &ValidatorId) -> Option<&PoolMember> {
        self.by_id.get(id).map(|&index| &self.members[index])
    }

    /// Category of a member, `None` when not registered
    pub fn category_of(&self, id: &ValidatorId) -> Option<ValidatorCategory> {
        self.member(id).map(|member| member.category)
    }

    pub fn is_member(&self, id: &ValidatorId) -> bool {
        self.by_id.contains_key(id)
    }

    /// Reputation annotation for a member, `None` when not registered
    pub fn report_of(&self, id: &ValidatorId) -> Option<ScoreReport> {
        self.member(id).map(|member| scoring::score(&member.performance))
    }

    pub fn era_state(&self) -> EraState {
        self.era
    }

    pub fn validator_set(&self) -> &ValidatorSet {
        &self.validator_set
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Members whose reputation clears the active threshold
    pub fn active_count(&self) -> usize {
        self.members.iter().filter(|member| member.is_active()).count()
    }

    pub fn count_in(&self, category: ValidatorCategory) -> usize {
        self.members
            .iter()
            .filter(|member| member.category == category)
            .count()
    }
}

#[derive(Debug, Default)]
struct RegistrySlot {
    snapshot: Option<Arc<PoolSnapshot>>,
    stale: bool,
}

/// Chain-backed pool registry with periodic refresh
pub struct PoolRegistry {
    slot: RwLock<RegistrySlot>,
    metrics: Option<Arc<PoolMetrics>>,
}

impl Default for PoolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl PoolRegistry {
    pub fn new() -> Self {
        Self {
            slot: RwLock::new(RegistrySlot::default()),
            metrics: None,
        }
    }

    /// Registry that records hydration and pool gauges on `metrics`
    pub fn with_metrics(metrics: Arc<PoolMetrics>) -> Self {
        Self {
            slot: RwLock::new(RegistrySlot::default()),
            metrics: Some(metrics),
        }
    }

    /// Current snapshot handle.
    ///
    /// Fails with [`PoolError::CollaboratorUnavailable`] until the first
    /// successful hydration. A stale snapshot is still returned: degraded,
    /// not unavailable (check [`PoolRegistry::status`]).
    pub fn snapshot(&self) -> Result<Arc<PoolSnapshot>> {
        self.slot
            .read()
            .expect("registry slot lock poisoned")
            .snapshot
            .clone()
            .ok_or(PoolError::CollaboratorUnavailable)
    }

    pub fn status(&self) -> SnapshotStatus {
        let slot = self.slot.read().expect("registry slot lock poisoned");
        match (&slot.snapshot, slot.stale) {
            (None, _) => SnapshotStatus::NotReady,
            (Some(_), false) => SnapshotStatus::Fresh,
            (Some(_), true) => SnapshotStatus::Stale,
        }
    }

    /// All members, in hydration order
    pub fn members(&self) -> Result<Vec<PoolMember>> {
        Ok(self.snapshot()?.members().to_vec())
    }

    /// Members of one category, stable over the full listing
    pub fn members_in(&self, category: ValidatorCategory) -> Result<Vec<PoolMember>> {
        Ok(self
            .snapshot()?
            .members_in(category)
            .into_iter()
            .cloned()
            .collect())
    }

    pub fn member(&self, id: &ValidatorId) -> Result<Option<PoolMember>> {
        Ok(self.snapshot()?.member(id).cloned())
    }

    pub fn category_of(&self, id: &ValidatorId) -> Result<Option<ValidatorCategory>> {
        Ok(self.snapshot()?.category_of(id))
    }

    pub fn is_member(&self, id: &ValidatorId) -> Result<bool> {
        Ok(self.snapshot()?.is_member(id))
    }

    pub fn era_state(&self) -> Result<EraState> {
        Ok(self.snapshot()?.era_state())
    }

    /// Hydrate a fresh snapshot from the chain and publish it atomically.
    ///
    /// Either the whole registry is replaced with a new consistent
    /// snapshot, or the prior snapshot is retained unchanged; no partially
    /// updated member set is ever observable. On failure the error is
    /// [`PoolError::StaleSnapshot`] when cached data keeps serving, or
    /// [`PoolError::CollaboratorUnavailable`] before the first success.
    pub async fn refresh(&self, provider: &dyn ChainStateProvider) -> Result<Arc<PoolSnapshot>> {
        let started = std::time::Instant::now();
        match self.hydrate(provider).await {
            Ok(snapshot) => {
                let snapshot = Arc::new(snapshot);
                {
                    let mut slot = self.slot.write().expect("registry slot lock poisoned");
                    slot.snapshot = Some(Arc::clone(&snapshot));
                    slot.stale = false;
                }
                if let Some(metrics) = &self.metrics {
                    metrics.record_hydration_success(started.elapsed(), &snapshot);
                }
                info!(
                    members = snapshot.len(),
                    active = snapshot.active_count(),
                    era = snapshot.era_state().era_index,
                    "Pool registry refreshed from chain"
                );
                Ok(snapshot)
            }
            Err(err) => {
                let had_snapshot = {
                    let mut slot = self.slot.write().expect("registry slot lock poisoned");
                    let had = slot.snapshot.is_some();
                    slot.stale = had;
                    had
                };
                if let Some(metrics) = &self.metrics {
                    metrics.record_hydration_failure(had_snapshot);
                }
                if had_snapshot {
                    Err(PoolError::StaleSnapshot(err.to_string()))
                } else {
                    warn!(error = %err, "Hydration failed before first snapshot");
                    Err(PoolError::CollaboratorUnavailable)
                }
            }
        }
    }

    async fn hydrate(&self, provider: &dyn ChainStateProvider) -> Result<PoolSnapshot> {
        let raw_members = provider.pool_members().await?;

        let mut members = Vec::with_capacity(raw_members.len());
        let mut by_id = HashMap::with_capacity(raw_members.len());
        for (id, category) in raw_members {
            // Missing performance data is an all-zero record, not an error
            let performance = provider.performance_of(&id).await?.unwrap_or_default();
            let member = PoolMember::new(id.clone(), category, performance);
            by_id.insert(id, members.len());
            members.push(member);
        }

        let era_index = provider.current_era().await?;
        let era_length = provider.era_length().await?;
        let era_start_block = provider.era_start_block().await?;
        let current_block = provider.current_height().await?;
        let era = crate::era::compute_era_state(era_index, era_length, era_start_block, current_block);

        let validator_set = provider
            .current_validator_set()
            .await?
            .unwrap_or_else(|| ValidatorSet::empty(era_index));

        debug!(
            members = members.len(),
            era = era_index,
            selected = validator_set.len(),
            "Hydrated pool snapshot"
        );

        Ok(PoolSnapshot {
            members,
            by_id,
            era,
            validator_set,
        })
    }

    /// Start the fixed-interval background poll loop.
    ///
    /// A failed poll logs and degrades; it never tears down the loop or
    /// the read path. Stop by aborting the returned handle.
    pub fn spawn_poller(
        self: &Arc<Self>,
        provider: Arc<dyn ChainStateProvider>,
        interval: Duration,
    ) -> JoinHandle<()> {
        let registry = Arc::clone(self);
        tokio::spawn(async move {
            info!(interval_secs = interval.as_secs_f64(), "Starting pool poll loop");
            loop {
                if let Err(err) = registry.refresh(provider.as_ref()).await {
                    warn!(error = %err, "Pool poll failed; read path keeps serving");
                }
                tokio::time::sleep(interval).await;
            }
        })
    }
}
