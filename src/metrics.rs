//! Pool Prometheus metrics
//!
//! Gauges for pool composition and era timing, counters for hydration
//! outcomes and emitted intents. Uses a per-instance registry so parallel
//! tests and embedded uses never collide on the global default registry.

use std::time::Duration;

use prometheus::{Counter, Gauge, Histogram, HistogramOpts, Registry};

use crate::error::Result;
use crate::registry::PoolSnapshot;
use crate::types::ValidatorCategory;

/// Pool metrics collection
#[derive(Debug)]
pub struct PoolMetrics {
    /// Registered pool members in the current snapshot
    pub pool_members: Gauge,

    /// Members whose reputation clears the active threshold
    pub active_members: Gauge,

    /// Members admitted via stake
    pub stake_members: Gauge,

    /// Members delegated by parliament
    pub parliamentary_members: Gauge,

    /// Members admitted on merit
    pub merit_members: Gauge,

    /// Era index of the current snapshot
    pub current_era: Gauge,

    /// Blocks remaining until the next rotation boundary
    pub blocks_until_rotation: Gauge,

    /// 1 while serving a stale snapshot, 0 otherwise
    pub snapshot_stale: Gauge,

    /// Successful hydrations (cumulative)
    pub hydrations_total: Counter,

    /// Failed hydrations (cumulative)
    pub hydration_failures_total: Counter,

    /// Wall time of one hydration cycle
    pub hydration_duration_seconds: Histogram,

    /// Join intents emitted
    pub intents_join_total: Counter,

    /// Leave intents emitted
    pub intents_leave_total: Counter,

    /// Recategorize intents emitted
    pub intents_recategorize_total: Counter,

    /// Prometheus registry for this metrics instance
    pub registry: Registry,
}

impl PoolMetrics {
    /// Create new pool metrics with a dedicated registry
    pub fn new() -> Result<Self> {
        let registry = Registry::new_custom(Some("cvn_pool".to_string()), None)?;

        let pool_members = Gauge::new(
            "cvn_pool_members",
            "Registered pool members in the current snapshot",
        )?;
        registry.register(Box::new(pool_members.clone()))?;

        let active_members = Gauge::new(
            "cvn_pool_active_members",
            "Members whose reputation score clears the active threshold",
        )?;
        registry.register(Box::new(active_members.clone()))?;

        let stake_members = Gauge::new(
            "cvn_pool_stake_members",
            "Members admitted via economic stake",
        )?;
        registry.register(Box::new(stake_members.clone()))?;

        let parliamentary_members = Gauge::new(
            "cvn_pool_parliamentary_members",
            "Members holding a parliamentary delegation",
        )?;
        registry.register(Box::new(parliamentary_members.clone()))?;

        let merit_members = Gauge::new(
            "cvn_pool_merit_members",
            "Members admitted on merit",
        )?;
        registry.register(Box::new(merit_members.clone()))?;

        let current_era = Gauge::new(
            "cvn_pool_current_era",
            "Era index of the current snapshot",
        )?;
        registry.register(Box::new(current_era.clone()))?;

        let blocks_until_rotation = Gauge::new(
            "cvn_pool_blocks_until_rotation",
            "Blocks remaining until the next era rotation boundary",
        )?;
        registry.register(Box::new(blocks_until_rotation.clone()))?;

        let snapshot_stale = Gauge::new(
            "cvn_pool_snapshot_stale",
            "1 while the registry serves a stale snapshot, 0 otherwise",
        )?;
        registry.register(Box::new(snapshot_stale.clone()))?;

        let hydrations_total = Counter::new(
            "cvn_pool_hydrations_total",
            "Total successful registry hydrations",
        )?;
        registry.register(Box::new(hydrations_total.clone()))?;

        let hydration_failures_total = Counter::new(
            "cvn_pool_hydration_failures_total",
            "Total failed registry hydrations",
        )?;
        registry.register(Box::new(hydration_failures_total.clone()))?;

        let hydration_duration_seconds = Histogram::with_opts(HistogramOpts::new(
            "cvn_pool_hydration_duration_seconds",
            "Wall time of one hydration cycle",
        ))?;
        registry.register(Box::new(hydration_duration_seconds.clone()))?;

        let intents_join_total =
            Counter::new("cvn_pool_intents_join_total", "Join intents emitted")?;
        registry.register(Box::new(intents_join_total.clone()))?;

        let intents_leave_total =
            Counter::new("cvn_pool_intents_leave_total", "Leave intents emitted")?;
        registry.register(Box::new(intents_leave_total.clone()))?;

        let intents_recategorize_total = Counter::new(
            "cvn_pool_intents_recategorize_total",
            "Recategorize intents emitted",
        )?;
        registry.register(Box::new(intents_recategorize_total.clone()))?;

        Ok(Self {
            pool_members,
            active_members,
            stake_members,
            parliamentary_members,
            merit_members,
            current_era,
            blocks_until_rotation,
            snapshot_stale,
            hydrations_total,
            hydration_failures_total,
            hydration_duration_seconds,
            intents_join_total,
            intents_leave_total,
            intents_recategorize_total,
            registry,
        })
    }

    /// Record a successful hydration and refresh the pool gauges.
    pub fn record_hydration_success(&self, elapsed: Duration, snapshot: &PoolSnapshot) {
        self.hydrations_total.inc();
        self.hydration_duration_seconds.observe(elapsed.as_secs_f64());
        self.snapshot_stale.set(0.0);

        self.pool_members.set(snapshot.len() as f64);
        self.active_members.set(snapshot.active_count() as f64);
        self.stake_members
            .set(snapshot.count_in(ValidatorCategory::Stake) as f64);
        self.parliamentary_members
            .set(snapshot.count_in(ValidatorCategory::Parliamentary) as f64);
        self.merit_members
            .set(snapshot.count_in(ValidatorCategory::Merit) as f64);

        let era = snapshot.era_state();
        self.current_era.set(f64::from(era.era_index));
        self.blocks_until_rotation
            .set(era.blocks_until_rotation() as f64);
    }

    /// Record a failed hydration; `serving_cached` marks degraded-but-
    /// available service.
    pub fn record_hydration_failure(&self, serving_cached: bool) {
        self.hydration_failures_total.inc();
        if serving_cached {
            self.snapshot_stale.set(1.0);
        }
    }
}
