//! Integration tests for the CVN pool node
//!
//! Exercise the full flow against a static chain provider: hydration into
//! the registry, reputation annotation, era tracking, selection history
//! and command-gateway intent emission.

use std::sync::Arc;

use cvn_pool::{
    EraClock, PerformanceRecord, PoolCommandGateway, PoolError, PoolRegistry, ReputationTier,
    SelectionHistoryTracker, SnapshotStatus, StaticChainProvider, SubmittedIntent,
    ValidatorCategory, ValidatorSet, estimate_reward,
};

/// Build a provider with a small three-category pool mid-era
fn seeded_provider() -> Arc<StaticChainProvider> {
    let provider = Arc::new(StaticChainProvider::new());
    provider.set_era(12, 100, 1200);
    provider.set_height(1250);

    provider.insert_member(
        "alpha".into(),
        ValidatorCategory::Stake,
        Some(PerformanceRecord {
            blocks_produced: 100,
            blocks_missed: 5,
            era_points: 950,
            last_active_era: 12,
            reputation_score: 92,
        }),
    );
    provider.insert_member(
        "beta".into(),
        ValidatorCategory::Parliamentary,
        Some(PerformanceRecord {
            blocks_produced: 40,
            blocks_missed: 12,
            era_points: 380,
            last_active_era: 12,
            reputation_score: 74,
        }),
    );
    provider.insert_member(
        "gamma".into(),
        ValidatorCategory::Merit,
        Some(PerformanceRecord {
            blocks_produced: 10,
            blocks_missed: 30,
            era_points: 90,
            last_active_era: 11,
            reputation_score: 48,
        }),
    );

    provider.set_validator_set(
        ValidatorSet::new(
            12,
            ["alpha".into()].into_iter().collect(),
            ["beta".into()].into_iter().collect(),
            Default::default(),
        )
        .unwrap(),
    );

    provider
}

#[tokio::test]
async fn test_hydration_annotates_members() {
    let provider = seeded_provider();
    let registry = PoolRegistry::new();
    registry.refresh(provider.as_ref()).await.unwrap();

    let snapshot = registry.snapshot().unwrap();
    assert_eq!(snapshot.len(), 3);
    assert_eq!(snapshot.active_count(), 2);

    let alpha = snapshot.member(&"alpha".into()).unwrap();
    assert!(alpha.is_active());
    let report = snapshot.report_of(&"alpha".into()).unwrap();
    assert_eq!(report.tier, ReputationTier::Excellent);
    assert!(report.can_validate);

    let gamma = snapshot.member(&"gamma".into()).unwrap();
    assert!(!gamma.is_active());
    let report = snapshot.report_of(&"gamma".into()).unwrap();
    assert_eq!(report.tier, ReputationTier::Poor);
    assert!(!report.can_validate);

    let era = snapshot.era_state();
    assert_eq!(era.era_index, 12);
    assert_eq!(era.blocks_until_rotation(), 50);
    assert!(snapshot.validator_set().contains(&"alpha".into()));
}

#[tokio::test]
async fn test_membership_intents_round_trip() {
    let provider = seeded_provider();
    let registry = Arc::new(PoolRegistry::new());
    registry.refresh(provider.as_ref()).await.unwrap();

    let gateway = PoolCommandGateway::new(registry.clone(), provider.clone());

    // A newcomer joins; the pool only changes once the chain confirms
    gateway
        .join(&"delta".into(), ValidatorCategory::Merit)
        .await
        .unwrap();
    assert!(!registry.is_member(&"delta".into()).unwrap());

    // Chain accepts the intent; the next poll picks it up
    provider.insert_member("delta".into(), ValidatorCategory::Merit, None);
    registry.refresh(provider.as_ref()).await.unwrap();
    assert!(registry.is_member(&"delta".into()).unwrap());
    assert_eq!(
        registry.category_of(&"delta".into()).unwrap(),
        Some(ValidatorCategory::Merit)
    );

    // Re-joining is now rejected locally, before any chain call
    let err = gateway
        .join(&"delta".into(), ValidatorCategory::Stake)
        .await
        .unwrap_err();
    assert!(matches!(err, PoolError::AlreadyMember(_)));

    gateway
        .recategorize(&"delta".into(), ValidatorCategory::Stake)
        .await
        .unwrap();
    gateway.leave(&"delta".into()).await.unwrap();

    assert_eq!(
        provider.submitted_intents(),
        vec![
            SubmittedIntent::Join("delta".into(), ValidatorCategory::Merit),
            SubmittedIntent::Recategorize("delta".into(), ValidatorCategory::Stake),
            SubmittedIntent::Leave("delta".into()),
        ]
    );
}

#[tokio::test]
async fn test_poll_failure_degrades_then_heals() {
    let provider = seeded_provider();
    let registry = PoolRegistry::new();

    // Poll N-1 succeeds
    registry.refresh(provider.as_ref()).await.unwrap();

    // Poll N fails: registry answers from poll N-1 data and reports stale
    provider.set_failing(true);
    let err = registry.refresh(provider.as_ref()).await.unwrap_err();
    assert!(matches!(err, PoolError::StaleSnapshot(_)));
    assert_eq!(registry.status(), SnapshotStatus::Stale);
    assert_eq!(registry.members().unwrap().len(), 3);
    assert_eq!(
        registry.category_of(&"beta".into()).unwrap(),
        Some(ValidatorCategory::Parliamentary)
    );

    // Poll N+1 heals
    provider.set_failing(false);
    registry.refresh(provider.as_ref()).await.unwrap();
    assert_eq!(registry.status(), SnapshotStatus::Fresh);
}

#[tokio::test]
async fn test_era_rotation_feeds_selection_history() {
    let provider = seeded_provider();
    let registry = PoolRegistry::new();
    let history = SelectionHistoryTracker::new();
    let mut clock = EraClock::new();

    let snapshot = registry.refresh(provider.as_ref()).await.unwrap();
    assert!(!clock.observe(snapshot.era_state()));
    for id in &snapshot.validator_set().stake {
        history.record_selection(id, snapshot.validator_set().era_index).unwrap();
    }
    for id in &snapshot.validator_set().parliamentary {
        history.record_selection(id, snapshot.validator_set().era_index).unwrap();
    }

    // Chain rotates to era 13 with a different parliamentary pick
    provider.set_era(13, 100, 1300);
    provider.set_height(1305);
    provider.set_validator_set(
        ValidatorSet::new(
            13,
            ["alpha".into()].into_iter().collect(),
            Default::default(),
            ["gamma".into()].into_iter().collect(),
        )
        .unwrap(),
    );

    let snapshot = registry.refresh(provider.as_ref()).await.unwrap();
    assert!(clock.observe(snapshot.era_state()));
    for id in &snapshot.validator_set().stake {
        history.record_selection(id, 13).unwrap();
    }
    for id in &snapshot.validator_set().merit {
        history.record_selection(id, 13).unwrap();
    }

    assert_eq!(history.history_of(&"alpha".into()), vec![12, 13]);
    assert_eq!(history.history_of(&"beta".into()), vec![12]);
    assert_eq!(history.history_of(&"gamma".into()), vec![13]);

    // A backdated selection is an error, not a silent drop
    let err = history.record_selection(&"alpha".into(), 12).unwrap_err();
    assert!(matches!(err, PoolError::OutOfOrderEra { .. }));
}

#[tokio::test]
async fn test_reward_estimates_over_snapshot() {
    let provider = seeded_provider();
    let registry = PoolRegistry::new();
    registry.refresh(provider.as_ref()).await.unwrap();

    let snapshot = registry.snapshot().unwrap();
    let total_points: u64 = snapshot
        .members()
        .iter()
        .map(|member| member.performance.era_points)
        .sum();
    assert_eq!(total_points, 1420);

    let pot: u128 = 1_420_000;
    let alpha = snapshot.member(&"alpha".into()).unwrap();
    assert_eq!(
        estimate_reward(alpha.performance.era_points, total_points, pot),
        950_000
    );

    // An idle pool pays nothing rather than dividing by zero
    assert_eq!(estimate_reward(alpha.performance.era_points, 0, pot), 0);
}

#[tokio::test]
async fn test_category_listings_partition_pool() {
    let provider = seeded_provider();
    let registry = PoolRegistry::new();
    registry.refresh(provider.as_ref()).await.unwrap();

    let all = registry.members().unwrap();
    let mut total = 0;
    for category in ValidatorCategory::ALL {
        let filtered = registry.members_in(category).unwrap();
        for member in &filtered {
            assert_eq!(member.category, category);
        }
        total += filtered.len();
    }
    assert_eq!(total, all.len());
}
