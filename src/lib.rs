//! CVN Validator Pool Node
//!
//! Tracks membership and standing of CVN validators across the three
//! admission categories (stake, parliamentary, merit), follows the
//! fixed-cadence era rotation, and derives reputation annotations that
//! gate future eligibility.
//!
//! ## Overview
//!
//! The node performs three core functions:
//! 1. **Pool tracking**: Poll chain state into an immutable registry
//!    snapshot (members, performance counters, era timing, active set)
//! 2. **Reputation annotation**: Score each member (tier + eligibility)
//!    from its block-production record
//! 3. **Intent emission**: Validate and submit join/leave/recategorize
//!    intents against the latest snapshot
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐    ┌─────────────┐   ┌────────────┐
//! │   Config    │───▶│  PoolNode   │──▶│  Metrics   │
//! │   Loader    │    │   Runtime   │   │  Server    │
//! └─────────────┘    └─────────────┘   └────────────┘
//!                           │
//!        ┌──────────────────┼──────────────────┐
//!        ▼                  ▼                  ▼
//! ┌─────────────┐    ┌─────────────┐   ┌────────────┐
//! │    Chain    │    │    Pool     │   │  Command   │
//! │  Provider   │───▶│  Registry   │◀──│  Gateway   │
//! │  (subxt)    │    │ (snapshots) │   │ (intents)  │
//! └─────────────┘    └─────────────┘   └────────────┘
//! ```
//!
//! ## Example Usage
//!
//! ```no_run
//! use cvn_pool::{PoolConfig, PoolNode};
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Load configuration
//!     let config = PoolConfig::from_file(Path::new("config/pool.toml"))?;
//!
//!     // Create and start the pool node
//!     let node = PoolNode::new(config).await?;
//!     node.run().await?;
//!
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod era;
pub mod error;
pub mod gateway;
pub mod history;
pub mod metrics;
pub mod provider;
pub mod registry;
pub mod scoring;
pub mod types;

// Re-export key types
pub use config::{MetricsConfig, PollConfig, PoolConfig};
pub use era::{compute_era_state, EraClock};
pub use error::{PoolError, Result};
pub use gateway::PoolCommandGateway;
pub use history::SelectionHistoryTracker;
pub use metrics::PoolMetrics;
pub use provider::{ChainStateProvider, StaticChainProvider, SubmittedIntent, SubxtPoolProvider};
pub use registry::{PoolRegistry, PoolSnapshot, SnapshotStatus};
pub use scoring::{estimate_reward, score, ScoreReport};
pub use types::{
    EraState, PerformanceRecord, PoolMember, ReputationTier, ValidatorCategory, ValidatorId,
    ValidatorSet, ACTIVE_SCORE_THRESHOLD,
};

use std::sync::Arc;
use std::time::Duration;

use sp_core::crypto::Pair as _;
use sp_core::sr25519;
use tracing::{info, warn};

/// Main pool node runtime
pub struct PoolNode {
    config: PoolConfig,
    provider: Arc<dyn ChainStateProvider>,
    registry: Arc<PoolRegistry>,
    history: Arc<SelectionHistoryTracker>,
    gateway: Arc<PoolCommandGateway>,
    metrics: Arc<PoolMetrics>,
}

impl PoolNode {
    /// Create a new pool node connected to the configured chain endpoint
    pub async fn new(config: PoolConfig) -> Result<Self> {
        info!("Initializing CVN pool node");

        let suri = std::fs::read_to_string(&config.keypair_path)?;
        let signer = sr25519::Pair::from_string(suri.trim(), None)
            .map_err(|_| PoolError::Config("Invalid sr25519 secret URI in keypair file".into()))?;

        let request_timeout = Duration::from_secs(config.poll.request_timeout_secs);
        let provider: Arc<dyn ChainStateProvider> = Arc::new(
            SubxtPoolProvider::connect(&config.chain_endpoint, signer, request_timeout).await?,
        );

        Self::assemble(config, provider)
    }

    /// Create a pool node over an existing provider (tests, bootstrap
    /// environments, embedded uses)
    pub fn with_provider(config: PoolConfig, provider: Arc<dyn ChainStateProvider>) -> Result<Self> {
        Self::assemble(config, provider)
    }

    fn assemble(config: PoolConfig, provider: Arc<dyn ChainStateProvider>) -> Result<Self> {
        let metrics = Arc::new(PoolMetrics::new()?);
        let registry = Arc::new(PoolRegistry::with_metrics(metrics.clone()));
        let history = Arc::new(SelectionHistoryTracker::new());
        let gateway = Arc::new(PoolCommandGateway::with_metrics(
            registry.clone(),
            provider.clone(),
            metrics.clone(),
        ));

        info!("Pool node initialized successfully");

        Ok(Self {
            config,
            provider,
            registry,
            history,
            gateway,
            metrics,
        })
    }

    pub fn registry(&self) -> Arc<PoolRegistry> {
        self.registry.clone()
    }

    pub fn history(&self) -> Arc<SelectionHistoryTracker> {
        self.history.clone()
    }

    pub fn gateway(&self) -> Arc<PoolCommandGateway> {
        self.gateway.clone()
    }

    pub fn metrics(&self) -> Arc<PoolMetrics> {
        self.metrics.clone()
    }

    /// Run the pool node until a shutdown signal arrives
    pub async fn run(self) -> Result<()> {
        info!("Starting CVN pool node");

        // Start metrics server
        let metrics_clone = self.metrics.clone();
        let metrics_config = self.config.metrics.clone();
        tokio::spawn(async move {
            if let Err(e) = Self::run_metrics_server(metrics_clone, metrics_config).await {
                tracing::error!("Metrics server error: {}", e);
            }
        });

        info!("Pool node running");
        self.poll_loop().await
    }

    /// Fixed-cadence poll loop: hydrate, record selections, watch eras.
    ///
    /// A failed poll degrades to the previous snapshot and keeps looping;
    /// the read path stays available throughout.
    async fn poll_loop(&self) -> Result<()> {
        let interval = Duration::from_secs(self.config.poll.interval_secs);
        let mut era_clock = EraClock::new();
        let mut seeded = false;

        info!(
            interval_secs = interval.as_secs(),
            "Entering pool poll loop"
        );

        loop {
            match self.registry.refresh(self.provider.as_ref()).await {
                Ok(snapshot) => {
                    if !seeded {
                        self.seed_histories(&snapshot).await;
                        seeded = true;
                    }
                    self.record_selections(&snapshot);
                    if era_clock.observe(snapshot.era_state()) {
                        info!(
                            era = snapshot.era_state().era_index,
                            "Rotation boundary reached; next poll will pick up the new set"
                        );
                    }
                }
                Err(e) => {
                    warn!("Pool poll failed: {}. Serving last good snapshot.", e);
                }
            }

            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                _ = tokio::signal::ctrl_c() => {
                    info!("Shutdown signal received, stopping poll loop");
                    break;
                }
            }
        }

        Ok(())
    }

    /// Backfill selection histories from the chain on first hydration
    async fn seed_histories(&self, snapshot: &PoolSnapshot) {
        for member in snapshot.members() {
            match self.provider.selection_history_of(&member.id).await {
                Ok(entries) => {
                    if let Err(e) = self.history.seed(&member.id, &entries) {
                        warn!(validator = %member.id, "Rejected chain history: {}", e);
                    }
                }
                Err(e) => {
                    warn!(validator = %member.id, "Could not fetch selection history: {}", e);
                }
            }
        }
        info!(
            validators = self.history.tracked_validators(),
            "Selection histories seeded from chain"
        );
    }

    /// Record the current era's selections into the history tracker
    fn record_selections(&self, snapshot: &PoolSnapshot) {
        let set = snapshot.validator_set();
        let era = set.era_index;
        for id in set
            .stake
            .iter()
            .chain(set.parliamentary.iter())
            .chain(set.merit.iter())
        {
            if let Err(e) = self.history.record_selection(id, era) {
                // A backdated set is a chain-side anomaly; surface and move on
                warn!(validator = %id, era, "Selection not recorded: {}", e);
            }
        }
    }

    async fn run_metrics_server(metrics: Arc<PoolMetrics>, config: MetricsConfig) -> Result<()> {
        use http_body_util::Full;
        use hyper::body::Bytes;
        use hyper::server::conn::http1;
        use hyper::service::service_fn;
        use hyper::{Request, Response};
        use hyper_util::rt::TokioIo;
        use prometheus::Encoder;
        use tokio::net::TcpListener;

        let addr = format!("{}:{}", config.listen_address, config.port);
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| PoolError::Metrics(format!("Failed to bind metrics server: {}", e)))?;

        info!("Metrics server listening on http://{}/metrics", addr);

        loop {
            let (stream, _) = listener
                .accept()
                .await
                .map_err(|e| PoolError::Metrics(format!("Failed to accept connection: {}", e)))?;

            let io = TokioIo::new(stream);
            let metrics_clone = metrics.clone();

            tokio::spawn(async move {
                let service = service_fn(move |_req: Request<hyper::body::Incoming>| {
                    let metrics = metrics_clone.clone();
                    async move {
                        let mut buffer = vec![];
                        let encoder = prometheus::TextEncoder::new();
                        let metric_families = metrics.registry.gather();
                        encoder
                            .encode(&metric_families, &mut buffer)
                            .expect("Failed to encode metrics - buffer should always be writable");

                        Ok::<_, hyper::Error>(Response::new(Full::new(Bytes::from(buffer))))
                    }
                });

                if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                    tracing::error!("Error serving connection: {:?}", err);
                }
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn test_config() -> (NamedTempFile, PoolConfig) {
        let mut keypair = NamedTempFile::new().unwrap();
        writeln!(keypair, "//Alice").unwrap();

        let config = PoolConfig {
            chain_endpoint: "ws://localhost:9944".to_string(),
            keypair_path: keypair.path().to_path_buf(),
            poll: PollConfig::default(),
            metrics: MetricsConfig {
                listen_address: "127.0.0.1".to_string(),
                port: 0, // Random port for tests
            },
        };
        (keypair, config)
    }

    #[tokio::test]
    async fn test_node_with_static_provider() {
        let (_keypair, config) = test_config();
        let provider = Arc::new(StaticChainProvider::new());
        provider.set_era(1, 100, 0);
        provider.insert_member("val-a".into(), ValidatorCategory::Stake, None);

        let node = PoolNode::with_provider(config, provider.clone()).unwrap();

        node.registry()
            .refresh(provider.as_ref())
            .await
            .unwrap();
        assert_eq!(node.registry().members().unwrap().len(), 1);
        assert_eq!(node.metrics().pool_members.get(), 1.0);
    }

    #[tokio::test]
    async fn test_selection_recording_via_node() {
        let (_keypair, config) = test_config();
        let provider = Arc::new(StaticChainProvider::new());
        provider.set_era(4, 100, 400);
        provider.insert_member("val-a".into(), ValidatorCategory::Merit, None);
        provider.set_validator_set(
            ValidatorSet::new(
                4,
                Default::default(),
                Default::default(),
                ["val-a".into()].into_iter().collect(),
            )
            .unwrap(),
        );

        let node = PoolNode::with_provider(config, provider.clone()).unwrap();
        let snapshot = node
            .registry()
            .refresh(provider.as_ref())
            .await
            .unwrap();

        node.record_selections(&snapshot);
        assert_eq!(node.history().history_of(&"val-a".into()), vec![4]);

        // Same era again: idempotent
        node.record_selections(&snapshot);
        assert_eq!(node.history().history_of(&"val-a".into()), vec![4]);
    }

    #[tokio::test]
    async fn test_histories_seeded_from_chain() {
        let (_keypair, config) = test_config();
        let provider = Arc::new(StaticChainProvider::new());
        provider.set_era(9, 100, 900);
        provider.insert_member("val-a".into(), ValidatorCategory::Stake, None);
        provider.set_history("val-a".into(), vec![2, 5, 8]);

        let node = PoolNode::with_provider(config, provider.clone()).unwrap();
        let snapshot = node.registry().refresh(provider.as_ref()).await.unwrap();

        node.seed_histories(&snapshot).await;
        assert_eq!(node.history().history_of(&"val-a".into()), vec![2, 5, 8]);
    }
}
