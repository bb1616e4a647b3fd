//! Pool command gateway
//!
//! Validates membership intents against the latest registry snapshot and
//! emits them to the chain. Precondition failures are synchronous and
//! happen before any chain call. The gateway never updates local state
//! optimistically: the registry is only rewritten by the next hydration,
//! so locally-assumed and remotely-confirmed state cannot diverge.

use std::sync::Arc;

use tracing::info;

use crate::error::{PoolError, Result};
use crate::metrics::PoolMetrics;
use crate::provider::ChainStateProvider;
use crate::registry::PoolRegistry;
use crate::types::{ValidatorCategory, ValidatorId};

/// Precondition-checked emitter for join/leave/recategorize intents
pub struct PoolCommandGateway {
    registry: Arc<PoolRegistry>,
    provider: Arc<dyn ChainStateProvider>,
    metrics: Option<Arc<PoolMetrics>>,
}

impl PoolCommandGateway {
    pub fn new(registry: Arc<PoolRegistry>, provider: Arc<dyn ChainStateProvider>) -> Self {
        Self {
            registry,
            provider,
            metrics: None,
        }
    }

    /// Gateway that counts emitted intents on `metrics`
    pub fn with_metrics(
        registry: Arc<PoolRegistry>,
        provider: Arc<dyn ChainStateProvider>,
        metrics: Arc<PoolMetrics>,
    ) -> Self {
        Self {
            registry,
            provider,
            metrics: Some(metrics),
        }
    }

    /// Request admission into the pool under `category`.
    ///
    /// Fails with [`PoolError::AlreadyMember`] when the identity is
    /// currently registered, per the latest snapshot at submission time.
    pub async fn join(&self, id: &ValidatorId, category: ValidatorCategory) -> Result<()> {
        if self.registry.is_member(id)? {
            return Err(PoolError::AlreadyMember(id.to_string()));
        }

        self.provider.submit_join(id, category).await?;
        if let Some(metrics) = &self.metrics {
            metrics.intents_join_total.inc();
        }
        info!(validator = %id, category = %category, "Join intent emitted");
        Ok(())
    }

    /// Request removal from the pool.
    ///
    /// Fails with [`PoolError::NotMember`] when the identity is absent.
    pub async fn leave(&self, id: &ValidatorId) -> Result<()> {
        if !self.registry.is_member(id)? {
            return Err(PoolError::NotMember(id.to_string()));
        }

        self.provider.submit_leave(id).await?;
        if let Some(metrics) = &self.metrics {
            metrics.intents_leave_total.inc();
        }
        info!(validator = %id, "Leave intent emitted");
        Ok(())
    }

    /// Request a category change.
    ///
    /// Fails with [`PoolError::NotMember`] when absent and
    /// [`PoolError::NoOpCategoryChange`] when `new_category` matches the
    /// current one.
    pub async fn recategorize(
        &self,
        id: &ValidatorId,
        new_category: ValidatorCategory,
    ) -> Result<()> {
        let current = self
            .registry
            .category_of(id)?
            .ok_or_else(|| PoolError::NotMember(id.to_string()))?;
        if current == new_category {
            return Err(PoolError::NoOpCategoryChange {
                id: id.to_string(),
                category: current,
            });
        }

        self.provider.submit_recategorize(id, new_category).await?;
        if let Some(metrics) = &self.metrics {
            metrics.intents_recategorize_total.inc();
        }
        info!(
            validator = %id,
            from = %current,
            to = %new_category,
            "Recategorize intent emitted"
        );
        Ok(())
    }
}
