//! Chain state provider seam
//!
//! The pool core reads point-in-time chain state and emits write intents
//! through [`ChainStateProvider`]. Two implementations:
//! - [`SubxtPoolProvider`]: live chain access via subxt dynamic storage
//!   queries and signed dynamic extrinsics
//! - [`StaticChainProvider`]: in-memory provider for tests or bootstrap
//!   environments, with scripted failure and intent recording
//!
//! Intent submission is fire-and-forget up to extrinsic acceptance; the
//! pool never interprets remote confirmation, it re-observes state on the
//! next poll.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use parity_scale_codec::Decode;
use sp_core::crypto::{AccountId32, Ss58Codec};
use sp_core::sr25519;
use subxt::{dynamic::storage, dynamic::tx, dynamic::Value, OnlineClient, PolkadotConfig};
use tracing::{debug, info};

use crate::error::{PoolError, Result};
use crate::types::{PerformanceRecord, ValidatorCategory, ValidatorId, ValidatorSet};

/// Read/write interface to the remote ledger
///
/// Reads are point-in-time snapshots; absent values are `None`/empty, not
/// errors. Writes are intents with asynchronous confirmation out of scope.
#[async_trait]
pub trait ChainStateProvider: Send + Sync {
    async fn current_era(&self) -> Result<u32>;
    async fn era_length(&self) -> Result<u32>;
    async fn era_start_block(&self) -> Result<u64>;
    async fn current_height(&self) -> Result<u64>;

    /// All registered pool members with their admission category
    async fn pool_members(&self) -> Result<Vec<(ValidatorId, ValidatorCategory)>>;

    /// Performance counters for one member; `None` when the chain holds no
    /// record yet
    async fn performance_of(&self, id: &ValidatorId) -> Result<Option<PerformanceRecord>>;

    /// Active validator set for the current era; `None` when none is
    /// published (treated as all-empty, not an error)
    async fn current_validator_set(&self) -> Result<Option<ValidatorSet>>;

    /// Eras in which the validator was selected, ascending
    async fn selection_history_of(&self, id: &ValidatorId) -> Result<Vec<u32>>;

    async fn submit_join(&self, id: &ValidatorId, category: ValidatorCategory) -> Result<()>;
    async fn submit_leave(&self, id: &ValidatorId) -> Result<()>;
    async fn submit_recategorize(
        &self,
        id: &ValidatorId,
        category: ValidatorCategory,
    ) -> Result<()>;
}

/// On-chain shape of the published active set
#[derive(Debug, Clone, Decode)]
struct ActiveSetRecord {
    era_index: u32,
    stake: Vec<AccountId32>,
    parliamentary: Vec<AccountId32>,
    merit: Vec<AccountId32>,
}

/// Live chain provider backed by subxt
///
/// Queries the `ValidatorPool` and `EraRotation` pallets with dynamic
/// storage lookups and submits membership extrinsics signed with the
/// node's sr25519 pair. The chain derives the affected member from the
/// signing origin; the `id` passed to submit calls is precondition context
/// and is logged, not encoded.
pub struct SubxtPoolProvider {
    client: OnlineClient<PolkadotConfig>,
    signer: subxt::tx::PairSigner<PolkadotConfig, sr25519::Pair>,
    request_timeout: Duration,
}

impl SubxtPoolProvider {
    /// Connect to the chain RPC endpoint.
    pub async fn connect(
        rpc_url: &str,
        signer: sr25519::Pair,
        request_timeout: Duration,
    ) -> Result<Self> {
        info!("Connecting to CVN chain at {}", rpc_url);
        let client = OnlineClient::<PolkadotConfig>::from_url(rpc_url).await?;
        let signer = subxt::tx::PairSigner::new(signer);
        Ok(Self {
            client,
            signer,
            request_timeout,
        })
    }

    /// Bound a chain call by the configured request timeout
    async fn with_timeout<T>(
        &self,
        fut: impl std::future::Future<Output = Result<T>> + Send,
    ) -> Result<T> {
        tokio::time::timeout(self.request_timeout, fut)
            .await
            .map_err(|_| {
                PoolError::ChainClient(format!(
                    "chain request timed out after {}s",
                    self.request_timeout.as_secs()
                ))
            })?
    }

    async fn fetch_plain<T: Decode>(&self, pallet: &str, entry: &str) -> Result<Option<T>> {
        let query = storage(pallet, entry, Vec::<Value>::new());
        let value = self
            .with_timeout(async {
                Ok(self.client.storage().at_latest().await?.fetch(&query).await?)
            })
            .await?;
        match value {
            Some(value) => Ok(Some(decode_value(value.encoded())?)),
            None => Ok(None),
        }
    }

    async fn fetch_for_account<T: Decode>(
        &self,
        entry: &str,
        account: &AccountId32,
    ) -> Result<Option<T>> {
        let raw: &[u8] = account.as_ref();
        let query = storage("ValidatorPool", entry, vec![Value::from_bytes(raw)]);
        let value = self
            .with_timeout(async {
                Ok(self.client.storage().at_latest().await?.fetch(&query).await?)
            })
            .await?;
        match value {
            Some(value) => Ok(Some(decode_value(value.encoded())?)),
            None => Ok(None),
        }
    }

    async fn submit(&self, call_name: &str, args: Vec<Value>) -> Result<()> {
        let call = tx("ValidatorPool", call_name, args);
        self.with_timeout(async {
            self.client
                .tx()
                .sign_and_submit_default(&call, &self.signer)
                .await?;
            Ok(())
        })
        .await
    }
}

#[async_trait]
impl ChainStateProvider for SubxtPoolProvider {
    async fn current_era(&self) -> Result<u32> {
        self.fetch_plain("EraRotation", "CurrentEra")
            .await
            .map(Option::unwrap_or_default)
    }

    async fn era_length(&self) -> Result<u32> {
        self.fetch_plain("EraRotation", "EraLength")
            .await
            .map(Option::unwrap_or_default)
    }

    async fn era_start_block(&self) -> Result<u64> {
        self.fetch_plain("EraRotation", "EraStartBlock")
            .await
            .map(Option::unwrap_or_default)
    }

    async fn current_height(&self) -> Result<u64> {
        self.with_timeout(async {
            let block = self.client.blocks().at_latest().await?;
            Ok(u64::from(block.number()))
        })
        .await
    }

    async fn pool_members(&self) -> Result<Vec<(ValidatorId, ValidatorCategory)>> {
        let members = self
            .with_timeout(async {
                let query = storage("ValidatorPool", "Members", Vec::<Value>::new());
                let mut iter = self.client.storage().at_latest().await?.iter(query).await?;
                let mut members = Vec::new();

                while let Some(entry) = iter.next().await {
                    let entry = entry?;
                    let account = account_from_key(&entry.key_bytes)?;
                    let category: ValidatorCategory = decode_value(entry.value.encoded())?;
                    members.push((ValidatorId::new(account.to_ss58check()), category));
                }
                Ok(members)
            })
            .await?;

        debug!(count = members.len(), "Fetched pool membership from chain");
        Ok(members)
    }

    async fn performance_of(&self, id: &ValidatorId) -> Result<Option<PerformanceRecord>> {
        let account = account_from_id(id)?;
        self.fetch_for_account("Performance", &account).await
    }

    async fn current_validator_set(&self) -> Result<Option<ValidatorSet>> {
        let record: Option<ActiveSetRecord> =
            self.fetch_plain("ValidatorPool", "ActiveSet").await?;
        match record {
            Some(record) => {
                let to_ids = |accounts: Vec<AccountId32>| {
                    accounts
                        .into_iter()
                        .map(|account| ValidatorId::new(account.to_ss58check()))
                        .collect()
                };
                let set = ValidatorSet::new(
                    record.era_index,
                    to_ids(record.stake),
                    to_ids(record.parliamentary),
                    to_ids(record.merit),
                )?;
                Ok(Some(set))
            }
            None => Ok(None),
        }
    }

    async fn selection_history_of(&self, id: &ValidatorId) -> Result<Vec<u32>> {
        let account = account_from_id(id)?;
        Ok(self
            .fetch_for_account::<Vec<u32>>("SelectionHistory", &account)
            .await?
            .unwrap_or_default())
    }

    async fn submit_join(&self, id: &ValidatorId, category: ValidatorCategory) -> Result<()> {
        info!(validator = %id, category = %category, "Submitting join_pool");
        self.submit("join_pool", vec![category_value(category)])
            .await
    }

    async fn submit_leave(&self, id: &ValidatorId) -> Result<()> {
        info!(validator = %id, "Submitting leave_pool");
        self.submit("leave_pool", Vec::new()).await
    }

    async fn submit_recategorize(
        &self,
        id: &ValidatorId,
        category: ValidatorCategory,
    ) -> Result<()> {
        info!(validator = %id, category = %category, "Submitting change_category");
        self.submit("change_category", vec![category_value(category)])
            .await
    }
}

fn category_value(category: ValidatorCategory) -> Value {
    let variant = match category {
        ValidatorCategory::Stake => "Stake",
        ValidatorCategory::Parliamentary => "Parliamentary",
        ValidatorCategory::Merit => "Merit",
    };
    Value::unnamed_variant(variant, Vec::new())
}

fn account_from_key(key_bytes: &[u8]) -> Result<AccountId32> {
    if key_bytes.len() < 32 {
        return Err(PoolError::InvalidKey);
    }
    let start = key_bytes.len() - 32;
    let mut bytes = [0u8; 32];
    bytes.copy_from_slice(&key_bytes[start..]);
    Ok(AccountId32::from(bytes))
}

fn account_from_id(id: &ValidatorId) -> Result<AccountId32> {
    AccountId32::from_ss58check(id.as_str()).map_err(|_| PoolError::InvalidKey)
}

fn decode_value<T: Decode>(bytes: &[u8]) -> Result<T> {
    T::decode(&mut &bytes[..]).map_err(|err| PoolError::Decode(err.to_string()))
}

/// Intent recorded by [`StaticChainProvider`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmittedIntent {
    Join(ValidatorId, ValidatorCategory),
    Leave(ValidatorId),
    Recategorize(ValidatorId, ValidatorCategory),
}

#[derive(Debug, Default)]
struct StaticChainState {
    era_index: u32,
    era_length: u32,
    era_start_block: u64,
    current_height: u64,
    members: Vec<(ValidatorId, ValidatorCategory)>,
    performance: HashMap<ValidatorId, PerformanceRecord>,
    validator_set: Option<ValidatorSet>,
    histories: HashMap<ValidatorId, Vec<u32>>,
    intents: Vec<SubmittedIntent>,
    failing: bool,
}

/// Static provider for tests or bootstrap environments
///
/// Holds scripted chain state in memory, records every submitted intent
/// for assertion, and can be switched into a failing mode to exercise the
/// stale-snapshot degradation path.
#[derive(Debug, Default)]
pub struct StaticChainProvider {
    state: Mutex<StaticChainState>,
}

impl StaticChainProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_era(&self, era_index: u32, era_length: u32, era_start_block: u64) {
        let mut state = self.lock();
        state.era_index = era_index;
        state.era_length = era_length;
        state.era_start_block = era_start_block;
    }

    pub fn set_height(&self, height: u64) {
        self.lock().current_height = height;
    }

    pub fn insert_member(
        &self,
        id: ValidatorId,
        category: ValidatorCategory,
        performance: Option<PerformanceRecord>,
    ) {
        let mut state = self.lock();
        state.members.retain(|(member, _)| *member != id);
        state.members.push((id.clone(), category));
        if let Some(performance) = performance {
            state.performance.insert(id, performance);
        }
    }

    pub fn remove_member(&self, id: &ValidatorId) {
        let mut state = self.lock();
        state.members.retain(|(member, _)| member != id);
        state.performance.remove(id);
    }

    pub fn set_validator_set(&self, set: ValidatorSet) {
        self.lock().validator_set = Some(set);
    }

    pub fn set_history(&self, id: ValidatorId, eras: Vec<u32>) {
        self.lock().histories.insert(id, eras);
    }

    /// While failing, every provider call returns a transport error
    pub fn set_failing(&self, failing: bool) {
        self.lock().failing = failing;
    }

    /// Intents submitted so far, in submission order
    pub fn submitted_intents(&self) -> Vec<SubmittedIntent> {
        self.lock().intents.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, StaticChainState> {
        self.state.lock().expect("static chain state lock poisoned")
    }

    fn check_available(&self) -> Result<()> {
        if self.lock().failing {
            return Err(PoolError::ChainClient(
                "static provider in failing mode".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl ChainStateProvider for StaticChainProvider {
    async fn current_era(&self) -> Result<u32> {
        self.check_available()?;
        Ok(self.lock().era_index)
    }

    async fn era_length(&self) -> Result<u32> {
        self.check_available()?;
        Ok(self.lock().era_length)
    }

    async fn era_start_block(&self) -> Result<u64> {
        self.check_available()?;
        Ok(self.lock().era_start_block)
    }

    async fn current_height(&self) -> Result<u64> {
        self.check_available()?;
        Ok(self.lock().current_height)
    }

    async fn pool_members(&self) -> Result<Vec<(ValidatorId, ValidatorCategory)>> {
        self.check_available()?;
        Ok(self.lock().members.clone())
    }

    async fn performance_of(&self, id: &ValidatorId) -> Result<Option<PerformanceRecord>> {
        self.check_available()?;
        Ok(self.lock().performance.get(id).cloned())
    }

    async fn current_validator_set(&self) -> Result<Option<ValidatorSet>> {
        self.check_available()?;
        Ok(self.lock().validator_set.clone())
    }

    async fn selection_history_of(&self, id: &ValidatorId) -> Result<Vec<u32>> {
        self.check_available()?;
        Ok(self.lock().histories.get(id).cloned().unwrap_or_default())
    }

    async fn submit_join(&self, id: &ValidatorId, category: ValidatorCategory) -> Result<()> {
        self.check_available()?;
        self.lock()
            .intents
            .push(SubmittedIntent::Join(id.clone(), category));
        Ok(())
    }

    async fn submit_leave(&self, id: &ValidatorId) -> Result<()> {
        self.check_available()?;
        self.lock().intents.push(SubmittedIntent::Leave(id.clone()));
        Ok(())
    }

    async fn submit_recategorize(
        &self,
        id: &ValidatorId,
        category: ValidatorCategory,
    ) -> Result<()> {
        self.check_available()?;
        self.lock()
            .intents
            .push(SubmittedIntent::Recategorize(id.clone(), category));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_account_from_key_takes_trailing_bytes() {
        let mut key = vec![0xffu8; 16];
        key.extend_from_slice(&[7u8; 32]);

        let account = account_from_key(&key).unwrap();
        assert_eq!(account, AccountId32::from([7u8; 32]));
    }

    #[test]
    fn test_account_from_key_rejects_short_keys() {
        let result = account_from_key(&[1u8; 16]);
        assert!(matches!(result, Err(PoolError::InvalidKey)));
    }

    #[tokio::test]
    async fn test_static_provider_round_trip() {
        let provider = StaticChainProvider::new();
        provider.set_era(4, 100, 400);
        provider.set_height(450);
        provider.insert_member("val-a".into(), ValidatorCategory::Merit, None);

        assert_eq!(provider.current_era().await.unwrap(), 4);
        assert_eq!(provider.current_height().await.unwrap(), 450);
        let members = provider.pool_members().await.unwrap();
        assert_eq!(members.len(), 1);
        assert_eq!(members[0].1, ValidatorCategory::Merit);
        // No performance record scripted
        assert!(provider
            .performance_of(&"val-a".into())
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_static_provider_failing_mode() {
        let provider = StaticChainProvider::new();
        provider.set_failing(true);

        assert!(provider.current_era().await.is_err());
        assert!(provider.pool_members().await.is_err());

        provider.set_failing(false);
        assert!(provider.current_era().await.is_ok());
    }

    #[tokio::test]
    async fn test_static_provider_records_intents() {
        let provider = StaticChainProvider::new();

        provider
            .submit_join(&"val-a".into(), ValidatorCategory::Stake)
            .await
            .unwrap();
        provider.submit_leave(&"val-a".into()).await.unwrap();

        assert_eq!(
            provider.submitted_intents(),
            vec![
                SubmittedIntent::Join("val-a".into(), ValidatorCategory::Stake),
                SubmittedIntent::Leave("val-a".into()),
            ]
        );
    }
}
