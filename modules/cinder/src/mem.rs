//! In-memory collaborator implementations
//!
//! Concrete collaborators for tests and single-process deployments. The
//! production node swaps these for its database, gossip, and delegate
//! modules; the pipeline only ever sees the traits.

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use dashmap::{DashMap, DashSet};
use embernet_core::{
    Address, Clock, DelegateRegistry, DiffEntry, DiffOp, EmberError, EmberResult, PublicKey,
    Timestamp, TxId,
};
use embernet_state::{AccountFilter, AccountStore};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use crate::asset::{AssetPersistence, AssetRow};
use crate::pipeline::{BroadcastHook, ConfirmedLedger};
use crate::transaction::Transaction;

/// Delegate registry backed by the account store plus a set of known
/// delegate addresses.
pub struct InMemoryDelegateRegistry {
    store: Arc<AccountStore>,
    known: DashSet<Address>,
    names: DashMap<PublicKey, String>,
    u_names: DashMap<PublicKey, String>,
}

impl InMemoryDelegateRegistry {
    pub fn new(store: Arc<AccountStore>) -> Self {
        Self {
            store,
            known: DashSet::new(),
            names: DashMap::new(),
            u_names: DashMap::new(),
        }
    }

    /// Mark an address as a registered delegate (a valid vote target).
    pub fn register(&self, delegate: Address) {
        self.known.insert(delegate);
    }

    /// Record a confirmed delegate-name registration.
    pub fn register_name(&self, public_key: PublicKey, name: &str) {
        self.names.insert(public_key, name.to_string());
    }

    /// Record a pending delegate-name registration.
    pub fn register_unconfirmed_name(&self, public_key: PublicKey, name: &str) {
        self.u_names.insert(public_key, name.to_string());
    }

    fn check_against(
        &self,
        voted: &[Address],
        votes: &[DiffEntry<Address>],
        unconfirmed: bool,
    ) -> EmberResult<()> {
        for entry in votes {
            match entry.op {
                DiffOp::Add => {
                    if !self.known.contains(&entry.value) {
                        return Err(EmberError::UnknownDelegate(entry.value.to_string()));
                    }
                    if voted.contains(&entry.value) {
                        return Err(if unconfirmed {
                            EmberError::AlreadyVotedUnconfirmed(entry.value.to_string())
                        } else {
                            EmberError::AlreadyVoted(entry.value.to_string())
                        });
                    }
                }
                DiffOp::Remove => {
                    if !voted.contains(&entry.value) {
                        return Err(EmberError::NotVoted(entry.value.to_string()));
                    }
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl DelegateRegistry for InMemoryDelegateRegistry {
    async fn check_delegates(
        &self,
        voter: &PublicKey,
        votes: &[DiffEntry<Address>],
    ) -> EmberResult<()> {
        let voted = self
            .store
            .get(&AccountFilter::PublicKey(*voter))
            .map(|a| a.delegates)
            .unwrap_or_default();
        self.check_against(&voted, votes, false)
    }

    async fn check_unconfirmed_delegates(
        &self,
        voter: &PublicKey,
        votes: &[DiffEntry<Address>],
    ) -> EmberResult<()> {
        let voted = self
            .store
            .get(&AccountFilter::PublicKey(*voter))
            .map(|a| a.u_delegates)
            .unwrap_or_default();
        self.check_against(&voted, votes, true)
    }

    async fn get_delegate(&self, public_key: &PublicKey) -> Option<String> {
        self.names.get(public_key).map(|n| n.value().clone())
    }

    async fn get_unconfirmed_delegate(&self, public_key: &PublicKey) -> Option<String> {
        self.u_names.get(public_key).map(|n| n.value().clone())
    }

    async fn remove_unconfirmed_delegate(&self, public_key: &PublicKey) {
        self.u_names.remove(public_key);
    }
}

/// Confirmed ledger plus asset-row persistence, all in memory.
#[derive(Default)]
pub struct InMemoryChain {
    confirmed: DashSet<TxId>,
    rows: DashMap<TxId, AssetRow>,
}

impl InMemoryChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a transaction ID as confirmed.
    pub fn confirm(&self, id: TxId) {
        self.confirmed.insert(id);
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

#[async_trait]
impl ConfirmedLedger for InMemoryChain {
    async fn is_confirmed(&self, id: TxId) -> EmberResult<bool> {
        Ok(self.confirmed.contains(&id))
    }
}

#[async_trait]
impl AssetPersistence for InMemoryChain {
    async fn write(&self, row: AssetRow) -> EmberResult<()> {
        self.rows.insert(row.transaction_id(), row);
        Ok(())
    }

    async fn read(&self, transaction_id: TxId) -> EmberResult<Option<AssetRow>> {
        Ok(self.rows.get(&transaction_id).map(|r| r.value().clone()))
    }
}

/// Broadcast hook that records every notification.
#[derive(Default)]
pub struct RecordingBroadcast {
    seen: Mutex<Vec<(TxId, bool)>>,
}

impl RecordingBroadcast {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seen(&self) -> Vec<(TxId, bool)> {
        self.seen.lock().clone()
    }
}

#[async_trait]
impl BroadcastHook for RecordingBroadcast {
    async fn on_unconfirmed_transaction(&self, tx: &Transaction, broadcast: bool) {
        if let Some(id) = tx.id {
            self.seen.lock().push((id, broadcast));
        }
    }
}

/// Wall clock mapped onto logical seconds since the chain epoch.
pub struct SystemClock {
    epoch: DateTime<Utc>,
}

impl SystemClock {
    /// Epoch of the EMBERNET chain: 2024-01-01T00:00:00Z.
    pub fn new() -> Self {
        Self {
            epoch: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Timestamp::from_secs((Utc::now() - self.epoch).num_seconds())
    }
}

/// Manually advanced clock for tests.
pub struct FixedClock {
    now: AtomicI64,
}

impl FixedClock {
    pub fn at(secs: i64) -> Self {
        Self {
            now: AtomicI64::new(secs),
        }
    }

    pub fn advance(&self, secs: i64) {
        self.now.fetch_add(secs, Ordering::SeqCst);
    }
}

impl Clock for FixedClock {
    fn now(&self) -> Timestamp {
        Timestamp::from_secs(self.now.load(Ordering::SeqCst))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_delegate_checks() {
        let store = Arc::new(AccountStore::new());
        let registry = InMemoryDelegateRegistry::new(store.clone());
        let voter = PublicKey::from_bytes([1u8; 32]);
        let delegate = Address::new(900);

        // Unknown target.
        let err = registry
            .check_delegates(&voter, &[DiffEntry::add(delegate)])
            .await
            .unwrap_err();
        assert!(matches!(err, EmberError::UnknownDelegate(_)));

        registry.register(delegate);
        registry
            .check_delegates(&voter, &[DiffEntry::add(delegate)])
            .await
            .unwrap();

        // Removing a vote that was never cast.
        let err = registry
            .check_delegates(&voter, &[DiffEntry::remove(delegate)])
            .await
            .unwrap_err();
        assert!(matches!(err, EmberError::NotVoted(_)));
    }

    #[tokio::test]
    async fn test_chain_confirmation() {
        let chain = InMemoryChain::new();
        let id = TxId::new(7);

        assert!(!chain.is_confirmed(id).await.unwrap());
        chain.confirm(id);
        assert!(chain.is_confirmed(id).await.unwrap());
    }

    #[test]
    fn test_fixed_clock() {
        let clock = FixedClock::at(100);
        assert_eq!(clock.now().as_secs(), 100);
        clock.advance(15);
        assert_eq!(clock.now().as_secs(), 115);
    }
}
