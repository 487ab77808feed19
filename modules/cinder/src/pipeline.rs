//! Transaction pipeline
//!
//! Orchestrates admission of unconfirmed transactions and the confirmed
//! apply/undo driven by block application. Owns the unconfirmed pool and
//! the quarantine set for double-spend detections.
//!
//! All mutating entry points serialize behind one async mutex: two
//! transactions from the same sender can never interleave their balance
//! check and debit, which is what makes the double-spend check sound.

use async_trait::async_trait;
use dashmap::DashMap;
use embernet_core::{
    CinderConfig, Clock, DelegateRegistry, EmberError, EmberResult, TxId,
};
use embernet_crypto::{address_from_public_key, verify};
use embernet_state::{Account, AccountFilter, AccountPatch, AccountStore};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, warn};

use crate::asset::{AssetPersistence, AssetRegistry, HandlerContext};
use crate::genesis::GenesisConfig;
use crate::transaction::{Transaction, TransactionType};

/// Confirmed-ledger collaborator: answers whether a transaction ID is
/// already in a confirmed block.
#[async_trait]
pub trait ConfirmedLedger: Send + Sync {
    async fn is_confirmed(&self, id: TxId) -> EmberResult<bool>;
}

/// Receives a notification for every successful unconfirmed admission.
#[async_trait]
pub trait BroadcastHook: Send + Sync {
    async fn on_unconfirmed_transaction(&self, tx: &Transaction, broadcast: bool);
}

/// External collaborators the pipeline talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub delegates: Arc<dyn DelegateRegistry>,
    pub ledger: Arc<dyn ConfirmedLedger>,
    pub persistence: Arc<dyn AssetPersistence>,
    pub broadcast: Arc<dyn BroadcastHook>,
    pub clock: Arc<dyn Clock>,
}

/// The transaction state machine.
///
/// `Proposed -> {Rejected | Unconfirmed} -> {Confirmed | Reverted}`, plus a
/// terminal `Quarantined` state for transactions that failed economic
/// application after passing every structural check.
pub struct TransactionPipeline {
    store: Arc<AccountStore>,
    registry: Arc<AssetRegistry>,
    collaborators: Collaborators,
    config: CinderConfig,
    genesis: GenesisConfig,

    unconfirmed: DashMap<TxId, Transaction>,
    quarantined: DashMap<TxId, Transaction>,

    sequence: Mutex<()>,
}

impl TransactionPipeline {
    pub fn new(
        store: Arc<AccountStore>,
        registry: Arc<AssetRegistry>,
        collaborators: Collaborators,
        config: CinderConfig,
        genesis: GenesisConfig,
    ) -> Self {
        Self {
            store,
            registry,
            collaborators,
            config,
            genesis,
            unconfirmed: DashMap::new(),
            quarantined: DashMap::new(),
            sequence: Mutex::new(()),
        }
    }

    pub fn store(&self) -> &Arc<AccountStore> {
        &self.store
    }

    pub fn registry(&self) -> &Arc<AssetRegistry> {
        &self.registry
    }

    fn handler_context(&self) -> HandlerContext {
        HandlerContext {
            store: self.store.clone(),
            delegates: self.collaborators.delegates.clone(),
            config: self.config.clone(),
        }
    }

    fn is_genesis(&self, tx: &Transaction) -> bool {
        self.genesis.is_genesis(tx)
    }

    // ============ Admission ============

    /// Admit a transaction into the unconfirmed pool.
    ///
    /// Rejections leave no trace on account state. A failure during
    /// economic application quarantines the transaction instead: it is
    /// retained for diagnostics and never retried automatically.
    pub async fn process_unconfirmed_transaction(
        &self,
        mut tx: Transaction,
        broadcast: bool,
    ) -> EmberResult<TxId> {
        let _guard = self.sequence.lock().await;

        // 1. The ID is the hash of the transaction's own bytes; a pre-set
        //    mismatching ID is rejected before anything else.
        let computed = self.registry.id(&tx)?;
        if let Some(id) = tx.id {
            if id != computed {
                return Err(EmberError::InvalidTransactionId {
                    expected: computed,
                    got: id,
                });
            }
        }
        tx.id = Some(computed);

        // 2. Replay of confirmed history.
        if self.collaborators.ledger.is_confirmed(computed).await? {
            return Err(EmberError::AlreadyConfirmed(computed));
        }

        // 3. Duplicate of a pooled or quarantined transaction.
        if self.unconfirmed.contains_key(&computed) || self.quarantined.contains_key(&computed)
        {
            return Err(EmberError::DuplicateTransaction(computed));
        }

        // 4. No implicit account creation on admission.
        let sender = self
            .store
            .get(&AccountFilter::PublicKey(tx.sender_public_key))
            .ok_or(EmberError::SenderNotFound)?;
        tx.sender_id = Some(sender.address);

        // 5. Signatures, over the byte encoding with trailing signature
        //    bytes stripped.
        if !self.verify_signature(&tx)? {
            return Err(EmberError::InvalidSignature);
        }
        if sender.second_signature && !self.verify_second_signature(&tx, &sender)? {
            return Err(EmberError::InvalidSecondSignature);
        }

        // 6. Amount and clock-skew bounds.
        if tx.amount < 0 {
            return Err(EmberError::InvalidAmount(tx.amount));
        }
        let now = self.collaborators.clock.now();
        if tx.timestamp.as_secs() > now.as_secs() + self.config.timestamp_tolerance {
            return Err(EmberError::InvalidTimestamp {
                timestamp: tx.timestamp.as_secs(),
                now: now.as_secs(),
            });
        }

        // 7. Type-aware fee with an anti-spam floor of one sub-unit.
        let handler = self.registry.get(tx.kind)?;
        tx.fee = handler.calculate_fee(&tx, &self.config).max(1);

        // 8. Type-specific structural checks.
        handler.object_normalize(&tx)?;
        let ctx = self.handler_context();
        handler.verify(&tx, &sender, &ctx).await?;
        handler.process(&tx, &sender)?;

        // 9. Cross-account semantic checks, independent ones in parallel.
        self.check_name_collisions(&tx).await?;

        // 10. Economic application against unconfirmed state. Failure here
        //     is a double-spend detection: quarantine, never retry.
        if let Err(err) = self.apply_unconfirmed_inner(&tx).await {
            warn!(id = %computed, error = %err, "quarantining transaction");
            self.quarantined.insert(computed, tx);
            return Err(err);
        }

        // 11. Pool insertion and broadcast notification.
        self.unconfirmed.insert(computed, tx.clone());
        debug!(id = %computed, kind = ?tx.kind, "admitted unconfirmed transaction");
        self.collaborators
            .broadcast
            .on_unconfirmed_transaction(&tx, broadcast)
            .await;

        Ok(computed)
    }

    /// Admit a batch. Each transaction is processed independently; one
    /// rejection never aborts the rest.
    pub async fn receive_transactions(
        &self,
        transactions: Vec<Transaction>,
        broadcast: bool,
    ) -> Vec<EmberResult<TxId>> {
        let mut results = Vec::with_capacity(transactions.len());
        for tx in transactions {
            results.push(self.process_unconfirmed_transaction(tx, broadcast).await);
        }
        results
    }

    /// Delegate-name collision checks for username registrations. The two
    /// registry lookups are independent and run concurrently.
    async fn check_name_collisions(&self, tx: &Transaction) -> EmberResult<()> {
        if tx.kind != TransactionType::Username {
            return Ok(());
        }

        let delegates = &self.collaborators.delegates;
        let (confirmed, unconfirmed) = tokio::join!(
            delegates.get_delegate(&tx.sender_public_key),
            delegates.get_unconfirmed_delegate(&tx.sender_public_key),
        );

        if confirmed.is_some() || unconfirmed.is_some() {
            return Err(EmberError::DelegateNameExists);
        }
        Ok(())
    }

    // ============ Signature Verification ============

    /// Verify the primary signature. Strips the trailing 64 signature bytes
    /// (or 128 when a second signature is present) before hashing.
    /// Cryptographic failure is `Ok(false)`, never an error.
    pub fn verify_signature(&self, tx: &Transaction) -> EmberResult<bool> {
        let signature = match &tx.signature {
            Some(signature) => signature,
            None => return Ok(false),
        };
        let hash = self.registry.hash(tx, true, true)?;
        Ok(verify(&tx.sender_public_key, &hash, signature))
    }

    /// Verify the second signature against the sender's enrolled key.
    /// Strips only the trailing second-signature bytes.
    pub fn verify_second_signature(
        &self,
        tx: &Transaction,
        sender: &Account,
    ) -> EmberResult<bool> {
        let signature = match &tx.sign_signature {
            Some(signature) => signature,
            None => return Ok(false),
        };
        let public_key = match &sender.second_public_key {
            Some(public_key) => public_key,
            None => return Ok(false),
        };
        let hash = self.registry.hash(tx, false, true)?;
        Ok(verify(public_key, &hash, signature))
    }

    // ============ Unconfirmed Apply/Undo ============

    pub async fn apply_unconfirmed(&self, tx: &Transaction) -> EmberResult<()> {
        let _guard = self.sequence.lock().await;
        self.apply_unconfirmed_inner(tx).await
    }

    async fn apply_unconfirmed_inner(&self, tx: &Transaction) -> EmberResult<()> {
        let sender = match self.store.get(&AccountFilter::PublicKey(tx.sender_public_key)) {
            Some(sender) => sender,
            None if self.is_genesis(tx) => self
                .store
                .get_or_create(address_from_public_key(&tx.sender_public_key)),
            None => return Err(EmberError::SenderNotFound),
        };

        let total = tx.total_cost();
        if sender.u_balance < total && !self.is_genesis(tx) {
            return Err(EmberError::InsufficientFunds {
                required: total,
                available: sender.u_balance,
            });
        }

        // Type-specific effects run before the debit; they can still fail
        // without having touched the balance.
        let handler = self.registry.get(tx.kind)?;
        handler
            .apply_unconfirmed(tx, &sender, &self.handler_context())
            .await?;

        self.store
            .merge(sender.address, AccountPatch::balance_delta(0, -total));
        Ok(())
    }

    pub async fn undo_unconfirmed(&self, tx: &Transaction) -> EmberResult<()> {
        let _guard = self.sequence.lock().await;

        let sender = self
            .store
            .get(&AccountFilter::PublicKey(tx.sender_public_key))
            .ok_or(EmberError::SenderNotFound)?;

        self.store.merge(
            sender.address,
            AccountPatch::balance_delta(0, tx.total_cost()),
        );

        let handler = self.registry.get(tx.kind)?;
        handler
            .undo_unconfirmed(tx, &sender, &self.handler_context())
            .await
    }

    // ============ Confirmed Apply/Undo ============

    /// Apply a confirmed transaction. Called by the block-application
    /// collaborator in transaction order within a block.
    ///
    /// Confirmed transactions are pre-validated by admission and block
    /// assembly; a balance floor failure here is a consensus-level
    /// integrity violation, surfaced as a fatal error and never absorbed.
    pub async fn apply(&self, tx: &Transaction) -> EmberResult<()> {
        let _guard = self.sequence.lock().await;

        let sender = match self.store.get(&AccountFilter::PublicKey(tx.sender_public_key)) {
            Some(sender) => sender,
            None if self.is_genesis(tx) => self
                .store
                .get_or_create(address_from_public_key(&tx.sender_public_key)),
            None => {
                return Err(EmberError::IntegrityViolation(
                    "confirmed transaction from unknown sender".into(),
                ))
            }
        };

        let total = tx.total_cost();
        if sender.balance < total && !self.is_genesis(tx) {
            error!(
                id = ?tx.id,
                required = total,
                available = sender.balance,
                "insufficient confirmed funds for pre-validated transaction"
            );
            return Err(EmberError::IntegrityViolation(format!(
                "insufficient confirmed funds for transaction {}",
                tx.id.map(|id| id.to_string()).unwrap_or_default()
            )));
        }

        self.store
            .merge(sender.address, AccountPatch::balance_delta(-total, 0));

        let handler = self.registry.get(tx.kind)?;
        handler.apply(tx, &sender, &self.handler_context()).await?;

        // Exactly one persistence write per confirmed transaction with an
        // asset payload.
        if let Some(row) = handler.persistence_write(tx) {
            self.collaborators.persistence.write(row).await?;
        }

        Ok(())
    }

    /// Reverse a confirmed transaction. Called during block disconnect, in
    /// reverse transaction order.
    pub async fn undo(&self, tx: &Transaction) -> EmberResult<()> {
        let _guard = self.sequence.lock().await;

        let sender = self
            .store
            .get(&AccountFilter::PublicKey(tx.sender_public_key))
            .ok_or_else(|| {
                EmberError::IntegrityViolation("undo of transaction from unknown sender".into())
            })?;

        self.store
            .merge(sender.address, AccountPatch::balance_delta(tx.total_cost(), 0));

        let handler = self.registry.get(tx.kind)?;
        handler.undo(tx, &sender, &self.handler_context()).await
    }

    /// Multisignature readiness of a pooled transaction.
    pub fn is_ready(&self, tx: &Transaction) -> EmberResult<bool> {
        let sender = self
            .store
            .get(&AccountFilter::PublicKey(tx.sender_public_key))
            .ok_or(EmberError::SenderNotFound)?;
        let handler = self.registry.get(tx.kind)?;
        Ok(handler.is_ready(tx, &sender))
    }

    // ============ Pool Access ============

    pub fn unconfirmed_transaction(&self, id: TxId) -> Option<Transaction> {
        self.unconfirmed.get(&id).map(|tx| tx.value().clone())
    }

    /// All pooled transactions, newest timestamp first.
    pub fn unconfirmed_transactions(&self) -> Vec<Transaction> {
        let mut transactions: Vec<Transaction> =
            self.unconfirmed.iter().map(|tx| tx.value().clone()).collect();
        transactions.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        transactions
    }

    pub fn unconfirmed_len(&self) -> usize {
        self.unconfirmed.len()
    }

    /// Drop a transaction from the pool, releasing any unconfirmed
    /// delegate-name reservation it held.
    pub async fn remove_unconfirmed_transaction(&self, id: TxId) -> Option<Transaction> {
        let (_, tx) = self.unconfirmed.remove(&id)?;
        self.collaborators
            .delegates
            .remove_unconfirmed_delegate(&tx.sender_public_key)
            .await;
        debug!(id = %id, "removed unconfirmed transaction");
        Some(tx)
    }

    pub fn quarantined_transaction(&self, id: TxId) -> Option<Transaction> {
        self.quarantined.get(&id).map(|tx| tx.value().clone())
    }

    pub fn quarantined_len(&self) -> usize {
        self.quarantined.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mem::{
        FixedClock, InMemoryChain, InMemoryDelegateRegistry, RecordingBroadcast,
    };
    use crate::wallet::{open_account, TransactionBuilder};
    use embernet_core::{Address, DiffEntry, Timestamp};
    use embernet_crypto::KeyPair;

    struct Fixture {
        store: Arc<AccountStore>,
        delegates: Arc<InMemoryDelegateRegistry>,
        chain: Arc<InMemoryChain>,
        broadcast: Arc<RecordingBroadcast>,
        registry: Arc<AssetRegistry>,
        config: CinderConfig,
        pipeline: TransactionPipeline,
    }

    const NOW: i64 = 1_000;

    fn fixture() -> Fixture {
        let store = Arc::new(AccountStore::new());
        let registry = Arc::new(AssetRegistry::standard());
        let delegates = Arc::new(InMemoryDelegateRegistry::new(store.clone()));
        let chain = Arc::new(InMemoryChain::new());
        let broadcast = Arc::new(RecordingBroadcast::new());
        let config = CinderConfig::default();

        let pipeline = TransactionPipeline::new(
            store.clone(),
            registry.clone(),
            Collaborators {
                delegates: delegates.clone(),
                ledger: chain.clone(),
                persistence: chain.clone(),
                broadcast: broadcast.clone(),
                clock: Arc::new(FixedClock::at(NOW)),
            },
            config.clone(),
            GenesisConfig::default(),
        );

        Fixture {
            store,
            delegates,
            chain,
            broadcast,
            registry,
            config,
            pipeline,
        }
    }

    /// Open an account from a secret and credit both balances.
    fn fund(fx: &Fixture, secret: &str, balance: i64) -> KeyPair {
        let account = open_account(&fx.store, secret);
        fx.store
            .merge(account.address, AccountPatch::balance_delta(balance, balance));
        KeyPair::from_secret(secret)
    }

    fn account(fx: &Fixture, address: Address) -> Account {
        fx.store.get(&AccountFilter::Address(address)).unwrap()
    }

    fn transfer(fx: &Fixture, secret: &str, recipient: Address, amount: i64) -> Transaction {
        TransactionBuilder::new(TransactionType::Transfer, secret)
            .recipient(recipient)
            .amount(amount)
            .timestamp(Timestamp::from_secs(NOW))
            .build(&fx.registry, &fx.config)
            .unwrap()
    }

    #[tokio::test]
    async fn test_transfer_admission_and_confirmation_scenario() {
        let fx = fixture();
        let sender = fund(&fx, "sender", 100);
        let recipient = Address::new(4242);

        let tx = transfer(&fx, "sender", recipient, 50);
        assert_eq!(tx.fee, 1);

        let id = fx
            .pipeline
            .process_unconfirmed_transaction(tx.clone(), true)
            .await
            .unwrap();

        // Admission debits the sender's unconfirmed balance only.
        let s = account(&fx, sender.address());
        assert_eq!(s.u_balance, 49);
        assert_eq!(s.balance, 100);
        assert!(fx.store.get(&AccountFilter::Address(recipient)).is_none());
        assert_eq!(fx.pipeline.unconfirmed_len(), 1);
        assert_eq!(fx.broadcast.seen(), vec![(id, true)]);

        // Confirmation moves the confirmed balances.
        fx.pipeline.apply(&tx).await.unwrap();
        fx.pipeline.remove_unconfirmed_transaction(id).await;
        fx.chain.confirm(id);

        let s = account(&fx, sender.address());
        assert_eq!(s.balance, 49);
        assert_eq!(s.u_balance, 49);

        let r = account(&fx, recipient);
        assert_eq!(r.balance, 50);
        assert_eq!(r.u_balance, 50);
        assert_eq!(fx.pipeline.unconfirmed_len(), 0);
    }

    #[tokio::test]
    async fn test_undo_reverses_apply_exactly() {
        let fx = fixture();
        let sender = fund(&fx, "sender", 100);
        let recipient = Address::new(4242);

        let tx = transfer(&fx, "sender", recipient, 50);
        fx.pipeline
            .process_unconfirmed_transaction(tx.clone(), false)
            .await
            .unwrap();
        fx.pipeline.apply(&tx).await.unwrap();
        fx.pipeline.undo(&tx).await.unwrap();

        let s = account(&fx, sender.address());
        assert_eq!(s.balance, 100);
        let r = account(&fx, recipient);
        assert_eq!(r.balance, 0);
        assert_eq!(r.u_balance, 0);
    }

    #[tokio::test]
    async fn test_undo_unconfirmed_restores_balance() {
        let fx = fixture();
        let sender = fund(&fx, "sender", 100);

        let tx = transfer(&fx, "sender", Address::new(4242), 50);
        let id = fx
            .pipeline
            .process_unconfirmed_transaction(tx.clone(), false)
            .await
            .unwrap();

        fx.pipeline.remove_unconfirmed_transaction(id).await;
        fx.pipeline.undo_unconfirmed(&tx).await.unwrap();

        assert_eq!(account(&fx, sender.address()).u_balance, 100);
    }

    #[tokio::test]
    async fn test_duplicate_submission_rejected() {
        let fx = fixture();
        fund(&fx, "sender", 100);

        let tx = transfer(&fx, "sender", Address::new(4242), 50);
        fx.pipeline
            .process_unconfirmed_transaction(tx.clone(), false)
            .await
            .unwrap();

        let err = fx
            .pipeline
            .process_unconfirmed_transaction(tx, false)
            .await
            .unwrap_err();
        assert!(matches!(err, EmberError::DuplicateTransaction(_)));
    }

    #[tokio::test]
    async fn test_mismatching_id_rejected() {
        let fx = fixture();
        fund(&fx, "sender", 100);

        let mut tx = transfer(&fx, "sender", Address::new(4242), 50);
        tx.id = Some(TxId::new(999_999));

        let err = fx
            .pipeline
            .process_unconfirmed_transaction(tx, false)
            .await
            .unwrap_err();
        assert!(matches!(err, EmberError::InvalidTransactionId { .. }));
    }

    #[tokio::test]
    async fn test_already_confirmed_rejected() {
        let fx = fixture();
        fund(&fx, "sender", 100);

        let tx = transfer(&fx, "sender", Address::new(4242), 50);
        fx.chain.confirm(tx.id.unwrap());

        let err = fx
            .pipeline
            .process_unconfirmed_transaction(tx, false)
            .await
            .unwrap_err();
        assert!(matches!(err, EmberError::AlreadyConfirmed(_)));
    }

    #[tokio::test]
    async fn test_unknown_sender_rejected() {
        let fx = fixture();
        // "stranger" never opened an account.
        let tx = transfer(&fx, "stranger", Address::new(4242), 50);

        let err = fx
            .pipeline
            .process_unconfirmed_transaction(tx, false)
            .await
            .unwrap_err();
        assert!(matches!(err, EmberError::SenderNotFound));
    }

    #[tokio::test]
    async fn test_bad_signature_rejected() {
        let fx = fixture();
        fund(&fx, "sender", 100);

        let mut tx = transfer(&fx, "sender", Address::new(4242), 50);
        tx.signature = Some(embernet_core::Signature::from_bytes([0u8; 64]));
        tx.id = None;

        let err = fx
            .pipeline
            .process_unconfirmed_transaction(tx, false)
            .await
            .unwrap_err();
        assert!(matches!(err, EmberError::InvalidSignature));
    }

    #[tokio::test]
    async fn test_negative_amount_rejected_before_balance_mutation() {
        let fx = fixture();
        let sender = fund(&fx, "sender", 100);

        let tx = TransactionBuilder::new(TransactionType::Transfer, "sender")
            .recipient(Address::new(4242))
            .amount(-1)
            .timestamp(Timestamp::from_secs(NOW))
            .build(&fx.registry, &fx.config)
            .unwrap();

        let err = fx
            .pipeline
            .process_unconfirmed_transaction(tx, false)
            .await
            .unwrap_err();
        assert!(matches!(err, EmberError::InvalidAmount(-1)));
        assert_eq!(account(&fx, sender.address()).u_balance, 100);
        assert_eq!(fx.pipeline.unconfirmed_len(), 0);
        assert_eq!(fx.pipeline.quarantined_len(), 0);
    }

    #[tokio::test]
    async fn test_timestamp_skew_bound() {
        let fx = fixture();
        fund(&fx, "sender", 100);

        // 15 seconds ahead is tolerated.
        let tx = TransactionBuilder::new(TransactionType::Transfer, "sender")
            .recipient(Address::new(4242))
            .amount(10)
            .timestamp(Timestamp::from_secs(NOW + 15))
            .build(&fx.registry, &fx.config)
            .unwrap();
        fx.pipeline
            .process_unconfirmed_transaction(tx, false)
            .await
            .unwrap();

        // 16 seconds ahead is not.
        let tx = TransactionBuilder::new(TransactionType::Transfer, "sender")
            .recipient(Address::new(4242))
            .amount(11)
            .timestamp(Timestamp::from_secs(NOW + 16))
            .build(&fx.registry, &fx.config)
            .unwrap();
        let err = fx
            .pipeline
            .process_unconfirmed_transaction(tx, false)
            .await
            .unwrap_err();
        assert!(matches!(err, EmberError::InvalidTimestamp { .. }));
    }

    #[tokio::test]
    async fn test_enrolled_second_signature_is_required() {
        let fx = fixture();
        let sender = fund(&fx, "sender", embernet_core::FIXED_POINT * 10);
        let second = KeyPair::from_secret("second");

        fx.store.set(
            sender.address(),
            AccountPatch {
                second_signature: Some(true),
                second_public_key: Some(Some(second.public_key())),
                ..Default::default()
            },
        );

        // Without the second signature: rejected.
        let tx = transfer(&fx, "sender", Address::new(4242), 50);
        let err = fx
            .pipeline
            .process_unconfirmed_transaction(tx, false)
            .await
            .unwrap_err();
        assert!(matches!(err, EmberError::InvalidSecondSignature));

        // With it: admitted.
        let tx = TransactionBuilder::new(TransactionType::Transfer, "sender")
            .recipient(Address::new(4242))
            .amount(50)
            .second_secret("second")
            .timestamp(Timestamp::from_secs(NOW))
            .build(&fx.registry, &fx.config)
            .unwrap();
        fx.pipeline
            .process_unconfirmed_transaction(tx, false)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_vote_bounds_scenario() {
        let fx = fixture();
        let fee = fx.config.fixed_fee;
        fund(&fx, "voter", fee * 10);

        let delegates: Vec<Address> = (0..34).map(|i| Address::new(10_000 + i)).collect();
        for delegate in &delegates {
            fx.delegates.register(*delegate);
        }

        // 34 distinct delegates: rejected with a maximum-delegates error.
        let tx = TransactionBuilder::new(TransactionType::Vote, "voter")
            .votes(delegates.iter().map(|d| DiffEntry::add(*d)).collect())
            .timestamp(Timestamp::from_secs(NOW))
            .build(&fx.registry, &fx.config)
            .unwrap();
        let err = fx
            .pipeline
            .process_unconfirmed_transaction(tx, false)
            .await
            .unwrap_err();
        assert!(matches!(err, EmberError::TooManyVotes { count: 34, .. }));

        // 33 succeed.
        let tx = TransactionBuilder::new(TransactionType::Vote, "voter")
            .votes(delegates[..33].iter().map(|d| DiffEntry::add(*d)).collect())
            .timestamp(Timestamp::from_secs(NOW))
            .build(&fx.registry, &fx.config)
            .unwrap();
        fx.pipeline
            .process_unconfirmed_transaction(tx, false)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_second_registration_is_quarantined() {
        let fx = fixture();
        let fee = fx.config.fixed_fee;
        fund(&fx, "sender", fee * 10);

        let tx = TransactionBuilder::new(TransactionType::SecondSignature, "sender")
            .second_secret("second one")
            .timestamp(Timestamp::from_secs(NOW))
            .build(&fx.registry, &fx.config)
            .unwrap();
        fx.pipeline
            .process_unconfirmed_transaction(tx, false)
            .await
            .unwrap();

        // A second registration passes every structural check but fails
        // economic application: at-most-once enrollment.
        let tx = TransactionBuilder::new(TransactionType::SecondSignature, "sender")
            .second_secret("second two")
            .timestamp(Timestamp::from_secs(NOW))
            .build(&fx.registry, &fx.config)
            .unwrap();
        let id = tx.id.unwrap();
        let err = fx
            .pipeline
            .process_unconfirmed_transaction(tx, false)
            .await
            .unwrap_err();

        assert!(matches!(err, EmberError::SecondSignatureExists));
        assert!(fx.pipeline.quarantined_transaction(id).is_some());
        assert_eq!(fx.pipeline.unconfirmed_len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_overdraft_quarantines_one() {
        let fx = fixture();
        let sender = fund(&fx, "sender", 100);

        // 61 + 71 sub-units together exceed the balance of 100.
        let tx_a = transfer(&fx, "sender", Address::new(1111), 60);
        let tx_b = transfer(&fx, "sender", Address::new(2222), 70);

        let (res_a, res_b) = tokio::join!(
            fx.pipeline.process_unconfirmed_transaction(tx_a, false),
            fx.pipeline.process_unconfirmed_transaction(tx_b, false),
        );

        let outcomes = [res_a, res_b];
        assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
        let failure = outcomes.iter().find(|r| r.is_err()).unwrap();
        assert!(matches!(
            failure.as_ref().unwrap_err(),
            EmberError::InsufficientFunds { .. }
        ));

        assert_eq!(fx.pipeline.unconfirmed_len(), 1);
        assert_eq!(fx.pipeline.quarantined_len(), 1);

        // Exactly one debit happened.
        let u_balance = account(&fx, sender.address()).u_balance;
        assert!(u_balance == 39 || u_balance == 29);
    }

    #[tokio::test]
    async fn test_batch_processing_is_independent() {
        let fx = fixture();
        fund(&fx, "sender", 100);

        let good = transfer(&fx, "sender", Address::new(4242), 10);
        let bad = TransactionBuilder::new(TransactionType::Transfer, "sender")
            .recipient(Address::new(4242))
            .amount(-1)
            .timestamp(Timestamp::from_secs(NOW))
            .build(&fx.registry, &fx.config)
            .unwrap();
        let also_good = transfer(&fx, "sender", Address::new(4243), 20);

        let results = fx
            .pipeline
            .receive_transactions(vec![good, bad, also_good], false)
            .await;

        assert!(results[0].is_ok());
        assert!(results[1].is_err());
        assert!(results[2].is_ok());
        assert_eq!(fx.pipeline.unconfirmed_len(), 2);
    }

    #[tokio::test]
    async fn test_pool_listing_is_timestamp_descending() {
        let fx = fixture();
        fund(&fx, "sender", 1000);

        for (amount, ts) in [(10, NOW - 20), (20, NOW - 10), (30, NOW)] {
            let tx = TransactionBuilder::new(TransactionType::Transfer, "sender")
                .recipient(Address::new(4242))
                .amount(amount)
                .timestamp(Timestamp::from_secs(ts))
                .build(&fx.registry, &fx.config)
                .unwrap();
            fx.pipeline
                .process_unconfirmed_transaction(tx, false)
                .await
                .unwrap();
        }

        let pooled = fx.pipeline.unconfirmed_transactions();
        let stamps: Vec<i64> = pooled.iter().map(|tx| tx.timestamp.as_secs()).collect();
        assert_eq!(stamps, vec![NOW, NOW - 10, NOW - 20]);
    }

    #[tokio::test]
    async fn test_confirmed_apply_writes_one_asset_row() {
        let fx = fixture();
        let fee = fx.config.fixed_fee;
        fund(&fx, "sender", fee * 10);

        let tx = TransactionBuilder::new(TransactionType::Username, "sender")
            .username("miner_joe")
            .timestamp(Timestamp::from_secs(NOW))
            .build(&fx.registry, &fx.config)
            .unwrap();

        fx.pipeline
            .process_unconfirmed_transaction(tx.clone(), false)
            .await
            .unwrap();
        fx.pipeline.apply(&tx).await.unwrap();

        assert_eq!(fx.chain.row_count(), 1);
    }

    #[tokio::test]
    async fn test_confirmed_overdraft_is_integrity_violation() {
        let fx = fixture();
        fund(&fx, "sender", 100);

        // Bypass admission: a "confirmed" transaction the sender cannot
        // afford must surface as a fatal integrity violation.
        let tx = transfer(&fx, "sender", Address::new(4242), 500);
        let err = fx.pipeline.apply(&tx).await.unwrap_err();
        assert!(matches!(err, EmberError::IntegrityViolation(_)));
    }

    #[tokio::test]
    async fn test_genesis_transaction_bypasses_balance_floor() {
        let fx = fixture();
        let recipient = Address::new(4242);

        let mut tx = TransactionBuilder::new(TransactionType::Transfer, "genesis source")
            .recipient(recipient)
            .amount(1_000)
            .timestamp(Timestamp::from_secs(0))
            .build(&fx.registry, &fx.config)
            .unwrap();
        tx.block_id = Some(GenesisConfig::default().block_id);

        // Sender account does not exist and has no funds; genesis is
        // exempt from both checks.
        fx.pipeline.apply_unconfirmed(&tx).await.unwrap();
        fx.pipeline.apply(&tx).await.unwrap();

        let r = account(&fx, recipient);
        assert_eq!(r.balance, 1_000);
        assert_eq!(r.u_balance, 1_000);

        let genesis_sender = KeyPair::from_secret("genesis source");
        let s = account(&fx, genesis_sender.address());
        assert!(s.balance < 0);
    }
}
