//! Asset-type handler protocol and registry
//!
//! Every transaction kind plugs into the same lifecycle through one
//! registered [`AssetHandler`]. The registry is populated once at startup
//! and never changes afterwards.

use async_trait::async_trait;
use embernet_core::{
    Address, CinderConfig, DelegateRegistry, DiffEntry, EmberError, EmberResult, Hash,
    PublicKey, TxId,
};
use embernet_crypto::sha256;
use embernet_state::{Account, AccountStore};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use crate::transaction::{canonical_bytes, Asset, Transaction, TransactionType};

/// Shared dependencies handed to every handler call.
#[derive(Clone)]
pub struct HandlerContext {
    pub store: Arc<AccountStore>,
    pub delegates: Arc<dyn DelegateRegistry>,
    pub config: CinderConfig,
}

/// Inputs for building a new transaction of some type.
#[derive(Debug, Clone, Default)]
pub struct CreateParams {
    pub sender_address: Option<Address>,
    pub sender_public_key: Option<PublicKey>,
    pub recipient: Option<Address>,
    pub amount: i64,
    pub votes: Option<Vec<DiffEntry<Address>>>,
    pub username: Option<String>,
    pub second_public_key: Option<PublicKey>,
}

/// Projection of an asset payload onto a persistence row.
///
/// The persistence collaborator receives exactly one row per confirmed
/// transaction that carries an asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AssetRow {
    Votes { transaction_id: TxId, votes: String },
    SecondSignature { transaction_id: TxId, public_key: PublicKey },
    Username { transaction_id: TxId, alias: String },
}

impl AssetRow {
    pub fn transaction_id(&self) -> TxId {
        match self {
            AssetRow::Votes { transaction_id, .. }
            | AssetRow::SecondSignature { transaction_id, .. }
            | AssetRow::Username { transaction_id, .. } => *transaction_id,
        }
    }
}

/// Persistence collaborator for asset rows.
#[async_trait]
pub trait AssetPersistence: Send + Sync {
    async fn write(&self, row: AssetRow) -> EmberResult<()>;
    async fn read(&self, transaction_id: TxId) -> EmberResult<Option<AssetRow>>;
}

/// Lifecycle protocol implemented once per transaction type.
///
/// `apply`/`undo` mutate confirmed state, `apply_unconfirmed`/
/// `undo_unconfirmed` the tentative pool-phase state. The common
/// amount-plus-fee balance movement is performed by the pipeline; handlers
/// only carry their type-specific effects, and each pair must be an exact
/// inverse.
#[async_trait]
pub trait AssetHandler: Send + Sync {
    fn kind(&self) -> TransactionType;

    /// Fill type-specific fields on a freshly built transaction.
    fn create(&self, params: &CreateParams, tx: &mut Transaction) -> EmberResult<()>;

    /// Fee for this transaction, in sub-units.
    fn calculate_fee(&self, tx: &Transaction, config: &CinderConfig) -> i64;

    /// Type-specific validation: structure, bounds, and cross-account
    /// semantic checks.
    async fn verify(
        &self,
        tx: &Transaction,
        sender: &Account,
        ctx: &HandlerContext,
    ) -> EmberResult<()>;

    /// Hook between verification and application. Most types pass through.
    fn process(&self, _tx: &Transaction, _sender: &Account) -> EmberResult<()> {
        Ok(())
    }

    /// Asset segment of the canonical byte encoding.
    fn asset_bytes(&self, tx: &Transaction) -> Vec<u8>;

    async fn apply(
        &self,
        tx: &Transaction,
        sender: &Account,
        ctx: &HandlerContext,
    ) -> EmberResult<()>;

    async fn undo(
        &self,
        tx: &Transaction,
        sender: &Account,
        ctx: &HandlerContext,
    ) -> EmberResult<()>;

    async fn apply_unconfirmed(
        &self,
        tx: &Transaction,
        sender: &Account,
        ctx: &HandlerContext,
    ) -> EmberResult<()>;

    async fn undo_unconfirmed(
        &self,
        tx: &Transaction,
        sender: &Account,
        ctx: &HandlerContext,
    ) -> EmberResult<()>;

    /// Validate that the asset payload has the shape this type requires.
    fn object_normalize(&self, tx: &Transaction) -> EmberResult<()>;

    /// Project the asset onto its persistence row, if this type has one.
    fn persistence_write(&self, tx: &Transaction) -> Option<AssetRow>;

    /// Hydrate an asset payload from a persistence row.
    fn persistence_read(&self, row: &AssetRow) -> Option<Asset>;

    /// Whether the transaction has collected enough co-signatures for
    /// confirmation. Accounts without multisignature are always ready.
    fn is_ready(&self, tx: &Transaction, sender: &Account) -> bool {
        if sender.multisignatures.is_empty() {
            return true;
        }
        tx.signatures.len() >= sender.multi_min as usize
    }
}

/// Immutable table mapping a type code to its handler.
pub struct AssetRegistry {
    handlers: HashMap<TransactionType, Box<dyn AssetHandler>>,
}

impl AssetRegistry {
    /// Registry with the four standard handlers attached.
    pub fn standard() -> Self {
        let mut registry = Self {
            handlers: HashMap::new(),
        };
        registry.attach(Box::new(crate::transfer::TransferHandler));
        registry.attach(Box::new(crate::signature::SecondSignatureHandler));
        registry.attach(Box::new(crate::vote::VoteHandler));
        registry.attach(Box::new(crate::username::UsernameHandler));
        registry
    }

    fn attach(&mut self, handler: Box<dyn AssetHandler>) {
        self.handlers.insert(handler.kind(), handler);
    }

    pub fn get(&self, kind: TransactionType) -> EmberResult<&dyn AssetHandler> {
        self.handlers
            .get(&kind)
            .map(|h| h.as_ref())
            .ok_or(EmberError::UnknownTransactionType(kind as u8))
    }

    /// Canonical byte encoding of a transaction, optionally without the
    /// trailing signature segments.
    pub fn bytes(
        &self,
        tx: &Transaction,
        skip_signature: bool,
        skip_second_signature: bool,
    ) -> EmberResult<Vec<u8>> {
        let handler = self.get(tx.kind)?;
        Ok(canonical_bytes(
            tx,
            &handler.asset_bytes(tx),
            skip_signature,
            skip_second_signature,
        ))
    }

    /// SHA-256 over the (possibly stripped) canonical bytes.
    pub fn hash(
        &self,
        tx: &Transaction,
        skip_signature: bool,
        skip_second_signature: bool,
    ) -> EmberResult<Hash> {
        Ok(sha256(&self.bytes(tx, skip_signature, skip_second_signature)?))
    }

    /// Deterministic transaction ID: the low 8 bytes of the SHA-256 of the
    /// full canonical bytes, in reversed byte order.
    pub fn id(&self, tx: &Transaction) -> EmberResult<TxId> {
        let digest = self.hash(tx, false, false)?;
        let mut low = [0u8; 8];
        low.copy_from_slice(&digest.as_bytes()[..8]);
        Ok(TxId::new(u64::from_le_bytes(low)))
    }
}
