//! Plain transfer handler (type 0)

use async_trait::async_trait;
use embernet_core::{CinderConfig, EmberError, EmberResult};
use embernet_state::{Account, AccountPatch};

use crate::asset::{AssetHandler, AssetRow, CreateParams, HandlerContext};
use crate::transaction::{Asset, Transaction, TransactionType};

/// Moves value from sender to recipient. No asset payload.
pub struct TransferHandler;

#[async_trait]
impl AssetHandler for TransferHandler {
    fn kind(&self) -> TransactionType {
        TransactionType::Transfer
    }

    fn create(&self, params: &CreateParams, tx: &mut Transaction) -> EmberResult<()> {
        tx.recipient_id = Some(params.recipient.ok_or_else(|| {
            EmberError::InvalidRecipient("transfer requires a recipient".into())
        })?);
        tx.amount = params.amount;
        tx.asset = Asset::None {};
        Ok(())
    }

    fn calculate_fee(&self, tx: &Transaction, config: &CinderConfig) -> i64 {
        ((tx.amount as i128 * config.transfer_fee_ppm as i128) / 1_000_000) as i64
    }

    async fn verify(
        &self,
        tx: &Transaction,
        _sender: &Account,
        _ctx: &HandlerContext,
    ) -> EmberResult<()> {
        // The address parser already guarantees the suffix character; only
        // presence needs checking here.
        if tx.recipient_id.is_none() {
            return Err(EmberError::InvalidRecipient(
                "transfer requires a recipient".into(),
            ));
        }
        Ok(())
    }

    fn asset_bytes(&self, _tx: &Transaction) -> Vec<u8> {
        Vec::new()
    }

    async fn apply(
        &self,
        tx: &Transaction,
        _sender: &Account,
        ctx: &HandlerContext,
    ) -> EmberResult<()> {
        let recipient = tx.recipient_id.ok_or_else(|| {
            EmberError::InvalidRecipient("transfer requires a recipient".into())
        })?;

        ctx.store.get_or_create(recipient);
        ctx.store
            .merge(recipient, AccountPatch::balance_delta(tx.amount, tx.amount));
        Ok(())
    }

    async fn undo(
        &self,
        tx: &Transaction,
        _sender: &Account,
        ctx: &HandlerContext,
    ) -> EmberResult<()> {
        let recipient = tx.recipient_id.ok_or_else(|| {
            EmberError::InvalidRecipient("transfer requires a recipient".into())
        })?;

        ctx.store
            .merge(recipient, AccountPatch::balance_delta(-tx.amount, -tx.amount));
        Ok(())
    }

    async fn apply_unconfirmed(
        &self,
        _tx: &Transaction,
        _sender: &Account,
        _ctx: &HandlerContext,
    ) -> EmberResult<()> {
        // The sender-side unconfirmed debit is common to all types and is
        // performed by the pipeline.
        Ok(())
    }

    async fn undo_unconfirmed(
        &self,
        _tx: &Transaction,
        _sender: &Account,
        _ctx: &HandlerContext,
    ) -> EmberResult<()> {
        Ok(())
    }

    fn object_normalize(&self, tx: &Transaction) -> EmberResult<()> {
        if !tx.asset.is_empty() {
            return Err(EmberError::AssetMismatch("transfer"));
        }
        Ok(())
    }

    fn persistence_write(&self, _tx: &Transaction) -> Option<AssetRow> {
        None
    }

    fn persistence_read(&self, _row: &AssetRow) -> Option<Asset> {
        None
    }
}
