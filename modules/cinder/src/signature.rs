//! Second-signature registration handler (type 1)

use async_trait::async_trait;
use embernet_core::{CinderConfig, EmberError, EmberResult};
use embernet_state::{Account, AccountPatch};

use crate::asset::{AssetHandler, AssetRow, CreateParams, HandlerContext};
use crate::transaction::{Asset, SecondSignatureAsset, Transaction, TransactionType};

/// Enrolls a second signing key on the sender account. At most one
/// registration per account, ever: a pending or confirmed enrollment blocks
/// another.
pub struct SecondSignatureHandler;

#[async_trait]
impl AssetHandler for SecondSignatureHandler {
    fn kind(&self) -> TransactionType {
        TransactionType::SecondSignature
    }

    fn create(&self, params: &CreateParams, tx: &mut Transaction) -> EmberResult<()> {
        let public_key = params
            .second_public_key
            .ok_or(EmberError::EmptyAsset("signature"))?;
        tx.recipient_id = None;
        tx.amount = 0;
        tx.asset = Asset::SecondSignature {
            signature: SecondSignatureAsset { public_key },
        };
        Ok(())
    }

    fn calculate_fee(&self, _tx: &Transaction, config: &CinderConfig) -> i64 {
        config.fixed_fee
    }

    async fn verify(
        &self,
        tx: &Transaction,
        _sender: &Account,
        _ctx: &HandlerContext,
    ) -> EmberResult<()> {
        if !matches!(tx.asset, Asset::SecondSignature { .. }) {
            return Err(EmberError::EmptyAsset("signature"));
        }
        if tx.amount != 0 {
            return Err(EmberError::InvalidAmount(tx.amount));
        }
        if tx.recipient_id.is_some() {
            return Err(EmberError::InvalidRecipient(
                "signature registration takes no recipient".into(),
            ));
        }
        Ok(())
    }

    fn asset_bytes(&self, tx: &Transaction) -> Vec<u8> {
        match &tx.asset {
            Asset::SecondSignature { signature } => signature.public_key.as_bytes().to_vec(),
            _ => Vec::new(),
        }
    }

    async fn apply(
        &self,
        tx: &Transaction,
        sender: &Account,
        ctx: &HandlerContext,
    ) -> EmberResult<()> {
        let public_key = match &tx.asset {
            Asset::SecondSignature { signature } => signature.public_key,
            _ => return Err(EmberError::EmptyAsset("signature")),
        };

        ctx.store.merge(
            sender.address,
            AccountPatch {
                second_signature: Some(true),
                u_second_signature: Some(false),
                second_public_key: Some(Some(public_key)),
                ..Default::default()
            },
        );
        Ok(())
    }

    async fn undo(
        &self,
        _tx: &Transaction,
        sender: &Account,
        ctx: &HandlerContext,
    ) -> EmberResult<()> {
        ctx.store.merge(
            sender.address,
            AccountPatch {
                second_signature: Some(false),
                u_second_signature: Some(true),
                second_public_key: Some(None),
                ..Default::default()
            },
        );
        Ok(())
    }

    async fn apply_unconfirmed(
        &self,
        _tx: &Transaction,
        sender: &Account,
        ctx: &HandlerContext,
    ) -> EmberResult<()> {
        if sender.u_second_signature || sender.second_signature {
            return Err(EmberError::SecondSignatureExists);
        }

        ctx.store.merge(
            sender.address,
            AccountPatch {
                u_second_signature: Some(true),
                ..Default::default()
            },
        );
        Ok(())
    }

    async fn undo_unconfirmed(
        &self,
        _tx: &Transaction,
        sender: &Account,
        ctx: &HandlerContext,
    ) -> EmberResult<()> {
        ctx.store.merge(
            sender.address,
            AccountPatch {
                u_second_signature: Some(false),
                ..Default::default()
            },
        );
        Ok(())
    }

    fn object_normalize(&self, tx: &Transaction) -> EmberResult<()> {
        if !matches!(tx.asset, Asset::SecondSignature { .. }) {
            return Err(EmberError::EmptyAsset("signature"));
        }
        Ok(())
    }

    fn persistence_write(&self, tx: &Transaction) -> Option<AssetRow> {
        match (&tx.asset, tx.id) {
            (Asset::SecondSignature { signature }, Some(id)) => {
                Some(AssetRow::SecondSignature {
                    transaction_id: id,
                    public_key: signature.public_key,
                })
            }
            _ => None,
        }
    }

    fn persistence_read(&self, row: &AssetRow) -> Option<Asset> {
        match row {
            AssetRow::SecondSignature { public_key, .. } => Some(Asset::SecondSignature {
                signature: SecondSignatureAsset {
                    public_key: *public_key,
                },
            }),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mem::InMemoryDelegateRegistry;
    use embernet_core::{Address, PublicKey, Timestamp};
    use embernet_state::{AccountFilter, AccountStore};
    use std::sync::Arc;

    fn context() -> HandlerContext {
        let store = Arc::new(AccountStore::new());
        HandlerContext {
            delegates: Arc::new(InMemoryDelegateRegistry::new(store.clone())),
            store,
            config: CinderConfig::default(),
        }
    }

    fn registration(second_key: PublicKey) -> Transaction {
        Transaction {
            kind: TransactionType::SecondSignature,
            id: Some(embernet_core::TxId::new(77)),
            block_id: None,
            timestamp: Timestamp::from_secs(0),
            sender_public_key: PublicKey::from_bytes([1u8; 32]),
            sender_id: Some(Address::new(1)),
            recipient_id: None,
            amount: 0,
            fee: 1,
            signature: None,
            sign_signature: None,
            signatures: Vec::new(),
            asset: Asset::SecondSignature {
                signature: SecondSignatureAsset {
                    public_key: second_key,
                },
            },
        }
    }

    #[tokio::test]
    async fn test_apply_then_undo_restores_account() {
        let ctx = context();
        let handler = SecondSignatureHandler;
        let address = Address::new(1);
        let sender = ctx.store.get_or_create(address);
        let tx = registration(PublicKey::from_bytes([9u8; 32]));

        handler.apply(&tx, &sender, &ctx).await.unwrap();
        let account = ctx.store.get(&AccountFilter::Address(address)).unwrap();
        assert!(account.second_signature);
        assert_eq!(
            account.second_public_key,
            Some(PublicKey::from_bytes([9u8; 32]))
        );

        let sender = ctx.store.get(&AccountFilter::Address(address)).unwrap();
        handler.undo(&tx, &sender, &ctx).await.unwrap();
        let account = ctx.store.get(&AccountFilter::Address(address)).unwrap();
        assert!(!account.second_signature);
        assert_eq!(account.second_public_key, None);
    }

    #[tokio::test]
    async fn test_at_most_once_registration() {
        let ctx = context();
        let handler = SecondSignatureHandler;
        let address = Address::new(1);
        let tx = registration(PublicKey::from_bytes([9u8; 32]));

        let sender = ctx.store.get_or_create(address);
        handler.apply_unconfirmed(&tx, &sender, &ctx).await.unwrap();

        // A second registration while one is pending is rejected.
        let sender = ctx.store.get(&AccountFilter::Address(address)).unwrap();
        let err = handler
            .apply_unconfirmed(&tx, &sender, &ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, EmberError::SecondSignatureExists));

        // Same once the first one is confirmed.
        let sender = ctx.store.get(&AccountFilter::Address(address)).unwrap();
        handler.apply(&tx, &sender, &ctx).await.unwrap();
        let sender = ctx.store.get(&AccountFilter::Address(address)).unwrap();
        assert!(handler.apply_unconfirmed(&tx, &sender, &ctx).await.is_err());
    }

    #[test]
    fn test_persistence_roundtrip() {
        let handler = SecondSignatureHandler;
        let tx = registration(PublicKey::from_bytes([9u8; 32]));

        let row = handler.persistence_write(&tx).unwrap();
        let asset = handler.persistence_read(&row).unwrap();
        assert_eq!(asset, tx.asset);
    }
}
