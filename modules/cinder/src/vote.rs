//! Delegate vote handler (type 2)
//!
//! A vote transaction carries an ordered diff list against the sender's
//! delegate vote collection. Confirmed and unconfirmed views mutate
//! independently; undo paths apply the reversed diff, which restores the
//! collection exactly.

use async_trait::async_trait;
use embernet_core::{diff, CinderConfig, EmberError, EmberResult};
use embernet_state::{Account, AccountPatch};

use crate::asset::{AssetHandler, AssetRow, CreateParams, HandlerContext};
use crate::transaction::{Asset, Transaction, TransactionType};

pub struct VoteHandler;

#[async_trait]
impl AssetHandler for VoteHandler {
    fn kind(&self) -> TransactionType {
        TransactionType::Vote
    }

    fn create(&self, params: &CreateParams, tx: &mut Transaction) -> EmberResult<()> {
        // Votes are self-referential: the recipient is the sender.
        tx.recipient_id = Some(
            params
                .sender_address
                .ok_or_else(|| EmberError::InvalidAddress("missing sender address".into()))?,
        );
        tx.amount = 0;
        tx.asset = Asset::Votes {
            votes: params.votes.clone().ok_or(EmberError::EmptyVotes)?,
        };
        Ok(())
    }

    fn calculate_fee(&self, _tx: &Transaction, config: &CinderConfig) -> i64 {
        config.fixed_fee
    }

    async fn verify(
        &self,
        tx: &Transaction,
        sender: &Account,
        ctx: &HandlerContext,
    ) -> EmberResult<()> {
        if tx.recipient_id != Some(sender.address) {
            return Err(EmberError::InvalidRecipient(
                "vote recipient must equal sender".into(),
            ));
        }

        let votes = tx.asset.votes().ok_or(EmberError::EmptyAsset("vote"))?;
        if votes.is_empty() {
            return Err(EmberError::EmptyVotes);
        }
        if votes.len() > ctx.config.max_votes {
            return Err(EmberError::TooManyVotes {
                count: votes.len(),
                max: ctx.config.max_votes,
            });
        }

        ctx.delegates
            .check_delegates(&tx.sender_public_key, votes)
            .await
    }

    fn asset_bytes(&self, tx: &Transaction) -> Vec<u8> {
        match tx.asset.votes() {
            Some(votes) => votes
                .iter()
                .map(|entry| entry.to_string())
                .collect::<String>()
                .into_bytes(),
            None => Vec::new(),
        }
    }

    async fn apply(
        &self,
        tx: &Transaction,
        sender: &Account,
        ctx: &HandlerContext,
    ) -> EmberResult<()> {
        let votes = tx.asset.votes().ok_or(EmberError::EmptyAsset("vote"))?;

        ctx.store.merge(
            sender.address,
            AccountPatch {
                delegates: Some(votes.to_vec()),
                ..Default::default()
            },
        );
        Ok(())
    }

    async fn undo(
        &self,
        tx: &Transaction,
        sender: &Account,
        ctx: &HandlerContext,
    ) -> EmberResult<()> {
        let votes = tx.asset.votes().ok_or(EmberError::EmptyAsset("vote"))?;

        ctx.store.merge(
            sender.address,
            AccountPatch {
                delegates: Some(diff::reverse(votes)),
                ..Default::default()
            },
        );
        Ok(())
    }

    async fn apply_unconfirmed(
        &self,
        tx: &Transaction,
        sender: &Account,
        ctx: &HandlerContext,
    ) -> EmberResult<()> {
        let votes = tx.asset.votes().ok_or(EmberError::EmptyAsset("vote"))?;

        // Reject votes that conflict with other still-unconfirmed votes
        // from this sender.
        ctx.delegates
            .check_unconfirmed_delegates(&tx.sender_public_key, votes)
            .await?;

        ctx.store.merge(
            sender.address,
            AccountPatch {
                u_delegates: Some(votes.to_vec()),
                ..Default::default()
            },
        );
        Ok(())
    }

    async fn undo_unconfirmed(
        &self,
        tx: &Transaction,
        sender: &Account,
        ctx: &HandlerContext,
    ) -> EmberResult<()> {
        let votes = tx.asset.votes().ok_or(EmberError::EmptyAsset("vote"))?;

        ctx.store.merge(
            sender.address,
            AccountPatch {
                u_delegates: Some(diff::reverse(votes)),
                ..Default::default()
            },
        );
        Ok(())
    }

    fn object_normalize(&self, tx: &Transaction) -> EmberResult<()> {
        if tx.asset.votes().is_none() {
            return Err(EmberError::EmptyAsset("vote"));
        }
        Ok(())
    }

    fn persistence_write(&self, tx: &Transaction) -> Option<AssetRow> {
        let votes = tx.asset.votes()?;
        Some(AssetRow::Votes {
            transaction_id: tx.id?,
            votes: votes
                .iter()
                .map(|entry| entry.to_string())
                .collect::<Vec<_>>()
                .join(","),
        })
    }

    fn persistence_read(&self, row: &AssetRow) -> Option<Asset> {
        match row {
            AssetRow::Votes { votes, .. } => {
                let entries: Result<Vec<_>, _> =
                    votes.split(',').map(|entry| entry.parse()).collect();
                Some(Asset::Votes { votes: entries.ok()? })
            }
            _ => None,
        }
    }
}
