//! Username registration handler (type 3)

use async_trait::async_trait;
use embernet_core::{CinderConfig, EmberError, EmberResult};
use embernet_state::{Account, AccountFilter, AccountPatch};

use crate::asset::{AssetHandler, AssetRow, CreateParams, HandlerContext};
use crate::transaction::{Asset, Transaction, TransactionType, UsernameAsset};

/// Claims a human-readable alias for the sender account.
///
/// An alias is unique across confirmed and pending claims, restricted to a
/// small character set, and must not look like an address.
pub struct UsernameHandler;

fn alias_of(tx: &Transaction) -> EmberResult<&UsernameAsset> {
    match &tx.asset {
        Asset::Username { username } => Ok(username),
        _ => Err(EmberError::EmptyAsset("username")),
    }
}

/// Allowed alias characters, checked on the lowercased form.
fn has_allowed_chars(alias: &str) -> bool {
    alias
        .to_lowercase()
        .chars()
        .all(|c| matches!(c, 'a'..='z' | '0'..='9' | '!' | '@' | '$' | '&' | '_' | '.'))
}

/// Aliases shaped like addresses (digits plus the suffix) are reserved.
fn looks_like_address(alias: &str) -> bool {
    let lower = alias.to_lowercase();
    match lower.strip_suffix('c') {
        Some(digits) => !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()),
        None => false,
    }
}

#[async_trait]
impl AssetHandler for UsernameHandler {
    fn kind(&self) -> TransactionType {
        TransactionType::Username
    }

    fn create(&self, params: &CreateParams, tx: &mut Transaction) -> EmberResult<()> {
        let alias = params
            .username
            .clone()
            .ok_or(EmberError::EmptyAsset("username"))?;
        let public_key = params
            .sender_public_key
            .ok_or(EmberError::InvalidPublicKey)?;

        tx.recipient_id = None;
        tx.amount = 0;
        tx.asset = Asset::Username {
            username: UsernameAsset { alias, public_key },
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
        if tx.recipient_id.is_some() {
            return Err(EmberError::InvalidRecipient(
                "username registration takes no recipient".into(),
            ));
        }
        if tx.amount != 0 {
            return Err(EmberError::InvalidAmount(tx.amount));
        }

        let username = alias_of(tx)?;
        let alias = username.alias.as_str();

        if alias.is_empty() {
            return Err(EmberError::EmptyAsset("username"));
        }
        if !has_allowed_chars(alias) {
            return Err(EmberError::UsernameDisallowedChars);
        }
        if looks_like_address(alias) {
            return Err(EmberError::UsernameLikeAddress);
        }
        if alias.len() < ctx.config.username_min_len || alias.len() > ctx.config.username_max_len
        {
            return Err(EmberError::UsernameLength(alias.len()));
        }

        // The alias must not be claimed, confirmed or pending, by anyone
        // else.
        for filter in [
            AccountFilter::Username(alias.to_string()),
            AccountFilter::UnconfirmedUsername(alias.to_string()),
        ] {
            if let Some(owner) = ctx.store.get(&filter) {
                if owner.address != sender.address {
                    return Err(EmberError::UsernameTaken(alias.to_string()));
                }
            }
        }

        if sender.username.is_some() {
            return Err(EmberError::AlreadyHasUsername);
        }

        Ok(())
    }

    fn asset_bytes(&self, tx: &Transaction) -> Vec<u8> {
        match &tx.asset {
            Asset::Username { username } => username.alias.as_bytes().to_vec(),
            _ => Vec::new(),
        }
    }

    async fn apply(
        &self,
        tx: &Transaction,
        sender: &Account,
        ctx: &HandlerContext,
    ) -> EmberResult<()> {
        let username = alias_of(tx)?;

        ctx.store.set(
            sender.address,
            AccountPatch {
                username: Some(Some(username.alias.clone())),
                u_username: Some(None),
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
        let username = alias_of(tx)?;

        ctx.store.set(
            sender.address,
            AccountPatch {
                username: Some(None),
                u_username: Some(Some(username.alias.clone())),
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
        let username = alias_of(tx)?;
        let alias = username.alias.clone();

        if sender.username.is_some() || sender.u_username.is_some() {
            return Err(EmberError::AlreadyHasUsername);
        }

        if let Some(owner) = ctx
            .store
            .get(&AccountFilter::UnconfirmedUsername(alias.clone()))
        {
            if owner.address != sender.address {
                return Err(EmberError::UsernameTaken(alias));
            }
        }

        ctx.store.set(
            sender.address,
            AccountPatch {
                u_username: Some(Some(alias)),
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
        ctx.store.set(
            sender.address,
            AccountPatch {
                u_username: Some(None),
                ..Default::default()
            },
        );
        Ok(())
    }

    fn object_normalize(&self, tx: &Transaction) -> EmberResult<()> {
        let username = alias_of(tx)?;
        if username.alias.is_empty() {
            return Err(EmberError::EmptyAsset("username"));
        }
        Ok(())
    }

    fn persistence_write(&self, tx: &Transaction) -> Option<AssetRow> {
        match (&tx.asset, tx.id) {
            (Asset::Username { username }, Some(id)) => Some(AssetRow::Username {
                transaction_id: id,
                alias: username.alias.clone(),
            }),
            _ => None,
        }
    }

    fn persistence_read(&self, row: &AssetRow) -> Option<Asset> {
        match row {
            AssetRow::Username { alias, .. } => Some(Asset::Username {
                username: UsernameAsset {
                    alias: alias.clone(),
                    // The claiming key is rehydrated from the transaction
                    // row by the persistence collaborator.
                    public_key: embernet_core::PublicKey::from_bytes([0u8; 32]),
                },
            }),
            _ => None,
        }
    }
}
