//! Wallet helpers
//!
//! Passphrase-based account opening, transaction signing, and a typed
//! builder that fills per-type fields through the registered handler.

use embernet_core::{
    Address, CinderConfig, DiffEntry, EmberError, EmberResult, Timestamp,
};
use embernet_crypto::{sign, KeyPair};
use embernet_state::{Account, AccountPatch, AccountStore};

use crate::asset::{AssetRegistry, CreateParams};
use crate::transaction::{Asset, Transaction, TransactionType};

/// Open the account belonging to a passphrase: derive the keypair and bind
/// the public key to its address, creating the account when absent.
pub fn open_account(store: &AccountStore, secret: &str) -> Account {
    let keypair = KeyPair::from_secret(secret);
    store.set(
        keypair.address(),
        AccountPatch {
            public_key: Some(keypair.public_key()),
            ..Default::default()
        },
    );
    store.get_or_create(keypair.address())
}

/// Sign a transaction with the primary key. The signature covers the
/// canonical bytes without any signature segment.
pub fn sign_transaction(
    registry: &AssetRegistry,
    tx: &mut Transaction,
    keypair: &KeyPair,
) -> EmberResult<()> {
    let hash = registry.hash(tx, true, true)?;
    tx.signature = Some(sign(keypair, &hash));
    Ok(())
}

/// Add the second signature. It covers the canonical bytes including the
/// primary signature but not itself.
pub fn second_sign_transaction(
    registry: &AssetRegistry,
    tx: &mut Transaction,
    keypair: &KeyPair,
) -> EmberResult<()> {
    let hash = registry.hash(tx, false, true)?;
    tx.sign_signature = Some(sign(keypair, &hash));
    Ok(())
}

/// Builds a signed transaction of any registered type.
pub struct TransactionBuilder {
    kind: TransactionType,
    secret: String,
    second_secret: Option<String>,
    recipient: Option<Address>,
    amount: i64,
    votes: Option<Vec<DiffEntry<Address>>>,
    username: Option<String>,
    timestamp: Timestamp,
}

impl TransactionBuilder {
    pub fn new(kind: TransactionType, secret: &str) -> Self {
        Self {
            kind,
            secret: secret.to_string(),
            second_secret: None,
            recipient: None,
            amount: 0,
            votes: None,
            username: None,
            timestamp: Timestamp::from_secs(0),
        }
    }

    pub fn recipient(mut self, address: Address) -> Self {
        self.recipient = Some(address);
        self
    }

    pub fn amount(mut self, amount: i64) -> Self {
        self.amount = amount;
        self
    }

    pub fn votes(mut self, votes: Vec<DiffEntry<Address>>) -> Self {
        self.votes = Some(votes);
        self
    }

    pub fn username(mut self, alias: &str) -> Self {
        self.username = Some(alias.to_string());
        self
    }

    /// For a second-signature registration this secret derives the enrolled
    /// key; for every other type it produces the second signature of an
    /// already-enrolled account.
    pub fn second_secret(mut self, secret: &str) -> Self {
        self.second_secret = Some(secret.to_string());
        self
    }

    pub fn timestamp(mut self, timestamp: Timestamp) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn build(
        self,
        registry: &AssetRegistry,
        config: &CinderConfig,
    ) -> EmberResult<Transaction> {
        let keypair = KeyPair::from_secret(&self.secret);

        let mut params = CreateParams {
            sender_address: Some(keypair.address()),
            sender_public_key: Some(keypair.public_key()),
            recipient: self.recipient,
            amount: self.amount,
            votes: self.votes.clone(),
            username: self.username.clone(),
            second_public_key: None,
        };

        if self.kind == TransactionType::SecondSignature {
            let second_secret = self
                .second_secret
                .as_deref()
                .ok_or(EmberError::EmptyAsset("signature"))?;
            params.second_public_key =
                Some(KeyPair::from_secret(second_secret).public_key());
        }

        let mut tx = Transaction {
            kind: self.kind,
            id: None,
            block_id: None,
            timestamp: self.timestamp,
            sender_public_key: keypair.public_key(),
            sender_id: Some(keypair.address()),
            recipient_id: None,
            amount: 0,
            fee: 0,
            signature: None,
            sign_signature: None,
            signatures: Vec::new(),
            asset: Asset::None {},
        };

        let handler = registry.get(self.kind)?;
        handler.create(&params, &mut tx)?;

        tx.fee = handler.calculate_fee(&tx, config).max(1);

        sign_transaction(registry, &mut tx, &keypair)?;

        if self.kind != TransactionType::SecondSignature {
            if let Some(second_secret) = &self.second_secret {
                second_sign_transaction(
                    registry,
                    &mut tx,
                    &KeyPair::from_secret(second_secret),
                )?;
            }
        }

        tx.id = Some(registry.id(&tx)?);
        Ok(tx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embernet_crypto::verify;

    #[test]
    fn test_open_account_binds_public_key() {
        let store = AccountStore::new();
        let account = open_account(&store, "my secret passphrase");

        let keypair = KeyPair::from_secret("my secret passphrase");
        assert_eq!(account.address, keypair.address());
        assert_eq!(account.public_key, Some(keypair.public_key()));
        assert_eq!(account.balance, 0);
    }

    #[test]
    fn test_builder_produces_verifiable_transfer() {
        let registry = AssetRegistry::standard();
        let config = CinderConfig::default();

        let tx = TransactionBuilder::new(TransactionType::Transfer, "sender secret")
            .recipient(Address::new(42))
            .amount(5_000_000)
            .timestamp(Timestamp::from_secs(10))
            .build(&registry, &config)
            .unwrap();

        assert_eq!(tx.recipient_id, Some(Address::new(42)));
        assert!(tx.fee >= 1);
        assert!(tx.id.is_some());

        let keypair = KeyPair::from_secret("sender secret");
        let hash = registry.hash(&tx, true, true).unwrap();
        assert!(verify(&keypair.public_key(), &hash, &tx.signature.unwrap()));
    }

    #[test]
    fn test_builder_second_signature_registration() {
        let registry = AssetRegistry::standard();
        let config = CinderConfig::default();

        let tx = TransactionBuilder::new(TransactionType::SecondSignature, "sender secret")
            .second_secret("second secret")
            .build(&registry, &config)
            .unwrap();

        let second = KeyPair::from_secret("second secret");
        match &tx.asset {
            Asset::SecondSignature { signature } => {
                assert_eq!(signature.public_key, second.public_key());
            }
            _ => panic!("wrong asset"),
        }
        // Registration carries no second signature itself.
        assert!(tx.sign_signature.is_none());
    }

    #[test]
    fn test_builder_second_signs_when_enrolled() {
        let registry = AssetRegistry::standard();
        let config = CinderConfig::default();

        let tx = TransactionBuilder::new(TransactionType::Transfer, "sender secret")
            .recipient(Address::new(42))
            .amount(100)
            .second_secret("second secret")
            .build(&registry, &config)
            .unwrap();

        let second = KeyPair::from_secret("second secret");
        let hash = registry.hash(&tx, false, true).unwrap();
        assert!(verify(
            &second.public_key(),
            &hash,
            &tx.sign_signature.unwrap()
        ));
    }
}
