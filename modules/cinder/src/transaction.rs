//! CINDER transaction type and canonical byte encoding

use embernet_core::{
    Address, DiffEntry, EmberError, EmberResult, PublicKey, Signature, Timestamp, TxId,
};
use serde::{Deserialize, Serialize};

/// Transaction type code, one byte on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum TransactionType {
    Transfer = 0,
    SecondSignature = 1,
    Vote = 2,
    Username = 3,
}

impl TryFrom<u8> for TransactionType {
    type Error = EmberError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(TransactionType::Transfer),
            1 => Ok(TransactionType::SecondSignature),
            2 => Ok(TransactionType::Vote),
            3 => Ok(TransactionType::Username),
            other => Err(EmberError::UnknownTransactionType(other)),
        }
    }
}

impl From<TransactionType> for u8 {
    fn from(kind: TransactionType) -> u8 {
        kind as u8
    }
}

/// Second-signature registration payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecondSignatureAsset {
    pub public_key: PublicKey,
}

/// Username claim payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsernameAsset {
    pub alias: String,
    pub public_key: PublicKey,
}

/// Type-specific asset payload.
///
/// Shape and validation rules are owned by the corresponding asset handler;
/// this enum only carries the data. The wire form mirrors the historical
/// JSON: `{"votes": [...]}`, `{"signature": {...}}`, `{"username": {...}}`,
/// or `{}` for plain transfers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Asset {
    Votes { votes: Vec<DiffEntry<Address>> },
    SecondSignature { signature: SecondSignatureAsset },
    Username { username: UsernameAsset },
    None {},
}

impl Default for Asset {
    fn default() -> Self {
        Asset::None {}
    }
}

impl Asset {
    pub fn is_empty(&self) -> bool {
        matches!(self, Asset::None {})
    }

    pub fn votes(&self) -> Option<&[DiffEntry<Address>]> {
        match self {
            Asset::Votes { votes } => Some(votes),
            _ => None,
        }
    }
}

/// A monetary or state-changing operation against the ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    #[serde(rename = "type")]
    pub kind: TransactionType,

    /// Deterministic ID; stamped on admission, immutable afterwards.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<TxId>,

    /// Set when the transaction is included in a block.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_id: Option<u64>,

    pub timestamp: Timestamp,
    pub sender_public_key: PublicKey,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_id: Option<Address>,

    /// Absent for non-transfer types.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipient_id: Option<Address>,

    pub amount: i64,

    #[serde(default)]
    pub fee: i64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<Signature>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sign_signature: Option<Signature>,

    /// Multisignature co-signatures collected so far.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub signatures: Vec<Signature>,

    #[serde(default)]
    pub asset: Asset,
}

impl Transaction {
    /// Total debit against the sender: amount plus fee.
    pub fn total_cost(&self) -> i64 {
        self.amount.saturating_add(self.fee)
    }

    /// Parse a transaction from loose JSON input.
    ///
    /// This is the only ingress for untyped data; a fractional or
    /// out-of-range amount fails here, before anything can touch state.
    pub fn from_json(value: serde_json::Value) -> EmberResult<Transaction> {
        Ok(serde_json::from_value(value)?)
    }

    /// Wire bytes handed to the broadcast collaborator. JSON, because the
    /// untagged asset payload needs a self-describing format.
    pub fn to_wire_bytes(&self) -> EmberResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_wire_bytes(bytes: &[u8]) -> EmberResult<Transaction> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// Assemble the canonical byte encoding:
/// type ‖ timestamp ‖ sender public key ‖ recipient (zero-fill if absent)
/// ‖ amount ‖ asset bytes ‖ primary signature ‖ second signature.
///
/// The skip flags drop the trailing signature segments, which is how
/// signature verification strips exactly the bytes that were not yet
/// present at signing time.
pub(crate) fn canonical_bytes(
    tx: &Transaction,
    asset_bytes: &[u8],
    skip_signature: bool,
    skip_second_signature: bool,
) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(128 + asset_bytes.len());

    bytes.push(tx.kind as u8);
    bytes.extend_from_slice(&(tx.timestamp.as_secs() as u32).to_be_bytes());
    bytes.extend_from_slice(tx.sender_public_key.as_bytes());

    match tx.recipient_id {
        Some(recipient) => bytes.extend_from_slice(&recipient.as_u64().to_be_bytes()),
        None => bytes.extend_from_slice(&[0u8; 8]),
    }

    bytes.extend_from_slice(&(tx.amount as u64).to_be_bytes());
    bytes.extend_from_slice(asset_bytes);

    if !skip_signature {
        if let Some(signature) = &tx.signature {
            bytes.extend_from_slice(signature.as_bytes());
        }
    }
    if !skip_second_signature {
        if let Some(signature) = &tx.sign_signature {
            bytes.extend_from_slice(signature.as_bytes());
        }
    }

    bytes
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn base_transfer_json() -> serde_json::Value {
        json!({
            "type": 0,
            "timestamp": 100,
            "senderPublicKey": hex::encode([1u8; 32]),
            "recipientId": "42C",
            "amount": 50,
            "signature": hex::encode([2u8; 64]),
        })
    }

    #[test]
    fn test_from_json_transfer() {
        let tx = Transaction::from_json(base_transfer_json()).unwrap();
        assert_eq!(tx.kind, TransactionType::Transfer);
        assert_eq!(tx.amount, 50);
        assert_eq!(tx.recipient_id, Some(Address::new(42)));
        assert!(tx.asset.is_empty());
    }

    #[test]
    fn test_from_json_rejects_fractional_amount() {
        let mut value = base_transfer_json();
        value["amount"] = json!(10.5);

        let err = Transaction::from_json(value).unwrap_err();
        assert_eq!(err.kind(), embernet_core::ErrorKind::Malformed);
    }

    #[test]
    fn test_from_json_accepts_negative_amount() {
        // Negative amounts parse; the pipeline rejects them before any
        // balance mutation.
        let mut value = base_transfer_json();
        value["amount"] = json!(-1);

        let tx = Transaction::from_json(value).unwrap();
        assert_eq!(tx.amount, -1);
    }

    #[test]
    fn test_asset_wire_forms() {
        let votes: Asset =
            serde_json::from_value(json!({ "votes": ["+42C", "-7C"] })).unwrap();
        assert_eq!(
            votes.votes().unwrap(),
            &[
                DiffEntry::add(Address::new(42)),
                DiffEntry::remove(Address::new(7))
            ]
        );

        let signature: Asset = serde_json::from_value(
            json!({ "signature": { "publicKey": hex::encode([9u8; 32]) } }),
        )
        .unwrap();
        assert!(matches!(signature, Asset::SecondSignature { .. }));

        let username: Asset = serde_json::from_value(
            json!({ "username": { "alias": "joe", "publicKey": hex::encode([9u8; 32]) } }),
        )
        .unwrap();
        assert!(matches!(username, Asset::Username { .. }));

        let empty: Asset = serde_json::from_value(json!({})).unwrap();
        assert!(empty.is_empty());
    }

    #[test]
    fn test_canonical_bytes_layout() {
        let tx = Transaction::from_json(base_transfer_json()).unwrap();

        let unsigned = canonical_bytes(&tx, &[], true, true);
        // type + timestamp + pubkey + recipient + amount
        assert_eq!(unsigned.len(), 1 + 4 + 32 + 8 + 8);
        assert_eq!(unsigned[0], 0);

        let signed = canonical_bytes(&tx, &[], false, false);
        assert_eq!(signed.len(), unsigned.len() + 64);
    }

    #[test]
    fn test_canonical_bytes_zero_fill_recipient() {
        let mut tx = Transaction::from_json(base_transfer_json()).unwrap();
        let with_recipient = canonical_bytes(&tx, &[], true, true);

        tx.recipient_id = None;
        let without_recipient = canonical_bytes(&tx, &[], true, true);

        assert_eq!(with_recipient.len(), without_recipient.len());
        assert_ne!(with_recipient, without_recipient);
        assert_eq!(&without_recipient[37..45], &[0u8; 8]);
    }

    #[test]
    fn test_wire_roundtrip() {
        let tx = Transaction::from_json(base_transfer_json()).unwrap();
        let bytes = tx.to_wire_bytes().unwrap();
        let back = Transaction::from_wire_bytes(&bytes).unwrap();

        assert_eq!(back.kind, tx.kind);
        assert_eq!(back.amount, tx.amount);
        assert_eq!(back.recipient_id, tx.recipient_id);
    }
}
