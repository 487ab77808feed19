//! Error types for EMBERNET

use crate::types::TxId;
use thiserror::Error;

/// Result type for EMBERNET operations.
pub type EmberResult<T> = Result<T, EmberError>;

/// Coarse classification of a rejection, used by callers that only need to
/// know how to react (drop, log, surface, halt).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Structurally bad input; never mutates state.
    Malformed,
    /// Signature or second-signature mismatch; never mutates state.
    Authentication,
    /// Duplicate or colliding state claim; rejected with a specific reason.
    Conflict,
    /// Balance check failed during application.
    InsufficientFunds,
    /// Everything else, including integrity violations.
    Internal,
}

/// Main error type for EMBERNET.
#[derive(Error, Debug)]
pub enum EmberError {
    // ============ Cryptography Errors ============
    #[error("Invalid signature")]
    InvalidSignature,

    #[error("Invalid second signature")]
    InvalidSecondSignature,

    #[error("Invalid public key")]
    InvalidPublicKey,

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    // ============ Admission Errors ============
    #[error("Invalid transaction id: expected {expected}, got {got}")]
    InvalidTransactionId { expected: TxId, got: TxId },

    #[error("Unknown transaction type: {0}")]
    UnknownTransactionType(u8),

    #[error("Transaction {0} already confirmed")]
    AlreadyConfirmed(TxId),

    #[error("Transaction {0} already exists")]
    DuplicateTransaction(TxId),

    #[error("Sender account not found")]
    SenderNotFound,

    #[error("Invalid transaction amount: {0}")]
    InvalidAmount(i64),

    #[error("Invalid transaction timestamp: {timestamp} is ahead of {now}")]
    InvalidTimestamp { timestamp: i64, now: i64 },

    #[error("Invalid transaction recipient: {0}")]
    InvalidRecipient(String),

    #[error("Empty transaction asset for {0} transaction")]
    EmptyAsset(&'static str),

    #[error("Asset payload does not match a {0} transaction")]
    AssetMismatch(&'static str),

    // ============ Vote Errors ============
    #[error("Empty vote list")]
    EmptyVotes,

    #[error("Voting for {count} delegates exceeds the maximum of {max}")]
    TooManyVotes { count: usize, max: usize },

    #[error("Vote for unknown delegate: {0}")]
    UnknownDelegate(String),

    #[error("Already voted for delegate: {0}")]
    AlreadyVoted(String),

    #[error("Conflicting unconfirmed vote for delegate: {0}")]
    AlreadyVotedUnconfirmed(String),

    #[error("No existing vote for delegate: {0}")]
    NotVoted(String),

    #[error("Delegate with this name already exists")]
    DelegateNameExists,

    // ============ Username Errors ============
    #[error("Username contains disallowed characters")]
    UsernameDisallowedChars,

    #[error("Username must not look like an address")]
    UsernameLikeAddress,

    #[error("Incorrect username length: {0}")]
    UsernameLength(usize),

    #[error("Username already taken: {0}")]
    UsernameTaken(String),

    #[error("Account already has a username")]
    AlreadyHasUsername,

    // ============ Second-Signature Errors ============
    #[error("Second signature already enrolled or pending")]
    SecondSignatureExists,

    // ============ Economic Errors ============
    #[error("Insufficient funds: required {required}, available {available}")]
    InsufficientFunds { required: i64, available: i64 },

    #[error("Confirmed-state integrity violation: {0}")]
    IntegrityViolation(String),

    // ============ Infrastructure Errors ============
    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl EmberError {
    pub fn kind(&self) -> ErrorKind {
        use EmberError::*;
        match self {
            InvalidSignature | InvalidSecondSignature => ErrorKind::Authentication,
            InvalidPublicKey
            | InvalidAddress(_)
            | InvalidTransactionId { .. }
            | UnknownTransactionType(_)
            | InvalidAmount(_)
            | InvalidTimestamp { .. }
            | InvalidRecipient(_)
            | EmptyAsset(_)
            | AssetMismatch(_)
            | EmptyVotes
            | TooManyVotes { .. }
            | UsernameDisallowedChars
            | UsernameLikeAddress
            | UsernameLength(_)
            | Serialization(_) => ErrorKind::Malformed,
            AlreadyConfirmed(_)
            | DuplicateTransaction(_)
            | SenderNotFound
            | UnknownDelegate(_)
            | AlreadyVoted(_)
            | AlreadyVotedUnconfirmed(_)
            | NotVoted(_)
            | DelegateNameExists
            | UsernameTaken(_)
            | AlreadyHasUsername
            | SecondSignatureExists => ErrorKind::Conflict,
            InsufficientFunds { .. } => ErrorKind::InsufficientFunds,
            IntegrityViolation(_) | Persistence(_) | Other(_) => ErrorKind::Internal,
        }
    }
}

impl From<serde_json::Error> for EmberError {
    fn from(err: serde_json::Error) -> Self {
        EmberError::Serialization(err.to_string())
    }
}
