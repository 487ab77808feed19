//! CINDER transaction-processing module for EMBERNET
//!
//! Implements the single-node transaction state machine:
//! - Admission pipeline with unconfirmed pool and double-spend quarantine
//! - Asset-type handler registry (transfer, second-signature, vote,
//!   username)
//! - Confirmed apply/undo driven by block application
//! - Wallet helpers and genesis configuration

pub mod asset;
pub mod genesis;
pub mod mem;
pub mod pipeline;
pub mod signature;
pub mod transaction;
pub mod transfer;
pub mod username;
pub mod vote;
pub mod wallet;

pub use asset::{
    AssetHandler, AssetPersistence, AssetRegistry, AssetRow, CreateParams, HandlerContext,
};
pub use genesis::{GenesisAllocation, GenesisConfig};
pub use pipeline::{BroadcastHook, Collaborators, ConfirmedLedger, TransactionPipeline};
pub use transaction::{
    Asset, SecondSignatureAsset, Transaction, TransactionType, UsernameAsset,
};
pub use wallet::{open_account, sign_transaction, second_sign_transaction, TransactionBuilder};
