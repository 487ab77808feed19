//! EMBERNET account state
//!
//! The in-memory account store: per-account confirmed and unconfirmed
//! balances and attributes, mutated only through atomic set/merge
//! operations with exact undo records.

pub mod account;
pub mod store;

pub use account::{Account, AccountPatch, AppliedDiff};
pub use store::{AccountFilter, AccountStore};
