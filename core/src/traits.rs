//! Collaborator contracts consumed by the transaction core
//!
//! The core never reaches the network or disk itself. Everything outside the
//! single-node state machine (time, the delegate registry) is injected
//! through these traits.

use crate::diff::DiffEntry;
use crate::error::EmberResult;
use crate::types::{Address, PublicKey, Timestamp};
use async_trait::async_trait;

/// Supplies the current logical time used for timestamp-skew checks.
pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}

/// Delegate registry collaborator.
///
/// Validates vote targets against the set of registered delegates and tracks
/// delegate-name registrations in both confirmed and unconfirmed phases.
#[async_trait]
pub trait DelegateRegistry: Send + Sync {
    /// Check a vote diff list against confirmed state: every added delegate
    /// must exist and must not already be voted for by `voter`; every removed
    /// delegate must currently be voted for.
    async fn check_delegates(
        &self,
        voter: &PublicKey,
        votes: &[DiffEntry<Address>],
    ) -> EmberResult<()>;

    /// Same check against the voter's unconfirmed vote list.
    async fn check_unconfirmed_delegates(
        &self,
        voter: &PublicKey,
        votes: &[DiffEntry<Address>],
    ) -> EmberResult<()>;

    /// Confirmed delegate name registered under this public key, if any.
    async fn get_delegate(&self, public_key: &PublicKey) -> Option<String>;

    /// Pending (unconfirmed) delegate name registered under this public key.
    async fn get_unconfirmed_delegate(&self, public_key: &PublicKey) -> Option<String>;

    /// Release an unconfirmed delegate-name reservation, called when the
    /// reserving transaction leaves the unconfirmed pool.
    async fn remove_unconfirmed_delegate(&self, public_key: &PublicKey);
}
