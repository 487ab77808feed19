//! Account record and patch types
//!
//! An account carries a confirmed and an unconfirmed view of every mutable
//! attribute. Unconfirmed fields reflect transactions admitted to the pool
//! but not yet included in a block; the admission pipeline may only touch
//! those.

use embernet_core::{Address, DiffEntry, PublicKey};
use serde::{Deserialize, Serialize};

/// Per-account state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub address: Address,
    pub public_key: Option<PublicKey>,

    /// Confirmed balance, in sub-units. May go negative only while the
    /// genesis transaction is applied; the pipeline enforces the floor.
    pub balance: i64,
    /// Unconfirmed balance, in sub-units.
    pub u_balance: i64,

    pub second_signature: bool,
    pub u_second_signature: bool,
    pub second_public_key: Option<PublicKey>,

    /// Delegates voted for, confirmed view. Ordered; mutated only through
    /// diff lists.
    pub delegates: Vec<Address>,
    /// Delegates voted for, unconfirmed view.
    pub u_delegates: Vec<Address>,

    pub multisignatures: Vec<PublicKey>,
    pub multi_min: u32,

    pub username: Option<String>,
    pub u_username: Option<String>,
}

impl Account {
    /// Zero-balance account bound to an address.
    pub fn new(address: Address) -> Self {
        Self {
            address,
            public_key: None,
            balance: 0,
            u_balance: 0,
            second_signature: false,
            u_second_signature: false,
            second_public_key: None,
            delegates: Vec::new(),
            u_delegates: Vec::new(),
            multisignatures: Vec::new(),
            multi_min: 0,
            username: None,
            u_username: None,
        }
    }
}

/// A mutation request against one account.
///
/// Balance fields are deltas; everything else is set-if-present. A value of
/// `Some(None)` clears an optional attribute. Collection fields carry diff
/// lists applied by the store's `merge`.
#[derive(Debug, Clone, Default)]
pub struct AccountPatch {
    pub public_key: Option<PublicKey>,

    pub balance: i64,
    pub u_balance: i64,

    pub second_signature: Option<bool>,
    pub u_second_signature: Option<bool>,
    pub second_public_key: Option<Option<PublicKey>>,

    pub delegates: Option<Vec<DiffEntry<Address>>>,
    pub u_delegates: Option<Vec<DiffEntry<Address>>>,

    pub multisignatures: Option<Vec<PublicKey>>,
    pub multi_min: Option<u32>,

    pub username: Option<Option<String>>,
    pub u_username: Option<Option<String>>,
}

impl AccountPatch {
    pub fn balance_delta(confirmed: i64, unconfirmed: i64) -> Self {
        Self {
            balance: confirmed,
            u_balance: unconfirmed,
            ..Default::default()
        }
    }
}

/// The concrete mutation a `merge` actually performed.
///
/// Balance deltas are echoed back and collection diffs contain only the
/// entries that took effect, so `undo_patch` is an exact inverse.
#[derive(Debug, Clone, Default)]
pub struct AppliedDiff {
    pub balance: i64,
    pub u_balance: i64,
    pub delegates: Vec<DiffEntry<Address>>,
    pub u_delegates: Vec<DiffEntry<Address>>,
}

impl AppliedDiff {
    /// A patch that reverses this applied diff exactly.
    pub fn undo_patch(&self) -> AccountPatch {
        AccountPatch {
            balance: -self.balance,
            u_balance: -self.u_balance,
            delegates: if self.delegates.is_empty() {
                None
            } else {
                Some(embernet_core::diff::reverse(&self.delegates))
            },
            u_delegates: if self.u_delegates.is_empty() {
                None
            } else {
                Some(embernet_core::diff::reverse(&self.u_delegates))
            },
            ..Default::default()
        }
    }
}
