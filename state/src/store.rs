//! In-memory account store
//!
//! The single authority over account state. Every balance or attribute
//! mutation in the system goes through `set` or `merge` here; nothing else
//! touches an `Account`.
//!
//! Mutations to one account are linearized: `merge` runs entirely under the
//! account's map entry lock, so concurrent callers observe either the full
//! effect of one merge or the other, never an interleaving.

use dashmap::DashMap;
use embernet_core::{diff, Address, PublicKey};
use embernet_crypto::address_from_public_key;
use tracing::debug;

use crate::account::{Account, AccountPatch, AppliedDiff};

/// Lookup key for `AccountStore::get`.
///
/// Public-key filters are normalized to an address lookup; username filters
/// scan the store.
#[derive(Debug, Clone)]
pub enum AccountFilter {
    Address(Address),
    PublicKey(PublicKey),
    Username(String),
    UnconfirmedUsername(String),
}

/// Holds every account, confirmed and unconfirmed state together.
#[derive(Default)]
pub struct AccountStore {
    accounts: DashMap<Address, Account>,
}

impl AccountStore {
    pub fn new() -> Self {
        Self {
            accounts: DashMap::new(),
        }
    }

    /// Fetch an account by filter. Returns a clone; mutation goes through
    /// `set` / `merge` only.
    pub fn get(&self, filter: &AccountFilter) -> Option<Account> {
        match filter {
            AccountFilter::Address(address) => {
                self.accounts.get(address).map(|a| a.value().clone())
            }
            AccountFilter::PublicKey(public_key) => {
                let address = address_from_public_key(public_key);
                self.accounts.get(&address).map(|a| a.value().clone())
            }
            AccountFilter::Username(name) => self
                .accounts
                .iter()
                .find(|a| a.username.as_deref() == Some(name.as_str()))
                .map(|a| a.value().clone()),
            AccountFilter::UnconfirmedUsername(name) => self
                .accounts
                .iter()
                .find(|a| a.u_username.as_deref() == Some(name.as_str()))
                .map(|a| a.value().clone()),
        }
    }

    /// Fetch by address, creating a zero-balance account when absent.
    pub fn get_or_create(&self, address: Address) -> Account {
        self.accounts
            .entry(address)
            .or_insert_with(|| Account::new(address))
            .value()
            .clone()
    }

    pub fn exists(&self, address: &Address) -> bool {
        self.accounts.contains_key(address)
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    /// Overwrite scalar attributes on an account, creating it when absent.
    ///
    /// Only the set-if-present fields of the patch are honored here; balance
    /// deltas and collection diffs move exclusively through `merge`.
    pub fn set(&self, address: Address, patch: AccountPatch) {
        let mut entry = self
            .accounts
            .entry(address)
            .or_insert_with(|| Account::new(address));
        Self::apply_scalars(&mut entry, &patch);
    }

    /// Apply a patch atomically and return the mutation that actually took
    /// effect, suitable for persisting an exact undo record.
    pub fn merge(&self, address: Address, patch: AccountPatch) -> AppliedDiff {
        let mut entry = self
            .accounts
            .entry(address)
            .or_insert_with(|| Account::new(address));

        let mut applied = AppliedDiff {
            balance: patch.balance,
            u_balance: patch.u_balance,
            ..Default::default()
        };

        entry.balance += patch.balance;
        entry.u_balance += patch.u_balance;

        if let Some(entries) = &patch.delegates {
            applied.delegates = diff::apply_effective(&mut entry.delegates, entries);
        }
        if let Some(entries) = &patch.u_delegates {
            applied.u_delegates = diff::apply_effective(&mut entry.u_delegates, entries);
        }

        Self::apply_scalars(&mut entry, &patch);

        debug!(
            address = %address,
            balance = entry.balance,
            u_balance = entry.u_balance,
            "merged account patch"
        );

        applied
    }

    fn apply_scalars(account: &mut Account, patch: &AccountPatch) {
        if let Some(public_key) = patch.public_key {
            account.public_key = Some(public_key);
        }
        if let Some(flag) = patch.second_signature {
            account.second_signature = flag;
        }
        if let Some(flag) = patch.u_second_signature {
            account.u_second_signature = flag;
        }
        if let Some(key) = &patch.second_public_key {
            account.second_public_key = *key;
        }
        if let Some(keys) = &patch.multisignatures {
            account.multisignatures = keys.clone();
        }
        if let Some(min) = patch.multi_min {
            account.multi_min = min;
        }
        if let Some(name) = &patch.username {
            account.username = name.clone();
        }
        if let Some(name) = &patch.u_username {
            account.u_username = name.clone();
        }
    }
}
