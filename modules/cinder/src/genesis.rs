//! Genesis configuration for CINDER
//!
//! The genesis transaction is the one place balance floors do not apply:
//! it mints the initial supply out of nothing, so the sender account is
//! allowed to go negative while it is applied.

use embernet_core::{Address, EmberResult, FIXED_POINT};
use serde::{Deserialize, Serialize};

use crate::transaction::Transaction;

/// Genesis allocation entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenesisAllocation {
    pub address: Address,
    pub balance: i64,
}

/// Chain genesis parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenesisConfig {
    /// Chain name.
    pub chain_name: String,
    /// Block ID of the genesis block. Transactions carrying it bypass
    /// balance-floor checks.
    pub block_id: u64,
    /// Genesis timestamp, seconds of logical time.
    pub timestamp: i64,
    /// Initial token allocations.
    pub allocations: Vec<GenesisAllocation>,
}

impl Default for GenesisConfig {
    fn default() -> Self {
        Self {
            chain_name: "EMBERNET Mainnet".to_string(),
            block_id: 1,
            timestamp: 0,
            allocations: vec![],
        }
    }
}

impl GenesisConfig {
    /// Devnet preset.
    pub fn devnet() -> Self {
        Self {
            chain_name: "EMBERNET Devnet".to_string(),
            ..Default::default()
        }
    }

    pub fn add_allocation(mut self, address: Address, balance_cinder: i64) -> Self {
        self.allocations.push(GenesisAllocation {
            address,
            balance: balance_cinder * FIXED_POINT,
        });
        self
    }

    /// Whether a transaction belongs to the genesis block.
    pub fn is_genesis(&self, tx: &Transaction) -> bool {
        tx.block_id == Some(self.block_id)
    }

    pub fn total_supply(&self) -> i64 {
        self.allocations.iter().map(|a| a.balance).sum()
    }

    pub fn to_json(&self) -> EmberResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> EmberResult<Self> {
        Ok(serde_json::from_str(json)?)
    }
}
