//! Configuration types for EMBERNET

use crate::types::FIXED_POINT;
use serde::{Deserialize, Serialize};

/// CINDER module configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CinderConfig {
    /// Transfer fee in parts-per-million of the amount (1000 = 0.1%).
    pub transfer_fee_ppm: u32,

    /// Flat fee for vote, username, and second-signature transactions,
    /// in sub-units.
    pub fixed_fee: i64,

    /// Maximum seconds a transaction timestamp may run ahead of local time.
    pub timestamp_tolerance: i64,

    /// Maximum delegate diff entries in one vote transaction.
    pub max_votes: usize,

    /// Username length bounds, inclusive.
    pub username_min_len: usize,
    pub username_max_len: usize,
}

impl Default for CinderConfig {
    fn default() -> Self {
        Self {
            transfer_fee_ppm: 1000,
            fixed_fee: FIXED_POINT,
            timestamp_tolerance: 15,
            max_votes: 33,
            username_min_len: 1,
            username_max_len: 20,
        }
    }
}
