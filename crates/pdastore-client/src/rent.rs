//! Rent schedule and the informational rent echo reported after writes.
//!
//! The storage program reconciles the data account's balance to
//! `minimum_balance(new_len)` in the same transaction as the write: growth is
//! charged to the authority, shrinkage is refunded to it. The client only
//! predicts that delta; the program is authoritative.

use serde::{Deserialize, Serialize};

/// Cost model for rent-exempt balances. Network parameters, so injectable.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RentSchedule {
    pub lamports_per_byte_year: u64,
    pub exemption_threshold: f64,
    /// Per-account metadata bytes charged on top of the payload.
    pub account_storage_overhead: u64,
}

impl Default for RentSchedule {
    fn default() -> Self {
        Self {
            lamports_per_byte_year: 3480,
            exemption_threshold: 2.0,
            account_storage_overhead: 128,
        }
    }
}

impl RentSchedule {
    /// Lamports an account holding `data_len` bytes needs to be rent exempt.
    pub fn minimum_balance(&self, data_len: usize) -> u64 {
        let bytes = self.account_storage_overhead.saturating_add(data_len as u64);
        ((bytes.saturating_mul(self.lamports_per_byte_year)) as f64 * self.exemption_threshold) as u64
    }

    pub fn echo(&self, size_before: Option<usize>, size_after: usize) -> RentEcho {
        let before = size_before.map_or(0, |len| self.minimum_balance(len)) as i128;
        let after = self.minimum_balance(size_after) as i128;
        RentEcho {
            size_before,
            size_after,
            expected_delta: after - before,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RentDirection {
    Charge,
    Refund,
    Unchanged,
}

/// Expected rent movement for a resize. Positive deltas are charged to the
/// authority, negative deltas refunded to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RentEcho {
    /// `None` when the account did not exist before the write.
    pub size_before: Option<usize>,
    pub size_after: usize,
    pub expected_delta: i128,
}

impl RentEcho {
    pub fn direction(&self) -> RentDirection {
        match self.expected_delta {
            d if d > 0 => RentDirection::Charge,
            d if d < 0 => RentDirection::Refund,
            _ => RentDirection::Unchanged,
        }
    }
}
