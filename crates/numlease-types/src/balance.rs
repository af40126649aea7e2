//! Account balance types for the reservation model.
//!
//! Every account has an `available` balance (usable for new leases) and a
//! `reserved` balance (held by its active leases).

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A single account's balance.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AccountBalance {
    /// Free balance. This is what clients see as "balance".
    pub available: Decimal,
    /// Sum of the reserved amounts of the account's active leases.
    pub reserved: Decimal,
}

impl AccountBalance {
    /// Create a zero balance.
    #[must_use]
    pub fn new() -> Self {
        Self {
            available: Decimal::ZERO,
            reserved: Decimal::ZERO,
        }
    }

    /// Create a balance with `available` funds and nothing reserved.
    #[must_use]
    pub fn funded(available: Decimal) -> Self {
        Self {
            available,
            reserved: Decimal::ZERO,
        }
    }

    /// Total funds still owned by the account (available + reserved).
    ///
    /// Only consumption makes this go down. Saturates at `Decimal::MAX`;
    /// the ledger never lets a live account get there.
    #[must_use]
    pub fn total(&self) -> Decimal {
        self.available.saturating_add(self.reserved)
    }

    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.available.is_zero() && self.reserved.is_zero()
    }
}

impl Default for AccountBalance {
    fn default() -> Self {
        Self::new()
    }
}
