//! # Lease: a phone number bound to an account while funds are reserved
//!
//! ## State Machine
//!
//! ```text
//!   (no record) ── allocate ──▶ ┌────────┐  code delivered  ┌──────────┐
//!        ▲                      │ ACTIVE ├─────────────────▶│ CONSUMED │
//!        │                      └───┬────┘                  └──────────┘
//!        └──── release / blacklist ─┘
//!              (record deleted, reservation refunded)
//! ```
//!
//! - **Reserved once**: `reserved_amount` is the project's unit price at the
//!   moment the lease was created and never changes afterwards, except to
//!   drop to zero on consumption.
//! - **Consumed is terminal**: captured funds are spent, never refunded.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{AccountId, Carrier, LeaseError, PhoneNumber, ProjectId, Result, Segment};

/// The lifecycle state of a lease record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LeaseStatus {
    /// Number is held and the unit price is reserved.
    Active,
    /// A code was delivered and the reservation captured. **Irreversible.**
    Consumed,
}

impl LeaseStatus {
    /// Can a lease in this state move to `target`?
    #[must_use]
    pub fn can_transition_to(&self, target: Self) -> bool {
        matches!((self, target), (Self::Active, Self::Consumed))
    }
}

impl std::fmt::Display for LeaseStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Active => write!(f, "ACTIVE"),
            Self::Consumed => write!(f, "CONSUMED"),
        }
    }
}

/// A lease record. Keyed by `phone` in the lease store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lease {
    pub phone: PhoneNumber,
    /// The account that paid the reservation.
    pub owner: AccountId,
    pub project: ProjectId,
    pub status: LeaseStatus,
    /// Detected carrier class of `phone`.
    pub carrier: Carrier,
    /// Detected segment class of `phone`.
    pub segment: Segment,
    /// Funds moved out of the owner's free balance for this lease.
    pub reserved_amount: Decimal,
    pub leased_at: DateTime<Utc>,
    pub consumed_at: Option<DateTime<Utc>>,
}

impl Lease {
    /// Create a new ACTIVE lease reserving `reserved_amount`.
    #[must_use]
    pub fn new(
        phone: PhoneNumber,
        owner: AccountId,
        project: ProjectId,
        carrier: Carrier,
        segment: Segment,
        reserved_amount: Decimal,
    ) -> Self {
        Self {
            phone,
            owner,
            project,
            status: LeaseStatus::Active,
            carrier,
            segment,
            reserved_amount,
            leased_at: Utc::now(),
            consumed_at: None,
        }
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status == LeaseStatus::Active
    }

    #[must_use]
    pub fn is_owned_by(&self, account: AccountId) -> bool {
        self.owner == account
    }

    /// Transition to `target`, returning the amount captured by the move.
    ///
    /// Consuming zeroes the reservation; the returned amount is what the
    /// owner has now spent.
    ///
    /// # Errors
    /// Returns `InvalidTransition` if the state machine forbids the move.
    pub fn transition(&mut self, target: LeaseStatus) -> Result<Decimal> {
        if !self.status.can_transition_to(target) {
            return Err(LeaseError::InvalidTransition {
                phone: self.phone.clone(),
                from: self.status,
                to: target,
            });
        }
        self.status = target;
        let captured = self.reserved_amount;
        self.reserved_amount = Decimal::ZERO;
        self.consumed_at = Some(Utc::now());
        Ok(captured)
    }
}

/// A permanent exclusion of a phone number from random allocation within
/// one project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlacklistEntry {
    pub phone: PhoneNumber,
    pub project: ProjectId,
    /// Who asked for the exclusion. Kept for the record only.
    pub owner: AccountId,
    pub created_at: DateTime<Utc>,
}

impl BlacklistEntry {
    #[must_use]
    pub fn new(phone: PhoneNumber, project: ProjectId, owner: AccountId) -> Self {
        Self {
            phone,
            project,
            owner,
            created_at: Utc::now(),
        }
    }
}
