//! Phone number → lease record, unique per phone.
//!
//! The store itself is not synchronized; it lives inside a
//! [`NumberBook`](crate::NumberBook) shard and is only touched under that
//! shard's lock.

use std::collections::HashMap;

use numlease_types::{AccountId, Lease, LeaseError, LeaseStatus, PhoneNumber, ProjectId, Result};
use rust_decimal::Decimal;

/// Result of [`LeaseStore::insert_if_absent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    /// An active lease already holds the phone. Nothing was written.
    Conflict,
}

#[derive(Debug, Default, Clone)]
pub struct LeaseStore {
    leases: HashMap<PhoneNumber, Lease>,
}

impl LeaseStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `lease` unless an active lease exists for its phone.
    ///
    /// A consumed record for the same phone is history and gets replaced.
    pub fn insert_if_absent(&mut self, lease: Lease) -> InsertOutcome {
        if self.leases.get(&lease.phone).is_some_and(Lease::is_active) {
            return InsertOutcome::Conflict;
        }
        self.leases.insert(lease.phone.clone(), lease);
        InsertOutcome::Inserted
    }

    #[must_use]
    pub fn find(&self, phone: &PhoneNumber) -> Option<&Lease> {
        self.leases.get(phone)
    }

    /// Phones of the active leases `account` holds under `project`.
    #[must_use]
    pub fn find_by_owner_and_project(
        &self,
        account: AccountId,
        project: &ProjectId,
    ) -> Vec<PhoneNumber> {
        let mut phones: Vec<PhoneNumber> = self
            .leases
            .values()
            .filter(|l| l.is_active() && l.is_owned_by(account) && &l.project == project)
            .map(|l| l.phone.clone())
            .collect();
        phones.sort_unstable();
        phones
    }

    /// Move the lease on `phone` to `status`, returning the captured amount.
    ///
    /// # Errors
    /// - `NotFoundOrNotOwned` if there is no record for `phone`
    /// - `InvalidTransition` if the state machine forbids the move
    pub fn update_status(&mut self, phone: &PhoneNumber, status: LeaseStatus) -> Result<Decimal> {
        self.leases
            .get_mut(phone)
            .ok_or_else(|| LeaseError::NotFoundOrNotOwned(phone.clone()))?
            .transition(status)
    }

    /// Delete the record for `phone`, returning it.
    pub fn remove(&mut self, phone: &PhoneNumber) -> Option<Lease> {
        self.leases.remove(phone)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.leases.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.leases.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Lease> {
        self.leases.values()
    }
}
