//! Consistent snapshots of the ledger and the number book.
//!
//! A snapshot is taken with every account and every shard locked, so it
//! never shows a reservation without its lease or vice versa. It carries a
//! SHA-256 digest over its canonical content; restoring refuses a snapshot
//! whose digest does not match.
//!
//! The reservation audit checks, per account:
//! ```text
//! reserved == Σ reserved_amount(active leases owned by the account)
//! ```
//! and that no balance went negative.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use numlease_types::{
    AccountBalance, AccountId, BlacklistEntry, Lease, LeaseError, LeaseStatus, Result,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{info, warn};

use crate::{Ledger, NumberBook};

/// One account's balance inside a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountRecord {
    pub account: AccountId,
    pub balance: AccountBalance,
}

/// A point-in-time copy of all mutable state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub taken_at: DateTime<Utc>,
    /// Sorted by account id.
    pub accounts: Vec<AccountRecord>,
    /// Sorted by phone.
    pub leases: Vec<Lease>,
    /// Sorted by phone, then project.
    pub blacklist: Vec<BlacklistEntry>,
    /// Hex SHA-256 over everything above.
    pub digest: String,
}

impl Snapshot {
    /// Capture the current state.
    ///
    /// Blocks every lease operation for as long as the copy takes.
    pub fn capture(ledger: &Ledger, book: &NumberBook) -> Result<Self> {
        let (accounts, leases, blacklist) = ledger.with_all_accounts(|balances| {
            let (leases, blacklist) = book.export()?;
            Ok((balances, leases, blacklist))
        })?;
        let mut snapshot = Self {
            taken_at: Utc::now(),
            accounts: accounts
                .into_iter()
                .map(|(account, balance)| AccountRecord { account, balance })
                .collect(),
            leases,
            blacklist,
            digest: String::new(),
        };
        snapshot.digest = hex::encode(snapshot.compute_digest());
        info!(
            accounts = snapshot.accounts.len(),
            leases = snapshot.leases.len(),
            blacklist = snapshot.blacklist.len(),
            digest = %snapshot.digest,
            "Snapshot captured"
        );
        Ok(snapshot)
    }

    /// Check the stored digest against the content.
    ///
    /// # Errors
    /// Returns `SnapshotCorrupt` on mismatch.
    pub fn verify(&self) -> Result<()> {
        let expected = hex::encode(self.compute_digest());
        if expected != self.digest {
            return Err(LeaseError::SnapshotCorrupt(format!(
                "digest mismatch: stored {}, computed {expected}",
                self.digest
            )));
        }
        Ok(())
    }

    /// Rebuild a ledger and a number book with `shards` shards.
    pub fn restore(&self, shards: usize) -> Result<(Ledger, NumberBook)> {
        self.verify()?;
        let ledger = Ledger::from_balances(
            self.accounts
                .iter()
                .map(|r| (r.account, r.balance.clone())),
        );
        let book = NumberBook::from_records(shards, self.leases.clone(), self.blacklist.clone());
        info!(
            accounts = self.accounts.len(),
            leases = self.leases.len(),
            "Snapshot restored"
        );
        Ok((ledger, book))
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| LeaseError::Internal(format!("snapshot serialization failed: {e}")))
    }

    /// Parse and verify a snapshot document.
    pub fn from_json(json: &str) -> Result<Self> {
        let snapshot: Self = serde_json::from_str(json)
            .map_err(|e| LeaseError::SnapshotCorrupt(format!("unreadable snapshot: {e}")))?;
        snapshot.verify()?;
        Ok(snapshot)
    }

    /// Check the reservation invariant for every account.
    ///
    /// # Errors
    /// Returns `Internal` describing the first violation found.
    pub fn audit(&self) -> Result<()> {
        let mut held: BTreeMap<AccountId, Decimal> = BTreeMap::new();
        for lease in &self.leases {
            match lease.status {
                LeaseStatus::Active => {
                    let sum = held.entry(lease.owner).or_insert(Decimal::ZERO);
                    *sum = sum.checked_add(lease.reserved_amount).ok_or_else(|| {
                        violation(format!(
                            "account {}: active reservations overflow",
                            lease.owner
                        ))
                    })?;
                }
                LeaseStatus::Consumed if !lease.reserved_amount.is_zero() => {
                    return Err(violation(format!(
                        "consumed lease {} still reserves {}",
                        lease.phone, lease.reserved_amount
                    )));
                }
                LeaseStatus::Consumed => {}
            }
        }

        for record in &self.accounts {
            let balance = &record.balance;
            if balance.available < Decimal::ZERO || balance.reserved < Decimal::ZERO {
                return Err(violation(format!(
                    "account {} has a negative balance: available {}, reserved {}",
                    record.account, balance.available, balance.reserved
                )));
            }
            let expected = held.remove(&record.account).unwrap_or(Decimal::ZERO);
            if balance.reserved != expected {
                return Err(violation(format!(
                    "account {}: reserved {} != active leases {expected}",
                    record.account, balance.reserved
                )));
            }
        }

        // Whatever is left belongs to accounts the ledger never saw.
        if let Some((account, amount)) = held.into_iter().find(|(_, a)| !a.is_zero()) {
            return Err(violation(format!(
                "account {account} holds leases reserving {amount} but has no ledger entry"
            )));
        }
        Ok(())
    }

    /// Sum of available + reserved across all accounts, saturating at
    /// `Decimal::MAX`.
    #[must_use]
    pub fn total_funds(&self) -> Decimal {
        self.accounts
            .iter()
            .fold(Decimal::ZERO, |acc, r| acc.saturating_add(r.balance.total()))
    }

    fn compute_digest(&self) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(b"numlease:snapshot:v1:");
        hasher.update(self.taken_at.timestamp().to_le_bytes());
        hasher.update(self.taken_at.timestamp_subsec_nanos().to_le_bytes());

        hasher.update((self.accounts.len() as u64).to_le_bytes());
        for record in &self.accounts {
            hasher.update(record.account.0.as_bytes());
            hash_field(&mut hasher, &record.balance.available.to_string());
            hash_field(&mut hasher, &record.balance.reserved.to_string());
        }

        hasher.update((self.leases.len() as u64).to_le_bytes());
        for lease in &self.leases {
            hash_field(&mut hasher, lease.phone.as_str());
            hasher.update(lease.owner.0.as_bytes());
            hash_field(&mut hasher, lease.project.as_str());
            hasher.update(match lease.status {
                LeaseStatus::Active => [0u8],
                LeaseStatus::Consumed => [1u8],
            });
            hasher.update([lease.carrier.code(), lease.segment.code()]);
            hash_field(&mut hasher, &lease.reserved_amount.to_string());
            hasher.update(lease.leased_at.timestamp().to_le_bytes());
            hasher.update(lease.leased_at.timestamp_subsec_nanos().to_le_bytes());
            match lease.consumed_at {
                Some(at) => {
                    hasher.update([1u8]);
                    hasher.update(at.timestamp().to_le_bytes());
                    hasher.update(at.timestamp_subsec_nanos().to_le_bytes());
                }
                None => hasher.update([0u8]),
            }
        }

        hasher.update((self.blacklist.len() as u64).to_le_bytes());
        for entry in &self.blacklist {
            hash_field(&mut hasher, entry.phone.as_str());
            hash_field(&mut hasher, entry.project.as_str());
            hasher.update(entry.owner.0.as_bytes());
            hasher.update(entry.created_at.timestamp().to_le_bytes());
            hasher.update(entry.created_at.timestamp_subsec_nanos().to_le_bytes());
        }

        let result = hasher.finalize();
        let mut hash = [0u8; 32];
        hash.copy_from_slice(&result);
        hash
    }
}

// Length-prefixed so that adjacent strings cannot run into each other.
fn hash_field(hasher: &mut Sha256, field: &str) {
    hasher.update((field.len() as u64).to_le_bytes());
    hasher.update(field.as_bytes());
}

fn violation(reason: String) -> LeaseError {
    warn!(%reason, "Reservation audit failed");
    LeaseError::Internal(format!("reservation audit: {reason}"))
}

#[cfg(test)]
mod tests {
    use numlease_types::{Carrier, PhoneNumber, ProjectId, Segment};

    use super::*;

    fn d(cents: i64) -> Decimal {
        Decimal::new(cents, 2)
    }

    /// One account with 1.00 deposited and one active 0.10 lease.
    fn populated() -> (Ledger, NumberBook, AccountId) {
        let ledger = Ledger::new();
        let book = NumberBook::new(4);
        let acct = AccountId::new();
        ledger.deposit(acct, d(100)).unwrap();
        ledger.reserve(acct, d(10)).unwrap();
        let lease = Lease::new(
            PhoneNumber::new("13800000001"),
            acct,
            ProjectId::new("p"),
            Carrier::Mobile,
            Segment::Normal,
            d(10),
        );
        let phone = lease.phone.clone();
        book.with_phone(&phone, |s| {
            s.leases.insert_if_absent(lease);
            s.blacklist.insert(phone.clone(), "q".into(), acct);
        })
        .unwrap();
        (ledger, book, acct)
    }

    #[test]
    fn capture_is_consistent_and_verifies() {
        let (ledger, book, _) = populated();
        let snap = Snapshot::capture(&ledger, &book).unwrap();
        assert_eq!(snap.accounts.len(), 1);
        assert_eq!(snap.leases.len(), 1);
        assert_eq!(snap.blacklist.len(), 1);
        assert_eq!(snap.digest.len(), 64);
        assert!(snap.verify().is_ok());
        assert!(snap.audit().is_ok());
        assert_eq!(snap.total_funds(), d(100));
    }

    #[test]
    fn json_restore_reproduces_state() {
        let (ledger, book, acct) = populated();
        let snap = Snapshot::capture(&ledger, &book).unwrap();
        let json = snap.to_json().unwrap();

        let parsed = Snapshot::from_json(&json).unwrap();
        assert_eq!(parsed, snap);

        let (ledger2, book2) = parsed.restore(16).unwrap();
        assert_eq!(ledger2.balance(acct).unwrap(), ledger.balance(acct).unwrap());
        assert_eq!(book2.export().unwrap(), book.export().unwrap());

        let again = Snapshot::capture(&ledger2, &book2).unwrap();
        assert_eq!(again.accounts, snap.accounts);
        assert_eq!(again.leases, snap.leases);
    }

    #[test]
    fn tampered_content_rejected() {
        let (ledger, book, _) = populated();
        let mut snap = Snapshot::capture(&ledger, &book).unwrap();
        snap.accounts[0].balance.available = d(100_000);
        let err = snap.verify().unwrap_err();
        assert!(matches!(err, LeaseError::SnapshotCorrupt(_)));
        assert!(snap.restore(4).is_err());
    }

    #[test]
    fn tampered_json_rejected() {
        let (ledger, book, _) = populated();
        let snap = Snapshot::capture(&ledger, &book).unwrap();
        let json = snap.to_json().unwrap().replace("13800000001", "13800000002");
        assert!(matches!(
            Snapshot::from_json(&json),
            Err(LeaseError::SnapshotCorrupt(_))
        ));
        assert!(matches!(
            Snapshot::from_json("{ nope"),
            Err(LeaseError::SnapshotCorrupt(_))
        ));
    }

    #[test]
    fn audit_catches_reservation_drift() {
        let (ledger, book, acct) = populated();
        // Reservation without a lease behind it.
        ledger.reserve(acct, d(5)).unwrap();
        let snap = Snapshot::capture(&ledger, &book).unwrap();
        let err = snap.audit().unwrap_err();
        assert!(format!("{err}").contains("reservation audit"));
    }

    #[test]
    fn audit_catches_orphan_lease() {
        let ledger = Ledger::new();
        let book = NumberBook::new(2);
        let lease = Lease::new(
            PhoneNumber::new("13800000001"),
            AccountId::new(),
            ProjectId::new("p"),
            Carrier::Mobile,
            Segment::Normal,
            d(10),
        );
        let phone = lease.phone.clone();
        book.with_phone(&phone, |s| s.leases.insert_if_absent(lease))
            .unwrap();
        let snap = Snapshot::capture(&ledger, &book).unwrap();
        assert!(snap.audit().is_err());
    }

    #[test]
    fn consumed_leases_hold_nothing() {
        let (ledger, book, acct) = populated();
        let phone = PhoneNumber::new("13800000001");
        ledger
            .with_account(acct, |handle| {
                let captured = book
                    .with_phone(&phone, |s| s.leases.update_status(&phone, LeaseStatus::Consumed))??;
                handle.capture(captured);
                Ok(())
            })
            .unwrap();
        let snap = Snapshot::capture(&ledger, &book).unwrap();
        assert!(snap.audit().is_ok());
        assert_eq!(snap.total_funds(), d(90));
    }
}
