//! The number book: lease and blacklist tables, sharded by phone number.
//!
//! A phone always maps to the same shard, and one shard lock guards both
//! tables for every phone it owns. Holding the lock of `phone`'s shard
//! therefore gives a consistent view of that phone's lease and exclusions.
//!
//! Lock order across the workspace is account → shard. Code holding a
//! shard lock must never take an account lock.

use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::{Mutex, MutexGuard};

use numlease_types::{AccountId, BlacklistEntry, Lease, PhoneNumber, ProjectId, Result};

use crate::{BlacklistStore, LeaseStore};

/// The lease and blacklist tables for one slice of the number space.
#[derive(Debug, Default)]
pub struct Shard {
    pub leases: LeaseStore,
    pub blacklist: BlacklistStore,
}

#[derive(Debug)]
pub struct NumberBook {
    shards: Vec<Mutex<Shard>>,
}

impl NumberBook {
    /// Create a book with `shards` lock shards (at least one).
    #[must_use]
    pub fn new(shards: usize) -> Self {
        Self {
            shards: (0..shards.max(1)).map(|_| Mutex::default()).collect(),
        }
    }

    /// Rebuild a book from exported records.
    #[must_use]
    pub fn from_records(
        shards: usize,
        leases: impl IntoIterator<Item = Lease>,
        blacklist: impl IntoIterator<Item = BlacklistEntry>,
    ) -> Self {
        let mut book = Self::new(shards);
        for lease in leases {
            let idx = book.shard_index(&lease.phone);
            if let Ok(shard) = book.shards[idx].get_mut() {
                shard.leases.insert_if_absent(lease);
            }
        }
        for entry in blacklist {
            let idx = book.shard_index(&entry.phone);
            if let Ok(shard) = book.shards[idx].get_mut() {
                shard.blacklist.restore(entry);
            }
        }
        book
    }

    #[must_use]
    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    /// Run `f` with `phone`'s shard locked.
    pub fn with_phone<T>(&self, phone: &PhoneNumber, f: impl FnOnce(&mut Shard) -> T) -> Result<T> {
        let mut shard = self.shards[self.shard_index(phone)].lock()?;
        Ok(f(&mut shard))
    }

    /// Copy of the lease record for `phone`, in any state.
    pub fn find(&self, phone: &PhoneNumber) -> Result<Option<Lease>> {
        self.with_phone(phone, |shard| shard.leases.find(phone).cloned())
    }

    /// Whether `phone` is excluded within `project`.
    pub fn is_blacklisted(&self, phone: &PhoneNumber, project: &ProjectId) -> Result<bool> {
        self.with_phone(phone, |shard| shard.blacklist.contains(phone, project))
    }

    /// Active leases `account` holds under `project`, sorted by phone.
    ///
    /// Shards are visited one at a time, so the result is not a snapshot
    /// if other accounts are writing concurrently. It is exact for
    /// `account` when called under that account's ledger lock.
    pub fn find_by_owner_and_project(
        &self,
        account: AccountId,
        project: &ProjectId,
    ) -> Result<Vec<Lease>> {
        let mut found = Vec::new();
        for shard in &self.shards {
            let shard = shard.lock()?;
            for phone in shard.leases.find_by_owner_and_project(account, project) {
                if let Some(lease) = shard.leases.find(&phone) {
                    found.push(lease.clone());
                }
            }
        }
        found.sort_unstable_by(|a, b| a.phone.cmp(&b.phone));
        Ok(found)
    }

    /// Every record, with all shards locked at once (in index order).
    pub fn export(&self) -> Result<(Vec<Lease>, Vec<BlacklistEntry>)> {
        let guards: Vec<MutexGuard<'_, Shard>> = self
            .shards
            .iter()
            .map(Mutex::lock)
            .collect::<std::result::Result<_, _>>()?;
        let mut leases: Vec<Lease> = guards
            .iter()
            .flat_map(|s| s.leases.iter().cloned())
            .collect();
        let mut blacklist: Vec<BlacklistEntry> = guards
            .iter()
            .flat_map(|s| s.blacklist.iter().cloned())
            .collect();
        drop(guards);
        leases.sort_unstable_by(|a, b| a.phone.cmp(&b.phone));
        blacklist.sort_unstable_by(|a, b| {
            a.phone.cmp(&b.phone).then_with(|| a.project.cmp(&b.project))
        });
        Ok((leases, blacklist))
    }

    fn shard_index(&self, phone: &PhoneNumber) -> usize {
        let mut hasher = DefaultHasher::new();
        phone.hash(&mut hasher);
        // Truncation is fine: only the low bits pick the shard.
        #[allow(clippy::cast_possible_truncation)]
        let h = hasher.finish() as usize;
        h % self.shards.len()
    }
}

impl Default for NumberBook {
    fn default() -> Self {
        Self::new(numlease_types::constants::DEFAULT_STORE_SHARDS)
    }
}
