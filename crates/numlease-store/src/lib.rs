//! # numlease-store
//!
//! All mutable state of the lease subsystem:
//!
//! - [`Ledger`]: per-account balances, locked per account
//! - [`NumberBook`]: [`LeaseStore`] + [`BlacklistStore`], locked per shard
//! - [`Snapshot`]: consistent, digest-protected copies of both
//!
//! Lock order is always account → shard.

pub mod blacklist;
pub mod book;
pub mod lease_store;
pub mod ledger;
pub mod snapshot;

pub use blacklist::{BlacklistInsert, BlacklistStore};
pub use book::{NumberBook, Shard};
pub use lease_store::{InsertOutcome, LeaseStore};
pub use ledger::{AccountHandle, Ledger};
pub use snapshot::{AccountRecord, Snapshot};
