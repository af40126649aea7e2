//! # numlease-core
//!
//! The lease-and-reservation subsystem.
//!
//! - [`LeaseManager`]: allocation (random or specified), consumption,
//!   release and blacklisting, each one atomic unit over the ledger and the
//!   number book
//! - [`ProjectCatalog`] / [`InMemoryCatalog`]: project prices
//! - [`CodeDelivery`] / [`SimulatedDelivery`]: verification codes
//!
//! ## Number lifecycle
//!
//! ```text
//!   UNLEASED ──allocate──▶ ACTIVE ──code delivered──▶ CONSUMED
//!      ▲                     │
//!      └─release / blacklist─┘
//! ```
//!
//! ## Invariants
//!
//! 1. At most one active lease per phone number.
//! 2. `available + reserved` of an account only drops on consumption.
//! 3. Random allocation never returns a number blacklisted for the project.
//! 4. Specified allocation may take a blacklisted number and lifts the entry.
//! 5. A lease reserves the unit price current at creation, once.

pub mod catalog;
pub mod delivery;
pub mod manager;

pub use catalog::{InMemoryCatalog, ProjectCatalog};
#[cfg(any(test, feature = "test-helpers"))]
pub use delivery::FixedDelivery;
pub use delivery::{CodeDelivery, SimulatedDelivery, SmsMessage};
pub use manager::{Allocation, Delivery, LeaseManager};
