//! # numlease-types
//!
//! Shared types, errors, and configuration for **numlease**.
//!
//! This crate is the leaf dependency of the workspace: every other crate
//! depends on it. It defines:
//!
//! - **Identifiers**: [`AccountId`], [`ProjectId`], [`PhoneNumber`]
//! - **Number classes**: [`Carrier`], [`Segment`], [`CarrierFilter`], [`SegmentFilter`]
//! - **Lease model**: [`Lease`], [`LeaseStatus`], [`BlacklistEntry`]
//! - **Balance model**: [`AccountBalance`]
//! - **Catalog model**: [`Project`]
//! - **Configuration**: [`LeaseConfig`], [`RateLimitConfig`]
//! - **Errors**: [`LeaseError`] with `NL_ERR_` prefix codes
//! - **Constants**: policy defaults and outcome codes

pub mod balance;
pub mod classes;
pub mod config;
pub mod constants;
pub mod error;
pub mod ids;
pub mod lease;
pub mod project;

pub use balance::*;
pub use classes::*;
pub use config::*;
pub use error::*;
pub use ids::*;
pub use lease::*;
pub use project::*;

// Constants are accessed via `numlease_types::constants::FOO`
// (not re-exported to avoid name collisions).
