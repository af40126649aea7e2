//! # numlease-phone
//!
//! Pure, stateless phone-number rules.
//!
//! - [`PrefixTable`]: which prefixes belong to which carrier and segment
//! - [`CandidateGenerator`]: random candidate numbers matching filters,
//!   behind the [`CandidateSource`] trait
//! - [`PhoneValidator`]: format checks and classification of caller-supplied
//!   numbers
//!
//! Nothing here touches shared state, so none of it needs synchronization.

pub mod generator;
pub mod prefix;
pub mod validator;

#[cfg(any(test, feature = "test-helpers"))]
pub use generator::FixedCandidates;
pub use generator::{CandidateGenerator, CandidateSource};
pub use prefix::PrefixTable;
pub use validator::{Classification, PhoneValidator};
