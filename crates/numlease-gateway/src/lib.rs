//! # numlease-gateway
//!
//! The async front door of the lease subsystem.
//!
//! - [`LeaseService`]: one async method per client operation, each returning
//!   an [`Outcome`] envelope
//! - [`SessionResolver`] / [`SessionTable`]: bearer token → account
//! - [`RateLimiter`]: per-account sliding window
//! - [`AdmissionGate`]: bounded concurrency, rejects with `Busy` when full
//! - [`telemetry`]: tracing subscriber setup

pub mod gate;
pub mod outcome;
pub mod rate_limit;
pub mod service;
pub mod session;
pub mod telemetry;

pub use gate::{Admission, AdmissionGate};
pub use outcome::Outcome;
pub use rate_limit::RateLimiter;
pub use service::LeaseService;
pub use session::{SessionResolver, SessionTable};
