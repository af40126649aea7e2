//! Error types for the numlease workspace.
//!
//! All errors use the `NL_ERR_` prefix convention for easy grepping in logs.
//! Error codes are grouped by subsystem:
//! - 1xx: Session / admission-time request errors
//! - 2xx: Project and ledger errors
//! - 3xx: Phone number format and filter errors
//! - 4xx: Lease errors
//! - 5xx: Blacklist errors
//! - 8xx: Load shedding
//! - 9xx: Store / general / internal errors
//!
//! Every kind also maps to an integer outcome code and an HTTP-style status
//! suggestion so the transport layer never has to inspect messages.

use std::fmt;
use std::sync::PoisonError;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{LeaseStatus, PhoneNumber, ProjectId, constants};

/// Why a credential could not be resolved to an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CredentialFailure {
    /// Unknown or malformed credential.
    Invalid,
    /// The credential was valid once but its lifetime has passed.
    Expired,
}

impl fmt::Display for CredentialFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Invalid => write!(f, "invalid credential"),
            Self::Expired => write!(f, "credential expired"),
        }
    }
}

/// Which of the two number filters an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FilterKind {
    Carrier,
    Segment,
}

impl fmt::Display for FilterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Carrier => write!(f, "carrier"),
            Self::Segment => write!(f, "segment"),
        }
    }
}

/// Central error enum for all numlease operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LeaseError {
    // =================================================================
    // Session / request errors (1xx)
    // =================================================================
    /// The session collaborator rejected the credential.
    #[error("NL_ERR_100: Credential rejected: {reason}")]
    CredentialInvalid { reason: CredentialFailure },

    /// Too many calls from one account within the sliding window.
    #[error("NL_ERR_101: Rate limit exceeded: {calls} calls in {window_ms}ms window")]
    RateLimited { calls: usize, window_ms: u64 },

    // =================================================================
    // Project / ledger errors (2xx)
    // =================================================================
    /// The project id is not in the catalog.
    #[error("NL_ERR_200: Unknown project: {0}")]
    UnknownProject(ProjectId),

    /// Not enough free balance to reserve the unit price.
    #[error("NL_ERR_201: Insufficient balance: need {needed}, have {available}")]
    InsufficientBalance { needed: Decimal, available: Decimal },

    /// A funding amount that is zero or negative.
    #[error("NL_ERR_202: Invalid amount: {0}")]
    InvalidAmount(Decimal),

    // =================================================================
    // Phone number errors (3xx)
    // =================================================================
    /// Wrong length, non-digit characters, or an unrecognized prefix.
    #[error("NL_ERR_300: Invalid phone number format: {0}")]
    InvalidPhoneFormat(PhoneNumber),

    /// A filter code outside the published range.
    #[error("NL_ERR_301: Unknown {kind} filter code: {code}")]
    InvalidFilter { kind: FilterKind, code: u8 },

    /// The caller-specified number does not belong to the requested class.
    #[error("NL_ERR_302: Phone {phone} does not match the requested {kind}")]
    FilterMismatch { phone: PhoneNumber, kind: FilterKind },

    // =================================================================
    // Lease errors (4xx)
    // =================================================================
    /// Another account already holds an active lease on this number.
    #[error("NL_ERR_400: Phone already leased: {0}")]
    AlreadyLeased(PhoneNumber),

    /// Every candidate draw was blacklisted or already leased.
    #[error("NL_ERR_401: No available number after {attempts} attempts")]
    NoAvailableNumber { attempts: usize },

    /// No active lease for this phone belongs to the caller.
    #[error("NL_ERR_402: Lease not found or not owned by caller: {0}")]
    NotFoundOrNotOwned(PhoneNumber),

    /// The lease exists and is owned by the caller, but under another project.
    #[error("NL_ERR_403: Lease {phone} belongs to project {actual}, not {requested}")]
    ProjectMismatch {
        phone: PhoneNumber,
        requested: ProjectId,
        actual: ProjectId,
    },

    /// A lease status change that the state machine forbids.
    #[error("NL_ERR_404: Invalid lease transition for {phone}: {from} -> {to}")]
    InvalidTransition {
        phone: PhoneNumber,
        from: LeaseStatus,
        to: LeaseStatus,
    },

    // =================================================================
    // Blacklist errors (5xx)
    // =================================================================
    /// The (phone, project) pair is already excluded.
    #[error("NL_ERR_500: Phone {phone} already blacklisted for project {project}")]
    AlreadyBlacklisted {
        phone: PhoneNumber,
        project: ProjectId,
    },

    // =================================================================
    // Load shedding (8xx)
    // =================================================================
    /// The admission gate had no free permit.
    #[error("NL_ERR_800: Server busy: all {capacity} admission permits in use")]
    Busy { capacity: usize },

    // =================================================================
    // Store / general / internal (9xx)
    // =================================================================
    /// Transient infrastructure failure. The only kind worth retrying.
    #[error("NL_ERR_900: Store unavailable: {0}")]
    StoreUnavailable(String),

    /// A persisted snapshot failed to parse or its digest did not verify.
    #[error("NL_ERR_901: Snapshot corrupt: {0}")]
    SnapshotCorrupt(String),

    /// Invalid configuration file or values.
    #[error("NL_ERR_902: Configuration error: {0}")]
    Configuration(String),

    /// Unrecoverable internal error (broken invariant, panicked worker).
    #[error("NL_ERR_903: Internal error: {0}")]
    Internal(String),
}

impl LeaseError {
    /// Integer outcome code reported to clients alongside the message.
    #[must_use]
    pub fn outcome_code(&self) -> i32 {
        match self {
            Self::InsufficientBalance { .. } => constants::OUTCOME_INSUFFICIENT_BALANCE,
            Self::NoAvailableNumber { .. } => constants::OUTCOME_NO_AVAILABLE_NUMBER,
            _ => constants::OUTCOME_FAILURE,
        }
    }

    /// HTTP-style status suggestion for the transport layer.
    ///
    /// Business refusals that are part of the normal flow (no balance,
    /// number taken, pool exhausted) are reported with 200 and a negative
    /// outcome code, matching what existing clients expect.
    #[must_use]
    pub fn http_status(&self) -> u16 {
        match self {
            Self::InsufficientBalance { .. }
            | Self::AlreadyLeased(_)
            | Self::NoAvailableNumber { .. } => 200,
            Self::InvalidAmount(_)
            | Self::InvalidPhoneFormat(_)
            | Self::InvalidFilter { .. }
            | Self::FilterMismatch { .. }
            | Self::ProjectMismatch { .. } => 400,
            Self::CredentialInvalid { .. } => 401,
            Self::UnknownProject(_) | Self::NotFoundOrNotOwned(_) => 404,
            Self::AlreadyBlacklisted { .. } | Self::InvalidTransition { .. } => 409,
            Self::RateLimited { .. } => 429,
            Self::Busy { .. } | Self::StoreUnavailable(_) => 503,
            Self::SnapshotCorrupt(_) | Self::Configuration(_) | Self::Internal(_) => 500,
        }
    }

    /// Whether a caller may retry the same request unchanged.
    ///
    /// Only a store outage qualifies. `Busy` is load shedding and is
    /// reported as 503 without inviting an immediate retry; everything else
    /// is a deterministic outcome of the input.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::StoreUnavailable(_))
    }
}

/// Crate-wide `Result` alias.
pub type Result<T> = std::result::Result<T, LeaseError>;

// A panic while a store lock was held leaves the lock poisoned. The data
// behind it can no longer be trusted, so callers see a store outage.
impl<T> From<PoisonError<T>> for LeaseError {
    fn from(err: PoisonError<T>) -> Self {
        Self::StoreUnavailable(format!("lock poisoned: {err}"))
    }
}
