//! System-wide constants and policy defaults.

/// Digits in a mainland mobile number.
pub const PHONE_LENGTH: usize = 11;

/// Digits that identify the carrier and segment.
pub const PREFIX_LENGTH: usize = 3;

/// Independent candidate draws before random allocation gives up.
pub const DEFAULT_MAX_RANDOM_ATTEMPTS: usize = 3;

/// Probability that polling an active lease yields a code.
pub const DEFAULT_DELIVERY_PROBABILITY: f64 = 0.7;

/// Digits in a delivered verification code.
pub const DEFAULT_CODE_LENGTH: usize = 6;

/// Message body for a delivered code. `{code}` is substituted.
pub const DEFAULT_SMS_TEMPLATE: &str =
    "Your verification code is {code}. If this was not you, do not share it with anyone.";

/// Concurrent lease operations admitted before shedding load.
pub const DEFAULT_ADMISSION_PERMITS: usize = 50;

/// Lock shards in the number book.
pub const DEFAULT_STORE_SHARDS: usize = 64;

/// Calls per account allowed within the rate-limit window.
pub const DEFAULT_RATE_LIMIT_CALLS: usize = 100;

/// Rate-limit window in milliseconds.
pub const DEFAULT_RATE_LIMIT_WINDOW_MS: u64 = 60_000;

/// Session lifetime in seconds (30 days).
pub const DEFAULT_SESSION_TTL_SECS: i64 = 30 * 24 * 60 * 60;

/// Length of issued session tokens.
pub const SESSION_TOKEN_LENGTH: usize = 32;

/// Outcome code of a successful operation.
pub const OUTCOME_OK: i32 = 1;

/// Outcome code of a generic failure.
pub const OUTCOME_FAILURE: i32 = -1;

/// Outcome code when the free balance cannot cover the unit price.
pub const OUTCOME_INSUFFICIENT_BALANCE: i32 = -2;

/// Outcome code when random allocation exhausted its draws.
pub const OUTCOME_NO_AVAILABLE_NUMBER: i32 = -3;

/// Version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Service name.
pub const SERVICE_NAME: &str = "numlease";
