//! Transport-neutral result envelope.

use numlease_types::{LeaseError, Result, constants};
use serde::{Deserialize, Serialize};

/// What a transport sends back for one operation.
///
/// Serializes as `{ "stat", "code", "message", "data" }`; the HTTP status is
/// a hint for the transport and is not part of the body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outcome<T> {
    pub stat: bool,
    pub code: i32,
    pub message: String,
    pub data: Option<T>,
    #[serde(skip, default = "ok_status")]
    pub http_status: u16,
}

fn ok_status() -> u16 {
    200
}

impl<T> Outcome<T> {
    pub fn ok(data: T, message: impl Into<String>) -> Self {
        Self {
            stat: true,
            code: constants::OUTCOME_OK,
            message: message.into(),
            data: Some(data),
            http_status: ok_status(),
        }
    }

    #[must_use]
    pub fn failure(err: &LeaseError) -> Self {
        Self {
            stat: false,
            code: err.outcome_code(),
            message: err.to_string(),
            data: None,
            http_status: err.http_status(),
        }
    }

    pub fn from_result(result: Result<T>, message: impl Into<String>) -> Self {
        match result {
            Ok(data) => Self::ok(data, message),
            Err(err) => Self::failure(&err),
        }
    }

    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.stat
    }
}
