//! Verification-code delivery.
//!
//! There is no real SMS gateway behind this system. Delivery is a
//! collaborator that, polled for an active lease, either produces a code
//! or reports that nothing has arrived yet.

use numlease_types::{Lease, LeaseConfig};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// A delivered verification message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SmsMessage {
    pub code: String,
    /// Full message text as the recipient would see it.
    pub body: String,
}

impl SmsMessage {
    /// Render `template`, replacing every `{code}` with `code`.
    #[must_use]
    pub fn render(template: &str, code: String) -> Self {
        Self {
            body: template.replace("{code}", &code),
            code,
        }
    }
}

/// Source of verification codes for active leases.
pub trait CodeDelivery: Send + Sync {
    /// A code if one has arrived for `lease`, otherwise `None`.
    fn poll(&self, lease: &Lease) -> Option<String>;
}

/// Delivers a uniformly random numeric code with a fixed probability.
#[derive(Debug, Clone)]
pub struct SimulatedDelivery {
    probability: f64,
    code_length: usize,
}

impl SimulatedDelivery {
    /// `probability` is clamped to `[0, 1]`; NaN means never.
    #[must_use]
    pub fn new(probability: f64, code_length: usize) -> Self {
        let probability = if probability.is_nan() { 0.0 } else { probability };
        Self {
            probability: probability.clamp(0.0, 1.0),
            code_length,
        }
    }

    #[must_use]
    pub fn from_config(config: &LeaseConfig) -> Self {
        Self::new(config.delivery_probability, config.code_length)
    }

    /// Poll with a caller-supplied RNG.
    pub fn poll_with<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<String> {
        if !rng.gen_bool(self.probability) {
            return None;
        }
        Some(
            (0..self.code_length)
                .map(|_| char::from(b'0' + rng.gen_range(0..10u8)))
                .collect(),
        )
    }
}

impl Default for SimulatedDelivery {
    fn default() -> Self {
        Self::from_config(&LeaseConfig::default())
    }
}

impl CodeDelivery for SimulatedDelivery {
    fn poll(&self, _lease: &Lease) -> Option<String> {
        self.poll_with(&mut rand::thread_rng())
    }
}

/// Deterministic delivery for tests: always the same answer.
#[cfg(any(test, feature = "test-helpers"))]
#[derive(Debug)]
pub struct FixedDelivery {
    code: Option<String>,
    polls: std::sync::atomic::AtomicUsize,
}

#[cfg(any(test, feature = "test-helpers"))]
impl FixedDelivery {
    /// Every poll delivers `code`.
    pub fn always(code: impl Into<String>) -> Self {
        Self {
            code: Some(code.into()),
            polls: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    /// No poll ever delivers.
    pub fn never() -> Self {
        Self {
            code: None,
            polls: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    pub fn polls(&self) -> usize {
        self.polls.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[cfg(any(test, feature = "test-helpers"))]
impl CodeDelivery for FixedDelivery {
    fn poll(&self, _lease: &Lease) -> Option<String> {
        self.polls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        self.code.clone()
    }
}
