//! Admission gate: bounded concurrency that sheds load instead of queueing.

use std::sync::Arc;

use numlease_types::{LeaseError, Result};
use tokio::sync::{OwnedSemaphorePermit, Semaphore, TryAcquireError};

/// A fixed pool of permits. Callers that find it empty are told `Busy`.
#[derive(Debug, Clone)]
pub struct AdmissionGate {
    permits: Arc<Semaphore>,
    capacity: usize,
}

/// Held for the duration of one admitted operation; dropping it frees the slot.
#[derive(Debug)]
pub struct Admission {
    _permit: OwnedSemaphorePermit,
}

impl AdmissionGate {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    /// Take a permit without waiting.
    pub fn try_admit(&self) -> Result<Admission> {
        match Arc::clone(&self.permits).try_acquire_owned() {
            Ok(permit) => Ok(Admission { _permit: permit }),
            Err(TryAcquireError::NoPermits) => {
                tracing::debug!(capacity = self.capacity, "Admission refused");
                Err(LeaseError::Busy {
                    capacity: self.capacity,
                })
            }
            Err(TryAcquireError::Closed) => {
                Err(LeaseError::Internal("admission gate closed".into()))
            }
        }
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Permits free right now.
    #[must_use]
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_gate_is_busy() {
        let gate = AdmissionGate::new(2);
        let a = gate.try_admit().unwrap();
        let _b = gate.try_admit().unwrap();
        assert_eq!(gate.available(), 0);

        let err = gate.try_admit().unwrap_err();
        assert_eq!(err, LeaseError::Busy { capacity: 2 });
        assert_eq!(err.http_status(), 503);

        drop(a);
        assert_eq!(gate.available(), 1);
        assert!(gate.try_admit().is_ok());
    }

    #[test]
    fn clones_share_permits() {
        let gate = AdmissionGate::new(1);
        let other = gate.clone();
        let _held = gate.try_admit().unwrap();
        assert!(other.try_admit().is_err());
    }
}
