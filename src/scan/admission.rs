//! Admission control for inspections.
//!
//! # Responsibilities
//! - Bound the number of engine processes alive at once
//! - Queue callers (without spinning) when every slot is taken
//! - Release the slot exactly once, however the inspection ends
//!
//! # Design Decisions
//! - Backed by a Tokio semaphore, so waiters are served roughly FIFO
//! - No priority or fairness beyond that; sustained overload can starve
//!   late arrivals until the caller's own timeout fires
//! - The slot lives in a [`CapacityToken`] guard and is returned on drop

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::observability::metrics;

/// Error type for admission.
#[derive(Debug, thiserror::Error)]
pub enum AdmissionError {
    /// No slot became free before the admission deadline.
    #[error("no scan capacity became available within {0:?}")]
    Timeout(Duration),
}

/// A fixed-capacity gate in front of the inspection engine.
#[derive(Debug)]
pub struct AdmissionLimiter {
    /// Semaphore holding one permit per scan slot.
    slots: Arc<Semaphore>,
    /// Configured maximum concurrent inspections.
    capacity: usize,
    /// Tokens currently held by callers.
    outstanding: Arc<AtomicUsize>,
}

impl AdmissionLimiter {
    /// Create a limiter admitting at most `capacity` concurrent inspections.
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: Arc::new(Semaphore::new(capacity)),
            capacity,
            outstanding: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Wait until a slot is free and take it.
    pub async fn acquire(&self) -> CapacityToken {
        let started = Instant::now();
        let permit = self
            .slots
            .clone()
            .acquire_owned()
            .await
            .expect("admission semaphore is never closed");
        self.admit(permit, started)
    }

    /// Like [`acquire`](Self::acquire), but give up after `wait`.
    pub async fn acquire_within(&self, wait: Duration) -> Result<CapacityToken, AdmissionError> {
        let started = Instant::now();
        match tokio::time::timeout(wait, self.slots.clone().acquire_owned()).await {
            Ok(permit) => {
                let permit = permit.expect("admission semaphore is never closed");
                Ok(self.admit(permit, started))
            }
            Err(_) => {
                tracing::warn!(
                    waited_ms = started.elapsed().as_millis() as u64,
                    capacity = self.capacity,
                    "Admission wait timed out"
                );
                Err(AdmissionError::Timeout(wait))
            }
        }
    }

    fn admit(&self, permit: OwnedSemaphorePermit, started: Instant) -> CapacityToken {
        let in_flight = self.outstanding.fetch_add(1, Ordering::SeqCst) + 1;
        metrics::record_admission(started.elapsed(), in_flight);

        tracing::debug!(
            in_flight,
            available = self.slots.available_permits(),
            "Scan slot acquired"
        );

        CapacityToken {
            _permit: permit,
            outstanding: Arc::clone(&self.outstanding),
        }
    }

    /// Configured maximum concurrent inspections.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Slots free right now.
    pub fn available(&self) -> usize {
        self.slots.available_permits()
    }

    /// Tokens currently held.
    pub fn outstanding(&self) -> usize {
        self.outstanding.load(Ordering::SeqCst)
    }
}

/// Permit for one inspection.
///
/// Dropping the token frees the slot.
#[derive(Debug)]
pub struct CapacityToken {
    _permit: OwnedSemaphorePermit,
    outstanding: Arc<AtomicUsize>,
}

impl CapacityToken {
    /// Free the slot before the token goes out of scope.
    pub fn release(self) {}
}

impl Drop for CapacityToken {
    fn drop(&mut self) {
        let in_flight = self.outstanding.fetch_sub(1, Ordering::SeqCst) - 1;
        metrics::record_in_flight(in_flight);
        tracing::trace!(in_flight, "Scan slot released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn tokens_are_counted_and_released() {
        let limiter = AdmissionLimiter::new(2);
        assert_eq!(limiter.available(), 2);

        let a = limiter.acquire().await;
        let b = limiter.acquire().await;
        assert_eq!(limiter.outstanding(), 2);
        assert_eq!(limiter.available(), 0);

        drop(a);
        assert_eq!(limiter.outstanding(), 1);
        assert_eq!(limiter.available(), 1);

        drop(b);
        assert_eq!(limiter.outstanding(), 0);
        assert_eq!(limiter.available(), 2);
    }

    #[tokio::test]
    async fn extra_caller_waits_for_a_release() {
        let limiter = Arc::new(AdmissionLimiter::new(1));
        let held = limiter.acquire().await;

        let waiter = {
            let limiter = Arc::clone(&limiter);
            tokio::spawn(async move {
                let _token = limiter.acquire().await;
                limiter.outstanding()
            })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!waiter.is_finished(), "second caller must block while the slot is held");

        drop(held);
        let seen = waiter.await.unwrap();
        assert_eq!(seen, 1);
        assert_eq!(limiter.outstanding(), 0);
    }

    #[tokio::test]
    async fn bounded_wait_times_out_without_leaking() {
        let limiter = AdmissionLimiter::new(1);
        let _held = limiter.acquire().await;

        let err = limiter
            .acquire_within(Duration::from_millis(20))
            .await
            .unwrap_err();
        assert!(matches!(err, AdmissionError::Timeout(_)));
        assert_eq!(limiter.outstanding(), 1);
    }

    #[tokio::test]
    async fn bounded_acquire_succeeds_when_free() {
        let limiter = AdmissionLimiter::new(3);
        let token = limiter.acquire_within(Duration::ZERO).await.unwrap();
        assert_eq!(limiter.outstanding(), 1);
        token.release();
        assert_eq!(limiter.outstanding(), 0);
        assert_eq!(limiter.capacity(), 3);
        assert_eq!(limiter.available(), 3);
    }
}
