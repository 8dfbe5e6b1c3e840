//! Concurrency limiter implementation
//!
//! Provides a semaphore-based limiter that bounds how many per-record deletes
//! are in flight at once during an enumerate-then-delete purge.

use super::config::ConcurrencyConfig;
use log::debug;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{AcquireError, OwnedSemaphorePermit, Semaphore};

/// Semaphore-based concurrency limiter for per-record deletes
#[derive(Debug, Clone)]
pub struct ConcurrencyLimiter {
    semaphore: Arc<Semaphore>,
    permits: usize,
    requests_acquired: Arc<AtomicU64>,
    requests_waited: Arc<AtomicU64>,
}

impl ConcurrencyLimiter {
    /// Create a new concurrency limiter with the given configuration
    pub fn new(config: &ConcurrencyConfig) -> Self {
        let permits = config.fan_out();

        Self {
            semaphore: Arc::new(Semaphore::new(permits)),
            permits,
            requests_acquired: Arc::new(AtomicU64::new(0)),
            requests_waited: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Acquire a permit for a delete. Waits if at capacity.
    /// The permit is released when dropped.
    pub async fn acquire(&self) -> Result<OwnedSemaphorePermit, AcquireError> {
        if self.semaphore.available_permits() == 0 {
            self.requests_waited.fetch_add(1, Ordering::Relaxed);
            debug!(
                "Concurrency limiter: waiting for permit ({} in use)",
                self.permits
            );
        }

        let permit = self.semaphore.clone().acquire_owned().await?;
        self.requests_acquired.fetch_add(1, Ordering::Relaxed);

        debug!(
            "Concurrency limiter: acquired permit ({}/{} in use)",
            self.permits - self.semaphore.available_permits(),
            self.permits
        );

        Ok(permit)
    }

    /// Number of deletes that can start immediately
    pub fn available_permits(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Get current statistics
    pub fn stats(&self) -> ConcurrencyStats {
        ConcurrencyStats {
            available_permits: self.available_permits(),
            max_in_flight: self.permits,
            requests_acquired: self.requests_acquired.load(Ordering::Relaxed),
            requests_waited: self.requests_waited.load(Ordering::Relaxed),
        }
    }
}

/// Statistics for the concurrency limiter
#[derive(Debug, Clone)]
pub struct ConcurrencyStats {
    /// Number of permits currently available
    pub available_permits: usize,
    /// Maximum deletes in flight
    pub max_in_flight: usize,
    /// Total permits acquired since creation
    pub requests_acquired: u64,
    /// Number of times a delete had to wait for a permit
    pub requests_waited: u64,
}
