//! Admission control for outbound requests.
//!
//! Two mechanisms stack here. A semaphore bounds the number of requests in
//! flight at once: a dispatcher must hold a permit for the lifetime of its
//! request, and acquiring blocks when the bound is reached. On top of that,
//! the fan-out loops pause briefly after every `batch_size` dispatches to
//! smooth out the initiation rate.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{AcquireError, OwnedSemaphorePermit, Semaphore};
use tracing::trace;

use crate::config::ThrottleConfig;

#[derive(Debug, Clone)]
pub struct Throttle {
    semaphore: Arc<Semaphore>,
    max_in_flight: usize,
    batch_size: usize,
    batch_pause: Duration,
}

impl Throttle {
    pub fn new(config: &ThrottleConfig) -> Self {
        // `drain` takes every permit in one `acquire_many`, which counts in u32.
        let ceiling = Semaphore::MAX_PERMITS.min(u32::MAX as usize);
        let max_in_flight = config.max_in_flight.clamp(1, ceiling);

        Self {
            semaphore: Arc::new(Semaphore::new(max_in_flight)),
            max_in_flight,
            batch_size: config.batch_size,
            batch_pause: config.batch_pause,
        }
    }

    /// Wait for an in-flight slot. The slot is released when the permit drops.
    pub async fn acquire(&self) -> Result<OwnedSemaphorePermit, AcquireError> {
        self.semaphore.clone().acquire_owned().await
    }

    /// Pause if `dispatched` (1-based count within the current fan-out)
    /// completes a batch.
    pub async fn pace(&self, dispatched: usize) {
        if self.batch_size == 0 || self.batch_pause.is_zero() {
            return;
        }

        if dispatched > 0 && dispatched % self.batch_size == 0 {
            trace!("dispatched {dispatched}, pausing for {:?}", self.batch_pause);
            tokio::time::sleep(self.batch_pause).await;
        }
    }

    /// Wait until every outstanding request has released its permit.
    pub async fn drain(&self) -> Result<(), AcquireError> {
        // Saturating the semaphore means nothing else holds a permit.
        let _all = self.semaphore.acquire_many(self.max_in_flight as u32).await?;
        Ok(())
    }

    pub fn in_flight(&self) -> usize {
        self.max_in_flight - self.semaphore.available_permits()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight
    }
}
