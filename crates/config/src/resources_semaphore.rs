//! Semaphore helpers for bounding concurrent fetches

use prefetch_errors::Error;
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Acquire a permit, treating a closed semaphore as cancellation
///
/// # Errors
///
/// Returns `Error::Cancelled` if the semaphore has been closed.
pub async fn acquire_semaphore_permit(
    semaphore: Arc<Semaphore>,
    operation: &str,
) -> Result<OwnedSemaphorePermit, Error> {
    semaphore.acquire_owned().await.map_err(|_| {
        tracing::debug!(operation, "semaphore closed before permit was granted");
        Error::Cancelled
    })
}

/// Create a semaphore with at least one permit
#[must_use]
pub fn create_semaphore(permits: usize) -> Arc<Semaphore> {
    Arc::new(Semaphore::new(permits.max(1)))
}
