use async_trait::async_trait;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum LockError {
    #[error("Lock backend unavailable: {0}")]
    Backend(String),
}

/// Cross-process mutual exclusion keyed by resource id.
///
/// Acquisition is a single conditional set-if-absent with a lease; it never
/// blocks waiting for the current holder. The lease guarantees eventual
/// release when a holder dies without calling `release`.
#[async_trait]
pub trait LockManager: Send + Sync {
    /// Returns `true` when the lease was taken, `false` when the key is
    /// already held. Callers must not proceed on `false`.
    async fn acquire(&self, key: &str, lease: Duration) -> Result<bool, LockError>;

    /// Idempotent: releasing an unheld or already-expired key is a no-op.
    async fn release(&self, key: &str) -> Result<(), LockError>;
}
