use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use strive_core::{LockError, LockManager};

/// Single-node lock manager: a mutexed map of key -> lease deadline.
/// Matches the distributed contract, so the engine and its tests run
/// without a lock backend.
pub struct InMemoryLockManager {
    leases: Mutex<HashMap<String, Instant>>,
}

impl InMemoryLockManager {
    pub fn new() -> Self {
        Self {
            leases: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryLockManager {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LockManager for InMemoryLockManager {
    async fn acquire(&self, key: &str, lease: Duration) -> Result<bool, LockError> {
        let mut leases = self.leases.lock().unwrap();
        let now = Instant::now();
        match leases.get(key) {
            Some(deadline) if *deadline > now => Ok(false),
            _ => {
                leases.insert(key.to_string(), now + lease);
                Ok(true)
            }
        }
    }

    async fn release(&self, key: &str) -> Result<(), LockError> {
        let mut leases = self.leases.lock().unwrap();
        leases.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_acquire_is_exclusive() {
        let locks = InMemoryLockManager::new();
        let lease = Duration::from_secs(10);

        assert!(locks.acquire("class-lock-a", lease).await.unwrap());
        assert!(!locks.acquire("class-lock-a", lease).await.unwrap());

        // Different key is unaffected
        assert!(locks.acquire("class-lock-b", lease).await.unwrap());

        locks.release("class-lock-a").await.unwrap();
        assert!(locks.acquire("class-lock-a", lease).await.unwrap());
    }

    #[tokio::test]
    async fn test_release_is_idempotent() {
        let locks = InMemoryLockManager::new();

        locks.release("class-lock-unheld").await.unwrap();
        assert!(locks
            .acquire("class-lock-unheld", Duration::from_secs(5))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_expired_lease_is_reacquirable() {
        let locks = InMemoryLockManager::new();
        let lease = Duration::from_millis(10);

        assert!(locks.acquire("class-lock-a", lease).await.unwrap());
        tokio::time::sleep(Duration::from_millis(25)).await;
        assert!(locks.acquire("class-lock-a", lease).await.unwrap());
    }
}
