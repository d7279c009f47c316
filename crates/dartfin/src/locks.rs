//! Per-key async locks.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Serializes work on the same (company, fiscal year) within one process.
///
/// Holders of different keys never wait on each other. Idle entries are
/// pruned on the next acquisition.
#[derive(Debug, Default)]
pub struct KeyedLocks {
    locks: Mutex<HashMap<(String, i32), Arc<Mutex<()>>>>,
}

impl KeyedLocks {
    /// Creates an empty lock table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits for exclusive access to a key. Access ends when the guard drops.
    pub async fn lock(&self, company_id: &str, fiscal_year: i32) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            // Only the table holds an idle entry.
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            Arc::clone(
                locks
                    .entry((company_id.to_string(), fiscal_year))
                    .or_default(),
            )
        };
        lock.lock_owned().await
    }

    /// Keys currently held or awaited.
    pub async fn active(&self) -> usize {
        self.locks
            .lock()
            .await
            .values()
            .filter(|lock| Arc::strong_count(lock) > 1)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_same_key_is_exclusive() {
        let locks = Arc::new(KeyedLocks::new());
        let guard = locks.lock("00126380", 2024).await;

        let contender = {
            let locks = Arc::clone(&locks);
            tokio::spawn(async move {
                let _guard = locks.lock("00126380", 2024).await;
            })
        };
        tokio::task::yield_now().await;
        assert!(!contender.is_finished());

        drop(guard);
        contender.await.unwrap();
    }

    #[tokio::test]
    async fn test_distinct_keys_do_not_block() {
        let locks = KeyedLocks::new();
        let _a = locks.lock("00126380", 2024).await;
        let _b = locks.lock("00126380", 2023).await;
        let _c = locks.lock("00164779", 2024).await;

        assert_eq!(locks.active().await, 3);
    }

    #[tokio::test]
    async fn test_released_keys_are_pruned() {
        let locks = KeyedLocks::new();
        drop(locks.lock("00126380", 2024).await);
        let _held = locks.lock("00164779", 2024).await;

        assert_eq!(locks.active().await, 1);
        assert_eq!(locks.locks.lock().await.len(), 1);
    }
}
