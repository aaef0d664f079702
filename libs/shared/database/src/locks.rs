use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

type Registry = Arc<Mutex<HashMap<String, Arc<AsyncMutex<()>>>>>;

fn lock_registry(registry: &Registry) -> MutexGuard<'_, HashMap<String, Arc<AsyncMutex<()>>>> {
    match registry.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// One async mutex per key, created on first use and dropped with its last holder.
///
/// Scheduling holds the guard for a doctor across the availability check and
/// the write, so two bookings for the same doctor run one after the other.
#[derive(Default)]
pub struct KeyedLocks {
    locks: Registry,
}

/// Forgets the key once nobody holds or waits for its mutex.
struct Registration {
    key: String,
    registry: Registry,
}

impl Drop for Registration {
    fn drop(&mut self) {
        let mut locks = lock_registry(&self.registry);
        let idle = locks
            .get(&self.key)
            .is_some_and(|lock| Arc::strong_count(lock) == 1);
        if idle {
            locks.remove(&self.key);
        }
    }
}

/// Held lock for one key. Releasing it may remove the key from [`KeyedLocks`].
pub struct KeyedGuard {
    // Field order matters: the mutex guard must release its handle first.
    _guard: OwnedMutexGuard<()>,
    _registration: Registration,
}

impl KeyedLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, key: &str) -> KeyedGuard {
        let lock = {
            let mut locks = lock_registry(&self.locks);
            locks
                .entry(key.to_string())
                .or_insert_with(|| Arc::new(AsyncMutex::new(())))
                .clone()
        };
        let registration = Registration {
            key: key.to_string(),
            registry: self.locks.clone(),
        };
        let guard = lock.lock_owned().await;
        KeyedGuard {
            _guard: guard,
            _registration: registration,
        }
    }

    /// Keys currently held or waited on.
    pub fn len(&self) -> usize {
        lock_registry(&self.locks).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn same_key_is_serialized() {
        let locks = Arc::new(KeyedLocks::new());
        let guard = locks.acquire("doctor-1").await;

        let contender = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _guard = locks.acquire("doctor-1").await;
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!contender.is_finished());

        drop(guard);
        contender.await.unwrap();
        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn different_keys_do_not_block() {
        let locks = KeyedLocks::new();
        let first = locks.acquire("doctor-1").await;
        let second = locks.acquire("doctor-2").await;
        assert_eq!(locks.len(), 2);

        drop(first);
        assert_eq!(locks.len(), 1);
        drop(second);
        assert_eq!(locks.len(), 0);
    }

    #[tokio::test]
    async fn key_survives_while_someone_waits() {
        let locks = Arc::new(KeyedLocks::new());
        let guard = locks.acquire("medicine-1").await;

        let waiter = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _guard = locks.acquire("medicine-1").await;
                tokio::time::sleep(Duration::from_millis(10)).await;
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        drop(guard);
        assert_eq!(locks.len(), 1);

        waiter.await.unwrap();
        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn many_keys_leave_nothing_behind() {
        let locks = KeyedLocks::new();
        for n in 0..100 {
            let _guard = locks.acquire(&format!("prescription:{}", n)).await;
        }
        assert!(locks.is_empty());
    }
}
