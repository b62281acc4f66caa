use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use cop_protocol::{DecryptionResult, WorkerInit};

use super::worker::WorkerHandle;
use crate::codec::CryptoSdk;
use crate::error::PoolError;

/// Bounded set of decrypt workers sharing one session.
///
/// Workers are created on demand until `capacity` exist; after that requests
/// are spread round-robin. A worker is never torn down while the pool lives.
pub struct WorkerPool {
    capacity: usize,
    sdk: Arc<dyn CryptoSdk>,
    init: WorkerInit,
    workers: Mutex<Vec<Arc<WorkerHandle>>>,
    cursor: AtomicUsize,
}

impl WorkerPool {
    pub fn new(
        capacity: usize,
        sdk: Arc<dyn CryptoSdk>,
        init: WorkerInit,
    ) -> Result<Self, PoolError> {
        if capacity == 0 {
            return Err(PoolError::ZeroCapacity);
        }
        Ok(Self {
            capacity,
            sdk,
            init,
            workers: Mutex::new(Vec::with_capacity(capacity)),
            cursor: AtomicUsize::new(0),
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Workers spawned so far.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Pick the worker for the next request, spawning one while below capacity.
    pub fn acquire(&self) -> Arc<WorkerHandle> {
        let mut workers = self.lock();
        if workers.len() < self.capacity {
            let index = workers.len();
            let handle = Arc::new(WorkerHandle::spawn(
                index,
                self.sdk.clone(),
                self.init.clone(),
            ));
            workers.push(handle.clone());
            tracing::debug!(worker = index, size = workers.len(), "worker pool grew");
            return handle;
        }
        let next = self.cursor.fetch_add(1, Ordering::Relaxed) % workers.len();
        workers[next].clone()
    }

    /// Route one ciphertext to a worker and wait for its result.
    pub async fn decrypt(&self, ciphertext: Vec<u8>) -> Result<DecryptionResult, PoolError> {
        let worker = self.acquire();
        worker.submit(ciphertext).await
    }

    /// Like [`WorkerPool::decrypt`] but gives up after `limit`. The worker keeps
    /// running; its late reply is discarded.
    pub async fn decrypt_with_deadline(
        &self,
        ciphertext: Vec<u8>,
        limit: Duration,
    ) -> Result<DecryptionResult, PoolError> {
        let worker = self.acquire();
        match tokio::time::timeout(limit, worker.submit(ciphertext)).await {
            Ok(res) => res,
            Err(_) => {
                tracing::warn!(worker = worker.index(), ?limit, "decrypt timed out");
                Err(PoolError::Timeout {
                    worker: worker.index(),
                    elapsed: limit,
                })
            }
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Arc<WorkerHandle>>> {
        self.workers.lock().unwrap_or_else(|p| p.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::CodecKind;
    use crate::error::CodecError;
    use async_trait::async_trait;
    use cop_protocol::{ClientConfig, UserCredentials};

    struct Upper;

    #[async_trait]
    impl CryptoSdk for Upper {
        async fn decrypt(
            &self,
            _codec: CodecKind,
            ciphertext: Vec<u8>,
            _session: &WorkerInit,
        ) -> Result<String, CodecError> {
            Ok(String::from_utf8_lossy(&ciphertext).to_uppercase())
        }
    }

    struct Stuck;

    #[async_trait]
    impl CryptoSdk for Stuck {
        async fn decrypt(
            &self,
            _codec: CodecKind,
            _ciphertext: Vec<u8>,
            _session: &WorkerInit,
        ) -> Result<String, CodecError> {
            std::future::pending::<()>().await;
            Ok(String::new())
        }
    }

    fn session() -> WorkerInit {
        WorkerInit {
            config: ClientConfig::default(),
            user: UserCredentials {
                access_token: "at".into(),
                refresh_token: "rt".into(),
            },
        }
    }

    #[test]
    fn zero_capacity_is_rejected() {
        assert_eq!(
            WorkerPool::new(0, Arc::new(Upper), session()).err(),
            Some(PoolError::ZeroCapacity)
        );
    }

    #[tokio::test]
    async fn grows_lazily_then_round_robins() {
        let pool = WorkerPool::new(2, Arc::new(Upper), session()).unwrap();
        assert!(pool.is_empty());
        let a = pool.acquire();
        assert_eq!(pool.len(), 1);
        let b = pool.acquire();
        assert_eq!(pool.len(), 2);
        assert_ne!(a.index(), b.index());
        let picks: Vec<usize> = (0..4).map(|_| pool.acquire().index()).collect();
        assert_eq!(picks, vec![0, 1, 0, 1]);
        assert_eq!(pool.len(), 2);
    }

    #[tokio::test]
    async fn results_reach_their_caller() {
        let pool = Arc::new(WorkerPool::new(2, Arc::new(Upper), session()).unwrap());
        let mut tasks = Vec::new();
        for i in 0..8 {
            let pool = pool.clone();
            tasks.push(tokio::spawn(async move {
                let res = pool.decrypt(format!("obj-{i}").into_bytes()).await.unwrap();
                (i, res.decrypted_payload)
            }));
        }
        for t in tasks {
            let (i, payload) = t.await.unwrap();
            assert_eq!(payload, Some(format!("OBJ-{i}")));
        }
        assert_eq!(pool.len(), 2);
    }

    #[tokio::test]
    async fn deadline_bounds_a_stuck_worker() {
        let pool = WorkerPool::new(1, Arc::new(Stuck), session()).unwrap();
        let err = pool
            .decrypt_with_deadline(b"x".to_vec(), Duration::from_millis(50))
            .await
            .unwrap_err();
        assert!(matches!(err, PoolError::Timeout { worker: 0, .. }));
        assert_eq!(pool.acquire().in_flight(), 0);
    }
}
