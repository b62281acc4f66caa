use async_trait::async_trait;
use cop_protocol::DecryptionResult;

use super::local::WorkerPool;
use crate::error::PoolError;

/// Anything that can turn a ciphertext into a [`DecryptionResult`].
///
/// The resolver is generic over this so tests can swap the pool out.
#[async_trait]
pub trait DecryptBackend: Send + Sync {
    async fn decrypt(&self, ciphertext: Vec<u8>) -> Result<DecryptionResult, PoolError>;
}

#[async_trait]
impl DecryptBackend for WorkerPool {
    async fn decrypt(&self, ciphertext: Vec<u8>) -> Result<DecryptionResult, PoolError> {
        WorkerPool::decrypt(self, ciphertext).await
    }
}
