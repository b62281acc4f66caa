use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use cop_protocol::{DecryptRequest, DecryptionResult, WorkerInit, WorkerReply, WorkerRequest};
use tokio::sync::{mpsc, oneshot, watch};
use uuid::Uuid;

use super::types::{Envelope, WorkerState};
use crate::codec::{classify, CryptoSdk};
use crate::error::{CodecError, PoolError};

type Pending = Arc<Mutex<HashMap<Uuid, oneshot::Sender<DecryptionResult>>>>;

/// Caller-side handle to one long-lived decrypt worker.
///
/// The worker itself runs as its own task and only sees what arrives on its
/// inbox; replies come back on a separate channel and are routed to the
/// waiting caller by correlation id.
pub struct WorkerHandle {
    index: usize,
    inbox: mpsc::UnboundedSender<Envelope>,
    pending: Pending,
    state: watch::Receiver<WorkerState>,
}

impl WorkerHandle {
    /// Spawn the worker and send it the init message. Must run inside a Tokio runtime.
    pub(crate) fn spawn(index: usize, sdk: Arc<dyn CryptoSdk>, init: WorkerInit) -> Self {
        let (in_tx, in_rx) = mpsc::unbounded_channel();
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(WorkerState::Uninitialized);
        let pending: Pending = Arc::new(Mutex::new(HashMap::new()));

        tokio::spawn(run_worker(index, sdk, in_rx, out_tx));

        let init_id = Uuid::new_v4();
        if in_tx
            .send(Envelope {
                correlation_id: init_id,
                request: WorkerRequest::Init(init),
            })
            .is_ok()
        {
            state_tx.send_replace(WorkerState::Initializing);
        }
        tokio::spawn(route_replies(index, out_rx, pending.clone(), state_tx));
        tracing::info!(worker = index, "decrypt worker spawned");

        Self {
            index,
            inbox: in_tx,
            pending,
            state: state_rx,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn state(&self) -> WorkerState {
        *self.state.borrow()
    }

    /// Tasks still waiting for a reply.
    pub fn in_flight(&self) -> usize {
        lock(&self.pending).len()
    }

    /// Hand a ciphertext to the worker and wait for its answer.
    ///
    /// Requests made before the worker is ready wait for `init-complete`.
    /// There is no internal deadline; a worker that never answers leaves the
    /// caller waiting. Dropping the future withdraws the request from the
    /// pending map, so a late reply is logged and discarded.
    pub async fn submit(&self, ciphertext: Vec<u8>) -> Result<DecryptionResult, PoolError> {
        let mut state = self.state.clone();
        state
            .wait_for(|s| *s == WorkerState::Ready)
            .await
            .map(|_| ())
            .map_err(|_| PoolError::WorkerGone(self.index))?;

        let correlation_id = Uuid::new_v4();
        let (tx, rx) = oneshot::channel();
        lock(&self.pending).insert(correlation_id, tx);
        let _withdraw = Withdraw {
            pending: &self.pending,
            correlation_id,
        };
        let sent = self.inbox.send(Envelope {
            correlation_id,
            request: WorkerRequest::Decrypt(DecryptRequest {
                tdf_blob_buffer: ciphertext,
            }),
        });
        if sent.is_err() {
            return Err(PoolError::WorkerGone(self.index));
        }
        rx.await.map_err(|_| PoolError::WorkerGone(self.index))
    }
}

/// Removes a request's waiter when `submit` returns or is cancelled.
struct Withdraw<'a> {
    pending: &'a Pending,
    correlation_id: Uuid,
}

impl Drop for Withdraw<'_> {
    fn drop(&mut self) {
        lock(self.pending).remove(&self.correlation_id);
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|p| p.into_inner())
}

async fn route_replies(
    index: usize,
    mut replies: mpsc::UnboundedReceiver<(Uuid, WorkerReply)>,
    pending: Pending,
    state: watch::Sender<WorkerState>,
) {
    while let Some((correlation_id, reply)) = replies.recv().await {
        match reply {
            WorkerReply::InitComplete => {
                state.send_replace(WorkerState::Ready);
                tracing::debug!(worker = index, "worker ready");
            }
            WorkerReply::DecryptionResult(result) => {
                let waiter = lock(&pending).remove(&correlation_id);
                let delivered = match waiter {
                    Some(tx) => tx.send(result).is_ok(),
                    None => false,
                };
                if !delivered {
                    tracing::warn!(
                        worker = index,
                        %correlation_id,
                        "late reply dropped; caller no longer waiting"
                    );
                }
            }
        }
    }
    // Dropping the senders wakes every waiter with an error.
    lock(&pending).clear();
    tracing::debug!(worker = index, "worker reply channel closed");
}

async fn run_worker(
    index: usize,
    sdk: Arc<dyn CryptoSdk>,
    mut inbox: mpsc::UnboundedReceiver<Envelope>,
    outbox: mpsc::UnboundedSender<(Uuid, WorkerReply)>,
) {
    let mut session: Option<WorkerInit> = None;
    while let Some(Envelope {
        correlation_id,
        request,
    }) = inbox.recv().await
    {
        let reply = match request {
            WorkerRequest::Init(init) => {
                session = Some(init);
                WorkerReply::InitComplete
            }
            WorkerRequest::Decrypt(DecryptRequest { tdf_blob_buffer }) => {
                WorkerReply::DecryptionResult(
                    decrypt_one(index, sdk.as_ref(), session.as_ref(), tdf_blob_buffer).await,
                )
            }
        };
        if outbox.send((correlation_id, reply)).is_err() {
            break;
        }
    }
    tracing::debug!(worker = index, "worker inbox closed");
}

async fn decrypt_one(
    index: usize,
    sdk: &dyn CryptoSdk,
    session: Option<&WorkerInit>,
    ciphertext: Vec<u8>,
) -> DecryptionResult {
    let Some(session) = session else {
        tracing::error!(worker = index, "decryption request before initialization");
        return DecryptionResult::failed("worker received decryption request before initialization");
    };
    if ciphertext.is_empty() {
        return DecryptionResult::default();
    }
    if session.user.refresh_token.is_empty() {
        let err = CodecError::Auth("no refresh token found".into());
        tracing::error!(worker = index, error = %err, "cannot build auth provider");
        return DecryptionResult::failed(err.to_string());
    }
    let codec = classify(&ciphertext);
    tracing::debug!(worker = index, %codec, bytes = ciphertext.len(), "decrypting");
    match sdk.decrypt(codec, ciphertext, session).await {
        Ok(plaintext) => DecryptionResult::ok(plaintext),
        Err(err) => {
            tracing::error!(worker = index, %codec, error = %err, "worker decryption error");
            DecryptionResult::failed(err.to_string())
        }
    }
}
