use cop_protocol::WorkerRequest;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const DEFAULT_POOL_CAPACITY: usize = 4;

/// Lifecycle of one decrypt worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerState {
    Uninitialized,
    /// Init message sent, `init-complete` not yet seen.
    Initializing,
    Ready,
}

/// A request on its way to a worker, tagged so the reply can find its caller.
#[derive(Debug)]
pub struct Envelope {
    pub correlation_id: Uuid,
    pub request: WorkerRequest,
}
