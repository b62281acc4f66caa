//! Decrypt worker pool.
//!
//! Each worker is a task with its own inbox that handles one request at a
//! time. Callers never talk to a worker directly; they go through
//! [`WorkerPool`], which hands out workers and matches replies to requests.

mod backend;
mod local;
mod types;
mod worker;

pub use backend::DecryptBackend;
pub use local::WorkerPool;
pub use types::{Envelope, WorkerState, DEFAULT_POOL_CAPACITY};
pub use worker::WorkerHandle;
