use std::time::Duration;

/// Failure reported by the crypto SDK for one ciphertext.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("authentication failed: {0}")]
    Auth(String),
    #[error("key access denied: {0}")]
    KeyAccess(String),
    #[error("malformed container: {0}")]
    Malformed(String),
    #[error("decrypt failed: {0}")]
    Decrypt(String),
}

/// JSON that was expected to be an object could not be read.
#[derive(thiserror::Error, Debug)]
pub enum ParseError {
    #[error("invalid json in {field}: {source}")]
    Json {
        field: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("{field} is not a json object")]
    NotAnObject { field: &'static str },
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PoolError {
    #[error("worker pool capacity must be at least 1")]
    ZeroCapacity,
    #[error("worker {0} is gone")]
    WorkerGone(usize),
    #[error("worker {worker} did not answer within {elapsed:?}")]
    Timeout { worker: usize, elapsed: Duration },
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum EntitlementError {
    /// Sign-in completed without an entitlement list; the session must re-authenticate.
    #[error("no entitlements were issued for the signed-in principal")]
    Missing,
    #[error("no principal is signed in")]
    NotSignedIn,
    #[error("attributes not granted to the principal: {}", .0.join(", "))]
    NotGranted(Vec<String>),
}
