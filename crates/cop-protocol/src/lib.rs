use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

// -------- Client configuration handed to decrypt workers --------

/// Identity provider settings used by the crypto SDK to exchange tokens.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq, JsonSchema)]
pub struct KeycloakConfig {
    /// Base URL of the OIDC server, e.g. <https://idp.example.com/realms/cop>
    #[serde(default)]
    pub server_url: String,
    #[serde(default)]
    pub client_id: String,
}

/// Data-security-platform settings shared by the UI thread and its workers.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq, JsonSchema)]
pub struct ClientConfig {
    #[serde(default)]
    pub platform_url: String,
    #[serde(default)]
    pub kas_url: String,
    #[serde(default)]
    pub keycloak: KeycloakConfig,
    /// Encrypt newly authored objects as NanoTDF instead of TDF3/ZTDF.
    #[serde(default)]
    pub form_submit_nano_tdf: bool,
}

/// Session tokens for the signed-in principal.
#[derive(Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UserCredentials {
    pub access_token: String,
    pub refresh_token: String,
}

impl fmt::Debug for UserCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserCredentials")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .finish()
    }
}

// -------- Worker message protocol --------

/// First message a worker receives; carries everything it needs to talk to the platform.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct WorkerInit {
    pub config: ClientConfig,
    pub user: UserCredentials,
}

/// Ciphertext hand-off. The sender gives up the buffer when the request is built.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct DecryptRequest {
    #[serde(rename = "tdfBlobBuffer")]
    pub tdf_blob_buffer: Vec<u8>,
}

/// Caller -> worker. Variants are told apart by shape, not by a tag.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(untagged)]
pub enum WorkerRequest {
    Init(WorkerInit),
    Decrypt(DecryptRequest),
}

/// Worker -> caller.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum WorkerReply {
    InitComplete,
    DecryptionResult(DecryptionResult),
}

/// Outcome of one decrypt request. A failed decode sets `error` and leaves
/// `decrypted_payload` empty; an empty input buffer leaves both empty.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DecryptionResult {
    pub decrypted_payload: Option<String>,
    pub error: Option<String>,
}

impl DecryptionResult {
    pub fn ok(payload: impl Into<String>) -> Self {
        Self {
            decrypted_payload: Some(payload.into()),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            decrypted_payload: None,
            error: Some(error.into()),
        }
    }
}

// -------- Object source records --------

/// Raw record as delivered by the object source, before any decryption.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct RawRecord {
    pub id: String,
    pub source_type_id: String,
    #[serde(default)]
    pub ciphertext_blob: Vec<u8>,
    /// Plaintext JSON object travelling next to the ciphertext (live telemetry).
    #[serde(default)]
    pub dynamic_plaintext_fields: Option<String>,
    /// GeoJSON geometry, passed through untouched.
    #[serde(default)]
    pub geo: Option<String>,
    /// RFC3339 timestamp, passed through untouched.
    #[serde(default)]
    pub timestamp: Option<String>,
}

/// A note attached to an object. Its attributes live in `search` as a JSON string.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct NoteRecord {
    pub id: String,
    #[serde(default)]
    pub parent_id: Option<String>,
    #[serde(default)]
    pub search: Option<String>,
}
