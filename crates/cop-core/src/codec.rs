use async_trait::async_trait;
use cop_protocol::{ClientConfig, WorkerInit};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::CodecError;

/// NanoTDF magic number and version: "L1L".
pub const NANOTDF_MAGIC: [u8; 3] = [0x4C, 0x31, 0x4C];

/// Container encodings the crypto SDK can read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CodecKind {
    NanoTdf,
    /// TDF3 / ZTDF (zip container).
    Tdf3,
}

impl CodecKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CodecKind::NanoTdf => "nanotdf",
            CodecKind::Tdf3 => "tdf3",
        }
    }
}

impl fmt::Display for CodecKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pick a codec from the leading bytes. Structural only; anything that is
/// not an exact NanoTDF prefix, including short buffers, is TDF3.
pub fn classify(ciphertext: &[u8]) -> CodecKind {
    if ciphertext.starts_with(&NANOTDF_MAGIC) {
        CodecKind::NanoTdf
    } else {
        CodecKind::Tdf3
    }
}

/// Codec used when authoring new objects.
pub fn encryption_codec(config: &ClientConfig) -> CodecKind {
    if config.form_submit_nano_tdf {
        CodecKind::NanoTdf
    } else {
        CodecKind::Tdf3
    }
}

/// The wrapped crypto SDK. Implementations do the actual key access and
/// decryption; this crate only routes to them.
#[async_trait]
pub trait CryptoSdk: Send + Sync {
    /// Decrypt one container. The buffer is moved in and not handed back.
    async fn decrypt(
        &self,
        codec: CodecKind,
        ciphertext: Vec<u8>,
        session: &WorkerInit,
    ) -> Result<String, CodecError>;
}
