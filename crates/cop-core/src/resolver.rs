use std::sync::Arc;

use cop_protocol::{DecryptionResult, RawRecord};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::cache::ObjectCache;
use crate::merge::{parse_dynamic, parse_object, DecryptedPayload};
use crate::pool::DecryptBackend;
use crate::secured::SecuredObject;

/// One raw record after decryption and merge.
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedObject {
    pub id: String,
    pub source_type_id: String,
    pub geo: Option<String>,
    pub timestamp: Option<String>,
    pub payload: DecryptedPayload,
    pub attributes: SecuredObject,
}

impl ResolvedObject {
    pub fn fields(&self) -> Map<String, Value> {
        self.payload.merged()
    }
}

/// Cache-first decryption front end.
///
/// Decrypt and parse failures stop here: the caller always gets whatever
/// dynamic fields were readable, with the static part absent on failure.
pub struct ObjectResolver<B: DecryptBackend> {
    backend: Arc<B>,
    cache: Arc<ObjectCache>,
}

impl<B: DecryptBackend> Clone for ObjectResolver<B> {
    fn clone(&self) -> Self {
        Self {
            backend: self.backend.clone(),
            cache: self.cache.clone(),
        }
    }
}

impl<B: DecryptBackend> ObjectResolver<B> {
    pub fn new(backend: Arc<B>, cache: Arc<ObjectCache>) -> Self {
        Self { backend, cache }
    }

    pub fn cache(&self) -> &Arc<ObjectCache> {
        &self.cache
    }

    pub async fn get_or_decrypt(
        &self,
        object_id: &str,
        source_type_id: &str,
        ciphertext: Vec<u8>,
        dynamic: Option<&str>,
    ) -> DecryptedPayload {
        let dynamic_fields = parse_dynamic(object_id, dynamic);
        if let Some(hit) = self.cache.get(object_id) {
            tracing::debug!(object_id, "static payload served from cache");
            return DecryptedPayload {
                static_fields: Some((*hit).clone()),
                dynamic_fields,
            };
        }

        let static_fields = match self.backend.decrypt(ciphertext).await {
            Ok(result) => self.read_result(object_id, result),
            Err(err) => {
                tracing::error!(object_id, error = %err, "decrypt dispatch failed");
                None
            }
        };
        if let Some(fields) = &static_fields {
            if self.cache.insert(object_id, source_type_id, fields.clone()) {
                tracing::debug!(object_id, source_type_id, "static payload cached");
            }
        }
        DecryptedPayload {
            static_fields,
            dynamic_fields,
        }
    }

    pub async fn resolve_record(&self, record: RawRecord) -> ResolvedObject {
        let RawRecord {
            id,
            source_type_id,
            ciphertext_blob,
            dynamic_plaintext_fields,
            geo,
            timestamp,
        } = record;
        let payload = self
            .get_or_decrypt(
                &id,
                &source_type_id,
                ciphertext_blob,
                dynamic_plaintext_fields.as_deref(),
            )
            .await;
        // Attributes come from the ciphertext only; plaintext fields cannot relabel an object.
        let attributes = payload
            .static_fields
            .as_ref()
            .map(|fields| SecuredObject::from_payload(id.clone(), fields))
            .unwrap_or_else(|| SecuredObject::new(id.clone()));
        ResolvedObject {
            id,
            source_type_id,
            geo,
            timestamp,
            payload,
            attributes,
        }
    }

    fn read_result(&self, object_id: &str, result: DecryptionResult) -> Option<Map<String, Value>> {
        if let Some(err) = result.error {
            tracing::error!(object_id, error = %err, "object decryption failed");
            return None;
        }
        let plaintext = result.decrypted_payload?;
        match parse_object(&plaintext, "decryptedPayload") {
            Ok(fields) => Some(fields),
            Err(err) => {
                tracing::warn!(object_id, error = %err, "decrypted payload is not a json object");
                None
            }
        }
    }
}
