//! Entitlement evaluation, classification banners and the decrypt pipeline
//! behind the common operating picture.
//!
//! Raw records flow through [`ObjectResolver`] (cache, then [`WorkerPool`]),
//! their attributes are checked by the [`evaluator`] against the session's
//! [`ActiveEntitlementSet`], and the survivors feed a [`ClassificationBanner`].
//! [`SituationalView`] wires these together for one session.

pub mod attributes;
pub mod banner;
pub mod cache;
pub mod catalog;
pub mod codec;
mod config;
pub mod entitlements;
pub mod error;
pub mod evaluator;
pub mod merge;
mod overrides;
pub mod pool;
pub mod resolver;
pub mod secured;
pub mod view;

#[cfg(test)]
mod test_support;

pub use attributes::{AttributeCategory, AttributeValue, ClassificationLevel};
pub use banner::{Banner, ClassificationBanner};
pub use cache::{CacheStats, ObjectCache};
pub use catalog::{AttributeCatalog, PolicyDefinition};
pub use codec::{classify, encryption_codec, CodecKind, CryptoSdk};
pub use config::{
    config_schema_json, load_config, load_effective_config, resolve_config_path,
    write_schema_file, CacheConfig, Config, PoolConfig,
};
pub use entitlements::{
    ActiveEntitlementSet, EntitlementSet, EntitlementStore, NarrowingSelection,
};
pub use error::{CodecError, EntitlementError, ParseError, PoolError};
pub use evaluator::Verdict;
pub use merge::{merge, parse_dynamic, DecryptedPayload};
pub use pool::{DecryptBackend, WorkerPool, WorkerState};
pub use resolver::{ObjectResolver, ResolvedObject};
pub use secured::SecuredObject;
pub use view::{SituationalView, ViewSnapshot};
