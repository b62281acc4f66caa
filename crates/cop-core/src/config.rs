use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use cop_protocol::ClientConfig;
use jsonschema::{validator_for, Validator};
use once_cell::sync::OnceCell;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::overrides;
use crate::pool::DEFAULT_POOL_CAPACITY;

pub const DEFAULT_CONFIG_REL: &str = "configs/default.toml";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
pub struct PoolConfig {
    /// Maximum number of decrypt workers.
    #[serde(default = "default_pool_capacity")]
    #[schemars(range(min = 1))]
    pub capacity: usize,
}

fn default_pool_capacity() -> usize {
    DEFAULT_POOL_CAPACITY
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_POOL_CAPACITY,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
pub struct CacheConfig {
    /// Source type ids whose decrypted static fields may be memoized.
    #[serde(default)]
    pub cacheable_source_types: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
pub struct Config {
    #[serde(default)]
    pub pool: PoolConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub client: ClientConfig,
}

static CONFIG_SCHEMA: OnceCell<Validator> = OnceCell::new();

fn schema_validator() -> Result<&'static Validator> {
    CONFIG_SCHEMA.get_or_try_init(|| {
        let schema = config_schema_json()?;
        validator_for(&schema).map_err(|e| anyhow::anyhow!("invalid config schema: {e}"))
    })
}

/// JSON schema describing the configuration file.
pub fn config_schema_json() -> Result<serde_json::Value> {
    let schema = schemars::schema_for!(Config);
    Ok(serde_json::to_value(&schema)?)
}

pub fn write_schema_file(path: impl AsRef<Path>) -> Result<()> {
    let schema_json = config_schema_json()?;
    std::fs::write(path.as_ref(), serde_json::to_string_pretty(&schema_json)?)
        .with_context(|| format!("writing schema to {}", path.as_ref().display()))
}

/// Parse a TOML config file, validating it against the schema first.
pub fn load_config(path: impl AsRef<Path>) -> Result<Config> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    let raw: toml::Value = toml::from_str(&content)
        .with_context(|| format!("parsing config {}", path.display()))?;
    let json_value = serde_json::to_value(&raw)?;
    let validation_errors: Vec<_> = schema_validator()?
        .iter_errors(&json_value)
        .map(|e| e.to_string())
        .collect();
    if !validation_errors.is_empty() {
        return Err(anyhow::anyhow!(
            "invalid config {}: {}",
            path.display(),
            validation_errors.join(", ")
        ));
    }
    Ok(toml::from_str(&content)?)
}

/// Config file (from `COP_CONFIG` or the default location) with environment
/// overrides applied. No file at all yields the defaults.
pub fn load_effective_config() -> Result<Config> {
    let explicit = overrides::read(overrides::CONFIG_FILE).map(PathBuf::from);
    let path = match explicit {
        Some(p) => Some(p),
        None => resolve_config_path(DEFAULT_CONFIG_REL),
    };
    let mut cfg = match &path {
        Some(p) => load_config(p)?,
        None => {
            tracing::debug!("no config file found; using defaults");
            Config::default()
        }
    };
    overrides::apply(&mut cfg);
    Ok(cfg)
}

/// Resolve a config file path independent of the current working directory.
///
/// Search order (first existing wins): `COP_CONFIG_DIR`, the executable's
/// directory, its parent, the workspace root, then the current directory.
/// An absolute `rel` is returned only if it exists.
pub fn resolve_config_path(rel: &str) -> Option<PathBuf> {
    let rel_path = Path::new(rel);
    if rel_path.is_absolute() {
        return rel_path.exists().then(|| rel_path.to_path_buf());
    }

    let mut candidates: Vec<PathBuf> = Vec::new();
    if let Some(dir) = overrides::read(overrides::CONFIG_DIR) {
        candidates.push(PathBuf::from(dir));
    }
    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            candidates.push(exe_dir.to_path_buf());
            if let Some(parent) = exe_dir.parent() {
                candidates.push(parent.to_path_buf());
            }
        }
    }
    candidates.push(Path::new(env!("CARGO_MANIFEST_DIR")).join("../../"));
    if let Ok(cwd) = std::env::current_dir() {
        candidates.push(cwd);
    }

    candidates
        .into_iter()
        .map(|base| base.join(rel))
        .find(|p| p.exists())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::overrides::{CACHEABLE_SOURCE_TYPES, CONFIG_DIR, FORM_SUBMIT_NANOTDF, POOL_CAPACITY};
    use crate::test_support::CopEnv;
    use serial_test::serial;
    use std::io::Write;

    fn write_toml(body: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        f.write_all(body.as_bytes()).unwrap();
        f
    }

    #[test]
    fn parses_full_file() {
        let f = write_toml(
            r#"
[pool]
capacity = 2

[cache]
cacheable_source_types = ["track", "facility"]

[client]
platform_url = "https://platform.example"
kas_url = "https://platform.example/kas"
form_submit_nano_tdf = true

[client.keycloak]
server_url = "https://idp.example/realms/cop"
client_id = "cop-web"
"#,
        );
        let cfg = load_config(f.path()).unwrap();
        assert_eq!(cfg.pool.capacity, 2);
        assert_eq!(cfg.cache.cacheable_source_types, vec!["track", "facility"]);
        assert!(cfg.client.form_submit_nano_tdf);
        assert_eq!(cfg.client.keycloak.client_id, "cop-web");
    }

    #[test]
    fn empty_file_gets_defaults() {
        let f = write_toml("");
        let cfg = load_config(f.path()).unwrap();
        assert_eq!(cfg, Config::default());
        assert_eq!(cfg.pool.capacity, 4);
    }

    #[test]
    fn schema_rejects_bad_values() {
        let zero = write_toml("[pool]\ncapacity = 0\n");
        assert!(load_config(zero.path()).is_err());
        let wrong_type = write_toml("[cache]\ncacheable_source_types = \"track\"\n");
        assert!(load_config(wrong_type.path()).is_err());
    }

    #[test]
    fn schema_mentions_sections() {
        let schema = config_schema_json().unwrap();
        let props = &schema["properties"];
        assert!(props.get("pool").is_some());
        assert!(props.get("cache").is_some());
        assert!(props.get("client").is_some());
    }

    #[test]
    #[serial]
    fn env_overrides_file_values() {
        let mut env = CopEnv::isolated();
        let f = write_toml("[pool]\ncapacity = 2\n");
        env.use_config_file(f.path());
        env.set(POOL_CAPACITY, "6");
        env.set(CACHEABLE_SOURCE_TYPES, "track, ,sensor");
        env.set(FORM_SUBMIT_NANOTDF, "nanotdf");
        let cfg = load_effective_config().unwrap();
        assert_eq!(cfg.pool.capacity, 6);
        assert_eq!(cfg.cache.cacheable_source_types, vec!["track", "sensor"]);
        assert!(cfg.client.form_submit_nano_tdf);
    }

    #[test]
    #[serial]
    fn invalid_capacity_override_is_ignored() {
        let mut env = CopEnv::isolated();
        let f = write_toml("[pool]\ncapacity = 3\n");
        env.use_config_file(f.path());
        env.set(POOL_CAPACITY, "0");
        assert_eq!(load_effective_config().unwrap().pool.capacity, 3);
    }

    #[test]
    #[serial]
    fn config_dir_env_is_searched_first() {
        let mut env = CopEnv::isolated();
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("configs")).unwrap();
        let target = dir.path().join("configs/site.toml");
        std::fs::write(&target, "").unwrap();
        env.set(CONFIG_DIR, dir.path().to_str().unwrap());
        assert_eq!(resolve_config_path("configs/site.toml"), Some(target));
        assert_eq!(resolve_config_path("configs/does-not-exist.toml"), None);
    }
}
