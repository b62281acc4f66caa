use once_cell::sync::Lazy;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use crate::overrides;

static PROCESS_ENV: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

/// Exclusive view of the `COP_*` variables for one test.
///
/// Creating it saves and clears every variable the config loader reads, so a
/// developer's shell settings never leak in. Dropping it puts them back.
pub struct CopEnv {
    _lock: MutexGuard<'static, ()>,
    saved: Vec<(&'static str, Option<String>)>,
}

impl CopEnv {
    pub fn isolated() -> Self {
        let lock = PROCESS_ENV.lock().unwrap_or_else(|p| p.into_inner());
        let saved = overrides::ALL
            .iter()
            .map(|&key| (key, std::env::var(key).ok()))
            .collect();
        for key in overrides::ALL {
            std::env::remove_var(key);
        }
        Self { _lock: lock, saved }
    }

    pub fn set(&mut self, key: &'static str, value: &str) {
        debug_assert!(overrides::ALL.contains(&key), "{key} is not a config variable");
        std::env::set_var(key, value);
    }

    pub fn use_config_file(&mut self, path: &Path) {
        self.set(overrides::CONFIG_FILE, &path.to_string_lossy());
    }
}

impl Drop for CopEnv {
    fn drop(&mut self) {
        for (key, value) in self.saved.drain(..) {
            match value {
                Some(v) => std::env::set_var(key, v),
                None => std::env::remove_var(key),
            }
        }
    }
}
