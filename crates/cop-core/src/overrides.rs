use crate::config::Config;

pub(crate) const CONFIG_FILE: &str = "COP_CONFIG";
pub(crate) const CONFIG_DIR: &str = "COP_CONFIG_DIR";
pub(crate) const POOL_CAPACITY: &str = "COP_POOL_CAPACITY";
pub(crate) const CACHEABLE_SOURCE_TYPES: &str = "COP_CACHEABLE_SOURCE_TYPES";
pub(crate) const FORM_SUBMIT_NANOTDF: &str = "COP_FORM_SUBMIT_NANOTDF";

/// Every variable the config loader reads.
#[cfg(test)]
pub(crate) const ALL: &[&str] = &[
    CONFIG_FILE,
    CONFIG_DIR,
    POOL_CAPACITY,
    CACHEABLE_SOURCE_TYPES,
    FORM_SUBMIT_NANOTDF,
];

/// Layer the `COP_*` environment on top of a loaded config.
///
/// Values that do not parse are logged and leave the file's setting alone.
pub(crate) fn apply(cfg: &mut Config) {
    if let Some(raw) = read(POOL_CAPACITY) {
        match worker_count(&raw) {
            Some(n) => cfg.pool.capacity = n,
            None => tracing::warn!(key = POOL_CAPACITY, value = %raw, "ignoring pool capacity override"),
        }
    }
    if let Some(raw) = read(CACHEABLE_SOURCE_TYPES) {
        cfg.cache.cacheable_source_types = source_type_list(&raw);
    }
    if let Some(raw) = read(FORM_SUBMIT_NANOTDF) {
        match codec_flag(&raw) {
            Some(nano) => cfg.client.form_submit_nano_tdf = nano,
            None => tracing::warn!(key = FORM_SUBMIT_NANOTDF, value = %raw, "ignoring codec override"),
        }
    }
}

pub(crate) fn read(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn worker_count(raw: &str) -> Option<usize> {
    raw.trim().parse::<usize>().ok().filter(|n| *n > 0)
}

/// Comma-separated source type ids; blanks are skipped.
fn source_type_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// `true` selects NanoTDF for form submissions. `nano`/`tdf3` are accepted
/// alongside the usual boolean spellings.
fn codec_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" | "nano" | "nanotdf" => Some(true),
        "0" | "false" | "no" | "off" | "tdf3" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::CopEnv;
    use serial_test::serial;

    #[test]
    fn codec_flag_accepts_codec_names() {
        assert_eq!(codec_flag(" NanoTDF "), Some(true));
        assert_eq!(codec_flag("on"), Some(true));
        assert_eq!(codec_flag("tdf3"), Some(false));
        assert_eq!(codec_flag("0"), Some(false));
        assert_eq!(codec_flag("zip"), None);
    }

    #[test]
    fn capacity_must_be_a_positive_count() {
        assert_eq!(worker_count(" 8 "), Some(8));
        assert_eq!(worker_count("0"), None);
        assert_eq!(worker_count("-2"), None);
        assert_eq!(worker_count("four"), None);
    }

    #[test]
    #[serial]
    fn unparsable_values_keep_file_settings() {
        let mut env = CopEnv::isolated();
        env.set(POOL_CAPACITY, "lots");
        env.set(FORM_SUBMIT_NANOTDF, "maybe");
        env.set(CACHEABLE_SOURCE_TYPES, " , ");
        let mut cfg = Config::default();
        cfg.pool.capacity = 3;
        cfg.client.form_submit_nano_tdf = true;
        cfg.cache.cacheable_source_types = vec!["track".into()];
        apply(&mut cfg);
        assert_eq!(cfg.pool.capacity, 3);
        assert!(cfg.client.form_submit_nano_tdf);
        assert!(cfg.cache.cacheable_source_types.is_empty());
    }

    #[test]
    #[serial]
    fn blank_variables_count_as_unset() {
        let mut env = CopEnv::isolated();
        env.set(CACHEABLE_SOURCE_TYPES, "   ");
        assert_eq!(read(CACHEABLE_SOURCE_TYPES), None);
        let mut cfg = Config::default();
        cfg.cache.cacheable_source_types = vec!["facility".into()];
        apply(&mut cfg);
        assert_eq!(cfg.cache.cacheable_source_types, vec!["facility"]);
    }
}
