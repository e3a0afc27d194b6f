//! Runtime configuration.
//!
//! Resolved once, when the process-wide runtime is first used, from these
//! environment variables:
//! - `PROG1LIB_LEAK_CHECK`: `on` (default) or `off`. Initial value of the
//!   leak-check switch; `set_leak_checking` still overrides it at any time.
//! - `PROG1LIB_REALLOC_ZERO`: `minimal` (default) or `release`. What a
//!   reallocation to zero bytes does.
//! - `PROG1LIB_LEAKS_FAIL`: `off` (default) or `on`. When on, a non-empty leak
//!   report turns a zero exit status into `EXIT_FAILURE`.
//! - `PROG1LIB_LOG`: path of a JSONL file receiving every lifecycle record.

use std::path::PathBuf;

pub const LEAK_CHECK_ENV: &str = "PROG1LIB_LEAK_CHECK";
pub const REALLOC_ZERO_ENV: &str = "PROG1LIB_REALLOC_ZERO";
pub const LEAKS_FAIL_ENV: &str = "PROG1LIB_LEAKS_FAIL";
pub const LOG_ENV: &str = "PROG1LIB_LOG";

/// Behaviour of `reallocate(ptr, 0)`.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ZeroSizeRealloc {
    /// Keep a tracked block whose recorded size is zero.
    #[default]
    Minimal,
    /// Release the block and return null.
    Release,
}

impl ZeroSizeRealloc {
    /// Parse from string (case-insensitive). Unknown values fall back to the default.
    #[must_use]
    pub fn from_str_loose(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "release" | "free" => Self::Release,
            _ => Self::Minimal,
        }
    }
}

fn parse_switch(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "on" | "true" | "yes" | "enabled" => Some(true),
        "0" | "off" | "false" | "no" | "disabled" => Some(false),
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub leak_check: bool,
    pub zero_size_realloc: ZeroSizeRealloc,
    pub leaks_fail: bool,
    pub log_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            leak_check: true,
            zero_size_realloc: ZeroSizeRealloc::default(),
            leaks_fail: false,
            log_path: None,
        }
    }
}

impl Config {
    /// Resolve from the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolve from an arbitrary key lookup. Unparseable switches keep their default.
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            leak_check: lookup(LEAK_CHECK_ENV)
                .and_then(|v| parse_switch(&v))
                .unwrap_or(defaults.leak_check),
            zero_size_realloc: lookup(REALLOC_ZERO_ENV)
                .map(|v| ZeroSizeRealloc::from_str_loose(&v))
                .unwrap_or(defaults.zero_size_realloc),
            leaks_fail: lookup(LEAKS_FAIL_ENV)
                .and_then(|v| parse_switch(&v))
                .unwrap_or(defaults.leaks_fail),
            log_path: lookup(LOG_ENV)
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_nothing_is_set() {
        let config = Config::from_lookup(|_| None);
        assert_eq!(config, Config::default());
        assert!(config.leak_check);
        assert!(!config.leaks_fail);
        assert_eq!(config.zero_size_realloc, ZeroSizeRealloc::Minimal);
        assert!(config.log_path.is_none());
    }

    #[test]
    fn parses_all_keys() {
        let config = Config::from_lookup(lookup_from(&[
            (LEAK_CHECK_ENV, "OFF"),
            (REALLOC_ZERO_ENV, "Release"),
            (LEAKS_FAIL_ENV, "yes"),
            (LOG_ENV, "/tmp/prog1lib.jsonl"),
        ]));
        assert!(!config.leak_check);
        assert_eq!(config.zero_size_realloc, ZeroSizeRealloc::Release);
        assert!(config.leaks_fail);
        assert_eq!(config.log_path, Some(PathBuf::from("/tmp/prog1lib.jsonl")));
    }

    #[test]
    fn garbage_switches_keep_defaults() {
        let config = Config::from_lookup(lookup_from(&[
            (LEAK_CHECK_ENV, "maybe"),
            (LEAKS_FAIL_ENV, ""),
            (REALLOC_ZERO_ENV, "bogus"),
            (LOG_ENV, "  "),
        ]));
        assert_eq!(config, Config::default());
    }

    #[test]
    fn switch_parser_accepts_common_spellings() {
        for on in ["1", "on", "TRUE", "yes", "enabled"] {
            assert_eq!(parse_switch(on), Some(true), "{on}");
        }
        for off in ["0", "off", "False", "no", "disabled"] {
            assert_eq!(parse_switch(off), Some(false), "{off}");
        }
        assert_eq!(parse_switch("2"), None);
    }
}
