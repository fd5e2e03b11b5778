//! Prefixed environment variable lookup.

use std::collections::HashMap;
use std::time::Duration;

/// Prefix applied to every bastion variable.
pub const DEFAULT_PREFIX: &str = "BASTION";

/// Reads `PREFIX_NAME` variables.
///
/// Values come from the process environment unless the reader was built
/// from an explicit set of variables, in which case only those are seen.
#[derive(Debug, Clone)]
pub struct EnvConfig {
    prefix: String,
    /// Explicit variables, replacing the process environment when present.
    vars: Option<HashMap<String, String>>,
}

impl Default for EnvConfig {
    fn default() -> Self {
        Self::new(DEFAULT_PREFIX)
    }
}

impl EnvConfig {
    /// Create a reader over the process environment.
    #[must_use]
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            vars: None,
        }
    }

    /// Create a reader over an explicit set of variables.
    #[must_use]
    pub fn from_vars<K, V>(prefix: impl Into<String>, vars: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            prefix: prefix.into(),
            vars: Some(vars.into_iter().map(|(k, v)| (k.into(), v.into())).collect()),
        }
    }

    /// `name` with the prefix applied.
    fn var_name(&self, name: &str) -> String {
        if self.prefix.is_empty() {
            name.to_uppercase()
        } else {
            format!("{}_{}", self.prefix, name.to_uppercase())
        }
    }

    /// Look up a variable by its full, unprefixed name.
    #[must_use]
    pub fn raw(&self, var_name: &str) -> Option<String> {
        match &self.vars {
            Some(vars) => vars.get(var_name).cloned(),
            None => std::env::var(var_name).ok(),
        }
    }

    /// String value. Empty counts as unset.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<String> {
        self.raw(&self.var_name(name)).filter(|v| !v.is_empty())
    }

    /// String value, or `default` when unset.
    #[must_use]
    pub fn get_or(&self, name: &str, default: &str) -> String {
        self.get(name).unwrap_or_else(|| default.to_string())
    }

    /// Parsed value. Unparsable values are logged and treated as unset.
    #[must_use]
    pub fn parse<T: std::str::FromStr>(&self, name: &str) -> Option<T> {
        let value = self.get(name)?;
        match value.trim().parse() {
            Ok(parsed) => Some(parsed),
            Err(_) => {
                tracing::warn!(var = %self.var_name(name), %value, "ignoring unparsable value");
                None
            }
        }
    }

    /// Whole seconds as a `Duration`.
    #[must_use]
    pub fn duration_secs(&self, name: &str) -> Option<Duration> {
        self.parse::<u64>(name).map(Duration::from_secs)
    }

    /// Milliseconds as a `Duration`.
    #[must_use]
    pub fn duration_millis(&self, name: &str) -> Option<Duration> {
        self.parse::<u64>(name).map(Duration::from_millis)
    }
}

/// Variable names read by the bastion (after the prefix).
pub mod vars {
    /// Directory for recordings.
    pub const RECORD_DIR: &str = "RECORD_DIR";
    /// Heartbeat period in seconds.
    pub const HEARTBEAT_SECS: &str = "HEARTBEAT_SECS";
    /// Transfer buffer size in bytes.
    pub const BUFFER_SIZE: &str = "BUFFER_SIZE";
    /// Grace period for reaping the child, in milliseconds.
    pub const REAP_GRACE_MS: &str = "REAP_GRACE_MS";
    /// Diagnostics file.
    pub const LOG_FILE: &str = "LOG_FILE";
    /// Log filter directive.
    pub const LOG: &str = "LOG";
    /// Largest payload accepted by the replay.
    pub const MAX_ENTRY: &str = "MAX_ENTRY";
    /// Shell to launch (unprefixed).
    pub const SHELL: &str = "SHELL";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_are_prefixed_and_uppercased() {
        let config = EnvConfig::new("BASTION");
        assert_eq!(config.var_name("record_dir"), "BASTION_RECORD_DIR");
        assert_eq!(EnvConfig::new("").var_name("shell"), "SHELL");
    }

    #[test]
    fn explicit_vars_shadow_process_env() {
        let config = EnvConfig::from_vars("T", [("T_LEVEL", "3")]);
        assert_eq!(config.parse::<u32>("level"), Some(3));
        // PATH is almost always set in the process, never in the explicit set.
        assert_eq!(config.raw("PATH"), None);
    }

    #[test]
    fn unparsable_and_empty_values_are_unset() {
        let config = EnvConfig::from_vars("T", [("T_N", "ten"), ("T_E", "")]);
        assert_eq!(config.parse::<u64>("n"), None);
        assert_eq!(config.get("e"), None);
        assert_eq!(config.get_or("e", "fallback"), "fallback");
    }

    #[test]
    fn durations() {
        let config = EnvConfig::from_vars("T", [("T_S", "2"), ("T_MS", "250")]);
        assert_eq!(config.duration_secs("s"), Some(Duration::from_secs(2)));
        assert_eq!(config.duration_millis("ms"), Some(Duration::from_millis(250)));
    }
}
