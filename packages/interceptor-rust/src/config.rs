//! Interceptor configuration.

use serde::{Deserialize, Serialize};

/// Environment switch that disables client-side policy checking when set to
/// anything other than `"true"`.
pub const CLIENT_POLICY_CHECKING_ENV: &str = "OTS_CLIENT_POLICY_CHECKING";

/// Environment switch that disables transaction interoperability mode when
/// set to anything other than `"true"`.
pub const INTEROP_MODE_ENV: &str = "OTS_INTEROP_MODE";

/// Switches read once when the interceptor is constructed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterceptorConfig {
    /// Enforce the target's OTS policy before sending a request. Disabled
    /// only by test harnesses.
    pub check_policy: bool,
    /// Propagate real contexts to remote targets. When disabled, remote
    /// targets receive the null context instead.
    pub interop_mode: bool,
}

impl Default for InterceptorConfig {
    fn default() -> Self {
        Self {
            check_policy: true,
            interop_mode: true,
        }
    }
}

impl InterceptorConfig {
    /// Reads both switches from the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads both switches through `lookup`. A switch is on when its value is
    /// missing or exactly `"true"`.
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let flag = |key: &str| lookup(key).map_or(true, |v| v == "true");
        let config = Self {
            check_policy: flag(CLIENT_POLICY_CHECKING_ENV),
            interop_mode: flag(INTEROP_MODE_ENV),
        };
        tracing::debug!(
            check_policy = config.check_policy,
            interop_mode = config.interop_mode,
            "transaction interceptor configuration"
        );
        config
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_enable_both_switches() {
        let config = InterceptorConfig::default();
        assert!(config.check_policy);
        assert!(config.interop_mode);
    }

    #[test]
    fn missing_variables_mean_enabled() {
        assert_eq!(
            InterceptorConfig::from_lookup(lookup(&[])),
            InterceptorConfig::default()
        );
    }

    #[test]
    fn only_exact_true_enables() {
        let config = InterceptorConfig::from_lookup(lookup(&[
            (CLIENT_POLICY_CHECKING_ENV, "TRUE"),
            (INTEROP_MODE_ENV, "false"),
        ]));
        assert!(!config.check_policy);
        assert!(!config.interop_mode);
    }

    #[test]
    fn switches_are_independent() {
        let config = InterceptorConfig::from_lookup(lookup(&[(INTEROP_MODE_ENV, "no")]));
        assert!(config.check_policy);
        assert!(!config.interop_mode);
    }
}
