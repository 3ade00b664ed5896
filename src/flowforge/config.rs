// SPDX-License-Identifier: MIT

//! Engine configuration
//!
//! Defaults for node timeouts, retries and caching. `from_env` reads
//! `FLOWFORGE_*` variables; the binary loads `.env` first.

use std::str::FromStr;
use std::time::Duration;

use crate::cdk::error::FlowError;

pub const ENV_TIMEOUT_MS: &str = "FLOWFORGE_TIMEOUT_MS";
pub const ENV_RETRY: &str = "FLOWFORGE_RETRY";
pub const ENV_RETRY_BACKOFF_MS: &str = "FLOWFORGE_RETRY_BACKOFF_MS";
pub const ENV_CACHE_TTL_SECS: &str = "FLOWFORGE_CACHE_TTL_SECS";
pub const ENV_SIMULATED_LATENCY_MS: &str = "FLOWFORGE_SIMULATED_LATENCY_MS";

#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Per-node execution timeout
    pub timeout: Duration,
    /// Total attempts per node
    pub retry: u32,
    /// Linear backoff unit; attempt `n` waits `n * retry_backoff` before the next try
    pub retry_backoff: Duration,
    /// Lifetime of a cache entry
    pub cache_ttl: Duration,
    /// Latency of the simulated component executor
    pub simulated_latency: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(30_000),
            retry: 3,
            retry_backoff: Duration::from_millis(1_000),
            cache_ttl: Duration::from_secs(5 * 60),
            simulated_latency: Duration::from_millis(50),
        }
    }
}

impl EngineConfig {
    /// Load configuration from the process environment
    pub fn from_env() -> Result<Self, FlowError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from any key lookup, falling back to defaults
    pub fn from_lookup<F>(lookup: F) -> Result<Self, FlowError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let timeout = parse::<u64, _>(&lookup, ENV_TIMEOUT_MS)?
            .map(Duration::from_millis)
            .unwrap_or(defaults.timeout);
        let retry = parse::<u32, _>(&lookup, ENV_RETRY)?
            .unwrap_or(defaults.retry);
        let retry_backoff = parse::<u64, _>(&lookup, ENV_RETRY_BACKOFF_MS)?
            .map(Duration::from_millis)
            .unwrap_or(defaults.retry_backoff);
        let cache_ttl = parse::<u64, _>(&lookup, ENV_CACHE_TTL_SECS)?
            .map(Duration::from_secs)
            .unwrap_or(defaults.cache_ttl);
        let simulated_latency = parse::<u64, _>(&lookup, ENV_SIMULATED_LATENCY_MS)?
            .map(Duration::from_millis)
            .unwrap_or(defaults.simulated_latency);

        if timeout.is_zero() {
            let message = format!("{} must be greater than 0", ENV_TIMEOUT_MS);
            return Err(FlowError::config(message));
        }

        Ok(Self {
            timeout,
            retry,
            retry_backoff,
            cache_ttl,
            simulated_latency,
        })
    }
}

fn parse<T, F>(lookup: &F, key: &str) -> Result<Option<T>, FlowError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) if raw.trim().is_empty() => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| {
                FlowError::config(format!("invalid value '{}' for {}: {}", raw, key, e))
            }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = EngineConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.retry, 3);
        assert_eq!(config.cache_ttl, Duration::from_secs(300));
        assert_eq!(config.retry_backoff, Duration::from_secs(1));
    }

    #[test]
    fn test_overrides() {
        let config = EngineConfig::from_lookup(lookup(&[
            (ENV_TIMEOUT_MS, "250"),
            (ENV_RETRY, "5"),
            (ENV_RETRY_BACKOFF_MS, "10"),
            (ENV_CACHE_TTL_SECS, " 60 "),
        ]))
        .unwrap();

        assert_eq!(config.timeout, Duration::from_millis(250));
        assert_eq!(config.retry, 5);
        assert_eq!(config.retry_backoff, Duration::from_millis(10));
        assert_eq!(config.cache_ttl, Duration::from_secs(60));
    }

    #[test]
    fn test_invalid_value_is_config_error() {
        let err = EngineConfig::from_lookup(lookup(&[(ENV_RETRY, "lots")])).unwrap_err();
        assert!(matches!(err, FlowError::Config(_)));
        assert!(err.to_string().contains(ENV_RETRY));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let result = EngineConfig::from_lookup(lookup(&[(ENV_TIMEOUT_MS, "0")]));
        assert!(result.is_err());
    }
}
