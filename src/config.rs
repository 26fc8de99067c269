//! Loading a [`RetryPolicy`] from configuration.
//!
//! [`RetryConfig`] mirrors the builder with plain serializable values, so a
//! policy can live in a configuration file next to the rest of an
//! application's settings:
//!
//! ```
//! use reprise::config::RetryConfig;
//! use reprise::RetryPolicy;
//!
//! let config = RetryConfig::from_json(r#"{"max_attempts": 5, "backoff_factor": 0.5}"#).unwrap();
//! let policy = RetryPolicy::try_from(config).unwrap();
//! assert_eq!(policy.max_attempts(), 5);
//! ```
use crate::error::{Error, Result};
use crate::retry::RetryPolicy;
use crate::transport::FailureKind;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Serializable form of a [`RetryPolicy`]. Missing fields take the policy
/// defaults. Durations are in seconds.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RetryConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_attempts: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backoff_factor: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_backoff_wait: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backoff_jitter: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub respect_retry_after: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_methods: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_forcelist: Option<Vec<u16>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retryable_failures: Option<Vec<FailureKind>>,
}

impl RetryConfig {
    pub fn from_json(s: &str) -> Result<Self> {
        serde_json::from_str(s).map_err(|error| Error::Serde {
            error,
            msg: s.to_owned(),
        })
    }
}

impl TryFrom<RetryConfig> for RetryPolicy {
    type Error = Error;

    fn try_from(config: RetryConfig) -> Result<Self> {
        let mut builder = RetryPolicy::builder();
        if let Some(max_attempts) = config.max_attempts {
            builder = builder.max_attempts(max_attempts);
        }
        if let Some(factor) = config.backoff_factor {
            builder = builder.backoff_factor(factor);
        }
        if let Some(secs) = config.max_backoff_wait {
            let wait = Duration::try_from_secs_f64(secs)
                .map_err(|_| Error::Config("max_backoff_wait must be positive".to_owned()))?;
            builder = builder.max_backoff_wait(wait);
        }
        if let Some(jitter) = config.backoff_jitter {
            builder = builder.backoff_jitter(jitter);
        }
        if let Some(respect) = config.respect_retry_after {
            builder = builder.respect_retry_after(respect);
        }
        if let Some(methods) = config.allowed_methods {
            builder = builder.allowed_methods(methods);
        }
        if let Some(codes) = config.status_forcelist {
            builder = builder.status_forcelist(codes);
        }
        if let Some(failures) = config.retryable_failures {
            builder = builder.retryable_failures(failures);
        }
        builder.build()
    }
}

impl From<&RetryPolicy> for RetryConfig {
    fn from(policy: &RetryPolicy) -> Self {
        Self {
            max_attempts: Some(policy.max_attempts()),
            backoff_factor: Some(policy.backoff_factor()),
            max_backoff_wait: Some(policy.max_backoff_wait().as_secs_f64()),
            backoff_jitter: Some(policy.backoff_jitter()),
            respect_retry_after: Some(policy.respect_retry_after()),
            allowed_methods: Some(
                policy
                    .retryable_methods()
                    .iter()
                    .map(|m| m.as_str().to_owned())
                    .collect(),
            ),
            status_forcelist: Some(
                policy
                    .retryable_status_codes()
                    .iter()
                    .map(|s| s.as_u16())
                    .collect(),
            ),
            retryable_failures: Some(policy.retryable_failures().to_vec()),
        }
    }
}
