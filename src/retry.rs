//! Retry limits, eligibility rules and backoff computation.
//!
//! A [`RetryPolicy`] is an immutable value. Every retry step produces a new
//! policy through [`RetryPolicy::increment`], so a single policy can be used
//! as the template for any number of independent request sequences.
use chrono::DateTime;
use crate::error::{Error, Result};
use crate::transport::{DefaultSleeper, FailureKind, Sleeper, TransportError};
use log::warn;
use rand::Rng;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{Method, StatusCode};
use std::fmt;
use std::sync::{Arc, OnceLock};
use std::time::{Duration, SystemTime};

/// Methods retried unless configured otherwise. `POST` and `PATCH` are not
/// idempotent and are left out.
pub const DEFAULT_RETRYABLE_METHODS: [Method; 6] = [
    Method::HEAD,
    Method::GET,
    Method::PUT,
    Method::DELETE,
    Method::OPTIONS,
    Method::TRACE,
];

/// Status codes retried unless configured otherwise.
pub const DEFAULT_RETRYABLE_STATUS_CODES: [StatusCode; 4] = [
    StatusCode::TOO_MANY_REQUESTS,
    StatusCode::BAD_GATEWAY,
    StatusCode::SERVICE_UNAVAILABLE,
    StatusCode::GATEWAY_TIMEOUT,
];

/// Transport failures retried unless configured otherwise.
pub const DEFAULT_RETRYABLE_FAILURES: [FailureKind; 3] = [
    FailureKind::Connect,
    FailureKind::Timeout,
    FailureKind::Network,
];

pub const DEFAULT_MAX_ATTEMPTS: u32 = 10;
pub const DEFAULT_MAX_BACKOFF_WAIT: Duration = Duration::from_secs(120);
pub const DEFAULT_BACKOFF_JITTER: f64 = 1.0;

fn default_methods() -> Arc<[Method]> {
    static METHODS: OnceLock<Arc<[Method]>> = OnceLock::new();
    METHODS
        .get_or_init(|| Arc::from(DEFAULT_RETRYABLE_METHODS.to_vec()))
        .clone()
}

fn default_status_codes() -> Arc<[StatusCode]> {
    static CODES: OnceLock<Arc<[StatusCode]>> = OnceLock::new();
    CODES
        .get_or_init(|| Arc::from(&DEFAULT_RETRYABLE_STATUS_CODES[..]))
        .clone()
}

fn default_failures() -> Arc<[FailureKind]> {
    static FAILURES: OnceLock<Arc<[FailureKind]>> = OnceLock::new();
    FAILURES
        .get_or_init(|| Arc::from(&DEFAULT_RETRYABLE_FAILURES[..]))
        .clone()
}

/// Computes the wait before a retry in place of the built-in exponential
/// backoff.
///
/// The strategy is consulted once per retry after the first, with the policy
/// as it stands for that retry. Its result is capped at `max_backoff_wait`.
/// A server-sent `Retry-After` still takes precedence when honored.
///
/// Any `Fn(&RetryPolicy) -> Duration` closure is a strategy.
pub trait BackoffStrategy: Send + Sync {
    fn backoff(&self, policy: &RetryPolicy) -> Duration;
}

impl<F> BackoffStrategy for F
where
    F: Fn(&RetryPolicy) -> Duration + Send + Sync,
{
    fn backoff(&self, policy: &RetryPolicy) -> Duration {
        self(policy)
    }
}

/// Shared handle to a [`BackoffStrategy`]. Two handles are equal when they
/// point at the same strategy.
#[derive(Clone)]
struct CustomBackoff(Arc<dyn BackoffStrategy>);

impl fmt::Debug for CustomBackoff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CustomBackoff")
    }
}

impl PartialEq for CustomBackoff {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(
            Arc::as_ptr(&self.0) as *const u8,
            Arc::as_ptr(&other.0) as *const u8,
        )
    }
}

/// Describes when a request is retried and how long to wait in between.
///
/// With the defaults a request is retried up to 10 times, without any
/// computed backoff, honoring `Retry-After` up to a 120s ceiling.
///
/// When `backoff_factor` is non-zero the wait before a retry grows as
/// `backoff_factor * 2^attempts_made`, multiplied by a random factor drawn
/// uniformly from `[1 - backoff_jitter, 1]`, and capped at `max_backoff_wait`.
#[derive(Clone, Debug, PartialEq)]
pub struct RetryPolicy {
    max_attempts: u32,
    attempts_made: u32,
    backoff_factor: f64,
    max_backoff_wait: Duration,
    backoff_jitter: f64,
    respect_retry_after: bool,
    retryable_methods: Arc<[Method]>,
    retryable_status_codes: Arc<[StatusCode]>,
    retryable_failures: Arc<[FailureKind]>,
    backoff_strategy: Option<CustomBackoff>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            attempts_made: 0,
            backoff_factor: 0.0,
            max_backoff_wait: DEFAULT_MAX_BACKOFF_WAIT,
            backoff_jitter: DEFAULT_BACKOFF_JITTER,
            respect_retry_after: true,
            retryable_methods: default_methods(),
            retryable_status_codes: default_status_codes(),
            retryable_failures: default_failures(),
            backoff_strategy: None,
        }
    }
}

impl RetryPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builder() -> RetryPolicyBuilder {
        RetryPolicyBuilder::default()
    }

    /// Total retries allowed after the initial send.
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Retries already performed in the current sequence.
    pub fn attempts_made(&self) -> u32 {
        self.attempts_made
    }

    pub fn backoff_factor(&self) -> f64 {
        self.backoff_factor
    }

    pub fn max_backoff_wait(&self) -> Duration {
        self.max_backoff_wait
    }

    pub fn backoff_jitter(&self) -> f64 {
        self.backoff_jitter
    }

    pub fn respect_retry_after(&self) -> bool {
        self.respect_retry_after
    }

    pub fn retryable_methods(&self) -> &[Method] {
        &self.retryable_methods
    }

    pub fn retryable_status_codes(&self) -> &[StatusCode] {
        &self.retryable_status_codes
    }

    pub fn retryable_failures(&self) -> &[FailureKind] {
        &self.retryable_failures
    }

    /// Whether waits come from a custom [`BackoffStrategy`].
    pub fn has_backoff_strategy(&self) -> bool {
        self.backoff_strategy.is_some()
    }

    /// Case-insensitive check of `method` against the allowed methods.
    pub fn is_retryable_method(&self, method: &str) -> bool {
        self.retryable_methods
            .iter()
            .any(|m| m.as_str().eq_ignore_ascii_case(method))
    }

    pub fn is_retryable_status<S: Into<u16>>(&self, status: S) -> bool {
        let status = status.into();
        self.retryable_status_codes
            .iter()
            .any(|s| s.as_u16() == status)
    }

    pub fn is_retryable_failure(&self, kind: FailureKind) -> bool {
        self.retryable_failures.contains(&kind)
    }

    pub fn is_retryable_error(&self, error: &TransportError) -> bool {
        self.is_retryable_failure(error.kind())
    }

    pub fn is_exhausted(&self) -> bool {
        self.attempts_made >= self.max_attempts
    }

    /// Stand-alone eligibility check mirroring urllib3's `Retry.is_retry`.
    ///
    /// A response that carries a wait hint is reported as not retryable here.
    /// The retry loop does not use this helper and honors wait hints itself.
    pub fn is_retry<S: Into<u16>>(&self, method: &str, status: S, has_wait_hint: bool) -> bool {
        self.max_attempts > 0
            && self.is_retryable_method(method)
            && self.is_retryable_status(status)
            && !has_wait_hint
    }

    /// How long to wait before the next attempt, given the headers of the
    /// response that triggered the retry (empty for transport failures).
    ///
    /// A parseable `Retry-After` value wins over computed backoff, even when
    /// it is zero or already in the past. An unparseable one is logged and
    /// ignored. Nothing is waited before the first retry unless the server
    /// asks for it.
    pub fn compute_wait(&self, headers: &HeaderMap) -> Duration {
        if self.respect_retry_after {
            if let Some(hint) = wait_hint(headers) {
                match Self::parse_wait_hint(hint) {
                    Ok(wait) => return wait.min(self.max_backoff_wait),
                    Err(_) => warn!("Invalid Retry-After header: {}", hint),
                }
            }
        }

        if self.attempts_made == 0 {
            Duration::ZERO
        } else {
            self.backoff()
        }
    }

    /// Backoff for the current attempt count, capped at `max_backoff_wait`.
    ///
    /// Uses the custom strategy when one is set, otherwise
    /// [`RetryPolicy::exponential_backoff`].
    pub fn backoff(&self) -> Duration {
        match &self.backoff_strategy {
            Some(strategy) => strategy.0.backoff(self).min(self.max_backoff_wait),
            None => self.exponential_backoff(),
        }
    }

    /// Exponential backoff for the current attempt count, jittered and capped.
    pub fn exponential_backoff(&self) -> Duration {
        if self.backoff_factor == 0.0 {
            return Duration::ZERO;
        }

        let mut wait = self.backoff_factor * 2f64.powf(f64::from(self.attempts_made));
        if self.backoff_jitter > 0.0 {
            wait *= rand::thread_rng().gen_range(1.0 - self.backoff_jitter..=1.0);
        }

        Duration::from_secs_f64(wait.min(self.max_backoff_wait.as_secs_f64()))
    }

    /// Parse a `Retry-After` value: either whole seconds or an HTTP-date.
    ///
    /// Dates without a zone are read as UTC. Dates in the past yield zero.
    pub fn parse_wait_hint(value: &str) -> Result<Duration> {
        parse_wait_hint_at(value, SystemTime::now())
    }

    /// A copy of this policy with one more attempt recorded.
    #[must_use]
    pub fn increment(&self) -> Self {
        Self {
            attempts_made: self.attempts_made.saturating_add(1),
            ..self.clone()
        }
    }

    /// Block the current thread for the wait computed from `headers`.
    pub fn sleep(&self, headers: &HeaderMap) -> Duration {
        let wait = self.compute_wait(headers);
        DefaultSleeper.sleep(wait);
        wait
    }

    /// Suspend the current task for the wait computed from `headers`.
    pub async fn sleep_async(&self, headers: &HeaderMap) -> Duration {
        let wait = self.compute_wait(headers);
        DefaultSleeper.sleep_async(wait).await;
        wait
    }
}

fn wait_hint(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(RETRY_AFTER)?;
    match value.to_str() {
        Ok(hint) => Some(hint.trim()).filter(|hint| !hint.is_empty()),
        Err(_) => {
            warn!("Invalid Retry-After header: {:?}", value);
            None
        }
    }
}

fn parse_wait_hint_at(value: &str, now: SystemTime) -> Result<Duration> {
    let value = value.trim();
    let invalid = || Error::InvalidWaitHint(value.to_owned());

    if !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit()) {
        // Only overflow can fail here; such a wait is capped by the caller anyway.
        let secs = value.parse::<u64>().unwrap_or(u64::MAX);
        return Ok(Duration::from_secs(secs));
    }

    let when = parse_date(value)
        .or_else(|| parse_date(&format!("{} GMT", value)))
        .ok_or_else(invalid)?;
    Ok(when.duration_since(now).unwrap_or(Duration::ZERO))
}

/// IMF-fixdate, RFC 850 and asctime through `httpdate`, then RFC 2822 dates
/// with a numeric offset such as `-0500`.
fn parse_date(value: &str) -> Option<SystemTime> {
    httpdate::parse_http_date(value)
        .ok()
        .or_else(|| DateTime::parse_from_rfc2822(value).ok().map(SystemTime::from))
}

/// Builds a validated [`RetryPolicy`]. Every invariant is checked in
/// [`RetryPolicyBuilder::build`].
#[derive(Clone, Debug)]
pub struct RetryPolicyBuilder {
    max_attempts: u32,
    attempts_made: u32,
    backoff_factor: f64,
    max_backoff_wait: Duration,
    backoff_jitter: f64,
    respect_retry_after: bool,
    methods: Option<Vec<String>>,
    status_codes: Option<Vec<u16>>,
    failures: Option<Vec<FailureKind>>,
    backoff_strategy: Option<CustomBackoff>,
}

impl Default for RetryPolicyBuilder {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            attempts_made: 0,
            backoff_factor: 0.0,
            max_backoff_wait: DEFAULT_MAX_BACKOFF_WAIT,
            backoff_jitter: DEFAULT_BACKOFF_JITTER,
            respect_retry_after: true,
            methods: None,
            status_codes: None,
            failures: None,
            backoff_strategy: None,
        }
    }
}

impl RetryPolicyBuilder {
    pub fn max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn attempts_made(mut self, attempts_made: u32) -> Self {
        self.attempts_made = attempts_made;
        self
    }

    /// Base of the exponential backoff, in seconds. Zero disables it.
    pub fn backoff_factor(mut self, backoff_factor: f64) -> Self {
        self.backoff_factor = backoff_factor;
        self
    }

    pub fn max_backoff_wait(mut self, max_backoff_wait: Duration) -> Self {
        self.max_backoff_wait = max_backoff_wait;
        self
    }

    pub fn backoff_jitter(mut self, backoff_jitter: f64) -> Self {
        self.backoff_jitter = backoff_jitter;
        self
    }

    pub fn respect_retry_after(mut self, respect_retry_after: bool) -> Self {
        self.respect_retry_after = respect_retry_after;
        self
    }

    /// Replace the exponential backoff with a custom strategy.
    pub fn backoff_strategy<S>(mut self, strategy: S) -> Self
    where
        S: BackoffStrategy + 'static,
    {
        self.backoff_strategy = Some(CustomBackoff(Arc::new(strategy)));
        self
    }

    /// Methods eligible for retry, in any case. An empty set keeps the
    /// defaults.
    pub fn allowed_methods<I, S>(mut self, methods: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.methods = Some(methods.into_iter().map(|m| m.as_ref().to_owned()).collect());
        self
    }

    /// Status codes eligible for retry. An empty set keeps the defaults.
    pub fn status_forcelist<I>(mut self, codes: I) -> Self
    where
        I: IntoIterator<Item = u16>,
    {
        self.status_codes = Some(codes.into_iter().collect());
        self
    }

    pub fn retryable_failures<I>(mut self, failures: I) -> Self
    where
        I: IntoIterator<Item = FailureKind>,
    {
        self.failures = Some(failures.into_iter().collect());
        self
    }

    pub fn build(self) -> Result<RetryPolicy> {
        if !(self.backoff_factor.is_finite() && self.backoff_factor >= 0.0) {
            return Err(Error::Config(
                "backoff_factor must be non-negative".to_owned(),
            ));
        }
        if self.max_backoff_wait.is_zero() {
            return Err(Error::Config("max_backoff_wait must be positive".to_owned()));
        }
        if !(0.0..=1.0).contains(&self.backoff_jitter) {
            return Err(Error::Config(
                "backoff_jitter must be between 0 and 1".to_owned(),
            ));
        }

        let retryable_methods: Arc<[Method]> = match self.methods.filter(|m| !m.is_empty()) {
            None => default_methods(),
            Some(methods) => methods
                .iter()
                .map(|m| {
                    Method::from_bytes(m.to_ascii_uppercase().as_bytes())
                        .map_err(|_| Error::Config(format!("invalid HTTP method: {}", m)))
                })
                .collect::<Result<Vec<_>>>()?
                .into(),
        };
        let retryable_status_codes: Arc<[StatusCode]> =
            match self.status_codes.filter(|c| !c.is_empty()) {
                None => default_status_codes(),
                Some(codes) => codes
                    .into_iter()
                    .map(|c| {
                        StatusCode::from_u16(c)
                            .map_err(|_| Error::Config(format!("invalid status code: {}", c)))
                    })
                    .collect::<Result<Vec<_>>>()?
                    .into(),
            };
        let retryable_failures: Arc<[FailureKind]> = match self.failures {
            None => default_failures(),
            Some(failures) => failures.into(),
        };

        Ok(RetryPolicy {
            max_attempts: self.max_attempts,
            attempts_made: self.attempts_made,
            backoff_factor: self.backoff_factor,
            max_backoff_wait: self.max_backoff_wait,
            backoff_jitter: self.backoff_jitter,
            respect_retry_after: self.respect_retry_after,
            retryable_methods,
            retryable_status_codes,
            retryable_failures,
            backoff_strategy: self.backoff_strategy,
        })
    }
}
