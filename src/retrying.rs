use crate::error::{Error, Result};
use crate::request::{Request, Response};
use crate::retry::RetryPolicy;
use crate::transport::{AsyncTransport, DefaultSleeper, Sleeper, Transport, TransportError};
use log::{debug, trace};
use reqwest::header::HeaderMap;
use std::sync::Arc;
use std::time::Duration;

type Attempt = std::result::Result<Response, TransportError>;

/// What to do after an attempt completes.
#[derive(Debug, PartialEq)]
enum Step {
    Finish,
    Backoff(Duration),
}

/// Decide the next step for `attempt` under `policy`. Shared by the blocking
/// and async drivers so both follow exactly the same rules.
fn next_step(policy: &RetryPolicy, request: &Request, attempt: &Attempt) -> Step {
    let empty = HeaderMap::new();
    let (retryable, headers) = match attempt {
        Ok(res) => (policy.is_retryable_status(res.status()), res.headers()),
        Err(e) => (policy.is_retryable_error(e), &empty),
    };
    if policy.is_exhausted() || !retryable {
        return Step::Finish;
    }

    let wait = policy.compute_wait(headers);
    match attempt {
        Ok(res) => debug!(
            "{} {} returned {}, retry {}/{} in {:?}",
            request.method(),
            request.url(),
            res.status(),
            policy.attempts_made() + 1,
            policy.max_attempts(),
            wait
        ),
        Err(e) => debug!(
            "{} {} failed: {}, retry {}/{} in {:?}",
            request.method(),
            request.url(),
            e,
            policy.attempts_made() + 1,
            policy.max_attempts(),
            wait
        ),
    }
    Step::Backoff(wait)
}

/// Wraps a transport and retries failed requests according to a
/// [`RetryPolicy`].
///
/// The policy given at construction is a template: every call to
/// [`send`](Self::send) or [`send_async`](Self::send_async) starts from it
/// with zero attempts made, so independent requests never share a retry
/// budget.
///
/// Blocking and async transports are optional and independent. Calling the
/// side that has no transport returns [`Error::MissingCapability`].
#[derive(Clone)]
pub struct RetryingTransport {
    policy: RetryPolicy,
    blocking: Option<Arc<dyn Transport>>,
    non_blocking: Option<Arc<dyn AsyncTransport>>,
    sleeper: Arc<dyn Sleeper>,
}

impl Default for RetryingTransport {
    fn default() -> Self {
        Self::new(RetryPolicy::default())
    }
}

impl RetryingTransport {
    /// Create a `RetryingTransport` with no transports attached.
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            blocking: None,
            non_blocking: None,
            sleeper: Arc::new(DefaultSleeper),
        }
    }

    /// Attach the transport used by [`send`](Self::send).
    pub fn with_transport<T: Transport + 'static>(mut self, transport: T) -> Self {
        self.blocking = Some(Arc::new(transport));
        self
    }

    /// Attach the transport used by [`send_async`](Self::send_async).
    pub fn with_async_transport<T: AsyncTransport + 'static>(mut self, transport: T) -> Self {
        self.non_blocking = Some(Arc::new(transport));
        self
    }

    /// Replace how the transport waits between attempts.
    pub fn with_sleeper<S: Sleeper + 'static>(mut self, sleeper: S) -> Self {
        self.sleeper = Arc::new(sleeper);
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Send `request`, blocking the current thread through all attempts and
    /// waits.
    pub fn send(&self, request: &Request) -> Result<Response> {
        let transport = self
            .blocking
            .as_deref()
            .ok_or(Error::MissingCapability("blocking"))?;

        if !self.policy.is_retryable_method(request.method().as_str()) {
            trace!("{} is not retryable, sending once", request.method());
            return transport.send(request).map_err(Error::from);
        }

        let mut policy = self.policy.clone();
        loop {
            let attempt = transport.send(request);
            match next_step(&policy, request, &attempt) {
                Step::Finish => return attempt.map_err(Error::from),
                Step::Backoff(wait) => {
                    self.sleeper.sleep(wait);
                    policy = policy.increment();
                }
            }
        }
    }

    /// Send `request`, suspending only while the transport works and while
    /// waiting between attempts.
    pub async fn send_async(&self, request: &Request) -> Result<Response> {
        let transport = self
            .non_blocking
            .as_deref()
            .ok_or(Error::MissingCapability("async"))?;

        if !self.policy.is_retryable_method(request.method().as_str()) {
            trace!("{} is not retryable, sending once", request.method());
            return transport.send_async(request).await.map_err(Error::from);
        }

        let mut policy = self.policy.clone();
        loop {
            let attempt = transport.send_async(request).await;
            match next_step(&policy, request, &attempt) {
                Step::Finish => return attempt.map_err(Error::from),
                Step::Backoff(wait) => {
                    self.sleeper.sleep_async(wait).await;
                    policy = policy.increment();
                }
            }
        }
    }
}
