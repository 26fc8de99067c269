//! The capability surface a [`RetryingTransport`](crate::RetryingTransport) wraps.
//!
//! Blocking and non-blocking sending are separate traits so a transport only
//! implements the half it can actually serve.
use crate::request::{Request, Response};
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::error::Error as StdError;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Broad category of a failed send, used to decide whether it is worth retrying.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The connection could not be established.
    Connect,
    /// The request or the connection timed out.
    Timeout,
    /// The connection broke while the request was in flight.
    Network,
    /// The peer spoke something we could not make sense of.
    Protocol,
    /// The request itself was malformed.
    Request,
    /// Anything else.
    Other,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FailureKind::Connect => "connect error",
            FailureKind::Timeout => "timeout",
            FailureKind::Network => "network error",
            FailureKind::Protocol => "protocol error",
            FailureKind::Request => "request error",
            FailureKind::Other => "transport error",
        };
        f.write_str(name)
    }
}

/// A failure reported by the underlying transport.
///
/// The retry layer never wraps or rewrites these; the caller receives the one
/// the transport produced on the final attempt.
#[derive(Debug, Error)]
#[error("{kind}: {source}")]
pub struct TransportError {
    kind: FailureKind,
    #[source]
    source: Box<dyn StdError + Send + Sync>,
}

impl TransportError {
    pub fn new<E>(kind: FailureKind, source: E) -> Self
    where
        E: Into<Box<dyn StdError + Send + Sync>>,
    {
        Self {
            kind,
            source: source.into(),
        }
    }

    pub fn kind(&self) -> FailureKind {
        self.kind
    }

    /// Borrow the error the transport originally raised.
    pub fn get_ref(&self) -> &(dyn StdError + Send + Sync + 'static) {
        &*self.source
    }

    pub fn into_inner(self) -> Box<dyn StdError + Send + Sync> {
        self.source
    }
}

/// Sends a request, blocking the calling thread until a response or failure.
pub trait Transport: Send + Sync {
    fn send(&self, request: &Request) -> Result<Response, TransportError>;
}

/// Sends a request without blocking; the returned future resolves once the
/// exchange completes.
pub trait AsyncTransport: Send + Sync {
    fn send_async<'a>(
        &'a self,
        request: &'a Request,
    ) -> BoxFuture<'a, Result<Response, TransportError>>;
}

/// How the retry loop waits between attempts.
pub trait Sleeper: Send + Sync {
    /// Block the current thread for `wait`.
    fn sleep(&self, wait: Duration);

    /// Yield to the executor until `wait` has elapsed.
    fn sleep_async(&self, wait: Duration) -> BoxFuture<'static, ()>;
}

/// Thread sleep for the blocking path, `tokio::time::sleep` for the async one.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultSleeper;

impl Sleeper for DefaultSleeper {
    fn sleep(&self, wait: Duration) {
        if !wait.is_zero() {
            std::thread::sleep(wait);
        }
    }

    fn sleep_async(&self, wait: Duration) -> BoxFuture<'static, ()> {
        Box::pin(tokio::time::sleep(wait))
    }
}
