//! [`Transport`] and [`AsyncTransport`] over reqwest.
use crate::request::{Request, Response};
use crate::transport::{AsyncTransport, FailureKind, TransportError};
use futures::future::BoxFuture;
use std::sync::Arc;

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        let kind = if e.is_timeout() {
            FailureKind::Timeout
        } else if e.is_connect() {
            FailureKind::Connect
        } else if e.is_builder() {
            FailureKind::Request
        } else if e.is_redirect() || e.is_body() || e.is_decode() {
            FailureKind::Protocol
        } else if e.is_request() {
            FailureKind::Network
        } else {
            FailureKind::Other
        };
        TransportError::new(kind, e)
    }
}

/// Sends requests with an async `reqwest::Client`.
#[derive(Clone, Debug, Default)]
pub struct ReqwestTransport {
    inner: Arc<reqwest::Client>,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_client(client: reqwest::Client) -> Self {
        Self {
            inner: Arc::new(client),
        }
    }
}

impl AsyncTransport for ReqwestTransport {
    fn send_async<'a>(
        &'a self,
        request: &'a Request,
    ) -> BoxFuture<'a, Result<Response, TransportError>> {
        Box::pin(async move {
            let mut req = self
                .inner
                .request(request.method().clone(), request.url().clone())
                .headers(request.headers().clone());
            if let Some(body) = request.body() {
                req = req.body(body.to_vec());
            }

            let res = req.send().await?;
            let status = res.status();
            let headers = res.headers().clone();
            let url = res.url().clone();
            let body = res.bytes().await?;
            Ok(Response::new(status, headers, body.to_vec()).with_url(url))
        })
    }
}

#[cfg(feature = "blocking")]
pub use self::blocking::BlockingReqwestTransport;

#[cfg(feature = "blocking")]
mod blocking {
    use crate::request::{Request, Response};
    use crate::transport::{Transport, TransportError};
    use std::sync::Arc;

    /// Sends requests with `reqwest::blocking::Client`.
    ///
    /// Like the client it wraps, this must not be created or used from inside
    /// an async runtime; use `spawn_blocking` there.
    #[derive(Clone, Debug, Default)]
    pub struct BlockingReqwestTransport {
        inner: Arc<reqwest::blocking::Client>,
    }

    impl BlockingReqwestTransport {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn from_client(client: reqwest::blocking::Client) -> Self {
            Self {
                inner: Arc::new(client),
            }
        }
    }

    impl Transport for BlockingReqwestTransport {
        fn send(&self, request: &Request) -> Result<Response, TransportError> {
            let mut req = self
                .inner
                .request(request.method().clone(), request.url().clone())
                .headers(request.headers().clone());
            if let Some(body) = request.body() {
                req = req.body(body.to_vec());
            }

            let res = req.send()?;
            let status = res.status();
            let headers = res.headers().clone();
            let url = res.url().clone();
            let body = res.bytes()?;
            Ok(Response::new(status, headers, body.to_vec()).with_url(url))
        }
    }
}
