use crate::adapter::ReqwestTransport;
use crate::error::Result;
use crate::request::{Request, RequestBuilder, Response};
use crate::retry::RetryPolicy;
use crate::retrying::RetryingTransport;
use futures::prelude::*;
use reqwest::Method;
use std::sync::Arc;

/// The main client used for making requests.
///
/// `Client` stores a [`RetryingTransport`] over an async reqwest client,
/// together with the base url of the server. Every request sent through it
/// is retried according to the transport's policy.
#[derive(Clone)]
pub struct Client {
    inner: Arc<RetryingTransport>,
    base_url: String,
}

impl Client {
    /// Create a new `Client` with the default [`RetryPolicy`].
    pub fn new<S: ToString>(base_url: S) -> Self {
        Self::with_policy(base_url, RetryPolicy::default())
    }

    /// Create a new `Client` retrying according to `policy`.
    pub fn with_policy<S: ToString>(base_url: S, policy: RetryPolicy) -> Self {
        let transport =
            RetryingTransport::new(policy).with_async_transport(ReqwestTransport::new());
        Self::with_transport(base_url, transport)
    }

    /// Create a new `Client` sending through an existing `RetryingTransport`.
    pub fn with_transport<S: ToString>(base_url: S, transport: RetryingTransport) -> Self {
        Self {
            inner: Arc::new(transport),
            base_url: base_url.to_string(),
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        self.inner.policy()
    }

    fn url(&self, endpoint: &str) -> String {
        let endpoint = endpoint.trim_matches('/');
        format!("{}/{}", self.base_url.trim_end_matches('/'), endpoint)
    }

    /// Start a request to `endpoint`, relative to the base url.
    pub fn request(&self, method: Method, endpoint: &str) -> RequestBuilder {
        Request::builder(method, self.url(endpoint))
    }

    pub fn get(&self, endpoint: &str) -> RequestBuilder {
        self.request(Method::GET, endpoint)
    }

    pub fn head(&self, endpoint: &str) -> RequestBuilder {
        self.request(Method::HEAD, endpoint)
    }

    pub fn put(&self, endpoint: &str) -> RequestBuilder {
        self.request(Method::PUT, endpoint)
    }

    pub fn delete(&self, endpoint: &str) -> RequestBuilder {
        self.request(Method::DELETE, endpoint)
    }

    pub fn post(&self, endpoint: &str) -> RequestBuilder {
        self.request(Method::POST, endpoint)
    }

    /// Send a single `Request`
    pub async fn send(&self, request: &Request) -> Result<Response> {
        self.inner.send_async(request).await
    }

    /// Send multiple `Request`s one after the other, returning a stream of
    /// results. Each request gets its own retry budget.
    pub fn send_all<'a, I>(
        &'a self,
        requests: I,
    ) -> impl Stream<Item = Result<Response>> + Unpin + 'a
    where
        I: IntoIterator<Item = &'a Request> + 'a,
    {
        Box::pin(stream::iter(requests).then(move |r| self.send(r)))
    }
}
