use crate::error::{Error, Result};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::{Method, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// An outgoing request.
///
/// The body is owned bytes so the same request can be sent again on every
/// attempt.
#[derive(Clone, Debug)]
pub struct Request {
    method: Method,
    url: Url,
    headers: HeaderMap,
    body: Option<Vec<u8>>,
}

impl Request {
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: HeaderMap::new(),
            body: None,
        }
    }

    /// Start building a request for `url`. Parse errors surface from `build`.
    pub fn builder<S: AsRef<str>>(method: Method, url: S) -> RequestBuilder {
        RequestBuilder::new(method, url)
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    pub fn body(&self) -> Option<&[u8]> {
        self.body.as_deref()
    }
}

/// Builder for [`Request`]. The first error encountered is kept and reported
/// by [`RequestBuilder::build`].
#[derive(Debug)]
pub struct RequestBuilder {
    request: Result<Request>,
}

impl RequestBuilder {
    pub fn new<S: AsRef<str>>(method: Method, url: S) -> Self {
        let request = Url::parse(url.as_ref())
            .map(|url| Request::new(method, url))
            .map_err(|e| Error::InvalidRequest(format!("{}: {}", url.as_ref(), e)));
        Self { request }
    }

    /// Add a header, replacing any previous value for the same name.
    pub fn header<K, V>(mut self, key: K, value: V) -> Self
    where
        HeaderName: TryFrom<K>,
        <HeaderName as TryFrom<K>>::Error: std::fmt::Display,
        HeaderValue: TryFrom<V>,
        <HeaderValue as TryFrom<V>>::Error: std::fmt::Display,
    {
        if let Ok(req) = self.request.as_mut() {
            let pair = HeaderName::try_from(key)
                .map_err(|e| e.to_string())
                .and_then(|k| {
                    HeaderValue::try_from(value)
                        .map(|v| (k, v))
                        .map_err(|e| e.to_string())
                });
            match pair {
                Ok((k, v)) => {
                    req.headers.insert(k, v);
                }
                Err(msg) => self.request = Err(Error::InvalidRequest(msg)),
            }
        }
        self
    }

    /// Append query pairs to the url.
    pub fn query<K, V>(mut self, pairs: &[(K, V)]) -> Self
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        if pairs.is_empty() {
            return self;
        }
        if let Ok(req) = self.request.as_mut() {
            let mut existing = req.url.query_pairs_mut();
            for (key, val) in pairs {
                existing.append_pair(key.as_ref(), val.as_ref());
            }
        }
        self
    }

    /// Serialize `value` as the JSON body.
    pub fn json<T: Serialize + ?Sized>(mut self, value: &T) -> Self {
        if let Ok(req) = self.request.as_mut() {
            match serde_json::to_vec(value) {
                Ok(body) => {
                    req.headers
                        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
                    req.body = Some(body);
                }
                Err(error) => {
                    self.request = Err(Error::Serde {
                        error,
                        msg: String::from("failed to encode request body"),
                    })
                }
            }
        }
        self
    }

    pub fn body<B: Into<Vec<u8>>>(mut self, body: B) -> Self {
        if let Ok(req) = self.request.as_mut() {
            req.body = Some(body.into());
        }
        self
    }

    pub fn build(self) -> Result<Request> {
        self.request
    }
}

/// A fully-read response.
#[derive(Clone, Debug)]
pub struct Response {
    status: StatusCode,
    headers: HeaderMap,
    body: Vec<u8>,
    url: Option<Url>,
}

impl Response {
    pub fn new(status: StatusCode, headers: HeaderMap, body: Vec<u8>) -> Self {
        Self {
            status,
            headers,
            body,
            url: None,
        }
    }

    /// Record the final url of the exchange, after any redirects.
    pub fn with_url(mut self, url: Url) -> Self {
        self.url = Some(url);
        self
    }

    /// The final url, when the transport reported one.
    pub fn url(&self) -> Option<&Url> {
        self.url.as_ref()
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn bytes(&self) -> &[u8] {
        &self.body
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(&self.body).map_err(|error| Error::Serde {
            error,
            msg: self.text(),
        })
    }
}
