//! reprise retries failed HTTP requests. A [`RetryPolicy`] decides whether a
//! response or transport failure is worth another attempt and how long to
//! wait first; a [`RetryingTransport`] drives that policy around any
//! [`Transport`] (blocking) or [`AsyncTransport`] (async) and hands back the
//! final response or failure untouched.
//!
//! ```no_run
//! use reprise::{Client, RetryPolicy};
//!
//! # async fn run() -> reprise::Result<()> {
//! let policy = RetryPolicy::builder()
//!     .max_attempts(5)
//!     .backoff_factor(0.5)
//!     .build()?;
//! let client = Client::with_policy("https://example.com", policy);
//! let response = client.send(&client.get("/hello").build()?).await?;
//! println!("{}", response.status());
//! # Ok(())
//! # }
//! ```
mod adapter;
mod client;
pub mod config;
mod error;
mod request;
pub mod retry;
mod retrying;
mod transport;

#[cfg(feature = "blocking")]
pub use adapter::BlockingReqwestTransport;
pub use adapter::ReqwestTransport;
pub use client::Client;
pub use error::{Error, Result};
pub use request::{Request, RequestBuilder, Response};
pub use reqwest::header;
pub use reqwest::Method;
pub use reqwest::StatusCode;
pub use reqwest::Url;
pub use retry::{BackoffStrategy, RetryPolicy, RetryPolicyBuilder};
pub use retrying::RetryingTransport;
pub use transport::{
    AsyncTransport, DefaultSleeper, FailureKind, Sleeper, Transport, TransportError,
};
