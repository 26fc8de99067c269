use crate::transport::TransportError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid retry configuration: {0}")]
    Config(String),

    #[error("Invalid Retry-After header: {0}")]
    InvalidWaitHint(String),

    #[error("No {0} transport configured")]
    MissingCapability(&'static str),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("Serde error: {error}\nMsg: {msg}")]
    Serde {
        error: serde_json::Error,
        msg: String,
    },
}

impl Error {
    /// The underlying transport failure, if this error is one.
    pub fn as_transport(&self) -> Option<&TransportError> {
        match self {
            Error::Transport(e) => Some(e),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
