use figment::Error as ConfigError;
use reqwest::{Error as HttpError, StatusCode};
use serde_json::Error as JsonError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors from talking to the poll service or loading client state.
/// These are passed through to the caller without interpretation.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Http(#[from] HttpError),
    #[error(transparent)]
    Json(#[from] JsonError),
    #[error(transparent)]
    Config(#[from] Box<ConfigError>),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("Service error {status}: {message}")]
    Api { status: StatusCode, message: String },
    #[error("Not logged in")]
    Unauthenticated,
}

impl From<ConfigError> for Error {
    fn from(err: ConfigError) -> Self {
        Self::Config(Box::new(err))
    }
}

impl Error {
    /// The HTTP status the service answered with, if this error came from it.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Api { status, .. } => Some(*status),
            Self::Http(err) => err.status(),
            _ => None,
        }
    }
}
