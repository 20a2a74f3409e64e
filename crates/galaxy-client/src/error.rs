//! Galaxy client errors

use galaxy_fetch::{FetchError, TransportError};
use thiserror::Error;

/// Galaxy client error
#[derive(Debug, Error)]
pub enum Error {
    /// A Galaxy API call failed
    #[error("{message}")]
    Api {
        /// HTTP status of the failure; 500 when no response was received
        status: u16,
        /// Message of the underlying fetch error
        message: String,
        /// Underlying fetch error
        #[source]
        source: FetchError,
    },
    /// The HTTP client could not be built
    #[error(transparent)]
    Transport(#[from] TransportError),
    /// Invalid proxy URL
    #[error("Invalid proxy url: {0}")]
    ProxyUrl(#[from] url::ParseError),
    /// Configuration error
    #[error(transparent)]
    Config(#[from] config::ConfigError),
}

impl From<FetchError> for Error {
    fn from(err: FetchError) -> Self {
        Error::Api {
            status: err.status().unwrap_or(500),
            message: err.to_string(),
            source: err,
        }
    }
}

impl Error {
    /// HTTP status to report for this error
    pub fn status(&self) -> u16 {
        match self {
            Error::Api { status, .. } => *status,
            _ => 500,
        }
    }
}
