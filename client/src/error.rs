use thiserror::Error;

use crate::auth::AuthError;
use crate::factory::FactoryError;
use crate::request::ParseError;
use crate::sse::SseError;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid URL {url:?}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("invalid {0} header value")]
    InvalidHeader(&'static str),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error("failed to build HTTP client: {0}")]
    Build(#[source] reqwest::Error),
    #[error("request to {path} failed: {source}")]
    Http {
        path: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{path} returned HTTP {status}")]
    UnexpectedStatus { path: String, status: u16 },
    #[error("failed to parse response from {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: ParseError,
    },
    #[error(transparent)]
    Factory(#[from] FactoryError),
    #[error(transparent)]
    Stream(#[from] SseError),
}
