//! The shape shared by every versioned request.

use serde::de::DeserializeOwned;
use sonarlink_types::VersionParseError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid protobuf: {0}")]
    Protobuf(#[from] prost::DecodeError),
    #[error("response is not UTF-8")]
    Utf8(#[from] std::str::Utf8Error),
    #[error(transparent)]
    Version(#[from] VersionParseError),
}

/// Wire format of a response body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseFormat {
    Json,
    Text,
    /// Length-delimited protobuf messages back to back.
    Protobuf,
}

impl ResponseFormat {
    #[must_use]
    pub const fn accept(self) -> &'static str {
        match self {
            Self::Json => "application/json",
            Self::Text => "text/plain",
            Self::Protobuf => "application/x-protobuf",
        }
    }
}

/// One GET against a relative API path.
pub trait ApiRequest: Send + Sync {
    type Response;

    fn path(&self) -> String;

    fn query(&self) -> Vec<(&'static str, String)> {
        Vec::new()
    }

    fn format(&self) -> ResponseFormat {
        ResponseFormat::Json
    }

    fn parse(&self, body: &[u8]) -> Result<Self::Response, ParseError>;
}

/// Status plus the parsed value; `value` is `None` for non-success statuses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestResult<T> {
    pub status: u16,
    pub value: Option<T>,
}

impl<T> RequestResult<T> {
    #[must_use]
    pub fn ok(status: u16, value: T) -> Self {
        Self {
            status,
            value: Some(value),
        }
    }

    #[must_use]
    pub fn failed(status: u16) -> Self {
        Self {
            status,
            value: None,
        }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        self.value.is_some()
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> RequestResult<U> {
        RequestResult {
            status: self.status,
            value: self.value.map(f),
        }
    }
}

pub(crate) fn parse_json<T: DeserializeOwned>(body: &[u8]) -> Result<T, ParseError> {
    Ok(serde_json::from_slice(body)?)
}
