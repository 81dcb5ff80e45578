//! Length-delimited protobuf responses (`batch/issues`).

use prost::Message;

/// Cursor over back-to-back varint-length-prefixed messages.
pub struct DelimitedReader<'a> {
    remaining: &'a [u8],
}

impl<'a> DelimitedReader<'a> {
    #[must_use]
    pub fn new(body: &'a [u8]) -> Self {
        Self { remaining: body }
    }

    #[must_use]
    pub fn has_next(&self) -> bool {
        !self.remaining.is_empty()
    }

    /// Decode the next message. A truncated length prefix or body is an error.
    pub fn read_next<M: Message + Default>(&mut self) -> Result<M, prost::DecodeError> {
        M::decode_length_delimited(&mut self.remaining)
    }

    /// Decode every remaining message.
    pub fn read_all<M: Message + Default>(mut self) -> Result<Vec<M>, prost::DecodeError> {
        let mut messages = Vec::new();
        while self.has_next() {
            messages.push(self.read_next()?);
        }
        Ok(messages)
    }
}

/// `ScannerInput.ServerIssue` as served by `batch/issues`.
#[derive(Clone, PartialEq, Message)]
pub struct ServerIssueProto {
    #[prost(string, optional, tag = "1")]
    pub key: Option<String>,
    #[prost(string, optional, tag = "2")]
    pub module_key: Option<String>,
    #[prost(string, optional, tag = "3")]
    pub path: Option<String>,
    #[prost(string, optional, tag = "4")]
    pub rule_repository: Option<String>,
    #[prost(string, optional, tag = "5")]
    pub rule_key: Option<String>,
    #[prost(int32, optional, tag = "6")]
    pub line: Option<i32>,
    #[prost(string, optional, tag = "7")]
    pub msg: Option<String>,
    #[prost(int32, optional, tag = "8")]
    pub severity: Option<i32>,
    #[prost(bool, optional, tag = "9")]
    pub manual_severity: Option<bool>,
    #[prost(string, optional, tag = "10")]
    pub resolution: Option<String>,
    #[prost(string, optional, tag = "11")]
    pub status: Option<String>,
    #[prost(string, optional, tag = "12")]
    pub checksum: Option<String>,
    #[prost(string, optional, tag = "13")]
    pub assignee_login: Option<String>,
    #[prost(int64, optional, tag = "14")]
    pub creation_date: Option<i64>,
    #[prost(string, optional, tag = "15")]
    pub r#type: Option<String>,
}

/// `Constants.Severity` wire values.
#[must_use]
pub fn severity_name(value: i32) -> Option<&'static str> {
    match value {
        0 => Some("INFO"),
        1 => Some("MINOR"),
        2 => Some("MAJOR"),
        3 => Some("CRITICAL"),
        4 => Some("BLOCKER"),
        _ => None,
    }
}
