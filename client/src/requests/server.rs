//! `api/server/version` and `api/authentication/validate`.

use serde::Deserialize;
use sonarlink_types::ServerVersion;

use crate::request::{ApiRequest, ParseError, ResponseFormat, parse_json};

pub const VERSION_PATH: &str = "api/server/version";
pub const VALIDATE_PATH: &str = "api/authentication/validate";

#[derive(Debug, Clone, Copy, Default)]
pub struct GetVersionRequest;

impl ApiRequest for GetVersionRequest {
    type Response = ServerVersion;

    fn path(&self) -> String {
        VERSION_PATH.to_string()
    }

    fn format(&self) -> ResponseFormat {
        ResponseFormat::Text
    }

    fn parse(&self, body: &[u8]) -> Result<ServerVersion, ParseError> {
        Ok(std::str::from_utf8(body)?.trim().parse()?)
    }
}

#[derive(Debug, Deserialize)]
struct ValidateResponse {
    valid: bool,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ValidateCredentialsRequest;

impl ApiRequest for ValidateCredentialsRequest {
    type Response = bool;

    fn path(&self) -> String {
        VALIDATE_PATH.to_string()
    }

    fn parse(&self, body: &[u8]) -> Result<bool, ParseError> {
        Ok(parse_json::<ValidateResponse>(body)?.valid)
    }
}
