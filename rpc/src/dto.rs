//! Wire shapes shared by several services and listeners.

use std::fmt;

use serde::{Deserialize, Serialize};
use sonarlink_types::Credentials;

use crate::either::Either;

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenDto {
    pub token: String,
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsernamePasswordDto {
    pub username: String,
    pub password: String,
}

// Manual Debug impls to prevent leaking secrets in logs.
impl fmt::Debug for TokenDto {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenDto").field("token", &"[REDACTED]").finish()
    }
}

impl fmt::Debug for UsernamePasswordDto {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UsernamePasswordDto")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Token on the left, username/password on the right.
pub type CredentialsDto = Either<TokenDto, UsernamePasswordDto>;

impl From<&Credentials> for CredentialsDto {
    fn from(credentials: &Credentials) -> Self {
        match credentials {
            Credentials::Token(token) => Either::Left(TokenDto {
                token: token.expose_secret().to_string(),
            }),
            Credentials::UsernamePassword { username, password } => {
                Either::Right(UsernamePasswordDto {
                    username: username.clone(),
                    password: password.expose_secret().to_string(),
                })
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextRangeDto {
    pub start_line: u32,
    pub start_line_offset: u32,
    pub end_line: u32,
    pub end_line_offset: u32,
}
