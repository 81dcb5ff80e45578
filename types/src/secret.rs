//! Secret-bearing values.
//!
//! `Debug` is manually implemented on every type here to redact the secret,
//! preventing accidental credential disclosure in logs or error messages.

use std::fmt;

/// A string that must never be logged.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    #[must_use]
    pub fn expose_secret(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(<redacted>)")
    }
}

impl From<String> for Secret {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Credentials for a server connection.
///
/// Exactly one of the two shapes; "no credentials" is represented by the
/// absence of a `Credentials` value, never by an empty variant.
#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    Token(Secret),
    UsernamePassword { username: String, password: Secret },
}

impl Credentials {
    #[must_use]
    pub fn token(token: impl Into<String>) -> Self {
        Self::Token(Secret::new(token))
    }

    #[must_use]
    pub fn username_password(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self::UsernamePassword {
            username: username.into(),
            password: Secret::new(password),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Token(_) => write!(f, "Credentials::Token(<redacted>)"),
            Self::UsernamePassword { username, .. } => {
                write!(f, "Credentials::UsernamePassword({username}, <redacted>)")
            }
        }
    }
}
