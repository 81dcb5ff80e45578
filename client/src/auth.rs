//! `Authorization` header construction.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use sonarlink_types::{Credentials, Secret};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("username must not contain ':'")]
    UsernameContainsSeparator,
    #[error("username must not be empty")]
    EmptyUsername,
}

/// `Basic base64(username:password)`, UTF-8 encoded.
///
/// The username is rejected if it contains the `:` separator; the password may.
pub fn basic_auth_header(username: &str, password: &Secret) -> Result<Secret, AuthError> {
    if username.is_empty() {
        return Err(AuthError::EmptyUsername);
    }
    if username.contains(':') {
        return Err(AuthError::UsernameContainsSeparator);
    }
    let encoded = STANDARD.encode(format!("{username}:{}", password.expose_secret()));
    Ok(Secret::new(format!("Basic {encoded}")))
}

/// Header value for stored credentials. Tokens are sent as a username with an
/// empty password, which every SonarQube version accepts.
pub fn authorization_header(credentials: &Credentials) -> Result<Secret, AuthError> {
    match credentials {
        Credentials::Token(token) => basic_auth_header(token.expose_secret(), &Secret::new("")),
        Credentials::UsernamePassword { username, password } => {
            basic_auth_header(username, password)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(header: &Secret) -> String {
        let encoded = header.expose_secret().strip_prefix("Basic ").unwrap();
        String::from_utf8(STANDARD.decode(encoded).unwrap()).unwrap()
    }

    #[test]
    fn username_with_separator_is_rejected() {
        assert_eq!(
            basic_auth_header("domain:user", &Secret::new("pw")),
            Err(AuthError::UsernameContainsSeparator)
        );
        assert_eq!(
            basic_auth_header("", &Secret::new("pw")),
            Err(AuthError::EmptyUsername)
        );
    }

    #[test]
    fn non_ascii_pair_round_trips() {
        let header = basic_auth_header("שלום", &Secret::new("你好")).unwrap();
        let decoded = decode(&header);
        let (user, password) = decoded.split_once(':').unwrap();
        assert_eq!(user, "שלום");
        assert_eq!(password, "你好");
    }

    #[test]
    fn password_may_contain_separator() {
        let header = basic_auth_header("admin", &Secret::new("a:b:c")).unwrap();
        let decoded = decode(&header);
        let (user, password) = decoded.split_once(':').unwrap();
        assert_eq!((user, password), ("admin", "a:b:c"));
    }

    #[test]
    fn token_is_sent_as_username_with_empty_password() {
        let header = authorization_header(&Credentials::token("squ_123")).unwrap();
        assert_eq!(decode(&header), "squ_123:");
        assert!(!format!("{header:?}").contains("Basic"));
    }
}
