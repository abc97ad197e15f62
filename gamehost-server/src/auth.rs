//! Caller authentication for the `/game` routes
//!
//! The server only needs a yes/no answer before a request may reach the
//! dispatcher. Implementations see the bearer token (if any) and nothing else.

use std::collections::HashSet;

/// Why a caller was turned away
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("missing bearer token")]
    MissingToken,

    #[error("invalid bearer token")]
    InvalidToken,
}

/// Decides whether a request may proceed
///
/// Must be `Send + Sync + 'static`: one instance is shared by every request
/// handler for the lifetime of the server.
pub trait Authenticator: Send + Sync + 'static {
    /// `token` is the value after `Bearer ` in the `Authorization` header
    fn authenticate(&self, token: Option<&str>) -> Result<(), AuthError>;
}

/// Accepts every caller
#[derive(Debug, Default, Clone, Copy)]
pub struct AllowAll;

impl Authenticator for AllowAll {
    fn authenticate(&self, _token: Option<&str>) -> Result<(), AuthError> {
        Ok(())
    }
}

/// Accepts callers presenting one of a fixed set of tokens
#[derive(Debug, Clone)]
pub struct StaticTokens {
    tokens: HashSet<String>,
}

impl StaticTokens {
    pub fn new<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            tokens: tokens.into_iter().map(Into::into).collect(),
        }
    }
}

impl Authenticator for StaticTokens {
    fn authenticate(&self, token: Option<&str>) -> Result<(), AuthError> {
        let token = token.ok_or(AuthError::MissingToken)?;
        if self.tokens.contains(token) {
            Ok(())
        } else {
            Err(AuthError::InvalidToken)
        }
    }
}

/// Pick the authenticator for a configured token list
pub fn from_tokens(tokens: &[String]) -> Box<dyn Authenticator> {
    if tokens.is_empty() {
        Box::new(AllowAll)
    } else {
        Box::new(StaticTokens::new(tokens.iter().cloned()))
    }
}

/// Extract the token from an `Authorization` header value
pub fn bearer_token(header: &str) -> Option<&str> {
    let (scheme, token) = header.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allow_all() {
        assert_eq!(AllowAll.authenticate(None), Ok(()));
        assert_eq!(AllowAll.authenticate(Some("anything")), Ok(()));
    }

    #[test]
    fn test_static_tokens() {
        let auth = StaticTokens::new(["alpha", "beta"]);

        assert_eq!(auth.authenticate(Some("beta")), Ok(()));
        assert_eq!(auth.authenticate(Some("gamma")), Err(AuthError::InvalidToken));
        assert_eq!(auth.authenticate(None), Err(AuthError::MissingToken));
    }

    #[test]
    fn test_from_tokens() {
        assert!(from_tokens(&[]).authenticate(None).is_ok());
        assert!(from_tokens(&["t".to_string()]).authenticate(None).is_err());
    }

    #[test]
    fn test_bearer_token() {
        assert_eq!(bearer_token("Bearer abc"), Some("abc"));
        assert_eq!(bearer_token("bearer  abc "), Some("abc"));
        assert_eq!(bearer_token("Basic abc"), None);
        assert_eq!(bearer_token("Bearer "), None);
        assert_eq!(bearer_token("Bearer"), None);
    }
}
