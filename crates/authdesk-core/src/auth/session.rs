use std::fmt;

use crate::utils::format_token;

/// Access/refresh token pair issued by the backend.
#[derive(Clone, PartialEq, Eq)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

impl TokenPair {
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
        }
    }
}

// Tokens end up in logs through `?` fields, keep them shortened there.
impl fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenPair")
            .field("access_token", &format_token(Some(&self.access_token)))
            .field("refresh_token", &format_token(Some(&self.refresh_token)))
            .finish()
    }
}

/// Client-side record of authentication state.
///
/// Either both tokens are present (authenticated) or neither is.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    tokens: Option<TokenPair>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the session with a freshly issued token pair
    pub fn update(&mut self, tokens: TokenPair) {
        self.tokens = Some(tokens);
    }

    /// Clear session data
    pub fn clear(&mut self) {
        self.tokens = None;
    }

    pub fn is_authenticated(&self) -> bool {
        self.tokens.is_some()
    }

    pub fn access_token(&self) -> Option<&str> {
        self.tokens.as_ref().map(|t| t.access_token.as_str())
    }

    pub fn refresh_token(&self) -> Option<&str> {
        self.tokens.as_ref().map(|t| t.refresh_token.as_str())
    }
}
