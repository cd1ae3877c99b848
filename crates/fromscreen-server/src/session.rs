//! Anonymous session identity.
//!
//! Callers are identified by an opaque `session_id` cookie. The quota and the
//! stored conversions are keyed by a hash of that token, never the token.

use axum::http::header::COOKIE;
use axum::http::{HeaderMap, HeaderValue};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Cookie holding the session token.
pub const SESSION_COOKIE: &str = "session_id";

/// Cookie lifetime in seconds (30 days).
pub const SESSION_MAX_AGE: u64 = 30 * 24 * 60 * 60;

/// The caller's session for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    token: String,
    /// True when the token was minted for this request and must be set.
    pub is_new: bool,
}

impl Session {
    /// Reads the session from request cookies, minting a new one when the
    /// cookie is absent or not a UUID.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        match extract_session_token(headers) {
            Some(token) => Self {
                token,
                is_new: false,
            },
            None => Self {
                token: Uuid::new_v4().to_string(),
                is_new: true,
            },
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    /// Hex SHA-256 of the token, used as the owner key.
    pub fn owner(&self) -> String {
        hex::encode(Sha256::digest(self.token.as_bytes()))
    }

    /// `Set-Cookie` value that stores this session in the browser.
    pub fn set_cookie(&self, secure: bool) -> Option<HeaderValue> {
        let mut cookie = format!(
            "{}={}; HttpOnly; SameSite=Strict; Path=/; Max-Age={}",
            SESSION_COOKIE, self.token, SESSION_MAX_AGE
        );
        if secure {
            cookie.push_str("; Secure");
        }
        HeaderValue::from_str(&cookie).ok()
    }
}

/// Finds a well-formed session token among the `Cookie` headers.
fn extract_session_token(headers: &HeaderMap) -> Option<String> {
    let prefix = format!("{}=", SESSION_COOKIE);
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|header| header.split(';'))
        .filter_map(|cookie| cookie.trim().strip_prefix(prefix.as_str()))
        .find_map(|token| Uuid::parse_str(token).ok())
        .map(|uuid| uuid.to_string())
}
