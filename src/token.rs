use std::fmt;

use serde_json::{Map, Value};
use time::Duration;

use crate::error::Result;

/// Claim carrying the serialized session payload.
pub const SESSION_CLAIM: &str = "session";

/// Reserved expiration claim, in seconds since the Unix epoch.
pub const EXPIRATION_CLAIM: &str = "exp";

/// Reserved issued-at claim, in seconds since the Unix epoch.
pub const ISSUED_AT_CLAIM: &str = "iat";

/// A signed token: its claims and the compact text they were signed into.
///
/// The text is what gets chunked into cookies. It is only ever produced by a [`TokenManager`],
/// which re-signs after every claim change so the two never drift apart.
///
/// Chunks go out as raw cookie values, so the text must be cookie-safe ASCII: visible characters
/// other than whitespace, `"`, `,`, `;`, `\` and `%`. Compact JWTs (base64url segments joined by
/// `.`) qualify.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    claims: Map<String, Value>,
    encoded: String,
}

impl Token {
    /// Assemble a token from claims and the text they were encoded into.
    ///
    /// Intended for [`TokenManager`] implementations.
    pub fn from_parts(claims: Map<String, Value>, encoded: String) -> Self {
        Self { claims, encoded }
    }

    pub fn claims(&self) -> &Map<String, Value> {
        &self.claims
    }

    pub fn claim(&self, name: &str) -> Option<&Value> {
        self.claims.get(name)
    }

    /// A string claim, or `default` when it is absent or not a string.
    pub fn string_claim<'a>(&'a self, name: &str, default: &'a str) -> &'a str {
        self.claim(name).and_then(Value::as_str).unwrap_or(default)
    }

    /// The `exp` claim, `0` when unset.
    pub fn expiration(&self) -> i64 {
        self.claim(EXPIRATION_CLAIM)
            .and_then(Value::as_i64)
            .unwrap_or(0)
    }

    /// The session payload, empty when the token carries none.
    pub fn session(&self) -> &str {
        self.string_claim(SESSION_CLAIM, "")
    }

    pub fn as_str(&self) -> &str {
        &self.encoded
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encoded)
    }
}

/// Creates, parses, verifies and re-signs session tokens.
///
/// Every operation is synchronous CPU work; none of them touch I/O.
pub trait TokenManager: fmt::Debug + Clone + Send + Sync + 'static {
    /// A fresh token carrying only the default claims.
    fn create_token(&self) -> Result<Token>;

    /// Decode `text` without verifying it. `None` when it is not a well-formed token.
    ///
    /// `text` is whatever [`Token::as_str`] produced, reassembled from cookies; an encoding that
    /// is not cookie-safe ASCII will not survive the trip.
    fn parse(&self, text: &str) -> Option<Token>;

    /// Signature and expiration check.
    fn is_valid(&self, token: &Token) -> bool;

    /// Set a string claim and re-sign.
    fn update_claim(&self, token: Token, name: &str, value: &str) -> Result<Token>;

    /// Move `exp` to `ttl_seconds` from now and re-sign.
    fn update_expiration(&self, token: &mut Token, ttl_seconds: i64) -> Result<()>;

    /// This manager with fresh tokens living for `ttl`.
    ///
    /// Managers without a configurable lifetime keep the default, which returns `self` unchanged.
    #[must_use]
    fn with_token_ttl(self, _ttl: Duration) -> Self {
        self
    }
}

/// Whether `text` can be carried verbatim in a cookie value.
pub(crate) fn is_cookie_safe(text: &str) -> bool {
    text.bytes().all(|b| {
        b.is_ascii_graphic() && !matches!(b, b'"' | b',' | b';' | b'\\' | b'%')
    })
}
