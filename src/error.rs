use tower_sessions_core::session_store;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while emitting or decoding a chunked session token.
///
/// A token that fails to parse or verify is not an error: the handler falls back to a fresh
/// token and the caller sees an empty session.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("token signing failed: {0}")]
    Token(String),

    #[error("session token does not fit in the cookie set ({size} > {limit} bytes)")]
    TokenTooLarge { size: usize, limit: usize },

    #[error("session token text is not a valid cookie value")]
    TokenNotCookieSafe,

    #[error("session payload encode failed: {0}")]
    Encode(String),

    #[error("session payload decode failed: {0}")]
    Decode(String),
}

impl From<Error> for session_store::Error {
    fn from(err: Error) -> Self {
        match err {
            Error::Decode(msg) => Self::Decode(msg),
            Error::Encode(msg) => Self::Encode(msg),
            err @ (Error::TokenTooLarge { .. } | Error::TokenNotCookieSafe) => {
                Self::Encode(err.to_string())
            }
            err @ Error::Token(_) => Self::Backend(err.to_string()),
        }
    }
}

#[cfg(feature = "jwt")]
impl From<jsonwebtoken::errors::Error> for Error {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        Self::Token(err.to_string())
    }
}
