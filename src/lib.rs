//! Stateless session persistence for `tower-sessions`.
//!
//! The session record is written into a claim of a signed token, and the token text is split
//! across as many cookies as it needs (`jwt_session0`, `jwt_session1`, ...) followed by an empty
//! terminator cookie. On the next request the chunks are joined back in order until the first
//! missing or empty one, then the token is parsed and verified. Nothing is kept server-side.
//!
//! # Failure policy
//! A missing, truncated, malformed, forged or expired token never produces an error: it is
//! replaced by a fresh token and the request sees an empty session.
//!
//! # Size
//! The number of chunks read back is capped by [`JwtSessionConfig::with_max_chunk_index`], which
//! bounds the token to `max_chunk_index * chunk_size` bytes, leaving the last index for the
//! terminator. Writing a larger token fails.

pub mod chunk;
mod config;
mod cookies;
mod error;
pub mod format;
mod handler;
#[cfg(feature = "jwt")]
mod jwt;
pub mod layer;
mod store;
mod token;

pub use tower_cookies::cookie::SameSite;
pub use tower_sessions_core::{Session, session::Expiry, session_store};

pub use crate::config::{
    DEFAULT_CHUNK_SIZE, DEFAULT_COOKIE_PREFIX, DEFAULT_MAX_CHUNK_INDEX, DEFAULT_MAX_LIFETIME,
    JwtSessionConfig,
};
pub use crate::cookies::{CookieStore, MemoryCookieStore};
pub use crate::error::{Error, Result};
pub use crate::handler::{JwtSessionHandler, SessionHandler};
pub use crate::layer::JwtSessionManagerLayer;
pub use crate::token::{EXPIRATION_CLAIM, SESSION_CLAIM, Token, TokenManager};

#[cfg(feature = "jwt")]
pub use crate::jwt::{DEFAULT_TOKEN_TTL, HmacTokenManager};
