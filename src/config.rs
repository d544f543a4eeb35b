use std::borrow::Cow;

use time::{Duration, OffsetDateTime};
use tower_cookies::Cookie;

use crate::SameSite;

/// Default prefix of the chunk cookie names (`jwt_session0`, `jwt_session1`, ...).
pub const DEFAULT_COOKIE_PREFIX: &str = "jwt_session";

/// Default number of token bytes stored per cookie.
pub const DEFAULT_CHUNK_SIZE: usize = 4000;

/// Default highest chunk index read back from a request.
pub const DEFAULT_MAX_CHUNK_INDEX: usize = 100;

/// Default session lifetime applied when a session is refreshed.
pub const DEFAULT_MAX_LIFETIME: Duration = Duration::seconds(1440);

#[derive(Debug, Clone)]
pub struct JwtSessionConfig {
    pub(crate) prefix: Cow<'static, str>,
    pub(crate) chunk_size: usize,
    pub(crate) max_chunk_index: usize,
    pub(crate) max_lifetime: Duration,
    pub(crate) http_only: bool,
    pub(crate) same_site: SameSite,
    pub(crate) secure: bool,
    pub(crate) path: Cow<'static, str>,
    pub(crate) domain: Option<Cow<'static, str>>,
    pub(crate) refresh_on_activity: bool,
}

impl Default for JwtSessionConfig {
    fn default() -> Self {
        Self {
            prefix: DEFAULT_COOKIE_PREFIX.into(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_chunk_index: DEFAULT_MAX_CHUNK_INDEX,
            max_lifetime: DEFAULT_MAX_LIFETIME,
            http_only: true,
            same_site: SameSite::Strict,
            secure: true,
            path: "/".into(),
            domain: None,
            refresh_on_activity: true,
        }
    }
}

impl JwtSessionConfig {
    #[must_use]
    pub fn with_prefix<N: Into<Cow<'static, str>>>(mut self, prefix: N) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Bytes of token text per cookie. Values below one are raised to one.
    #[must_use]
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Highest chunk index read back or cleared. The terminator has to fit under it too, so
    /// tokens longer than `max_chunk_index * chunk_size` bytes are refused on write.
    #[must_use]
    pub fn with_max_chunk_index(mut self, max_chunk_index: usize) -> Self {
        self.max_chunk_index = max_chunk_index;
        self
    }

    #[must_use]
    pub fn with_max_lifetime(mut self, max_lifetime: Duration) -> Self {
        self.max_lifetime = max_lifetime;
        self
    }

    #[must_use]
    pub fn with_http_only(mut self, http_only: bool) -> Self {
        self.http_only = http_only;
        self
    }

    #[must_use]
    pub fn with_same_site(mut self, same_site: SameSite) -> Self {
        self.same_site = same_site;
        self
    }

    #[must_use]
    pub fn with_secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    #[must_use]
    pub fn with_path<P: Into<Cow<'static, str>>>(mut self, path: P) -> Self {
        self.path = path.into();
        self
    }

    #[must_use]
    pub fn with_domain<D: Into<Cow<'static, str>>>(mut self, domain: D) -> Self {
        self.domain = Some(domain.into());
        self
    }

    #[must_use]
    pub fn without_domain(mut self) -> Self {
        self.domain = None;
        self
    }

    /// Refresh the token expiration on requests that use the session without changing it.
    #[must_use]
    pub fn with_refresh_on_activity(mut self, refresh_on_activity: bool) -> Self {
        self.refresh_on_activity = refresh_on_activity;
        self
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn max_chunk_index(&self) -> usize {
        self.max_chunk_index
    }

    pub fn max_lifetime(&self) -> Duration {
        self.max_lifetime
    }

    /// Largest token, in bytes, that the cookie set can carry.
    pub fn max_token_bytes(&self) -> usize {
        self.max_chunk_index.saturating_mul(self.chunk_size)
    }

    /// A data or terminator chunk cookie expiring at `expires_at` (Unix seconds).
    ///
    /// `expires_at <= 0` yields a cookie without `Expires`, which lives until the browser closes.
    pub(crate) fn build_chunk_cookie(
        &self,
        name: String,
        value: String,
        expires_at: i64,
    ) -> Cookie<'static> {
        let mut cookie_builder = Cookie::build((name, value))
            .http_only(self.http_only)
            .same_site(self.same_site)
            .secure(self.secure)
            .path(self.path.clone());

        if expires_at > 0 {
            match OffsetDateTime::from_unix_timestamp(expires_at) {
                Ok(expires) => cookie_builder = cookie_builder.expires(expires),
                Err(err) => tracing::warn!(err = %err, expires_at, "chunk cookie expiry is out of range"),
            }
        }

        if let Some(domain) = self.domain.clone() {
            cookie_builder = cookie_builder.domain(domain);
        }

        cookie_builder.build()
    }

    /// An empty cookie that is already expired, overwriting whatever the browser holds.
    pub(crate) fn build_removal_cookie(&self, name: String) -> Cookie<'static> {
        let mut cookie_builder = Cookie::build((name, ""))
            .http_only(self.http_only)
            .same_site(self.same_site)
            .secure(self.secure)
            .path(self.path.clone())
            .max_age(Duration::ZERO)
            .expires(OffsetDateTime::UNIX_EPOCH);

        if let Some(domain) = self.domain.clone() {
            cookie_builder = cookie_builder.domain(domain);
        }

        cookie_builder.build()
    }
}
