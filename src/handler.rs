use time::Duration;

use crate::{
    chunk,
    config::JwtSessionConfig,
    cookies::CookieStore,
    error::{Error, Result},
    token::{SESSION_CLAIM, Token, TokenManager, is_cookie_safe},
};

/// Storage contract for an opaque, string-encoded session payload.
///
/// The session id is accepted for parity with id-keyed backends; a cookie-carried token is
/// already scoped to the client that sent it, so implementations here ignore it.
pub trait SessionHandler {
    /// The stored payload, empty when there is no usable session.
    fn read(&self, session_id: &str) -> Result<String>;

    /// Replace the stored payload.
    fn write(&self, session_id: &str, data: &str) -> Result<()>;

    /// Replace the stored payload and extend the session lifetime.
    fn touch(&self, session_id: &str, data: &str) -> Result<()>;

    fn destroy(&self, session_id: &str) -> Result<()>;

    /// Sweep sessions idle for longer than `max_lifetime`. Returns how many were removed.
    fn gc(&self, max_lifetime: Duration) -> Result<usize>;

    fn close(&self) -> Result<()>;
}

/// Keeps the session inside a signed token spread over the cookies `<prefix>0`, `<prefix>1`, ...
///
/// Every operation starts by resolving the token from the cookie store: the chunks are joined,
/// parsed and verified, and anything missing, malformed, forged or expired is replaced by a fresh
/// token. Callers never see those failures, only an empty session.
#[derive(Debug, Clone)]
pub struct JwtSessionHandler<T: TokenManager, S: CookieStore> {
    tokens: T,
    cookies: S,
    config: JwtSessionConfig,
}

impl<T: TokenManager, S: CookieStore> JwtSessionHandler<T, S> {
    pub fn new(tokens: T, cookies: S, config: JwtSessionConfig) -> Self {
        Self {
            tokens,
            cookies,
            config,
        }
    }

    pub fn cookies(&self) -> &S {
        &self.cookies
    }

    pub fn config(&self) -> &JwtSessionConfig {
        &self.config
    }

    /// Whether the request carried at least the first chunk of a session token.
    pub fn has_session_cookies(&self) -> bool {
        self.cookies
            .get(&chunk::cookie_name(&self.config.prefix, 0))
            .is_some_and(|cookie| !cookie.value().is_empty())
    }

    pub fn resolve_token(&self) -> Result<Token> {
        let text = chunk::join(
            |name| {
                self.cookies
                    .get(name)
                    .map(|cookie| cookie.value().to_string())
            },
            &self.config.prefix,
            self.config.max_chunk_index,
        );

        if text.is_empty() {
            return self.tokens.create_token();
        }

        match self.tokens.parse(&text) {
            Some(token) if self.tokens.is_valid(&token) => Ok(token),
            Some(_) => {
                tracing::debug!("session token is invalid or expired, starting a new one");
                self.tokens.create_token()
            }
            None => {
                tracing::debug!(len = text.len(), "session token is malformed, starting a new one");
                self.tokens.create_token()
            }
        }
    }

    /// Queue `token` as chunk cookies expiring with the token, followed by a terminator.
    ///
    /// The terminator must land at or below `max_chunk_index` so that `destroy` reaches every
    /// cookie written here.
    fn emit(&self, token: &Token) -> Result<()> {
        let text = token.to_string();
        if !is_cookie_safe(&text) {
            return Err(Error::TokenNotCookieSafe);
        }
        let chunks = chunk::split(&text, self.config.chunk_size);

        if chunks.len() - 1 > self.config.max_chunk_index {
            return Err(Error::TokenTooLarge {
                size: text.len(),
                limit: self.config.max_token_bytes(),
            });
        }

        let expires_at = token.expiration();
        for chunk in &chunks {
            let cookie = self.config.build_chunk_cookie(
                chunk.cookie_name(&self.config.prefix),
                chunk.value.to_string(),
                expires_at,
            );
            self.cookies.set(cookie);
        }

        tracing::trace!(chunks = chunks.len() - 1, bytes = text.len(), "session token queued");
        Ok(())
    }
}

impl<T: TokenManager, S: CookieStore> SessionHandler for JwtSessionHandler<T, S> {
    fn read(&self, _session_id: &str) -> Result<String> {
        let token = self.resolve_token()?;
        Ok(token.session().to_string())
    }

    fn write(&self, _session_id: &str, data: &str) -> Result<()> {
        let token = self.resolve_token()?;
        let token = self.tokens.update_claim(token, SESSION_CLAIM, data)?;
        self.emit(&token)
    }

    fn touch(&self, _session_id: &str, data: &str) -> Result<()> {
        let token = self.resolve_token()?;
        let mut token = self.tokens.update_claim(token, SESSION_CLAIM, data)?;
        self.tokens
            .update_expiration(&mut token, self.config.max_lifetime.whole_seconds())?;
        self.emit(&token)
    }

    fn destroy(&self, _session_id: &str) -> Result<()> {
        for index in 0..=self.config.max_chunk_index {
            let name = chunk::cookie_name(&self.config.prefix, index);
            self.cookies.set(self.config.build_removal_cookie(name));
        }
        Ok(())
    }

    fn gc(&self, _max_lifetime: Duration) -> Result<usize> {
        Ok(0)
    }

    fn close(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{Map, Value};
    use time::OffsetDateTime;
    use tower_cookies::Cookie;

    use super::*;
    use crate::{
        cookies::MemoryCookieStore,
        token::{EXPIRATION_CLAIM, SESSION_CLAIM},
    };

    /// Unsigned tokens whose text is exactly the session payload.
    #[derive(Debug, Clone)]
    struct PayloadTokens;

    fn far_future() -> i64 {
        OffsetDateTime::now_utc().unix_timestamp() + 3600
    }

    impl TokenManager for PayloadTokens {
        fn create_token(&self) -> Result<Token> {
            let mut claims = Map::new();
            claims.insert(EXPIRATION_CLAIM.into(), far_future().into());
            Ok(Token::from_parts(claims, String::new()))
        }

        fn parse(&self, text: &str) -> Option<Token> {
            if text.starts_with("malformed") {
                return None;
            }
            let mut claims = Map::new();
            claims.insert(EXPIRATION_CLAIM.into(), far_future().into());
            claims.insert(SESSION_CLAIM.into(), text.into());
            Some(Token::from_parts(claims, text.to_string()))
        }

        fn is_valid(&self, token: &Token) -> bool {
            !token.session().starts_with("forged")
        }

        fn update_claim(&self, token: Token, name: &str, value: &str) -> Result<Token> {
            let mut claims = token.claims().clone();
            claims.insert(name.into(), Value::from(value));
            let encoded = claims
                .get(SESSION_CLAIM)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            Ok(Token::from_parts(claims, encoded))
        }

        fn update_expiration(&self, token: &mut Token, ttl_seconds: i64) -> Result<()> {
            let mut claims = token.claims().clone();
            claims.insert(
                EXPIRATION_CLAIM.into(),
                (OffsetDateTime::now_utc().unix_timestamp() + ttl_seconds).into(),
            );
            *token = Token::from_parts(claims, token.to_string());
            Ok(())
        }
    }

    fn handler(store: MemoryCookieStore) -> JwtSessionHandler<PayloadTokens, MemoryCookieStore> {
        JwtSessionHandler::new(PayloadTokens, store, JwtSessionConfig::default())
    }

    fn outbound_values(store: &MemoryCookieStore) -> Vec<(String, usize)> {
        let mut cookies: Vec<(String, usize)> = store
            .outbound()
            .iter()
            .map(|c| (c.name().to_string(), c.value().len()))
            .collect();
        cookies.sort();
        cookies
    }

    #[test]
    fn large_payload_spans_three_chunks() {
        let handler = handler(MemoryCookieStore::new());
        handler
            .write("", &"x".repeat(9000))
            .expect("write succeeds");

        assert_eq!(
            outbound_values(handler.cookies()),
            vec![
                ("jwt_session0".to_string(), 4000),
                ("jwt_session1".to_string(), 4000),
                ("jwt_session2".to_string(), 1000),
                ("jwt_session3".to_string(), 0),
            ]
        );
    }

    #[test]
    fn chunk_cookies_expire_with_token() {
        let handler = handler(MemoryCookieStore::new());
        handler.write("", "hello").expect("write succeeds");

        let cookies = handler.cookies().outbound();
        assert_eq!(cookies.len(), 2);
        for cookie in cookies {
            let expires = cookie
                .expires_datetime()
                .expect("chunk cookie has expires")
                .unix_timestamp();
            assert!((expires - far_future()).abs() <= 1);
        }
    }

    #[test]
    fn no_cookies_reads_empty() {
        let handler = handler(MemoryCookieStore::new());

        assert_eq!(handler.read("").expect("read succeeds"), "");
        assert!(!handler.has_session_cookies());
    }

    #[test]
    fn write_then_read_in_same_request() {
        let handler = handler(MemoryCookieStore::new());
        handler.write("", "payload").expect("write succeeds");

        assert_eq!(handler.read("").expect("read succeeds"), "payload");
    }

    #[test]
    fn write_then_read_on_next_request() {
        let first = handler(MemoryCookieStore::new());
        first.write("", "hello").expect("write succeeds");

        let second = handler(MemoryCookieStore::with_inbound(first.cookies().outbound()));

        assert!(second.has_session_cookies());
        assert_eq!(second.read("").expect("read succeeds"), "hello");
    }

    #[test]
    fn stale_chunks_above_gap_are_ignored() {
        let store = MemoryCookieStore::with_inbound([
            Cookie::new("jwt_session0", "abc"),
            Cookie::new("jwt_session1", ""),
            Cookie::new("jwt_session2", "stale"),
        ]);

        assert_eq!(handler(store).read("").expect("read succeeds"), "abc");
    }

    #[test]
    fn shorter_write_leaves_terminator_before_stale_chunks() {
        let first = handler(MemoryCookieStore::new());
        first.write("", &"a".repeat(9000)).expect("write succeeds");

        let second = handler(MemoryCookieStore::with_inbound(first.cookies().outbound()));
        second.write("", "short").expect("write succeeds");

        let third = handler(MemoryCookieStore::with_inbound(second.cookies().all()));
        assert_eq!(third.read("").expect("read succeeds"), "short");
    }

    #[test]
    fn malformed_token_falls_back_to_empty_session() {
        let store = MemoryCookieStore::with_inbound([Cookie::new("jwt_session0", "malformed")]);

        assert_eq!(handler(store).read("").expect("read succeeds"), "");
    }

    #[test]
    fn invalid_token_falls_back_to_empty_session() {
        let store = MemoryCookieStore::with_inbound([Cookie::new("jwt_session0", "forged")]);
        let handler = handler(store);

        assert_eq!(handler.read("").expect("read succeeds"), "");

        handler.write("", "fresh").expect("write succeeds");
        assert_eq!(handler.read("").expect("read succeeds"), "fresh");
    }

    #[test]
    fn touch_refreshes_expiration() {
        let config = JwtSessionConfig::default().with_max_lifetime(Duration::hours(5));
        let handler = JwtSessionHandler::new(PayloadTokens, MemoryCookieStore::new(), config);
        handler.touch("", "kept").expect("touch succeeds");

        let expected = OffsetDateTime::now_utc().unix_timestamp() + 5 * 3600;
        let cookies = handler.cookies().outbound();
        assert_eq!(cookies.len(), 2);
        for cookie in cookies {
            let expires = cookie
                .expires_datetime()
                .expect("chunk cookie has expires")
                .unix_timestamp();
            assert!((expires - expected).abs() <= 1);
            assert_eq!(cookie.http_only(), Some(true));
            assert_eq!(cookie.secure(), Some(true));
        }
        assert_eq!(handler.read("").expect("read succeeds"), "kept");
    }

    #[test]
    fn write_and_touch_share_cookie_flags() {
        let config = JwtSessionConfig::default();
        let written = JwtSessionHandler::new(PayloadTokens, MemoryCookieStore::new(), config);
        written.write("", "data").expect("write succeeds");

        for cookie in written.cookies().outbound() {
            assert_eq!(cookie.http_only(), Some(true));
            assert_eq!(cookie.secure(), Some(true));
        }
    }

    #[test]
    fn destroy_expires_every_index() {
        let store = MemoryCookieStore::with_inbound([Cookie::new("jwt_session0", "abc")]);
        let handler = handler(store);
        handler.destroy("").expect("destroy succeeds");

        let cookies = handler.cookies().outbound();
        assert_eq!(cookies.len(), 101);
        for cookie in &cookies {
            assert_eq!(cookie.value(), "");
            assert_eq!(cookie.max_age(), Some(Duration::ZERO));
        }
        for index in 0..=100 {
            let name = format!("jwt_session{index}");
            assert!(cookies.iter().any(|c| c.name() == name));
        }
        assert_eq!(handler.read("").expect("read succeeds"), "");
    }

    #[test]
    fn destroy_honors_max_chunk_index() {
        let config = JwtSessionConfig::default().with_max_chunk_index(3);
        let handler = JwtSessionHandler::new(PayloadTokens, MemoryCookieStore::new(), config);
        handler.destroy("").expect("destroy succeeds");

        assert_eq!(handler.cookies().outbound().len(), 4);
    }

    #[test]
    fn oversized_token_is_refused() {
        let config = JwtSessionConfig::default()
            .with_chunk_size(10)
            .with_max_chunk_index(2);
        let handler = JwtSessionHandler::new(PayloadTokens, MemoryCookieStore::new(), config);

        handler
            .write("", &"f".repeat(20))
            .expect("payload at the cap fits");
        let err = handler
            .write("", &"f".repeat(21))
            .expect_err("payload over the cap is refused");

        assert!(matches!(
            err,
            Error::TokenTooLarge {
                size: 21,
                limit: 20
            }
        ));
    }

    #[test]
    fn terminator_never_lands_above_max_chunk_index() {
        // Three data chunks would need a terminator at index 3, out of reach of destroy.
        let config = JwtSessionConfig::default()
            .with_chunk_size(10)
            .with_max_chunk_index(2);
        let refused =
            JwtSessionHandler::new(PayloadTokens, MemoryCookieStore::new(), config.clone());
        assert!(refused.write("", &"f".repeat(30)).is_err());
        assert!(refused.cookies().outbound().is_empty());

        let written =
            JwtSessionHandler::new(PayloadTokens, MemoryCookieStore::new(), config.clone());
        written.write("", &"f".repeat(20)).expect("write succeeds");
        let destroyed = JwtSessionHandler::new(PayloadTokens, MemoryCookieStore::new(), config);
        destroyed.destroy("").expect("destroy succeeds");

        let cleared: Vec<String> = destroyed
            .cookies()
            .outbound()
            .iter()
            .map(|c| c.name().to_string())
            .collect();
        for cookie in written.cookies().outbound() {
            assert!(cleared.iter().any(|name| name == cookie.name()));
        }
    }

    #[test]
    fn token_text_that_is_not_cookie_safe_is_refused() {
        let handler = handler(MemoryCookieStore::new());

        let err = handler
            .write("", "caf\u{e9}; x")
            .expect_err("non-ASCII token text is refused");

        assert!(matches!(err, Error::TokenNotCookieSafe));
        assert!(handler.cookies().outbound().is_empty());
    }

    #[test]
    fn gc_and_close_are_noops() {
        let handler = handler(MemoryCookieStore::new());

        assert_eq!(handler.gc(Duration::hours(1)).expect("gc succeeds"), 0);
        handler.close().expect("close succeeds");
        assert!(handler.cookies().outbound().is_empty());
    }
}
