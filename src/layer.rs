use std::{
    future::Future,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};

use http::{Request, Response};
use tower_cookies::{CookieManager, Cookies};
use tower_layer::Layer;
use tower_service::Service;
use tower_sessions_core::Session;

use crate::{
    Expiry, config::JwtSessionConfig, handler::JwtSessionHandler, store::JwtCookieStore,
    token::TokenManager,
};

/// Middleware keeping `tower_sessions_core::Session` in chunked, signed token cookies.
///
/// Wraps the inner service in `tower_cookies::CookieManager`, which copies the request cookies
/// into a per-request jar and writes everything queued in that jar back as `Set-Cookie`.
#[derive(Debug, Clone)]
pub struct JwtSessionManagerLayer<T: TokenManager> {
    config: JwtSessionConfig,
    tokens: T,
    ttl_from_config: bool,
}

impl<T: TokenManager> JwtSessionManagerLayer<T> {
    /// Sessions in tokens from `tokens`, whose fresh-token lifetime is left as given.
    #[must_use]
    pub fn new(tokens: T) -> Self {
        Self {
            config: JwtSessionConfig::default(),
            tokens,
            ttl_from_config: false,
        }
    }

    /// Replace the configuration. On a layer built by [`Self::hmac`], fresh tokens also take
    /// the new max lifetime.
    #[must_use]
    pub fn with_config(mut self, config: JwtSessionConfig) -> Self {
        if self.ttl_from_config {
            self.tokens = self.tokens.with_token_ttl(config.max_lifetime);
        }
        self.config = config;
        self
    }

    #[must_use]
    pub fn with_tokens<T2: TokenManager>(self, tokens: T2) -> JwtSessionManagerLayer<T2> {
        JwtSessionManagerLayer {
            config: self.config,
            tokens,
            ttl_from_config: false,
        }
    }
}

#[cfg(feature = "jwt")]
impl JwtSessionManagerLayer<crate::HmacTokenManager> {
    /// Sessions in HS256 tokens signed with `secret`.
    ///
    /// Fresh tokens live for the configured max lifetime, including one set later through
    /// [`Self::with_config`].
    #[must_use]
    pub fn hmac(secret: impl AsRef<[u8]>) -> Self {
        let config = JwtSessionConfig::default();
        let tokens = crate::HmacTokenManager::new(secret).with_token_ttl(config.max_lifetime);
        Self {
            config,
            tokens,
            ttl_from_config: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct JwtSessionManager<S, T: TokenManager> {
    inner: S,
    config: JwtSessionConfig,
    tokens: T,
}

impl<S, T: TokenManager> Layer<S> for JwtSessionManagerLayer<T> {
    type Service = CookieManager<JwtSessionManager<S, T>>;

    fn layer(&self, inner: S) -> Self::Service {
        CookieManager::new(JwtSessionManager {
            inner,
            config: self.config.clone(),
            tokens: self.tokens.clone(),
        })
    }
}

fn internal_error<B: Default>() -> Response<B> {
    let mut res = Response::default();
    *res.status_mut() = http::StatusCode::INTERNAL_SERVER_ERROR;
    res
}

impl<ReqBody, ResBody, S, T> Service<Request<ReqBody>> for JwtSessionManager<S, T>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>> + Clone + Send + 'static,
    S::Future: Send,
    ReqBody: Send + 'static,
    ResBody: Default + Send,
    T: TokenManager,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<ReqBody>) -> Self::Future {
        let config = self.config.clone();
        let tokens = self.tokens.clone();

        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        Box::pin(async move {
            let Some(cookies) = req.extensions().get::<Cookies>().cloned() else {
                tracing::error!("cookie jar missing from request extensions");
                return Ok(internal_error());
            };

            let max_lifetime = config.max_lifetime;
            let cookie_store = Arc::new(JwtCookieStore::new(JwtSessionHandler::new(
                tokens, cookies, config,
            )));

            let record = match cookie_store.current_record() {
                Ok(record) => record,
                Err(err) => {
                    tracing::error!(err = %err, "session token resolution failed");
                    return Ok(internal_error());
                }
            };

            let session = Session::new(
                record.as_ref().map(|r| r.id),
                cookie_store.clone(),
                Some(Expiry::OnInactivity(max_lifetime)),
            );
            req.extensions_mut().insert(session.clone());

            let res = inner.call(req).await?;

            let handler = cookie_store.handler();

            if session.is_empty().await {
                if handler.has_session_cookies()
                    && let Err(err) = cookie_store.clear()
                {
                    tracing::error!(err = %err, "session cookie removal failed");
                }
                return Ok(res);
            }

            if res.status().is_server_error() {
                return Ok(res);
            }

            if session.is_modified() {
                if let Err(err) = session.save().await {
                    tracing::error!(err = %err, "session save failed");
                    return Ok(internal_error());
                }
            } else if handler.config().refresh_on_activity
                && let Some(record) = record
                && let Err(err) = cookie_store.refresh(record)
            {
                tracing::error!(err = %err, "session refresh failed");
                return Ok(internal_error());
            }

            Ok(res)
        })
    }
}
