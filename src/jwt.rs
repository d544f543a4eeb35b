//! HS256 JSON Web Tokens as the session token format.

use std::{fmt, sync::Arc};

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde_json::{Map, Value};
use time::{Duration, OffsetDateTime};

use crate::{
    error::Result,
    token::{EXPIRATION_CLAIM, ISSUED_AT_CLAIM, Token, TokenManager},
};

const ALGORITHM: Algorithm = Algorithm::HS256;

/// Default lifetime of a freshly created token.
pub const DEFAULT_TOKEN_TTL: Duration = Duration::seconds(1440);

/// [`TokenManager`] signing tokens with an HMAC-SHA256 shared secret.
#[derive(Clone)]
pub struct HmacTokenManager {
    keys: Arc<Keys>,
    default_ttl: Duration,
}

struct Keys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl HmacTokenManager {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        let secret = secret.as_ref();
        Self {
            keys: Arc::new(Keys {
                encoding: EncodingKey::from_secret(secret),
                decoding: DecodingKey::from_secret(secret),
            }),
            default_ttl: DEFAULT_TOKEN_TTL,
        }
    }

    /// Lifetime given to tokens by [`TokenManager::create_token`].
    #[must_use]
    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    fn sign(&self, claims: Map<String, Value>) -> Result<Token> {
        let encoded = encode(&Header::new(ALGORITHM), &claims, &self.keys.encoding)?;
        Ok(Token::from_parts(claims, encoded))
    }

    fn verifying() -> Validation {
        let mut validation = Validation::new(ALGORITHM);
        validation.leeway = 0;
        validation.validate_aud = false;
        validation.set_required_spec_claims(&[EXPIRATION_CLAIM]);
        validation
    }

    fn unverified() -> Validation {
        let mut validation = Validation::new(ALGORITHM);
        validation.insecure_disable_signature_validation();
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.required_spec_claims.clear();
        validation
    }
}

fn now() -> i64 {
    OffsetDateTime::now_utc().unix_timestamp()
}

impl fmt::Debug for HmacTokenManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HmacTokenManager")
            .field("algorithm", &ALGORITHM)
            .field("default_ttl", &self.default_ttl)
            .finish_non_exhaustive()
    }
}

impl TokenManager for HmacTokenManager {
    fn create_token(&self) -> Result<Token> {
        let issued_at = now();
        let mut claims = Map::new();
        claims.insert(ISSUED_AT_CLAIM.into(), issued_at.into());
        claims.insert(
            EXPIRATION_CLAIM.into(),
            (issued_at + self.default_ttl.whole_seconds()).into(),
        );
        self.sign(claims)
    }

    fn parse(&self, text: &str) -> Option<Token> {
        match decode::<Map<String, Value>>(text, &self.keys.decoding, &Self::unverified()) {
            Ok(data) => Some(Token::from_parts(data.claims, text.to_string())),
            Err(err) => {
                tracing::debug!(err = %err, "session token is malformed");
                None
            }
        }
    }

    fn is_valid(&self, token: &Token) -> bool {
        match decode::<Map<String, Value>>(token.as_str(), &self.keys.decoding, &Self::verifying())
        {
            Ok(_) => true,
            Err(err) => {
                tracing::debug!(err = %err, "session token failed verification");
                false
            }
        }
    }

    fn update_claim(&self, token: Token, name: &str, value: &str) -> Result<Token> {
        let mut claims = token.claims().clone();
        claims.insert(name.into(), value.into());
        self.sign(claims)
    }

    fn update_expiration(&self, token: &mut Token, ttl_seconds: i64) -> Result<()> {
        let mut claims = token.claims().clone();
        claims.insert(EXPIRATION_CLAIM.into(), (now() + ttl_seconds).into());
        *token = self.sign(claims)?;
        Ok(())
    }

    fn with_token_ttl(self, ttl: Duration) -> Self {
        self.with_default_ttl(ttl)
    }
}
