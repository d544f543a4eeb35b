use async_trait::async_trait;
use time::OffsetDateTime;
use tower_cookies::Cookies;
use tower_sessions_core::{
    SessionStore,
    session::{Id, Record},
    session_store,
};

use crate::{
    format,
    handler::{JwtSessionHandler, SessionHandler},
    token::TokenManager,
};

/// `SessionStore` over the chunked token cookies of a single request.
#[derive(Debug)]
pub(crate) struct JwtCookieStore<T: TokenManager> {
    handler: JwtSessionHandler<T, Cookies>,
}

impl<T: TokenManager> JwtCookieStore<T> {
    pub(crate) fn new(handler: JwtSessionHandler<T, Cookies>) -> Self {
        Self { handler }
    }

    pub(crate) fn handler(&self) -> &JwtSessionHandler<T, Cookies> {
        &self.handler
    }

    /// The record held by the request's token, if any and still active.
    pub(crate) fn current_record(&self) -> session_store::Result<Option<Record>> {
        let payload = self.handler.read("")?;
        if payload.is_empty() {
            return Ok(None);
        }

        match format::decode_record(&payload) {
            Ok(record) if record.expiry_date > OffsetDateTime::now_utc() => Ok(Some(record)),
            Ok(_expired) => Ok(None),
            Err(err) => {
                tracing::warn!(err = %err, "session payload decode failed");
                Ok(None)
            }
        }
    }

    /// Re-issue the token for an unchanged `record`, extending its lifetime.
    pub(crate) fn refresh(&self, mut record: Record) -> session_store::Result<()> {
        record.expiry_date = OffsetDateTime::now_utc() + self.handler.config().max_lifetime();
        self.persist_record(&record)
    }

    pub(crate) fn clear(&self) -> session_store::Result<()> {
        self.handler.destroy("")?;
        Ok(())
    }

    /// Store `record` through `touch`, so the token's `exp` follows the record's sliding expiry.
    fn persist_record(&self, record: &Record) -> session_store::Result<()> {
        let payload = format::encode_record(record)?;
        self.handler.touch(&record.id.to_string(), &payload)?;
        Ok(())
    }
}

#[async_trait]
impl<T: TokenManager> SessionStore for JwtCookieStore<T> {
    async fn create(&self, record: &mut Record) -> session_store::Result<()> {
        self.persist_record(record)
    }

    async fn save(&self, record: &Record) -> session_store::Result<()> {
        self.persist_record(record)
    }

    async fn load(&self, session_id: &Id) -> session_store::Result<Option<Record>> {
        Ok(self
            .current_record()?
            .filter(|record| record.id == *session_id))
    }

    async fn delete(&self, session_id: &Id) -> session_store::Result<()> {
        self.handler.destroy(&session_id.to_string())?;
        Ok(())
    }
}
