use std::sync::Mutex;

use tower_cookies::{Cookie, Cookies, cookie::CookieJar};

/// The request-scoped collection of inbound and outbound cookies.
///
/// `get` sees inbound cookies as well as anything queued with `set` during the same request.
pub trait CookieStore {
    fn get(&self, name: &str) -> Option<Cookie<'static>>;
    fn set(&self, cookie: Cookie<'static>);
    fn all(&self) -> Vec<Cookie<'static>>;
}

/// The jar `tower_cookies::CookieManager` fills from the request and drains into the response.
impl CookieStore for Cookies {
    fn get(&self, name: &str) -> Option<Cookie<'static>> {
        Cookies::get(self, name).map(Cookie::into_owned)
    }

    fn set(&self, cookie: Cookie<'static>) {
        self.add(cookie);
    }

    fn all(&self) -> Vec<Cookie<'static>> {
        self.list().into_iter().map(Cookie::into_owned).collect()
    }
}

/// A cookie store for hosts that do their own request/response plumbing.
///
/// Seed it with the cookies of the incoming request, run the session handler against it, then
/// copy [`MemoryCookieStore::outbound`] onto the response.
#[derive(Debug, Default)]
pub struct MemoryCookieStore {
    jar: Mutex<CookieJar>,
}

impl MemoryCookieStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store holding `cookies` verbatim as the inbound request cookies.
    pub fn with_inbound<I>(cookies: I) -> Self
    where
        I: IntoIterator<Item = Cookie<'static>>,
    {
        let mut jar = CookieJar::new();
        for cookie in cookies {
            jar.add_original(cookie);
        }
        Self {
            jar: Mutex::new(jar),
        }
    }

    /// Cookies queued with [`CookieStore::set`], in the form they should go out on the response.
    pub fn outbound(&self) -> Vec<Cookie<'static>> {
        match self.jar.lock() {
            Ok(jar) => jar.delta().cloned().collect(),
            Err(_) => {
                tracing::error!("cookie jar lock is poisoned");
                Vec::new()
            }
        }
    }
}

impl CookieStore for MemoryCookieStore {
    fn get(&self, name: &str) -> Option<Cookie<'static>> {
        self.jar.lock().ok()?.get(name).cloned()
    }

    fn set(&self, cookie: Cookie<'static>) {
        match self.jar.lock() {
            Ok(mut jar) => jar.add(cookie),
            Err(_) => tracing::error!("cookie jar lock is poisoned"),
        }
    }

    fn all(&self) -> Vec<Cookie<'static>> {
        match self.jar.lock() {
            Ok(jar) => jar.iter().cloned().collect(),
            Err(_) => Vec::new(),
        }
    }
}
