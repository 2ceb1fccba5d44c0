use axum::{
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
    response::{IntoResponse as _, Response},
};
use tracing::error;

pub use tower_cookies::Cookie;
use tower_cookies::Key;

use crate::state::AppState;

/// Encrypted, authenticated view over the request's cookies.
///
/// Values written here are sealed with the session key, and anything that
/// fails to open (tampered, unsigned, or sealed under another key) reads as
/// missing.
#[derive(Clone)]
pub struct CookieJar {
    cookies: tower_cookies::Cookies,
    key: Key,
}

#[async_trait::async_trait]
impl FromRequestParts<AppState> for CookieJar {
    type Rejection = Response;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let cookies = match tower_cookies::Cookies::from_request_parts(parts, state).await {
            Ok(cookies) => cookies,
            Err(_) => {
                error!("Failed to extract cookies from request");
                return Err(StatusCode::INTERNAL_SERVER_ERROR.into_response());
            }
        };

        Ok(CookieJar::new(cookies, state.sessions.key().clone()))
    }
}

impl CookieJar {
    pub fn new(cookies: tower_cookies::Cookies, key: Key) -> Self {
        Self { cookies, key }
    }

    /// Add a new private cookie
    pub fn add(&self, cookie: Cookie<'static>) {
        self.cookies.private(&self.key).add(cookie);
    }

    /// Get a private cookie by name
    pub fn get(&self, name: &str) -> Option<Cookie<'static>> {
        self.cookies.private(&self.key).get(name)
    }

    /// Removes the `cookie` from the jar.
    pub fn remove(&self, cookie: Cookie<'static>) {
        self.cookies.private(&self.key).remove(cookie);
    }

    /// The underlying jar, for writing unsealed cookies
    #[cfg(test)]
    pub(crate) fn raw(&self) -> &tower_cookies::Cookies {
        &self.cookies
    }
}
