use axum::{extract::FromRequestParts, http::request::Parts, response::Response};
use serde::{Deserialize, Serialize};
use tower_cookies::cookie::SameSite;
use tower_cookies::Key;
use tracing::debug;

use crate::cookies::{Cookie, CookieJar};
use crate::oauth::{IdentityClaims, OAuthState};
use crate::state::{AppState, SessionConfig};

/// Cookie name for the sealed session payload
pub const SESSION_COOKIE_NAME: &str = "gateway_session";

/// The authenticated identity kept in the session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionUser {
    pub id: String,
    pub sub: String,
    pub email: Option<String>,
    pub name: Option<String>,
    pub picture: Option<String>,
}

impl SessionUser {
    /// Build the session identity from validated claims. `None` without a subject.
    pub fn from_claims(claims: &IdentityClaims) -> Option<Self> {
        let sub = claims.subject()?.to_string();

        Some(Self {
            id: sub.clone(),
            sub,
            email: claims.email().map(str::to_string),
            name: claims.name().map(str::to_string),
            picture: claims.picture().map(str::to_string),
        })
    }
}

/// Server-side view of one browser's session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Pending login attempt, consumed by the callback
    pub oauth_state: Option<OAuthState>,
    pub user: Option<SessionUser>,
    /// Unix seconds when the session was started or last signed in
    pub issued_at: i64,
}

impl Session {
    pub fn new(now: i64) -> Self {
        Self {
            oauth_state: None,
            user: None,
            issued_at: now,
        }
    }

    /// Remove and return the pending state, leaving none behind
    pub fn take_state(&mut self) -> Option<OAuthState> {
        self.oauth_state.take()
    }

    /// Attach a freshly authenticated user and restart the session clock
    pub fn sign_in(&mut self, user: SessionUser, now: i64) {
        self.user = Some(user);
        self.issued_at = now;
    }
}

/// Cookie-backed session storage.
///
/// The whole session is serialized into one private cookie, so there is
/// no shared server-side state between requests.
#[derive(Clone)]
pub struct SessionStore {
    config: SessionConfig,
}

impl SessionStore {
    pub fn new(config: SessionConfig) -> Self {
        Self { config }
    }

    pub fn key(&self) -> &Key {
        &self.config.key
    }

    pub fn max_age_secs(&self) -> i64 {
        self.config.max_age_secs
    }

    /// Open a handle on the session carried by `jar`
    pub fn create(&self, jar: CookieJar) -> SessionHandle {
        SessionHandle {
            jar,
            store: self.clone(),
        }
    }

    fn is_expired(&self, session: &Session, now: i64) -> bool {
        session.issued_at.saturating_add(self.config.max_age_secs) < now
    }

    fn session_cookie(&self, value: String) -> Cookie<'static> {
        let mut cookie = Cookie::new(SESSION_COOKIE_NAME, value);
        cookie.set_path("/");
        cookie.set_http_only(true);
        cookie.set_secure(self.config.secure_cookies);
        // Lax so the cookie survives the top-level redirect back from the provider
        cookie.set_same_site(SameSite::Lax);
        cookie.set_max_age(time::Duration::seconds(self.config.max_age_secs));
        cookie
    }
}

/// One request's access to its session
pub struct SessionHandle {
    jar: CookieJar,
    store: SessionStore,
}

#[async_trait::async_trait]
impl FromRequestParts<AppState> for SessionHandle {
    type Rejection = Response;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let jar = CookieJar::from_request_parts(parts, state).await?;
        Ok(state.sessions.create(jar))
    }
}

impl SessionHandle {
    /// The current session, or `None` when absent, unreadable or expired
    pub fn get(&self, now: i64) -> Option<Session> {
        let cookie = self.jar.get(SESSION_COOKIE_NAME)?;

        let session = match serde_json::from_str::<Session>(cookie.value()) {
            Ok(session) => session,
            Err(err) => {
                debug!("Discarding unreadable session payload: {}", err);
                return None;
            }
        };

        if self.store.is_expired(&session, now) {
            debug!("Session issued at {} has expired", session.issued_at);
            return None;
        }

        Some(session)
    }

    /// The current session, or a fresh empty one
    pub fn load(&self, now: i64) -> Session {
        self.get(now).unwrap_or_else(|| Session::new(now))
    }

    pub fn put(&self, session: &Session) -> Result<(), serde_json::Error> {
        let value = serde_json::to_string(session)?;
        self.jar.add(self.store.session_cookie(value));
        Ok(())
    }

    /// Drop the session entirely. Safe to call when there is none.
    pub fn clear(&self) {
        let mut cookie = Cookie::new(SESSION_COOKIE_NAME, "");
        cookie.set_path("/");
        self.jar.remove(cookie);
    }
}
