use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::info;

use crate::session::{SessionHandle, SessionUser};
use crate::state::AppState;

/// Extract the current user from the request if authenticated
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user: SessionUser,
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = Response;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let session = SessionHandle::from_request_parts(parts, state).await?;

        match session.get(now()).and_then(|session| session.user) {
            Some(user) => Ok(AuthUser { user }),
            None => {
                info!("No authenticated user in session");
                Err(not_authenticated())
            }
        }
    }
}

fn not_authenticated() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({ "detail": "Not authenticated" })),
    )
        .into_response()
}

/// Clear the session cookie. Succeeds whether or not anyone was logged in.
pub fn end_session(session: &SessionHandle) {
    session.clear();
    info!("Session cookie removed");
}

/// Current Unix time in seconds
pub fn now() -> i64 {
    chrono::Utc::now().timestamp()
}
