use axum::{
    extract::{rejection::QueryRejection, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::{error, info, warn};

use crate::{
    auth::{end_session, now},
    errors::ServerResult,
    oauth::{CallbackParams, LoginError},
    session::SessionHandle,
    state::AppState,
};

use super::found;

/// Start the login flow and send the browser to the provider
pub async fn login(
    State(state): State<AppState>,
    session: SessionHandle,
) -> ServerResult<Response, StatusCode> {
    let now = now();
    let mut current = session.load(now);

    let url = state.login.begin_login(&mut current, now)?;
    session.put(&current)?;

    Ok(found(&url))
}

/// Handle the provider's redirect back to us
pub async fn callback(
    State(state): State<AppState>,
    session: SessionHandle,
    params: Result<Query<CallbackParams>, QueryRejection>,
) -> Response {
    let now = now();
    let mut current = session.load(now);

    let result = match params {
        Ok(Query(params)) => state.login.complete_login(&params, &mut current, now).await,
        Err(rejection) => {
            // No code can be read, and the pending attempt ends here
            warn!("Unreadable callback query: {}", rejection.body_text());
            current.take_state();
            Err(LoginError::MissingCode)
        }
    };

    // The pending state is gone either way, so the session is written back
    // on failure too. It never holds a user from a failed attempt.
    if let Err(err) = session.put(&current) {
        return LoginError::from(err).into_response();
    }

    let user = match result {
        Ok(user) => user,
        Err(err) => return err.into_response(),
    };

    if let Err(err) = state.users.record_login(&user).await {
        // Log the error but continue - not fatal
        error!("Failed to record login for {}: {:?}", user.id, err);
    }

    let landing = &state.login.config().landing_url;
    info!("Login for {} complete, redirecting to {}", user.id, landing);
    found(landing)
}

/// Forget the current user
pub async fn logout(session: SessionHandle) -> impl IntoResponse {
    end_session(&session);
    Json(json!({ "message": "Logged out" }))
}
