use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json,
};
use serde_json::json;

use crate::state::AppState;

pub mod auth;
pub mod user;

/// Build the application router with all routes
pub fn routes(app_state: AppState) -> axum::Router {
    axum::Router::new()
        .route("/health", get(health))
        // OIDC login
        .route("/login", get(auth::login))
        .route("/callback", get(auth::callback))
        .route("/logout", post(auth::logout))
        // Authenticated API
        .route("/user/me", get(user::me))
        .layer(tower_cookies::CookieManagerLayer::new())
        // Add trace layer for debugging
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(app_state)
}

/// Liveness probe
async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "message": "auth gateway is running"
    }))
}

/// A `302 Found` redirect
pub(crate) fn found(location: &str) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location.to_string())]).into_response()
}
