use axum::Json;

use crate::{auth::AuthUser, session::SessionUser};

/// The logged-in user's profile
pub async fn me(AuthUser { user }: AuthUser) -> Json<SessionUser> {
    Json(user)
}
