//! A stand-in OpenID Connect provider for local development and tests.
//!
//! `/authorize` approves every request immediately for the configured user,
//! and `/token` trades the resulting code for an HS256 ID token signed with
//! the client secret.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Form, Json, Router,
};
use jsonwebtoken::{EncodingKey, Header};
use rand::{distributions::Alphanumeric, Rng as _};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};

/// The user every login resolves to
#[derive(Debug, Clone, Serialize)]
pub struct IdpUser {
    pub sub: String,
    pub email: String,
    pub name: String,
    pub picture: Option<String>,
}

impl Default for IdpUser {
    fn default() -> Self {
        Self {
            sub: "fixture-user".to_string(),
            email: "fixture@example.com".to_string(),
            name: "Fixture User".to_string(),
            picture: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct IdpSettings {
    /// Value of the `iss` claim, also the base URL in discovery
    pub issuer: String,
    pub client_id: String,
    pub client_secret: String,
    pub user: IdpUser,
    /// Lifetime of minted ID tokens
    pub token_ttl_secs: i64,
}

#[derive(Clone)]
struct IdpState {
    settings: Arc<IdpSettings>,
    /// Outstanding codes and the redirect URI each was issued for
    codes: Arc<Mutex<HashMap<String, String>>>,
}

/// Build the provider's router
pub fn routes(settings: IdpSettings) -> Router {
    let state = IdpState {
        settings: Arc::new(settings),
        codes: Arc::new(Mutex::new(HashMap::new())),
    };

    Router::new()
        .route("/.well-known/openid-configuration", get(discovery))
        .route("/authorize", get(authorize))
        .route("/token", post(token))
        .with_state(state)
}

fn oauth_error(status: StatusCode, error: &str, description: &str) -> Response {
    (
        status,
        Json(json!({
            "error": error,
            "error_description": description,
        })),
    )
        .into_response()
}

async fn discovery(State(state): State<IdpState>) -> impl IntoResponse {
    let issuer = state.settings.issuer.trim_end_matches('/');
    Json(json!({
        "issuer": state.settings.issuer,
        "authorization_endpoint": format!("{issuer}/authorize"),
        "token_endpoint": format!("{issuer}/token"),
        "response_types_supported": ["code"],
        "id_token_signing_alg_values_supported": ["HS256"],
        "scopes_supported": ["openid", "email", "profile"],
    }))
}

#[derive(Debug, Deserialize)]
pub struct AuthorizeParams {
    pub response_type: String,
    pub client_id: String,
    pub redirect_uri: String,
    pub state: Option<String>,
    pub scope: Option<String>,
}

#[derive(Serialize)]
struct CallbackQuery<'a> {
    code: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    state: Option<&'a str>,
}

async fn authorize(
    State(state): State<IdpState>,
    Query(params): Query<AuthorizeParams>,
) -> Response {
    if params.response_type != "code" {
        return oauth_error(
            StatusCode::BAD_REQUEST,
            "unsupported_response_type",
            "Only the authorization code flow is supported",
        );
    }
    if params.client_id != state.settings.client_id {
        return oauth_error(StatusCode::BAD_REQUEST, "invalid_client", "Unknown client");
    }

    let code: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(32)
        .map(char::from)
        .collect();

    let query = match serde_urlencoded::to_string(CallbackQuery {
        code: &code,
        state: params.state.as_deref(),
    }) {
        Ok(query) => query,
        Err(err) => {
            warn!("Failed to encode callback query: {:?}", err);
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    match state.codes.lock() {
        Ok(mut codes) => {
            codes.insert(code, params.redirect_uri.clone());
        }
        Err(_) => return StatusCode::INTERNAL_SERVER_ERROR.into_response(),
    }

    info!(
        "Approving login for {} with scope {:?}",
        state.settings.user.sub, params.scope
    );

    let separator = if params.redirect_uri.contains('?') { '&' } else { '?' };
    (
        StatusCode::FOUND,
        [(
            header::LOCATION,
            format!("{}{}{}", params.redirect_uri, separator, query),
        )],
    )
        .into_response()
}

#[derive(Debug, Deserialize)]
pub struct TokenRequest {
    pub grant_type: String,
    pub code: String,
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
}

#[derive(Serialize)]
struct IdTokenClaims<'a> {
    iss: &'a str,
    aud: &'a str,
    sub: &'a str,
    email: &'a str,
    name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    picture: Option<&'a str>,
    iat: i64,
    exp: i64,
}

async fn token(State(state): State<IdpState>, Form(request): Form<TokenRequest>) -> Response {
    let settings = &state.settings;

    if request.grant_type != "authorization_code" {
        return oauth_error(
            StatusCode::BAD_REQUEST,
            "unsupported_grant_type",
            "Only authorization_code is supported",
        );
    }
    if request.client_id != settings.client_id || request.client_secret != settings.client_secret
    {
        return oauth_error(
            StatusCode::UNAUTHORIZED,
            "invalid_client",
            "Client authentication failed",
        );
    }

    // Codes are single-use
    let issued_for = match state.codes.lock() {
        Ok(mut codes) => codes.remove(&request.code),
        Err(_) => return StatusCode::INTERNAL_SERVER_ERROR.into_response(),
    };
    match issued_for {
        Some(redirect_uri) if redirect_uri == request.redirect_uri => {}
        _ => {
            return oauth_error(
                StatusCode::BAD_REQUEST,
                "invalid_grant",
                "The authorization code has expired or is invalid",
            )
        }
    }

    let now = chrono::Utc::now().timestamp();
    let user = &settings.user;
    let claims = IdTokenClaims {
        iss: &settings.issuer,
        aud: &settings.client_id,
        sub: &user.sub,
        email: &user.email,
        name: &user.name,
        picture: user.picture.as_deref(),
        iat: now,
        exp: now + settings.token_ttl_secs,
    };

    let id_token = match jsonwebtoken::encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(settings.client_secret.as_bytes()),
    ) {
        Ok(token) => token,
        Err(err) => {
            warn!("Failed to sign ID token: {:?}", err);
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    Json(json!({
        "access_token": format!("fixture-access-{}", request.code),
        "token_type": "Bearer",
        "expires_in": settings.token_ttl_secs,
        "scope": "openid email profile",
        "id_token": id_token,
    }))
    .into_response()
}
