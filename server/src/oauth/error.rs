use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use super::claims::ValidationError;
use super::token::DecodeError;

/// Every way a login attempt can end without a session user.
///
/// None of these are retried. The response body only ever carries the
/// machine-readable code and a fixed description.
#[derive(Debug, thiserror::Error)]
pub enum LoginError {
    #[error("provider reported an error: {0}")]
    ProviderError(String),
    #[error("callback is missing the authorization code")]
    MissingCode,
    #[error("state parameter does not match the login attempt")]
    StateMismatch,
    #[error("token exchange failed: {0}")]
    TokenExchangeFailed(String),
    #[error("token response did not include an ID token")]
    IdTokenMissing,
    #[error("ID token is malformed: {0}")]
    MalformedToken(String),
    #[error("ID token payload could not be decoded: {0}")]
    PayloadDecodeError(String),
    #[error("ID token issuer is not trusted")]
    InvalidIssuer,
    #[error("ID token audience does not match this client")]
    InvalidAudience,
    #[error("ID token has expired")]
    TokenExpired,
    #[error("ID token has no subject")]
    MissingSubject,
    #[error("session could not be written: {0}")]
    SessionUnavailable(#[from] serde_json::Error),
}

impl LoginError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::ProviderError(_) => "provider_error",
            Self::MissingCode => "missing_code",
            Self::StateMismatch => "state_mismatch",
            Self::TokenExchangeFailed(_) => "token_exchange_failed",
            Self::IdTokenMissing => "id_token_missing",
            Self::MalformedToken(_) => "malformed_token",
            Self::PayloadDecodeError(_) => "payload_decode_error",
            Self::InvalidIssuer => "invalid_issuer",
            Self::InvalidAudience => "invalid_audience",
            Self::TokenExpired => "token_expired",
            Self::MissingSubject => "missing_subject",
            Self::SessionUnavailable(_) => "session_unavailable",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::ProviderError(_) | Self::MissingCode | Self::StateMismatch => {
                StatusCode::BAD_REQUEST
            }
            Self::TokenExchangeFailed(_) | Self::IdTokenMissing => StatusCode::BAD_GATEWAY,
            Self::MalformedToken(_)
            | Self::PayloadDecodeError(_)
            | Self::InvalidIssuer
            | Self::InvalidAudience
            | Self::TokenExpired
            | Self::MissingSubject => StatusCode::UNAUTHORIZED,
            Self::SessionUnavailable(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Client-facing description, free of provider or internal detail
    fn detail(&self) -> &'static str {
        match self {
            Self::ProviderError(_) => "The identity provider did not authorize the login",
            Self::MissingCode => "Missing authorization code",
            Self::StateMismatch => "Login attempt could not be verified, please try again",
            Self::TokenExchangeFailed(_) => "Could not reach the identity provider",
            Self::IdTokenMissing => "Identity provider did not return an ID token",
            Self::MalformedToken(_) | Self::PayloadDecodeError(_) => "ID token is invalid",
            Self::InvalidIssuer => "ID token issuer is not trusted",
            Self::InvalidAudience => "ID token was not issued for this application",
            Self::TokenExpired => "ID token has expired",
            Self::MissingSubject => "ID token does not identify a user",
            Self::SessionUnavailable(_) => "Internal error",
        }
    }
}

impl From<DecodeError> for LoginError {
    fn from(err: DecodeError) -> Self {
        match err {
            DecodeError::MalformedToken(_) => Self::MalformedToken(err.to_string()),
            DecodeError::InvalidEncoding | DecodeError::NotAnObject => {
                Self::PayloadDecodeError(err.to_string())
            }
        }
    }
}

impl From<ValidationError> for LoginError {
    fn from(err: ValidationError) -> Self {
        match err {
            ValidationError::InvalidIssuer => Self::InvalidIssuer,
            ValidationError::InvalidAudience => Self::InvalidAudience,
            ValidationError::TokenExpired => Self::TokenExpired,
        }
    }
}

impl IntoResponse for LoginError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, code = self.code(), "Login failed");
        } else {
            tracing::warn!(error = %self, code = self.code(), "Login failed");
        }

        (
            status,
            Json(json!({
                "error": self.code(),
                "detail": self.detail(),
            })),
        )
            .into_response()
    }
}
