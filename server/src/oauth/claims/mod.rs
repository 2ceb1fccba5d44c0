use super::token::IdentityClaims;
use super::utils::constant_time_eq;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("token was issued by an unexpected issuer")]
    InvalidIssuer,
    #[error("token was issued for a different audience")]
    InvalidAudience,
    #[error("token has expired")]
    TokenExpired,
}

/// Check issuer, audience and expiry, in that order.
///
/// The first failing check wins. A token without `exp` is treated as
/// expired, and `exp == now` is still valid.
pub fn validate(
    claims: IdentityClaims,
    expected_issuer: &str,
    expected_audience: &str,
    now: i64,
) -> Result<IdentityClaims, ValidationError> {
    match claims.issuer() {
        Some(iss) if iss == expected_issuer => {}
        _ => return Err(ValidationError::InvalidIssuer),
    }

    match claims.audience() {
        Some(aud) if constant_time_eq(aud, expected_audience) => {}
        _ => return Err(ValidationError::InvalidAudience),
    }

    match claims.expires_at() {
        Some(exp) if now <= exp => {}
        _ => return Err(ValidationError::TokenExpired),
    }

    Ok(claims)
}
