use base64::{engine::general_purpose::URL_SAFE, Engine as _};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Token endpoint response for the authorization code grant
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
    /// The OIDC identity token, absent when the provider ignored the `openid` scope
    #[serde(default)]
    pub id_token: Option<String>,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("token must have exactly three segments, found {0}")]
    MalformedToken(usize),
    #[error("token payload is not valid base64url")]
    InvalidEncoding,
    #[error("token payload is not a JSON object")]
    NotAnObject,
}

/// The decoded payload of an identity token.
///
/// Claims are kept as the raw JSON mapping the provider sent. The accessors
/// only return a value when the claim has the expected JSON type, so a
/// wrongly-typed claim reads the same as an absent one.
#[derive(Debug, Clone, PartialEq)]
pub struct IdentityClaims(Map<String, Value>);

impl IdentityClaims {
    pub fn new(claims: Map<String, Value>) -> Self {
        Self(claims)
    }

    pub fn issuer(&self) -> Option<&str> {
        self.str_claim("iss")
    }

    /// Single-valued audience. An array audience yields `None`.
    pub fn audience(&self) -> Option<&str> {
        self.str_claim("aud")
    }

    /// Expiry as Unix seconds. Fractional values are floored.
    pub fn expires_at(&self) -> Option<i64> {
        let exp = self.0.get("exp")?;
        exp.as_i64()
            .or_else(|| exp.as_f64().map(|secs| secs.floor() as i64))
    }

    pub fn subject(&self) -> Option<&str> {
        self.str_claim("sub")
    }

    pub fn email(&self) -> Option<&str> {
        self.str_claim("email")
    }

    pub fn name(&self) -> Option<&str> {
        self.str_claim("name")
    }

    pub fn picture(&self) -> Option<&str> {
        self.str_claim("picture")
    }

    fn str_claim(&self, name: &str) -> Option<&str> {
        self.0.get(name).and_then(Value::as_str)
    }
}

/// Decode the payload of a compact `header.payload.signature` token.
///
/// Structural decode only: the signature segment is never checked.
pub fn decode(token: &str) -> Result<IdentityClaims, DecodeError> {
    let segments: Vec<&str> = token.split('.').collect();
    if segments.len() != 3 {
        return Err(DecodeError::MalformedToken(segments.len()));
    }

    let bytes = URL_SAFE
        .decode(pad_base64(segments[1]))
        .map_err(|_| DecodeError::InvalidEncoding)?;

    match serde_json::from_slice::<Value>(&bytes) {
        Ok(Value::Object(claims)) => Ok(IdentityClaims(claims)),
        _ => Err(DecodeError::NotAnObject),
    }
}

/// Pad a base64url segment up to a multiple of four characters
fn pad_base64(segment: &str) -> String {
    let mut padded = segment.to_string();
    while padded.len() % 4 != 0 {
        padded.push('=');
    }
    padded
}
