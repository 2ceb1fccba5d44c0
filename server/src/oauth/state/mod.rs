use rand::{thread_rng, RngCore};
use serde::{Deserialize, Serialize};

use super::utils::{base64_url_encode, constant_time_eq};

/// Bytes of entropy in each anti-forgery state value
pub const STATE_BYTES: usize = 32;

/// How long a login attempt may take before its state is no longer honoured
pub const STATE_MAX_AGE_SECS: i64 = 600;

/// Anti-forgery value binding an authorization request to its callback
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuthState {
    pub value: String,
    /// Unix seconds when the login attempt started
    pub created_at: i64,
}

impl OAuthState {
    pub fn generate(now: i64) -> Self {
        let mut bytes = [0u8; STATE_BYTES];
        thread_rng().fill_bytes(&mut bytes);

        Self {
            value: base64_url_encode(&bytes),
            created_at: now,
        }
    }

    pub fn is_expired(&self, now: i64) -> bool {
        self.created_at + STATE_MAX_AGE_SECS < now
    }

    /// True when `candidate` is this state and the attempt is still fresh
    pub fn matches(&self, candidate: &str, now: i64) -> bool {
        !self.is_expired(now) && constant_time_eq(&self.value, candidate)
    }
}
