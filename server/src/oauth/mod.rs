//! OpenID Connect login against a single identity provider.
//! This covers state generation, the code-for-token exchange, structural
//! ID token decoding and claim validation.

pub mod claims;
pub mod client;
pub mod error;
pub mod flow;
pub mod state;
pub mod token;
pub mod utils;

pub use claims::{validate, ValidationError};
pub use client::{CodeExchange, OAuthClient, TokenEndpoint};
pub use error::LoginError;
pub use flow::{CallbackParams, LoginFlow};
pub use state::OAuthState;
pub use token::{decode, DecodeError, IdentityClaims, TokenResponse};
