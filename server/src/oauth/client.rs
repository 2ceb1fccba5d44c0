use async_trait::async_trait;
use serde::Serialize;
use tracing::{error, info};

use super::error::LoginError;
use super::token::TokenResponse;

/// Form body of the authorization code grant
#[derive(Debug, Serialize)]
pub struct CodeExchange<'a> {
    pub grant_type: &'static str,
    pub code: &'a str,
    pub client_id: &'a str,
    pub client_secret: &'a str,
    pub redirect_uri: &'a str,
}

impl<'a> CodeExchange<'a> {
    pub fn new(
        code: &'a str,
        client_id: &'a str,
        client_secret: &'a str,
        redirect_uri: &'a str,
    ) -> Self {
        Self {
            grant_type: "authorization_code",
            code,
            client_id,
            client_secret,
            redirect_uri,
        }
    }
}

/// Something that can turn an authorization code into tokens
#[async_trait]
pub trait TokenEndpoint: Send + Sync {
    async fn exchange_code(&self, request: &CodeExchange<'_>) -> Result<TokenResponse, LoginError>;
}

/// Token endpoint client backed by `reqwest`.
///
/// One POST per exchange, no retry. The request timeout comes from the
/// `reqwest::Client` it was built with.
#[derive(Debug, Clone)]
pub struct OAuthClient {
    http: reqwest::Client,
    token_endpoint: String,
}

impl OAuthClient {
    pub fn new(http: reqwest::Client, token_endpoint: String) -> Self {
        Self {
            http,
            token_endpoint,
        }
    }
}

#[async_trait]
impl TokenEndpoint for OAuthClient {
    #[tracing::instrument(skip_all, fields(token_endpoint = %self.token_endpoint))]
    async fn exchange_code(&self, request: &CodeExchange<'_>) -> Result<TokenResponse, LoginError> {
        let response = self
            .http
            .post(&self.token_endpoint)
            .header(reqwest::header::ACCEPT, "application/json")
            .form(request)
            .send()
            .await
            .map_err(|err| {
                error!("Token request failed: {:?}", err);
                LoginError::TokenExchangeFailed(err.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("Token endpoint returned {}: {}", status, body);
            return Err(LoginError::TokenExchangeFailed(format!(
                "token endpoint returned {status}"
            )));
        }

        let tokens = response.json::<TokenResponse>().await.map_err(|err| {
            error!("Token endpoint returned an unreadable body: {:?}", err);
            LoginError::TokenExchangeFailed(err.to_string())
        })?;

        info!("Exchanged authorization code for tokens");
        Ok(tokens)
    }
}
