use std::env;
use std::sync::Arc;
use std::time::Duration;

use color_eyre::eyre::{eyre, WrapErr as _};
use tower_cookies::Key;

use crate::oauth::{LoginFlow, OAuthClient};
use crate::session::SessionStore;
use crate::user::{MemoryUserDirectory, UserDirectory};

/// Default landing page once a login completes
pub const DEFAULT_LANDING_URL: &str = "/dashboard";

/// Default upper bound on the token endpoint round-trip
pub const DEFAULT_TOKEN_TIMEOUT_SECS: u64 = 10;

/// Longest session lifetime accepted, the 400 days browsers cap cookies at
pub const MAX_SESSION_MAX_AGE_SECS: i64 = 400 * 24 * 60 * 60;

/// Settings for talking to the identity provider.
#[derive(Debug, Clone)]
pub struct OidcConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub authorization_endpoint: String,
    pub token_endpoint: String,
    /// Expected `iss` claim of every ID token
    pub issuer: String,
    /// Where the browser lands after a successful login
    pub landing_url: String,
    pub token_timeout: Duration,
}

impl OidcConfig {
    pub fn from_env() -> color_eyre::Result<Self> {
        let token_timeout = match env::var("TOKEN_TIMEOUT_SECS") {
            Ok(raw) => raw
                .parse::<u64>()
                .wrap_err("TOKEN_TIMEOUT_SECS must be a whole number of seconds")?,
            Err(_) => DEFAULT_TOKEN_TIMEOUT_SECS,
        };

        Ok(Self {
            client_id: required_var("OIDC_CLIENT_ID")?,
            client_secret: required_var("OIDC_CLIENT_SECRET")?,
            redirect_uri: required_var("OIDC_REDIRECT_URI")?,
            authorization_endpoint: required_var("OIDC_AUTH_URL")?,
            token_endpoint: required_var("OIDC_TOKEN_URL")?,
            issuer: required_var("OIDC_ISSUER")?,
            landing_url: env::var("LANDING_URL")
                .unwrap_or_else(|_| DEFAULT_LANDING_URL.to_string()),
            token_timeout: Duration::from_secs(token_timeout),
        })
    }

    /// The audience every ID token must be issued for
    pub fn audience(&self) -> &str {
        &self.client_id
    }
}

/// Settings for the cookie-backed session.
#[derive(Clone)]
pub struct SessionConfig {
    pub key: Key,
    pub max_age_secs: i64,
    pub secure_cookies: bool,
}

impl std::fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionConfig")
            .field("key", &"<redacted>")
            .field("max_age_secs", &self.max_age_secs)
            .field("secure_cookies", &self.secure_cookies)
            .finish()
    }
}

impl SessionConfig {
    pub fn from_env() -> color_eyre::Result<Self> {
        let secret = required_var("SESSION_SECRET")?;
        let key = Key::try_from(secret.as_bytes())
            .map_err(|_| eyre!("SESSION_SECRET must be at least 64 bytes long"))?;

        let max_age_secs = required_var("SESSION_MAX_AGE_SECS")?
            .parse::<i64>()
            .wrap_err("SESSION_MAX_AGE_SECS must be a whole number of seconds")?;
        if max_age_secs <= 0 {
            return Err(eyre!("SESSION_MAX_AGE_SECS must be positive"));
        }
        if max_age_secs > MAX_SESSION_MAX_AGE_SECS {
            return Err(eyre!(
                "SESSION_MAX_AGE_SECS must be at most {} seconds",
                MAX_SESSION_MAX_AGE_SECS
            ));
        }

        Ok(Self {
            key,
            max_age_secs,
            secure_cookies: env::var("PROTO").ok().as_deref() == Some("https"),
        })
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn from_env() -> color_eyre::Result<Self> {
        let port = match env::var("PORT") {
            Ok(raw) => raw.parse::<u16>().wrap_err("PORT must be a valid port")?,
            Err(_) => 3000,
        };

        Ok(Self {
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port,
        })
    }
}

/// Everything the gateway reads from the environment, loaded once at startup
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub oidc: OidcConfig,
    pub session: SessionConfig,
    pub server: ServerConfig,
}

impl GatewayConfig {
    pub fn from_env() -> color_eyre::Result<Self> {
        Ok(Self {
            oidc: OidcConfig::from_env()?,
            session: SessionConfig::from_env()?,
            server: ServerConfig::from_env()?,
        })
    }
}

fn required_var(name: &str) -> color_eyre::Result<String> {
    match env::var(name) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(eyre!("{} environment variable not set", name)),
    }
}

#[derive(Clone)]
pub struct AppState {
    pub login: Arc<LoginFlow<OAuthClient>>,
    pub sessions: SessionStore,
    pub users: Arc<dyn UserDirectory>,
}

impl AppState {
    pub fn new(oidc: OidcConfig, session: SessionConfig) -> color_eyre::Result<Self> {
        let http = reqwest::ClientBuilder::new()
            .timeout(oidc.token_timeout)
            .use_rustls_tls()
            .build()
            .wrap_err("Failed to build HTTP client")?;

        let oidc = Arc::new(oidc);
        let client = OAuthClient::new(http, oidc.token_endpoint.clone());

        Ok(Self {
            login: Arc::new(LoginFlow::new(oidc, client)),
            sessions: SessionStore::new(session),
            users: Arc::new(MemoryUserDirectory::default()),
        })
    }

    pub fn from_config(config: &GatewayConfig) -> color_eyre::Result<Self> {
        Self::new(config.oidc.clone(), config.session.clone())
    }
}
