use std::sync::Arc;

use color_eyre::eyre::WrapErr as _;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::claims::validate;
use super::client::{CodeExchange, TokenEndpoint};
use super::error::LoginError;
use super::state::OAuthState;
use super::token;
use crate::session::{Session, SessionUser};
use crate::state::OidcConfig;

/// Scopes requested from the provider
pub const SCOPES: &str = "openid email profile";

/// Query parameters the provider sends back to the callback
#[derive(Debug, Default, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

#[derive(Serialize)]
struct AuthUrlParams<'a> {
    response_type: &'static str,
    client_id: &'a str,
    redirect_uri: &'a str,
    scope: &'static str,
    state: &'a str,
    access_type: &'static str,
    prompt: &'static str,
}

/// The two halves of the authorization code login.
///
/// The session is passed in by the caller and only ever mutated in place;
/// persisting it is the caller's job.
pub struct LoginFlow<T> {
    config: Arc<OidcConfig>,
    client: T,
}

impl<T: TokenEndpoint> LoginFlow<T> {
    pub fn new(config: Arc<OidcConfig>, client: T) -> Self {
        Self { config, client }
    }

    pub fn config(&self) -> &OidcConfig {
        &self.config
    }

    /// Start a login attempt and return the provider URL to send the browser to.
    ///
    /// Any earlier pending attempt in this session is replaced.
    pub fn begin_login(&self, session: &mut Session, now: i64) -> color_eyre::Result<String> {
        let oauth_state = OAuthState::generate(now);

        let query = serde_urlencoded::to_string(AuthUrlParams {
            response_type: "code",
            client_id: &self.config.client_id,
            redirect_uri: &self.config.redirect_uri,
            scope: SCOPES,
            state: &oauth_state.value,
            access_type: "offline",
            prompt: "consent",
        })
        .wrap_err("Failed to encode authorization request")?;

        let endpoint = &self.config.authorization_endpoint;
        let separator = if endpoint.contains('?') { '&' } else { '?' };

        session.oauth_state = Some(oauth_state);
        info!("Starting login attempt");

        Ok(format!("{endpoint}{separator}{query}"))
    }

    /// Finish a login attempt from the provider's callback.
    ///
    /// The pending state is consumed whatever the outcome. The session only
    /// gains a user once every check has passed.
    pub async fn complete_login(
        &self,
        params: &CallbackParams,
        session: &mut Session,
        now: i64,
    ) -> Result<SessionUser, LoginError> {
        let stored_state = session.take_state();

        if let Some(error) = &params.error {
            warn!(
                error = %error,
                description = params.error_description.as_deref().unwrap_or(""),
                "Provider returned an error to the callback"
            );
            return Err(LoginError::ProviderError(error.clone()));
        }

        let code = params
            .code
            .as_deref()
            .filter(|code| !code.is_empty())
            .ok_or(LoginError::MissingCode)?;

        let returned_state = params.state.as_deref().ok_or(LoginError::StateMismatch)?;
        match stored_state {
            Some(stored) if stored.matches(returned_state, now) => {}
            _ => return Err(LoginError::StateMismatch),
        }

        let tokens = self
            .client
            .exchange_code(&CodeExchange::new(
                code,
                &self.config.client_id,
                &self.config.client_secret,
                &self.config.redirect_uri,
            ))
            .await?;

        let id_token = tokens
            .id_token
            .as_deref()
            .filter(|token| !token.is_empty())
            .ok_or(LoginError::IdTokenMissing)?;

        let claims = token::decode(id_token)?;
        let claims = validate(claims, &self.config.issuer, self.config.audience(), now)?;
        let user = SessionUser::from_claims(&claims).ok_or(LoginError::MissingSubject)?;

        info!(sub = %user.sub, "Login completed");
        session.sign_in(user.clone(), now);

        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oauth::TokenResponse;
    use async_trait::async_trait;
    use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
    use serde_json::{json, Value};
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::Duration;

    const NOW: i64 = 1_700_000_000;
    const ISSUER: &str = "https://accounts.example.com";
    const CLIENT_ID: &str = "client-123";

    /// Token endpoint stand-in returning a canned response
    struct StubEndpoint {
        response: Result<TokenResponse, String>,
        calls: Mutex<Vec<String>>,
    }

    impl StubEndpoint {
        fn with_id_token(id_token: Option<String>) -> Self {
            Self {
                response: Ok(TokenResponse {
                    access_token: "at".into(),
                    token_type: Some("Bearer".into()),
                    expires_in: Some(3600),
                    refresh_token: None,
                    scope: None,
                    id_token,
                }),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn failing() -> Self {
            Self {
                response: Err("503 from provider".into()),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl TokenEndpoint for StubEndpoint {
        async fn exchange_code(
            &self,
            request: &CodeExchange<'_>,
        ) -> Result<TokenResponse, LoginError> {
            self.calls.lock().unwrap().push(request.code.to_string());
            self.response
                .clone()
                .map_err(LoginError::TokenExchangeFailed)
        }
    }

    fn config() -> Arc<OidcConfig> {
        Arc::new(OidcConfig {
            client_id: CLIENT_ID.into(),
            client_secret: "s3cret".into(),
            redirect_uri: "http://localhost:3000/callback".into(),
            authorization_endpoint: "https://accounts.example.com/authorize".into(),
            token_endpoint: "https://accounts.example.com/token".into(),
            issuer: ISSUER.into(),
            landing_url: "/dashboard".into(),
            token_timeout: Duration::from_secs(10),
        })
    }

    fn id_token(payload: Value) -> String {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"RS256"}"#);
        let body = URL_SAFE_NO_PAD.encode(payload.to_string());
        format!("{header}.{body}.sig")
    }

    fn good_token() -> String {
        id_token(json!({
            "iss": ISSUER,
            "aud": CLIENT_ID,
            "exp": NOW + 60,
            "sub": "u1",
            "email": "a@b.com",
            "name": "Ada",
            "picture": "https://img.example.com/a.png"
        }))
    }

    fn flow(endpoint: StubEndpoint) -> LoginFlow<StubEndpoint> {
        LoginFlow::new(config(), endpoint)
    }

    fn query_of(url: &str) -> HashMap<String, String> {
        let (_, query) = url.split_once('?').unwrap();
        serde_urlencoded::from_str(query).unwrap()
    }

    fn callback(code: Option<&str>, state: Option<&str>) -> CallbackParams {
        CallbackParams {
            code: code.map(str::to_string),
            state: state.map(str::to_string),
            ..Default::default()
        }
    }

    #[test]
    fn test_begin_login_builds_authorization_url() {
        let flow = flow(StubEndpoint::with_id_token(None));
        let mut session = Session::new(NOW);

        let url = flow.begin_login(&mut session, NOW).unwrap();

        assert!(url.starts_with("https://accounts.example.com/authorize?"));
        let query = query_of(&url);
        assert_eq!(query["response_type"], "code");
        assert_eq!(query["client_id"], CLIENT_ID);
        assert_eq!(query["redirect_uri"], "http://localhost:3000/callback");
        assert_eq!(query["scope"], "openid email profile");
        assert_eq!(query["access_type"], "offline");
        assert_eq!(query["prompt"], "consent");

        let stored = session.oauth_state.as_ref().unwrap();
        assert_eq!(query["state"], stored.value);
    }

    #[test]
    fn test_begin_login_replaces_pending_state() {
        let flow = flow(StubEndpoint::with_id_token(None));
        let mut session = Session::new(NOW);

        let first = query_of(&flow.begin_login(&mut session, NOW).unwrap())["state"].clone();
        let second = query_of(&flow.begin_login(&mut session, NOW).unwrap())["state"].clone();

        assert_ne!(first, second);
        assert_eq!(session.oauth_state.unwrap().value, second);
    }

    #[test]
    fn test_begin_login_appends_to_existing_query() {
        let mut config = (*config()).clone();
        config.authorization_endpoint = "https://idp.example.com/auth?tenant=acme".into();
        let flow = LoginFlow::new(Arc::new(config), StubEndpoint::with_id_token(None));

        let url = flow.begin_login(&mut Session::new(NOW), NOW).unwrap();
        assert!(url.starts_with("https://idp.example.com/auth?tenant=acme&response_type=code"));
    }

    #[tokio::test]
    async fn test_matching_state_completes_login() {
        let flow = flow(StubEndpoint::with_id_token(Some(good_token())));
        let mut session = Session::new(NOW - 100);
        let url = flow.begin_login(&mut session, NOW).unwrap();
        let state = query_of(&url)["state"].clone();

        let user = flow
            .complete_login(&callback(Some("abc"), Some(&state)), &mut session, NOW)
            .await
            .unwrap();

        assert_eq!(user.id, "u1");
        assert_eq!(user.email.as_deref(), Some("a@b.com"));
        assert_eq!(session.user, Some(user));
        assert_eq!(session.oauth_state, None);
        assert_eq!(session.issued_at, NOW);
        assert_eq!(flow.client.calls.lock().unwrap().as_slice(), ["abc"]);
    }

    #[tokio::test]
    async fn test_different_state_is_rejected_and_consumed() {
        let flow = flow(StubEndpoint::with_id_token(Some(good_token())));
        let mut session = Session::new(NOW);
        flow.begin_login(&mut session, NOW).unwrap();

        let err = flow
            .complete_login(&callback(Some("abc"), Some("forged")), &mut session, NOW)
            .await
            .unwrap_err();

        assert!(matches!(err, LoginError::StateMismatch));
        assert_eq!(session.oauth_state, None);
        assert_eq!(session.user, None);
        assert_eq!(flow.client.call_count(), 0);
    }

    #[tokio::test]
    async fn test_state_cannot_be_replayed() {
        let flow = flow(StubEndpoint::with_id_token(Some(good_token())));
        let mut session = Session::new(NOW);
        let state = query_of(&flow.begin_login(&mut session, NOW).unwrap())["state"].clone();
        let params = callback(Some("abc"), Some(&state));

        flow.complete_login(&params, &mut session, NOW).await.unwrap();
        let err = flow
            .complete_login(&params, &mut session, NOW)
            .await
            .unwrap_err();

        assert!(matches!(err, LoginError::StateMismatch));
    }

    #[tokio::test]
    async fn test_missing_stored_state_is_a_mismatch() {
        let flow = flow(StubEndpoint::with_id_token(Some(good_token())));
        let mut session = Session::new(NOW);

        let err = flow
            .complete_login(&callback(Some("abc"), Some("anything")), &mut session, NOW)
            .await
            .unwrap_err();

        assert!(matches!(err, LoginError::StateMismatch));
    }

    #[tokio::test]
    async fn test_stale_state_is_a_mismatch() {
        let flow = flow(StubEndpoint::with_id_token(Some(good_token())));
        let mut session = Session::new(NOW);
        let state = query_of(&flow.begin_login(&mut session, NOW - 601).unwrap())["state"].clone();

        let err = flow
            .complete_login(&callback(Some("abc"), Some(&state)), &mut session, NOW)
            .await
            .unwrap_err();

        assert!(matches!(err, LoginError::StateMismatch));
    }

    #[tokio::test]
    async fn test_missing_code_is_reported_and_state_consumed() {
        let flow = flow(StubEndpoint::with_id_token(Some(good_token())));
        let mut session = Session::new(NOW);
        let state = query_of(&flow.begin_login(&mut session, NOW).unwrap())["state"].clone();

        let err = flow
            .complete_login(&callback(None, Some(&state)), &mut session, NOW)
            .await
            .unwrap_err();

        assert!(matches!(err, LoginError::MissingCode));
        assert_eq!(session.oauth_state, None);
    }

    #[tokio::test]
    async fn test_provider_error_is_reported() {
        let flow = flow(StubEndpoint::with_id_token(Some(good_token())));
        let mut session = Session::new(NOW);
        flow.begin_login(&mut session, NOW).unwrap();

        let params = CallbackParams {
            error: Some("access_denied".into()),
            error_description: Some("User cancelled".into()),
            ..Default::default()
        };
        let err = flow
            .complete_login(&params, &mut session, NOW)
            .await
            .unwrap_err();

        assert!(matches!(err, LoginError::ProviderError(ref e) if e == "access_denied"));
        assert_eq!(session.oauth_state, None);
    }

    async fn complete_with(endpoint: StubEndpoint) -> (Result<SessionUser, LoginError>, Session) {
        let flow = flow(endpoint);
        let mut session = Session::new(NOW);
        let state = query_of(&flow.begin_login(&mut session, NOW).unwrap())["state"].clone();
        let result = flow
            .complete_login(&callback(Some("abc"), Some(&state)), &mut session, NOW)
            .await;
        (result, session)
    }

    #[tokio::test]
    async fn test_exchange_failure_propagates() {
        let (result, session) = complete_with(StubEndpoint::failing()).await;
        assert!(matches!(result, Err(LoginError::TokenExchangeFailed(_))));
        assert_eq!(session.user, None);
    }

    #[tokio::test]
    async fn test_missing_id_token() {
        let (result, session) = complete_with(StubEndpoint::with_id_token(None)).await;
        assert!(matches!(result, Err(LoginError::IdTokenMissing)));
        assert_eq!(session.user, None);
    }

    #[tokio::test]
    async fn test_malformed_id_token() {
        let (result, _) =
            complete_with(StubEndpoint::with_id_token(Some("not-a-jwt".into()))).await;
        assert!(matches!(result, Err(LoginError::MalformedToken(_))));
    }

    #[tokio::test]
    async fn test_undecodable_payload() {
        let (result, _) =
            complete_with(StubEndpoint::with_id_token(Some("e30.%%%.sig".into()))).await;
        assert!(matches!(result, Err(LoginError::PayloadDecodeError(_))));
    }

    #[tokio::test]
    async fn test_claim_failures_never_sign_in() {
        let cases = [
            (json!({ "iss": "https://evil.example.com", "aud": CLIENT_ID, "exp": NOW + 60, "sub": "u1" }), "invalid_issuer"),
            (json!({ "iss": ISSUER, "aud": "other-client", "exp": NOW + 60, "sub": "u1" }), "invalid_audience"),
            (json!({ "iss": ISSUER, "aud": CLIENT_ID, "exp": NOW - 1, "sub": "u1" }), "token_expired"),
            (json!({ "iss": ISSUER, "aud": CLIENT_ID, "sub": "u1" }), "token_expired"),
            (json!({ "iss": ISSUER, "aud": CLIENT_ID, "exp": NOW + 60 }), "missing_subject"),
        ];

        for (payload, code) in cases {
            let (result, session) =
                complete_with(StubEndpoint::with_id_token(Some(id_token(payload)))).await;
            assert_eq!(result.unwrap_err().code(), code);
            assert_eq!(session.user, None);
        }
    }

    #[tokio::test]
    async fn test_failed_attempt_keeps_earlier_user() {
        let flow = flow(StubEndpoint::with_id_token(Some(good_token())));
        let mut session = Session::new(NOW);
        let state = query_of(&flow.begin_login(&mut session, NOW).unwrap())["state"].clone();
        let user = flow
            .complete_login(&callback(Some("abc"), Some(&state)), &mut session, NOW)
            .await
            .unwrap();

        flow.begin_login(&mut session, NOW).unwrap();
        let _ = flow
            .complete_login(&callback(Some("abc"), Some("forged")), &mut session, NOW)
            .await;

        assert_eq!(session.user, Some(user));
    }
}
