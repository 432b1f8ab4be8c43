//! OAuth2 authorization-code grant with optional PKCE.
//!
//! The flow moves through [`FlowState`]:
//! `NotStarted → AuthorizationRequested → CodeReceived →
//! TokenExchangeRequested → TokenReceived`, or `Failed` from any step.
//! Failures are terminal and never retried.

use super::auth_cache::{AuthCache, AuthData};
use super::pkce::PkcePair;
use crate::config::OAuth2Settings;
use crate::errors::{BrickflowError, Result};
use crate::utils::random_hex;
use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};
use url::Url;

/// Error message for redirects whose `state` differs from the nonce sent.
pub const STATE_MISMATCH_MESSAGE: &str = "OAuth2 state mismatch";

/// Supported PKCE challenge methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeChallengeMethod {
    /// SHA-256 challenge.
    S256,
}

impl CodeChallengeMethod {
    /// Parses a configured method. Unset means no PKCE.
    pub fn parse(value: Option<&str>) -> Result<Option<Self>> {
        match value {
            None | Some("") => Ok(None),
            Some("S256") => Ok(Some(Self::S256)),
            Some(other) => Err(BrickflowError::invalid_definition(format!(
                "Unsupported code_challenge_method: {other}"
            ))),
        }
    }
}

/// OAuth2 directives of one integration configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OAuth2Config {
    /// Integration config id; cached tokens are keyed by it.
    pub config_id: String,
    /// Authorization endpoint.
    pub authorize_url: String,
    /// Token endpoint.
    pub token_url: String,
    /// Client id.
    pub client_id: String,
    /// Client secret, for confidential clients.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
    /// Space separated scopes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    /// `S256` enables PKCE.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_challenge_method: Option<String>,
}

impl OAuth2Config {
    /// Creates a config for a public client without PKCE.
    #[must_use]
    pub fn new(
        config_id: impl Into<String>,
        authorize_url: impl Into<String>,
        token_url: impl Into<String>,
        client_id: impl Into<String>,
    ) -> Self {
        Self {
            config_id: config_id.into(),
            authorize_url: authorize_url.into(),
            token_url: token_url.into(),
            client_id: client_id.into(),
            client_secret: None,
            scope: None,
            code_challenge_method: None,
        }
    }

    /// Sets the client secret.
    #[must_use]
    pub fn with_client_secret(mut self, secret: impl Into<String>) -> Self {
        self.client_secret = Some(secret.into());
        self
    }

    /// Sets the scope.
    #[must_use]
    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    /// Sets the PKCE challenge method.
    #[must_use]
    pub fn with_code_challenge_method(mut self, method: impl Into<String>) -> Self {
        self.code_challenge_method = Some(method.into());
        self
    }
}

/// Where a flow is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowState {
    /// Not started yet.
    NotStarted,
    /// The consent page was launched.
    AuthorizationRequested,
    /// The redirect carried a valid code.
    CodeReceived,
    /// The code is being exchanged.
    TokenExchangeRequested,
    /// Tokens were received and cached.
    TokenReceived,
    /// The flow failed with this message.
    Failed(String),
}

/// Launches the browser's web auth flow.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait WebAuthFlow: Send + Sync {
    /// Opens `authorize_url` and resolves with the final redirect URL.
    async fn launch(&self, authorize_url: Url, interactive: bool) -> Result<String>;
}

/// Raw token endpoint response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenResponse {
    /// HTTP status.
    pub status: u16,
    /// `Content-Type` header, if any.
    pub content_type: Option<String>,
    /// Response body.
    pub body: String,
}

/// Posts form data to a token endpoint.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TokenEndpoint: Send + Sync {
    /// Posts `form` as `application/x-www-form-urlencoded` to `token_url`.
    async fn post_form(&self, token_url: String, form: Vec<(String, String)>) -> Result<TokenResponse>;
}

/// Reads the query and fragment parameters of a redirect URL.
fn redirect_params(redirect: &str) -> Result<HashMap<String, String>> {
    let url = Url::parse(redirect)?;
    let mut params: HashMap<String, String> = url.query_pairs().into_owned().collect();
    if let Some(fragment) = url.fragment() {
        params.extend(url::form_urlencoded::parse(fragment.as_bytes()).into_owned());
    }
    Ok(params)
}

/// Extracts the authorization code, checking `error` and `state` first.
pub fn parse_redirect(redirect: &str, expected_state: &str) -> Result<String> {
    let mut params = redirect_params(redirect)?;

    if let Some(error) = params.remove("error") {
        let message = params.remove("error_description").unwrap_or(error);
        return Err(BrickflowError::oauth2(message));
    }
    if params.get("state").map(String::as_str) != Some(expected_state) {
        return Err(BrickflowError::oauth2(STATE_MISMATCH_MESSAGE));
    }
    params
        .remove("code")
        .ok_or_else(|| BrickflowError::oauth2("OAuth2 redirect did not include a code"))
}

/// Parses a token response body according to its content type.
pub fn parse_token_response(response: TokenResponse) -> Result<AuthData> {
    let TokenResponse {
        status,
        content_type,
        body,
    } = response;

    if !(200..300).contains(&status) {
        return Err(BrickflowError::oauth2(format!(
            "Token request failed with status {status}: {body}"
        )));
    }

    let mime = content_type
        .as_deref()
        .and_then(|ct| ct.split(';').next())
        .map(|ct| ct.trim().to_ascii_lowercase())
        .unwrap_or_default();

    let data: Map<String, Value> = match mime.as_str() {
        "application/json" => serde_json::from_str(&body)
            .map_err(|e| BrickflowError::oauth2(format!("Invalid JSON token response: {e}")))?,
        "application/x-www-form-urlencoded" => url::form_urlencoded::parse(body.as_bytes())
            .into_owned()
            .map(|(k, v)| (k, Value::String(v)))
            .collect(),
        _ => {
            return Err(BrickflowError::oauth2(format!(
                "Unexpected token response content type: {}",
                content_type.as_deref().unwrap_or("none")
            )))
        }
    };

    if let Some(error) = data.get("error").and_then(Value::as_str) {
        let message = data
            .get("error_description")
            .and_then(Value::as_str)
            .unwrap_or(error);
        return Err(BrickflowError::oauth2(message.to_string()));
    }
    Ok(AuthData(data))
}

fn client_form(config: &OAuth2Config, grant_type: &str) -> Vec<(String, String)> {
    let mut form = vec![
        ("grant_type".to_string(), grant_type.to_string()),
        ("client_id".to_string(), config.client_id.clone()),
    ];
    if let Some(secret) = &config.client_secret {
        form.push(("client_secret".to_string(), secret.clone()));
    }
    form
}

/// One run of the code-grant flow for one integration config.
pub struct OAuth2Flow {
    config: OAuth2Config,
    redirect_uri: String,
    web_auth: Arc<dyn WebAuthFlow>,
    endpoint: Arc<dyn TokenEndpoint>,
    cache: Arc<AuthCache>,
    state: RwLock<FlowState>,
}

impl fmt::Debug for OAuth2Flow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuth2Flow")
            .field("config_id", &self.config.config_id)
            .field("state", &*self.state.read())
            .finish_non_exhaustive()
    }
}

impl OAuth2Flow {
    /// Creates a flow in [`FlowState::NotStarted`].
    #[must_use]
    pub fn new(
        config: OAuth2Config,
        settings: &OAuth2Settings,
        web_auth: Arc<dyn WebAuthFlow>,
        endpoint: Arc<dyn TokenEndpoint>,
        cache: Arc<AuthCache>,
    ) -> Self {
        Self {
            config,
            redirect_uri: settings.redirect_uri.clone(),
            web_auth,
            endpoint,
            cache,
            state: RwLock::new(FlowState::NotStarted),
        }
    }

    /// Returns the current state.
    #[must_use]
    pub fn state(&self) -> FlowState {
        self.state.read().clone()
    }

    fn transition(&self, next: FlowState) {
        debug!(config_id = %self.config.config_id, state = ?next, "OAuth2 flow transition");
        *self.state.write() = next;
    }

    /// Builds the authorize URL for `nonce` and optional PKCE pair.
    pub fn authorize_url(&self, nonce: &str, pkce: Option<&PkcePair>) -> Result<Url> {
        let mut url = Url::parse(&self.config.authorize_url)?;
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("client_id", &self.config.client_id)
                .append_pair("redirect_uri", &self.redirect_uri)
                .append_pair("response_type", "code")
                .append_pair("state", nonce);
            if let Some(scope) = &self.config.scope {
                query.append_pair("scope", scope);
            }
            if let Some(pkce) = pkce {
                query
                    .append_pair("code_challenge", &pkce.challenge)
                    .append_pair("code_challenge_method", "S256");
            }
        }
        Ok(url)
    }

    /// Runs the flow and caches the tokens under the config id.
    pub async fn run(&self, interactive: bool) -> Result<AuthData> {
        match self.execute(interactive).await {
            Ok(data) => {
                self.transition(FlowState::TokenReceived);
                Ok(data)
            }
            Err(err) => {
                warn!(config_id = %self.config.config_id, error = %err, "OAuth2 flow failed");
                self.transition(FlowState::Failed(err.message()));
                Err(err)
            }
        }
    }

    async fn execute(&self, interactive: bool) -> Result<AuthData> {
        let pkce = CodeChallengeMethod::parse(self.config.code_challenge_method.as_deref())?
            .map(|CodeChallengeMethod::S256| PkcePair::generate());
        let nonce = random_hex(16);
        let url = self.authorize_url(&nonce, pkce.as_ref())?;

        self.transition(FlowState::AuthorizationRequested);
        let redirect = self.web_auth.launch(url, interactive).await?;
        let code = parse_redirect(&redirect, &nonce)?;
        self.transition(FlowState::CodeReceived);

        let mut form = client_form(&self.config, "authorization_code");
        form.push(("code".to_string(), code));
        form.push(("redirect_uri".to_string(), self.redirect_uri.clone()));
        if let Some(pkce) = pkce {
            form.push(("code_verifier".to_string(), pkce.verifier));
        }

        self.transition(FlowState::TokenExchangeRequested);
        let response = self
            .endpoint
            .post_form(self.config.token_url.clone(), form)
            .await?;
        let data = parse_token_response(response)?;
        self.cache.set(&self.config.config_id, data.clone()).await?;
        Ok(data)
    }
}

/// Exchanges the cached refresh token for new tokens and replaces the cache
/// entry. Keeps the old refresh token if the provider omits one.
pub async fn refresh_oauth2_token(
    config: &OAuth2Config,
    endpoint: &dyn TokenEndpoint,
    cache: &AuthCache,
) -> Result<AuthData> {
    let current = cache.get(&config.config_id).await?;
    let refresh_token = current
        .as_ref()
        .and_then(AuthData::refresh_token)
        .map(ToString::to_string)
        .ok_or_else(|| {
            BrickflowError::oauth2(format!("No refresh token cached for {}", config.config_id))
        })?;

    let mut form = client_form(config, "refresh_token");
    form.push(("refresh_token".to_string(), refresh_token.clone()));

    let response = endpoint.post_form(config.token_url.clone(), form).await?;
    let mut data = parse_token_response(response)?;
    data.0
        .entry("refresh_token")
        .or_insert(Value::String(refresh_token));

    cache.set(&config.config_id, data.clone()).await?;
    debug!(config_id = %config.config_id, "Refreshed OAuth2 token");
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::integrations::{InMemoryStorage, OAUTH2_STORAGE_KEY};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    const REDIRECT: &str = "https://brickflow.chromiumapp.org/";

    fn cache() -> Arc<AuthCache> {
        Arc::new(AuthCache::new(Arc::new(InMemoryStorage::new()), OAUTH2_STORAGE_KEY))
    }

    fn config() -> OAuth2Config {
        OAuth2Config::new("cfg-1", "https://auth.test/authorize", "https://auth.test/token", "client")
            .with_scope("read write")
    }

    fn json_response(body: Value) -> TokenResponse {
        TokenResponse {
            status: 200,
            content_type: Some("application/json; charset=utf-8".to_string()),
            body: body.to_string(),
        }
    }

    fn flow(config: OAuth2Config, web_auth: MockWebAuthFlow, endpoint: MockTokenEndpoint, cache: Arc<AuthCache>) -> OAuth2Flow {
        OAuth2Flow::new(config, &OAuth2Settings::default(), Arc::new(web_auth), Arc::new(endpoint), cache)
    }

    fn state_param(url: &Url) -> String {
        url.query_pairs()
            .find(|(k, _)| k == "state")
            .map(|(_, v)| v.into_owned())
            .unwrap()
    }

    #[tokio::test]
    async fn test_code_grant_with_pkce() {
        let mut web_auth = MockWebAuthFlow::new();
        web_auth.expect_launch().times(1).returning(|url, interactive| {
            assert!(interactive);
            let params: HashMap<String, String> = url.query_pairs().into_owned().collect();
            assert_eq!(params["response_type"], "code");
            assert_eq!(params["code_challenge_method"], "S256");
            assert_eq!(params["scope"], "read write");
            Ok(format!("{REDIRECT}?code=abc&state={}", state_param(&url)))
        });

        let mut endpoint = MockTokenEndpoint::new();
        endpoint
            .expect_post_form()
            .withf(|url, form| {
                let form: HashMap<_, _> = form.iter().cloned().collect();
                url == "https://auth.test/token"
                    && form["grant_type"] == "authorization_code"
                    && form["code"] == "abc"
                    && form["redirect_uri"] == REDIRECT
                    && form.contains_key("code_verifier")
            })
            .times(1)
            .returning(|_, _| Ok(json_response(json!({"access_token": "at", "refresh_token": "rt"}))));

        let cache = cache();
        let flow = flow(
            config().with_code_challenge_method("S256"),
            web_auth,
            endpoint,
            Arc::clone(&cache),
        );
        assert_eq!(flow.state(), FlowState::NotStarted);

        let data = flow.run(true).await.unwrap();
        assert_eq!(data.access_token(), Some("at"));
        assert_eq!(flow.state(), FlowState::TokenReceived);
        assert_eq!(cache.get("cfg-1").await.unwrap(), Some(data));
    }

    #[tokio::test]
    async fn test_state_mismatch_never_calls_token_endpoint() {
        let mut web_auth = MockWebAuthFlow::new();
        web_auth
            .expect_launch()
            .returning(|_, _| Ok(format!("{REDIRECT}?code=abc&state=forged")));
        let mut endpoint = MockTokenEndpoint::new();
        endpoint.expect_post_form().times(0);

        let flow = flow(config(), web_auth, endpoint, cache());
        let err = flow.run(false).await.unwrap_err();
        assert_eq!(err.message(), STATE_MISMATCH_MESSAGE);
        assert_eq!(flow.state(), FlowState::Failed(STATE_MISMATCH_MESSAGE.to_string()));
    }

    #[tokio::test]
    async fn test_provider_error_in_fragment() {
        let mut web_auth = MockWebAuthFlow::new();
        web_auth.expect_launch().returning(|_, _| {
            Ok(format!("{REDIRECT}#error=access_denied&error_description=User%20denied"))
        });
        let mut endpoint = MockTokenEndpoint::new();
        endpoint.expect_post_form().times(0);

        let err = flow(config(), web_auth, endpoint, cache()).run(true).await.unwrap_err();
        assert_eq!(err.name(), "OAuth2Error");
        assert_eq!(err.message(), "User denied");
    }

    #[tokio::test]
    async fn test_unsupported_challenge_method_is_fatal() {
        let mut web_auth = MockWebAuthFlow::new();
        web_auth.expect_launch().times(0);
        let flow = flow(
            config().with_code_challenge_method("plain"),
            web_auth,
            MockTokenEndpoint::new(),
            cache(),
        );
        let err = flow.run(true).await.unwrap_err();
        assert_eq!(err.name(), "InvalidDefinitionError");
        assert!(matches!(flow.state(), FlowState::Failed(_)));
    }

    #[test]
    fn test_parse_token_response_content_types() {
        let form = parse_token_response(TokenResponse {
            status: 200,
            content_type: Some("application/x-www-form-urlencoded".to_string()),
            body: "access_token=at&token_type=bearer".to_string(),
        })
        .unwrap();
        assert_eq!(form.access_token(), Some("at"));

        let err = parse_token_response(TokenResponse {
            status: 200,
            content_type: Some("text/html".to_string()),
            body: "<html/>".to_string(),
        })
        .unwrap_err();
        assert!(err.message().contains("content type"));

        let err = parse_token_response(TokenResponse {
            status: 400,
            content_type: Some("application/json".to_string()),
            body: r#"{"error":"invalid_grant"}"#.to_string(),
        })
        .unwrap_err();
        assert!(err.message().contains("400"));
    }

    #[test]
    fn test_missing_code() {
        let err = parse_redirect(&format!("{REDIRECT}?state=s"), "s").unwrap_err();
        assert_eq!(err.name(), "OAuth2Error");
        assert_eq!(parse_redirect(&format!("{REDIRECT}?state=s&code=c"), "s").unwrap(), "c");
    }

    #[tokio::test]
    async fn test_refresh_keeps_old_refresh_token() {
        let cache = cache();
        cache
            .set("cfg-1", serde_json::from_value(json!({"access_token": "old", "refresh_token": "rt"})).unwrap())
            .await
            .unwrap();

        let mut endpoint = MockTokenEndpoint::new();
        endpoint
            .expect_post_form()
            .withf(|_, form| {
                form.contains(&("grant_type".to_string(), "refresh_token".to_string()))
                    && form.contains(&("refresh_token".to_string(), "rt".to_string()))
            })
            .times(1)
            .returning(|_, _| Ok(json_response(json!({"access_token": "new"}))));

        let data = refresh_oauth2_token(&config(), &endpoint, &cache).await.unwrap();
        assert_eq!(data.access_token(), Some("new"));
        assert_eq!(data.refresh_token(), Some("rt"));
        assert_eq!(cache.bearer_header("cfg-1").await.unwrap(), "Bearer new");
    }

    #[tokio::test]
    async fn test_refresh_without_token_fails() {
        let mut endpoint = MockTokenEndpoint::new();
        endpoint.expect_post_form().times(0);
        let err = refresh_oauth2_token(&config(), &endpoint, &cache()).await.unwrap_err();
        assert_eq!(err.name(), "OAuth2Error");
    }
}
