//! `reqwest`-backed token endpoint.

use super::oauth2::{TokenEndpoint, TokenResponse};
use crate::errors::{BrickflowError, Result};
use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

/// Posts token requests over HTTP.
#[derive(Debug, Clone)]
pub struct HttpTokenEndpoint {
    client: Client,
}

impl HttpTokenEndpoint {
    /// Creates an endpoint with a 30 second request timeout.
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| BrickflowError::transport(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }

    /// Wraps an existing client.
    #[must_use]
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl TokenEndpoint for HttpTokenEndpoint {
    async fn post_form(&self, token_url: String, form: Vec<(String, String)>) -> Result<TokenResponse> {
        let body = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(form)
            .finish();

        let response = self
            .client
            .post(&token_url)
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .header(ACCEPT, "application/json")
            .body(body)
            .send()
            .await
            .map_err(|e| BrickflowError::transport(format!("Token request to {token_url} failed: {e}")))?;

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(ToString::to_string);
        let body = response
            .text()
            .await
            .map_err(|e| BrickflowError::transport(format!("Failed to read token response: {e}")))?;

        debug!(%token_url, status, "Token endpoint responded");
        Ok(TokenResponse {
            status,
            content_type,
            body,
        })
    }
}
