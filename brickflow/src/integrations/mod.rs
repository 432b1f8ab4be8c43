//! Integration configurations and OAuth2 authentication.
//!
//! This module provides:
//! - [`IntegrationLocator`] lookup with retry and request coalescing
//! - the OAuth2 code grant with PKCE ([`OAuth2Flow`])
//! - a token cache ([`AuthCache`]) over pluggable [`KeyValueStorage`]

mod auth_cache;
#[cfg(feature = "http")]
mod http;
mod locator;
mod oauth2;
mod pkce;
mod storage;

/// Storage key of the cached OAuth2 token map.
pub const OAUTH2_STORAGE_KEY: &str = "OAUTH2";

pub use auth_cache::{AuthCache, AuthData};
#[cfg(feature = "http")]
pub use http::HttpTokenEndpoint;
#[cfg(test)]
pub use locator::MockIntegrationLocator;
pub use locator::{
    locate_with_retry, register_integration_methods, InMemoryLocator, IntegrationLocator,
    MemoizedLocator, SanitizedConfig,
};
#[cfg(test)]
pub use oauth2::{MockTokenEndpoint, MockWebAuthFlow};
pub use oauth2::{
    parse_redirect, parse_token_response, refresh_oauth2_token, CodeChallengeMethod, FlowState,
    OAuth2Config, OAuth2Flow, TokenEndpoint, TokenResponse, WebAuthFlow, STATE_MISMATCH_MESSAGE,
};
pub use pkce::{code_challenge, PkcePair};
pub use storage::{InMemoryStorage, JsonFileStorage, KeyValueStorage};
