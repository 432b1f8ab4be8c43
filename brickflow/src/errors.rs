//! Error types for the brickflow runtime.
//!
//! Errors fall into four families:
//!
//! - **Business errors**: expected, user-actionable failures caused by mod
//!   configuration or page state. Never retried by the runtime and excluded
//!   from the application blame bucket.
//! - **Transport errors**: the messenger could not deliver a call or did not
//!   receive a reply.
//! - **OAuth2 errors**: fatal to the current token flow.
//! - **Internal errors**: anything else; reported to telemetry.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Convenience result alias used throughout the crate.
pub type Result<T, E = BrickflowError> = std::result::Result<T, E>;

/// The main error type for brickflow operations.
///
/// The type is `Clone` so shared in-flight futures (see
/// [`crate::messenger::MemoizeUntilSettled`]) can hand the same failure to
/// every waiter.
#[derive(Debug, Clone, Error)]
pub enum BrickflowError {
    /// Generic business error raised by a brick.
    #[error("{message}")]
    Business {
        /// Human readable message.
        message: String,
    },

    /// A brick received an invalid argument.
    #[error("{message}")]
    Prop {
        /// Human readable message.
        message: String,
        /// The brick that rejected the argument, if known.
        brick_id: Option<String>,
        /// The offending property name.
        prop: String,
        /// The offending value.
        value: Value,
    },

    /// A pipeline or brick definition is malformed.
    #[error("Invalid definition: {message}")]
    InvalidDefinition {
        /// Human readable message.
        message: String,
    },

    /// The user or caller cancelled the operation.
    #[error("{message}")]
    Cancel {
        /// Human readable message.
        message: String,
    },

    /// A renderer pipeline finished without running a renderer brick.
    #[error("Pipeline does not include a renderer brick")]
    NoRenderer,

    /// A selector matched nothing.
    #[error("No elements found for selector: {selector}")]
    NoElementsFound {
        /// The selector that was queried.
        selector: String,
    },

    /// A selector expected to be unique matched more than one element.
    #[error("Multiple elements found for selector: {selector}")]
    MultipleElementsFound {
        /// The selector that was queried.
        selector: String,
    },

    /// A selector could not be parsed.
    #[error("Invalid selector {selector}: {message}")]
    InvalidSelector {
        /// The selector that was queried.
        selector: String,
        /// Parser message.
        message: String,
    },

    /// A template could not be parsed or rendered.
    #[error("Invalid template: {message}")]
    InvalidTemplate {
        /// Parser message.
        message: String,
        /// The offending template source.
        template: String,
    },

    /// No configuration exists for the requested integration.
    #[error("{message}")]
    MissingConfiguration {
        /// Human readable message.
        message: String,
        /// The integration id.
        integration_id: String,
        /// The configuration id, if one was requested.
        config_id: Option<String>,
    },

    /// The integration is known but the user has not configured it.
    #[error("{message}")]
    NotConfigured {
        /// Human readable message.
        message: String,
        /// The integration id.
        integration_id: String,
    },

    /// A request proxied to a remote service failed.
    #[error("Remote service responded with {status}: {message}")]
    ProxiedRemoteService {
        /// HTTP status code returned by the remote service.
        status: u16,
        /// Response message.
        message: String,
    },

    /// The messenger could not deliver a message or the channel closed.
    #[error("{message}")]
    Transport {
        /// Human readable message.
        message: String,
    },

    /// No reply arrived within the call timeout.
    #[error("Timed out after {timeout_ms}ms waiting for a response to {method}")]
    Timeout {
        /// The method that was called.
        method: String,
        /// The timeout that elapsed.
        timeout_ms: u64,
    },

    /// The target context has no handler for the method.
    #[error("No handler registered for {method} in {context}")]
    MethodNotFound {
        /// The method that was called.
        method: String,
        /// The context that received the call.
        context: String,
    },

    /// A method was registered outside the context it belongs to.
    #[error("Method {method} must be registered in {expected}, not {actual}")]
    ContextMismatch {
        /// The method being registered.
        method: String,
        /// The context the method belongs to.
        expected: String,
        /// The context that attempted the registration.
        actual: String,
    },

    /// A method was registered twice in the same context.
    #[error("Method {method} is already registered")]
    DuplicateMethod {
        /// The method being registered.
        method: String,
    },

    /// The OAuth2 code-grant flow failed.
    #[error("{message}")]
    OAuth2 {
        /// Human readable message.
        message: String,
    },

    /// A required platform capability is missing.
    #[error("Platform capability not available: {capability}")]
    PlatformCapabilityNotAvailable {
        /// The capability name.
        capability: String,
    },

    /// An error rebuilt from another context that has no local equivalent.
    #[error("{name}: {message}")]
    Remote {
        /// The remote error name.
        name: String,
        /// The remote error message.
        message: String,
    },

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// A generic internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl BrickflowError {
    /// Creates a generic business error.
    #[must_use]
    pub fn business(message: impl Into<String>) -> Self {
        Self::Business {
            message: message.into(),
        }
    }

    /// Creates a prop error.
    #[must_use]
    pub fn prop(message: impl Into<String>, prop: impl Into<String>, value: Value) -> Self {
        Self::Prop {
            message: message.into(),
            brick_id: None,
            prop: prop.into(),
            value,
        }
    }

    /// Creates an invalid definition error.
    #[must_use]
    pub fn invalid_definition(message: impl Into<String>) -> Self {
        Self::InvalidDefinition {
            message: message.into(),
        }
    }

    /// Creates a cancel error.
    #[must_use]
    pub fn cancel(message: impl Into<String>) -> Self {
        Self::Cancel {
            message: message.into(),
        }
    }

    /// Creates an invalid template error.
    #[must_use]
    pub fn invalid_template(message: impl Into<String>, template: impl Into<String>) -> Self {
        Self::InvalidTemplate {
            message: message.into(),
            template: template.into(),
        }
    }

    /// Creates a missing configuration error.
    #[must_use]
    pub fn missing_configuration(
        integration_id: impl Into<String>,
        config_id: Option<String>,
    ) -> Self {
        let integration_id = integration_id.into();
        let message = match &config_id {
            Some(id) => format!("Configuration {id} not found for {integration_id}"),
            None => format!("No configuration found for {integration_id}"),
        };
        Self::MissingConfiguration {
            message,
            integration_id,
            config_id,
        }
    }

    /// Creates a transport error.
    #[must_use]
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Creates an OAuth2 error.
    #[must_use]
    pub fn oauth2(message: impl Into<String>) -> Self {
        Self::OAuth2 {
            message: message.into(),
        }
    }

    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Attaches the brick id to a prop error; other errors are returned as-is.
    #[must_use]
    pub fn with_brick_id(self, id: impl Into<String>) -> Self {
        match self {
            Self::Prop {
                message,
                prop,
                value,
                ..
            } => Self::Prop {
                message,
                brick_id: Some(id.into()),
                prop,
                value,
            },
            other => other,
        }
    }

    /// Returns the error's class name as carried over the wire.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Business { .. } => "BusinessError",
            Self::Prop { .. } => "PropError",
            Self::InvalidDefinition { .. } => "InvalidDefinitionError",
            Self::Cancel { .. } => "CancelError",
            Self::NoRenderer => "NoRendererError",
            Self::NoElementsFound { .. } => "NoElementsFoundError",
            Self::MultipleElementsFound { .. } => "MultipleElementsFoundError",
            Self::InvalidSelector { .. } => "InvalidSelectorError",
            Self::InvalidTemplate { .. } => "InvalidTemplateError",
            Self::MissingConfiguration { .. } => "MissingConfigurationError",
            Self::NotConfigured { .. } => "NotConfiguredError",
            Self::ProxiedRemoteService { .. } => "ProxiedRemoteServiceError",
            Self::Transport { .. } => "TransportError",
            Self::Timeout { .. } => "TimeoutError",
            Self::MethodNotFound { .. } => "MethodNotFoundError",
            Self::ContextMismatch { .. } => "ContextMismatchError",
            Self::DuplicateMethod { .. } => "DuplicateMethodError",
            Self::OAuth2 { .. } => "OAuth2Error",
            Self::PlatformCapabilityNotAvailable { .. } => "PlatformCapabilityNotAvailableError",
            Self::Remote { name, .. } => name.as_str(),
            Self::Serialization(_) => "SerializationError",
            Self::Internal(_) => "Error",
        }
    }

    /// Returns true for expected, user-actionable errors.
    #[must_use]
    pub fn is_business_error(&self) -> bool {
        matches!(
            self,
            Self::Business { .. }
                | Self::Prop { .. }
                | Self::InvalidDefinition { .. }
                | Self::Cancel { .. }
                | Self::NoRenderer
                | Self::NoElementsFound { .. }
                | Self::MultipleElementsFound { .. }
                | Self::InvalidSelector { .. }
                | Self::InvalidTemplate { .. }
                | Self::MissingConfiguration { .. }
                | Self::NotConfigured { .. }
                | Self::ProxiedRemoteService { .. }
        )
    }

    /// Returns true for delivery failures of the messenger.
    #[must_use]
    pub fn is_transport_error(&self) -> bool {
        matches!(
            self,
            Self::Transport { .. } | Self::Timeout { .. } | Self::MethodNotFound { .. }
        )
    }

    /// Returns true if this is a cancellation.
    #[must_use]
    pub fn is_cancel(&self) -> bool {
        matches!(self, Self::Cancel { .. })
    }

    /// Serializes the error for transport across contexts.
    #[must_use]
    pub fn to_serialized(&self) -> SerializedError {
        let mut data = Map::new();
        match self {
            Self::Prop {
                brick_id,
                prop,
                value,
                ..
            } => {
                data.insert("brickId".to_string(), serde_json::json!(brick_id));
                data.insert("prop".to_string(), serde_json::json!(prop));
                data.insert("value".to_string(), value.clone());
            }
            Self::NoElementsFound { selector } | Self::MultipleElementsFound { selector } => {
                data.insert("selector".to_string(), serde_json::json!(selector));
            }
            Self::InvalidSelector { selector, .. } => {
                data.insert("selector".to_string(), serde_json::json!(selector));
            }
            Self::InvalidTemplate { template, .. } => {
                data.insert("template".to_string(), serde_json::json!(template));
            }
            Self::MissingConfiguration {
                integration_id,
                config_id,
                ..
            } => {
                data.insert("integrationId".to_string(), serde_json::json!(integration_id));
                data.insert("configId".to_string(), serde_json::json!(config_id));
            }
            Self::NotConfigured { integration_id, .. } => {
                data.insert("integrationId".to_string(), serde_json::json!(integration_id));
            }
            Self::ProxiedRemoteService { status, .. } => {
                data.insert("status".to_string(), serde_json::json!(status));
            }
            Self::Timeout { method, timeout_ms } => {
                data.insert("method".to_string(), serde_json::json!(method));
                data.insert("timeoutMs".to_string(), serde_json::json!(timeout_ms));
            }
            Self::MethodNotFound { method, context } => {
                data.insert("method".to_string(), serde_json::json!(method));
                data.insert("context".to_string(), serde_json::json!(context));
            }
            Self::PlatformCapabilityNotAvailable { capability } => {
                data.insert("capability".to_string(), serde_json::json!(capability));
            }
            _ => {}
        }

        SerializedError {
            name: self.name().to_string(),
            message: self.message(),
            stack: None,
            data,
        }
    }

    /// Rebuilds an error serialized by [`BrickflowError::to_serialized`].
    ///
    /// Unknown error names become [`BrickflowError::Remote`], keeping the
    /// original message.
    #[must_use]
    pub fn from_serialized(err: SerializedError) -> Self {
        let SerializedError {
            name,
            message,
            data,
            ..
        } = err;
        let text = |key: &str| {
            data.get(key)
                .and_then(Value::as_str)
                .map(ToString::to_string)
        };

        match name.as_str() {
            "BusinessError" => Self::Business { message },
            "PropError" => Self::Prop {
                message,
                brick_id: text("brickId"),
                prop: text("prop").unwrap_or_default(),
                value: data.get("value").cloned().unwrap_or(Value::Null),
            },
            "InvalidDefinitionError" => Self::InvalidDefinition { message },
            "CancelError" => Self::Cancel { message },
            "NoRendererError" => Self::NoRenderer,
            "NoElementsFoundError" => Self::NoElementsFound {
                selector: text("selector").unwrap_or_default(),
            },
            "MultipleElementsFoundError" => Self::MultipleElementsFound {
                selector: text("selector").unwrap_or_default(),
            },
            "InvalidSelectorError" => Self::InvalidSelector {
                selector: text("selector").unwrap_or_default(),
                message,
            },
            "InvalidTemplateError" => Self::InvalidTemplate {
                message,
                template: text("template").unwrap_or_default(),
            },
            "MissingConfigurationError" => Self::MissingConfiguration {
                message,
                integration_id: text("integrationId").unwrap_or_default(),
                config_id: text("configId"),
            },
            "NotConfiguredError" => Self::NotConfigured {
                message,
                integration_id: text("integrationId").unwrap_or_default(),
            },
            "ProxiedRemoteServiceError" => Self::ProxiedRemoteService {
                status: data
                    .get("status")
                    .and_then(Value::as_u64)
                    .and_then(|s| u16::try_from(s).ok())
                    .unwrap_or(0),
                message,
            },
            "TransportError" => Self::Transport { message },
            "TimeoutError" => Self::Timeout {
                method: text("method").unwrap_or_default(),
                timeout_ms: data.get("timeoutMs").and_then(Value::as_u64).unwrap_or(0),
            },
            "MethodNotFoundError" => Self::MethodNotFound {
                method: text("method").unwrap_or_default(),
                context: text("context").unwrap_or_default(),
            },
            "OAuth2Error" => Self::OAuth2 { message },
            "PlatformCapabilityNotAvailableError" => Self::PlatformCapabilityNotAvailable {
                capability: text("capability").unwrap_or_default(),
            },
            "SerializationError" => Self::Serialization(message),
            "Error" => Self::Internal(message),
            _ => Self::Remote { name, message },
        }
    }

    /// Returns the bare message, without the display prefix some variants add.
    #[must_use]
    pub fn message(&self) -> String {
        match self {
            Self::InvalidDefinition { message }
            | Self::InvalidTemplate { message, .. }
            | Self::InvalidSelector { message, .. }
            | Self::ProxiedRemoteService { message, .. }
            | Self::Remote { message, .. } => message.clone(),
            Self::Serialization(message) | Self::Internal(message) => message.clone(),
            other => other.to_string(),
        }
    }
}

impl From<serde_json::Error> for BrickflowError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<url::ParseError> for BrickflowError {
    fn from(err: url::ParseError) -> Self {
        Self::invalid_definition(format!("Invalid URL: {err}"))
    }
}

/// Wire representation of an error crossing a context boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerializedError {
    /// Error class name (e.g. `"BusinessError"`).
    pub name: String,
    /// Error message.
    pub message: String,
    /// Optional stack or backtrace text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
    /// Custom fields of known error subclasses.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub data: Map<String, Value>,
}

impl SerializedError {
    /// Creates a serialized error with no custom fields.
    #[must_use]
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
            stack: None,
            data: Map::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_business_classification() {
        assert!(BrickflowError::business("nope").is_business_error());
        assert!(BrickflowError::cancel("stop").is_business_error());
        assert!(BrickflowError::NoRenderer.is_business_error());
        assert!(!BrickflowError::internal("boom").is_business_error());
        assert!(!BrickflowError::transport("closed").is_business_error());
        assert!(BrickflowError::transport("closed").is_transport_error());
    }

    #[test]
    fn test_prop_error_round_trips_custom_fields() {
        let err = BrickflowError::prop("header not found", "header", serde_json::json!("Nope"))
            .with_brick_id("@pixiebrix/lookup");

        let rebuilt = BrickflowError::from_serialized(err.to_serialized());

        match rebuilt {
            BrickflowError::Prop {
                message,
                brick_id,
                prop,
                value,
            } => {
                assert_eq!(message, "header not found");
                assert_eq!(brick_id.as_deref(), Some("@pixiebrix/lookup"));
                assert_eq!(prop, "header");
                assert_eq!(value, serde_json::json!("Nope"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_unknown_error_becomes_remote() {
        let serialized = SerializedError::new("TypeError", "x is undefined");
        let rebuilt = BrickflowError::from_serialized(serialized);

        assert_eq!(rebuilt.name(), "TypeError");
        assert_eq!(rebuilt.to_string(), "TypeError: x is undefined");
        assert!(!rebuilt.is_business_error());
    }

    #[test]
    fn test_message_strips_display_prefix() {
        let err = BrickflowError::invalid_definition("duplicate output key");
        assert_eq!(err.to_string(), "Invalid definition: duplicate output key");
        assert_eq!(err.message(), "duplicate output key");

        let rebuilt = BrickflowError::from_serialized(err.to_serialized());
        assert_eq!(rebuilt.to_string(), "Invalid definition: duplicate output key");
    }

    #[test]
    fn test_cancel_round_trip() {
        let rebuilt = BrickflowError::from_serialized(BrickflowError::cancel("closed").to_serialized());
        assert!(rebuilt.is_cancel());
    }

    #[test]
    fn test_serialized_error_skips_empty_fields() {
        let json = serde_json::to_value(SerializedError::new("BusinessError", "nope")).unwrap();
        assert_eq!(json, serde_json::json!({"name": "BusinessError", "message": "nope"}));
    }
}
