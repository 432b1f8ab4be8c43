//! Wire envelopes.

use super::context::SenderInfo;
use crate::errors::SerializedError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::oneshot;
use uuid::Uuid;

/// A method call in flight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    /// Correlation id.
    pub id: Uuid,
    /// Method name.
    pub method: String,
    /// Argument tuple as a JSON array.
    pub args: Value,
    /// The calling endpoint.
    pub sender: SenderInfo,
}

/// The handler's result, or its serialized error.
pub type Reply = std::result::Result<Value, SerializedError>;

/// An envelope paired with the channel its reply goes to.
#[derive(Debug)]
pub(crate) struct Delivery {
    pub(crate) envelope: Envelope,
    pub(crate) reply: oneshot::Sender<Reply>,
}

/// Turns a serialized argument tuple into a JSON array.
///
/// `()` serializes to `null` and becomes `[]`; a non-array value becomes a
/// one-element array.
pub(crate) fn normalize_args(args: Value) -> Value {
    match args {
        Value::Array(_) => args,
        Value::Null => Value::Array(Vec::new()),
        other => Value::Array(vec![other]),
    }
}
