//! The state controller service.

use super::merge::{merge_state, MergeStrategy};
use super::namespace::StateNamespace;
use crate::errors::{BrickflowError, Result};
use crate::events::{EventSink, NoOpEventSink, STATE_CHANGE_EVENT};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::debug;

const NOTIFICATION_CAPACITY: usize = 64;

/// Capabilities of the hosting platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformCapabilities {
    /// Page/mod state is available.
    pub state: bool,
}

impl Default for PlatformCapabilities {
    fn default() -> Self {
        Self { state: true }
    }
}

impl PlatformCapabilities {
    /// A platform without any optional capability.
    #[must_use]
    pub fn none() -> Self {
        Self { state: false }
    }

    fn require_state(self) -> Result<()> {
        if self.state {
            Ok(())
        } else {
            Err(BrickflowError::PlatformCapabilityNotAvailable {
                capability: "state".to_string(),
            })
        }
    }
}

/// A state write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetStateRequest {
    /// Target namespace.
    pub namespace: StateNamespace,
    /// Data to merge; must be a JSON object.
    pub data: Value,
    /// Merge strategy.
    #[serde(default)]
    pub merge_strategy: MergeStrategy,
    /// The writing mod component; required for [`StateNamespace::Private`].
    #[serde(default, alias = "extensionId")]
    pub mod_component_id: Option<String>,
    /// The writing mod.
    #[serde(default, alias = "blueprintId")]
    pub mod_id: Option<String>,
}

impl SetStateRequest {
    /// Creates a write with the default (shallow) merge strategy.
    #[must_use]
    pub fn new(namespace: StateNamespace, data: Value) -> Self {
        Self {
            namespace,
            data,
            merge_strategy: MergeStrategy::default(),
            mod_component_id: None,
            mod_id: None,
        }
    }

    /// Sets the merge strategy.
    #[must_use]
    pub fn with_merge_strategy(mut self, strategy: MergeStrategy) -> Self {
        self.merge_strategy = strategy;
        self
    }

    /// Sets the mod component id.
    #[must_use]
    pub fn with_mod_component_id(mut self, id: impl Into<String>) -> Self {
        self.mod_component_id = Some(id.into());
        self
    }

    /// Sets the mod id.
    #[must_use]
    pub fn with_mod_id(mut self, id: impl Into<String>) -> Self {
        self.mod_id = Some(id.into());
        self
    }
}

/// A state read.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetStateRequest {
    /// Namespace to read.
    pub namespace: StateNamespace,
    /// The reading mod component; required for [`StateNamespace::Private`].
    #[serde(default, alias = "extensionId")]
    pub mod_component_id: Option<String>,
    /// The reading mod.
    #[serde(default, alias = "blueprintId")]
    pub mod_id: Option<String>,
}

impl GetStateRequest {
    /// Creates a read.
    #[must_use]
    pub fn new(namespace: StateNamespace) -> Self {
        Self {
            namespace,
            ..Self::default()
        }
    }

    /// Sets the mod component id.
    #[must_use]
    pub fn with_mod_component_id(mut self, id: impl Into<String>) -> Self {
        self.mod_component_id = Some(id.into());
        self
    }

    /// Sets the mod id.
    #[must_use]
    pub fn with_mod_id(mut self, id: impl Into<String>) -> Self {
        self.mod_id = Some(id.into());
        self
    }
}

/// Notification sent after a write changed a value. Carries no payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateChange {
    /// The namespace written.
    pub namespace: StateNamespace,
    /// The writing mod component.
    pub extension_id: Option<String>,
    /// The writing mod.
    pub blueprint_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum StateKey {
    Private(String),
    Mod(Option<String>),
    Public,
}

impl StateKey {
    fn resolve(
        namespace: StateNamespace,
        mod_component_id: Option<&String>,
        mod_id: Option<&String>,
    ) -> Result<Self> {
        match namespace {
            StateNamespace::Private => mod_component_id
                .map(|id| Self::Private(id.clone()))
                .ok_or_else(|| {
                    BrickflowError::business("Mod component id is required for private state")
                }),
            StateNamespace::Mod => Ok(Self::Mod(mod_id.cloned())),
            StateNamespace::Public => Ok(Self::Public),
        }
    }
}

/// Process-wide keyed state store.
///
/// Construct one per context; [`StateController::reset`] clears it.
pub struct StateController {
    capabilities: PlatformCapabilities,
    entries: RwLock<HashMap<StateKey, Map<String, Value>>>,
    event_sink: Arc<dyn EventSink>,
    notifier: broadcast::Sender<StateChange>,
}

impl std::fmt::Debug for StateController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateController")
            .field("capabilities", &self.capabilities)
            .field("entries", &self.entries.read().len())
            .finish_non_exhaustive()
    }
}

impl Default for StateController {
    fn default() -> Self {
        Self::new(PlatformCapabilities::default())
    }
}

impl StateController {
    /// Creates an empty controller.
    #[must_use]
    pub fn new(capabilities: PlatformCapabilities) -> Self {
        let (notifier, _) = broadcast::channel(NOTIFICATION_CAPACITY);
        Self {
            capabilities,
            entries: RwLock::new(HashMap::new()),
            event_sink: Arc::new(NoOpEventSink),
            notifier,
        }
    }

    /// Sets the sink that receives `statechange` events.
    #[must_use]
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.event_sink = sink;
        self
    }

    /// Subscribes to change notifications.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<StateChange> {
        self.notifier.subscribe()
    }

    /// Merges `request.data` into the stored value and returns the result.
    pub fn set_state(&self, request: SetStateRequest) -> Result<Value> {
        self.capabilities.require_state()?;

        let SetStateRequest {
            namespace,
            data,
            merge_strategy,
            mod_component_id,
            mod_id,
        } = request;

        let Value::Object(data) = data else {
            return Err(BrickflowError::prop("State data must be an object", "data", data));
        };
        let key = StateKey::resolve(namespace, mod_component_id.as_ref(), mod_id.as_ref())?;

        let (merged, changed) = {
            let mut entries = self.entries.write();
            let previous = entries.entry(key).or_default();
            let merged = merge_state(previous, &data, merge_strategy);
            let changed = merged != *previous;
            previous.clone_from(&merged);
            (merged, changed)
        };

        if changed {
            debug!(%namespace, ?mod_component_id, ?mod_id, "State changed");
            let change = StateChange {
                namespace,
                extension_id: mod_component_id,
                blueprint_id: mod_id,
            };
            self.event_sink.try_emit(
                STATE_CHANGE_EVENT,
                serde_json::to_value(&change).ok(),
            );
            // No receivers is fine
            let _ = self.notifier.send(change);
        }

        Ok(Value::Object(merged))
    }

    /// Returns the stored value, or `{}` if nothing was written.
    pub fn get_state(&self, request: &GetStateRequest) -> Result<Value> {
        self.capabilities.require_state()?;

        let key = StateKey::resolve(
            request.namespace,
            request.mod_component_id.as_ref(),
            request.mod_id.as_ref(),
        )?;
        let value = self.entries.read().get(&key).cloned().unwrap_or_default();
        Ok(Value::Object(value))
    }

    /// Clears every namespace.
    pub fn reset(&self) {
        self.entries.write().clear();
    }
}
