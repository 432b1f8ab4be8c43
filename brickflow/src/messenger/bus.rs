//! In-process message routing between endpoints.

use super::context::Target;
use super::envelope::Delivery;
use crate::errors::{BrickflowError, Result};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use tokio::sync::{broadcast, mpsc, Notify};
use tracing::debug;

/// Error message for deliveries to tabs without a listener.
pub const RECEIVING_END_MISSING: &str =
    "Could not establish connection. Receiving end does not exist.";

struct Endpoint {
    sender: mpsc::UnboundedSender<Delivery>,
    url: Option<String>,
}

/// Routes envelopes to attached endpoints.
///
/// Tab endpoints must be attached before they can receive; singleton
/// endpoints (background, offscreen) are waited for.
pub struct MessageBus {
    endpoints: RwLock<HashMap<Target, Endpoint>>,
    attached: Notify,
    detached: broadcast::Sender<Target>,
}

impl fmt::Debug for MessageBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageBus")
            .field("endpoints", &self.endpoints.read().len())
            .finish_non_exhaustive()
    }
}

impl Default for MessageBus {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageBus {
    /// Creates an empty bus.
    #[must_use]
    pub fn new() -> Self {
        let (detached, _) = broadcast::channel(64);
        Self {
            endpoints: RwLock::new(HashMap::new()),
            attached: Notify::new(),
            detached,
        }
    }

    pub(crate) fn attach(
        &self,
        target: Target,
        url: Option<String>,
        sender: mpsc::UnboundedSender<Delivery>,
    ) -> Result<()> {
        {
            let mut endpoints = self.endpoints.write();
            if endpoints.contains_key(&target) {
                return Err(BrickflowError::transport(format!(
                    "An endpoint is already attached at {target}"
                )));
            }
            endpoints.insert(target, Endpoint { sender, url });
        }
        debug!(%target, "Attached endpoint");
        self.attached.notify_waiters();
        Ok(())
    }

    /// Detaches the endpoint at `target`. Returns false if none was attached.
    pub fn detach(&self, target: Target) -> bool {
        let removed = self.endpoints.write().remove(&target).is_some();
        if removed {
            debug!(%target, "Detached endpoint");
            let _ = self.detached.send(target);
        }
        removed
    }

    /// Returns true if an endpoint is attached at `target`.
    #[must_use]
    pub fn is_attached(&self, target: Target) -> bool {
        self.endpoints.read().contains_key(&target)
    }

    /// Returns every attached target with its URL.
    #[must_use]
    pub fn attached(&self) -> Vec<(Target, Option<String>)> {
        self.endpoints
            .read()
            .iter()
            .map(|(target, endpoint)| (*target, endpoint.url.clone()))
            .collect()
    }

    /// Subscribes to detach notifications.
    #[must_use]
    pub fn subscribe_detached(&self) -> broadcast::Receiver<Target> {
        self.detached.subscribe()
    }

    /// Hands `delivery` to the endpoint at `target`.
    ///
    /// Singleton targets wait until attached; callers bound the wait.
    pub(crate) async fn deliver(&self, target: Target, delivery: Delivery) -> Result<()> {
        loop {
            let attached = self.attached.notified();
            tokio::pin!(attached);
            attached.as_mut().enable();

            let sender = self
                .endpoints
                .read()
                .get(&target)
                .map(|endpoint| endpoint.sender.clone());

            if let Some(sender) = sender {
                return sender.send(delivery).map_err(|_| {
                    BrickflowError::transport(format!("Message channel to {target} is closed"))
                });
            }
            if !target.context().is_singleton() {
                return Err(BrickflowError::transport(RECEIVING_END_MISSING));
            }

            debug!(%target, "Waiting for endpoint to attach");
            attached.await;
        }
    }
}
