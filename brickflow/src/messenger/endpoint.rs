//! Messenger endpoints: method registration and calls.

use super::bus::MessageBus;
use super::context::{SenderInfo, Target};
use super::envelope::{normalize_args, Delivery, Envelope, Reply};
use super::methods::{MethodSpec, PING};
use crate::config::MessengerConfig;
use crate::errors::{BrickflowError, Result};
use crate::utils::generate_uuid;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::future::{self, BoxFuture, FutureExt};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tracing::{debug, instrument};

type BoxedHandler = Arc<dyn Fn(SenderInfo, Value) -> BoxFuture<'static, Result<Value>> + Send + Sync>;

/// A context's endpoint on the [`MessageBus`].
///
/// Handlers registered here run in a dispatch task spawned by
/// [`Messenger::attach`]. Cloning shares the handler table.
#[derive(Clone)]
pub struct Messenger {
    target: Target,
    url: Option<String>,
    bus: Arc<MessageBus>,
    handlers: Arc<DashMap<String, BoxedHandler>>,
    config: MessengerConfig,
}

impl fmt::Debug for Messenger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Messenger")
            .field("target", &self.target)
            .field("methods", &self.handlers.len())
            .finish_non_exhaustive()
    }
}

impl Messenger {
    /// Attaches a new endpoint at `target` and starts its dispatch loop.
    ///
    /// Must be called within a Tokio runtime.
    pub fn attach(
        bus: Arc<MessageBus>,
        target: Target,
        url: Option<String>,
        config: MessengerConfig,
    ) -> Result<Self> {
        let (sender, receiver) = mpsc::unbounded_channel();
        bus.attach(target, url.clone(), sender)?;

        let messenger = Self {
            target,
            url,
            bus,
            handlers: Arc::new(DashMap::new()),
            config,
        };
        tokio::spawn(dispatch_loop(target, Arc::clone(&messenger.handlers), receiver));
        Ok(messenger)
    }

    /// Detaches this endpoint. Pending calls to it fail.
    pub fn detach(&self) -> bool {
        self.bus.detach(self.target)
    }

    /// Returns this endpoint's address.
    #[must_use]
    pub fn target(&self) -> Target {
        self.target
    }

    /// Returns the bus this endpoint is attached to.
    #[must_use]
    pub fn bus(&self) -> &Arc<MessageBus> {
        &self.bus
    }

    /// Returns the messenger configuration.
    #[must_use]
    pub fn config(&self) -> &MessengerConfig {
        &self.config
    }

    /// Returns the sender info attached to outgoing calls.
    #[must_use]
    pub fn sender_info(&self) -> SenderInfo {
        SenderInfo {
            target: self.target,
            url: self.url.clone(),
        }
    }

    /// Returns true if a handler is registered for `method`.
    #[must_use]
    pub fn has_method(&self, method: &str) -> bool {
        self.handlers.contains_key(method)
    }

    /// Registers `handler` for `spec`.
    ///
    /// `A` is the argument tuple, decoded from the call's JSON array.
    pub fn register_method<A, R, F, Fut>(&self, spec: MethodSpec, handler: F) -> Result<()>
    where
        A: DeserializeOwned + Send + 'static,
        R: Serialize + Send + 'static,
        F: Fn(A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R>> + Send + 'static,
    {
        self.register_method_with_sender(spec, move |_sender, args| handler(args))
    }

    /// Like [`Messenger::register_method`], but the handler also receives
    /// the caller's [`SenderInfo`].
    pub fn register_method_with_sender<A, R, F, Fut>(&self, spec: MethodSpec, handler: F) -> Result<()>
    where
        A: DeserializeOwned + Send + 'static,
        R: Serialize + Send + 'static,
        F: Fn(SenderInfo, A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R>> + Send + 'static,
    {
        let context = self.target.context();
        if spec.context != context {
            return Err(BrickflowError::ContextMismatch {
                method: spec.name.to_string(),
                expected: spec.context.to_string(),
                actual: context.to_string(),
            });
        }

        let boxed: BoxedHandler = Arc::new(move |sender: SenderInfo, args: Value| match decode_args::<A>(args) {
            Ok(args) => {
                let call = handler(sender, args);
                async move {
                    let output = call.await?;
                    serde_json::to_value(output).map_err(BrickflowError::from)
                }
                .boxed()
            }
            Err(err) => future::ready(Err(err)).boxed(),
        });

        match self.handlers.entry(spec.name.to_string()) {
            Entry::Occupied(_) => Err(BrickflowError::DuplicateMethod {
                method: spec.name.to_string(),
            }),
            Entry::Vacant(entry) => {
                entry.insert(boxed);
                debug!(method = spec.name, target = %self.target, "Registered method");
                Ok(())
            }
        }
    }

    /// Registers the `PING` readiness probe.
    pub fn mark_ready(&self) -> Result<()> {
        self.register_method(PING, |()| async { Ok(true) })
    }

    /// Calls `spec` at `target` with the configured call timeout.
    pub async fn call_method<A, R>(&self, target: Target, spec: MethodSpec, args: A) -> Result<R>
    where
        A: Serialize,
        R: DeserializeOwned,
    {
        self.call_method_with_timeout(target, spec, args, self.config.call_timeout())
            .await
    }

    /// Calls `spec` at `target`, failing with a timeout error after `timeout`.
    pub async fn call_method_with_timeout<A, R>(
        &self,
        target: Target,
        spec: MethodSpec,
        args: A,
        timeout: Duration,
    ) -> Result<R>
    where
        A: Serialize,
        R: DeserializeOwned,
    {
        let args = normalize_args(serde_json::to_value(args)?);
        let value = self.call_raw(target, spec, args, timeout).await?;
        Ok(serde_json::from_value(value)?)
    }

    #[instrument(skip_all, fields(method = spec.name, %target))]
    async fn call_raw(&self, target: Target, spec: MethodSpec, args: Value, timeout: Duration) -> Result<Value> {
        let envelope = Envelope {
            id: generate_uuid(),
            method: spec.name.to_string(),
            args,
            sender: self.sender_info(),
        };
        debug!(id = %envelope.id, "Sending message");

        let (reply_tx, reply_rx) = oneshot::channel::<Reply>();
        let exchange = async {
            self.bus
                .deliver(
                    target,
                    Delivery {
                        envelope,
                        reply: reply_tx,
                    },
                )
                .await?;
            reply_rx.await.map_err(|_| {
                BrickflowError::transport(format!(
                    "{target} closed before responding to {}",
                    spec.name
                ))
            })
        };

        let reply = tokio::time::timeout(timeout, exchange)
            .await
            .map_err(|_| BrickflowError::Timeout {
                method: spec.name.to_string(),
                timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            })??;

        reply.map_err(BrickflowError::from_serialized)
    }

    /// Polls `PING` at `target` until it answers or the ready timeout elapses.
    pub async fn wait_for_target_ready(&self, target: Target) -> Result<()> {
        let deadline = Instant::now() + self.config.ready_timeout();
        let interval = self.config.ready_poll_interval();

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let attempt = self
                .call_method_with_timeout::<_, Value>(target, PING, (), remaining)
                .await;
            match attempt {
                Ok(_) => return Ok(()),
                Err(err) if Instant::now() + interval >= deadline => {
                    debug!(%target, error = %err, "Target never became ready");
                    return Err(BrickflowError::Timeout {
                        method: PING.name.to_string(),
                        timeout_ms: self.config.ready_timeout_ms,
                    });
                }
                Err(_) => tokio::time::sleep(interval).await,
            }
        }
    }
}

/// Decodes a JSON argument array into the handler's tuple type.
fn decode_args<A: DeserializeOwned>(args: Value) -> Result<A> {
    match serde_json::from_value(args.clone()) {
        Ok(decoded) => Ok(decoded),
        Err(_) if args.as_array().is_some_and(Vec::is_empty) => Ok(serde_json::from_value(Value::Null)?),
        Err(err) => Err(err.into()),
    }
}

async fn dispatch_loop(
    target: Target,
    handlers: Arc<DashMap<String, BoxedHandler>>,
    mut receiver: mpsc::UnboundedReceiver<Delivery>,
) {
    while let Some(Delivery { envelope, reply }) = receiver.recv().await {
        let handler = handlers
            .get(&envelope.method)
            .map(|entry| Arc::clone(entry.value()));

        tokio::spawn(async move {
            let Envelope {
                id,
                method,
                args,
                sender,
            } = envelope;
            let result = match handler {
                Some(handler) => handler(sender, args).await,
                None => Err(BrickflowError::MethodNotFound {
                    method: method.clone(),
                    context: target.context().to_string(),
                }),
            };
            if let Err(err) = &result {
                debug!(%id, %method, error = %err, "Handler rejected");
            }
            if reply.send(result.map_err(|e| e.to_serialized())).is_err() {
                debug!(%id, %method, "Caller went away before the reply");
            }
        });
    }
    debug!(%target, "Dispatch loop stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messenger::methods::{GET_PAGE_STATE, OPEN_TAB, RUN_BRICK};
    use crate::messenger::ContextKind;
    use serde_json::json;

    fn config() -> MessengerConfig {
        MessengerConfig {
            call_timeout_ms: 500,
            ready_timeout_ms: 200,
            ready_poll_interval_ms: 10,
        }
    }

    fn attach(bus: &Arc<MessageBus>, target: Target) -> Messenger {
        Messenger::attach(Arc::clone(bus), target, Some("https://example.com/".to_string()), config())
            .unwrap()
    }

    #[tokio::test]
    async fn test_round_trip() {
        let bus = Arc::new(MessageBus::new());
        let content = attach(&bus, Target::top_frame(1));
        let background = attach(&bus, Target::Background);

        content
            .register_method(GET_PAGE_STATE, |(a, b): (i64, String)| async move {
                Ok(json!({"sum": a + 1, "text": b}))
            })
            .unwrap();

        let value: Value = background
            .call_method(Target::top_frame(1), GET_PAGE_STATE, (41, "hi"))
            .await
            .unwrap();
        assert_eq!(value, json!({"sum": 42, "text": "hi"}));
    }

    #[tokio::test]
    async fn test_unknown_method_rejects() {
        let bus = Arc::new(MessageBus::new());
        let _content = attach(&bus, Target::top_frame(1));
        let background = attach(&bus, Target::Background);

        let err = background
            .call_method::<_, Value>(Target::top_frame(1), RUN_BRICK, ())
            .await
            .unwrap_err();
        assert_eq!(err.name(), "MethodNotFoundError");
    }

    #[tokio::test]
    async fn test_handler_errors_are_rebuilt() {
        let bus = Arc::new(MessageBus::new());
        let content = attach(&bus, Target::top_frame(1));
        let background = attach(&bus, Target::Background);
        content
            .register_method(RUN_BRICK, |()| async {
                Err::<Value, _>(BrickflowError::prop("bad selector", "selector", json!("#")))
            })
            .unwrap();

        let err = background
            .call_method::<_, Value>(Target::top_frame(1), RUN_BRICK, ())
            .await
            .unwrap_err();
        assert_eq!(err.name(), "PropError");
        assert!(err.is_business_error());
    }

    #[tokio::test]
    async fn test_registration_checks_context_and_duplicates() {
        let bus = Arc::new(MessageBus::new());
        let content = attach(&bus, Target::top_frame(1));

        let err = content
            .register_method(OPEN_TAB, |()| async { Ok(()) })
            .unwrap_err();
        assert_eq!(err.name(), "ContextMismatchError");

        content.register_method(RUN_BRICK, |()| async { Ok(()) }).unwrap();
        let err = content
            .register_method(RUN_BRICK, |()| async { Ok(()) })
            .unwrap_err();
        assert!(matches!(err, BrickflowError::DuplicateMethod { .. }));
    }

    #[tokio::test]
    async fn test_unattached_tab_fails_immediately() {
        let bus = Arc::new(MessageBus::new());
        let background = attach(&bus, Target::Background);

        let err = background
            .call_method::<_, Value>(Target::top_frame(9), PING, ())
            .await
            .unwrap_err();
        assert_eq!(err.message(), crate::messenger::RECEIVING_END_MISSING);
        assert!(err.is_transport_error());
    }

    #[tokio::test]
    async fn test_singleton_call_waits_for_attach() {
        let bus = Arc::new(MessageBus::new());
        let content = attach(&bus, Target::top_frame(1));

        let call = {
            let content = content.clone();
            tokio::spawn(async move {
                content
                    .call_method::<_, bool>(Target::Background, OPEN_TAB, ("https://example.com",))
                    .await
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        let background = attach(&bus, Target::Background);
        background
            .register_method(OPEN_TAB, |(_url,): (String,)| async { Ok(true) })
            .unwrap();

        assert!(call.await.unwrap().unwrap());
    }

    #[tokio::test]
    async fn test_call_times_out() {
        let bus = Arc::new(MessageBus::new());
        let content = attach(&bus, Target::top_frame(1));
        let background = attach(&bus, Target::Background);
        content
            .register_method(RUN_BRICK, |()| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(())
            })
            .unwrap();

        let err = background
            .call_method_with_timeout::<_, Value>(Target::top_frame(1), RUN_BRICK, (), Duration::from_millis(20))
            .await
            .unwrap_err();
        assert_eq!(err.name(), "TimeoutError");
    }

    #[tokio::test]
    async fn test_wait_for_target_ready() {
        let bus = Arc::new(MessageBus::new());
        let background = attach(&bus, Target::Background);

        let err = background
            .wait_for_target_ready(Target::top_frame(2))
            .await
            .unwrap_err();
        assert_eq!(err.name(), "TimeoutError");

        let content = attach(&bus, Target::top_frame(2));
        let waiter = {
            let background = background.clone();
            tokio::spawn(async move { background.wait_for_target_ready(Target::top_frame(2)).await })
        };
        tokio::time::sleep(Duration::from_millis(30)).await;
        content.mark_ready().unwrap();
        waiter.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_detach_closes_endpoint() {
        let bus = Arc::new(MessageBus::new());
        let content = attach(&bus, Target::top_frame(1));
        assert_eq!(content.target().context(), ContextKind::ContentScript);
        assert!(bus.is_attached(Target::top_frame(1)));
        assert!(content.detach());
        assert!(!bus.is_attached(Target::top_frame(1)));
        assert!(!content.detach());
    }
}
