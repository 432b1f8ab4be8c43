//! Remote brick execution over the messenger.

use super::background::BroadcastResult;
use super::context::Target;
use super::endpoint::Messenger;
use super::methods::{
    REQUEST_RUN_IN_BROADCAST, REQUEST_RUN_IN_OPENER, REQUEST_RUN_IN_TARGET, REQUEST_RUN_IN_TOP,
    RUN_BRICK,
};
use crate::errors::Result;
use crate::pipeline::{BrickWindow, RemoteBrickExecutor, RemoteBrickRequest};
use async_trait::async_trait;
use serde_json::Value;

/// Runs non-local bricks by asking the background to route them.
#[derive(Debug, Clone)]
pub struct MessengerRemoteExecutor {
    messenger: Messenger,
}

impl MessengerRemoteExecutor {
    /// Creates an executor calling through `messenger`.
    #[must_use]
    pub fn new(messenger: Messenger) -> Self {
        Self { messenger }
    }
}

#[async_trait]
impl RemoteBrickExecutor for MessengerRemoteExecutor {
    async fn run_remote(&self, window: BrickWindow, request: RemoteBrickRequest) -> Result<Value> {
        let args = (request,);
        match window {
            BrickWindow::Local => {
                self.messenger
                    .call_method(self.messenger.target(), RUN_BRICK, args)
                    .await
            }
            BrickWindow::Opener => {
                self.messenger
                    .call_method(Target::Background, REQUEST_RUN_IN_OPENER, args)
                    .await
            }
            BrickWindow::Target => {
                self.messenger
                    .call_method(Target::Background, REQUEST_RUN_IN_TARGET, args)
                    .await
            }
            BrickWindow::Top => {
                self.messenger
                    .call_method(Target::Background, REQUEST_RUN_IN_TOP, args)
                    .await
            }
            BrickWindow::Broadcast => {
                let result: BroadcastResult = self
                    .messenger
                    .call_method(Target::Background, REQUEST_RUN_IN_BROADCAST, args)
                    .await?;
                Ok(Value::Array(result.fulfilled))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bricks::builtin::IdentityBrick;
    use crate::bricks::BrickRegistry;
    use crate::config::MessengerConfig;
    use crate::context::BrickArgsContext;
    use crate::messenger::{
        register_content_script_methods, BackgroundRouter, HostPermissions, MessageBus,
        MockTabLauncher, TabLinkage,
    };
    use crate::pipeline::{BrickConfig, Pipeline, PipelineRuntime, RunOptions};
    use crate::state::StateController;
    use serde_json::json;
    use std::sync::Arc;

    fn runtime() -> PipelineRuntime {
        let registry = Arc::new(BrickRegistry::new());
        registry.register(Arc::new(IdentityBrick));
        PipelineRuntime::new(registry)
    }

    fn content_tab(bus: &Arc<MessageBus>, tab_id: u32) -> Messenger {
        let messenger = Messenger::attach(
            Arc::clone(bus),
            Target::top_frame(tab_id),
            Some(format!("https://tab{tab_id}.example.com/")),
            MessengerConfig::default(),
        )
        .unwrap();
        register_content_script_methods(
            &messenger,
            runtime(),
            Arc::new(StateController::default()),
            RunOptions::new(),
        )
        .unwrap();
        messenger
    }

    #[tokio::test]
    async fn test_broadcast_window_runs_in_other_tabs() {
        let bus = Arc::new(MessageBus::new());
        let background =
            Messenger::attach(Arc::clone(&bus), Target::Background, None, MessengerConfig::default()).unwrap();
        let router = Arc::new(BackgroundRouter::new(
            background,
            Arc::new(TabLinkage::new()),
            HostPermissions::from_patterns(&["<all_urls>"]).unwrap(),
            Arc::new(MockTabLauncher::new()),
        ));
        router.register().unwrap();

        let origin = content_tab(&bus, 1);
        let _two = content_tab(&bus, 2);
        let _three = content_tab(&bus, 3);

        let result = runtime()
            .with_remote_executor(Arc::new(MessengerRemoteExecutor::new(origin)))
            .run_pipeline(
                &Pipeline::new(vec![BrickConfig::new(IdentityBrick::ID)
                    .with_window(BrickWindow::Broadcast)
                    .with_config(json!({"x": 1}))])
                .unwrap(),
                BrickArgsContext::new(),
                &RunOptions::new(),
            )
            .await
            .unwrap();

        assert_eq!(result.output, json!([{"x": 1}, {"x": 1}]));
    }

    #[tokio::test]
    async fn test_top_window_runs_in_own_top_frame() {
        let bus = Arc::new(MessageBus::new());
        let background =
            Messenger::attach(Arc::clone(&bus), Target::Background, None, MessengerConfig::default()).unwrap();
        let router = Arc::new(BackgroundRouter::new(
            background,
            Arc::new(TabLinkage::new()),
            HostPermissions::default(),
            Arc::new(MockTabLauncher::new()),
        ));
        router.register().unwrap();
        let _top = content_tab(&bus, 4);

        let frame = Messenger::attach(
            Arc::clone(&bus),
            Target::Tab { tab_id: 4, frame_id: 2 },
            None,
            MessengerConfig::default(),
        )
        .unwrap();
        let output = MessengerRemoteExecutor::new(frame)
            .run_remote(BrickWindow::Top, RemoteBrickRequest::new(IdentityBrick::ID, json!({"y": 2})))
            .await
            .unwrap();
        assert_eq!(output, json!({"y": 2}));
    }
}
