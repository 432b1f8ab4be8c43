//! Content script methods.

use super::endpoint::Messenger;
use super::methods::{GET_PAGE_STATE, RUN_BRICK, RUN_RENDERER_PIPELINE, SET_PAGE_STATE};
use crate::context::BrickArgsContext;
use crate::errors::Result;
use crate::pipeline::{Pipeline, PipelineRuntime, RemoteBrickRequest, RunOptions};
use crate::state::{GetStateRequest, SetStateRequest, StateController};
use serde_json::Value;
use std::sync::Arc;

/// Registers the content script's methods on `messenger` and marks it ready.
///
/// Every call runs with a clone of `options`.
pub fn register_content_script_methods(
    messenger: &Messenger,
    runtime: PipelineRuntime,
    state: Arc<StateController>,
    options: RunOptions,
) -> Result<()> {
    {
        let runtime = runtime.clone();
        let options = options.clone();
        messenger.register_method(RUN_BRICK, move |(request,): (RemoteBrickRequest,)| {
            let runtime = runtime.clone();
            let options = options.clone();
            async move { runtime.run_brick(request, &options).await }
        })?;
    }

    messenger.register_method(
        RUN_RENDERER_PIPELINE,
        move |(pipeline, ctxt): (Pipeline, Value)| {
            let runtime = runtime.clone();
            let options = options.clone();
            async move {
                let ctxt = BrickArgsContext::from_value(ctxt)?;
                runtime.run_renderer_pipeline(&pipeline, ctxt, &options).await
            }
        },
    )?;

    {
        let state = Arc::clone(&state);
        messenger.register_method(GET_PAGE_STATE, move |(request,): (GetStateRequest,)| {
            let result = state.get_state(&request);
            async move { result }
        })?;
    }

    messenger.register_method(SET_PAGE_STATE, move |(request,): (SetStateRequest,)| {
        let result = state.set_state(request);
        async move { result }
    })?;

    messenger.mark_ready()
}
