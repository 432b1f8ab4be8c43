//! Messenger method names and the contexts that serve them.

use super::context::ContextKind;

/// A method name bound to the one context that implements it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MethodSpec {
    /// Wire name.
    pub name: &'static str,
    /// Context the handler must be registered in.
    pub context: ContextKind,
}

impl MethodSpec {
    /// Declares a method.
    #[must_use]
    pub const fn new(name: &'static str, context: ContextKind) -> Self {
        Self { name, context }
    }
}

/// Readiness probe answered by content scripts.
pub const PING: MethodSpec = MethodSpec::new("PING", ContextKind::ContentScript);
/// Runs a single brick with rendered arguments.
pub const RUN_BRICK: MethodSpec = MethodSpec::new("RUN_BRICK", ContextKind::ContentScript);
/// Runs a pipeline that ends in a renderer.
pub const RUN_RENDERER_PIPELINE: MethodSpec =
    MethodSpec::new("RUN_RENDERER_PIPELINE", ContextKind::ContentScript);
/// Reads page state.
pub const GET_PAGE_STATE: MethodSpec = MethodSpec::new("GET_PAGE_STATE", ContextKind::ContentScript);
/// Writes page state.
pub const SET_PAGE_STATE: MethodSpec = MethodSpec::new("SET_PAGE_STATE", ContextKind::ContentScript);

/// Locates an integration configuration.
pub const LOCATE_SERVICE: MethodSpec = MethodSpec::new("LOCATE_SERVICE", ContextKind::Background);
/// Returns cached OAuth2 data for an integration configuration.
pub const GET_CACHED_AUTH: MethodSpec = MethodSpec::new("GET_CACHED_AUTH", ContextKind::Background);
/// Opens a tab linked to the sender's tab.
pub const OPEN_TAB: MethodSpec = MethodSpec::new("OPEN_TAB", ContextKind::Background);
/// Runs a brick in the tab that opened the sender's tab.
pub const REQUEST_RUN_IN_OPENER: MethodSpec =
    MethodSpec::new("REQUEST_RUN_IN_OPENER", ContextKind::Background);
/// Runs a brick in the tab the sender's tab opened.
pub const REQUEST_RUN_IN_TARGET: MethodSpec =
    MethodSpec::new("REQUEST_RUN_IN_TARGET", ContextKind::Background);
/// Runs a brick in the top frame of the sender's tab.
pub const REQUEST_RUN_IN_TOP: MethodSpec = MethodSpec::new("REQUEST_RUN_IN_TOP", ContextKind::Background);
/// Runs a brick in every other permitted tab.
pub const REQUEST_RUN_IN_BROADCAST: MethodSpec =
    MethodSpec::new("REQUEST_RUN_IN_BROADCAST", ContextKind::Background);
