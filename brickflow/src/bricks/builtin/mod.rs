//! Built-in bricks.

mod display;
mod for_each;
mod identity;
mod lookup;
mod markdown;
mod state;

pub use display::{DisplayTemporaryInfo, PanelEntry, PanelHost};
pub use for_each::ForEachBrick;
pub use identity::IdentityBrick;
pub use lookup::LookupBrick;
pub use markdown::MarkdownRenderer;
pub use state::{GetStateBrick, SetStateBrick};

use super::{Brick, BrickRegistry};
use crate::state::StateController;
use std::sync::Arc;

/// Registers every built-in brick.
pub fn register_builtins(
    registry: &BrickRegistry,
    state: Arc<StateController>,
    panels: Arc<dyn PanelHost>,
) {
    registry.register_all([
        Arc::new(IdentityBrick) as Arc<dyn Brick>,
        Arc::new(LookupBrick),
        Arc::new(ForEachBrick),
        Arc::new(MarkdownRenderer),
        Arc::new(GetStateBrick::new(Arc::clone(&state))),
        Arc::new(SetStateBrick::new(state)),
        Arc::new(DisplayTemporaryInfo::new(panels)),
    ]);
}
