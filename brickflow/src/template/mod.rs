//! Template and expression language for brick arguments.
//!
//! Arguments may contain explicit expressions
//! (`{"__type__": "var", "__value__": "@input.url"}`), mustache-style
//! interpolation (`{{ @input.name | upper }}`) and nested pipelines that are
//! left for controller bricks to run.

mod expression;
mod interpolate;
mod path;
mod render;
mod truthy;

pub use expression::{Expression, ExpressionType, EXPRESSION_TYPE_KEY, EXPRESSION_VALUE_KEY};
pub use interpolate::render_template;
pub use path::{lookup_path, parse_path, PathSegment};
pub use render::{evaluate_condition, render_args, ApiVersion};
pub use truthy::boolean;
