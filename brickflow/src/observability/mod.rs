//! Logging and telemetry.
//!
//! - [`BrickLogger`]: the `{debug, context}` logger handed to every brick
//! - [`ErrorReporter`]: the application blame bucket for unexpected errors
//! - [`init_tracing`]: installs the global `tracing` subscriber

mod logger;
mod telemetry;

pub use logger::{BrickLogger, MessageContext};
pub use telemetry::{CollectingErrorReporter, ErrorReporter, TracingErrorReporter};

use crate::config::LoggingConfig;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Installs a global `tracing` subscriber.
///
/// `RUST_LOG` takes precedence over [`LoggingConfig::level`]. Returns an
/// error if a global subscriber is already installed.
pub fn init_tracing(config: &LoggingConfig) -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))?;

    let registry = tracing_subscriber::registry().with(env_filter);
    if config.json {
        registry
            .with(fmt::layer().json().with_target(true))
            .try_init()?;
    } else {
        registry.with(fmt::layer().with_target(true)).try_init()?;
    }

    Ok(())
}
