//! Diagnostic logging for `studio` and `studio chat`.
//!
//! Stage failures, service calls and autosave results are reported through
//! `tracing` at `warn`/`debug`, written to stderr so stdout stays reserved for
//! the conversation. What the user sees (messages, task marks) comes from the
//! session store and does not depend on the filter.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Install the stderr subscriber, filtered by `RUST_LOG` (default `warn`).
///
/// `RUST_LOG=studio::pipeline=debug` shows the model and capability chosen
/// for each stage.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();
}
