//! Tracing setup for binaries embedding the client.

use tracing_subscriber::{fmt, EnvFilter};

/// Install the global tracing subscriber.
///
/// `RUST_LOG` overrides the default filter. Call once at startup; calling
/// again is a no-op.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("farview_client=info,farview_net=info,farview_store=warn,warn")
    });

    let _ = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}
