//! Log output for the headless driver and tests.
//!
//! Filter comes from `RUST_LOG`; without it only `wallrun` info and above is shown.

/// Install the global fmt subscriber. Safe to call more than once; later calls
/// are ignored.
pub fn init_tracing() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("wallrun=info"));

    let _ = tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(true)
                .with_file(false)
                .with_line_number(false)
                .with_timer(fmt::time::uptime()),
        )
        .with(filter)
        .try_init();
}
