//! Logging setup

use once_cell::sync::OnceCell;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

static INITIALIZED: OnceCell<()> = OnceCell::new();

/// Install the global tracing subscriber
///
/// Reads the filter from `RUST_LOG` (default `info`). Safe to call more than
/// once; only the first call installs anything.
pub fn init_logging() {
    INITIALIZED.get_or_init(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
        let fmt_layer = tracing_subscriber::fmt::layer().with_target(true);
        // ignore failure: a test harness may already have a subscriber
        let _ = tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer)
            .try_init();
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_idempotent() {
        init_logging();
        init_logging();
    }
}
