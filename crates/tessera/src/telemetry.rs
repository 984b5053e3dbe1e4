//! Tracing setup for binaries and tests embedding the board.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::error::{BoardError, Result};

/// Install a global `fmt` subscriber.
///
/// `RUST_LOG` takes precedence; `default_filter` (for example
/// `"tessera=debug,info"`) applies when it is unset or invalid. Fails if a
/// global subscriber is already installed.
pub fn init_tracing(default_filter: &str) -> Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true))
        .try_init()
        .map_err(|e| BoardError::Config(format!("tracing: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_install_fails() {
        init_tracing("tessera=debug").unwrap();
        assert!(matches!(init_tracing("info"), Err(BoardError::Config(_))));
    }
}
