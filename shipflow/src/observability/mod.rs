//! Tracing subscriber setup for binaries and tests that embed the engine.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Installs a formatted tracing subscriber.
///
/// `RUST_LOG` takes precedence; `default_directive` (e.g. `"shipflow=info"`)
/// is used when it is unset. Installing twice is not an error: the first
/// subscriber stays in place.
pub fn init_tracing(default_directive: &str) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_directive))?;

    if tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true))
        .try_init()
        .is_err()
    {
        tracing::debug!("Tracing subscriber already installed");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_twice_is_ok() {
        assert!(init_tracing("shipflow=debug").is_ok());
        assert!(init_tracing("shipflow=info").is_ok());
    }
}
