use std::sync::OnceLock;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

static INITIALISED: OnceLock<()> = OnceLock::new();

#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("logging has already been initialised")]
    AlreadyInitialised,
    #[error("failed to install tracing subscriber: {0}")]
    Install(#[from] tracing_subscriber::util::TryInitError),
}

/// Install a fmt subscriber filtered by `RUST_LOG` (default `info`), writing to stderr.
pub fn init_logging() -> Result<(), LoggingError> {
    INITIALISED
        .set(())
        .map_err(|_| LoggingError::AlreadyInitialised)?;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr);
    Registry::default().with(filter).with(fmt_layer).try_init()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_init_is_reported() {
        let first = init_logging();
        assert!(first.is_ok() || matches!(first, Err(LoggingError::Install(_))));
        assert!(matches!(
            init_logging(),
            Err(LoggingError::AlreadyInitialised)
        ));
    }
}
