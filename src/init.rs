// Logging/tracing setup

use gharchive_lake_config::{LogFormat, LoggingConfig};

/// Initialize tracing from the logging config
///
/// `RUST_LOG`-style directives are accepted in `logging.level`; an invalid
/// filter falls back to `info`. Calling this twice is a no-op.
pub fn init_tracing(config: &LoggingConfig) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let env_filter = EnvFilter::try_new(&config.level).unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(env_filter);

    // Ignore the error when a global subscriber is already set
    let _ = match config.format {
        LogFormat::Json => {
            tracing::subscriber::set_global_default(registry.with(fmt::layer().json()))
        }
        LogFormat::Text => tracing::subscriber::set_global_default(registry.with(fmt::layer())),
    };
}
