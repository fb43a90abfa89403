use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::error::{Result, RuntimeError};

pub const ENV_LOG: &str = "FLOWRT_LOG";

const DEFAULT_DIRECTIVE: &str = "info";

fn resolve_filter() -> Result<EnvFilter> {
    let directives = std::env::var(ENV_LOG)
        .ok()
        .filter(|d| !d.trim().is_empty());

    match directives {
        Some(directives) => EnvFilter::try_new(&directives)
            .map_err(|e| RuntimeError::Config(format!("Invalid {} '{}': {}", ENV_LOG, directives, e))),
        None => Ok(EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVE))),
    }
}

/// Installs the global subscriber, filtered by `FLOWRT_LOG`, then `RUST_LOG`, then `info`.
///
/// Returns `Ok(false)` when a subscriber was already installed.
pub fn init_tracing() -> Result<bool> {
    let filter = resolve_filter()?;
    let installed = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_thread_names(true))
        .try_init()
        .is_ok();
    Ok(installed)
}
