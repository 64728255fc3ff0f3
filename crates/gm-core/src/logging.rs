use tracing_subscriber::{fmt, EnvFilter};

/// `RUST_LOG` wins; `default_directives` covers the unset case
/// (e.g. "info", "gm_tracker=debug,warn").
fn filter(default_directives: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directives))
}

/// Compact human-readable logging for interactive runs.
///
/// Repeat calls are no-ops, so tests and embedding hosts can call this
/// unconditionally.
pub fn init_logging(service_name: &str, default_directives: &str) {
    let installed = fmt()
        .compact()
        .with_env_filter(filter(default_directives))
        .with_target(true)
        .try_init()
        .is_ok();
    if installed {
        tracing::info!(service = service_name, format = "compact", "logging initialised");
    }
}

/// JSON logging with flattened event fields, for log shippers.
///
/// Same filter and repeat-call semantics as [`init_logging`].
pub fn init_logging_json(service_name: &str, default_directives: &str) {
    let installed = fmt()
        .json()
        .flatten_event(true)
        .with_current_span(false)
        .with_env_filter(filter(default_directives))
        .try_init()
        .is_ok();
    if installed {
        tracing::info!(service = service_name, format = "json", "logging initialised");
    }
}
