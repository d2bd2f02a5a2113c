use tracing_subscriber::{fmt, EnvFilter};

/// Noisy transport crates are capped at `warn` unless `RUST_LOG`
/// overrides them; a poll loop at debug level would otherwise drown in
/// client-library chatter.
const QUIET_DIRECTIVES: &str = "octocrab=warn,hyper=warn,tower=warn";

fn default_directives(default_level: &str) -> String {
    format!("{},{}", default_level, QUIET_DIRECTIVES)
}

fn build_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(default_level)))
}

/// Initialize human-readable logging for interactive runs.
///
/// Uses the `RUST_LOG` environment variable if set, otherwise falls back
/// to `default_level` (e.g. "info", "dc_engine=debug,warn") plus the
/// quiet directives for transport crates.
///
/// Safe to call multiple times (e.g. in tests) -- subsequent calls are no-ops.
pub fn init_logging(service_name: &str, default_level: &str) {
    fmt()
        .with_env_filter(build_filter(default_level))
        .with_target(true)
        .with_thread_ids(false)
        .with_level(true)
        .try_init()
        .ok();

    tracing::info!(service = service_name, "logging initialised (human-readable)");
}

/// Initialize JSON logging for log shippers.
///
/// Same filter behavior as [`init_logging`]; event fields are flattened
/// into the top-level JSON object so downstream queries address
/// `work_item` rather than `fields.work_item`.
///
/// Safe to call multiple times -- subsequent calls are no-ops.
pub fn init_logging_json(service_name: &str, default_level: &str) {
    fmt()
        .json()
        .flatten_event(true)
        .with_env_filter(build_filter(default_level))
        .with_target(true)
        .with_level(true)
        .try_init()
        .ok();

    tracing::info!(service = service_name, "logging initialised (json)");
}
