//! Log setup for the plugin process

use tracing_subscriber::EnvFilter;

const LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Maps a `TF_LOG` value onto a filter directive. Terraform also accepts
/// values such as `JSON` or `OFF`; anything unrecognised logs at info.
pub fn level_from_tf_log(value: Option<&str>) -> &'static str {
    let value = value.map(|v| v.trim().to_ascii_lowercase()).unwrap_or_default();
    if value == "off" {
        return "off";
    }
    LEVELS
        .into_iter()
        .find(|level| *level == value)
        .unwrap_or("info")
}

/// Installs the global subscriber. Stdout belongs to the plugin protocol, so
/// everything goes to stderr. Calling it again is a no-op.
pub fn init() {
    let level = level_from_tf_log(std::env::var("TF_LOG").ok().as_deref());
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(level))
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
