//! Logging configuration and initialization.

use pantry_core::config::GeneralConfig;
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// Install the global `tracing` subscriber.
///
/// The filter comes from `RUST_LOG` when set, else from `general.log_level`.
/// `log_format = "json"` switches to one JSON object per line. Calling this
/// again after a subscriber is installed does nothing.
pub fn init_logging(general: &GeneralConfig) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&general.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(true);
    let installed = if general.log_format.eq_ignore_ascii_case("json") {
        builder.json().try_init().is_ok()
    } else {
        builder.try_init().is_ok()
    };

    if installed {
        debug!(level = %general.log_level, format = %general.log_format, "Logging initialized");
    }
}
