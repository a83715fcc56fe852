//! Logger initialisation
//!
//! Everything in the crate logs through the `log` facade. The binary
//! installs `env_logger`; `RUST_LOG` always overrides the default filter.

/// Default filter for the given debug setting
pub fn default_filter(debug: bool) -> &'static str {
    if debug {
        "debug"
    } else {
        "info"
    }
}

/// Install the global logger. Safe to call more than once; later calls
/// are ignored.
pub fn init(debug: bool) {
    let env = env_logger::Env::default().default_filter_or(default_filter(debug));
    let _ = env_logger::Builder::from_env(env)
        .format_timestamp_millis()
        .try_init();
}
