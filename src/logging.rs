use log::LevelFilter;
use std::env;

/// Set up `env_logger` for the command-line tool. Logs at `Debug` level if `debug_enabled` is
/// set and `Info` otherwise; `RUST_LOG`, if present, overrides both (use `RUST_LOG=trace` to
/// follow individual placements).
pub fn init_logger(debug_enabled: bool) {
    let level = if debug_enabled {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    let mut builder = env_logger::Builder::new();
    builder
        .filter(None, level)
        .format_timestamp(None)
        .format_module_path(false)
        .format_target(false);

    if let Ok(filters) = env::var("RUST_LOG") {
        builder.parse_filters(&filters);
    }

    // A second initialization (e.g. from a test harness) keeps the first logger.
    if builder.try_init().is_ok() {
        log::debug!("Logger initialized at {level:?} level");
    }
}
