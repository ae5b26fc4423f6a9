//! Logging setup for embedding applications.

use log::LevelFilter;
use std::io::Write;

/// Installs an env_logger backend at the given level. Safe to call more than
/// once; later calls only adjust the maximum level.
pub fn init_logger(level: LevelFilter) {
    let mut builder = env_logger::Builder::new();
    builder
        .format(move |buf, record| {
            writeln!(
                buf,
                "{}: {} - {}",
                record.level(),
                record.target(),
                record.args()
            )
        })
        .target(env_logger::Target::Stdout)
        .filter_level(level);

    let _ = builder.try_init();

    log::set_max_level(level);
}

/// Parses a level name and installs the logger; returns false when the name
/// is not recognized.
pub fn set_log_level(level: &str) -> bool {
    let lvl = match level.to_lowercase().as_str() {
        "off" => LevelFilter::Off,
        "error" => LevelFilter::Error,
        "warn" | "warning" => LevelFilter::Warn,
        "info" => LevelFilter::Info,
        "debug" => LevelFilter::Debug,
        "trace" => LevelFilter::Trace,
        _ => return false,
    };

    init_logger(lvl);
    true
}
