//! Logging setup.
//!
//! All modules log through the `log` facade. Binaries embedding the crate
//! call [`init_logging`] once at startup; `RUST_LOG` overrides the level.

use log::LevelFilter;
use std::sync::Once;

static INIT: Once = Once::new();

/// Install the `env_logger` backend at `level`. Later calls are no-ops, as is
/// calling this after another logger has been installed.
pub fn init_logging(level: LevelFilter) {
    INIT.call_once(|| {
        let result = env_logger::Builder::new()
            .filter_level(level)
            .parse_default_env()
            .format_timestamp_millis()
            .try_init();
        if result.is_ok() {
            log::debug!("Logging initialized at {}", level);
        }
    });
}

/// Logger for unit and integration tests; output is captured per test
pub fn init_test_logging() {
    let _ = env_logger::builder()
        .filter_level(LevelFilter::Debug)
        .is_test(true)
        .try_init();
}
