//! Logging configuration for the extension
//!
//! The bridge logs through the `log` facade; this module installs an
//! `env_logger` backend. Godot loads the library into its own process, so
//! every initializer here tolerates a logger that is already installed.
//!
//! # Log Levels
//!
//! - `error!` - failed registration, failed construction, managed exceptions
//! - `warn!` - calls that were dropped (stale instance, missing argument)
//! - `info!` - class registration and unregistration
//! - `debug!` - instance creation and teardown, initialization levels
//! - `trace!` - every forwarded virtual call
//!
//! # Environment Variable
//!
//! ```bash
//! RUST_LOG=info godot --path game            # registrations
//! RUST_LOG=gdjvm_bridge=trace godot --path game
//! ```

use env_logger::Builder;
use log::LevelFilter;
use std::io::Write;
use std::sync::Once;

static INIT: Once = Once::new();

/// Initialize logging at `Warn`. Later calls are no-ops.
pub fn init() {
    init_with_level(LevelFilter::Warn);
}

/// Initialize logging at `level`. Later calls are no-ops.
pub fn init_with_level(level: LevelFilter) {
    INIT.call_once(|| {
        let _ = Builder::new()
            .filter_level(level)
            .format(|buf, record| {
                writeln!(
                    buf,
                    "[gdjvm {:5}] {} - {}",
                    record.level(),
                    record.target(),
                    record.args()
                )
            })
            .try_init();
    });
}

/// Initialize logging from `RUST_LOG`, defaulting to `warn`
pub fn init_from_env() {
    INIT.call_once(|| {
        let _ = Builder::from_env(env_logger::Env::default().default_filter_or("warn")).try_init();
    });
}

/// Initialize logging for tests
pub fn init_test() {
    let _ = env_logger::builder()
        .filter_level(LevelFilter::Warn)
        .is_test(true)
        .try_init();
}

/// Whether one of the initializers above has run
pub fn is_initialized() -> bool {
    INIT.is_completed()
}
