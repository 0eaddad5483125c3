//! Logging macros gated by a module-level `ENABLE_LOGS` flag.
//!
//! Background loops log on every tick; the flag lets a module be silenced
//! without touching the global filter.
//!
//! ```ignore
//! const ENABLE_LOGS: bool = true;
//!
//! use crate::{log_debug, log_info, log_warn, log_error};
//!
//! log_info!("drain finished: {} delivered", delivered);
//! ```

/// Info-level log, emitted only when the calling module's `ENABLE_LOGS` is true.
#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::info!($($arg)*);
        }
    };
}

/// Debug-level log, emitted only when the calling module's `ENABLE_LOGS` is true.
#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::debug!($($arg)*);
        }
    };
}

/// Warn-level log, emitted only when the calling module's `ENABLE_LOGS` is true.
#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::warn!($($arg)*);
        }
    };
}

/// Error-level log, emitted only when the calling module's `ENABLE_LOGS` is true.
#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::error!($($arg)*);
        }
    };
}
