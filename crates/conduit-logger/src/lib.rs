pub mod log;
pub mod severity;
pub mod time;

pub use log::{log, set_min_severity};
pub use severity::LogSeverity;

use conduit_common::Diagnostics;

/// Routes translation diagnostics into the logger. One instance is built at
/// startup and handed to every component that reports recoverable conditions.
pub struct LogDiagnostics;

impl Diagnostics for LogDiagnostics {
    fn warn(&self, message: String) {
        log(message, LogSeverity::Warning);
    }

    fn debug(&self, message: String) {
        log(message, LogSeverity::Debug);
    }
}
