use crate::severity::LogSeverity;
use crate::time::now;
use once_cell::sync::OnceCell;

static MIN_SEVERITY: OnceCell<LogSeverity> = OnceCell::new();

/// Sets the minimum severity that will be printed. May be called once, at
/// startup; later calls are ignored. Defaults to Info.
pub fn set_min_severity(severity: LogSeverity) {
    let _ = MIN_SEVERITY.set(severity);
}

fn min_severity() -> LogSeverity {
    *MIN_SEVERITY.get().unwrap_or(&LogSeverity::Info)
}

pub fn log(msg: String, log_severity: LogSeverity) {
    if log_severity < min_severity() {
        return;
    }
    println!("[{}] {} {}", log_severity, now(), msg);
}
