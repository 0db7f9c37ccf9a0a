/// Sink for recoverable conditions found while translating packets: truncated
/// biome data, trailing bytes, component-conversion fallbacks.
///
/// Components that can hit such conditions take this explicitly instead of
/// reaching for a process-wide logger. Translation never depends on a report
/// being delivered.
pub trait Diagnostics: Send + Sync {
    fn warn(&self, message: String);
    fn debug(&self, message: String);
}

/// Discards every report. Default for code paths that have no sink wired up.
pub struct NullDiagnostics;

impl Diagnostics for NullDiagnostics {
    fn warn(&self, _message: String) {}
    fn debug(&self, _message: String) {}
}
