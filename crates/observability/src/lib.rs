//! Process-wide tracing setup shared by binaries and tests.

/// Tracing configuration (filters, output format).
pub mod tracing;

pub use self::tracing::LogFormat;

/// Initialize process-wide observability with the format from `LOG_FORMAT`.
///
/// This is safe to call multiple times; subsequent calls become no-ops.
pub fn init() {
    self::tracing::init(LogFormat::from_env());
}
