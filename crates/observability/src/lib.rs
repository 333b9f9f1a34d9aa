//! Tracing / logging setup shared by every binary and test harness.

/// Initialize process-wide tracing with defaults (`RUST_LOG`, JSON output).
///
/// This is safe to call multiple times; subsequent calls become no-ops.
pub fn init() {
    tracing::init();
}

/// Initialize with an explicit configuration.
pub fn init_with(config: &TracingConfig) {
    tracing::init_with(config);
}

/// Tracing configuration (filters, output format).
pub mod tracing;

pub use tracing::{LogFormat, TracingConfig, UnknownLogFormat};
