//! Process-wide tracing setup shared by every binary.

/// Initialize tracing with the `info` default filter.
///
/// This is safe to call multiple times; subsequent calls become no-ops.
pub fn init() {
    tracing::init("info");
}

/// Initialize tracing with `default_filter`, used when `RUST_LOG` is unset.
pub fn init_with_default(default_filter: &str) {
    tracing::init(default_filter);
}

/// Tracing configuration (filters, layers).
pub mod tracing;
