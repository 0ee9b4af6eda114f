//! Package-level constants.

/// User agent sent with every outbound HTTP request.
pub const USER_AGENT: &str = concat!("genie-monitor/", env!("CARGO_PKG_VERSION"));
