//! Stable exit codes for studio CLI commands.

/// Command succeeded.
pub const OK: i32 = 0;
/// Command failed due to invalid config, persistence errors, or other errors.
pub const INVALID: i32 = 1;
/// `studio ask` was rejected before any stage ran (empty request).
pub const REJECTED: i32 = 2;
