//! Error codes shared by every error type in the crate.
//!
//! Each module owns its own `thiserror` enum; this trait gives all of them a
//! grepable code that is attached to log lines.

/// Grepable error code for structured logging.
pub trait ErrorCode: std::fmt::Display {
    fn error_code(&self) -> &'static str;
}
