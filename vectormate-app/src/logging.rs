//! `tracing` output routed to the browser console.
//!
//! No tracing subscriber is installed in the browser. With the `log` feature
//! on `tracing`, every event falls through to a `log` record, and
//! `console_log` writes those to the console.

/// Most verbose level forwarded to the console.
pub const CONSOLE_LEVEL: log::Level = log::Level::Debug;

/// Install the console logger. Later calls are ignored.
pub fn init_console_logging() {
    if console_log::init_with_level(CONSOLE_LEVEL).is_ok() {
        tracing::debug!("Console logging at {CONSOLE_LEVEL}");
    }
}
