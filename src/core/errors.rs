/*!
 * Error Types
 * Centralized error handling with thiserror, miette, and serde support
 */

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors surfaced by notification and timer operations
///
/// Callback errors raised inside a callback-driven loop are not represented
/// here: they are trapped at the loop boundary and reported through the log,
/// never propagated to whoever constructed the primitive.
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Diagnostic)]
#[serde(tag = "error_type", content = "details", rename_all = "snake_case")]
pub enum EventError {
    #[error("Invalid argument: {0}")]
    #[diagnostic(
        code(event::invalid_argument),
        help("Timeouts and intervals must be non-negative; poll intervals must be at least 1ms.")
    )]
    InvalidArgument(String),

    #[error("Event registration failed: {0}")]
    #[diagnostic(
        code(event::init_failed),
        help("The event loop rejected the registration. It may already be shut down.")
    )]
    InitFailed(String),

    #[error("Object is closed")]
    #[diagnostic(
        code(event::closed),
        help("The notification or timer was closed before delivering the awaited event.")
    )]
    Closed,
}

/// Result type for notification and timer operations
pub type Result<T> = std::result::Result<T, EventError>;
