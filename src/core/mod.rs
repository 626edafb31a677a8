/*!
 * Core Types
 * Errors and the handle registry shared by both primitives
 */

pub mod errors;
pub mod registry;

pub use errors::{EventError, Result};
pub use registry::HandleId;
