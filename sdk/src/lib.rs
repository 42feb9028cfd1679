//! Todo Agent SDK
//!
//! Shared library providing the error taxonomy used by the engine and any
//! front end that drives it.

/// Error types and handling
pub mod errors;

// Re-export commonly used types
pub use errors::{EngineError, ErrorExt};
