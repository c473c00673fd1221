//! Error types for the subdiv-halfedge crate.

use thiserror::Error;

/// Main error type for subdiv-halfedge operations.
///
/// Every fallible call checks its arguments before touching any buffer, so an
/// `Err` never leaves a [`Mesh`](crate::Mesh) partially modified.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum Error {
    /// Unknown or out-of-range buffer slot or topology requested.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Misaligned buffer layout or violated structural precondition.
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// Invalid topology descriptor.
    #[error("Invalid topology descriptor: {0}")]
    InvalidTopology(String),

    /// Index out of bounds.
    #[error("Index {index} out of bounds (max: {max})")]
    IndexOutOfBounds { index: usize, max: usize },

    /// Invalid buffer size.
    #[error("Invalid buffer size: expected {expected}, got {actual}")]
    InvalidBufferSize { expected: usize, actual: usize },
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn misaligned() -> Self {
        Error::InvalidOperation("data must be 4 bytes aligned".to_string())
    }

    pub(crate) fn unknown_buffer(what: impl std::fmt::Display) -> Self {
        Error::InvalidArgument(format!("unknown buffer type: {}", what))
    }
}
