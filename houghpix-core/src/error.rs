//! Error types for houghpix-core.

use thiserror::Error;

/// Result type alias for houghpix operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for houghpix operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Unknown easing strategy name.
    #[error("unknown easing strategy: {name}. Available strategies: {available}")]
    UnknownEasing { name: String, available: String },

    /// Invalid configuration value.
    #[error("configuration error: {0}")]
    ConfigError(String),

    /// Slice number outside the supported `[-1, 32]` range.
    #[error("invalid slice number: {0} (expected -1 or 0..=32)")]
    InvalidSlice(i32),

    /// Bin edges do not match the grid shape.
    #[error("bin edge mismatch on {axis} axis: {bins} bins need {expected} edges, got {edges}")]
    EdgeMismatch {
        axis: &'static str,
        bins: usize,
        expected: usize,
        edges: usize,
    },

    /// Grid data length does not match the declared shape.
    #[error("grid shape mismatch: {rows}x{cols} needs {expected} values, got {actual}")]
    ShapeMismatch {
        rows: usize,
        cols: usize,
        expected: usize,
        actual: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = Error::InvalidSlice(40);
        assert_eq!(err.to_string(), "invalid slice number: 40 (expected -1 or 0..=32)");

        let err = Error::EdgeMismatch {
            axis: "row",
            bins: 10,
            expected: 11,
            edges: 10,
        };
        assert!(err.to_string().contains("row axis"));
    }
}
