//! Unified error types for the DFQ ecosystem
//!
//! This module provides a common error type [`DfqError`] that can represent
//! errors from any part of the system. The variants correspond to the failure
//! kinds of the discretised-generator contract: inconsistent shapes, index
//! bounds, boundary/interior confusion, unsupported discretisation schemes,
//! and structural (domain) violations.
//!
//! # Example
//!
//! ```ignore
//! use dfq_core::{DfqError, DfqResult};
//!
//! fn build(dq: &DiscretisedFluidQueue) -> DfqResult<()> {
//!     let n = dq.interior_index(0, 0, 0)?;
//!     assert!(!dq.is_boundary(n)?);
//!     Ok(())
//! }
//! ```

use thiserror::Error;

/// Unified error type for all DFQ operations.
///
/// Every error carries the offending indices or sizes so callers can report
/// exactly what was violated without re-deriving it.
#[derive(Error, Debug)]
pub enum DfqError {
    /// Block, vector, or operand sizes inconsistent
    #[error("Shape mismatch: expected {expected}, found {found}")]
    ShapeMismatch { expected: String, found: String },

    /// Index exceeds entity bounds
    #[error("Index out of range: {entity} index {index} (limit {limit})")]
    OutOfRange {
        entity: &'static str,
        index: usize,
        limit: usize,
    },

    /// Index labelled as boundary is interior, or vice versa
    #[error("Invalid boundary index: {0}")]
    InvalidBoundary(String),

    /// Requested operation is not available for this discretisation scheme
    #[error("Unsupported: {0}")]
    Unsupported(String),

    /// Structural violations (non-positive cell width, non-square block, ...)
    #[error("Domain error: {0}")]
    Domain(String),

    /// Generic errors (for wrapping external errors)
    #[error("{0}")]
    Other(String),
}

/// Convenience type alias for Results using DfqError.
pub type DfqResult<T> = Result<T, DfqError>;

// Conversion from anyhow::Error
impl From<anyhow::Error> for DfqError {
    fn from(err: anyhow::Error) -> Self {
        DfqError::Other(err.to_string())
    }
}

// Conversion from string-like types for convenience
impl From<String> for DfqError {
    fn from(s: String) -> Self {
        DfqError::Other(s)
    }
}

impl From<&str> for DfqError {
    fn from(s: &str) -> Self {
        DfqError::Other(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DfqError::OutOfRange {
            entity: "phase",
            index: 7,
            limit: 3,
        };
        assert!(err.to_string().contains("phase"));
        assert!(err.to_string().contains('7'));
        assert!(err.to_string().contains('3'));
    }

    #[test]
    fn test_shape_mismatch_display() {
        let err = DfqError::ShapeMismatch {
            expected: "3x3".into(),
            found: "2x3".into(),
        };
        assert!(err.to_string().contains("3x3"));
        assert!(err.to_string().contains("2x3"));
    }

    #[test]
    fn test_result_type_alias() {
        fn example_fn() -> DfqResult<i32> {
            Ok(42)
        }
        assert_eq!(example_fn().unwrap(), 42);
    }

    #[test]
    fn test_question_mark_operator() {
        fn inner() -> DfqResult<()> {
            Err(DfqError::Unsupported("finite-volume mesh".into()))
        }

        fn outer() -> DfqResult<()> {
            inner()?;
            Ok(())
        }

        assert!(outer().is_err());
    }
}
