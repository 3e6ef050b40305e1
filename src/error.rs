// error.rs - Error type shared by graph construction, compilation and evaluation
//
// Buffer errors are raised before anything is written, graph errors at the
// compile pre-walk, and cheap parameter errors directly from the setters.

use crate::bridge::DType;
use thiserror::Error;

/// Errors surfaced by node setters, graph compilation and grid evaluation.
#[derive(Debug, Error)]
pub enum NoiseError {
    /// The output buffer does not hold 32-bit floats.
    #[error("output buffer must be float32, got {found}")]
    TypeMismatch {
        /// Element type of the rejected buffer.
        found: DType,
    },

    /// The output buffer cannot hold the requested grid, or the grid
    /// dimensions themselves are unusable.
    #[error("buffer of {len} elements cannot hold a {x_size}x{y_size} grid")]
    SizeMismatch {
        /// Requested row length.
        x_size: i64,
        /// Requested row count.
        y_size: i64,
        /// Elements available in the buffer.
        len: usize,
    },

    /// A byte buffer tagged as float32 is not aligned for float access.
    #[error("output buffer is not aligned for float32 access")]
    Misaligned,

    /// A required source slot was still empty when the graph was compiled.
    #[error("{node} has nothing bound to its '{slot}' input")]
    UnboundSource {
        /// Node type owning the slot.
        node: &'static str,
        /// Name of the empty slot.
        slot: &'static str,
    },

    /// The graph reachable from the terminal node is not acyclic.
    #[error("binding through {node} would form a cycle")]
    GraphCycle {
        /// Node type at which the back-edge was found.
        node: &'static str,
    },

    /// A parameter value is outside its legal range.
    #[error("invalid parameter '{param}' for {node}: {reason}")]
    InvalidParameter {
        /// Node type (or enum) the parameter belongs to.
        node: &'static str,
        /// Name of the invalid parameter.
        param: &'static str,
        /// Description of why the value was rejected.
        reason: String,
    },

    /// A node type name did not match any registered variant.
    #[error("unknown node type: {0}")]
    UnknownNode(String),

    /// Evaluation settings could not be parsed.
    #[error("failed to parse evaluation config: {0}")]
    Config(#[from] serde_json::Error),
}

impl NoiseError {
    /// Create an invalid parameter error.
    pub fn invalid(node: &'static str, param: &'static str, reason: impl Into<String>) -> Self {
        NoiseError::InvalidParameter {
            node,
            param,
            reason: reason.into(),
        }
    }

    /// Create a size mismatch error.
    pub fn size_mismatch(x_size: impl Into<i64>, y_size: impl Into<i64>, len: usize) -> Self {
        NoiseError::SizeMismatch {
            x_size: x_size.into(),
            y_size: y_size.into(),
            len,
        }
    }
}

pub type Result<T> = std::result::Result<T, NoiseError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn invalid_factory_produces_correct_variant() {
        let err = NoiseError::invalid("Terrace", "multiplier", "must be positive");
        assert!(matches!(
            err,
            NoiseError::InvalidParameter { node: "Terrace", param: "multiplier", .. }
        ));
    }

    #[test]
    fn size_mismatch_display() {
        let err = NoiseError::size_mismatch(4, 3, 10);
        assert_eq!(err.to_string(), "buffer of 10 elements cannot hold a 4x3 grid");
    }

    #[test]
    fn type_mismatch_display() {
        let err = NoiseError::TypeMismatch { found: DType::F64 };
        assert_eq!(err.to_string(), "output buffer must be float32, got float64");
    }

    #[test]
    fn unbound_source_display() {
        let err = NoiseError::UnboundSource {
            node: "FractalFBm",
            slot: "source",
        };
        assert_eq!(
            err.to_string(),
            "FractalFBm has nothing bound to its 'source' input"
        );
    }

    #[test]
    fn invalid_parameter_display() {
        let err = NoiseError::invalid("CellularDistance", "distance_index1", "must exceed index0");
        assert_eq!(
            err.to_string(),
            "invalid parameter 'distance_index1' for CellularDistance: must exceed index0"
        );
    }

    #[test]
    fn config_error_exposes_source() {
        let parse = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err = NoiseError::from(parse);
        assert!(err.source().is_some());
    }

    #[test]
    fn graph_errors_have_no_source() {
        let err = NoiseError::GraphCycle { node: "DomainScale" };
        assert!(err.source().is_none());
        assert!(NoiseError::Misaligned.source().is_none());
    }
}
