use tg_tensor::{ElementType, TensorError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GraphError {
    #[error("tensor error: {0}")]
    Tensor(#[from] TensorError),
    #[error("type mismatch in {context}: expected {expected}, got {got}")]
    TypeMismatch {
        context: String,
        expected: ElementType,
        got: ElementType,
    },
    #[error("shape conflict: {0}")]
    ShapeConflict(String),
    #[error("unsupported operation: {0}")]
    UnsupportedOperation(String),
    #[error("expected {expected} input buffers, got {got}")]
    InputCount { expected: usize, got: usize },
    #[error("expected {expected} output buffers, got {got}")]
    OutputCount { expected: usize, got: usize },
    #[error("invalid graph: {0}")]
    InvalidGraph(String),
    #[error("attribute error: {0}")]
    Attribute(String),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl GraphError {
    /// True for element type disagreements, whether found by the evaluator or
    /// by a typed buffer access.
    pub fn is_type_mismatch(&self) -> bool {
        matches!(
            self,
            GraphError::TypeMismatch { .. } | GraphError::Tensor(TensorError::TypeMismatch { .. })
        )
    }

    /// True for shape disagreements at any level.
    pub fn is_shape_conflict(&self) -> bool {
        matches!(
            self,
            GraphError::ShapeConflict(_)
                | GraphError::Tensor(TensorError::ShapeConflict { .. })
                | GraphError::Tensor(TensorError::BroadcastError { .. })
        )
    }
}

pub type Result<T> = std::result::Result<T, GraphError>;
