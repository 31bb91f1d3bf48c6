use thiserror::Error;

use crate::dtype::ElementType;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TensorError {
    #[error("element type mismatch: buffer holds {expected}, accessed as {got}")]
    TypeMismatch {
        expected: ElementType,
        got: ElementType,
    },
    #[error("buffer is shapeless; resize it before typed access")]
    Unallocated,
    #[error("shape conflict: {a} vs {b}")]
    ShapeConflict { a: String, b: String },
    #[error("buffer was already handed to a consumer and cannot be resized")]
    InvalidResize,
    #[error("data length {got} does not match shape element count {expected}")]
    DataLength { expected: usize, got: usize },
    #[error("index {index} out of range for buffer of {len} elements")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("invalid axis {axis} for tensor with {ndim} dimensions")]
    InvalidAxis { axis: i64, ndim: usize },
    #[error("cannot broadcast shapes {a} and {b}")]
    BroadcastError { a: String, b: String },
    #[error("integer {0} does not fit in i64")]
    IntegerOverflow(i128),
    #[error("unsupported element type: {0}")]
    UnsupportedType(ElementType),
}

pub type Result<T> = std::result::Result<T, TensorError>;
