//! `tg-tensor` - Element types, shapes, and typed host buffers for tensor-graph.
//!
//! This crate provides:
//! - `ElementType` tags and the `Element` trait mapping them to native types
//! - Static `Shape`s and `PartialShape`s with unknown rank or dimensions
//! - `TensorBuffer`, a typed host memory block with runtime-checked access
//!   that may start shapeless and be resized by its producer

pub mod dtype;
pub mod element;
pub mod error;
pub mod partial_shape;
pub mod shape;
pub mod storage;
pub mod tensor;

// Re-export primary types at the crate root for convenience.
pub use dtype::ElementType;
pub use element::{Element, Numeric};
pub use error::{Result, TensorError};
pub use half;
pub use partial_shape::{Dimension, PartialShape};
pub use shape::{normalize_axis, Shape};
pub use storage::HostStorage;
pub use tensor::TensorBuffer;
