//! `tg-graph` - Dataflow graphs of tensor operations: host evaluation and
//! static bound analysis.
//!
//! This crate provides:
//! - An arena [`Graph`] of [`Node`]s wired by [`Output`] slots, closed into a
//!   [`Function`] with ordered parameters and results
//! - The [`Operator`] extension point and an [`OpRegistry`] of built-ins
//! - [`Evaluator`], which runs the part of a function its results depend on
//!   and resolves dynamic shapes as it goes
//! - [`BoundAnalyzer`] / [`maximum_value`], conservative upper bounds on a
//!   node's value computed without executing anything

pub mod bound;
pub mod builder;
pub mod config;
pub mod error;
pub mod evaluator;
pub mod function;
pub mod graph;
pub mod operator;
pub mod ops;
pub mod registry;

pub use bound::{maximum_value, BoundAnalyzer, MaxValue};
pub use builder::GraphBuilder;
pub use config::EvalConfig;
pub use error::{GraphError, Result};
pub use evaluator::Evaluator;
pub use function::Function;
pub use graph::{AttributeValue, Attributes, Graph, Node, NodeId, Output, OutputInfo};
pub use operator::{BoundCtx, EvalCtx, InferCtx, Operator};
pub use registry::OpRegistry;
