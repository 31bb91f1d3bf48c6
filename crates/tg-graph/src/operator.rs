//! Operator trait and the contexts handed to it.
//!
//! An [`Operator`] carries everything the core needs to know about one
//! operation type: how to infer its outputs when a node is built, how to
//! compute it on host buffers, and how to bound its value statically.

use std::collections::HashMap;

use tg_tensor::{ElementType, PartialShape, TensorBuffer};

use crate::bound::MaxValue;
use crate::error::{GraphError, Result};
use crate::graph::{Attributes, Graph, Node, Output, OutputInfo};

/// Behaviour of one operation type.
pub trait Operator: Send + Sync {
    /// Operation type name nodes refer to, e.g. `"Add"`.
    fn name(&self) -> &str;

    /// Declared type and shape of each output, computed once when a node is
    /// added to a graph.
    fn infer(&self, ctx: &InferCtx<'_>) -> Result<Vec<OutputInfo>>;

    /// Compute the node on host buffers.
    ///
    /// `outputs` holds one buffer per output slot. Slots with a static
    /// declared shape arrive allocated; the rest arrive shapeless and must be
    /// resized by the operator.
    fn evaluate(&self, ctx: &EvalCtx<'_>, outputs: &mut [TensorBuffer]) -> Result<()>;

    /// Upper bound on the value of output `output_index`.
    ///
    /// Defaults to unbounded.
    fn maximum_value(&self, ctx: &BoundCtx<'_>, output_index: usize) -> MaxValue {
        let _ = (ctx, output_index);
        MaxValue::unbounded()
    }
}

fn input_index_error(index: usize, count: usize) -> GraphError {
    GraphError::InvalidGraph(format!(
        "input {} requested but node has {} inputs",
        index, count
    ))
}

/// Context for [`Operator::infer`].
pub struct InferCtx<'a> {
    pub graph: &'a Graph,
    pub inputs: &'a [Output],
    pub attributes: &'a Attributes,
}

impl<'a> InferCtx<'a> {
    pub fn new(graph: &'a Graph, inputs: &'a [Output], attributes: &'a Attributes) -> Self {
        Self {
            graph,
            inputs,
            attributes,
        }
    }

    pub fn input_count(&self) -> usize {
        self.inputs.len()
    }

    /// Fail unless the node has between `min` and `max` inputs.
    pub fn expect_inputs(&self, min: usize, max: usize) -> Result<()> {
        let got = self.inputs.len();
        if got < min || got > max {
            return Err(GraphError::InputCount { expected: min, got });
        }
        Ok(())
    }

    pub fn input_info(&self, index: usize) -> Result<&'a OutputInfo> {
        let output = self
            .inputs
            .get(index)
            .ok_or_else(|| input_index_error(index, self.inputs.len()))?;
        self.graph.output_info(*output)
    }

    pub fn input_type(&self, index: usize) -> Result<ElementType> {
        Ok(self.input_info(index)?.element_type)
    }

    pub fn input_shape(&self, index: usize) -> Result<&'a PartialShape> {
        Ok(&self.input_info(index)?.shape)
    }

    /// Value of input `index` if it comes straight from a Constant node.
    pub fn constant_input(&self, index: usize) -> Option<&'a TensorBuffer> {
        self.graph.constant_value(*self.inputs.get(index)?)
    }
}

/// Context for [`Operator::evaluate`].
pub struct EvalCtx<'a> {
    pub node: &'a Node,
    inputs: Vec<&'a TensorBuffer>,
}

impl<'a> EvalCtx<'a> {
    pub fn new(node: &'a Node, inputs: Vec<&'a TensorBuffer>) -> Self {
        Self { node, inputs }
    }

    pub fn input_count(&self) -> usize {
        self.inputs.len()
    }

    pub fn input(&self, index: usize) -> Result<&'a TensorBuffer> {
        self.inputs
            .get(index)
            .copied()
            .ok_or_else(|| input_index_error(index, self.inputs.len()))
    }

    pub fn attributes(&self) -> &'a Attributes {
        &self.node.attributes
    }

    /// Declared info of output slot `index`.
    pub fn output_info(&self, index: usize) -> Result<&'a OutputInfo> {
        self.node.outputs.get(index).ok_or_else(|| {
            GraphError::InvalidGraph(format!("{} has no output {}", self.node.op_type, index))
        })
    }
}

static UNBOUNDED: MaxValue = MaxValue::unbounded();

/// Context for [`Operator::maximum_value`]. Bounds of every input are
/// available by the time an operator is asked.
pub struct BoundCtx<'a> {
    pub graph: &'a Graph,
    pub node: &'a Node,
    bounds: &'a HashMap<Output, MaxValue>,
}

impl<'a> BoundCtx<'a> {
    pub fn new(graph: &'a Graph, node: &'a Node, bounds: &'a HashMap<Output, MaxValue>) -> Self {
        Self {
            graph,
            node,
            bounds,
        }
    }

    pub fn input_count(&self) -> usize {
        self.node.inputs.len()
    }

    /// Bound of input `index`; unbounded if there is no such input.
    pub fn input(&self, index: usize) -> &'a MaxValue {
        self.node
            .inputs
            .get(index)
            .and_then(|output| self.bounds.get(output))
            .unwrap_or(&UNBOUNDED)
    }

    pub fn input_info(&self, index: usize) -> Option<&'a OutputInfo> {
        let output = self.node.inputs.get(index)?;
        self.graph.output_info(*output).ok()
    }

    pub fn constant_input(&self, index: usize) -> Option<&'a TensorBuffer> {
        self.graph.constant_value(*self.node.inputs.get(index)?)
    }

    pub fn attributes(&self) -> &'a Attributes {
        &self.node.attributes
    }
}
