//! Construction API for [`Function`]s.
//!
//! Every node added through the builder is checked by its operator's
//! `infer`, so the declared output info stored in the graph is always
//! consistent with the operator that will compute it.

use tg_tensor::{ElementType, PartialShape, TensorBuffer};

use crate::error::{GraphError, Result};
use crate::function::Function;
use crate::graph::{AttributeValue, Attributes, Graph, Node, NodeId, Output};
use crate::operator::InferCtx;
use crate::ops;
use crate::registry::OpRegistry;

pub struct GraphBuilder<'r> {
    registry: &'r OpRegistry,
    graph: Graph,
}

impl<'r> GraphBuilder<'r> {
    pub fn new(registry: &'r OpRegistry) -> Self {
        Self {
            registry,
            graph: Graph::new(),
        }
    }

    /// The graph built so far.
    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    /// Add a node of any registered type, inferring its outputs.
    pub fn add_op(
        &mut self,
        op_type: &str,
        inputs: &[Output],
        attributes: Attributes,
    ) -> Result<NodeId> {
        let op = self
            .registry
            .get(op_type)
            .ok_or_else(|| GraphError::UnsupportedOperation(op_type.to_string()))?;
        for input in inputs {
            self.graph.output_info(*input)?;
        }
        let outputs = op.infer(&InferCtx::new(&self.graph, inputs, &attributes))?;
        let id = self
            .graph
            .add_node(Node::new(op_type, inputs.to_vec(), attributes, outputs))?;
        tracing::trace!(node = %id, op_type, "added node");
        Ok(id)
    }

    fn single(&mut self, op_type: &str, inputs: &[Output], attributes: Attributes) -> Result<Output> {
        Ok(Output::new(self.add_op(op_type, inputs, attributes)?, 0))
    }

    pub fn parameter(
        &mut self,
        element_type: ElementType,
        shape: impl Into<PartialShape>,
    ) -> Result<Output> {
        let attributes = Attributes::new()
            .with(ops::parameter::ELEMENT_TYPE, AttributeValue::Type(element_type))
            .with(ops::parameter::SHAPE, AttributeValue::Shape(shape.into()));
        self.single(ops::PARAMETER, &[], attributes)
    }

    pub fn constant(&mut self, value: TensorBuffer) -> Result<Output> {
        let attributes = Attributes::new().with(ops::constant::VALUE, AttributeValue::Tensor(value));
        self.single(ops::CONSTANT, &[], attributes)
    }

    /// A rank-1 i64 constant, the usual form of an axes input.
    pub fn axes(&mut self, axes: &[i64]) -> Result<Output> {
        let value = TensorBuffer::from_vec([axes.len()], axes.to_vec())?;
        self.constant(value)
    }

    pub fn add(&mut self, a: Output, b: Output) -> Result<Output> {
        self.single(ops::ADD, &[a, b], Attributes::new())
    }

    pub fn minimum(&mut self, a: Output, b: Output) -> Result<Output> {
        self.single(ops::MINIMUM, &[a, b], Attributes::new())
    }

    pub fn maximum(&mut self, a: Output, b: Output) -> Result<Output> {
        self.single(ops::MAXIMUM, &[a, b], Attributes::new())
    }

    pub fn convert(&mut self, input: Output, destination: ElementType) -> Result<Output> {
        let attributes = Attributes::new().with(
            ops::convert::DESTINATION_TYPE,
            AttributeValue::Type(destination),
        );
        self.single(ops::CONVERT, &[input], attributes)
    }

    pub fn concat(&mut self, inputs: &[Output], axis: i64) -> Result<Output> {
        let attributes = Attributes::new().with(ops::concat::AXIS, AttributeValue::Int(axis));
        self.single(ops::CONCAT, inputs, attributes)
    }

    pub fn reduce_min(&mut self, data: Output, axes: Output, keep_dims: bool) -> Result<Output> {
        let attributes =
            Attributes::new().with(ops::reduce::KEEP_DIMS, AttributeValue::Bool(keep_dims));
        self.single(ops::REDUCE_MIN, &[data, axes], attributes)
    }

    pub fn reduce_max(&mut self, data: Output, axes: Output, keep_dims: bool) -> Result<Output> {
        let attributes =
            Attributes::new().with(ops::reduce::KEEP_DIMS, AttributeValue::Bool(keep_dims));
        self.single(ops::REDUCE_MAX, &[data, axes], attributes)
    }

    pub fn range(&mut self, start: Output, stop: Output, step: Output) -> Result<Output> {
        self.single(ops::RANGE, &[start, stop, step], Attributes::new())
    }

    pub fn shape_of(&mut self, input: Output, output_type: ElementType) -> Result<Output> {
        let attributes =
            Attributes::new().with(ops::shape_of::OUTPUT_TYPE, AttributeValue::Type(output_type));
        self.single(ops::SHAPE_OF, &[input], attributes)
    }

    /// Squeeze the given axes, or every unit dimension when `axes` is `None`.
    pub fn squeeze(&mut self, input: Output, axes: Option<Output>) -> Result<Output> {
        match axes {
            Some(axes) => self.single(ops::SQUEEZE, &[input, axes], Attributes::new()),
            None => self.single(ops::SQUEEZE, &[input], Attributes::new()),
        }
    }

    pub fn unsqueeze(&mut self, input: Output, axes: Output) -> Result<Output> {
        self.single(ops::UNSQUEEZE, &[input, axes], Attributes::new())
    }

    /// Split into `parts` equal pieces along `axis`; returns one output per piece.
    pub fn split(&mut self, input: Output, axis: i64, parts: i64) -> Result<Vec<Output>> {
        let attributes = Attributes::new()
            .with(ops::split::AXIS, AttributeValue::Int(axis))
            .with(ops::split::NUM_SPLITS, AttributeValue::Int(parts));
        let id = self.add_op(ops::SPLIT, &[input], attributes)?;
        let count = self.graph.node(id)?.output_count();
        Ok((0..count).map(|index| Output::new(id, index)).collect())
    }

    /// Close the graph into a function with the given parameters and results,
    /// both in calling order.
    pub fn finish(self, parameters: &[Output], results: &[Output]) -> Result<Function> {
        let parameters = parameters.iter().map(|p| p.node).collect();
        Function::new(self.graph, parameters, results.to_vec())
    }
}
