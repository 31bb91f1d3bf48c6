use std::collections::HashSet;

use tg_tensor::TensorBuffer;

use crate::bound::BoundAnalyzer;
use crate::error::{GraphError, Result};
use crate::evaluator::Evaluator;
use crate::graph::{Graph, NodeId, Output, OutputInfo};
use crate::registry::OpRegistry;

/// A graph closed over ordered parameters and results.
///
/// Immutable once built, so one function may be evaluated or analyzed from
/// many threads at once.
#[derive(Debug, Clone)]
pub struct Function {
    graph: Graph,
    parameters: Vec<NodeId>,
    results: Vec<Output>,
}

impl Function {
    /// Every parameter must be a distinct Parameter node and every result an
    /// existing output slot.
    pub fn new(graph: Graph, parameters: Vec<NodeId>, results: Vec<Output>) -> Result<Self> {
        let mut seen = HashSet::new();
        for &id in &parameters {
            let node = graph.node(id)?;
            if !node.is_parameter() {
                return Err(GraphError::InvalidGraph(format!(
                    "function parameter {} is a {} node",
                    id, node.op_type
                )));
            }
            if !seen.insert(id) {
                return Err(GraphError::InvalidGraph(format!(
                    "parameter {} listed twice",
                    id
                )));
            }
        }
        for &result in &results {
            graph.output_info(result)?;
        }
        Ok(Self {
            graph,
            parameters,
            results,
        })
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    /// Parameter nodes in calling order.
    pub fn parameters(&self) -> &[NodeId] {
        &self.parameters
    }

    /// Result outputs in calling order.
    pub fn results(&self) -> &[Output] {
        &self.results
    }

    pub fn parameter_info(&self, index: usize) -> Result<&OutputInfo> {
        let id = self.parameters.get(index).ok_or_else(|| {
            GraphError::InvalidArgument(format!("no parameter {}", index))
        })?;
        self.graph.output_info(Output::new(*id, 0))
    }

    pub fn result_info(&self, index: usize) -> Result<&OutputInfo> {
        let output = self
            .results
            .get(index)
            .ok_or_else(|| GraphError::InvalidArgument(format!("no result {}", index)))?;
        self.graph.output_info(*output)
    }

    /// Evaluate with default settings. See [`Evaluator::evaluate`].
    pub fn evaluate(
        &self,
        registry: &OpRegistry,
        outputs: &mut [TensorBuffer],
        inputs: &[TensorBuffer],
    ) -> Result<()> {
        Evaluator::new(registry).evaluate(self, outputs, inputs)
    }

    /// Upper bound on `output` as `(bounded, bound)`.
    pub fn maximum_value(&self, registry: &OpRegistry, output: Output) -> (bool, u64) {
        BoundAnalyzer::new(&self.graph, registry)
            .maximum_value(output)
            .as_pair()
    }
}
