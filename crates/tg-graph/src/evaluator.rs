//! Host evaluation of a [`Function`].
//!
//! Only the nodes the requested results depend on are run, each exactly
//! once, in dependency order. Caller inputs are borrowed, never copied.
//! Intermediates are owned by the call and dropped as soon as their last
//! reader has run.

use std::borrow::Cow;
use std::collections::HashMap;

use tg_tensor::TensorBuffer;

use crate::config::EvalConfig;
use crate::error::{GraphError, Result};
use crate::function::Function;
use crate::graph::{Node, NodeId, Output};
use crate::operator::EvalCtx;
use crate::registry::OpRegistry;

pub struct Evaluator<'r> {
    registry: &'r OpRegistry,
    config: EvalConfig,
}

impl<'r> Evaluator<'r> {
    pub fn new(registry: &'r OpRegistry) -> Self {
        Self::with_config(registry, EvalConfig::default())
    }

    pub fn with_config(registry: &'r OpRegistry, config: EvalConfig) -> Self {
        Self { registry, config }
    }

    pub fn config(&self) -> &EvalConfig {
        &self.config
    }

    /// Run `function` on `inputs`, writing one buffer per result into
    /// `outputs`.
    ///
    /// Inputs must match the parameters' declared types and partial shapes.
    /// Output slots may be shapeless; allocated slots must already agree
    /// with the produced result. On error the contents of `outputs` are left
    /// untouched.
    pub fn evaluate(
        &self,
        function: &Function,
        outputs: &mut [TensorBuffer],
        inputs: &[TensorBuffer],
    ) -> Result<()> {
        let span = tracing::debug_span!(
            "evaluate",
            nodes = function.graph().node_count(),
            inputs = inputs.len(),
            results = function.results().len()
        );
        let _enter = span.enter();

        let result = self.run(function, outputs, inputs);
        if let Err(e) = &result {
            tracing::debug!(error = %e, "evaluation failed");
        }
        result
    }

    fn run(
        &self,
        function: &Function,
        outputs: &mut [TensorBuffer],
        inputs: &[TensorBuffer],
    ) -> Result<()> {
        let graph = function.graph();
        let parameters = function.parameters();
        let results = function.results();

        if inputs.len() != parameters.len() {
            return Err(GraphError::InputCount {
                expected: parameters.len(),
                got: inputs.len(),
            });
        }
        if outputs.len() != results.len() {
            return Err(GraphError::OutputCount {
                expected: results.len(),
                got: outputs.len(),
            });
        }
        check_inputs(function, inputs)?;

        let bindings: HashMap<NodeId, &TensorBuffer> =
            parameters.iter().copied().zip(inputs).collect();

        let order = graph.dependency_order(results.iter().map(|r| r.node))?;
        // Results hold one extra use each so they survive until hand-off.
        let mut remaining = graph.use_counts(&order)?;
        for result in results {
            *remaining.entry(*result).or_insert(0) += 1;
        }

        let mut values: HashMap<Output, Cow<'_, TensorBuffer>> = HashMap::new();
        for id in order {
            let node = graph.node(id)?;
            if node.is_parameter() {
                let bound = bindings.get(&id).ok_or_else(|| {
                    GraphError::InvalidGraph(format!("parameter {} is not a function input", id))
                })?;
                values.insert(Output::new(id, 0), Cow::Borrowed(*bound));
                continue;
            }

            let produced = self.run_node(id, node, &values)?;
            self.release_inputs(node, &mut values, &mut remaining);

            for (index, buffer) in produced.into_iter().enumerate() {
                let output = Output::new(id, index);
                if remaining.get(&output).copied().unwrap_or(0) > 0 {
                    values.insert(output, Cow::Owned(buffer));
                }
            }
        }

        // Collect every result before touching the caller's slots.
        let mut handed = Vec::with_capacity(results.len());
        for result in results {
            let left = remaining.get_mut(result).map(|count| {
                *count -= 1;
                *count
            });
            let buffer = match left {
                Some(0) => values.remove(result).map(Cow::into_owned),
                _ => values.get(result).map(|value| value.as_ref().clone()),
            }
            .ok_or_else(|| GraphError::InvalidGraph(format!("result {} was not computed", result)))?;
            handed.push(buffer.into_detached());
        }

        for (slot, buffer) in outputs.iter().zip(&handed) {
            check_output_slot(slot, buffer)?;
        }
        for (slot, buffer) in outputs.iter_mut().zip(handed) {
            *slot = buffer;
        }
        Ok(())
    }

    fn run_node(
        &self,
        id: NodeId,
        node: &Node,
        values: &HashMap<Output, Cow<'_, TensorBuffer>>,
    ) -> Result<Vec<TensorBuffer>> {
        let op = self
            .registry
            .get(&node.op_type)
            .ok_or_else(|| GraphError::UnsupportedOperation(node.op_type.clone()))?;

        let args = node
            .inputs
            .iter()
            .map(|input| {
                values.get(input).map(|value| value.as_ref()).ok_or_else(|| {
                    GraphError::InvalidGraph(format!("input {} of {} is not available", input, id))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let mut produced: Vec<TensorBuffer> = node
            .outputs
            .iter()
            .map(|info| match info.shape.to_shape() {
                Some(shape) => TensorBuffer::new(info.element_type, shape),
                None => TensorBuffer::shapeless(Some(info.element_type)),
            })
            .collect();

        op.evaluate(&EvalCtx::new(node, args), &mut produced)?;

        if self.config.check_output_types {
            check_produced(node, &produced)?;
        }
        tracing::trace!(
            node = %id,
            op_type = %node.op_type,
            outputs = produced.len(),
            shape = ?produced.first().and_then(TensorBuffer::shape),
            "evaluated node"
        );
        Ok(produced)
    }

    /// Mark the node's inputs as consumed and drop the ones nobody else reads.
    ///
    /// Operators only ever see inputs through `&TensorBuffer`, so the borrow
    /// already rules out resizing them during the call; the flag records the
    /// hand-off for buffers that outlive it and is cleared again on results.
    fn release_inputs(
        &self,
        node: &Node,
        values: &mut HashMap<Output, Cow<'_, TensorBuffer>>,
        remaining: &mut HashMap<Output, usize>,
    ) {
        for input in &node.inputs {
            if let Some(Cow::Owned(buffer)) = values.get_mut(input) {
                buffer.mark_consumed();
            }
            let Some(count) = remaining.get_mut(input) else {
                continue;
            };
            *count = count.saturating_sub(1);
            if *count == 0 && self.config.release_intermediates {
                values.remove(input);
            }
        }
    }
}

fn check_inputs(function: &Function, inputs: &[TensorBuffer]) -> Result<()> {
    for (index, input) in inputs.iter().enumerate() {
        let info = function.parameter_info(index)?;
        let (Some(element_type), Some(shape)) = (input.element_type(), input.shape()) else {
            return Err(GraphError::InvalidArgument(format!(
                "input {} is shapeless",
                index
            )));
        };
        if element_type != info.element_type {
            return Err(GraphError::TypeMismatch {
                context: format!("input {}", index),
                expected: info.element_type,
                got: element_type,
            });
        }
        if !info.shape.compatible(shape) {
            return Err(GraphError::ShapeConflict(format!(
                "input {} has shape {}, parameter declares {}",
                index, shape, info.shape
            )));
        }
    }
    Ok(())
}

fn check_produced(node: &Node, produced: &[TensorBuffer]) -> Result<()> {
    for (index, (buffer, info)) in produced.iter().zip(&node.outputs).enumerate() {
        let (Some(element_type), Some(shape)) = (buffer.element_type(), buffer.shape()) else {
            return Err(GraphError::InvalidGraph(format!(
                "{} left output {} unallocated",
                node.op_type, index
            )));
        };
        if element_type != info.element_type {
            return Err(GraphError::TypeMismatch {
                context: format!("{} output {}", node.op_type, index),
                expected: info.element_type,
                got: element_type,
            });
        }
        if !info.shape.compatible(shape) {
            return Err(GraphError::ShapeConflict(format!(
                "{} output {} has shape {}, declared {}",
                node.op_type, index, shape, info.shape
            )));
        }
    }
    Ok(())
}

/// A caller slot that is already allocated must agree with the result.
fn check_output_slot(slot: &TensorBuffer, result: &TensorBuffer) -> Result<()> {
    if slot.is_shapeless() {
        return Ok(());
    }
    if let (Some(expected), Some(got)) = (slot.element_type(), result.element_type()) {
        if expected != got {
            return Err(GraphError::TypeMismatch {
                context: "output buffer".to_string(),
                expected,
                got,
            });
        }
    }
    if slot.shape() != result.shape() {
        return Err(GraphError::ShapeConflict(format!(
            "output buffer has shape {}, result has {}",
            slot.partial_shape(),
            result.partial_shape()
        )));
    }
    Ok(())
}
