use tg_tensor::TensorBuffer;

use crate::error::{GraphError, Result};
use crate::graph::OutputInfo;
use crate::operator::{EvalCtx, InferCtx, Operator};

pub const ELEMENT_TYPE: &str = "element_type";
pub const SHAPE: &str = "shape";

/// A function input. Its value is bound by the evaluator from the caller's
/// buffers; its bound is unknown.
pub struct Parameter;

impl Operator for Parameter {
    fn name(&self) -> &str {
        super::PARAMETER
    }

    fn infer(&self, ctx: &InferCtx<'_>) -> Result<Vec<OutputInfo>> {
        ctx.expect_inputs(0, 0)?;
        let element_type = ctx.attributes.element_type(ELEMENT_TYPE)?;
        let shape = ctx.attributes.shape(SHAPE)?.clone();
        Ok(vec![OutputInfo::new(element_type, shape)])
    }

    fn evaluate(&self, ctx: &EvalCtx<'_>, _outputs: &mut [TensorBuffer]) -> Result<()> {
        Err(GraphError::InvalidGraph(format!(
            "{} is bound from function inputs and cannot be computed",
            ctx.node.op_type
        )))
    }
}
