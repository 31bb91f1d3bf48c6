use tg_tensor::{Dimension, ElementType, PartialShape, TensorBuffer};

use crate::bound::MaxValue;
use crate::error::{GraphError, Result};
use crate::graph::OutputInfo;
use crate::operator::{BoundCtx, EvalCtx, InferCtx, Operator};

use super::util::{allocated_shape, output_slot};

pub const OUTPUT_TYPE: &str = "output_type";

/// The runtime shape of its input as a rank-1 i32 or i64 tensor.
pub struct ShapeOf;

fn checked_output_type(element_type: ElementType) -> Result<ElementType> {
    match element_type {
        ElementType::I32 | ElementType::I64 => Ok(element_type),
        other => Err(GraphError::Attribute(format!(
            "ShapeOf output type must be i32 or i64, got {}",
            other
        ))),
    }
}

impl Operator for ShapeOf {
    fn name(&self) -> &str {
        super::SHAPE_OF
    }

    fn infer(&self, ctx: &InferCtx<'_>) -> Result<Vec<OutputInfo>> {
        ctx.expect_inputs(1, 1)?;
        let element_type = if ctx.attributes.contains(OUTPUT_TYPE) {
            checked_output_type(ctx.attributes.element_type(OUTPUT_TYPE)?)?
        } else {
            ElementType::I64
        };
        let length = ctx
            .input_shape(0)?
            .rank()
            .map_or(Dimension::Unknown, Dimension::Known);
        Ok(vec![OutputInfo::new(element_type, PartialShape::new(vec![length]))])
    }

    fn evaluate(&self, ctx: &EvalCtx<'_>, outputs: &mut [TensorBuffer]) -> Result<()> {
        let dims = allocated_shape(ctx.input(0)?)?.dims().to_vec();
        let element_type = ctx.output_info(0)?.element_type;
        let out = output_slot(outputs, 0)?;
        let length = dims.len();
        match element_type {
            ElementType::I32 => {
                let data = dims
                    .into_iter()
                    .map(|d| {
                        i32::try_from(d).map_err(|_| {
                            GraphError::InvalidArgument(format!("dimension {} overflows i32", d))
                        })
                    })
                    .collect::<Result<Vec<i32>>>()?;
                out.set_data([length], data)?;
            }
            _ => {
                let data: Vec<i64> = dims.into_iter().map(|d| d as i64).collect();
                out.set_data([length], data)?;
            }
        }
        Ok(())
    }

    /// Bounded by the largest dimension when the input shape is static.
    fn maximum_value(&self, ctx: &BoundCtx<'_>, _output_index: usize) -> MaxValue {
        ctx.input_info(0)
            .and_then(|info| info.shape.to_shape())
            .and_then(|shape| shape.dims().iter().copied().max())
            .map_or_else(MaxValue::unbounded, |d| MaxValue::bounded(d as u64))
    }
}
