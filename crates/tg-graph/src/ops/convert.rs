use tg_tensor::{dispatch_element, Element, Shape, TensorBuffer};

use crate::bound::MaxValue;
use crate::error::Result;
use crate::graph::OutputInfo;
use crate::operator::{BoundCtx, EvalCtx, InferCtx, Operator};

use super::util::{allocated_shape, output_slot};

pub const DESTINATION_TYPE: &str = "destination_type";

/// Element-wise cast to `destination_type`.
///
/// Integer sources convert with wrapping semantics, real sources saturate
/// and truncate toward zero.
pub struct Convert;

enum Widened {
    Real(Vec<f64>),
    Integral(Vec<i128>),
}

fn widen<T: Element>(input: &TensorBuffer) -> Result<Widened> {
    let data = input.as_slice::<T>()?;
    Ok(if T::TYPE.is_real() {
        Widened::Real(data.iter().map(|v| v.to_f64()).collect())
    } else {
        Widened::Integral(data.iter().map(|v| v.to_i128()).collect())
    })
}

fn narrow<T: Element>(values: &Widened, shape: Shape, out: &mut TensorBuffer) -> Result<()> {
    let data: Vec<T> = match values {
        Widened::Real(v) => v.iter().map(|&x| T::from_f64(x)).collect(),
        Widened::Integral(v) => v.iter().map(|&x| T::from_i128(x)).collect(),
    };
    out.set_data(shape, data)?;
    Ok(())
}

impl Operator for Convert {
    fn name(&self) -> &str {
        super::CONVERT
    }

    fn infer(&self, ctx: &InferCtx<'_>) -> Result<Vec<OutputInfo>> {
        ctx.expect_inputs(1, 1)?;
        let destination = ctx.attributes.element_type(DESTINATION_TYPE)?;
        Ok(vec![OutputInfo::new(destination, ctx.input_shape(0)?.clone())])
    }

    fn evaluate(&self, ctx: &EvalCtx<'_>, outputs: &mut [TensorBuffer]) -> Result<()> {
        let input = ctx.input(0)?;
        let shape = allocated_shape(input)?.clone();
        let source = input
            .element_type()
            .ok_or(tg_tensor::TensorError::Unallocated)?;
        let destination = ctx.attributes().element_type(DESTINATION_TYPE)?;
        let values = dispatch_element!(source, widen(input))?;
        let out = output_slot(outputs, 0)?;
        dispatch_element!(destination, narrow(&values, shape, out))
    }

    fn maximum_value(&self, ctx: &BoundCtx<'_>, _output_index: usize) -> MaxValue {
        ctx.input(0).clone()
    }
}
