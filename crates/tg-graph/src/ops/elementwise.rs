//! Binary element-wise operators with numpy broadcasting.

use tg_tensor::{dispatch_numeric, Numeric, PartialShape, Shape, TensorBuffer};

use crate::bound::MaxValue;
use crate::error::Result;
use crate::graph::OutputInfo;
use crate::operator::{BoundCtx, EvalCtx, InferCtx, Operator};

use super::util::{allocated_shape, broadcast_index, broadcast_strides, common_input_type, output_slot};

fn infer_binary(ctx: &InferCtx<'_>, op_type: &str) -> Result<Vec<OutputInfo>> {
    ctx.expect_inputs(2, 2)?;
    let element_type = common_input_type(ctx, op_type)?;
    let shape = PartialShape::broadcast(ctx.input_shape(0)?, ctx.input_shape(1)?)?;
    Ok(vec![OutputInfo::new(element_type, shape)])
}

fn binary<T: Numeric>(
    a: &TensorBuffer,
    b: &TensorBuffer,
    out: &mut TensorBuffer,
    f: fn(T, T) -> T,
) -> Result<()> {
    let a_shape = allocated_shape(a)?;
    let b_shape = allocated_shape(b)?;
    let shape = Shape::broadcast_shape(a_shape, b_shape)?;
    let lhs = a.as_slice::<T>()?;
    let rhs = b.as_slice::<T>()?;

    let data: Vec<T> = if a_shape == b_shape {
        lhs.iter().zip(rhs).map(|(&x, &y)| f(x, y)).collect()
    } else {
        let a_strides = broadcast_strides(a_shape, &shape);
        let b_strides = broadcast_strides(b_shape, &shape);
        (0..shape.numel())
            .map(|i| {
                let x = lhs[broadcast_index(i, shape.dims(), &a_strides)];
                let y = rhs[broadcast_index(i, shape.dims(), &b_strides)];
                f(x, y)
            })
            .collect()
    };
    out.set_data(shape, data)?;
    Ok(())
}

fn add<T: Numeric>(a: &TensorBuffer, b: &TensorBuffer, out: &mut TensorBuffer) -> Result<()> {
    binary::<T>(a, b, out, <T as Numeric>::wrapping_add)
}

fn minimum<T: Numeric>(a: &TensorBuffer, b: &TensorBuffer, out: &mut TensorBuffer) -> Result<()> {
    binary::<T>(a, b, out, |x, y| if y < x { y } else { x })
}

fn maximum<T: Numeric>(a: &TensorBuffer, b: &TensorBuffer, out: &mut TensorBuffer) -> Result<()> {
    binary::<T>(a, b, out, |x, y| if y > x { y } else { x })
}

macro_rules! binary_operator {
    ($ty:ident, $name:path, $kernel:ident, $bound:ident) => {
        pub struct $ty;

        impl Operator for $ty {
            fn name(&self) -> &str {
                $name
            }

            fn infer(&self, ctx: &InferCtx<'_>) -> Result<Vec<OutputInfo>> {
                infer_binary(ctx, $name)
            }

            fn evaluate(&self, ctx: &EvalCtx<'_>, outputs: &mut [TensorBuffer]) -> Result<()> {
                let a = ctx.input(0)?;
                let b = ctx.input(1)?;
                let out = output_slot(outputs, 0)?;
                let element_type = ctx.output_info(0)?.element_type;
                dispatch_numeric!(element_type, $kernel(a, b, out))
            }

            fn maximum_value(&self, ctx: &BoundCtx<'_>, _output_index: usize) -> MaxValue {
                ctx.input(0).$bound(ctx.input(1))
            }
        }
    };
}

binary_operator!(Add, super::ADD, add, saturating_add);
binary_operator!(Minimum, super::MINIMUM, minimum, min);
binary_operator!(Maximum, super::MAXIMUM, maximum, max);
