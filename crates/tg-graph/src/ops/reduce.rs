//! Min/max reductions over a set of axes given by the second input.

use tg_tensor::{dispatch_numeric, Dimension, ElementType, Numeric, PartialShape, Shape, TensorBuffer};

use crate::bound::MaxValue;
use crate::error::{GraphError, Result};
use crate::graph::OutputInfo;
use crate::operator::{BoundCtx, EvalCtx, InferCtx, Operator};

use super::util::{allocated_shape, normalize_axes, output_slot, read_integers};

pub const KEEP_DIMS: &str = "keep_dims";

fn reduce_dims<D: Copy>(dims: &[D], axes: &[usize], keep_dims: bool, one: D) -> Vec<D> {
    dims.iter()
        .enumerate()
        .filter_map(|(d, &dim)| match (axes.contains(&d), keep_dims) {
            (false, _) => Some(dim),
            (true, true) => Some(one),
            (true, false) => None,
        })
        .collect()
}

fn infer_reduction(ctx: &InferCtx<'_>, op_type: &str) -> Result<Vec<OutputInfo>> {
    ctx.expect_inputs(2, 2)?;
    let element_type = ctx.input_type(0)?;
    let axes_type = ctx.input_type(1)?;
    if !axes_type.is_integral() {
        return Err(GraphError::TypeMismatch {
            context: format!("{} axes", op_type),
            expected: ElementType::I64,
            got: axes_type,
        });
    }
    let keep_dims = ctx.attributes.bool_or(KEEP_DIMS, false)?;
    let data_shape = ctx.input_shape(0)?;

    let shape = match (data_shape.dims(), ctx.constant_input(1)) {
        (Some(dims), Some(axes)) => {
            let axes = normalize_axes(&read_integers(axes, "axes")?, dims.len())?;
            PartialShape::new(reduce_dims(dims, &axes, keep_dims, Dimension::Known(1)))
        }
        (Some(dims), None) if keep_dims => PartialShape::dynamic_rank(dims.len()),
        _ => PartialShape::dynamic(),
    };
    Ok(vec![OutputInfo::new(element_type, shape)])
}

fn reduce<T: Numeric>(
    data: &TensorBuffer,
    axes: &[usize],
    keep_dims: bool,
    out: &mut TensorBuffer,
    pick: fn(T, T) -> T,
) -> Result<()> {
    let shape = allocated_shape(data)?;
    let values = data.as_slice::<T>()?;
    let in_dims = shape.dims();
    let kept = Shape::new(reduce_dims(in_dims, axes, true, 1));
    let kept_strides = kept.strides();

    let mut acc: Vec<Option<T>> = vec![None; kept.numel()];
    for (flat, &v) in values.iter().enumerate() {
        let mut rem = flat;
        let mut target = 0;
        for d in (0..in_dims.len()).rev() {
            let i = rem % in_dims[d];
            rem /= in_dims[d];
            if !axes.contains(&d) {
                target += i * kept_strides[d];
            }
        }
        acc[target] = Some(match acc[target] {
            Some(current) => pick(current, v),
            None => v,
        });
    }

    let result = acc
        .into_iter()
        .collect::<Option<Vec<T>>>()
        .ok_or_else(|| GraphError::InvalidArgument("reduction over an empty axis".to_string()))?;
    let out_shape = if keep_dims {
        kept
    } else {
        Shape::new(reduce_dims(in_dims, axes, false, 1))
    };
    out.set_data(out_shape, result)?;
    Ok(())
}

fn reduce_min<T: Numeric>(
    data: &TensorBuffer,
    axes: &[usize],
    keep_dims: bool,
    out: &mut TensorBuffer,
) -> Result<()> {
    reduce::<T>(data, axes, keep_dims, out, |a, b| if b < a { b } else { a })
}

fn reduce_max<T: Numeric>(
    data: &TensorBuffer,
    axes: &[usize],
    keep_dims: bool,
    out: &mut TensorBuffer,
) -> Result<()> {
    reduce::<T>(data, axes, keep_dims, out, |a, b| if b > a { b } else { a })
}

/// Runtime axes and `keep_dims` for a reduction node.
fn runtime_axes(ctx: &EvalCtx<'_>) -> Result<(Vec<usize>, bool)> {
    let data = ctx.input(0)?;
    let ndim = allocated_shape(data)?.ndim();
    let axes = normalize_axes(&read_integers(ctx.input(1)?, "axes")?, ndim)?;
    let keep_dims = ctx.attributes().bool_or(KEEP_DIMS, false)?;
    Ok((axes, keep_dims))
}

/// The single axis a reduction runs over, when fixed by a Constant.
fn single_constant_axis(ctx: &BoundCtx<'_>) -> Option<usize> {
    let axes = ctx.constant_input(1)?.to_i64_vec().ok()?;
    let rank = ctx.input_info(0)?.shape.rank()?;
    match normalize_axes(&axes, rank).ok()?.as_slice() {
        [axis] => Some(*axis),
        _ => None,
    }
}

pub struct ReduceMin;

impl Operator for ReduceMin {
    fn name(&self) -> &str {
        super::REDUCE_MIN
    }

    fn infer(&self, ctx: &InferCtx<'_>) -> Result<Vec<OutputInfo>> {
        infer_reduction(ctx, super::REDUCE_MIN)
    }

    fn evaluate(&self, ctx: &EvalCtx<'_>, outputs: &mut [TensorBuffer]) -> Result<()> {
        let (axes, keep_dims) = runtime_axes(ctx)?;
        let data = ctx.input(0)?;
        let element_type = ctx.output_info(0)?.element_type;
        let out = output_slot(outputs, 0)?;
        dispatch_numeric!(element_type, reduce_min(data, &axes, keep_dims, out))
    }

    /// Reducing over the axis a Concat recorded slices on is bounded by the
    /// smallest slice bound, since every slice contributes to each minimum.
    fn maximum_value(&self, ctx: &BoundCtx<'_>, _output_index: usize) -> MaxValue {
        let input = ctx.input(0);
        single_constant_axis(ctx)
            .and_then(|axis| input.slice_min(axis))
            .unwrap_or_else(|| input.without_slices())
    }
}

pub struct ReduceMax;

impl Operator for ReduceMax {
    fn name(&self) -> &str {
        super::REDUCE_MAX
    }

    fn infer(&self, ctx: &InferCtx<'_>) -> Result<Vec<OutputInfo>> {
        infer_reduction(ctx, super::REDUCE_MAX)
    }

    fn evaluate(&self, ctx: &EvalCtx<'_>, outputs: &mut [TensorBuffer]) -> Result<()> {
        let (axes, keep_dims) = runtime_axes(ctx)?;
        let data = ctx.input(0)?;
        let element_type = ctx.output_info(0)?.element_type;
        let out = output_slot(outputs, 0)?;
        dispatch_numeric!(element_type, reduce_max(data, &axes, keep_dims, out))
    }

    fn maximum_value(&self, ctx: &BoundCtx<'_>, _output_index: usize) -> MaxValue {
        ctx.input(0).without_slices()
    }
}
