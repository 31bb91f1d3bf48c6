use tg_tensor::{normalize_axis, ElementType, Shape, TensorBuffer, TensorError};

use crate::error::{GraphError, Result};
use crate::operator::InferCtx;

/// Concrete shape of a buffer an operator is about to read.
pub(crate) fn allocated_shape(buffer: &TensorBuffer) -> Result<&Shape> {
    buffer
        .shape()
        .ok_or(GraphError::Tensor(TensorError::Unallocated))
}

/// Output buffer `index`, or an error if the evaluator supplied too few.
pub(crate) fn output_slot(outputs: &mut [TensorBuffer], index: usize) -> Result<&mut TensorBuffer> {
    let got = outputs.len();
    outputs.get_mut(index).ok_or(GraphError::OutputCount {
        expected: index + 1,
        got,
    })
}

/// Normalize possibly negative axes against `ndim`, sorted and deduplicated.
pub(crate) fn normalize_axes(axes: &[i64], ndim: usize) -> Result<Vec<usize>> {
    let mut normalized = axes
        .iter()
        .map(|&axis| normalize_axis(axis, ndim))
        .collect::<tg_tensor::Result<Vec<_>>>()?;
    normalized.sort_unstable();
    normalized.dedup();
    Ok(normalized)
}

/// Common element type of all inputs.
pub(crate) fn common_input_type(ctx: &InferCtx<'_>, op_type: &str) -> Result<ElementType> {
    let first = ctx.input_type(0)?;
    for index in 1..ctx.input_count() {
        let got = ctx.input_type(index)?;
        if got != first {
            return Err(GraphError::TypeMismatch {
                context: format!("{} input {}", op_type, index),
                expected: first,
                got,
            });
        }
    }
    Ok(first)
}

/// Fail unless `buffer` holds an integral tensor, then read it as `i64`s.
pub(crate) fn read_integers(buffer: &TensorBuffer, what: &str) -> Result<Vec<i64>> {
    match buffer.element_type() {
        Some(ety) if ety.is_integral() => Ok(buffer.to_i64_vec()?),
        Some(ety) => Err(GraphError::InvalidArgument(format!(
            "{} must be integral, got {}",
            what, ety
        ))),
        None => Err(GraphError::Tensor(TensorError::Unallocated)),
    }
}

/// Per-dimension strides for reading `input` while iterating over `output`
/// under numpy broadcasting. Broadcast dimensions get stride 0.
pub(crate) fn broadcast_strides(input: &Shape, output: &Shape) -> Vec<usize> {
    let offset = output.ndim() - input.ndim();
    let in_strides = input.strides();
    (0..output.ndim())
        .map(|d| {
            if d < offset || input.dim(d - offset) == 1 {
                0
            } else {
                in_strides[d - offset]
            }
        })
        .collect()
}

/// Map a flat output index to the flat input index given per-dimension
/// output extents and the input's broadcast strides.
pub(crate) fn broadcast_index(mut flat: usize, out_dims: &[usize], strides: &[usize]) -> usize {
    let mut index = 0;
    for d in (0..out_dims.len()).rev() {
        let extent = out_dims[d];
        index += (flat % extent) * strides[d];
        flat /= extent;
    }
    index
}
