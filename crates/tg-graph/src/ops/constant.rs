use tg_tensor::{dispatch_element, Element, TensorBuffer};

use crate::bound::MaxValue;
use crate::error::{GraphError, Result};
use crate::graph::OutputInfo;
use crate::operator::{BoundCtx, EvalCtx, InferCtx, Operator};

use super::util::output_slot;

pub const VALUE: &str = "value";

/// A value embedded in the graph.
pub struct Constant;

impl Operator for Constant {
    fn name(&self) -> &str {
        super::CONSTANT
    }

    fn infer(&self, ctx: &InferCtx<'_>) -> Result<Vec<OutputInfo>> {
        ctx.expect_inputs(0, 0)?;
        let value = ctx.attributes.tensor(VALUE)?;
        match (value.element_type(), value.shape()) {
            (Some(element_type), Some(shape)) => {
                Ok(vec![OutputInfo::new(element_type, shape.clone())])
            }
            _ => Err(GraphError::Attribute(
                "constant value must be an allocated tensor".to_string(),
            )),
        }
    }

    fn evaluate(&self, ctx: &EvalCtx<'_>, outputs: &mut [TensorBuffer]) -> Result<()> {
        *output_slot(outputs, 0)? = ctx.attributes().tensor(VALUE)?.clone();
        Ok(())
    }

    fn maximum_value(&self, ctx: &BoundCtx<'_>, _output_index: usize) -> MaxValue {
        ctx.attributes()
            .tensor(VALUE)
            .map_or_else(|_| MaxValue::unbounded(), upper_bound)
    }
}

/// Largest element of `value` as an unsigned bound.
///
/// Negative elements count as 0 and fractions round up. Empty tensors, NaN,
/// and values past `u64::MAX` give no bound.
pub fn upper_bound(value: &TensorBuffer) -> MaxValue {
    fn largest<T: Element>(value: &TensorBuffer) -> Option<u64> {
        let data = value.as_slice::<T>().ok()?;
        let mut best: Option<u64> = None;
        for &v in data {
            let bound = if T::TYPE.is_real() {
                let f = v.to_f64();
                if f.is_nan() {
                    return None;
                }
                let f = f.max(0.0).ceil();
                if f >= u64::MAX as f64 {
                    return None;
                }
                f as u64
            } else {
                u64::try_from(v.to_i128().max(0)).ok()?
            };
            best = Some(best.map_or(bound, |b| b.max(bound)));
        }
        best
    }

    let Some(element_type) = value.element_type() else {
        return MaxValue::unbounded();
    };
    dispatch_element!(element_type, largest(value))
        .map_or_else(MaxValue::unbounded, MaxValue::bounded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tg_tensor::half::f16;

    #[test]
    fn test_upper_bound_integers() {
        let t = TensorBuffer::from_vec([3], vec![-5i32, 27, 3]).unwrap();
        assert_eq!(upper_bound(&t), MaxValue::bounded(27));
        let neg = TensorBuffer::from_vec([2], vec![-5i64, -1]).unwrap();
        assert_eq!(upper_bound(&neg), MaxValue::bounded(0));
        let big = TensorBuffer::scalar(u64::MAX);
        assert_eq!(upper_bound(&big), MaxValue::bounded(u64::MAX));
    }

    #[test]
    fn test_upper_bound_floats_round_up() {
        let t = TensorBuffer::from_vec([2], vec![1.25f32, 2.5]).unwrap();
        assert_eq!(upper_bound(&t), MaxValue::bounded(3));
        let h = TensorBuffer::scalar(f16::from_f32(4.0));
        assert_eq!(upper_bound(&h), MaxValue::bounded(4));
        let nan = TensorBuffer::from_vec([2], vec![1.0f64, f64::NAN]).unwrap();
        assert!(!upper_bound(&nan).is_bounded());
        let huge = TensorBuffer::scalar(1.0e30f64);
        assert!(!upper_bound(&huge).is_bounded());
    }

    #[test]
    fn test_upper_bound_bool_and_empty() {
        let b = TensorBuffer::from_vec([2], vec![false, true]).unwrap();
        assert_eq!(upper_bound(&b), MaxValue::bounded(1));
        let empty = TensorBuffer::new(tg_tensor::ElementType::I32, [0]);
        assert!(!upper_bound(&empty).is_bounded());
        assert!(!upper_bound(&TensorBuffer::shapeless(None)).is_bounded());
    }
}
