use tg_tensor::{dispatch_element, dispatch_numeric, Dimension, Element, Numeric, PartialShape, TensorBuffer};

use crate::error::{GraphError, Result};
use crate::graph::OutputInfo;
use crate::operator::{EvalCtx, InferCtx, Operator};

use super::util::{common_input_type, output_slot};

/// `[start, start + step, ...)` up to but excluding `stop`.
///
/// The three inputs are single-element tensors of one type. The output
/// length is `max(0, ceil((stop - start) / step))`, so it is only known
/// statically when all three inputs are constants.
pub struct Range;

/// Longest sequence a Range node may produce.
pub const MAX_RANGE_LENGTH: usize = i32::MAX as usize;

/// Output length, rejecting a zero or non-finite step and sequences longer
/// than [`MAX_RANGE_LENGTH`].
fn range_length(start: f64, stop: f64, step: f64) -> Result<usize> {
    if step == 0.0 || !step.is_finite() || !start.is_finite() || !stop.is_finite() {
        return Err(GraphError::InvalidArgument(format!(
            "range({}, {}, {}) is not a finite sequence",
            start, stop, step
        )));
    }
    let length = ((stop - start) / step).ceil();
    if length > MAX_RANGE_LENGTH as f64 {
        return Err(GraphError::InvalidArgument(format!(
            "range({}, {}, {}) has more than {} elements",
            start, stop, step, MAX_RANGE_LENGTH
        )));
    }
    Ok(if length > 0.0 { length as usize } else { 0 })
}

fn scalar_f64<T: Element>(buffer: &TensorBuffer) -> Result<f64> {
    if buffer.element_count() != 1 {
        return Err(GraphError::InvalidArgument(format!(
            "range bounds must hold one element, got {}",
            buffer.element_count()
        )));
    }
    Ok(buffer.get::<T>(0)?.to_f64())
}

fn read_scalar(buffer: &TensorBuffer) -> Result<f64> {
    let element_type = buffer
        .element_type()
        .ok_or(tg_tensor::TensorError::Unallocated)?;
    dispatch_element!(element_type, scalar_f64(buffer))
}

fn range<T: Numeric>(ctx: &EvalCtx<'_>, out: &mut TensorBuffer) -> Result<()> {
    let start = scalar_f64::<T>(ctx.input(0)?)?;
    let stop = scalar_f64::<T>(ctx.input(1)?)?;
    let step = scalar_f64::<T>(ctx.input(2)?)?;
    let length = range_length(start, stop, step)?;
    let data: Vec<T> = (0..length)
        .map(|i| T::from_f64(start + i as f64 * step))
        .collect();
    out.set_data([length], data)?;
    Ok(())
}

impl Operator for Range {
    fn name(&self) -> &str {
        super::RANGE
    }

    fn infer(&self, ctx: &InferCtx<'_>) -> Result<Vec<OutputInfo>> {
        ctx.expect_inputs(3, 3)?;
        let element_type = common_input_type(ctx, super::RANGE)?;
        let constants = (0..3)
            .map(|i| ctx.constant_input(i))
            .collect::<Option<Vec<_>>>();
        let length = match constants {
            Some(bounds) => {
                let start = read_scalar(bounds[0])?;
                let stop = read_scalar(bounds[1])?;
                let step = read_scalar(bounds[2])?;
                Dimension::Known(range_length(start, stop, step)?)
            }
            None => Dimension::Unknown,
        };
        Ok(vec![OutputInfo::new(element_type, PartialShape::new(vec![length]))])
    }

    fn evaluate(&self, ctx: &EvalCtx<'_>, outputs: &mut [TensorBuffer]) -> Result<()> {
        let element_type = ctx.output_info(0)?.element_type;
        let out = output_slot(outputs, 0)?;
        dispatch_numeric!(element_type, range(ctx, out))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use tg_tensor::ElementType;

    use crate::builder::GraphBuilder;
    use crate::registry::OpRegistry;

    #[test]
    fn test_range_length() {
        assert_eq!(range_length(1.0, 10.0, 3.0).unwrap(), 3);
        assert_eq!(range_length(0.0, 5.0, 1.0).unwrap(), 5);
        assert_eq!(range_length(5.0, 0.0, -2.0).unwrap(), 3);
        assert_eq!(range_length(5.0, 0.0, 1.0).unwrap(), 0);
        assert!(range_length(0.0, 1.0, 0.0).is_err());
        assert!(range_length(0.0, f64::INFINITY, 1.0).is_err());
        assert!(range_length(0.0, 1e300, 1.0).is_err());
        assert_eq!(
            range_length(0.0, MAX_RANGE_LENGTH as f64, 1.0).unwrap(),
            MAX_RANGE_LENGTH
        );
    }

    #[test]
    fn test_constant_range_is_static() {
        let registry = OpRegistry::with_defaults();
        let mut b = GraphBuilder::new(&registry);
        let start = b.constant(TensorBuffer::scalar(0i32)).unwrap();
        let stop = b.constant(TensorBuffer::scalar(7i32)).unwrap();
        let step = b.constant(TensorBuffer::scalar(2i32)).unwrap();
        let r = b.range(start, stop, step).unwrap();
        let f = b.finish(&[], &[r]).unwrap();
        assert_eq!(
            f.graph().output_info(r).unwrap().shape,
            PartialShape::from([4])
        );
        let mut out = vec![TensorBuffer::default()];
        f.evaluate(&registry, &mut out, &[]).unwrap();
        assert_eq!(out[0].to_vec::<i32>().unwrap(), vec![0, 2, 4, 6]);
    }

    #[test]
    fn test_parameter_range_is_dynamic() {
        let registry = OpRegistry::with_defaults();
        let mut b = GraphBuilder::new(&registry);
        let start = b.parameter(ElementType::F64, PartialShape::scalar()).unwrap();
        let stop = b.constant(TensorBuffer::scalar(1.0f64)).unwrap();
        let step = b.constant(TensorBuffer::scalar(0.25f64)).unwrap();
        let r = b.range(start, stop, step).unwrap();
        let f = b.finish(&[start], &[r]).unwrap();
        assert_eq!(
            f.graph().output_info(r).unwrap().shape,
            PartialShape::dynamic_rank(1)
        );

        let mut out = vec![TensorBuffer::default()];
        f.evaluate(&registry, &mut out, &[TensorBuffer::scalar(0.5f64)])
            .unwrap();
        let got = out[0].to_vec::<f64>().unwrap();
        assert_eq!(got.len(), 2);
        assert_relative_eq!(got[0], 0.5);
        assert_relative_eq!(got[1], 0.75);
    }

    #[test]
    fn test_huge_range_is_an_error() {
        let registry = OpRegistry::with_defaults();
        let mut b = GraphBuilder::new(&registry);
        let start = b.parameter(ElementType::F64, PartialShape::scalar()).unwrap();
        let stop = b.constant(TensorBuffer::scalar(1e300f64)).unwrap();
        let step = b.constant(TensorBuffer::scalar(1.0f64)).unwrap();
        let r = b.range(start, stop, step).unwrap();
        let f = b.finish(&[start], &[r]).unwrap();

        let mut out = vec![TensorBuffer::default()];
        assert!(matches!(
            f.evaluate(&registry, &mut out, &[TensorBuffer::scalar(0.0f64)]),
            Err(GraphError::InvalidArgument(_))
        ));

        let mut b = GraphBuilder::new(&registry);
        let start = b.constant(TensorBuffer::scalar(0.0f64)).unwrap();
        let stop = b.constant(TensorBuffer::scalar(1e300f64)).unwrap();
        let step = b.constant(TensorBuffer::scalar(1.0f64)).unwrap();
        assert!(matches!(
            b.range(start, stop, step),
            Err(GraphError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_zero_step_rejected() {
        let registry = OpRegistry::with_defaults();
        let mut b = GraphBuilder::new(&registry);
        let start = b.constant(TensorBuffer::scalar(0i64)).unwrap();
        let step = b.constant(TensorBuffer::scalar(0i64)).unwrap();
        assert!(matches!(
            b.range(start, start, step),
            Err(GraphError::InvalidArgument(_))
        ));
    }
}
