use tg_tensor::{dispatch_element, normalize_axis, Dimension, Element, PartialShape, Shape, TensorBuffer};

use crate::bound::MaxValue;
use crate::error::{GraphError, Result};
use crate::graph::OutputInfo;
use crate::operator::{BoundCtx, EvalCtx, InferCtx, Operator};

use super::util::allocated_shape;

pub const AXIS: &str = "axis";
pub const NUM_SPLITS: &str = "num_splits";

/// Cuts its input into `num_splits` equal parts along `axis`, one output
/// per part.
pub struct Split;

fn num_splits(value: i64) -> Result<usize> {
    usize::try_from(value)
        .ok()
        .filter(|&n| n > 0)
        .ok_or_else(|| GraphError::Attribute(format!("num_splits must be positive, got {}", value)))
}

fn split<T: Element>(
    input: &TensorBuffer,
    axis: usize,
    outputs: &mut [TensorBuffer],
) -> Result<()> {
    let shape = allocated_shape(input)?;
    let data = input.as_slice::<T>()?;
    let parts = outputs.len();
    let length = shape.dim(axis);
    if length % parts != 0 {
        return Err(GraphError::ShapeConflict(format!(
            "axis {} of {} does not split into {} parts",
            axis, shape, parts
        )));
    }

    let part_length = length / parts;
    let outer: usize = shape.dims()[..axis].iter().product();
    let inner: usize = shape.dims()[axis + 1..].iter().product();
    let chunk = part_length * inner;

    let mut part_dims = shape.dims().to_vec();
    part_dims[axis] = part_length;

    for (p, out) in outputs.iter_mut().enumerate() {
        let mut values = Vec::with_capacity(outer * chunk);
        for o in 0..outer {
            let start = o * length * inner + p * chunk;
            values.extend_from_slice(&data[start..start + chunk]);
        }
        out.set_data(Shape::new(part_dims.clone()), values)?;
    }
    Ok(())
}

impl Operator for Split {
    fn name(&self) -> &str {
        super::SPLIT
    }

    fn infer(&self, ctx: &InferCtx<'_>) -> Result<Vec<OutputInfo>> {
        ctx.expect_inputs(1, 1)?;
        let element_type = ctx.input_type(0)?;
        let parts = num_splits(ctx.attributes.int(NUM_SPLITS)?)?;
        let axis = ctx.attributes.int(AXIS)?;

        let shape = match ctx.input_shape(0)?.dims() {
            Some(dims) => {
                let axis = normalize_axis(axis, dims.len())?;
                let mut part = dims.to_vec();
                part[axis] = match dims[axis] {
                    Dimension::Known(n) if n % parts != 0 => {
                        return Err(GraphError::ShapeConflict(format!(
                            "dimension {} of length {} does not split into {} parts",
                            axis, n, parts
                        )))
                    }
                    Dimension::Known(n) => Dimension::Known(n / parts),
                    Dimension::Unknown => Dimension::Unknown,
                };
                PartialShape::new(part)
            }
            None => PartialShape::dynamic(),
        };
        Ok(vec![OutputInfo::new(element_type, shape); parts])
    }

    fn evaluate(&self, ctx: &EvalCtx<'_>, outputs: &mut [TensorBuffer]) -> Result<()> {
        let input = ctx.input(0)?;
        let axis = allocated_shape(input)?.normalize_axis(ctx.attributes().int(AXIS)?)?;
        let element_type = ctx.output_info(0)?.element_type;
        dispatch_element!(element_type, split(input, axis, outputs))
    }

    fn maximum_value(&self, ctx: &BoundCtx<'_>, _output_index: usize) -> MaxValue {
        ctx.input(0).without_slices()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tg_tensor::ElementType;

    use crate::builder::GraphBuilder;
    use crate::registry::OpRegistry;

    #[test]
    fn test_split_columns() {
        let registry = OpRegistry::with_defaults();
        let mut b = GraphBuilder::new(&registry);
        let c = b
            .constant(TensorBuffer::from_vec([2, 4], (0..8).collect::<Vec<i32>>()).unwrap())
            .unwrap();
        let parts = b.split(c, 1, 2).unwrap();
        assert_eq!(parts.len(), 2);
        let f = b.finish(&[], &parts).unwrap();

        let mut out = vec![TensorBuffer::default(), TensorBuffer::default()];
        f.evaluate(&registry, &mut out, &[]).unwrap();
        assert_eq!(out[0].shape().unwrap().dims(), &[2, 2]);
        assert_eq!(out[0].to_vec::<i32>().unwrap(), vec![0, 1, 4, 5]);
        assert_eq!(out[1].to_vec::<i32>().unwrap(), vec![2, 3, 6, 7]);
    }

    #[test]
    fn test_uneven_split_rejected() {
        let registry = OpRegistry::with_defaults();
        let mut b = GraphBuilder::new(&registry);
        let p = b.parameter(ElementType::F32, [3]).unwrap();
        assert!(b.split(p, 0, 2).unwrap_err().is_shape_conflict());
        assert!(matches!(b.split(p, 0, 0), Err(GraphError::Attribute(_))));
    }

    #[test]
    fn test_dynamic_split_checked_at_runtime() {
        let registry = OpRegistry::with_defaults();
        let mut b = GraphBuilder::new(&registry);
        let p = b
            .parameter(ElementType::F32, PartialShape::from_lengths(&[None]))
            .unwrap();
        let parts = b.split(p, 0, 2).unwrap();
        let f = b.finish(&[p], &parts).unwrap();

        let mut out = vec![TensorBuffer::default(), TensorBuffer::default()];
        let err = f
            .evaluate(&registry, &mut out, &[TensorBuffer::new(ElementType::F32, [3])])
            .unwrap_err();
        assert!(err.is_shape_conflict());

        f.evaluate(&registry, &mut out, &[TensorBuffer::filled([4], 2.0f32)])
            .unwrap();
        assert_eq!(out[1].to_vec::<f32>().unwrap(), vec![2.0, 2.0]);
    }
}
