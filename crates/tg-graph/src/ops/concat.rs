use tg_tensor::{dispatch_element, normalize_axis, Dimension, Element, PartialShape, Shape, TensorBuffer};

use crate::bound::MaxValue;
use crate::error::{GraphError, Result};
use crate::graph::OutputInfo;
use crate::operator::{BoundCtx, EvalCtx, InferCtx, Operator};

use super::util::{allocated_shape, common_input_type, output_slot};

pub const AXIS: &str = "axis";

/// Joins its inputs along `axis`. Every other dimension must agree.
pub struct Concat;

fn infer_shape(shapes: &[&PartialShape], axis: i64) -> Result<PartialShape> {
    let Some(rank) = shapes.iter().find_map(|s| s.rank()) else {
        return Ok(PartialShape::dynamic());
    };
    let axis = normalize_axis(axis, rank)?;

    let mut dims = vec![Dimension::Unknown; rank];
    let mut length = Dimension::Known(0);
    for shape in shapes {
        let Some(input_dims) = shape.dims() else {
            length = Dimension::Unknown;
            continue;
        };
        if input_dims.len() != rank {
            return Err(GraphError::ShapeConflict(format!(
                "concat inputs have ranks {} and {}",
                rank,
                input_dims.len()
            )));
        }
        for (d, (merged, dim)) in dims.iter_mut().zip(input_dims).enumerate() {
            if d == axis {
                continue;
            }
            *merged = merged.merge(*dim).ok_or_else(|| {
                GraphError::ShapeConflict(format!(
                    "concat inputs disagree on dimension {}: {} vs {}",
                    d, merged, dim
                ))
            })?;
        }
        length = length + input_dims[axis];
    }
    dims[axis] = length;
    Ok(PartialShape::new(dims))
}

fn concat<T: Element>(
    inputs: &[&TensorBuffer],
    shapes: &[&Shape],
    axis: usize,
    out_shape: Shape,
    out: &mut TensorBuffer,
) -> Result<()> {
    let outer: usize = out_shape.dims()[..axis].iter().product();
    let inner: usize = out_shape.dims()[axis + 1..].iter().product();
    let mut data = Vec::with_capacity(out_shape.numel());
    let slices = inputs
        .iter()
        .map(|input| input.as_slice::<T>())
        .collect::<tg_tensor::Result<Vec<_>>>()?;

    for o in 0..outer {
        for (slice, shape) in slices.iter().zip(shapes) {
            let chunk = shape.dim(axis) * inner;
            data.extend_from_slice(&slice[o * chunk..(o + 1) * chunk]);
        }
    }
    out.set_data(out_shape, data)?;
    Ok(())
}

impl Operator for Concat {
    fn name(&self) -> &str {
        super::CONCAT
    }

    fn infer(&self, ctx: &InferCtx<'_>) -> Result<Vec<OutputInfo>> {
        ctx.expect_inputs(1, usize::MAX)?;
        let element_type = common_input_type(ctx, super::CONCAT)?;
        let axis = ctx.attributes.int(AXIS)?;
        let shapes = (0..ctx.input_count())
            .map(|i| ctx.input_shape(i))
            .collect::<Result<Vec<_>>>()?;
        Ok(vec![OutputInfo::new(element_type, infer_shape(&shapes, axis)?)])
    }

    fn evaluate(&self, ctx: &EvalCtx<'_>, outputs: &mut [TensorBuffer]) -> Result<()> {
        let inputs = (0..ctx.input_count())
            .map(|i| ctx.input(i))
            .collect::<Result<Vec<_>>>()?;
        let shapes = inputs
            .iter()
            .map(|t| allocated_shape(t))
            .collect::<Result<Vec<_>>>()?;
        let first = *shapes
            .first()
            .ok_or(GraphError::InputCount { expected: 1, got: 0 })?;
        let axis = first.normalize_axis(ctx.attributes().int(AXIS)?)?;

        let mut out_dims = first.dims().to_vec();
        out_dims[axis] = 0;
        for shape in &shapes {
            let agrees = shape.ndim() == first.ndim()
                && (0..first.ndim()).all(|d| d == axis || shape.dim(d) == first.dim(d));
            if !agrees {
                return Err(GraphError::ShapeConflict(format!(
                    "cannot concatenate {} and {} along axis {}",
                    first, shape, axis
                )));
            }
            out_dims[axis] += shape.dim(axis);
        }

        let element_type = ctx.output_info(0)?.element_type;
        let out = output_slot(outputs, 0)?;
        dispatch_element!(
            element_type,
            concat(&inputs, &shapes, axis, Shape::new(out_dims), out)
        )
    }

    /// Records each input's bound as a slice along the concat axis. Inputs
    /// whose axis length may be zero get no slice bound: an empty slice adds
    /// nothing to a later minimum.
    fn maximum_value(&self, ctx: &BoundCtx<'_>, _output_index: usize) -> MaxValue {
        let bounds: Vec<Option<u64>> = (0..ctx.input_count())
            .map(|i| ctx.input(i).value)
            .collect();
        let axis = ctx.attributes().int(AXIS).ok().and_then(|axis| {
            let rank = ctx.node.outputs.first()?.shape.rank()?;
            normalize_axis(axis, rank).ok()
        });
        let Some(axis) = axis else {
            return MaxValue::sliced(0, bounds).without_slices();
        };

        let slices = bounds
            .iter()
            .enumerate()
            .map(|(i, bound)| {
                let length = ctx
                    .input_info(i)
                    .and_then(|info| info.shape.dims())
                    .and_then(|dims| dims.get(axis))
                    .and_then(|dim| dim.get_length());
                match length {
                    Some(n) if n > 0 => *bound,
                    _ => None,
                }
            })
            .collect();
        MaxValue {
            slices,
            ..MaxValue::sliced(axis, bounds)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tg_tensor::ElementType;

    use crate::builder::GraphBuilder;
    use crate::registry::OpRegistry;

    #[test]
    fn test_infer_shape() {
        let a = PartialShape::from([1, 1]);
        let b = PartialShape::from_lengths(&[None, Some(2)]);
        assert_eq!(infer_shape(&[&a, &b], 1).unwrap(), PartialShape::from([1, 3]));
        assert_eq!(infer_shape(&[&a, &b], -1).unwrap(), PartialShape::from([1, 3]));

        let unknown = PartialShape::dynamic();
        assert_eq!(
            infer_shape(&[&a, &unknown], 0).unwrap(),
            PartialShape::from_lengths(&[None, Some(1)])
        );
        assert_eq!(
            infer_shape(&[&unknown, &unknown], 0).unwrap(),
            PartialShape::dynamic()
        );

        let wide = PartialShape::from([2, 2]);
        assert!(infer_shape(&[&a, &wide], 1).is_err());
        assert!(infer_shape(&[&a, &PartialShape::from([3])], 0).is_err());
    }

    #[test]
    fn test_concat_axis_0_and_1() {
        let registry = OpRegistry::with_defaults();
        let mut b = GraphBuilder::new(&registry);
        let x = b
            .constant(TensorBuffer::from_vec([2, 2], vec![1i32, 2, 3, 4]).unwrap())
            .unwrap();
        let y = b
            .constant(TensorBuffer::from_vec([2, 1], vec![5i32, 6]).unwrap())
            .unwrap();
        let z = b
            .constant(TensorBuffer::from_vec([1, 2], vec![7i32, 8]).unwrap())
            .unwrap();
        let cols = b.concat(&[x, y], 1).unwrap();
        let rows = b.concat(&[x, z], 0).unwrap();
        let f = b.finish(&[], &[cols, rows]).unwrap();

        let mut out = vec![TensorBuffer::default(), TensorBuffer::default()];
        f.evaluate(&registry, &mut out, &[]).unwrap();
        assert_eq!(out[0].shape().unwrap().dims(), &[2, 3]);
        assert_eq!(out[0].to_vec::<i32>().unwrap(), vec![1, 2, 5, 3, 4, 6]);
        assert_eq!(out[1].shape().unwrap().dims(), &[3, 2]);
        assert_eq!(out[1].to_vec::<i32>().unwrap(), vec![1, 2, 3, 4, 7, 8]);
    }

    #[test]
    fn test_runtime_mismatch_is_shape_conflict() {
        let registry = OpRegistry::with_defaults();
        let mut b = GraphBuilder::new(&registry);
        let p = b
            .parameter(ElementType::F32, PartialShape::dynamic_rank(2))
            .unwrap();
        let c = b.constant(TensorBuffer::filled([1, 2], 1.0f32)).unwrap();
        let out = b.concat(&[p, c], 1).unwrap();
        let f = b.finish(&[p], &[out]).unwrap();

        let mut results = vec![TensorBuffer::default()];
        let err = f
            .evaluate(&registry, &mut results, &[TensorBuffer::filled([2, 2], 0.0f32)])
            .unwrap_err();
        assert!(err.is_shape_conflict());
    }

    #[test]
    fn test_bound_records_slices() {
        let registry = OpRegistry::with_defaults();
        let mut b = GraphBuilder::new(&registry);
        let p = b.parameter(ElementType::I64, [4]).unwrap();
        let c = b.constant(TensorBuffer::filled([4], 37i64)).unwrap();
        let joined = b.concat(&[p, c], 0).unwrap();
        let graph = b.graph();
        let bound = crate::bound::BoundAnalyzer::new(graph, &registry).maximum_value(joined);
        assert_eq!(bound.value, None);
        assert_eq!(bound.slice_axis, Some(0));
        assert_eq!(bound.slices, vec![None, Some(37)]);
    }

    #[test]
    fn test_possibly_empty_input_has_no_slice_bound() {
        let registry = OpRegistry::with_defaults();
        let mut b = GraphBuilder::new(&registry);
        let c = b.constant(TensorBuffer::filled([2], 9i64)).unwrap();
        let q = b
            .parameter(ElementType::I64, PartialShape::dynamic_rank(1))
            .unwrap();
        let five = b.constant(TensorBuffer::scalar(5i64)).unwrap();
        let capped = b.minimum(five, q).unwrap();
        let none = b.constant(TensorBuffer::new(ElementType::I64, [0])).unwrap();
        let joined = b.concat(&[c, capped, none], 0).unwrap();
        let graph = b.graph();
        let bound = crate::bound::BoundAnalyzer::new(graph, &registry).maximum_value(joined);
        assert_eq!(bound.value, None);
        assert_eq!(bound.slices, vec![Some(9), None, None]);
    }
}
