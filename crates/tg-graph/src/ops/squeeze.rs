//! Shape-only transforms that remove or insert unit dimensions.

use tg_tensor::{Dimension, PartialShape, Shape, TensorBuffer};

use crate::bound::MaxValue;
use crate::error::{GraphError, Result};
use crate::graph::OutputInfo;
use crate::operator::{BoundCtx, EvalCtx, InferCtx, Operator};

use super::util::{allocated_shape, normalize_axes, output_slot, read_integers};

/// Removes unit dimensions: the ones named by the optional axes input, or
/// every unit dimension when it is absent.
pub struct Squeeze;

/// Inserts unit dimensions at the positions named by the axes input, counted
/// in the output's rank.
pub struct Unsqueeze;

fn squeezed_dims(dims: &[Dimension], axes: Option<&[usize]>) -> Result<Option<Vec<Dimension>>> {
    match axes {
        Some(axes) => {
            for &axis in axes {
                if let Dimension::Known(n) = dims[axis] {
                    if n != 1 {
                        return Err(GraphError::ShapeConflict(format!(
                            "cannot squeeze axis {} of length {}",
                            axis, n
                        )));
                    }
                }
            }
            Ok(Some(
                dims.iter()
                    .enumerate()
                    .filter(|(d, _)| !axes.contains(d))
                    .map(|(_, &dim)| dim)
                    .collect(),
            ))
        }
        None if dims.iter().all(Dimension::is_known) => Ok(Some(
            dims.iter()
                .copied()
                .filter(|&dim| dim != Dimension::Known(1))
                .collect(),
        )),
        None => Ok(None),
    }
}

fn unsqueezed_dims<D: Copy>(dims: &[D], axes: &[usize], one: D) -> Vec<D> {
    let mut source = dims.iter();
    (0..dims.len() + axes.len())
        .filter_map(|position| {
            if axes.contains(&position) {
                Some(one)
            } else {
                source.next().copied()
            }
        })
        .collect()
}

fn unsqueeze_axes(axes: &[i64], out_rank: usize) -> Result<Vec<usize>> {
    let normalized = normalize_axes(axes, out_rank)?;
    if normalized.len() != axes.len() {
        return Err(GraphError::InvalidArgument(format!(
            "repeated unsqueeze axes {:?}",
            axes
        )));
    }
    Ok(normalized)
}

impl Operator for Squeeze {
    fn name(&self) -> &str {
        super::SQUEEZE
    }

    fn infer(&self, ctx: &InferCtx<'_>) -> Result<Vec<OutputInfo>> {
        ctx.expect_inputs(1, 2)?;
        let element_type = ctx.input_type(0)?;
        let data_shape = ctx.input_shape(0)?;
        let shape = match data_shape.dims() {
            Some(dims) if ctx.input_count() == 1 => squeezed_dims(dims, None)?,
            Some(dims) => match ctx.constant_input(1) {
                Some(axes) => {
                    let axes = normalize_axes(&read_integers(axes, "axes")?, dims.len())?;
                    squeezed_dims(dims, Some(&axes))?
                }
                None => None,
            },
            None => None,
        };
        let shape = shape.map_or_else(PartialShape::dynamic, PartialShape::new);
        Ok(vec![OutputInfo::new(element_type, shape)])
    }

    fn evaluate(&self, ctx: &EvalCtx<'_>, outputs: &mut [TensorBuffer]) -> Result<()> {
        let data = ctx.input(0)?;
        let shape = allocated_shape(data)?;
        let dims: Vec<Dimension> = shape.dims().iter().map(|&d| Dimension::Known(d)).collect();
        let axes = if ctx.input_count() > 1 {
            Some(normalize_axes(
                &read_integers(ctx.input(1)?, "axes")?,
                shape.ndim(),
            )?)
        } else {
            None
        };
        let squeezed = squeezed_dims(&dims, axes.as_deref())?
            .and_then(|dims| PartialShape::new(dims).to_shape())
            .ok_or_else(|| GraphError::ShapeConflict(format!("cannot squeeze {}", shape)))?;
        *output_slot(outputs, 0)? = data.reshape(squeezed)?;
        Ok(())
    }

    fn maximum_value(&self, ctx: &BoundCtx<'_>, _output_index: usize) -> MaxValue {
        ctx.input(0).without_slices()
    }
}

impl Operator for Unsqueeze {
    fn name(&self) -> &str {
        super::UNSQUEEZE
    }

    fn infer(&self, ctx: &InferCtx<'_>) -> Result<Vec<OutputInfo>> {
        ctx.expect_inputs(2, 2)?;
        let element_type = ctx.input_type(0)?;
        let data_shape = ctx.input_shape(0)?;
        let axes_count = ctx
            .input_shape(1)?
            .to_shape()
            .map(|s| s.numel());

        let shape = match (data_shape.dims(), ctx.constant_input(1)) {
            (Some(dims), Some(axes)) => {
                let axes = read_integers(axes, "axes")?;
                let axes = unsqueeze_axes(&axes, dims.len() + axes.len())?;
                PartialShape::new(unsqueezed_dims(dims, &axes, Dimension::Known(1)))
            }
            (Some(dims), None) => match axes_count {
                Some(n) => PartialShape::dynamic_rank(dims.len() + n),
                None => PartialShape::dynamic(),
            },
            (None, _) => PartialShape::dynamic(),
        };
        Ok(vec![OutputInfo::new(element_type, shape)])
    }

    fn evaluate(&self, ctx: &EvalCtx<'_>, outputs: &mut [TensorBuffer]) -> Result<()> {
        let data = ctx.input(0)?;
        let shape = allocated_shape(data)?;
        let axes = read_integers(ctx.input(1)?, "axes")?;
        let axes = unsqueeze_axes(&axes, shape.ndim() + axes.len())?;
        let expanded = Shape::new(unsqueezed_dims(shape.dims(), &axes, 1));
        *output_slot(outputs, 0)? = data.reshape(expanded)?;
        Ok(())
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
    fn test_unsqueezed_dims() {
        assert_eq!(unsqueezed_dims(&[3, 4], &[0, 3], 1), vec![1, 3, 4, 1]);
        assert_eq!(unsqueezed_dims::<usize>(&[], &[0], 1), vec![1]);
        assert!(unsqueeze_axes(&[0, 0], 3).is_err());
    }

    #[test]
    fn test_squeeze_all_unit_dims() {
        let registry = OpRegistry::with_defaults();
        let mut b = GraphBuilder::new(&registry);
        let c = b
            .constant(TensorBuffer::from_vec([1, 3, 1], vec![1.0f32, 2.0, 3.0]).unwrap())
            .unwrap();
        let s = b.squeeze(c, None).unwrap();
        let f = b.finish(&[], &[s]).unwrap();
        assert_eq!(f.graph().output_info(s).unwrap().shape, PartialShape::from([3]));

        let mut out = vec![TensorBuffer::default()];
        f.evaluate(&registry, &mut out, &[]).unwrap();
        assert_eq!(out[0].shape().unwrap().dims(), &[3]);
        assert_eq!(out[0].to_vec::<f32>().unwrap(), vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_squeeze_non_unit_axis_rejected() {
        let registry = OpRegistry::with_defaults();
        let mut b = GraphBuilder::new(&registry);
        let p = b.parameter(ElementType::F32, [2, 1]).unwrap();
        let axes = b.axes(&[0]).unwrap();
        assert!(b.squeeze(p, Some(axes)).unwrap_err().is_shape_conflict());
    }

    #[test]
    fn test_unsqueeze_then_squeeze_round_trip() {
        let registry = OpRegistry::with_defaults();
        let mut b = GraphBuilder::new(&registry);
        let p = b
            .parameter(ElementType::I32, PartialShape::from_lengths(&[None]))
            .unwrap();
        let axes = b.axes(&[-1]).unwrap();
        let up = b.unsqueeze(p, axes).unwrap();
        let down = b.squeeze(up, Some(axes)).unwrap();
        let f = b.finish(&[p], &[up, down]).unwrap();
        assert_eq!(
            f.graph().output_info(up).unwrap().shape,
            PartialShape::from_lengths(&[None, Some(1)])
        );

        let input = TensorBuffer::from_vec([2], vec![5i32, 6]).unwrap();
        let mut out = vec![TensorBuffer::default(), TensorBuffer::default()];
        f.evaluate(&registry, &mut out, &[input.clone()]).unwrap();
        assert_eq!(out[0].shape().unwrap().dims(), &[2, 1]);
        assert_eq!(out[1], input);
    }
}
