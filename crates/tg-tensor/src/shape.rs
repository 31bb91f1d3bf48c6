use crate::error::{Result, TensorError};
use std::fmt;

/// A concrete shape: every dimension length is known.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Shape {
    dims: Vec<usize>,
}

impl Shape {
    pub fn new(dims: Vec<usize>) -> Self {
        Shape { dims }
    }

    /// The rank-0 shape of a scalar.
    pub fn scalar() -> Self {
        Shape { dims: Vec::new() }
    }

    pub fn from_slice(dims: &[usize]) -> Self {
        Shape {
            dims: dims.to_vec(),
        }
    }

    /// Rank.
    pub fn ndim(&self) -> usize {
        self.dims.len()
    }

    /// Element count; 1 for a scalar, 0 if any dimension is 0.
    pub fn numel(&self) -> usize {
        self.dims.iter().product()
    }

    /// Length of dimension `i`. Panics if `i` is out of range.
    pub fn dim(&self, i: usize) -> usize {
        self.dims[i]
    }

    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    pub fn into_dims(self) -> Vec<usize> {
        self.dims
    }

    /// Row-major strides in elements; `{2,3,4}` gives `[12, 4, 1]`.
    pub fn strides(&self) -> Vec<usize> {
        let mut strides = vec![1usize; self.dims.len()];
        let mut acc = 1;
        for (stride, &dim) in strides.iter_mut().zip(&self.dims).rev() {
            *stride = acc;
            acc *= dim;
        }
        strides
    }

    /// Maps a possibly negative axis onto `0..ndim`.
    pub fn normalize_axis(&self, axis: i64) -> Result<usize> {
        normalize_axis(axis, self.ndim())
    }

    /// Numpy-style broadcast: align trailing dimensions, treat missing
    /// leading ones as 1, and let a 1 stretch to the other side's length.
    pub fn broadcast_shape(a: &Shape, b: &Shape) -> Result<Shape> {
        let rank = a.ndim().max(b.ndim());
        let padded = |s: &Shape, d: usize| {
            let offset = rank - s.ndim();
            if d < offset {
                1
            } else {
                s.dims[d - offset]
            }
        };
        (0..rank)
            .map(|d| match (padded(a, d), padded(b, d)) {
                (x, y) if x == y || y == 1 => Ok(x),
                (1, y) => Ok(y),
                _ => Err(TensorError::BroadcastError {
                    a: a.to_string(),
                    b: b.to_string(),
                }),
            })
            .collect::<Result<Vec<_>>>()
            .map(Shape::new)
    }
}

/// Maps `axis` (which may count from the back when negative) onto `0..ndim`.
pub fn normalize_axis(axis: i64, ndim: usize) -> Result<usize> {
    let rank = ndim as i64;
    let normalized = if axis < 0 { axis + rank } else { axis };
    if normalized < 0 || normalized >= rank {
        return Err(TensorError::InvalidAxis { axis, ndim });
    }
    Ok(normalized as usize)
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dims: Vec<String> = self.dims.iter().map(usize::to_string).collect();
        write!(f, "{{{}}}", dims.join(","))
    }
}

impl From<Vec<usize>> for Shape {
    fn from(dims: Vec<usize>) -> Self {
        Shape::new(dims)
    }
}

impl From<&[usize]> for Shape {
    fn from(dims: &[usize]) -> Self {
        Shape::from_slice(dims)
    }
}

impl<const N: usize> From<[usize; N]> for Shape {
    fn from(dims: [usize; N]) -> Self {
        Shape::new(dims.to_vec())
    }
}
