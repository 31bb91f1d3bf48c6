//! Shapes that may be only partly known before execution.
//!
//! A [`PartialShape`] either has unknown rank, or a known rank whose
//! dimensions are each a known length or unknown. Arithmetic on
//! [`Dimension`]s propagates "unknown" outward.

use std::fmt;
use std::ops::Add;

use crate::error::{Result, TensorError};
use crate::shape::Shape;

/// A single dimension: a known non-negative length, or unknown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dimension {
    Known(usize),
    Unknown,
}

impl Dimension {
    pub fn is_known(&self) -> bool {
        matches!(self, Dimension::Known(_))
    }

    /// Returns the length if known.
    pub fn get_length(&self) -> Option<usize> {
        match self {
            Dimension::Known(n) => Some(*n),
            Dimension::Unknown => None,
        }
    }

    /// Returns true if this dimension can describe a runtime length of `n`.
    pub fn accepts(&self, n: usize) -> bool {
        match self {
            Dimension::Known(d) => *d == n,
            Dimension::Unknown => true,
        }
    }

    /// Combines two descriptions of the same dimension, keeping the more
    /// precise one. Returns `None` when both are known and differ.
    pub fn merge(self, other: Dimension) -> Option<Dimension> {
        match (self, other) {
            (Dimension::Unknown, d) | (d, Dimension::Unknown) => Some(d),
            (Dimension::Known(a), Dimension::Known(b)) if a == b => Some(Dimension::Known(a)),
            _ => None,
        }
    }

    /// Difference of two dimensions. Unknown if either side is unknown or if
    /// the result would be negative.
    pub fn checked_sub(self, other: Dimension) -> Dimension {
        match (self, other) {
            (Dimension::Known(a), Dimension::Known(b)) if a >= b => Dimension::Known(a - b),
            _ => Dimension::Unknown,
        }
    }
}

impl Add for Dimension {
    type Output = Dimension;

    fn add(self, rhs: Dimension) -> Dimension {
        match (self, rhs) {
            (Dimension::Known(a), Dimension::Known(b)) => Dimension::Known(a + b),
            _ => Dimension::Unknown,
        }
    }
}

impl From<usize> for Dimension {
    fn from(n: usize) -> Self {
        Dimension::Known(n)
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dimension::Known(n) => write!(f, "{}", n),
            Dimension::Unknown => write!(f, "?"),
        }
    }
}

/// A shape whose rank and dimensions may be unknown.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PartialShape {
    dims: Option<Vec<Dimension>>,
}

impl PartialShape {
    /// A shape of known rank built from the given dimensions.
    pub fn new(dims: Vec<Dimension>) -> Self {
        PartialShape { dims: Some(dims) }
    }

    /// A shape whose rank is unknown.
    pub fn dynamic() -> Self {
        PartialShape { dims: None }
    }

    /// A shape of rank `rank` with every dimension unknown.
    pub fn dynamic_rank(rank: usize) -> Self {
        PartialShape::new(vec![Dimension::Unknown; rank])
    }

    /// The rank-0 shape.
    pub fn scalar() -> Self {
        PartialShape::new(Vec::new())
    }

    /// Builds a shape of known rank from optional lengths, `None` meaning unknown.
    pub fn from_lengths(lengths: &[Option<usize>]) -> Self {
        PartialShape::new(
            lengths
                .iter()
                .map(|l| l.map_or(Dimension::Unknown, Dimension::Known))
                .collect(),
        )
    }

    pub fn rank(&self) -> Option<usize> {
        self.dims.as_ref().map(Vec::len)
    }

    /// The dimensions, if the rank is known.
    pub fn dims(&self) -> Option<&[Dimension]> {
        self.dims.as_deref()
    }

    /// True when the rank and every dimension are known.
    pub fn is_static(&self) -> bool {
        match &self.dims {
            Some(dims) => dims.iter().all(Dimension::is_known),
            None => false,
        }
    }

    pub fn is_dynamic(&self) -> bool {
        !self.is_static()
    }

    /// Converts to a concrete [`Shape`] when fully static.
    pub fn to_shape(&self) -> Option<Shape> {
        let dims = self.dims.as_ref()?;
        dims.iter()
            .map(Dimension::get_length)
            .collect::<Option<Vec<_>>>()
            .map(Shape::new)
    }

    /// True if `shape` is a possible runtime value of this partial shape.
    pub fn compatible(&self, shape: &Shape) -> bool {
        match &self.dims {
            None => true,
            Some(dims) => {
                dims.len() == shape.ndim()
                    && dims.iter().zip(shape.dims()).all(|(d, &n)| d.accepts(n))
            }
        }
    }

    /// True if some concrete shape satisfies both partial shapes.
    pub fn compatible_with(&self, other: &PartialShape) -> bool {
        self.merge(other).is_ok()
    }

    /// Combines two descriptions of the same shape into the most precise one.
    ///
    /// Fails with [`TensorError::ShapeConflict`] when ranks are known and differ,
    /// or when two known dimensions disagree.
    pub fn merge(&self, other: &PartialShape) -> Result<PartialShape> {
        let conflict = || TensorError::ShapeConflict {
            a: self.to_string(),
            b: other.to_string(),
        };
        match (&self.dims, &other.dims) {
            (None, _) => Ok(other.clone()),
            (_, None) => Ok(self.clone()),
            (Some(a), Some(b)) => {
                if a.len() != b.len() {
                    return Err(conflict());
                }
                let dims = a
                    .iter()
                    .zip(b)
                    .map(|(x, y)| x.merge(*y))
                    .collect::<Option<Vec<_>>>()
                    .ok_or_else(conflict)?;
                Ok(PartialShape::new(dims))
            }
        }
    }

    /// Numpy-style broadcast of two partial shapes.
    ///
    /// A known 1 against an unknown dimension yields unknown, since the
    /// unknown side may be 1 or any other length.
    pub fn broadcast(a: &PartialShape, b: &PartialShape) -> Result<PartialShape> {
        let (Some(da), Some(db)) = (&a.dims, &b.dims) else {
            return Ok(PartialShape::dynamic());
        };
        let rank = da.len().max(db.len());
        let mut dims = Vec::with_capacity(rank);
        for i in 0..rank {
            let x = if i < da.len() {
                da[da.len() - 1 - i]
            } else {
                Dimension::Known(1)
            };
            let y = if i < db.len() {
                db[db.len() - 1 - i]
            } else {
                Dimension::Known(1)
            };
            let dim = match (x, y) {
                (Dimension::Known(1), d) | (d, Dimension::Known(1)) => d,
                (Dimension::Known(p), Dimension::Known(q)) if p == q => Dimension::Known(p),
                (Dimension::Known(_), Dimension::Known(_)) => {
                    return Err(TensorError::BroadcastError {
                        a: a.to_string(),
                        b: b.to_string(),
                    })
                }
                (Dimension::Known(n), Dimension::Unknown)
                | (Dimension::Unknown, Dimension::Known(n)) => Dimension::Known(n),
                (Dimension::Unknown, Dimension::Unknown) => Dimension::Unknown,
            };
            dims.push(dim);
        }
        dims.reverse();
        Ok(PartialShape::new(dims))
    }
}

impl From<Shape> for PartialShape {
    fn from(shape: Shape) -> Self {
        PartialShape::new(shape.into_dims().into_iter().map(Dimension::Known).collect())
    }
}

impl From<&Shape> for PartialShape {
    fn from(shape: &Shape) -> Self {
        PartialShape::new(shape.dims().iter().map(|&d| Dimension::Known(d)).collect())
    }
}

impl From<Vec<Dimension>> for PartialShape {
    fn from(dims: Vec<Dimension>) -> Self {
        PartialShape::new(dims)
    }
}

impl<const N: usize> From<[usize; N]> for PartialShape {
    fn from(dims: [usize; N]) -> Self {
        PartialShape::new(dims.iter().map(|&d| Dimension::Known(d)).collect())
    }
}

impl fmt::Display for PartialShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.dims {
            None => write!(f, "{{...}}"),
            Some(dims) => {
                write!(f, "{{")?;
                for (i, d) in dims.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{}", d)?;
                }
                write!(f, "}}")
            }
        }
    }
}
