use crate::dtype::ElementType;
use crate::element::Element;
use crate::error::{Result, TensorError};
use crate::partial_shape::PartialShape;
use crate::shape::Shape;
use crate::storage::HostStorage;

/// A typed, shaped block of host memory.
///
/// A buffer is either allocated (element type, concrete shape, and storage of
/// exactly `shape.numel()` elements) or shapeless. Shapeless buffers model the
/// outputs of operations whose shape is only known once they run; the
/// producing operation resizes them. Typed access checks the requested native
/// type against the declared element type before touching storage.
#[derive(Debug)]
pub struct TensorBuffer {
    element_type: Option<ElementType>,
    shape: Option<Shape>,
    storage: Option<HostStorage>,
    consumed: bool,
}

impl TensorBuffer {
    /// Create a zero-filled buffer of the given type and shape.
    pub fn new(element_type: ElementType, shape: impl Into<Shape>) -> Self {
        let shape = shape.into();
        TensorBuffer {
            element_type: Some(element_type),
            storage: Some(HostStorage::zeros(element_type, shape.numel())),
            shape: Some(shape),
            consumed: false,
        }
    }

    /// Create a buffer with no shape or storage yet. The element type may be
    /// left undetermined.
    pub fn shapeless(element_type: Option<ElementType>) -> Self {
        TensorBuffer {
            element_type,
            shape: None,
            storage: None,
            consumed: false,
        }
    }

    /// Create a buffer from typed data and a shape.
    ///
    /// # Errors
    /// Returns `DataLength` if `data.len() != shape.numel()`.
    pub fn from_vec<T: Element>(shape: impl Into<Shape>, data: Vec<T>) -> Result<Self> {
        let shape = shape.into();
        if data.len() != shape.numel() {
            return Err(TensorError::DataLength {
                expected: shape.numel(),
                got: data.len(),
            });
        }
        Ok(TensorBuffer {
            element_type: Some(T::TYPE),
            shape: Some(shape),
            storage: Some(T::into_storage(data)),
            consumed: false,
        })
    }

    /// Create a rank-0 buffer holding `value`.
    pub fn scalar<T: Element>(value: T) -> Self {
        TensorBuffer {
            element_type: Some(T::TYPE),
            shape: Some(Shape::scalar()),
            storage: Some(T::into_storage(vec![value])),
            consumed: false,
        }
    }

    /// Create a buffer with every element set to `value`.
    pub fn filled<T: Element>(shape: impl Into<Shape>, value: T) -> Self {
        let shape = shape.into();
        TensorBuffer {
            element_type: Some(T::TYPE),
            storage: Some(T::into_storage(vec![value; shape.numel()])),
            shape: Some(shape),
            consumed: false,
        }
    }

    /// Reallocate to the given type and shape, zero-filled.
    ///
    /// # Errors
    /// Returns `InvalidResize` once the buffer has been handed to a consumer.
    pub fn resize(&mut self, element_type: ElementType, shape: impl Into<Shape>) -> Result<()> {
        if self.consumed {
            return Err(TensorError::InvalidResize);
        }
        let shape = shape.into();
        self.storage = Some(HostStorage::zeros(element_type, shape.numel()));
        self.element_type = Some(element_type);
        self.shape = Some(shape);
        Ok(())
    }

    /// Replace type, shape, and contents in one step, taking ownership of `data`.
    ///
    /// # Errors
    /// `InvalidResize` once consumed, `DataLength` if the data does not fill the shape.
    pub fn set_data<T: Element>(&mut self, shape: impl Into<Shape>, data: Vec<T>) -> Result<()> {
        if self.consumed {
            return Err(TensorError::InvalidResize);
        }
        *self = TensorBuffer::from_vec(shape, data)?;
        Ok(())
    }

    /// Record that the buffer has been handed to a downstream reader. Further
    /// resizes fail.
    pub fn mark_consumed(&mut self) {
        self.consumed = true;
    }

    pub fn is_consumed(&self) -> bool {
        self.consumed
    }

    /// Take the buffer back out of a consumer's hands, clearing the consumed
    /// flag without copying.
    pub fn into_detached(mut self) -> TensorBuffer {
        self.consumed = false;
        self
    }

    pub fn is_shapeless(&self) -> bool {
        self.storage.is_none()
    }

    pub fn element_type(&self) -> Option<ElementType> {
        self.element_type
    }

    /// Returns the concrete shape, or `None` while shapeless.
    pub fn shape(&self) -> Option<&Shape> {
        self.shape.as_ref()
    }

    /// The shape as a partial shape; fully dynamic while shapeless.
    pub fn partial_shape(&self) -> PartialShape {
        match &self.shape {
            Some(shape) => PartialShape::from(shape),
            None => PartialShape::dynamic(),
        }
    }

    /// Number of elements; 0 while shapeless.
    pub fn element_count(&self) -> usize {
        self.storage.as_ref().map_or(0, HostStorage::len)
    }

    pub fn byte_size(&self) -> usize {
        self.storage.as_ref().map_or(0, HostStorage::byte_size)
    }

    /// Returns the underlying storage, if allocated.
    pub fn storage(&self) -> Option<&HostStorage> {
        self.storage.as_ref()
    }

    fn check_type<T: Element>(&self) -> Result<()> {
        match self.element_type {
            Some(declared) if declared != T::TYPE => Err(TensorError::TypeMismatch {
                expected: declared,
                got: T::TYPE,
            }),
            Some(_) => Ok(()),
            None => Err(TensorError::Unallocated),
        }
    }

    /// Borrow the contents as a typed slice.
    ///
    /// # Errors
    /// `TypeMismatch` if `T` is not the declared element type, `Unallocated`
    /// if the buffer is shapeless.
    pub fn as_slice<T: Element>(&self) -> Result<&[T]> {
        self.check_type::<T>()?;
        let storage = self.storage.as_ref().ok_or(TensorError::Unallocated)?;
        T::slice(storage).ok_or(TensorError::TypeMismatch {
            expected: storage.element_type(),
            got: T::TYPE,
        })
    }

    /// Mutably borrow the contents as a typed slice.
    pub fn as_mut_slice<T: Element>(&mut self) -> Result<&mut [T]> {
        self.check_type::<T>()?;
        let storage = self.storage.as_mut().ok_or(TensorError::Unallocated)?;
        let stored = storage.element_type();
        T::slice_mut(storage).ok_or(TensorError::TypeMismatch {
            expected: stored,
            got: T::TYPE,
        })
    }

    /// Copy the contents into a vector.
    pub fn to_vec<T: Element>(&self) -> Result<Vec<T>> {
        Ok(self.as_slice::<T>()?.to_vec())
    }

    /// Read the element at flat index `index`.
    pub fn get<T: Element>(&self, index: usize) -> Result<T> {
        let data = self.as_slice::<T>()?;
        data.get(index)
            .copied()
            .ok_or(TensorError::IndexOutOfRange {
                index,
                len: data.len(),
            })
    }

    /// Write the element at flat index `index`.
    pub fn set<T: Element>(&mut self, index: usize, value: T) -> Result<()> {
        let data = self.as_mut_slice::<T>()?;
        let len = data.len();
        let slot = data
            .get_mut(index)
            .ok_or(TensorError::IndexOutOfRange { index, len })?;
        *slot = value;
        Ok(())
    }

    /// Overwrite the whole contents. The shape is unchanged.
    pub fn write_slice<T: Element>(&mut self, values: &[T]) -> Result<()> {
        let data = self.as_mut_slice::<T>()?;
        if data.len() != values.len() {
            return Err(TensorError::DataLength {
                expected: data.len(),
                got: values.len(),
            });
        }
        data.copy_from_slice(values);
        Ok(())
    }

    /// Read an integral buffer of any width as `i64` values, e.g. axes or
    /// shape vectors. Fails with `IntegerOverflow` on a `u64` element above
    /// `i64::MAX`.
    pub fn to_i64_vec(&self) -> Result<Vec<i64>> {
        let storage = self.storage.as_ref().ok_or(TensorError::Unallocated)?;
        let ety = storage.element_type();
        if !ety.is_integral() {
            return Err(TensorError::UnsupportedType(ety));
        }
        fn widen<T: Element>(storage: &HostStorage) -> Result<Vec<i64>> {
            T::slice(storage).map_or_else(
                || Ok(Vec::new()),
                |s| {
                    s.iter()
                        .map(|v| {
                            let wide = v.to_i128();
                            i64::try_from(wide).map_err(|_| TensorError::IntegerOverflow(wide))
                        })
                        .collect()
                },
            )
        }
        crate::dispatch_element!(ety, widen(storage))
    }

    /// Return a copy holding the same data under a different shape.
    ///
    /// The total number of elements must remain the same.
    pub fn reshape(&self, new_shape: impl Into<Shape>) -> Result<TensorBuffer> {
        let new_shape = new_shape.into();
        let shape = self.shape.as_ref().ok_or(TensorError::Unallocated)?;
        if shape.numel() != new_shape.numel() {
            return Err(TensorError::ShapeConflict {
                a: shape.to_string(),
                b: new_shape.to_string(),
            });
        }
        Ok(TensorBuffer {
            element_type: self.element_type,
            shape: Some(new_shape),
            storage: self.storage.clone(),
            consumed: false,
        })
    }
}

/// Clones are fresh buffers that no consumer has seen yet.
impl Clone for TensorBuffer {
    fn clone(&self) -> Self {
        TensorBuffer {
            element_type: self.element_type,
            shape: self.shape.clone(),
            storage: self.storage.clone(),
            consumed: false,
        }
    }
}

impl PartialEq for TensorBuffer {
    fn eq(&self, other: &Self) -> bool {
        self.element_type == other.element_type
            && self.shape == other.shape
            && self.storage == other.storage
    }
}

impl Default for TensorBuffer {
    fn default() -> Self {
        TensorBuffer::shapeless(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use half::f16;

    #[test]
    fn test_new_buffer_is_zeroed() {
        let t = TensorBuffer::new(ElementType::F32, [2, 3]);
        assert_eq!(t.element_type(), Some(ElementType::F32));
        assert_eq!(t.shape(), Some(&Shape::from([2, 3])));
        assert_eq!(t.element_count(), 6);
        assert_eq!(t.byte_size(), 24);
        assert_eq!(t.to_vec::<f32>().unwrap(), vec![0.0; 6]);
    }

    #[test]
    fn test_byte_size_tracks_type() {
        assert_eq!(TensorBuffer::new(ElementType::F16, [4]).byte_size(), 8);
        assert_eq!(TensorBuffer::new(ElementType::I64, [4]).byte_size(), 32);
        assert_eq!(TensorBuffer::new(ElementType::Boolean, [4]).byte_size(), 4);
    }

    #[test]
    fn test_type_mismatch_on_every_wrong_type() {
        let mut c = TensorBuffer::new(ElementType::F32, Shape::scalar());
        c.set::<f32>(0, 1.0).unwrap();
        assert_eq!(c.get::<f32>(0).unwrap(), 1.0);

        assert!(matches!(
            c.as_slice::<f64>(),
            Err(TensorError::TypeMismatch {
                expected: ElementType::F32,
                got: ElementType::F64
            })
        ));
        assert!(matches!(
            c.get::<i32>(0),
            Err(TensorError::TypeMismatch { .. })
        ));
        assert!(matches!(
            c.set::<i64>(0, 3),
            Err(TensorError::TypeMismatch { .. })
        ));
        assert!(c.to_vec::<f16>().is_err());
        assert!(c.to_vec::<bool>().is_err());
        // The failed writes did not touch the data.
        assert_eq!(c.get::<f32>(0).unwrap(), 1.0);
    }

    #[test]
    fn test_shapeless_buffer() {
        let t = TensorBuffer::shapeless(None);
        assert!(t.is_shapeless());
        assert_eq!(t.element_count(), 0);
        assert_eq!(t.byte_size(), 0);
        assert_eq!(t.shape(), None);
        assert_eq!(t.partial_shape(), PartialShape::dynamic());
        assert!(matches!(t.as_slice::<f32>(), Err(TensorError::Unallocated)));

        let typed = TensorBuffer::shapeless(Some(ElementType::I32));
        assert!(matches!(typed.as_slice::<i32>(), Err(TensorError::Unallocated)));
        assert!(matches!(
            typed.as_slice::<f32>(),
            Err(TensorError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_resize() {
        let mut t = TensorBuffer::shapeless(None);
        t.resize(ElementType::I64, [3]).unwrap();
        assert_eq!(t.to_vec::<i64>().unwrap(), vec![0, 0, 0]);
        t.resize(ElementType::F64, [2, 2]).unwrap();
        assert_eq!(t.element_count(), 4);
        assert_eq!(t.element_type(), Some(ElementType::F64));
    }

    #[test]
    fn test_resize_after_consumed_fails() {
        let mut t = TensorBuffer::new(ElementType::F32, [2]);
        t.mark_consumed();
        assert_eq!(
            t.resize(ElementType::F32, [3]),
            Err(TensorError::InvalidResize)
        );
        assert_eq!(
            t.set_data(Shape::from([1]), vec![1.0f32]),
            Err(TensorError::InvalidResize)
        );
        assert_eq!(t.element_count(), 2);
        assert!(!t.clone().is_consumed());

        let mut detached = t.into_detached();
        assert!(!detached.is_consumed());
        detached.resize(ElementType::F32, [3]).unwrap();
    }

    #[test]
    fn test_from_vec_length_check() {
        let t = TensorBuffer::from_vec([2, 2], vec![1.0f64, 2.0, 3.0, 4.0]).unwrap();
        assert_relative_eq!(t.get::<f64>(3).unwrap(), 4.0);
        assert!(matches!(
            TensorBuffer::from_vec([3], vec![1i32, 2]),
            Err(TensorError::DataLength {
                expected: 3,
                got: 2
            })
        ));
    }

    #[test]
    fn test_index_out_of_range() {
        let mut t = TensorBuffer::filled([2], 7u8);
        assert!(matches!(
            t.get::<u8>(2),
            Err(TensorError::IndexOutOfRange { index: 2, len: 2 })
        ));
        assert!(t.set::<u8>(5, 1).is_err());
    }

    #[test]
    fn test_write_slice() {
        let mut t = TensorBuffer::new(ElementType::I32, [3]);
        t.write_slice(&[1, 2, 3]).unwrap();
        assert_eq!(t.to_vec::<i32>().unwrap(), vec![1, 2, 3]);
        assert!(t.write_slice(&[1, 2]).is_err());
    }

    #[test]
    fn test_to_i64_vec() {
        let t = TensorBuffer::from_vec([2], vec![-1i32, 4]).unwrap();
        assert_eq!(t.to_i64_vec().unwrap(), vec![-1, 4]);
        let f = TensorBuffer::scalar(1.0f32);
        assert!(matches!(
            f.to_i64_vec(),
            Err(TensorError::UnsupportedType(ElementType::F32))
        ));

        let wide = TensorBuffer::from_vec([2], vec![7u64, u64::MAX]).unwrap();
        assert!(matches!(
            wide.to_i64_vec(),
            Err(TensorError::IntegerOverflow(v)) if v == u64::MAX as i128
        ));
        let fits = TensorBuffer::scalar(i64::MAX as u64);
        assert_eq!(fits.to_i64_vec().unwrap(), vec![i64::MAX]);
    }

    #[test]
    fn test_reshape() {
        let t = TensorBuffer::from_vec([2, 3], vec![1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();
        let r = t.reshape([3, 2]).unwrap();
        assert_eq!(r.shape().unwrap().dims(), &[3, 2]);
        assert_eq!(r.to_vec::<f32>().unwrap(), t.to_vec::<f32>().unwrap());
        assert!(t.reshape([4]).is_err());
    }

    #[test]
    fn test_equality_ignores_consumption() {
        let a = TensorBuffer::scalar(3i64);
        let mut b = a.clone();
        b.mark_consumed();
        assert_eq!(a, b);
    }
}
