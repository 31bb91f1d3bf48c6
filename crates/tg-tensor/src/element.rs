//! Native Rust types that can be read from and written to a [`TensorBuffer`].
//!
//! [`TensorBuffer`]: crate::TensorBuffer

use std::fmt::Debug;

use half::f16;

use crate::dtype::ElementType;
use crate::storage::HostStorage;

/// A native scalar type corresponding to exactly one [`ElementType`].
pub trait Element: Copy + PartialOrd + Debug + Send + Sync + 'static {
    const TYPE: ElementType;

    /// Borrows the storage as `&[Self]`, or `None` if it holds another type.
    fn slice(storage: &HostStorage) -> Option<&[Self]>;

    fn slice_mut(storage: &mut HostStorage) -> Option<&mut [Self]>;

    fn into_storage(data: Vec<Self>) -> HostStorage;

    fn to_f64(self) -> f64;

    /// Saturating conversion from `f64`.
    fn from_f64(v: f64) -> Self;

    /// Floats truncate toward zero.
    fn to_i128(self) -> i128;

    /// Wrapping conversion, matching an `as` cast.
    fn from_i128(v: i128) -> Self;
}

/// Element types that support arithmetic.
pub trait Numeric: Element {
    /// Integer addition wraps; float addition is IEEE.
    fn wrapping_add(self, rhs: Self) -> Self;
}

macro_rules! impl_storage_access {
    ($ty:ty, $variant:ident) => {
        const TYPE: ElementType = ElementType::$variant;

        fn slice(storage: &HostStorage) -> Option<&[Self]> {
            match storage {
                HostStorage::$variant(v) => Some(v.as_slice()),
                _ => None,
            }
        }

        fn slice_mut(storage: &mut HostStorage) -> Option<&mut [Self]> {
            match storage {
                HostStorage::$variant(v) => Some(v.as_mut_slice()),
                _ => None,
            }
        }

        fn into_storage(data: Vec<Self>) -> HostStorage {
            HostStorage::$variant(data)
        }
    };
}

macro_rules! impl_primitive {
    ($ty:ty, $variant:ident, int) => {
        impl Element for $ty {
            impl_storage_access!($ty, $variant);

            fn to_f64(self) -> f64 {
                self as f64
            }

            fn from_f64(v: f64) -> Self {
                v as $ty
            }

            fn to_i128(self) -> i128 {
                self as i128
            }

            fn from_i128(v: i128) -> Self {
                v as $ty
            }
        }

        impl Numeric for $ty {
            fn wrapping_add(self, rhs: Self) -> Self {
                <$ty>::wrapping_add(self, rhs)
            }
        }
    };
    ($ty:ty, $variant:ident, float) => {
        impl Element for $ty {
            impl_storage_access!($ty, $variant);

            fn to_f64(self) -> f64 {
                self as f64
            }

            fn from_f64(v: f64) -> Self {
                v as $ty
            }

            fn to_i128(self) -> i128 {
                self as i128
            }

            fn from_i128(v: i128) -> Self {
                v as $ty
            }
        }

        impl Numeric for $ty {
            fn wrapping_add(self, rhs: Self) -> Self {
                self + rhs
            }
        }
    };
}

impl_primitive!(f32, F32, float);
impl_primitive!(f64, F64, float);
impl_primitive!(i8, I8, int);
impl_primitive!(i16, I16, int);
impl_primitive!(i32, I32, int);
impl_primitive!(i64, I64, int);
impl_primitive!(u8, U8, int);
impl_primitive!(u16, U16, int);
impl_primitive!(u32, U32, int);
impl_primitive!(u64, U64, int);

impl Element for f16 {
    impl_storage_access!(f16, F16);

    fn to_f64(self) -> f64 {
        f16::to_f64(self)
    }

    fn from_f64(v: f64) -> Self {
        f16::from_f64(v)
    }

    fn to_i128(self) -> i128 {
        f16::to_f64(self) as i128
    }

    fn from_i128(v: i128) -> Self {
        f16::from_f64(v as f64)
    }
}

impl Numeric for f16 {
    fn wrapping_add(self, rhs: Self) -> Self {
        self + rhs
    }
}

impl Element for bool {
    impl_storage_access!(bool, Boolean);

    fn to_f64(self) -> f64 {
        if self {
            1.0
        } else {
            0.0
        }
    }

    fn from_f64(v: f64) -> Self {
        v != 0.0
    }

    fn to_i128(self) -> i128 {
        self as i128
    }

    fn from_i128(v: i128) -> Self {
        v != 0
    }
}

/// Calls a generic function monomorphized for the native type of a runtime
/// [`ElementType`]: `dispatch_element!(ety, f(a, b))` expands to `f::<T>(a, b)`.
#[macro_export]
macro_rules! dispatch_element {
    ($ety:expr, $func:ident ( $($arg:expr),* $(,)? )) => {
        match $ety {
            $crate::ElementType::Boolean => $func::<bool>($($arg),*),
            $crate::ElementType::F16 => $func::<$crate::half::f16>($($arg),*),
            $crate::ElementType::F32 => $func::<f32>($($arg),*),
            $crate::ElementType::F64 => $func::<f64>($($arg),*),
            $crate::ElementType::I8 => $func::<i8>($($arg),*),
            $crate::ElementType::I16 => $func::<i16>($($arg),*),
            $crate::ElementType::I32 => $func::<i32>($($arg),*),
            $crate::ElementType::I64 => $func::<i64>($($arg),*),
            $crate::ElementType::U8 => $func::<u8>($($arg),*),
            $crate::ElementType::U16 => $func::<u16>($($arg),*),
            $crate::ElementType::U32 => $func::<u32>($($arg),*),
            $crate::ElementType::U64 => $func::<u64>($($arg),*),
        }
    };
}

/// Like [`dispatch_element!`] but restricted to [`Numeric`] types. The
/// function must return a `Result` whose error type converts from
/// [`TensorError`](crate::TensorError); booleans yield `UnsupportedType`.
#[macro_export]
macro_rules! dispatch_numeric {
    ($ety:expr, $func:ident ( $($arg:expr),* $(,)? )) => {
        match $ety {
            $crate::ElementType::F16 => $func::<$crate::half::f16>($($arg),*),
            $crate::ElementType::F32 => $func::<f32>($($arg),*),
            $crate::ElementType::F64 => $func::<f64>($($arg),*),
            $crate::ElementType::I8 => $func::<i8>($($arg),*),
            $crate::ElementType::I16 => $func::<i16>($($arg),*),
            $crate::ElementType::I32 => $func::<i32>($($arg),*),
            $crate::ElementType::I64 => $func::<i64>($($arg),*),
            $crate::ElementType::U8 => $func::<u8>($($arg),*),
            $crate::ElementType::U16 => $func::<u16>($($arg),*),
            $crate::ElementType::U32 => $func::<u32>($($arg),*),
            $crate::ElementType::U64 => $func::<u64>($($arg),*),
            other => Err(::core::convert::From::from(
                $crate::TensorError::UnsupportedType(other),
            )),
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Result, TensorError};

    #[test]
    fn test_slice_projection() {
        let mut s = f32::into_storage(vec![1.0, 2.0]);
        assert_eq!(f32::slice(&s), Some(&[1.0f32, 2.0][..]));
        assert!(f64::slice(&s).is_none());
        assert!(i32::slice(&s).is_none());
        f32::slice_mut(&mut s).unwrap()[1] = 5.0;
        assert_eq!(s, HostStorage::F32(vec![1.0, 5.0]));
    }

    #[test]
    fn test_conversions() {
        assert_eq!(<i8 as Element>::from_i128(300), 44);
        assert_eq!(<u8 as Element>::from_f64(-3.0), 0);
        assert_eq!(<f32 as Element>::to_i128(-2.7), -2);
        assert_eq!(true.to_i128(), 1);
        assert!(<bool as Element>::from_f64(0.5));
        assert_eq!(Element::to_f64(f16::from_f32(1.5)), 1.5);
    }

    #[test]
    fn test_wrapping_add() {
        assert_eq!(Numeric::wrapping_add(250u8, 10u8), 4);
        assert_eq!(Numeric::wrapping_add(1.5f64, 2.0), 3.5);
    }

    fn type_of<T: Element>() -> ElementType {
        T::TYPE
    }

    fn zero_of<T: Numeric>() -> Result<f64> {
        Ok(T::from_f64(0.0).to_f64())
    }

    #[test]
    fn test_dispatch_element() {
        for ety in ElementType::ALL {
            assert_eq!(dispatch_element!(ety, type_of()), ety);
        }
    }

    #[test]
    fn test_dispatch_numeric_rejects_boolean() {
        assert_eq!(dispatch_numeric!(ElementType::I16, zero_of()), Ok(0.0));
        assert_eq!(
            dispatch_numeric!(ElementType::Boolean, zero_of()),
            Err(TensorError::UnsupportedType(ElementType::Boolean))
        );
    }
}
