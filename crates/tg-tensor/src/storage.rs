use half::f16;

use crate::dtype::ElementType;

/// Host-side tensor storage, one variant per element type.
#[derive(Debug, Clone, PartialEq)]
pub enum HostStorage {
    Boolean(Vec<bool>),
    F16(Vec<f16>),
    F32(Vec<f32>),
    F64(Vec<f64>),
    I8(Vec<i8>),
    I16(Vec<i16>),
    I32(Vec<i32>),
    I64(Vec<i64>),
    U8(Vec<u8>),
    U16(Vec<u16>),
    U32(Vec<u32>),
    U64(Vec<u64>),
}

macro_rules! for_each_variant {
    ($storage:expr, $v:ident => $body:expr) => {
        match $storage {
            HostStorage::Boolean($v) => $body,
            HostStorage::F16($v) => $body,
            HostStorage::F32($v) => $body,
            HostStorage::F64($v) => $body,
            HostStorage::I8($v) => $body,
            HostStorage::I16($v) => $body,
            HostStorage::I32($v) => $body,
            HostStorage::I64($v) => $body,
            HostStorage::U8($v) => $body,
            HostStorage::U16($v) => $body,
            HostStorage::U32($v) => $body,
            HostStorage::U64($v) => $body,
        }
    };
}

impl HostStorage {
    /// Number of elements in this storage.
    pub fn len(&self) -> usize {
        for_each_variant!(self, v => v.len())
    }

    /// Returns true if the storage contains no elements.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Create zero-filled storage for the given element type and count.
    pub fn zeros(element_type: ElementType, n: usize) -> Self {
        match element_type {
            ElementType::Boolean => HostStorage::Boolean(vec![false; n]),
            ElementType::F16 => HostStorage::F16(vec![f16::ZERO; n]),
            ElementType::F32 => HostStorage::F32(vec![0.0; n]),
            ElementType::F64 => HostStorage::F64(vec![0.0; n]),
            ElementType::I8 => HostStorage::I8(vec![0; n]),
            ElementType::I16 => HostStorage::I16(vec![0; n]),
            ElementType::I32 => HostStorage::I32(vec![0; n]),
            ElementType::I64 => HostStorage::I64(vec![0; n]),
            ElementType::U8 => HostStorage::U8(vec![0; n]),
            ElementType::U16 => HostStorage::U16(vec![0; n]),
            ElementType::U32 => HostStorage::U32(vec![0; n]),
            ElementType::U64 => HostStorage::U64(vec![0; n]),
        }
    }

    /// Returns the element type of this storage.
    pub fn element_type(&self) -> ElementType {
        match self {
            HostStorage::Boolean(_) => ElementType::Boolean,
            HostStorage::F16(_) => ElementType::F16,
            HostStorage::F32(_) => ElementType::F32,
            HostStorage::F64(_) => ElementType::F64,
            HostStorage::I8(_) => ElementType::I8,
            HostStorage::I16(_) => ElementType::I16,
            HostStorage::I32(_) => ElementType::I32,
            HostStorage::I64(_) => ElementType::I64,
            HostStorage::U8(_) => ElementType::U8,
            HostStorage::U16(_) => ElementType::U16,
            HostStorage::U32(_) => ElementType::U32,
            HostStorage::U64(_) => ElementType::U64,
        }
    }

    /// Size of the storage in bytes.
    pub fn byte_size(&self) -> usize {
        self.len() * self.element_type().size_in_bytes()
    }
}
