// bridge/array.rs - Borrowed, dtype-tagged byte buffers from a host runtime
//
// Host array libraries hand over raw bytes plus an element type. The bytes
// are reinterpreted as f32 with bytemuck, which checks alignment instead of
// assuming it.

use crate::error::{NoiseError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Element type of a host array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DType {
    #[serde(rename = "float32")]
    F32,
    #[serde(rename = "float64")]
    F64,
    #[serde(rename = "int32")]
    I32,
    #[serde(rename = "uint8")]
    U8,
}

impl DType {
    /// Bytes per element.
    pub fn itemsize(self) -> usize {
        match self {
            DType::F32 | DType::I32 => 4,
            DType::F64 => 8,
            DType::U8 => 1,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            DType::F32 => "float32",
            DType::F64 => "float64",
            DType::I32 => "int32",
            DType::U8 => "uint8",
        }
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Mutable view of a host array.
#[derive(Debug)]
pub struct ExternalArray<'a> {
    dtype: DType,
    bytes: &'a mut [u8],
}

impl<'a> ExternalArray<'a> {
    pub fn new(dtype: DType, bytes: &'a mut [u8]) -> Self {
        ExternalArray { dtype, bytes }
    }

    /// View of an already-typed f32 slice.
    pub fn from_f32(data: &'a mut [f32]) -> Self {
        ExternalArray {
            dtype: DType::F32,
            bytes: bytemuck::cast_slice_mut(data),
        }
    }

    pub fn dtype(&self) -> DType {
        self.dtype
    }

    /// Number of whole elements.
    pub fn len(&self) -> usize {
        self.bytes.len() / self.dtype.itemsize()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The elements as f32. Trailing bytes that do not fill an element are
    /// left out.
    pub fn as_f32_mut(&mut self) -> Result<&mut [f32]> {
        if self.dtype != DType::F32 {
            return Err(NoiseError::TypeMismatch { found: self.dtype });
        }
        let whole = self.len() * DType::F32.itemsize();
        if whole == 0 {
            return Ok(&mut []);
        }
        bytemuck::try_cast_slice_mut(&mut self.bytes[..whole]).map_err(|_| NoiseError::Misaligned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dtype_names_and_sizes() {
        assert_eq!(DType::F32.to_string(), "float32");
        assert_eq!(DType::U8.itemsize(), 1);
        assert_eq!(DType::F64.itemsize(), 8);
        assert_eq!(serde_json::to_string(&DType::I32).unwrap(), "\"int32\"");
        let parsed: DType = serde_json::from_str("\"float64\"").unwrap();
        assert_eq!(parsed, DType::F64);
    }

    #[test]
    fn f32_view_round_trips() {
        let mut data = [1.0f32, 2.0, 3.0];
        let mut array = ExternalArray::from_f32(&mut data);
        assert_eq!(array.len(), 3);
        array.as_f32_mut().unwrap()[1] = 9.0;
        assert_eq!(data, [1.0, 9.0, 3.0]);
    }

    #[test]
    fn wrong_dtype_rejected() {
        let mut bytes = [0u8; 16];
        let mut array = ExternalArray::new(DType::F64, &mut bytes);
        assert_eq!(array.len(), 2);
        assert!(matches!(
            array.as_f32_mut(),
            Err(NoiseError::TypeMismatch { found: DType::F64 })
        ));
    }

    #[test]
    fn misaligned_bytes_rejected() {
        let mut backing = [0.0f32; 4];
        let bytes: &mut [u8] = bytemuck::cast_slice_mut(&mut backing);
        let mut array = ExternalArray::new(DType::F32, &mut bytes[1..13]);
        assert_eq!(array.len(), 3);
        assert!(matches!(array.as_f32_mut(), Err(NoiseError::Misaligned)));
    }

    #[test]
    fn trailing_bytes_ignored() {
        let mut backing = [0.0f32; 2];
        let bytes: &mut [u8] = bytemuck::cast_slice_mut(&mut backing);
        let mut array = ExternalArray::new(DType::F32, &mut bytes[..7]);
        assert_eq!(array.as_f32_mut().unwrap().len(), 1);
    }

    #[test]
    fn empty_array() {
        let mut empty: [u8; 0] = [];
        let mut array = ExternalArray::new(DType::F32, &mut empty);
        assert!(array.is_empty());
        assert!(array.as_f32_mut().unwrap().is_empty());
    }
}
