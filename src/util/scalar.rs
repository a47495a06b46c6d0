//! Scalar element types stored in arrays.

use half::f16;
use std::fmt;

/// Scalar storage type of one array component.
///
/// Fixed-point types (`UFIXED*`, `FIXED*`) are integers that represent values
/// in `[0, 1]` or `[-1, 1]` once divided by their maximum.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum ScalarType {
    Uint8 = 1,
    Int8 = 2,
    Uint16 = 3,
    Int16 = 4,
    Uint32 = 5,
    Int32 = 6,
    Uint64 = 7,
    Int64 = 8,
    Float16 = 9,
    Float32 = 10,
    Float64 = 11,
    Ufixed8 = 12,
    Fixed8 = 13,
    Ufixed16 = 14,
    Fixed16 = 15,
    /// Unknown/invalid type
    #[default]
    Unknown = 127,
}

impl ScalarType {
    /// Returns the size in bytes of a single component.
    #[inline]
    pub const fn num_bytes(self) -> usize {
        match self {
            Self::Uint8 | Self::Int8 | Self::Ufixed8 | Self::Fixed8 => 1,
            Self::Uint16 | Self::Int16 | Self::Ufixed16 | Self::Fixed16 | Self::Float16 => 2,
            Self::Uint32 | Self::Int32 | Self::Float32 => 4,
            Self::Uint64 | Self::Int64 | Self::Float64 => 8,
            Self::Unknown => 0,
        }
    }

    /// Returns the type name as used in parameter strings.
    #[inline]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Uint8 => "UINT8",
            Self::Int8 => "INT8",
            Self::Uint16 => "UINT16",
            Self::Int16 => "INT16",
            Self::Uint32 => "UINT32",
            Self::Int32 => "INT32",
            Self::Uint64 => "UINT64",
            Self::Int64 => "INT64",
            Self::Float16 => "FLOAT16",
            Self::Float32 => "FLOAT32",
            Self::Float64 => "FLOAT64",
            Self::Ufixed8 => "UFIXED8",
            Self::Fixed8 => "FIXED8",
            Self::Ufixed16 => "UFIXED16",
            Self::Fixed16 => "FIXED16",
            Self::Unknown => "UNKNOWN",
        }
    }

    /// Parse a scalar type from its name.
    pub fn from_name(name: &str) -> Self {
        match name {
            "UINT8" => Self::Uint8,
            "INT8" => Self::Int8,
            "UINT16" => Self::Uint16,
            "INT16" => Self::Int16,
            "UINT32" => Self::Uint32,
            "INT32" => Self::Int32,
            "UINT64" => Self::Uint64,
            "INT64" => Self::Int64,
            "FLOAT16" => Self::Float16,
            "FLOAT32" => Self::Float32,
            "FLOAT64" => Self::Float64,
            "UFIXED8" => Self::Ufixed8,
            "FIXED8" => Self::Fixed8,
            "UFIXED16" => Self::Ufixed16,
            "FIXED16" => Self::Fixed16,
            _ => Self::Unknown,
        }
    }

    #[inline]
    pub const fn is_integer(self) -> bool {
        matches!(
            self,
            Self::Uint8
                | Self::Int8
                | Self::Uint16
                | Self::Int16
                | Self::Uint32
                | Self::Int32
                | Self::Uint64
                | Self::Int64
        )
    }

    #[inline]
    pub const fn is_float(self) -> bool {
        matches!(self, Self::Float16 | Self::Float32 | Self::Float64)
    }

    #[inline]
    pub const fn is_fixed_point(self) -> bool {
        matches!(self, Self::Ufixed8 | Self::Fixed8 | Self::Ufixed16 | Self::Fixed16)
    }

    /// Largest representable value of the underlying integer storage.
    ///
    /// `None` for floating point types.
    pub const fn max_value(self) -> Option<f32> {
        match self {
            Self::Uint8 | Self::Ufixed8 => Some(u8::MAX as f32),
            Self::Int8 | Self::Fixed8 => Some(i8::MAX as f32),
            Self::Uint16 | Self::Ufixed16 => Some(u16::MAX as f32),
            Self::Int16 | Self::Fixed16 => Some(i16::MAX as f32),
            Self::Uint32 => Some(u32::MAX as f32),
            Self::Int32 => Some(i32::MAX as f32),
            Self::Uint64 => Some(u64::MAX as f32),
            Self::Int64 => Some(i64::MAX as f32),
            Self::Float16 | Self::Float32 | Self::Float64 | Self::Unknown => None,
        }
    }

    /// Decode one component as its raw numeric value (no normalization).
    ///
    /// `bytes` must hold exactly [`num_bytes`](Self::num_bytes) bytes.
    pub fn decode_f32(self, bytes: &[u8]) -> Option<f32> {
        if bytes.len() != self.num_bytes() || self == Self::Unknown {
            return None;
        }
        let v = match self {
            Self::Uint8 | Self::Ufixed8 => bytes[0] as f32,
            Self::Int8 | Self::Fixed8 => bytes[0] as i8 as f32,
            Self::Uint16 | Self::Ufixed16 => u16::from_ne_bytes([bytes[0], bytes[1]]) as f32,
            Self::Int16 | Self::Fixed16 => i16::from_ne_bytes([bytes[0], bytes[1]]) as f32,
            Self::Uint32 => bytemuck::pod_read_unaligned::<u32>(bytes) as f32,
            Self::Int32 => bytemuck::pod_read_unaligned::<i32>(bytes) as f32,
            Self::Uint64 => bytemuck::pod_read_unaligned::<u64>(bytes) as f32,
            Self::Int64 => bytemuck::pod_read_unaligned::<i64>(bytes) as f32,
            Self::Float16 => f16::from_bits(u16::from_ne_bytes([bytes[0], bytes[1]])).to_f32(),
            Self::Float32 => bytemuck::pod_read_unaligned::<f32>(bytes),
            Self::Float64 => bytemuck::pod_read_unaligned::<f64>(bytes) as f32,
            Self::Unknown => return None,
        };
        Some(v)
    }

    /// Decode one component, dividing fixed-point storage by its maximum.
    pub fn decode_normalized(self, bytes: &[u8]) -> Option<f32> {
        let raw = self.decode_f32(bytes)?;
        match (self.is_fixed_point(), self.max_value()) {
            (true, Some(max)) => Some((raw / max).max(-1.0)),
            _ => Some(raw),
        }
    }
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_sizes() {
        assert_eq!(ScalarType::Uint8.num_bytes(), 1);
        assert_eq!(ScalarType::Fixed16.num_bytes(), 2);
        assert_eq!(ScalarType::Float64.num_bytes(), 8);
        assert_eq!(ScalarType::Unknown.num_bytes(), 0);
    }

    #[test]
    fn test_name_roundtrip() {
        for t in [ScalarType::Uint8, ScalarType::Ufixed16, ScalarType::Float16, ScalarType::Int64] {
            assert_eq!(ScalarType::from_name(t.name()), t);
        }
        assert_eq!(ScalarType::from_name("VEC3"), ScalarType::Unknown);
    }

    #[test]
    fn test_decode() {
        assert_eq!(ScalarType::Uint8.decode_f32(&[200]), Some(200.0));
        assert_eq!(ScalarType::Ufixed8.decode_normalized(&[255]), Some(1.0));
        assert_eq!(ScalarType::Int16.decode_f32(&(-3i16).to_ne_bytes()), Some(-3.0));
        let h = f16::from_f32(0.5).to_bits().to_ne_bytes();
        assert_eq!(ScalarType::Float16.decode_f32(&h), Some(0.5));
        assert_eq!(ScalarType::Float32.decode_f32(&[0, 0]), None);
    }

    #[test]
    fn test_fixed16_normalization_is_signed() {
        let v = ScalarType::Fixed16.decode_normalized(&i16::MIN.to_ne_bytes()).unwrap();
        assert_eq!(v, -1.0);
    }
}
