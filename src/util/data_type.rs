//! DataType - scalar type plus component count.

use super::ScalarType;
use std::fmt;

/// Element type of an array or framebuffer channel.
///
/// Named the way parameter strings spell them: `FLOAT32`, `FLOAT32_VEC3`,
/// `UINT32_VEC4`, `UFIXED8_RGBA_SRGB`.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct DataType {
    pub scalar: ScalarType,
    /// 1 for scalars, 2-4 for vectors.
    pub components: u8,
    /// Color data stored with the sRGB transfer curve.
    pub srgb: bool,
}

impl DataType {
    #[inline]
    pub const fn new(scalar: ScalarType, components: u8) -> Self {
        Self {
            scalar,
            components,
            srgb: false,
        }
    }

    #[inline]
    pub const fn scalar(scalar: ScalarType) -> Self {
        Self::new(scalar, 1)
    }

    /// Size in bytes of one element.
    #[inline]
    pub const fn num_bytes(&self) -> usize {
        self.scalar.num_bytes() * self.components as usize
    }

    #[inline]
    pub const fn is_valid(&self) -> bool {
        !matches!(self.scalar, ScalarType::Unknown) && self.components > 0 && self.components <= 4
    }

    /// Compact numeric code stored in device-side attribute descriptors.
    #[inline]
    pub const fn code(&self) -> u32 {
        ((self.scalar as u32) << 8) | ((self.srgb as u32) << 4) | self.components as u32
    }

    pub const UNKNOWN: Self = Self::new(ScalarType::Unknown, 0);

    pub const UINT8: Self = Self::scalar(ScalarType::Uint8);
    pub const INT16: Self = Self::scalar(ScalarType::Int16);
    pub const UINT16: Self = Self::scalar(ScalarType::Uint16);
    pub const UINT32: Self = Self::scalar(ScalarType::Uint32);
    pub const INT32: Self = Self::scalar(ScalarType::Int32);
    pub const UFIXED8: Self = Self::scalar(ScalarType::Ufixed8);
    pub const FIXED16: Self = Self::scalar(ScalarType::Fixed16);
    pub const UFIXED16: Self = Self::scalar(ScalarType::Ufixed16);
    pub const FLOAT16: Self = Self::scalar(ScalarType::Float16);
    pub const FLOAT32: Self = Self::scalar(ScalarType::Float32);
    pub const FLOAT64: Self = Self::scalar(ScalarType::Float64);

    pub const FLOAT32_VEC2: Self = Self::new(ScalarType::Float32, 2);
    pub const FLOAT32_VEC3: Self = Self::new(ScalarType::Float32, 3);
    pub const FLOAT32_VEC4: Self = Self::new(ScalarType::Float32, 4);

    pub const UINT32_VEC2: Self = Self::new(ScalarType::Uint32, 2);
    pub const UINT32_VEC3: Self = Self::new(ScalarType::Uint32, 3);
    pub const UINT32_VEC4: Self = Self::new(ScalarType::Uint32, 4);

    pub const UFIXED8_VEC4: Self = Self::new(ScalarType::Ufixed8, 4);
    pub const UFIXED8_RGBA_SRGB: Self = Self {
        scalar: ScalarType::Ufixed8,
        components: 4,
        srgb: true,
    };

    /// Parse a type name such as `FLOAT32_VEC3`.
    pub fn from_name(name: &str) -> Self {
        if name == "UFIXED8_RGBA_SRGB" {
            return Self::UFIXED8_RGBA_SRGB;
        }
        let (base, components) = match name.rsplit_once("_VEC") {
            Some((base, n)) => match n.parse::<u8>() {
                Ok(n @ 2..=4) => (base, n),
                _ => return Self::UNKNOWN,
            },
            None => (name, 1),
        };
        match ScalarType::from_name(base) {
            ScalarType::Unknown => Self::UNKNOWN,
            scalar => Self::new(scalar, components),
        }
    }

    /// Canonical name, the inverse of [`from_name`](Self::from_name).
    pub fn name(&self) -> String {
        if self.srgb && self.components == 4 && self.scalar == ScalarType::Ufixed8 {
            return "UFIXED8_RGBA_SRGB".to_string();
        }
        match self.components {
            1 => self.scalar.name().to_string(),
            n => format!("{}_VEC{}", self.scalar.name(), n),
        }
    }
}

impl Default for DataType {
    fn default() -> Self {
        Self::UNKNOWN
    }
}

impl fmt::Debug for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}
