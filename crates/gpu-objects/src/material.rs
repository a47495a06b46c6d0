//! Material snapshots.
//!
//! A material input is either a constant, a sampler reference or a value read
//! from a geometric attribute. The value and the sampler index share storage,
//! so each parameter is its own small tagged union.

use bytemuck::{Pod, Zeroable};

use crate::DeviceObjectIndex;

#[repr(u32)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum MaterialParameterType {
    #[default]
    Unknown = 0,
    Value = 1,
    Sampler = 2,
    AttribColor = 3,
    Attrib0 = 4,
    Attrib1 = 5,
    Attrib2 = 6,
    Attrib3 = 7,
    WorldPosition = 8,
    WorldNormal = 9,
    ObjectPosition = 10,
    ObjectNormal = 11,
}

impl MaterialParameterType {
    pub const fn from_u32(v: u32) -> Self {
        match v {
            1 => Self::Value,
            2 => Self::Sampler,
            3 => Self::AttribColor,
            4 => Self::Attrib0,
            5 => Self::Attrib1,
            6 => Self::Attrib2,
            7 => Self::Attrib3,
            8 => Self::WorldPosition,
            9 => Self::WorldNormal,
            10 => Self::ObjectPosition,
            11 => Self::ObjectNormal,
            _ => Self::Unknown,
        }
    }

    /// Attribute source named by an ANARI-style attribute string.
    pub fn from_attribute_name(name: &str) -> Option<Self> {
        match name {
            "color" => Some(Self::AttribColor),
            "attribute0" => Some(Self::Attrib0),
            "attribute1" => Some(Self::Attrib1),
            "attribute2" => Some(Self::Attrib2),
            "attribute3" => Some(Self::Attrib3),
            "worldPosition" => Some(Self::WorldPosition),
            "worldNormal" => Some(Self::WorldNormal),
            "objectPosition" => Some(Self::ObjectPosition),
            "objectNormal" => Some(Self::ObjectNormal),
            _ => None,
        }
    }
}

/// One material input. Holds up to a `vec4` value.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct MaterialParameter {
    tag: u32,
    payload: [u32; 4],
}

impl MaterialParameter {
    pub fn value_vec4(v: [f32; 4]) -> Self {
        Self {
            tag: MaterialParameterType::Value as u32,
            payload: bytemuck::cast(v),
        }
    }

    pub fn value_f32(v: f32) -> Self {
        Self {
            tag: MaterialParameterType::Value as u32,
            payload: [v.to_bits(), 0, 0, 0],
        }
    }

    pub fn sampler(index: DeviceObjectIndex) -> Self {
        Self {
            tag: MaterialParameterType::Sampler as u32,
            payload: [index as u32, 0, 0, 0],
        }
    }

    /// Attribute-sourced input. `Value`, `Sampler` and `Unknown` are rejected.
    pub fn attribute(source: MaterialParameterType) -> Option<Self> {
        match source {
            MaterialParameterType::Value | MaterialParameterType::Sampler | MaterialParameterType::Unknown => None,
            other => Some(Self {
                tag: other as u32,
                payload: [0; 4],
            }),
        }
    }

    pub fn parameter_type(&self) -> MaterialParameterType {
        MaterialParameterType::from_u32(self.tag)
    }

    pub fn as_vec4(&self) -> Option<[f32; 4]> {
        (self.parameter_type() == MaterialParameterType::Value).then(|| bytemuck::cast(self.payload))
    }

    pub fn as_f32(&self) -> Option<f32> {
        (self.parameter_type() == MaterialParameterType::Value).then(|| f32::from_bits(self.payload[0]))
    }

    pub fn as_sampler(&self) -> Option<DeviceObjectIndex> {
        (self.parameter_type() == MaterialParameterType::Sampler).then(|| self.payload[0] as DeviceObjectIndex)
    }
}

#[repr(u32)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum AlphaMode {
    #[default]
    Opaque = 0,
    Blend = 1,
    Mask = 2,
}

impl AlphaMode {
    pub fn from_name(name: &str) -> Self {
        match name {
            "blend" => Self::Blend,
            "mask" => Self::Mask,
            _ => Self::Opaque,
        }
    }
}

#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct MaterialGpuData {
    pub base_color: MaterialParameter,
    pub opacity: MaterialParameter,
    pub cutoff: f32,
    /// [`AlphaMode`] as `u32`.
    pub mode: u32,
}

impl Default for MaterialGpuData {
    fn default() -> Self {
        Self {
            base_color: MaterialParameter::value_vec4([1.0; 4]),
            opacity: MaterialParameter::value_f32(1.0),
            cutoff: 0.5,
            mode: AlphaMode::Opaque as u32,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parameter_variants_are_exclusive() {
        let p = MaterialParameter::sampler(3);
        assert_eq!(p.as_sampler(), Some(3));
        assert_eq!(p.as_vec4(), None);

        let v = MaterialParameter::value_f32(0.25);
        assert_eq!(v.as_f32(), Some(0.25));
        assert_eq!(v.as_sampler(), None);

        assert!(MaterialParameter::attribute(MaterialParameterType::Sampler).is_none());
        let a = MaterialParameter::attribute(MaterialParameterType::Attrib2).unwrap();
        assert_eq!(a.parameter_type(), MaterialParameterType::Attrib2);
    }

    #[test]
    fn test_material_layout() {
        assert_eq!(std::mem::size_of::<MaterialGpuData>(), 48);
    }
}
