//! Geometry snapshots.

use bytemuck::{Pod, Zeroable};

use crate::payload::tagged_payload;
use crate::{AttributePtr, DevicePtr, NUM_ATTRIBUTES};

/// Indexed triangle mesh.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct TriangleGeometryData {
    /// `uvec3` per triangle, null for unindexed soups.
    pub indices: DevicePtr,
    pub vertices: DevicePtr,
    pub vertex_normals: DevicePtr,
    pub vertex_normal_indices: DevicePtr,
    /// attribute0-3 + color
    pub vertex_attr: [AttributePtr; NUM_ATTRIBUTES],
    pub vertex_attr_indices: [DevicePtr; NUM_ATTRIBUTES],
}

/// Quad mesh, stored as the derived triangle index buffer.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct QuadGeometryData {
    /// Derived `uvec3` triangles, two per quad.
    pub indices: DevicePtr,
    pub vertices: DevicePtr,
    pub vertex_normals: DevicePtr,
    pub vertex_normal_indices: DevicePtr,
    pub vertex_attr: [AttributePtr; NUM_ATTRIBUTES],
    pub vertex_attr_indices: [DevicePtr; NUM_ATTRIBUTES],
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct CylinderGeometryData {
    /// `uvec2` per cylinder.
    pub indices: DevicePtr,
    pub vertices: DevicePtr,
    /// Per-primitive radii, null when the global radius applies.
    pub radii: DevicePtr,
    pub vertex_attr: [AttributePtr; NUM_ATTRIBUTES],
    pub radius: f32,
    pub caps: u32,
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct ConeGeometryData {
    pub indices: DevicePtr,
    pub vertices: DevicePtr,
    /// Per-vertex radii.
    pub radii: DevicePtr,
    pub vertex_attr: [AttributePtr; NUM_ATTRIBUTES],
    pub caps: u32,
    pub _pad: u32,
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct CurveGeometryData {
    /// Segment start indices.
    pub indices: DevicePtr,
    pub vertices: DevicePtr,
    /// Per-vertex radii (always populated).
    pub radii: DevicePtr,
    pub vertex_attr: [AttributePtr; NUM_ATTRIBUTES],
    pub radius: f32,
    pub _pad: u32,
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct SphereGeometryData {
    pub indices: DevicePtr,
    pub centers: DevicePtr,
    pub radii: DevicePtr,
    pub vertex_attr: [AttributePtr; NUM_ATTRIBUTES],
    pub radius: f32,
    pub _pad: u32,
}

tagged_payload! {
    /// Kind-specific geometry payload.
    GeometryPayload, GeometryType, words = 19 {
        Triangle(TriangleGeometryData) = 1,
        Quad(QuadGeometryData) = 2,
        Cylinder(CylinderGeometryData) = 3,
        Curve(CurveGeometryData) = 4,
        Cone(ConeGeometryData) = 5,
        Sphere(SphereGeometryData) = 6,
    }
}

/// Geometry snapshot consumed by intersection and shading kernels.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct GeometryGpuData {
    tag: u32,
    _pad: u32,
    /// Per-primitive attributes (attribute0-3 + color).
    pub primitive_attr: [AttributePtr; NUM_ATTRIBUTES],
    payload: [u64; 19],
}

impl GeometryGpuData {
    pub fn new(primitive_attr: [AttributePtr; NUM_ATTRIBUTES], payload: GeometryPayload) -> Self {
        Self {
            tag: payload.tag() as u32,
            _pad: 0,
            primitive_attr,
            payload: payload.encode(),
        }
    }

    pub fn geometry_type(&self) -> GeometryType {
        GeometryType::from_u32(self.tag)
    }

    /// Decode the payload; `None` for an unknown discriminator.
    pub fn payload(&self) -> Option<GeometryPayload> {
        GeometryPayload::decode(self.tag, &self.payload)
    }

    pub fn as_quad(&self) -> Option<QuadGeometryData> {
        match self.payload()? {
            GeometryPayload::Quad(q) => Some(q),
            _ => None,
        }
    }

    pub fn as_triangle(&self) -> Option<TriangleGeometryData> {
        match self.payload()? {
            GeometryPayload::Triangle(t) => Some(t),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_geometry_layout() {
        assert_eq!(std::mem::size_of::<TriangleGeometryData>(), 152);
        assert_eq!(std::mem::size_of::<GeometryGpuData>(), 240);
        assert_eq!(std::mem::align_of::<GeometryGpuData>(), 8);
    }

    #[test]
    fn test_tag_matches_payload() {
        let quad = QuadGeometryData {
            indices: 0x1000,
            vertices: 0x2000,
            ..Default::default()
        };
        let g = GeometryGpuData::new([AttributePtr::NONE; NUM_ATTRIBUTES], GeometryPayload::Quad(quad));
        assert_eq!(g.geometry_type(), GeometryType::Quad);
        assert_eq!(g.as_quad(), Some(quad));
        assert_eq!(g.as_triangle(), None);
    }

    #[test]
    fn test_zeroed_snapshot_has_no_payload() {
        let g: GeometryGpuData = bytemuck::Zeroable::zeroed();
        assert_eq!(g.geometry_type(), GeometryType::Unknown);
        assert!(g.payload().is_none());
    }
}
