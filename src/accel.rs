//! Acceleration-structure build inputs.
//!
//! Geometries describe their committed device buffers with a [`BuildInput`];
//! groups and worlds hand those to [`Device::build_accel`]. Inputs only hold
//! device addresses, so they stay valid exactly as long as the committed
//! state of the object that produced them.
//!
//! [`Device::build_accel`]: crate::device::Device::build_accel

use bytemuck::{Pod, Zeroable};
use gpu_objects::{DevicePtr, TraversableHandle};

use crate::util::Mat4;

/// Shader binding table records per geometry input. No per-primitive
/// material split happens at this layer.
pub const SBT_RECORDS_PER_INPUT: u32 = 1;

/// Per-input geometry flags.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct GeometryFlags(u32);

impl GeometryFlags {
    pub const NONE: Self = Self(0);
    pub const DISABLE_ANYHIT: Self = Self(1);
    pub const REQUIRE_SINGLE_ANYHIT_CALL: Self = Self(2);

    #[inline]
    pub const fn bits(self) -> u32 {
        self.0
    }

    #[inline]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct TriangleArrayInput {
    pub vertex_buffer: DevicePtr,
    pub vertex_stride: u32,
    pub num_vertices: u32,
    /// Null for unindexed soups.
    pub index_buffer: DevicePtr,
    pub index_stride: u32,
    pub num_index_triplets: u32,
    pub flags: GeometryFlags,
    pub num_sbt_records: u32,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CurveType {
    #[default]
    RoundLinear,
}

#[derive(Clone, Debug, PartialEq)]
pub struct CurveArrayInput {
    pub curve_type: CurveType,
    pub num_primitives: u32,
    pub vertex_buffer: DevicePtr,
    pub vertex_stride: u32,
    pub num_vertices: u32,
    pub width_buffer: DevicePtr,
    pub width_stride: u32,
    /// One `u32` segment start per primitive.
    pub index_buffer: DevicePtr,
    pub index_stride: u32,
    pub flags: GeometryFlags,
    pub num_sbt_records: u32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct CustomPrimitiveArrayInput {
    /// `[min.xyz, max.xyz]` per primitive.
    pub aabb_buffer: DevicePtr,
    pub stride: u32,
    pub num_primitives: u32,
    pub flags: GeometryFlags,
    pub num_sbt_records: u32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct InstanceArrayInput {
    /// Array of [`AccelInstance`].
    pub instances: DevicePtr,
    pub num_instances: u32,
}

#[derive(Clone, Debug, PartialEq)]
pub enum BuildInput {
    Triangles(TriangleArrayInput),
    Curves(CurveArrayInput),
    CustomPrimitives(CustomPrimitiveArrayInput),
    Instances(InstanceArrayInput),
}

/// Which bottom-level structure a geometry input belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PrimitiveClass {
    Triangles,
    Curves,
    Custom,
}

impl PrimitiveClass {
    pub const ALL: [Self; 3] = [Self::Triangles, Self::Curves, Self::Custom];
}

impl BuildInput {
    pub fn num_primitives(&self) -> u32 {
        match self {
            Self::Triangles(t) if t.index_buffer != 0 => t.num_index_triplets,
            Self::Triangles(t) => t.num_vertices / 3,
            Self::Curves(c) => c.num_primitives,
            Self::CustomPrimitives(c) => c.num_primitives,
            Self::Instances(i) => i.num_instances,
        }
    }

    /// `None` for instance inputs.
    pub fn class(&self) -> Option<PrimitiveClass> {
        match self {
            Self::Triangles(_) => Some(PrimitiveClass::Triangles),
            Self::Curves(_) => Some(PrimitiveClass::Curves),
            Self::CustomPrimitives(_) => Some(PrimitiveClass::Custom),
            Self::Instances(_) => None,
        }
    }

    pub fn flags(&self) -> GeometryFlags {
        match self {
            Self::Triangles(t) => t.flags,
            Self::Curves(c) => c.flags,
            Self::CustomPrimitives(c) => c.flags,
            Self::Instances(_) => GeometryFlags::NONE,
        }
    }

    pub fn num_sbt_records(&self) -> u32 {
        match self {
            Self::Triangles(t) => t.num_sbt_records,
            Self::Curves(c) => c.num_sbt_records,
            Self::CustomPrimitives(c) => c.num_sbt_records,
            Self::Instances(_) => 0,
        }
    }
}

/// Instance record read by instance-level builds.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct AccelInstance {
    /// Row-major 3x4 object-to-world transform.
    pub transform: [f32; 12],
    pub instance_id: u32,
    /// First surface of this record inside the instance's surface list.
    pub sbt_offset: u32,
    pub visibility_mask: u32,
    pub flags: u32,
    pub traversable: TraversableHandle,
    pub _pad: [u32; 2],
}

impl AccelInstance {
    pub fn new(transform: &Mat4, instance_id: u32, sbt_offset: u32, traversable: TraversableHandle) -> Self {
        Self {
            transform: row_major_3x4(transform),
            instance_id,
            sbt_offset,
            visibility_mask: 0xff,
            flags: 0,
            traversable,
            _pad: [0; 2],
        }
    }

    /// Transform back as a glam matrix.
    pub fn matrix(&self) -> Mat4 {
        let t = &self.transform;
        Mat4::from_cols_array(&[
            t[0], t[4], t[8], 0.0, //
            t[1], t[5], t[9], 0.0, //
            t[2], t[6], t[10], 0.0, //
            t[3], t[7], t[11], 1.0,
        ])
    }
}

fn row_major_3x4(m: &Mat4) -> [f32; 12] {
    let r0 = m.row(0);
    let r1 = m.row(1);
    let r2 = m.row(2);
    [
        r0.x, r0.y, r0.z, r0.w, //
        r1.x, r1.y, r1.z, r1.w, //
        r2.x, r2.y, r2.z, r2.w,
    ]
}
