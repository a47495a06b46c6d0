//! # scene-gpu
//!
//! Scene description and GPU-resident data synthesis for a ray-tracing
//! renderer.
//!
//! Applications build a graph of scene objects through a
//! [`DeviceContext`], set parameters and commit. Each commit validates the
//! object against its committed dependencies, derives and uploads the data
//! the kernels need, and notifies every dependent. A [`Frame`] then gathers
//! the committed snapshots into a flat, index-addressed registry and one
//! [`FrameGpuData`](gpu_objects::FrameGpuData) aggregate.
//!
//! ## Modules
//!
//! - [`util`] - Element types, errors, math
//! - [`core`] - Object model, dependency graph and commit engine
//! - [`device`] - Device contract and the host reference device
//! - [`array`] - Dual-residency arrays and derived buffers
//! - [`accel`] - Acceleration-structure build inputs
//! - [`scene`] - Typed scene entities (geometry, volume, material, ...)
//! - [`registry`] - Per-frame object registry
//! - [`frame`] - Framebuffers and frame assembly
//! - [`config`] / [`logging`] - Settings and tracing setup
//!
//! ## Example
//!
//! ```ignore
//! use scene_gpu::prelude::*;
//!
//! let ctx = DeviceContext::host(Settings::load());
//! let positions = ctx.array_from(DataType::FLOAT32_VEC3, Extent::D1(3), &vertices)?;
//! let geometry = ctx.new_geometry("triangle");
//! geometry.set_param("vertex.position", &positions);
//! geometry.commit(&ctx)?;
//! ```

pub mod accel;
pub mod array;
pub mod config;
pub mod core;
pub mod device;
pub mod frame;
pub mod logging;
pub mod registry;
pub mod scene;
pub mod util;

// Re-export commonly used types
pub use crate::core::{DeviceContext, SceneObject};
pub use config::Settings;
pub use frame::Frame;
pub use util::{DataType, Error, Result};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::array::{Array, Extent};
    pub use crate::config::Settings;
    pub use crate::core::{CommitState, DeviceContext, ObjectId, SceneObject, Severity};
    pub use crate::frame::Frame;
    pub use crate::scene::*;
    pub use crate::util::{Box3, DataType, Error, Mat4, Result, Vec2, Vec3, Vec4};
}
