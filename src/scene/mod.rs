//! Typed scene entities.
//!
//! Every entity pairs an [`ObjectHeader`](crate::core::ObjectHeader) with the
//! state derived by its last successful commit. Snapshots that reference
//! other objects (materials, surfaces, volumes, renderers) are resolved
//! through a [`RegistryBuilder`](crate::registry::RegistryBuilder) at frame
//! assembly, so committed state never stores registry indices.

pub mod geometry;
pub mod spatial_field;
pub mod volume;

mod camera;
mod group;
mod instance;
mod light;
mod material;
mod renderer;
mod sampler;
mod surface;
mod world;

pub use camera::Camera;
pub use geometry::Geometry;
pub use group::{Group, GroupContents};
pub use instance::Instance;
pub use light::Light;
pub use material::{Material, MaterialInput};
pub use renderer::Renderer;
pub use sampler::Sampler;
pub use spatial_field::SpatialField;
pub use surface::Surface;
pub use volume::Volume;
pub use world::World;
