//! Utility types shared by every module:
//! - [`ScalarType`] / [`DataType`] - array element types
//! - [`Error`] / [`Result`] - error handling
//! - Math type re-exports from glam plus [`Box3`] / [`Box1`]

mod data_type;
mod error;
mod math;
mod scalar;

pub use data_type::*;
pub use error::*;
pub use math::*;
pub use scalar::*;
