//! Error types for scene-gpu.
//!
//! Only device-side failures travel through [`Error`]. Validation problems in
//! scene objects are not errors in this sense: they move the object to
//! `Invalid` and emit a diagnostic.

use thiserror::Error;

use crate::core::{ObjectId, ObjectKind};

/// Failure reported by a [`Device`](crate::device::Device) implementation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeviceError {
    /// Allocation exceeds the remaining device memory
    #[error("out of device memory: requested {requested} bytes, {available} available")]
    OutOfMemory { requested: usize, available: usize },

    /// Address does not belong to a live allocation
    #[error("invalid device pointer {0:#x}")]
    InvalidPointer(u64),

    /// Transfer crosses the end of an allocation
    #[error("transfer of {len} bytes at {ptr:#x}+{offset} exceeds allocation of {size} bytes")]
    OutOfBounds { ptr: u64, offset: usize, len: usize, size: usize },

    /// Unknown texture handle
    #[error("invalid texture handle {0}")]
    InvalidTexture(u64),

    /// Texel count does not match the texture description
    #[error("texture expects {expected} texels, got {actual}")]
    InvalidTextureData { expected: usize, actual: usize },

    /// Unknown acceleration structure handle
    #[error("invalid traversable handle {0}")]
    InvalidTraversable(u64),

    /// Acceleration structure build rejected its inputs
    #[error("acceleration build failed: {0}")]
    BuildFailed(String),

    /// Copy between host and device did not complete
    #[error("transfer failed: {0}")]
    TransferAborted(String),
}

/// Main error type for scene-gpu operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Device failure that has no more specific variant
    #[error("device error: {0}")]
    Device(DeviceError),

    /// Device allocation failed
    #[error("out of device memory: requested {requested} bytes, {available} available")]
    OutOfDeviceMemory { requested: usize, available: usize },

    /// Host/device copy failed
    #[error("transfer failed: {0}")]
    TransferFailed(String),

    /// Acceleration structure build failed
    #[error("acceleration structure build failed: {0}")]
    AccelBuildFailed(String),

    /// Snapshot or build input requested before a successful commit
    #[error("{kind} #{id} is not committed")]
    ObjectNotCommitted { kind: ObjectKind, id: ObjectId },

    /// Snapshot or build input requested from an invalid object
    #[error("{kind} #{id} is not valid")]
    NotValid { kind: ObjectKind, id: ObjectId },

    /// Byte or element count mismatch
    #[error("size mismatch: expected {expected}, got {actual}")]
    SizeMismatch { expected: usize, actual: usize },

    /// Element type mismatch
    #[error("type mismatch: expected {expected}, got {actual}")]
    TypeMismatch { expected: String, actual: String },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Settings (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an "other" error from a string.
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }

    /// Create a type mismatch error from anything displayable.
    pub fn type_mismatch(expected: impl ToString, actual: impl ToString) -> Self {
        Self::TypeMismatch {
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }

    /// True for failures of the device itself (allocation, transfer, build).
    pub fn is_device_failure(&self) -> bool {
        matches!(
            self,
            Self::Device(_) | Self::OutOfDeviceMemory { .. } | Self::TransferFailed(_) | Self::AccelBuildFailed(_)
        )
    }
}

impl From<DeviceError> for Error {
    fn from(e: DeviceError) -> Self {
        match e {
            DeviceError::OutOfMemory { requested, available } => Self::OutOfDeviceMemory { requested, available },
            DeviceError::OutOfBounds { .. } | DeviceError::TransferAborted(_) => Self::TransferFailed(e.to_string()),
            DeviceError::BuildFailed(msg) => Self::AccelBuildFailed(msg),
            other => Self::Device(other),
        }
    }
}

/// Result type alias for scene-gpu operations.
pub type Result<T> = std::result::Result<T, Error>;
