//! Object identity, commit state and the scene object trait.

use parking_lot::{RwLock, RwLockReadGuard};
use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};

use super::context::DeviceContext;
use super::params::{ParamValue, ParameterSet};
use crate::util::{Error, Result};

/// Unique object identity within a [`DeviceContext`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(pub u64);

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Entity kind. Declaration order is the deferred commit priority: kinds
/// listed first never depend on kinds listed later.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ObjectKind {
    Array,
    Sampler,
    SpatialField,
    Geometry,
    Material,
    Volume,
    Surface,
    Light,
    Group,
    Instance,
    World,
    Camera,
    Renderer,
    Frame,
}

impl ObjectKind {
    #[inline]
    pub const fn commit_priority(self) -> u8 {
        self as u8
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Array => "array",
            Self::Sampler => "sampler",
            Self::SpatialField => "spatialField",
            Self::Geometry => "geometry",
            Self::Material => "material",
            Self::Volume => "volume",
            Self::Surface => "surface",
            Self::Light => "light",
            Self::Group => "group",
            Self::Instance => "instance",
            Self::World => "world",
            Self::Camera => "camera",
            Self::Renderer => "renderer",
            Self::Frame => "frame",
        }
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum CommitState {
    #[default]
    Uncommitted = 0,
    Committed = 1,
    Invalid = 2,
}

impl CommitState {
    const fn from_u8(v: u8) -> Self {
        match v {
            1 => Self::Committed,
            2 => Self::Invalid,
            _ => Self::Uncommitted,
        }
    }
}

/// State shared by every scene object: identity, parameters, commit state.
pub struct ObjectHeader {
    id: ObjectId,
    kind: ObjectKind,
    subtype: String,
    params: RwLock<ParameterSet>,
    state: AtomicU8,
    commits: AtomicU64,
    notifications: AtomicU64,
}

impl ObjectHeader {
    pub(crate) fn new(id: ObjectId, kind: ObjectKind, subtype: impl Into<String>) -> Self {
        Self {
            id,
            kind,
            subtype: subtype.into(),
            params: RwLock::new(ParameterSet::default()),
            state: AtomicU8::new(CommitState::Uncommitted as u8),
            commits: AtomicU64::new(0),
            notifications: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn id(&self) -> ObjectId {
        self.id
    }

    #[inline]
    pub fn kind(&self) -> ObjectKind {
        self.kind
    }

    #[inline]
    pub fn subtype(&self) -> &str {
        &self.subtype
    }

    #[inline]
    pub fn state(&self) -> CommitState {
        CommitState::from_u8(self.state.load(Ordering::Acquire))
    }

    #[inline]
    pub(crate) fn set_state(&self, state: CommitState) {
        self.state.store(state as u8, Ordering::Release);
    }

    pub fn params(&self) -> RwLockReadGuard<'_, ParameterSet> {
        self.params.read()
    }

    /// Set a parameter. The object needs a new commit afterwards.
    pub fn set_param(&self, name: &str, value: ParamValue) {
        self.params.write().set(name, value);
        self.set_state(CommitState::Uncommitted);
    }

    /// Remove a parameter, returning whether it was set.
    pub fn remove_param(&self, name: &str) -> bool {
        let removed = self.params.write().remove(name).is_some();
        if removed {
            self.set_state(CommitState::Uncommitted);
        }
        removed
    }

    /// Number of commits attempted on this object.
    pub fn commit_count(&self) -> u64 {
        self.commits.load(Ordering::Relaxed)
    }

    /// Number of times a dependency notified this object.
    pub fn notification_count(&self) -> u64 {
        self.notifications.load(Ordering::Relaxed)
    }

    pub(crate) fn record_commit(&self) {
        self.commits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_notification(&self) {
        self.notifications.fetch_add(1, Ordering::Relaxed);
    }

    /// `Ok` only in the `Committed` state.
    pub fn ensure_committed(&self) -> Result<()> {
        match self.state() {
            CommitState::Committed => Ok(()),
            CommitState::Invalid => Err(Error::NotValid {
                kind: self.kind,
                id: self.id,
            }),
            CommitState::Uncommitted => Err(Error::ObjectNotCommitted {
                kind: self.kind,
                id: self.id,
            }),
        }
    }
}

impl fmt::Debug for ObjectHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectHeader")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("subtype", &self.subtype)
            .field("state", &self.state())
            .finish()
    }
}

/// Behavior shared by every scene entity.
pub trait SceneObject: Send + Sync {
    fn header(&self) -> &ObjectHeader;

    /// Validate parameters, rebuild derived data and notify observers.
    ///
    /// Validation failures are not errors: the object becomes `Invalid` and a
    /// diagnostic is reported. `Err` is reserved for device failures.
    fn commit(&self, ctx: &DeviceContext) -> Result<()>;

    #[inline]
    fn id(&self) -> ObjectId {
        self.header().id()
    }

    #[inline]
    fn kind(&self) -> ObjectKind {
        self.header().kind()
    }

    #[inline]
    fn subtype(&self) -> &str {
        self.header().subtype()
    }

    #[inline]
    fn state(&self) -> CommitState {
        self.header().state()
    }

    /// True when the last commit succeeded and nothing changed since.
    #[inline]
    fn is_valid(&self) -> bool {
        self.state() == CommitState::Committed
    }

    fn set_param(&self, name: &str, value: impl Into<ParamValue>)
    where
        Self: Sized,
    {
        self.header().set_param(name, value.into());
    }

    fn unset_param(&self, name: &str) -> bool
    where
        Self: Sized,
    {
        self.header().remove_param(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_priority_order() {
        assert!(ObjectKind::Array.commit_priority() < ObjectKind::Geometry.commit_priority());
        assert!(ObjectKind::Geometry.commit_priority() < ObjectKind::Surface.commit_priority());
        assert!(ObjectKind::World.commit_priority() < ObjectKind::Frame.commit_priority());
    }

    #[test]
    fn test_header_state_transitions() {
        let h = ObjectHeader::new(ObjectId(3), ObjectKind::Light, "point");
        assert_eq!(h.state(), CommitState::Uncommitted);
        assert!(matches!(h.ensure_committed(), Err(Error::ObjectNotCommitted { .. })));

        h.set_state(CommitState::Committed);
        assert!(h.ensure_committed().is_ok());

        h.set_param("intensity", ParamValue::Float(2.0));
        assert_eq!(h.state(), CommitState::Uncommitted);

        h.set_state(CommitState::Invalid);
        assert!(matches!(h.ensure_committed(), Err(Error::NotValid { .. })));
        assert!(!h.remove_param("missing"));
        assert_eq!(h.state(), CommitState::Invalid);
    }
}
