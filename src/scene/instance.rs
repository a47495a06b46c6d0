//! Instances: a group placed with a transform.

use glam::Mat4;
use parking_lot::RwLock;
use std::sync::Arc;

use super::Group;
use crate::core::{DeviceContext, ObjectHeader, SceneObject};
use crate::util::{Box3, Error, Result};

struct InstanceState {
    group: Arc<Group>,
    transform: Mat4,
    id: u32,
}

pub struct Instance {
    header: ObjectHeader,
    committed: RwLock<Option<InstanceState>>,
}

impl Instance {
    pub(crate) fn new(header: ObjectHeader) -> Self {
        Self {
            header,
            committed: RwLock::new(None),
        }
    }

    fn with_state<R>(&self, f: impl FnOnce(&InstanceState) -> Result<R>) -> Result<R> {
        self.header.ensure_committed()?;
        match self.committed.read().as_ref() {
            Some(s) => f(s),
            None => Err(Error::NotValid {
                kind: self.header.kind(),
                id: self.header.id(),
            }),
        }
    }

    pub fn group(&self) -> Result<Arc<Group>> {
        self.with_state(|s| Ok(s.group.clone()))
    }

    pub fn transform(&self) -> Result<Mat4> {
        self.with_state(|s| Ok(s.transform))
    }

    /// User id, `u32::MAX` when unset.
    pub fn user_id(&self) -> Result<u32> {
        self.with_state(|s| Ok(s.id))
    }

    /// World-space bounds of the instanced group.
    pub fn bounds(&self) -> Result<Box3> {
        self.with_state(|s| Ok(s.group.bounds()?.transformed(&s.transform)))
    }
}

impl SceneObject for Instance {
    fn header(&self) -> &ObjectHeader {
        &self.header
    }

    fn commit(&self, ctx: &DeviceContext) -> Result<()> {
        ctx.run_commit(&self.header, &self.committed, |scope| {
            let Some(group) = scope.require_object::<Group>("group") else {
                return Ok(None);
            };
            let params = scope.params();
            Ok(Some(InstanceState {
                group,
                transform: params.get_or("transform", Mat4::IDENTITY),
                id: params.get_or("id", u32::MAX),
            }))
        })
    }
}
