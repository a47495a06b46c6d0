//! Deferred commits.
//!
//! Notified observers are queued here and recommitted by
//! [`DeviceContext::flush_commits`](super::DeviceContext::flush_commits) in
//! kind priority order, so dependencies always commit before dependents.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

use super::object::{ObjectId, SceneObject};

#[derive(Default)]
pub struct CommitBuffer {
    pending: Mutex<HashMap<ObjectId, Arc<dyn SceneObject>>>,
}

impl CommitBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an object. Queuing it again before the next drain is a no-op.
    pub fn enqueue(&self, obj: Arc<dyn SceneObject>) -> bool {
        let mut pending = self.pending.lock();
        let id = obj.id();
        if pending.contains_key(&id) {
            return false;
        }
        pending.insert(id, obj);
        true
    }

    pub fn remove(&self, id: ObjectId) -> bool {
        self.pending.lock().remove(&id).is_some()
    }

    pub fn contains(&self, id: ObjectId) -> bool {
        self.pending.lock().contains_key(&id)
    }

    /// Take everything queued, ordered by kind priority then id.
    pub fn drain_sorted(&self) -> Vec<Arc<dyn SceneObject>> {
        let mut batch: Vec<_> = self.pending.lock().drain().map(|(_, o)| o).collect();
        batch.sort_by_key(|o| (o.kind().commit_priority(), o.id()));
        batch
    }

    pub fn len(&self) -> usize {
        self.pending.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::array::Extent;
    use crate::config::Settings;
    use crate::core::{DeviceContext, ObjectKind};
    use crate::util::DataType;

    #[test]
    fn test_enqueue_deduplicates() {
        let ctx = DeviceContext::host(Settings::default());
        let buffer = CommitBuffer::new();
        let g: Arc<dyn SceneObject> = ctx.new_geometry("quad");
        assert!(buffer.enqueue(g.clone()));
        assert!(!buffer.enqueue(g.clone()));
        assert_eq!(buffer.len(), 1);
        assert!(buffer.contains(g.id()));

        assert!(buffer.remove(g.id()));
        assert!(!buffer.remove(g.id()));
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_drain_orders_by_kind_then_id() {
        let ctx = DeviceContext::host(Settings::default());
        let buffer = CommitBuffer::new();
        let world: Arc<dyn SceneObject> = ctx.new_world();
        let g1: Arc<dyn SceneObject> = ctx.new_geometry("quad");
        let g0: Arc<dyn SceneObject> = ctx.new_geometry("triangle");
        let array: Arc<dyn SceneObject> = ctx.new_array(DataType::FLOAT32, Extent::D1(1));
        for obj in [&world, &g0, &array, &g1] {
            buffer.enqueue(obj.clone());
        }

        let order: Vec<(ObjectKind, ObjectId)> = buffer.drain_sorted().iter().map(|o| (o.kind(), o.id())).collect();
        assert_eq!(
            order,
            vec![
                (ObjectKind::Array, array.id()),
                (ObjectKind::Geometry, g1.id()),
                (ObjectKind::Geometry, g0.id()),
                (ObjectKind::World, world.id()),
            ]
        );
        assert!(buffer.is_empty());
        assert!(buffer.drain_sorted().is_empty());
    }
}
