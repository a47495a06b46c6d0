//! Observer edges between objects.
//!
//! An edge `dependency -> observer` means "recommit `observer` when
//! `dependency` commits". Edges are non-owning: only ids are stored.

use parking_lot::Mutex;
use smallvec::SmallVec;
use std::collections::HashMap;

use super::object::ObjectId;

type IdList = SmallVec<[ObjectId; 4]>;

#[derive(Default)]
struct Edges {
    /// dependency -> observers, in subscription order
    observers: HashMap<ObjectId, IdList>,
    /// observer -> dependencies, for unsubscribe
    observing: HashMap<ObjectId, IdList>,
}

#[derive(Default)]
pub struct DependencyGraph {
    edges: Mutex<Edges>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `observer` to `dependency`'s observers. Repeated calls add nothing.
    pub fn subscribe(&self, dependency: ObjectId, observer: ObjectId) {
        if dependency == observer {
            return;
        }
        let mut edges = self.edges.lock();
        let list = edges.observers.entry(dependency).or_default();
        if list.contains(&observer) {
            return;
        }
        list.push(observer);
        edges.observing.entry(observer).or_default().push(dependency);
    }

    /// Drop every edge where `observer` is the observing end.
    pub fn unsubscribe_all(&self, observer: ObjectId) {
        let mut edges = self.edges.lock();
        let Some(deps) = edges.observing.remove(&observer) else {
            return;
        };
        for dep in deps {
            if let Some(list) = edges.observers.get_mut(&dep) {
                list.retain(|o| *o != observer);
                if list.is_empty() {
                    edges.observers.remove(&dep);
                }
            }
        }
    }

    /// Remove an object from both ends of the graph.
    pub fn forget(&self, id: ObjectId) {
        self.unsubscribe_all(id);
        let mut edges = self.edges.lock();
        if let Some(observers) = edges.observers.remove(&id) {
            for o in observers {
                if let Some(list) = edges.observing.get_mut(&o) {
                    list.retain(|d| *d != id);
                }
            }
        }
    }

    /// Observers of `dependency`, each listed once.
    pub fn observers_of(&self, dependency: ObjectId) -> IdList {
        self.edges.lock().observers.get(&dependency).cloned().unwrap_or_default()
    }

    /// Dependencies `observer` is subscribed to.
    pub fn dependencies_of(&self, observer: ObjectId) -> IdList {
        self.edges.lock().observing.get(&observer).cloned().unwrap_or_default()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.lock().observers.values().map(|l| l.len()).sum()
    }
}
