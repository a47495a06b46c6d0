//! Device context: object factory, commit protocol and notification.
//!
//! Every scene object is created through a [`DeviceContext`], which hands out
//! ids, keeps a non-owning registry of live objects, and owns the dependency
//! graph and the deferred commit buffer. The commit protocol itself lives in
//! [`DeviceContext::run_commit`]:
//!
//! 1. drop the object from the commit buffer and from the dependency graph
//! 2. release all previously derived state
//! 3. derive new state from a snapshot of the parameters
//! 4. subscribe to every object read while deriving
//! 5. publish the outcome and notify observers

use bytemuck::Pod;
use parking_lot::RwLock;
use smallvec::SmallVec;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use super::commit_buffer::CommitBuffer;
use super::deps::DependencyGraph;
use super::diagnostics::{Diagnostic, DiagnosticSink, Severity, TracingSink};
use super::object::{CommitState, ObjectHeader, ObjectId, ObjectKind, SceneObject};
use super::params::{FromObjectRef, ParameterSet};
use crate::array::{Array, Extent};
use crate::config::Settings;
use crate::device::{Device, DeviceStats, HostDevice};
use crate::frame::Frame;
use crate::scene::{Camera, Geometry, Group, Instance, Light, Material, Renderer, Sampler, SpatialField, Surface, Volume, World};
use crate::util::{DataType, Error, Result};
use gpu_objects::DevicePtr;

pub struct DeviceContext {
    device: Arc<dyn Device>,
    settings: Settings,
    sink: Arc<dyn DiagnosticSink>,
    deps: DependencyGraph,
    objects: RwLock<HashMap<ObjectId, Weak<dyn SceneObject>>>,
    pending: CommitBuffer,
    next_id: AtomicU64,
}

impl DeviceContext {
    pub fn new(device: Arc<dyn Device>, settings: Settings) -> Self {
        Self {
            device,
            settings: settings.validated(),
            sink: Arc::new(TracingSink),
            deps: DependencyGraph::new(),
            objects: RwLock::new(HashMap::new()),
            pending: CommitBuffer::new(),
            next_id: AtomicU64::new(1),
        }
    }

    /// Context on a [`HostDevice`] configured from `settings`.
    pub fn host(settings: Settings) -> Self {
        let device: Arc<dyn Device> = Arc::new(HostDevice::from_settings(&settings));
        Self::new(device, settings)
    }

    /// Replace the diagnostic sink.
    pub fn with_sink(mut self, sink: Arc<dyn DiagnosticSink>) -> Self {
        self.sink = sink;
        self
    }

    #[inline]
    pub fn device(&self) -> &Arc<dyn Device> {
        &self.device
    }

    #[inline]
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    #[inline]
    pub fn dependencies(&self) -> &DependencyGraph {
        &self.deps
    }

    #[inline]
    pub fn commit_buffer(&self) -> &CommitBuffer {
        &self.pending
    }

    pub fn stats(&self) -> DeviceStats {
        self.device.stats()
    }

    pub fn report(&self, diagnostic: &Diagnostic) {
        self.sink.report(diagnostic);
    }

    /// Copy `count` elements from device memory.
    pub fn download_vec<T: Pod>(&self, ptr: DevicePtr, count: usize) -> Result<Vec<T>> {
        let mut out = vec![T::zeroed(); count];
        if count > 0 {
            self.device.download(ptr, bytemuck::cast_slice_mut(&mut out))?;
        }
        Ok(out)
    }

    /// Live object by id.
    pub fn object(&self, id: ObjectId) -> Option<Arc<dyn SceneObject>> {
        self.objects.read().get(&id).and_then(Weak::upgrade)
    }

    pub fn live_objects(&self) -> usize {
        self.objects.read().values().filter(|w| w.strong_count() > 0).count()
    }

    // ------------------------------------------------------------------
    // Factories
    // ------------------------------------------------------------------

    fn header(&self, kind: ObjectKind, subtype: &str) -> ObjectHeader {
        let id = ObjectId(self.next_id.fetch_add(1, Ordering::Relaxed));
        ObjectHeader::new(id, kind, subtype)
    }

    fn register<T: SceneObject + 'static>(&self, obj: T) -> Arc<T> {
        let obj = Arc::new(obj);
        let weak: Weak<dyn SceneObject> = Arc::downgrade(&obj) as Weak<dyn SceneObject>;
        self.objects.write().insert(obj.id(), weak);
        tracing::trace!(kind = %obj.kind(), subtype = obj.subtype(), id = %obj.id(), "created");
        obj
    }

    /// Zero-initialized array.
    pub fn new_array(&self, data_type: DataType, extent: Extent) -> Arc<Array> {
        let header = self.header(ObjectKind::Array, &data_type.name());
        self.register(Array::new(header, data_type, extent, self.device.clone()))
    }

    /// Array initialized from host data. The element size of `T` times the
    /// element count must match the array's byte size.
    pub fn array_from<T: Pod>(&self, data_type: DataType, extent: Extent, data: &[T]) -> Result<Arc<Array>> {
        let array = self.new_array(data_type, extent);
        array.write(data)?;
        Ok(array)
    }

    pub fn new_sampler(&self, subtype: &str) -> Arc<Sampler> {
        self.register(Sampler::new(self.header(ObjectKind::Sampler, subtype)))
    }

    pub fn new_spatial_field(&self, subtype: &str) -> Arc<SpatialField> {
        self.register(SpatialField::new(self.header(ObjectKind::SpatialField, subtype)))
    }

    pub fn new_geometry(&self, subtype: &str) -> Arc<Geometry> {
        self.register(Geometry::new(self.header(ObjectKind::Geometry, subtype)))
    }

    pub fn new_material(&self, subtype: &str) -> Arc<Material> {
        self.register(Material::new(self.header(ObjectKind::Material, subtype)))
    }

    pub fn new_volume(&self, subtype: &str) -> Arc<Volume> {
        self.register(Volume::new(self.header(ObjectKind::Volume, subtype)))
    }

    pub fn new_surface(&self) -> Arc<Surface> {
        self.register(Surface::new(self.header(ObjectKind::Surface, "surface")))
    }

    pub fn new_light(&self, subtype: &str) -> Arc<Light> {
        self.register(Light::new(self.header(ObjectKind::Light, subtype)))
    }

    pub fn new_group(&self) -> Arc<Group> {
        self.register(Group::new(self.header(ObjectKind::Group, "group")))
    }

    pub fn new_instance(&self) -> Arc<Instance> {
        self.register(Instance::new(self.header(ObjectKind::Instance, "transform")))
    }

    pub fn new_world(&self) -> Arc<World> {
        self.register(World::new(self.header(ObjectKind::World, "world")))
    }

    pub fn new_camera(&self, subtype: &str) -> Arc<Camera> {
        self.register(Camera::new(self.header(ObjectKind::Camera, subtype)))
    }

    pub fn new_renderer(&self, subtype: &str) -> Arc<Renderer> {
        self.register(Renderer::new(self.header(ObjectKind::Renderer, subtype)))
    }

    pub fn new_frame(&self) -> Arc<Frame> {
        self.register(Frame::new(self.header(ObjectKind::Frame, "frame")))
    }

    // ------------------------------------------------------------------
    // Commit protocol
    // ------------------------------------------------------------------

    /// Run one commit of the object owning `header`.
    ///
    /// `slot` holds the derived state and is cleared before `derive` runs, so
    /// device resources of the previous commit are gone on every exit path.
    /// `derive` returns `Ok(None)` for a validation failure (after reporting
    /// it) and `Err` for device failures only.
    pub(crate) fn run_commit<T>(
        &self,
        header: &ObjectHeader,
        slot: &RwLock<Option<T>>,
        derive: impl FnOnce(&mut CommitScope<'_>) -> Result<Option<T>>,
    ) -> Result<()> {
        let _span = tracing::debug_span!("commit", kind = %header.kind(), subtype = header.subtype(), id = %header.id())
            .entered();

        self.pending.remove(header.id());
        self.deps.unsubscribe_all(header.id());
        *slot.write() = None;
        header.record_commit();

        let params = header.params().clone();
        let mut scope = CommitScope {
            ctx: self,
            header,
            params,
            observed: SmallVec::new(),
        };
        let outcome = derive(&mut scope);
        for dep in scope.observed.drain(..) {
            self.deps.subscribe(dep, header.id());
        }

        let result = match outcome {
            Ok(Some(state)) => {
                *slot.write() = Some(state);
                header.set_state(CommitState::Committed);
                tracing::debug!("committed");
                Ok(())
            }
            Ok(None) => {
                header.set_state(CommitState::Invalid);
                tracing::debug!("invalid");
                Ok(())
            }
            Err(e) => {
                self.report(&Diagnostic::new(Severity::FatalError, header, e.to_string()));
                header.set_state(CommitState::Invalid);
                Err(e)
            }
        };
        self.notify_observers(header.id());
        result
    }

    /// Mark every observer of `id` uncommitted and queue it for recommit.
    /// Returns the number of observers notified; each is notified once.
    pub(crate) fn notify_observers(&self, id: ObjectId) -> usize {
        let observers = self.deps.observers_of(id);
        if observers.is_empty() {
            return 0;
        }

        let mut notified = 0;
        let mut dead: SmallVec<[ObjectId; 4]> = SmallVec::new();
        {
            let objects = self.objects.read();
            for observer in observers {
                match objects.get(&observer).and_then(Weak::upgrade) {
                    Some(obj) => {
                        obj.header().record_notification();
                        obj.header().set_state(CommitState::Uncommitted);
                        self.pending.enqueue(obj);
                        notified += 1;
                    }
                    None => dead.push(observer),
                }
            }
        }

        if !dead.is_empty() {
            let mut objects = self.objects.write();
            for d in dead {
                self.deps.forget(d);
                objects.remove(&d);
            }
        }
        tracing::trace!(%id, notified, "notified observers");
        notified
    }

    /// Recommit everything queued by notifications, dependencies first.
    ///
    /// Commits that queue further dependents are picked up by the next pass.
    /// A failing commit does not stop the flush; the first error is returned
    /// once the buffer has settled.
    pub fn flush_commits(&self) -> Result<usize> {
        let mut committed = 0;
        let mut first_err = None;

        for _ in 0..self.settings.max_commit_passes {
            let batch = self.pending.drain_sorted();
            if batch.is_empty() {
                return match first_err {
                    Some(e) => Err(e),
                    None => Ok(committed),
                };
            }
            for obj in batch {
                // already recommitted earlier in this pass
                if obj.state() != CommitState::Uncommitted {
                    continue;
                }
                committed += 1;
                if let Err(e) = obj.commit(self) {
                    first_err.get_or_insert(e);
                }
            }
        }

        Err(first_err.unwrap_or_else(|| {
            Error::other(format!(
                "commit buffer did not settle after {} passes ({} pending)",
                self.settings.max_commit_passes,
                self.pending.len()
            ))
        }))
    }
}

/// View of one commit in progress: parameter snapshot, dependency tracking
/// and diagnostics for the committing object.
pub struct CommitScope<'a> {
    ctx: &'a DeviceContext,
    header: &'a ObjectHeader,
    params: ParameterSet,
    observed: SmallVec<[ObjectId; 8]>,
}

impl<'a> CommitScope<'a> {
    #[inline]
    pub fn ctx(&self) -> &'a DeviceContext {
        self.ctx
    }

    #[inline]
    pub fn device(&self) -> &'a Arc<dyn Device> {
        &self.ctx.device
    }

    #[inline]
    pub fn settings(&self) -> &'a Settings {
        &self.ctx.settings
    }

    #[inline]
    pub fn header(&self) -> &'a ObjectHeader {
        self.header
    }

    /// Parameters as they were when the commit started.
    #[inline]
    pub fn params(&self) -> &ParameterSet {
        &self.params
    }

    /// Record a read dependency.
    pub fn observe(&mut self, obj: &dyn SceneObject) {
        let id = obj.id();
        if !self.observed.contains(&id) {
            self.observed.push(id);
        }
    }

    pub fn report(&self, severity: Severity, message: impl Into<String>) {
        self.ctx.report(&Diagnostic::new(severity, self.header, message));
    }

    pub fn warn(&self, message: impl Into<String>) {
        self.report(Severity::Warning, message);
    }

    pub fn error(&self, message: impl Into<String>) {
        self.report(Severity::Error, message);
    }

    /// Array parameter that must be present and valid.
    pub fn require_array(&mut self, name: &str) -> Option<Arc<Array>> {
        let Some(array) = self.params.array(name) else {
            self.warn(format!("missing required parameter '{name}'"));
            return None;
        };
        self.observe(array.as_ref());
        if !array.is_valid() {
            self.warn(format!("parameter '{name}' is not a valid array"));
            return None;
        }
        Some(array)
    }

    /// Array parameter that may be absent. An invalid array counts as absent.
    pub fn optional_array(&mut self, name: &str) -> Option<Arc<Array>> {
        let array = self.params.array(name)?;
        self.observe(array.as_ref());
        if !array.is_valid() {
            self.warn(format!("ignoring invalid array '{name}'"));
            return None;
        }
        Some(array)
    }

    /// Check an array's element type; reports an error on mismatch.
    pub fn check_type(&self, array: &Array, name: &str, allowed: &[DataType]) -> bool {
        if allowed.contains(&array.data_type()) {
            return true;
        }
        let expected: Vec<String> = allowed.iter().map(|t| t.name()).collect();
        self.error(format!(
            "'{name}' has element type {}, expected {}",
            array.data_type(),
            expected.join(" or ")
        ));
        false
    }

    /// Object parameter that must be present and committed.
    pub fn require_object<T>(&mut self, name: &str) -> Option<Arc<T>>
    where
        T: FromObjectRef + SceneObject,
    {
        let Some(obj) = self.params.object::<T>(name) else {
            self.warn(format!("missing required parameter '{name}'"));
            return None;
        };
        self.observe(obj.as_ref());
        if !obj.is_valid() {
            self.warn(format!("parameter '{name}' refers to an object that is not committed and valid"));
            return None;
        }
        Some(obj)
    }

    /// Object parameter that may be absent; invalid objects count as absent.
    pub fn optional_object<T>(&mut self, name: &str) -> Option<Arc<T>>
    where
        T: FromObjectRef + SceneObject,
    {
        let obj = self.params.object::<T>(name)?;
        self.observe(obj.as_ref());
        if !obj.is_valid() {
            self.warn(format!("ignoring '{name}': object is not committed and valid"));
            return None;
        }
        Some(obj)
    }

    /// Object list parameter. Every entry is observed; only valid entries are
    /// returned, in list order.
    pub fn valid_objects<T>(&mut self, name: &str) -> Vec<Arc<T>>
    where
        T: FromObjectRef + SceneObject,
    {
        let all = self.params.objects::<T>(name);
        let mut out = Vec::with_capacity(all.len());
        for obj in all {
            self.observe(obj.as_ref());
            if obj.is_valid() {
                out.push(obj);
            } else {
                tracing::debug!(param = name, id = %obj.id(), "skipping invalid object");
            }
        }
        out
    }
}
