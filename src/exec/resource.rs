// src/exec/resource.rs

//! Pooled test resources.
//!
//! A [`Resource`] describes how to build and tear down some object a test
//! needs (a temporary directory, a connection, a fake server). The
//! [`ResourceManager`] keeps clean objects in a FIFO pool keyed by
//! [`Resource::key`] so later tests can reuse them; objects that were
//! mutated are torn down instead of returned to the pool.
//!
//! Mutation is tracked explicitly by [`ResourceObject`]: `get` is a clean
//! read, `get_mut` marks the object dirty unless dirty tracking has been
//! suspended with [`ResourceObject::clean_access`].

use std::any::Any;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::{MappedRwLockReadGuard, MappedRwLockWriteGuard, Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, warn};

use crate::node::TestError;
use crate::types::State;

/// Type-erased object produced by [`Resource::set_up`].
pub type ResourceValue = Box<dyn Any + Send + Sync>;

/// Describes a kind of test resource.
pub trait Resource: Send + Sync + fmt::Debug {
    /// Pool key. Resources with equal keys share pooled objects.
    fn key(&self) -> String;

    /// Build a fresh object.
    fn set_up(&self) -> Result<ResourceValue, TestError>;

    /// Destroy an object. `status` is the final state of the test that
    /// last used it, or `None` when the pool is drained at the end of a run.
    fn tear_down(&self, _value: ResourceValue, _status: Option<State>) -> Result<(), TestError> {
        Ok(())
    }

    /// Never reuse objects of this resource.
    fn oneshot(&self) -> bool {
        false
    }
}

/// A pooled object bound to the resource that built it.
pub struct ResourceObject {
    resource: Arc<dyn Resource>,
    value: RwLock<Option<ResourceValue>>,
    dirty: AtomicBool,
    track: AtomicBool,
}

impl ResourceObject {
    fn new(resource: Arc<dyn Resource>, value: ResourceValue) -> Self {
        Self {
            resource,
            value: RwLock::new(Some(value)),
            dirty: AtomicBool::new(false),
            track: AtomicBool::new(true),
        }
    }

    pub fn resource(&self) -> &Arc<dyn Resource> {
        &self.resource
    }

    /// Read access that leaves the dirty flag alone. `None` if the object
    /// is not a `T`.
    pub fn get<T: Any>(&self) -> Option<MappedRwLockReadGuard<'_, T>> {
        RwLockReadGuard::try_map(self.value.read(), |v| {
            v.as_ref().and_then(|b| b.downcast_ref::<T>())
        })
        .ok()
    }

    /// Write access; marks the object dirty unless inside
    /// [`clean_access`](Self::clean_access).
    pub fn get_mut<T: Any>(&self) -> Option<MappedRwLockWriteGuard<'_, T>> {
        let guard = RwLockWriteGuard::try_map(self.value.write(), |v| {
            v.as_mut().and_then(|b| b.downcast_mut::<T>())
        })
        .ok()?;
        if self.track.load(Ordering::Acquire) {
            self.dirty.store(true, Ordering::Release);
        }
        Some(guard)
    }

    /// Run `f` with dirty tracking suspended, restoring the previous
    /// setting afterwards.
    pub fn clean_access<R>(&self, f: impl FnOnce(&Self) -> R) -> R {
        let previous = self.track.swap(false, Ordering::AcqRel);
        let out = f(self);
        self.track.store(previous, Ordering::Release);
        out
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::Acquire)
    }

    pub fn mark_dirty(&self) {
        self.dirty.store(true, Ordering::Release);
    }

    pub fn mark_clean(&self) {
        self.dirty.store(false, Ordering::Release);
    }

    fn take(&self) -> Option<ResourceValue> {
        self.value.write().take()
    }
}

impl fmt::Debug for ResourceObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceObject")
            .field("resource", &self.resource.key())
            .field("dirty", &self.is_dirty())
            .finish_non_exhaustive()
    }
}

/// A tear-down failure collected by the manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceError {
    pub resource: String,
    pub error: TestError,
}

/// FIFO pool of reusable resource objects.
#[derive(Default)]
pub struct ResourceManager {
    pool: Mutex<HashMap<String, VecDeque<Arc<ResourceObject>>>>,
    messages: Mutex<Vec<ResourceError>>,
}

impl ResourceManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take a pooled object for `resource`, or build a new one.
    pub fn acquire(&self, resource: &Arc<dyn Resource>) -> Result<Arc<ResourceObject>, TestError> {
        let key = resource.key();
        if let Some(obj) = self.pool.lock().get_mut(&key).and_then(VecDeque::pop_front) {
            debug!(resource = %key, "reusing pooled resource");
            return Ok(obj);
        }

        debug!(resource = %key, "setting up resource");
        let value = resource.set_up()?;
        Ok(Arc::new(ResourceObject::new(Arc::clone(resource), value)))
    }

    /// Acquire every named resource. If a set-up fails, returning an error
    /// or panicking, the objects acquired so far are released again.
    pub fn collect(
        &self,
        resources: &BTreeMap<String, Arc<dyn Resource>>,
    ) -> Result<BTreeMap<String, Arc<ResourceObject>>, TestError> {
        let mut partial = PartialSet {
            manager: self,
            objects: BTreeMap::new(),
        };
        for (name, resource) in resources {
            let obj = self.acquire(resource)?;
            partial.objects.insert(name.clone(), obj);
        }
        Ok(std::mem::take(&mut partial.objects))
    }

    /// Return `obj` to the pool, or tear it down if it is dirty or its
    /// resource is one-shot.
    pub fn release(&self, obj: Arc<ResourceObject>, status: Option<State>) {
        if obj.is_dirty() || obj.resource.oneshot() {
            self.tear_down(&obj, status);
            return;
        }

        let key = obj.resource.key();
        self.pool.lock().entry(key).or_default().push_back(obj);
    }

    pub fn release_many(&self, objects: BTreeMap<String, Arc<ResourceObject>>, status: Option<State>) {
        for obj in objects.into_values() {
            self.release(obj, status);
        }
    }

    /// Tear down everything left in the pool.
    pub fn release_all(&self) {
        let drained: Vec<_> = self.pool.lock().drain().collect();
        for (_, objects) in drained {
            for obj in objects {
                self.tear_down(&obj, None);
            }
        }
    }

    /// Take the tear-down errors collected so far.
    pub fn messages(&self) -> Vec<ResourceError> {
        std::mem::take(&mut *self.messages.lock())
    }

    fn tear_down(&self, obj: &ResourceObject, status: Option<State>) {
        let Some(value) = obj.take() else {
            return;
        };
        let key = obj.resource.key();
        if let Err(error) = obj.resource.tear_down(value, status) {
            warn!(resource = %key, %error, "resource tear-down failed");
            self.messages.lock().push(ResourceError {
                resource: key,
                error,
            });
        }
    }
}

/// Objects acquired by an unfinished [`ResourceManager::collect`]; whatever
/// is still held on drop goes back through `release`.
struct PartialSet<'a> {
    manager: &'a ResourceManager,
    objects: BTreeMap<String, Arc<ResourceObject>>,
}

impl Drop for PartialSet<'_> {
    fn drop(&mut self) {
        if self.objects.is_empty() {
            return;
        }
        debug!(count = self.objects.len(), "releasing partially acquired resources");
        self.manager.release_many(std::mem::take(&mut self.objects), None);
    }
}

impl fmt::Debug for ResourceManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let pooled: usize = self.pool.lock().values().map(VecDeque::len).sum();
        f.debug_struct("ResourceManager")
            .field("pooled", &pooled)
            .finish_non_exhaustive()
    }
}
