//! Thread-safe isolate.
//!
//! Same lifetime model as [`super::isolate::Isolate`], with one lock per heap
//! object guarding its registration set and a coarse lock on the tracked set
//! taken only for track, collect and queries.

use std::{
    fmt,
    ops::Deref,
    sync::{Arc, Mutex, MutexGuard, PoisonError, Weak},
};

use rayon::prelude::*;
use tracing::{debug, trace};

use crate::runtime::{
    gc::{
        config::{IsolateConfig, ReclaimPolicy},
        gc_heap::GcHeap,
        handle_token::{HandleToken, ObjectId},
        heap_object::{HandleSet, HeapValue, Trackable},
        telemetry::{GcTelemetry, HeapSnapshot, ObjectKind, SlotInfo},
    },
    leak_detector,
};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Trackable object that may be shared across threads.
pub trait SyncTrackable: Trackable + Send + Sync {}

impl<X: Trackable + Send + Sync> SyncTrackable for X {}

/// Heap object whose registration set is guarded by its own lock.
pub struct SharedHeapObject<T> {
    id: ObjectId,
    handles: Mutex<HandleSet>,
    eager_trackers: Mutex<Vec<Weak<SharedCore>>>,
    value: T,
}

impl<T: HeapValue> SharedHeapObject<T> {
    fn new(value: T) -> Self {
        leak_detector::record_object_alloc();
        Self {
            id: ObjectId::fresh(),
            handles: Mutex::new(HandleSet::new()),
            eager_trackers: Mutex::new(Vec::new()),
            value,
        }
    }

    pub fn id(&self) -> ObjectId {
        self.id
    }

    pub fn value(&self) -> &T {
        &self.value
    }

    pub fn add_handle(&self, token: HandleToken) -> bool {
        lock(&self.handles).add(token)
    }

    pub fn remove_handle(&self, token: HandleToken) -> bool {
        lock(&self.handles).remove(token)
    }

    pub fn handle_count(&self) -> usize {
        lock(&self.handles).len()
    }

    fn add_eager_tracker(&self, core: &Arc<SharedCore>) {
        let mut trackers = lock(&self.eager_trackers);
        trackers.retain(|tracker| tracker.strong_count() > 0);
        if !trackers
            .iter()
            .any(|tracker| std::ptr::eq(tracker.as_ptr(), Arc::as_ptr(core)))
        {
            trackers.push(Arc::downgrade(core));
        }
    }

    fn release_from_eager_trackers(&self) {
        let trackers: Vec<Arc<SharedCore>> = lock(&self.eager_trackers)
            .iter()
            .filter_map(Weak::upgrade)
            .collect();
        for core in trackers {
            core.release_if_unreferenced(self.id);
        }
    }
}

impl<T> Drop for SharedHeapObject<T> {
    fn drop(&mut self) {
        leak_detector::record_object_reclaim(1);
    }
}

impl<T: HeapValue> Trackable for SharedHeapObject<T> {
    fn object_id(&self) -> ObjectId {
        self.id
    }

    fn handle_count(&self) -> usize {
        SharedHeapObject::handle_count(self)
    }

    fn kind(&self) -> ObjectKind {
        self.value.kind()
    }

    fn shallow_size_bytes(&self) -> usize {
        std::mem::size_of::<Self>() - std::mem::size_of::<T>() + self.value.shallow_size_bytes()
    }
}

/// Isolate whose handles may be cloned, cleared and dropped from any thread.
///
/// Lock order is tracked set, then telemetry, then a single object's
/// registration set.
pub struct SharedIsolate {
    core: Arc<SharedCore>,
}

struct SharedCore {
    heap: Mutex<GcHeap<Arc<dyn SyncTrackable>>>,
    config: IsolateConfig,
    telemetry: Option<Mutex<GcTelemetry>>,
}

impl SharedCore {
    fn release_if_unreferenced(&self, id: ObjectId) {
        let released = lock(&self.heap).release_if_unreferenced(id);
        if let Some(object) = released {
            if let Some(telemetry) = &self.telemetry {
                lock(telemetry).record_reclaim(object.kind(), object.shallow_size_bytes());
            }
            debug!(object = id.raw(), "eagerly reclaimed shared heap object");
        }
    }
}

impl Default for SharedIsolate {
    fn default() -> Self {
        Self::new()
    }
}

impl SharedIsolate {
    pub fn new() -> Self {
        Self::with_config(IsolateConfig::default())
    }

    pub fn with_config(config: IsolateConfig) -> Self {
        let telemetry = config.telemetry.then(|| Mutex::new(GcTelemetry::new()));
        Self {
            core: Arc::new(SharedCore {
                heap: Mutex::new(GcHeap::new()),
                config,
                telemetry,
            }),
        }
    }

    pub fn config(&self) -> &IsolateConfig {
        &self.core.config
    }

    pub fn alloc<T: HeapValue + Send + Sync>(&self, value: T) -> SharedHandle<'_, T> {
        let object = Arc::new(SharedHeapObject::new(value));
        self.track(object.clone());
        SharedHandle::bind(self, object)
    }

    pub fn track<T: HeapValue + Send + Sync>(&self, object: Arc<SharedHeapObject<T>>) -> bool {
        let id = object.id();
        let added = lock(&self.core.heap).track(object.clone());
        if !added {
            return false;
        }

        if let Some(telemetry) = &self.core.telemetry {
            lock(telemetry).record_alloc(
                Trackable::kind(&*object),
                Trackable::shallow_size_bytes(&*object),
            );
        }
        if self.core.config.reclaim == ReclaimPolicy::Eager {
            object.add_eager_tracker(&self.core);
        }
        trace!(object = id.raw(), "tracked shared heap object");
        true
    }

    /// Frees every tracked object without handles.
    ///
    /// Collectible slots are found with a parallel scan while the tracked-set
    /// lock is held; each removal re-checks its object's count.
    pub fn collect(&self) -> usize {
        let reclaimed = {
            let mut heap = lock(&self.core.heap);
            if let Some(telemetry) = &self.core.telemetry {
                lock(telemetry).begin_cycle(heap.live_count());
            }

            let slots: Vec<u32> = heap
                .entries()
                .par_iter()
                .enumerate()
                .filter_map(|(slot, entry)| match entry {
                    Some(entry) if entry.object().handle_count() == 0 => Some(slot as u32),
                    _ => None,
                })
                .collect();
            let reclaimed = heap.sweep_slots(&slots);

            if let Some(telemetry) = &self.core.telemetry {
                let mut telemetry = lock(telemetry);
                for object in &reclaimed {
                    telemetry.record_reclaim(object.kind(), object.shallow_size_bytes());
                }
                for (_, entry) in heap.iter() {
                    telemetry.record_survival(entry.object().kind());
                }
                telemetry.end_cycle(heap.live_count(), reclaimed.len());
            }
            reclaimed
        };

        let count = reclaimed.len();
        debug!(
            reclaimed = count,
            remaining = self.size(),
            "shared collection finished"
        );
        drop(reclaimed);
        count
    }

    pub fn size(&self) -> usize {
        lock(&self.core.heap).live_count()
    }

    pub fn contains(&self, id: ObjectId) -> bool {
        lock(&self.core.heap).contains(id)
    }

    pub fn handle_count(&self, id: ObjectId) -> Option<usize> {
        lock(&self.core.heap).handle_count(id)
    }

    pub fn should_collect(&self) -> bool {
        match self.core.config.collect_threshold {
            Some(threshold) => self.size() >= threshold,
            None => false,
        }
    }

    pub fn total_collections(&self) -> usize {
        lock(&self.core.heap).total_collections()
    }

    pub fn total_reclaimed(&self) -> usize {
        lock(&self.core.heap).total_reclaimed()
    }

    pub fn snapshot(&self) -> HeapSnapshot {
        let heap = lock(&self.core.heap);
        let slots = heap
            .iter()
            .map(|(slot, entry)| SlotInfo {
                slot,
                kind: entry.object().kind(),
                handles: entry.object().handle_count(),
                bytes: entry.object().shallow_size_bytes(),
            })
            .collect();
        HeapSnapshot::from_slots(heap.capacity(), heap.free_list_len(), slots)
    }

    /// Full telemetry report, or `None` when telemetry is disabled.
    pub fn telemetry_report(&self) -> Option<String> {
        let telemetry = self.core.telemetry.as_ref()?;
        let snapshot = self.snapshot();
        Some(lock(telemetry).report_full(&snapshot))
    }
}

impl fmt::Debug for SharedIsolate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedIsolate")
            .field("tracked", &self.size())
            .field("config", &self.core.config)
            .finish()
    }
}

/// Thread-safe counterpart of [`super::gc_handle::Handle`].
pub struct SharedHandle<'i, T: HeapValue + Send + Sync> {
    isolate: &'i SharedIsolate,
    token: HandleToken,
    referent: Option<Arc<SharedHeapObject<T>>>,
}

impl<'i, T: HeapValue + Send + Sync> SharedHandle<'i, T> {
    fn bind(isolate: &'i SharedIsolate, object: Arc<SharedHeapObject<T>>) -> Self {
        let token = HandleToken::fresh();
        object.add_handle(token);
        leak_detector::record_handle_register();
        Self {
            isolate,
            token,
            referent: Some(object),
        }
    }

    pub fn empty(isolate: &'i SharedIsolate) -> Self {
        Self {
            isolate,
            token: HandleToken::fresh(),
            referent: None,
        }
    }

    pub fn from_handle(isolate: &'i SharedIsolate, other: &SharedHandle<'_, T>) -> Self {
        match &other.referent {
            Some(object) => {
                isolate.track(object.clone());
                Self::bind(isolate, object.clone())
            }
            None => Self::empty(isolate),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.referent.is_none()
    }

    pub fn clear(&mut self) {
        self.release();
    }

    pub fn token(&self) -> HandleToken {
        self.token
    }

    pub fn object_id(&self) -> Option<ObjectId> {
        self.referent.as_ref().map(|object| object.id())
    }

    pub fn try_get(&self) -> Option<&T> {
        self.referent.as_deref().map(SharedHeapObject::value)
    }

    /// Panics if the handle is empty.
    pub fn heap_object(&self) -> &SharedHeapObject<T> {
        match &self.referent {
            Some(object) => object,
            None => panic!("dereferenced an empty handle ({})", self.token),
        }
    }

    pub fn handle_count(&self) -> usize {
        self.heap_object().handle_count()
    }

    fn release(&mut self) {
        let Some(object) = self.referent.take() else {
            return;
        };
        object.remove_handle(self.token);
        leak_detector::record_handle_release();
        if object.handle_count() == 0 {
            object.release_from_eager_trackers();
        }
    }
}

impl<T: HeapValue + Send + Sync> Clone for SharedHandle<'_, T> {
    fn clone(&self) -> Self {
        Self::from_handle(self.isolate, self)
    }
}

impl<T: HeapValue + Send + Sync> Drop for SharedHandle<'_, T> {
    fn drop(&mut self) {
        self.release();
    }
}

impl<T: HeapValue + Send + Sync> Deref for SharedHandle<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        self.heap_object().value()
    }
}

impl<T, S> PartialEq<SharedHandle<'_, S>> for SharedHandle<'_, T>
where
    T: HeapValue + Send + Sync,
    S: HeapValue + Send + Sync,
{
    fn eq(&self, other: &SharedHandle<'_, S>) -> bool {
        self.object_id() == other.object_id()
    }
}

impl<T: HeapValue + Send + Sync> Eq for SharedHandle<'_, T> {}

impl<T: HeapValue + Send + Sync> fmt::Debug for SharedHandle<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedHandle")
            .field("token", &self.token)
            .field("object", &self.object_id())
            .finish()
    }
}
