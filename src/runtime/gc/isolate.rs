use std::{cell::RefCell, fmt, rc::Rc};

use tracing::{debug, trace};

use crate::runtime::gc::{
    config::{IsolateConfig, ReclaimPolicy},
    gc_handle::Handle,
    gc_heap::GcHeap,
    handle_token::ObjectId,
    heap_object::{HeapObject, HeapValue, Trackable},
    telemetry::{GcTelemetry, HeapSnapshot, SlotInfo, format_heap_snapshot},
};

/// Owning domain for heap objects.
///
/// The isolate tracks every object allocated through it and frees objects
/// without handles only when [`Isolate::collect`] is called (or on release of
/// the last handle under [`ReclaimPolicy::Eager`]). It is single-threaded;
/// see [`crate::runtime::gc::sync::SharedIsolate`] for the locked variant.
pub struct Isolate {
    core: Rc<IsolateCore>,
}

/// State shared between an isolate and the objects it eagerly reclaims.
///
/// Objects only ever hold a `Weak` to it, so an isolate is never kept alive
/// by its heap.
pub(crate) struct IsolateCore {
    heap: RefCell<GcHeap<Rc<dyn Trackable>>>,
    config: IsolateConfig,
    telemetry: Option<RefCell<GcTelemetry>>,
}

impl IsolateCore {
    /// Untracks `id` if it has no handles left and records the reclaim.
    pub(crate) fn release_if_unreferenced(&self, id: ObjectId) {
        let released = self.heap.borrow_mut().release_if_unreferenced(id);
        if let Some(object) = released {
            if let Some(telemetry) = &self.telemetry {
                telemetry
                    .borrow_mut()
                    .record_reclaim(object.kind(), object.shallow_size_bytes());
            }
            debug!(object = id.raw(), "eagerly reclaimed heap object");
        }
    }
}

impl Default for Isolate {
    fn default() -> Self {
        Self::new()
    }
}

impl Isolate {
    /// Creates an isolate with deferred reclamation and no telemetry.
    pub fn new() -> Self {
        Self::with_config(IsolateConfig::default())
    }

    pub fn with_config(config: IsolateConfig) -> Self {
        let telemetry = config.telemetry.then(|| RefCell::new(GcTelemetry::new()));
        Self {
            core: Rc::new(IsolateCore {
                heap: RefCell::new(GcHeap::new()),
                config,
                telemetry,
            }),
        }
    }

    pub fn config(&self) -> &IsolateConfig {
        &self.core.config
    }

    /// Allocates `value` on this isolate's heap and returns a bound handle.
    pub fn alloc<T: HeapValue>(&self, value: T) -> Handle<'_, T> {
        let object = Rc::new(HeapObject::new(value));
        self.track(object.clone());
        Handle::bind(self, object)
    }

    /// Adds an object to the tracked set. Returns `false` if it was already
    /// tracked.
    ///
    /// Telemetry counts every object that enters the tracked set, whether it
    /// was allocated here or adopted through a handle copy.
    pub fn track<T: HeapValue>(&self, object: Rc<HeapObject<T>>) -> bool {
        let id = object.id();
        let added = self.core.heap.borrow_mut().track(object.clone());
        if !added {
            return false;
        }

        if let Some(telemetry) = &self.core.telemetry {
            telemetry.borrow_mut().record_alloc(
                Trackable::kind(&*object),
                Trackable::shallow_size_bytes(&*object),
            );
        }
        if self.core.config.reclaim == ReclaimPolicy::Eager {
            object.add_eager_tracker(&self.core);
        }
        trace!(object = id.raw(), "tracked heap object");
        true
    }

    /// Frees every tracked object that has no handles left and returns how
    /// many were reclaimed.
    pub fn collect(&self) -> usize {
        let reclaimed = {
            let mut heap = self.core.heap.borrow_mut();
            if let Some(telemetry) = &self.core.telemetry {
                telemetry.borrow_mut().begin_cycle(heap.live_count());
            }

            let reclaimed = heap.sweep();

            if let Some(telemetry) = &self.core.telemetry {
                let mut telemetry = telemetry.borrow_mut();
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
            "collection finished"
        );

        // Payload destructors may release handles into this isolate, so they
        // run only after the heap borrow is gone.
        drop(reclaimed);
        count
    }

    /// Number of currently tracked objects.
    pub fn size(&self) -> usize {
        self.core.heap.borrow().live_count()
    }

    pub fn contains(&self, id: ObjectId) -> bool {
        self.core.heap.borrow().contains(id)
    }

    /// Handle count of a tracked object, or `None` if it is not tracked.
    pub fn handle_count(&self, id: ObjectId) -> Option<usize> {
        self.core.heap.borrow().handle_count(id)
    }

    /// Whether the configured advisory threshold has been reached.
    pub fn should_collect(&self) -> bool {
        match self.core.config.collect_threshold {
            Some(threshold) => self.size() >= threshold,
            None => false,
        }
    }

    pub fn total_collections(&self) -> usize {
        self.core.heap.borrow().total_collections()
    }

    pub fn total_reclaimed(&self) -> usize {
        self.core.heap.borrow().total_reclaimed()
    }

    pub fn snapshot(&self) -> HeapSnapshot {
        let heap = self.core.heap.borrow();
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
        Some(telemetry.borrow().report_full(&snapshot))
    }

    pub fn heap_report(&self) -> String {
        format_heap_snapshot(&self.snapshot())
    }
}

impl fmt::Debug for Isolate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Isolate")
            .field("tracked", &self.size())
            .field("config", &self.core.config)
            .finish()
    }
}
