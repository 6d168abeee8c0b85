//! Process-wide counters for spotting leaked heap objects and handles.
//!
//! Objects are counted when constructed and when their storage is actually
//! dropped, so an object still aliased by another isolate stays live here.

use std::sync::atomic::{AtomicUsize, Ordering};

/// Process-wide allocation counters across every isolate.
#[derive(Debug, Clone, Copy)]
pub struct LeakStats {
    pub objects_allocated: usize,
    pub objects_reclaimed: usize,
    pub handles_registered: usize,
    pub handles_released: usize,
}

impl LeakStats {
    pub fn live_objects(&self) -> usize {
        self.objects_allocated.saturating_sub(self.objects_reclaimed)
    }

    pub fn live_handles(&self) -> usize {
        self.handles_registered.saturating_sub(self.handles_released)
    }
}

static OBJECTS_ALLOCATED: AtomicUsize = AtomicUsize::new(0);
static OBJECTS_RECLAIMED: AtomicUsize = AtomicUsize::new(0);
static HANDLES_REGISTERED: AtomicUsize = AtomicUsize::new(0);
static HANDLES_RELEASED: AtomicUsize = AtomicUsize::new(0);

pub fn record_object_alloc() {
    OBJECTS_ALLOCATED.fetch_add(1, Ordering::Relaxed);
}

pub fn record_object_reclaim(count: usize) {
    OBJECTS_RECLAIMED.fetch_add(count, Ordering::Relaxed);
}

pub fn record_handle_register() {
    HANDLES_REGISTERED.fetch_add(1, Ordering::Relaxed);
}

pub fn record_handle_release() {
    HANDLES_RELEASED.fetch_add(1, Ordering::Relaxed);
}

pub fn snapshot() -> LeakStats {
    LeakStats {
        objects_allocated: OBJECTS_ALLOCATED.load(Ordering::Relaxed),
        objects_reclaimed: OBJECTS_RECLAIMED.load(Ordering::Relaxed),
        handles_registered: HANDLES_REGISTERED.load(Ordering::Relaxed),
        handles_released: HANDLES_RELEASED.load(Ordering::Relaxed),
    }
}
