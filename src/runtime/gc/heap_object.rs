use std::{
    cell::RefCell,
    collections::HashSet,
    fmt,
    rc::{Rc, Weak},
};

use crate::runtime::{
    gc::{
        handle_token::{HandleToken, ObjectId},
        isolate::IsolateCore,
        telemetry::ObjectKind,
    },
    leak_detector,
};

/// Capability every heap-storable payload implements.
///
/// The isolate never inspects payload types; it only sees the kind label and
/// an approximate size through this trait.
pub trait HeapValue: fmt::Debug + 'static {
    fn kind(&self) -> ObjectKind {
        ObjectKind::Opaque
    }

    /// Estimates the shallow byte size of the payload.
    fn shallow_size_bytes(&self) -> usize {
        std::mem::size_of_val(self)
    }
}

/// Object-safe view of a heap object used by the tracked set.
pub trait Trackable {
    fn object_id(&self) -> ObjectId;
    fn handle_count(&self) -> usize;
    fn kind(&self) -> ObjectKind;
    fn shallow_size_bytes(&self) -> usize;
}

/// Set of registration tokens currently pointing at one heap object.
#[derive(Debug, Default, Clone)]
pub struct HandleSet {
    tokens: HashSet<HandleToken>,
}

impl HandleSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `token`. Returns `false` if it was already present.
    pub fn add(&mut self, token: HandleToken) -> bool {
        self.tokens.insert(token)
    }

    /// Unregisters `token`. Returns `false` if it was not present.
    pub fn remove(&mut self, token: HandleToken) -> bool {
        self.tokens.remove(&token)
    }

    pub fn contains(&self, token: HandleToken) -> bool {
        self.tokens.contains(&token)
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

/// A payload living on an isolate's heap together with the tokens of every
/// handle bound to it.
///
/// Heap objects are shared through `Rc`; they are only ever freed by an
/// isolate sweep (or eager release), never by a handle.
///
/// Every eager isolate tracking the object is remembered here so that the
/// release of the last handle reaches all of them, not only the isolate the
/// releasing handle belongs to.
pub struct HeapObject<T> {
    id: ObjectId,
    handles: RefCell<HandleSet>,
    eager_trackers: RefCell<Vec<Weak<IsolateCore>>>,
    value: T,
}

impl<T: HeapValue> HeapObject<T> {
    pub(crate) fn new(value: T) -> Self {
        leak_detector::record_object_alloc();
        Self {
            id: ObjectId::fresh(),
            handles: RefCell::new(HandleSet::new()),
            eager_trackers: RefCell::new(Vec::new()),
            value,
        }
    }

    pub fn id(&self) -> ObjectId {
        self.id
    }

    pub fn value(&self) -> &T {
        &self.value
    }

    /// Registers a handle token. Duplicate registrations are no-ops.
    pub fn add_handle(&self, token: HandleToken) -> bool {
        self.handles.borrow_mut().add(token)
    }

    /// Unregisters a handle token; a missing token is not an error.
    pub fn remove_handle(&self, token: HandleToken) -> bool {
        self.handles.borrow_mut().remove(token)
    }

    pub fn has_handle(&self, token: HandleToken) -> bool {
        self.handles.borrow().contains(token)
    }

    pub fn handle_count(&self) -> usize {
        self.handles.borrow().len()
    }

    /// Remembers an eager isolate that tracks this object. Dead isolates are
    /// pruned and duplicates ignored.
    pub(crate) fn add_eager_tracker(&self, core: &Rc<IsolateCore>) {
        let mut trackers = self.eager_trackers.borrow_mut();
        trackers.retain(|tracker| tracker.strong_count() > 0);
        if !trackers
            .iter()
            .any(|tracker| std::ptr::eq(tracker.as_ptr(), Rc::as_ptr(core)))
        {
            trackers.push(Rc::downgrade(core));
        }
    }

    /// Number of live eager isolates that will hear about the last handle
    /// going away.
    pub fn eager_tracker_count(&self) -> usize {
        self.eager_trackers
            .borrow()
            .iter()
            .filter(|tracker| tracker.strong_count() > 0)
            .count()
    }

    /// Asks every eager isolate still alive to drop this object if it has no
    /// handles left.
    pub(crate) fn release_from_eager_trackers(&self) {
        let trackers: Vec<Rc<IsolateCore>> = self
            .eager_trackers
            .borrow()
            .iter()
            .filter_map(Weak::upgrade)
            .collect();
        for core in trackers {
            core.release_if_unreferenced(self.id);
        }
    }
}

impl<T: HeapValue> Trackable for HeapObject<T> {
    fn object_id(&self) -> ObjectId {
        self.id
    }

    fn handle_count(&self) -> usize {
        HeapObject::handle_count(self)
    }

    fn kind(&self) -> ObjectKind {
        self.value.kind()
    }

    fn shallow_size_bytes(&self) -> usize {
        std::mem::size_of::<Self>() - std::mem::size_of::<T>() + self.value.shallow_size_bytes()
    }
}

impl<T> Drop for HeapObject<T> {
    fn drop(&mut self) {
        leak_detector::record_object_reclaim(1);
    }
}

impl<T: fmt::Debug> fmt::Debug for HeapObject<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HeapObject")
            .field("id", &self.id)
            .field("handles", &self.handles.borrow().len())
            .field("value", &self.value)
            .finish()
    }
}
