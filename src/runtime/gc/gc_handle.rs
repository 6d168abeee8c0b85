use std::{fmt, ops::Deref, rc::Rc};

use tracing::trace;

use crate::runtime::{
    gc::{
        handle_token::{HandleToken, ObjectId},
        heap_object::{HeapObject, HeapValue},
        isolate::Isolate,
    },
    leak_detector,
};

/// Scoped, non-owning reference to an object on an isolate's heap.
///
/// A bound handle contributes exactly one registration token to its
/// referent. Cloning registers a new token on the same object; clearing or
/// dropping unregisters it. The object itself is only freed by the isolate.
///
/// The handle borrows its isolate, so it cannot outlive it. Dereferencing an
/// empty handle panics.
pub struct Handle<'i, T: HeapValue> {
    isolate: &'i Isolate,
    token: HandleToken,
    referent: Option<Rc<HeapObject<T>>>,
}

impl<'i, T: HeapValue> Handle<'i, T> {
    /// Binds a fresh handle to an object the isolate already tracks.
    pub(crate) fn bind(isolate: &'i Isolate, object: Rc<HeapObject<T>>) -> Self {
        let token = HandleToken::fresh();
        object.add_handle(token);
        leak_detector::record_handle_register();
        trace!(
            token = token.raw(),
            object = object.id().raw(),
            "handle bound"
        );
        Self {
            isolate,
            token,
            referent: Some(object),
        }
    }

    /// Creates a handle that references nothing.
    pub fn empty(isolate: &'i Isolate) -> Self {
        Self {
            isolate,
            token: HandleToken::fresh(),
            referent: None,
        }
    }

    /// Copy-constructs a handle owned by `isolate` aliasing `other`'s
    /// referent.
    ///
    /// The referent is tracked by `isolate` if it was not already. Copying an
    /// empty handle yields an empty handle.
    pub fn from_handle(isolate: &'i Isolate, other: &Handle<'_, T>) -> Self {
        match &other.referent {
            Some(object) => {
                isolate.track(object.clone());
                Self::bind(isolate, object.clone())
            }
            None => Self::empty(isolate),
        }
    }

    /// Re-points this handle at `other`'s referent, keeping its own token.
    pub fn assign(&mut self, other: &Handle<'_, T>) {
        if self.object_id() == other.object_id() {
            return;
        }

        self.release();
        if let Some(object) = &other.referent {
            self.isolate.track(object.clone());
            object.add_handle(self.token);
            leak_detector::record_handle_register();
            self.referent = Some(object.clone());
        }
    }

    pub fn is_empty(&self) -> bool {
        self.referent.is_none()
    }

    /// Unregisters from the referent and becomes empty. No-op when empty.
    pub fn clear(&mut self) {
        self.release();
    }

    pub fn token(&self) -> HandleToken {
        self.token
    }

    pub fn isolate(&self) -> &'i Isolate {
        self.isolate
    }

    pub fn object_id(&self) -> Option<ObjectId> {
        self.referent.as_ref().map(|object| object.id())
    }

    pub fn try_get(&self) -> Option<&T> {
        self.referent.as_deref().map(HeapObject::value)
    }

    /// The referenced heap object.
    ///
    /// Panics if the handle is empty.
    pub fn heap_object(&self) -> &HeapObject<T> {
        match &self.referent {
            Some(object) => object,
            None => panic!("dereferenced an empty handle ({})", self.token),
        }
    }

    /// Number of handles currently bound to the referent.
    ///
    /// Panics if the handle is empty.
    pub fn handle_count(&self) -> usize {
        self.heap_object().handle_count()
    }

    fn release(&mut self) {
        let Some(object) = self.referent.take() else {
            return;
        };
        object.remove_handle(self.token);
        leak_detector::record_handle_release();
        trace!(
            token = self.token.raw(),
            object = object.id().raw(),
            "handle released"
        );
        if object.handle_count() == 0 {
            object.release_from_eager_trackers();
        }
    }
}

impl<T: HeapValue> Clone for Handle<'_, T> {
    fn clone(&self) -> Self {
        Self::from_handle(self.isolate, self)
    }

    fn clone_from(&mut self, source: &Self) {
        self.assign(source);
    }
}

impl<T: HeapValue> Drop for Handle<'_, T> {
    fn drop(&mut self) {
        self.release();
    }
}

impl<T: HeapValue> Deref for Handle<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        self.heap_object().value()
    }
}

/// Handles are equal when they reference the same heap object; two empty
/// handles are equal.
impl<T: HeapValue, S: HeapValue> PartialEq<Handle<'_, S>> for Handle<'_, T> {
    fn eq(&self, other: &Handle<'_, S>) -> bool {
        self.object_id() == other.object_id()
    }
}

impl<T: HeapValue> Eq for Handle<'_, T> {}

impl<T: HeapValue> fmt::Debug for Handle<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handle")
            .field("token", &self.token)
            .field("object", &self.object_id())
            .finish()
    }
}
