//! Heap objects, handles and the isolates that own them.
//!
//! # Lifetime Model
//! An object is retained exactly as long as at least one handle references
//! it, and reclamation is an explicit sweep:
//! - Objects are created only through an isolate (`Isolate::alloc` or a typed
//!   factory such as `HeapString::new`), which tracks them.
//! - Every bound handle contributes one registration token to its referent.
//!   Cloning adds a token; clearing or dropping removes it exactly once.
//! - An object whose last token is gone stays tracked until the next
//!   `Isolate::collect()` unless the isolate uses eager reclamation.
//!
//! There is no tracing: an object held only by a payload that is itself
//! unreachable survives until that payload is swept, and reference cycles
//! through payloads are never reclaimed.
pub mod gc;
pub mod leak_detector;
pub mod value;
