pub mod config;
pub mod gc_handle;
pub mod gc_heap;
pub mod handle_token;
pub mod heap_entry;
pub mod heap_object;
pub mod isolate;
pub mod sync;
pub mod telemetry;

pub use config::{ConfigError, IsolateConfig, ReclaimPolicy};
pub use gc_handle::Handle;
pub use gc_heap::GcHeap;
pub use handle_token::{HandleToken, ObjectId};
pub use heap_object::{HandleSet, HeapObject, HeapValue, Trackable};
pub use isolate::Isolate;
pub use sync::{SharedHandle, SharedHeapObject, SharedIsolate, SyncTrackable};
pub use telemetry::{GcTelemetry, HeapSnapshot, ObjectKind};
