use std::fmt;

use crate::runtime::gc::{Handle, HeapValue, Isolate, ObjectKind};

/// UTF-8 string payload.
///
/// Every call to [`HeapString::new`] allocates a distinct heap object, so two
/// handles to equal strings are still unequal handles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeapString(String);

impl HeapString {
    /// Allocates a string on `isolate`'s heap.
    #[allow(clippy::new_ret_no_self)]
    pub fn new<'i>(isolate: &'i Isolate, value: &str) -> Handle<'i, HeapString> {
        isolate.alloc(HeapString::from(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for HeapString {
    fn from(value: &str) -> Self {
        HeapString(value.to_owned())
    }
}

impl HeapValue for HeapString {
    fn kind(&self) -> ObjectKind {
        ObjectKind::String
    }

    fn shallow_size_bytes(&self) -> usize {
        std::mem::size_of::<Self>() + self.0.capacity()
    }
}

impl fmt::Display for HeapString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{}\"", self.0)
    }
}

/// 64-bit floating point payload.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeapNumber(f64);

impl HeapNumber {
    /// Allocates a number on `isolate`'s heap.
    #[allow(clippy::new_ret_no_self)]
    pub fn new(isolate: &Isolate, value: f64) -> Handle<'_, HeapNumber> {
        isolate.alloc(HeapNumber(value))
    }

    pub fn value(&self) -> f64 {
        self.0
    }
}

impl From<f64> for HeapNumber {
    fn from(value: f64) -> Self {
        HeapNumber(value)
    }
}

impl HeapValue for HeapNumber {
    fn kind(&self) -> ObjectKind {
        ObjectKind::Number
    }
}

impl fmt::Display for HeapNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
