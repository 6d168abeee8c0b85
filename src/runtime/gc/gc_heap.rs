use std::{collections::HashMap, ops::Deref};

use crate::runtime::gc::{handle_token::ObjectId, heap_entry::HeapEntry, heap_object::Trackable};

/// Tracked-object set shared by the single-threaded and locked isolates.
///
/// Objects live in a slab of slots; freed slots are reused through a
/// free-list. An id index gives set semantics, so the same object can never
/// occupy two slots. `P` is the shared pointer the owning isolate keeps
/// (`Rc<dyn Trackable>` or `Arc<dyn SyncTrackable>`).
pub struct GcHeap<P> {
    entries: Vec<Option<HeapEntry<P>>>,
    free_list: Vec<u32>,
    index: HashMap<ObjectId, u32>,
    total_tracked: usize,
    total_collections: usize,
    total_reclaimed: usize,
}

impl<P> Default for GcHeap<P>
where
    P: Deref,
    P::Target: Trackable,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<P> GcHeap<P>
where
    P: Deref,
    P::Target: Trackable,
{
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            free_list: Vec::new(),
            index: HashMap::new(),
            total_tracked: 0,
            total_collections: 0,
            total_reclaimed: 0,
        }
    }

    /// Adds `object` to the tracked set. Returns `false` if its id is
    /// already tracked, in which case `object` is dropped.
    pub fn track(&mut self, object: P) -> bool {
        let id = object.object_id();
        if self.index.contains_key(&id) {
            return false;
        }

        let entry = HeapEntry {
            object,
            survived: 0,
        };

        let slot = if let Some(slot) = self.free_list.pop() {
            self.entries[slot as usize] = Some(entry);
            slot
        } else {
            let slot = self.entries.len() as u32;
            self.entries.push(Some(entry));
            slot
        };

        self.index.insert(id, slot);
        self.total_tracked += 1;
        true
    }

    pub fn contains(&self, id: ObjectId) -> bool {
        self.index.contains_key(&id)
    }

    pub fn get(&self, id: ObjectId) -> Option<&P> {
        let slot = *self.index.get(&id)?;
        self.entries[slot as usize].as_ref().map(|entry| &entry.object)
    }

    pub fn slot_of(&self, id: ObjectId) -> Option<u32> {
        self.index.get(&id).copied()
    }

    pub fn handle_count(&self, id: ObjectId) -> Option<usize> {
        self.get(id).map(|object| object.handle_count())
    }

    /// Number of tracked objects.
    pub fn live_count(&self) -> usize {
        self.index.len()
    }

    /// Number of slots ever allocated, occupied or free.
    pub fn capacity(&self) -> usize {
        self.entries.len()
    }

    pub fn free_list_len(&self) -> usize {
        self.free_list.len()
    }

    pub fn total_tracked(&self) -> usize {
        self.total_tracked
    }

    pub fn total_collections(&self) -> usize {
        self.total_collections
    }

    pub fn total_reclaimed(&self) -> usize {
        self.total_reclaimed
    }

    pub fn entries(&self) -> &[Option<HeapEntry<P>>] {
        &self.entries
    }

    /// Iterates occupied slots in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, &HeapEntry<P>)> + '_ {
        self.entries
            .iter()
            .enumerate()
            .filter_map(|(slot, entry)| entry.as_ref().map(|entry| (slot as u32, entry)))
    }

    /// Removes every tracked object without remaining handles.
    ///
    /// The removed pointers are handed back instead of dropped so the caller
    /// can release its borrow on the heap before payload destructors run.
    pub fn sweep(&mut self) -> Vec<P> {
        let mut reclaimed = Vec::new();
        let mut i = 0;
        let len = self.entries.len();
        while i < len {
            if let Some(object) = self.release_slot_if_unreferenced(i as u32) {
                reclaimed.push(object);
            } else if let Some(entry) = &mut self.entries[i] {
                entry.survived += 1;
            }
            i += 1;
        }

        self.total_collections += 1;
        reclaimed
    }

    /// Sweeps only the given slots, re-checking each one.
    ///
    /// Used when the collectible set was computed outside this heap (for
    /// example by a parallel scan); every other entry counts as a survivor.
    pub fn sweep_slots(&mut self, slots: &[u32]) -> Vec<P> {
        let mut reclaimed = Vec::with_capacity(slots.len());
        for &slot in slots {
            if let Some(object) = self.release_slot_if_unreferenced(slot) {
                reclaimed.push(object);
            }
        }

        for entry in self.entries.iter_mut().flatten() {
            entry.survived += 1;
        }

        self.total_collections += 1;
        reclaimed
    }

    /// Untracks a single object if it has no handles left.
    pub fn release_if_unreferenced(&mut self, id: ObjectId) -> Option<P> {
        let slot = *self.index.get(&id)?;
        self.release_slot_if_unreferenced(slot)
    }

    fn release_slot_if_unreferenced(&mut self, slot: u32) -> Option<P> {
        let idx = slot as usize;
        let collectible = match self.entries.get(idx) {
            Some(Some(entry)) => entry.object.handle_count() == 0,
            _ => false,
        };
        if !collectible {
            return None;
        }

        let entry = self.entries[idx].take()?;
        self.index.remove(&entry.object.object_id());
        self.free_list.push(slot);
        self.total_reclaimed += 1;
        Some(entry.object)
    }
}
