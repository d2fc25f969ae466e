// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Mark-and-sweep heap with a protection arena.

use rustc_hash::FxHashMap;
use tracing::trace;

use super::object::Object;
use crate::value::Value;

/// Live object count that triggers the first collection.
const INITIAL_THRESHOLD: usize = 256;

/// A generation-checked reference to a heap slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjRef {
    index: u32,
    generation: u32,
}

impl ObjRef {
    /// Slot index.
    pub fn index(&self) -> u32 {
        self.index
    }

    /// Generation of the slot when this reference was created.
    pub fn generation(&self) -> u32 {
        self.generation
    }
}

struct Slot {
    generation: u32,
    marked: bool,
    object: Option<Object>,
}

/// The object heap.
pub struct Heap {
    slots: Vec<Slot>,
    free: Vec<u32>,
    live: usize,
    threshold: usize,
    stress: bool,
    arena: Vec<ObjRef>,
    roots: FxHashMap<ObjRef, usize>,
    collections: usize,
}

impl Heap {
    /// Creates an empty heap.
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            live: 0,
            threshold: INITIAL_THRESHOLD,
            stress: false,
            arena: Vec::new(),
            roots: FxHashMap::default(),
            collections: 0,
        }
    }

    /// Returns true when the next allocation should be preceded by a
    /// collection.
    pub fn needs_collection(&self) -> bool {
        self.stress || self.live >= self.threshold
    }

    /// Stores `object` and protects it in the arena.
    ///
    /// The caller is responsible for collecting first when
    /// [`needs_collection`](Self::needs_collection) says so.
    pub fn alloc(&mut self, object: Object) -> ObjRef {
        let r = match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                slot.object = Some(object);
                slot.marked = false;
                ObjRef {
                    index,
                    generation: slot.generation,
                }
            }
            None => {
                let index = self.slots.len() as u32;
                self.slots.push(Slot {
                    generation: 0,
                    marked: false,
                    object: Some(object),
                });
                ObjRef {
                    index,
                    generation: 0,
                }
            }
        };
        self.live += 1;
        self.arena.push(r);
        r
    }

    /// Returns the object behind `r`, or `None` if it was collected.
    pub fn get(&self, r: ObjRef) -> Option<&Object> {
        let slot = self.slots.get(r.index as usize)?;
        if slot.generation != r.generation {
            return None;
        }
        slot.object.as_ref()
    }

    /// Mutable variant of [`get`](Self::get).
    pub fn get_mut(&mut self, r: ObjRef) -> Option<&mut Object> {
        let slot = self.slots.get_mut(r.index as usize)?;
        if slot.generation != r.generation {
            return None;
        }
        slot.object.as_mut()
    }

    /// Returns true if `r` still points at a live object.
    pub fn is_live(&self, r: ObjRef) -> bool {
        self.get(r).is_some()
    }

    // ========================================================================
    // Arena
    // ========================================================================

    /// Current arena index.
    pub fn arena_save(&self) -> usize {
        self.arena.len()
    }

    /// Drops protection for everything allocated since `index`.
    pub fn arena_restore(&mut self, index: usize) {
        self.arena.truncate(index);
    }

    /// Protects `r` in the arena.
    pub fn protect(&mut self, r: ObjRef) {
        self.arena.push(r);
    }

    // ========================================================================
    // Roots
    // ========================================================================

    /// Registers `r` as a root. Registrations are counted.
    pub fn register(&mut self, r: ObjRef) {
        let count = self.roots.entry(r).or_insert(0);
        *count += 1;
        trace!(index = r.index, count = *count, "registered gc root");
    }

    /// Removes one registration of `r`. Returns false if it was not
    /// registered.
    pub fn unregister(&mut self, r: ObjRef) -> bool {
        let Some(count) = self.roots.get_mut(&r) else {
            return false;
        };
        *count -= 1;
        trace!(index = r.index, count = *count, "unregistered gc root");
        if *count == 0 {
            self.roots.remove(&r);
        }
        true
    }

    /// Registration count of `r`.
    pub fn root_count(&self, r: ObjRef) -> usize {
        self.roots.get(&r).copied().unwrap_or(0)
    }

    // ========================================================================
    // Collection
    // ========================================================================

    /// Runs a full mark-and-sweep cycle and returns the number of objects
    /// freed.
    pub fn collect<'v>(&mut self, extra_roots: impl IntoIterator<Item = &'v Value>) -> usize {
        let mut worklist: Vec<ObjRef> = Vec::new();
        worklist.extend(self.arena.iter().copied());
        worklist.extend(self.roots.keys().copied());
        worklist.extend(extra_roots.into_iter().filter_map(Value::as_object));

        while let Some(r) = worklist.pop() {
            let Some(slot) = self.slots.get_mut(r.index as usize) else {
                continue;
            };
            if slot.generation != r.generation || slot.marked {
                continue;
            }
            slot.marked = true;
            if let Some(object) = &slot.object {
                object.for_each_child(|v| {
                    if let Some(child) = v.as_object() {
                        worklist.push(child);
                    }
                });
            }
        }

        let mut freed = 0;
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if slot.object.is_none() {
                continue;
            }
            if slot.marked {
                slot.marked = false;
                continue;
            }
            slot.object = None;
            slot.generation = slot.generation.wrapping_add(1);
            self.free.push(index as u32);
            freed += 1;
        }

        self.live -= freed;
        self.threshold = (self.live * 2).max(INITIAL_THRESHOLD);
        self.collections += 1;
        trace!(freed, live = self.live, "gc cycle finished");
        freed
    }

    /// Enables or disables stress mode (collect before every allocation).
    pub fn set_stress(&mut self, stress: bool) {
        self.stress = stress;
    }

    /// Returns true in stress mode.
    pub fn is_stress(&self) -> bool {
        self.stress
    }

    /// Number of live objects.
    pub fn live(&self) -> usize {
        self.live
    }

    /// Number of completed collection cycles.
    pub fn collections(&self) -> usize {
        self.collections
    }
}

impl Default for Heap {
    fn default() -> Self {
        Self::new()
    }
}
