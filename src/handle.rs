// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Handle Registry.
//!
//! Pinned callable units are handed out as [`ProcHandle`] tokens: a slot
//! index plus a generation, checked against the registry that issued them.
//! A released or foreign handle never resolves to a value.
//!
//! Raw tokens are laid out as `registry:16 | generation:16 | slot:32`.
//! Registry ids come from a process-wide counter and repeat only after
//! 65536 registries have been created.

use std::sync::atomic::{AtomicU16, Ordering};

static NEXT_REGISTRY_ID: AtomicU16 = AtomicU16::new(1);

/// A token for a pinned callable unit.
///
/// Not `Clone`: releasing consumes the handle, so a handle cannot be
/// released twice from safe code.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct ProcHandle {
    registry: u16,
    generation: u16,
    slot: u32,
}

impl ProcHandle {
    /// Encodes the handle as a non-zero integer token for foreign callers.
    pub fn to_raw(&self) -> u64 {
        (u64::from(self.registry) << 48)
            | (u64::from(self.generation) << 32)
            | u64::from(self.slot)
    }

    /// Slot index inside the registry.
    pub fn slot(&self) -> u32 {
        self.slot
    }
}

struct Entry<V> {
    generation: u16,
    value: Option<V>,
}

/// Slot map from handles to pinned values.
pub struct HandleRegistry<V> {
    id: u16,
    entries: Vec<Entry<V>>,
    free: Vec<u32>,
    len: usize,
}

impl<V: Copy> HandleRegistry<V> {
    /// Creates an empty registry with a process-unique id.
    pub fn new() -> Self {
        Self {
            id: NEXT_REGISTRY_ID.fetch_add(1, Ordering::Relaxed),
            entries: Vec::new(),
            free: Vec::new(),
            len: 0,
        }
    }

    /// Stores `value` and returns its handle.
    pub fn insert(&mut self, value: V) -> ProcHandle {
        let slot = match self.free.pop() {
            Some(slot) => {
                self.entries[slot as usize].value = Some(value);
                slot
            }
            None => {
                // generations start at 1 so a raw token is never zero
                self.entries.push(Entry {
                    generation: 1,
                    value: Some(value),
                });
                (self.entries.len() - 1) as u32
            }
        };
        self.len += 1;
        ProcHandle {
            registry: self.id,
            slot,
            generation: self.entries[slot as usize].generation,
        }
    }

    /// Returns the value behind `handle` if it is still registered here.
    pub fn get(&self, handle: &ProcHandle) -> Option<V> {
        if handle.registry != self.id {
            return None;
        }
        self.lookup(handle.slot, handle.generation)
    }

    /// Removes `handle`, returning its value. `None` means the handle was
    /// foreign or already released.
    pub fn remove(&mut self, handle: ProcHandle) -> Option<V> {
        if handle.registry != self.id {
            return None;
        }
        self.lookup(handle.slot, handle.generation)?;
        let entry = &mut self.entries[handle.slot as usize];
        let value = entry.value.take();
        entry.generation = entry.generation.wrapping_add(1).max(1);
        self.free.push(handle.slot);
        self.len -= 1;
        value
    }

    /// Rebuilds a handle from a token made by [`ProcHandle::to_raw`], if
    /// the token names a live entry of this registry.
    pub fn from_raw(&self, raw: u64) -> Option<ProcHandle> {
        let registry = (raw >> 48) as u16;
        let generation = (raw >> 32) as u16;
        let slot = raw as u32;
        if registry != self.id {
            return None;
        }
        self.lookup(slot, generation)?;
        Some(ProcHandle {
            registry: self.id,
            slot,
            generation,
        })
    }

    /// Removes every entry, returning the values.
    pub fn drain(&mut self) -> Vec<V> {
        let mut values = Vec::with_capacity(self.len);
        for (slot, entry) in self.entries.iter_mut().enumerate() {
            if let Some(value) = entry.value.take() {
                entry.generation = entry.generation.wrapping_add(1).max(1);
                self.free.push(slot as u32);
                values.push(value);
            }
        }
        self.len = 0;
        values
    }

    /// Number of live handles.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns true when no handle is live.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn lookup(&self, slot: u32, generation: u16) -> Option<V> {
        let entry = self.entries.get(slot as usize)?;
        if entry.generation != generation {
            return None;
        }
        entry.value
    }
}

impl<V: Copy> Default for HandleRegistry<V> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_get_remove() {
        let mut registry = HandleRegistry::new();
        let handle = registry.insert(7u32);
        assert_eq!(registry.get(&handle), Some(7));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.remove(handle), Some(7));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_released_token_does_not_resolve_after_reuse() {
        let mut registry = HandleRegistry::new();
        let first = registry.insert('a');
        let raw = first.to_raw();
        registry.remove(first);

        let second = registry.insert('b');
        assert_eq!(second.slot(), 0);
        assert!(registry.from_raw(raw).is_none());
        let resolved = registry.from_raw(second.to_raw()).unwrap();
        assert_eq!(registry.get(&resolved), Some('b'));
    }

    #[test]
    fn test_foreign_handle_is_rejected() {
        let mut a = HandleRegistry::new();
        let mut b = HandleRegistry::new();
        let handle = a.insert(1);
        b.insert(2);
        assert_eq!(b.get(&handle), None);
        assert_eq!(b.remove(handle), None);
        assert_eq!(b.len(), 1);
    }

    #[test]
    fn test_raw_token_is_never_zero() {
        let mut registry = HandleRegistry::new();
        let handle = registry.insert(());
        assert_ne!(handle.to_raw(), 0);
        assert!(registry.from_raw(0).is_none());
    }

    #[test]
    fn test_drain() {
        let mut registry = HandleRegistry::new();
        let h1 = registry.insert(1);
        registry.insert(2);
        let mut values = registry.drain();
        values.sort();
        assert_eq!(values, vec![1, 2]);
        assert!(registry.get(&h1).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_foreign_token_is_rejected() {
        let mut a = HandleRegistry::new();
        let mut b = HandleRegistry::new();
        let from_a = a.insert('a');
        let from_b = b.insert('b');
        // same slot and generation, different registry
        assert_eq!(from_a.slot(), from_b.slot());
        assert_ne!(from_a.to_raw(), from_b.to_raw());

        assert!(b.from_raw(from_a.to_raw()).is_none());
        assert!(a.from_raw(from_b.to_raw()).is_none());
        assert_eq!(b.get(&from_b), Some('b'));
    }

    #[test]
    fn test_generation_wraps_without_reaching_zero() {
        let mut registry = HandleRegistry::new();
        for _ in 0..(u32::from(u16::MAX) + 2) {
            let handle = registry.insert(0u8);
            assert_ne!((handle.to_raw() >> 32) & 0xFFFF, 0);
            registry.remove(handle);
        }
    }
}
