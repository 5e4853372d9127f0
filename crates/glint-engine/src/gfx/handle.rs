//! Generational handle arena.
//!
//! Every GPU resource registry in this crate stores its descriptors in an
//! [`Arena`] and hands out [`Handle`]s (slot index + generation). A handle to
//! a removed slot goes stale instead of silently aliasing whatever resource
//! reuses the slot, which is the failure mode of plain integer ids.

use std::marker::PhantomData;

/// Typed handle into an [`Arena<T>`].
///
/// Copyable, hashable, and cheap. The type parameter only prevents mixing
/// handles across registries; it carries no data.
pub struct Handle<T> {
    index: u32,
    generation: u32,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Handle<T> {
    /// Raw slot index, useful only for diagnostics.
    pub fn index(&self) -> u32 {
        self.index
    }
}

// Manual impls: derived ones would bound on `T`.
impl<T> Clone for Handle<T> {
    fn clone(&self) -> Self {
        *self
    }
}
impl<T> Copy for Handle<T> {}
impl<T> PartialEq for Handle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index && self.generation == other.generation
    }
}
impl<T> Eq for Handle<T> {}
impl<T> std::hash::Hash for Handle<T> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.index.hash(state);
        self.generation.hash(state);
    }
}
impl<T> std::fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Handle({}v{})", self.index, self.generation)
    }
}

struct Slot<T> {
    generation: u32,
    value: Option<T>,
}

/// Slot arena with a free list and per-slot generation counters.
///
/// Insertion is O(1) amortized (pop from the free list or push a new slot),
/// lookup is an index plus a generation check.
pub struct Arena<T> {
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
}

impl<T> Default for Arena<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Arena<T> {
    pub fn new() -> Self {
        Self { slots: Vec::new(), free: Vec::new() }
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn insert(&mut self, value: T) -> Handle<T> {
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            debug_assert!(slot.value.is_none());
            slot.value = Some(value);
            Handle {
                index,
                generation: slot.generation,
                _marker: PhantomData,
            }
        } else {
            let index = self.slots.len() as u32;
            self.slots.push(Slot { generation: 0, value: Some(value) });
            Handle { index, generation: 0, _marker: PhantomData }
        }
    }

    pub fn get(&self, handle: Handle<T>) -> Option<&T> {
        let slot = self.slots.get(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        slot.value.as_ref()
    }

    pub fn get_mut(&mut self, handle: Handle<T>) -> Option<&mut T> {
        let slot = self.slots.get_mut(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        slot.value.as_mut()
    }

    /// Removes an entry, invalidating every copy of its handle.
    ///
    /// The slot's generation is bumped on removal so stale handles can never
    /// observe a later occupant.
    pub fn remove(&mut self, handle: Handle<T>) -> Option<T> {
        let slot = self.slots.get_mut(handle.index as usize)?;
        if slot.generation != handle.generation || slot.value.is_none() {
            return None;
        }
        let value = slot.value.take();
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(handle.index);
        value
    }

    /// Iterates over live entries.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.slots.iter().filter_map(|s| s.value.as_ref())
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.slots.iter_mut().filter_map(|s| s.value.as_mut())
    }

    /// Drops every entry. Handles from before the clear are all stale.
    pub fn clear(&mut self) {
        self.slots.clear();
        self.free.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── insert / get ──────────────────────────────────────────────────────

    #[test]
    fn insert_then_get() {
        let mut arena = Arena::new();
        let h = arena.insert(42u32);
        assert_eq!(arena.get(h), Some(&42));
        assert_eq!(arena.len(), 1);
    }

    #[test]
    fn get_mut_mutates() {
        let mut arena = Arena::new();
        let h = arena.insert(String::from("a"));
        arena.get_mut(h).unwrap().push('b');
        assert_eq!(arena.get(h).unwrap(), "ab");
    }

    // ── remove / staleness ────────────────────────────────────────────────

    #[test]
    fn remove_returns_value_and_invalidates() {
        let mut arena = Arena::new();
        let h = arena.insert(7u32);
        assert_eq!(arena.remove(h), Some(7));
        assert_eq!(arena.get(h), None);
        assert_eq!(arena.remove(h), None);
        assert!(arena.is_empty());
    }

    #[test]
    fn stale_handle_does_not_see_reused_slot() {
        let mut arena = Arena::new();
        let old = arena.insert(1u32);
        arena.remove(old);

        let new = arena.insert(2u32);
        // Slot is reused; generations differ.
        assert_eq!(new.index(), old.index());
        assert_ne!(new, old);
        assert_eq!(arena.get(old), None);
        assert_eq!(arena.get(new), Some(&2));
    }

    #[test]
    fn free_list_reuses_slots() {
        let mut arena = Arena::new();
        let handles: Vec<_> = (0..4u32).map(|i| arena.insert(i)).collect();
        arena.remove(handles[1]);
        arena.remove(handles[2]);

        arena.insert(10);
        arena.insert(11);
        let fresh = arena.insert(12);
        // Two removals are recycled before the arena grows.
        assert_eq!(fresh.index(), 4);
        assert_eq!(arena.len(), 5);
    }

    // ── iteration ─────────────────────────────────────────────────────────

    #[test]
    fn iter_skips_holes() {
        let mut arena = Arena::new();
        let a = arena.insert(1u32);
        let _b = arena.insert(2u32);
        arena.remove(a);

        let values: Vec<u32> = arena.iter().copied().collect();
        assert_eq!(values, vec![2]);
    }
}
