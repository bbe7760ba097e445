//! Sparse per-kind component storage.
//!
//! A [`ComponentStore<T>`] holds at most one `T` per entity slot, indexed by
//! the entity's low-32-bit index. Slots are `Option<T>` in a flat `Vec`, so
//! lookup is a bounds check and iteration walks ascending index order --
//! the deterministic order every per-tick pass in the engine relies on.
//!
//! Stores are deliberately generation-blind: whether a handle is stale is
//! the owning world's concern, enforced before any store call. The world's
//! cascade on entity destruction keeps stores free of dead-slot residue, so
//! a store never has data for an index whose entity is gone.

use serde::{Deserialize, Serialize};

use crate::entity::EntityId;

// ---------------------------------------------------------------------------
// ComponentStore
// ---------------------------------------------------------------------------

/// Sparse storage for one component kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentStore<T> {
    /// One slot per entity index; `None` where the entity has no `T`.
    data: Vec<Option<T>>,
    /// Number of occupied slots.
    len: usize,
}

impl<T> ComponentStore<T> {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            data: Vec::new(),
            len: 0,
        }
    }

    fn ensure_slot(&mut self, index: u32) {
        let needed = index as usize + 1;
        if self.data.len() < needed {
            self.data.resize_with(needed, || None);
        }
    }

    /// Attach `value` to `entity`, returning the displaced component if the
    /// entity already had one (insert-replaces semantics).
    pub fn insert(&mut self, entity: EntityId, value: T) -> Option<T> {
        self.ensure_slot(entity.index());
        let old = self.data[entity.index() as usize].replace(value);
        if old.is_none() {
            self.len += 1;
        }
        old
    }

    /// Detach and return `entity`'s component, if any.
    pub fn remove(&mut self, entity: EntityId) -> Option<T> {
        let slot = self.data.get_mut(entity.index() as usize)?;
        let old = slot.take();
        if old.is_some() {
            self.len -= 1;
        }
        old
    }

    /// Shared access to `entity`'s component.
    pub fn get(&self, entity: EntityId) -> Option<&T> {
        self.data.get(entity.index() as usize)?.as_ref()
    }

    /// Mutable access to `entity`'s component.
    pub fn get_mut(&mut self, entity: EntityId) -> Option<&mut T> {
        self.data.get_mut(entity.index() as usize)?.as_mut()
    }

    /// Whether `entity` has a component in this store.
    pub fn contains(&self, entity: EntityId) -> bool {
        self.data
            .get(entity.index() as usize)
            .is_some_and(|slot| slot.is_some())
    }

    /// Number of stored components.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the store holds no components.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Iterate `(entity_index, &component)` in ascending index order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, &T)> {
        self.data
            .iter()
            .enumerate()
            .filter_map(|(idx, slot)| slot.as_ref().map(|value| (idx as u32, value)))
    }

    /// Iterate `(entity_index, &mut component)` in ascending index order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (u32, &mut T)> {
        self.data
            .iter_mut()
            .enumerate()
            .filter_map(|(idx, slot)| slot.as_mut().map(|value| (idx as u32, value)))
    }

    /// Drop every component.
    pub fn clear(&mut self) {
        self.data.clear();
        self.len = 0;
    }
}

impl<T> Default for ComponentStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
