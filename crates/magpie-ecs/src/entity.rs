//! Entity identifiers and allocation.
//!
//! An [`EntityId`] is a 64-bit handle packing a *generation* counter in the
//! high 32 bits and a slot *index* in the low 32 bits. The generation is
//! bumped the moment an index is freed, so stale handles are detectable
//! immediately, but the index itself does not become allocatable again until
//! [`EntityAllocator::recycle_retired`] runs. That split is what makes it
//! safe for game code to destroy entities from inside an event dispatch that
//! is still walking this tick's contact pairs: no handle minted later in the
//! same tick can alias the slot.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use tracing::trace;

use crate::EcsError;

// ---------------------------------------------------------------------------
// EntityId
// ---------------------------------------------------------------------------

/// A generational entity identifier.
///
/// Layout: `[generation: u32 | index: u32]`
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityId(u64);

impl EntityId {
    /// Construct an `EntityId` from an index and generation.
    #[inline]
    pub fn new(index: u32, generation: u32) -> Self {
        Self((generation as u64) << 32 | index as u64)
    }

    /// The index portion (low 32 bits).
    #[inline]
    pub fn index(self) -> u32 {
        self.0 as u32
    }

    /// The generation portion (high 32 bits).
    #[inline]
    pub fn generation(self) -> u32 {
        (self.0 >> 32) as u32
    }

    /// Raw `u64` representation, usable as a deterministic sort key.
    #[inline]
    pub fn to_raw(self) -> u64 {
        self.0
    }

    /// Reconstruct from a raw `u64`.
    #[inline]
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Debug for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntityId({}v{})", self.index(), self.generation())
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", self.index(), self.generation())
    }
}

// ---------------------------------------------------------------------------
// EntityAllocator
// ---------------------------------------------------------------------------

/// Allocates and recycles [`EntityId`]s with generational tracking.
///
/// Freed indices pass through two stages. `deallocate` moves the index into
/// the *retired* queue, where it cannot be handed out; `recycle_retired`
/// (called once per tick, after all dispatch passes) promotes retired
/// indices onto the free list. The free list itself is FIFO so generations
/// spread over many slots instead of concentrating on a hot index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityAllocator {
    /// Current generation for each index slot.
    generations: Vec<u32>,
    /// Whether the slot is currently alive.
    alive: Vec<bool>,
    /// Indices ready for reuse (FIFO).
    free_indices: VecDeque<u32>,
    /// Indices freed since the last `recycle_retired` call.
    retired: VecDeque<u32>,
    /// Count of `true` entries in `alive`.
    live: usize,
}

impl EntityAllocator {
    /// Create a new, empty allocator.
    pub fn new() -> Self {
        Self {
            generations: Vec::new(),
            alive: Vec::new(),
            free_indices: VecDeque::new(),
            retired: VecDeque::new(),
            live: 0,
        }
    }

    /// Allocate a fresh [`EntityId`].
    ///
    /// Prefers a recycled index (its generation was already bumped when it
    /// was freed); otherwise mints a brand-new index at generation 0.
    /// Indices sitting in the retired queue are never considered.
    ///
    /// # Errors
    ///
    /// [`EcsError::IndexSpaceExhausted`] once all `u32` indices are in use.
    pub fn allocate(&mut self) -> Result<EntityId, EcsError> {
        let id = if let Some(index) = self.free_indices.pop_front() {
            self.alive[index as usize] = true;
            EntityId::new(index, self.generations[index as usize])
        } else {
            if self.generations.len() > u32::MAX as usize {
                return Err(EcsError::IndexSpaceExhausted);
            }
            let index = self.generations.len() as u32;
            self.generations.push(0);
            self.alive.push(true);
            EntityId::new(index, 0)
        };
        self.live += 1;
        trace!(entity = %id, "entity allocated");
        Ok(id)
    }

    /// Deallocate (destroy) an entity.
    ///
    /// The slot's generation is incremented at once, so any outstanding
    /// handle to it is stale from this point on. The index lands in the
    /// retired queue and only becomes allocatable after the next
    /// [`recycle_retired`](Self::recycle_retired).
    ///
    /// Returns `true` if the entity was alive and is now destroyed, `false`
    /// for an already-dead or stale handle (idempotent).
    pub fn deallocate(&mut self, id: EntityId) -> bool {
        let idx = id.index() as usize;
        if idx >= self.generations.len()
            || self.generations[idx] != id.generation()
            || !self.alive[idx]
        {
            trace!(entity = %id, "deallocate ignored stale handle");
            return false;
        }
        self.alive[idx] = false;
        self.generations[idx] = self.generations[idx].wrapping_add(1);
        self.retired.push_back(id.index());
        self.live -= 1;
        trace!(entity = %id, "entity retired");
        true
    }

    /// Promote every retired index onto the free list.
    ///
    /// Call once per tick, after all dispatch passes for the tick have
    /// finished. Until then, indices freed this tick stay unallocatable.
    pub fn recycle_retired(&mut self) {
        self.free_indices.append(&mut self.retired);
    }

    /// Returns `true` if `id` refers to a currently alive entity whose
    /// generation matches the slot's current generation.
    pub fn is_alive(&self, id: EntityId) -> bool {
        let idx = id.index() as usize;
        idx < self.generations.len() && self.alive[idx] && self.generations[idx] == id.generation()
    }

    /// The current [`EntityId`] living at `index`, if that slot is alive.
    ///
    /// Lets store iteration (which yields bare indices) recover full
    /// generational handles.
    pub fn entity_at(&self, index: u32) -> Option<EntityId> {
        let idx = index as usize;
        if idx < self.generations.len() && self.alive[idx] {
            Some(EntityId::new(index, self.generations[idx]))
        } else {
            None
        }
    }

    /// Number of currently alive entities.
    pub fn alive_count(&self) -> usize {
        self.live
    }

    /// Number of indices freed this tick and not yet recyclable.
    pub fn retired_count(&self) -> usize {
        self.retired.len()
    }

    /// Iterate all alive entities in ascending index order.
    pub fn iter_alive(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.alive
            .iter()
            .enumerate()
            .filter(|(_, alive)| **alive)
            .map(|(idx, _)| EntityId::new(idx as u32, self.generations[idx]))
    }
}

impl Default for EntityAllocator {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
