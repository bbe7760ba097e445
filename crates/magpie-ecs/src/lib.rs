//! Magpie ECS -- generational entity allocation and sparse component storage.
//!
//! This crate is the storage kernel under the Magpie engine: it knows how to
//! mint and retire [`EntityId`]s and how to keep one component of a given
//! kind per entity. It has no opinion about what a component means; systems
//! and the world aggregate live in `magpie-engine`.
//!
//! Two properties matter to everything built on top:
//!
//! * **Stale handles are inert.** Destroying an entity bumps its slot
//!   generation immediately, so any copy of the old handle fails liveness
//!   checks from that instant.
//! * **Slot reuse is deferred.** Freed indices sit in a retired queue until
//!   [`EntityAllocator::recycle_retired`] runs (once per tick, after all
//!   dispatch passes), so destroying entities from inside an event callback
//!   can never hand a later allocation an aliased slot.
//!
//! # Quick Start
//!
//! ```
//! use magpie_ecs::prelude::*;
//!
//! #[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
//! struct Health(u32);
//!
//! let mut entities = EntityAllocator::new();
//! let mut healths: ComponentStore<Health> = ComponentStore::new();
//!
//! let hero = entities.allocate()?;
//! healths.insert(hero, Health(100));
//! assert_eq!(healths.get(hero), Some(&Health(100)));
//!
//! entities.deallocate(hero);
//! healths.remove(hero);
//! assert!(!entities.is_alive(hero));
//! # Ok::<(), magpie_ecs::EcsError>(())
//! ```

#![deny(unsafe_code)]

pub mod entity;
pub mod store;

use thiserror::Error;

pub use entity::{EntityAllocator, EntityId};
pub use store::ComponentStore;

// ---------------------------------------------------------------------------
// EcsError
// ---------------------------------------------------------------------------

/// Errors from the storage kernel.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EcsError {
    /// Every `u32` entity index is in use; no further entities can exist.
    #[error("entity index space exhausted")]
    IndexSpaceExhausted,

    /// An operation was given a handle whose entity no longer exists (or
    /// never existed).
    #[error("stale entity handle {0}")]
    StaleEntity(EntityId),
}

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for typical usage.
pub mod prelude {
    pub use crate::entity::{EntityAllocator, EntityId};
    pub use crate::store::ComponentStore;
    pub use crate::EcsError;
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::prelude::*;

    #[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
    struct Label(String);

    // Allocator and store compose the way the engine's world uses them:
    // liveness gate first, then raw index storage.
    #[test]
    fn allocator_and_store_compose() {
        let mut entities = EntityAllocator::new();
        let mut labels: ComponentStore<Label> = ComponentStore::new();

        let a = entities.allocate().unwrap();
        let b = entities.allocate().unwrap();
        labels.insert(a, Label("coin".into()));
        labels.insert(b, Label("floor".into()));

        entities.deallocate(a);
        labels.remove(a);

        assert!(!entities.is_alive(a));
        assert_eq!(labels.get(a), None);
        assert_eq!(labels.get(b), Some(&Label("floor".into())));
        assert_eq!(labels.len(), 1);
    }

    #[test]
    fn recycled_slot_starts_without_components() {
        let mut entities = EntityAllocator::new();
        let mut labels: ComponentStore<Label> = ComponentStore::new();

        let old = entities.allocate().unwrap();
        labels.insert(old, Label("ghost".into()));
        entities.deallocate(old);
        labels.remove(old);
        entities.recycle_retired();

        let fresh = entities.allocate().unwrap();
        assert_eq!(fresh.index(), old.index());
        assert_ne!(fresh, old);
        assert_eq!(labels.get(fresh), None, "recycled slot must be clean");
    }

    #[test]
    fn error_messages_are_descriptive() {
        let err = EcsError::StaleEntity(EntityId::new(3, 2));
        assert_eq!(err.to_string(), "stale entity handle 3v2");
        assert_eq!(
            EcsError::IndexSpaceExhausted.to_string(),
            "entity index space exhausted"
        );
    }
}
