//! Transform component and its store.
//!
//! Transforms are plain value data: position, rotation, scale. There is no
//! hierarchy and no per-tick behavior -- the physics pass writes positions
//! here and the renderer contract reads them.

use glam::{Quat, Vec3};
use magpie_ecs::{ComponentStore, EntityId};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Transform
// ---------------------------------------------------------------------------

/// World-space pose of an entity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Transform {
    /// Identity pose at `position`.
    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Self::default()
        }
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }
}

// ---------------------------------------------------------------------------
// TransformSystem
// ---------------------------------------------------------------------------

/// Owner of all [`Transform`] components.
#[derive(Debug, Default)]
pub struct TransformSystem {
    pub(crate) store: ComponentStore<Transform>,
}

impl TransformSystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a default transform to `entity`, replacing any existing one,
    /// and hand back the fresh component for initialization.
    ///
    /// Liveness of `entity` is checked by the world before this is called.
    pub fn add(&mut self, entity: EntityId) -> &mut Transform {
        self.store.insert(entity, Transform::default());
        self.store.get_mut(entity).expect("slot occupied by insert")
    }

    pub fn get(&self, entity: EntityId) -> Option<&Transform> {
        self.store.get(entity)
    }

    pub fn get_mut(&mut self, entity: EntityId) -> Option<&mut Transform> {
        self.store.get_mut(entity)
    }

    /// Detach and return `entity`'s transform, if any.
    pub fn remove(&mut self, entity: EntityId) -> Option<Transform> {
        self.store.remove(entity)
    }

    pub fn contains(&self, entity: EntityId) -> bool {
        self.store.contains(entity)
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// Iterate `(entity_index, &Transform)` in ascending index order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, &Transform)> {
        self.store.iter()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn id(index: u32) -> EntityId {
        EntityId::new(index, 0)
    }

    #[test]
    fn default_pose_is_identity() {
        let t = Transform::default();
        assert_eq!(t.position, Vec3::ZERO);
        assert_eq!(t.rotation, Quat::IDENTITY);
        assert_eq!(t.scale, Vec3::ONE);
    }

    #[test]
    fn add_returns_initializable_component() {
        let mut transforms = TransformSystem::new();
        let t = transforms.add(id(0));
        t.position = Vec3::new(1.0, 2.0, 3.0);
        assert_eq!(
            transforms.get(id(0)).unwrap().position,
            Vec3::new(1.0, 2.0, 3.0)
        );
    }

    #[test]
    fn re_add_resets_to_default() {
        let mut transforms = TransformSystem::new();
        transforms.add(id(0)).position = Vec3::splat(9.0);
        transforms.add(id(0));
        assert_eq!(transforms.get(id(0)).unwrap().position, Vec3::ZERO);
        assert_eq!(transforms.len(), 1);
    }

    #[test]
    fn remove_detaches() {
        let mut transforms = TransformSystem::new();
        transforms.add(id(2));
        assert!(transforms.contains(id(2)));
        assert!(transforms.remove(id(2)).is_some());
        assert!(!transforms.contains(id(2)));
        assert!(transforms.remove(id(2)).is_none());
    }
}
