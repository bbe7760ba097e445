//! The world aggregate: one entity registry plus every component system.
//!
//! All gameplay-facing mutation goes through [`World`] so the liveness rules
//! stay in one place. Component stores index by entity slot and do not check
//! generations themselves; the world front-door does, which is what makes a
//! stale [`EntityId`] harmless everywhere -- accessors return `None`,
//! mutators report [`EcsError::StaleEntity`], and `remove_entity` is an
//! idempotent no-op.
//!
//! Removing an entity cascades over every store immediately, but the slot
//! itself is only recycled by [`World::maintain`], which the engine calls at
//! the end of each tick. Any id captured earlier in the tick therefore stays
//! stale (dead, detectable) rather than dangling onto a reused slot.

use glam::{Mat4, Vec3};
use magpie_ecs::{EcsError, EntityAllocator, EntityId};
use tracing::debug;

use crate::camera::{Camera, CameraSystem};
use crate::physics::{CollisionPair, PhysicsBody, PhysicsSystem};
use crate::sprite::{Sprite, SpriteResolver, SpriteSource, SpriteSystem};
use crate::transform::{Transform, TransformSystem};
use crate::EngineError;

/// Entities and their components, behind one liveness-checked façade.
#[derive(Debug)]
pub struct World {
    pub(crate) entities: EntityAllocator,
    pub(crate) transforms: TransformSystem,
    pub(crate) sprites: SpriteSystem,
    pub(crate) physics: PhysicsSystem,
    pub(crate) cameras: CameraSystem,
}

impl World {
    pub fn new() -> Self {
        Self {
            entities: EntityAllocator::new(),
            transforms: TransformSystem::new(),
            sprites: SpriteSystem::new(),
            physics: PhysicsSystem::new(),
            cameras: CameraSystem::new(),
        }
    }

    /// Swap in a different sprite resolver (the default resolves nothing to
    /// real textures; hosts with a renderer install their own).
    pub fn with_sprite_resolver(resolver: Box<dyn SpriteResolver>) -> Self {
        let mut world = Self::new();
        world.sprites = SpriteSystem::with_resolver(resolver);
        world
    }

    // -----------------------------------------------------------------------
    // Entities
    // -----------------------------------------------------------------------

    /// Create a fresh, component-less entity.
    pub fn new_entity(&mut self) -> Result<EntityId, EngineError> {
        Ok(self.entities.allocate()?)
    }

    /// Destroy `entity` and drop all of its components.
    ///
    /// Returns whether anything was removed; a dead or stale id is a no-op.
    /// The slot is not reused until the next [`maintain`](World::maintain).
    pub fn remove_entity(&mut self, entity: EntityId) -> bool {
        if !self.entities.is_alive(entity) {
            return false;
        }
        self.transforms.remove(entity);
        self.sprites.remove(entity);
        self.physics.remove(entity);
        self.cameras.remove(entity);
        self.entities.deallocate(entity);
        debug!(entity = %entity, "entity removed");
        true
    }

    /// Whether `entity` is currently alive (right index, right generation).
    pub fn is_alive(&self, entity: EntityId) -> bool {
        self.entities.is_alive(entity)
    }

    /// Live entity count.
    pub fn entity_count(&self) -> usize {
        self.entities.alive_count()
    }

    /// Hand slots retired since the last call back to the allocator.
    pub fn maintain(&mut self) {
        self.entities.recycle_retired();
    }

    fn ensure_alive(&self, entity: EntityId) -> Result<(), EngineError> {
        if self.entities.is_alive(entity) {
            Ok(())
        } else {
            Err(EcsError::StaleEntity(entity).into())
        }
    }

    // -----------------------------------------------------------------------
    // Transforms
    // -----------------------------------------------------------------------

    /// Attach a default [`Transform`], replacing any existing one.
    pub fn add_transform(&mut self, entity: EntityId) -> Result<&mut Transform, EngineError> {
        self.ensure_alive(entity)?;
        Ok(self.transforms.add(entity))
    }

    pub fn transform(&self, entity: EntityId) -> Option<&Transform> {
        self.entities
            .is_alive(entity)
            .then(|| self.transforms.get(entity))
            .flatten()
    }

    pub fn transform_mut(&mut self, entity: EntityId) -> Option<&mut Transform> {
        if !self.entities.is_alive(entity) {
            return None;
        }
        self.transforms.get_mut(entity)
    }

    pub fn remove_transform(&mut self, entity: EntityId) -> Option<Transform> {
        if !self.entities.is_alive(entity) {
            return None;
        }
        self.transforms.remove(entity)
    }

    // -----------------------------------------------------------------------
    // Sprites
    // -----------------------------------------------------------------------

    /// Attach a sprite by resolving `source` through the installed resolver.
    ///
    /// On resolver failure nothing is attached and any previous sprite is
    /// kept.
    pub fn add_sprite(
        &mut self,
        entity: EntityId,
        source: SpriteSource,
    ) -> Result<&Sprite, EngineError> {
        self.ensure_alive(entity)?;
        Ok(self.sprites.add(entity, source)?)
    }

    pub fn sprite(&self, entity: EntityId) -> Option<&Sprite> {
        self.entities
            .is_alive(entity)
            .then(|| self.sprites.get(entity))
            .flatten()
    }

    pub fn remove_sprite(&mut self, entity: EntityId) -> Option<Sprite> {
        if !self.entities.is_alive(entity) {
            return None;
        }
        self.sprites.remove(entity)
    }

    // -----------------------------------------------------------------------
    // Physics
    // -----------------------------------------------------------------------

    /// Attach a box body. The entity must already carry a Transform; mass 0
    /// makes the body static.
    pub fn create_box(
        &mut self,
        entity: EntityId,
        half_extents: Vec3,
        mass: f32,
    ) -> Result<&mut PhysicsBody, EngineError> {
        self.ensure_alive(entity)?;
        self.physics
            .create_box(&self.transforms, entity, half_extents, mass)
    }

    pub fn body(&self, entity: EntityId) -> Option<&PhysicsBody> {
        self.entities
            .is_alive(entity)
            .then(|| self.physics.get(entity))
            .flatten()
    }

    pub fn body_mut(&mut self, entity: EntityId) -> Option<&mut PhysicsBody> {
        if !self.entities.is_alive(entity) {
            return None;
        }
        self.physics.get_mut(entity)
    }

    pub fn remove_body(&mut self, entity: EntityId) -> Option<PhysicsBody> {
        if !self.entities.is_alive(entity) {
            return None;
        }
        self.physics.remove(entity)
    }

    /// Queue an impulse on `entity`'s dynamic body for the next physics
    /// step.
    pub fn impulse(&mut self, entity: EntityId, impulse: Vec3) -> Result<(), EngineError> {
        self.ensure_alive(entity)?;
        self.physics.impulse(entity, impulse)
    }

    /// Global gravity vector.
    pub fn gravity(&self) -> Vec3 {
        self.physics.gravity()
    }

    /// Replace the global gravity vector.
    pub fn set_gravity(&mut self, gravity: Vec3) {
        self.physics.set_gravity(gravity);
    }

    /// Per-body gravity override; `None` returns the body to global gravity.
    pub fn set_body_gravity(
        &mut self,
        entity: EntityId,
        gravity: Option<Vec3>,
    ) -> Result<(), EngineError> {
        self.ensure_alive(entity)?;
        self.physics.set_body_gravity(entity, gravity)
    }

    /// Advance physics by `dt` seconds and return this tick's contact
    /// pairs. Callers that want events dispatched use
    /// [`Engine::tick`](crate::tick::Engine::tick) instead.
    pub fn step_physics(&mut self, dt: f32) -> Result<Vec<CollisionPair>, EngineError> {
        let Self {
            entities,
            transforms,
            physics,
            ..
        } = self;
        physics.step(entities, transforms, dt)
    }

    // -----------------------------------------------------------------------
    // Cameras
    // -----------------------------------------------------------------------

    /// Attach a default perspective camera.
    pub fn add_camera_perspective(
        &mut self,
        entity: EntityId,
    ) -> Result<&mut Camera, EngineError> {
        self.ensure_alive(entity)?;
        Ok(self.cameras.add_perspective(entity))
    }

    /// Attach an orthographic camera spanning `half_width` x `half_height`.
    pub fn add_camera_orthographic(
        &mut self,
        entity: EntityId,
        half_width: f32,
        half_height: f32,
    ) -> Result<&mut Camera, EngineError> {
        self.ensure_alive(entity)?;
        Ok(self.cameras.add_orthographic(entity, half_width, half_height))
    }

    /// Make `entity`'s camera the active one; at most one camera is active.
    pub fn set_camera_active(&mut self, entity: EntityId) -> Result<(), EngineError> {
        self.ensure_alive(entity)?;
        self.cameras.set_active(entity)
    }

    /// The entity whose camera is active, if any.
    pub fn active_camera(&self) -> Option<EntityId> {
        self.cameras.active()
    }

    pub fn camera(&self, entity: EntityId) -> Option<&Camera> {
        self.entities
            .is_alive(entity)
            .then(|| self.cameras.get(entity))
            .flatten()
    }

    pub fn remove_camera(&mut self, entity: EntityId) -> Option<Camera> {
        if !self.entities.is_alive(entity) {
            return None;
        }
        self.cameras.remove(entity)
    }

    /// Combined projection * inverse-pose matrix of the active camera, or
    /// `None` when no camera is active.
    pub fn active_view_projection(&self) -> Option<Mat4> {
        self.cameras.view_projection(&self.transforms)
    }

    // -----------------------------------------------------------------------
    // Read access for renderers and tests
    // -----------------------------------------------------------------------

    pub fn transforms(&self) -> &TransformSystem {
        &self.transforms
    }

    pub fn sprites(&self) -> &SpriteSystem {
        &self.sprites
    }

    pub fn physics(&self) -> &PhysicsSystem {
        &self.physics
    }

    pub fn cameras(&self) -> &CameraSystem {
        &self.cameras
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
