//! Hash-sealed world snapshots.
//!
//! A [`WorldSnapshot`] is the full simulation state -- entities, every
//! component store, gravity, camera activation, promoted input, and tick
//! bookkeeping -- serialized through serde and sealed with a BLAKE3 hash of
//! its canonical JSON form. [`Engine::restore`] validates the timestep and
//! recomputes the hash before touching anything, so a snapshot that was
//! edited (or corrupted on disk) -- or hand-built around a config the loop
//! refuses to run with -- is rejected instead of smuggling bad state into a
//! deterministic run.
//!
//! Listener registrations are deliberately not part of a snapshot: they are
//! closures over host state and cannot round-trip through serialization.
//! Restore leaves the engine's current registry (and the world's sprite
//! resolver) in place; hosts that persist across processes re-register
//! listeners after restoring, the same way they registered them at startup.
//!
//! The hash doubles as a cheap determinism probe: two engines that report
//! the same [`state_hash`](WorldSnapshot::state_hash) are in bit-identical
//! simulation states.

use glam::Vec3;
use magpie_ecs::{ComponentStore, EntityAllocator, EntityId};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::camera::Camera;
use crate::input::InputManager;
use crate::physics::PhysicsBody;
use crate::sprite::Sprite;
use crate::tick::{Engine, TickConfig};
use crate::transform::Transform;
use crate::EngineError;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Why a snapshot could not be produced or restored.
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// The stored hash does not match the state; the snapshot was modified
    /// after capture.
    #[error("snapshot hash mismatch: stored {stored}, computed {computed}")]
    HashMismatch { stored: String, computed: String },

    /// The captured tick configuration cannot drive the loop: `fixed_dt`
    /// must be positive and finite.
    #[error("snapshot fixed_dt {fixed_dt} is not a positive, finite timestep")]
    InvalidConfig { fixed_dt: f32 },

    /// State could not be serialized to canonical JSON.
    #[error("snapshot serialization failed")]
    Serialization(#[from] serde_json::Error),
}

// ---------------------------------------------------------------------------
// WorldSnapshot
// ---------------------------------------------------------------------------

/// Everything the hash covers. Field order is the canonical serialization
/// order; changing it changes every hash.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct WorldState {
    entities: EntityAllocator,
    transforms: ComponentStore<Transform>,
    sprites: ComponentStore<Sprite>,
    bodies: ComponentStore<PhysicsBody>,
    cameras: ComponentStore<Camera>,
    active_camera: Option<EntityId>,
    gravity: Vec3,
    input: InputManager,
    tick_count: u64,
    fixed_dt: f32,
}

/// A captured simulation state sealed with its BLAKE3 hash.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorldSnapshot {
    state: WorldState,
    hash: String,
}

impl WorldSnapshot {
    /// The sealed hash, hex-encoded.
    pub fn state_hash(&self) -> &str {
        &self.hash
    }

    /// Tick count at capture time.
    pub fn tick_count(&self) -> u64 {
        self.state.tick_count
    }

    /// Serialize the whole snapshot (state plus seal) to JSON.
    pub fn to_json(&self) -> Result<String, SnapshotError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse a snapshot previously written by [`to_json`](Self::to_json).
    /// The seal is not checked here; [`Engine::restore`] checks it.
    pub fn from_json(json: &str) -> Result<Self, SnapshotError> {
        Ok(serde_json::from_str(json)?)
    }
}

fn hash_state(state: &WorldState) -> Result<String, SnapshotError> {
    let canonical = serde_json::to_vec(state)?;
    Ok(blake3::hash(&canonical).to_hex().to_string())
}

// ---------------------------------------------------------------------------
// Engine integration
// ---------------------------------------------------------------------------

impl Engine {
    /// Capture the current simulation state.
    pub fn snapshot(&self) -> Result<WorldSnapshot, EngineError> {
        let world = self.world();
        let state = WorldState {
            entities: world.entities.clone(),
            transforms: world.transforms.store.clone(),
            sprites: world.sprites.store.clone(),
            bodies: world.physics.bodies.clone(),
            cameras: world.cameras.store.clone(),
            active_camera: world.cameras.active,
            gravity: world.physics.gravity,
            input: self.input().clone(),
            tick_count: self.tick_count(),
            fixed_dt: self.config().fixed_dt,
        };
        let hash = hash_state(&state).map_err(EngineError::from)?;
        debug!(tick = state.tick_count, %hash, "snapshot captured");
        Ok(WorldSnapshot { state, hash })
    }

    /// Convenience: just the sealed hash of the current state.
    pub fn state_hash(&self) -> Result<String, EngineError> {
        Ok(self.snapshot()?.state_hash().to_owned())
    }

    /// Replace the simulation state with `snapshot`'s.
    ///
    /// The snapshot's timestep is validated and the seal verified first; a
    /// rejected restore leaves the engine unchanged. Listener registrations
    /// and the sprite resolver are kept as they are.
    pub fn restore(&mut self, snapshot: &WorldSnapshot) -> Result<(), EngineError> {
        // A correct seal proves the state was not edited after capture, not
        // that it can drive the loop; the dt invariant TickConfig::new
        // asserts is re-checked here before any mutation.
        let dt = snapshot.state.fixed_dt;
        if !(dt > 0.0 && dt.is_finite()) {
            warn!(fixed_dt = dt, "snapshot rejected, invalid fixed_dt");
            return Err(SnapshotError::InvalidConfig { fixed_dt: dt }.into());
        }

        let computed = hash_state(&snapshot.state).map_err(EngineError::from)?;
        if computed != snapshot.hash {
            warn!(
                stored = %snapshot.hash,
                %computed,
                "snapshot rejected, hash mismatch"
            );
            return Err(SnapshotError::HashMismatch {
                stored: snapshot.hash.clone(),
                computed,
            }
            .into());
        }

        let state = &snapshot.state;
        let world = self.world_mut();
        world.entities = state.entities.clone();
        world.transforms.store = state.transforms.clone();
        world.sprites.store = state.sprites.clone();
        world.physics.bodies = state.bodies.clone();
        world.physics.gravity = state.gravity;
        world.cameras.store = state.cameras.clone();
        world.cameras.active = state.active_camera;
        self.input = state.input.clone();
        self.config = TickConfig {
            fixed_dt: state.fixed_dt,
        };
        self.tick_count = state.tick_count;
        debug!(tick = state.tick_count, "snapshot restored");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
