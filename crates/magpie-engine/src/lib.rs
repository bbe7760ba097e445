//! Magpie engine -- a deterministic, headless game-engine runtime.
//!
//! The engine advances a [`World`](world::World) of entities and components
//! in fixed-timestep ticks and fans state changes out to gameplay listeners
//! through a priority-ordered [event layer](event). Each tick runs the same
//! phases in the same order -- input promotion, input event, physics step,
//! collision events, update event, slot recycling -- and every internal
//! iteration is ordered, so identical inputs replay to bit-identical worlds.
//! [`WorldSnapshot`](snapshot::WorldSnapshot) seals that claim with a BLAKE3
//! state hash.
//!
//! Rendering is out of scope: cameras produce view-projection matrices and
//! sprites resolve through a pluggable [resolver seam](sprite::SpriteResolver),
//! but no pixels are drawn here. A host owning a real renderer and window
//! feeds key transitions in and draws from world state between ticks.
//!
//! # Quick Start
//!
//! ```
//! use magpie_engine::prelude::*;
//! use glam::Vec3;
//!
//! let mut engine = Engine::new();
//! let world = engine.world_mut();
//!
//! let floor = world.new_entity()?;
//! world.add_transform(floor)?.position = Vec3::new(0.0, -2.0, 0.0);
//! world.create_box(floor, Vec3::new(100.0, 1.0, 100.0), 0.0)?;
//!
//! let ball = world.new_entity()?;
//! world.add_transform(ball)?.position = Vec3::new(0.0, 3.0, 0.0);
//! world.create_box(ball, Vec3::ONE, 1.0)?;
//!
//! engine.on_collision(0, move |ctx, event| {
//!     if let GameEvent::Collision(contact) = event {
//!         if contact.involves(ball) {
//!             ctx.world.body_mut(ball).unwrap().velocity = Vec3::ZERO;
//!         }
//!     }
//!     Ok(ListenerAction::Keep)
//! });
//!
//! engine.run_ticks(120)?;
//!
//! // The ball fell, hit the floor, and came to rest exactly on it.
//! let rest = engine.world().transform(ball).unwrap().position.y;
//! assert!(rest.abs() < 1e-3);
//! # Ok::<(), magpie_engine::EngineError>(())
//! ```

#![deny(unsafe_code)]

pub mod camera;
pub mod event;
pub mod input;
pub mod physics;
pub mod snapshot;
pub mod sprite;
pub mod tick;
pub mod transform;
pub mod world;

use glam::Vec3;
use thiserror::Error;

pub use glam;
pub use magpie_ecs::{EcsError, EntityId};

use crate::snapshot::SnapshotError;
use crate::sprite::ResolveError;

// ---------------------------------------------------------------------------
// EngineError
// ---------------------------------------------------------------------------

/// Coarse failure class, used by hosts to decide how hard to react.
///
/// Configuration errors mean malformed level data and are fatal to the
/// operation that hit them; usage errors are recoverable no-ops (the world
/// is untouched); resource errors mean an external input (asset, snapshot,
/// id space) let the engine down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Configuration,
    Usage,
    Resource,
}

/// Any error the engine surface can return.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Ecs(#[from] EcsError),

    /// A physics body needs a Transform to write positions into.
    #[error("entity {entity} has a physics body but no transform")]
    MissingTransform { entity: EntityId },

    #[error("invalid half-extents {half_extents} for entity {entity}: all components must be positive and finite")]
    InvalidHalfExtents { entity: EntityId, half_extents: Vec3 },

    #[error("invalid mass {mass} for entity {entity}: must be non-negative and finite")]
    InvalidMass { entity: EntityId, mass: f32 },

    #[error("entity {entity} has no physics body")]
    NoPhysicsBody { entity: EntityId },

    /// The operation only makes sense on a dynamic body.
    #[error("entity {entity} has a static body")]
    StaticBody { entity: EntityId },

    #[error("entity {entity} has no camera")]
    NoCamera { entity: EntityId },

    #[error("sprite resolution failed")]
    Resource(#[from] ResolveError),

    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
}

impl EngineError {
    /// Classify this error for host-side handling policy.
    pub fn class(&self) -> ErrorClass {
        match self {
            EngineError::MissingTransform { .. }
            | EngineError::InvalidHalfExtents { .. }
            | EngineError::InvalidMass { .. } => ErrorClass::Configuration,

            EngineError::Ecs(EcsError::StaleEntity(_))
            | EngineError::NoPhysicsBody { .. }
            | EngineError::StaticBody { .. }
            | EngineError::NoCamera { .. } => ErrorClass::Usage,

            EngineError::Ecs(EcsError::IndexSpaceExhausted)
            | EngineError::Resource(_)
            | EngineError::Snapshot(_) => ErrorClass::Resource,
        }
    }
}

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Everything a typical host or test needs in scope.
pub mod prelude {
    pub use crate::camera::{Camera, CameraSystem, Projection};
    pub use crate::event::{
        CollisionEvent, DispatchStats, EventCtx, EventKind, EventManager, GameEvent,
        ListenerAction, ListenerId,
    };
    pub use crate::input::{keys, InputDelta, InputManager, KeyCode};
    pub use crate::physics::{CollisionPair, PhysicsBody, PhysicsSystem, DEFAULT_GRAVITY};
    pub use crate::snapshot::{SnapshotError, WorldSnapshot};
    pub use crate::sprite::{
        DrawOp, PlaceholderResolver, ResolveError, ResolvedSprite, Rgba, Sprite, SpriteResolver,
        SpriteSource, SpriteSystem, TextureId, TextureSpec,
    };
    pub use crate::tick::{Engine, TickConfig, TickReport};
    pub use crate::transform::{Transform, TransformSystem};
    pub use crate::world::World;
    pub use crate::{EcsError, EngineError, EntityId, ErrorClass};
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
