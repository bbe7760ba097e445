//! Box-body physics: integration, collision detection, contact resolution.
//!
//! The contract is deliberately narrow. Bodies are axis-aligned boxes.
//! Mass 0 means static: never integrated, never pushed, but still collides.
//! Dynamic bodies integrate gravity and queued impulses into velocity, and
//! velocity into the entity's [`Transform`](crate::transform::Transform)
//! position. Detection is a sweep-and-prune broad phase over the x axis
//! with an exact AABB narrow phase; touching counts as contact. Resolution
//! is inelastic: bodies are pushed apart along the minimum-penetration axis
//! (split by inverse mass) and the approaching velocity component is
//! cancelled, which is what lets a dropped box come to rest *exactly* on a
//! floor's surface.
//!
//! Contact pairs are emitted for every tick two boxes overlap, not only on
//! the first tick -- resting contact keeps reporting. Listeners are expected
//! to be idempotent. Static-static pairs are never reported.
//!
//! Everything here is deterministic: body iteration follows ascending entity
//! index, the sweep ordering is tie-broken by entity id, and emitted pairs
//! are sorted by id.

use glam::Vec3;
use magpie_ecs::{ComponentStore, EntityAllocator, EntityId};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use crate::transform::TransformSystem;
use crate::EngineError;

/// Default global gravity, world units per second squared.
pub const DEFAULT_GRAVITY: Vec3 = Vec3::new(0.0, -9.81, 0.0);

// ---------------------------------------------------------------------------
// PhysicsBody
// ---------------------------------------------------------------------------

/// Rigid box-body component.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PhysicsBody {
    /// Box half-extents along each axis.
    pub half_extents: Vec3,
    /// Mass in arbitrary units; 0 marks the body static.
    pub mass: f32,
    /// Linear velocity, world units per second.
    pub velocity: Vec3,
    /// Impulse accumulated since the last step; applied as `impulse / mass`
    /// at the start of the next integration, then cleared.
    pub pending_impulse: Vec3,
    /// Per-body gravity override; `None` uses the system's global gravity.
    pub gravity_override: Option<Vec3>,
}

impl PhysicsBody {
    fn new(half_extents: Vec3, mass: f32) -> Self {
        Self {
            half_extents,
            mass,
            velocity: Vec3::ZERO,
            pending_impulse: Vec3::ZERO,
            gravity_override: None,
        }
    }

    /// Whether this body is static (mass 0).
    pub fn is_static(&self) -> bool {
        self.mass == 0.0
    }

    /// Whether this body integrates under gravity and impulses.
    pub fn is_dynamic(&self) -> bool {
        !self.is_static()
    }

    fn inverse_mass(&self) -> f32 {
        if self.is_static() {
            0.0
        } else {
            1.0 / self.mass
        }
    }
}

// ---------------------------------------------------------------------------
// CollisionPair
// ---------------------------------------------------------------------------

/// Two entities whose boxes overlap this tick.
///
/// The pair is stored with `entity_a < entity_b` by raw id; which of the two
/// ends up in which slot carries no meaning, and consumers must check both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CollisionPair {
    pub entity_a: EntityId,
    pub entity_b: EntityId,
}

impl CollisionPair {
    /// Build a pair in canonical (ascending raw id) order.
    pub fn new(a: EntityId, b: EntityId) -> Self {
        if a.to_raw() <= b.to_raw() {
            Self {
                entity_a: a,
                entity_b: b,
            }
        } else {
            Self {
                entity_a: b,
                entity_b: a,
            }
        }
    }

    /// Whether `entity` is one of the pair.
    pub fn involves(&self, entity: EntityId) -> bool {
        self.entity_a == entity || self.entity_b == entity
    }
}

/// Axis-aligned bounds of one body during the broad phase.
#[derive(Debug, Clone, Copy)]
struct BodyProxy {
    entity: EntityId,
    min: Vec3,
    max: Vec3,
    is_static: bool,
}

impl BodyProxy {
    /// Inclusive overlap test on y and z; x is handled by the sweep.
    fn overlaps_yz(&self, other: &BodyProxy) -> bool {
        self.min.y <= other.max.y
            && other.min.y <= self.max.y
            && self.min.z <= other.max.z
            && other.min.z <= self.max.z
    }
}

// ---------------------------------------------------------------------------
// PhysicsSystem
// ---------------------------------------------------------------------------

/// Owner of all [`PhysicsBody`] components plus the global gravity vector.
#[derive(Debug)]
pub struct PhysicsSystem {
    pub(crate) bodies: ComponentStore<PhysicsBody>,
    pub(crate) gravity: Vec3,
}

impl PhysicsSystem {
    pub fn new() -> Self {
        Self {
            bodies: ComponentStore::new(),
            gravity: DEFAULT_GRAVITY,
        }
    }

    /// Attach a box body to `entity`, replacing any existing body.
    ///
    /// Validation is strict because a bad body is malformed level data:
    /// half-extents must be positive and finite, mass non-negative and
    /// finite, and the entity must already carry a Transform (positions are
    /// written there).
    pub fn create_box(
        &mut self,
        transforms: &TransformSystem,
        entity: EntityId,
        half_extents: Vec3,
        mass: f32,
    ) -> Result<&mut PhysicsBody, EngineError> {
        if !(half_extents.cmpgt(Vec3::ZERO).all() && half_extents.is_finite()) {
            return Err(EngineError::InvalidHalfExtents {
                entity,
                half_extents,
            });
        }
        if !(mass >= 0.0 && mass.is_finite()) {
            return Err(EngineError::InvalidMass { entity, mass });
        }
        if !transforms.contains(entity) {
            return Err(EngineError::MissingTransform { entity });
        }
        self.bodies.insert(entity, PhysicsBody::new(half_extents, mass));
        debug!(entity = %entity, mass, "box body created");
        Ok(self.bodies.get_mut(entity).expect("slot occupied by insert"))
    }

    /// Queue an impulse on a dynamic body; applied at the next step as a
    /// velocity change of `impulse / mass`.
    ///
    /// Usage error (reported, no-op) if `entity` has no body or the body is
    /// static -- a static body never moves, so the impulse is refused rather
    /// than silently absorbed.
    pub fn impulse(&mut self, entity: EntityId, impulse: Vec3) -> Result<(), EngineError> {
        let Some(body) = self.bodies.get_mut(entity) else {
            warn!(entity = %entity, "impulse on entity without a body");
            return Err(EngineError::NoPhysicsBody { entity });
        };
        if body.is_static() {
            warn!(entity = %entity, "impulse on static body");
            return Err(EngineError::StaticBody { entity });
        }
        body.pending_impulse += impulse;
        trace!(entity = %entity, ?impulse, "impulse queued");
        Ok(())
    }

    /// Global gravity vector.
    pub fn gravity(&self) -> Vec3 {
        self.gravity
    }

    /// Replace the global gravity vector.
    pub fn set_gravity(&mut self, gravity: Vec3) {
        self.gravity = gravity;
    }

    /// Give `entity`'s body its own gravity (`None` returns it to global).
    ///
    /// Usage error if the entity has no body.
    pub fn set_body_gravity(
        &mut self,
        entity: EntityId,
        gravity: Option<Vec3>,
    ) -> Result<(), EngineError> {
        let Some(body) = self.bodies.get_mut(entity) else {
            warn!(entity = %entity, "set_body_gravity on entity without a body");
            return Err(EngineError::NoPhysicsBody { entity });
        };
        body.gravity_override = gravity;
        Ok(())
    }

    pub fn get(&self, entity: EntityId) -> Option<&PhysicsBody> {
        self.bodies.get(entity)
    }

    pub fn get_mut(&mut self, entity: EntityId) -> Option<&mut PhysicsBody> {
        self.bodies.get_mut(entity)
    }

    /// Detach and return `entity`'s body, if any.
    pub fn remove(&mut self, entity: EntityId) -> Option<PhysicsBody> {
        self.bodies.remove(entity)
    }

    pub fn contains(&self, entity: EntityId) -> bool {
        self.bodies.contains(entity)
    }

    pub fn len(&self) -> usize {
        self.bodies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bodies.is_empty()
    }

    // -----------------------------------------------------------------------
    // Step
    // -----------------------------------------------------------------------

    /// Advance the simulation by `dt` seconds.
    ///
    /// Phases: validate that every body still has its Transform (fatal
    /// configuration error otherwise, before anything mutates), integrate
    /// dynamic bodies, detect overlaps, resolve them, and return this tick's
    /// contact pairs in canonical sorted order.
    pub fn step(
        &mut self,
        entities: &EntityAllocator,
        transforms: &mut TransformSystem,
        dt: f32,
    ) -> Result<Vec<CollisionPair>, EngineError> {
        // Validate first so a configuration error never leaves the world
        // half-integrated.
        for (index, _) in self.bodies.iter() {
            if let Some(entity) = entities.entity_at(index) {
                if !transforms.contains(entity) {
                    return Err(EngineError::MissingTransform { entity });
                }
            }
        }

        self.integrate(entities, transforms, dt);
        let pairs = self.detect(entities, transforms);
        for pair in &pairs {
            self.resolve(transforms, pair);
        }
        trace!(contacts = pairs.len(), "physics step complete");
        Ok(pairs)
    }

    /// Gravity and impulses into velocity, velocity into position.
    fn integrate(
        &mut self,
        entities: &EntityAllocator,
        transforms: &mut TransformSystem,
        dt: f32,
    ) {
        let global_gravity = self.gravity;
        for (index, body) in self.bodies.iter_mut() {
            if body.is_static() {
                continue;
            }
            let Some(entity) = entities.entity_at(index) else {
                continue;
            };
            let Some(transform) = transforms.get_mut(entity) else {
                continue; // validated above; unreachable in practice
            };
            let gravity = body.gravity_override.unwrap_or(global_gravity);
            body.velocity += gravity * dt;
            if body.pending_impulse != Vec3::ZERO {
                body.velocity += body.pending_impulse * body.inverse_mass();
                body.pending_impulse = Vec3::ZERO;
            }
            transform.position += body.velocity * dt;
        }
    }

    /// Sweep-and-prune on x, exact AABB check on y/z.
    fn detect(
        &self,
        entities: &EntityAllocator,
        transforms: &TransformSystem,
    ) -> Vec<CollisionPair> {
        let mut proxies: Vec<BodyProxy> = Vec::with_capacity(self.bodies.len());
        for (index, body) in self.bodies.iter() {
            let Some(entity) = entities.entity_at(index) else {
                continue;
            };
            let Some(transform) = transforms.get(entity) else {
                continue;
            };
            proxies.push(BodyProxy {
                entity,
                min: transform.position - body.half_extents,
                max: transform.position + body.half_extents,
                is_static: body.is_static(),
            });
        }

        proxies.sort_by(|a, b| {
            a.min
                .x
                .total_cmp(&b.min.x)
                .then_with(|| a.entity.to_raw().cmp(&b.entity.to_raw()))
        });

        let mut pairs = Vec::new();
        for i in 0..proxies.len() {
            for j in (i + 1)..proxies.len() {
                // Sorted by min.x: once j starts past i's right edge, no
                // later proxy can overlap i either.
                if proxies[j].min.x > proxies[i].max.x {
                    break;
                }
                if proxies[i].is_static && proxies[j].is_static {
                    continue;
                }
                if proxies[i].overlaps_yz(&proxies[j]) {
                    pairs.push(CollisionPair::new(proxies[i].entity, proxies[j].entity));
                }
            }
        }

        pairs.sort_by_key(|p| (p.entity_a.to_raw(), p.entity_b.to_raw()));
        pairs
    }

    /// Push the pair apart along the minimum-penetration axis and cancel
    /// the approaching velocity component, both weighted by inverse mass.
    fn resolve(&mut self, transforms: &mut TransformSystem, pair: &CollisionPair) {
        let Some(a) = self.bodies.get(pair.entity_a) else {
            return;
        };
        let Some(b) = self.bodies.get(pair.entity_b) else {
            return;
        };
        let (half_a, inv_a) = (a.half_extents, a.inverse_mass());
        let (half_b, inv_b) = (b.half_extents, b.inverse_mass());
        let total_inv = inv_a + inv_b;
        if total_inv == 0.0 {
            return;
        }

        let Some(pos_a) = transforms.get(pair.entity_a).map(|t| t.position) else {
            return;
        };
        let Some(pos_b) = transforms.get(pair.entity_b).map(|t| t.position) else {
            return;
        };

        // Per-axis penetration depth; an earlier resolution this tick may
        // already have separated the pair.
        let overlap = (half_a + half_b) - (pos_b - pos_a).abs();
        if overlap.cmplt(Vec3::ZERO).any() {
            return;
        }

        let axis = min_axis(overlap);
        // Contact normal points from a toward b along `axis`.
        let sign = if pos_b[axis] >= pos_a[axis] { 1.0 } else { -1.0 };
        let depth = overlap[axis];

        if let Some(t) = transforms.get_mut(pair.entity_a) {
            t.position[axis] -= depth * sign * (inv_a / total_inv);
        }
        if let Some(t) = transforms.get_mut(pair.entity_b) {
            t.position[axis] += depth * sign * (inv_b / total_inv);
        }

        let vel_a = self.bodies.get(pair.entity_a).map(|b| b.velocity[axis]);
        let vel_b = self.bodies.get(pair.entity_b).map(|b| b.velocity[axis]);
        if let (Some(va), Some(vb)) = (vel_a, vel_b) {
            let approach = (vb - va) * sign;
            if approach < 0.0 {
                // Inelastic: cancel exactly the relative normal velocity.
                let j = -approach / total_inv;
                if let Some(body) = self.bodies.get_mut(pair.entity_a) {
                    body.velocity[axis] -= j * inv_a * sign;
                }
                if let Some(body) = self.bodies.get_mut(pair.entity_b) {
                    body.velocity[axis] += j * inv_b * sign;
                }
            }
        }
    }
}

impl Default for PhysicsSystem {
    fn default() -> Self {
        Self::new()
    }
}

/// Index of the smallest component; ties resolve to the earlier axis.
fn min_axis(v: Vec3) -> usize {
    let mut axis = 0;
    if v.y < v[axis] {
        axis = 1;
    }
    if v.z < v[axis] {
        axis = 2;
    }
    axis
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const DT: f32 = 1.0 / 60.0;

    struct Rig {
        entities: EntityAllocator,
        transforms: TransformSystem,
        physics: PhysicsSystem,
    }

    impl Rig {
        fn new() -> Self {
            Self {
                entities: EntityAllocator::new(),
                transforms: TransformSystem::new(),
                physics: PhysicsSystem::new(),
            }
        }

        fn spawn_box(&mut self, position: Vec3, half_extents: Vec3, mass: f32) -> EntityId {
            let e = self.entities.allocate().unwrap();
            self.transforms.add(e).position = position;
            self.physics
                .create_box(&self.transforms, e, half_extents, mass)
                .unwrap();
            e
        }

        fn step(&mut self) -> Vec<CollisionPair> {
            self.physics
                .step(&self.entities, &mut self.transforms, DT)
                .unwrap()
        }
    }

    // -- 1. Creation validation --

    #[test]
    fn create_box_rejects_bad_extents() {
        let mut rig = Rig::new();
        let e = rig.entities.allocate().unwrap();
        rig.transforms.add(e);
        for bad in [
            Vec3::ZERO,
            Vec3::new(1.0, -1.0, 1.0),
            Vec3::new(f32::NAN, 1.0, 1.0),
        ] {
            let err = rig
                .physics
                .create_box(&rig.transforms, e, bad, 1.0)
                .unwrap_err();
            assert!(matches!(err, EngineError::InvalidHalfExtents { .. }));
        }
        assert!(!rig.physics.contains(e));
    }

    #[test]
    fn create_box_rejects_bad_mass() {
        let mut rig = Rig::new();
        let e = rig.entities.allocate().unwrap();
        rig.transforms.add(e);
        for bad in [-1.0, f32::NAN, f32::INFINITY] {
            let err = rig
                .physics
                .create_box(&rig.transforms, e, Vec3::ONE, bad)
                .unwrap_err();
            assert!(matches!(err, EngineError::InvalidMass { .. }));
        }
    }

    #[test]
    fn create_box_requires_transform() {
        let mut rig = Rig::new();
        let e = rig.entities.allocate().unwrap();
        let err = rig
            .physics
            .create_box(&rig.transforms, e, Vec3::ONE, 1.0)
            .unwrap_err();
        assert!(matches!(err, EngineError::MissingTransform { entity } if entity == e));
    }

    #[test]
    fn step_fails_fast_if_transform_was_removed() {
        let mut rig = Rig::new();
        let e = rig.spawn_box(Vec3::ZERO, Vec3::ONE, 1.0);
        rig.transforms.remove(e);
        let err = rig
            .physics
            .step(&rig.entities, &mut rig.transforms, DT)
            .unwrap_err();
        assert!(matches!(err, EngineError::MissingTransform { entity } if entity == e));
    }

    // -- 2. Integration --

    #[test]
    fn gravity_accelerates_dynamic_bodies() {
        let mut rig = Rig::new();
        let e = rig.spawn_box(Vec3::ZERO, Vec3::ONE, 1.0);
        rig.step();
        let body = rig.physics.get(e).unwrap();
        assert!((body.velocity.y - DEFAULT_GRAVITY.y * DT).abs() < 1e-6);
        assert!(rig.transforms.get(e).unwrap().position.y < 0.0);
    }

    #[test]
    fn static_bodies_never_integrate() {
        let mut rig = Rig::new();
        let e = rig.spawn_box(Vec3::new(5.0, 5.0, 0.0), Vec3::ONE, 0.0);
        for _ in 0..10 {
            rig.step();
        }
        assert_eq!(rig.physics.get(e).unwrap().velocity, Vec3::ZERO);
        assert_eq!(
            rig.transforms.get(e).unwrap().position,
            Vec3::new(5.0, 5.0, 0.0)
        );
    }

    #[test]
    fn impulse_scales_by_inverse_mass() {
        let mut rig = Rig::new();
        rig.physics.set_gravity(Vec3::ZERO);
        let e = rig.spawn_box(Vec3::ZERO, Vec3::ONE, 2.0);
        rig.physics.impulse(e, Vec3::new(10.0, 0.0, 0.0)).unwrap();
        rig.step();
        assert!((rig.physics.get(e).unwrap().velocity.x - 5.0).abs() < 1e-6);
    }

    #[test]
    fn impulses_accumulate_until_step() {
        let mut rig = Rig::new();
        rig.physics.set_gravity(Vec3::ZERO);
        let e = rig.spawn_box(Vec3::ZERO, Vec3::ONE, 1.0);
        rig.physics.impulse(e, Vec3::new(1.0, 0.0, 0.0)).unwrap();
        rig.physics.impulse(e, Vec3::new(2.0, 0.0, 0.0)).unwrap();
        rig.step();
        let body = rig.physics.get(e).unwrap();
        assert!((body.velocity.x - 3.0).abs() < 1e-6);
        assert_eq!(body.pending_impulse, Vec3::ZERO);
    }

    #[test]
    fn impulse_on_static_is_usage_error() {
        let mut rig = Rig::new();
        let e = rig.spawn_box(Vec3::ZERO, Vec3::ONE, 0.0);
        let err = rig.physics.impulse(e, Vec3::Y).unwrap_err();
        assert!(matches!(err, EngineError::StaticBody { entity } if entity == e));
    }

    #[test]
    fn impulse_without_body_is_usage_error() {
        let mut rig = Rig::new();
        let e = rig.entities.allocate().unwrap();
        let err = rig.physics.impulse(e, Vec3::Y).unwrap_err();
        assert!(matches!(err, EngineError::NoPhysicsBody { entity } if entity == e));
    }

    #[test]
    fn per_body_gravity_override() {
        let mut rig = Rig::new();
        let normal = rig.spawn_box(Vec3::new(-100.0, 0.0, 0.0), Vec3::ONE, 1.0);
        let floaty = rig.spawn_box(Vec3::new(100.0, 0.0, 0.0), Vec3::ONE, 1.0);
        rig.physics
            .set_body_gravity(floaty, Some(Vec3::ZERO))
            .unwrap();
        rig.step();
        assert!(rig.physics.get(normal).unwrap().velocity.y < 0.0);
        assert_eq!(rig.physics.get(floaty).unwrap().velocity, Vec3::ZERO);
    }

    // -- 3. Detection --

    #[test]
    fn overlapping_pair_is_reported_once() {
        let mut rig = Rig::new();
        rig.physics.set_gravity(Vec3::ZERO);
        let a = rig.spawn_box(Vec3::ZERO, Vec3::ONE, 1.0);
        let b = rig.spawn_box(Vec3::new(1.5, 0.0, 0.0), Vec3::ONE, 0.0);
        let pairs = rig.step();
        assert_eq!(pairs.len(), 1);
        assert!(pairs[0].involves(a));
        assert!(pairs[0].involves(b));
    }

    #[test]
    fn separated_boxes_do_not_collide() {
        let mut rig = Rig::new();
        rig.physics.set_gravity(Vec3::ZERO);
        rig.spawn_box(Vec3::ZERO, Vec3::ONE, 1.0);
        rig.spawn_box(Vec3::new(10.0, 0.0, 0.0), Vec3::ONE, 0.0);
        // Overlapping on x alone is not a contact.
        rig.spawn_box(Vec3::new(0.5, 10.0, 0.0), Vec3::ONE, 0.0);
        assert!(rig.step().is_empty());
    }

    #[test]
    fn touching_counts_as_contact() {
        let mut rig = Rig::new();
        rig.physics.set_gravity(Vec3::ZERO);
        let a = rig.spawn_box(Vec3::ZERO, Vec3::ONE, 1.0);
        let b = rig.spawn_box(Vec3::new(2.0, 0.0, 0.0), Vec3::ONE, 0.0);
        let pairs = rig.step();
        assert_eq!(pairs, vec![CollisionPair::new(a, b)]);
    }

    #[test]
    fn static_static_pairs_are_skipped() {
        let mut rig = Rig::new();
        rig.spawn_box(Vec3::ZERO, Vec3::ONE, 0.0);
        rig.spawn_box(Vec3::new(0.5, 0.0, 0.0), Vec3::ONE, 0.0);
        assert!(rig.step().is_empty());
    }

    #[test]
    fn sweep_matches_brute_force() {
        // A row of near-touching boxes plus strays; the pruned sweep must
        // find exactly the brute-force overlap set.
        let mut rig = Rig::new();
        rig.physics.set_gravity(Vec3::ZERO);
        let mut ids = Vec::new();
        for i in 0..8 {
            ids.push(rig.spawn_box(
                Vec3::new(i as f32 * 1.8, 0.0, 0.0),
                Vec3::ONE,
                if i % 2 == 0 { 1.0 } else { 0.0 },
            ));
        }
        ids.push(rig.spawn_box(Vec3::new(100.0, 0.0, 0.0), Vec3::ONE, 1.0));

        let pairs = rig.physics.detect(&rig.entities, &rig.transforms);

        let mut expected = Vec::new();
        for i in 0..ids.len() {
            for j in (i + 1)..ids.len() {
                let (pa, ba) = (
                    rig.transforms.get(ids[i]).unwrap().position,
                    rig.physics.get(ids[i]).unwrap(),
                );
                let (pb, bb) = (
                    rig.transforms.get(ids[j]).unwrap().position,
                    rig.physics.get(ids[j]).unwrap(),
                );
                if ba.is_static() && bb.is_static() {
                    continue;
                }
                let gap = (pb - pa).abs() - (ba.half_extents + bb.half_extents);
                if gap.cmple(Vec3::ZERO).all() {
                    expected.push(CollisionPair::new(ids[i], ids[j]));
                }
            }
        }
        expected.sort_by_key(|p| (p.entity_a.to_raw(), p.entity_b.to_raw()));
        assert_eq!(pairs, expected);
    }

    // -- 4. Resolution --

    #[test]
    fn dynamic_box_is_pushed_out_of_static_floor() {
        let mut rig = Rig::new();
        let floor = rig.spawn_box(Vec3::new(0.0, -2.0, 0.0), Vec3::new(100.0, 1.0, 100.0), 0.0);
        // Start resting exactly on the floor top (y = -1 + 1 = 0 for a
        // half-height-1 box on a floor whose top is at -1).
        let falling = rig.spawn_box(Vec3::ZERO, Vec3::ONE, 1.0);

        for _ in 0..5 {
            let pairs = rig.step();
            assert_eq!(pairs, vec![CollisionPair::new(floor, falling)]);
        }
        let pos = rig.transforms.get(falling).unwrap().position;
        assert!((pos.y - 0.0).abs() < 1e-4, "rested at {}", pos.y);
        assert_eq!(
            rig.transforms.get(floor).unwrap().position,
            Vec3::new(0.0, -2.0, 0.0),
            "static floor must never be pushed"
        );
    }

    #[test]
    fn equal_masses_split_head_on_collision() {
        let mut rig = Rig::new();
        rig.physics.set_gravity(Vec3::ZERO);
        let left = rig.spawn_box(Vec3::new(-1.04, 0.0, 0.0), Vec3::ONE, 1.0);
        let right = rig.spawn_box(Vec3::new(1.04, 0.0, 0.0), Vec3::ONE, 1.0);
        rig.physics.get_mut(left).unwrap().velocity = Vec3::new(5.0, 0.0, 0.0);
        rig.physics.get_mut(right).unwrap().velocity = Vec3::new(-5.0, 0.0, 0.0);

        rig.step();

        // Inelastic contact: both stop dead.
        assert!(rig.physics.get(left).unwrap().velocity.x.abs() < 1e-4);
        assert!(rig.physics.get(right).unwrap().velocity.x.abs() < 1e-4);
        // Pushed apart to exact touching.
        let gap = rig.transforms.get(right).unwrap().position.x
            - rig.transforms.get(left).unwrap().position.x;
        assert!((gap - 2.0).abs() < 1e-4);
    }

    #[test]
    fn min_axis_prefers_earlier_on_tie() {
        assert_eq!(min_axis(Vec3::new(1.0, 1.0, 1.0)), 0);
        assert_eq!(min_axis(Vec3::new(2.0, 1.0, 1.0)), 1);
        assert_eq!(min_axis(Vec3::new(2.0, 2.0, 1.0)), 2);
    }
}
