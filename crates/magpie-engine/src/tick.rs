//! The engine loop: fixed-timestep ticks with a strict phase order.
//!
//! Every call to [`Engine::tick`] runs the same five phases:
//!
//! 1. promote accumulated input transitions ([`InputManager::begin_tick`]),
//! 2. dispatch one [`GameEvent::InputChanged`] if anything changed,
//! 3. step physics by the fixed dt,
//! 4. dispatch one [`GameEvent::Collision`] per contact pair, skipping
//!    pairs whose entities an earlier listener already removed,
//! 5. dispatch [`GameEvent::Update`], then recycle retired entity slots.
//!
//! The timestep never varies and simulation time is derived (`tick_count *
//! fixed_dt`), never accumulated, so two engines fed the same listeners and
//! key transitions stay bit-identical tick for tick.

use tracing::{debug, trace};

use crate::event::{
    CollisionEvent, DispatchStats, EventCtx, EventKind, EventManager, GameEvent, ListenerAction,
    ListenerId,
};
use crate::input::{InputDelta, InputManager, KeyCode};
use crate::world::World;
use crate::EngineError;

// ---------------------------------------------------------------------------
// TickConfig
// ---------------------------------------------------------------------------

/// Fixed-timestep configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickConfig {
    /// Seconds advanced per tick.
    pub fixed_dt: f32,
}

impl TickConfig {
    /// 60 simulation ticks per second.
    pub const DEFAULT_DT: f32 = 1.0 / 60.0;

    /// Panics if `fixed_dt` is not positive and finite; a zero or NaN
    /// timestep cannot produce a meaningful simulation.
    pub fn new(fixed_dt: f32) -> Self {
        assert!(
            fixed_dt > 0.0 && fixed_dt.is_finite(),
            "fixed_dt must be positive and finite, got {fixed_dt}"
        );
        Self { fixed_dt }
    }
}

impl Default for TickConfig {
    fn default() -> Self {
        Self::new(Self::DEFAULT_DT)
    }
}

// ---------------------------------------------------------------------------
// TickReport
// ---------------------------------------------------------------------------

/// What one tick did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickReport {
    /// The tick that just completed, 1-based.
    pub frame: u64,
    /// Input transitions promoted at the start of the tick.
    pub input: InputDelta,
    /// Contact pairs detected by the physics step.
    pub contacts: usize,
    /// Listener calls across all dispatches this tick.
    pub stats: DispatchStats,
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// World, events, and input under one fixed-timestep loop.
#[derive(Debug)]
pub struct Engine {
    pub(crate) world: World,
    pub(crate) events: EventManager,
    pub(crate) input: InputManager,
    pub(crate) config: TickConfig,
    pub(crate) tick_count: u64,
}

impl Engine {
    pub fn new() -> Self {
        Self::with_config(TickConfig::default())
    }

    pub fn with_config(config: TickConfig) -> Self {
        Self {
            world: World::new(),
            events: EventManager::new(),
            input: InputManager::new(),
            config,
            tick_count: 0,
        }
    }

    /// Replace the default world (used by hosts that install their own
    /// sprite resolver).
    pub fn with_world(world: World, config: TickConfig) -> Self {
        Self {
            world,
            events: EventManager::new(),
            input: InputManager::new(),
            config,
            tick_count: 0,
        }
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    pub fn input(&self) -> &InputManager {
        &self.input
    }

    pub fn config(&self) -> TickConfig {
        self.config
    }

    /// Completed ticks since construction (or since the last restore).
    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    /// Simulation seconds elapsed: `tick_count * fixed_dt`, computed fresh
    /// each call so it never drifts from the tick counter.
    pub fn sim_time(&self) -> f64 {
        self.tick_count as f64 * self.config.fixed_dt as f64
    }

    /// Feed one raw key transition from the host. Takes effect at the next
    /// tick's promotion.
    pub fn set_key_state(&mut self, key: KeyCode, down: bool) {
        self.input.set_key_state(key, down);
    }

    // -----------------------------------------------------------------------
    // Listener registration
    // -----------------------------------------------------------------------

    /// Register a listener for `kind` at `priority` (lower fires first).
    pub fn add_listener<F>(&mut self, kind: EventKind, priority: i32, listener: F) -> ListenerId
    where
        F: FnMut(&mut EventCtx<'_>, &GameEvent) -> Result<ListenerAction, anyhow::Error>
            + 'static,
    {
        self.events.add_listener(kind, priority, Box::new(listener))
    }

    /// [`add_listener`](Engine::add_listener) for [`EventKind::InputChanged`].
    pub fn on_input_changed<F>(&mut self, priority: i32, listener: F) -> ListenerId
    where
        F: FnMut(&mut EventCtx<'_>, &GameEvent) -> Result<ListenerAction, anyhow::Error>
            + 'static,
    {
        self.add_listener(EventKind::InputChanged, priority, listener)
    }

    /// [`add_listener`](Engine::add_listener) for [`EventKind::Collision`].
    pub fn on_collision<F>(&mut self, priority: i32, listener: F) -> ListenerId
    where
        F: FnMut(&mut EventCtx<'_>, &GameEvent) -> Result<ListenerAction, anyhow::Error>
            + 'static,
    {
        self.add_listener(EventKind::Collision, priority, listener)
    }

    /// [`add_listener`](Engine::add_listener) for [`EventKind::Update`].
    pub fn on_update<F>(&mut self, priority: i32, listener: F) -> ListenerId
    where
        F: FnMut(&mut EventCtx<'_>, &GameEvent) -> Result<ListenerAction, anyhow::Error>
            + 'static,
    {
        self.add_listener(EventKind::Update, priority, listener)
    }

    /// Remove a listener by handle; unknown ids are a no-op.
    pub fn remove_listener(&mut self, id: ListenerId) {
        self.events.remove_listener(id);
    }

    // -----------------------------------------------------------------------
    // Tick
    // -----------------------------------------------------------------------

    /// Advance the simulation by exactly one fixed timestep.
    ///
    /// A configuration error from the physics step (a body whose Transform
    /// was removed) aborts the tick: the error is returned, the tick is not
    /// counted, and no further phases run. Listener errors never abort --
    /// they are logged, counted in the report, and dispatch continues.
    pub fn tick(&mut self) -> Result<TickReport, EngineError> {
        let dt = self.config.fixed_dt;
        let frame = self.tick_count + 1;
        let mut stats = DispatchStats::default();

        // Phase 1: promote input edges.
        let delta = self.input.begin_tick();

        // Phase 2: input event, only when something changed.
        if !delta.is_empty() {
            let event = GameEvent::InputChanged {
                pressed: delta.pressed.clone(),
                released: delta.released.clone(),
            };
            accumulate(
                &mut stats,
                self.events.dispatch(&mut self.world, &self.input, &event),
            );
        }

        // Phase 3: physics.
        let pairs = self.world.step_physics(dt)?;

        // Phase 4: one collision event per surviving pair. Listeners for an
        // earlier pair may have removed an entity of a later one; those
        // pairs are dropped here rather than delivered dead.
        for pair in &pairs {
            if !self.world.is_alive(pair.entity_a) || !self.world.is_alive(pair.entity_b) {
                trace!(
                    a = %pair.entity_a,
                    b = %pair.entity_b,
                    "contact dropped, entity removed mid-dispatch"
                );
                continue;
            }
            let event = GameEvent::Collision(CollisionEvent {
                entity_a: pair.entity_a,
                entity_b: pair.entity_b,
            });
            accumulate(
                &mut stats,
                self.events.dispatch(&mut self.world, &self.input, &event),
            );
        }

        // Phase 5: update hook, then slot recycling.
        let event = GameEvent::Update { delta: dt, frame };
        accumulate(
            &mut stats,
            self.events.dispatch(&mut self.world, &self.input, &event),
        );
        self.world.maintain();

        self.tick_count = frame;
        debug!(
            frame,
            contacts = pairs.len(),
            invoked = stats.invoked,
            failed = stats.failed,
            "tick complete"
        );
        Ok(TickReport {
            frame,
            input: delta,
            contacts: pairs.len(),
            stats,
        })
    }

    /// Run `n` ticks back to back, stopping at the first error.
    pub fn run_ticks(&mut self, n: u64) -> Result<(), EngineError> {
        for _ in 0..n {
            self.tick()?;
        }
        Ok(())
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

fn accumulate(total: &mut DispatchStats, stats: DispatchStats) {
    total.invoked += stats.invoked;
    total.failed += stats.failed;
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
