//! Tagged game events and priority-ordered listener dispatch.
//!
//! The event surface is a closed set of three kinds -- input changes,
//! physics contacts, and the per-tick update -- carried by [`GameEvent`].
//! Listeners subscribe per kind with an `i32` priority; dispatch walks
//! priorities in ascending order (lower fires first) and registration order
//! within a priority.
//!
//! Listeners receive an [`EventCtx`] that lends them the whole
//! [`World`](crate::world::World) mutably, so gameplay code can spawn,
//! despawn, and push bodies around from inside a handler. What a listener
//! cannot do is mutate the listener registry mid-walk: subscription and
//! removal requested through the ctx are queued and merged after the
//! dispatch completes, so the set of listeners consulted for one event is
//! frozen when that dispatch starts.
//!
//! A listener that returns an error is logged and skipped, never unravels
//! the dispatch, and stays registered. Returning
//! [`ListenerAction::Unsubscribe`] is the cooperative way out.

use std::collections::BTreeMap;

use magpie_ecs::EntityId;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::input::{InputManager, KeyCode};
use crate::world::World;

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// Discriminant for listener registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EventKind {
    InputChanged,
    Collision,
    Update,
}

/// Two entities whose boxes overlapped this tick, as seen by listeners.
///
/// Slot order is canonical (ascending raw id) and carries no meaning; use
/// [`involves`](CollisionEvent::involves) and [`other`](CollisionEvent::other)
/// rather than matching on slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollisionEvent {
    pub entity_a: EntityId,
    pub entity_b: EntityId,
}

impl CollisionEvent {
    /// Whether `entity` is one of the pair.
    pub fn involves(&self, entity: EntityId) -> bool {
        self.entity_a == entity || self.entity_b == entity
    }

    /// The pair partner of `entity`, if `entity` is part of this contact.
    pub fn other(&self, entity: EntityId) -> Option<EntityId> {
        if entity == self.entity_a {
            Some(self.entity_b)
        } else if entity == self.entity_b {
            Some(self.entity_a)
        } else {
            None
        }
    }
}

/// One engine event, tagged by kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GameEvent {
    /// At least one key changed since the previous tick. Both lists are
    /// sorted by key code.
    InputChanged {
        pressed: Vec<KeyCode>,
        released: Vec<KeyCode>,
    },
    /// Two boxes overlap this tick. Repeats every tick the overlap holds.
    Collision(CollisionEvent),
    /// End-of-tick update hook.
    Update { delta: f32, frame: u64 },
}

impl GameEvent {
    /// The kind this event dispatches under.
    pub fn kind(&self) -> EventKind {
        match self {
            GameEvent::InputChanged { .. } => EventKind::InputChanged,
            GameEvent::Collision(_) => EventKind::Collision,
            GameEvent::Update { .. } => EventKind::Update,
        }
    }
}

// ---------------------------------------------------------------------------
// Listeners
// ---------------------------------------------------------------------------

/// Stable handle to a registered listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ListenerId(u64);

/// What a listener wants done with its own registration after a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerAction {
    /// Stay registered.
    Keep,
    /// Drop this registration once the current dispatch finishes its walk.
    Unsubscribe,
}

/// Boxed listener callback.
///
/// Errors are isolated: a failing listener is logged and counted, the rest
/// of the dispatch proceeds, and the listener stays registered.
pub type Listener =
    Box<dyn FnMut(&mut EventCtx<'_>, &GameEvent) -> Result<ListenerAction, anyhow::Error>>;

/// What listeners see during a dispatch: the world to mutate, the promoted
/// input snapshot to query, and the queue for registry changes.
pub struct EventCtx<'a> {
    pub world: &'a mut World,
    pub input: &'a InputManager,
    queue: &'a mut ListenerQueue,
}

impl<'a> EventCtx<'a> {
    /// Queue a new listener; it takes effect when the current dispatch
    /// completes and is never consulted for the event being dispatched.
    pub fn add_listener(&mut self, kind: EventKind, priority: i32, listener: Listener) -> ListenerId {
        self.queue.push_add(kind, priority, listener)
    }

    /// Queue removal of a listener; the target still sees the current
    /// dispatch if it is part of the frozen walk. Unknown ids are ignored.
    pub fn remove_listener(&mut self, id: ListenerId) {
        self.queue.push_remove(id);
    }
}

struct ListenerEntry {
    id: ListenerId,
    callback: Listener,
}

/// Reentrancy seam: id allocation plus the add/remove queue that dispatch
/// merges at its boundaries.
#[derive(Default)]
struct ListenerQueue {
    next_id: u64,
    adds: Vec<(EventKind, i32, ListenerEntry)>,
    removes: Vec<ListenerId>,
}

impl ListenerQueue {
    fn push_add(&mut self, kind: EventKind, priority: i32, listener: Listener) -> ListenerId {
        self.next_id += 1;
        let id = ListenerId(self.next_id);
        self.adds.push((
            kind,
            priority,
            ListenerEntry {
                id,
                callback: listener,
            },
        ));
        id
    }

    fn push_remove(&mut self, id: ListenerId) {
        self.removes.push(id);
    }

    fn is_empty(&self) -> bool {
        self.adds.is_empty() && self.removes.is_empty()
    }
}

/// Counters for one dispatch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    /// Listener calls made.
    pub invoked: usize,
    /// Calls that returned an error.
    pub failed: usize,
}

// ---------------------------------------------------------------------------
// EventManager
// ---------------------------------------------------------------------------

type ListenerTable = BTreeMap<i32, Vec<ListenerEntry>>;

/// Per-kind listener registry and dispatcher.
///
/// Registration through [`add_listener`](EventManager::add_listener) and
/// [`remove_listener`](EventManager::remove_listener) funnels through the
/// same queue the [`EventCtx`] uses and is applied immediately when no
/// dispatch is running.
#[derive(Default)]
pub struct EventManager {
    input_changed: ListenerTable,
    collision: ListenerTable,
    update: ListenerTable,
    queue: ListenerQueue,
}

impl EventManager {
    pub fn new() -> Self {
        Self::default()
    }

    fn table_mut(&mut self, kind: EventKind) -> &mut ListenerTable {
        match kind {
            EventKind::InputChanged => &mut self.input_changed,
            EventKind::Collision => &mut self.collision,
            EventKind::Update => &mut self.update,
        }
    }

    fn table(&self, kind: EventKind) -> &ListenerTable {
        match kind {
            EventKind::InputChanged => &self.input_changed,
            EventKind::Collision => &self.collision,
            EventKind::Update => &self.update,
        }
    }

    /// Register `listener` for `kind` at `priority` (lower fires first;
    /// ties fire in registration order).
    pub fn add_listener(
        &mut self,
        kind: EventKind,
        priority: i32,
        listener: Listener,
    ) -> ListenerId {
        let id = self.queue.push_add(kind, priority, listener);
        self.apply_queue();
        debug!(?kind, priority, id = id.0, "listener registered");
        id
    }

    /// Remove a listener by handle. Unknown or already-removed ids are a
    /// no-op.
    pub fn remove_listener(&mut self, id: ListenerId) {
        self.queue.push_remove(id);
        self.apply_queue();
    }

    /// Registered listeners for `kind`.
    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.table(kind).values().map(Vec::len).sum()
    }

    /// Registered listeners across all kinds.
    pub fn total_listener_count(&self) -> usize {
        [EventKind::InputChanged, EventKind::Collision, EventKind::Update]
            .into_iter()
            .map(|kind| self.listener_count(kind))
            .sum()
    }

    /// Merge queued adds then queued removes into the live tables.
    ///
    /// Adds go first so a listener registered and removed within the same
    /// dispatch nets out to absent.
    fn apply_queue(&mut self) {
        if self.queue.is_empty() {
            return;
        }
        for (kind, priority, entry) in std::mem::take(&mut self.queue.adds) {
            self.table_mut(kind).entry(priority).or_default().push(entry);
        }
        let removes = std::mem::take(&mut self.queue.removes);
        if removes.is_empty() {
            return;
        }
        for table in [
            &mut self.input_changed,
            &mut self.collision,
            &mut self.update,
        ] {
            for bucket in table.values_mut() {
                bucket.retain(|entry| !removes.contains(&entry.id));
            }
            table.retain(|_, bucket| !bucket.is_empty());
        }
    }

    /// Deliver `event` to every listener of its kind.
    ///
    /// The walk is over a frozen copy of the kind's table: registry changes
    /// requested by listeners land after the walk. Listener errors are
    /// logged, counted in the returned [`DispatchStats`], and do not stop
    /// the walk.
    pub fn dispatch(
        &mut self,
        world: &mut World,
        input: &InputManager,
        event: &GameEvent,
    ) -> DispatchStats {
        self.apply_queue();

        let kind = event.kind();
        let mut frozen = std::mem::take(self.table_mut(kind));
        let mut stats = DispatchStats::default();

        for bucket in frozen.values_mut() {
            bucket.retain_mut(|entry| {
                let mut ctx = EventCtx {
                    world: &mut *world,
                    input,
                    queue: &mut self.queue,
                };
                stats.invoked += 1;
                match (entry.callback)(&mut ctx, event) {
                    Ok(ListenerAction::Keep) => true,
                    Ok(ListenerAction::Unsubscribe) => {
                        debug!(id = entry.id.0, ?kind, "listener unsubscribed");
                        false
                    }
                    Err(error) => {
                        stats.failed += 1;
                        warn!(id = entry.id.0, ?kind, %error, "listener failed");
                        true
                    }
                }
            });
        }
        frozen.retain(|_, bucket| !bucket.is_empty());

        // The slot stayed empty during the walk (reentrant changes are
        // queued), so restoring cannot clobber anything.
        *self.table_mut(kind) = frozen;
        self.apply_queue();
        stats
    }
}

impl std::fmt::Debug for EventManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventManager")
            .field("input_changed", &self.listener_count(EventKind::InputChanged))
            .field("collision", &self.listener_count(EventKind::Collision))
            .field("update", &self.listener_count(EventKind::Update))
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;

    fn update_event() -> GameEvent {
        GameEvent::Update {
            delta: 1.0 / 60.0,
            frame: 1,
        }
    }

    /// Listener that appends `tag` to the shared log and keeps itself.
    fn tagger(log: &Rc<RefCell<Vec<i32>>>, tag: i32) -> Listener {
        let log = Rc::clone(log);
        Box::new(move |_, _| {
            log.borrow_mut().push(tag);
            Ok(ListenerAction::Keep)
        })
    }

    #[test]
    fn priorities_fire_ascending() {
        let mut world = World::new();
        let input = InputManager::new();
        let mut events = EventManager::new();
        let log = Rc::new(RefCell::new(Vec::new()));

        events.add_listener(EventKind::Update, 10, tagger(&log, 10));
        events.add_listener(EventKind::Update, -5, tagger(&log, -5));
        events.add_listener(EventKind::Update, 0, tagger(&log, 0));

        events.dispatch(&mut world, &input, &update_event());
        assert_eq!(*log.borrow(), vec![-5, 0, 10]);
    }

    #[test]
    fn equal_priorities_fire_in_registration_order() {
        let mut world = World::new();
        let input = InputManager::new();
        let mut events = EventManager::new();
        let log = Rc::new(RefCell::new(Vec::new()));

        for tag in [1, 2, 3] {
            events.add_listener(EventKind::Update, 7, tagger(&log, tag));
        }
        events.dispatch(&mut world, &input, &update_event());
        assert_eq!(*log.borrow(), vec![1, 2, 3]);
    }

    #[test]
    fn listeners_only_see_their_kind() {
        let mut world = World::new();
        let input = InputManager::new();
        let mut events = EventManager::new();
        let log = Rc::new(RefCell::new(Vec::new()));

        events.add_listener(EventKind::Collision, 0, tagger(&log, 1));
        let stats = events.dispatch(&mut world, &input, &update_event());
        assert_eq!(stats.invoked, 0);
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn unsubscribe_drops_only_the_returning_listener() {
        let mut world = World::new();
        let input = InputManager::new();
        let mut events = EventManager::new();
        let log = Rc::new(RefCell::new(Vec::new()));

        let once = {
            let log = Rc::clone(&log);
            Box::new(move |_: &mut EventCtx<'_>, _: &GameEvent| {
                log.borrow_mut().push(1);
                Ok(ListenerAction::Unsubscribe)
            })
        };
        events.add_listener(EventKind::Update, 0, once);
        events.add_listener(EventKind::Update, 0, tagger(&log, 2));

        events.dispatch(&mut world, &input, &update_event());
        events.dispatch(&mut world, &input, &update_event());
        assert_eq!(*log.borrow(), vec![1, 2, 2]);
        assert_eq!(events.listener_count(EventKind::Update), 1);
    }

    #[test]
    fn failing_listener_is_isolated_and_stays_registered() {
        let mut world = World::new();
        let input = InputManager::new();
        let mut events = EventManager::new();
        let log = Rc::new(RefCell::new(Vec::new()));

        events.add_listener(
            EventKind::Update,
            0,
            Box::new(|_, _| anyhow::bail!("scripted failure")),
        );
        events.add_listener(EventKind::Update, 1, tagger(&log, 2));

        let stats = events.dispatch(&mut world, &input, &update_event());
        assert_eq!(stats, DispatchStats { invoked: 2, failed: 1 });
        assert_eq!(*log.borrow(), vec![2], "later listener still ran");

        let stats = events.dispatch(&mut world, &input, &update_event());
        assert_eq!(stats.failed, 1, "failing listener stays registered");
    }

    #[test]
    fn listener_added_during_dispatch_waits_for_the_next_one() {
        let mut world = World::new();
        let input = InputManager::new();
        let mut events = EventManager::new();
        let log = Rc::new(RefCell::new(Vec::new()));

        let spawner = {
            let log = Rc::clone(&log);
            Box::new(move |ctx: &mut EventCtx<'_>, _: &GameEvent| {
                log.borrow_mut().push(1);
                let inner = Rc::clone(&log);
                // Lower priority than the spawner, yet it must not fire
                // during the dispatch that registered it.
                ctx.add_listener(
                    EventKind::Update,
                    -100,
                    Box::new(move |_, _| {
                        inner.borrow_mut().push(99);
                        Ok(ListenerAction::Keep)
                    }),
                );
                Ok(ListenerAction::Unsubscribe)
            })
        };
        events.add_listener(EventKind::Update, 0, spawner);

        events.dispatch(&mut world, &input, &update_event());
        assert_eq!(*log.borrow(), vec![1]);

        events.dispatch(&mut world, &input, &update_event());
        assert_eq!(*log.borrow(), vec![1, 99]);
    }

    #[test]
    fn listener_removed_during_dispatch_still_sees_it() {
        let mut world = World::new();
        let input = InputManager::new();
        let mut events = EventManager::new();
        let log = Rc::new(RefCell::new(Vec::new()));

        let victim = events.add_listener(EventKind::Update, 10, tagger(&log, 2));
        let remover = {
            Box::new(move |ctx: &mut EventCtx<'_>, _: &GameEvent| {
                ctx.remove_listener(victim);
                Ok(ListenerAction::Keep)
            })
        };
        events.add_listener(EventKind::Update, 0, remover);

        events.dispatch(&mut world, &input, &update_event());
        assert_eq!(*log.borrow(), vec![2], "frozen walk still reaches the victim");

        events.dispatch(&mut world, &input, &update_event());
        assert_eq!(*log.borrow(), vec![2], "victim is gone afterwards");
    }

    #[test]
    fn add_then_remove_within_one_dispatch_nets_to_absent() {
        let mut world = World::new();
        let input = InputManager::new();
        let mut events = EventManager::new();

        let churner = Box::new(move |ctx: &mut EventCtx<'_>, _: &GameEvent| {
            let id = ctx.add_listener(
                EventKind::Update,
                0,
                Box::new(|_, _| Ok(ListenerAction::Keep)),
            );
            ctx.remove_listener(id);
            Ok(ListenerAction::Unsubscribe)
        });
        events.add_listener(EventKind::Update, 0, churner);

        events.dispatch(&mut world, &input, &update_event());
        assert_eq!(events.total_listener_count(), 0);
    }

    #[test]
    fn removing_unknown_id_is_a_noop() {
        let mut events = EventManager::new();
        let id = events.add_listener(
            EventKind::Update,
            0,
            Box::new(|_, _| Ok(ListenerAction::Keep)),
        );
        events.remove_listener(id);
        events.remove_listener(id);
        assert_eq!(events.total_listener_count(), 0);
    }

    #[test]
    fn listeners_mutate_the_world_directly() {
        let mut world = World::new();
        let input = InputManager::new();
        let mut events = EventManager::new();

        events.add_listener(
            EventKind::Update,
            0,
            Box::new(|ctx, _| {
                ctx.world.new_entity()?;
                Ok(ListenerAction::Keep)
            }),
        );
        events.dispatch(&mut world, &input, &update_event());
        assert_eq!(world.entity_count(), 1);
    }

    #[test]
    fn collision_event_pair_helpers() {
        let mut world = World::new();
        let a = world.new_entity().unwrap();
        let b = world.new_entity().unwrap();
        let c = world.new_entity().unwrap();
        let event = CollisionEvent {
            entity_a: a,
            entity_b: b,
        };
        assert!(event.involves(a) && event.involves(b) && !event.involves(c));
        assert_eq!(event.other(a), Some(b));
        assert_eq!(event.other(b), Some(a));
        assert_eq!(event.other(c), None);
    }
}
