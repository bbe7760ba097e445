//! Edge-triggered keyboard state.
//!
//! The host feeds raw key transitions in through [`InputManager::set_key_state`]
//! whenever they arrive; the engine promotes them once per tick via
//! [`InputManager::begin_tick`]. Listeners therefore observe a stable
//! snapshot for the whole tick: [`is_down`](InputManager::is_down) answers
//! from the promoted held set, and [`just_down`](InputManager::just_down) /
//! [`just_released`](InputManager::just_released) are true for exactly one
//! tick per transition. OS auto-repeat is suppressed -- a "down" for a key
//! that is already down records nothing.
//!
//! A tap that fits entirely between two ticks is not lost: the next tick
//! reports the key both just-pressed and just-released while `is_down`
//! stays false.
//!
//! All sets are ordered so iteration (and the pressed/released lists handed
//! to listeners) is deterministic.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::trace;

// ---------------------------------------------------------------------------
// KeyCode
// ---------------------------------------------------------------------------

/// Platform-neutral key identifier.
///
/// Values follow the common GLFW/USB-style layout the host is expected to
/// translate into; [`keys`] names the ones the engine's own demos use.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct KeyCode(pub u32);

impl std::fmt::Display for KeyCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "key({})", self.0)
    }
}

impl From<u32> for KeyCode {
    fn from(raw: u32) -> Self {
        Self(raw)
    }
}

/// Named key codes.
pub mod keys {
    use super::KeyCode;

    pub const SPACE: KeyCode = KeyCode(32);
    pub const A: KeyCode = KeyCode(65);
    pub const D: KeyCode = KeyCode(68);
    pub const S: KeyCode = KeyCode(83);
    pub const W: KeyCode = KeyCode(87);
    pub const ESCAPE: KeyCode = KeyCode(256);
    pub const RIGHT: KeyCode = KeyCode(262);
    pub const LEFT: KeyCode = KeyCode(263);
    pub const DOWN: KeyCode = KeyCode(264);
    pub const UP: KeyCode = KeyCode(265);
}

// ---------------------------------------------------------------------------
// InputDelta
// ---------------------------------------------------------------------------

/// Transitions promoted by one [`InputManager::begin_tick`] call, sorted by
/// key code.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InputDelta {
    pub pressed: Vec<KeyCode>,
    pub released: Vec<KeyCode>,
}

impl InputDelta {
    /// True when no key changed since the previous tick.
    pub fn is_empty(&self) -> bool {
        self.pressed.is_empty() && self.released.is_empty()
    }
}

// ---------------------------------------------------------------------------
// InputManager
// ---------------------------------------------------------------------------

/// Keyboard state with per-tick edge promotion.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InputManager {
    /// Live device state, updated as events arrive.
    device_down: BTreeSet<KeyCode>,
    /// Presses seen since the last promotion.
    pending_pressed: BTreeSet<KeyCode>,
    /// Releases seen since the last promotion.
    pending_released: BTreeSet<KeyCode>,
    /// Promoted state: what listeners see for the current tick.
    held: BTreeSet<KeyCode>,
    just_pressed: BTreeSet<KeyCode>,
    just_released: BTreeSet<KeyCode>,
}

impl InputManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a raw key transition from the host.
    ///
    /// Repeats are ignored: a down for an already-down key (OS auto-repeat)
    /// and an up for an already-up key record nothing.
    pub fn set_key_state(&mut self, key: KeyCode, down: bool) {
        if down {
            if self.device_down.insert(key) {
                self.pending_pressed.insert(key);
                trace!(%key, "key down");
            }
        } else if self.device_down.remove(&key) {
            self.pending_released.insert(key);
            trace!(%key, "key up");
        }
    }

    /// Promote accumulated transitions into the tick-stable snapshot and
    /// return them.
    ///
    /// After this call `just_down`/`just_released` reflect exactly the
    /// transitions since the previous promotion, and `is_down` reflects the
    /// device state at promotion time.
    pub fn begin_tick(&mut self) -> InputDelta {
        self.just_pressed = std::mem::take(&mut self.pending_pressed);
        self.just_released = std::mem::take(&mut self.pending_released);
        self.held = self.device_down.clone();
        InputDelta {
            pressed: self.just_pressed.iter().copied().collect(),
            released: self.just_released.iter().copied().collect(),
        }
    }

    /// Whether `key` is held this tick.
    pub fn is_down(&self, key: KeyCode) -> bool {
        self.held.contains(&key)
    }

    /// Whether `key` is up this tick.
    pub fn is_released(&self, key: KeyCode) -> bool {
        !self.is_down(key)
    }

    /// Whether `key` went down since the previous tick. True for exactly one
    /// tick per press.
    pub fn just_down(&self, key: KeyCode) -> bool {
        self.just_pressed.contains(&key)
    }

    /// Whether `key` went up since the previous tick.
    pub fn just_released(&self, key: KeyCode) -> bool {
        self.just_released.contains(&key)
    }

    /// Keys held this tick, ascending by code.
    pub fn held_keys(&self) -> impl Iterator<Item = KeyCode> + '_ {
        self.held.iter().copied()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
