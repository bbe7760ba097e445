//! Determinism guarantees: identical input scripts replay to bit-identical
//! state, and a restored snapshot replays to the same future.

use glam::Vec3;
use magpie_engine::prelude::*;
use proptest::prelude::*;

/// Keys the random scripts are allowed to touch.
const PALETTE: [KeyCode; 4] = [keys::SPACE, keys::A, keys::D, keys::W];

/// A small playable world with input-driven impulses and coin pickup, the
/// shape a real level has.
fn build_game() -> Engine {
    let mut engine = Engine::new();
    let world = engine.world_mut();

    let floor = world.new_entity().unwrap();
    world.add_transform(floor).unwrap().position = Vec3::new(0.0, -2.0, 0.0);
    world
        .create_box(floor, Vec3::new(300.0, 1.0, 300.0), 0.0)
        .unwrap();

    let character = world.new_entity().unwrap();
    world.add_transform(character).unwrap();
    world.create_box(character, Vec3::ONE, 1.0).unwrap();

    for x in [4.0, -6.0] {
        let coin = world.new_entity().unwrap();
        world.add_transform(coin).unwrap().position = Vec3::new(x, 0.0, 0.0);
        world.create_box(coin, Vec3::ONE, 0.0).unwrap();
    }

    engine.on_input_changed(0, move |ctx, _| {
        if ctx.input.just_down(keys::D) {
            ctx.world.impulse(character, Vec3::new(2.0, 0.0, 0.0))?;
        }
        if ctx.input.just_down(keys::A) {
            ctx.world.impulse(character, Vec3::new(-2.0, 0.0, 0.0))?;
        }
        if ctx.input.just_down(keys::SPACE) {
            ctx.world.impulse(character, Vec3::new(0.0, 4.0, 0.0))?;
        }
        Ok(ListenerAction::Keep)
    });

    engine.on_collision(0, move |ctx, event| {
        if let GameEvent::Collision(contact) = event {
            if let Some(other) = contact.other(character) {
                let is_coin = other != floor
                    && ctx.world.body(other).map(|b| b.is_static()).unwrap_or(false);
                if is_coin {
                    ctx.world.remove_entity(other);
                }
            }
        }
        Ok(ListenerAction::Keep)
    });

    engine
}

/// One tick's worth of key transitions: (palette index, down).
type TickScript = Vec<(u8, bool)>;

/// Run `script` from a fresh game and hash the state after every tick.
fn run_script(script: &[TickScript]) -> Vec<String> {
    let mut engine = build_game();
    let mut hashes = Vec::with_capacity(script.len());
    for tick_inputs in script {
        for &(slot, down) in tick_inputs {
            engine.set_key_state(PALETTE[slot as usize % PALETTE.len()], down);
        }
        engine.tick().unwrap();
        hashes.push(engine.state_hash().unwrap());
    }
    hashes
}

#[test]
fn twin_runs_stay_identical_tick_for_tick() {
    // A hand-rolled script with taps, holds, and overlapping keys.
    let mut script: Vec<TickScript> = Vec::new();
    for tick in 0..120u32 {
        let mut inputs = TickScript::new();
        match tick % 17 {
            0 => inputs.push((2, true)),  // press D
            4 => inputs.push((2, false)), // release D
            8 => {
                inputs.push((0, true)); // press SPACE while pressing A
                inputs.push((1, true));
            }
            9 => {
                inputs.push((0, false));
                inputs.push((1, false));
            }
            _ => {}
        }
        script.push(inputs);
    }

    let first = run_script(&script);
    let second = run_script(&script);
    assert_eq!(first, second);
}

#[test]
fn snapshot_restore_replays_to_the_same_future() {
    let mut engine = build_game();

    // Warm up with some play so the snapshot state is non-trivial.
    for tick in 0..30u32 {
        engine.set_key_state(keys::D, tick % 6 < 3);
        engine.tick().unwrap();
    }
    let saved = engine.snapshot().unwrap();

    let future_script = |engine: &mut Engine| -> Vec<String> {
        let mut hashes = Vec::new();
        for tick in 0..40u32 {
            engine.set_key_state(keys::SPACE, tick % 10 == 0);
            engine.set_key_state(keys::A, tick % 7 < 2);
            engine.tick().unwrap();
            hashes.push(engine.state_hash().unwrap());
        }
        hashes
    };

    let first_future = future_script(&mut engine);
    engine.restore(&saved).unwrap();
    let second_future = future_script(&mut engine);

    assert_eq!(first_future, second_future);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    /// Any key script at all replays identically from a fresh world.
    #[test]
    fn random_scripts_replay_identically(
        script in prop::collection::vec(
            prop::collection::vec((0..4u8, any::<bool>()), 0..3),
            1..60,
        )
    ) {
        let first = run_script(&script);
        let second = run_script(&script);
        prop_assert_eq!(first, second);
    }

    /// Hashes only change when state changes: a tick with no input and no
    /// motion (everything settled, nothing dynamic in the air) still bumps
    /// the tick counter, so consecutive hashes differ; but two engines at
    /// the same tick always agree.
    #[test]
    fn hash_is_a_function_of_state_alone(ticks in 1..50u32) {
        let mut a = build_game();
        let mut b = build_game();
        for _ in 0..ticks {
            a.tick().unwrap();
            b.tick().unwrap();
        }
        prop_assert_eq!(a.state_hash().unwrap(), b.state_hash().unwrap());
        a.tick().unwrap();
        prop_assert_ne!(a.state_hash().unwrap(), b.state_hash().unwrap());
    }
}
