//! Headless coin-collecting level.
//!
//! Builds a small world -- textured floor, a cloud-sprited character, three
//! coins, a perspective camera -- wires gameplay up entirely through event
//! listeners, then drives the engine with a scripted "player" that taps D
//! whenever the character has stopped. Run with `RUST_LOG=debug` to watch
//! the dispatch traffic.
//!
//! ```sh
//! cargo run --example coin_level
//! ```

use std::cell::RefCell;
use std::rc::Rc;

use glam::{Vec2, Vec3};
use magpie_engine::prelude::*;
use tracing::info;

const MAX_TICKS: u64 = 3600; // one simulated minute
const PUSH: Vec3 = Vec3::new(3.0, 0.0, 0.0);

struct Level {
    character: EntityId,
    coins: Vec<EntityId>,
}

/// Procedural floor texture: a light grid on a dark canvas.
fn floor_texture() -> TextureSpec {
    let mut spec = TextureSpec::new(64, 64, Rgba::new(0.08, 0.08, 0.1, 1.0));
    let grid = Rgba::new(0.3, 0.3, 0.35, 1.0);
    for line in 0..=8 {
        let at = line as f32 / 8.0;
        spec.ops.push(DrawOp::Line {
            from: Vec2::new(at, 0.0),
            to: Vec2::new(at, 1.0),
            color: grid,
        });
        spec.ops.push(DrawOp::Line {
            from: Vec2::new(0.0, at),
            to: Vec2::new(1.0, at),
            color: grid,
        });
    }
    spec
}

fn build_level(engine: &mut Engine) -> Result<Level, EngineError> {
    let world = engine.world_mut();

    let floor = world.new_entity()?;
    world.add_transform(floor)?.position = Vec3::new(0.0, -2.0, 0.0);
    world.create_box(floor, Vec3::new(200.0, 1.0, 200.0), 0.0)?;
    world.add_sprite(floor, SpriteSource::Generated(floor_texture()))?;

    let character = world.new_entity()?;
    world.add_transform(character)?;
    world.create_box(character, Vec3::ONE, 1.0)?;
    world.add_sprite(character, SpriteSource::image("assets/cloud.png"))?;

    let mut coins = Vec::new();
    for x in [5.0, 10.0, 15.0] {
        let coin = world.new_entity()?;
        world.add_transform(coin)?.position = Vec3::new(x, 0.0, 0.0);
        world.create_box(coin, Vec3::ONE, 0.0)?;
        coins.push(coin);
    }

    let eye = world.new_entity()?;
    world.add_transform(eye)?.position = Vec3::new(7.5, 2.0, -250.0);
    world.add_camera_perspective(eye)?;
    world.set_camera_active(eye)?;

    Ok(Level { character, coins })
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let mut engine = Engine::new();
    let Level { character, coins } = build_level(&mut engine)?;
    let remaining: Rc<RefCell<Vec<EntityId>>> = Rc::new(RefCell::new(coins));

    // One-shot greeting: logs on the first update, then retires itself.
    engine.on_update(0, |ctx, _| {
        info!(entities = ctx.world.entity_count(), "level is live");
        Ok(ListenerAction::Unsubscribe)
    });

    // Movement: tap D to push the character to the right.
    engine.on_input_changed(0, move |ctx, _| {
        if ctx.input.just_down(keys::D) {
            ctx.world.impulse(character, PUSH)?;
        }
        Ok(ListenerAction::Keep)
    });

    // Contact log first (negative priority), pickup second.
    engine.on_collision(-10, |_, event| {
        if let GameEvent::Collision(contact) = event {
            tracing::debug!(a = %contact.entity_a, b = %contact.entity_b, "contact");
        }
        Ok(ListenerAction::Keep)
    });
    {
        let remaining = Rc::clone(&remaining);
        engine.on_collision(0, move |ctx, event| {
            if let GameEvent::Collision(contact) = event {
                if let Some(other) = contact.other(character) {
                    let mut left = remaining.borrow_mut();
                    if let Some(slot) = left.iter().position(|&c| c == other) {
                        ctx.world.remove_entity(other);
                        left.remove(slot);
                        info!(coin = %other, remaining = left.len(), "coin collected");
                    }
                }
            }
            Ok(ListenerAction::Keep)
        });
    }

    // Scripted player: press D whenever the character has come to a stop
    // (each collected coin halts it), release once it is moving.
    while engine.tick_count() < MAX_TICKS && !remaining.borrow().is_empty() {
        let stopped = engine
            .world()
            .body(character)
            .map(|body| body.velocity.x.abs() < 0.01)
            .unwrap_or(false);
        engine.set_key_state(keys::D, stopped);
        engine.tick()?;
    }

    let finished = remaining.borrow().is_empty();
    let snapshot = engine.snapshot()?;
    info!(
        finished,
        ticks = engine.tick_count(),
        sim_seconds = engine.sim_time(),
        entities = engine.world().entity_count(),
        hash = snapshot.state_hash(),
        "run complete"
    );

    if let Some(pose) = engine.world().transform(character) {
        info!(x = pose.position.x, y = pose.position.y, "character ended at");
    }
    Ok(())
}
