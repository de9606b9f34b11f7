//! Minimal end-to-end ECS demo: a movement system integrating velocities
//! and bouncing entities off the edges of a fixed region.
//!
//! Run with: cargo run --example bouncing

use anyhow::Result;
use ember_core::ecs::{Component, EntityManager, Scene, System, SystemBase};
use ember_core::message::MessageBus;

const REGION: f32 = 100.0;

#[derive(Clone, Copy, Debug)]
struct Position {
    x: f32,
    y: f32,
}
impl Component for Position {}

#[derive(Clone, Copy, Debug)]
struct Velocity {
    dx: f32,
    dy: f32,
}
impl Component for Velocity {}

struct MovementSystem {
    base: SystemBase,
}

impl MovementSystem {
    fn new() -> Self {
        Self {
            base: SystemBase::new()
                .with_requirement::<Position>()
                .with_requirement::<Velocity>(),
        }
    }
}

impl System for MovementSystem {
    fn base(&self) -> &SystemBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut SystemBase {
        &mut self.base
    }

    fn update(&mut self, entities: &mut EntityManager, _bus: &mut MessageBus, dt: f32) {
        for &entity in self.base.entities() {
            let Ok(velocity) = entities.get_component::<Velocity>(entity).copied() else {
                continue;
            };
            let Ok(position) = entities.get_component_mut::<Position>(entity) else {
                continue;
            };
            position.x += velocity.dx * dt;
            position.y += velocity.dy * dt;

            let bounce_x = position.x <= 0.0 || position.x >= REGION;
            let bounce_y = position.y <= 0.0 || position.y >= REGION;
            if bounce_x || bounce_y {
                let velocity = entities
                    .get_component_mut::<Velocity>(entity)
                    .expect("velocity checked above");
                if bounce_x {
                    velocity.dx = -velocity.dx;
                }
                if bounce_y {
                    velocity.dy = -velocity.dy;
                }
                tracing::debug!(entity = entity.index(), "bounced");
            }
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    tracing::info!("Ember core v{}", ember_core::VERSION);

    let mut scene = Scene::new();
    scene.add_system(MovementSystem::new());

    for i in 0..4 {
        let entity = scene.create_entity();
        scene.add_component(
            entity,
            Position {
                x: 10.0 * i as f32,
                y: 5.0 * i as f32,
            },
        )?;
        scene.add_component(
            entity,
            Velocity {
                dx: 15.0 + i as f32,
                dy: 20.0 - i as f32,
            },
        )?;
    }

    // Simulate a few seconds at a fixed 60 Hz step.
    for _ in 0..240 {
        scene.update(1.0 / 60.0);
    }

    for entity in scene.entity_manager().live_entities() {
        let position = scene.get_component::<Position>(entity)?;
        tracing::info!(
            entity = entity.index(),
            x = position.x,
            y = position.y,
            "final position"
        );
    }

    Ok(())
}
