//! Concrete replicable entity types.
//!
//! Two variants cover the two shapes the contract has to support: a `Ship`
//! with a health capability and extra typed wire fields, and a `Projectile`
//! that replicates nothing beyond the shared core and dies at the world edge.

use crate::entity::{EntityCore, Health, Replica, WorldBounds};
use crate::error::SyncError;
use crate::id::IdAllocator;
use crate::value::{SyncMap, Vec2};

pub const SHIP_TAG: &str = "ship";
pub const PROJECTILE_TAG: &str = "projectile";

pub const SHIP_SIZE: f32 = 32.0;
pub const PROJECTILE_SIZE: f32 = 4.0;
pub const SHIP_SPEED: f32 = 150.0;
pub const PROJECTILE_SPEED: f32 = 400.0;

const BLOB_HEALTH: &str = "health";
const BLOB_MAX_HEALTH: &str = "max_health";
const DATA_VELOCITY: &str = "vel";

/// A player-controlled entity with health. Health and max health ride as
/// typed top-level blob fields; velocity rides in the sync map.
pub struct Ship {
    core: EntityCore,
    health: Health,
    pub velocity: Vec2,
}

impl Ship {
    pub fn new(ids: &IdAllocator, owner: &str, max_health: i32) -> Self {
        Self {
            core: EntityCore::new(ids, owner, "ship", Vec2::new(SHIP_SIZE, SHIP_SIZE)),
            health: Health::new(max_health),
            velocity: Vec2::default(),
        }
    }

    /// An empty ship for factory construction.
    pub fn from_wire() -> Self {
        Self {
            core: EntityCore::from_wire(),
            health: Health::new(1),
            velocity: Vec2::default(),
        }
    }

    pub fn health(&self) -> &Health {
        &self.health
    }

    pub fn health_mut(&mut self) -> &mut Health {
        &mut self.health
    }
}

impl Replica for Ship {
    fn core(&self) -> &EntityCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut EntityCore {
        &mut self.core
    }

    fn type_tag(&self) -> &'static str {
        SHIP_TAG
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }

    fn prepare_create(&mut self) {
        self.core.sync.set_vec2(DATA_VELOCITY, self.velocity);
    }

    fn encode_create(&mut self) -> SyncMap {
        self.prepare_create();
        let mut blob = self.core.encode_create_blob();
        blob.set_int(BLOB_HEALTH, self.health.current());
        blob.set_int(BLOB_MAX_HEALTH, self.health.max());
        blob
    }

    fn decode_create(&mut self, blob: &SyncMap) -> Result<(), SyncError> {
        self.core.decode_create_blob(blob)?;
        self.health = Health::new(blob.get_int_or(BLOB_MAX_HEALTH, 1));
        self.health
            .set(blob.get_int_or(BLOB_HEALTH, self.health.max()));
        self.on_create_decoded();
        Ok(())
    }

    fn prepare_update(&mut self) {
        self.core.sync.set_vec2(DATA_VELOCITY, self.velocity);
    }

    fn encode_update(&mut self) -> SyncMap {
        self.prepare_update();
        let mut blob = self.core.encode_update_blob();
        blob.set_int(BLOB_HEALTH, self.health.current());
        blob
    }

    fn apply_update(&mut self, blob: &SyncMap) -> Result<(), SyncError> {
        if self.core.apply_update_blob(blob)? {
            self.health
                .set(blob.get_int_or(BLOB_HEALTH, self.health.current()));
        }
        self.on_update_applied();
        Ok(())
    }

    fn on_create_decoded(&mut self) {
        self.velocity = self.core.sync.get_vec2_or(DATA_VELOCITY, self.velocity);
    }

    fn on_update_applied(&mut self) {
        self.velocity = self.core.sync.get_vec2_or(DATA_VELOCITY, self.velocity);
    }

    fn update(&mut self, dt: f32) {
        self.core.position.x += self.velocity.x * dt;
        self.core.position.y += self.velocity.y * dt;
    }

    fn should_remove(&self, _world: &WorldBounds) -> bool {
        !self.health.is_alive()
    }
}

/// A fire-and-forget entity: no health, removed once it leaves the world.
pub struct Projectile {
    core: EntityCore,
    pub velocity: Vec2,
}

impl Projectile {
    pub fn new(ids: &IdAllocator, owner: &str, position: Vec2, velocity: Vec2) -> Self {
        let mut core = EntityCore::new(
            ids,
            owner,
            "projectile",
            Vec2::new(PROJECTILE_SIZE, PROJECTILE_SIZE),
        );
        core.position = position;
        Self { core, velocity }
    }

    pub fn from_wire() -> Self {
        Self {
            core: EntityCore::from_wire(),
            velocity: Vec2::default(),
        }
    }
}

impl Replica for Projectile {
    fn core(&self) -> &EntityCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut EntityCore {
        &mut self.core
    }

    fn type_tag(&self) -> &'static str {
        PROJECTILE_TAG
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }

    fn prepare_create(&mut self) {
        self.core.sync.set_vec2(DATA_VELOCITY, self.velocity);
    }

    fn prepare_update(&mut self) {
        self.core.sync.set_vec2(DATA_VELOCITY, self.velocity);
    }

    fn on_create_decoded(&mut self) {
        self.velocity = self.core.sync.get_vec2_or(DATA_VELOCITY, self.velocity);
    }

    fn on_update_applied(&mut self) {
        self.velocity = self.core.sync.get_vec2_or(DATA_VELOCITY, self.velocity);
    }

    fn update(&mut self, dt: f32) {
        self.core.position.x += self.velocity.x * dt;
        self.core.position.y += self.velocity.y * dt;
    }

    fn should_remove(&self, world: &WorldBounds) -> bool {
        !world.contains(self.core.position)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn test_ship_create_roundtrip() {
        let ids = IdAllocator::new();
        let mut ship = Ship::new(&ids, "P1", 80);
        ship.core_mut().position = Vec2::new(10.0, 20.0);
        ship.velocity = Vec2::new(5.0, -5.0);
        ship.health_mut().take_damage(30);

        let original_key = ship.key();
        let blob = ship.encode_create(); // clears the sync map

        let mut decoded = Ship::from_wire();
        decoded.decode_create(&blob).unwrap();

        assert_eq!(decoded.key(), original_key);
        assert_eq!(decoded.core(), ship.core());
        assert_eq!(decoded.core().position, Vec2::new(10.0, 20.0));
        assert_eq!(decoded.health().current(), 50);
        assert_eq!(decoded.health().max(), 80);
        assert_eq!(decoded.velocity, Vec2::new(5.0, -5.0));
    }

    #[test]
    fn test_ship_update_applies_health_and_velocity() {
        let ids = IdAllocator::new();
        let mut server_ship = Ship::new(&ids, "P1", 100);
        server_ship.velocity = Vec2::new(3.0, 0.0);
        server_ship.health_mut().take_damage(25);

        let mut client_ship = Ship::from_wire();
        client_ship.decode_create(&Ship::new(&ids, "P1", 100).encode_create()).unwrap();
        client_ship
            .core_mut()
            .force_id(server_ship.core().id());

        let update = server_ship.encode_update();
        client_ship.apply_update(&update).unwrap();

        assert_eq!(client_ship.health().current(), 75);
        assert_eq!(client_ship.velocity, Vec2::new(3.0, 0.0));
        assert_eq!(client_ship.core().position, server_ship.core().position);
    }

    #[test]
    fn test_ship_update_is_idempotent() {
        let ids = IdAllocator::new();
        let mut ship = Ship::new(&ids, "P1", 100);
        ship.velocity = Vec2::new(1.0, 2.0);
        ship.health_mut().take_damage(10);

        let update = ship.encode_update();
        ship.apply_update(&update).unwrap();
        let (pos, health, vel) = (ship.core().position, ship.health().current(), ship.velocity);
        ship.apply_update(&update).unwrap();

        assert_eq!(ship.core().position, pos);
        assert_eq!(ship.health().current(), health);
        assert_eq!(ship.velocity, vel);
    }

    #[test]
    fn test_dead_ship_wants_removal() {
        let ids = IdAllocator::new();
        let mut ship = Ship::new(&ids, "P1", 10);
        let world = WorldBounds::new(800.0, 600.0);
        assert!(!ship.should_remove(&world));
        ship.health_mut().die();
        assert!(ship.should_remove(&world));
    }

    #[test]
    fn test_projectile_moves_and_leaves_world() {
        let ids = IdAllocator::new();
        let world = WorldBounds::new(800.0, 600.0);
        let mut shot = Projectile::new(
            &ids,
            "P1",
            Vec2::new(790.0, 300.0),
            Vec2::new(PROJECTILE_SPEED, 0.0),
        );

        assert!(!shot.should_remove(&world));
        shot.update(0.1);
        assert_approx_eq!(shot.core().position.x, 830.0, 0.001);
        assert!(shot.should_remove(&world));
    }

    #[test]
    fn test_projectile_create_roundtrip() {
        let ids = IdAllocator::new();
        let mut shot = Projectile::new(&ids, "P2", Vec2::new(5.0, 5.0), Vec2::new(0.0, -20.0));
        let blob = shot.encode_create();

        let mut decoded = Projectile::from_wire();
        decoded.decode_create(&blob).unwrap();

        assert_eq!(decoded.core(), shot.core());
        assert_eq!(decoded.velocity, Vec2::new(0.0, -20.0));
        assert_eq!(decoded.core().position, Vec2::new(5.0, 5.0));
    }
}
