//! Pluggable game rules on top of the replication core.
//!
//! `ServerCore` is rules-agnostic; everything that interprets gameplay
//! messages lives behind [`GameLogic`]. `ArenaLogic` is the shipped rule
//! set: factory-driven spawning, ship steering, firing, and owner cleanup.

use log::warn;
use rand::Rng;
use shared::units::{Projectile, Ship, PROJECTILE_SPEED, SHIP_SIZE, SHIP_SPEED};
use shared::value::{SyncMap, Vec2};
use shared::{EntityFactory, EntityRegistry, IdAllocator, Message, Player, Replica};
use shared::messages::{CMD_DOWN, CMD_FIRE, CMD_LEFT, CMD_RIGHT, CMD_UP};

/// Game rules invoked by the core at fixed points. All hooks default to
/// no-ops so partial rule sets stay small.
pub trait GameLogic: Send {
    /// Runs before the registry's own update pass each tick.
    fn update(&mut self, _registry: &mut EntityRegistry, _ids: &IdAllocator, _dt: f32) {}

    /// Handles a gameplay message. `player` is the sender's logged-in
    /// identity, absent when the session never logged in.
    fn on_message(
        &mut self,
        _registry: &mut EntityRegistry,
        _ids: &IdAllocator,
        _player: Option<&Player>,
        _message: Message,
    ) {
    }

    /// Runs after a logged-in player's connection went away.
    fn on_player_dropped(&mut self, _registry: &mut EntityRegistry, _player: &Player) {}
}

/// Rule set with no rules, for tests and bring-up.
pub struct NullLogic;

impl GameLogic for NullLogic {}

/// The shipped arena rules.
pub struct ArenaLogic {
    factory: EntityFactory,
}

impl ArenaLogic {
    pub fn new() -> Self {
        Self {
            factory: EntityFactory::standard(),
        }
    }

    /// Decodes a spawn payload through the factory and registers it. A
    /// payload still sitting at the origin gets a random spawn point so
    /// players do not stack on top of each other.
    fn spawn(&self, registry: &mut EntityRegistry, tag: &str, blob: &SyncMap) {
        let mut entity = match self.factory.decode(tag, blob) {
            Ok(entity) => entity,
            Err(err) => {
                warn!("dropping spawn request: {}", err);
                return;
            }
        };
        if entity.core().position == Vec2::default() {
            let mut rng = rand::thread_rng();
            entity.core_mut().position = Vec2::new(
                rng.gen_range(SHIP_SIZE..shared::WORLD_WIDTH - SHIP_SIZE),
                rng.gen_range(SHIP_SIZE..shared::WORLD_HEIGHT - SHIP_SIZE),
            );
        }
        let key = entity.key();
        if !registry.add(entity) {
            warn!("spawn request for already-registered entity {}", key);
        }
    }

    /// Applies a steering or fire command to the sender's own ship. The
    /// lookup is owner-checked, so a command naming someone else's entity
    /// silently does nothing.
    fn control(
        &self,
        registry: &mut EntityRegistry,
        ids: &IdAllocator,
        owner_id: &str,
        entity_id: &str,
        command: &str,
        pressed: bool,
    ) {
        let key = format!("{}@{}", entity_id, owner_id);
        let ship = match registry
            .lookup_for_owner(owner_id, &key)
            .and_then(|e| e.as_any_mut().downcast_mut::<Ship>())
        {
            Some(ship) => ship,
            None => return,
        };

        let mut fired = None;
        match command {
            CMD_LEFT => ship.velocity.x = if pressed { -SHIP_SPEED } else { 0.0 },
            CMD_RIGHT => ship.velocity.x = if pressed { SHIP_SPEED } else { 0.0 },
            CMD_UP => ship.velocity.y = if pressed { -SHIP_SPEED } else { 0.0 },
            CMD_DOWN => ship.velocity.y = if pressed { SHIP_SPEED } else { 0.0 },
            CMD_FIRE if pressed => {
                let muzzle = ship.core().position;
                fired = Some(Projectile::new(
                    ids,
                    owner_id,
                    muzzle,
                    Vec2::new(0.0, -PROJECTILE_SPEED),
                ));
            }
            CMD_FIRE => {}
            other => warn!("unknown control command {:?}", other),
        }

        // The ship borrow has ended here; the projectile can be registered.
        if let Some(shot) = fired {
            registry.add(Box::new(shot));
        }
    }
}

impl Default for ArenaLogic {
    fn default() -> Self {
        Self::new()
    }
}

impl GameLogic for ArenaLogic {
    fn on_message(
        &mut self,
        registry: &mut EntityRegistry,
        ids: &IdAllocator,
        player: Option<&Player>,
        message: Message,
    ) {
        match message {
            Message::SpawnPlayer { tag, blob, .. }
            | Message::SpawnEntity { tag, blob, .. }
            | Message::SpawnLiveEntity { tag, blob, .. } => {
                self.spawn(registry, &tag, &blob);
            }
            Message::ControlShip {
                owner_id,
                entity_id,
                command,
                pressed,
            } => {
                // Only the logged-in owner may steer its entities.
                if player.map_or(true, |p| p.player_id() != owner_id) {
                    warn!("control command from non-owner session ignored");
                    return;
                }
                self.control(registry, ids, &owner_id, &entity_id, &command, pressed);
            }
            _ => {}
        }
    }

    fn on_player_dropped(&mut self, registry: &mut EntityRegistry, player: &Player) {
        registry.remove_all_for_owner(player.player_id());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::units::SHIP_TAG;

    fn spawn_ship(logic: &mut ArenaLogic, registry: &mut EntityRegistry, ids: &IdAllocator, owner: &str) -> String {
        let mut ship = Ship::new(ids, owner, 100);
        ship.core_mut().position = Vec2::new(100.0, 100.0);
        let blob = ship.encode_create();
        let id = blob.get_str("id");
        logic.on_message(
            registry,
            ids,
            Some(&Player::with_id(owner, owner)),
            Message::SpawnPlayer {
                tag: SHIP_TAG.to_string(),
                blob,
                player: Player::with_id(owner, owner),
            },
        );
        id
    }

    #[test]
    fn test_spawn_player_registers_ship() {
        let mut logic = ArenaLogic::new();
        let mut registry = EntityRegistry::new();
        let ids = IdAllocator::new();

        let id = spawn_ship(&mut logic, &mut registry, &ids, "P1");
        assert_eq!(registry.len(), 1);
        let key = format!("{}@P1", id);
        assert_eq!(
            registry.lookup(&key).unwrap().core().position,
            Vec2::new(100.0, 100.0)
        );
    }

    #[test]
    fn test_spawn_at_origin_is_scattered() {
        let mut logic = ArenaLogic::new();
        let mut registry = EntityRegistry::new();
        let ids = IdAllocator::new();

        let mut ship = Ship::new(&ids, "P1", 100);
        let blob = ship.encode_create();
        let key = format!("{}@P1", blob.get_str("id"));
        logic.on_message(
            &mut registry,
            &ids,
            None,
            Message::SpawnEntity {
                tag: SHIP_TAG.to_string(),
                blob,
                owner: "P1".to_string(),
            },
        );

        let pos = registry.lookup(&key).unwrap().core().position;
        assert_ne!(pos, Vec2::default());
        assert!(pos.x >= SHIP_SIZE && pos.x <= shared::WORLD_WIDTH - SHIP_SIZE);
        assert!(pos.y >= SHIP_SIZE && pos.y <= shared::WORLD_HEIGHT - SHIP_SIZE);
    }

    #[test]
    fn test_unknown_spawn_tag_is_dropped() {
        let mut logic = ArenaLogic::new();
        let mut registry = EntityRegistry::new();
        let ids = IdAllocator::new();

        logic.on_message(
            &mut registry,
            &ids,
            None,
            Message::SpawnEntity {
                tag: "asteroid".to_string(),
                blob: SyncMap::new(),
                owner: "P1".to_string(),
            },
        );
        assert!(registry.is_empty());
    }

    #[test]
    fn test_control_steers_own_ship() {
        let mut logic = ArenaLogic::new();
        let mut registry = EntityRegistry::new();
        let ids = IdAllocator::new();
        let id = spawn_ship(&mut logic, &mut registry, &ids, "P1");
        let key = format!("{}@P1", id);

        let press = |pressed| Message::ControlShip {
            owner_id: "P1".to_string(),
            entity_id: id.clone(),
            command: CMD_LEFT.to_string(),
            pressed,
        };
        let player = Player::with_id("P1", "P1");

        logic.on_message(&mut registry, &ids, Some(&player), press(true));
        {
            let ship = registry
                .lookup_mut(&key)
                .unwrap()
                .as_any_mut()
                .downcast_mut::<Ship>()
                .unwrap();
            assert_eq!(ship.velocity.x, -SHIP_SPEED);
        }

        logic.on_message(&mut registry, &ids, Some(&player), press(false));
        {
            let ship = registry
                .lookup_mut(&key)
                .unwrap()
                .as_any_mut()
                .downcast_mut::<Ship>()
                .unwrap();
            assert_eq!(ship.velocity.x, 0.0);
        }
    }

    #[test]
    fn test_control_from_wrong_owner_is_ignored() {
        let mut logic = ArenaLogic::new();
        let mut registry = EntityRegistry::new();
        let ids = IdAllocator::new();
        let id = spawn_ship(&mut logic, &mut registry, &ids, "P1");
        let key = format!("{}@P1", id);

        // P2 claims P1's ship; the session identity matches the claim but
        // the ownership lookup fails.
        logic.on_message(
            &mut registry,
            &ids,
            Some(&Player::with_id("P2", "P2")),
            Message::ControlShip {
                owner_id: "P2".to_string(),
                entity_id: id,
                command: CMD_RIGHT.to_string(),
                pressed: true,
            },
        );
        let ship = registry
            .lookup_mut(&key)
            .unwrap()
            .as_any_mut()
            .downcast_mut::<Ship>()
            .unwrap();
        assert_eq!(ship.velocity, Vec2::default());
    }

    #[test]
    fn test_fire_spawns_projectile_at_ship() {
        let mut logic = ArenaLogic::new();
        let mut registry = EntityRegistry::new();
        let ids = IdAllocator::new();
        let id = spawn_ship(&mut logic, &mut registry, &ids, "P1");

        logic.on_message(
            &mut registry,
            &ids,
            Some(&Player::with_id("P1", "P1")),
            Message::ControlShip {
                owner_id: "P1".to_string(),
                entity_id: id,
                command: CMD_FIRE.to_string(),
                pressed: true,
            },
        );

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.owner_keys("P1").len(), 2);
    }

    #[test]
    fn test_player_drop_clears_owned_entities() {
        let mut logic = ArenaLogic::new();
        let mut registry = EntityRegistry::new();
        let ids = IdAllocator::new();
        spawn_ship(&mut logic, &mut registry, &ids, "P1");
        spawn_ship(&mut logic, &mut registry, &ids, "P2");

        logic.on_player_dropped(&mut registry, &Player::with_id("P1", "P1"));
        assert_eq!(registry.len(), 1);
        assert!(registry.owner_keys("P1").is_empty());
    }
}
