//! The wire message set exchanged between server and client.
//!
//! Everything travels over the reliable-ordered channel except `Snapshot`,
//! which rides the best-effort channel and may be lost or reordered.

use crate::value::SyncMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

/// Default port of the reliable-ordered channel.
pub const PORT_RELIABLE: u16 = 27012;
/// Default port of the best-effort channel.
pub const PORT_LOSSY: u16 = 27013;

/// Control commands carried by [`Message::ControlShip`].
pub const CMD_LEFT: &str = "left";
pub const CMD_RIGHT: &str = "right";
pub const CMD_UP: &str = "up";
pub const CMD_DOWN: &str = "down";
pub const CMD_FIRE: &str = "fire";

/// The session/player controlling entities. Names may repeat; the player id
/// is unique and is what entities reference as their owner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Player {
    name: String,
    player_id: String,
    score: i32,
}

impl Player {
    /// Creates a player with a freshly generated unique id.
    pub fn new(name: &str) -> Self {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis();
        Self {
            name: name.to_string(),
            player_id: format!("player_{}x{}", name, millis),
            score: 0,
        }
    }

    /// Creates a player with a caller-chosen id, for deterministic tests.
    pub fn with_id(name: &str, player_id: &str) -> Self {
        Self {
            name: name.to_string(),
            player_id: player_id.to_string(),
            score: 0,
        }
    }

    /// The visible name. Use [`Player::player_id`] as the entity owner, not
    /// this.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The unique player id; this is the owner id for entities.
    pub fn player_id(&self) -> &str {
        &self.player_id
    }

    pub fn score(&self) -> i32 {
        self.score
    }

    pub fn add_score(&mut self, amount: i32) {
        self.score += amount;
    }

    pub fn set_score(&mut self, score: i32) {
        self.score = score;
    }
}

impl PartialEq for Player {
    /// Players are equal by id only.
    fn eq(&self, other: &Self) -> bool {
        self.player_id == other.player_id
    }
}

/// Every message on the wire. Creation payloads are `(type_tag, blob)` pairs
/// so the receiving side can instantiate through the factory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Message {
    // Client to server
    Login {
        player: Player,
    },
    SpawnPlayer {
        tag: String,
        blob: SyncMap,
        player: Player,
    },
    SpawnEntity {
        tag: String,
        blob: SyncMap,
        owner: String,
    },
    SpawnLiveEntity {
        tag: String,
        blob: SyncMap,
        owner: String,
    },
    ControlShip {
        owner_id: String,
        entity_id: String,
        command: String,
        pressed: bool,
    },
    /// Sent once over the lossy channel so the server learns where to
    /// address this session's snapshots.
    RegisterUdp {
        player_id: String,
    },

    // Server to client
    AlreadyLoggedIn,
    AvailableId {
        id: String,
    },
    EntitiesOnTheServer {
        entities: Vec<(String, SyncMap)>,
    },
    NewEntities {
        entities: Vec<(String, SyncMap)>,
    },
    RemoveEntities {
        keys: Vec<String>,
    },
    PlayerDropped {
        player: Player,
    },
    /// Best-effort channel: per-tick state deltas keyed by entity key.
    Snapshot {
        timestamp: u64,
        updates: HashMap<String, SyncMap>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{SyncMap, Vec2};

    #[test]
    fn test_player_identity() {
        let a = Player::with_id("zombie", "player_zombie_x1");
        let mut b = Player::with_id("other name", "player_zombie_x1");
        b.add_score(50);
        assert_eq!(a, b, "players are equal by id only");

        let c = Player::with_id("zombie", "player_zombie_x2");
        assert_ne!(a, c);
    }

    #[test]
    fn test_player_score() {
        let mut player = Player::with_id("p", "id");
        player.add_score(10);
        player.add_score(5);
        assert_eq!(player.score(), 15);
        player.set_score(0);
        assert_eq!(player.score(), 0);
    }

    #[test]
    fn test_message_serialization_login() {
        let message = Message::Login {
            player: Player::with_id("zombie", "player_zombie_x1"),
        };
        let bytes = bincode::serialize(&message).unwrap();
        let back: Message = bincode::deserialize(&bytes).unwrap();
        match back {
            Message::Login { player } => assert_eq!(player.player_id(), "player_zombie_x1"),
            _ => panic!("wrong message type after deserialization"),
        }
    }

    #[test]
    fn test_message_serialization_snapshot() {
        let mut blob = SyncMap::new();
        blob.set_str("id", "ENT_1");
        blob.set_vec2("pos", Vec2::new(4.0, 2.0));

        let mut updates = HashMap::new();
        updates.insert("ENT_1@P1".to_string(), blob);

        let message = Message::Snapshot {
            timestamp: 777,
            updates,
        };
        let bytes = bincode::serialize(&message).unwrap();
        let back: Message = bincode::deserialize(&bytes).unwrap();
        match back {
            Message::Snapshot { timestamp, updates } => {
                assert_eq!(timestamp, 777);
                let blob = updates.get("ENT_1@P1").unwrap();
                assert_eq!(blob.get_str("id"), "ENT_1");
                assert_eq!(blob.get_vec2("pos"), Vec2::new(4.0, 2.0));
            }
            _ => panic!("wrong message type after deserialization"),
        }
    }

    #[test]
    fn test_message_serialization_new_entities() {
        let mut blob = SyncMap::new();
        blob.set_str("id", "ENT_9");
        let message = Message::NewEntities {
            entities: vec![("ship".to_string(), blob)],
        };
        let bytes = bincode::serialize(&message).unwrap();
        let back: Message = bincode::deserialize(&bytes).unwrap();
        match back {
            Message::NewEntities { entities } => {
                assert_eq!(entities.len(), 1);
                assert_eq!(entities[0].0, "ship");
                assert_eq!(entities[0].1.get_str("id"), "ENT_9");
            }
            _ => panic!("wrong message type after deserialization"),
        }
    }
}
