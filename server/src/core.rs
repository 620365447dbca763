//! Authoritative session and tick handling, independent of any socket.
//!
//! `ServerCore` owns the entity registry and the logged-in player table and
//! turns inbound messages and tick pulses into a list of [`Outbound`]
//! instructions. The network layer decides how to deliver them; nothing in
//! here touches a socket, which keeps the whole state machine testable on a
//! single thread.
//!
//! Per-tick replication rides on the registry's own hooks: a listener
//! records create/remove diffs as entities enter and leave, and an extension
//! captures an update blob for every live entity during the update pass.
//! The tick drains those accumulators into `NewEntities`/`RemoveEntities`
//! frames for the reliable channel and a `Snapshot` for the lossy one.

use crate::logic::GameLogic;
use log::{info, warn};
use shared::registry::{Extension, RegistryListener};
use shared::value::SyncMap;
use shared::{EntityRegistry, IdAllocator, Message, Player, Replica, WorldBounds};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Identifies one reliable-channel connection for the lifetime of the
/// process. Assigned by the network layer, opaque to the core.
pub type SessionId = u64;

/// A delivery instruction produced by the core for the network layer.
#[derive(Debug, Clone)]
pub enum Outbound {
    /// Send to one session over the reliable channel.
    Reliable {
        session: SessionId,
        message: Message,
    },
    /// Send to every logged-in session over the reliable channel.
    BroadcastReliable(Message),
    /// Send to every registered snapshot address over the lossy channel.
    BroadcastLossy(Message),
    /// Drop the session's connection.
    Close(SessionId),
}

/// Diffs gathered between two tick drains.
#[derive(Default)]
pub struct DiffAccumulators {
    /// Entities added since the last drain, as `(type_tag, creation blob)`.
    pub created: Vec<(String, SyncMap)>,
    /// Keys of entities removed since the last drain.
    pub removed: Vec<String>,
    /// Latest update blob per live entity key.
    pub updates: HashMap<String, SyncMap>,
}

impl DiffAccumulators {
    fn is_empty(&self) -> bool {
        self.created.is_empty() && self.removed.is_empty() && self.updates.is_empty()
    }
}

/// Registry listener feeding the create/remove accumulators.
struct DiffListener {
    accumulators: Arc<Mutex<DiffAccumulators>>,
}

impl RegistryListener for DiffListener {
    fn on_adding(&mut self, entity: &mut dyn Replica) {
        let blob = entity.encode_create();
        let mut acc = self.accumulators.lock().unwrap();
        acc.created.push((entity.type_tag().to_string(), blob));
    }

    fn on_removing(&mut self, entity: &mut dyn Replica) {
        let key = entity.key();
        let mut acc = self.accumulators.lock().unwrap();
        // An update for an entity that is going away would only confuse the
        // receiving side.
        acc.updates.remove(&key);
        acc.removed.push(key);
    }
}

/// Registry extension capturing one update blob per entity per tick.
struct ReplicationExtension {
    accumulators: Arc<Mutex<DiffAccumulators>>,
}

impl Extension for ReplicationExtension {
    fn render_enabled(&self) -> bool {
        false
    }

    fn update_entity(&mut self, entity: &mut dyn Replica, _dt: f32) {
        let key = entity.key();
        let blob = entity.encode_update();
        self.accumulators.lock().unwrap().updates.insert(key, blob);
    }
}

/// The authoritative simulation and session state machine.
pub struct ServerCore {
    pub registry: EntityRegistry,
    pub ids: IdAllocator,
    accumulators: Arc<Mutex<DiffAccumulators>>,
    players: HashMap<SessionId, Player>,
    logic: Box<dyn GameLogic>,
    world: WorldBounds,
    running: bool,
}

impl ServerCore {
    pub fn new(logic: Box<dyn GameLogic>) -> Self {
        let mut registry = EntityRegistry::new();
        let accumulators = Arc::new(Mutex::new(DiffAccumulators::default()));

        registry.add_listener(Box::new(DiffListener {
            accumulators: Arc::clone(&accumulators),
        }));
        registry.install_extension(
            "replication",
            Box::new(ReplicationExtension {
                accumulators: Arc::clone(&accumulators),
            }),
        );

        Self {
            registry,
            ids: IdAllocator::new(),
            accumulators,
            players: HashMap::new(),
            logic,
            world: WorldBounds::new(shared::WORLD_WIDTH, shared::WORLD_HEIGHT),
            running: false,
        }
    }

    /// Switches the simulation on. Messages and ticks are ignored while
    /// stopped.
    pub fn start(&mut self) {
        self.running = true;
        info!("server core started");
    }

    pub fn stop(&mut self) {
        self.running = false;
        info!("server core stopped");
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn player_for_session(&self, session: SessionId) -> Option<&Player> {
        self.players.get(&session)
    }

    /// Handles one inbound message from a session and returns the delivery
    /// instructions it produced.
    pub fn handle_message(&mut self, session: SessionId, message: Message) -> Vec<Outbound> {
        if !self.running {
            return Vec::new();
        }
        match message {
            Message::Login { player } => self.handle_login(session, player),
            other => {
                let player = self.players.get(&session).cloned();
                self.logic
                    .on_message(&mut self.registry, &self.ids, player.as_ref(), other);
                Vec::new()
            }
        }
    }

    /// Admits a session. A session that is already logged in, or a player
    /// id that is already in use by another session, gets `AlreadyLoggedIn`
    /// and is disconnected. An admitted session receives the full current
    /// entity set followed by a reserved entity id it may spawn under.
    fn handle_login(&mut self, session: SessionId, player: Player) -> Vec<Outbound> {
        let duplicate = self.players.contains_key(&session)
            || self.players.values().any(|existing| *existing == player);
        if duplicate {
            warn!(
                "rejecting duplicate login for player {}",
                player.player_id()
            );
            return vec![
                Outbound::Reliable {
                    session,
                    message: Message::AlreadyLoggedIn,
                },
                Outbound::Close(session),
            ];
        }

        info!(
            "player {} ({}) logged in on session {}",
            player.name(),
            player.player_id(),
            session
        );
        self.players.insert(session, player);

        // Catch-up: encode every live entity as a fresh creation payload.
        let mut entities = Vec::new();
        for key in self.registry.keys() {
            if let Some(entity) = self.registry.lookup_mut(&key) {
                entities.push((entity.type_tag().to_string(), entity.encode_create()));
            }
        }
        // Catch-up payloads are intentionally kept out of the per-tick
        // accumulators: the listener never saw these encodes, so nothing to
        // undo here.

        vec![
            Outbound::Reliable {
                session,
                message: Message::EntitiesOnTheServer { entities },
            },
            Outbound::Reliable {
                session,
                message: Message::AvailableId {
                    id: self.ids.new_id(),
                },
            },
        ]
    }

    /// Handles a session's connection going away, logged in or not.
    pub fn handle_disconnect(&mut self, session: SessionId) -> Vec<Outbound> {
        let player = match self.players.remove(&session) {
            Some(player) => player,
            None => return Vec::new(),
        };
        info!(
            "player {} dropped from session {}",
            player.player_id(),
            session
        );
        self.logic.on_player_dropped(&mut self.registry, &player);
        vec![Outbound::BroadcastReliable(Message::PlayerDropped {
            player,
        })]
    }

    /// Advances the simulation one tick and drains the gathered diffs into
    /// delivery instructions. `now_ms` stamps the snapshot so clients can
    /// reject stale, reordered datagrams.
    pub fn tick(&mut self, dt: f32, now_ms: u64) -> Vec<Outbound> {
        if !self.running {
            return Vec::new();
        }

        self.logic.update(&mut self.registry, &self.ids, dt);
        self.registry.update(dt, &self.world);

        let diffs = {
            let mut acc = self.accumulators.lock().unwrap();
            std::mem::take(&mut *acc)
        };
        if diffs.is_empty() {
            return Vec::new();
        }

        let mut out = Vec::new();
        if !diffs.updates.is_empty() {
            out.push(Outbound::BroadcastLossy(Message::Snapshot {
                timestamp: now_ms,
                updates: diffs.updates,
            }));
        }
        if !diffs.created.is_empty() {
            out.push(Outbound::BroadcastReliable(Message::NewEntities {
                entities: diffs.created,
            }));
        }
        if !diffs.removed.is_empty() {
            out.push(Outbound::BroadcastReliable(Message::RemoveEntities {
                keys: diffs.removed,
            }));
        }
        out
    }
}
