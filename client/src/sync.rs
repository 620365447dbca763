//! Client-side reconstruction of the server's entity set.
//!
//! `ClientSync` consumes the inbound message stream and maintains a local
//! registry mirroring the authoritative one. Reliable-channel diffs are
//! applied structurally (create and remove), the lossy snapshots only ever
//! touch entities that already exist locally, and snapshots older than the
//! newest one seen are discarded outright.
//!
//! Creations are deferred: decoded entities wait in a side list and merge
//! into the registry after the next update pass, so a creation arriving
//! mid-frame can never be observed half-initialized by local iteration.

use log::{debug, warn};
use shared::{
    EntityFactory, EntityRegistry, Message, Replica, WorldBounds, WORLD_HEIGHT, WORLD_WIDTH,
};

pub struct ClientSync {
    pub registry: EntityRegistry,
    factory: EntityFactory,
    last_snapshot_time: u64,
    pending_adds: Vec<Box<dyn Replica>>,
    reserved_id: Option<String>,
    rejected: bool,
    world: WorldBounds,
}

impl ClientSync {
    pub fn new(factory: EntityFactory) -> Self {
        Self {
            registry: EntityRegistry::new(),
            factory,
            last_snapshot_time: 0,
            pending_adds: Vec::new(),
            reserved_id: None,
            rejected: false,
            world: WorldBounds::new(WORLD_WIDTH, WORLD_HEIGHT),
        }
    }

    /// The entity id the server reserved for this client, once granted.
    pub fn reserved_id(&self) -> Option<&str> {
        self.reserved_id.as_deref()
    }

    pub fn take_reserved_id(&mut self) -> Option<String> {
        self.reserved_id.take()
    }

    /// True once the server refused the login.
    pub fn is_rejected(&self) -> bool {
        self.rejected
    }

    pub fn last_snapshot_time(&self) -> u64 {
        self.last_snapshot_time
    }

    /// Number of creations decoded but not yet merged.
    pub fn pending_count(&self) -> usize {
        self.pending_adds.len()
    }

    /// Applies one server message to the local view.
    pub fn handle_message(&mut self, message: Message) {
        match message {
            Message::EntitiesOnTheServer { entities } | Message::NewEntities { entities } => {
                for (tag, blob) in &entities {
                    match self.factory.decode(tag, blob) {
                        Ok(entity) => self.pending_adds.push(entity),
                        // One bad payload must not sink the rest of the batch.
                        Err(e) => warn!("skipping creation payload: {}", e),
                    }
                }
            }
            Message::RemoveEntities { keys } => {
                for key in &keys {
                    if !self.registry.remove(key) {
                        debug!("removal of unknown entity {} ignored", key);
                    }
                    // The entity may still be waiting in the merge queue.
                    self.pending_adds.retain(|e| e.key() != *key);
                }
            }
            Message::Snapshot { timestamp, updates } => {
                if timestamp <= self.last_snapshot_time {
                    debug!(
                        "discarding stale snapshot {} (newest seen {})",
                        timestamp, self.last_snapshot_time
                    );
                    return;
                }
                self.last_snapshot_time = timestamp;
                for (key, blob) in &updates {
                    match self.registry.lookup_mut(key) {
                        Some(entity) => {
                            if let Err(e) = entity.apply_update(blob) {
                                warn!("update for {} rejected: {}", key, e);
                            }
                        }
                        // Its creation diff has not arrived (or merged) yet.
                        None => debug!("snapshot names unknown entity {}", key),
                    }
                }
            }
            Message::AvailableId { id } => {
                self.reserved_id = Some(id);
            }
            Message::PlayerDropped { player } => {
                self.registry.remove_all_for_owner(player.player_id());
                let owner = player.player_id().to_string();
                self.pending_adds.retain(|e| e.core().owner() != owner);
            }
            Message::AlreadyLoggedIn => {
                warn!("server refused the login: already logged in");
                self.rejected = true;
            }
            other => debug!("ignoring unexpected message: {:?}", other),
        }
    }

    /// Advances local simulation one frame, then merges deferred creations.
    pub fn tick(&mut self, dt: f32) {
        self.registry.update(dt, &self.world);

        for entity in self.pending_adds.drain(..) {
            let key = entity.key();
            if !self.registry.add(entity) {
                debug!("deferred creation of {} was already present", key);
            }
        }
    }
}
