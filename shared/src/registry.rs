//! The authoritative set of live entities, indexed by key and by owner,
//! with add/remove notification and per-tick extension hooks.
//!
//! The registry owns every live entity behind its composed `id@owner` key
//! and keeps a secondary owner index so that a disconnecting player's
//! entities can be dropped in one call. Listeners observe add/remove
//! synchronously; extensions participate in the per-tick update and render
//! passes without the registry knowing what they do.

use crate::entity::{Replica, WorldBounds};
use log::warn;
use std::collections::HashMap;

/// Exclusion flag: suppress the render pass for a type tag.
pub const EXCLUDE_FROM_RENDER: u8 = 0b001;
/// Exclusion flag: suppress the per-entity update step for a type tag.
pub const EXCLUDE_FROM_UPDATE: u8 = 0b010;

/// Observes entities entering and leaving the registry.
///
/// `on_adding` fires before the entity becomes visible to iteration;
/// `on_removing` fires before the entity is deleted. Both are delivered in
/// registration order, synchronously within the add/remove call. Listeners
/// receive only the entity, so the listener list cannot be mutated while a
/// dispatch is in flight.
pub trait RegistryListener: Send {
    fn on_adding(&mut self, _entity: &mut dyn Replica) {}
    fn on_removing(&mut self, _entity: &mut dyn Replica) {}
}

/// Identifies a registered listener for later removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListenerId(u64);

/// A plugin participating in the registry's update/render cycle.
///
/// All methods default to no-ops so implementations only override the hooks
/// they care about. The two capability switches gate the update-phase and
/// render-phase callbacks independently.
pub trait Extension: Send {
    fn update_enabled(&self) -> bool {
        true
    }

    fn render_enabled(&self) -> bool {
        true
    }

    fn on_install(&mut self, _registry: &mut EntityRegistry) {}
    fn on_remove(&mut self, _registry: &mut EntityRegistry) {}

    fn pre_update(&mut self, _registry: &mut EntityRegistry, _dt: f32) {}
    fn update_entity(&mut self, _entity: &mut dyn Replica, _dt: f32) {}
    fn post_update(&mut self, _registry: &mut EntityRegistry, _dt: f32) {}

    fn pre_render(&mut self, _registry: &mut EntityRegistry, _dt: f32) {}
    fn render_entity(&mut self, _entity: &mut dyn Replica) {}
    fn post_render(&mut self, _registry: &mut EntityRegistry, _dt: f32) {}
}

#[derive(Default)]
pub struct EntityRegistry {
    entities: HashMap<String, Box<dyn Replica>>,
    /// owner id -> keys of every entity that owner controls.
    owner_index: HashMap<String, Vec<String>>,
    listeners: Vec<(ListenerId, Box<dyn RegistryListener>)>,
    next_listener_id: u64,
    extensions: Vec<(String, Box<dyn Extension>)>,
    exclusions: HashMap<String, u8>,
}

impl EntityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an entity. Fails without mutation when an entity with the
    /// same id and owner is already present; an entity sharing only the id
    /// with a different owner is accepted under its own key.
    pub fn add(&mut self, mut entity: Box<dyn Replica>) -> bool {
        let key = entity.key();
        if self.entities.contains_key(&key) {
            return false;
        }

        // Listeners fire before the entity is visible to iteration so they
        // may attach external resources first.
        for (_, listener) in &mut self.listeners {
            listener.on_adding(entity.as_mut());
        }

        let owner = entity.core().owner().to_string();
        self.owner_index.entry(owner).or_default().push(key.clone());
        self.entities.insert(key, entity);
        true
    }

    /// Removes the entity behind `key`. Listeners fire before deletion so
    /// they may release external resources. Returns false when absent.
    pub fn remove(&mut self, key: &str) -> bool {
        match self.entities.get_mut(key) {
            Some(entity) => {
                for (_, listener) in &mut self.listeners {
                    listener.on_removing(entity.as_mut());
                }
            }
            None => return false,
        }

        if let Some(entity) = self.entities.remove(key) {
            let owner = entity.core().owner().to_string();
            self.unmap_owner(&owner, key);
        }
        true
    }

    /// Removes every entity indexed under `owner`. Returns false when the
    /// owner had no entities.
    pub fn remove_all_for_owner(&mut self, owner: &str) -> bool {
        let keys = match self.owner_index.get(owner) {
            Some(keys) => keys.clone(),
            None => return false,
        };
        for key in &keys {
            self.remove(key);
        }
        !keys.is_empty()
    }

    fn unmap_owner(&mut self, owner: &str, key: &str) {
        if let Some(keys) = self.owner_index.get_mut(owner) {
            keys.retain(|k| k != key);
            // The last entity of an owner takes the index entry with it.
            if keys.is_empty() {
                self.owner_index.remove(owner);
            }
        }
    }

    pub fn lookup(&self, key: &str) -> Option<&dyn Replica> {
        self.entities.get(key).map(|e| e.as_ref())
    }

    pub fn lookup_mut(&mut self, key: &str) -> Option<&mut (dyn Replica + 'static)> {
        self.entities.get_mut(key).map(|e| e.as_mut())
    }

    /// Looks up an entity by key and verifies the ownership claim. An
    /// ownership mismatch is treated as not-found unconditionally.
    pub fn lookup_for_owner(&mut self, owner: &str, key: &str) -> Option<&mut (dyn Replica + 'static)> {
        self.entities
            .get_mut(key)
            .filter(|e| e.core().owner() == owner)
            .map(|e| e.as_mut())
    }

    /// A stable snapshot of the live keys, for iteration that may remove.
    pub fn keys(&self) -> Vec<String> {
        self.entities.keys().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn Replica> {
        self.entities.values().map(|e| e.as_ref())
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn owner_keys(&self, owner: &str) -> Vec<String> {
        self.owner_index.get(owner).cloned().unwrap_or_default()
    }

    pub fn add_listener(&mut self, listener: Box<dyn RegistryListener>) -> ListenerId {
        let id = ListenerId(self.next_listener_id);
        self.next_listener_id += 1;
        self.listeners.push((id, listener));
        id
    }

    pub fn remove_listener(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(lid, _)| *lid != id);
        self.listeners.len() != before
    }

    /// Installs an extension under a name, firing its install hook.
    pub fn install_extension(&mut self, name: &str, mut extension: Box<dyn Extension>) {
        extension.on_install(self);
        self.extensions.push((name.to_string(), extension));
    }

    /// Uninstalls the extension behind `name`, firing its remove hook.
    pub fn remove_extension(&mut self, name: &str) -> bool {
        let index = match self.extensions.iter().position(|(n, _)| n == name) {
            Some(index) => index,
            None => return false,
        };
        let (_, mut extension) = self.extensions.remove(index);
        extension.on_remove(self);
        true
    }

    pub fn has_extension(&self, name: &str) -> bool {
        self.extensions.iter().any(|(n, _)| n == name)
    }

    /// Sets the exclusion flags for a type tag. This is a full overwrite of
    /// any previous flags, not an additive merge.
    pub fn exclude_type(&mut self, tag: &str, flags: u8) {
        self.exclusions.insert(tag.to_string(), flags);
    }

    pub fn is_excluded(&self, tag: &str, flag: u8) -> bool {
        self.exclusions
            .get(tag)
            .map_or(false, |flags| flags & flag == flag)
    }

    /// Runs one update pass: extension pre-update, then per live entity its
    /// own update logic (unless its type is excluded), every update-enabled
    /// extension's per-entity hook, and the removal predicate; finally the
    /// extension post-update. Removal mid-pass never skips or double-
    /// processes another entity because iteration walks a key snapshot.
    pub fn update(&mut self, dt: f32, world: &WorldBounds) {
        let mut extensions = std::mem::take(&mut self.extensions);

        for (_, extension) in extensions.iter_mut() {
            if extension.update_enabled() {
                extension.pre_update(self, dt);
            }
        }

        for key in self.keys() {
            let skip_own_update = match self.entities.get(&key) {
                Some(entity) => self.is_excluded(entity.type_tag(), EXCLUDE_FROM_UPDATE),
                // Removed by an earlier removal or an extension hook.
                None => continue,
            };

            let wants_removal = match self.entities.get_mut(&key) {
                Some(entity) => {
                    if !skip_own_update {
                        entity.update(dt);
                    }
                    for (_, extension) in extensions.iter_mut() {
                        if extension.update_enabled() {
                            extension.update_entity(entity.as_mut(), dt);
                        }
                    }
                    entity.should_remove(world)
                }
                None => false,
            };

            if wants_removal && !self.remove(&key) {
                warn!("entity {} vanished before its scheduled removal", key);
            }
        }

        for (_, extension) in extensions.iter_mut() {
            if extension.update_enabled() {
                extension.post_update(self, dt);
            }
        }

        // Extensions installed during the pass are appended behind the
        // ones that ran, preserving registration order.
        let installed_mid_pass = std::mem::replace(&mut self.extensions, extensions);
        self.extensions.extend(installed_mid_pass);
    }

    /// Runs one render pass over the extension hook points. No drawing
    /// happens here; render-excluded types are skipped for the per-entity
    /// hook but remain visible to iteration.
    pub fn render(&mut self, dt: f32) {
        let mut extensions = std::mem::take(&mut self.extensions);

        for (_, extension) in extensions.iter_mut() {
            if extension.render_enabled() {
                extension.pre_render(self, dt);
            }
        }

        for key in self.keys() {
            let skip = match self.entities.get(&key) {
                Some(entity) => self.is_excluded(entity.type_tag(), EXCLUDE_FROM_RENDER),
                None => continue,
            };
            if skip {
                continue;
            }
            if let Some(entity) = self.entities.get_mut(&key) {
                for (_, extension) in extensions.iter_mut() {
                    if extension.render_enabled() {
                        extension.render_entity(entity.as_mut());
                    }
                }
            }
        }

        for (_, extension) in extensions.iter_mut() {
            if extension.render_enabled() {
                extension.post_render(self, dt);
            }
        }

        let installed_mid_pass = std::mem::replace(&mut self.extensions, extensions);
        self.extensions.extend(installed_mid_pass);
    }
}
