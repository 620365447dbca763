//! The replicable-object abstraction and its four-phase wire contract.
//!
//! An entity is an identifiable, owned object: a unique id, an owner id, a
//! sprite key, spatial bounds, an optional physics-body handle and a generic
//! [`SyncMap`] for application-defined replicated fields. Entity variants are
//! selected with a type tag and implement the [`Replica`] trait instead of a
//! class hierarchy; shared field handling lives on [`EntityCore`].
//!
//! The four phases per entity type are:
//! - `prepare_create` / `encode_create` — one-time creation blob; the sync
//!   map is cleared after encoding so creation fields are sent exactly once.
//! - `decode_create` — force-assigns the id from the blob (the one sanctioned
//!   exception to id immutability), restores the rest, then runs the
//!   post-decode hook.
//! - `prepare_update` / `encode_update` — per-tick update blob; the sync map
//!   is snapshotted, not cleared.
//! - `apply_update` — overwrites sync map and mutable fields only when the
//!   blob id matches; the post-apply hook runs even on an id mismatch.

use crate::error::SyncError;
use crate::id::IdAllocator;
use crate::value::{Bounds, SyncMap, Vec2};
use std::any::Any;

/// Well-known blob field names.
pub const BLOB_ID: &str = "id";
pub const BLOB_OWNER: &str = "owner";
pub const BLOB_SPRITE: &str = "sprite";
pub const BLOB_SIZE: &str = "size";
pub const BLOB_POS: &str = "pos";
pub const BLOB_DATA: &str = "data";

/// Opaque handle to an externally managed physics body. The replication core
/// only needs to know whether an entity has one; stepping and collision live
/// outside this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BodyHandle(pub u64);

/// World extents handed to removal predicates.
#[derive(Debug, Clone, Copy)]
pub struct WorldBounds {
    pub width: f32,
    pub height: f32,
}

impl WorldBounds {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    pub fn contains(&self, pos: Vec2) -> bool {
        pos.x >= 0.0 && pos.x <= self.width && pos.y >= 0.0 && pos.y <= self.height
    }
}

/// The fields every entity variant shares, plus the blob plumbing for them.
#[derive(Debug, Clone, Default)]
pub struct EntityCore {
    id: String,
    owner: String,
    pub sprite_key: String,
    pub size: Vec2,
    pub position: Vec2,
    body: Option<BodyHandle>,
    pub sync: SyncMap,
}

impl EntityCore {
    pub fn new(ids: &IdAllocator, owner: &str, sprite_key: &str, size: Vec2) -> Self {
        Self {
            id: ids.new_id(),
            owner: owner.to_string(),
            sprite_key: sprite_key.to_string(),
            size,
            position: Vec2::default(),
            body: None,
            sync: SyncMap::new(),
        }
    }

    /// An empty core for factory construction; `decode_create` fills it in.
    pub fn from_wire() -> Self {
        Self::default()
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// The network-facing identity token. Id and owner are composed so that
    /// same-id entities owned by different parties stay distinguishable.
    pub fn key(&self) -> String {
        format!("{}@{}", self.id, self.owner)
    }

    /// Overrides the locally generated id. Only the server-assigned identity
    /// path (decode of a creation message, or an `AvailableId` reservation)
    /// should call this.
    pub fn force_id(&mut self, id: &str) {
        self.id = id.to_string();
    }

    pub fn set_owner(&mut self, owner: &str) {
        self.owner = owner.to_string();
    }

    pub fn bounds(&self) -> Bounds {
        Bounds::new(self.position.x, self.position.y, self.size.x, self.size.y)
    }

    /// Attaches a physics body handle. A handle already present is kept.
    pub fn set_body(&mut self, handle: BodyHandle) {
        if self.body.is_none() {
            self.body = Some(handle);
        }
    }

    pub fn clear_body(&mut self) {
        self.body = None;
    }

    pub fn body(&self) -> Option<BodyHandle> {
        self.body
    }

    pub fn has_body(&self) -> bool {
        self.body.is_some()
    }

    /// Emits the shared creation fields and clears the sync map afterwards.
    pub fn encode_create_blob(&mut self) -> SyncMap {
        let mut blob = SyncMap::new();
        blob.set_str(BLOB_ID, &self.id);
        blob.set_str(BLOB_OWNER, &self.owner);
        blob.set_str(BLOB_SPRITE, &self.sprite_key);
        blob.set_vec2(BLOB_SIZE, self.size);
        blob.set_vec2(BLOB_POS, self.position);
        blob.set_map(BLOB_DATA, self.sync.clone());
        self.sync.clear();
        blob
    }

    /// Restores the shared creation fields, force-assigning the id.
    pub fn decode_create_blob(&mut self, blob: &SyncMap) -> Result<(), SyncError> {
        if !blob.contains(BLOB_ID) {
            return Err(SyncError::MissingField(BLOB_ID));
        }
        self.id = blob.get_str(BLOB_ID);
        self.owner = blob.get_str(BLOB_OWNER);
        self.sprite_key = blob.get_str(BLOB_SPRITE);
        self.size = blob.get_vec2(BLOB_SIZE);
        self.position = blob.get_vec2(BLOB_POS);
        self.sync = blob.get_map(BLOB_DATA);
        Ok(())
    }

    /// Emits the shared per-tick update fields. The sync map is snapshotted,
    /// not cleared.
    pub fn encode_update_blob(&self) -> SyncMap {
        let mut blob = SyncMap::new();
        blob.set_str(BLOB_ID, &self.id);
        blob.set_vec2(BLOB_POS, self.position);
        blob.set_map(BLOB_DATA, self.sync.clone());
        blob
    }

    /// Applies an update blob. Returns `Ok(true)` when the blob id matched
    /// and state was overwritten, `Ok(false)` for a silent id mismatch.
    pub fn apply_update_blob(&mut self, blob: &SyncMap) -> Result<bool, SyncError> {
        if !blob.contains(BLOB_ID) {
            return Err(SyncError::MissingField(BLOB_ID));
        }
        if blob.get_str(BLOB_ID) != self.id {
            return Ok(false);
        }
        self.sync = blob.get_map(BLOB_DATA);
        self.position = blob.get_vec2_or(BLOB_POS, self.position);
        Ok(true)
    }
}

impl PartialEq for EntityCore {
    /// Entities are equal iff id and owner match.
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.owner == other.owner
    }
}

/// Optional health capability for live entity variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Health {
    max: i32,
    current: i32,
}

impl Health {
    pub fn new(max: i32) -> Self {
        let max = max.max(1);
        Self { max, current: max }
    }

    pub fn current(&self) -> i32 {
        self.current
    }

    pub fn max(&self) -> i32 {
        self.max
    }

    /// Clamps into `0..=max`.
    pub fn set(&mut self, health: i32) {
        self.current = health.clamp(0, self.max);
    }

    /// Raising or lowering the maximum re-clamps the current value.
    pub fn set_max(&mut self, max: i32) {
        if max > 0 {
            self.max = max;
            if self.current > max {
                self.current = max;
            }
        }
    }

    pub fn take_damage(&mut self, amount: i32) {
        self.set(self.current - amount);
    }

    pub fn die(&mut self) {
        self.current = 0;
    }

    pub fn is_alive(&self) -> bool {
        self.current > 0
    }

    pub fn normalized(&self) -> f32 {
        self.current as f32 / self.max as f32
    }
}

/// The replicable entity contract.
///
/// Variants implement the accessors and override the hooks they need; the
/// default phase methods wire the prepare/encode/decode/apply cycle through
/// [`EntityCore`] so that a plain entity replicates its shared fields with no
/// extra code.
pub trait Replica: Send {
    fn core(&self) -> &EntityCore;
    fn core_mut(&mut self) -> &mut EntityCore;

    /// Stable tag used for factory lookup on the decode side.
    fn type_tag(&self) -> &'static str;

    /// Escape hatch for game logic that needs the concrete type.
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;

    /// The network-facing identity token, `id@owner`.
    fn key(&self) -> String {
        self.core().key()
    }

    /// Populate the sync map with one-time creation fields.
    fn prepare_create(&mut self) {}

    /// Emit the creation blob. The sync map is cleared after encoding.
    fn encode_create(&mut self) -> SyncMap {
        self.prepare_create();
        self.core_mut().encode_create_blob()
    }

    /// Rebuild this entity from a creation blob, force-assigning the id,
    /// then run the post-decode hook.
    fn decode_create(&mut self, blob: &SyncMap) -> Result<(), SyncError> {
        self.core_mut().decode_create_blob(blob)?;
        self.on_create_decoded();
        Ok(())
    }

    /// Populate the sync map with per-tick mutable fields.
    fn prepare_update(&mut self) {}

    /// Emit the per-tick update blob.
    fn encode_update(&mut self) -> SyncMap {
        self.prepare_update();
        self.core().encode_update_blob()
    }

    /// Apply an update blob. A blob without an id is an error and skips the
    /// hook; an id mismatch is a silent no-op but the post-apply hook still
    /// runs so per-field listeners fire either way.
    fn apply_update(&mut self, blob: &SyncMap) -> Result<(), SyncError> {
        self.core_mut().apply_update_blob(blob)?;
        self.on_update_applied();
        Ok(())
    }

    /// Type-specific reconciliation after a creation blob was decoded.
    fn on_create_decoded(&mut self) {}

    /// Type-specific reconciliation after an update blob was processed.
    fn on_update_applied(&mut self) {}

    /// Advance this entity's own logic by `dt` seconds.
    fn update(&mut self, _dt: f32) {}

    /// Removal predicate evaluated once per tick after the entity updated.
    fn should_remove(&self, _world: &WorldBounds) -> bool {
        false
    }
}
