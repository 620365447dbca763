//! Shared replication model used by both the server and the client.
//!
//! This crate holds everything both endpoints agree on:
//! - the entity model and the four-phase replication contract ([`entity`])
//! - the authoritative entity registry with owner indexing ([`registry`])
//! - the extension hook mechanism for external subsystems ([`registry`])
//! - the generic sync-value map carried by every entity ([`value`])
//! - the identity allocator ([`id`])
//! - the tag-keyed decode factory ([`factory`])
//! - the wire message set and frame codec ([`messages`], [`codec`])
//!
//! The server owns the authoritative registry and pushes create/update/remove
//! diffs each tick; the client applies them to reconstruct a consistent local
//! view. Neither side performs any I/O in this crate.

pub mod codec;
pub mod entity;
pub mod error;
pub mod factory;
pub mod id;
pub mod messages;
pub mod registry;
pub mod units;
pub mod value;

pub use entity::{BodyHandle, EntityCore, Health, Replica, WorldBounds};
pub use error::SyncError;
pub use factory::EntityFactory;
pub use id::IdAllocator;
pub use messages::{Message, Player, PORT_LOSSY, PORT_RELIABLE};
pub use registry::{
    EntityRegistry, Extension, RegistryListener, EXCLUDE_FROM_RENDER, EXCLUDE_FROM_UPDATE,
};
pub use value::{Bounds, SyncMap, SyncValue, Vec2};

/// Default world extents used by boundary removal predicates.
pub const WORLD_WIDTH: f32 = 800.0;
pub const WORLD_HEIGHT: f32 = 600.0;

/// Default fixed tick period of the server loop, in milliseconds.
pub const TICK_MILLIS: u64 = 15;

/// How many times a client retries the initial connection.
pub const CONNECT_RETRIES: u32 = 4;

/// How long each connect attempt may take, in milliseconds.
pub const CONNECT_TIMEOUT_MILLIS: u64 = 5000;
