//! # Replication Client Library
//!
//! The consuming endpoint of the state replication layer. The client holds
//! a local registry that mirrors the server's authoritative one and never
//! mutates replicated state on its own authority.
//!
//! ## Core Responsibilities
//!
//! ### Local View Reconstruction
//! Reliable-channel diffs (creations, removals, the login catch-up) change
//! the structure of the local registry; lossy snapshots refresh the state
//! of entities that already exist in it. Stale snapshots are detected by
//! timestamp and dropped, so a reordered datagram can never roll an entity
//! backwards.
//!
//! ### Deferred Creation
//! Entities decoded from a creation diff are parked until the end of the
//! current frame and merged after the update pass, keeping iteration over
//! the registry stable within a frame.
//!
//! ### Connection Lifecycle
//! Connecting retries with a fixed budget and per-attempt timeout, logs
//! the player in, and registers the snapshot address. A refused login is
//! surfaced through [`sync::ClientSync::is_rejected`].
//!
//! ## Module Organization
//!
//! - [`sync`]: the socket-free message application and frame logic
//! - [`network`]: sockets, receive tasks, and the send path

pub mod network;
pub mod sync;

pub use crate::network::GameClient;
pub use crate::sync::ClientSync;
