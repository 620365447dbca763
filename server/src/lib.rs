//! # Replication Server Library
//!
//! The authoritative endpoint of the state replication layer. The server
//! owns the definitive entity registry; clients submit spawn and control
//! requests and receive the resulting diffs.
//!
//! ## Core Responsibilities
//!
//! ### Authoritative Registry
//! Every live entity exists here first. Creation, per-tick updates, and
//! removal are decided on the server and replayed to clients as diffs,
//! so a client can never invent or resurrect state on its own.
//!
//! ### Session Management
//! Each reliable-channel connection is a session. Logging in admits the
//! session's player, replays the full current entity set to it, and hands
//! it a reserved entity id. Duplicate logins are refused and disconnected.
//!
//! ### Diff Broadcasting
//! The fixed-rate tick drains three accumulators gathered through registry
//! hooks: creations and removals go to every session over the reliable
//! channel, while the per-entity update blobs ride the lossy channel as a
//! timestamped snapshot.
//!
//! ## Architecture Design
//!
//! ### Single-Threaded Simulation
//! All registry access happens on the main `tokio::select!` loop in
//! [`network`]. Socket reads and writes run on their own tasks and talk to
//! the loop through channels, so the simulation itself needs no locks and
//! stays deterministic.
//!
//! ### Two Channels
//! The reliable-ordered channel (TCP, length-prefixed frames) carries
//! everything whose loss would corrupt the replicated set. The lossy
//! channel (UDP, bare datagrams) carries only snapshots, which are safe to
//! drop because each one is stamped and self-contained.
//!
//! ## Module Organization
//!
//! - [`core`]: the socket-free session and tick state machine
//! - [`logic`]: pluggable game rules ([`logic::ArenaLogic`] is the shipped set)
//! - [`network`]: sockets, session tasks, and the main loop

pub mod core;
pub mod logic;
pub mod network;

pub use crate::core::{Outbound, ServerCore, SessionId};
pub use crate::logic::{ArenaLogic, GameLogic, NullLogic};
pub use crate::network::NetworkServer;
