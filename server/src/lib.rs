//! # Authoritative Game Server
//!
//! This library implements the authoritative side of the multiplayer bird
//! game. Every connection owns an independent, deterministically seeded
//! simulation; the server validates each jump request against it, answers
//! the caller with the authoritative player state, and broadcasts partial
//! updates to everyone else.
//!
//! ## Architecture
//!
//! The server is event-driven and effectively single-threaded where it
//! matters: socket tasks only move bytes, and every decoded packet is
//! funneled through one channel into the main event loop in
//! [`network::Server::run`]. Handlers run to completion before the next
//! message is processed, so the session registry and the per-player
//! simulations are mutated without any locking.
//!
//! ## Module Organization
//!
//! ### Registry Module (`registry`)
//! Owns all per-connection state: player id assignment, the session map,
//! snapshotting for newcomers, and broadcast fan-out through each session's
//! outgoing queue.
//!
//! ### Network Module (`network`)
//! TCP accept loop, per-connection reader/writer tasks, frame codec, and
//! the request handlers for jumps, username changes and disconnects.
//!
//! ## Authority Rules
//!
//! Jump requests that violate the simulation's contract (non-increasing
//! times) are logged and dropped without a response; the connection stays
//! up and other players are unaffected. A jump that ends the trajectory is
//! answered normally -- with `valid` set to false -- and the player's
//! simulation is silently re-seeded so their next jump starts a fresh run.

pub mod network;
pub mod registry;
