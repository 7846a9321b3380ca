//! # Game Client Library
//!
//! Client-side implementation of the multiplayer bird game: connection
//! management, a locally predicted simulation, and reconciliation against
//! the server's authoritative answers.
//!
//! ## Prediction and Reconciliation
//!
//! The client owns a [`shared::Simulation`] seeded identically to the
//! server's copy for this connection. Taps are applied to it immediately --
//! the bird jumps without waiting for the network -- and the matching jump
//! command is sent as a request. When the authoritative answer arrives it
//! overrides the prediction; because both sides run the same deterministic
//! code, the states only ever differ when the server ruled the jump fatal.
//! Walls are never transmitted at all: the shared seed makes every client
//! generate the same layout on demand.
//!
//! ## Module Organization
//!
//! ### Game Module (`game`)
//! The predicted simulation, the frame clock, the roster of known players,
//! and the single `player_action` entry point that decides between jumping
//! and restarting.
//!
//! ### Network Module (`network`)
//! The TCP connection, the frame codec, pending request tracking, and the
//! event loop that ties packets, actions and the frame clock together.
//!
//! Rendering is deliberately absent: a renderer is an external collaborator
//! that reads `game.position()`, `game.walls_in_view(..)` and `game.players`
//! and must never mutate the core directly.

pub mod game;
pub mod network;
