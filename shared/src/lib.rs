//! Deterministic game core shared by the server and every client.
//!
//! The server and the clients run the exact same simulation code with the
//! same constants and the same seed, which is what allows clients to predict
//! their own trajectory and every obstacle without waiting for the network.

pub mod collision;
pub mod protocol;
pub mod simulation;
pub mod state;

pub use simulation::{Simulation, SimulationError};
pub use state::{BirdState, PlayerId, PlayerPatch, PlayerState, Wall};

// Physics constants, in units and units/frame. The y axis points up.
pub const HSPEED: f64 = 10.0;
pub const JUMP_SPEED: f64 = 8.0;
pub const GRAVITY: f64 = -0.5;
pub const CEILING_Y: f64 = 200.0;
pub const FLOOR_Y: f64 = -220.0;
pub const START_Y: f64 = 100.0;
pub const BIRD_RADIUS: f64 = 30.0;

// Obstacle layout.
pub const WALL_THICKNESS: f64 = 20.0;
pub const WALL_GAP: f64 = 150.0;
pub const WALL_SEPARATION: f64 = 300.0;
