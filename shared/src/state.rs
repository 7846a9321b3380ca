use serde::{Deserialize, Serialize};

use crate::{START_Y, WALL_GAP, WALL_THICKNESS};

/// Identifies one connected player. Assigned by the server registry.
pub type PlayerId = u32;

/// A point on a bird's trajectory.
///
/// `time` is a frame counter and may be fractional when sampled between
/// jumps. Once `valid` turns false the trajectory has ended (floor, ceiling
/// or wall) and the state freezes: projecting an invalid state yields the
/// state itself, unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BirdState {
    pub x: f64,
    pub y: f64,
    pub vspeed: f64,
    pub time: f64,
    pub valid: bool,
}

impl Default for BirdState {
    fn default() -> Self {
        BirdState {
            x: 0.0,
            y: START_Y,
            vspeed: 0.0,
            time: 0.0,
            valid: true,
        }
    }
}

/// An obstacle wall with a passable gap.
///
/// Walls are never stored anywhere; they are regenerated on demand and the
/// same `(seed, index)` always produces the same wall.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Wall {
    pub index: i64,
    /// Horizontal center of the wall.
    pub x: f64,
    /// Vertical center of the gap.
    pub y: f64,
}

impl Wall {
    pub fn left(&self) -> f64 {
        self.x - WALL_THICKNESS / 2.0
    }

    pub fn right(&self) -> f64 {
        self.x + WALL_THICKNESS / 2.0
    }

    pub fn gap_bottom(&self) -> f64 {
        self.y - WALL_GAP / 2.0
    }

    pub fn gap_top(&self) -> f64 {
        self.y + WALL_GAP / 2.0
    }
}

/// Everything the server tracks about one player, mirrored on clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerState {
    pub id: PlayerId,
    pub username: String,
    pub bird: BirdState,
    /// Highest frame count this player has survived to.
    pub highscore: f64,
}

impl PlayerState {
    pub fn new(id: PlayerId, bird: BirdState) -> Self {
        PlayerState {
            id,
            username: format!("player-{}", id),
            bird,
            highscore: 0.0,
        }
    }

    /// Merges a partial update into this state.
    pub fn apply(&mut self, patch: &PlayerPatch) {
        if let Some(bird) = patch.bird {
            self.bird = bird;
        }
        if let Some(username) = &patch.username {
            self.username = username.clone();
        }
        if let Some(highscore) = patch.highscore {
            self.highscore = highscore;
        }
    }

    /// A patch carrying every field, used for full roster snapshots.
    pub fn as_patch(&self) -> PlayerPatch {
        PlayerPatch {
            bird: Some(self.bird),
            username: Some(self.username.clone()),
            highscore: Some(self.highscore),
        }
    }
}

/// Partial per-player update. Mutations are broadcast as patches rather than
/// full state so update size stays bounded as the player count grows.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlayerPatch {
    pub bird: Option<BirdState>,
    pub username: Option<String>,
    pub highscore: Option<f64>,
}
