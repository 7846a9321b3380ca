//! Bird trajectory simulation: analytic parabolic motion between jump
//! discontinuities, plus seeded procedural wall placement.

use thiserror::Error;

use crate::state::{BirdState, Wall};
use crate::{CEILING_Y, FLOOR_Y, GRAVITY, HSPEED, JUMP_SPEED, WALL_GAP, WALL_SEPARATION};

/// Contract violations raised by [`Simulation`].
///
/// These are local programming/protocol errors surfaced to the immediate
/// caller; they never travel over the wire. The server logs and drops
/// requests that trigger them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SimulationError {
    #[error("jump time must be later than the last jump")]
    InvalidJumpTime,
    #[error("cannot project a state backwards in time")]
    OutOfOrderTime,
    #[error("simulation used before init")]
    Uninitialized,
    #[error("no checkpoint at or before the queried time")]
    NoEarlierCheckpoint,
}

/// Deterministic pseudo-random value in `[0, 1)` for a given input.
fn hash01(x: f64) -> f64 {
    let s = x.sin() * 10000.0;
    s - s.floor()
}

fn lerp(a: f64, b: f64, k: f64) -> f64 {
    a + k * (b - a)
}

/// One player's trajectory: an append-only sequence of post-jump checkpoints
/// plus the wall seed. Owned exclusively by a single session or client;
/// simulations are never shared.
#[derive(Debug, Clone)]
pub struct Simulation {
    seed: f64,
    states: Vec<BirdState>,
}

impl Simulation {
    /// Creates a simulation with no trajectory. [`Simulation::init`] must be
    /// called before anything else.
    pub fn new() -> Self {
        Simulation {
            seed: 0.0,
            states: Vec::new(),
        }
    }

    /// Resets the trajectory to the single initial checkpoint and stores the
    /// wall seed. Safe to call repeatedly; used for startup and for the
    /// restart after a crash.
    pub fn init(&mut self, seed: f64) -> BirdState {
        self.seed = seed;
        let initial = BirdState::default();
        self.states = vec![initial];
        initial
    }

    pub fn seed(&self) -> f64 {
        self.seed
    }

    pub fn is_initialized(&self) -> bool {
        !self.states.is_empty()
    }

    /// The stored post-jump checkpoints, in strictly increasing time order.
    pub fn checkpoints(&self) -> &[BirdState] {
        &self.states
    }

    /// Projects `previous` forward to `time` under constant horizontal speed
    /// and constant gravity.
    ///
    /// Pure and bit-for-bit deterministic; the client/server agreement
    /// depends on it. Projecting an invalid state returns it unchanged.
    pub fn calc_state(
        &self,
        previous: &BirdState,
        time: f64,
    ) -> Result<BirdState, SimulationError> {
        if time < previous.time {
            return Err(SimulationError::OutOfOrderTime);
        }
        if !previous.valid {
            return Ok(*previous);
        }
        let dt = time - previous.time;
        let mut next = BirdState {
            x: previous.x + HSPEED * dt,
            y: previous.y + previous.vspeed * dt + 0.5 * GRAVITY * dt * dt,
            vspeed: previous.vspeed + GRAVITY * dt,
            time,
            valid: previous.valid,
        };
        next.valid = next.y > FLOOR_Y && next.y < CEILING_Y;
        Ok(next)
    }

    /// Adds a jump discontinuity at an integer frame time and returns the new
    /// checkpoint.
    ///
    /// The jump must be strictly later than the last checkpoint. The new
    /// checkpoint is invalid when the trajectory left the vertical bounds, or
    /// when the previous segment already hit a wall or the floor before
    /// `time` (a jump cannot be requested past the bird's death).
    pub fn add_jump(&mut self, time: i64) -> Result<BirdState, SimulationError> {
        let last = *self.states.last().ok_or(SimulationError::Uninitialized)?;
        if !last.valid {
            // The trajectory already ended; jumps on a dead bird are ignored.
            return Ok(last);
        }
        let t = time as f64;
        if t <= last.time {
            return Err(SimulationError::InvalidJumpTime);
        }
        let mut next = self.calc_state(&last, t)?;
        next.vspeed = JUMP_SPEED; // this performs the jump
        if next.valid && t >= self.next_collision(&last) {
            next.valid = false;
        }
        self.states.push(next);
        Ok(next)
    }

    /// State at an arbitrary (possibly fractional) time, projected from the
    /// last checkpoint at or before it.
    pub fn position_at(&self, time: f64) -> Result<BirdState, SimulationError> {
        if self.states.is_empty() {
            return Err(SimulationError::Uninitialized);
        }
        let anchor = self
            .states
            .iter()
            .rev()
            .find(|s| s.time <= time)
            .ok_or(SimulationError::NoEarlierCheckpoint)?;
        self.calc_state(anchor, time)
    }

    /// The wall at a given index. Same seed and index, same wall -- always.
    pub fn wall_at(&self, index: i64) -> Wall {
        let i = index as f64;
        let rnd = hash01(self.seed + i + (1.0 + self.seed.abs()) * i);
        Wall {
            index,
            x: i * WALL_SEPARATION,
            y: lerp(
                CEILING_Y - WALL_GAP / 2.0,
                FLOOR_Y + WALL_GAP / 2.0,
                rnd,
            ),
        }
    }

    /// Every wall whose index range covers `[x0, x1]`. Callers clamp the
    /// query to the non-negative domain.
    pub fn walls_between(&self, x0: f64, x1: f64) -> Vec<Wall> {
        let first = (x0 / WALL_SEPARATION).floor() as i64;
        let last = (x1 / WALL_SEPARATION).floor() as i64 + 1;
        (first..=last).map(|i| self.wall_at(i)).collect()
    }
}

impl Default for Simulation {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::START_Y;
    use assert_approx_eq::assert_approx_eq;

    fn initialized(seed: f64) -> Simulation {
        let mut sim = Simulation::new();
        sim.init(seed);
        sim
    }

    #[test]
    fn test_init_resets_to_single_checkpoint() {
        let mut sim = initialized(3.0);
        sim.add_jump(5).unwrap();
        sim.add_jump(9).unwrap();
        assert_eq!(sim.checkpoints().len(), 3);

        let initial = sim.init(3.0);
        assert_eq!(sim.checkpoints(), &[initial]);
        assert_eq!(initial, BirdState::default());
    }

    #[test]
    fn test_uninitialized_queries_fail() {
        let sim = Simulation::new();
        assert_eq!(
            sim.position_at(0.0).unwrap_err(),
            SimulationError::Uninitialized
        );

        let mut sim = Simulation::new();
        assert_eq!(
            sim.add_jump(1).unwrap_err(),
            SimulationError::Uninitialized
        );
    }

    #[test]
    fn test_projection_is_composable() {
        let sim = initialized(0.0);
        let start = BirdState::default();

        let via_midpoint = sim
            .calc_state(&sim.calc_state(&start, 2.0).unwrap(), 4.0)
            .unwrap();
        let direct = sim.calc_state(&start, 4.0).unwrap();

        assert_approx_eq!(via_midpoint.x, direct.x, 1e-9);
        assert_approx_eq!(via_midpoint.y, direct.y, 1e-9);
        assert_approx_eq!(via_midpoint.vspeed, direct.vspeed, 1e-9);
        assert_eq!(via_midpoint.valid, direct.valid);
    }

    #[test]
    fn test_projection_rejects_past_times() {
        let sim = initialized(0.0);
        let mid = sim.calc_state(&BirdState::default(), 3.0).unwrap();
        assert_eq!(
            sim.calc_state(&mid, 2.0).unwrap_err(),
            SimulationError::OutOfOrderTime
        );
    }

    #[test]
    fn test_invalid_state_is_frozen() {
        let sim = initialized(0.0);
        // Free fall far past the floor.
        let dead = sim.calc_state(&BirdState::default(), 40.0).unwrap();
        assert!(!dead.valid);
        assert!(dead.y < FLOOR_Y);

        let later = sim.calc_state(&dead, 55.0).unwrap();
        assert_eq!(later, dead);
        let much_later = sim.calc_state(&dead, 400.0).unwrap();
        assert_eq!(much_later, dead);
    }

    #[test]
    fn test_jump_requires_increasing_time() {
        let mut sim = initialized(0.0);
        assert_eq!(
            sim.add_jump(0).unwrap_err(),
            SimulationError::InvalidJumpTime
        );
        assert_eq!(
            sim.add_jump(-3).unwrap_err(),
            SimulationError::InvalidJumpTime
        );
        assert_eq!(sim.checkpoints().len(), 1);

        sim.add_jump(5).unwrap();
        assert_eq!(
            sim.add_jump(5).unwrap_err(),
            SimulationError::InvalidJumpTime
        );
        assert_eq!(
            sim.add_jump(4).unwrap_err(),
            SimulationError::InvalidJumpTime
        );
        assert_eq!(sim.checkpoints().len(), 2);
    }

    #[test]
    fn test_jump_resets_vertical_speed() {
        let mut sim = initialized(0.0);
        sim.add_jump(5).unwrap();

        let at_jump = sim.position_at(5.0).unwrap();
        assert_approx_eq!(at_jump.vspeed, JUMP_SPEED, 1e-9);
        assert_approx_eq!(at_jump.x, 50.0, 1e-9);
        // One frame of free fall before the jump: y = START_Y - 0.25 * 25.
        assert_approx_eq!(at_jump.y, START_Y + 0.5 * GRAVITY * 25.0, 1e-9);

        let one_frame_later = sim.position_at(6.0).unwrap();
        assert_approx_eq!(one_frame_later.vspeed, JUMP_SPEED + GRAVITY, 1e-9);
    }

    #[test]
    fn test_jump_on_dead_bird_is_ignored() {
        let mut sim = initialized(0.0);
        // Far past every survivable time for this trajectory.
        let dead = sim.add_jump(200).unwrap();
        assert!(!dead.valid);
        let count = sim.checkpoints().len();

        let still_dead = sim.add_jump(300).unwrap();
        assert_eq!(still_dead, dead);
        assert_eq!(sim.checkpoints().len(), count);
    }

    #[test]
    fn test_position_before_first_checkpoint() {
        let sim = initialized(0.0);
        assert_eq!(
            sim.position_at(-1.0).unwrap_err(),
            SimulationError::NoEarlierCheckpoint
        );
    }

    #[test]
    fn test_position_uses_latest_checkpoint() {
        let mut sim = initialized(0.0);
        sim.add_jump(4).unwrap();
        sim.add_jump(8).unwrap();

        // Between the two jumps the anchor is the frame-4 checkpoint.
        let between = sim.position_at(6.0).unwrap();
        assert_approx_eq!(between.vspeed, JUMP_SPEED + 2.0 * GRAVITY, 1e-9);

        // After the last jump the anchor is the frame-8 checkpoint.
        let after = sim.position_at(8.5).unwrap();
        assert_approx_eq!(after.vspeed, JUMP_SPEED + 0.5 * GRAVITY, 1e-9);
    }

    #[test]
    fn test_walls_are_pure() {
        let sim = initialized(42.0);
        assert_eq!(sim.wall_at(7), sim.wall_at(7));

        let other = initialized(42.0);
        assert_eq!(sim.walls_between(0.0, 1000.0), other.walls_between(0.0, 1000.0));
    }

    #[test]
    fn test_walls_depend_on_seed() {
        let a = initialized(1.0);
        let b = initialized(2.0);
        assert_ne!(a.wall_at(1).y, b.wall_at(1).y);
    }

    #[test]
    fn test_walls_between_covers_range() {
        let sim = initialized(0.0);
        let walls = sim.walls_between(0.0, 1000.0);
        assert_eq!(walls.len(), 5);
        for (i, wall) in walls.iter().enumerate() {
            assert_eq!(wall.index, i as i64);
            assert_approx_eq!(wall.x, i as f64 * WALL_SEPARATION, 1e-9);
        }
    }

    #[test]
    fn test_gap_centers_stay_in_bounds() {
        let sim = initialized(123.0);
        for index in 0..100 {
            let wall = sim.wall_at(index);
            assert!(wall.gap_top() <= CEILING_Y + 1e-9);
            assert!(wall.gap_bottom() >= FLOOR_Y - 1e-9);
        }
    }
}
