//! Earliest-collision search between a trajectory segment and the obstacles.
//!
//! Every primitive returns the time to impact relative to the given state,
//! or `f64::INFINITY` when the segment never touches the obstacle. Geometry
//! that cannot intersect is "no collision", never an error.

use crate::simulation::Simulation;
use crate::state::{BirdState, Wall};
use crate::{BIRD_RADIUS, CEILING_Y, FLOOR_Y, GRAVITY, HSPEED};

/// How far ahead the search looks, in frames. Covers the longest possible
/// fall from the ceiling to the floor with margin to spare.
const SEARCH_HORIZON: f64 = 64.0;

/// Step used to bracket a corner hit before Newton refinement.
const SAMPLE_STEP: f64 = 0.25;

const NEWTON_STEPS: u32 = 8;

fn x_after(state: &BirdState, dt: f64) -> f64 {
    state.x + HSPEED * dt
}

fn y_after(state: &BirdState, dt: f64) -> f64 {
    state.y + state.vspeed * dt + 0.5 * GRAVITY * dt * dt
}

/// Time until the bird's center crosses a vertical line segment spanning
/// `[y0, y1]`, not counting crossings behind the bird.
pub fn vertical_line_collision(state: &BirdState, line_x: f64, y0: f64, y1: f64) -> f64 {
    let t = (line_x - state.x) / HSPEED;
    if t < 0.0 {
        return f64::INFINITY;
    }
    let y = y_after(state, t);
    if y < y0 || y > y1 {
        return f64::INFINITY;
    }
    t
}

/// Time until the bird's rim crosses a horizontal line spanning `[x0, x1]`.
///
/// `offset` selects which rim approaches the line: `-BIRD_RADIUS` for the
/// underside falling onto a ledge, `+BIRD_RADIUS` for the top rising into
/// one, `0.0` for the center.
pub fn horizontal_line_collision(
    state: &BirdState,
    line_y: f64,
    x0: f64,
    x1: f64,
    offset: f64,
) -> f64 {
    let a = 0.5 * GRAVITY;
    let b = state.vspeed;
    let c = state.y + offset - line_y;
    let d = b * b - 4.0 * a * c;
    if d < 0.0 {
        return f64::INFINITY;
    }
    let sqrt_d = d.sqrt();
    let r1 = (-b - sqrt_d) / (2.0 * a);
    let r2 = (-b + sqrt_d) / (2.0 * a);
    let (lo, hi) = if r1 <= r2 { (r1, r2) } else { (r2, r1) };
    let t = if lo >= 0.0 {
        lo
    } else if hi >= 0.0 {
        hi
    } else {
        return f64::INFINITY;
    };
    let x = x_after(state, t);
    if x < x0 || x > x1 {
        return f64::INFINITY;
    }
    t
}

/// Time until the bird's rim touches a point.
///
/// The squared-distance function is quartic in time, so the earliest root is
/// bracketed by coarse forward sampling and then polished with a fixed
/// number of Newton steps. A bird that already overlaps the point at `t = 0`
/// does not collide with it: a jump cannot be judged against something it
/// started inside.
pub fn point_collision(state: &BirdState, px: f64, py: f64, max_time: f64) -> f64 {
    let gap = |t: f64| {
        let dx = x_after(state, t) - px;
        let dy = y_after(state, t) - py;
        dx * dx + dy * dy - BIRD_RADIUS * BIRD_RADIUS
    };
    if gap(0.0) <= 0.0 {
        return f64::INFINITY;
    }
    let mut prev = 0.0;
    let mut t = SAMPLE_STEP;
    while t <= max_time {
        if gap(t) <= 0.0 {
            return refine_contact(state, px, py, prev, t);
        }
        prev = t;
        t += SAMPLE_STEP;
    }
    f64::INFINITY
}

/// Newton refinement of a bracketed sign change of the squared-distance
/// function.
fn refine_contact(state: &BirdState, px: f64, py: f64, lo: f64, hi: f64) -> f64 {
    let mut t = 0.5 * (lo + hi);
    for _ in 0..NEWTON_STEPS {
        let dx = x_after(state, t) - px;
        let dy = y_after(state, t) - py;
        let f = dx * dx + dy * dy - BIRD_RADIUS * BIRD_RADIUS;
        let df = 2.0 * dx * HSPEED + 2.0 * dy * (state.vspeed + GRAVITY * t);
        if df.abs() < 1e-12 {
            break;
        }
        t = (t - f / df).clamp(lo, hi);
    }
    t.max(0.0)
}

/// Time until the bird hits a wall: the minimum over the two vertical gap
/// edges, the two horizontal gap edges, and the four gap corners (the corner
/// tests catch grazing diagonal approaches that the line tests miss).
pub fn wall_collision(state: &BirdState, wall: &Wall) -> f64 {
    // Sampling budget for the corner tests: time until the bird is past the
    // wall's far face.
    let max_t = ((wall.right() + BIRD_RADIUS - state.x) / HSPEED).max(0.0);

    let times = [
        vertical_line_collision(state, wall.left(), FLOOR_Y, wall.gap_bottom()),
        vertical_line_collision(state, wall.left(), wall.gap_top(), CEILING_Y),
        horizontal_line_collision(
            state,
            wall.gap_bottom(),
            wall.left(),
            wall.right(),
            -BIRD_RADIUS,
        ),
        horizontal_line_collision(
            state,
            wall.gap_top(),
            wall.left(),
            wall.right(),
            BIRD_RADIUS,
        ),
        point_collision(state, wall.left(), wall.gap_bottom(), max_t),
        point_collision(state, wall.right(), wall.gap_bottom(), max_t),
        point_collision(state, wall.left(), wall.gap_top(), max_t),
        point_collision(state, wall.right(), wall.gap_top(), max_t),
    ];
    times.into_iter().fold(f64::INFINITY, f64::min)
}

/// Time until the bird's center crosses the floor.
pub fn floor_collision(state: &BirdState) -> f64 {
    horizontal_line_collision(state, FLOOR_Y, state.x - 1e9, state.x + 1e9, 0.0)
}

impl Simulation {
    /// Absolute time of the first upcoming wall or floor impact for the
    /// trajectory segment starting at `state`.
    ///
    /// The wall search is bounded by a fixed look-ahead horizon; the floor
    /// always terminates the segment, so the result is always finite.
    pub fn next_collision(&self, state: &BirdState) -> f64 {
        let reach = state.x + HSPEED * SEARCH_HORIZON;
        let mut earliest = floor_collision(state);
        for wall in self.walls_between(state.x.max(0.0), reach.max(0.0)) {
            earliest = earliest.min(wall_collision(state, &wall));
        }
        state.time + earliest
    }
}
