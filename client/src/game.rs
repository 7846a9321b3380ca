//! Client-side predicted game state.
//!
//! The client runs the same simulation code as the server with the same
//! seed, so its own trajectory and every wall can be predicted locally; the
//! network only carries jump commands and their authoritative outcomes.

use std::collections::HashMap;

use log::{debug, warn};
use shared::state::{BirdState, PlayerId, PlayerPatch, PlayerState, Wall};
use shared::Simulation;

/// The local view of the game: a predicted simulation for this player plus
/// the last known state of everyone else.
pub struct ClientGameState {
    /// Predicted simulation for the local player.
    pub simulation: Simulation,
    /// Last known state per player, kept fresh by server broadcasts.
    pub players: HashMap<PlayerId, PlayerState>,
    local_id: Option<PlayerId>,
    seed: f64,
    frame: i64,
    game_over: bool,
}

impl ClientGameState {
    pub fn new() -> Self {
        ClientGameState {
            simulation: Simulation::new(),
            players: HashMap::new(),
            local_id: None,
            seed: 0.0,
            frame: 0,
            game_over: false,
        }
    }

    /// Starts (or resumes) the local run once the server has assigned an
    /// identity and shared the wall seed.
    pub fn start(&mut self, local_id: PlayerId, seed: f64) {
        self.local_id = Some(local_id);
        self.seed = seed;
        self.simulation.init(seed);
        self.frame = 0;
        self.game_over = false;
    }

    pub fn local_id(&self) -> Option<PlayerId> {
        self.local_id
    }

    pub fn frame(&self) -> i64 {
        self.frame
    }

    pub fn is_game_over(&self) -> bool {
        self.game_over
    }

    /// Advances the local frame clock by one frame.
    ///
    /// Returns true when this frame ended the run (the bird left the
    /// vertical bounds with no jump left to report it). The caller sends
    /// that frame to the server as a final, fatal jump so the authoritative
    /// session restarts as well.
    pub fn advance_frame(&mut self) -> bool {
        if self.local_id.is_none() || self.game_over {
            return false;
        }
        self.frame += 1;
        if let Ok(state) = self.simulation.position_at(self.frame as f64) {
            if !state.valid {
                self.game_over = true;
                return true;
            }
        }
        false
    }

    /// The single entry point for a player gesture (tap/click).
    ///
    /// While the bird is alive this predicts a jump on the next frame and
    /// returns its time so the caller can send the matching command; after
    /// a crash it restarts the local run instead and returns nothing.
    pub fn player_action(&mut self) -> Option<i64> {
        self.local_id?;
        if self.game_over {
            self.restart();
            return None;
        }
        let time = self.frame + 1;
        match self.simulation.add_jump(time) {
            Ok(state) => {
                if !state.valid {
                    // Predicted a fatal jump; the server will confirm.
                    self.game_over = true;
                }
                Some(time)
            }
            Err(e) => {
                warn!("skipped jump at frame {}: {}", time, e);
                None
            }
        }
    }

    fn restart(&mut self) {
        self.simulation.init(self.seed);
        self.frame = 0;
        self.game_over = false;
    }

    /// Applies the authoritative player state returned by a jump command.
    ///
    /// For the local player this is the reconciliation point: the server's
    /// answer overrides whatever was predicted, and a dead `valid` flag is
    /// the only way a crash is ever signalled.
    pub fn reconcile(&mut self, player: PlayerState) {
        if self.local_id == Some(player.id) {
            if !player.bird.valid {
                self.game_over = true;
            } else if let Ok(predicted) = self.simulation.position_at(player.bird.time) {
                let drift = (predicted.y - player.bird.y).abs();
                if drift > 1e-6 || predicted.valid != player.bird.valid {
                    debug!(
                        "prediction drifted from authoritative state by {:.3} at frame {}",
                        drift, player.bird.time
                    );
                }
            }
        }
        self.players.insert(player.id, player);
    }

    /// Merges broadcast patches into the player mapping, creating entries
    /// for players first seen through a patch.
    pub fn apply_patches(&mut self, patches: HashMap<PlayerId, PlayerPatch>) {
        for (id, patch) in patches {
            let player = self
                .players
                .entry(id)
                .or_insert_with(|| PlayerState::new(id, patch.bird.unwrap_or_default()));
            player.apply(&patch);
        }
    }

    /// The predicted local bird at the current frame. This is what a
    /// renderer draws for the local player.
    pub fn position(&self) -> Option<BirdState> {
        self.simulation.position_at(self.frame as f64).ok()
    }

    /// The walls overlapping `[x0, x1]`, generated locally from the shared
    /// seed. This is what a renderer draws for obstacles.
    pub fn walls_in_view(&self, x0: f64, x1: f64) -> Vec<Wall> {
        self.simulation.walls_between(x0.max(0.0), x1.max(0.0))
    }
}

impl Default for ClientGameState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use shared::JUMP_SPEED;

    #[test]
    fn test_actions_require_a_connection() {
        let mut game = ClientGameState::new();
        assert_eq!(game.player_action(), None);
        assert!(!game.advance_frame());
    }

    #[test]
    fn test_action_predicts_a_jump() {
        let mut game = ClientGameState::new();
        game.start(1, 0.0);
        for _ in 0..3 {
            game.advance_frame();
        }

        assert_eq!(game.player_action(), Some(4));
        assert_eq!(game.simulation.checkpoints().len(), 2);

        let predicted = game.simulation.position_at(4.0).unwrap();
        assert_approx_eq!(predicted.vspeed, JUMP_SPEED, 1e-9);
    }

    #[test]
    fn test_falling_to_the_floor_ends_the_run() {
        let mut game = ClientGameState::new();
        game.start(1, 0.0);

        let mut died = false;
        for _ in 0..100 {
            if game.advance_frame() {
                died = true;
                break;
            }
        }

        assert!(died);
        assert!(game.is_game_over());
        // From rest at y = 100 the center crosses the floor during frame 36.
        assert_eq!(game.frame(), 36);

        // The clock freezes until the player restarts.
        assert!(!game.advance_frame());
        assert_eq!(game.frame(), 36);

        // The next gesture restarts instead of jumping.
        assert_eq!(game.player_action(), None);
        assert!(!game.is_game_over());
        assert_eq!(game.frame(), 0);
        assert_eq!(game.simulation.checkpoints().len(), 1);
    }

    #[test]
    fn test_reconcile_adopts_authoritative_death() {
        let mut game = ClientGameState::new();
        game.start(1, 0.0);
        game.advance_frame();
        game.player_action();

        let mut authoritative = PlayerState::new(1, BirdState::default());
        authoritative.bird.valid = false;
        game.reconcile(authoritative);

        assert!(game.is_game_over());
    }

    #[test]
    fn test_patches_create_and_update_peers() {
        let mut game = ClientGameState::new();
        game.start(1, 0.0);

        let mut patches = HashMap::new();
        patches.insert(
            2,
            PlayerPatch {
                username: Some("petar".to_string()),
                ..Default::default()
            },
        );
        game.apply_patches(patches);
        assert_eq!(game.players[&2].username, "petar");

        let mut update = HashMap::new();
        update.insert(
            2,
            PlayerPatch {
                highscore: Some(64.0),
                ..Default::default()
            },
        );
        game.apply_patches(update);
        assert_eq!(game.players[&2].username, "petar");
        assert_eq!(game.players[&2].highscore, 64.0);
    }

    #[test]
    fn test_walls_agree_across_clients_with_shared_seed() {
        let mut a = ClientGameState::new();
        let mut b = ClientGameState::new();
        a.start(1, 77.0);
        b.start(2, 77.0);

        assert_eq!(a.walls_in_view(0.0, 1000.0), b.walls_in_view(0.0, 1000.0));
    }
}
