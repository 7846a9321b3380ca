//! Per-connection session ownership.
//!
//! Every connection gets a [`Session`] holding that player's authoritative
//! simulation and public state. The [`SessionRegistry`] is the single owner
//! of all sessions and is only ever touched from the server's event loop,
//! which runs each handler to completion, so no locking is needed.

use std::collections::HashMap;

use log::info;
use shared::protocol::Packet;
use shared::state::{PlayerId, PlayerPatch, PlayerState};
use shared::Simulation;
use tokio::sync::mpsc;

/// One connected player: their simulation, their public state, and the
/// queue their writer task drains into the socket.
pub struct Session {
    pub player: PlayerState,
    pub simulation: Simulation,
    sender: mpsc::UnboundedSender<Packet>,
}

impl Session {
    fn new(id: PlayerId, seed: f64, sender: mpsc::UnboundedSender<Packet>) -> Self {
        let mut simulation = Simulation::new();
        let bird = simulation.init(seed);
        Session {
            player: PlayerState::new(id, bird),
            simulation,
            sender,
        }
    }

    /// Queues a packet for this session's socket.
    pub fn send(&self, packet: Packet) {
        // A closed queue means the writer died and the disconnect
        // notification is already on its way to the event loop.
        let _ = self.sender.send(packet);
    }
}

/// All live sessions, indexed by player id.
pub struct SessionRegistry {
    sessions: HashMap<PlayerId, Session>,
    next_id: PlayerId,
}

impl SessionRegistry {
    pub fn new() -> Self {
        SessionRegistry {
            sessions: HashMap::new(),
            next_id: 1,
        }
    }

    /// Creates a session with a freshly seeded simulation and returns the
    /// assigned player id.
    pub fn add(&mut self, seed: f64, sender: mpsc::UnboundedSender<Packet>) -> PlayerId {
        let id = self.next_id;
        self.next_id += 1;
        self.sessions.insert(id, Session::new(id, seed, sender));
        id
    }

    pub fn remove(&mut self, id: PlayerId) -> bool {
        if self.sessions.remove(&id).is_some() {
            info!("session {} removed", id);
            true
        } else {
            false
        }
    }

    pub fn get(&self, id: PlayerId) -> Option<&Session> {
        self.sessions.get(&id)
    }

    pub fn get_mut(&mut self, id: PlayerId) -> Option<&mut Session> {
        self.sessions.get_mut(&id)
    }

    pub fn send_to(&self, id: PlayerId, packet: Packet) {
        if let Some(session) = self.sessions.get(&id) {
            session.send(packet);
        }
    }

    /// Queues a packet for every session except `exclude`.
    pub fn broadcast(&self, packet: Packet, exclude: Option<PlayerId>) {
        for (id, session) in &self.sessions {
            if Some(*id) == exclude {
                continue;
            }
            session.send(packet.clone());
        }
    }

    /// The full roster as patches, for the snapshot sent to a newcomer.
    pub fn snapshot(&self) -> HashMap<PlayerId, PlayerPatch> {
        self.sessions
            .iter()
            .map(|(id, session)| (*id, session.player.as_patch()))
            .collect()
    }

    pub fn username_taken(&self, username: &str, exclude: PlayerId) -> bool {
        self.sessions
            .iter()
            .any(|(id, session)| *id != exclude && session.player.username == username)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::protocol::Packet;

    fn channel() -> (
        mpsc::UnboundedSender<Packet>,
        mpsc::UnboundedReceiver<Packet>,
    ) {
        mpsc::unbounded_channel()
    }

    #[test]
    fn test_ids_increment_from_one() {
        let mut registry = SessionRegistry::new();
        let (tx1, _rx1) = channel();
        let (tx2, _rx2) = channel();

        assert_eq!(registry.add(0.0, tx1), 1);
        assert_eq!(registry.add(0.0, tx2), 2);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_sessions_start_initialized() {
        let mut registry = SessionRegistry::new();
        let (tx, _rx) = channel();
        let id = registry.add(7.0, tx);

        let session = registry.get(id).unwrap();
        assert!(session.simulation.is_initialized());
        assert_eq!(session.simulation.seed(), 7.0);
        assert_eq!(session.player.username, "player-1");
        assert!(session.player.bird.valid);
    }

    #[test]
    fn test_remove_is_idempotent() {
        let mut registry = SessionRegistry::new();
        let (tx, _rx) = channel();
        let id = registry.add(0.0, tx);

        assert!(registry.remove(id));
        assert!(!registry.remove(id));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_broadcast_skips_excluded_session() {
        let mut registry = SessionRegistry::new();
        let (tx1, mut rx1) = channel();
        let (tx2, mut rx2) = channel();
        let id1 = registry.add(0.0, tx1);
        let _id2 = registry.add(0.0, tx2);

        registry.broadcast(Packet::PlayerLeft { player_id: 99 }, Some(id1));

        assert!(rx1.try_recv().is_err());
        assert!(matches!(
            rx2.try_recv(),
            Ok(Packet::PlayerLeft { player_id: 99 })
        ));
    }

    #[test]
    fn test_snapshot_contains_every_player() {
        let mut registry = SessionRegistry::new();
        let (tx1, _rx1) = channel();
        let (tx2, _rx2) = channel();
        let id1 = registry.add(0.0, tx1);
        let id2 = registry.add(0.0, tx2);

        let snapshot = registry.snapshot();
        assert_eq!(snapshot.len(), 2);
        assert!(snapshot[&id1].bird.is_some());
        assert_eq!(snapshot[&id2].username.as_deref(), Some("player-2"));
    }

    #[test]
    fn test_username_taken_ignores_self() {
        let mut registry = SessionRegistry::new();
        let (tx1, _rx1) = channel();
        let (tx2, _rx2) = channel();
        let id1 = registry.add(0.0, tx1);
        let id2 = registry.add(0.0, tx2);

        registry.get_mut(id1).unwrap().player.username = "david".to_string();

        assert!(registry.username_taken("david", id2));
        assert!(!registry.username_taken("david", id1));
        assert!(!registry.username_taken("petar", id2));
    }
}
