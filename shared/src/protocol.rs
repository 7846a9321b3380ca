//! Wire protocol between server and clients.
//!
//! One tagged message per channel, bincode-encoded inside length-prefixed
//! frames over a single duplex TCP connection. Requests carry a
//! [`RequestId`] that the matching response echoes back; broadcasts carry
//! none and are never acknowledged.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::state::{PlayerId, PlayerPatch, PlayerState};

/// Correlates a request with its single response.
pub type RequestId = u64;

/// Frames larger than this are treated as a protocol violation and the
/// connection is dropped.
pub const MAX_FRAME_LEN: u32 = 64 * 1024;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Packet {
    /// Server -> newcomer: assigned identity and the shared wall seed.
    Connected { player_id: PlayerId, seed: f64 },
    /// Server -> peers: a new player appeared.
    PlayerJoined(PlayerState),
    /// Server -> peers: a player disconnected.
    PlayerLeft { player_id: PlayerId },
    /// Server -> clients: partial per-player updates keyed by player id.
    PlayersUpdate(HashMap<PlayerId, PlayerPatch>),
    /// Client -> server: request a jump at an integer frame time.
    CmdJump { request_id: RequestId, time: i64 },
    /// Server -> caller: authoritative player state after a jump.
    JumpResult {
        request_id: RequestId,
        player: PlayerState,
    },
    /// Client -> server: request a username change.
    SetUsername {
        request_id: RequestId,
        username: String,
    },
    /// Server -> caller: whether the username change was applied.
    UsernameResult { request_id: RequestId, accepted: bool },
}

impl Packet {
    /// Encodes the packet as a length-prefixed frame ready for the socket.
    pub fn to_frame(&self) -> Result<Vec<u8>, bincode::Error> {
        let body = bincode::serialize(self)?;
        let mut frame = Vec::with_capacity(4 + body.len());
        frame.extend_from_slice(&(body.len() as u32).to_le_bytes());
        frame.extend_from_slice(&body);
        Ok(frame)
    }

    /// Decodes a frame body (without the length prefix).
    pub fn from_bytes(bytes: &[u8]) -> Result<Packet, bincode::Error> {
        bincode::deserialize(bytes)
    }
}
