//! Server network layer: TCP accept loop, per-connection socket tasks, and
//! the single event loop that owns all game state.
//!
//! Socket tasks never touch the registry; they forward decoded packets over
//! a channel into [`Server::run`], which processes one message at a time.

use std::collections::HashMap;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use log::{debug, error, info, warn};
use shared::protocol::{Packet, RequestId, MAX_FRAME_LEN};
use shared::state::{PlayerId, PlayerPatch};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;

use crate::registry::SessionRegistry;

/// Messages from the socket tasks into the main event loop.
#[derive(Debug)]
pub enum ServerMessage {
    NewConnection {
        stream: TcpStream,
        addr: SocketAddr,
    },
    PacketReceived {
        player_id: PlayerId,
        packet: Packet,
    },
    Disconnected {
        player_id: PlayerId,
    },
}

/// The authoritative server. One instance owns the registry and every
/// session's simulation; all mutation happens inside [`Server::run`].
pub struct Server {
    local_addr: SocketAddr,
    seed: f64,
    registry: SessionRegistry,
    server_tx: mpsc::UnboundedSender<ServerMessage>,
    server_rx: mpsc::UnboundedReceiver<ServerMessage>,
}

impl Server {
    /// Binds the listener and starts accepting connections. Accepted
    /// sockets queue up until [`Server::run`] starts draining the loop.
    pub async fn bind(addr: &str, seed: f64) -> io::Result<Server> {
        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        info!("server listening on {}", local_addr);

        let (server_tx, server_rx) = mpsc::unbounded_channel();
        spawn_acceptor(listener, server_tx.clone());

        Ok(Server {
            local_addr,
            seed,
            registry: SessionRegistry::new(),
            server_tx,
            server_rx,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Main event loop. Handlers run to completion one at a time, which is
    /// what lets the registry and the simulations go unlocked.
    pub async fn run(mut self) -> io::Result<()> {
        while let Some(message) = self.server_rx.recv().await {
            match message {
                ServerMessage::NewConnection { stream, addr } => {
                    self.handle_connect(stream, addr);
                }
                ServerMessage::PacketReceived { player_id, packet } => {
                    self.handle_packet(player_id, packet);
                }
                ServerMessage::Disconnected { player_id } => {
                    self.handle_disconnect(player_id);
                }
            }
        }
        Ok(())
    }

    fn handle_connect(&mut self, stream: TcpStream, addr: SocketAddr) {
        let (reader, writer) = stream.into_split();
        let (writer_tx, writer_rx) = mpsc::unbounded_channel();

        let player_id = self.registry.add(self.seed, writer_tx);
        info!("player {} connected from {}", player_id, addr);

        spawn_writer(writer, writer_rx);
        spawn_reader(reader, player_id, self.server_tx.clone());

        let joined = self.registry.get(player_id).map(|s| s.player.clone());
        self.registry.send_to(
            player_id,
            Packet::Connected {
                player_id,
                seed: self.seed,
            },
        );
        if let Some(player) = joined {
            self.registry
                .broadcast(Packet::PlayerJoined(player), Some(player_id));
        }
        self.registry
            .send_to(player_id, Packet::PlayersUpdate(self.registry.snapshot()));
    }

    fn handle_packet(&mut self, player_id: PlayerId, packet: Packet) {
        match packet {
            Packet::CmdJump { request_id, time } => self.handle_jump(player_id, request_id, time),
            Packet::SetUsername {
                request_id,
                username,
            } => self.handle_set_username(player_id, request_id, username),
            other => {
                warn!("player {}: unexpected packet {:?}", player_id, other);
            }
        }
    }

    fn handle_jump(&mut self, player_id: PlayerId, request_id: RequestId, time: i64) {
        let seed = self.seed;
        let session = match self.registry.get_mut(player_id) {
            Some(session) => session,
            None => return,
        };

        let state = match session.simulation.add_jump(time) {
            Ok(state) => state,
            Err(e) => {
                // A buggy or malicious client must not take the handler
                // down; the request is dropped and the caller never hears
                // back.
                warn!("player {}: dropped jump at {}: {}", player_id, time, e);
                return;
            }
        };

        session.player.bird = state;
        session.player.highscore = session.player.highscore.max(state.time);
        let player = session.player.clone();
        if !state.valid {
            debug!(
                "player {} crashed at frame {}; restarting their run",
                player_id, state.time
            );
            session.simulation.init(seed);
        }

        self.registry.send_to(
            player_id,
            Packet::JumpResult {
                request_id,
                player: player.clone(),
            },
        );
        let patch = PlayerPatch {
            bird: Some(state),
            highscore: Some(player.highscore),
            username: None,
        };
        self.registry.broadcast(
            Packet::PlayersUpdate(HashMap::from([(player_id, patch)])),
            Some(player_id),
        );
    }

    fn handle_set_username(
        &mut self,
        player_id: PlayerId,
        request_id: RequestId,
        username: String,
    ) {
        let accepted = !username.trim().is_empty()
            && !self.registry.username_taken(&username, player_id);

        if accepted {
            match self.registry.get_mut(player_id) {
                Some(session) => session.player.username = username.clone(),
                None => return,
            }
            info!("player {} is now known as {}", player_id, username);
            let patch = PlayerPatch {
                username: Some(username),
                ..Default::default()
            };
            self.registry.broadcast(
                Packet::PlayersUpdate(HashMap::from([(player_id, patch)])),
                Some(player_id),
            );
        }

        self.registry.send_to(
            player_id,
            Packet::UsernameResult {
                request_id,
                accepted,
            },
        );
    }

    fn handle_disconnect(&mut self, player_id: PlayerId) {
        if self.registry.remove(player_id) {
            info!("player {} disconnected", player_id);
            self.registry
                .broadcast(Packet::PlayerLeft { player_id }, None);
        }
    }
}

fn spawn_acceptor(listener: TcpListener, server_tx: mpsc::UnboundedSender<ServerMessage>) {
    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((stream, addr)) => {
                    if server_tx
                        .send(ServerMessage::NewConnection { stream, addr })
                        .is_err()
                    {
                        break;
                    }
                }
                Err(e) => {
                    error!("failed to accept connection: {}", e);
                    tokio::time::sleep(Duration::from_millis(10)).await;
                }
            }
        }
    });
}

fn spawn_writer(mut writer: OwnedWriteHalf, mut writer_rx: mpsc::UnboundedReceiver<Packet>) {
    tokio::spawn(async move {
        while let Some(packet) = writer_rx.recv().await {
            let frame = match packet.to_frame() {
                Ok(frame) => frame,
                Err(e) => {
                    error!("failed to encode packet: {}", e);
                    continue;
                }
            };
            if writer.write_all(&frame).await.is_err() {
                break;
            }
        }
    });
}

fn spawn_reader(
    mut reader: OwnedReadHalf,
    player_id: PlayerId,
    server_tx: mpsc::UnboundedSender<ServerMessage>,
) {
    tokio::spawn(async move {
        loop {
            match read_packet(&mut reader).await {
                Ok(packet) => {
                    if server_tx
                        .send(ServerMessage::PacketReceived { player_id, packet })
                        .is_err()
                    {
                        return;
                    }
                }
                // EOF and protocol violations both end the connection.
                Err(_) => break,
            }
        }
        let _ = server_tx.send(ServerMessage::Disconnected { player_id });
    });
}

/// Reads one length-prefixed frame and decodes its packet.
async fn read_packet(reader: &mut OwnedReadHalf) -> io::Result<Packet> {
    let mut len_buf = [0u8; 4];
    reader.read_exact(&mut len_buf).await?;
    let len = u32::from_le_bytes(len_buf);
    if len > MAX_FRAME_LEN {
        return Err(io::Error::new(io::ErrorKind::InvalidData, "oversized frame"));
    }
    let mut body = vec![0u8; len as usize];
    reader.read_exact(&mut body).await?;
    Packet::from_bytes(&body).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}
