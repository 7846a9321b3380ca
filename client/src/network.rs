//! Client connection handling: socket tasks, request/response bookkeeping
//! and the event loop that drives the predicted game state.

use std::collections::HashMap;
use std::io;

use log::{debug, info, warn};
use shared::protocol::{Packet, RequestId, MAX_FRAME_LEN};
use shared::state::PlayerState;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{interval, Duration};

use crate::game::ClientGameState;

/// A gesture or request fed into the client's event loop by the embedding
/// application (a renderer's input hook, a bot driver, a test).
pub enum Action {
    /// A tap: jump while alive, restart after a crash. The optional channel
    /// resolves with the authoritative state if the tap produced a jump.
    Tap {
        done: Option<oneshot::Sender<PlayerState>>,
    },
    /// Ask the server for a username change.
    SetUsername {
        username: String,
        done: oneshot::Sender<bool>,
    },
}

/// Cloneable handle for feeding [`Action`]s into a running [`Client`].
#[derive(Clone)]
pub struct ActionHandle {
    tx: mpsc::UnboundedSender<Action>,
}

impl ActionHandle {
    /// Fire-and-forget tap.
    pub fn tap(&self) {
        let _ = self.tx.send(Action::Tap { done: None });
    }

    /// Tap whose jump result can be awaited.
    ///
    /// The receiver never resolves when the tap turned into a restart, the
    /// server rejected the request, or the connection dropped. Callers must
    /// not assume bounded latency.
    pub fn tap_rpc(&self) -> oneshot::Receiver<PlayerState> {
        let (done, rx) = oneshot::channel();
        let _ = self.tx.send(Action::Tap { done: Some(done) });
        rx
    }

    pub fn set_username(&self, username: String) -> oneshot::Receiver<bool> {
        let (done, rx) = oneshot::channel();
        let _ = self.tx.send(Action::SetUsername { username, done });
        rx
    }
}

/// A connected client: owns the socket, the predicted game state, and the
/// table of requests still waiting for their response.
pub struct Client {
    packet_rx: mpsc::UnboundedReceiver<Packet>,
    writer: OwnedWriteHalf,
    action_rx: mpsc::UnboundedReceiver<Action>,
    actions_closed: bool,
    pub game: ClientGameState,
    next_request_id: RequestId,
    pending_jumps: HashMap<RequestId, oneshot::Sender<PlayerState>>,
    pending_usernames: HashMap<RequestId, oneshot::Sender<bool>>,
}

impl Client {
    pub async fn connect(addr: &str) -> io::Result<(Client, ActionHandle)> {
        let stream = TcpStream::connect(addr).await?;
        info!("connected to {}", addr);
        let (reader, writer) = stream.into_split();

        let (packet_tx, packet_rx) = mpsc::unbounded_channel();
        spawn_reader(reader, packet_tx);
        let (action_tx, action_rx) = mpsc::unbounded_channel();

        let client = Client {
            packet_rx,
            writer,
            action_rx,
            actions_closed: false,
            game: ClientGameState::new(),
            next_request_id: 0,
            pending_jumps: HashMap::new(),
            pending_usernames: HashMap::new(),
        };
        Ok((client, ActionHandle { tx: action_tx }))
    }

    /// Event loop: server packets, player actions and the frame clock.
    /// Returns when the server closes the connection.
    pub async fn run(&mut self) -> io::Result<()> {
        let mut frame_interval = interval(Duration::from_millis(16)); // 60 Hz

        loop {
            tokio::select! {
                packet = self.packet_rx.recv() => {
                    match packet {
                        Some(packet) => self.handle_packet(packet),
                        None => {
                            warn!("server closed the connection");
                            break;
                        }
                    }
                }

                action = self.action_rx.recv(), if !self.actions_closed => {
                    match action {
                        Some(action) => self.handle_action(action).await?,
                        None => self.actions_closed = true,
                    }
                }

                _ = frame_interval.tick() => {
                    if self.game.advance_frame() {
                        // The bird fell out of bounds between jumps; report
                        // the death frame as a final jump so the
                        // authoritative run restarts too.
                        let time = self.game.frame();
                        self.send_jump(time, None).await?;
                    }

                    let frame = self.game.frame();
                    if frame > 0 && frame % 300 == 0 {
                        if let Some(state) = self.game.position() {
                            debug!(
                                "frame {}: x={:.0} y={:.1} vspeed={:.2}",
                                frame, state.x, state.y, state.vspeed
                            );
                        }
                    }
                }
            }
        }
        Ok(())
    }

    fn handle_packet(&mut self, packet: Packet) {
        match packet {
            Packet::Connected { player_id, seed } => {
                info!("joined as player {} with wall seed {}", player_id, seed);
                self.game.start(player_id, seed);
            }
            Packet::PlayerJoined(player) => {
                info!("player {} ({}) joined", player.id, player.username);
                self.game.players.insert(player.id, player);
            }
            Packet::PlayerLeft { player_id } => {
                info!("player {} left", player_id);
                self.game.players.remove(&player_id);
            }
            Packet::PlayersUpdate(patches) => {
                self.game.apply_patches(patches);
            }
            Packet::JumpResult { request_id, player } => {
                if let Some(done) = self.pending_jumps.remove(&request_id) {
                    let _ = done.send(player.clone());
                }
                self.game.reconcile(player);
            }
            Packet::UsernameResult {
                request_id,
                accepted,
            } => {
                if let Some(done) = self.pending_usernames.remove(&request_id) {
                    let _ = done.send(accepted);
                }
            }
            other => warn!("unexpected packet from server: {:?}", other),
        }
    }

    async fn handle_action(&mut self, action: Action) -> io::Result<()> {
        match action {
            Action::Tap { done } => {
                if let Some(time) = self.game.player_action() {
                    self.send_jump(time, done).await?;
                }
            }
            Action::SetUsername { username, done } => {
                let request_id = self.next_request_id();
                self.pending_usernames.insert(request_id, done);
                self.send_packet(&Packet::SetUsername {
                    request_id,
                    username,
                })
                .await?;
            }
        }
        Ok(())
    }

    async fn send_jump(
        &mut self,
        time: i64,
        done: Option<oneshot::Sender<PlayerState>>,
    ) -> io::Result<()> {
        let request_id = self.next_request_id();
        if let Some(done) = done {
            self.pending_jumps.insert(request_id, done);
        }
        self.send_packet(&Packet::CmdJump { request_id, time }).await
    }

    fn next_request_id(&mut self) -> RequestId {
        self.next_request_id += 1;
        self.next_request_id
    }

    async fn send_packet(&mut self, packet: &Packet) -> io::Result<()> {
        let frame = packet
            .to_frame()
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        self.writer.write_all(&frame).await
    }
}

fn spawn_reader(mut reader: OwnedReadHalf, packet_tx: mpsc::UnboundedSender<Packet>) {
    tokio::spawn(async move {
        loop {
            match read_packet(&mut reader).await {
                Ok(packet) => {
                    if packet_tx.send(packet).is_err() {
                        break;
                    }
                }
                // Dropping the sender closes the event loop's channel,
                // which is how the disconnect is observed.
                Err(_) => break,
            }
        }
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
