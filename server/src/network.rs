//! Server network layer: reliable-channel sessions, the lossy snapshot
//! socket, and the fixed-tick loop coordinating them.
//!
//! Every connection gets a session id and two tasks, a framed reader and a
//! writer draining an outbound byte queue. All of them report into one
//! event channel consumed by the main `tokio::select!` loop, which is the
//! only place the [`ServerCore`] (and with it the registry) is touched, so
//! the simulation itself needs no locking.

use crate::core::{Outbound, ServerCore, SessionId};
use log::{debug, error, info, warn};
use shared::codec::{decode_message, encode_datagram, encode_frame, frame_len, FRAME_HEADER_LEN};
use shared::Message;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream, UdpSocket};
use tokio::sync::mpsc;
use tokio::time::interval;

/// Events funneled from the per-session and socket tasks into the main loop.
#[derive(Debug)]
pub enum ServerEvent {
    MessageReceived {
        session: SessionId,
        message: Message,
    },
    Disconnected {
        session: SessionId,
    },
    DatagramReceived {
        message: Message,
        addr: SocketAddr,
    },
}

/// Reads one length-prefixed frame off the reliable channel.
pub async fn read_frame<R: AsyncRead + Unpin>(reader: &mut R) -> std::io::Result<Message> {
    let mut header = [0u8; FRAME_HEADER_LEN];
    reader.read_exact(&mut header).await?;
    let len = frame_len(header)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
    let mut body = vec![0u8; len];
    reader.read_exact(&mut body).await?;
    decode_message(&body).map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
}

/// The socket-facing server wrapping a [`ServerCore`].
pub struct NetworkServer {
    core: ServerCore,
    listener: TcpListener,
    udp: Arc<UdpSocket>,
    tick_duration: Duration,

    event_tx: mpsc::UnboundedSender<ServerEvent>,
    event_rx: mpsc::UnboundedReceiver<ServerEvent>,

    /// Outbound byte queue per live session.
    sessions: HashMap<SessionId, mpsc::UnboundedSender<Vec<u8>>>,
    /// Snapshot address per player id, learned from `RegisterUdp`.
    udp_addrs: HashMap<String, SocketAddr>,
    /// Which player logged in on which session, for address cleanup.
    session_players: HashMap<SessionId, String>,
    next_session: SessionId,
}

impl NetworkServer {
    pub async fn new(
        host: &str,
        reliable_port: u16,
        lossy_port: u16,
        tick_duration: Duration,
        core: ServerCore,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let listener = TcpListener::bind((host, reliable_port)).await?;
        let udp = Arc::new(UdpSocket::bind((host, lossy_port)).await?);
        info!(
            "listening on {}:{} (reliable) and {}:{} (lossy)",
            host, reliable_port, host, lossy_port
        );

        let (event_tx, event_rx) = mpsc::unbounded_channel();

        Ok(NetworkServer {
            core,
            listener,
            udp,
            tick_duration,
            event_tx,
            event_rx,
            sessions: HashMap::new(),
            udp_addrs: HashMap::new(),
            session_players: HashMap::new(),
            next_session: 1,
        })
    }

    pub fn local_reliable_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn local_lossy_addr(&self) -> std::io::Result<SocketAddr> {
        self.udp.local_addr()
    }

    /// Spawns the task feeding lossy-channel datagrams into the event loop.
    fn spawn_datagram_receiver(&self) {
        let udp = Arc::clone(&self.udp);
        let event_tx = self.event_tx.clone();

        tokio::spawn(async move {
            let mut buffer = [0u8; 2048];

            loop {
                match udp.recv_from(&mut buffer).await {
                    Ok((len, addr)) => match decode_message(&buffer[..len]) {
                        Ok(message) => {
                            if event_tx
                                .send(ServerEvent::DatagramReceived { message, addr })
                                .is_err()
                            {
                                break;
                            }
                        }
                        Err(e) => warn!("undecodable datagram from {}: {}", addr, e),
                    },
                    Err(e) => {
                        error!("error receiving datagram: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }
            }
        });
    }

    /// Accepts a connection: registers the session's outbound queue and
    /// spawns its reader and writer tasks.
    fn spawn_session(&mut self, stream: TcpStream, addr: SocketAddr) {
        let session = self.next_session;
        self.next_session += 1;
        info!("session {} connected from {}", session, addr);

        let (mut read_half, mut write_half) = stream.into_split();
        let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Vec<u8>>();
        self.sessions.insert(session, outbound_tx);

        tokio::spawn(async move {
            while let Some(bytes) = outbound_rx.recv().await {
                if let Err(e) = write_half.write_all(&bytes).await {
                    debug!("session {} write failed: {}", session, e);
                    break;
                }
            }
            // Queue dropped or peer gone either way; the FIN from dropping
            // the write half lets the peer notice.
        });

        let event_tx = self.event_tx.clone();
        tokio::spawn(async move {
            loop {
                match read_frame(&mut read_half).await {
                    Ok(message) => {
                        if event_tx
                            .send(ServerEvent::MessageReceived { session, message })
                            .is_err()
                        {
                            return;
                        }
                    }
                    Err(e) => {
                        if e.kind() != std::io::ErrorKind::UnexpectedEof {
                            warn!("session {} read failed: {}", session, e);
                        }
                        let _ = event_tx.send(ServerEvent::Disconnected { session });
                        return;
                    }
                }
            }
        });
    }

    /// Carries out the delivery instructions produced by the core.
    async fn dispatch(&mut self, instructions: Vec<Outbound>) {
        for instruction in instructions {
            match instruction {
                Outbound::Reliable { session, message } => {
                    self.send_reliable(session, &message);
                }
                Outbound::BroadcastReliable(message) => {
                    let sessions: Vec<SessionId> = self.sessions.keys().copied().collect();
                    for session in sessions {
                        self.send_reliable(session, &message);
                    }
                }
                Outbound::BroadcastLossy(message) => {
                    let data = match encode_datagram(&message) {
                        Ok(data) => data,
                        Err(e) => {
                            error!("failed to encode datagram: {}", e);
                            continue;
                        }
                    };
                    for addr in self.udp_addrs.values() {
                        if let Err(e) = self.udp.send_to(&data, addr).await {
                            debug!("snapshot to {} failed: {}", addr, e);
                        }
                    }
                }
                Outbound::Close(session) => {
                    // Dropping the queue ends the writer task, which closes
                    // the socket's write half.
                    self.sessions.remove(&session);
                }
            }
        }
    }

    fn send_reliable(&mut self, session: SessionId, message: &Message) {
        let frame = match encode_frame(message) {
            Ok(frame) => frame,
            Err(e) => {
                error!("failed to encode frame: {}", e);
                return;
            }
        };
        if let Some(queue) = self.sessions.get(&session) {
            if queue.send(frame).is_err() {
                self.sessions.remove(&session);
            }
        }
    }

    async fn handle_event(&mut self, event: ServerEvent) {
        match event {
            ServerEvent::MessageReceived { session, message } => {
                let out = self.core.handle_message(session, message);
                // Remember who logged in where so the snapshot address can
                // be dropped with the session. Only an admitted session gets
                // a mapping: a rejected duplicate must not be able to take
                // the legitimate player's snapshot address down with it.
                if !self.session_players.contains_key(&session) {
                    if let Some(player) = self.core.player_for_session(session) {
                        self.session_players
                            .insert(session, player.player_id().to_string());
                    }
                }
                self.dispatch(out).await;
            }
            ServerEvent::Disconnected { session } => {
                self.sessions.remove(&session);
                if let Some(player_id) = self.session_players.remove(&session) {
                    self.udp_addrs.remove(&player_id);
                }
                let out = self.core.handle_disconnect(session);
                self.dispatch(out).await;
            }
            ServerEvent::DatagramReceived { message, addr } => match message {
                Message::RegisterUdp { player_id } => {
                    debug!("snapshots for {} go to {}", player_id, addr);
                    self.udp_addrs.insert(player_id, addr);
                }
                other => warn!("unexpected datagram from {}: {:?}", addr, other),
            },
        }
    }

    /// Main loop: accept connections, consume events, advance the tick.
    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        self.spawn_datagram_receiver();
        self.core.start();

        let mut tick_interval = interval(self.tick_duration);
        let mut last_tick = Instant::now();

        loop {
            tokio::select! {
                accepted = self.listener.accept() => {
                    match accepted {
                        Ok((stream, addr)) => self.spawn_session(stream, addr),
                        Err(e) => error!("accept failed: {}", e),
                    }
                },

                event = self.event_rx.recv() => {
                    match event {
                        Some(event) => self.handle_event(event).await,
                        None => {
                            info!("event channel closed, shutting down");
                            break;
                        }
                    }
                },

                _ = tick_interval.tick() => {
                    let now = Instant::now();
                    let dt = now.duration_since(last_tick).as_secs_f32();
                    last_tick = now;

                    let now_ms = SystemTime::now()
                        .duration_since(UNIX_EPOCH)
                        .unwrap_or_default()
                        .as_millis() as u64;

                    let out = self.core.tick(dt, now_ms);
                    self.dispatch(out).await;
                },
            }
        }

        self.core.stop();
        Ok(())
    }
}
