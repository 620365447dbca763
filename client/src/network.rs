//! Client network layer: connection establishment, the two receive tasks,
//! and the frame-oriented send path.
//!
//! `GameClient` connects the reliable channel with a bounded retry budget,
//! binds an ephemeral lossy socket, and registers its snapshot address with
//! the server. Both receive tasks funnel decoded messages into one inbound
//! queue that [`crate::sync::ClientSync`] drains on every frame.

use crate::sync::ClientSync;
use log::{error, info, warn};
use shared::codec::{decode_message, encode_datagram, encode_frame, frame_len, FRAME_HEADER_LEN};
use shared::{
    EntityFactory, Message, Player, SyncError, CONNECT_RETRIES, CONNECT_TIMEOUT_MILLIS,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpStream, UdpSocket};
use tokio::sync::mpsc;
use tokio::time::timeout;

/// How often the snapshot-address registration is re-announced while no
/// snapshot has arrived yet. The registration datagram rides the lossy
/// channel and may be dropped like any other.
pub const REGISTER_RESEND_MILLIS: u64 = 500;

async fn read_frame<R: AsyncRead + Unpin>(reader: &mut R) -> std::io::Result<Message> {
    let mut header = [0u8; FRAME_HEADER_LEN];
    reader.read_exact(&mut header).await?;
    let len = frame_len(header)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
    let mut body = vec![0u8; len];
    reader.read_exact(&mut body).await?;
    decode_message(&body).map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
}

/// The connected client endpoint.
pub struct GameClient {
    sync: ClientSync,
    player: Player,

    outbound_tx: mpsc::UnboundedSender<Vec<u8>>,
    inbound_rx: mpsc::UnboundedReceiver<Message>,
    connected: Arc<AtomicBool>,

    udp: Arc<UdpSocket>,
    register_datagram: Vec<u8>,
    last_register: Instant,
}

impl GameClient {
    /// Connects the reliable channel, registers the lossy one, and logs in.
    ///
    /// Each connect attempt gets its own timeout; after the retry budget is
    /// spent the whole call fails with [`SyncError::ConnectFailed`].
    pub async fn connect(
        host: &str,
        reliable_port: u16,
        lossy_port: u16,
        player: Player,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let mut stream = None;
        for attempt in 1..=CONNECT_RETRIES {
            match timeout(
                Duration::from_millis(CONNECT_TIMEOUT_MILLIS),
                TcpStream::connect((host, reliable_port)),
            )
            .await
            {
                Ok(Ok(s)) => {
                    stream = Some(s);
                    break;
                }
                Ok(Err(e)) => warn!("connect attempt {} failed: {}", attempt, e),
                Err(_) => warn!("connect attempt {} timed out", attempt),
            }
        }
        let stream = stream.ok_or(SyncError::ConnectFailed {
            attempts: CONNECT_RETRIES,
        })?;
        info!("connected to {}:{}", host, reliable_port);

        let connected = Arc::new(AtomicBool::new(true));
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Vec<u8>>();

        let (mut read_half, mut write_half) = stream.into_split();

        {
            let connected = Arc::clone(&connected);
            tokio::spawn(async move {
                while let Some(bytes) = outbound_rx.recv().await {
                    if let Err(e) = write_half.write_all(&bytes).await {
                        error!("reliable send failed: {}", e);
                        break;
                    }
                }
                connected.store(false, Ordering::SeqCst);
            });
        }

        {
            let inbound_tx = inbound_tx.clone();
            let connected = Arc::clone(&connected);
            tokio::spawn(async move {
                loop {
                    match read_frame(&mut read_half).await {
                        Ok(message) => {
                            if inbound_tx.send(message).is_err() {
                                break;
                            }
                        }
                        Err(e) => {
                            if e.kind() != std::io::ErrorKind::UnexpectedEof {
                                warn!("reliable receive failed: {}", e);
                            }
                            break;
                        }
                    }
                }
                connected.store(false, Ordering::SeqCst);
            });
        }

        // The lossy socket: bind ephemeral, point it at the server, and
        // announce where snapshots should go.
        let udp = Arc::new(UdpSocket::bind("0.0.0.0:0").await?);
        udp.connect((host, lossy_port)).await?;
        let register = encode_datagram(&Message::RegisterUdp {
            player_id: player.player_id().to_string(),
        })?;
        udp.send(&register).await?;

        {
            let udp = Arc::clone(&udp);
            let inbound_tx = inbound_tx.clone();
            tokio::spawn(async move {
                let mut buffer = [0u8; 8192];
                loop {
                    match udp.recv(&mut buffer).await {
                        Ok(len) => match decode_message(&buffer[..len]) {
                            Ok(message) => {
                                if inbound_tx.send(message).is_err() {
                                    break;
                                }
                            }
                            Err(e) => warn!("undecodable snapshot datagram: {}", e),
                        },
                        Err(e) => {
                            error!("snapshot receive failed: {}", e);
                            break;
                        }
                    }
                }
            });
        }

        let client = Self {
            sync: ClientSync::new(EntityFactory::standard()),
            player,
            outbound_tx,
            inbound_rx,
            connected,
            udp,
            register_datagram: register,
            last_register: Instant::now(),
        };
        client.send_reliable(&Message::Login {
            player: client.player.clone(),
        });
        Ok(client)
    }

    pub fn player(&self) -> &Player {
        &self.player
    }

    pub fn sync(&self) -> &ClientSync {
        &self.sync
    }

    pub fn sync_mut(&mut self) -> &mut ClientSync {
        &mut self.sync
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Queues a message on the reliable channel, fire and forget.
    pub fn send_reliable(&self, message: &Message) {
        let frame = match encode_frame(message) {
            Ok(frame) => frame,
            Err(e) => {
                error!("failed to encode frame: {}", e);
                return;
            }
        };
        if self.outbound_tx.send(frame).is_err() {
            warn!("reliable channel is gone, message dropped");
        }
    }

    /// Drains everything the receive tasks queued, then advances the local
    /// view one frame.
    pub fn tick(&mut self, dt: f32) {
        while let Ok(message) = self.inbound_rx.try_recv() {
            self.sync.handle_message(message);
        }

        // Until the first snapshot proves the server knows where to send
        // them, keep re-announcing the snapshot address: the one-shot
        // registration datagram may have been lost.
        if self.sync.last_snapshot_time() == 0
            && self.last_register.elapsed() >= Duration::from_millis(REGISTER_RESEND_MILLIS)
        {
            let _ = self.udp.try_send(&self.register_datagram);
            self.last_register = Instant::now();
        }

        self.sync.tick(dt);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    /// Stands in for the server: accepts the reliable connection and holds
    /// it open without answering anything.
    async fn silent_reliable_endpoint() -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(30)).await;
            drop(stream);
        });
        port
    }

    #[test]
    fn test_registration_repeats_until_first_snapshot() {
        tokio_test::block_on(async {
            let tcp_port = silent_reliable_endpoint().await;
            let udp = UdpSocket::bind("127.0.0.1:0").await.unwrap();
            let udp_port = udp.local_addr().unwrap().port();

            let mut client = GameClient::connect(
                "127.0.0.1",
                tcp_port,
                udp_port,
                Player::with_id("pilot", "P1"),
            )
            .await
            .unwrap();

            let mut buf = [0u8; 1024];
            let (len, client_addr) = udp.recv_from(&mut buf).await.unwrap();
            match decode_message(&buf[..len]).unwrap() {
                Message::RegisterUdp { player_id } => assert_eq!(player_id, "P1"),
                other => panic!("expected registration, got {:?}", other),
            }

            // The registration went unanswered; a frame past the resend
            // window announces again.
            tokio::time::sleep(Duration::from_millis(REGISTER_RESEND_MILLIS + 100)).await;
            client.tick(0.016);
            let (len, _) = udp.recv_from(&mut buf).await.unwrap();
            assert!(matches!(
                decode_message(&buf[..len]).unwrap(),
                Message::RegisterUdp { .. }
            ));

            // A snapshot ends the re-announcement.
            let snapshot = encode_datagram(&Message::Snapshot {
                timestamp: 1,
                updates: std::collections::HashMap::new(),
            })
            .unwrap();
            udp.send_to(&snapshot, client_addr).await.unwrap();
            tokio::time::sleep(Duration::from_millis(50)).await;
            client.tick(0.016);
            assert_eq!(client.sync().last_snapshot_time(), 1);

            tokio::time::sleep(Duration::from_millis(REGISTER_RESEND_MILLIS + 100)).await;
            client.tick(0.016);
            assert!(
                udp.try_recv_from(&mut buf).is_err(),
                "no further registration once a snapshot has arrived"
            );
        });
    }
}
