//! The hollow server: accepts Minecraft clients, answers status pings and
//! completes an offline login, then hands each connection to the consumer.
//!
//! It has no world of its own. Once a session is in the game phase the only
//! thing it does unprompted is send keep-alives.

use std::net::SocketAddr;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use mc_proxy_proto::packets::{KeepAlive, StatusResponse};
use mc_proxy_proto::{Packet, ProtocolPhase, GAME_VERSION, PROTOCOL_VERSION};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::channel::{ChannelConfig, ChannelEvent, ChannelRole, PacketChannel};
use crate::error::NetError;

/// Events emitted by the hollow server to the consumer.
#[derive(Debug)]
pub enum ServerEvent {
    /// A client connected. Its reader is idle until `start_reading` is called.
    SessionAdded(IncomingSession),
    /// A client connection closed.
    SessionRemoved {
        channel: PacketChannel,
        reason: String,
    },
}

/// A freshly accepted client connection.
#[derive(Debug)]
pub struct IncomingSession {
    pub channel: PacketChannel,
    pub events: mpsc::UnboundedReceiver<ChannelEvent>,
}

/// Configuration for the hollow server.
#[derive(Debug, Clone)]
pub struct HollowServerConfig {
    pub address: SocketAddr,
    /// Announced to clients during login. `None` leaves compression off.
    pub compression_threshold: Option<i32>,
    pub keep_alive_interval: Duration,
    pub motd: String,
    pub max_players: u32,
}

impl HollowServerConfig {
    pub fn new(address: SocketAddr) -> Self {
        Self {
            address,
            compression_threshold: Some(100),
            keep_alive_interval: Duration::from_secs(15),
            motd: "A Minecraft proxy".into(),
            max_players: 20,
        }
    }
}

/// TCP listener plus the per-connection tasks it spawns.
pub struct HollowServer {
    listener: TcpListener,
    config: HollowServerConfig,
    event_tx: mpsc::Sender<ServerEvent>,
}

impl HollowServer {
    /// Bind the listener. Returns the server and the event receiver for the consumer.
    pub async fn bind(
        config: HollowServerConfig,
    ) -> Result<(Self, mpsc::Receiver<ServerEvent>), NetError> {
        let listener = TcpListener::bind(config.address).await?;
        let (event_tx, event_rx) = mpsc::channel(256);

        info!("Listening for Minecraft clients on {}", listener.local_addr()?);

        Ok((
            Self {
                listener,
                config,
                event_tx,
            },
            event_rx,
        ))
    }

    /// Address actually bound, useful when binding port 0.
    pub fn local_addr(&self) -> Result<SocketAddr, NetError> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept clients until the shutdown signal is received.
    ///
    /// Connections already handed out stay open; closing them is up to the consumer.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        loop {
            tokio::select! {
                accepted = self.listener.accept() => {
                    match accepted {
                        Ok((stream, addr)) => self.accept(stream, addr),
                        Err(e) => warn!("Accept failed: {e}"),
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        info!("Listener on {} stopped", self.config.address);
    }

    fn accept(&self, stream: TcpStream, addr: SocketAddr) {
        debug!("Accepted connection from {addr}");
        if let Err(e) = stream.set_nodelay(true) {
            debug!("set_nodelay failed for {addr}: {e}");
        }
        let (reader, writer) = stream.into_split();
        let (channel, events) =
            PacketChannel::spawn(reader, writer, ChannelRole::Server, addr, self.channel_config());
        tokio::spawn(keep_alive_loop(
            channel.clone(),
            self.config.keep_alive_interval,
        ));
        tokio::spawn(watch_session(
            channel,
            events,
            self.event_tx.clone(),
        ));
    }

    fn channel_config(&self) -> ChannelConfig {
        ChannelConfig {
            compression_threshold: self.config.compression_threshold,
            status_json: StatusResponse::describe(
                GAME_VERSION,
                PROTOCOL_VERSION,
                &self.config.motd,
                0,
                self.config.max_players,
            )
            .json,
        }
    }
}

/// Announce the session, then report its removal once the channel closes.
async fn watch_session(
    channel: PacketChannel,
    events: mpsc::UnboundedReceiver<ChannelEvent>,
    event_tx: mpsc::Sender<ServerEvent>,
) {
    let added = IncomingSession {
        channel: channel.clone(),
        events,
    };
    if event_tx.send(ServerEvent::SessionAdded(added)).await.is_err() {
        channel.disconnect("server shutting down");
        return;
    }

    channel.closed().await;
    let reason = channel
        .disconnect_reason()
        .unwrap_or_else(|| "connection closed".into());
    debug!("Session {} removed: {reason}", channel.remote_addr());
    let _ = event_tx
        .send(ServerEvent::SessionRemoved { channel, reason })
        .await;
}

async fn keep_alive_loop(channel: PacketChannel, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    ticker.tick().await;
    let closed = channel.closed();
    tokio::pin!(closed);

    loop {
        tokio::select! {
            _ = &mut closed => break,
            _ = ticker.tick() => {
                if channel.phase() == ProtocolPhase::Game {
                    channel.send(Packet::ClientboundKeepAlive(KeepAlive { id: now_millis() }));
                }
            }
        }
    }
}

fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as i64)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::connect;

    async fn start(
        keep_alive_interval: Duration,
    ) -> (SocketAddr, mpsc::Receiver<ServerEvent>, watch::Sender<bool>) {
        let mut config = HollowServerConfig::new("127.0.0.1:0".parse().unwrap());
        config.keep_alive_interval = keep_alive_interval;
        let (server, events) = HollowServer::bind(config).await.unwrap();
        let addr = server.local_addr().unwrap();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        tokio::spawn(server.run(shutdown_rx));
        (addr, events, shutdown_tx)
    }

    async fn next(events: &mut mpsc::Receiver<ServerEvent>) -> ServerEvent {
        tokio::time::timeout(Duration::from_secs(5), events.recv())
            .await
            .expect("timed out")
            .expect("server gone")
    }

    #[tokio::test]
    async fn client_logs_in_and_removal_is_reported() {
        let (addr, mut events, _shutdown) = start(Duration::from_secs(15)).await;
        let login = tokio::spawn(async move { connect(&addr.to_string(), "Steve").await });

        let incoming = match next(&mut events).await {
            ServerEvent::SessionAdded(incoming) => incoming,
            other => panic!("unexpected {other:?}"),
        };
        incoming.channel.start_reading();

        let downstream = login.await.unwrap().unwrap();
        assert_eq!(downstream.profile.name, "Steve");
        assert_eq!(downstream.channel.phase(), ProtocolPhase::Game);

        downstream.channel.disconnect("bye");
        match next(&mut events).await {
            ServerEvent::SessionRemoved { channel, .. } => {
                assert!(channel.same_channel(&incoming.channel));
                assert!(!channel.is_connected());
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn game_phase_sessions_get_keep_alives() {
        let (addr, mut events, _shutdown) = start(Duration::from_millis(50)).await;
        let login = tokio::spawn(async move { connect(&addr.to_string(), "Alex").await });
        if let ServerEvent::SessionAdded(incoming) = next(&mut events).await {
            incoming.channel.start_reading();
            let mut server_side = incoming.events;
            let _downstream = login.await.unwrap().unwrap();

            // The client answers on its own.
            let echoed = tokio::time::timeout(Duration::from_secs(5), async {
                while let Some(event) = server_side.recv().await {
                    if let ChannelEvent::PacketReceived(Packet::ServerboundKeepAlive(_)) = event {
                        return true;
                    }
                }
                false
            })
            .await
            .expect("no keep-alive answer");
            assert!(echoed);
        } else {
            panic!("expected a new session");
        }
    }

    #[tokio::test]
    async fn shutdown_stops_accepting() {
        let config = HollowServerConfig::new("127.0.0.1:0".parse().unwrap());
        let (server, _events) = HollowServer::bind(config).await.unwrap();
        let addr = server.local_addr().unwrap();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let accept = tokio::spawn(server.run(shutdown_rx));

        shutdown_tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(5), accept)
            .await
            .expect("accept loop did not stop")
            .unwrap();
        assert!(TcpStream::connect(addr).await.is_err());
    }
}
