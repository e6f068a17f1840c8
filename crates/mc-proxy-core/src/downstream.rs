//! Connections from the proxy to the real server.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use mc_proxy_net::{ChannelEvent, PacketChannel};
use mc_proxy_proto::{GameProfile, Packet};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::error::ProxyError;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Receives the traffic of one downstream connection.
///
/// Called from the connection's own task, concurrently with the client side.
pub trait DownstreamListener: Send + Sync {
    fn packet_received(&self, packet: Packet);
    fn packet_sent(&self, packet: Packet);
    fn disconnected(&self, reason: String);
}

/// Opens logged-in connections to the real server.
pub trait DownstreamConnector: Send + Sync {
    /// Connect and log in as `username`. Resolves once the server accepted the
    /// login; events from then on go to `listener`.
    fn connect<'a>(
        &'a self,
        username: &'a str,
        listener: Arc<dyn DownstreamListener>,
    ) -> BoxFuture<'a, Result<DownstreamConnection, ProxyError>>;
}

/// An established connection to the real server.
#[derive(Debug, Clone)]
pub struct DownstreamConnection {
    channel: PacketChannel,
    profile: GameProfile,
}

impl DownstreamConnection {
    pub fn new(channel: PacketChannel, profile: GameProfile) -> Self {
        Self { channel, profile }
    }

    /// Profile the server assigned at login.
    pub fn profile(&self) -> &GameProfile {
        &self.profile
    }

    pub fn channel(&self) -> &PacketChannel {
        &self.channel
    }

    pub fn send(&self, packet: Packet) {
        self.channel.send(packet);
    }

    pub fn disconnect(&self, reason: &str) {
        self.channel.disconnect(reason);
    }

    pub fn is_connected(&self) -> bool {
        self.channel.is_connected()
    }

    pub async fn closed(&self) {
        self.channel.closed().await;
    }
}

/// Feed channel events to a listener until the channel closes.
pub async fn pump_events(
    mut events: mpsc::UnboundedReceiver<ChannelEvent>,
    listener: Arc<dyn DownstreamListener>,
) {
    while let Some(event) = events.recv().await {
        match event {
            ChannelEvent::PacketReceived(packet) => listener.packet_received(packet),
            ChannelEvent::PacketSent(packet) => listener.packet_sent(packet),
            ChannelEvent::Disconnected { reason } => {
                listener.disconnected(reason);
                break;
            }
            ChannelEvent::Error(e) => warn!("Downstream error: {e}"),
            ChannelEvent::Connected => debug!("Downstream reader started"),
        }
    }
}

/// Connects over TCP to a fixed `host:port`.
#[derive(Debug, Clone)]
pub struct TcpDownstreamConnector {
    address: String,
}

impl TcpDownstreamConnector {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }
}

impl DownstreamConnector for TcpDownstreamConnector {
    fn connect<'a>(
        &'a self,
        username: &'a str,
        listener: Arc<dyn DownstreamListener>,
    ) -> BoxFuture<'a, Result<DownstreamConnection, ProxyError>> {
        Box::pin(async move {
            let login = mc_proxy_net::connect(&self.address, username)
                .await
                .map_err(|source| ProxyError::Connect {
                    address: self.address.clone(),
                    source,
                })?;
            tokio::spawn(pump_events(login.events, listener));
            Ok(DownstreamConnection::new(login.channel, login.profile))
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use mc_proxy_net::{HollowServer, HollowServerConfig, ServerEvent};
    use mc_proxy_proto::packets::SystemChat;
    use tokio::sync::{oneshot, watch};

    use super::*;

    #[derive(Default)]
    struct Recorder {
        received: Mutex<Vec<Packet>>,
        disconnected: Mutex<Option<oneshot::Sender<String>>>,
    }

    impl DownstreamListener for Recorder {
        fn packet_received(&self, packet: Packet) {
            self.received.lock().unwrap().push(packet);
        }

        fn packet_sent(&self, _packet: Packet) {}

        fn disconnected(&self, reason: String) {
            if let Some(tx) = self.disconnected.lock().unwrap().take() {
                let _ = tx.send(reason);
            }
        }
    }

    #[tokio::test]
    async fn connects_and_reports_traffic() {
        let config = HollowServerConfig::new("127.0.0.1:0".parse().unwrap());
        let (server, mut events) = HollowServer::bind(config).await.unwrap();
        let address = server.local_addr().unwrap().to_string();
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        tokio::spawn(server.run(shutdown_rx));
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                if let ServerEvent::SessionAdded(mut incoming) = event {
                    incoming.channel.start_reading();
                    while let Some(event) = incoming.events.recv().await {
                        if let ChannelEvent::PacketSent(Packet::LoginSuccess(_)) = event {
                            break;
                        }
                    }
                    incoming.channel.send(Packet::SystemChat(SystemChat::text("welcome")));
                    incoming.channel.disconnect("done");
                    incoming.channel.closed().await;
                }
            }
        });

        let (tx, rx) = oneshot::channel();
        let recorder = Arc::new(Recorder {
            received: Mutex::new(Vec::new()),
            disconnected: Mutex::new(Some(tx)),
        });
        let connector = TcpDownstreamConnector::new(address.clone());
        assert_eq!(connector.address(), address);
        let connection = connector.connect("Steve", recorder.clone()).await.unwrap();
        assert_eq!(connection.profile().name, "Steve");

        let reason = tokio::time::timeout(Duration::from_secs(5), rx)
            .await
            .expect("no disconnect")
            .unwrap();
        assert_eq!(reason, "done");
        assert!(recorder
            .received
            .lock()
            .unwrap()
            .iter()
            .any(|p| matches!(p, Packet::SystemChat(chat) if chat.content.contains("welcome"))));
        assert!(!connection.is_connected());
    }

    #[tokio::test]
    async fn refused_connection_is_a_connect_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let address = listener.local_addr().unwrap().to_string();
        drop(listener);

        let connector = TcpDownstreamConnector::new(address);
        let result = connector
            .connect("Steve", Arc::new(Recorder::default()))
            .await;
        assert!(matches!(result, Err(ProxyError::Connect { .. })));
    }
}
