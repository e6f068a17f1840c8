//! A packet channel: one connection, a reader task and a writer task.
//!
//! The handle is cheap to clone. Sends are queued to the writer task and never
//! block; everything that happens on the connection is reported on the event
//! receiver returned by [`PacketChannel::spawn`].

use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::{Arc, Mutex, OnceLock};

use bytes::{BufMut, Bytes, BytesMut};
use mc_proxy_proto::codec::{ProtoDecode, ProtoEncode};
use mc_proxy_proto::frame::{decode_payload, encode_frame, split_frame};
use mc_proxy_proto::packets::chat::plain_text;
use mc_proxy_proto::packets::{
    Disconnect, KeepAlive, LoginDisconnect, LoginSuccess, SetCompression, StatusResponse,
};
use mc_proxy_proto::types::VarInt;
use mc_proxy_proto::{GameProfile, Packet, PacketDirection, ProtocolPhase};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, watch, Notify};
use tracing::{debug, trace};

use crate::error::NetError;

/// Initial capacity of the read buffer.
const READ_BUF_SIZE: usize = 16 * 1024;

/// Which end of the connection this process plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelRole {
    /// Accepted connection; we act as the server.
    Server,
    /// Outbound connection; we act as the client.
    Client,
}

impl ChannelRole {
    /// Direction of packets read from the peer.
    pub fn inbound(self) -> PacketDirection {
        match self {
            Self::Server => PacketDirection::Serverbound,
            Self::Client => PacketDirection::Clientbound,
        }
    }
}

/// Events emitted by a channel to its consumer.
#[derive(Debug, Clone)]
pub enum ChannelEvent {
    /// The reader started.
    Connected,
    /// A packet arrived from the peer.
    PacketReceived(Packet),
    /// A packet was fully written to the peer.
    PacketSent(Packet),
    /// The connection is gone. Emitted exactly once.
    Disconnected { reason: String },
    /// A non-fatal or fatal fault; fatal ones are followed by `Disconnected`.
    Error(String),
}

/// Verdict of a [`SendFilter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendDecision {
    Proceed,
    Cancel,
}

/// Sees every packet right before it is written and may cancel it.
///
/// Runs on the writer task. Implementations may call [`PacketChannel::send`]
/// and [`PacketChannel::disconnect`]; those are queued behind the current packet.
pub trait SendFilter: Send + Sync {
    fn packet_sending(&self, channel: &PacketChannel, packet: &Packet) -> SendDecision;
}

/// Settings for the automatic parts of the protocol.
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    /// Threshold announced to clients during login (server role). `None` disables compression.
    pub compression_threshold: Option<i32>,
    /// Server list JSON answered to status requests (server role).
    pub status_json: String,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            compression_threshold: None,
            status_json: StatusResponse::describe(
                mc_proxy_proto::GAME_VERSION,
                mc_proxy_proto::PROTOCOL_VERSION,
                "",
                0,
                0,
            )
            .json,
        }
    }
}

enum Outbound {
    Packet(Packet),
    Close(String),
}

/// What the reader does after handing a packet to the consumer.
enum Reaction {
    Continue,
    AwaitLoginComplete,
    Close(String),
}

struct Shared {
    role: ChannelRole,
    remote_addr: SocketAddr,
    config: ChannelConfig,
    phase: watch::Sender<ProtocolPhase>,
    connected: AtomicBool,
    /// Negative while compression is off.
    compression: AtomicI32,
    outbound: mpsc::UnboundedSender<Outbound>,
    events: mpsc::UnboundedSender<ChannelEvent>,
    send_filter: OnceLock<Arc<dyn SendFilter>>,
    start: Notify,
    closed: watch::Sender<bool>,
    disconnect_reason: Mutex<Option<String>>,
}

impl Shared {
    fn emit(&self, event: ChannelEvent) {
        let _ = self.events.send(event);
    }
}

/// Handle to one connection.
#[derive(Clone)]
pub struct PacketChannel {
    shared: Arc<Shared>,
}

impl PacketChannel {
    /// Start the reader and writer tasks over the given stream halves.
    ///
    /// The reader stays idle until [`start_reading`](Self::start_reading) is
    /// called, so the consumer can install a send filter first.
    pub fn spawn<R, W>(
        reader: R,
        writer: W,
        role: ChannelRole,
        remote_addr: SocketAddr,
        config: ChannelConfig,
    ) -> (Self, mpsc::UnboundedReceiver<ChannelEvent>)
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        // Unbounded: consumers send on other channels while handling events.
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let initial_phase = match role {
            ChannelRole::Server => ProtocolPhase::Handshake,
            ChannelRole::Client => ProtocolPhase::Login,
        };

        let channel = Self {
            shared: Arc::new(Shared {
                role,
                remote_addr,
                config,
                phase: watch::channel(initial_phase).0,
                connected: AtomicBool::new(true),
                compression: AtomicI32::new(-1),
                outbound: outbound_tx,
                events: event_tx,
                send_filter: OnceLock::new(),
                start: Notify::new(),
                closed: watch::channel(false).0,
                disconnect_reason: Mutex::new(None),
            }),
        };

        tokio::spawn(read_loop(channel.clone(), reader));
        tokio::spawn(write_loop(channel.clone(), writer, outbound_rx));

        (channel, event_rx)
    }

    pub fn role(&self) -> ChannelRole {
        self.shared.role
    }

    pub fn remote_addr(&self) -> SocketAddr {
        self.shared.remote_addr
    }

    /// Current protocol phase.
    pub fn phase(&self) -> ProtocolPhase {
        *self.shared.phase.borrow()
    }

    pub fn is_connected(&self) -> bool {
        self.shared.connected.load(Ordering::Acquire)
    }

    /// Reason recorded when the channel closed.
    pub fn disconnect_reason(&self) -> Option<String> {
        self.shared
            .disconnect_reason
            .lock()
            .ok()
            .and_then(|reason| reason.clone())
    }

    /// Whether two handles refer to the same connection.
    pub fn same_channel(&self, other: &PacketChannel) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }

    /// Install the packet-about-to-send hook. Only the first call wins.
    pub fn set_send_filter(&self, filter: Arc<dyn SendFilter>) -> bool {
        self.shared.send_filter.set(filter).is_ok()
    }

    /// Let the reader task begin consuming input.
    pub fn start_reading(&self) {
        self.shared.start.notify_one();
    }

    /// Queue a packet. Dropped silently once the channel is closed.
    pub fn send(&self, packet: Packet) {
        if !self.is_connected() {
            trace!("Dropping {} to closed channel {}", packet.name(), self.remote_addr());
            return;
        }
        let _ = self.shared.outbound.send(Outbound::Packet(packet));
    }

    /// Close the connection once everything queued before this call is written.
    ///
    /// In the server role the peer is first sent the reason as a disconnect packet.
    pub fn disconnect(&self, reason: impl Into<String>) {
        let reason = reason.into();
        if !self.is_connected() {
            return;
        }
        if let Err(mpsc::error::SendError(Outbound::Close(reason))) =
            self.shared.outbound.send(Outbound::Close(reason))
        {
            self.finish(reason);
        }
    }

    /// Resolves once the channel has closed.
    pub async fn closed(&self) {
        let mut closed = self.shared.closed.subscribe();
        let _ = closed.wait_for(|closed| *closed).await;
    }

    // -----------------------------------------------------------------------
    // Internal
    // -----------------------------------------------------------------------

    fn set_phase(&self, phase: ProtocolPhase) {
        let previous = self.shared.phase.send_replace(phase);
        if previous != phase {
            debug!("{} {previous} -> {phase}", self.remote_addr());
        }
    }

    fn finish(&self, reason: String) {
        if self.shared.connected.swap(false, Ordering::AcqRel) {
            debug!("Channel {} closed: {reason}", self.remote_addr());
            if let Ok(mut slot) = self.shared.disconnect_reason.lock() {
                *slot = Some(reason.clone());
            }
            self.shared.closed.send_replace(true);
            self.shared.emit(ChannelEvent::Disconnected { reason });
        }
    }

    fn fail(&self, error: NetError) {
        let message = error.to_string();
        self.shared.emit(ChannelEvent::Error(message.clone()));
        self.finish(message);
    }

    async fn handle_frame(&self, frame: Bytes) -> Result<(), NetError> {
        let compressed = self.shared.compression.load(Ordering::Acquire) >= 0;
        let (packet_id, body) = decode_payload(frame, compressed)?;
        let packet = Packet::decode(self.phase(), self.shared.role.inbound(), packet_id, body)?;
        trace!("{} <- {}", self.remote_addr(), packet.name());

        let reaction = match self.shared.role {
            ChannelRole::Server => self.react_as_server(&packet),
            ChannelRole::Client => self.react_as_client(&packet),
        };
        self.shared.emit(ChannelEvent::PacketReceived(packet));

        match reaction {
            Reaction::Continue => {}
            Reaction::Close(reason) => self.finish(reason),
            Reaction::AwaitLoginComplete => {
                // The client sends nothing until it sees login success; park
                // so nothing is decoded with the login id table.
                let mut phase = self.shared.phase.subscribe();
                let mut closed = self.shared.closed.subscribe();
                tokio::select! {
                    _ = phase.wait_for(|p| *p != ProtocolPhase::Login) => {}
                    _ = closed.wait_for(|c| *c) => {}
                }
            }
        }
        Ok(())
    }

    fn react_as_server(&self, packet: &Packet) -> Reaction {
        match packet {
            Packet::Handshake(handshake) => {
                self.set_phase(handshake.intent.next_phase());
                Reaction::Continue
            }
            Packet::StatusRequest => {
                self.send(Packet::StatusResponse(StatusResponse {
                    json: self.shared.config.status_json.clone(),
                }));
                Reaction::Continue
            }
            Packet::PingRequest(ping) => {
                self.send(Packet::PongResponse(*ping));
                self.disconnect("status ping answered");
                Reaction::Continue
            }
            Packet::LoginStart(start) => {
                if let Some(threshold) = self.shared.config.compression_threshold {
                    self.send(Packet::SetCompression(SetCompression { threshold }));
                }
                self.send(Packet::LoginSuccess(LoginSuccess {
                    profile: GameProfile::offline(&start.name),
                }));
                Reaction::AwaitLoginComplete
            }
            _ => Reaction::Continue,
        }
    }

    fn react_as_client(&self, packet: &Packet) -> Reaction {
        match packet {
            Packet::SetCompression(compression) => {
                self.shared
                    .compression
                    .store(compression.threshold, Ordering::Release);
                Reaction::Continue
            }
            Packet::LoginSuccess(_) => {
                self.set_phase(ProtocolPhase::Game);
                Reaction::Continue
            }
            Packet::LoginEncryptionRequest(_) => {
                Reaction::Close("online-mode servers are not supported".into())
            }
            Packet::LoginPluginRequest(body) => {
                // Answer "not understood" so the server can continue.
                let mut body = body.clone();
                if let Ok(message_id) = VarInt::proto_decode(&mut body) {
                    let mut answer = BytesMut::new();
                    message_id.proto_encode(&mut answer);
                    answer.put_u8(0);
                    self.send(Packet::LoginPluginResponse(answer.freeze()));
                }
                Reaction::Continue
            }
            Packet::LoginDisconnect(disconnect) => Reaction::Close(plain_text(&disconnect.reason)),
            Packet::Disconnect(disconnect) => Reaction::Close(plain_text(&disconnect.reason)),
            Packet::ClientboundKeepAlive(keep_alive) => {
                self.send(Packet::ServerboundKeepAlive(KeepAlive { id: keep_alive.id }));
                Reaction::Continue
            }
            _ => Reaction::Continue,
        }
    }

    /// Packet telling the peer why we hang up.
    fn disconnect_notice(&self, reason: &str) -> Option<Packet> {
        if self.shared.role != ChannelRole::Server {
            return None;
        }
        match self.phase() {
            ProtocolPhase::Login => Some(Packet::LoginDisconnect(LoginDisconnect::with_message(
                reason,
            ))),
            ProtocolPhase::Game => Some(Packet::Disconnect(Disconnect::with_message(reason))),
            _ => None,
        }
    }

    async fn write_packet<W: AsyncWrite + Unpin>(
        &self,
        writer: &mut W,
        packet: Packet,
    ) -> Result<(), NetError> {
        if let Some(filter) = self.shared.send_filter.get() {
            if filter.packet_sending(self, &packet) == SendDecision::Cancel {
                debug!("Cancelled {} to {}", packet.name(), self.remote_addr());
                return Ok(());
            }
        }

        let threshold = self.shared.compression.load(Ordering::Acquire);
        let threshold = (threshold >= 0).then_some(threshold as usize);
        let frame = encode_frame(packet.id(), &packet.body_bytes(), threshold)?;
        writer.write_all(&frame).await?;
        writer.flush().await?;
        trace!("{} -> {}", self.remote_addr(), packet.name());

        let server = self.shared.role == ChannelRole::Server;
        if let (true, Packet::SetCompression(compression)) = (server, &packet) {
            self.shared
                .compression
                .store(compression.threshold, Ordering::Release);
        }
        let login_complete = server && matches!(packet, Packet::LoginSuccess(_));
        self.shared.emit(ChannelEvent::PacketSent(packet));
        if login_complete {
            self.set_phase(ProtocolPhase::Game);
        }
        Ok(())
    }
}

impl fmt::Debug for PacketChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PacketChannel")
            .field("role", &self.shared.role)
            .field("remote_addr", &self.shared.remote_addr)
            .field("phase", &self.phase())
            .field("connected", &self.is_connected())
            .finish()
    }
}

async fn read_loop<R: AsyncRead + Unpin>(channel: PacketChannel, mut reader: R) {
    let mut closed = channel.shared.closed.subscribe();
    tokio::select! {
        _ = channel.shared.start.notified() => {}
        _ = closed.wait_for(|c| *c) => return,
    }
    channel.shared.emit(ChannelEvent::Connected);

    let mut buf = BytesMut::with_capacity(READ_BUF_SIZE);
    loop {
        loop {
            let frame = match split_frame(&mut buf) {
                Ok(Some(frame)) => frame,
                Ok(None) => break,
                Err(e) => return channel.fail(e.into()),
            };
            if let Err(e) = channel.handle_frame(frame).await {
                return channel.fail(e);
            }
            if !channel.is_connected() {
                return;
            }
        }

        let read = tokio::select! {
            read = reader.read_buf(&mut buf) => read,
            _ = closed.wait_for(|c| *c) => return,
        };
        match read {
            Ok(0) => return channel.finish("connection closed by peer".into()),
            Ok(_) => {}
            Err(e) => return channel.finish(format!("read failed: {e}")),
        }
    }
}

async fn write_loop<W: AsyncWrite + Unpin>(
    channel: PacketChannel,
    mut writer: W,
    mut outbound: mpsc::UnboundedReceiver<Outbound>,
) {
    let mut closed = channel.shared.closed.subscribe();
    loop {
        let next = tokio::select! {
            next = outbound.recv() => next,
            _ = closed.wait_for(|c| *c) => None,
        };
        match next {
            Some(Outbound::Packet(packet)) => {
                if let Err(e) = channel.write_packet(&mut writer, packet).await {
                    channel.fail(e);
                    break;
                }
            }
            Some(Outbound::Close(reason)) => {
                if let Some(notice) = channel.disconnect_notice(&reason) {
                    if let Err(e) = channel.write_packet(&mut writer, notice).await {
                        debug!("Disconnect notice to {} failed: {e}", channel.remote_addr());
                    }
                }
                let _ = writer.shutdown().await;
                channel.finish(reason);
                break;
            }
            None => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use mc_proxy_proto::packets::{Handshake, HandshakeIntent, LoginStart};
    use tokio::time::timeout;

    use super::*;

    type Events = mpsc::UnboundedReceiver<ChannelEvent>;

    fn pair(config: ChannelConfig) -> ((PacketChannel, Events), (PacketChannel, Events)) {
        let (a, b) = tokio::io::duplex(64 * 1024);
        let (a_read, a_write) = tokio::io::split(a);
        let (b_read, b_write) = tokio::io::split(b);
        let addr: SocketAddr = "127.0.0.1:25565".parse().unwrap();
        let server = PacketChannel::spawn(a_read, a_write, ChannelRole::Server, addr, config);
        let client = PacketChannel::spawn(
            b_read,
            b_write,
            ChannelRole::Client,
            addr,
            ChannelConfig::default(),
        );
        (server, client)
    }

    async fn next_event(events: &mut Events) -> ChannelEvent {
        timeout(Duration::from_secs(5), events.recv())
            .await
            .expect("timed out waiting for event")
            .expect("event stream ended")
    }

    async fn received(events: &mut Events, name: &str) -> Packet {
        loop {
            if let ChannelEvent::PacketReceived(packet) = next_event(events).await {
                if packet.name() == name {
                    return packet;
                }
            }
        }
    }

    async fn disconnected(events: &mut Events) -> String {
        loop {
            if let ChannelEvent::Disconnected { reason } = next_event(events).await {
                return reason;
            }
        }
    }

    fn login(client: &PacketChannel, name: &str) {
        client.send(Packet::Handshake(Handshake {
            protocol_version: mc_proxy_proto::PROTOCOL_VERSION,
            server_address: "localhost".into(),
            server_port: 25565,
            intent: HandshakeIntent::Login,
        }));
        client.send(Packet::LoginStart(LoginStart {
            name: name.into(),
            profile_id: None,
        }));
    }

    #[tokio::test]
    async fn offline_login_with_compression() {
        let config = ChannelConfig {
            compression_threshold: Some(64),
            ..ChannelConfig::default()
        };
        let ((server, mut server_events), (client, mut client_events)) = pair(config);
        server.start_reading();
        client.start_reading();
        login(&client, "Steve");

        match received(&mut client_events, "LoginSuccess").await {
            Packet::LoginSuccess(success) => assert_eq!(success.profile.name, "Steve"),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(client.phase(), ProtocolPhase::Game);

        // The client answers keep-alives on its own.
        server.send(Packet::ClientboundKeepAlive(KeepAlive { id: 7 }));
        match received(&mut server_events, "ServerboundKeepAlive").await {
            Packet::ServerboundKeepAlive(keep_alive) => assert_eq!(keep_alive.id, 7),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(server.phase(), ProtocolPhase::Game);
    }

    struct RefuseLogin;

    impl SendFilter for RefuseLogin {
        fn packet_sending(&self, channel: &PacketChannel, packet: &Packet) -> SendDecision {
            if matches!(packet, Packet::LoginSuccess(_)) {
                channel.disconnect("go away");
                return SendDecision::Cancel;
            }
            SendDecision::Proceed
        }
    }

    #[tokio::test]
    async fn send_filter_can_refuse_login() {
        let ((server, mut server_events), (client, mut client_events)) =
            pair(ChannelConfig::default());
        assert!(server.set_send_filter(Arc::new(RefuseLogin)));
        assert!(!server.set_send_filter(Arc::new(RefuseLogin)));
        server.start_reading();
        client.start_reading();
        login(&client, "Alex");

        assert_eq!(disconnected(&mut client_events).await, "go away");
        assert_eq!(disconnected(&mut server_events).await, "go away");
        assert!(!server.is_connected());
        assert_eq!(server.disconnect_reason().as_deref(), Some("go away"));
        assert_eq!(client.phase(), ProtocolPhase::Login);
    }

    #[tokio::test]
    async fn game_disconnect_reaches_the_client() {
        let ((server, _server_events), (client, mut client_events)) =
            pair(ChannelConfig::default());
        server.start_reading();
        client.start_reading();
        login(&client, "Steve");
        received(&mut client_events, "LoginSuccess").await;

        server.disconnect("server closing");
        assert_eq!(disconnected(&mut client_events).await, "server closing");
        timeout(Duration::from_secs(5), server.closed())
            .await
            .expect("server side never closed");

        // Closed channels swallow sends.
        server.send(Packet::ClientboundKeepAlive(KeepAlive { id: 1 }));
        assert!(!client.is_connected());
    }

    #[tokio::test]
    async fn reader_waits_for_start() {
        let ((_server, mut server_events), (client, _client_events)) =
            pair(ChannelConfig::default());
        client.start_reading();
        login(&client, "Steve");
        assert!(timeout(Duration::from_millis(100), server_events.recv())
            .await
            .is_err());
    }
}
