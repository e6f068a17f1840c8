//! One client session: the client channel, its interceptor chain and, once the
//! client is logged in, the paired connection to the real server.
//!
//! ```text
//!   LOGIN ──login success sent──▶ GAME
//!     │                            │
//!     └──────── disconnect ────────┴──▶ SHUTDOWN
//! ```
//!
//! The client side runs on the session task, the server side on the
//! downstream connection's task. They share only the [`SessionLink`].

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use mc_proxy_api::{
    DirectPacketControl, DirectPacketSink, InterceptorRegistry, PacketControl, PacketInterceptor,
    PacketOutcome, SessionInterceptorRegistry, SessionLoginInterceptor,
};
use mc_proxy_net::{ChannelEvent, PacketChannel, SendDecision, SendFilter};
use mc_proxy_proto::{Packet, ProtocolPhase};
use tokio::sync::mpsc;
use tracing::{debug, error, info, trace, warn};

use crate::downstream::{DownstreamConnection, DownstreamConnector, DownstreamListener};

/// Where a session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Login,
    Game,
    Shutdown,
}

/// Proxy-wide collaborators shared by every session.
pub struct SessionServices {
    pub connector: Arc<dyn DownstreamConnector>,
    pub session_interceptors: Arc<SessionInterceptorRegistry>,
    pub login_interceptors: Arc<InterceptorRegistry<dyn SessionLoginInterceptor>>,
}

/// Downstream connection and shutdown flag, only ever changed together.
#[derive(Default)]
struct SessionLink {
    downstream: Option<Arc<DownstreamConnection>>,
    shutdown: bool,
}

type SharedLink = Arc<Mutex<SessionLink>>;

fn lock(link: &Mutex<SessionLink>) -> MutexGuard<'_, SessionLink> {
    link.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Clone, Copy)]
enum Source {
    Client,
    Server,
}

pub struct ProxySession {
    client: PacketChannel,
    interceptors: Vec<Arc<dyn PacketInterceptor>>,
    services: Arc<SessionServices>,
    link: SharedLink,
    direct: DirectPacketControl,
}

impl ProxySession {
    /// Create the session and notify `interceptors` they are installed.
    ///
    /// Nothing is read from the client until [`start`](Self::start).
    pub fn new(
        client: PacketChannel,
        interceptors: Vec<Arc<dyn PacketInterceptor>>,
        services: Arc<SessionServices>,
    ) -> Arc<Self> {
        let link = SharedLink::default();
        let direct = DirectPacketControl::new(Arc::new(SessionPacketSender {
            client: client.clone(),
            link: Arc::clone(&link),
        }));
        let session = Arc::new(Self {
            client,
            interceptors,
            services,
            link,
            direct,
        });
        for interceptor in &session.interceptors {
            interceptor.on_interceptor_installed(&session.client);
        }
        session
    }

    /// Wire the client channel to this session and start reading from it.
    pub fn start(self: &Arc<Self>, events: mpsc::UnboundedReceiver<ChannelEvent>) {
        self.client.set_send_filter(Arc::new(LoginGate {
            session: Arc::downgrade(self),
        }));
        tokio::spawn(Arc::clone(self).run(events));
        self.client.start_reading();
    }

    pub fn client(&self) -> &PacketChannel {
        &self.client
    }

    pub fn interceptors(&self) -> &[Arc<dyn PacketInterceptor>] {
        &self.interceptors
    }

    /// Handle for sending to either side outside of a packet event.
    pub fn direct_control(&self) -> DirectPacketControl {
        self.direct.clone()
    }

    pub fn downstream(&self) -> Option<Arc<DownstreamConnection>> {
        lock(&self.link).downstream.clone()
    }

    pub fn state(&self) -> SessionState {
        if lock(&self.link).shutdown {
            SessionState::Shutdown
        } else if self.client.phase() == ProtocolPhase::Game {
            SessionState::Game
        } else {
            SessionState::Login
        }
    }

    /// Tear the session down. Safe to call any number of times, from any task.
    pub fn shutdown(&self, reason: &str) {
        self.release(reason);
    }

    /// Like [`shutdown`](Self::shutdown), then wait until the downstream
    /// connection released by this call has closed.
    pub async fn shutdown_gracefully(&self, reason: &str) {
        if let Some(downstream) = self.release(reason) {
            downstream.closed().await;
        }
    }

    fn release(&self, reason: &str) -> Option<Arc<DownstreamConnection>> {
        let reason = if reason.is_empty() { "shutting down" } else { reason };
        let (first, downstream) = {
            let mut link = lock(&self.link);
            let first = !link.shutdown;
            link.shutdown = true;
            (first, link.downstream.take())
        };

        if let Some(downstream) = &downstream {
            downstream.disconnect(reason);
        }
        if self.client.is_connected() {
            self.client.disconnect(reason);
        }
        if first {
            info!("Session {} shut down: {reason}", self.client.remote_addr());
            for interceptor in &self.interceptors {
                interceptor.on_interceptor_removed(&self.client);
            }
        }
        downstream
    }

    fn is_shutdown(&self) -> bool {
        lock(&self.link).shutdown
    }

    // -----------------------------------------------------------------------
    // Client side
    // -----------------------------------------------------------------------

    async fn run(self: Arc<Self>, mut events: mpsc::UnboundedReceiver<ChannelEvent>) {
        let addr = self.client.remote_addr();
        while let Some(event) = events.recv().await {
            match event {
                ChannelEvent::Connected => debug!("Client session {addr} connected"),
                ChannelEvent::PacketReceived(packet) => self.handle_packet_from_client(packet),
                ChannelEvent::PacketSent(packet) => self.handle_packet_sent_to_client(packet).await,
                ChannelEvent::Error(e) => warn!("Client session {addr} error: {e}"),
                ChannelEvent::Disconnected { reason } => {
                    info!("Client session {addr} disconnected: {reason}");
                    self.shutdown("proxy client session disconnected");
                    break;
                }
            }
        }
    }

    fn handle_packet_from_client(&self, packet: Packet) {
        trace!("Client packet {}", packet.name());
        if !self.should_forward_from_client(&packet) {
            return;
        }
        let outcome = self.apply_interceptors(&packet, Source::Client);
        self.deliver(outcome, packet, Source::Client);
    }

    async fn handle_packet_sent_to_client(self: &Arc<Self>, packet: Packet) {
        if self.is_shutdown() {
            debug!("Packet sent after shutdown, race-condition?");
            return;
        }
        if let Packet::LoginSuccess(login) = &packet {
            self.connect_downstream(&login.profile.name).await;
        }
        if self.should_forward_from_server(&packet) {
            for interceptor in &self.interceptors {
                interceptor.on_packet_sent_to_client(&packet);
            }
        }
    }

    /// Runs once the client has been sent login success.
    async fn connect_downstream(self: &Arc<Self>, username: &str) {
        if self.downstream().is_some() {
            error!("INTERNAL ERROR: login success sent while a downstream connection is already active");
            return;
        }

        let listener = Arc::new(SessionDownstreamListener {
            session: Arc::downgrade(self),
        });
        let connection = match self.services.connector.connect(username, listener).await {
            Ok(connection) => Arc::new(connection),
            Err(e) => {
                warn!("Downstream connection for {username} failed: {e}");
                self.shutdown(&format!("downstream connection failed: {e}"));
                return;
            }
        };

        let orphaned = {
            let mut link = lock(&self.link);
            if link.shutdown {
                true
            } else {
                link.downstream = Some(Arc::clone(&connection));
                false
            }
        };
        if orphaned {
            debug!("Session for {username} shut down while connecting");
            connection.disconnect("shutdown race");
            return;
        }

        info!("Downstream connected for {username}");
        for interceptor in self.services.session_interceptors.snapshot() {
            interceptor.on_downstream_connected(&self.client, username);
        }
        for interceptor in &self.interceptors {
            if let Some(aware) = interceptor.as_game_profile_aware() {
                aware.inject_game_profile(connection.profile());
            }
        }
    }

    // -----------------------------------------------------------------------
    // Server side
    // -----------------------------------------------------------------------

    fn handle_packet_from_server(&self, packet: Packet) {
        trace!("Server packet {}", packet.name());
        if !self.should_forward_from_server(&packet) {
            return;
        }
        let outcome = self.apply_interceptors(&packet, Source::Server);
        self.deliver(outcome, packet, Source::Server);
    }

    fn handle_packet_sent_to_server(&self, packet: Packet) {
        if self.should_forward_from_client(&packet) {
            for interceptor in &self.interceptors {
                interceptor.on_packet_sent_to_server(&packet);
            }
        }
    }

    fn handle_downstream_disconnect(&self, reason: String) {
        self.shutdown(&format!("downstream disconnected: {reason}"));
    }

    // -----------------------------------------------------------------------
    // Pipeline
    // -----------------------------------------------------------------------

    fn should_forward_from_server(&self, packet: &Packet) -> bool {
        self.client.is_connected()
            && self.state() == SessionState::Game
            && !packet.is_login_phase()
            && !matches!(packet, Packet::ClientboundKeepAlive(_))
    }

    fn should_forward_from_client(&self, packet: &Packet) -> bool {
        self.downstream().is_some()
            && self.state() == SessionState::Game
            && !packet.is_login_phase()
            && !matches!(packet, Packet::ServerboundKeepAlive(_))
    }

    /// Offer the packet to every interceptor. A failing interceptor is logged
    /// and skipped.
    fn apply_interceptors(&self, packet: &Packet, source: Source) -> PacketOutcome {
        let mut control = PacketControl::new(self.direct_control());
        for interceptor in &self.interceptors {
            let result = match source {
                Source::Client => interceptor.on_client_packet_received(packet, &mut control),
                Source::Server => interceptor.on_server_packet_received(packet, &mut control),
            };
            if let Err(e) = result {
                warn!("Interceptor failed on {} from {source:?}: {e}", packet.name());
            }
        }
        control.finish()
    }

    fn deliver(&self, outcome: PacketOutcome, packet: Packet, source: Source) {
        for injected in outcome.to_client {
            self.client.send(injected);
        }
        let downstream = self.downstream();
        if !outcome.to_server.is_empty() {
            match &downstream {
                Some(downstream) => {
                    for injected in outcome.to_server {
                        downstream.send(injected);
                    }
                }
                None => warn!(
                    "Dropping {} injected server-bound packet(s); no downstream connection",
                    outcome.to_server.len()
                ),
            }
        }

        if outcome.drop_original {
            debug!("Dropped {} from {source:?}", packet.name());
            return;
        }
        match source {
            Source::Client => {
                if let Some(downstream) = &downstream {
                    downstream.send(packet);
                }
            }
            Source::Server => self.client.send(packet),
        }
    }

    fn login_success_sending(&self, channel: &PacketChannel, packet: &Packet) -> SendDecision {
        let Packet::LoginSuccess(login) = packet else {
            return SendDecision::Proceed;
        };
        let mut decision = SendDecision::Proceed;
        for interceptor in self.services.login_interceptors.snapshot() {
            if interceptor.on_player_login_success_sending(channel, login) == SendDecision::Cancel {
                decision = SendDecision::Cancel;
            }
        }
        decision
    }
}

/// Runs the login interceptors as login success is about to go out.
struct LoginGate {
    session: Weak<ProxySession>,
}

impl SendFilter for LoginGate {
    fn packet_sending(&self, channel: &PacketChannel, packet: &Packet) -> SendDecision {
        match self.session.upgrade() {
            Some(session) => session.login_success_sending(channel, packet),
            None => SendDecision::Proceed,
        }
    }
}

struct SessionDownstreamListener {
    session: Weak<ProxySession>,
}

impl DownstreamListener for SessionDownstreamListener {
    fn packet_received(&self, packet: Packet) {
        if let Some(session) = self.session.upgrade() {
            session.handle_packet_from_server(packet);
        }
    }

    fn packet_sent(&self, packet: Packet) {
        if let Some(session) = self.session.upgrade() {
            session.handle_packet_sent_to_server(packet);
        }
    }

    fn disconnected(&self, reason: String) {
        if let Some(session) = self.session.upgrade() {
            session.handle_downstream_disconnect(reason);
        }
    }
}

struct SessionPacketSender {
    client: PacketChannel,
    link: SharedLink,
}

impl DirectPacketSink for SessionPacketSender {
    fn direct_send_to_client(&self, packet: Packet) {
        if self.client.is_connected() {
            self.client.send(packet);
        } else {
            warn!("Dropping direct client-bound {}; session is closed", packet.name());
        }
    }

    fn direct_send_to_server(&self, packet: Packet) {
        let downstream = lock(&self.link).downstream.clone();
        match downstream {
            Some(downstream) if downstream.is_connected() => downstream.send(packet),
            _ => warn!("Dropping direct server-bound {}; no downstream connection", packet.name()),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use mc_proxy_api::{ClientSession, InterceptorError, PacketInterceptorRegistry, SessionInterceptor};
    use mc_proxy_net::{ChannelConfig, ChannelRole};
    use mc_proxy_proto::packets::chat::plain_text;
    use mc_proxy_proto::packets::{
        ChatMessage, Handshake, HandshakeIntent, KeepAlive, LoginStart, LoginSuccess, SystemChat,
    };
    use mc_proxy_proto::GameProfile;
    use tokio::io::DuplexStream;
    use tokio::sync::Notify;
    use tokio::time::timeout;

    use super::*;
    use crate::downstream::{pump_events, BoxFuture};
    use crate::error::ProxyError;

    fn addr() -> SocketAddr {
        "127.0.0.1:40000".parse().unwrap()
    }

    fn chat(text: &str) -> Packet {
        Packet::ChatMessage(ChatMessage::new(text))
    }

    fn system(text: &str) -> Packet {
        Packet::SystemChat(SystemChat::text(text))
    }

    fn describe(packet: &Packet) -> String {
        match packet {
            Packet::ChatMessage(chat) => format!("chat:{}", chat.message),
            Packet::SystemChat(chat) => format!("system:{}", plain_text(&chat.content)),
            other => other.name().to_string(),
        }
    }

    /// Blocks in `connect` until released, then hands out an in-memory connection.
    #[derive(Default)]
    struct GatedConnector {
        calls: AtomicUsize,
        entered: Notify,
        release: Notify,
        made: Mutex<Vec<DownstreamConnection>>,
        peers: Mutex<Vec<DuplexStream>>,
    }

    impl DownstreamConnector for GatedConnector {
        fn connect<'a>(
            &'a self,
            username: &'a str,
            _listener: Arc<dyn DownstreamListener>,
        ) -> BoxFuture<'a, Result<DownstreamConnection, ProxyError>> {
            Box::pin(async move {
                self.calls.fetch_add(1, Ordering::SeqCst);
                self.entered.notify_one();
                self.release.notified().await;

                let (ours, theirs) = tokio::io::duplex(4096);
                let (reader, writer) = tokio::io::split(ours);
                let (channel, _events) = PacketChannel::spawn(
                    reader,
                    writer,
                    ChannelRole::Client,
                    addr(),
                    ChannelConfig::default(),
                );
                self.peers.lock().unwrap().push(theirs);
                let connection = DownstreamConnection::new(channel, GameProfile::offline(username));
                self.made.lock().unwrap().push(connection.clone());
                Ok(connection)
            })
        }
    }

    /// Server end of a [`LoopbackConnector`] connection, driven by the test.
    struct FakeServer {
        channel: PacketChannel,
        events: mpsc::UnboundedReceiver<ChannelEvent>,
    }

    /// Logs in over an in-memory pipe and hands the server end to the test.
    struct LoopbackConnector {
        servers: mpsc::UnboundedSender<FakeServer>,
    }

    impl LoopbackConnector {
        fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<FakeServer>) {
            let (servers, rx) = mpsc::unbounded_channel();
            (Arc::new(Self { servers }), rx)
        }
    }

    impl DownstreamConnector for LoopbackConnector {
        fn connect<'a>(
            &'a self,
            username: &'a str,
            listener: Arc<dyn DownstreamListener>,
        ) -> BoxFuture<'a, Result<DownstreamConnection, ProxyError>> {
            Box::pin(async move {
                let (ours, theirs) = tokio::io::duplex(64 * 1024);
                let (reader, writer) = tokio::io::split(ours);
                let (channel, mut events) = PacketChannel::spawn(
                    reader,
                    writer,
                    ChannelRole::Client,
                    addr(),
                    ChannelConfig::default(),
                );
                let (reader, writer) = tokio::io::split(theirs);
                let (server, server_events) = PacketChannel::spawn(
                    reader,
                    writer,
                    ChannelRole::Server,
                    addr(),
                    ChannelConfig::default(),
                );
                let profile = GameProfile::offline(username);
                server.start_reading();
                channel.start_reading();
                server.send(Packet::LoginSuccess(LoginSuccess {
                    profile: profile.clone(),
                }));
                while let Some(event) = events.recv().await {
                    if let ChannelEvent::PacketReceived(Packet::LoginSuccess(_)) = event {
                        break;
                    }
                }
                tokio::spawn(pump_events(events, listener));
                let _ = self.servers.send(FakeServer {
                    channel: server,
                    events: server_events,
                });
                Ok(DownstreamConnection::new(channel, profile))
            })
        }
    }

    #[derive(Default)]
    struct Lifecycle {
        installed: AtomicUsize,
        removed: AtomicUsize,
    }

    impl PacketInterceptor for Lifecycle {
        fn on_interceptor_installed(&self, _session: &ClientSession) {
            self.installed.fetch_add(1, Ordering::SeqCst);
        }

        fn on_interceptor_removed(&self, _session: &ClientSession) {
            self.removed.fetch_add(1, Ordering::SeqCst);
        }
    }

    /// Counts downstream connections announced to session interceptors.
    #[derive(Default)]
    struct ConnectWatch {
        connected: AtomicUsize,
    }

    impl SessionInterceptor for ConnectWatch {
        fn on_session_added(&self, _session: &ClientSession, _interceptors: &PacketInterceptorRegistry) {}

        fn on_downstream_connected(&self, _session: &ClientSession, _username: &str) {
            self.connected.fetch_add(1, Ordering::SeqCst);
        }
    }

    /// Records what it is offered and injects on cue:
    /// client chat `inject` adds `c1` for the client and `s1`, `s2` for the server;
    /// client chat `drop` is replaced by `instead`;
    /// server message `x` is preceded by `before-x` and answered with `ack`.
    #[derive(Default)]
    struct Steering {
        seen: Mutex<Vec<String>>,
    }

    impl PacketInterceptor for Steering {
        fn on_client_packet_received(
            &self,
            packet: &Packet,
            control: &mut PacketControl,
        ) -> Result<(), InterceptorError> {
            self.seen.lock().unwrap().push(format!("client {}", describe(packet)));
            if let Packet::ChatMessage(message) = packet {
                match message.message.as_str() {
                    "inject" => {
                        control.add_packet_to_client(system("c1"));
                        control.add_packet_to_server(chat("s1"));
                        control.add_packet_to_server(chat("s2"));
                    }
                    "drop" => {
                        control.drop_packet();
                        control.add_packet_to_server(chat("instead"));
                    }
                    _ => {}
                }
            }
            Ok(())
        }

        fn on_server_packet_received(
            &self,
            packet: &Packet,
            control: &mut PacketControl,
        ) -> Result<(), InterceptorError> {
            self.seen.lock().unwrap().push(format!("server {}", describe(packet)));
            if describe(packet) == "system:x" {
                control.add_packet_to_client(system("before-x"));
                control.add_packet_to_server(chat("ack"));
            }
            Ok(())
        }
    }

    struct Refuse;

    impl SessionLoginInterceptor for Refuse {
        fn on_player_login_success_sending(
            &self,
            session: &ClientSession,
            login: &LoginSuccess,
        ) -> SendDecision {
            session.disconnect(format!("no entry for {}", login.profile.name));
            SendDecision::Cancel
        }
    }

    struct Harness {
        session: Arc<ProxySession>,
        player: PacketChannel,
        player_events: mpsc::UnboundedReceiver<ChannelEvent>,
    }

    fn start_session(
        connector: Arc<dyn DownstreamConnector>,
        interceptors: Vec<Arc<dyn PacketInterceptor>>,
        login_interceptors: InterceptorRegistry<dyn SessionLoginInterceptor>,
        session_interceptors: SessionInterceptorRegistry,
    ) -> Harness {
        let (proxy_end, player_end) = tokio::io::duplex(64 * 1024);
        let (reader, writer) = tokio::io::split(proxy_end);
        let (client, client_events) =
            PacketChannel::spawn(reader, writer, ChannelRole::Server, addr(), ChannelConfig::default());
        let (reader, writer) = tokio::io::split(player_end);
        let (player, player_events) =
            PacketChannel::spawn(reader, writer, ChannelRole::Client, addr(), ChannelConfig::default());

        let services = Arc::new(SessionServices {
            connector,
            session_interceptors: Arc::new(session_interceptors),
            login_interceptors: Arc::new(login_interceptors),
        });
        let session = ProxySession::new(client, interceptors, services);
        session.start(client_events);

        player.start_reading();
        player.send(Packet::Handshake(Handshake {
            protocol_version: mc_proxy_proto::PROTOCOL_VERSION,
            server_address: "localhost".into(),
            server_port: 7777,
            intent: HandshakeIntent::Login,
        }));
        player.send(Packet::LoginStart(LoginStart {
            name: "Steve".into(),
            profile_id: None,
        }));
        Harness {
            session,
            player,
            player_events,
        }
    }

    async fn wait_disconnected(events: &mut mpsc::UnboundedReceiver<ChannelEvent>) -> String {
        timeout(Duration::from_secs(5), async {
            while let Some(event) = events.recv().await {
                if let ChannelEvent::Disconnected { reason } = event {
                    return reason;
                }
            }
            String::new()
        })
        .await
        .expect("never disconnected")
    }

    async fn next_received(events: &mut mpsc::UnboundedReceiver<ChannelEvent>) -> Packet {
        timeout(Duration::from_secs(5), async {
            loop {
                match events.recv().await {
                    Some(ChannelEvent::PacketReceived(packet)) => return packet,
                    Some(_) => {}
                    None => panic!("channel closed"),
                }
            }
        })
        .await
        .expect("nothing received")
    }

    async fn received(events: &mut mpsc::UnboundedReceiver<ChannelEvent>, count: usize) -> Vec<String> {
        let mut out = Vec::with_capacity(count);
        for _ in 0..count {
            out.push(describe(&next_received(events).await));
        }
        out
    }

    /// A logged-in session paired with a fake server, plus the steering interceptor.
    async fn game_session() -> (Harness, FakeServer, Arc<Steering>, Arc<ConnectWatch>) {
        let (connector, mut servers) = LoopbackConnector::new();
        let steering = Arc::new(Steering::default());
        let watch = Arc::new(ConnectWatch::default());
        let sessions = SessionInterceptorRegistry::new();
        sessions.add_at_end(watch.clone());
        let mut harness = start_session(
            connector,
            vec![steering.clone() as Arc<dyn PacketInterceptor>],
            InterceptorRegistry::new(),
            sessions,
        );
        let server = timeout(Duration::from_secs(5), servers.recv())
            .await
            .expect("never connected downstream")
            .expect("connector dropped");
        assert_eq!(received(&mut harness.player_events, 1).await, ["LoginSuccess"]);
        // Announced only after the connection is installed.
        timeout(Duration::from_secs(5), async {
            while watch.connected.load(Ordering::SeqCst) == 0 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("downstream never announced");
        assert!(harness.session.downstream().is_some());
        (harness, server, steering, watch)
    }

    #[tokio::test]
    async fn injected_packets_go_first_and_skip_the_chain() {
        let (mut harness, mut server, steering, watch) = game_session().await;
        assert_eq!(watch.connected.load(Ordering::SeqCst), 1);

        harness.player.send(chat("inject"));
        harness.player.send(chat("drop"));
        harness.player.send(chat("after"));
        assert_eq!(
            received(&mut server.events, 5).await,
            ["chat:s1", "chat:s2", "chat:inject", "chat:instead", "chat:after"]
        );

        server.channel.send(system("x"));
        assert_eq!(
            received(&mut harness.player_events, 3).await,
            ["system:c1", "system:before-x", "system:x"]
        );
        assert_eq!(received(&mut server.events, 1).await, ["chat:ack"]);

        assert_eq!(
            *steering.seen.lock().unwrap(),
            ["client chat:inject", "client chat:drop", "client chat:after", "server system:x"]
        );
    }

    #[tokio::test]
    async fn keep_alives_and_login_packets_are_not_forwarded() {
        let (mut harness, mut server, steering, _watch) = game_session().await;

        // The downstream channel answers the server itself.
        server.channel.send(Packet::ClientboundKeepAlive(KeepAlive { id: 77 }));
        assert_eq!(received(&mut server.events, 1).await, ["ServerboundKeepAlive"]);

        harness.player.send(Packet::ServerboundKeepAlive(KeepAlive { id: 5 }));
        harness.player.send(chat("sync"));
        assert_eq!(received(&mut server.events, 1).await, ["chat:sync"]);

        server.channel.send(system("sync"));
        assert_eq!(received(&mut harness.player_events, 1).await, ["system:sync"]);

        // No login-phase packet or keep-alive was offered to the chain.
        assert_eq!(
            *steering.seen.lock().unwrap(),
            ["client chat:sync", "server system:sync"]
        );
    }

    #[tokio::test]
    async fn shutdown_during_connect_leaves_no_downstream() {
        let connector = Arc::new(GatedConnector::default());
        let lifecycle = Arc::new(Lifecycle::default());
        let watch = Arc::new(ConnectWatch::default());
        let sessions = SessionInterceptorRegistry::new();
        sessions.add_at_end(watch.clone());
        let mut harness = start_session(
            connector.clone(),
            vec![lifecycle.clone() as Arc<dyn PacketInterceptor>],
            InterceptorRegistry::new(),
            sessions,
        );
        assert_eq!(lifecycle.installed.load(Ordering::SeqCst), 1);

        timeout(Duration::from_secs(5), connector.entered.notified())
            .await
            .expect("connector never called");
        harness.session.shutdown("proxy server shutdown");
        assert_eq!(harness.session.state(), SessionState::Shutdown);
        connector.release.notify_one();

        let connection = timeout(Duration::from_secs(5), async {
            loop {
                if let Some(connection) = connector.made.lock().unwrap().first().cloned() {
                    return connection;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("connection never made");
        timeout(Duration::from_secs(5), connection.closed())
            .await
            .expect("orphaned connection left open");
        assert_eq!(
            connection.channel().disconnect_reason().as_deref(),
            Some("shutdown race")
        );
        assert!(harness.session.downstream().is_none());
        assert_eq!(watch.connected.load(Ordering::SeqCst), 0);

        wait_disconnected(&mut harness.player_events).await;
        harness.session.shutdown("again");
        assert_eq!(lifecycle.removed.load(Ordering::SeqCst), 1);
        assert!(!harness.player.is_connected());
    }

    #[tokio::test]
    async fn refused_login_never_connects_downstream() {
        let connector = Arc::new(GatedConnector::default());
        let logins = InterceptorRegistry::<dyn SessionLoginInterceptor>::new();
        logins.add_at_end(Arc::new(Refuse));
        let mut harness = start_session(
            connector.clone(),
            Vec::new(),
            logins,
            SessionInterceptorRegistry::new(),
        );

        let reason = wait_disconnected(&mut harness.player_events).await;
        assert_eq!(reason, "no entry for Steve");

        timeout(Duration::from_secs(5), async {
            while harness.session.state() != SessionState::Shutdown {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("session never shut down");
        assert_eq!(connector.calls.load(Ordering::SeqCst), 0);
        assert!(harness.session.downstream().is_none());
    }

    #[tokio::test]
    async fn direct_sends_to_a_missing_downstream_are_dropped() {
        let connector = Arc::new(GatedConnector::default());
        let mut harness = start_session(
            connector.clone(),
            Vec::new(),
            InterceptorRegistry::new(),
            SessionInterceptorRegistry::new(),
        );
        // Login success has gone out; the downstream connect is held open.
        timeout(Duration::from_secs(5), connector.entered.notified())
            .await
            .expect("connector never called");

        let direct = harness.session.direct_control();
        direct.direct_send_packet_to_server(Packet::ServerboundKeepAlive(KeepAlive { id: 1 }));
        assert!(harness.session.downstream().is_none());
        assert_ne!(harness.session.state(), SessionState::Shutdown);

        // The client saw nothing of it and can still be reached.
        direct.direct_send_packet_to_client(system("still here"));
        assert_eq!(
            received(&mut harness.player_events, 2).await,
            ["LoginSuccess", "system:still here"]
        );
        assert!(harness.session.client().is_connected());
        assert!(harness.player.is_connected());
    }
}
