use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

use mc_proxy_api::{
    ClientSession, InterceptorError, PacketControl, PacketInterceptor, PacketInterceptorRegistry,
    SessionInterceptor,
};
use mc_proxy_proto::Packet;
use tracing::{debug, info, warn};

use crate::config::TraceConfig;
use crate::error::TraceError;
use crate::sink::{TraceEvent, TraceSink};

/// Writes one session's traffic to a trace file.
///
/// The file is opened when the interceptor is installed and closed when it is
/// removed. Any I/O failure is logged and switches tracing off for the session;
/// traffic is never affected.
pub struct PacketTracingInterceptor {
    path: PathBuf,
    compress: bool,
    sink: Mutex<Option<TraceSink>>,
}

impl PacketTracingInterceptor {
    pub fn new(path: PathBuf, compress: bool) -> Self {
        Self {
            path,
            compress,
            sink: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    pub fn is_tracing(&self) -> bool {
        self.sink().is_some()
    }

    fn sink(&self) -> MutexGuard<'_, Option<TraceSink>> {
        self.sink.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn record(&self, event: TraceEvent, packet: &Packet) {
        let mut sink = self.sink();
        let Some(open) = sink.as_mut() else {
            return;
        };
        if let Err(e) = open.record(event, packet) {
            warn!("Tracing to {} stopped: {e}", self.path.display());
            *sink = None;
        }
    }

    fn close(&self) -> Result<(), TraceError> {
        match self.sink().take() {
            Some(sink) => sink.close(),
            None => Ok(()),
        }
    }
}

impl PacketInterceptor for PacketTracingInterceptor {
    fn on_interceptor_installed(&self, session: &ClientSession) {
        debug!(
            "Tracing session {} to {} (compressed: {})",
            session.remote_addr(),
            self.path.display(),
            self.compress
        );
        match TraceSink::create(&self.path, self.compress) {
            Ok(sink) => *self.sink() = Some(sink),
            Err(e) => warn!("Cannot open trace file {}: {e}", self.path.display()),
        }
    }

    fn on_interceptor_removed(&self, _session: &ClientSession) {
        if let Err(e) = self.close() {
            warn!("Closing trace file {} failed: {e}", self.path.display());
        }
    }

    fn on_client_packet_received(
        &self,
        packet: &Packet,
        _control: &mut PacketControl,
    ) -> Result<(), InterceptorError> {
        self.record(TraceEvent::Received, packet);
        Ok(())
    }

    fn on_server_packet_received(
        &self,
        packet: &Packet,
        _control: &mut PacketControl,
    ) -> Result<(), InterceptorError> {
        self.record(TraceEvent::Received, packet);
        Ok(())
    }

    fn on_packet_sent_to_client(&self, packet: &Packet) {
        self.record(TraceEvent::Sent, packet);
    }

    fn on_packet_sent_to_server(&self, packet: &Packet) {
        self.record(TraceEvent::Sent, packet);
    }
}

/// Puts a [`PacketTracingInterceptor`] at the front of every session's chain,
/// so it sees packets before anything else can drop them.
#[derive(Debug)]
pub struct PacketTracingSessionInterceptor {
    config: TraceConfig,
}

impl PacketTracingSessionInterceptor {
    /// Creates the output directory if needed.
    pub fn new(config: TraceConfig) -> Result<Self, TraceError> {
        std::fs::create_dir_all(&config.output_dir)?;
        info!(
            "Tracing sessions into {} (compressed: {})",
            config.output_dir.display(),
            config.compress
        );
        Ok(Self { config })
    }

    pub fn config(&self) -> &TraceConfig {
        &self.config
    }
}

impl SessionInterceptor for PacketTracingSessionInterceptor {
    fn on_session_added(&self, session: &ClientSession, interceptors: &PacketInterceptorRegistry) {
        let path = self.config.path_for(session.remote_addr());
        interceptors.insert_first(Arc::new(PacketTracingInterceptor::new(
            path,
            self.config.compress,
        )));
    }
}

#[cfg(test)]
mod tests {
    use std::io::{BufRead, BufReader};
    use std::net::SocketAddr;

    use mc_proxy_api::{DirectPacketControl, DirectPacketSink};
    use mc_proxy_net::{ChannelConfig, ChannelRole, PacketChannel};
    use mc_proxy_proto::packets::{ChatMessage, KeepAlive};

    use super::*;
    use crate::sink::TraceRecord;

    struct Nowhere;

    impl DirectPacketSink for Nowhere {
        fn direct_send_to_client(&self, _packet: Packet) {}
        fn direct_send_to_server(&self, _packet: Packet) {}
    }

    struct Noop;

    impl PacketInterceptor for Noop {}

    fn session(addr: &str) -> ClientSession {
        let (a, _b) = tokio::io::duplex(1024);
        let (reader, writer) = tokio::io::split(a);
        let (channel, _events) = PacketChannel::spawn(
            reader,
            writer,
            ChannelRole::Server,
            addr.parse().unwrap(),
            ChannelConfig::default(),
        );
        channel
    }

    fn config(name: &str) -> TraceConfig {
        let output_dir =
            std::env::temp_dir().join(format!("mc-proxy-trace-{name}-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&output_dir);
        TraceConfig {
            enabled: true,
            output_dir,
            compress: false,
        }
    }

    #[tokio::test]
    async fn traces_received_and_sent_packets() {
        let sessions = PacketTracingSessionInterceptor::new(config("session")).unwrap();
        let client = session("127.0.0.1:40001");
        let registry = PacketInterceptorRegistry::new();
        registry.add_at_end(Arc::new(Noop));
        sessions.on_session_added(&client, &registry);
        assert_eq!(registry.count(), 2);

        let tracer = registry.get(0).unwrap();
        tracer.on_interceptor_installed(&client);
        let mut control = PacketControl::new(DirectPacketControl::new(Arc::new(Nowhere)));
        tracer
            .on_client_packet_received(&Packet::ChatMessage(ChatMessage::new("hello")), &mut control)
            .unwrap();
        tracer.on_packet_sent_to_client(&Packet::ClientboundKeepAlive(KeepAlive { id: 1 }));
        tracer.on_interceptor_removed(&client);

        let path = sessions
            .config()
            .path_for("127.0.0.1:40001".parse::<SocketAddr>().unwrap());
        let lines: Vec<TraceRecord> = BufReader::new(std::fs::File::open(path).unwrap())
            .lines()
            .map(|line| serde_json::from_str(&line.unwrap()).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!((lines[0].event, lines[0].dir.as_str()), (TraceEvent::Received, "client"));
        assert_eq!(lines[0].name, "ChatMessage");
        assert_eq!((lines[1].event, lines[1].dir.as_str()), (TraceEvent::Sent, "server"));
    }

    #[tokio::test]
    async fn unopenable_file_disables_tracing() {
        let missing = std::env::temp_dir()
            .join(format!("mc-proxy-trace-absent-{}", std::process::id()))
            .join("deeper")
            .join("trace");
        let tracer = PacketTracingInterceptor::new(missing, true);
        let client = session("127.0.0.1:40002");
        tracer.on_interceptor_installed(&client);
        assert!(!tracer.is_tracing());

        let mut control = PacketControl::new(DirectPacketControl::new(Arc::new(Nowhere)));
        tracer
            .on_server_packet_received(&Packet::ClientboundKeepAlive(KeepAlive { id: 2 }), &mut control)
            .unwrap();
        assert!(!control.finish().drop_original);
        tracer.on_interceptor_removed(&client);
    }
}
