//! Per-packet control handed to packet interceptors.

use std::fmt;
use std::sync::Arc;

use mc_proxy_proto::Packet;
use tracing::trace;

/// Immediate sends to either side of a session, bypassing the interceptor chain.
///
/// Implemented by the session. Sending to a side that is already closed is a
/// logged no-op.
pub trait DirectPacketSink: Send + Sync {
    fn direct_send_to_client(&self, packet: Packet);
    fn direct_send_to_server(&self, packet: Packet);
}

/// Clone-able handle for direct sends, valid for the whole session.
#[derive(Clone)]
pub struct DirectPacketControl {
    sink: Arc<dyn DirectPacketSink>,
}

impl DirectPacketControl {
    pub fn new(sink: Arc<dyn DirectPacketSink>) -> Self {
        Self { sink }
    }

    /// Send a packet to the client right away.
    pub fn direct_send_packet_to_client(&self, packet: Packet) {
        trace!("Direct send of {} to client", packet.name());
        self.sink.direct_send_to_client(packet);
    }

    /// Send a packet to the server right away.
    pub fn direct_send_packet_to_server(&self, packet: Packet) {
        trace!("Direct send of {} to server", packet.name());
        self.sink.direct_send_to_server(packet);
    }
}

impl fmt::Debug for DirectPacketControl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DirectPacketControl").finish_non_exhaustive()
    }
}

/// Decisions collected while one packet passes the interceptor chain.
///
/// Injected packets are delivered once the chain has finished and are never
/// offered to interceptors themselves.
#[derive(Debug)]
pub struct PacketControl {
    drop_packet: bool,
    to_client: Vec<Packet>,
    to_server: Vec<Packet>,
    direct: DirectPacketControl,
}

/// What the session does with a packet after the chain ran.
#[derive(Debug, Default)]
pub struct PacketOutcome {
    pub drop_original: bool,
    pub to_client: Vec<Packet>,
    pub to_server: Vec<Packet>,
}

impl PacketControl {
    pub fn new(direct: DirectPacketControl) -> Self {
        Self {
            drop_packet: false,
            to_client: Vec::new(),
            to_server: Vec::new(),
            direct,
        }
    }

    /// Suppress the original packet. Injected packets still flow.
    pub fn drop_packet(&mut self) {
        self.drop_packet = true;
    }

    pub fn is_drop_packet(&self) -> bool {
        self.drop_packet
    }

    /// Queue a packet for the client.
    pub fn add_packet_to_client(&mut self, packet: Packet) {
        trace!("Queued {} for client", packet.name());
        self.to_client.push(packet);
    }

    /// Queue a packet for the server.
    pub fn add_packet_to_server(&mut self, packet: Packet) {
        trace!("Queued {} for server", packet.name());
        self.to_server.push(packet);
    }

    pub fn direct_send_packet_to_client(&self, packet: Packet) {
        self.direct.direct_send_packet_to_client(packet);
    }

    pub fn direct_send_packet_to_server(&self, packet: Packet) {
        self.direct.direct_send_packet_to_server(packet);
    }

    /// Handle for direct sends that outlives this packet event.
    pub fn direct_control(&self) -> &DirectPacketControl {
        &self.direct
    }

    pub fn finish(self) -> PacketOutcome {
        PacketOutcome {
            drop_original: self.drop_packet,
            to_client: self.to_client,
            to_server: self.to_server,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use mc_proxy_proto::packets::KeepAlive;

    use super::*;

    #[derive(Default)]
    struct Recorder {
        client: Mutex<Vec<Packet>>,
        server: Mutex<Vec<Packet>>,
    }

    impl DirectPacketSink for Recorder {
        fn direct_send_to_client(&self, packet: Packet) {
            self.client.lock().unwrap().push(packet);
        }

        fn direct_send_to_server(&self, packet: Packet) {
            self.server.lock().unwrap().push(packet);
        }
    }

    fn keep_alive(id: i64) -> Packet {
        Packet::ClientboundKeepAlive(KeepAlive { id })
    }

    #[test]
    fn collects_injections_in_order() {
        let recorder = Arc::new(Recorder::default());
        let mut control = PacketControl::new(DirectPacketControl::new(recorder.clone()));
        assert!(!control.is_drop_packet());

        control.add_packet_to_client(keep_alive(1));
        control.add_packet_to_server(keep_alive(2));
        control.add_packet_to_client(keep_alive(3));
        control.drop_packet();

        let outcome = control.finish();
        assert!(outcome.drop_original);
        assert_eq!(outcome.to_client, vec![keep_alive(1), keep_alive(3)]);
        assert_eq!(outcome.to_server, vec![keep_alive(2)]);
        assert!(recorder.client.lock().unwrap().is_empty());
    }

    #[test]
    fn direct_sends_bypass_the_queues() {
        let recorder = Arc::new(Recorder::default());
        let control = PacketControl::new(DirectPacketControl::new(recorder.clone()));
        control.direct_send_packet_to_client(keep_alive(5));
        control.direct_control().direct_send_packet_to_server(keep_alive(6));

        assert_eq!(*recorder.client.lock().unwrap(), vec![keep_alive(5)]);
        assert_eq!(*recorder.server.lock().unwrap(), vec![keep_alive(6)]);
        let outcome = control.finish();
        assert!(outcome.to_client.is_empty() && outcome.to_server.is_empty());
    }
}
