//! Interceptor traits.
//!
//! Optional capabilities are separate traits. An interceptor opts in by
//! returning itself from the matching `as_*` accessor.

use mc_proxy_net::SendDecision;
use mc_proxy_proto::packets::LoginSuccess;
use mc_proxy_proto::{GameProfile, Packet};

use crate::control::{DirectPacketControl, PacketControl};
use crate::error::InterceptorError;
use crate::registry::PacketInterceptorRegistry;
use crate::ClientSession;

/// Sees game-phase packets of one session, in both directions.
///
/// One instance per session; any state it keeps lives as long as that session.
/// Both directions run concurrently, so implementations synchronize their own state.
pub trait PacketInterceptor: Send + Sync {
    /// The interceptor has been installed on a session.
    fn on_interceptor_installed(&self, _session: &ClientSession) {}

    /// The session is gone. Called once.
    fn on_interceptor_removed(&self, _session: &ClientSession) {}

    /// A packet from the client, before it is forwarded to the server.
    fn on_client_packet_received(
        &self,
        _packet: &Packet,
        _control: &mut PacketControl,
    ) -> Result<(), InterceptorError> {
        Ok(())
    }

    /// A packet from the server, before it is forwarded to the client.
    fn on_server_packet_received(
        &self,
        _packet: &Packet,
        _control: &mut PacketControl,
    ) -> Result<(), InterceptorError> {
        Ok(())
    }

    /// A packet has been written to the client connection. That says nothing
    /// about whether the client has processed it.
    fn on_packet_sent_to_client(&self, _packet: &Packet) {}

    /// A packet has been written to the server connection.
    fn on_packet_sent_to_server(&self, _packet: &Packet) {}

    fn as_direct_control_aware(&self) -> Option<&dyn DirectPacketControlAware> {
        None
    }

    fn as_game_profile_aware(&self) -> Option<&dyn GameProfileAware> {
        None
    }
}

/// Installed once on the proxy; configures every new session.
pub trait SessionInterceptor: Send + Sync {
    /// A client connected, before any downstream connection exists. Add packet
    /// interceptors for the session to `interceptors`.
    fn on_session_added(&self, session: &ClientSession, interceptors: &PacketInterceptorRegistry);

    /// The downstream connection for `session` has been established.
    fn on_downstream_connected(&self, _session: &ClientSession, _username: &str) {}

    /// The session has been removed from the proxy.
    fn on_session_removed(&self, _session: &ClientSession) {}

    fn as_direct_control_aware(&self) -> Option<&dyn DirectPacketControlAware> {
        None
    }
}

/// Vets logins: runs while login success is about to be sent to the client.
///
/// Returning [`SendDecision::Cancel`] withholds login success. An interceptor
/// that cancels should also disconnect the session with a reason.
pub trait SessionLoginInterceptor: Send + Sync {
    fn on_player_login_success_sending(
        &self,
        session: &ClientSession,
        login: &LoginSuccess,
    ) -> SendDecision;
}

/// Receives a handle for sending packets outside of a packet event.
pub trait DirectPacketControlAware {
    fn inject_direct_packet_control(&self, control: DirectPacketControl);
}

/// Receives the game profile the real server assigned to the player.
pub trait GameProfileAware {
    fn inject_game_profile(&self, profile: &GameProfile);
}
