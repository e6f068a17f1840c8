//! Outbound connections to the real server.

use mc_proxy_proto::packets::{Handshake, HandshakeIntent, LoginStart};
use mc_proxy_proto::{GameProfile, Packet, PROTOCOL_VERSION};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::channel::{ChannelConfig, ChannelEvent, ChannelRole, PacketChannel};
use crate::error::NetError;

/// A logged-in connection to the real server, already in the game phase.
#[derive(Debug)]
pub struct DownstreamLogin {
    pub channel: PacketChannel,
    pub events: mpsc::UnboundedReceiver<ChannelEvent>,
    /// Profile the server assigned in login success.
    pub profile: GameProfile,
}

/// Connect to `address` (`host:port`) and log in offline as `username`.
///
/// Returns once the server has sent login success. Events received before
/// that point are consumed here.
pub async fn connect(address: &str, username: &str) -> Result<DownstreamLogin, NetError> {
    let (host, port) = split_address(address)?;
    let stream = TcpStream::connect(address).await?;
    stream.set_nodelay(true)?;
    let remote_addr = stream.peer_addr()?;
    let (reader, writer) = stream.into_split();

    let (channel, mut events) = PacketChannel::spawn(
        reader,
        writer,
        ChannelRole::Client,
        remote_addr,
        ChannelConfig::default(),
    );
    channel.send(Packet::Handshake(Handshake {
        protocol_version: PROTOCOL_VERSION,
        server_address: host.to_string(),
        server_port: port,
        intent: HandshakeIntent::Login,
    }));
    channel.send(Packet::LoginStart(LoginStart {
        name: username.to_string(),
        profile_id: None,
    }));
    channel.start_reading();
    debug!("Logging in to {address} as {username}");

    while let Some(event) = events.recv().await {
        match event {
            ChannelEvent::PacketReceived(Packet::LoginSuccess(success)) => {
                info!(
                    "Logged in to {address} as {} ({})",
                    success.profile.name, success.profile.id
                );
                return Ok(DownstreamLogin {
                    channel,
                    events,
                    profile: success.profile,
                });
            }
            ChannelEvent::Disconnected { reason } => return Err(NetError::LoginRefused(reason)),
            _ => {}
        }
    }
    Err(NetError::ConnectionClosed)
}

fn split_address(address: &str) -> Result<(&str, u16), NetError> {
    let (host, port) = address
        .rsplit_once(':')
        .ok_or_else(|| NetError::InvalidAddress(address.to_string()))?;
    let port = port
        .parse()
        .map_err(|_| NetError::InvalidAddress(address.to_string()))?;
    let host = host.trim_start_matches('[').trim_end_matches(']');
    if host.is_empty() {
        return Err(NetError::InvalidAddress(address.to_string()));
    }
    Ok((host, port))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_parsing() {
        assert_eq!(split_address("localhost:25565").unwrap(), ("localhost", 25565));
        assert_eq!(split_address("[::1]:7777").unwrap(), ("::1", 7777));
        assert!(split_address("localhost").is_err());
        assert!(split_address("localhost:http").is_err());
        assert!(split_address(":25565").is_err());
    }

    #[tokio::test]
    async fn unreachable_server_is_an_io_error() {
        // Bind then drop to get a port nobody listens on.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let address = listener.local_addr().unwrap().to_string();
        drop(listener);
        assert!(matches!(
            connect(&address, "Steve").await,
            Err(NetError::Io(_))
        ));
    }
}
