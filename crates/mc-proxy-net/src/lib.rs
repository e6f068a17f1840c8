//! TCP transport for the proxy: packet channels, the hollow server that
//! terminates client logins, and the outbound client used to reach the real
//! server.

pub mod channel;
pub mod client;
pub mod error;
pub mod server;

pub use channel::{
    ChannelConfig, ChannelEvent, ChannelRole, PacketChannel, SendDecision, SendFilter,
};
pub use client::{connect, DownstreamLogin};
pub use error::NetError;
pub use server::{HollowServer, HollowServerConfig, IncomingSession, ServerEvent};
