//! Extension points of the proxy.
//!
//! Session interceptors are installed once on the proxy and build the packet
//! interceptor chain of every new client session. Packet interceptors then see
//! each game-phase packet in both directions and steer it through a
//! [`PacketControl`].

pub mod control;
pub mod error;
pub mod interceptor;
pub mod registry;

pub use control::{DirectPacketControl, DirectPacketSink, PacketControl, PacketOutcome};
pub use error::InterceptorError;
pub use interceptor::{
    DirectPacketControlAware, GameProfileAware, PacketInterceptor, SessionInterceptor,
    SessionLoginInterceptor,
};
pub use registry::{InterceptorRegistry, PacketInterceptorRegistry, SessionInterceptorRegistry};

/// The client side of a session, as seen by interceptors.
pub type ClientSession = mc_proxy_net::PacketChannel;
