//! The proxy engine: accepts clients, logs them in locally, pairs each with a
//! connection to the real server and runs traffic through the interceptors.

pub mod config;
pub mod downstream;
pub mod error;
pub mod server;
pub mod session;

pub use config::ProxyConfig;
pub use downstream::{
    BoxFuture, DownstreamConnection, DownstreamConnector, DownstreamListener,
    TcpDownstreamConnector,
};
pub use error::ProxyError;
pub use server::ProxyServer;
pub use session::{ProxySession, SessionServices, SessionState};
