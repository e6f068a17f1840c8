//! Packet tracing: every game-phase packet of a session, as one JSON line in a
//! per-session file, optionally gzip-compressed.

pub mod config;
pub mod error;
pub mod interceptor;
pub mod sink;

pub use config::TraceConfig;
pub use error::TraceError;
pub use interceptor::{PacketTracingInterceptor, PacketTracingSessionInterceptor};
pub use sink::{TraceEvent, TraceRecord, TraceSink};
