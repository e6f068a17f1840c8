use mc_proxy_proto::ProtoError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NetError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("protocol error: {0}")]
    Proto(#[from] ProtoError),

    #[error("connection closed")]
    ConnectionClosed,

    #[error("login refused: {0}")]
    LoginRefused(String),

    #[error("invalid address: {0}")]
    InvalidAddress(String),
}
