use mc_proxy_proto::ProtoError;
use thiserror::Error;

/// Failure reported by a packet interceptor hook.
///
/// The session logs it and moves on to the next interceptor; decisions the
/// failing interceptor already made on the packet control still apply.
#[derive(Debug, Error)]
pub enum InterceptorError {
    #[error("protocol error: {0}")]
    Proto(#[from] ProtoError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}
