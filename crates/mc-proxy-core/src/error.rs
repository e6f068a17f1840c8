use mc_proxy_net::NetError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("failed to listen on {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: NetError,
    },

    #[error("cannot connect to {address}: {source}")]
    Connect {
        address: String,
        #[source]
        source: NetError,
    },

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("proxy already started")]
    AlreadyStarted,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
