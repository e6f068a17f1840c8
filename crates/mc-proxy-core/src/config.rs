use std::net::SocketAddr;
use std::time::Duration;

use mc_proxy_net::HollowServerConfig;
use serde::Deserialize;

use crate::error::ProxyError;

/// Settings of one proxy instance.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProxyConfig {
    /// Where clients connect, `host:port`.
    pub listen_address: String,
    /// The real server, `host:port`.
    pub forward_address: String,
    /// Compression threshold announced to clients. Negative disables compression.
    pub compression_threshold: i32,
    /// Seconds between keep-alives sent to clients.
    pub keep_alive_interval: u64,
    pub motd: String,
    pub max_players: u32,
}

fn default_listen_address() -> String {
    "0.0.0.0:7777".into()
}

fn default_forward_address() -> String {
    "localhost:25565".into()
}

fn default_compression_threshold() -> i32 {
    100
}

fn default_keep_alive_interval() -> u64 {
    15
}

fn default_motd() -> String {
    "Minecraft proxy".into()
}

fn default_max_players() -> u32 {
    20
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            listen_address: default_listen_address(),
            forward_address: default_forward_address(),
            compression_threshold: default_compression_threshold(),
            keep_alive_interval: default_keep_alive_interval(),
            motd: default_motd(),
            max_players: default_max_players(),
        }
    }
}

impl ProxyConfig {
    pub fn compression(&self) -> Option<i32> {
        (self.compression_threshold >= 0).then_some(self.compression_threshold)
    }

    pub fn keep_alive(&self) -> Duration {
        Duration::from_secs(self.keep_alive_interval.max(1))
    }

    /// Resolve the listen address, which may name a host.
    pub async fn resolve_listen_address(&self) -> Result<SocketAddr, ProxyError> {
        if let Ok(addr) = self.listen_address.parse() {
            return Ok(addr);
        }
        tokio::net::lookup_host(&self.listen_address)
            .await
            .map_err(|_| ProxyError::InvalidAddress(self.listen_address.clone()))?
            .next()
            .ok_or_else(|| ProxyError::InvalidAddress(self.listen_address.clone()))
    }

    pub(crate) fn hollow_server_config(&self, address: SocketAddr) -> HollowServerConfig {
        HollowServerConfig {
            address,
            compression_threshold: self.compression(),
            keep_alive_interval: self.keep_alive(),
            motd: self.motd.clone(),
            max_players: self.max_players,
        }
    }
}
