//! The listen side of the proxy.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use mc_proxy_api::{
    InterceptorRegistry, PacketInterceptorRegistry, SessionInterceptorRegistry,
    SessionLoginInterceptor,
};
use mc_proxy_net::{HollowServer, IncomingSession, PacketChannel, ServerEvent};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::config::ProxyConfig;
use crate::downstream::{DownstreamConnector, TcpDownstreamConnector};
use crate::error::ProxyError;
use crate::session::{ProxySession, SessionServices};

/// Live sessions by client address. `None` once shutdown has begun.
type SessionMap = Mutex<Option<HashMap<SocketAddr, Arc<ProxySession>>>>;

struct Shared {
    services: Arc<SessionServices>,
    sessions: SessionMap,
}

struct Running {
    shutdown_tx: watch::Sender<bool>,
    accept_task: JoinHandle<()>,
}

/// Accepts clients and runs a [`ProxySession`] for each.
pub struct ProxyServer {
    config: ProxyConfig,
    shared: Arc<Shared>,
    running: Mutex<Option<Running>>,
}

impl ProxyServer {
    /// A proxy forwarding to `config.forward_address` over TCP.
    pub fn new(config: ProxyConfig) -> Self {
        let connector = Arc::new(TcpDownstreamConnector::new(config.forward_address.clone()));
        Self::with_connector(config, connector)
    }

    pub fn with_connector(config: ProxyConfig, connector: Arc<dyn DownstreamConnector>) -> Self {
        Self {
            config,
            shared: Arc::new(Shared {
                services: Arc::new(SessionServices {
                    connector,
                    session_interceptors: Arc::new(SessionInterceptorRegistry::new()),
                    login_interceptors: Arc::new(InterceptorRegistry::new()),
                }),
                sessions: Mutex::new(Some(HashMap::new())),
            }),
            running: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }

    /// Interceptors consulted for every new session.
    pub fn session_interceptors(&self) -> &SessionInterceptorRegistry {
        &self.shared.services.session_interceptors
    }

    pub fn add_session_login_interceptor(&self, interceptor: Arc<dyn SessionLoginInterceptor>) {
        self.shared.services.login_interceptors.add_at_end(interceptor);
    }

    pub fn session_count(&self) -> usize {
        sessions(&self.shared.sessions)
            .as_ref()
            .map_or(0, HashMap::len)
    }

    /// Bind the listener and start accepting in the background.
    /// Returns the bound address.
    pub async fn start(&self) -> Result<SocketAddr, ProxyError> {
        if running(&self.running).is_some() {
            return Err(ProxyError::AlreadyStarted);
        }
        let address = self.config.resolve_listen_address().await?;
        let (hollow, events) = HollowServer::bind(self.config.hollow_server_config(address))
            .await
            .map_err(|source| ProxyError::Bind {
                address: self.config.listen_address.clone(),
                source,
            })?;
        let local_addr = hollow.local_addr().map_err(|source| ProxyError::Bind {
            address: self.config.listen_address.clone(),
            source,
        })?;

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let accept_task = tokio::spawn(hollow.run(shutdown_rx));
        tokio::spawn(dispatch(Arc::clone(&self.shared), events));
        *running(&self.running) = Some(Running {
            shutdown_tx,
            accept_task,
        });

        info!(
            "Proxy listening on {local_addr}, forwarding to {}",
            self.config.forward_address
        );
        Ok(local_addr)
    }

    /// Stop accepting, then shut every live session down and wait for each to
    /// release its downstream connection.
    pub async fn shutdown(&self) {
        let running = running(&self.running).take();
        if let Some(running) = running {
            running.shutdown_tx.send_replace(true);
            let _ = running.accept_task.await;
        }

        let live = sessions(&self.shared.sessions).take().unwrap_or_default();
        info!("Shutting down {} session(s)", live.len());
        for session in live.values() {
            session.shutdown_gracefully("proxy server shutdown").await;
        }
    }
}

fn sessions(map: &SessionMap) -> MutexGuard<'_, Option<HashMap<SocketAddr, Arc<ProxySession>>>> {
    map.lock().unwrap_or_else(PoisonError::into_inner)
}

fn running(slot: &Mutex<Option<Running>>) -> MutexGuard<'_, Option<Running>> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

async fn dispatch(shared: Arc<Shared>, mut events: mpsc::Receiver<ServerEvent>) {
    while let Some(event) = events.recv().await {
        match event {
            ServerEvent::SessionAdded(incoming) => shared.session_added(incoming),
            ServerEvent::SessionRemoved { channel, reason } => {
                shared.session_removed(&channel, &reason)
            }
        }
    }
    debug!("Proxy event dispatch finished");
}

impl Shared {
    fn session_added(&self, incoming: IncomingSession) {
        let IncomingSession { channel, events } = incoming;
        let addr = channel.remote_addr();
        info!("Client session created from {addr}");

        let chain = PacketInterceptorRegistry::new();
        let session_interceptors = self.services.session_interceptors.snapshot();
        for interceptor in &session_interceptors {
            interceptor.on_session_added(&channel, &chain);
        }
        let session = ProxySession::new(channel, chain.snapshot(), Arc::clone(&self.services));

        let direct = session.direct_control();
        for interceptor in &session_interceptors {
            if let Some(aware) = interceptor.as_direct_control_aware() {
                aware.inject_direct_packet_control(direct.clone());
            }
        }
        for interceptor in session.interceptors() {
            if let Some(aware) = interceptor.as_direct_control_aware() {
                aware.inject_direct_packet_control(direct.clone());
            }
        }

        let accepted = match sessions(&self.sessions).as_mut() {
            Some(map) => {
                map.insert(addr, Arc::clone(&session));
                true
            }
            None => false,
        };
        if !accepted {
            session.shutdown("proxy server shutdown");
            return;
        }
        session.start(events);
    }

    fn session_removed(&self, channel: &PacketChannel, reason: &str) {
        let addr = channel.remote_addr();
        info!("Client session removed from {addr}: {reason}");

        let session = sessions(&self.sessions)
            .as_mut()
            .and_then(|map| map.remove(&addr));
        if let Some(session) = session {
            session.shutdown("proxy server removed client session");
        }
        for interceptor in self.services.session_interceptors.snapshot() {
            interceptor.on_session_removed(channel);
        }
    }
}
