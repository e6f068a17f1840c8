mod config;
mod poc;

use std::sync::Arc;

use clap::Parser;
use config::{Cli, FileConfig, Settings};
use mc_proxy_allowlist::{AllowList, AllowListLoginInterceptor};
use mc_proxy_core::ProxyServer;
use mc_proxy_gamestate::{GameStateListener, GameStateTrackingSessionInterceptor, MinecraftGameState};
use mc_proxy_trace::PacketTracingSessionInterceptor;
use poc::PhantomBeeSessionInterceptor;
use tracing::{debug, error, info, warn};

/// Logs player changes tracked by the game-state interceptor.
struct GameStateLogger;

impl GameStateListener for GameStateLogger {
    fn game_state_changed(
        &self,
        previous: &Arc<MinecraftGameState>,
        current: &Arc<MinecraftGameState>,
    ) {
        let player = current.player_name().unwrap_or("?");
        if previous.health() != current.health() || previous.food() != current.food() {
            debug!(
                "{player}: health {} food {} saturation {}",
                current.health(),
                current.food(),
                current.saturation()
            );
        }
        if !Arc::ptr_eq(previous.world(), current.world()) {
            debug!("{player}: {} chunk(s) loaded", current.world().chunk_count());
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let file = match &cli.config {
        Some(path) => match FileConfig::load(path) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("Failed to load {}: {e}", path.display());
                std::process::exit(1);
            }
        },
        None => FileConfig::default(),
    };
    let settings = match Settings::resolve(cli, file) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(2);
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&settings.logging.level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    info!("MC-Proxy v{} starting", env!("CARGO_PKG_VERSION"));
    info!("Listen address: {}", settings.proxy.listen_address);
    info!("Forward address: {}", settings.proxy.forward_address);
    info!(
        "Compression threshold: {}, keep-alive every {}s",
        settings.proxy.compression_threshold, settings.proxy.keep_alive_interval
    );
    info!(
        "Tracing: {} (dir: {}, compressed: {})",
        settings.trace.enabled,
        settings.trace.output_dir.display(),
        settings.trace.compress
    );
    info!("Proof of concept: {}", settings.poc);

    let server = ProxyServer::new(settings.proxy.clone());
    let sessions = server.session_interceptors();

    // Each of these puts its packet interceptor first, so the one registered
    // last ends up at the front of the chain. The tracer must be there.
    if settings.gamestate.enabled {
        info!("Game state tracking enabled");
        sessions.add_at_end(Arc::new(GameStateTrackingSessionInterceptor::with_listener(
            Arc::new(GameStateLogger),
        )));
    }
    if settings.poc {
        sessions.add_at_end(Arc::new(PhantomBeeSessionInterceptor));
    }
    if settings.trace.enabled {
        match PacketTracingSessionInterceptor::new(settings.trace.clone()) {
            Ok(tracer) => sessions.add_at_end(Arc::new(tracer)),
            Err(e) => warn!(
                "Cannot trace into {}: {e}; tracing disabled",
                settings.trace.output_dir.display()
            ),
        }
    }

    if let Some(path) = &settings.allowlist.file {
        let list = Arc::new(AllowList::new(path));
        list.set_enabled(settings.allowlist.enabled);
        info!(
            "Allow-list: {} (enabled: {})",
            path.display(),
            settings.allowlist.enabled
        );
        server.add_session_login_interceptor(Arc::new(AllowListLoginInterceptor::new(list)));
    }

    if let Err(e) = server.start().await {
        error!("Failed to start proxy: {e}");
        std::process::exit(1);
    }

    tokio::signal::ctrl_c().await.ok();
    info!("Shutdown signal received");
    server.shutdown().await;
    info!("Proxy stopped");
}
