use std::net::{IpAddr, SocketAddr, UdpSocket};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use marquee_core::{JobPayload, Priority, TextOptions};
use marquee_engine::Dispatcher;
use marquee_events::EventBus;
use marquee_renderer::{AssetLibrary, Renderer, SimRenderer};
use marquee_server::config::ServerConfig;
use marquee_server::forward::EventForwarder;
use marquee_server::router::build_app_router;
use marquee_server::state::AppState;
use marquee_server::{exercise, ws};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Configuration ---
    let config = ServerConfig::parse();

    // --- Tracing ---
    init_tracing(config.log_file.as_deref());

    tracing::info!(
        host = %config.host,
        port = config.port,
        width = config.width,
        height = config.height,
        assets_dir = %config.assets_dir.display(),
        "Loaded server configuration",
    );

    // --- Renderer ---
    let assets = AssetLibrary::new(&config.assets_dir, config.width, config.height);
    let renderer: Arc<dyn Renderer> = Arc::new(SimRenderer::new(assets));

    // --- Event bus ---
    let event_bus = Arc::new(EventBus::default());

    // --- Dispatcher ---
    let dispatcher = Dispatcher::start(
        renderer,
        Arc::clone(&event_bus),
        config.dispatcher_config(),
    );
    tracing::info!("Dispatcher started");

    // Put something useful on the display before any client arrives: the
    // address to reach the server at, or a plain ready note.
    let banner = local_ip().map_or_else(|| "Ready".to_string(), |ip| ip.to_string());
    dispatcher
        .submit(
            JobPayload::Text(TextOptions {
                text: banner,
                ..TextOptions::default()
            }),
            Priority::Normal,
        )
        .expect("dispatch loop just started");

    // --- WebSocket manager ---
    let ws_manager = Arc::new(ws::WsManager::new());

    // --- Heartbeat ---
    let heartbeat_handle = ws::start_heartbeat(Arc::clone(&ws_manager));

    // Spawn the event forwarder (announces idle transitions to clients).
    let forwarder = EventForwarder::new(Arc::clone(&ws_manager));
    let forwarder_handle = tokio::spawn(forwarder.run(event_bus.subscribe()));

    // --- App state ---
    let state = AppState {
        config: Arc::new(config.clone()),
        dispatcher: Arc::clone(&dispatcher),
        ws_manager: Arc::clone(&ws_manager),
    };

    // --- Router ---
    let app = build_app_router(state);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    // --- Exerciser ---
    if config.dry_run {
        tracing::info!("Dry-run mode, spawning the exerciser");
        tokio::spawn(exercise::run(config.port));
    }

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");

    // Stop the dispatcher first so the in-flight job gets its cooperative
    // cancellation while the event machinery is still alive.
    dispatcher.shutdown().await;
    tracing::info!("Dispatcher stopped");

    // Drop the event bus sender to close the broadcast channel.
    // This signals the forwarder to shut down.
    drop(event_bus);
    let _ = tokio::time::timeout(Duration::from_secs(5), forwarder_handle).await;
    tracing::info!("Event forwarder shut down");

    let ws_count = ws_manager.connection_count().await;
    tracing::info!(ws_count, "Closing remaining WebSocket connections");
    ws_manager.shutdown_all().await;

    heartbeat_handle.abort();
    tracing::info!("Heartbeat task stopped");

    tracing::info!("Graceful shutdown complete");
}

/// Initialize the tracing subscriber.
///
/// Logs go to stdout, or to `log_file` when one is configured (`--log`).
fn init_tracing(log_file: Option<&Path>) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        "marquee_server=debug,marquee_engine=debug,marquee_renderer=debug,tower_http=debug".into()
    });

    match log_file {
        Some(path) => {
            let file = std::fs::File::options()
                .create(true)
                .append(true)
                .open(path)
                .unwrap_or_else(|e| panic!("Failed to open log file {}: {e}", path.display()));
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_writer(Arc::new(file))
                        .with_ansi(false),
                )
                .init();
        }
        None => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
        }
    }
}

/// Best-effort local IPv4 discovery via a UDP connect probe.
///
/// No packet ever leaves the machine; connecting just makes the OS pick
/// the egress interface and address.
fn local_ip() -> Option<IpAddr> {
    let socket = UdpSocket::bind("0.0.0.0:0").ok()?;
    socket.connect("8.8.8.8:80").ok()?;
    socket.local_addr().ok().map(|local| local.ip())
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix) so the server
/// shuts down cleanly whether stopped interactively or by a process
/// manager (e.g. systemd, Docker, Kubernetes).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
