use std::sync::Arc;

use marquee_engine::Dispatcher;

use crate::config::ServerConfig;
use crate::ws::WsManager;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc`).
#[derive(Clone)]
pub struct AppState {
    /// Server configuration (matrix geometry, asset root, timeouts).
    pub config: Arc<ServerConfig>,
    /// The single-slot job dispatcher.
    pub dispatcher: Arc<Dispatcher>,
    /// WebSocket connection manager.
    pub ws_manager: Arc<WsManager>,
}
