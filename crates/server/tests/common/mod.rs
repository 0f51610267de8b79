//! Shared helpers for the server integration tests.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Method, Request};
use axum::response::Response;
use axum::Router;
use http_body_util::BodyExt;
use tower::ServiceExt;

use marquee_engine::Dispatcher;
use marquee_events::EventBus;
use marquee_renderer::{AssetLibrary, Renderer, SimRenderer};
use marquee_server::config::ServerConfig;
use marquee_server::router::build_app_router;
use marquee_server::state::AppState;
use marquee_server::ws::WsManager;

/// Build a test `ServerConfig` with safe defaults.
///
/// The assets directory does not need to exist: text and the generative
/// effects never touch it.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        width: 32,
        height: 32,
        assets_dir: "assets".into(),
        queue_depth: 50,
        stop_timeout_secs: 5,
        log_file: None,
        dry_run: false,
    }
}

/// Build the full application router with all middleware layers, backed by
/// a live dispatcher over the simulated renderer.
///
/// This mirrors the construction in `main.rs` so integration tests exercise
/// the same middleware stack (request ID, tracing, panic recovery) that
/// production uses.
pub fn build_test_app() -> Router {
    let config = test_config();

    let assets = AssetLibrary::new(&config.assets_dir, config.width, config.height);
    let renderer: Arc<dyn Renderer> = Arc::new(SimRenderer::new(assets));
    let event_bus = Arc::new(EventBus::default());
    let dispatcher = Dispatcher::start(renderer, event_bus, config.dispatcher_config());

    let state = AppState {
        config: Arc::new(config),
        dispatcher,
        ws_manager: Arc::new(WsManager::new()),
    };

    build_app_router(state)
}

/// Issue a GET request against the in-process app.
pub async fn get(app: Router, uri: &str) -> Response {
    app.oneshot(
        Request::builder()
            .method(Method::GET)
            .uri(uri)
            .body(Body::empty())
            .expect("request is well-formed"),
    )
    .await
    .expect("app never errors")
}

/// Collect a response body as JSON.
pub async fn body_json(response: Response) -> serde_json::Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body collects")
        .to_bytes();
    serde_json::from_slice(&bytes).expect("body is JSON")
}
