//! Development server implementation.

use std::io;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use axum::{
    body::Body,
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Request, State,
    },
    http::{header, HeaderValue},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use tokio::sync::{broadcast, mpsc};
use tower_http::services::ServeDir;

use plinth_pipeline::styles::MIN_CSS_NAME;
use plinth_pipeline::{Pipeline, Task, TaskGraph};

use crate::watcher::{FileWatcher, WatchError};
use crate::websocket::{
    reload_client_script, ReloadHub, ReloadMessage, RELOAD_SCRIPT_PATH, RELOAD_SOCKET_PATH,
};

/// Configuration for the development server.
#[derive(Debug, Clone)]
pub struct DevServerConfig {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Open browser on start
    pub open: bool,
}

impl Default for DevServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            open: true,
        }
    }
}

/// Errors that can occur with the server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Invalid listen address '{0}'")]
    InvalidAddress(String),

    #[error("Failed to bind to {addr}: {source}")]
    Bind { addr: SocketAddr, source: io::Error },

    #[error(transparent)]
    Watch(#[from] WatchError),

    #[error("Server stopped: {0}")]
    Serve(io::Error),
}

/// Shared router state.
#[derive(Clone)]
struct AppState {
    hub: ReloadHub,
}

/// Development server: static files, live reload and rebuild-on-change.
pub struct DevServer {
    config: DevServerConfig,
    pipeline: Pipeline,
}

impl DevServer {
    pub fn new(config: DevServerConfig, pipeline: Pipeline) -> Self {
        Self { config, pipeline }
    }

    /// Serve until the process is terminated.
    pub async fn start(self) -> Result<(), ServerError> {
        let address = format!("{}:{}", self.config.host, self.config.port);
        let addr: SocketAddr = address
            .parse()
            .map_err(|_| ServerError::InvalidAddress(address.clone()))?;

        let hub = ReloadHub::new();
        let pipeline_config = self.pipeline.config();
        let graph = TaskGraph::new(pipeline_config);

        let root = pipeline_config
            .root
            .canonicalize()
            .unwrap_or_else(|_| pipeline_config.root.clone());
        let (watcher, rx) = FileWatcher::new(&graph.watch_roots(&root))?;

        let pipeline = self.pipeline.clone();
        let rebuild_hub = hub.clone();
        tokio::spawn(async move {
            rebuild_loop(pipeline, graph, root, rebuild_hub, rx).await;
            // Keep watcher alive
            drop(watcher);
        });

        let out_dir = pipeline_config.out_dir();
        let app = router(&out_dir, hub);

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::Bind { addr, source: e })?;

        let url = format!("http://{}", addr);
        tracing::info!("Serving {} at {}", out_dir.display(), url);

        if self.config.open {
            if let Err(e) = open::that(&url) {
                tracing::warn!("Failed to open browser: {}", e);
            }
        }

        axum::serve(listener, app).await.map_err(ServerError::Serve)
    }
}

/// Static files from `out_dir` plus the live-reload endpoints.
fn router(out_dir: &Path, hub: ReloadHub) -> Router {
    Router::new()
        .route(RELOAD_SOCKET_PATH, get(ws_handler))
        .route(RELOAD_SCRIPT_PATH, get(script_handler))
        .fallback_service(ServeDir::new(out_dir))
        .layer(middleware::from_fn(inject_reload_script))
        .with_state(AppState { hub })
}

/// Run affected tasks for every batch of changed paths.
async fn rebuild_loop(
    pipeline: Pipeline,
    graph: TaskGraph,
    root: PathBuf,
    hub: ReloadHub,
    mut rx: mpsc::Receiver<Vec<PathBuf>>,
) {
    while let Some(batch) = rx.recv().await {
        let relative = relative_paths(&root, &batch);
        let tasks = graph.affected_by_all(relative.iter().map(PathBuf::as_path));
        if tasks.is_empty() {
            continue;
        }

        tracing::info!(
            "{} changed, running {}",
            relative
                .iter()
                .map(|p| p.display().to_string())
                .collect::<Vec<_>>()
                .join(", "),
            tasks
                .iter()
                .map(|t| t.name())
                .collect::<Vec<_>>()
                .join(", ")
        );

        // Rebuilds may overlap
        let pipeline = pipeline.clone();
        let hub = hub.clone();
        tokio::spawn(async move {
            match pipeline.run(&tasks).await {
                Ok(_) => hub.send(reload_message(&tasks)),
                Err(e) => tracing::error!("Rebuild failed: {}", e),
            }
        });
    }
}

/// Changed paths relative to the project root; paths outside it are dropped.
fn relative_paths(root: &Path, paths: &[PathBuf]) -> Vec<PathBuf> {
    paths
        .iter()
        .filter_map(|p| p.strip_prefix(root).ok().map(Path::to_path_buf))
        .collect()
}

/// Stylesheet-only rebuilds refresh CSS in place; anything else reloads.
fn reload_message(tasks: &[Task]) -> ReloadMessage {
    if tasks == [Task::Styles] {
        ReloadMessage::Css {
            path: format!("/css/{}", MIN_CSS_NAME),
        }
    } else {
        ReloadMessage::Reload
    }
}

/// Add the client script to every successful HTML response.
async fn inject_reload_script(request: Request, next: Next) -> Response {
    let response = next.run(request).await;

    let is_html = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("text/html"));
    if !is_html || !response.status().is_success() {
        return response;
    }

    let (mut parts, body) = response.into_parts();
    let bytes = match axum::body::to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!("Failed to buffer HTML response: {}", e);
            return Response::from_parts(parts, Body::empty());
        }
    };

    let html = inject_script(&String::from_utf8_lossy(&bytes));
    parts.headers.remove(header::CONTENT_LENGTH);
    parts
        .headers
        .insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));

    Response::from_parts(parts, Body::from(html))
}

/// Insert the script tag before the last `</body>`, or append it.
pub fn inject_script(html: &str) -> String {
    let tag = format!(r#"<script src="{}"></script>"#, RELOAD_SCRIPT_PATH);

    match html.to_ascii_lowercase().rfind("</body>") {
        Some(pos) => format!("{}{}{}", &html[..pos], tag, &html[pos..]),
        None => format!("{}{}", html, tag),
    }
}

/// Handler for the live-reload WebSocket endpoint.
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_ws(socket, state.hub))
}

/// Forward hub messages to one browser until either side goes away.
async fn handle_ws(mut socket: WebSocket, hub: ReloadHub) {
    let mut rx = hub.subscribe();

    if send(&mut socket, &ReloadMessage::Connected).await.is_err() {
        return;
    }

    loop {
        match rx.recv().await {
            Ok(msg) => {
                if send(&mut socket, &msg).await.is_err() {
                    break;
                }
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::debug!("Live-reload client skipped {} messages", skipped);
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

async fn send(socket: &mut WebSocket, msg: &ReloadMessage) -> Result<(), axum::Error> {
    let json = serde_json::to_string(msg).map_err(axum::Error::new)?;
    socket.send(Message::Text(json.into())).await
}

/// Handler for the live-reload client script.
async fn script_handler() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "application/javascript")],
        reload_client_script(),
    )
}
