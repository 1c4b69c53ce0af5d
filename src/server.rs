//!
//! docfs HTTP server
//! -----------------
//! Thin Axum adapter over `Namespace`. It parses request parameters into a
//! `Command`, runs it on the blocking pool, and renders the outcome as JSON
//! or as a streamed payload.
//!
//! Routes:
//! - `GET  /filemanager?mode=...` runs one operation from the closed command table.
//! - `POST /filemanager/upload?currentpath=..&filename=..` stores the raw body as a new file.
//! - `GET  /files/{*path}` streams a file's payload inline.
//! - `GET  /stats` reports rename collision and rollback counters.

use std::collections::HashMap;
use std::sync::Arc;

use axum::body::{Body, Bytes};
use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use tracing::{error, info, warn};

use crate::command::{dispatch, Command, Outcome};
use crate::config::ServerConfig;
use crate::error::{FsError, FsResult};
use crate::namespace::Namespace;
use crate::storage::{
    ChunkReader, DirContentStore, MemoryContentStore, MemoryStore, PersistenceSettings, SharedContentStore, StoreSettings,
};

/// Shared server state injected into all handlers.
#[derive(Clone)]
pub struct AppState {
    pub namespace: Arc<Namespace>,
    /// Store to snapshot on shutdown, when running with a data directory.
    pub snapshot_store: Option<MemoryStore>,
}

impl AppState {
    pub fn new(namespace: Arc<Namespace>) -> Self { Self { namespace, snapshot_store: None } }
}

/// Error wrapper rendering `{ "error": FsError }` with the mapped status.
#[derive(Debug)]
pub struct ApiError(pub FsError);

impl From<FsError> for ApiError {
    fn from(e: FsError) -> Self { ApiError(e) }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            error!(target: "docfs::http", "request failed: {}", self.0);
        }
        (status, Json(json!({ "error": self.0 }))).into_response()
    }
}

/// Run a namespace call on the blocking pool; store calls may block on I/O.
async fn blocking<T, F>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> FsResult<T> + Send + 'static,
    T: Send + 'static,
{
    match tokio::task::spawn_blocking(f).await {
        Ok(res) => res.map_err(ApiError),
        Err(e) => Err(ApiError(FsError::internal("task_failed", e.to_string()))),
    }
}

fn required(params: &HashMap<String, String>, key: &str) -> Result<String, ApiError> {
    params
        .get(key)
        .cloned()
        .ok_or_else(|| ApiError(FsError::invalid("missing_parameter", format!("Missing parameter '{}'", key))))
}

/// Pump a blocking chunk reader through a bounded channel into a response body.
fn content_body(reader: ChunkReader) -> Body {
    let (tx, rx) = tokio::sync::mpsc::channel::<std::io::Result<Vec<u8>>>(4);
    tokio::task::spawn_blocking(move || {
        for chunk in reader {
            if tx.blocking_send(chunk).is_err() {
                // Client went away.
                break;
            }
        }
    });
    let stream = futures_util::stream::unfold(rx, |mut rx| async move { rx.recv().await.map(|chunk| (chunk, rx)) });
    Body::from_stream(stream)
}

fn content_response(filename: &str, content_type: Option<String>, reader: ChunkReader, attachment: bool) -> Response {
    let mut headers = HeaderMap::new();
    let ct = content_type.unwrap_or_else(|| "application/octet-stream".to_string());
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(&ct).unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream")),
    );
    if attachment {
        let disposition = format!("attachment; filename=\"{}\"", filename.replace('"', ""));
        if let Ok(v) = HeaderValue::from_str(&disposition) {
            headers.insert(header::CONTENT_DISPOSITION, v);
        }
    }
    (StatusCode::OK, headers, content_body(reader)).into_response()
}

async fn filemanager(State(state): State<AppState>, Query(params): Query<HashMap<String, String>>) -> Result<Response, ApiError> {
    let cmd = Command::parse(&params)?;
    let ns = state.namespace.clone();
    let outcome = blocking(move || dispatch(&ns, cmd)).await?;
    Ok(match outcome {
        Outcome::Reply(reply) => Json(reply).into_response(),
        Outcome::Content { filename, content_type, reader, .. } => content_response(&filename, content_type, reader, true),
    })
}

async fn upload(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    let parent = required(&params, "currentpath")?;
    let filename = required(&params, "filename")?;
    let content_type = headers.get(header::CONTENT_TYPE).and_then(|v| v.to_str().ok()).map(|s| s.to_string());
    let ns = state.namespace.clone();
    let entry = blocking(move || ns.upload(&parent, &filename, &body, content_type.as_deref())).await?;
    let reply = json!({
        "path": entry.path(),
        "parent": entry.folder_path,
        "name": entry.file.filename,
    });
    Ok((StatusCode::CREATED, Json(reply)).into_response())
}

async fn download(State(state): State<AppState>, Path(path): Path<String>) -> Result<Response, ApiError> {
    let full = format!("/{}", path);
    let ns = state.namespace.clone();
    let (info, reader) = blocking(move || {
        let reader = ns.read_content(&full)?;
        Ok((ns.info(&full)?, reader))
    })
    .await?;
    Ok(content_response(&info.name, info.content_type, reader, false))
}

async fn stats(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.namespace.rename_stats())
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(|| async { "docfs ok" }))
        .route("/filemanager", get(filemanager))
        .route("/filemanager/upload", post(upload))
        .route("/files/{*path}", get(download))
        .route("/stats", get(stats))
        .with_state(state)
}

/// Build the stores named by the configuration and open the namespace.
pub fn build_state(cfg: &ServerConfig) -> anyhow::Result<AppState> {
    let settings = StoreSettings {
        name: "main".to_string(),
        enforce_unique_paths: cfg.enforce_unique_paths,
        persistence: Some(PersistenceSettings { enabled: cfg.snapshot_interval_ms > 0, interval_ms: cfg.snapshot_interval_ms }),
    };
    let (store, content): (MemoryStore, SharedContentStore) = match &cfg.data_dir {
        Some(dir) => {
            let store = MemoryStore::open(dir.join("store"), settings)?;
            let content = DirContentStore::open(dir.join("content"), "main")?;
            info!(target: "startup", "data directory {} ({} documents loaded)", dir.display(), store.len());
            (store, Arc::new(content))
        }
        None => {
            warn!(target: "startup", "no data directory configured; namespace is in-memory only");
            (MemoryStore::new(settings), Arc::new(MemoryContentStore::new("main")))
        }
    };
    let namespace = Namespace::open(Arc::new(store.clone()), content, cfg.namespace.clone())?;
    let snapshot_store = cfg.data_dir.as_ref().map(|_| store);
    Ok(AppState { namespace: Arc::new(namespace), snapshot_store })
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(target: "startup", "failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!(target: "startup", "shutdown requested");
}

/// Start the docfs HTTP server and block until shutdown.
pub async fn run(cfg: ServerConfig) -> anyhow::Result<()> {
    let state = build_state(&cfg)?;
    let snapshot_store = state.snapshot_store.clone();
    let app = router(state);

    let addr = cfg.socket_addr();
    info!(target: "startup", "Starting docfs on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;

    if let Some(store) = snapshot_store {
        match store.save_snapshot() {
            Ok(()) => info!(target: "startup", "final snapshot saved ({} documents)", store.len()),
            Err(e) => error!(target: "startup", "final snapshot failed: {}", e),
        }
    }
    Ok(())
}
