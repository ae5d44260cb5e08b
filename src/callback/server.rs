//! HTTP server receiving decisions from the approval service.
//!
//! The suspend/resume gate registers `{base_url}/{node_id}` with the service.
//! When a reviewer decides, the service POSTs the callback payload there; the
//! server queues it and wakes whoever is waiting on that node.
//!
//! ## Endpoints
//!
//! | Method | Path          | Purpose                        |
//! |--------|---------------|--------------------------------|
//! | `GET`  | `/health`     | liveness, answers `ok`         |
//! | `POST` | `/{*path}`    | decision callback for one node |
//!
//! The node id is the last path segment, so a public URL with a path prefix
//! (`https://tunnel/hooks`, forwarded unchanged) still reaches the right
//! node. An empty body is accepted and treated as an approval without
//! details.

use crate::callback::types::{CallbackPayload, ResumeEvent};
use anyhow::{Context, Result};
use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Router,
};
use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{oneshot, Notify, RwLock};

/// Oldest callbacks are dropped beyond this many unclaimed events.
const DEFAULT_MAX_EVENTS: usize = 1_000;

#[derive(Debug)]
pub(crate) struct ServerState {
    pub(crate) events: VecDeque<ResumeEvent>,
    pub(crate) running: bool,
    pub(crate) max_events: usize,
}

impl Default for ServerState {
    fn default() -> Self {
        Self {
            events: VecDeque::new(),
            running: false,
            max_events: DEFAULT_MAX_EVENTS,
        }
    }
}

impl ServerState {
    fn push_event(&mut self, event: ResumeEvent) {
        if self.events.len() >= self.max_events {
            self.events.pop_front();
        }
        self.events.push_back(event);
    }

    fn take_for(&mut self, node_id: &str) -> Option<ResumeEvent> {
        let pos = self.events.iter().position(|e| e.node_id == node_id)?;
        self.events.remove(pos)
    }
}

#[derive(Clone)]
struct AppState {
    inner: Arc<RwLock<ServerState>>,
    notify: Arc<Notify>,
}

pub struct CallbackServer {
    state: Arc<RwLock<ServerState>>,
    notify: Arc<Notify>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    addr: Option<SocketAddr>,
}

impl Default for CallbackServer {
    fn default() -> Self {
        Self::new()
    }
}

impl CallbackServer {
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(ServerState::default())),
            notify: Arc::new(Notify::new()),
            shutdown_tx: None,
            addr: None,
        }
    }

    /// Bind `bind` (e.g. `127.0.0.1:0`) and serve in the background.
    /// Returns the base URL callbacks should be sent to.
    pub async fn start(&mut self, bind: &str) -> Result<String> {
        let listener = TcpListener::bind(bind)
            .await
            .with_context(|| format!("Failed to bind callback server on {}", bind))?;
        let addr = listener
            .local_addr()
            .context("Failed to get callback server address")?;
        self.addr = Some(addr);

        self.state.write().await.running = true;

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        self.shutdown_tx = Some(shutdown_tx);

        let app = build_router(AppState {
            inner: self.state.clone(),
            notify: self.notify.clone(),
        });

        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
            {
                tracing::error!("Callback server error: {}", e);
            }
        });

        tracing::info!("Callback server listening on {}", addr);
        Ok(format!("http://{}", addr))
    }

    pub async fn stop(&mut self) -> Result<()> {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        self.state.write().await.running = false;
        self.addr = None;
        Ok(())
    }

    pub async fn is_running(&self) -> bool {
        self.state.read().await.running
    }

    pub fn addr(&self) -> Option<SocketAddr> {
        self.addr
    }

    /// Wait for the callback addressed to `node_id`. Returns `None` once
    /// `timeout` passes without one.
    pub async fn wait_for(&self, node_id: &str, timeout: Duration) -> Option<ResumeEvent> {
        let wait = async {
            loop {
                // Register before checking so a callback landing in between
                // still wakes us.
                let notified = self.notify.notified();
                if let Some(event) = self.state.write().await.take_for(node_id) {
                    return event;
                }
                notified.await;
            }
        };
        tokio::time::timeout(timeout, wait).await.ok()
    }

    /// Wait for the next callback for any node.
    pub async fn next_event(&self) -> ResumeEvent {
        loop {
            let notified = self.notify.notified();
            if let Some(event) = self.state.write().await.events.pop_front() {
                return event;
            }
            notified.await;
        }
    }

    pub async fn event_count(&self) -> usize {
        self.state.read().await.events.len()
    }

    /// Queue a callback received by other means, waking any waiter.
    pub async fn deliver(&self, node_id: impl Into<String>, payload: CallbackPayload) {
        let event = ResumeEvent {
            node_id: node_id.into(),
            payload,
        };
        push_and_notify(&self.state, &self.notify, event).await;
    }
}

async fn push_and_notify(state: &RwLock<ServerState>, notify: &Notify, event: ResumeEvent) {
    state.write().await.push_event(event);
    notify.notify_waiters();
}

fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/{*path}", post(callback_handler))
        .with_state(state)
}

async fn health_handler() -> &'static str {
    "ok"
}

async fn callback_handler(
    State(state): State<AppState>,
    Path(path): Path<String>,
    body: Bytes,
) -> StatusCode {
    let Some(node_id) = path.rsplit('/').find(|segment| !segment.is_empty()) else {
        return StatusCode::NOT_FOUND;
    };
    let node_id = node_id.to_string();

    let payload = if body.iter().all(u8::is_ascii_whitespace) {
        CallbackPayload::default()
    } else {
        match serde_json::from_slice::<CallbackPayload>(&body) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!("Rejected callback for node {}: {}", node_id, e);
                return StatusCode::BAD_REQUEST;
            }
        }
    };

    tracing::info!(
        "Callback for node {}: state={}",
        node_id,
        payload.state.as_deref().unwrap_or("<none>")
    );

    push_and_notify(&state.inner, &state.notify, ResumeEvent { node_id, payload }).await;
    StatusCode::OK
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    fn test_router() -> (Router, CallbackServer) {
        let server = CallbackServer::new();
        let router = build_router(AppState {
            inner: server.state.clone(),
            notify: server.notify.clone(),
        });
        (router, server)
    }

    fn post(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let (app, _server) = test_router();
        let request = Request::builder()
            .method("GET")
            .uri("/health")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"ok");
    }

    #[tokio::test]
    async fn test_callback_is_queued_per_node() {
        let (app, server) = test_router();
        let response = app
            .oneshot(post(
                "/node-7",
                r#"{"state":"declined","traceId":"t1","reviewTaskId":"rt-1"}"#,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(server.event_count().await, 1);

        let event = server
            .wait_for("node-7", Duration::from_millis(50))
            .await
            .unwrap();
        assert_eq!(event.payload.state.as_deref(), Some("declined"));
        assert_eq!(event.payload.trace_id.as_deref(), Some("t1"));
        assert_eq!(server.event_count().await, 0);
    }

    #[tokio::test]
    async fn test_node_id_is_the_last_path_segment() {
        let (app, server) = test_router();
        let response = app
            .clone()
            .oneshot(post("/hooks/node-7", r#"{"state":"approved"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let response = app.oneshot(post("/a/b/node-8/", "{}")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let event = server
            .wait_for("node-7", Duration::from_millis(50))
            .await
            .unwrap();
        assert_eq!(event.payload.state.as_deref(), Some("approved"));
        assert!(server
            .wait_for("node-8", Duration::from_millis(50))
            .await
            .is_some());
    }

    #[tokio::test]
    async fn test_delivered_event_wakes_waiter() {
        let server = Arc::new(CallbackServer::new());
        let waiter = {
            let server = server.clone();
            tokio::spawn(async move { server.wait_for("node-3", Duration::from_secs(5)).await })
        };
        tokio::task::yield_now().await;
        let payload = CallbackPayload {
            state: Some("declined".to_string()),
            ..Default::default()
        };
        server.deliver("node-3", payload).await;

        let event = waiter.await.unwrap().unwrap();
        assert_eq!(event.payload.state.as_deref(), Some("declined"));
    }

    #[tokio::test]
    async fn test_empty_body_is_accepted() {
        let (app, server) = test_router();
        let response = app.oneshot(post("/node-1", "")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let event = server.next_event().await;
        assert_eq!(event.node_id, "node-1");
        assert_eq!(event.payload, CallbackPayload::default());
    }

    #[tokio::test]
    async fn test_malformed_body_is_rejected() {
        let (app, server) = test_router();
        let response = app.oneshot(post("/node-1", "{oops")).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(server.event_count().await, 0);
    }

    #[tokio::test]
    async fn test_wait_for_other_node_times_out() {
        let (app, server) = test_router();
        app.oneshot(post("/node-a", "{}")).await.unwrap();
        assert!(server
            .wait_for("node-b", Duration::from_millis(20))
            .await
            .is_none());
        assert_eq!(server.event_count().await, 1);
    }

    #[tokio::test]
    async fn test_waiter_is_woken_by_later_callback() {
        let (app, server) = test_router();
        let server = Arc::new(server);
        let waiter = {
            let server = server.clone();
            tokio::spawn(async move { server.wait_for("node-9", Duration::from_secs(5)).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        app.oneshot(post("/node-9", r#"{"state":"approved"}"#))
            .await
            .unwrap();

        let event = waiter.await.unwrap().unwrap();
        assert_eq!(event.node_id, "node-9");
    }

    #[tokio::test]
    async fn test_server_start_stop() {
        let mut server = CallbackServer::new();
        match server.start("127.0.0.1:0").await {
            Ok(url) => {
                assert!(url.starts_with("http://127.0.0.1:"));
                assert!(server.is_running().await);
                server.stop().await.unwrap();
                assert!(!server.is_running().await);
                assert!(server.addr().is_none());
            }
            Err(e) => {
                // Sandboxed environments may forbid binding
                let chain = format!("{:?}", e);
                if chain.contains("Operation not permitted") || chain.contains("Permission denied") {
                    eprintln!("Skipping test_server_start_stop (sandbox): {:?}", e);
                    return;
                }
                panic!("Unexpected error: {:?}", e);
            }
        }
    }
}
