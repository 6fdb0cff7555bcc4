use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::Router;
use tokio::{net::TcpListener, sync::oneshot, task::JoinHandle};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

pub mod bus;
pub mod config;
pub mod convert;
pub mod handlers;
pub mod transform;
pub mod types;

use crate::bus::MessageBus;
use crate::config::Settings;
use crate::handlers::{AppState, SharedState, ingest};

/// Every method on every path lands in [`handlers::ingest`]; the gateway's
/// upload path is user-configurable on the device.
pub fn build_router(state: SharedState) -> Router {
    Router::new()
        .fallback(ingest)
        .with_state(state)
        .layer(
            TraceLayer::new_for_http().make_span_with(|req: &axum::http::Request<_>| {
                let request_id = req
                    .headers()
                    .get("x-request-id")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("-");
                tracing::info_span!(
                    "http",
                    %request_id,
                    method = %req.method(),
                    uri = %req.uri(),
                )
            }),
        )
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
}

/// A running listener. Dropping it leaves the server running; call
/// [`ServerHandle::stop`] to shut it down.
pub struct ServerHandle {
    local_addr: SocketAddr,
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<std::io::Result<()>>,
}

impl ServerHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stop accepting uploads and wait for in-flight requests to finish.
    pub async fn stop(self) -> anyhow::Result<()> {
        // the server may already have exited on its own
        let _ = self.shutdown.send(());
        self.task.await.context("server task panicked")??;
        tracing::info!(addr = %self.local_addr, "ecowitt-gateway stopped");
        Ok(())
    }
}

/// Bind the configured address and start serving uploads in the background.
pub async fn start(settings: Settings, bus: Arc<dyn MessageBus>) -> anyhow::Result<ServerHandle> {
    let addr = settings.listen_addr()?;
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("bind {addr}"))?;
    let local_addr = listener.local_addr()?;
    tracing::info!("ecowitt-gateway listening on http://{local_addr}");

    let app = build_router(AppState::new(settings.paths, bus));
    let (shutdown, shutdown_rx) = oneshot::channel::<()>();
    let task = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            })
            .await
    });

    Ok(ServerHandle {
        local_addr,
        shutdown,
        task,
    })
}
