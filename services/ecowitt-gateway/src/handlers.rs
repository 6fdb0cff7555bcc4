use std::sync::Arc;

use axum::{
    body::{Body, to_bytes},
    extract::State,
    http::{HeaderMap, Method, StatusCode},
};

use crate::bus::{MessageBus, SOURCE_ID};
use crate::config::PathMapping;
use crate::transform::transform;
use crate::types::{Delta, RawReading};

pub struct AppState {
    pub paths: PathMapping,
    pub bus: Arc<dyn MessageBus>,
}

pub type SharedState = Arc<AppState>;

impl AppState {
    pub fn new(paths: PathMapping, bus: Arc<dyn MessageBus>) -> SharedState {
        Arc::new(Self { paths, bus })
    }

    fn forward(&self, reading: &RawReading) -> anyhow::Result<usize> {
        let batch = transform(reading, &self.paths);
        let values = batch.len();
        self.bus.handle_message(SOURCE_ID, Delta::from(batch))?;
        Ok(values)
    }
}

/// Accepts an upload on any path. The gateway always gets an empty `200`;
/// conversion and publishing happen after the reply. Bodies are read
/// unbounded and only for POST.
pub async fn ingest(
    State(state): State<SharedState>,
    method: Method,
    headers: HeaderMap,
    body: Body,
) -> StatusCode {
    if method != Method::POST {
        return StatusCode::OK;
    }

    let request_id = headers
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-")
        .to_string();
    let body = match to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(%request_id, error = %e, "upload body unreadable");
            return StatusCode::OK;
        }
    };
    let reading = RawReading::from_form(&body);
    tracing::debug!(%request_id, fields = reading.len(), "upload received");

    tokio::spawn(async move {
        match state.forward(&reading) {
            Ok(values) => tracing::debug!(%request_id, values, "delta emitted"),
            Err(e) => tracing::error!(%request_id, error = %e, "delta emit failed"),
        }
    });

    StatusCode::OK
}
