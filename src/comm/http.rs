// Copyright (c) 2026 edgebridge contributors
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/edgebridge/edgebridge

//! HTTP edge communication adapter

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::store::EdgeEventPayload;

use super::{
    already_started, build_phase_publisher, deliver, EdgeCommAdapter, EventSink, PhasePayload,
    PhasePublisher,
};

#[derive(Clone)]
struct IngestState {
    sink: EventSink,
    decode_errors: Arc<AtomicU64>,
}

/// Listens for `POST /edge/events` and publishes the phase over HTTP
/// (or MQTT when the publish backend is crossed).
pub struct HttpEdgeCommAdapter {
    host: String,
    port: u16,
    grace: Duration,
    service_name: String,
    started: AtomicBool,
    stopping: AtomicBool,
    shutdown: Mutex<Option<oneshot::Sender<()>>>,
    server: Mutex<Option<JoinHandle<()>>>,
    publisher: PhasePublisher,
    publisher_driver: Mutex<Option<JoinHandle<()>>>,
    decode_errors: Arc<AtomicU64>,
}

impl HttpEdgeCommAdapter {
    pub fn new(config: &Arc<Config>) -> Result<Self> {
        let (publisher, publisher_driver) = build_phase_publisher(config, None)?;
        Ok(Self {
            host: config.edge_event_host.clone(),
            port: config.edge_event_port,
            grace: config.shutdown_grace,
            service_name: config.service_name.clone(),
            started: AtomicBool::new(false),
            stopping: AtomicBool::new(false),
            shutdown: Mutex::new(None),
            server: Mutex::new(None),
            publisher,
            publisher_driver: Mutex::new(publisher_driver),
            decode_errors: Arc::new(AtomicU64::new(0)),
        })
    }

    pub fn decode_error_count(&self) -> u64 {
        self.decode_errors.load(Ordering::Relaxed)
    }
}

async fn ingest(
    State(state): State<IngestState>,
    payload: std::result::Result<Json<EdgeEventPayload>, JsonRejection>,
) -> (StatusCode, Json<Value>) {
    let Json(payload) = match payload {
        Ok(payload) => payload,
        Err(rejection) => {
            state.decode_errors.fetch_add(1, Ordering::Relaxed);
            warn!("invalid edge event payload: {}", rejection.body_text());
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({"ok": false, "reason": rejection.body_text()})),
            );
        }
    };

    match deliver(&state.sink, payload) {
        // Age-rejected events still answer 200 so edges do not retry-storm.
        Some(true) => (StatusCode::OK, Json(json!({"ok": true}))),
        Some(false) => (
            StatusCode::OK,
            Json(json!({"ok": false, "reason": "event rejected"})),
        ),
        None => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"ok": false, "reason": "internal error"})),
        ),
    }
}

#[async_trait]
impl EdgeCommAdapter for HttpEdgeCommAdapter {
    async fn start_event_ingestion(&self, sink: EventSink) -> Result<()> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(already_started());
        }

        let state = IngestState {
            sink,
            decode_errors: Arc::clone(&self.decode_errors),
        };
        let app = Router::new()
            .route("/edge/events", post(ingest))
            .with_state(state);

        let addr = format!("{}:{}", self.host, self.port);
        let listener = tokio::net::TcpListener::bind(addr.as_str())
            .await
            .map_err(|e| Error::Transport(format!("failed to bind {addr}: {e}")))?;
        info!("edge event server listening on http://{addr}");

        let (tx, rx) = oneshot::channel::<()>();
        let handle = tokio::spawn(async move {
            let shutdown = async {
                let _ = rx.await;
            };
            if let Err(e) = axum::serve(listener, app)
                .with_graceful_shutdown(shutdown)
                .await
            {
                error!("edge event server error: {e}");
            }
        });

        *self.shutdown.lock().unwrap() = Some(tx);
        *self.server.lock().unwrap() = Some(handle);
        Ok(())
    }

    async fn publish_phase(&self, phase: &str, timestamp: f64) -> bool {
        let payload = PhasePayload {
            phase: phase.to_string(),
            timestamp,
            service: self.service_name.clone(),
        };
        self.publisher.publish(&payload).await
    }

    async fn stop(&self) {
        if self.stopping.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Some(tx) = self.shutdown.lock().unwrap().take() {
            let _ = tx.send(());
        }
        let server = self.server.lock().unwrap().take();
        if let Some(handle) = server {
            let abort = handle.abort_handle();
            if tokio::time::timeout(self.grace, handle).await.is_err() {
                warn!("edge event server did not stop within grace period, aborting");
                abort.abort();
            }
        }
        let driver = self.publisher_driver.lock().unwrap().take();
        if let Some(handle) = driver {
            handle.abort();
        }
        info!("HTTP adapter stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::EdgeEventStore;
    use chrono::Utc;

    fn ingest_state(store: &Arc<EdgeEventStore>) -> IngestState {
        let store = Arc::clone(store);
        IngestState {
            sink: Arc::new(move |payload| store.add_event(payload)),
            decode_errors: Arc::new(AtomicU64::new(0)),
        }
    }

    #[tokio::test]
    async fn accepted_event_lands_in_store() {
        let store = Arc::new(EdgeEventStore::new(60.0, 2.0));
        let state = ingest_state(&store);

        let payload = EdgeEventPayload {
            camera_id: "cam01".to_string(),
            timestamp: Utc::now().timestamp() as f64,
            detections: vec![],
            models: vec![],
        };
        let (status, Json(body)) = ingest(State(state), Ok(Json(payload))).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ok"], json!(true));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn aged_event_answers_ok_false_and_skips_store() {
        let store = Arc::new(EdgeEventStore::new(60.0, 2.0));
        let state = ingest_state(&store);

        let payload = EdgeEventPayload {
            camera_id: "cam01".to_string(),
            timestamp: Utc::now().timestamp() as f64 - 120.0,
            detections: vec![],
            models: vec![],
        };
        let (status, Json(body)) = ingest(State(state), Ok(Json(payload))).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ok"], json!(false));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn panicking_sink_leaves_store_unchanged() {
        let store = Arc::new(EdgeEventStore::new(60.0, 2.0));
        let state = IngestState {
            sink: Arc::new(|_payload| panic!("receiver bug")),
            decode_errors: Arc::new(AtomicU64::new(0)),
        };

        let payload = EdgeEventPayload {
            camera_id: "cam01".to_string(),
            timestamp: Utc::now().timestamp() as f64,
            detections: vec![],
            models: vec![],
        };
        let (status, _body) = ingest(State(state), Ok(Json(payload))).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(store.is_empty());
    }
}
