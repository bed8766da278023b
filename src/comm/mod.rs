// Copyright (c) 2026 edgebridge contributors
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/edgebridge/edgebridge

//! Edge communication adapters - transport-agnostic ingestion and phase publish

mod http;
mod mqtt;

pub use http::HttpEdgeCommAdapter;
pub use mqtt::MqttEdgeCommAdapter;

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{error, warn};

use crate::config::{Backend, Config};
use crate::error::{Error, Result};
use crate::store::EdgeEventPayload;

/// Callback invoked once per accepted inbound message. Returns whether the
/// event was admitted by the receiver (age-rejected events return false).
pub type EventSink = Arc<dyn Fn(EdgeEventPayload) -> bool + Send + Sync>;

/// Unifies edge-event ingestion and phase publishing over one transport.
#[async_trait]
pub trait EdgeCommAdapter: Send + Sync {
    /// Start receiving edge events and forward decoded payloads to `sink`.
    /// Callable once; a second call fails.
    async fn start_event_ingestion(&self, sink: EventSink) -> Result<()>;

    /// Publish the current phase. Returns true when the transport accepted
    /// the send; never errors.
    async fn publish_phase(&self, phase: &str, timestamp: f64) -> bool;

    /// Release transport resources. Idempotent.
    async fn stop(&self);
}

/// Build the adapter for the configured ingestion backend.
pub fn build_adapter(config: &Arc<Config>) -> Result<Arc<dyn EdgeCommAdapter>> {
    match config.edge_event_backend {
        Backend::Http => Ok(Arc::new(HttpEdgeCommAdapter::new(config)?)),
        Backend::Mqtt => Ok(Arc::new(MqttEdgeCommAdapter::new(config)?)),
    }
}

/// Retained phase-publish payload.
#[derive(Debug, Clone, Serialize)]
pub struct PhasePayload {
    pub phase: String,
    pub timestamp: f64,
    pub service: String,
}

/// Phase publish backends shared by both adapters. The publish backend may
/// cross the ingestion backend (HTTP ingest with MQTT publish and vice versa).
pub(crate) enum PhasePublisher {
    Mqtt(mqtt::MqttPublisher),
    Http(HttpPublisher),
    Disabled { reason: String },
}

impl PhasePublisher {
    pub(crate) async fn publish(&self, payload: &PhasePayload) -> bool {
        match self {
            PhasePublisher::Mqtt(publisher) => publisher.publish(payload).await,
            PhasePublisher::Http(publisher) => publisher.publish(payload).await,
            PhasePublisher::Disabled { reason } => {
                warn!("phase publish unavailable: {reason}");
                false
            }
        }
    }
}

/// Phase publisher POSTing to `PHASE_HTTP_BASE_URL/<topic>`.
pub(crate) struct HttpPublisher {
    client: reqwest::Client,
    url: String,
}

impl HttpPublisher {
    pub(crate) fn new(config: &Config) -> Option<Self> {
        let base_url = config.phase_http.base_url.as_deref()?;
        let client = reqwest::Client::builder()
            .timeout(config.phase_http.timeout)
            .build()
            .ok()?;
        Some(Self {
            client,
            url: format!(
                "{}/{}",
                base_url.trim_end_matches('/'),
                config.mqtt.phase_topic
            ),
        })
    }

    async fn publish(&self, payload: &PhasePayload) -> bool {
        match self.client.post(&self.url).json(payload).send().await {
            Ok(response) if response.status().is_success() => true,
            Ok(response) => {
                warn!(status = %response.status(), "phase publish rejected");
                false
            }
            Err(e) => {
                warn!("phase publish failed: {e}");
                false
            }
        }
    }
}

/// Build the configured phase publisher for an adapter. `shared_mqtt` is the
/// ingestion client when the adapter already owns one.
pub(crate) fn build_phase_publisher(
    config: &Config,
    shared_mqtt: Option<mqtt::MqttPublisher>,
) -> Result<(PhasePublisher, Option<tokio::task::JoinHandle<()>>)> {
    match config.phase_publish_backend {
        Backend::Http => match HttpPublisher::new(config) {
            Some(publisher) => Ok((PhasePublisher::Http(publisher), None)),
            None => Ok((
                PhasePublisher::Disabled {
                    reason: "PHASE_HTTP_BASE_URL not configured".to_string(),
                },
                None,
            )),
        },
        Backend::Mqtt => match shared_mqtt {
            Some(publisher) => Ok((PhasePublisher::Mqtt(publisher), None)),
            None => {
                let (publisher, driver) = mqtt::MqttPublisher::standalone(config);
                Ok((PhasePublisher::Mqtt(publisher), Some(driver)))
            }
        },
    }
}

/// Invoke the ingestion sink, swallowing panics so a faulty receiver cannot
/// take the transport down. Returns `None` when the sink panicked.
pub(crate) fn deliver(sink: &EventSink, payload: EdgeEventPayload) -> Option<bool> {
    match catch_unwind(AssertUnwindSafe(|| sink(payload))) {
        Ok(accepted) => Some(accepted),
        Err(_) => {
            error!("edge event sink panicked; event dropped");
            None
        }
    }
}

pub(crate) fn already_started() -> Error {
    Error::Transport("event ingestion already started".to_string())
}

#[cfg(test)]
pub mod testing {
    //! Adapter double for unit tests.

    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;

    use super::*;

    /// Records phase publishes; accepts every send.
    #[derive(Default)]
    pub struct NullAdapter {
        started: AtomicBool,
        stopped: AtomicUsize,
        pub published: Mutex<Vec<(String, f64)>>,
        pub reject_publish: AtomicBool,
    }

    #[async_trait]
    impl EdgeCommAdapter for NullAdapter {
        async fn start_event_ingestion(&self, _sink: EventSink) -> Result<()> {
            if self.started.swap(true, Ordering::SeqCst) {
                return Err(already_started());
            }
            Ok(())
        }

        async fn publish_phase(&self, phase: &str, timestamp: f64) -> bool {
            self.published
                .lock()
                .unwrap()
                .push((phase.to_string(), timestamp));
            !self.reject_publish.load(Ordering::SeqCst)
        }

        async fn stop(&self) {
            self.stopped.fetch_add(1, Ordering::SeqCst);
        }
    }

    impl NullAdapter {
        pub fn publish_count(&self) -> usize {
            self.published.lock().unwrap().len()
        }

        pub fn stop_count(&self) -> usize {
            self.stopped.load(Ordering::SeqCst)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deliver_swallows_sink_panics() {
        let sink: EventSink = Arc::new(|_payload| panic!("boom"));
        let payload = EdgeEventPayload {
            camera_id: "cam01".to_string(),
            timestamp: 0.0,
            detections: vec![],
            models: vec![],
        };
        assert_eq!(deliver(&sink, payload), None);
    }

    #[tokio::test]
    async fn second_ingestion_start_fails() {
        let adapter = testing::NullAdapter::default();
        let sink: EventSink = Arc::new(|_payload| true);
        assert!(adapter.start_event_ingestion(sink.clone()).await.is_ok());
        assert!(adapter.start_event_ingestion(sink).await.is_err());
    }

    #[tokio::test]
    async fn stop_is_idempotent() {
        let adapter = testing::NullAdapter::default();
        adapter.stop().await;
        adapter.stop().await;
        assert_eq!(adapter.stop_count(), 2);
    }
}
