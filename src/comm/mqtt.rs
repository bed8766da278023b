// Copyright (c) 2026 edgebridge contributors
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/edgebridge/edgebridge

//! MQTT edge communication adapter

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::{Backend, Config, MqttConfig};
use crate::error::{Error, Result};
use crate::store::EdgeEventPayload;

use super::{
    already_started, build_phase_publisher, deliver, EdgeCommAdapter, EventSink, PhasePayload,
    PhasePublisher,
};

fn qos_from(raw: u8) -> QoS {
    match raw {
        0 => QoS::AtMostOnce,
        1 => QoS::AtLeastOnce,
        2 => QoS::ExactlyOnce,
        other => {
            warn!("MQTT_QOS={other} out of range, using QoS 1");
            QoS::AtLeastOnce
        }
    }
}

fn client_options(cfg: &MqttConfig, id_suffix: &str) -> MqttOptions {
    let mut options = MqttOptions::new(
        format!("{}{}", cfg.client_id, id_suffix),
        cfg.host.clone(),
        cfg.port,
    );
    options.set_keep_alive(Duration::from_secs(30));
    options
}

/// Phase publisher backed by an MQTT client, either shared with the
/// ingestion client or standalone with its own driver task.
pub(crate) struct MqttPublisher {
    client: AsyncClient,
    topic: String,
    qos: QoS,
    retain: bool,
}

impl MqttPublisher {
    pub(crate) fn shared(client: AsyncClient, config: &Config) -> Self {
        Self {
            client,
            topic: config.mqtt.phase_topic.clone(),
            qos: qos_from(config.mqtt.qos),
            retain: config.mqtt.retain,
        }
    }

    pub(crate) fn standalone(config: &Config) -> (Self, JoinHandle<()>) {
        let (client, eventloop) = AsyncClient::new(client_options(&config.mqtt, "-phase"), 64);
        let driver = tokio::spawn(drive_publisher(eventloop, config.retry_backoff));
        (
            Self {
                client,
                topic: config.mqtt.phase_topic.clone(),
                qos: qos_from(config.mqtt.qos),
                retain: config.mqtt.retain,
            },
            driver,
        )
    }

    pub(crate) async fn publish(&self, payload: &PhasePayload) -> bool {
        let body = match serde_json::to_vec(payload) {
            Ok(body) => body,
            Err(e) => {
                warn!("phase payload serialization failed: {e}");
                return false;
            }
        };
        match self
            .client
            .publish(self.topic.clone(), self.qos, self.retain, body)
            .await
        {
            Ok(()) => true,
            Err(e) => {
                warn!("phase publish failed: {e}");
                false
            }
        }
    }
}

async fn drive_publisher(mut eventloop: EventLoop, backoff: Duration) {
    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(_))) => info!("MQTT phase publisher connected"),
            Ok(_) => {}
            Err(e) => {
                warn!("MQTT phase publisher error: {e:?}");
                tokio::time::sleep(backoff).await;
            }
        }
    }
}

/// Subscribes to the edge-event topic for ingestion and publishes the phase
/// over MQTT (or HTTP when the publish backend is crossed).
pub struct MqttEdgeCommAdapter {
    client: AsyncClient,
    eventloop: Mutex<Option<EventLoop>>,
    event_topic: String,
    qos: QoS,
    backoff: Duration,
    grace: Duration,
    service_name: String,
    started: AtomicBool,
    stopping: Arc<AtomicBool>,
    listener: Mutex<Option<JoinHandle<()>>>,
    publisher: PhasePublisher,
    publisher_driver: Mutex<Option<JoinHandle<()>>>,
    decode_errors: Arc<AtomicU64>,
}

impl MqttEdgeCommAdapter {
    pub fn new(config: &Arc<Config>) -> Result<Self> {
        let (client, eventloop) = AsyncClient::new(client_options(&config.mqtt, ""), 100);

        // Default publish path reuses the ingestion client so there is a
        // single lifecycle owner.
        let shared = match config.phase_publish_backend {
            Backend::Mqtt => Some(MqttPublisher::shared(client.clone(), config)),
            Backend::Http => None,
        };
        let (publisher, publisher_driver) = build_phase_publisher(config, shared)?;

        Ok(Self {
            client,
            eventloop: Mutex::new(Some(eventloop)),
            event_topic: config.mqtt.event_topic.clone(),
            qos: qos_from(config.mqtt.qos),
            backoff: config.retry_backoff,
            grace: config.shutdown_grace,
            service_name: config.service_name.clone(),
            started: AtomicBool::new(false),
            stopping: Arc::new(AtomicBool::new(false)),
            listener: Mutex::new(None),
            publisher,
            publisher_driver: Mutex::new(publisher_driver),
            decode_errors: Arc::new(AtomicU64::new(0)),
        })
    }

    pub fn decode_error_count(&self) -> u64 {
        self.decode_errors.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl EdgeCommAdapter for MqttEdgeCommAdapter {
    async fn start_event_ingestion(&self, sink: EventSink) -> Result<()> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(already_started());
        }
        let mut eventloop = self
            .eventloop
            .lock()
            .unwrap()
            .take()
            .ok_or_else(|| Error::Transport("MQTT event loop unavailable".to_string()))?;

        self.client
            .subscribe(self.event_topic.clone(), self.qos)
            .await
            .map_err(|e| Error::Transport(format!("MQTT subscribe failed: {e}")))?;

        let client = self.client.clone();
        let topic = self.event_topic.clone();
        let qos = self.qos;
        let backoff = self.backoff;
        let stopping = Arc::clone(&self.stopping);
        let decode_errors = Arc::clone(&self.decode_errors);

        let handle = tokio::spawn(async move {
            loop {
                match eventloop.poll().await {
                    Ok(Event::Incoming(Packet::ConnAck(_))) => {
                        info!("MQTT connected, subscribing to {topic}");
                        let _ = client.subscribe(topic.clone(), qos).await;
                    }
                    Ok(Event::Incoming(Packet::Publish(publish))) => {
                        if publish.topic != topic {
                            continue;
                        }
                        match serde_json::from_slice::<EdgeEventPayload>(&publish.payload) {
                            Ok(payload) => {
                                debug!(camera_id = %payload.camera_id, "edge event received");
                                deliver(&sink, payload);
                            }
                            Err(e) => {
                                decode_errors.fetch_add(1, Ordering::Relaxed);
                                warn!("invalid edge event payload: {e}");
                            }
                        }
                    }
                    Ok(_) => {}
                    Err(e) => {
                        if stopping.load(Ordering::SeqCst) {
                            return;
                        }
                        warn!("MQTT error: {e:?}, retrying in {backoff:?}");
                        tokio::time::sleep(backoff).await;
                    }
                }
            }
        });
        *self.listener.lock().unwrap() = Some(handle);

        info!("MQTT ingestion started on topic {}", self.event_topic);
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
        let _ = self.client.disconnect().await;

        let listener = self.listener.lock().unwrap().take();
        if let Some(handle) = listener {
            let abort = handle.abort_handle();
            if tokio::time::timeout(self.grace, handle).await.is_err() {
                warn!("MQTT listener did not stop within grace period, aborting");
                abort.abort();
            }
        }
        let driver = self.publisher_driver.lock().unwrap().take();
        if let Some(handle) = driver {
            handle.abort();
        }
        info!("MQTT adapter stopped");
    }
}
