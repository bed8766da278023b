// Copyright (c) 2026 edgebridge contributors
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/edgebridge/edgebridge

//! In-memory store holding the latest edge event per camera

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

/// Epoch seconds with millisecond precision.
pub fn epoch_seconds(t: DateTime<Utc>) -> f64 {
    t.timestamp() as f64 + f64::from(t.timestamp_subsec_millis()) / 1000.0
}

/// Wire payload accepted on `POST /edge/events` and the MQTT event topic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdgeEventPayload {
    pub camera_id: String,
    /// Event time in epoch seconds (UTC).
    pub timestamp: f64,
    #[serde(default)]
    pub detections: Vec<Value>,
    #[serde(default)]
    pub models: Vec<Value>,
}

/// A normalized edge inference record.
#[derive(Debug, Clone, Serialize)]
pub struct EdgeEvent {
    pub camera_id: String,
    pub timestamp: f64,
    pub received_at: DateTime<Utc>,
    pub detections: Vec<Value>,
    pub models: Vec<Value>,
}

#[derive(Default)]
struct StoreState {
    latest: HashMap<String, EdgeEvent>,
    last_event_at: Option<DateTime<Utc>>,
}

/// Thread-safe latest-per-camera event store.
///
/// Ingestion callbacks run on transport threads; pipeline tasks snapshot from
/// the loop task. A single mutex guards the map and `last_event_at`; it is
/// never held across callbacks or awaits.
pub struct EdgeEventStore {
    state: Mutex<StoreState>,
    max_age: f64,
    skew_tolerance: f64,
    accepted: AtomicU64,
    rejected: AtomicU64,
}

impl EdgeEventStore {
    pub fn new(max_age: f64, skew_tolerance: f64) -> Self {
        Self {
            state: Mutex::new(StoreState::default()),
            max_age,
            skew_tolerance,
            accepted: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
        }
    }

    /// Ingest one event. Returns false (no side effect) when the event is
    /// older than the max age or its timestamp is implausibly far in the
    /// future. A small future skew is clamped to the receive time.
    pub fn add_event(&self, payload: EdgeEventPayload) -> bool {
        self.add_event_at(payload, Utc::now())
    }

    pub fn add_event_at(&self, payload: EdgeEventPayload, now: DateTime<Utc>) -> bool {
        let now_secs = epoch_seconds(now);
        let age = now_secs - payload.timestamp;

        if payload.timestamp < 0.0 || age > self.max_age {
            warn!(
                camera_id = %payload.camera_id,
                age_seconds = age,
                "edge event rejected: older than max age"
            );
            self.rejected.fetch_add(1, Ordering::Relaxed);
            return false;
        }
        let timestamp = if age < 0.0 {
            if -age > self.skew_tolerance {
                warn!(
                    camera_id = %payload.camera_id,
                    skew_seconds = -age,
                    "edge event rejected: timestamp beyond skew tolerance"
                );
                self.rejected.fetch_add(1, Ordering::Relaxed);
                return false;
            }
            // Small clock skew between edge and daemon: clamp to receive time.
            now_secs
        } else {
            payload.timestamp
        };

        let event = EdgeEvent {
            camera_id: payload.camera_id,
            timestamp,
            received_at: now,
            detections: payload.detections,
            models: payload.models,
        };

        let mut state = self.state.lock().unwrap();
        match state.latest.get(&event.camera_id) {
            // An older event must never supersede a newer accepted one.
            Some(current) if current.timestamp > event.timestamp => {}
            _ => {
                state.latest.insert(event.camera_id.clone(), event);
            }
        }
        state.last_event_at = Some(now);
        drop(state);

        self.accepted.fetch_add(1, Ordering::Relaxed);
        true
    }

    /// Consistent copy of the per-camera latest events.
    pub fn snapshot(&self) -> Vec<EdgeEvent> {
        let state = self.state.lock().unwrap();
        state.latest.values().cloned().collect()
    }

    /// Seconds since the most recent successful ingest, `None` if there has
    /// never been one.
    pub fn last_event_age(&self, now: DateTime<Utc>) -> Option<f64> {
        let state = self.state.lock().unwrap();
        state
            .last_event_at
            .map(|at| (now - at).num_milliseconds() as f64 / 1000.0)
    }

    /// Drop parked events whose timestamp has aged past `max_age`.
    /// Returns the number of evicted entries.
    pub fn prune(&self, now: DateTime<Utc>) -> usize {
        let cutoff = now.timestamp() as f64 - self.max_age;
        let mut state = self.state.lock().unwrap();
        let before = state.latest.len();
        state.latest.retain(|_, event| event.timestamp >= cutoff);
        before - state.latest.len()
    }

    pub fn clear(&self, camera_id: &str) {
        let mut state = self.state.lock().unwrap();
        state.latest.remove(camera_id);
    }

    pub fn clear_all(&self) {
        let mut state = self.state.lock().unwrap();
        state.latest.clear();
    }

    pub fn len(&self) -> usize {
        self.state.lock().unwrap().latest.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn accepted_count(&self) -> u64 {
        self.accepted.load(Ordering::Relaxed)
    }

    pub fn rejected_count(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn payload(camera: &str, timestamp: f64) -> EdgeEventPayload {
        EdgeEventPayload {
            camera_id: camera.to_string(),
            timestamp,
            detections: vec![],
            models: vec![],
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, 12, 0, 0).unwrap()
    }

    #[test]
    fn keeps_one_event_per_camera_newest_wins() {
        let store = EdgeEventStore::new(60.0, 2.0);
        let t = now();
        let base = t.timestamp() as f64;

        assert!(store.add_event_at(payload("cam01", base - 10.0), t));
        assert!(store.add_event_at(payload("cam01", base - 5.0), t));
        assert_eq!(store.len(), 1);
        assert_eq!(store.snapshot()[0].timestamp, base - 5.0);

        // A late, older arrival does not roll the camera back.
        assert!(store.add_event_at(payload("cam01", base - 30.0), t));
        assert_eq!(store.snapshot()[0].timestamp, base - 5.0);
    }

    #[test]
    fn rejects_events_past_max_age() {
        let store = EdgeEventStore::new(60.0, 2.0);
        let t = now();
        let base = t.timestamp() as f64;

        assert!(!store.add_event_at(payload("cam01", base - 120.0), t));
        assert!(store.is_empty());
        assert_eq!(store.rejected_count(), 1);
        assert!(store.last_event_age(t).is_none());
    }

    #[test]
    fn rejects_negative_timestamps() {
        let store = EdgeEventStore::new(60.0, 2.0);
        assert!(!store.add_event_at(payload("cam01", -1.0), now()));
        assert!(store.is_empty());
    }

    #[test]
    fn clamps_small_future_skew_and_rejects_large() {
        let store = EdgeEventStore::new(60.0, 2.0);
        let t = now();
        let base = t.timestamp() as f64;

        assert!(store.add_event_at(payload("cam01", base + 1.0), t));
        let stored = store.snapshot();
        assert!((stored[0].timestamp - base).abs() < 0.001);

        assert!(!store.add_event_at(payload("cam02", base + 30.0), t));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn last_event_age_tracks_most_recent_ingest() {
        let store = EdgeEventStore::new(60.0, 2.0);
        let t = now();
        store.add_event_at(payload("cam01", t.timestamp() as f64), t);

        let later = t + chrono::Duration::seconds(15);
        assert_eq!(store.last_event_age(later), Some(15.0));
    }

    #[test]
    fn prune_evicts_parked_events() {
        let store = EdgeEventStore::new(60.0, 2.0);
        let t = now();
        let base = t.timestamp() as f64;
        store.add_event_at(payload("cam01", base - 50.0), t);
        store.add_event_at(payload("cam02", base), t);

        let later = t + chrono::Duration::seconds(30);
        assert_eq!(store.prune(later), 1);
        assert_eq!(store.len(), 1);
        assert_eq!(store.snapshot()[0].camera_id, "cam02");
    }

    #[test]
    fn clear_operations() {
        let store = EdgeEventStore::new(60.0, 2.0);
        let t = now();
        let base = t.timestamp() as f64;
        store.add_event_at(payload("cam01", base), t);
        store.add_event_at(payload("cam02", base), t);

        store.clear("cam01");
        assert_eq!(store.len(), 1);
        store.clear_all();
        assert!(store.is_empty());
    }

    #[test]
    fn concurrent_ingest_and_snapshot() {
        use std::sync::Arc;

        let store = Arc::new(EdgeEventStore::new(60.0, 2.0));
        let mut handles = Vec::new();
        for i in 0..4 {
            let store = Arc::clone(&store);
            handles.push(std::thread::spawn(move || {
                for j in 0..100 {
                    let camera = format!("cam{:02}", i);
                    store.add_event(EdgeEventPayload {
                        camera_id: camera,
                        timestamp: Utc::now().timestamp() as f64 - (j as f64 * 0.001),
                        detections: vec![],
                        models: vec![],
                    });
                    let _ = store.snapshot();
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(store.len(), 4);
    }
}
