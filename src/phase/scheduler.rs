// Copyright (c) 2026 edgebridge contributors
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/edgebridge/edgebridge

//! Scheduler engines - raw phase candidates from world signals

use chrono::{DateTime, Utc};
use chrono_tz::Tz;

use crate::config::ScheduleWindow;
use crate::store::EdgeEventStore;

use super::Phase;

/// Answers "what is the raw candidate phase right now?". Engines read the
/// clock and the event store only; no external I/O.
pub trait SchedulerEngine: Send + Sync {
    fn resolve(&self, now: DateTime<Utc>, store: &EdgeEventStore) -> Phase;
}

/// Always returns a single working phase. The default engine.
pub struct SinglePhaseScheduler {
    phase_name: String,
}

impl SinglePhaseScheduler {
    pub fn new(phase_name: impl Into<String>) -> Self {
        Self {
            phase_name: phase_name.into(),
        }
    }
}

impl Default for SinglePhaseScheduler {
    fn default() -> Self {
        Self::new("working")
    }
}

impl SchedulerEngine for SinglePhaseScheduler {
    fn resolve(&self, _now: DateTime<Utc>, _store: &EdgeEventStore) -> Phase {
        Phase::named(self.phase_name.clone(), true)
    }
}

/// Working inside a configured local-time window, non-working outside.
pub struct TimeWindowScheduler {
    windows: Vec<ScheduleWindow>,
    tz: Tz,
}

impl TimeWindowScheduler {
    pub fn new(windows: Vec<ScheduleWindow>, tz: Tz) -> Self {
        Self { windows, tz }
    }
}

impl SchedulerEngine for TimeWindowScheduler {
    fn resolve(&self, now: DateTime<Utc>, _store: &EdgeEventStore) -> Phase {
        let local = now.with_timezone(&self.tz).time();
        if self.windows.iter().any(|window| window.contains(local)) {
            Phase::working()
        } else {
            Phase::non_working()
        }
    }
}

/// Consumes the door-state signal riding the edge event stream: the latest
/// event of the gate camera carries `{"gate": "open" | "closed"}` in its
/// first detection record. Open gate means the site is working.
pub struct IronGateScheduler {
    camera_id: String,
}

impl IronGateScheduler {
    pub fn new(camera_id: impl Into<String>) -> Self {
        Self {
            camera_id: camera_id.into(),
        }
    }

    fn gate_open(&self, store: &EdgeEventStore) -> bool {
        store
            .snapshot()
            .into_iter()
            .find(|event| event.camera_id == self.camera_id)
            .and_then(|event| {
                event
                    .detections
                    .first()
                    .and_then(|d| d.get("gate"))
                    .and_then(|v| v.as_str())
                    .map(|state| state.eq_ignore_ascii_case("open"))
            })
            .unwrap_or(false)
    }
}

impl SchedulerEngine for IronGateScheduler {
    fn resolve(&self, _now: DateTime<Utc>, store: &EdgeEventStore) -> Phase {
        if self.gate_open(store) {
            Phase::working()
        } else {
            Phase::non_working()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::EdgeEventPayload;
    use chrono::{NaiveTime, TimeZone};
    use serde_json::json;

    fn empty_store() -> EdgeEventStore {
        EdgeEventStore::new(3600.0, 2.0)
    }

    #[test]
    fn single_phase_always_working() {
        let scheduler = SinglePhaseScheduler::default();
        let phase = scheduler.resolve(Utc::now(), &empty_store());
        assert_eq!(phase.name, "working");
        assert!(phase.working);
    }

    #[test]
    fn time_window_scheduler_follows_local_windows() {
        let windows = vec![ScheduleWindow {
            start: NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
            end: NaiveTime::from_hms_opt(17, 0, 0).unwrap(),
        }];
        let scheduler = TimeWindowScheduler::new(windows, chrono_tz::Asia::Taipei);
        let store = empty_store();

        // 02:00 UTC is 10:00 in Taipei.
        let inside = Utc.with_ymd_and_hms(2026, 3, 2, 2, 0, 0).unwrap();
        assert_eq!(scheduler.resolve(inside, &store).name, "working");

        // 12:00 UTC is 20:00 in Taipei.
        let outside = Utc.with_ymd_and_hms(2026, 3, 2, 12, 0, 0).unwrap();
        assert_eq!(scheduler.resolve(outside, &store).name, "non_working");
    }

    #[test]
    fn iron_gate_scheduler_reads_gate_state() {
        let store = empty_store();
        let scheduler = IronGateScheduler::new("iron-gate");
        let now = Utc::now();

        // No gate signal yet: closed.
        assert_eq!(scheduler.resolve(now, &store).name, "non_working");

        store.add_event(EdgeEventPayload {
            camera_id: "iron-gate".to_string(),
            timestamp: now.timestamp() as f64,
            detections: vec![json!({"gate": "open"})],
            models: vec![],
        });
        assert_eq!(scheduler.resolve(now, &store).name, "working");

        store.add_event(EdgeEventPayload {
            camera_id: "iron-gate".to_string(),
            timestamp: now.timestamp() as f64 + 1.0,
            detections: vec![json!({"gate": "closed"})],
            models: vec![],
        });
        assert_eq!(scheduler.resolve(now, &store).name, "non_working");
    }
}
