// Copyright (c) 2026 edgebridge contributors
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/edgebridge/edgebridge

//! Configuration module - environment-resolved settings

use std::path::PathBuf;
use std::time::Duration;

use chrono::NaiveTime;
use chrono_tz::Tz;
use tracing::warn;

use crate::error::{Error, Result};

/// Transport backend for edge-event ingestion and phase publish.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Http,
    Mqtt,
}

impl Backend {
    fn parse(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "http" => Ok(Backend::Http),
            "mqtt" => Ok(Backend::Mqtt),
            other => Err(Error::Config(format!("unsupported backend: {other}"))),
        }
    }
}

/// Behavior when no edge events have arrived within the stale window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StaleMode {
    Freeze,
    Unknown,
}

/// A working-hour window in local (site) time. End is exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleWindow {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl ScheduleWindow {
    pub fn contains(&self, current: NaiveTime) -> bool {
        self.start <= current && current < self.end
    }
}

/// MQTT transport configuration.
#[derive(Debug, Clone)]
pub struct MqttConfig {
    pub host: String,
    pub port: u16,
    pub qos: u8,
    pub retain: bool,
    pub heartbeat: Duration,
    pub client_id: String,
    pub phase_topic: String,
    pub event_topic: String,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 1883,
            qos: 1,
            retain: true,
            heartbeat: Duration::from_secs(600),
            client_id: "edgebridge".to_string(),
            phase_topic: "integration/phase".to_string(),
            event_topic: "edge/events".to_string(),
        }
    }
}

/// HTTP phase-publish target (optional).
#[derive(Debug, Clone, Default)]
pub struct PhaseHttpConfig {
    pub base_url: Option<String>,
    pub timeout: Duration,
}

/// Plugin class-path overrides (`module:Class` keys into the factory registry).
#[derive(Debug, Clone, Default)]
pub struct PluginConfig {
    pub phase_engine: Option<String>,
    pub scheduler_engine: Option<String>,
    pub ingestion_engine: Option<String>,
    pub tracking_engine: Option<String>,
    pub format_strategy: Option<String>,
    pub rules_engine: Option<String>,
    pub event_dispatch_engine: Option<String>,
    pub pipeline_selector: Option<String>,
    pub phase_change_engine: Option<String>,
}

/// Main application configuration.
///
/// Resolved once at startup from the environment; immutable thereafter.
#[derive(Debug, Clone)]
pub struct Config {
    pub service_name: String,

    /// Fallback tick interval when nothing else specifies a sleep.
    pub loop_interval: Duration,

    /// Debounce window a candidate phase must persist before commitment.
    pub phase_stable: Duration,

    /// Events older than this at ingest (or while parked) are discarded.
    pub edge_event_max_age: f64,

    /// Future-timestamp tolerance before an event is rejected outright.
    pub edge_event_skew_tolerance: f64,

    /// Stale detection threshold; zero disables stale handling.
    pub edge_event_stale: Duration,
    pub edge_event_stale_mode: StaleMode,
    pub edge_event_unknown_phase: String,

    pub edge_event_backend: Backend,
    pub phase_publish_backend: Backend,
    pub edge_event_host: String,
    pub edge_event_port: u16,

    pub pipeline_schedule_path: PathBuf,
    pub config_root: PathBuf,

    pub timezone: Tz,
    pub working_windows: Vec<ScheduleWindow>,

    pub mqtt: MqttConfig,
    pub phase_http: PhaseHttpConfig,

    pub retry_backoff: Duration,
    pub handler_timeout: Duration,
    pub non_working_idle: Duration,

    /// Grace period for in-flight transport I/O during shutdown.
    pub shutdown_grace: Duration,

    pub mcmot_enabled: bool,
    pub format_task_enabled: bool,
    pub iron_gate_camera_id: String,

    pub log_level: String,
    pub plugins: PluginConfig,
}

impl Config {
    /// Resolve the full configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        let config_root = env_str("CONFIG_ROOT")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));

        let schedule_raw = env_str("PIPELINE_SCHEDULE_PATH")
            .ok_or_else(|| Error::Config("PIPELINE_SCHEDULE_PATH is required".to_string()))?;
        let pipeline_schedule_path = resolve_path(&config_root, &schedule_raw);

        let edge_event_backend =
            Backend::parse(&env_str("EDGE_EVENT_BACKEND").unwrap_or_else(|| "http".into()))?;
        let phase_publish_backend = match env_str("PHASE_PUBLISH_BACKEND") {
            Some(raw) => Backend::parse(&raw)?,
            None => edge_event_backend,
        };

        let stale_mode = match env_str("EDGE_EVENT_STALE_MODE").as_deref() {
            None => StaleMode::Freeze,
            Some(raw) => match raw.trim().to_ascii_lowercase().as_str() {
                "freeze" => StaleMode::Freeze,
                "unknown" => StaleMode::Unknown,
                other => {
                    return Err(Error::Config(format!(
                        "EDGE_EVENT_STALE_MODE must be freeze or unknown, got {other}"
                    )))
                }
            },
        };

        let timezone =
            parse_timezone(&env_str("APP_TIMEZONE").unwrap_or_else(|| "Asia/Taipei".into()));
        let working_windows = match env_str("WORKING_WINDOWS") {
            Some(raw) => parse_windows(&raw)?,
            None => vec![full_day_window()],
        };

        let mqtt = MqttConfig {
            host: env_str("MQTT_HOST").unwrap_or_else(|| "localhost".into()),
            port: env_parse("MQTT_PORT", 1883)?,
            qos: env_parse("MQTT_QOS", 1)?,
            retain: env_bool("MQTT_RETAIN", true),
            heartbeat: Duration::from_secs(env_parse("MQTT_HEARTBEAT_SECONDS", 600u64)?),
            client_id: env_str("MQTT_CLIENT_ID").unwrap_or_else(|| "edgebridge".into()),
            phase_topic: env_str("PHASE_MQTT_TOPIC").unwrap_or_else(|| "integration/phase".into()),
            event_topic: env_str("EDGE_EVENTS_MQTT_TOPIC").unwrap_or_else(|| "edge/events".into()),
        };

        let phase_http = PhaseHttpConfig {
            base_url: env_str("PHASE_HTTP_BASE_URL"),
            timeout: Duration::from_secs(env_parse("PHASE_HTTP_TIMEOUT_SECONDS", 5u64)?),
        };

        Ok(Self {
            service_name: env_str("SERVICE_NAME").unwrap_or_else(|| "edgebridge".into()),
            loop_interval: Duration::from_secs(env_parse("LOOP_INTERVAL_SECONDS", 5u64)?),
            phase_stable: Duration::from_secs(env_parse("PHASE_STABLE_SECONDS", 180u64)?),
            edge_event_max_age: env_parse("EDGE_EVENT_MAX_AGE", 5.0f64)?,
            edge_event_skew_tolerance: env_parse("EDGE_EVENT_SKEW_TOLERANCE", 2.0f64)?,
            edge_event_stale: Duration::from_secs(env_parse("EDGE_EVENT_STALE_SECONDS", 0u64)?),
            edge_event_stale_mode: stale_mode,
            edge_event_unknown_phase: env_str("EDGE_EVENT_UNKNOWN_PHASE")
                .unwrap_or_else(|| "unknown".into()),
            edge_event_backend,
            phase_publish_backend,
            edge_event_host: env_str("EDGE_EVENT_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            edge_event_port: env_parse("EDGE_EVENT_PORT", 9000u16)?,
            pipeline_schedule_path,
            config_root,
            timezone,
            working_windows,
            mqtt,
            phase_http,
            retry_backoff: Duration::from_secs(env_parse("RETRY_BACKOFF_SECONDS", 10u64)?),
            handler_timeout: Duration::from_secs(env_parse("HANDLER_TIMEOUT_SECONDS", 5u64)?),
            non_working_idle: Duration::from_secs(env_parse("NON_WORKING_IDLE_SECONDS", 30u64)?),
            shutdown_grace: Duration::from_secs(env_parse("SHUTDOWN_GRACE_SECONDS", 5u64)?),
            mcmot_enabled: env_bool("MCMOT_ENABLED", true),
            format_task_enabled: env_bool("FORMAT_TASK_ENABLED", true),
            iron_gate_camera_id: env_str("IRON_GATE_CAMERA_ID")
                .unwrap_or_else(|| "iron-gate".into()),
            log_level: env_str("LOG_LEVEL").unwrap_or_else(|| "info".into()),
            plugins: PluginConfig {
                phase_engine: env_str("PHASE_ENGINE_CLASS"),
                scheduler_engine: env_str("SCHEDULER_ENGINE_CLASS"),
                ingestion_engine: env_str("INGESTION_ENGINE_CLASS"),
                tracking_engine: env_str("TRACKING_ENGINE_CLASS"),
                format_strategy: env_str("FORMAT_STRATEGY_CLASS"),
                rules_engine: env_str("RULES_ENGINE_CLASS"),
                event_dispatch_engine: env_str("EVENT_DISPATCH_ENGINE_CLASS"),
                pipeline_selector: env_str("PIPELINE_SELECTOR_CLASS"),
                phase_change_engine: env_str("PHASE_CHANGE_ENGINE_CLASS"),
            },
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            service_name: "edgebridge".to_string(),
            loop_interval: Duration::from_secs(5),
            phase_stable: Duration::from_secs(180),
            edge_event_max_age: 5.0,
            edge_event_skew_tolerance: 2.0,
            edge_event_stale: Duration::ZERO,
            edge_event_stale_mode: StaleMode::Freeze,
            edge_event_unknown_phase: "unknown".to_string(),
            edge_event_backend: Backend::Http,
            phase_publish_backend: Backend::Http,
            edge_event_host: "0.0.0.0".to_string(),
            edge_event_port: 9000,
            pipeline_schedule_path: PathBuf::from("pipeline_schedule.json"),
            config_root: PathBuf::from("."),
            timezone: chrono_tz::UTC,
            working_windows: vec![full_day_window()],
            mqtt: MqttConfig::default(),
            phase_http: PhaseHttpConfig::default(),
            retry_backoff: Duration::from_secs(10),
            handler_timeout: Duration::from_secs(5),
            non_working_idle: Duration::from_secs(30),
            shutdown_grace: Duration::from_secs(5),
            mcmot_enabled: true,
            format_task_enabled: true,
            iron_gate_camera_id: "iron-gate".to_string(),
            log_level: "info".to_string(),
            plugins: PluginConfig::default(),
        }
    }
}

fn full_day_window() -> ScheduleWindow {
    ScheduleWindow {
        start: NaiveTime::from_hms_opt(0, 0, 0).unwrap(),
        end: NaiveTime::from_hms_opt(23, 59, 0).unwrap(),
    }
}

fn resolve_path(root: &std::path::Path, raw: &str) -> PathBuf {
    let path = PathBuf::from(raw);
    if path.is_absolute() {
        path
    } else {
        root.join(path)
    }
}

fn parse_timezone(name: &str) -> Tz {
    match name.parse::<Tz>() {
        Ok(tz) => tz,
        Err(_) => {
            warn!("unknown APP_TIMEZONE {:?}, falling back to UTC", name);
            chrono_tz::UTC
        }
    }
}

/// Parse "HH:MM-HH:MM,HH:MM-HH:MM" into schedule windows.
fn parse_windows(raw: &str) -> Result<Vec<ScheduleWindow>> {
    let mut windows = Vec::new();
    for entry in raw.split(',') {
        let entry = entry.trim();
        if entry.is_empty() {
            continue;
        }
        let (start, end) = entry
            .split_once('-')
            .ok_or_else(|| Error::Config(format!("invalid WORKING_WINDOWS entry: {entry}")))?;
        let start = NaiveTime::parse_from_str(start.trim(), "%H:%M")
            .map_err(|e| Error::Config(format!("invalid window start {start:?}: {e}")))?;
        let end = NaiveTime::parse_from_str(end.trim(), "%H:%M")
            .map_err(|e| Error::Config(format!("invalid window end {end:?}: {e}")))?;
        if end <= start {
            return Err(Error::Config(format!("window end must be after start: {entry}")));
        }
        windows.push(ScheduleWindow { start, end });
    }
    if windows.is_empty() {
        return Err(Error::Config("WORKING_WINDOWS contained no windows".to_string()));
    }
    Ok(windows)
}

fn env_str(name: &str) -> Option<String> {
    match std::env::var(name) {
        Ok(value) => {
            let value = value.trim().to_string();
            if value.is_empty() {
                None
            } else {
                Some(value)
            }
        }
        Err(_) => None,
    }
}

fn env_bool(name: &str, default: bool) -> bool {
    match env_str(name) {
        None => default,
        Some(value) => !matches!(
            value.to_ascii_lowercase().as_str(),
            "0" | "false" | "no" | "off"
        ),
    }
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    match env_str(name) {
        None => Ok(default),
        Some(raw) => raw
            .parse::<T>()
            .map_err(|e| Error::Config(format!("invalid {name}={raw}: {e}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_contains_is_half_open() {
        let w = ScheduleWindow {
            start: NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
            end: NaiveTime::from_hms_opt(17, 0, 0).unwrap(),
        };
        assert!(w.contains(NaiveTime::from_hms_opt(8, 0, 0).unwrap()));
        assert!(w.contains(NaiveTime::from_hms_opt(16, 59, 59).unwrap()));
        assert!(!w.contains(NaiveTime::from_hms_opt(17, 0, 0).unwrap()));
        assert!(!w.contains(NaiveTime::from_hms_opt(7, 59, 0).unwrap()));
    }

    #[test]
    fn parse_windows_accepts_multiple_entries() {
        let windows = parse_windows("08:00-12:00, 13:00-17:30").unwrap();
        assert_eq!(windows.len(), 2);
        assert_eq!(windows[1].end, NaiveTime::from_hms_opt(17, 30, 0).unwrap());
    }

    #[test]
    fn parse_windows_rejects_inverted_range() {
        assert!(parse_windows("17:00-08:00").is_err());
        assert!(parse_windows("garbage").is_err());
    }

    #[test]
    fn unknown_timezone_falls_back_to_utc() {
        assert_eq!(parse_timezone("Not/AZone"), chrono_tz::UTC);
        assert_eq!(parse_timezone("Asia/Taipei"), chrono_tz::Asia::Taipei);
    }
}
