// Copyright (c) 2026 edgebridge contributors
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/edgebridge/edgebridge

//! Dispatch events queued during a tick and forwarded at its end

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

/// A structured record enqueued during a tick and routed to the named
/// external handlers by the event-dispatch stage.
#[derive(Debug, Clone, Serialize)]
pub struct DispatchEvent {
    pub id: Uuid,
    /// Names of the handlers that should receive this event.
    pub handlers: BTreeSet<String>,
    pub data: Value,
    /// Producer name (task or engine that enqueued the event).
    pub origin: String,
    pub created_at: DateTime<Utc>,
}

impl DispatchEvent {
    pub fn new<I, S>(origin: &str, handlers: I, data: Value) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            id: Uuid::new_v4(),
            handlers: handlers.into_iter().map(Into::into).collect(),
            data,
            origin: origin.to_string(),
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn handlers_are_deduplicated() {
        let event = DispatchEvent::new("rules", ["api", "db", "api"], json!({"kind": "violation"}));
        assert_eq!(event.handlers.len(), 2);
        assert!(event.handlers.contains("db"));
        assert_eq!(event.origin, "rules");
    }
}
