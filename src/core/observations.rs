// src/core/observations.rs - Runtime log observation model
use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier of one source-level logging call site, e.g. "billing/charge.rs:88".
///
/// Produced by the external log-to-statement matcher; many statement ids may
/// map onto the same call-graph node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LogStatementId(pub String);

impl LogStatementId {
    pub fn new<S: Into<String>>(id: S) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LogStatementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for LogStatementId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Logical execution thread that emitted an event (OS thread, task, request id).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ThreadId(pub String);

impl ThreadId {
    pub fn new<S: Into<String>>(id: S) -> Self {
        Self(id.into())
    }
}

impl fmt::Display for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ThreadId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// One observed log event, already matched to its source statement.
///
/// Within a thread, `sequence_index` strictly increases and is the
/// authoritative order when timestamps tie.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObservedEvent {
    pub statement: LogStatementId,
    pub timestamp: DateTime<Utc>,
    pub thread: ThreadId,
    pub sequence_index: u64,
    pub payload: Option<String>,
}

impl ObservedEvent {
    pub fn new(
        statement: LogStatementId,
        timestamp: DateTime<Utc>,
        thread: ThreadId,
        sequence_index: u64,
    ) -> Self {
        Self {
            statement,
            timestamp,
            thread,
            sequence_index,
            payload: None,
        }
    }

    pub fn with_payload<S: Into<String>>(mut self, payload: S) -> Self {
        self.payload = Some(payload.into());
        self
    }
}

/// Assign per-thread sequence indices by arrival order.
///
/// For matchers that deliver only (statement, timestamp, thread) triples:
/// the position of an event in the raw stream is taken as its arrival order
/// within its thread.
pub fn assign_sequence_indices(events: &mut [ObservedEvent]) {
    let mut counters: HashMap<ThreadId, u64> = HashMap::new();
    for event in events.iter_mut() {
        let counter = counters.entry(event.thread.clone()).or_insert(0);
        event.sequence_index = *counter;
        *counter += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_assign_sequence_indices_per_thread() {
        let ts = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let mut events = vec![
            ObservedEvent::new("s1".into(), ts, "t1".into(), 0),
            ObservedEvent::new("s2".into(), ts, "t2".into(), 0),
            ObservedEvent::new("s3".into(), ts, "t1".into(), 0),
            ObservedEvent::new("s4".into(), ts, "t2".into(), 0),
        ];

        assign_sequence_indices(&mut events);

        assert_eq!(events[0].sequence_index, 0);
        assert_eq!(events[1].sequence_index, 0);
        assert_eq!(events[2].sequence_index, 1);
        assert_eq!(events[3].sequence_index, 1);
    }

    #[test]
    fn test_payload_builder() {
        let ts = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let event =
            ObservedEvent::new("s1".into(), ts, "t1".into(), 7).with_payload("status=503");
        assert_eq!(event.payload.as_deref(), Some("status=503"));
        assert_eq!(event.sequence_index, 7);
    }
}
