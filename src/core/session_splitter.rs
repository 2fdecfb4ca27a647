// src/core/session_splitter.rs - Interleaved stream -> per-execution sessions
use std::collections::{BTreeMap, HashSet};

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::config::SplitterConfig;
use super::observations::{LogStatementId, ObservedEvent, ThreadId};

/// Maximal ordered run of observed events for one logical execution thread.
/// Created by the splitter, consumed once by the alignment engine; transient.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub thread: ThreadId,
    pub events: Vec<ObservedEvent>,
}

impl Session {
    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn first_sequence_index(&self) -> Option<u64> {
        self.events.first().map(|e| e.sequence_index)
    }
}

/// Partitions a possibly interleaved multi-thread observation stream into
/// independent sessions, one alignment run each.
///
/// Pure and deterministic: same input and configuration, same output.
pub struct SessionSplitter {
    idle_gap: Duration,
    boundary_statements: HashSet<LogStatementId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SplitStats {
    pub total_events: usize,
    pub threads: usize,
    pub sessions: usize,
    pub boundary_splits: usize,
    pub idle_gap_splits: usize,
}

impl SessionSplitter {
    pub fn new(idle_gap: Duration, boundary_statements: HashSet<LogStatementId>) -> Self {
        Self {
            idle_gap,
            boundary_statements,
        }
    }

    pub fn from_config(config: &SplitterConfig) -> Self {
        Self::new(
            Duration::milliseconds(config.idle_gap_ms),
            config
                .boundary_statements
                .iter()
                .map(|s| LogStatementId::new(s.clone()))
                .collect(),
        )
    }

    /// Group events by thread, order each thread by sequence index, and cut
    /// at boundary markers or idle gaps, whichever triggers first. A boundary
    /// event starts a new session and belongs to it.
    pub fn split(&self, events: &[ObservedEvent]) -> Vec<Session> {
        // BTreeMap keeps thread iteration deterministic
        let mut by_thread: BTreeMap<ThreadId, Vec<ObservedEvent>> = BTreeMap::new();
        for event in events {
            by_thread
                .entry(event.thread.clone())
                .or_default()
                .push(event.clone());
        }

        let mut sessions = Vec::new();
        for (thread, mut thread_events) in by_thread {
            // sequence_index is the authoritative order when timestamps tie
            thread_events.sort_by_key(|e| e.sequence_index);

            let mut current: Vec<ObservedEvent> = Vec::new();
            for event in thread_events {
                let cut = match current.last() {
                    Some(prev) => {
                        self.boundary_statements.contains(&event.statement)
                            || event.timestamp - prev.timestamp > self.idle_gap
                    }
                    None => false,
                };

                if cut {
                    sessions.push(Session {
                        thread: thread.clone(),
                        events: std::mem::take(&mut current),
                    });
                }
                current.push(event);
            }

            if !current.is_empty() {
                sessions.push(Session {
                    thread: thread.clone(),
                    events: current,
                });
            }
        }

        sessions.sort_by(|a, b| {
            a.first_sequence_index()
                .cmp(&b.first_sequence_index())
                .then_with(|| a.thread.cmp(&b.thread))
        });
        sessions
    }

    pub fn split_stats(&self, events: &[ObservedEvent], sessions: &[Session]) -> SplitStats {
        let threads: HashSet<&ThreadId> = events.iter().map(|e| &e.thread).collect();
        let boundary_splits = sessions
            .iter()
            .filter(|s| {
                s.events
                    .first()
                    .map(|e| self.boundary_statements.contains(&e.statement))
                    .unwrap_or(false)
            })
            .count();

        SplitStats {
            total_events: events.len(),
            threads: threads.len(),
            sessions: sessions.len(),
            boundary_splits,
            idle_gap_splits: sessions.len().saturating_sub(threads.len() + boundary_splits),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn event(statement: &str, thread: &str, seq: u64, offset_ms: i64) -> ObservedEvent {
        let base = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        ObservedEvent::new(
            statement.into(),
            base + Duration::milliseconds(offset_ms),
            thread.into(),
            seq,
        )
    }

    fn splitter(idle_gap_ms: i64) -> SessionSplitter {
        SessionSplitter::new(Duration::milliseconds(idle_gap_ms), HashSet::new())
    }

    #[test]
    fn test_interleaved_threads_separate() {
        let events = vec![
            event("s1", "t1", 0, 0),
            event("s2", "t2", 0, 5),
            event("s3", "t1", 1, 10),
            event("s4", "t2", 1, 15),
        ];

        let sessions = splitter(60_000).split(&events);
        assert_eq!(sessions.len(), 2);
        assert_eq!(sessions[0].thread, "t1".into());
        assert_eq!(sessions[0].events[1].statement, "s3".into());
        assert_eq!(sessions[1].thread, "t2".into());
        assert_eq!(sessions[1].events[1].statement, "s4".into());
    }

    #[test]
    fn test_idle_gap_splits_thread() {
        let events = vec![
            event("s1", "t1", 0, 0),
            event("s2", "t1", 1, 100),
            event("s3", "t1", 2, 100_000),
        ];

        let sessions = splitter(30_000).split(&events);
        assert_eq!(sessions.len(), 2);
        assert_eq!(sessions[0].len(), 2);
        assert_eq!(sessions[1].len(), 1);
        assert_eq!(sessions[1].events[0].statement, "s3".into());
    }

    #[test]
    fn test_boundary_marker_starts_new_session() {
        let boundary: HashSet<LogStatementId> = [LogStatementId::new("req:start")].into();
        let splitter = SessionSplitter::new(Duration::milliseconds(60_000), boundary);

        let events = vec![
            event("req:start", "t1", 0, 0),
            event("s1", "t1", 1, 5),
            event("req:start", "t1", 2, 10),
            event("s1", "t1", 3, 15),
        ];

        let sessions = splitter.split(&events);
        assert_eq!(sessions.len(), 2);
        assert_eq!(sessions[0].len(), 2);
        assert_eq!(sessions[1].events[0].statement, "req:start".into());
    }

    #[test]
    fn test_single_event_thread_is_trivial_session() {
        let sessions = splitter(30_000).split(&[event("s1", "t9", 0, 0)]);
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].len(), 1);
    }

    #[test]
    fn test_split_is_deterministic() {
        let events = vec![
            event("s1", "t2", 0, 0),
            event("s2", "t1", 0, 1),
            event("s3", "t1", 1, 2),
            event("s4", "t2", 1, 3),
        ];

        let splitter = splitter(30_000);
        let first = splitter.split(&events);
        let second = splitter.split(&events);
        assert_eq!(first.len(), second.len());
        for (a, b) in first.iter().zip(second.iter()) {
            assert_eq!(a.thread, b.thread);
            assert_eq!(a.events, b.events);
        }
    }
}
