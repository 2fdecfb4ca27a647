// src/core/reconstructor.rs - Orchestrates reconstruction end to end
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::ReconstructionConfig;
use crate::error::{PathweaverError, Result};
use super::alignment::{AlignmentEngine, AlignmentOutcome};
use super::call_graph::CallGraph;
use super::observations::{ObservedEvent, ThreadId};
use super::session_splitter::SessionSplitter;

/// Main orchestrator: validate observations, split sessions, align each one
/// against the shared call graph, assemble the report.
pub struct Reconstructor {
    config: ReconstructionConfig,
}

/// Outcome of one session's alignment, tagged with where the session came
/// from so a report consumer can trace it back to the raw stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionReconstruction {
    pub thread: ThreadId,
    pub event_count: usize,
    pub first_sequence_index: Option<u64>,
    pub outcome: AlignmentOutcome,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconstructionStats {
    pub total_events: usize,
    pub sessions: usize,
    pub aligned: usize,
    pub failed: usize,
    pub elapsed_ms: u128,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconstructionReport {
    pub sessions: Vec<SessionReconstruction>,
    pub stats: ReconstructionStats,
}

impl ReconstructionReport {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl Reconstructor {
    pub fn new(config: ReconstructionConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn with_defaults() -> Self {
        Self {
            config: ReconstructionConfig::default(),
        }
    }

    pub fn config(&self) -> &ReconstructionConfig {
        &self.config
    }

    /// Reconstruct execution paths for a raw observation stream.
    ///
    /// Fails fast with `UnknownStatementId` when any observation references
    /// a statement absent from the graph: that poisons the whole stream and
    /// signals stale or mismatched static analysis. Per-session alignment
    /// failures are normal outcomes inside the report, not errors.
    pub fn reconstruct(
        &self,
        graph: &CallGraph,
        observations: &[ObservedEvent],
    ) -> Result<ReconstructionReport> {
        let start_time = std::time::Instant::now();
        info!(
            "🔍 Starting path reconstruction: {} observations against {} nodes",
            observations.len(),
            graph.node_count()
        );

        for event in observations {
            if !graph.contains_statement(&event.statement) {
                return Err(PathweaverError::UnknownStatementId {
                    statement: event.statement.clone(),
                    sequence_index: event.sequence_index,
                });
            }
        }

        let splitter = SessionSplitter::from_config(&self.config.splitter);
        let sessions = splitter.split(observations);
        info!(
            "🧵 Split {} observations into {} session(s)",
            observations.len(),
            sessions.len()
        );

        // Sessions are mutually independent; the graph is shared read-only.
        // Ordered collect keeps the report deterministic under rayon.
        let results: Vec<SessionReconstruction> = sessions
            .par_iter()
            .map(|session| {
                let engine = AlignmentEngine::new(graph, &self.config);
                let outcome = engine.align(session);
                SessionReconstruction {
                    thread: session.thread.clone(),
                    event_count: session.len(),
                    first_sequence_index: session.first_sequence_index(),
                    outcome,
                }
            })
            .collect();

        let aligned = results.iter().filter(|r| r.outcome.is_aligned()).count();
        let failed = results.len() - aligned;
        for result in results.iter().filter(|r| !r.outcome.is_aligned()) {
            if let AlignmentOutcome::Failed(failure) = &result.outcome {
                warn!(
                    "Session on thread {} unexplained from event {}: {:?}",
                    result.thread, failure.first_unexplained, failure.reason
                );
            }
        }

        let elapsed_ms = start_time.elapsed().as_millis();
        info!(
            "✅ Reconstruction complete in {}ms: {}/{} session(s) aligned",
            elapsed_ms,
            aligned,
            results.len()
        );
        debug!(
            "per-session outcomes: {:?}",
            results
                .iter()
                .map(|r| (r.thread.to_string(), r.outcome.is_aligned()))
                .collect::<Vec<_>>()
        );

        Ok(ReconstructionReport {
            stats: ReconstructionStats {
                total_events: observations.len(),
                sessions: results.len(),
                aligned,
                failed,
                elapsed_ms,
            },
            sessions: results,
        })
    }
}

/// Single-call convenience entry point.
pub fn reconstruct(
    graph: &CallGraph,
    observations: &[ObservedEvent],
    config: &ReconstructionConfig,
) -> Result<ReconstructionReport> {
    Reconstructor::new(config.clone())?.reconstruct(graph, observations)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    use super::super::call_graph::{EdgeKind, NodeKind};
    use super::super::observations::LogStatementId;

    fn two_thread_fixture() -> (CallGraph, Vec<ObservedEvent>) {
        let mut builder = CallGraph::builder();
        let a = builder.add_node("a", NodeKind::Function);
        let b = builder.add_node("b", NodeKind::Function);
        let c = builder.add_node("c", NodeKind::Function);
        builder.annotate(b, "s1".into());
        builder.annotate(c, "s2".into());
        builder.add_edge(a, b, EdgeKind::Direct);
        builder.add_edge(b, c, EdgeKind::Direct);
        builder.mark_entry(a);
        let graph = builder.build().unwrap();

        let base = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let events = vec![
            ObservedEvent::new("s1".into(), base, "t1".into(), 0),
            ObservedEvent::new("s1".into(), base, "t2".into(), 0),
            ObservedEvent::new("s2".into(), base, "t1".into(), 1),
            ObservedEvent::new("s2".into(), base, "t2".into(), 1),
        ];
        (graph, events)
    }

    #[test]
    fn test_interleaved_stream_reconstructs_per_thread() {
        let (graph, events) = two_thread_fixture();
        let reconstructor = Reconstructor::with_defaults();

        let report = reconstructor.reconstruct(&graph, &events).unwrap();
        assert_eq!(report.stats.sessions, 2);
        assert_eq!(report.stats.aligned, 2);
        assert_eq!(report.stats.failed, 0);

        for session in &report.sessions {
            let paths = session.outcome.paths();
            assert!(!paths.is_empty());
            assert_eq!(paths[0].total_cost, 0);
            assert_eq!(paths[0].expanded_nodes(), vec!["a", "b", "c"]);
        }
    }

    #[test]
    fn test_unknown_statement_fails_whole_stream() {
        let (graph, mut events) = two_thread_fixture();
        let base = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 5).unwrap();
        events.push(ObservedEvent::new("ghost:1".into(), base, "t1".into(), 2));

        let result = Reconstructor::with_defaults().reconstruct(&graph, &events);
        match result {
            Err(PathweaverError::UnknownStatementId {
                statement,
                sequence_index,
            }) => {
                assert_eq!(statement, LogStatementId::new("ghost:1"));
                assert_eq!(sequence_index, 2);
            }
            other => panic!("expected UnknownStatementId, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_parallel_runs_match_repeated_runs() {
        let (graph, events) = two_thread_fixture();
        let reconstructor = Reconstructor::with_defaults();

        let first = reconstructor.reconstruct(&graph, &events).unwrap();
        let second = reconstructor.reconstruct(&graph, &events).unwrap();

        assert_eq!(first.sessions.len(), second.sessions.len());
        for (a, b) in first.sessions.iter().zip(second.sessions.iter()) {
            assert_eq!(a.thread, b.thread);
            assert_eq!(a.outcome.paths(), b.outcome.paths());
        }
    }

    #[test]
    fn test_report_serializes() {
        let (graph, events) = two_thread_fixture();
        let report = Reconstructor::with_defaults()
            .reconstruct(&graph, &events)
            .unwrap();

        let json = report.to_json().unwrap();
        assert!(json.contains("\"sessions\""));
        assert!(json.contains("\"aligned\""));
    }
}
