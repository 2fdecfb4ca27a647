// src/core/path.rs - Materialized reconstruction results
use serde::{Deserialize, Serialize};

use super::call_graph::{CallGraph, NodeId};
use super::observations::LogStatementId;
use super::session_splitter::Session;

/// An observed event consumed by one step of a reconstructed path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchedEvent {
    /// Index into the session's event sequence
    pub event_index: usize,
    pub statement: LogStatementId,
}

/// One step of a reconstructed path: a node, how many consecutive times it
/// ran, and the events those iterations consumed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathStep {
    pub node: NodeId,
    pub node_name: String,
    pub repeat_count: u32,
    pub matched: Vec<MatchedEvent>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathStats {
    pub matched_events: usize,
    /// Traversals of statement-bearing nodes that consumed nothing
    pub skipped_logged_nodes: usize,
    /// Traversals of nodes that cannot log at all
    pub unlogged_traversals: usize,
    /// Largest inferred consecutive repeat of one node
    pub max_loop_depth: u32,
}

/// A walk over the call graph whose consumed emissions reproduce one
/// session's event sequence exactly and in order.
///
/// Invariant: flattening `matched` across steps yields the session's events
/// by ascending index, with no gaps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconstructedPath {
    pub steps: Vec<PathStep>,
    pub total_cost: u64,
    pub stats: PathStats,
}

impl ReconstructedPath {
    /// Collapse the engine's back-pointer walk into steps, merging runs of
    /// consecutive visits to the same node into one step with a repeat
    /// count, and derive the summary statistics.
    pub fn from_walk(
        graph: &CallGraph,
        session: &Session,
        walk: &[(NodeId, Option<usize>)],
        total_cost: u64,
    ) -> Self {
        let mut steps: Vec<PathStep> = Vec::new();
        let mut stats = PathStats::default();

        for &(node, matched) in walk {
            let consumed = matched.map(|event_index| MatchedEvent {
                event_index,
                statement: session.events[event_index].statement.clone(),
            });

            match consumed {
                Some(_) => stats.matched_events += 1,
                None => {
                    if graph.node(node).is_logged() {
                        stats.skipped_logged_nodes += 1;
                    } else {
                        stats.unlogged_traversals += 1;
                    }
                }
            }

            match steps.last_mut() {
                Some(step) if step.node == node => {
                    step.repeat_count += 1;
                    step.matched.extend(consumed);
                }
                _ => steps.push(PathStep {
                    node,
                    node_name: graph.node(node).name.clone(),
                    repeat_count: 1,
                    matched: consumed.into_iter().collect(),
                }),
            }
        }

        stats.max_loop_depth = steps.iter().map(|s| s.repeat_count).max().unwrap_or(0);

        Self {
            steps,
            total_cost,
            stats,
        }
    }

    /// Node names with repeats expanded back out, in execution order.
    /// This is the shape the evaluation functions compare against a known
    /// ground-truth execution.
    pub fn expanded_nodes(&self) -> Vec<String> {
        let mut nodes = Vec::new();
        for step in &self.steps {
            for _ in 0..step.repeat_count {
                nodes.push(step.node_name.clone());
            }
        }
        nodes
    }

    /// Statements consumed along the path, in order.
    pub fn matched_statements(&self) -> Vec<&LogStatementId> {
        self.steps
            .iter()
            .flat_map(|s| s.matched.iter().map(|m| &m.statement))
            .collect()
    }
}
