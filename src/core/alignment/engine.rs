// src/core/alignment/engine.rs - Best-first alignment of a session against
// walks over the call graph.
//
// The graph is treated as a nondeterministic automaton: arriving at a node
// either consumes the next expected event (when the node can emit a matching
// statement) or traverses without consuming. Dijkstra-style best-first search
// over (node, consumed-event index) states finds the minimum-cost walks whose
// consumed emissions reproduce the session exactly and in order.
use std::cmp::{Ordering, Reverse};
use std::collections::{BinaryHeap, HashMap, HashSet};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::ReconstructionConfig;
use super::super::call_graph::{CallGraph, NodeId};
use super::super::observations::{LogStatementId, ObservedEvent};
use super::super::path::ReconstructedPath;
use super::super::session_splitter::Session;

/// Result of aligning one session: up to `top_k` distinct minimum-cost paths,
/// or a structured failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum AlignmentOutcome {
    Aligned(Vec<ReconstructedPath>),
    Failed(AlignmentFailure),
}

impl AlignmentOutcome {
    pub fn is_aligned(&self) -> bool {
        matches!(self, AlignmentOutcome::Aligned(_))
    }

    pub fn paths(&self) -> &[ReconstructedPath] {
        match self {
            AlignmentOutcome::Aligned(paths) => paths,
            AlignmentOutcome::Failed(_) => &[],
        }
    }
}

/// A session the engine could not fully explain. Carries the best
/// cost-optimal partial walk and the index of the first event it could not
/// explain, so a caller can judge whether the graph is stale, the matcher
/// mis-tagged an event, or the runtime genuinely diverged.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlignmentFailure {
    pub reason: FailureReason,
    pub best_partial: Option<ReconstructedPath>,
    pub first_unexplained: usize,
    pub explored_states: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum FailureReason {
    /// No entry point can reach any node bearing the session's first
    /// observed statement.
    UnreachableEntry { statement: LogStatementId },
    /// The whole reachable state space was searched without a complete walk.
    SearchSpaceExhausted,
    /// The state-count or wall-clock budget expired first.
    BudgetExhausted { explored: usize, elapsed_ms: u64 },
}

/// One record in the back-pointer arena. Records are immutable once pushed;
/// paths are materialized by walking `parent` links from a terminal record.
#[derive(Debug, Clone, Copy)]
struct StateRecord {
    node: NodeId,
    /// Events consumed so far
    event_index: usize,
    /// Whether arriving here consumed session[event_index - 1]
    matched: bool,
    /// Consecutive visits to this same node, this one included
    repeats: u32,
    /// Walk length, for stable tie-breaking
    length: u32,
    parent: Option<u32>,
    cost: u64,
}

/// Frontier entry ordered by (cost, walk length, discovery sequence); the
/// secondary keys make tie-breaking reproducible for a fixed graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Frontier {
    cost: u64,
    length: u32,
    seq: u64,
    record: u32,
}

impl Ord for Frontier {
    fn cmp(&self, other: &Self) -> Ordering {
        self.cost
            .cmp(&other.cost)
            .then(self.length.cmp(&other.length))
            .then(self.seq.cmp(&other.seq))
    }
}

impl PartialOrd for Frontier {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Aligns sessions against the shared call graph. Holds no mutable state;
/// every `align` call owns a private frontier and memo table.
pub struct AlignmentEngine<'a> {
    graph: &'a CallGraph,
    config: &'a ReconstructionConfig,
}

struct SearchSpace {
    arena: Vec<StateRecord>,
    heap: BinaryHeap<Reverse<Frontier>>,
    seq: u64,
}

impl SearchSpace {
    fn new() -> Self {
        Self {
            arena: Vec::new(),
            heap: BinaryHeap::new(),
            seq: 0,
        }
    }

    fn push(&mut self, record: StateRecord) {
        let idx = self.arena.len() as u32;
        let entry = Frontier {
            cost: record.cost,
            length: record.length,
            seq: self.seq,
            record: idx,
        };
        self.seq += 1;
        self.arena.push(record);
        self.heap.push(Reverse(entry));
    }
}

impl<'a> AlignmentEngine<'a> {
    pub fn new(graph: &'a CallGraph, config: &'a ReconstructionConfig) -> Self {
        Self { graph, config }
    }

    pub fn align(&self, session: &Session) -> AlignmentOutcome {
        let events = &session.events;

        // An empty session is evidence of nothing: a zero-length path
        // anchored at the first entry point, cost 0.
        if events.is_empty() {
            let entry = self.graph.entry_points()[0];
            let path = ReconstructedPath::from_walk(self.graph, session, &[(entry, None)], 0);
            return AlignmentOutcome::Aligned(vec![path]);
        }

        // A first statement no entry can reach means the graph and the
        // stream disagree about where execution starts.
        let first = &events[0].statement;
        if !self
            .graph
            .statement_nodes(first)
            .iter()
            .any(|&n| self.graph.is_entry_reachable(n))
        {
            return AlignmentOutcome::Failed(AlignmentFailure {
                reason: FailureReason::UnreachableEntry {
                    statement: first.clone(),
                },
                best_partial: None,
                first_unexplained: 0,
                explored_states: 0,
            });
        }

        let started = Instant::now();
        let deadline = self.config.search.wall_clock_ms.map(Duration::from_millis);
        let top_k = self.config.top_k;

        let mut space = SearchSpace::new();
        let mut settled: HashMap<(NodeId, usize), u32> = HashMap::new();
        let mut signatures: HashSet<Vec<(NodeId, Option<usize>)>> = HashSet::new();
        let mut paths: Vec<ReconstructedPath> = Vec::new();
        let mut best_partial: Option<(usize, u64, u32)> = None;
        let mut explored: usize = 0;
        let mut budget_hit = false;

        for &entry in self.graph.entry_points() {
            self.arrive(&mut space, entry, 0, None, 0, events);
        }

        while let Some(Reverse(frontier)) = space.heap.pop() {
            explored += 1;
            if explored > self.config.search.max_states {
                budget_hit = true;
                break;
            }
            if explored % 256 == 0 {
                if let Some(deadline) = deadline {
                    if started.elapsed() >= deadline {
                        budget_hit = true;
                        break;
                    }
                }
            }

            let record = space.arena[frontier.record as usize];

            // k-best: each (node, event index) may be settled up to top_k
            // times, which is what admits cost-tied alternative walks.
            let visits = settled.entry((record.node, record.event_index)).or_insert(0);
            if *visits >= top_k as u32 {
                continue;
            }
            *visits += 1;

            if record.event_index == events.len() {
                let walk = self.trace_walk(&space.arena, frontier.record);
                if signatures.insert(walk.clone()) {
                    paths.push(ReconstructedPath::from_walk(
                        self.graph,
                        session,
                        &walk,
                        record.cost,
                    ));
                    if paths.len() >= top_k {
                        break;
                    }
                }
                continue;
            }

            let improves = match best_partial {
                None => true,
                Some((best_index, best_cost, _)) => {
                    record.event_index > best_index
                        || (record.event_index == best_index && record.cost < best_cost)
                }
            };
            if improves {
                best_partial = Some((record.event_index, record.cost, frontier.record));
            }

            for edge in self.graph.outgoing(record.node) {
                let base = record.cost + edge.cost_hint.unwrap_or(0);
                self.arrive(
                    &mut space,
                    edge.target,
                    base,
                    Some((frontier.record, record.node, record.repeats, record.length)),
                    record.event_index,
                    events,
                );
            }
        }

        let elapsed_ms = started.elapsed().as_millis() as u64;
        debug!(
            "alignment explored {} states in {}ms: {} path(s)",
            explored,
            elapsed_ms,
            paths.len()
        );

        if !paths.is_empty() {
            return AlignmentOutcome::Aligned(paths);
        }

        let (first_unexplained, partial) = match best_partial {
            Some((index, _, record)) => {
                let walk = self.trace_walk(&space.arena, record);
                let cost = space.arena[record as usize].cost;
                (
                    index,
                    Some(ReconstructedPath::from_walk(self.graph, session, &walk, cost)),
                )
            }
            None => (0, None),
        };

        AlignmentOutcome::Failed(AlignmentFailure {
            reason: if budget_hit {
                FailureReason::BudgetExhausted {
                    explored,
                    elapsed_ms,
                }
            } else {
                FailureReason::SearchSpaceExhausted
            },
            best_partial: partial,
            first_unexplained,
            explored_states: explored,
        })
    }

    /// Push the states reachable by arriving at `node` with `pending` events
    /// consumed: one that consumes the next expected event when the node can
    /// emit it, and one that traverses without consuming.
    fn arrive(
        &self,
        space: &mut SearchSpace,
        node: NodeId,
        base_cost: u64,
        from: Option<(u32, NodeId, u32, u32)>,
        pending: usize,
        events: &[ObservedEvent],
    ) {
        let (parent, repeats, length) = match from {
            Some((parent, prev_node, prev_repeats, prev_length)) => {
                let repeats = if prev_node == node { prev_repeats + 1 } else { 1 };
                (Some(parent), repeats, prev_length + 1)
            }
            None => (None, 1, 1),
        };

        if repeats > self.config.cost.max_loop_repeats {
            return;
        }

        let target = self.graph.node(node);

        if pending < events.len() && target.emits(&events[pending].statement) {
            // Consuming traversal: the evidence directly justifies this
            // step, including another iteration of the active cycle.
            self.admit(
                space,
                StateRecord {
                    node,
                    event_index: pending + 1,
                    matched: true,
                    repeats,
                    length,
                    parent,
                    cost: base_cost,
                },
            );
        }

        // Non-consuming traversal: skipping a statement-bearing node means
        // its logs should have appeared and did not; a repeat visit without
        // consumption is a loop iteration the evidence never asked for.
        let mut skip_cost = base_cost;
        if target.is_logged() {
            skip_cost += self.config.cost.skip_cost;
        }
        if repeats > 1 {
            skip_cost += self.config.cost.loop_penalty;
        }
        self.admit(
            space,
            StateRecord {
                node,
                event_index: pending,
                matched: false,
                repeats,
                length,
                parent,
                cost: skip_cost,
            },
        );
    }

    fn admit(&self, space: &mut SearchSpace, record: StateRecord) {
        if let Some(max_cost) = self.config.search.max_cost {
            if record.cost > max_cost {
                return;
            }
        }
        space.push(record);
    }

    /// Walk parent links back to the seed and reverse, yielding the node
    /// sequence with the consumed event index per step.
    fn trace_walk(
        &self,
        arena: &[StateRecord],
        terminal: u32,
    ) -> Vec<(NodeId, Option<usize>)> {
        let mut walk = Vec::new();
        let mut cursor = Some(terminal);
        while let Some(idx) = cursor {
            let record = &arena[idx as usize];
            let matched = if record.matched {
                Some(record.event_index - 1)
            } else {
                None
            };
            walk.push((record.node, matched));
            cursor = record.parent;
        }
        walk.reverse();
        walk
    }
}
