// src/core/call_graph/graph.rs - Immutable annotated call graph
use std::collections::{HashMap, HashSet, VecDeque};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{PathweaverError, Result};
use super::super::observations::LogStatementId;

/// Index of a node in the graph's node table; stable for the graph's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub usize);

impl NodeId {
    pub fn index(&self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeKind {
    Function,
    Method,
    Closure,
    /// Callable outside the analyzed source (library, FFI)
    External,
    /// Product of unlogged-node collapsing, see `simplify`
    Collapsed,
}

/// A callable unit in the call graph.
///
/// `statements` is the set of logging call sites this node may execute; it is
/// empty for unlogged nodes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub name: String,
    pub kind: NodeKind,
    pub statements: HashSet<LogStatementId>,
}

impl Node {
    /// Whether executing this node can produce any log evidence at all.
    pub fn is_logged(&self) -> bool {
        !self.statements.is_empty()
    }

    pub fn emits(&self, statement: &LogStatementId) -> bool {
        self.statements.contains(statement)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EdgeKind {
    /// Statically resolved call
    Direct,
    /// Polymorphic/virtual call site; one of several possible targets
    Virtual,
    /// Self-recursion
    RecursiveSelfLoop,
}

/// A call edge. `cost_hint` is a soft bias added to the traversal cost
/// whenever the edge is taken.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Edge {
    pub source: NodeId,
    pub target: NodeId,
    pub kind: EdgeKind,
    pub cost_hint: Option<u64>,
}

/// Immutable inter-procedural call graph annotated with logging statements.
///
/// Built once through [`CallGraphBuilder`] and shared read-only across all
/// concurrent reconstructions. Cycles are structurally present and never
/// unrolled; the alignment engine bounds them at search time.
#[derive(Debug, Clone, Serialize)]
pub struct CallGraph {
    nodes: Vec<Node>,
    edges: Vec<Edge>,
    entry_points: Vec<NodeId>,
    /// Outgoing edge indices per node, in edge insertion order. The fixed
    /// iteration order is what makes alignment tie-breaking reproducible.
    adjacency: Vec<Vec<usize>>,
    /// Statement id -> nodes that may emit it
    statement_index: HashMap<LogStatementId, Vec<NodeId>>,
    /// Nodes reachable from at least one entry point
    reachable: HashSet<NodeId>,
}

impl CallGraph {
    pub fn builder() -> CallGraphBuilder {
        CallGraphBuilder::new()
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn entry_points(&self) -> &[NodeId] {
        &self.entry_points
    }

    /// Outgoing edges of a node, in the graph's fixed iteration order.
    pub fn outgoing(&self, id: NodeId) -> impl Iterator<Item = &Edge> {
        self.adjacency[id.0].iter().map(move |&e| &self.edges[e])
    }

    pub fn out_degree(&self, id: NodeId) -> usize {
        self.adjacency[id.0].len()
    }

    /// Nodes that may emit the given statement; empty when the statement is
    /// unknown to the graph (stale or mismatched static analysis).
    pub fn statement_nodes(&self, statement: &LogStatementId) -> &[NodeId] {
        self.statement_index
            .get(statement)
            .map(|nodes| nodes.as_slice())
            .unwrap_or(&[])
    }

    pub fn contains_statement(&self, statement: &LogStatementId) -> bool {
        self.statement_index.contains_key(statement)
    }

    pub fn is_entry_reachable(&self, id: NodeId) -> bool {
        self.reachable.contains(&id)
    }

    /// Find a node by name. Linear scan; intended for tests and tooling, not
    /// the alignment hot path.
    pub fn node_by_name(&self, name: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.name == name)
    }

    pub fn stats(&self) -> CallGraphStats {
        CallGraphStats {
            total_nodes: self.nodes.len(),
            total_edges: self.edges.len(),
            entry_points: self.entry_points.len(),
            logged_nodes: self.nodes.iter().filter(|n| n.is_logged()).count(),
            statements: self.statement_index.len(),
            cycles: self.count_back_edges(),
        }
    }

    /// Count back edges found by DFS from the entry points. A non-zero count
    /// means the graph is cyclic.
    fn count_back_edges(&self) -> usize {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            Unvisited,
            Active,
            Done,
        }

        let mut marks = vec![Mark::Unvisited; self.nodes.len()];
        let mut back_edges = 0;

        // Iterative DFS; the graph may be deeper than the stack allows.
        for &entry in &self.entry_points {
            if marks[entry.0] != Mark::Unvisited {
                continue;
            }
            let mut stack: Vec<(usize, usize)> = vec![(entry.0, 0)];
            marks[entry.0] = Mark::Active;

            while let Some(top) = stack.last_mut() {
                let node = top.0;
                if top.1 < self.adjacency[node].len() {
                    let target = self.edges[self.adjacency[node][top.1]].target.0;
                    top.1 += 1;
                    match marks[target] {
                        Mark::Unvisited => {
                            marks[target] = Mark::Active;
                            stack.push((target, 0));
                        }
                        Mark::Active => back_edges += 1,
                        Mark::Done => {}
                    }
                } else {
                    marks[node] = Mark::Done;
                    stack.pop();
                }
            }
        }

        back_edges
    }

    fn compute_reachable(
        nodes: &[Node],
        edges: &[Edge],
        adjacency: &[Vec<usize>],
        entry_points: &[NodeId],
    ) -> HashSet<NodeId> {
        let mut reachable = HashSet::with_capacity(nodes.len());
        let mut queue: VecDeque<NodeId> = entry_points.iter().copied().collect();
        for &entry in entry_points {
            reachable.insert(entry);
        }

        while let Some(node) = queue.pop_front() {
            for &edge_idx in &adjacency[node.0] {
                let target = edges[edge_idx].target;
                if reachable.insert(target) {
                    queue.push_back(target);
                }
            }
        }

        reachable
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallGraphStats {
    pub total_nodes: usize,
    pub total_edges: usize,
    pub entry_points: usize,
    pub logged_nodes: usize,
    pub statements: usize,
    pub cycles: usize,
}

/// Ingestion boundary for the external static-analysis component: collect
/// nodes, statement annotations, edges, and entry points, then validate and
/// freeze into a [`CallGraph`].
#[derive(Debug, Default)]
pub struct CallGraphBuilder {
    nodes: Vec<Node>,
    edges: Vec<Edge>,
    entry_points: Vec<NodeId>,
}

impl CallGraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node<S: Into<String>>(&mut self, name: S, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            id,
            name: name.into(),
            kind,
            statements: HashSet::new(),
        });
        id
    }

    /// Annotate a node with a logging statement it may emit.
    pub fn annotate(&mut self, node: NodeId, statement: LogStatementId) -> &mut Self {
        self.nodes[node.0].statements.insert(statement);
        self
    }

    pub fn add_edge(&mut self, source: NodeId, target: NodeId, kind: EdgeKind) -> &mut Self {
        self.edges.push(Edge {
            source,
            target,
            kind,
            cost_hint: None,
        });
        self
    }

    pub fn add_edge_with_hint(
        &mut self,
        source: NodeId,
        target: NodeId,
        kind: EdgeKind,
        cost_hint: u64,
    ) -> &mut Self {
        self.edges.push(Edge {
            source,
            target,
            kind,
            cost_hint: Some(cost_hint),
        });
        self
    }

    pub fn mark_entry(&mut self, node: NodeId) -> &mut Self {
        if !self.entry_points.contains(&node) {
            self.entry_points.push(node);
        }
        self
    }

    /// Validate and freeze. Dangling edges and missing entry points are hard
    /// errors; unreachable nodes are kept but logged, since a stale graph is
    /// exactly what reconstruction-time failures must be able to diagnose.
    pub fn build(self) -> Result<CallGraph> {
        if self.entry_points.is_empty() {
            return Err(PathweaverError::Graph(
                "call graph has no entry points".to_string(),
            ));
        }

        for edge in &self.edges {
            if edge.source.0 >= self.nodes.len() || edge.target.0 >= self.nodes.len() {
                return Err(PathweaverError::Graph(format!(
                    "edge {:?} -> {:?} references a node outside the graph",
                    edge.source, edge.target
                )));
            }
        }

        let mut adjacency: Vec<Vec<usize>> = vec![Vec::new(); self.nodes.len()];
        for (idx, edge) in self.edges.iter().enumerate() {
            adjacency[edge.source.0].push(idx);
        }

        let mut statement_index: HashMap<LogStatementId, Vec<NodeId>> = HashMap::new();
        for node in &self.nodes {
            for statement in &node.statements {
                statement_index
                    .entry(statement.clone())
                    .or_default()
                    .push(node.id);
            }
        }
        // Deterministic candidate order regardless of HashSet iteration
        for nodes in statement_index.values_mut() {
            nodes.sort();
            nodes.dedup();
        }

        let reachable =
            CallGraph::compute_reachable(&self.nodes, &self.edges, &adjacency, &self.entry_points);
        if reachable.len() < self.nodes.len() {
            warn!(
                "{} of {} nodes unreachable from any entry point",
                self.nodes.len() - reachable.len(),
                self.nodes.len()
            );
        }

        Ok(CallGraph {
            nodes: self.nodes,
            edges: self.edges,
            entry_points: self.entry_points,
            adjacency,
            statement_index,
            reachable,
        })
    }
}
