// src/core/call_graph/simplify.rs - Unlogged-node collapsing
//
// Execution of nodes that emit no logging statements can never be told apart
// from log evidence when they sit in a plain sequence or as exact parallel
// alternatives. Collapsing them yields a smaller graph that aligns faster and
// presents better, without changing what the evidence can distinguish.
use std::collections::{BTreeSet, HashMap, HashSet};

use crate::error::Result;
use super::graph::{CallGraph, EdgeKind, NodeKind};

/// Collapse unlogged serial chains ("a,b") and unlogged parallel
/// alternatives ("a|b") to fixpoint, returning a new graph. Entry points and
/// statement-bearing nodes are never merged. The input graph is untouched.
pub fn collapse_unlogged(graph: &CallGraph) -> Result<CallGraph> {
    let mut mirror = Mirror::from_graph(graph);

    loop {
        let before = mirror.alive_count();

        while mirror.serial_pass() {}
        mirror.group_merged_names();

        while mirror.parallel_pass() {}
        mirror.group_merged_names();

        if mirror.alive_count() == before {
            break;
        }
    }

    mirror.rebuild()
}

struct MirrorNode {
    name: String,
    kind: NodeKind,
    statements: HashSet<super::super::observations::LogStatementId>,
}

/// Mutable working copy of the graph during contraction.
struct Mirror {
    nodes: Vec<Option<MirrorNode>>,
    succs: Vec<BTreeSet<usize>>,
    preds: Vec<BTreeSet<usize>>,
    edge_meta: HashMap<(usize, usize), (EdgeKind, Option<u64>)>,
    entries: Vec<usize>,
}

impl Mirror {
    fn from_graph(graph: &CallGraph) -> Self {
        let n = graph.node_count();
        let mut succs = vec![BTreeSet::new(); n];
        let mut preds = vec![BTreeSet::new(); n];
        let mut edge_meta = HashMap::new();

        for edge in graph.edges() {
            let (s, t) = (edge.source.index(), edge.target.index());
            succs[s].insert(t);
            preds[t].insert(s);
            edge_meta
                .entry((s, t))
                .or_insert((edge.kind, edge.cost_hint));
        }

        let nodes = graph
            .nodes()
            .iter()
            .map(|node| {
                Some(MirrorNode {
                    name: node.name.clone(),
                    kind: node.kind,
                    statements: node.statements.clone(),
                })
            })
            .collect();

        Self {
            nodes,
            succs,
            preds,
            edge_meta,
            entries: graph.entry_points().iter().map(|e| e.index()).collect(),
        }
    }

    fn alive_count(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_some()).count()
    }

    fn is_collapsible(&self, idx: usize) -> bool {
        match &self.nodes[idx] {
            Some(node) => node.statements.is_empty() && !self.entries.contains(&idx),
            None => false,
        }
    }

    /// One sweep merging unlogged single-successor chains: a -> b becomes
    /// "a,b" when neither end is logged or an entry. Returns whether any
    /// contraction happened.
    fn serial_pass(&mut self) -> bool {
        let mut changed = false;

        for v in 0..self.nodes.len() {
            if !self.is_collapsible(v) || self.succs[v].len() != 1 {
                continue;
            }
            let w = *self.succs[v].iter().next().unwrap();
            if w == v || !self.is_collapsible(w) {
                continue;
            }

            self.contract_serial(v, w);
            changed = true;
        }

        changed
    }

    /// Merge w into v: v keeps its predecessors, inherits w's successors,
    /// and the v -> w edge disappears. A w -> v edge would become a
    /// self-loop created by the contraction itself and is dropped.
    fn contract_serial(&mut self, v: usize, w: usize) {
        let w_node = self.nodes[w].take().unwrap();
        {
            let v_node = self.nodes[v].as_mut().unwrap();
            v_node.name = format!("{},{}", v_node.name, w_node.name);
            v_node.kind = NodeKind::Collapsed;
        }

        self.succs[v].remove(&w);
        self.edge_meta.remove(&(v, w));

        let w_succs: Vec<usize> = self.succs[w].iter().copied().collect();
        self.succs[w].clear();
        for t in w_succs {
            self.preds[t].remove(&w);
            let meta = self.edge_meta.remove(&(w, t)).unwrap_or((EdgeKind::Direct, None));
            if t == v {
                continue;
            }
            self.succs[v].insert(t);
            self.preds[t].insert(v);
            self.edge_meta.entry((v, t)).or_insert(meta);
        }

        let w_preds: Vec<usize> = self.preds[w].iter().copied().collect();
        self.preds[w].clear();
        for s in w_preds {
            self.succs[s].remove(&w);
            let meta = self.edge_meta.remove(&(s, w)).unwrap_or((EdgeKind::Direct, None));
            if s == v {
                continue;
            }
            self.succs[s].insert(v);
            self.preds[v].insert(s);
            self.edge_meta.entry((s, v)).or_insert(meta);
        }
    }

    /// One sweep merging unlogged exact parallel alternatives: nodes with
    /// identical predecessor and successor sets become "a|b".
    fn parallel_pass(&mut self) -> bool {
        let mut changed = false;

        for v in 0..self.nodes.len() {
            if !self.is_collapsible(v) {
                continue;
            }

            // Candidates share at least one predecessor with v.
            let mut candidates: BTreeSet<usize> = BTreeSet::new();
            for &s in &self.preds[v] {
                for &c in &self.succs[s] {
                    if c != v && self.is_collapsible(c) {
                        candidates.insert(c);
                    }
                }
            }

            for c in candidates {
                if self.preds[c] == self.preds[v] && self.succs[c] == self.succs[v] {
                    self.merge_parallel(v, c);
                    changed = true;
                }
            }
        }

        changed
    }

    fn merge_parallel(&mut self, v: usize, c: usize) {
        let c_node = self.nodes[c].take().unwrap();
        {
            let v_node = self.nodes[v].as_mut().unwrap();
            v_node.name = format!("{}|{}", v_node.name, c_node.name);
            v_node.kind = NodeKind::Collapsed;
        }

        // Edge sets are identical by the merge condition; c's copies just go.
        let c_succs: Vec<usize> = self.succs[c].iter().copied().collect();
        for t in c_succs {
            self.preds[t].remove(&c);
            self.edge_meta.remove(&(c, t));
        }
        let c_preds: Vec<usize> = self.preds[c].iter().copied().collect();
        for s in c_preds {
            self.succs[s].remove(&c);
            self.edge_meta.remove(&(s, c));
        }
        self.succs[c].clear();
        self.preds[c].clear();
    }

    /// Wrap freshly merged names in parentheses, mirroring how collapsed
    /// groups stay readable once they merge again: "a,b" -> "(a,b)".
    fn group_merged_names(&mut self) {
        for node in self.nodes.iter_mut().flatten() {
            let needs_group = (node.name.contains(',') || node.name.contains('|'))
                && !(node.name.starts_with('(') && node.name.ends_with(')'));
            if needs_group {
                node.name = format!("({})", node.name);
            }
        }
    }

    fn rebuild(self) -> Result<CallGraph> {
        let mut builder = CallGraph::builder();
        let mut remap: HashMap<usize, super::graph::NodeId> = HashMap::new();

        for (idx, node) in self.nodes.iter().enumerate() {
            if let Some(node) = node {
                let id = builder.add_node(node.name.clone(), node.kind);
                for statement in &node.statements {
                    builder.annotate(id, statement.clone());
                }
                remap.insert(idx, id);
            }
        }

        for (idx, succs) in self.succs.iter().enumerate() {
            if self.nodes[idx].is_none() {
                continue;
            }
            for &t in succs {
                let (kind, hint) = self
                    .edge_meta
                    .get(&(idx, t))
                    .copied()
                    .unwrap_or((EdgeKind::Direct, None));
                match hint {
                    Some(h) => builder.add_edge_with_hint(remap[&idx], remap[&t], kind, h),
                    None => builder.add_edge(remap[&idx], remap[&t], kind),
                };
            }
        }

        for entry in &self.entries {
            builder.mark_entry(remap[entry]);
        }

        builder.build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serial_chain_collapses() {
        let mut builder = CallGraph::builder();
        let a = builder.add_node("a", NodeKind::Function);
        let x = builder.add_node("x", NodeKind::Function);
        let y = builder.add_node("y", NodeKind::Function);
        let d = builder.add_node("d", NodeKind::Function);
        builder.annotate(a, "a:1".into());
        builder.annotate(d, "d:1".into());
        builder.add_edge(a, x, EdgeKind::Direct);
        builder.add_edge(x, y, EdgeKind::Direct);
        builder.add_edge(y, d, EdgeKind::Direct);
        builder.mark_entry(a);
        let graph = builder.build().unwrap();

        let collapsed = collapse_unlogged(&graph).unwrap();
        assert_eq!(collapsed.node_count(), 3);

        let merged = collapsed.node_by_name("(x,y)").unwrap();
        assert_eq!(merged.kind, NodeKind::Collapsed);
        assert!(!merged.is_logged());
    }

    #[test]
    fn test_parallel_alternatives_merge() {
        let mut builder = CallGraph::builder();
        let a = builder.add_node("a", NodeKind::Function);
        let x = builder.add_node("x", NodeKind::Function);
        let y = builder.add_node("y", NodeKind::Function);
        let d = builder.add_node("d", NodeKind::Function);
        builder.annotate(a, "a:1".into());
        builder.annotate(d, "d:1".into());
        builder.add_edge(a, x, EdgeKind::Direct);
        builder.add_edge(a, y, EdgeKind::Virtual);
        builder.add_edge(x, d, EdgeKind::Direct);
        builder.add_edge(y, d, EdgeKind::Direct);
        builder.mark_entry(a);
        let graph = builder.build().unwrap();

        let collapsed = collapse_unlogged(&graph).unwrap();
        assert_eq!(collapsed.node_count(), 3);
        assert!(collapsed.node_by_name("(x|y)").is_some());
    }

    #[test]
    fn test_logged_nodes_never_collapse() {
        let mut builder = CallGraph::builder();
        let a = builder.add_node("a", NodeKind::Function);
        let b = builder.add_node("b", NodeKind::Function);
        let c = builder.add_node("c", NodeKind::Function);
        builder.annotate(a, "a:1".into());
        builder.annotate(b, "b:1".into());
        builder.annotate(c, "c:1".into());
        builder.add_edge(a, b, EdgeKind::Direct);
        builder.add_edge(b, c, EdgeKind::Direct);
        builder.mark_entry(a);
        let graph = builder.build().unwrap();

        let collapsed = collapse_unlogged(&graph).unwrap();
        assert_eq!(collapsed.node_count(), 3);
    }

    #[test]
    fn test_self_loop_survives_collapse() {
        let mut builder = CallGraph::builder();
        let a = builder.add_node("a", NodeKind::Function);
        let x = builder.add_node("x", NodeKind::Function);
        let b = builder.add_node("b", NodeKind::Function);
        builder.annotate(a, "a:1".into());
        builder.annotate(b, "b:1".into());
        builder.add_edge(a, x, EdgeKind::Direct);
        builder.add_edge(b, b, EdgeKind::RecursiveSelfLoop);
        builder.add_edge(x, b, EdgeKind::Direct);
        builder.mark_entry(a);
        let graph = builder.build().unwrap();

        let collapsed = collapse_unlogged(&graph).unwrap();
        let b = collapsed.node_by_name("b").unwrap();
        let has_self_loop = collapsed
            .outgoing(b.id)
            .any(|e| e.target == b.id && e.kind == EdgeKind::RecursiveSelfLoop);
        assert!(has_self_loop);
    }
}
