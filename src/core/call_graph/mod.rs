// src/core/call_graph/mod.rs
//! Static call graph model for Pathweaver
//!
//! An immutable, over-approximate inter-procedural call graph whose nodes
//! carry the logging statements they may emit. Built once by external static
//! analysis through the builder, then shared read-only by every alignment.

mod graph;
mod simplify;

pub use graph::{
    CallGraph, CallGraphBuilder, CallGraphStats, Edge, EdgeKind, Node, NodeId, NodeKind,
};
pub use simplify::collapse_unlogged;
