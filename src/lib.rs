//! Pathweaver reconstructs the concrete execution path that produced an
//! observed log stream, combining a statically built call graph annotated
//! with logging-statement locations and an ordered sequence of runtime log
//! observations.
//!
//! The crate is a library consumed by surrounding tooling: static analysis
//! feeds a [`CallGraph`] through [`CallGraphBuilder`], a log-to-statement
//! matcher feeds [`ObservedEvent`]s, and [`reconstruct`] returns the most
//! plausible walk(s) per execution session.
//!
//! ```
//! use pathweaver::{
//!     reconstruct, CallGraph, EdgeKind, NodeKind, ObservedEvent,
//!     ReconstructionConfig,
//! };
//! use chrono::Utc;
//!
//! let mut builder = CallGraph::builder();
//! let main = builder.add_node("main", NodeKind::Function);
//! let handle = builder.add_node("handle", NodeKind::Function);
//! builder.annotate(handle, "handler.rs:10".into());
//! builder.add_edge(main, handle, EdgeKind::Direct);
//! builder.mark_entry(main);
//! let graph = builder.build().unwrap();
//!
//! let events = vec![ObservedEvent::new(
//!     "handler.rs:10".into(),
//!     Utc::now(),
//!     "worker-1".into(),
//!     0,
//! )];
//!
//! let report = reconstruct(&graph, &events, &ReconstructionConfig::default()).unwrap();
//! assert_eq!(report.stats.aligned, 1);
//! ```

mod config;
mod core;
mod error;

pub use config::{CostConfig, ReconstructionConfig, SearchBudget, SplitterConfig};
pub use crate::core::{
    assign_sequence_indices, collapse_unlogged, evaluate_precision, evaluate_recall,
    match_reconstruction, reconstruct, AlignmentEngine, AlignmentFailure, AlignmentOutcome,
    CallGraph, CallGraphBuilder, CallGraphStats, Edge, EdgeKind, FailureReason, LogStatementId,
    MatchedEvent, Node, NodeId, NodeKind, ObservedEvent, PathStats, PathStep, ReconstructedPath,
    ReconstructionReport, ReconstructionStats, Reconstructor, Session, SessionReconstruction,
    SessionSplitter, SplitStats, ThreadId,
};
pub use error::{PathweaverError, Result};
