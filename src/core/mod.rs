// src/core/mod.rs
mod alignment;
mod call_graph;
mod evaluation;
mod observations;
mod path;
mod reconstructor;
mod session_splitter;

pub use call_graph::{
    collapse_unlogged, CallGraph, CallGraphBuilder, CallGraphStats, Edge, EdgeKind, Node, NodeId,
    NodeKind,
};
pub use observations::{assign_sequence_indices, LogStatementId, ObservedEvent, ThreadId};
pub use session_splitter::{Session, SessionSplitter, SplitStats};
pub use alignment::{AlignmentEngine, AlignmentFailure, AlignmentOutcome, FailureReason};
pub use path::{MatchedEvent, PathStats, PathStep, ReconstructedPath};
pub use reconstructor::{
    reconstruct, ReconstructionReport, ReconstructionStats, Reconstructor, SessionReconstruction,
};
pub use evaluation::{evaluate_precision, evaluate_recall, match_reconstruction};
