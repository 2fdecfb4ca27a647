// src/core/alignment/mod.rs
//! Alignment of observed sessions against call-graph walks
//!
//! The reconstruction core: constrained shortest-path search over the graph
//! treated as a nondeterministic automaton.

mod engine;

pub use engine::{AlignmentEngine, AlignmentFailure, AlignmentOutcome, FailureReason};
