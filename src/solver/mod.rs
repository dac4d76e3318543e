//! Signal evaluation.
//!
//! This module turns a gate/wire graph into stable signal values.
//!
//! ## Scheduling
//!
//! The wire dependency graph is split into strongly connected components,
//! visited upstream first:
//!
//! - an acyclic component (one gate, no self-wire) is fired exactly once
//! - a cyclic component (a feedback loop) is relaxed: every member is
//!   re-evaluated from the previous scan's values until nothing changes
//!
//! A loop that is still changing after
//! `max(min_iterations, iterations_per_gate * size)` scans is reported as
//! oscillating and held at its last computed values.
//!
//! An acyclic graph is therefore evaluated in a single O(gates + wires)
//! pass.

mod evaluator;
mod order;
mod relaxation;

pub use evaluator::{Evaluator, EvaluatorConfig, Report, Strategy};
pub use order::{Component, Schedule};
pub use relaxation::{FeedbackSeed, Outcome, Relaxation};

/// Minimum relaxation scans for any feedback loop.
pub const DEFAULT_MIN_ITERATIONS: usize = 16;

/// Additional relaxation scans allowed per gate in a feedback loop.
pub const DEFAULT_ITERATIONS_PER_GATE: usize = 4;
