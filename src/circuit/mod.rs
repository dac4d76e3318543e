//! Circuit graph representation and validation.
//!
//! A [`Circuit`] owns its gates and wires in ascending-id maps, plus an
//! index of occupied input slots. Every mutation checks the slot invariants
//! and leaves the graph untouched when it fails.

mod graph;
mod kind;
mod types;
mod validate;

pub use graph::{Circuit, Gate, SignalMap, Wire};
pub use kind::GateKind;
pub use types::*;
pub use validate::{validate_circuit, validate_template};
