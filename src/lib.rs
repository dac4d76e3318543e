//! # Logicbox Core
//!
//! A digital logic workbench engine.
//!
//! This library provides:
//! - A gate/wire circuit model with slot-level validation
//! - Reusable subcircuit templates with nested instances
//! - An evaluator that settles combinational logic in one pass and relaxes
//!   feedback loops (latches, rings) under an iteration cap
//! - Promotion of a selection of gates into a new template
//! - A session layer with bounded undo/redo and change notifications
//! - JSON interchange for templates and whole workbenches
//!
//! ## Architecture
//!
//! - [`circuit`] - Circuit graph, gate kinds, and validation
//! - [`subcircuit`] - Templates, the registry, flattening, and promotion
//! - [`solver`] - Evaluation order and the evaluator
//! - [`session`] - Commands, queries, history, and events for a host
//! - [`interchange`] - JSON documents
//! - [`trace`] - Step-by-step signal printer (CLI only)
//!
//! ## Usage
//!
//! ### Native CLI
//!
//! ```bash
//! LOGICBOX_LOG=debug logicbox adder.json --set a=1 --set b=0 --ticks 8
//! ```
//!
//! ### Library
//!
//! ```
//! use logicbox_core::circuit::{Gate, GateKind, Placement, SlotRef};
//! use logicbox_core::Session;
//!
//! let mut session = Session::new();
//! let (a, _) = session.add_gate(Gate::new(GateKind::Input, Placement::default())).unwrap();
//! let (not, _) = session.add_gate(Gate::new(GateKind::Not, Placement::default())).unwrap();
//! session.add_wire(SlotRef::new(a, 0), SlotRef::new(not, 0)).unwrap();
//! let snapshot = session.set_input_value(a, true).unwrap();
//! assert_eq!(snapshot.signals[&SlotRef::new(not, 0)], false);
//! ```
//!
//! ### WASM
//!
//! ```javascript
//! import { WasmSandbox } from 'logicbox_core';
//!
//! const box = new WasmSandbox();
//! const a = box.add_gate("INPUT", 0, 0);
//! ```
//!
//! ## Evaluation Method
//!
//! Gates are grouped into strongly connected components and visited in
//! topological order. Acyclic gates fire once. A component with feedback
//! is relaxed: every gate reads the previous scan's values, and scans repeat
//! until nothing changes or the cap is hit, at which point the component is
//! reported as oscillating and held at its last computed values.

pub mod circuit;
pub mod diagnostic;
pub mod error;
pub mod events;
pub mod history;
pub mod interchange;
pub mod session;
pub mod solver;
pub mod subcircuit;

#[cfg(feature = "cli")]
pub mod trace;

// Re-export main types for convenience
pub use circuit::Circuit;
pub use error::{LogicboxError, Result};
pub use session::Session;
pub use solver::Evaluator;
pub use subcircuit::Registry;

// WASM bindings
#[cfg(feature = "wasm")]
mod wasm;

#[cfg(feature = "wasm")]
pub use wasm::WasmSandbox;
