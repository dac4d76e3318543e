//! Error types for the Logicbox engine.
//!
//! This module provides a unified error type [`LogicboxError`] that covers
//! every way a command against the engine can be rejected: graph mutations,
//! template registration, selection promotion and document interchange.
//!
//! Oscillation is deliberately absent here. A feedback loop that never
//! settles is reported as a [`Diagnostic`](crate::diagnostic::Diagnostic)
//! and the engine keeps running.

use serde::Serialize;
use thiserror::Error;

use crate::circuit::{GateId, SlotDirection, SlotRef, TemplateId, WireId};

/// Result type alias using [`LogicboxError`].
pub type Result<T> = std::result::Result<T, LogicboxError>;

/// The specific way a graph mutation broke a structural invariant.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "violation", rename_all = "camelCase")]
pub enum Violation {
    /// Gate id not present in the circuit
    #[error("gate {gate} does not exist")]
    UnknownGate { gate: GateId },

    /// Wire id not present in the circuit
    #[error("wire {wire} does not exist")]
    UnknownWire { wire: WireId },

    /// Slot index beyond what the gate kind provides
    #[error("{direction} slot {slot} is out of range ({available} available)")]
    SlotOutOfRange {
        slot: SlotRef,
        direction: SlotDirection,
        available: usize,
    },

    /// Input slot already driven by another wire
    #[error("input slot {slot} is already driven by wire {wire}")]
    SlotOccupied { slot: SlotRef, wire: WireId },

    /// Gate id collides with an existing gate
    #[error("gate id {gate} is already in use")]
    DuplicateGate { gate: GateId },

    /// Wire id collides with an existing wire
    #[error("wire id {wire} is already in use")]
    DuplicateWire { wire: WireId },

    /// Value assignment on a gate that is not an INPUT
    #[error("gate {gate} is not an INPUT gate")]
    NotAnInput { gate: GateId },

    /// Subcircuit slot counts disagree with its nested circuit or template
    #[error("gate {gate} has {inputs}/{outputs} slots but its template expects {expected_inputs}/{expected_outputs}")]
    ArityMismatch {
        gate: GateId,
        inputs: usize,
        outputs: usize,
        expected_inputs: usize,
        expected_outputs: usize,
    },
}

/// Unified error type for all Logicbox operations.
#[derive(Error, Debug)]
pub enum LogicboxError {
    // ============ Graph Errors ============
    /// Slot or arity misuse while mutating a circuit
    #[error("Structural violation: {0}")]
    StructuralViolation(#[from] Violation),

    // ============ Template Errors ============
    /// Template references itself, directly or through nested subcircuits
    #[error("Template '{template}' references itself via {}", format_path(.path))]
    CyclicTemplateReference {
        template: String,
        path: Vec<TemplateId>,
    },

    /// Subcircuit refers to a template id the registry does not know
    #[error("Unresolved template {template}")]
    UnresolvedTemplate { template: TemplateId },

    /// Template still referenced by live subcircuit gates
    #[error("Template {template} is still referenced by {references} subcircuit gate(s)")]
    TemplateInUse {
        template: TemplateId,
        references: usize,
    },

    /// Template failed validation
    #[error("Invalid template '{name}': {message}")]
    InvalidTemplate { name: String, message: String },

    // ============ Selection Errors ============
    /// Boundary wire cannot be mapped to exactly one port direction
    #[error("Ambiguous boundary at wire {wire}: {message}")]
    AmbiguousBoundary { wire: WireId, message: String },

    // ============ Interchange Errors ============
    /// Malformed interchange document
    #[error("Interchange error: {message}")]
    Interchange { message: String },

    /// Error reading a workbench or template file
    #[error("Failed to read file '{path}': {source}")]
    FileReadError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Label given on the command line matches no INPUT gate
    #[error("No INPUT gate labelled '{label}'")]
    UnknownLabel { label: String },

    /// Error writing the signal trace
    #[error("Trace output error: {message}")]
    TraceOutputError { message: String },
}

impl LogicboxError {
    /// Create an invalid template error
    pub fn invalid_template(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidTemplate {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Create an ambiguous boundary error
    pub fn ambiguous_boundary(wire: WireId, message: impl Into<String>) -> Self {
        Self::AmbiguousBoundary {
            wire,
            message: message.into(),
        }
    }

    /// Create an interchange error
    pub fn interchange(message: impl Into<String>) -> Self {
        Self::Interchange {
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for LogicboxError {
    fn from(err: serde_json::Error) -> Self {
        Self::interchange(err.to_string())
    }
}

fn format_path(path: &[TemplateId]) -> String {
    path.iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(" -> ")
}
