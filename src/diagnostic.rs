//! Diagnostics produced by validation and evaluation.
//!
//! Errors block a commit; warnings are annotations the host may render
//! (a floating input, an oscillating loop) while the engine keeps running.

use std::fmt;

use serde::Serialize;

use crate::circuit::{GateId, SlotRef, TemplateId, WireId};
use crate::error::{LogicboxError, Violation};
use crate::subcircuit::PortDirection;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Error,
}

/// What a diagnostic is about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum DiagnosticKind {
    /// Slot or endpoint misuse
    Structural { violation: Violation },
    /// Template reaches itself through nested subcircuits
    CyclicTemplateReference { path: Vec<TemplateId> },
    /// Subcircuit gate names an unknown template
    UnresolvedTemplate { template: TemplateId },
    /// Declared ports disagree with the internal placeholders
    PortMismatch,
    /// Instance slot counts disagree with the template ports
    ArityMismatch,
    /// Input slot with no driver; reads as 0
    FloatingInput,
    /// Gate with no wires at all
    Disconnected,
    /// Feedback loop that did not settle within the iteration cap
    Oscillating { iterations: usize },
}

/// Where in the graph a diagnostic points.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "at", rename_all = "camelCase")]
pub enum Location {
    Circuit,
    Gate { gate: GateId },
    Wire { wire: WireId },
    Slot { slot: SlotRef },
    Port { direction: PortDirection, index: usize },
    Template { template: TemplateId },
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::Circuit => write!(f, "circuit"),
            Location::Gate { gate } => write!(f, "{gate}"),
            Location::Wire { wire } => write!(f, "{wire}"),
            Location::Slot { slot } => write!(f, "{slot}"),
            Location::Port { direction, index } => write!(f, "{direction} port {index}"),
            Location::Template { template } => write!(f, "{template}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    #[serde(flatten)]
    pub kind: DiagnosticKind,
    pub location: Location,
    pub message: String,
}

impl Diagnostic {
    pub fn error(kind: DiagnosticKind, location: Location, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            kind,
            location,
            message: message.into(),
        }
    }

    pub fn warning(kind: DiagnosticKind, location: Location, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            kind,
            location,
            message: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }

    /// Turn a blocking diagnostic into the error a rejected command returns.
    ///
    /// `subject` names the template or circuit being checked.
    pub fn to_error(&self, subject: &str) -> LogicboxError {
        match &self.kind {
            DiagnosticKind::Structural { violation } => {
                LogicboxError::StructuralViolation(violation.clone())
            }
            DiagnosticKind::CyclicTemplateReference { path } => {
                LogicboxError::CyclicTemplateReference {
                    template: subject.to_string(),
                    path: path.clone(),
                }
            }
            DiagnosticKind::UnresolvedTemplate { template } => {
                LogicboxError::UnresolvedTemplate {
                    template: *template,
                }
            }
            _ => LogicboxError::invalid_template(
                subject,
                format!("{} ({})", self.message, self.location),
            ),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = match self.severity {
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        write!(f, "{level} at {}: {}", self.location, self.message)
    }
}

/// First blocking diagnostic, if any.
pub fn first_error(diagnostics: &[Diagnostic]) -> Option<&Diagnostic> {
    diagnostics.iter().find(|d| d.is_error())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let d = Diagnostic::warning(
            DiagnosticKind::FloatingInput,
            Location::Slot {
                slot: SlotRef::new(GateId(2), 1),
            },
            "input slot is not connected",
        );
        assert_eq!(d.to_string(), "warning at G2.1: input slot is not connected");
        assert!(!d.is_error());
    }

    #[test]
    fn test_to_error_maps_taxonomy() {
        let unresolved = Diagnostic::error(
            DiagnosticKind::UnresolvedTemplate {
                template: TemplateId(3),
            },
            Location::Gate { gate: GateId(0) },
            "unknown template",
        );
        assert!(matches!(
            unresolved.to_error("main"),
            LogicboxError::UnresolvedTemplate {
                template: TemplateId(3)
            }
        ));

        let parity = Diagnostic::error(
            DiagnosticKind::PortMismatch,
            Location::Circuit,
            "2 input ports but 1 INPUT placeholder",
        );
        match parity.to_error("half adder") {
            LogicboxError::InvalidTemplate { name, .. } => assert_eq!(name, "half adder"),
            other => panic!("unexpected {other}"),
        }
    }

    #[test]
    fn test_serializes_flat_json() {
        let d = Diagnostic::warning(
            DiagnosticKind::Oscillating { iterations: 16 },
            Location::Gate { gate: GateId(1) },
            "feedback loop did not settle",
        );
        let json = serde_json::to_value(&d).unwrap();
        assert_eq!(json["severity"], "warning");
        assert_eq!(json["kind"], "oscillating");
        assert_eq!(json["iterations"], 16);
        assert_eq!(json["location"]["at"], "gate");
    }
}
