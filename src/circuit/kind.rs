//! The closed set of gate kinds and their logic functions.

use std::fmt;

use super::types::TemplateId;

/// What a gate does.
///
/// The set is fixed, so logic dispatch is an exhaustive `match` rather than
/// a trait object per kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GateKind {
    And,
    Or,
    Not,
    Xor,
    Nand,
    Nor,
    /// Holds an externally set value
    Input,
    /// Mirrors its single input; observable value, no output slots
    Output,
    /// Holds a value that flips only on an explicit tick
    Clock,
    /// Instance of a published template
    Subcircuit(TemplateId),
}

impl GateKind {
    /// Every non-subcircuit kind, in interchange order.
    pub const PRIMITIVES: [GateKind; 9] = [
        GateKind::And,
        GateKind::Or,
        GateKind::Not,
        GateKind::Xor,
        GateKind::Nand,
        GateKind::Nor,
        GateKind::Input,
        GateKind::Output,
        GateKind::Clock,
    ];

    /// Interchange name of the kind (`"AND"`, `"SUBCIRCUIT"`, ...).
    pub fn name(&self) -> &'static str {
        match self {
            GateKind::And => "AND",
            GateKind::Or => "OR",
            GateKind::Not => "NOT",
            GateKind::Xor => "XOR",
            GateKind::Nand => "NAND",
            GateKind::Nor => "NOR",
            GateKind::Input => "INPUT",
            GateKind::Output => "OUTPUT",
            GateKind::Clock => "CLOCK",
            GateKind::Subcircuit(_) => "SUBCIRCUIT",
        }
    }

    /// Parse an interchange name. `SUBCIRCUIT` needs the template id.
    pub fn from_name(name: &str, template: Option<TemplateId>) -> Option<Self> {
        if name.eq_ignore_ascii_case("SUBCIRCUIT") {
            return template.map(GateKind::Subcircuit);
        }
        Self::PRIMITIVES
            .into_iter()
            .find(|kind| kind.name().eq_ignore_ascii_case(name))
    }

    /// Fixed input slot count, `None` for subcircuits (template-derived).
    pub fn input_slots(&self) -> Option<usize> {
        match self {
            GateKind::And | GateKind::Or | GateKind::Xor | GateKind::Nand | GateKind::Nor => Some(2),
            GateKind::Not | GateKind::Output => Some(1),
            GateKind::Input | GateKind::Clock => Some(0),
            GateKind::Subcircuit(_) => None,
        }
    }

    /// Fixed output slot count, `None` for subcircuits (template-derived).
    pub fn output_slots(&self) -> Option<usize> {
        match self {
            GateKind::Output => Some(0),
            GateKind::Subcircuit(_) => None,
            _ => Some(1),
        }
    }

    pub fn template(&self) -> Option<TemplateId> {
        match self {
            GateKind::Subcircuit(id) => Some(*id),
            _ => None,
        }
    }

    /// INPUT and OUTPUT gates double as port placeholders inside templates.
    pub fn is_placeholder(&self) -> bool {
        matches!(self, GateKind::Input | GateKind::Output)
    }

    /// Gates whose value is set from outside the evaluation.
    pub fn is_source(&self) -> bool {
        matches!(self, GateKind::Input | GateKind::Clock)
    }

    /// Apply the combinational function of this kind.
    ///
    /// Returns `None` for kinds whose value is not a function of their
    /// inputs alone (INPUT, CLOCK, SUBCIRCUIT). Missing inputs read as 0.
    pub fn logic(&self, inputs: &[bool]) -> Option<bool> {
        let first = inputs.first().copied().unwrap_or(false);
        match self {
            GateKind::And => Some(inputs.iter().all(|&v| v)),
            GateKind::Or => Some(inputs.iter().any(|&v| v)),
            GateKind::Not => Some(!first),
            GateKind::Xor => Some(inputs.iter().fold(false, |acc, &v| acc ^ v)),
            GateKind::Nand => Some(!inputs.iter().all(|&v| v)),
            GateKind::Nor => Some(!inputs.iter().any(|&v| v)),
            GateKind::Output => Some(first),
            GateKind::Input | GateKind::Clock | GateKind::Subcircuit(_) => None,
        }
    }
}

impl fmt::Display for GateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GateKind::Subcircuit(id) => write!(f, "SUBCIRCUIT({})", id),
            other => f.write_str(other.name()),
        }
    }
}
