//! Subcircuit templates and their port signatures.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::circuit::{Bounds, Circuit, GateId, TemplateId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PortDirection {
    Input,
    Output,
}

impl fmt::Display for PortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PortDirection::Input => write!(f, "input"),
            PortDirection::Output => write!(f, "output"),
        }
    }
}

/// One entry of a template's external signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Port {
    pub name: String,
    pub direction: PortDirection,
    /// Position in the signature; contiguous from 0 per direction
    pub index: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl Port {
    pub fn new(name: impl Into<String>, direction: PortDirection, index: usize) -> Self {
        Self {
            name: name.into(),
            direction,
            index,
            label: None,
        }
    }
}

/// A reusable named subcircuit.
///
/// The k-th input port binds to the k-th INPUT placeholder of `circuit` in
/// ascending gate-id order; outputs likewise with OUTPUT placeholders.
#[derive(Debug, Clone, PartialEq)]
pub struct SubcircuitTemplate {
    /// Assigned or confirmed on registration
    pub id: Option<TemplateId>,
    pub name: String,
    pub description: String,
    pub metadata: BTreeMap<String, String>,
    pub inputs: Vec<Port>,
    pub outputs: Vec<Port>,
    pub circuit: Circuit,
    pub bounds: Bounds,
}

impl SubcircuitTemplate {
    /// Build a template whose ports are derived from the placeholders.
    ///
    /// Port names come from placeholder labels, falling back to `in{k}` and
    /// `out{k}`.
    pub fn new(name: impl Into<String>, circuit: Circuit) -> Self {
        let inputs = derive_ports(&circuit, &circuit.input_placeholders(), PortDirection::Input);
        let outputs =
            derive_ports(&circuit, &circuit.output_placeholders(), PortDirection::Output);
        let bounds = Bounds::enclosing(circuit.gates().map(|g| &g.placement)).unwrap_or_default();
        Self {
            id: None,
            name: name.into(),
            description: String::new(),
            metadata: BTreeMap::new(),
            inputs,
            outputs,
            circuit,
            bounds,
        }
    }

    /// Builder: set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Builder: add a metadata entry.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn ports(&self, direction: PortDirection) -> &[Port] {
        match direction {
            PortDirection::Input => &self.inputs,
            PortDirection::Output => &self.outputs,
        }
    }

    /// Name used in error messages.
    pub fn display_name(&self) -> String {
        match self.id {
            Some(id) => format!("{} ({})", self.name, id),
            None => self.name.clone(),
        }
    }
}

fn derive_ports(circuit: &Circuit, placeholders: &[GateId], direction: PortDirection) -> Vec<Port> {
    let prefix = match direction {
        PortDirection::Input => "in",
        PortDirection::Output => "out",
    };
    placeholders
        .iter()
        .enumerate()
        .map(|(index, id)| {
            let label = circuit.gate(*id).and_then(|g| g.label.clone());
            let name = label.clone().unwrap_or_else(|| format!("{prefix}{index}"));
            Port {
                name,
                direction,
                index,
                label,
            }
        })
        .collect()
}
