//! Serialized document shapes.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::circuit::{Bounds, SlotRef, DEFAULT_GATE_HEIGHT, DEFAULT_GATE_WIDTH};
use crate::subcircuit::Port;

/// A whole workbench: published templates plus the working circuit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkbenchDoc {
    #[serde(default)]
    pub templates: Vec<TemplateDoc>,
    #[serde(default)]
    pub circuit: CircuitDoc,
}

/// One exported template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateDoc {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<usize>,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
    #[serde(default)]
    pub ports: PortsDoc,
    pub internal_circuit: CircuitDoc,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PortsDoc {
    #[serde(default)]
    pub inputs: Vec<Port>,
    #[serde(default)]
    pub outputs: Vec<Port>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CircuitDoc {
    #[serde(default)]
    pub gates: Vec<GateDoc>,
    #[serde(default)]
    pub wires: Vec<WireDoc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bounds: Option<Bounds>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateDoc {
    pub id: usize,
    /// `"AND"`, `"NOT"`, ... `"SUBCIRCUIT"`
    pub kind: String,
    /// Template id, SUBCIRCUIT only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<usize>,
    #[serde(default)]
    pub x: f32,
    #[serde(default)]
    pub y: f32,
    #[serde(default = "default_width")]
    pub width: f32,
    #[serde(default = "default_height")]
    pub height: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Stored output value of any non-SUBCIRCUIT gate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<bool>,
    /// Output values of a SUBCIRCUIT instance
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub outputs: Vec<bool>,
    /// Stored values of a SUBCIRCUIT instance's internal gates
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub internal: Vec<StoredValues>,
}

/// Values held by one gate inside an instance, by internal gate id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredValues {
    pub gate: usize,
    #[serde(default)]
    pub values: Vec<bool>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub internal: Vec<StoredValues>,
}

fn default_width() -> f32 {
    DEFAULT_GATE_WIDTH
}

fn default_height() -> f32 {
    DEFAULT_GATE_HEIGHT
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireDoc {
    pub id: usize,
    pub from: SlotRef,
    pub to: SlotRef,
}
