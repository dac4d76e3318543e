//! JSON interchange for templates and workbenches.
//!
//! All keys are camelCase. A template document looks like:
//!
//! ```json
//! {
//!   "id": 0,
//!   "name": "half adder",
//!   "description": "",
//!   "metadata": {},
//!   "ports": {
//!     "inputs":  [{ "name": "a", "direction": "input", "index": 0 }],
//!     "outputs": [{ "name": "sum", "direction": "output", "index": 0 }]
//!   },
//!   "internalCircuit": {
//!     "gates": [{ "id": 0, "kind": "INPUT", "x": 0, "y": 0, "label": "a", "value": false }],
//!     "wires": [{ "id": 0, "from": { "gate": 0, "slot": 0 }, "to": { "gate": 2, "slot": 0 } }],
//!     "bounds": { "minX": 0, "minY": 0, "maxX": 60, "maxY": 40 }
//!   }
//! }
//! ```
//!
//! A workbench document is `{ "templates": [...], "circuit": {...} }`.
//! Templates may appear in any order; they are registered dependencies
//! first. Gate and wire ids are kept on import, and so is every gate's
//! stored output value: `value` for a plain gate, `outputs` plus the
//! `internal` values of its gates for a SUBCIRCUIT instance.

mod convert;
mod document;

pub use convert::{
    circuit_from_doc, circuit_to_doc, template_from_doc, template_to_doc, workbench_from_doc,
    workbench_to_doc,
};
pub use document::{
    CircuitDoc, GateDoc, PortsDoc, StoredValues, TemplateDoc, WireDoc, WorkbenchDoc,
};

use crate::circuit::Circuit;
use crate::error::Result;
use crate::subcircuit::{Registry, SubcircuitTemplate};

/// Parse a workbench document into a circuit and its registry.
pub fn parse(input: &str) -> Result<(Circuit, Registry)> {
    let doc: WorkbenchDoc = serde_json::from_str(input)?;
    workbench_from_doc(&doc)
}

/// Parse a workbench document file.
#[cfg(feature = "cli")]
pub fn parse_file(path: &std::path::Path) -> Result<(Circuit, Registry)> {
    let content =
        std::fs::read_to_string(path).map_err(|e| crate::error::LogicboxError::FileReadError {
            path: path.display().to_string(),
            source: e,
        })?;
    parse(&content)
}

/// Serialize a workbench as pretty-printed JSON.
pub fn export(circuit: &Circuit, registry: &Registry) -> Result<String> {
    Ok(serde_json::to_string_pretty(&workbench_to_doc(circuit, registry))?)
}

/// Parse one template document, resolving nested instances against
/// `registry`. The result is not registered.
pub fn parse_template(input: &str, registry: &Registry) -> Result<SubcircuitTemplate> {
    let doc: TemplateDoc = serde_json::from_str(input)?;
    template_from_doc(&doc, registry)
}

pub fn export_template(template: &SubcircuitTemplate) -> Result<String> {
    Ok(serde_json::to_string_pretty(&template_to_doc(template))?)
}
