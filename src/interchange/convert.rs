//! Conversions between documents and live circuits/templates.

use std::collections::{BTreeMap, BTreeSet};

use log::debug;

use super::document::{
    CircuitDoc, GateDoc, PortsDoc, StoredValues, TemplateDoc, WireDoc, WorkbenchDoc,
};
use crate::circuit::{
    Bounds, Circuit, Gate, GateId, GateKind, Placement, TemplateId, WireId,
};
use crate::error::{LogicboxError, Result};
use crate::subcircuit::{Registry, SubcircuitTemplate};

pub fn circuit_to_doc(circuit: &Circuit) -> CircuitDoc {
    let gates = circuit
        .gates()
        .map(|gate| {
            let (value, outputs, internal) = match gate.nested() {
                Some(nested) => (None, gate.values().to_vec(), stored_values(nested)),
                None => (gate.values().first().copied(), Vec::new(), Vec::new()),
            };
            GateDoc {
                id: gate.id().0,
                kind: gate.kind.name().to_string(),
                template: gate.kind.template().map(|t| t.0),
                x: gate.placement.x,
                y: gate.placement.y,
                width: gate.placement.width,
                height: gate.placement.height,
                label: gate.label.clone(),
                value,
                outputs,
                internal,
            }
        })
        .collect();
    let wires = circuit
        .wires()
        .map(|wire| WireDoc {
            id: wire.id.0,
            from: wire.from,
            to: wire.to,
        })
        .collect();
    CircuitDoc {
        gates,
        wires,
        bounds: Bounds::enclosing(circuit.gates().map(|g| &g.placement)),
    }
}

/// Rebuild a circuit keeping the document's gate and wire ids.
///
/// SUBCIRCUIT gates are instantiated from `registry`, so every template they
/// name must already be registered.
pub fn circuit_from_doc(doc: &CircuitDoc, registry: &Registry) -> Result<Circuit> {
    let mut circuit = Circuit::new();
    for gate in &doc.gates {
        let kind = GateKind::from_name(&gate.kind, gate.template.map(TemplateId)).ok_or_else(
            || match gate.template {
                None if gate.kind.eq_ignore_ascii_case("SUBCIRCUIT") => LogicboxError::interchange(
                    format!("gate {} is a SUBCIRCUIT without a template", gate.id),
                ),
                _ => LogicboxError::interchange(format!(
                    "gate {} has unknown kind '{}'",
                    gate.id, gate.kind
                )),
            },
        )?;
        let placement = Placement {
            x: gate.x,
            y: gate.y,
            width: gate.width,
            height: gate.height,
        };
        let mut built = match kind {
            GateKind::Subcircuit(template) => registry.instantiate(template, placement)?,
            _ => Gate::new(kind, placement),
        };
        if let Some(value) = gate.value {
            built = built.with_values(&[value]);
        } else if !gate.outputs.is_empty() {
            built = built.with_values(&gate.outputs);
        }
        if let Some(nested) = built.nested_mut() {
            restore_values(nested, &gate.internal)?;
        }
        built.label = gate.label.clone();
        circuit.insert_gate(built.with_id(GateId(gate.id)))?;
    }
    for wire in &doc.wires {
        circuit.insert_wire(WireId(wire.id), wire.from, wire.to)?;
    }
    Ok(circuit)
}

/// Every gate's stored values, recursing into instances.
fn stored_values(circuit: &Circuit) -> Vec<StoredValues> {
    circuit
        .gates()
        .map(|gate| StoredValues {
            gate: gate.id().0,
            values: gate.values().to_vec(),
            internal: gate.nested().map(stored_values).unwrap_or_default(),
        })
        .collect()
}

fn restore_values(circuit: &mut Circuit, stored: &[StoredValues]) -> Result<()> {
    for entry in stored {
        let gate = circuit.gate_mut(GateId(entry.gate)).ok_or_else(|| {
            LogicboxError::interchange(format!(
                "stored values for unknown internal gate {}",
                entry.gate
            ))
        })?;
        gate.set_values(&entry.values);
        if let Some(nested) = gate.nested_mut() {
            restore_values(nested, &entry.internal)?;
        }
    }
    Ok(())
}

pub fn template_to_doc(template: &SubcircuitTemplate) -> TemplateDoc {
    let mut internal_circuit = circuit_to_doc(&template.circuit);
    internal_circuit.bounds = Some(template.bounds);
    TemplateDoc {
        id: template.id.map(|id| id.0),
        name: template.name.clone(),
        description: template.description.clone(),
        metadata: template.metadata.clone(),
        ports: PortsDoc {
            inputs: template.inputs.clone(),
            outputs: template.outputs.clone(),
        },
        internal_circuit,
    }
}

/// Build an unregistered template. Ports absent from the document are
/// derived from the placeholders.
pub fn template_from_doc(doc: &TemplateDoc, registry: &Registry) -> Result<SubcircuitTemplate> {
    let circuit = circuit_from_doc(&doc.internal_circuit, registry)?;
    let mut template = SubcircuitTemplate::new(doc.name.clone(), circuit);
    template.id = doc.id.map(TemplateId);
    template.description = doc.description.clone();
    template.metadata = doc.metadata.clone();
    if !doc.ports.inputs.is_empty() || !doc.ports.outputs.is_empty() {
        template.inputs = doc.ports.inputs.clone();
        template.outputs = doc.ports.outputs.clone();
    }
    if let Some(bounds) = doc.internal_circuit.bounds {
        template.bounds = bounds;
    }
    Ok(template)
}

pub fn workbench_to_doc(circuit: &Circuit, registry: &Registry) -> WorkbenchDoc {
    WorkbenchDoc {
        templates: registry.templates().map(|t| template_to_doc(t)).collect(),
        circuit: circuit_to_doc(circuit),
    }
}

/// Register the document's templates, dependencies first, then build the
/// working circuit.
pub fn workbench_from_doc(doc: &WorkbenchDoc) -> Result<(Circuit, Registry)> {
    let mut registry = Registry::new();
    let mut pending: Vec<&TemplateDoc> = doc.templates.iter().collect();

    while !pending.is_empty() {
        let ready = pending.iter().position(|t| {
            dependencies(t)
                .iter()
                .all(|dep| registry.contains(*dep))
        });
        if ready.is_none() {
            if let Some((template, path)) = cycle_among(&pending) {
                return Err(LogicboxError::CyclicTemplateReference { template, path });
            }
        }
        // Nothing is ready: register the first one anyway to surface its error.
        let next = pending.remove(ready.unwrap_or(0));
        let template = template_from_doc(next, &registry)?;
        let requested = template.id;
        let id = registry.register(template)?;
        if requested.is_some_and(|r| r != id) {
            return Err(LogicboxError::interchange(format!(
                "duplicate template id {}",
                next.id.unwrap_or_default()
            )));
        }
        debug!("loaded template '{}' as {id}", next.name);
    }

    let circuit = circuit_from_doc(&doc.circuit, &registry)?;
    Ok((circuit, registry))
}

fn dependencies(doc: &TemplateDoc) -> BTreeSet<TemplateId> {
    doc.internal_circuit
        .gates
        .iter()
        .filter_map(|g| g.template)
        .map(TemplateId)
        .collect()
}

/// A template among `pending` that reaches itself through the others.
fn cycle_among(pending: &[&TemplateDoc]) -> Option<(String, Vec<TemplateId>)> {
    let by_id: BTreeMap<TemplateId, &TemplateDoc> = pending
        .iter()
        .filter_map(|t| t.id.map(|id| (TemplateId(id), *t)))
        .collect();
    for (&start, doc) in &by_id {
        let mut seen = BTreeSet::new();
        let mut stack = vec![vec![start]];
        while let Some(path) = stack.pop() {
            let Some(current) = path.last().and_then(|id| by_id.get(id)) else {
                continue;
            };
            for dep in dependencies(current) {
                if dep == start {
                    let mut cycle = path.clone();
                    cycle.push(start);
                    return Some((doc.name.clone(), cycle));
                }
                if seen.insert(dep) {
                    let mut next = path.clone();
                    next.push(dep);
                    stack.push(next);
                }
            }
        }
    }
    None
}
