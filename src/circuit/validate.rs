//! Circuit and template validation.
//!
//! Checks:
//! - Wire endpoints reference existing slots of the right direction, and no
//!   input slot has more than one driver
//! - Subcircuit gates reference known templates with matching slot counts
//! - Template ports match the internal INPUT/OUTPUT placeholders
//! - No template reaches itself through nested subcircuits
//!
//! Floating inputs and fully disconnected gates are reported as warnings.

use std::collections::{BTreeMap, BTreeSet};

use super::{Circuit, GateKind, SlotDirection, SlotRef, TemplateId};
use crate::diagnostic::{Diagnostic, DiagnosticKind, Location};
use crate::error::Violation;
use crate::subcircuit::{PortDirection, Registry, SubcircuitTemplate};

/// Validate a circuit against the templates known to `registry`.
pub fn validate_circuit(circuit: &Circuit, registry: &Registry) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    check_wires(circuit, &mut diagnostics);
    check_instances(circuit, registry, &mut diagnostics);
    check_connectivity(circuit, &mut diagnostics);
    diagnostics
}

/// Validate a template before it is published or edited.
pub fn validate_template(template: &SubcircuitTemplate, registry: &Registry) -> Vec<Diagnostic> {
    let mut diagnostics: Vec<Diagnostic> = validate_circuit(&template.circuit, registry)
        .into_iter()
        // A reference to the template's own id is reported as a cycle below.
        .filter(|d| {
            !matches!(
                (&d.kind, template.id),
                (DiagnosticKind::UnresolvedTemplate { template: t }, Some(own)) if *t == own
            )
        })
        .collect();

    check_port_parity(template, PortDirection::Input, &mut diagnostics);
    check_port_parity(template, PortDirection::Output, &mut diagnostics);

    if let Some(own) = template.id {
        if let Some(path) = find_cycle(own, &template.circuit.template_refs(), registry) {
            diagnostics.push(Diagnostic::error(
                DiagnosticKind::CyclicTemplateReference { path },
                Location::Template { template: own },
                format!("template '{}' contains itself", template.name),
            ));
        }
    }

    diagnostics
}

fn check_wires(circuit: &Circuit, diagnostics: &mut Vec<Diagnostic>) {
    let mut driven = BTreeMap::new();
    for wire in circuit.wires() {
        let source = circuit.gate(wire.from.gate);
        let sink = circuit.gate(wire.to.gate);
        let violation = match (source, sink) {
            (None, _) => Some(Violation::UnknownGate {
                gate: wire.from.gate,
            }),
            (_, None) => Some(Violation::UnknownGate { gate: wire.to.gate }),
            (Some(s), _) if wire.from.slot >= s.output_count() => Some(Violation::SlotOutOfRange {
                slot: wire.from,
                direction: SlotDirection::Output,
                available: s.output_count(),
            }),
            (_, Some(d)) if wire.to.slot >= d.input_count() => Some(Violation::SlotOutOfRange {
                slot: wire.to,
                direction: SlotDirection::Input,
                available: d.input_count(),
            }),
            _ => match driven.insert(wire.to, wire.id) {
                Some(previous) => Some(Violation::SlotOccupied {
                    slot: wire.to,
                    wire: previous,
                }),
                None => None,
            },
        };
        if let Some(violation) = violation {
            diagnostics.push(Diagnostic::error(
                DiagnosticKind::Structural {
                    violation: violation.clone(),
                },
                Location::Wire { wire: wire.id },
                violation.to_string(),
            ));
        }
    }
}

fn check_instances(circuit: &Circuit, registry: &Registry, diagnostics: &mut Vec<Diagnostic>) {
    for gate in circuit.gates() {
        let GateKind::Subcircuit(template_id) = gate.kind else {
            continue;
        };
        let location = Location::Gate { gate: gate.id() };
        let Some(template) = registry.get(template_id) else {
            diagnostics.push(Diagnostic::error(
                DiagnosticKind::UnresolvedTemplate {
                    template: template_id,
                },
                location,
                format!("subcircuit references unknown template {template_id}"),
            ));
            continue;
        };
        if gate.input_count() != template.inputs.len()
            || gate.output_count() != template.outputs.len()
        {
            diagnostics.push(Diagnostic::error(
                DiagnosticKind::ArityMismatch,
                location.clone(),
                format!(
                    "instance has {}/{} slots but '{}' declares {}/{} ports",
                    gate.input_count(),
                    gate.output_count(),
                    template.name,
                    template.inputs.len(),
                    template.outputs.len()
                ),
            ));
        }
        if gate.nested().is_none() {
            diagnostics.push(Diagnostic::error(
                DiagnosticKind::UnresolvedTemplate {
                    template: template_id,
                },
                location,
                "subcircuit instance has no internal circuit",
            ));
        }
    }
}

fn check_connectivity(circuit: &Circuit, diagnostics: &mut Vec<Diagnostic>) {
    for gate in circuit.gates() {
        let id = gate.id();
        if circuit.wires_of(id).next().is_none()
            && !gate.kind.is_source()
            && !gate.kind.is_placeholder()
        {
            diagnostics.push(Diagnostic::warning(
                DiagnosticKind::Disconnected,
                Location::Gate { gate: id },
                format!("{} gate is not connected to anything", gate.kind.name()),
            ));
            continue;
        }
        for slot in 0..gate.input_count() {
            let slot = SlotRef::new(id, slot);
            if circuit.driver(slot).is_none() {
                diagnostics.push(Diagnostic::warning(
                    DiagnosticKind::FloatingInput,
                    Location::Slot { slot },
                    "input slot is not connected and reads 0",
                ));
            }
        }
    }
}

fn check_port_parity(
    template: &SubcircuitTemplate,
    direction: PortDirection,
    diagnostics: &mut Vec<Diagnostic>,
) {
    let ports = template.ports(direction);
    let placeholders = match direction {
        PortDirection::Input => template.circuit.input_placeholders(),
        PortDirection::Output => template.circuit.output_placeholders(),
    };

    if ports.len() != placeholders.len() {
        diagnostics.push(Diagnostic::error(
            DiagnosticKind::PortMismatch,
            Location::Circuit,
            format!(
                "{} {direction} port(s) declared but the circuit has {} placeholder(s)",
                ports.len(),
                placeholders.len()
            ),
        ));
    }

    let mut seen = BTreeSet::new();
    for port in ports {
        let location = Location::Port {
            direction,
            index: port.index,
        };
        if port.direction != direction {
            diagnostics.push(Diagnostic::error(
                DiagnosticKind::PortMismatch,
                location,
                format!("port '{}' is listed as {direction} but declared {}", port.name, port.direction),
            ));
        } else if port.index >= ports.len() || !seen.insert(port.index) {
            diagnostics.push(Diagnostic::error(
                DiagnosticKind::PortMismatch,
                location,
                format!("port '{}' index is duplicated or not contiguous", port.name),
            ));
        }
    }
}

/// Search nested template references for a path leading back to `target`.
///
/// Returns the path starting and ending at `target`.
fn find_cycle(
    target: TemplateId,
    refs: &BTreeSet<TemplateId>,
    registry: &Registry,
) -> Option<Vec<TemplateId>> {
    let mut visited = BTreeSet::new();
    let mut stack: Vec<(TemplateId, Vec<TemplateId>)> =
        refs.iter().rev().map(|&r| (r, vec![target, r])).collect();

    while let Some((current, path)) = stack.pop() {
        if current == target {
            return Some(path);
        }
        if !visited.insert(current) {
            continue;
        }
        let Some(template) = registry.get(current) else {
            continue;
        };
        for next in template.circuit.template_refs().into_iter().rev() {
            let mut next_path = path.clone();
            next_path.push(next);
            stack.push((next, next_path));
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit::{Gate, Placement};
    use crate::diagnostic::Severity;
    use crate::subcircuit::Port;

    fn not_template() -> SubcircuitTemplate {
        let mut c = Circuit::new();
        let i = c.add_gate(Gate::new(GateKind::Input, Placement::default())).unwrap();
        let n = c.add_gate(Gate::new(GateKind::Not, Placement::default())).unwrap();
        let o = c.add_gate(Gate::new(GateKind::Output, Placement::default())).unwrap();
        c.add_wire(SlotRef::new(i, 0), SlotRef::new(n, 0)).unwrap();
        c.add_wire(SlotRef::new(n, 0), SlotRef::new(o, 0)).unwrap();
        SubcircuitTemplate::new("inv", c)
    }

    fn kinds(diagnostics: &[Diagnostic]) -> Vec<&DiagnosticKind> {
        diagnostics.iter().map(|d| &d.kind).collect()
    }

    #[test]
    fn test_clean_template_has_no_diagnostics() {
        let registry = Registry::new();
        assert!(validate_template(&not_template(), &registry).is_empty());
    }

    #[test]
    fn test_floating_input_is_a_warning() {
        let mut c = Circuit::new();
        let a = c.add_gate(Gate::new(GateKind::Input, Placement::default())).unwrap();
        let and = c.add_gate(Gate::new(GateKind::And, Placement::default())).unwrap();
        c.add_wire(SlotRef::new(a, 0), SlotRef::new(and, 0)).unwrap();

        let diagnostics = validate_circuit(&c, &Registry::new());
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].severity, Severity::Warning);
        assert_eq!(diagnostics[0].kind, DiagnosticKind::FloatingInput);
        assert_eq!(
            diagnostics[0].location,
            Location::Slot {
                slot: SlotRef::new(and, 1)
            }
        );
    }

    #[test]
    fn test_disconnected_gate_warns_once() {
        let mut c = Circuit::new();
        c.add_gate(Gate::new(GateKind::Nor, Placement::default())).unwrap();
        c.add_gate(Gate::new(GateKind::Input, Placement::default())).unwrap();
        let diagnostics = validate_circuit(&c, &Registry::new());
        assert_eq!(kinds(&diagnostics), vec![&DiagnosticKind::Disconnected]);
    }

    #[test]
    fn test_unresolved_template_is_an_error() {
        let mut c = Circuit::new();
        c.add_gate(Gate::subcircuit(TemplateId(42), Circuit::new(), Placement::default()))
            .unwrap();
        let diagnostics = validate_circuit(&c, &Registry::new());
        assert!(diagnostics.iter().any(|d| d.is_error()
            && d.kind
                == DiagnosticKind::UnresolvedTemplate {
                    template: TemplateId(42)
                }));
    }

    #[test]
    fn test_port_count_must_match_placeholders() {
        let mut t = not_template();
        t.inputs.push(Port::new("extra", PortDirection::Input, 1));
        let diagnostics = validate_template(&t, &Registry::new());
        assert_eq!(kinds(&diagnostics), vec![&DiagnosticKind::PortMismatch]);
    }

    #[test]
    fn test_port_indices_must_be_contiguous() {
        let mut t = not_template();
        t.inputs[0].index = 3;
        let diagnostics = validate_template(&t, &Registry::new());
        assert_eq!(kinds(&diagnostics), vec![&DiagnosticKind::PortMismatch]);
    }

    #[test]
    fn test_self_reference_reported_as_cycle() {
        let mut registry = Registry::new();
        let inv = registry.register(not_template()).unwrap();

        let mut t = not_template();
        let gate = registry.instantiate(inv, Placement::default()).unwrap();
        t.circuit.add_gate(gate).unwrap();
        t.id = Some(inv);

        let diagnostics = validate_template(&t, &registry);
        let cycle = diagnostics
            .iter()
            .find(|d| matches!(d.kind, DiagnosticKind::CyclicTemplateReference { .. }))
            .expect("cycle reported");
        assert_eq!(
            cycle.kind,
            DiagnosticKind::CyclicTemplateReference {
                path: vec![inv, inv]
            }
        );
    }

    #[test]
    fn test_transitive_cycle_detected() {
        let mut registry = Registry::new();
        let inner = registry.register(not_template()).unwrap();

        // outer wraps inner
        let mut outer = not_template();
        outer
            .circuit
            .add_gate(registry.instantiate(inner, Placement::default()).unwrap())
            .unwrap();
        let outer_id = registry.register(outer).unwrap();

        // editing inner to contain outer closes the loop
        let mut edited = not_template();
        edited
            .circuit
            .add_gate(registry.instantiate(outer_id, Placement::default()).unwrap())
            .unwrap();
        edited.id = Some(inner);

        let diagnostics = validate_template(&edited, &registry);
        assert!(diagnostics.iter().any(|d| d.kind
            == DiagnosticKind::CyclicTemplateReference {
                path: vec![inner, outer_id, inner]
            }));
    }
}
