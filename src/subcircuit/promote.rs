//! Turning a selection of gates into a subcircuit.

use std::collections::{BTreeMap, BTreeSet};

use log::debug;

use super::{Registry, SubcircuitTemplate};
use crate::circuit::{
    Bounds, Circuit, Gate, GateId, GateKind, Placement, SlotRef, TemplateId, WireId,
    DEFAULT_GATE_HEIGHT, DEFAULT_GATE_WIDTH,
};
use crate::error::{LogicboxError, Result, Violation};

/// Horizontal gap between the selection and the generated placeholders.
const PLACEHOLDER_MARGIN: f32 = 40.0;

/// Gates to promote plus how their wires are classified.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    pub gates: BTreeSet<GateId>,
    /// Wires with both endpoints inside
    pub internal: Vec<WireId>,
    /// Wires with exactly one endpoint inside
    pub boundary: Vec<WireId>,
}

impl Selection {
    /// Select `gates` and classify every wire touching them.
    pub fn from_gates(circuit: &Circuit, gates: impl IntoIterator<Item = GateId>) -> Self {
        let gates: BTreeSet<GateId> = gates.into_iter().collect();
        let mut internal = Vec::new();
        let mut boundary = Vec::new();
        for wire in circuit.wires() {
            match (gates.contains(&wire.from.gate), gates.contains(&wire.to.gate)) {
                (true, true) => internal.push(wire.id),
                (true, false) | (false, true) => boundary.push(wire.id),
                (false, false) => {}
            }
        }
        Self {
            gates,
            internal,
            boundary,
        }
    }
}

/// What `promote_selection` produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Promotion {
    pub template: TemplateId,
    /// The subcircuit gate that replaced the selection
    pub instance: GateId,
}

/// Replace the selected gates with one instance of a new template.
///
/// Input ports are the distinct external output slots feeding the
/// selection, output ports the distinct internal output slots feeding
/// gates outside it; both in ascending slot order. The instance is wired to
/// the same external endpoints the selection had.
pub fn promote_selection(
    circuit: &mut Circuit,
    registry: &mut Registry,
    selection: &Selection,
    name: &str,
) -> Result<Promotion> {
    check_gates(circuit, selection, name)?;
    check_boundary(circuit, selection)?;

    // incoming: external source -> port; outgoing: internal source -> port
    let mut incoming: BTreeMap<SlotRef, usize> = BTreeMap::new();
    let mut outgoing: BTreeMap<SlotRef, usize> = BTreeMap::new();
    for id in &selection.boundary {
        let wire = circuit.wire(*id).ok_or(Violation::UnknownWire { wire: *id })?;
        if selection.gates.contains(&wire.to.gate) {
            incoming.insert(wire.from, 0);
        } else {
            outgoing.insert(wire.from, 0);
        }
    }
    for (port, index) in incoming.values_mut().enumerate() {
        *index = port;
    }
    for (port, index) in outgoing.values_mut().enumerate() {
        *index = port;
    }

    let bounds = Bounds::enclosing(
        selection
            .gates
            .iter()
            .filter_map(|g| circuit.gate(*g))
            .map(|g| &g.placement),
    )
    .unwrap_or_default();
    let template = build_template(circuit, selection, &incoming, &outgoing, bounds, name)?;
    let template_id = registry.register(template)?;

    let boundary: Vec<(SlotRef, SlotRef)> = selection
        .boundary
        .iter()
        .filter_map(|id| circuit.wire(*id))
        .map(|w| (w.from, w.to))
        .collect();
    for gate in &selection.gates {
        circuit.remove_gate(*gate)?;
    }

    let (cx, cy) = bounds.center();
    let placement = Placement::at(cx - DEFAULT_GATE_WIDTH / 2.0, cy - DEFAULT_GATE_HEIGHT / 2.0);
    let instance = circuit.add_gate(registry.instantiate(template_id, placement)?)?;

    let mut bound_inputs = BTreeSet::new();
    for (from, to) in boundary {
        if let Some(&port) = incoming.get(&from) {
            if bound_inputs.insert(port) {
                circuit.add_wire(from, SlotRef::new(instance, port))?;
            }
        } else if let Some(&port) = outgoing.get(&from) {
            circuit.add_wire(SlotRef::new(instance, port), to)?;
        }
    }

    debug!(
        "promoted {} gates into {instance} ({} in, {} out)",
        selection.gates.len(),
        incoming.len(),
        outgoing.len()
    );
    Ok(Promotion {
        template: template_id,
        instance,
    })
}

fn check_gates(circuit: &Circuit, selection: &Selection, name: &str) -> Result<()> {
    if selection.gates.is_empty() {
        return Err(LogicboxError::invalid_template(name, "selection is empty"));
    }
    for id in &selection.gates {
        let gate = circuit
            .gate(*id)
            .ok_or(Violation::UnknownGate { gate: *id })?;
        if gate.kind.is_placeholder() {
            return Err(LogicboxError::invalid_template(
                name,
                format!("{id} is an {} gate and cannot be promoted", gate.kind),
            ));
        }
    }
    Ok(())
}

fn check_boundary(circuit: &Circuit, selection: &Selection) -> Result<()> {
    let inside = |gate: GateId| selection.gates.contains(&gate);

    for id in &selection.internal {
        let wire = circuit.wire(*id).ok_or(Violation::UnknownWire { wire: *id })?;
        if !(inside(wire.from.gate) && inside(wire.to.gate)) {
            return Err(LogicboxError::ambiguous_boundary(
                *id,
                "internal wire leaves the selection",
            ));
        }
    }
    for id in &selection.boundary {
        let wire = circuit.wire(*id).ok_or(Violation::UnknownWire { wire: *id })?;
        if inside(wire.from.gate) == inside(wire.to.gate) {
            return Err(LogicboxError::ambiguous_boundary(
                *id,
                "boundary wire must have exactly one endpoint inside the selection",
            ));
        }
    }

    let listed: BTreeSet<WireId> = selection
        .internal
        .iter()
        .chain(&selection.boundary)
        .copied()
        .collect();
    for wire in circuit.wires() {
        if (inside(wire.from.gate) || inside(wire.to.gate)) && !listed.contains(&wire.id) {
            return Err(LogicboxError::ambiguous_boundary(
                wire.id,
                "wire touches the selection but is neither internal nor boundary",
            ));
        }
    }
    Ok(())
}

/// INPUT placeholders first, then the copied gates, then OUTPUT
/// placeholders, so placeholder ids ascend in port order.
fn build_template(
    circuit: &Circuit,
    selection: &Selection,
    incoming: &BTreeMap<SlotRef, usize>,
    outgoing: &BTreeMap<SlotRef, usize>,
    bounds: Bounds,
    name: &str,
) -> Result<SubcircuitTemplate> {
    let row = |k: usize| bounds.min_y + k as f32 * (DEFAULT_GATE_HEIGHT + 10.0);

    let mut inner = Circuit::new();
    let mut inputs = vec![GateId(0); incoming.len()];
    for (&source, &port) in incoming {
        let mut placeholder = Gate::new(
            GateKind::Input,
            Placement::at(bounds.min_x - PLACEHOLDER_MARGIN - DEFAULT_GATE_WIDTH, row(port)),
        );
        placeholder.label = circuit
            .gate(source.gate)
            .filter(|g| g.kind == GateKind::Input)
            .and_then(|g| g.label.clone());
        inputs[port] = inner.add_gate(placeholder)?;
    }

    let mut copied = BTreeMap::new();
    for id in &selection.gates {
        if let Some(gate) = circuit.gate(*id) {
            copied.insert(*id, inner.add_gate(gate.clone())?);
        }
    }

    let mut outputs = vec![GateId(0); outgoing.len()];
    for port in 0..outgoing.len() {
        let placeholder = Gate::new(
            GateKind::Output,
            Placement::at(bounds.max_x + PLACEHOLDER_MARGIN, row(port)),
        );
        outputs[port] = inner.add_gate(placeholder)?;
    }

    let map = |slot: SlotRef| copied.get(&slot.gate).map(|g| SlotRef::new(*g, slot.slot));
    for id in &selection.internal {
        let Some(wire) = circuit.wire(*id) else {
            continue;
        };
        if let (Some(from), Some(to)) = (map(wire.from), map(wire.to)) {
            inner.add_wire(from, to)?;
        }
    }
    for id in &selection.boundary {
        let Some(wire) = circuit.wire(*id) else {
            continue;
        };
        if let (Some(&port), Some(to)) = (incoming.get(&wire.from), map(wire.to)) {
            inner.add_wire(SlotRef::new(inputs[port], 0), to)?;
        }
    }
    for (&source, &port) in outgoing {
        if let Some(from) = map(source) {
            inner.add_wire(from, SlotRef::new(outputs[port], 0))?;
        }
    }

    Ok(SubcircuitTemplate::new(name, inner))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solver::Evaluator;

    fn add(c: &mut Circuit, kind: GateKind, x: f32) -> GateId {
        c.add_gate(Gate::new(kind, Placement::at(x, 0.0))).unwrap()
    }

    fn wire(c: &mut Circuit, from: GateId, to: GateId, slot: usize) -> WireId {
        c.add_wire(SlotRef::new(from, 0), SlotRef::new(to, slot)).unwrap()
    }

    /// a, b -> AND, OR -> AND -> out
    fn and_or() -> (Circuit, [GateId; 6]) {
        let mut c = Circuit::new();
        let a = add(&mut c, GateKind::Input, 0.0);
        let b = add(&mut c, GateKind::Input, 0.0);
        let g1 = add(&mut c, GateKind::And, 100.0);
        let g2 = add(&mut c, GateKind::Or, 100.0);
        let g3 = add(&mut c, GateKind::And, 200.0);
        let out = add(&mut c, GateKind::Output, 300.0);
        wire(&mut c, a, g1, 0);
        wire(&mut c, b, g1, 1);
        wire(&mut c, a, g2, 0);
        wire(&mut c, b, g2, 1);
        wire(&mut c, g1, g3, 0);
        wire(&mut c, g2, g3, 1);
        wire(&mut c, g3, out, 0);
        (c, [a, b, g1, g2, g3, out])
    }

    #[test]
    fn test_from_gates_classifies_wires() {
        let (c, [_, _, g1, g2, g3, _]) = and_or();
        let selection = Selection::from_gates(&c, [g1, g2, g3]);
        assert_eq!(selection.internal.len(), 2);
        assert_eq!(selection.boundary.len(), 5);
    }

    #[test]
    fn test_promote_and_or() {
        let (mut c, [a, b, g1, g2, g3, out]) = and_or();
        let mut registry = Registry::new();
        let selection = Selection::from_gates(&c, [g1, g2, g3]);
        let promotion = promote_selection(&mut c, &mut registry, &selection, "and-or").unwrap();

        let template = registry.get(promotion.template).unwrap();
        assert_eq!(template.inputs.len(), 2);
        assert_eq!(template.outputs.len(), 1);
        assert_eq!(template.circuit.gate_count(), 6);

        assert_eq!(c.gate_count(), 4);
        assert!(c.gate(g1).is_none());
        let instance = c.gate(promotion.instance).unwrap();
        assert_eq!(instance.kind, GateKind::Subcircuit(promotion.template));
        assert_eq!(
            c.driver(SlotRef::new(promotion.instance, 0)).unwrap().from,
            SlotRef::new(a, 0)
        );
        assert_eq!(
            c.driver(SlotRef::new(promotion.instance, 1)).unwrap().from,
            SlotRef::new(b, 0)
        );
        assert_eq!(
            c.driver(SlotRef::new(out, 0)).unwrap().from,
            SlotRef::new(promotion.instance, 0)
        );
        assert_eq!(c.wire_count(), 3);

        let evaluator = Evaluator::new();
        for (x, y) in [(false, true), (true, true)] {
            c.set_input(a, x).unwrap();
            c.set_input(b, y).unwrap();
            evaluator.evaluate(&mut c);
            assert_eq!(c.gate(out).unwrap().value(0), x && y);
        }
    }

    #[test]
    fn test_instance_centred_on_selection() {
        let (mut c, [_, _, g1, g2, g3, _]) = and_or();
        let mut registry = Registry::new();
        let selection = Selection::from_gates(&c, [g1, g2, g3]);
        let promotion = promote_selection(&mut c, &mut registry, &selection, "and-or").unwrap();
        let (x, y) = c.gate(promotion.instance).unwrap().placement.center();
        approx::assert_relative_eq!(x, 180.0);
        approx::assert_relative_eq!(y, 20.0);
    }

    #[test]
    fn test_fan_out_gets_one_port_and_keeps_every_sink() {
        let mut c = Circuit::new();
        let a = add(&mut c, GateKind::Input, 0.0);
        let not = add(&mut c, GateKind::Not, 100.0);
        let o1 = add(&mut c, GateKind::Output, 200.0);
        let o2 = add(&mut c, GateKind::Output, 200.0);
        wire(&mut c, a, not, 0);
        wire(&mut c, not, o1, 0);
        wire(&mut c, not, o2, 0);

        let mut registry = Registry::new();
        let selection = Selection::from_gates(&c, [not]);
        let promotion = promote_selection(&mut c, &mut registry, &selection, "inv").unwrap();
        assert_eq!(registry.get(promotion.template).unwrap().outputs.len(), 1);
        assert_eq!(c.fan_out(promotion.instance), 2);
    }

    #[test]
    fn test_unlisted_wire_is_ambiguous() {
        let (mut c, [_, _, g1, g2, g3, _]) = and_or();
        let mut registry = Registry::new();
        let mut selection = Selection::from_gates(&c, [g1, g2, g3]);
        let dropped = selection.boundary.pop().unwrap();
        let err = promote_selection(&mut c, &mut registry, &selection, "x").unwrap_err();
        assert!(matches!(err, LogicboxError::AmbiguousBoundary { wire, .. } if wire == dropped));
        assert!(registry.is_empty());
        assert_eq!(c.gate_count(), 6);
    }

    #[test]
    fn test_misclassified_wire_is_ambiguous() {
        let (mut c, [_, _, g1, g2, g3, _]) = and_or();
        let mut registry = Registry::new();
        let mut selection = Selection::from_gates(&c, [g1, g2, g3]);
        let moved = selection.internal.remove(0);
        selection.boundary.push(moved);
        assert!(matches!(
            promote_selection(&mut c, &mut registry, &selection, "x"),
            Err(LogicboxError::AmbiguousBoundary { .. })
        ));
    }

    #[test]
    fn test_placeholder_gates_rejected() {
        let (mut c, [a, _, g1, ..]) = and_or();
        let mut registry = Registry::new();
        let selection = Selection::from_gates(&c, [a, g1]);
        assert!(matches!(
            promote_selection(&mut c, &mut registry, &selection, "x"),
            Err(LogicboxError::InvalidTemplate { .. })
        ));
        let empty = Selection::default();
        assert!(promote_selection(&mut c, &mut registry, &empty, "x").is_err());
    }
}
