//! Circuit graph structure.

use std::collections::{BTreeMap, BTreeSet};

use super::kind::GateKind;
use super::types::{GateId, Placement, SlotDirection, SlotRef, TemplateId, WireId};
use crate::error::{Result, Violation};

/// Current value of every observable slot, keyed by gate and slot.
///
/// OUTPUT gates appear with slot 0 holding the value they display.
pub type SignalMap = BTreeMap<SlotRef, bool>;

/// A node of the circuit.
#[derive(Debug, Clone, PartialEq)]
pub struct Gate {
    id: GateId,
    /// What the gate computes
    pub kind: GateKind,
    /// Canvas placement, passed through untouched
    pub placement: Placement,
    /// Optional user-facing label (port names derive from it)
    pub label: Option<String>,
    inputs: usize,
    outputs: usize,
    values: Vec<bool>,
    nested: Option<Box<Circuit>>,
}

impl Gate {
    /// Create a gate of a primitive kind.
    ///
    /// A `Subcircuit` kind built this way has no slots and no nested circuit;
    /// use [`Gate::subcircuit`] or the registry to get a usable instance.
    pub fn new(kind: GateKind, placement: Placement) -> Self {
        let inputs = kind.input_slots().unwrap_or(0);
        let outputs = kind.output_slots().unwrap_or(0);
        Self {
            id: GateId(0),
            kind,
            placement,
            label: None,
            inputs,
            outputs,
            values: vec![false; value_slots(kind, outputs)],
            nested: None,
        }
    }

    /// Create a subcircuit instance owning its copy of the template internals.
    ///
    /// Slot counts follow the INPUT/OUTPUT placeholders of `nested`.
    pub fn subcircuit(template: TemplateId, nested: Circuit, placement: Placement) -> Self {
        let inputs = nested.input_placeholders().len();
        let outputs = nested.output_placeholders().len();
        Self {
            id: GateId(0),
            kind: GateKind::Subcircuit(template),
            placement,
            label: None,
            inputs,
            outputs,
            values: vec![false; outputs],
            nested: Some(Box::new(nested)),
        }
    }

    /// Builder: set the gate id (used when importing with stable ids).
    pub fn with_id(mut self, id: GateId) -> Self {
        self.id = id;
        self
    }

    /// Builder: set the label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Builder: preset the stored output values (missing slots read 0).
    ///
    /// Any kind accepts them, so a latch can be rebuilt in the state it was
    /// saved in.
    pub fn with_values(mut self, values: &[bool]) -> Self {
        self.set_values(values);
        self
    }

    pub fn id(&self) -> GateId {
        self.id
    }

    pub fn input_count(&self) -> usize {
        self.inputs
    }

    pub fn output_count(&self) -> usize {
        self.outputs
    }

    /// Current value of every observable slot.
    pub fn values(&self) -> &[bool] {
        &self.values
    }

    /// Value of one slot; out-of-range slots read as 0.
    pub fn value(&self, slot: usize) -> bool {
        self.values.get(slot).copied().unwrap_or(false)
    }

    /// The instance's private copy of its template internals.
    pub fn nested(&self) -> Option<&Circuit> {
        self.nested.as_deref()
    }

    pub(crate) fn nested_mut(&mut self) -> Option<&mut Circuit> {
        self.nested.as_deref_mut()
    }

    /// Replace the nested circuit and resize the slots to its placeholders.
    ///
    /// Callers must first drop wires that would fall out of range.
    pub(crate) fn attach_nested(&mut self, nested: Circuit) {
        self.inputs = nested.input_placeholders().len();
        self.outputs = nested.output_placeholders().len();
        self.values.resize(self.outputs, false);
        self.nested = Some(Box::new(nested));
    }

    /// Overwrite slot values, returning whether anything changed.
    pub(crate) fn set_values(&mut self, values: &[bool]) -> bool {
        let mut changed = false;
        for (slot, value) in self.values.iter_mut().enumerate() {
            let next = values.get(slot).copied().unwrap_or(false);
            if *value != next {
                *value = next;
                changed = true;
            }
        }
        changed
    }
}

fn value_slots(kind: GateKind, outputs: usize) -> usize {
    if kind == GateKind::Output {
        1
    } else {
        outputs
    }
}

/// A directed connection from an output slot to an input slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Wire {
    pub id: WireId,
    /// Output slot driving the wire
    pub from: SlotRef,
    /// Input slot the wire drives
    pub to: SlotRef,
    /// Value carried, refreshed from the source after every evaluation
    pub value: bool,
}

/// A gate/wire graph.
///
/// Gates and wires are kept in ascending id order, which is also the scan
/// order used by the evaluator.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Circuit {
    gates: BTreeMap<GateId, Gate>,
    wires: BTreeMap<WireId, Wire>,
    /// Input slot -> the single wire driving it
    drivers: BTreeMap<SlotRef, WireId>,
    next_gate: usize,
    next_wire: usize,
}

impl Circuit {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn gate_count(&self) -> usize {
        self.gates.len()
    }

    pub fn wire_count(&self) -> usize {
        self.wires.len()
    }

    pub fn is_empty(&self) -> bool {
        self.gates.is_empty()
    }

    pub fn gate(&self, id: GateId) -> Option<&Gate> {
        self.gates.get(&id)
    }

    pub(crate) fn gate_mut(&mut self, id: GateId) -> Option<&mut Gate> {
        self.gates.get_mut(&id)
    }

    pub fn gates(&self) -> impl Iterator<Item = &Gate> {
        self.gates.values()
    }

    pub fn gate_ids(&self) -> impl Iterator<Item = GateId> + '_ {
        self.gates.keys().copied()
    }

    pub(crate) fn gates_mut(&mut self) -> impl Iterator<Item = &mut Gate> {
        self.gates.values_mut()
    }

    /// Give every instance of `template` a fresh copy of `nested`.
    ///
    /// Wires on slots the new signature no longer has are removed and
    /// returned.
    pub(crate) fn resync_instances(&mut self, template: TemplateId, nested: &Circuit) -> Vec<Wire> {
        let inputs = nested.input_placeholders().len();
        let outputs = nested.output_placeholders().len();
        let instances: BTreeSet<GateId> = self
            .gates
            .values()
            .filter(|g| g.kind == GateKind::Subcircuit(template))
            .map(|g| g.id)
            .collect();
        let stale: Vec<WireId> = self
            .wires
            .values()
            .filter(|w| {
                (instances.contains(&w.to.gate) && w.to.slot >= inputs)
                    || (instances.contains(&w.from.gate) && w.from.slot >= outputs)
            })
            .map(|w| w.id)
            .collect();
        let removed = stale
            .into_iter()
            .filter_map(|id| self.remove_wire(id).ok())
            .collect();
        for id in instances {
            if let Some(gate) = self.gates.get_mut(&id) {
                gate.attach_nested(nested.clone());
            }
        }
        removed
    }

    pub fn wire(&self, id: WireId) -> Option<&Wire> {
        self.wires.get(&id)
    }

    pub fn wires(&self) -> impl Iterator<Item = &Wire> {
        self.wires.values()
    }

    /// Add a gate under a freshly allocated id.
    pub fn add_gate(&mut self, gate: Gate) -> Result<GateId> {
        let id = GateId(self.next_gate);
        self.insert_gate(gate.with_id(id))
    }

    /// Add a gate under the id it already carries.
    pub fn insert_gate(&mut self, gate: Gate) -> Result<GateId> {
        let id = gate.id;
        if self.gates.contains_key(&id) {
            return Err(Violation::DuplicateGate { gate: id }.into());
        }
        if let Some(nested) = gate.nested() {
            let expected_inputs = nested.input_placeholders().len();
            let expected_outputs = nested.output_placeholders().len();
            if expected_inputs != gate.inputs || expected_outputs != gate.outputs {
                return Err(Violation::ArityMismatch {
                    gate: id,
                    inputs: gate.inputs,
                    outputs: gate.outputs,
                    expected_inputs,
                    expected_outputs,
                }
                .into());
            }
        }
        self.next_gate = self.next_gate.max(id.0 + 1);
        self.gates.insert(id, gate);
        Ok(id)
    }

    /// Remove a gate together with every wire attached to it.
    pub fn remove_gate(&mut self, id: GateId) -> Result<(Gate, Vec<Wire>)> {
        if !self.gates.contains_key(&id) {
            return Err(Violation::UnknownGate { gate: id }.into());
        }
        let attached: Vec<WireId> = self.wires_of(id).map(|w| w.id).collect();
        let mut removed = Vec::with_capacity(attached.len());
        for wire in attached {
            removed.push(self.remove_wire(wire)?);
        }
        let gate = self
            .gates
            .remove(&id)
            .ok_or(Violation::UnknownGate { gate: id })?;
        Ok((gate, removed))
    }

    /// Connect an output slot to an input slot under a fresh wire id.
    pub fn add_wire(&mut self, from: SlotRef, to: SlotRef) -> Result<WireId> {
        let id = WireId(self.next_wire);
        self.insert_wire(id, from, to)
    }

    /// Connect an output slot to an input slot under a caller-chosen id.
    pub fn insert_wire(&mut self, id: WireId, from: SlotRef, to: SlotRef) -> Result<WireId> {
        if self.wires.contains_key(&id) {
            return Err(Violation::DuplicateWire { wire: id }.into());
        }
        let source = self
            .gates
            .get(&from.gate)
            .ok_or(Violation::UnknownGate { gate: from.gate })?;
        if from.slot >= source.outputs {
            return Err(Violation::SlotOutOfRange {
                slot: from,
                direction: SlotDirection::Output,
                available: source.outputs,
            }
            .into());
        }
        let sink = self
            .gates
            .get(&to.gate)
            .ok_or(Violation::UnknownGate { gate: to.gate })?;
        if to.slot >= sink.inputs {
            return Err(Violation::SlotOutOfRange {
                slot: to,
                direction: SlotDirection::Input,
                available: sink.inputs,
            }
            .into());
        }
        if let Some(&existing) = self.drivers.get(&to) {
            return Err(Violation::SlotOccupied {
                slot: to,
                wire: existing,
            }
            .into());
        }

        let value = source.value(from.slot);
        self.next_wire = self.next_wire.max(id.0 + 1);
        self.drivers.insert(to, id);
        self.wires.insert(
            id,
            Wire {
                id,
                from,
                to,
                value,
            },
        );
        Ok(id)
    }

    pub fn remove_wire(&mut self, id: WireId) -> Result<Wire> {
        let wire = self
            .wires
            .remove(&id)
            .ok_or(Violation::UnknownWire { wire: id })?;
        self.drivers.remove(&wire.to);
        Ok(wire)
    }

    /// Wires with either endpoint on `gate`.
    pub fn wires_of(&self, gate: GateId) -> impl Iterator<Item = &Wire> {
        self.wires
            .values()
            .filter(move |w| w.from.gate == gate || w.to.gate == gate)
    }

    /// The wire driving an input slot, if any.
    pub fn driver(&self, slot: SlotRef) -> Option<&Wire> {
        self.drivers.get(&slot).and_then(|id| self.wires.get(id))
    }

    /// Number of connected input slots.
    pub fn fan_in(&self, gate: GateId) -> usize {
        self.wires.values().filter(|w| w.to.gate == gate).count()
    }

    /// Number of wires leaving the gate's output slots.
    pub fn fan_out(&self, gate: GateId) -> usize {
        self.wires.values().filter(|w| w.from.gate == gate).count()
    }

    /// Gates fed by this gate, ascending.
    pub fn successors(&self, gate: GateId) -> BTreeSet<GateId> {
        self.wires
            .values()
            .filter(|w| w.from.gate == gate)
            .map(|w| w.to.gate)
            .collect()
    }

    /// Gates feeding this gate, ascending.
    pub fn predecessors(&self, gate: GateId) -> BTreeSet<GateId> {
        self.wires
            .values()
            .filter(|w| w.to.gate == gate)
            .map(|w| w.from.gate)
            .collect()
    }

    /// Current value seen on each input slot. Floating slots read 0.
    pub fn input_values(&self, gate: GateId) -> Vec<bool> {
        let count = self.gates.get(&gate).map_or(0, |g| g.inputs);
        (0..count)
            .map(|slot| {
                self.driver(SlotRef::new(gate, slot))
                    .map_or(false, |w| self.output_value(w.from))
            })
            .collect()
    }

    /// Current value of an output slot; unknown slots read 0.
    pub fn output_value(&self, slot: SlotRef) -> bool {
        self.gates.get(&slot.gate).map_or(false, |g| g.value(slot.slot))
    }

    /// Set the held value of an INPUT gate. Returns whether it changed.
    pub fn set_input(&mut self, gate: GateId, value: bool) -> Result<bool> {
        let target = self
            .gates
            .get_mut(&gate)
            .ok_or(Violation::UnknownGate { gate })?;
        if target.kind != GateKind::Input {
            return Err(Violation::NotAnInput { gate }.into());
        }
        Ok(target.set_values(&[value]))
    }

    /// Flip every CLOCK gate, including those inside subcircuit instances.
    ///
    /// Returns how many clocks flipped.
    pub fn tick_clocks(&mut self) -> usize {
        let mut flipped = 0;
        for gate in self.gates.values_mut() {
            match gate.kind {
                GateKind::Clock => {
                    let next = !gate.value(0);
                    gate.set_values(&[next]);
                    flipped += 1;
                }
                GateKind::Subcircuit(_) => {
                    if let Some(nested) = gate.nested_mut() {
                        flipped += nested.tick_clocks();
                    }
                }
                _ => {}
            }
        }
        flipped
    }

    /// INPUT placeholder gates in ascending id order (port order).
    pub fn input_placeholders(&self) -> Vec<GateId> {
        self.placeholders(GateKind::Input)
    }

    /// OUTPUT placeholder gates in ascending id order (port order).
    pub fn output_placeholders(&self) -> Vec<GateId> {
        self.placeholders(GateKind::Output)
    }

    fn placeholders(&self, kind: GateKind) -> Vec<GateId> {
        self.gates
            .values()
            .filter(|g| g.kind == kind)
            .map(|g| g.id)
            .collect()
    }

    /// Templates referenced directly by subcircuit gates of this circuit.
    pub fn template_refs(&self) -> BTreeSet<TemplateId> {
        self.gates.values().filter_map(|g| g.kind.template()).collect()
    }

    /// Number of subcircuit gates referencing `template`.
    pub fn references(&self, template: TemplateId) -> usize {
        self.gates
            .values()
            .filter(|g| g.kind.template() == Some(template))
            .count()
    }

    /// Snapshot of every observable slot value.
    pub fn signals(&self) -> SignalMap {
        self.gates
            .values()
            .flat_map(|g| {
                g.values
                    .iter()
                    .enumerate()
                    .map(move |(slot, &v)| (SlotRef::new(g.id, slot), v))
            })
            .collect()
    }

    /// Refresh every wire's carried value from its source slot.
    pub(crate) fn sync_wires(&mut self) {
        let gates = &self.gates;
        for wire in self.wires.values_mut() {
            wire.value = gates
                .get(&wire.from.gate)
                .map_or(false, |g| g.value(wire.from.slot));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LogicboxError;

    fn and_with_inputs() -> (Circuit, GateId, GateId, GateId) {
        let mut c = Circuit::new();
        let a = c.add_gate(Gate::new(GateKind::Input, Placement::default())).unwrap();
        let b = c.add_gate(Gate::new(GateKind::Input, Placement::default())).unwrap();
        let and = c.add_gate(Gate::new(GateKind::And, Placement::default())).unwrap();
        (c, a, b, and)
    }

    fn violation(err: LogicboxError) -> Violation {
        match err {
            LogicboxError::StructuralViolation(v) => v,
            other => panic!("expected structural violation, got {other}"),
        }
    }

    #[test]
    fn test_add_gate_allocates_sequential_ids() {
        let (c, a, b, and) = and_with_inputs();
        assert_eq!((a, b, and), (GateId(0), GateId(1), GateId(2)));
        assert_eq!(c.gate_count(), 3);
        assert_eq!(c.gate(and).unwrap().input_count(), 2);
    }

    #[test]
    fn test_input_slot_accepts_one_wire() {
        let (mut c, a, b, and) = and_with_inputs();
        let w = c.add_wire(SlotRef::new(a, 0), SlotRef::new(and, 0)).unwrap();
        let err = c
            .add_wire(SlotRef::new(b, 0), SlotRef::new(and, 0))
            .unwrap_err();
        assert_eq!(
            violation(err),
            Violation::SlotOccupied {
                slot: SlotRef::new(and, 0),
                wire: w
            }
        );
        assert_eq!(c.wire_count(), 1);
    }

    #[test]
    fn test_output_fans_out() {
        let (mut c, a, _, and) = and_with_inputs();
        c.add_wire(SlotRef::new(a, 0), SlotRef::new(and, 0)).unwrap();
        c.add_wire(SlotRef::new(a, 0), SlotRef::new(and, 1)).unwrap();
        assert_eq!(c.fan_out(a), 2);
        assert_eq!(c.fan_in(and), 2);
        assert_eq!(c.successors(a).into_iter().collect::<Vec<_>>(), vec![and]);
        assert_eq!(c.predecessors(and).into_iter().collect::<Vec<_>>(), vec![a]);
    }

    #[test]
    fn test_slot_out_of_range_rejected() {
        let (mut c, a, _, and) = and_with_inputs();
        let err = c
            .add_wire(SlotRef::new(a, 0), SlotRef::new(and, 2))
            .unwrap_err();
        assert!(matches!(
            violation(err),
            Violation::SlotOutOfRange {
                direction: SlotDirection::Input,
                available: 2,
                ..
            }
        ));
        let err = c
            .add_wire(SlotRef::new(a, 1), SlotRef::new(and, 0))
            .unwrap_err();
        assert!(matches!(
            violation(err),
            Violation::SlotOutOfRange {
                direction: SlotDirection::Output,
                ..
            }
        ));
        assert_eq!(c.wire_count(), 0);
    }

    #[test]
    fn test_output_gate_cannot_drive() {
        let mut c = Circuit::new();
        let out = c.add_gate(Gate::new(GateKind::Output, Placement::default())).unwrap();
        let not = c.add_gate(Gate::new(GateKind::Not, Placement::default())).unwrap();
        assert!(c.add_wire(SlotRef::new(out, 0), SlotRef::new(not, 0)).is_err());
        assert_eq!(c.gate(out).unwrap().values().len(), 1);
    }

    #[test]
    fn test_remove_gate_drops_attached_wires() {
        let (mut c, a, b, and) = and_with_inputs();
        c.add_wire(SlotRef::new(a, 0), SlotRef::new(and, 0)).unwrap();
        c.add_wire(SlotRef::new(b, 0), SlotRef::new(and, 1)).unwrap();
        let (gate, wires) = c.remove_gate(and).unwrap();
        assert_eq!(gate.id(), and);
        assert_eq!(wires.len(), 2);
        assert_eq!(c.wire_count(), 0);
        assert!(c.driver(SlotRef::new(and, 0)).is_none());
    }

    #[test]
    fn test_unknown_ids_rejected() {
        let mut c = Circuit::new();
        assert!(matches!(
            violation(c.remove_gate(GateId(9)).unwrap_err()),
            Violation::UnknownGate { .. }
        ));
        assert!(matches!(
            violation(c.remove_wire(WireId(1)).unwrap_err()),
            Violation::UnknownWire { .. }
        ));
    }

    #[test]
    fn test_insert_gate_keeps_id_and_bumps_allocator() {
        let mut c = Circuit::new();
        c.insert_gate(Gate::new(GateKind::Not, Placement::default()).with_id(GateId(5)))
            .unwrap();
        let next = c.add_gate(Gate::new(GateKind::Not, Placement::default())).unwrap();
        assert_eq!(next, GateId(6));
        let dup = c.insert_gate(Gate::new(GateKind::Or, Placement::default()).with_id(GateId(5)));
        assert!(matches!(
            violation(dup.unwrap_err()),
            Violation::DuplicateGate { .. }
        ));
    }

    #[test]
    fn test_set_input_only_on_input_gates() {
        let (mut c, a, _, and) = and_with_inputs();
        assert!(c.set_input(a, true).unwrap());
        assert!(!c.set_input(a, true).unwrap());
        assert_eq!(
            violation(c.set_input(and, true).unwrap_err()),
            Violation::NotAnInput { gate: and }
        );
    }

    #[test]
    fn test_input_values_read_floating_as_zero() {
        let (mut c, a, _, and) = and_with_inputs();
        c.set_input(a, true).unwrap();
        c.add_wire(SlotRef::new(a, 0), SlotRef::new(and, 1)).unwrap();
        assert_eq!(c.input_values(and), vec![false, true]);
    }

    #[test]
    fn test_tick_clocks_recurses_into_instances() {
        let mut inner = Circuit::new();
        inner.add_gate(Gate::new(GateKind::Clock, Placement::default())).unwrap();
        inner.add_gate(Gate::new(GateKind::Output, Placement::default())).unwrap();

        let mut c = Circuit::new();
        let clk = c.add_gate(Gate::new(GateKind::Clock, Placement::default())).unwrap();
        let sub = c
            .add_gate(Gate::subcircuit(TemplateId(0), inner, Placement::default()))
            .unwrap();
        assert_eq!(c.tick_clocks(), 2);
        assert!(c.gate(clk).unwrap().value(0));
        let nested = c.gate(sub).unwrap().nested().unwrap();
        assert!(nested.gate(GateId(0)).unwrap().value(0));
    }

    #[test]
    fn test_resync_instances_drops_stale_wires() {
        let mut two_in = Circuit::new();
        two_in.add_gate(Gate::new(GateKind::Input, Placement::default())).unwrap();
        two_in.add_gate(Gate::new(GateKind::Input, Placement::default())).unwrap();
        two_in.add_gate(Gate::new(GateKind::Output, Placement::default())).unwrap();

        let mut c = Circuit::new();
        let a = c.add_gate(Gate::new(GateKind::Input, Placement::default())).unwrap();
        let sub = c
            .add_gate(Gate::subcircuit(TemplateId(0), two_in, Placement::default()))
            .unwrap();
        c.add_wire(SlotRef::new(a, 0), SlotRef::new(sub, 0)).unwrap();
        let w1 = c.add_wire(SlotRef::new(a, 0), SlotRef::new(sub, 1)).unwrap();

        let mut one_in = Circuit::new();
        one_in.add_gate(Gate::new(GateKind::Input, Placement::default())).unwrap();
        one_in.add_gate(Gate::new(GateKind::Output, Placement::default())).unwrap();
        let removed = c.resync_instances(TemplateId(0), &one_in);

        assert_eq!(removed.iter().map(|w| w.id).collect::<Vec<_>>(), vec![w1]);
        assert_eq!(c.gate(sub).unwrap().input_count(), 1);
        assert_eq!(c.wire_count(), 1);
    }

    #[test]
    fn test_subcircuit_slots_follow_placeholders() {
        let mut inner = Circuit::new();
        inner.add_gate(Gate::new(GateKind::Input, Placement::default())).unwrap();
        inner.add_gate(Gate::new(GateKind::Input, Placement::default())).unwrap();
        inner.add_gate(Gate::new(GateKind::Output, Placement::default())).unwrap();
        let gate = Gate::subcircuit(TemplateId(1), inner, Placement::default());
        assert_eq!(gate.input_count(), 2);
        assert_eq!(gate.output_count(), 1);
        assert_eq!(gate.values().len(), 1);
    }
}
