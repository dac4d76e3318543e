//! Inlining subcircuit instances into a single primitive-only graph.
//!
//! Every instance, at any depth, becomes a *scope*. Primitive gates of every
//! scope are copied into a scratch circuit under fresh ids; INPUT/OUTPUT
//! placeholders and instance gates disappear, and each wire into a copied
//! gate is re-pointed at the primitive output that ultimately drives it.

use std::collections::{BTreeMap, BTreeSet};

use crate::circuit::{Circuit, Gate, GateId, GateKind, SlotRef};
use crate::error::{LogicboxError, Result};

/// One circuit level: the top-level graph or an instance's nested copy.
struct Scope<'a> {
    circuit: &'a Circuit,
    /// Enclosing scope and the instance gate standing for this one
    parent: Option<(usize, GateId)>,
    /// Instance ids from the top level down to this scope
    path: Vec<GateId>,
    inputs: Vec<GateId>,
    outputs: Vec<GateId>,
}

impl<'a> Scope<'a> {
    fn new(circuit: &'a Circuit, parent: Option<(usize, GateId)>, path: Vec<GateId>) -> Self {
        Self {
            circuit,
            parent,
            path,
            inputs: circuit.input_placeholders(),
            outputs: circuit.output_placeholders(),
        }
    }

    /// Whether `gate` gets a copy in the scratch circuit.
    fn inlines(&self, gate: &Gate) -> bool {
        match gate.kind {
            GateKind::Subcircuit(_) => false,
            kind if kind.is_placeholder() => self.parent.is_none(),
            _ => true,
        }
    }
}

#[derive(Debug, Clone)]
enum Source {
    /// Every slot of this scratch gate
    Gate(GateId),
    /// One scratch output per value slot; `None` reads 0
    Slots(Vec<Option<SlotRef>>),
}

#[derive(Debug, Clone)]
struct WriteBack {
    path: Vec<GateId>,
    gate: GateId,
    source: Source,
}

/// A circuit with every subcircuit instance inlined.
#[derive(Debug, Clone)]
pub struct Flattened {
    circuit: Circuit,
    /// Scratch gate -> top-level gate it came from
    origin: BTreeMap<GateId, GateId>,
    writes: Vec<WriteBack>,
}

impl Flattened {
    /// The scratch circuit (primitive gates only).
    pub fn circuit(&self) -> &Circuit {
        &self.circuit
    }

    pub(crate) fn circuit_mut(&mut self) -> &mut Circuit {
        &mut self.circuit
    }

    /// Top-level gate a scratch gate was copied from (itself or the
    /// enclosing instance).
    pub fn origin(&self, gate: GateId) -> Option<GateId> {
        self.origin.get(&gate).copied()
    }

    /// Copy the scratch values into `target`, the circuit this was built
    /// from, including the nested state of every instance.
    pub fn write_back(&self, target: &mut Circuit) {
        for write in &self.writes {
            let values: Vec<bool> = match &write.source {
                Source::Gate(id) => self
                    .circuit
                    .gate(*id)
                    .map(|g| g.values().to_vec())
                    .unwrap_or_default(),
                Source::Slots(slots) => slots
                    .iter()
                    .map(|slot| slot.map_or(false, |s| self.circuit.output_value(s)))
                    .collect(),
            };
            if let Some(gate) = locate(target, &write.path, write.gate) {
                gate.set_values(&values);
            }
        }
        sync_deep(target);
    }
}

fn locate<'c>(circuit: &'c mut Circuit, path: &[GateId], gate: GateId) -> Option<&'c mut Gate> {
    let mut current = circuit;
    for instance in path {
        current = current.gate_mut(*instance)?.nested_mut()?;
    }
    current.gate_mut(gate)
}

fn sync_deep(circuit: &mut Circuit) {
    for gate in circuit.gates_mut() {
        if let Some(nested) = gate.nested_mut() {
            sync_deep(nested);
        }
    }
    circuit.sync_wires();
}

/// Inline every instance of `circuit`, recursively.
///
/// Scratch gates start from the current values of the gates they copy, so
/// feedback inside instances keeps its state. Fails with
/// `UnresolvedTemplate` if an instance has no nested circuit.
pub fn flatten(circuit: &Circuit) -> Result<Flattened> {
    let (scopes, children) = collect_scopes(circuit)?;

    let mut scratch = Circuit::new();
    let mut inlined: BTreeMap<(usize, GateId), GateId> = BTreeMap::new();
    let mut origin = BTreeMap::new();
    for (index, scope) in scopes.iter().enumerate() {
        for gate in scope.circuit.gates().filter(|g| scope.inlines(g)) {
            let mut copy = Gate::new(gate.kind, gate.placement);
            copy.set_values(gate.values());
            let id = scratch.add_gate(copy)?;
            inlined.insert((index, gate.id()), id);
            origin.insert(id, scope.path.first().copied().unwrap_or(gate.id()));
        }
    }

    let resolver = Resolver {
        scopes: &scopes,
        inlined: &inlined,
        children: &children,
    };

    for (index, scope) in scopes.iter().enumerate() {
        for wire in scope.circuit.wires() {
            let Some(&sink) = inlined.get(&(index, wire.to.gate)) else {
                continue;
            };
            if let Some(source) = resolver.source(index, wire.from) {
                scratch.add_wire(source, SlotRef::new(sink, wire.to.slot))?;
            }
        }
    }

    let mut writes = Vec::new();
    for (index, scope) in scopes.iter().enumerate() {
        for gate in scope.circuit.gates() {
            let id = gate.id();
            let source = if let Some(&copy) = inlined.get(&(index, id)) {
                Source::Gate(copy)
            } else {
                match gate.kind {
                    GateKind::Subcircuit(_) => Source::Slots(
                        (0..gate.output_count())
                            .map(|slot| resolver.source(index, SlotRef::new(id, slot)))
                            .collect(),
                    ),
                    GateKind::Input => {
                        Source::Slots(vec![resolver.source(index, SlotRef::new(id, 0))])
                    }
                    _ => Source::Slots(vec![scope
                        .circuit
                        .driver(SlotRef::new(id, 0))
                        .and_then(|w| resolver.source(index, w.from))]),
                }
            };
            writes.push(WriteBack {
                path: scope.path.clone(),
                gate: id,
                source,
            });
        }
    }

    Ok(Flattened {
        circuit: scratch,
        origin,
        writes,
    })
}

type Children = BTreeMap<(usize, GateId), usize>;

fn collect_scopes(circuit: &Circuit) -> Result<(Vec<Scope<'_>>, Children)> {
    let mut scopes = vec![Scope::new(circuit, None, Vec::new())];
    let mut children = BTreeMap::new();
    let mut index = 0;
    while index < scopes.len() {
        let level = scopes[index].circuit;
        let path = scopes[index].path.clone();
        for gate in level.gates() {
            let GateKind::Subcircuit(template) = gate.kind else {
                continue;
            };
            let nested = gate
                .nested()
                .ok_or(LogicboxError::UnresolvedTemplate { template })?;
            let mut inner_path = path.clone();
            inner_path.push(gate.id());
            children.insert((index, gate.id()), scopes.len());
            scopes.push(Scope::new(nested, Some((index, gate.id())), inner_path));
        }
        index += 1;
    }
    Ok((scopes, children))
}

struct Resolver<'s, 'a> {
    scopes: &'s [Scope<'a>],
    inlined: &'s BTreeMap<(usize, GateId), GateId>,
    children: &'s Children,
}

impl Resolver<'_, '_> {
    /// Scratch output slot that drives `from` (an output slot in `scope`).
    ///
    /// Walks through placeholders and instance boundaries. A chain that
    /// comes back to where it started (an instance feeding its own input
    /// with no gate in between) drives nothing.
    fn source(&self, scope: usize, from: SlotRef) -> Option<SlotRef> {
        let mut seen = BTreeSet::new();
        let (mut scope, mut from) = (scope, from);
        while seen.insert((scope, from)) {
            if let Some(&id) = self.inlined.get(&(scope, from.gate)) {
                return Some(SlotRef::new(id, from.slot));
            }
            let level = &self.scopes[scope];
            let gate = level.circuit.gate(from.gate)?;
            let (next, driven) = match gate.kind {
                GateKind::Subcircuit(_) => {
                    let inner = *self.children.get(&(scope, from.gate))?;
                    let placeholder = *self.scopes[inner].outputs.get(from.slot)?;
                    (inner, SlotRef::new(placeholder, 0))
                }
                GateKind::Input => {
                    let (outer, instance) = level.parent?;
                    let port = level.inputs.iter().position(|g| *g == from.gate)?;
                    (outer, SlotRef::new(instance, port))
                }
                _ => return None,
            };
            from = self.scopes[next].circuit.driver(driven)?.from;
            scope = next;
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit::{Placement, TemplateId};

    fn add(c: &mut Circuit, kind: GateKind) -> GateId {
        c.add_gate(Gate::new(kind, Placement::default())).unwrap()
    }

    fn wire(c: &mut Circuit, from: GateId, to: GateId, slot: usize) {
        c.add_wire(SlotRef::new(from, 0), SlotRef::new(to, slot)).unwrap();
    }

    /// in -> NOT -> out
    fn inverter() -> Circuit {
        let mut c = Circuit::new();
        let i = add(&mut c, GateKind::Input);
        let not = add(&mut c, GateKind::Not);
        let o = add(&mut c, GateKind::Output);
        wire(&mut c, i, not, 0);
        wire(&mut c, not, o, 0);
        c
    }

    /// in -> out
    fn passthrough() -> Circuit {
        let mut c = Circuit::new();
        let i = add(&mut c, GateKind::Input);
        let o = add(&mut c, GateKind::Output);
        wire(&mut c, i, o, 0);
        c
    }

    #[test]
    fn test_inlines_instance_and_rewires() {
        let mut c = Circuit::new();
        let input = add(&mut c, GateKind::Input);
        let sub = c
            .add_gate(Gate::subcircuit(TemplateId(0), inverter(), Placement::default()))
            .unwrap();
        let out = add(&mut c, GateKind::Output);
        wire(&mut c, input, sub, 0);
        wire(&mut c, sub, out, 0);

        let flat = flatten(&c).unwrap();
        let scratch = flat.circuit();
        // INPUT, OUTPUT and the inner NOT; placeholders are gone
        assert_eq!(scratch.gate_count(), 3);
        assert_eq!(scratch.wire_count(), 2);
        let not = scratch
            .gates()
            .find(|g| g.kind == GateKind::Not)
            .map(|g| g.id())
            .unwrap();
        assert_eq!(flat.origin(not), Some(sub));
        assert_eq!(scratch.predecessors(not).len(), 1);
        assert_eq!(scratch.successors(not).len(), 1);
    }

    #[test]
    fn test_nested_instances_inline_recursively() {
        let mut middle = Circuit::new();
        let i = add(&mut middle, GateKind::Input);
        let a = middle
            .add_gate(Gate::subcircuit(TemplateId(0), inverter(), Placement::default()))
            .unwrap();
        let b = middle
            .add_gate(Gate::subcircuit(TemplateId(0), inverter(), Placement::default()))
            .unwrap();
        let o = add(&mut middle, GateKind::Output);
        wire(&mut middle, i, a, 0);
        wire(&mut middle, a, b, 0);
        wire(&mut middle, b, o, 0);

        let mut c = Circuit::new();
        let input = add(&mut c, GateKind::Input);
        let sub = c
            .add_gate(Gate::subcircuit(TemplateId(1), middle, Placement::default()))
            .unwrap();
        wire(&mut c, input, sub, 0);

        let flat = flatten(&c).unwrap();
        let nots: Vec<GateId> = flat
            .circuit()
            .gates()
            .filter(|g| g.kind == GateKind::Not)
            .map(|g| g.id())
            .collect();
        assert_eq!(nots.len(), 2);
        assert!(nots.iter().all(|g| flat.origin(*g) == Some(sub)));
        // input -> NOT -> NOT
        assert_eq!(flat.circuit().wire_count(), 2);
    }

    #[test]
    fn test_instance_feeding_itself_through_a_gate() {
        let mut c = Circuit::new();
        let sub = c
            .add_gate(Gate::subcircuit(TemplateId(0), inverter(), Placement::default()))
            .unwrap();
        wire(&mut c, sub, sub, 0);

        let flat = flatten(&c).unwrap();
        let scratch = flat.circuit();
        assert_eq!(scratch.gate_count(), 1);
        let not = scratch.gate_ids().next().unwrap();
        // the inner NOT now drives itself
        assert_eq!(scratch.successors(not).into_iter().collect::<Vec<_>>(), vec![not]);
    }

    #[test]
    fn test_passthrough_feeding_itself_drives_nothing() {
        let mut c = Circuit::new();
        let sub = c
            .add_gate(Gate::subcircuit(TemplateId(0), passthrough(), Placement::default()))
            .unwrap();
        let out = add(&mut c, GateKind::Output);
        wire(&mut c, sub, sub, 0);
        wire(&mut c, sub, out, 0);

        let flat = flatten(&c).unwrap();
        assert_eq!(flat.circuit().gate_count(), 1);
        assert_eq!(flat.circuit().wire_count(), 0);
    }

    #[test]
    fn test_missing_nested_circuit_fails() {
        let mut c = Circuit::new();
        c.add_gate(Gate::new(GateKind::Subcircuit(TemplateId(4)), Placement::default()))
            .unwrap();
        assert!(matches!(
            flatten(&c).unwrap_err(),
            LogicboxError::UnresolvedTemplate {
                template: TemplateId(4)
            }
        ));
    }

    #[test]
    fn test_write_back_updates_nested_state() {
        let mut c = Circuit::new();
        let input = add(&mut c, GateKind::Input);
        let sub = c
            .add_gate(Gate::subcircuit(TemplateId(0), inverter(), Placement::default()))
            .unwrap();
        wire(&mut c, input, sub, 0);
        c.set_input(input, true).unwrap();

        let mut flat = flatten(&c).unwrap();
        for id in flat.circuit().gate_ids().collect::<Vec<_>>() {
            if flat.circuit().gate(id).map(|g| g.kind) == Some(GateKind::Not) {
                flat.circuit_mut().gate_mut(id).unwrap().set_values(&[true]);
            }
        }
        flat.write_back(&mut c);

        let instance = c.gate(sub).unwrap();
        assert!(instance.value(0));
        let nested = instance.nested().unwrap();
        // placeholder in, NOT, placeholder out
        let values: Vec<bool> = nested.gates().map(|g| g.value(0)).collect();
        assert_eq!(values, vec![true, true, true]);
        assert!(nested.wires().all(|w| w.value));
    }
}
