//! Evaluation order: strongly connected components in topological order.

use std::collections::BTreeMap;

use crate::circuit::{Circuit, GateId};

/// A group of gates evaluated as a unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Component {
    /// Members in ascending id order (the fixed scan order)
    pub gates: Vec<GateId>,
    /// More than one member, or a gate wired to itself
    pub cyclic: bool,
}

/// Components of the wire dependency graph, upstream first.
#[derive(Debug, Clone, Default)]
pub struct Schedule {
    pub components: Vec<Component>,
}

impl Schedule {
    /// Build the schedule with an iterative Tarjan pass.
    ///
    /// Roots and successors are visited in ascending id order, so the result
    /// is fully determined by the graph.
    pub fn build(circuit: &Circuit) -> Self {
        let ids: Vec<GateId> = circuit.gate_ids().collect();
        let position: BTreeMap<GateId, usize> =
            ids.iter().enumerate().map(|(i, id)| (*id, i)).collect();

        let mut self_loop = vec![false; ids.len()];
        let mut adjacency: Vec<Vec<usize>> = vec![Vec::new(); ids.len()];
        for wire in circuit.wires() {
            let (Some(&v), Some(&w)) = (position.get(&wire.from.gate), position.get(&wire.to.gate))
            else {
                continue;
            };
            if v == w {
                self_loop[v] = true;
            }
            adjacency[v].push(w);
        }
        for successors in &mut adjacency {
            successors.sort_unstable();
            successors.dedup();
        }

        let groups = tarjan(&adjacency);
        let components = groups
            .into_iter()
            .rev()
            .map(|mut members| {
                members.sort_unstable();
                let cyclic = members.len() > 1 || self_loop[members[0]];
                Component {
                    gates: members.into_iter().map(|i| ids[i]).collect(),
                    cyclic,
                }
            })
            .collect();

        Self { components }
    }

    pub fn is_acyclic(&self) -> bool {
        self.components.iter().all(|c| !c.cyclic)
    }

    pub fn cyclic_count(&self) -> usize {
        self.components.iter().filter(|c| c.cyclic).count()
    }
}

/// Strongly connected components, each completed before any component that
/// reaches it (reverse topological order). Never recurses.
fn tarjan(adjacency: &[Vec<usize>]) -> Vec<Vec<usize>> {
    let n = adjacency.len();
    let mut index: Vec<Option<usize>> = vec![None; n];
    let mut low = vec![0usize; n];
    let mut on_stack = vec![false; n];
    let mut stack = Vec::new();
    let mut counter = 0usize;
    let mut groups = Vec::new();

    for root in 0..n {
        if index[root].is_some() {
            continue;
        }
        index[root] = Some(counter);
        low[root] = counter;
        counter += 1;
        stack.push(root);
        on_stack[root] = true;

        // (node, next successor to look at)
        let mut calls = vec![(root, 0usize)];
        while let Some(&(v, next)) = calls.last() {
            if let Some(&w) = adjacency[v].get(next) {
                if let Some(top) = calls.last_mut() {
                    top.1 += 1;
                }
                match index[w] {
                    None => {
                        index[w] = Some(counter);
                        low[w] = counter;
                        counter += 1;
                        stack.push(w);
                        on_stack[w] = true;
                        calls.push((w, 0));
                    }
                    Some(iw) if on_stack[w] => low[v] = low[v].min(iw),
                    Some(_) => {}
                }
                continue;
            }

            calls.pop();
            if let Some(&(parent, _)) = calls.last() {
                low[parent] = low[parent].min(low[v]);
            }
            if Some(low[v]) == index[v] {
                let mut group = Vec::new();
                while let Some(w) = stack.pop() {
                    on_stack[w] = false;
                    group.push(w);
                    if w == v {
                        break;
                    }
                }
                groups.push(group);
            }
        }
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit::{Gate, GateKind, Placement, SlotRef};

    fn add(c: &mut Circuit, kind: GateKind) -> GateId {
        c.add_gate(Gate::new(kind, Placement::default())).unwrap()
    }

    fn wire(c: &mut Circuit, from: GateId, to: GateId, slot: usize) {
        c.add_wire(SlotRef::new(from, 0), SlotRef::new(to, slot)).unwrap();
    }

    #[test]
    fn test_chain_is_topological() {
        let mut c = Circuit::new();
        // ids deliberately out of dependency order
        let out = add(&mut c, GateKind::Output);
        let not = add(&mut c, GateKind::Not);
        let input = add(&mut c, GateKind::Input);
        wire(&mut c, input, not, 0);
        wire(&mut c, not, out, 0);

        let schedule = Schedule::build(&c);
        assert!(schedule.is_acyclic());
        let order: Vec<GateId> = schedule.components.iter().map(|c| c.gates[0]).collect();
        assert_eq!(order, vec![input, not, out]);
    }

    #[test]
    fn test_cross_coupled_pair_is_one_component() {
        let mut c = Circuit::new();
        let s = add(&mut c, GateKind::Input);
        let q = add(&mut c, GateKind::Nand);
        let qn = add(&mut c, GateKind::Nand);
        let out = add(&mut c, GateKind::Output);
        wire(&mut c, s, q, 0);
        wire(&mut c, qn, q, 1);
        wire(&mut c, q, qn, 0);
        wire(&mut c, q, out, 0);

        let schedule = Schedule::build(&c);
        assert_eq!(schedule.cyclic_count(), 1);
        let gates: Vec<Vec<GateId>> = schedule
            .components
            .iter()
            .map(|c| c.gates.clone())
            .collect();
        assert_eq!(gates, vec![vec![s], vec![q, qn], vec![out]]);
    }

    #[test]
    fn test_self_loop_is_cyclic() {
        let mut c = Circuit::new();
        let not = add(&mut c, GateKind::Not);
        wire(&mut c, not, not, 0);
        let schedule = Schedule::build(&c);
        assert_eq!(schedule.components.len(), 1);
        assert!(schedule.components[0].cyclic);
    }

    #[test]
    fn test_long_chain_does_not_recurse() {
        let mut c = Circuit::new();
        let mut prev = add(&mut c, GateKind::Input);
        for _ in 0..20_000 {
            let next = add(&mut c, GateKind::Not);
            wire(&mut c, prev, next, 0);
            prev = next;
        }
        let schedule = Schedule::build(&c);
        assert_eq!(schedule.components.len(), 20_001);
        assert!(schedule.is_acyclic());
    }
}
