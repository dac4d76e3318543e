//! Fixed-point relaxation for feedback loops.

use crate::circuit::{Circuit, GateId};
use crate::diagnostic::Diagnostic;

use super::{DEFAULT_ITERATIONS_PER_GATE, DEFAULT_MIN_ITERATIONS};

/// Where a cyclic component starts relaxing from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FeedbackSeed {
    /// Start from the component's current values (0 for fresh gates), so
    /// latches keep their stored bit across evaluations. Results then depend
    /// on what the loop held before, not only on the graph and its inputs.
    #[default]
    Retained,
    /// Reset the component to 0 before every relaxation
    Zero,
}

/// How a relaxation ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// A full scan changed nothing
    Settled { iterations: usize },
    /// The cap was reached; the component holds the last scan's values
    Oscillating { iterations: usize },
}

impl Outcome {
    pub fn iterations(&self) -> usize {
        match self {
            Outcome::Settled { iterations } | Outcome::Oscillating { iterations } => *iterations,
        }
    }
}

/// Relaxation solver for cyclic components.
///
/// Every scan evaluates all members from the values of the previous scan
/// and commits the results together, in ascending id order.
#[derive(Debug, Clone)]
pub struct Relaxation {
    /// Lower bound on the iteration cap
    pub min_iterations: usize,
    /// Cap growth per member gate
    pub iterations_per_gate: usize,
    pub seed: FeedbackSeed,
}

impl Default for Relaxation {
    fn default() -> Self {
        Self::new()
    }
}

impl Relaxation {
    pub fn new() -> Self {
        Self {
            min_iterations: DEFAULT_MIN_ITERATIONS,
            iterations_per_gate: DEFAULT_ITERATIONS_PER_GATE,
            seed: FeedbackSeed::default(),
        }
    }

    /// Iteration cap for a component of `size` gates.
    pub fn cap(&self, size: usize) -> usize {
        self.min_iterations
            .max(self.iterations_per_gate.saturating_mul(size))
            .max(1)
    }

    /// Relax `component` to a fixed point or give up at the cap.
    ///
    /// `fire` computes a gate's next output values from its input values;
    /// diagnostics it reports during the final scan are appended to
    /// `diagnostics`.
    pub fn run<F>(
        &self,
        circuit: &mut Circuit,
        component: &[GateId],
        diagnostics: &mut Vec<Diagnostic>,
        mut fire: F,
    ) -> Outcome
    where
        F: FnMut(&mut Circuit, GateId, &[bool], &mut Vec<Diagnostic>) -> Vec<bool>,
    {
        if self.seed == FeedbackSeed::Zero {
            for id in component {
                if let Some(gate) = circuit.gate_mut(*id) {
                    gate.set_values(&[]);
                }
            }
        }

        let cap = self.cap(component.len());
        let mut scan_diagnostics = Vec::new();
        for iteration in 1..=cap {
            scan_diagnostics.clear();
            let inputs: Vec<Vec<bool>> = component
                .iter()
                .map(|id| circuit.input_values(*id))
                .collect();

            let mut next = Vec::with_capacity(component.len());
            for (id, values) in component.iter().zip(&inputs) {
                next.push(fire(circuit, *id, values, &mut scan_diagnostics));
            }

            let mut changed = false;
            for (id, values) in component.iter().zip(&next) {
                if let Some(gate) = circuit.gate_mut(*id) {
                    changed |= gate.set_values(values);
                }
            }

            if !changed {
                diagnostics.append(&mut scan_diagnostics);
                return Outcome::Settled {
                    iterations: iteration,
                };
            }
        }

        diagnostics.append(&mut scan_diagnostics);
        Outcome::Oscillating { iterations: cap }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit::{Gate, GateKind, Placement, SlotRef};

    fn logic(circuit: &mut Circuit, id: GateId, inputs: &[bool], _: &mut Vec<Diagnostic>) -> Vec<bool> {
        let kind = circuit.gate(id).map(|g| g.kind).unwrap_or(GateKind::Input);
        vec![kind.logic(inputs).unwrap_or(false)]
    }

    fn ring(size: usize) -> (Circuit, Vec<GateId>) {
        let mut c = Circuit::new();
        let gates: Vec<GateId> = (0..size)
            .map(|_| c.add_gate(Gate::new(GateKind::Not, Placement::default())).unwrap())
            .collect();
        for i in 0..size {
            c.add_wire(
                SlotRef::new(gates[i], 0),
                SlotRef::new(gates[(i + 1) % size], 0),
            )
            .unwrap();
        }
        (c, gates)
    }

    #[test]
    fn test_cap_scales_with_size() {
        let r = Relaxation::new();
        assert_eq!(r.cap(1), DEFAULT_MIN_ITERATIONS);
        assert_eq!(r.cap(100), 100 * DEFAULT_ITERATIONS_PER_GATE);
    }

    #[test]
    fn test_inverter_pair_from_zero_oscillates() {
        let (mut c, gates) = ring(2);
        let mut diagnostics = Vec::new();
        let outcome = Relaxation::new().run(&mut c, &gates, &mut diagnostics, logic);
        assert_eq!(outcome, Outcome::Oscillating {
            iterations: DEFAULT_MIN_ITERATIONS
        });
        // an even number of scans from 0/0 lands back on 0/0
        assert!(!c.gate(gates[0]).unwrap().value(0));
        assert!(!c.gate(gates[1]).unwrap().value(0));
    }

    #[test]
    fn test_inverter_pair_from_consistent_state_settles() {
        let (mut c, gates) = ring(2);
        c.gate_mut(gates[0]).unwrap().set_values(&[true]);
        let mut diagnostics = Vec::new();
        let outcome = Relaxation::new().run(&mut c, &gates, &mut diagnostics, logic);
        assert_eq!(outcome, Outcome::Settled { iterations: 1 });
        assert!(c.gate(gates[0]).unwrap().value(0));
        assert!(!c.gate(gates[1]).unwrap().value(0));
    }

    #[test]
    fn test_zero_seed_discards_stored_state() {
        let (mut c, gates) = ring(2);
        c.gate_mut(gates[0]).unwrap().set_values(&[true]);
        let relaxation = Relaxation {
            seed: FeedbackSeed::Zero,
            ..Relaxation::new()
        };
        let mut diagnostics = Vec::new();
        let outcome = relaxation.run(&mut c, &gates, &mut diagnostics, logic);
        assert!(matches!(outcome, Outcome::Oscillating { .. }));
        // the stored 1 was discarded: relaxing from 0/0 swings both gates together
        assert_eq!(
            c.gate(gates[0]).unwrap().value(0),
            c.gate(gates[1]).unwrap().value(0)
        );
    }

    #[test]
    fn test_three_ring_never_settles() {
        let (mut c, gates) = ring(3);
        c.gate_mut(gates[0]).unwrap().set_values(&[true]);
        let relaxation = Relaxation {
            min_iterations: 5,
            iterations_per_gate: 1,
            ..Relaxation::new()
        };
        let mut diagnostics = Vec::new();
        let outcome = relaxation.run(&mut c, &gates, &mut diagnostics, logic);
        assert_eq!(outcome.iterations(), 5);
        assert!(matches!(outcome, Outcome::Oscillating { .. }));
    }

    #[test]
    fn test_odd_cap_holds_last_scan() {
        let (mut c, gates) = ring(3);
        let relaxation = Relaxation {
            min_iterations: 5,
            iterations_per_gate: 1,
            seed: FeedbackSeed::Zero,
        };
        let mut diagnostics = Vec::new();
        let outcome = relaxation.run(&mut c, &gates, &mut diagnostics, logic);
        assert_eq!(outcome, Outcome::Oscillating { iterations: 5 });
        // scans alternate 1/1/1 and 0/0/0; the fifth computed 1/1/1
        for id in &gates {
            assert!(c.gate(*id).unwrap().value(0));
        }
    }
}
