//! Main evaluator interface.

use log::{debug, trace, warn};

use crate::circuit::{Circuit, GateId, GateKind};
use crate::diagnostic::{Diagnostic, DiagnosticKind, Location};
use crate::error::LogicboxError;
use crate::subcircuit::flatten;

use super::order::Schedule;
use super::relaxation::{FeedbackSeed, Outcome, Relaxation};
use super::{DEFAULT_ITERATIONS_PER_GATE, DEFAULT_MIN_ITERATIONS};

/// How subcircuit instances are evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Strategy {
    /// Each instance evaluates its own nested circuit recursively
    #[default]
    BlackBox,
    /// Instances are inlined into one scratch graph which is evaluated as a whole
    Flatten,
}

/// Configuration for the evaluator.
#[derive(Debug, Clone)]
pub struct EvaluatorConfig {
    pub strategy: Strategy,
    /// Lower bound on the relaxation cap for feedback loops.
    pub min_iterations: usize,
    /// Relaxation cap growth per gate in a feedback loop.
    pub iterations_per_gate: usize,
    /// Starting values for feedback loops.
    pub seed: FeedbackSeed,
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self {
            strategy: Strategy::default(),
            min_iterations: DEFAULT_MIN_ITERATIONS,
            iterations_per_gate: DEFAULT_ITERATIONS_PER_GATE,
            seed: FeedbackSeed::default(),
        }
    }
}

impl EvaluatorConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the subcircuit strategy.
    pub fn with_strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Set the iteration cap parameters.
    ///
    /// A loop of `n` gates gets `max(min_iterations, per_gate * n)` scans
    /// before it is declared oscillating.
    pub fn with_iteration_cap(mut self, min_iterations: usize, per_gate: usize) -> Self {
        self.min_iterations = min_iterations;
        self.iterations_per_gate = per_gate;
        self
    }

    /// Set the feedback seed.
    pub fn with_seed(mut self, seed: FeedbackSeed) -> Self {
        self.seed = seed;
        self
    }
}

/// Summary of one evaluation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Report {
    pub diagnostics: Vec<Diagnostic>,
    /// Components in the schedule (top level only)
    pub components: usize,
    pub cyclic_components: usize,
    /// Relaxation scans spent on feedback loops (top level only)
    pub iterations: usize,
    /// Gates of top-level loops that hit the iteration cap
    pub oscillating: Vec<GateId>,
}

impl Report {
    /// Whether every loop, nested ones included, reached a fixed point.
    pub fn is_settled(&self) -> bool {
        !self
            .diagnostics
            .iter()
            .any(|d| matches!(d.kind, DiagnosticKind::Oscillating { .. }))
    }
}

/// Computes stable signal values for a circuit.
#[derive(Debug, Clone, Default)]
pub struct Evaluator {
    config: EvaluatorConfig,
}

impl Evaluator {
    /// Create an evaluator with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an evaluator with custom configuration.
    pub fn with_config(config: EvaluatorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EvaluatorConfig {
        &self.config
    }

    fn relaxation(&self) -> Relaxation {
        Relaxation {
            min_iterations: self.config.min_iterations,
            iterations_per_gate: self.config.iterations_per_gate,
            seed: self.config.seed,
        }
    }

    /// Bring every gate and wire of `circuit` to its stable value.
    ///
    /// CLOCK and INPUT gates are never changed. Feedback loops that do not
    /// settle are reported, not fatal.
    pub fn evaluate(&self, circuit: &mut Circuit) -> Report {
        match self.config.strategy {
            Strategy::BlackBox => self.evaluate_black_box(circuit),
            Strategy::Flatten => self.evaluate_flattened(circuit),
        }
    }

    fn evaluate_flattened(&self, circuit: &mut Circuit) -> Report {
        let mut flat = match flatten(circuit) {
            Ok(flat) => flat,
            Err(err) => {
                warn!("flattening failed, evaluating instances one by one: {err}");
                let mut report = self.evaluate_black_box(circuit);
                let (kind, location) = match &err {
                    LogicboxError::UnresolvedTemplate { template } => (
                        DiagnosticKind::UnresolvedTemplate {
                            template: *template,
                        },
                        Location::Template {
                            template: *template,
                        },
                    ),
                    _ => (DiagnosticKind::ArityMismatch, Location::Circuit),
                };
                report.diagnostics.insert(
                    0,
                    Diagnostic::error(kind, location, format!("could not flatten: {err}")),
                );
                return report;
            }
        };
        debug!(
            "flattened {} gates into {}",
            circuit.gate_count(),
            flat.circuit().gate_count()
        );

        let mut report = self.evaluate_black_box(flat.circuit_mut());
        flat.write_back(circuit);

        for diagnostic in &mut report.diagnostics {
            if let Location::Gate { gate } = diagnostic.location {
                if let Some(origin) = flat.origin(gate) {
                    diagnostic.location = Location::Gate { gate: origin };
                }
            }
        }
        let mut oscillating: Vec<GateId> = report
            .oscillating
            .iter()
            .filter_map(|gate| flat.origin(*gate))
            .collect();
        oscillating.sort_unstable();
        oscillating.dedup();
        report.oscillating = oscillating;
        report
    }

    /// Evaluate with every instance treated as an opaque gate.
    pub fn evaluate_black_box(&self, circuit: &mut Circuit) -> Report {
        let schedule = Schedule::build(circuit);
        let mut report = Report {
            components: schedule.components.len(),
            cyclic_components: schedule.cyclic_count(),
            ..Report::default()
        };
        let relaxation = self.relaxation();

        for component in &schedule.components {
            if !component.cyclic {
                let id = component.gates[0];
                let inputs = circuit.input_values(id);
                let values = self.fire(circuit, id, &inputs, &mut report.diagnostics);
                if let Some(gate) = circuit.gate_mut(id) {
                    gate.set_values(&values);
                }
                continue;
            }

            let outcome = relaxation.run(
                circuit,
                &component.gates,
                &mut report.diagnostics,
                |c, id, inputs, diagnostics| self.fire(c, id, inputs, diagnostics),
            );
            report.iterations += outcome.iterations();
            match outcome {
                Outcome::Settled { iterations } => {
                    trace!(
                        "loop at {} settled after {iterations} scans",
                        component.gates[0]
                    );
                }
                Outcome::Oscillating { iterations } => {
                    warn!(
                        "loop of {} gates at {} oscillates, holding last scan",
                        component.gates.len(),
                        component.gates[0]
                    );
                    report.diagnostics.push(Diagnostic::warning(
                        DiagnosticKind::Oscillating { iterations },
                        Location::Gate {
                            gate: component.gates[0],
                        },
                        format!(
                            "feedback loop of {} gates did not settle within {iterations} iterations",
                            component.gates.len()
                        ),
                    ));
                    report.oscillating.extend(&component.gates);
                }
            }
        }

        circuit.sync_wires();
        report
    }

    /// Next output values of one gate given its input values.
    fn fire(
        &self,
        circuit: &mut Circuit,
        id: GateId,
        inputs: &[bool],
        diagnostics: &mut Vec<Diagnostic>,
    ) -> Vec<bool> {
        let Some(gate) = circuit.gate(id) else {
            return Vec::new();
        };
        match gate.kind {
            GateKind::Input | GateKind::Clock => gate.values().to_vec(),
            GateKind::Subcircuit(_) => self.fire_instance(circuit, id, inputs, diagnostics),
            kind => vec![kind.logic(inputs).unwrap_or(false)],
        }
    }

    /// Bind the instance inputs to the nested INPUT placeholders, evaluate
    /// the nested circuit and read its OUTPUT placeholders.
    fn fire_instance(
        &self,
        circuit: &mut Circuit,
        id: GateId,
        inputs: &[bool],
        diagnostics: &mut Vec<Diagnostic>,
    ) -> Vec<bool> {
        let Some(gate) = circuit.gate_mut(id) else {
            return Vec::new();
        };
        let outputs = gate.output_count();
        let Some(nested) = gate.nested_mut() else {
            return vec![false; outputs];
        };

        for (k, placeholder) in nested.input_placeholders().into_iter().enumerate() {
            let value = inputs.get(k).copied().unwrap_or(false);
            if let Some(input) = nested.gate_mut(placeholder) {
                input.set_values(&[value]);
            }
        }

        let inner = self.evaluate_black_box(nested);
        diagnostics.extend(inner.diagnostics.into_iter().map(|mut d| {
            d.message = format!("inside {id} at {}: {}", d.location, d.message);
            d.location = Location::Gate { gate: id };
            d
        }));

        nested
            .output_placeholders()
            .into_iter()
            .map(|placeholder| nested.gate(placeholder).map_or(false, |g| g.value(0)))
            .collect()
    }
}
