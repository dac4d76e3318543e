//! The command/query surface a host drives.
//!
//! Every structural command runs against a copy of the current workbench:
//! the copy is validated (any error rejects the command and nothing
//! changes), evaluated, committed as a new history entry, and only then are
//! events fired. Signal-level commands (`set_input_value`, `tick`) update the
//! present state without an undo step.

use log::{debug, info};
use serde::ser::SerializeSeq;
use serde::{Serialize, Serializer};

use crate::circuit::{
    validate_circuit, Circuit, Gate, GateId, GateKind, Placement, SignalMap, SlotRef, TemplateId,
    WireId,
};
use crate::diagnostic::{first_error, Diagnostic};
use crate::error::{LogicboxError, Result};
use crate::events::{Event, EventBus, SubscriptionId};
use crate::history::{History, DEFAULT_HISTORY_CAPACITY};
use crate::interchange;
use crate::solver::{Evaluator, EvaluatorConfig, Strategy};
use crate::subcircuit::{promote_selection, Promotion, Registry, Selection, SubcircuitTemplate};

/// Configuration for a session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Undo steps kept
    pub history_capacity: usize,
    pub evaluator: EvaluatorConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            evaluator: EvaluatorConfig::default(),
        }
    }
}

impl SessionConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_history_capacity(mut self, capacity: usize) -> Self {
        self.history_capacity = capacity;
        self
    }

    pub fn with_evaluator(mut self, evaluator: EvaluatorConfig) -> Self {
        self.evaluator = evaluator;
        self
    }

    /// Shorthand for setting the evaluator's subcircuit strategy.
    pub fn with_strategy(mut self, strategy: Strategy) -> Self {
        self.evaluator = self.evaluator.with_strategy(strategy);
        self
    }
}

/// Everything one history entry captures.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Workbench {
    pub circuit: Circuit,
    pub registry: Registry,
    /// Validation and evaluation findings for `circuit`
    pub diagnostics: Vec<Diagnostic>,
}

/// Read-only view returned by every command.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    #[serde(serialize_with = "signal_list")]
    pub signals: SignalMap,
    pub diagnostics: Vec<Diagnostic>,
    pub undo_depth: usize,
    pub redo_depth: usize,
}

#[derive(Serialize)]
struct Signal {
    gate: GateId,
    slot: usize,
    value: bool,
}

/// Slot keys are not strings, so signals go out as a list.
fn signal_list<S: Serializer>(signals: &SignalMap, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    let mut seq = serializer.serialize_seq(Some(signals.len()))?;
    for (slot, value) in signals {
        seq.serialize_element(&Signal {
            gate: slot.gate,
            slot: slot.slot,
            value: *value,
        })?;
    }
    seq.end()
}

/// An editing session over one working circuit and its templates.
#[derive(Debug)]
pub struct Session {
    history: History<Workbench>,
    evaluator: Evaluator,
    events: EventBus,
    running: bool,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    /// Create an empty session with default configuration.
    pub fn new() -> Self {
        Self::with_config(SessionConfig::default())
    }

    pub fn with_config(config: SessionConfig) -> Self {
        Self {
            history: History::with_capacity(Workbench::default(), config.history_capacity),
            evaluator: Evaluator::with_config(config.evaluator),
            events: EventBus::new(),
            running: false,
        }
    }

    /// Start from an existing circuit and registry (no undo step).
    pub fn from_parts(circuit: Circuit, registry: Registry, config: SessionConfig) -> Result<Self> {
        let mut session = Self::with_config(config);
        let workbench = session.history.present_mut();
        workbench.circuit = circuit;
        workbench.registry = registry;
        session.check_present()?;
        session.refresh();
        Ok(session)
    }

    pub fn subscribe(&mut self, listener: impl FnMut(&Event) + 'static) -> SubscriptionId {
        self.events.subscribe(listener)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.events.unsubscribe(id)
    }

    // ============ Queries ============

    pub fn circuit(&self) -> &Circuit {
        &self.history.present().circuit
    }

    pub fn registry(&self) -> &Registry {
        &self.history.present().registry
    }

    pub fn signals(&self) -> SignalMap {
        self.circuit().signals()
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.history.present().diagnostics
    }

    pub fn undo_depth(&self) -> usize {
        self.history.undo_depth()
    }

    pub fn redo_depth(&self) -> usize {
        self.history.redo_depth()
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            signals: self.signals(),
            diagnostics: self.diagnostics().to_vec(),
            undo_depth: self.undo_depth(),
            redo_depth: self.redo_depth(),
        }
    }

    /// The workbench as an interchange document.
    pub fn export_document(&self) -> Result<String> {
        interchange::export(self.circuit(), self.registry())
    }

    // ============ Graph commands ============

    /// Place a gate. A SUBCIRCUIT gate without internals is instantiated
    /// from the registry.
    pub fn add_gate(&mut self, gate: Gate) -> Result<(GateId, Snapshot)> {
        self.commit(|wb| {
            let gate = match gate.kind {
                GateKind::Subcircuit(template) if gate.nested().is_none() => {
                    let mut instance = wb.registry.instantiate(template, gate.placement)?;
                    instance.label = gate.label;
                    instance
                }
                _ => gate,
            };
            let kind = gate.kind;
            let id = wb.circuit.add_gate(gate)?;
            Ok((id, vec![Event::GatePlaced { gate: id, kind }]))
        })
    }

    /// Remove a gate and every wire attached to it.
    pub fn remove_gate(&mut self, gate: GateId) -> Result<Snapshot> {
        self.commit(|wb| {
            let (_, wires) = wb.circuit.remove_gate(gate)?;
            let mut events: Vec<Event> = wires
                .iter()
                .map(|w| Event::WireDisconnected { wire: w.id })
                .collect();
            events.push(Event::GateRemoved { gate });
            Ok(((), events))
        })
        .map(|(_, snapshot)| snapshot)
    }

    pub fn add_wire(&mut self, from: SlotRef, to: SlotRef) -> Result<(WireId, Snapshot)> {
        self.commit(|wb| {
            let id = wb.circuit.add_wire(from, to)?;
            Ok((id, vec![Event::WireConnected { wire: id }]))
        })
    }

    pub fn remove_wire(&mut self, wire: WireId) -> Result<Snapshot> {
        self.commit(|wb| {
            wb.circuit.remove_wire(wire)?;
            Ok(((), vec![Event::WireDisconnected { wire }]))
        })
        .map(|(_, snapshot)| snapshot)
    }

    // ============ Signal commands ============

    /// Set an INPUT gate and re-evaluate. Does not add an undo step.
    pub fn set_input_value(&mut self, gate: GateId, value: bool) -> Result<Snapshot> {
        let changed = self.history.present_mut().circuit.set_input(gate, value)?;
        if changed {
            self.refresh();
        }
        Ok(self.snapshot())
    }

    /// Flip every clock and re-evaluate. Does not add an undo step.
    pub fn tick(&mut self) -> Snapshot {
        let flipped = self.history.present_mut().circuit.tick_clocks();
        debug!("tick flipped {flipped} clocks");
        self.refresh();
        self.snapshot()
    }

    /// Mark the host's clock loop as running. Ticks are still driven by
    /// the host.
    pub fn start_simulation(&mut self) -> Snapshot {
        if !self.running {
            self.running = true;
            self.events.publish(&Event::SimulationStarted);
        }
        self.snapshot()
    }

    pub fn stop_simulation(&mut self) -> Snapshot {
        if self.running {
            self.running = false;
            self.events.publish(&Event::SimulationStopped);
        }
        self.snapshot()
    }

    // ============ History ============

    /// Step back one structural change. A no-op with nothing to undo.
    pub fn undo(&mut self) -> Snapshot {
        if self.history.undo() {
            debug!("undo, {} steps left", self.history.undo_depth());
        }
        self.snapshot()
    }

    /// Re-apply an undone change. A no-op with nothing to redo.
    pub fn redo(&mut self) -> Snapshot {
        if self.history.redo() {
            debug!("redo, {} steps left", self.history.redo_depth());
        }
        self.snapshot()
    }

    // ============ Templates ============

    /// Replace the selection with an instance of a new template.
    pub fn promote_selection(
        &mut self,
        selection: &Selection,
        name: &str,
    ) -> Result<(Promotion, Snapshot)> {
        self.commit(|wb| {
            let promotion = promote_selection(&mut wb.circuit, &mut wb.registry, selection, name)?;
            let events = vec![
                Event::TemplateRegistered {
                    template: promotion.template,
                },
                Event::SubcircuitCreated {
                    template: promotion.template,
                    instance: promotion.instance,
                },
            ];
            Ok((promotion, events))
        })
    }

    /// Promote `gates`, classifying their wires automatically.
    pub fn promote_gates(
        &mut self,
        gates: impl IntoIterator<Item = GateId>,
        name: &str,
    ) -> Result<(Promotion, Snapshot)> {
        let selection = Selection::from_gates(self.circuit(), gates);
        self.promote_selection(&selection, name)
    }

    pub fn instantiate_template(
        &mut self,
        template: TemplateId,
        placement: Placement,
    ) -> Result<(GateId, Snapshot)> {
        self.add_gate(Gate::new(GateKind::Subcircuit(template), placement))
    }

    pub fn register_template(
        &mut self,
        template: SubcircuitTemplate,
    ) -> Result<(TemplateId, Snapshot)> {
        self.commit(|wb| {
            let id = wb.registry.register(template)?;
            Ok((id, vec![Event::TemplateRegistered { template: id }]))
        })
    }

    /// Remove a template no gate of this session uses.
    pub fn unregister_template(&mut self, template: TemplateId) -> Result<Snapshot> {
        self.commit(|wb| {
            wb.registry.unregister(template, &[&wb.circuit])?;
            Ok(((), vec![Event::TemplateUnregistered { template }]))
        })
        .map(|(_, snapshot)| snapshot)
    }

    /// Replace a template and re-sync every instance of it.
    ///
    /// Wires on instance slots the new signature no longer has are removed.
    pub fn edit_template(
        &mut self,
        template: TemplateId,
        edited: SubcircuitTemplate,
    ) -> Result<Snapshot> {
        self.commit(|wb| {
            wb.registry.update(template, edited)?;
            let mut events = Vec::new();
            for id in embedding(&wb.registry, template) {
                let nested = wb
                    .registry
                    .get(id)
                    .map(|t| t.circuit.clone())
                    .ok_or(LogicboxError::UnresolvedTemplate { template: id })?;
                events.extend(
                    wb.circuit
                        .resync_instances(id, &nested)
                        .into_iter()
                        .map(|w| Event::WireDisconnected { wire: w.id }),
                );
            }
            events.push(Event::TemplateRegistered { template });
            Ok(((), events))
        })
        .map(|(_, snapshot)| snapshot)
    }

    /// Replace the whole workbench with a parsed document (one undo step).
    pub fn load_document(&mut self, input: &str) -> Result<Snapshot> {
        let (circuit, registry) = interchange::parse(input)?;
        self.commit(|wb| {
            let events = registry
                .templates()
                .filter_map(|t| t.id)
                .map(|template| Event::TemplateRegistered { template })
                .collect();
            wb.circuit = circuit;
            wb.registry = registry;
            Ok(((), events))
        })
        .map(|(_, snapshot)| snapshot)
    }

    // ============ Internals ============

    fn commit<T>(
        &mut self,
        apply: impl FnOnce(&mut Workbench) -> Result<(T, Vec<Event>)>,
    ) -> Result<(T, Snapshot)> {
        let mut draft = self.history.present().clone();
        let (value, events) = apply(&mut draft)?;

        let mut diagnostics = validate_circuit(&draft.circuit, &draft.registry);
        if let Some(error) = first_error(&diagnostics) {
            debug!("rejected: {error}");
            return Err(error.to_error("working circuit"));
        }
        let report = self.evaluator.evaluate(&mut draft.circuit);
        diagnostics.extend(report.diagnostics);
        draft.diagnostics = diagnostics;

        self.history.record(draft);
        for event in &events {
            self.events.publish(event);
        }
        Ok((value, self.snapshot()))
    }

    fn check_present(&self) -> Result<()> {
        let workbench = self.history.present();
        let diagnostics = validate_circuit(&workbench.circuit, &workbench.registry);
        match first_error(&diagnostics) {
            Some(error) => Err(error.to_error("working circuit")),
            None => Ok(()),
        }
    }

    /// Re-validate and re-evaluate the present state in place.
    fn refresh(&mut self) {
        let workbench = self.history.present_mut();
        let mut diagnostics = validate_circuit(&workbench.circuit, &workbench.registry);
        let report = self.evaluator.evaluate(&mut workbench.circuit);
        if !report.oscillating.is_empty() {
            info!("{} gates oscillating", report.oscillating.len());
        }
        diagnostics.extend(report.diagnostics);
        workbench.diagnostics = diagnostics;
    }
}

/// `template` followed by every template that embeds it, directly or
/// transitively.
fn embedding(registry: &Registry, template: TemplateId) -> Vec<TemplateId> {
    let mut found = vec![template];
    let mut next = 0;
    while next < found.len() {
        let current = found[next];
        next += 1;
        for t in registry.templates() {
            if let Some(id) = t.id {
                if !found.contains(&id) && t.circuit.references(current) > 0 {
                    found.push(id);
                }
            }
        }
    }
    found
}
