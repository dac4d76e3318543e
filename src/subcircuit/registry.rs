//! Published template storage and instantiation.

use std::collections::BTreeMap;
use std::sync::Arc;

use log::{debug, info};

use super::SubcircuitTemplate;
use crate::circuit::{validate_template, Circuit, Gate, GateKind, Placement, TemplateId};
use crate::diagnostic::first_error;
use crate::error::{LogicboxError, Result};

/// The set of published templates.
///
/// Templates are immutable once registered and shared through `Arc`, so
/// cloning a registry (for a history snapshot) never copies a circuit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Registry {
    templates: BTreeMap<TemplateId, Arc<SubcircuitTemplate>>,
    next_id: usize,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    pub fn contains(&self, id: TemplateId) -> bool {
        self.templates.contains_key(&id)
    }

    pub fn get(&self, id: TemplateId) -> Option<&Arc<SubcircuitTemplate>> {
        self.templates.get(&id)
    }

    /// Templates in ascending id order.
    pub fn templates(&self) -> impl Iterator<Item = &Arc<SubcircuitTemplate>> {
        self.templates.values()
    }

    /// Validate and publish a template.
    ///
    /// The template's own id is kept when present and free; otherwise a
    /// fresh id is assigned. Returns the id it was published under.
    pub fn register(&mut self, mut template: SubcircuitTemplate) -> Result<TemplateId> {
        let id = match template.id {
            Some(id) if !self.templates.contains_key(&id) => id,
            _ => self.fresh_id(),
        };
        template.id = Some(id);
        self.admit(id, template)?;
        info!("registered template {}", self.templates[&id].display_name());
        Ok(id)
    }

    /// Replace a published template (the explicit edit path).
    ///
    /// Runs the full validation again, so an edit that makes the template
    /// reach itself through another template is rejected.
    pub fn update(&mut self, id: TemplateId, mut template: SubcircuitTemplate) -> Result<()> {
        if !self.templates.contains_key(&id) {
            return Err(LogicboxError::UnresolvedTemplate { template: id });
        }
        template.id = Some(id);
        self.admit(id, template)?;
        info!("updated template {}", self.templates[&id].display_name());
        self.propagate(id);
        Ok(())
    }

    /// Re-sync the nested copies inside every template that embeds
    /// `edited`, directly or transitively.
    fn propagate(&mut self, edited: TemplateId) {
        let mut queue = vec![edited];
        while let Some(changed) = queue.pop() {
            let Some(source) = self.templates.get(&changed).map(|t| t.circuit.clone()) else {
                continue;
            };
            let dependents: Vec<TemplateId> = self
                .templates
                .iter()
                .filter(|(_, t)| t.circuit.references(changed) > 0)
                .map(|(id, _)| *id)
                .collect();
            for dependent in dependents {
                let Some(current) = self.templates.get(&dependent) else {
                    continue;
                };
                let mut refreshed = SubcircuitTemplate::clone(current);
                let dropped = refreshed.circuit.resync_instances(changed, &source);
                debug!(
                    "re-synced {} after edit of {changed}, dropped {} wires",
                    refreshed.display_name(),
                    dropped.len()
                );
                self.templates.insert(dependent, Arc::new(refreshed));
                queue.push(dependent);
            }
        }
    }

    fn admit(&mut self, id: TemplateId, mut template: SubcircuitTemplate) -> Result<()> {
        self.hydrate(&mut template.circuit);
        let diagnostics = validate_template(&template, self);
        if let Some(error) = first_error(&diagnostics) {
            return Err(error.to_error(&template.display_name()));
        }
        self.next_id = self.next_id.max(id.0 + 1);
        self.templates.insert(id, Arc::new(template));
        Ok(())
    }

    fn fresh_id(&self) -> TemplateId {
        let mut id = self.next_id;
        while self.templates.contains_key(&TemplateId(id)) {
            id += 1;
        }
        TemplateId(id)
    }

    /// Give every subcircuit gate lacking internals its own copy of them.
    fn hydrate(&self, circuit: &mut Circuit) {
        for gate in circuit.gates_mut() {
            let GateKind::Subcircuit(template_id) = gate.kind else {
                continue;
            };
            if gate.nested().is_some() {
                continue;
            }
            if let Some(template) = self.templates.get(&template_id) {
                debug!("hydrating {} with {}", gate.id(), template.display_name());
                gate.attach_nested(template.circuit.clone());
            }
        }
    }

    /// Create a subcircuit gate for `id`, not yet placed in any circuit.
    ///
    /// Slot counts equal the template's port counts, in port order.
    pub fn instantiate(&self, id: TemplateId, placement: Placement) -> Result<Gate> {
        let template = self
            .templates
            .get(&id)
            .ok_or(LogicboxError::UnresolvedTemplate { template: id })?;
        Ok(Gate::subcircuit(id, template.circuit.clone(), placement))
    }

    /// Remove a template.
    ///
    /// Fails while any registered template or any of the `live` circuits
    /// (the open sessions' working graphs) still instantiates it.
    pub fn unregister(
        &mut self,
        id: TemplateId,
        live: &[&Circuit],
    ) -> Result<Arc<SubcircuitTemplate>> {
        if !self.templates.contains_key(&id) {
            return Err(LogicboxError::UnresolvedTemplate { template: id });
        }
        let references: usize = self
            .templates
            .values()
            .map(|t| t.circuit.references(id))
            .chain(live.iter().map(|c| c.references(id)))
            .sum();
        if references > 0 {
            return Err(LogicboxError::TemplateInUse {
                template: id,
                references,
            });
        }
        let removed = self
            .templates
            .remove(&id)
            .ok_or(LogicboxError::UnresolvedTemplate { template: id })?;
        info!("unregistered template {}", removed.display_name());
        Ok(removed)
    }

    /// Number of gates across registered templates that instantiate `id`.
    pub fn references(&self, id: TemplateId) -> usize {
        self.templates
            .values()
            .map(|t| t.circuit.references(id))
            .sum()
    }
}
