//! WASM bindings for Logicbox Core.
//!
//! Every command returns the resulting snapshot as a JSON string; errors
//! surface as thrown strings and leave the sandbox unchanged.
//!
//! ## Usage (JavaScript)
//!
//! ```javascript
//! import init, { WasmSandbox } from 'logicbox_core';
//!
//! await init();
//!
//! const box = new WasmSandbox();
//! const a = box.add_gate("INPUT", 0, 0);
//! const n = box.add_gate("NOT", 100, 0);
//! box.add_wire(a, 0, n, 0);
//! const snapshot = JSON.parse(box.set_input_value(a, true));
//! ```

use wasm_bindgen::prelude::*;

use crate::circuit::{Gate, GateId, GateKind, Placement, SlotRef, TemplateId, WireId};
use crate::session::{Session, SessionConfig, Snapshot};
use crate::solver::Strategy;

/// Initialize panic hook for better error messages in browser console.
#[wasm_bindgen(start)]
pub fn init_panic_hook() {
    console_error_panic_hook::set_once();
}

fn js_error(err: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&err.to_string())
}

fn to_json(snapshot: &Snapshot) -> Result<String, JsValue> {
    serde_json::to_string(snapshot).map_err(js_error)
}

/// A browser-side editing session.
#[wasm_bindgen]
pub struct WasmSandbox {
    session: Session,
}

impl Default for WasmSandbox {
    fn default() -> Self {
        Self::new()
    }
}

#[wasm_bindgen]
impl WasmSandbox {
    #[wasm_bindgen(constructor)]
    pub fn new() -> WasmSandbox {
        WasmSandbox {
            session: Session::new(),
        }
    }

    /// Create a sandbox with custom history depth and subcircuit strategy.
    ///
    /// # Arguments
    /// * `history_capacity` - Undo steps kept (default: 50)
    /// * `flatten` - Evaluate subcircuits by inlining instead of as black boxes
    #[wasm_bindgen]
    pub fn with_config(history_capacity: usize, flatten: bool) -> WasmSandbox {
        let strategy = if flatten {
            Strategy::Flatten
        } else {
            Strategy::BlackBox
        };
        let config = SessionConfig::new()
            .with_history_capacity(history_capacity)
            .with_strategy(strategy);
        WasmSandbox {
            session: Session::with_config(config),
        }
    }

    /// Place a primitive gate (`"AND"`, `"NOT"`, `"INPUT"`, ...). Returns
    /// the new gate id.
    #[wasm_bindgen]
    pub fn add_gate(&mut self, kind: &str, x: f32, y: f32) -> Result<usize, JsValue> {
        let kind = GateKind::from_name(kind, None)
            .ok_or_else(|| js_error(format!("unknown gate kind '{kind}'")))?;
        let (id, _) = self
            .session
            .add_gate(Gate::new(kind, Placement::at(x, y)))
            .map_err(js_error)?;
        Ok(id.0)
    }

    /// Place an instance of a registered template. Returns the gate id.
    #[wasm_bindgen]
    pub fn instantiate_template(&mut self, template: usize, x: f32, y: f32) -> Result<usize, JsValue> {
        let (id, _) = self
            .session
            .instantiate_template(TemplateId(template), Placement::at(x, y))
            .map_err(js_error)?;
        Ok(id.0)
    }

    #[wasm_bindgen]
    pub fn remove_gate(&mut self, gate: usize) -> Result<String, JsValue> {
        let snapshot = self.session.remove_gate(GateId(gate)).map_err(js_error)?;
        to_json(&snapshot)
    }

    /// Connect an output slot to an input slot. Returns the wire id.
    #[wasm_bindgen]
    pub fn add_wire(
        &mut self,
        from_gate: usize,
        from_slot: usize,
        to_gate: usize,
        to_slot: usize,
    ) -> Result<usize, JsValue> {
        let (id, _) = self
            .session
            .add_wire(
                SlotRef::new(GateId(from_gate), from_slot),
                SlotRef::new(GateId(to_gate), to_slot),
            )
            .map_err(js_error)?;
        Ok(id.0)
    }

    #[wasm_bindgen]
    pub fn remove_wire(&mut self, wire: usize) -> Result<String, JsValue> {
        let snapshot = self.session.remove_wire(WireId(wire)).map_err(js_error)?;
        to_json(&snapshot)
    }

    #[wasm_bindgen]
    pub fn set_input_value(&mut self, gate: usize, value: bool) -> Result<String, JsValue> {
        let snapshot = self
            .session
            .set_input_value(GateId(gate), value)
            .map_err(js_error)?;
        to_json(&snapshot)
    }

    /// Flip every clock once. Call from the host's timer while running.
    #[wasm_bindgen]
    pub fn tick(&mut self) -> Result<String, JsValue> {
        to_json(&self.session.tick())
    }

    #[wasm_bindgen]
    pub fn start_simulation(&mut self) -> Result<String, JsValue> {
        to_json(&self.session.start_simulation())
    }

    #[wasm_bindgen]
    pub fn stop_simulation(&mut self) -> Result<String, JsValue> {
        to_json(&self.session.stop_simulation())
    }

    #[wasm_bindgen(getter)]
    pub fn running(&self) -> bool {
        self.session.is_running()
    }

    #[wasm_bindgen]
    pub fn undo(&mut self) -> Result<String, JsValue> {
        to_json(&self.session.undo())
    }

    #[wasm_bindgen]
    pub fn redo(&mut self) -> Result<String, JsValue> {
        to_json(&self.session.redo())
    }

    /// Promote the given gates into a new template. Returns
    /// `{"template": id, "instance": id}` as JSON.
    #[wasm_bindgen]
    pub fn promote_selection(&mut self, gates: Vec<usize>, name: &str) -> Result<String, JsValue> {
        let (promotion, _) = self
            .session
            .promote_gates(gates.into_iter().map(GateId), name)
            .map_err(js_error)?;
        Ok(serde_json::json!({
            "template": promotion.template,
            "instance": promotion.instance,
        })
        .to_string())
    }

    /// Register a template given as a template document. Returns its id.
    #[wasm_bindgen]
    pub fn register_template(&mut self, document: &str) -> Result<usize, JsValue> {
        let template =
            crate::interchange::parse_template(document, self.session.registry()).map_err(js_error)?;
        let (id, _) = self.session.register_template(template).map_err(js_error)?;
        Ok(id.0)
    }

    #[wasm_bindgen]
    pub fn unregister_template(&mut self, template: usize) -> Result<String, JsValue> {
        let snapshot = self
            .session
            .unregister_template(TemplateId(template))
            .map_err(js_error)?;
        to_json(&snapshot)
    }

    /// Template document for a registered template.
    #[wasm_bindgen]
    pub fn export_template(&self, template: usize) -> Result<String, JsValue> {
        let template = self
            .session
            .registry()
            .get(TemplateId(template))
            .ok_or_else(|| js_error(format!("unknown template {template}")))?;
        crate::interchange::export_template(template).map_err(js_error)
    }

    #[wasm_bindgen]
    pub fn load_document(&mut self, document: &str) -> Result<String, JsValue> {
        let snapshot = self.session.load_document(document).map_err(js_error)?;
        to_json(&snapshot)
    }

    #[wasm_bindgen]
    pub fn export_document(&self) -> Result<String, JsValue> {
        self.session.export_document().map_err(js_error)
    }

    #[wasm_bindgen]
    pub fn snapshot(&self) -> Result<String, JsValue> {
        to_json(&self.session.snapshot())
    }
}

/// Get the library version.
#[wasm_bindgen]
pub fn version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}
