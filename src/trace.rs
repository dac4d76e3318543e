//! Signal trace output for the CLI frontend.
//!
//! Writes one tab-separated line per step with the value of every OUTPUT
//! gate of the working circuit.

use std::io::Write;
use std::str::FromStr;

use crate::circuit::{Circuit, GateId, GateKind};
use crate::error::{LogicboxError, Result};
use crate::session::Session;

/// An INPUT value given as `LABEL=0|1`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stimulus {
    pub label: String,
    pub value: bool,
}

impl FromStr for Stimulus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let (label, value) = s
            .split_once('=')
            .ok_or_else(|| format!("expected LABEL=0|1, got '{s}'"))?;
        let value = match value.trim() {
            "0" => false,
            "1" => true,
            other => return Err(format!("value for '{label}' must be 0 or 1, got '{other}'")),
        };
        Ok(Self {
            label: label.trim().to_string(),
            value,
        })
    }
}

/// The INPUT gate carrying `label`.
pub fn find_input(circuit: &Circuit, label: &str) -> Result<GateId> {
    circuit
        .gates()
        .find(|g| g.kind == GateKind::Input && g.label.as_deref() == Some(label))
        .map(|g| g.id())
        .ok_or_else(|| LogicboxError::UnknownLabel {
            label: label.to_string(),
        })
}

/// Trace writer over any byte sink.
pub struct TraceWriter<W: Write> {
    out: W,
    columns: Vec<GateId>,
}

impl<W: Write> TraceWriter<W> {
    /// Columns are the circuit's OUTPUT gates in ascending id order.
    pub fn new(out: W, circuit: &Circuit) -> Self {
        Self {
            out,
            columns: circuit.output_placeholders(),
        }
    }

    pub fn write_header(&mut self, circuit: &Circuit) -> Result<()> {
        let names: Vec<String> = self
            .columns
            .iter()
            .map(|id| {
                circuit
                    .gate(*id)
                    .and_then(|g| g.label.clone())
                    .unwrap_or_else(|| id.to_string())
            })
            .collect();
        self.line(format!("step\t{}", names.join("\t")))
    }

    pub fn write_step(&mut self, step: usize, circuit: &Circuit) -> Result<()> {
        let values: Vec<&str> = self
            .columns
            .iter()
            .map(|id| match circuit.gate(*id).map(|g| g.value(0)) {
                Some(true) => "1",
                _ => "0",
            })
            .collect();
        self.line(format!("{step}\t{}", values.join("\t")))
    }

    pub fn flush(&mut self) -> Result<()> {
        self.out.flush().map_err(|e| LogicboxError::TraceOutputError {
            message: e.to_string(),
        })
    }

    fn line(&mut self, text: String) -> Result<()> {
        writeln!(self.out, "{text}").map_err(|e| LogicboxError::TraceOutputError {
            message: e.to_string(),
        })
    }
}

/// Apply `stimuli`, then print step 0 and one step per clock tick.
pub fn run_trace(
    session: &mut Session,
    stimuli: &[Stimulus],
    ticks: usize,
    out: impl Write,
) -> Result<()> {
    for stimulus in stimuli {
        let gate = find_input(session.circuit(), &stimulus.label)?;
        session.set_input_value(gate, stimulus.value)?;
    }

    let mut writer = TraceWriter::new(out, session.circuit());
    writer.write_header(session.circuit())?;
    writer.write_step(0, session.circuit())?;

    session.start_simulation();
    for step in 1..=ticks {
        session.tick();
        writer.write_step(step, session.circuit())?;
    }
    session.stop_simulation();

    writer.flush()
}
