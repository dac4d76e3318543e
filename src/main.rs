//! Logicbox - digital logic workbench
//!
//! Loads a workbench document, applies input values, and prints the value of
//! every OUTPUT gate per clock tick.
//!
//! # Usage
//!
//! ```bash
//! logicbox adder.json --set a=1 --set b=1 --ticks 4 --strategy flatten
//! ```

use std::io;
use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use log::{debug, LevelFilter};
use logicbox_core::{
    error::Result,
    history::DEFAULT_HISTORY_CAPACITY,
    interchange,
    session::{Session, SessionConfig},
    solver::Strategy,
    trace::{run_trace, Stimulus},
};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum StrategyArg {
    BlackBox,
    Flatten,
}

impl From<StrategyArg> for Strategy {
    fn from(arg: StrategyArg) -> Self {
        match arg {
            StrategyArg::BlackBox => Strategy::BlackBox,
            StrategyArg::Flatten => Strategy::Flatten,
        }
    }
}

/// Digital logic circuit workbench
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the workbench document (.json)
    #[arg(value_name = "FILE")]
    file: PathBuf,

    /// Set an INPUT gate by label before the first step
    #[arg(long = "set", value_name = "LABEL=0|1")]
    set: Vec<Stimulus>,

    /// Number of clock ticks to trace after step 0
    #[arg(short, long, default_value_t = 0)]
    ticks: usize,

    /// How subcircuit instances are evaluated
    #[arg(long, value_enum, default_value_t = StrategyArg::BlackBox)]
    strategy: StrategyArg,

    /// Undo steps kept
    #[arg(long, default_value_t = DEFAULT_HISTORY_CAPACITY)]
    history: usize,

    /// Log at debug level
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let level = if args.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Warn
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_env("LOGICBOX_LOG")
        .init();

    let (circuit, registry) = interchange::parse_file(&args.file)?;
    debug!(
        "loaded {} gates and {} templates",
        circuit.gate_count(),
        registry.len()
    );

    let config = SessionConfig::new()
        .with_history_capacity(args.history)
        .with_strategy(args.strategy.into());
    let mut session = Session::from_parts(circuit, registry, config)?;

    run_trace(&mut session, &args.set, args.ticks, io::stdout().lock())?;

    for diagnostic in session.diagnostics() {
        eprintln!("{diagnostic}");
    }

    Ok(())
}
