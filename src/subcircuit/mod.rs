//! Reusable subcircuits.
//!
//! - [`SubcircuitTemplate`] - a named circuit with a port signature
//! - [`Registry`] - published templates and instantiation
//! - [`flatten`] - inlining instances into one primitive graph
//! - [`promote_selection`] - turning selected gates into a template instance

mod flatten;
mod promote;
mod registry;
mod template;

pub use flatten::{flatten, Flattened};
pub use promote::{promote_selection, Promotion, Selection};
pub use registry::Registry;
pub use template::{Port, PortDirection, SubcircuitTemplate};
