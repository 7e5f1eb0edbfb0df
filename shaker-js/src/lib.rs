//! Liveness-based dead code elimination for ES modules.
//!
//! [`build_graph`] walks a module once and records which syntax nodes each node needs in order to
//! evaluate. [`shake`] seeds the requested exports, marks everything reachable and sweeps the rest,
//! reporting which names are still needed from every imported module.

pub mod graph;
pub mod scope;
pub mod shake;

pub use graph::build_graph;
pub use graph::DependencyGraph;
pub use graph::ImportRecord;
pub use shake::shake;
pub use shake::shake_with_graph;
pub use shake::ShakeOptions;
pub use shake::ShakeResult;
pub use shake::WILDCARD;
