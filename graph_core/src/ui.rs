//! Structured run reporting (spec §4.5.4): which nodes evaluated versus loaded versus were
//! skipped, and at what call depth.
//!
//! `tracing` spans carry this structural information — node name, graph name, call depth via
//! span nesting — without committing the engine to any particular output format; `graph_cli` is
//! the one place that decides how (or whether) to render it.

use tracing::Span;

/// Opens the span covering one `call` on `node` within `graph`. Child spans/events emitted while
/// the guard is held (i.e. for the duration of dependency resolution and the evaluate/load
/// itself) are nested under it, giving the same call-depth structure `ShellIO` rendered as
/// indentation.
pub fn call_span(graph: &str, node: &str) -> Span {
    tracing::debug_span!("node_call", graph, node)
}

/// Emitted once a node's dirtiness has been decided, before `evaluate`/`load` runs (or is
/// skipped).
pub fn report_decision(node: &str, decision: Decision) {
    match decision {
        Decision::Evaluate => tracing::info!(node, decision = "evaluate", "node is dirty"),
        Decision::Load => tracing::info!(node, decision = "load", "node is clean, loading from resource"),
        Decision::Cached => tracing::debug!(node, decision = "cached", "node already clean this run"),
    }
}

/// Emitted when a node's `evaluate`/`load` closure returns an error and its resource (if any) is
/// erased.
pub fn report_failure(node: &str, message: &str) {
    tracing::error!(node, message, "node failed");
}

/// What the engine decided to do with a node for one `call`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// The node was dirty and its `evaluate` closure ran.
    Evaluate,
    /// The node was clean and its resource was present, so its `load` closure ran.
    Load,
    /// The node was already clean-cached from earlier in this process.
    Cached,
}
