//! A reentrant, signature-based incremental execution engine for dependency graphs of
//! user-defined nodes.
//!
//! A [`graph::Graph`] holds named [`node::NodeHandle`]s wired together through
//! [`link::Link`]s. Calling a node recursively brings its dependencies up to date, compares a
//! freshly computed [`signature::Signature`] against what was persisted on the previous run, and
//! either re-runs the node's `evaluate` closure, re-runs its cheaper `load` closure against an
//! on-disk [`resource::Resource`], or reuses the in-process cached output — never content
//! hashing, never running more than one node at a time (see [`registry`] and [`workdir`] for the
//! process-wide bookkeeping that makes repeated calls across a process safe).

pub mod access;
pub mod args;
pub mod error;
pub mod graph;
pub mod link;
pub mod node;
pub mod registry;
pub mod resource;
pub mod signature;
pub mod ui;
pub mod user_argument;
pub mod value;
pub mod workdir;

pub use access::{ArgSlotValue, NodeName};
pub use error::WorkflowError;
pub use graph::{Graph, Subgraph};
pub use link::{DependencyMarkerLink, Link, ReturnSelectorLink, ResourceProjectorLink};
pub use node::{Edge, EdgeKind, NodeContext, NodeHandle, NodeState};
pub use resource::{FsResource, MultiResource, NilResource, Resource, ResourceHash};
pub use signature::{MemorySignatureStore, Signature, SignatureStore, SledSignatureStore};
pub use user_argument::UserArgument;
pub use value::{ArgumentValue, ValueKind};
