//! A named collection of nodes sharing a working directory and a signature store (spec §4, C5).
//!
//! Owns node storage and is the entry point for running nodes, keyed by user-chosen names rather
//! than allocation order, with `prefix()` giving the sub-workflow composition a `Subgraph`
//! provides.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use crate::access::NodeName;
use crate::error::WorkflowError;
use crate::node::{GraphContext, NodeHandle};
use crate::signature::{SignatureStore, SledSignatureStore};

/// The on-disk directory name the signature store lives under, kept stable as the external
/// contract even though the backing engine is an internal choice (spec §6).
pub const SIGNATURE_STORE_DIR_NAME: &str = ".workflow.lmdb";

#[derive(Debug)]
struct GraphInner {
    name: String,
    work_dir: PathBuf,
    store: Box<dyn SignatureStore>,
    nodes: RefCell<BTreeMap<NodeName, NodeHandle>>,
}

impl GraphContext for GraphInner {
    fn graph_name(&self) -> &str {
        &self.name
    }

    fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    fn store(&self) -> &dyn SignatureStore {
        self.store.as_ref()
    }
}

/// A graph: a named, flat collection of nodes, all sharing one working directory and one
/// signature store.
#[derive(Debug, Clone)]
pub struct Graph(Rc<GraphInner>);

impl Graph {
    /// Builds a graph named `name`, rooted at `work_dir`, backed by `store`.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        work_dir: impl Into<PathBuf>,
        store: Box<dyn SignatureStore>,
    ) -> Self {
        Self(Rc::new(GraphInner {
            name: name.into(),
            work_dir: work_dir.into(),
            store,
            nodes: RefCell::new(BTreeMap::new()),
        }))
    }

    /// Opens a graph rooted at `work_dir` with its signature store at
    /// `work_dir/.workflow.lmdb`, creating the store if it does not already exist.
    ///
    /// # Errors
    /// Returns an error if the signature store cannot be opened.
    pub fn open(name: impl Into<String>, work_dir: impl Into<PathBuf>) -> Result<Self, WorkflowError> {
        let work_dir = work_dir.into();
        let store = SledSignatureStore::open(work_dir.join(SIGNATURE_STORE_DIR_NAME))?;
        Ok(Self::new(name, work_dir, Box::new(store)))
    }

    /// The graph's name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.0.name
    }

    /// The graph's working directory.
    #[must_use]
    pub fn work_dir(&self) -> &Path {
        &self.0.work_dir
    }

    /// Attaches `node` to this graph under its current name.
    ///
    /// # Errors
    /// Returns [`WorkflowError::Schema`] if a node with the same name is already attached.
    pub fn add_node(&self, node: NodeHandle) -> Result<NodeHandle, WorkflowError> {
        let name = node.name();
        let mut nodes = self.0.nodes.borrow_mut();
        if nodes.contains_key(&name) {
            return Err(WorkflowError::schema_at(
                name,
                "a node with this name is already attached to the graph",
                node.location(),
            ));
        }
        let context: Rc<dyn GraphContext> = self.0.clone();
        node.attach(&context);
        nodes.insert(name, node.clone());
        Ok(node)
    }

    /// Looks up a node by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<NodeHandle> {
        self.0.nodes.borrow().get(&NodeName::new(name)).cloned()
    }

    /// Every node name currently attached, in sorted order.
    #[must_use]
    pub fn node_names(&self) -> Vec<NodeName> {
        self.0.nodes.borrow().keys().cloned().collect()
    }

    /// Forgets every node's in-memory cache and in-process dirty/clean state without touching
    /// anything persisted, so the next `call` on each node re-checks its signature from disk.
    pub fn clear_cache(&self) {
        for node in self.0.nodes.borrow().values() {
            node.reset_in_memory_state();
        }
    }

    /// A view onto this graph that prefixes every node name it adds, letting a reusable
    /// sub-workflow be composed into a larger graph without name collisions (spec C5).
    #[must_use]
    pub fn prefix(&self, prefix: impl Into<String>) -> Subgraph {
        Subgraph {
            graph: self.clone(),
            prefix: prefix.into(),
        }
    }
}

/// A name-prefixing view onto a [`Graph`], used to compose a reusable sub-workflow into a larger
/// one without its node names colliding with the caller's own.
#[derive(Debug, Clone)]
pub struct Subgraph {
    graph: Graph,
    prefix: String,
}

impl Subgraph {
    /// Renames `node` by prepending this subgraph's prefix, then attaches it to the underlying
    /// graph.
    ///
    /// # Errors
    /// Returns [`WorkflowError::Schema`] if the prefixed name collides with an already-attached
    /// node.
    pub fn add_node(&self, node: NodeHandle) -> Result<NodeHandle, WorkflowError> {
        let prefixed = NodeName::new(format!("{}{}", self.prefix, node.name()));
        node.rename(prefixed);
        self.graph.add_node(node)
    }

    /// Looks up a node by its prefixed name within the underlying graph.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<NodeHandle> {
        self.graph.get(&format!("{}{}", self.prefix, name))
    }

    /// The underlying graph this view composes into.
    #[must_use]
    pub fn graph(&self) -> &Graph {
        &self.graph
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::ArgSlotValue;
    use crate::signature::MemorySignatureStore;
    use crate::value::ArgumentValue;

    fn test_graph(dir: &Path) -> Graph {
        Graph::new("g", dir, Box::new(MemorySignatureStore::new()))
    }

    #[test]
    fn adding_a_duplicate_name_is_a_schema_error() {
        let dir = tempfile::tempdir().unwrap();
        let graph = test_graph(dir.path());
        graph.add_node(NodeHandle::new("a", Vec::<String>::new())).unwrap();
        let err = graph
            .add_node(NodeHandle::new("a", Vec::<String>::new()))
            .unwrap_err();
        assert!(matches!(err, WorkflowError::Schema { .. }));
    }

    #[test]
    fn subgraph_prefixes_node_names() {
        let dir = tempfile::tempdir().unwrap();
        let graph = test_graph(dir.path());
        let sub = graph.prefix("training.");
        sub.add_node(NodeHandle::new("loss", Vec::<String>::new()))
            .unwrap();
        assert!(graph.get("training.loss").is_some());
        assert!(sub.get("loss").is_some());
    }

    #[test]
    fn clear_cache_forces_signature_recheck_without_losing_persisted_signature() {
        let dir = tempfile::tempdir().unwrap();
        let graph = test_graph(dir.path());
        let node = graph
            .add_node(NodeHandle::new("n", ["x"]))
            .unwrap();
        node.set_arg("x", ArgSlotValue::Literal(ArgumentValue::Int(1)))
            .unwrap();
        node.set_evaluate(|nc| Ok(nc.arg("x").cloned().unwrap()));
        node.call(false).unwrap();

        graph.clear_cache();
        // Same arguments, so even though the in-memory cache was dropped the signature still
        // matches what was persisted and the node should not need to re-evaluate to know that.
        let persisted = graph
            .get("n")
            .unwrap()
            .call(false)
            .unwrap();
        assert_eq!(persisted, ArgumentValue::Int(1));
    }
}
