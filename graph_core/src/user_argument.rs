//! CLI-injected leaf values (spec §4, C8).
//!
//! A node with no declared arguments, no resource, and no edges, whose value is supplied from
//! outside the graph (typically the CLI) and which is always considered dirty, since nothing
//! about it is tracked between runs.

use std::cell::RefCell;
use std::rc::Rc;

use crate::access::NodeName;
use crate::node::NodeHandle;
use crate::value::ArgumentValue;

/// A leaf node holding a value injected from outside the graph.
///
/// Unlike an ordinary node, a [`UserArgument`]'s value can be changed in place with [`Self::set`]
/// between calls in the same process (e.g. as the CLI re-parses its arguments), and every call
/// always re-evaluates.
#[derive(Debug, Clone)]
pub struct UserArgument {
    node: NodeHandle,
    value: Rc<RefCell<ArgumentValue>>,
}

impl UserArgument {
    /// Builds a user-argument node named `name`, initially bound to `value`.
    pub fn new(name: impl Into<NodeName>, value: ArgumentValue) -> Self {
        let node = NodeHandle::new(name, Vec::<String>::new());
        node.set_always_dirty(true);
        let value = Rc::new(RefCell::new(value));
        let evaluate_value = value.clone();
        node.set_evaluate(move |_| Ok(evaluate_value.borrow().clone()));
        Self { node, value }
    }

    /// The underlying node, for attaching to a [`crate::graph::Graph`] or wiring into another
    /// node's argument via a [`crate::link::Link`].
    #[must_use]
    pub fn node(&self) -> NodeHandle {
        self.node.clone()
    }

    /// Replaces the injected value.
    pub fn set(&self, value: ArgumentValue) {
        *self.value.borrow_mut() = value;
    }

    /// Reads the currently injected value.
    #[must_use]
    pub fn get(&self) -> ArgumentValue {
        self.value.borrow().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Graph;
    use crate::signature::MemorySignatureStore;

    #[test]
    fn user_argument_always_reevaluates_even_without_changing() {
        let dir = tempfile::tempdir().unwrap();
        let graph = Graph::new("g", dir.path(), Box::new(MemorySignatureStore::new()));
        let arg = UserArgument::new("count", ArgumentValue::Int(1));
        graph.add_node(arg.node()).unwrap();

        assert_eq!(arg.node().call(false).unwrap(), ArgumentValue::Int(1));
        // Calling again with the same value still re-evaluates rather than short-circuiting on a
        // signature match, because user arguments carry no signature history at all.
        assert_eq!(arg.node().call(false).unwrap(), ArgumentValue::Int(1));

        arg.set(ArgumentValue::Int(2));
        assert_eq!(arg.node().call(false).unwrap(), ArgumentValue::Int(2));
    }
}
