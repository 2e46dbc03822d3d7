//! The engine's error taxonomy (spec §7): schema, binding, I/O and user errors.

use std::panic::Location;

use crate::access::NodeName;

/// Everything the engine itself can report as a failure.
///
/// Variants map directly onto the four error kinds in the specification.
/// `Schema` and `Binding` carry the source location captured when the
/// offending node was constructed, for these two kinds of mistakes.
#[derive(thiserror::Error, Debug)]
pub enum WorkflowError {
    /// Assignment to an unknown argument name, a non-argumentable value,
    /// a duplicate/overwritten node name, or a node never attached to a
    /// graph.
    #[error("{message} (node `{node}`, declared at {location})")]
    Schema {
        /// Human-readable description of what went wrong.
        message: String,
        /// The node the error concerns.
        node: NodeName,
        /// Where the node was constructed.
        location: &'static Location<'static>,
    },

    /// An unbound argument at call time, or a `load` function declared
    /// without a resource attached.
    #[error("{message} (node `{node}`, declared at {location})")]
    Binding {
        /// Human-readable description of what went wrong.
        message: String,
        /// The node the error concerns.
        node: NodeName,
        /// Where the node was constructed.
        location: &'static Location<'static>,
    },

    /// A failure reading or writing the signature store or a resource.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The signature store backend reported a failure.
    #[error("signature store error: {0}")]
    Store(#[from] sled::Error),

    /// Encoding or decoding a signature/measurement blob failed.
    #[error("signature codec error: {0}")]
    Codec(String),

    /// An exception (panic or returned error) raised by a user `evaluate`
    /// or `load` closure, or an explicit `Node::fail` call.
    #[error("{node}: {message}")]
    User {
        /// The node whose user code failed.
        node: NodeName,
        /// The message surfaced to the traceback channel.
        message: String,
    },
}

impl WorkflowError {
    /// Builds a [`WorkflowError::Schema`] at the caller's location.
    #[track_caller]
    #[must_use]
    pub fn schema(node: impl Into<NodeName>, message: impl Into<String>) -> Self {
        Self::Schema {
            message: message.into(),
            node: node.into(),
            location: Location::caller(),
        }
    }

    /// Builds a [`WorkflowError::Binding`] at the caller's location.
    #[track_caller]
    #[must_use]
    pub fn binding(node: impl Into<NodeName>, message: impl Into<String>) -> Self {
        Self::Binding {
            message: message.into(),
            node: node.into(),
            location: Location::caller(),
        }
    }

    /// Builds a [`WorkflowError::Schema`] at an explicit location rather than the caller's own —
    /// used whenever the offending node's construction site is already known, so the error points
    /// at the workflow file that declared the node instead of wherever inside this crate the
    /// error happened to be raised.
    #[must_use]
    pub fn schema_at(
        node: impl Into<NodeName>,
        message: impl Into<String>,
        location: &'static Location<'static>,
    ) -> Self {
        Self::Schema {
            message: message.into(),
            node: node.into(),
            location,
        }
    }

    /// Builds a [`WorkflowError::Binding`] at an explicit location rather than the caller's own.
    #[must_use]
    pub fn binding_at(
        node: impl Into<NodeName>,
        message: impl Into<String>,
        location: &'static Location<'static>,
    ) -> Self {
        Self::Binding {
            message: message.into(),
            node: node.into(),
            location,
        }
    }

    /// Builds a [`WorkflowError::User`] error for `node`.
    #[must_use]
    pub fn user(node: impl Into<NodeName>, message: impl Into<String>) -> Self {
        Self::User {
            node: node.into(),
            message: message.into(),
        }
    }
}
