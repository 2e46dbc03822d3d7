//! Adapters that sit between one node's output and another node's argument slot (spec §4, C7).
//!
//! [`ReturnSelectorLink`] projects one element out of a multi-valued return,
//! [`ResourceProjectorLink`] lets a node's resource be wired in as another node's argument or
//! resource, and [`DependencyMarkerLink`] expresses ordering alone, with no value and no
//! signature contribution.

use std::fmt;
use std::rc::Rc;

use crate::error::WorkflowError;
use crate::node::NodeHandle;
use crate::resource::Resource;
use crate::value::ArgumentValue;

/// A reference from one node's argument slot to something produced by another node.
///
/// Every [`Link`] depends on exactly one node. `resolve` is only ever called after that
/// dependency has already been brought up to date (evaluated or loaded) by the caller.
pub trait Link: fmt::Debug {
    /// The node this link depends on.
    fn dependency(&self) -> NodeHandle;

    /// Projects the dependency's output (or resource) into the value actually handed to the
    /// depending node's `evaluate`/`load`.
    ///
    /// # Errors
    /// Returns [`WorkflowError::Binding`] if the projection cannot be applied to the
    /// dependency's actual output (e.g. a return-selector index out of range).
    fn resolve(&self) -> Result<ArgumentValue, WorkflowError>;

    /// This link's contribution to the signature's token, independent of `resolve`'s full value
    /// (for resource-shaped links this is the upstream resource's hash, not its content).
    ///
    /// # Errors
    /// Returns an error if the dependency's resource cannot be hashed.
    fn signature_token(&self) -> Result<ArgumentValue, WorkflowError>;

    /// Whether this link exists purely to order execution, contributing neither a value nor a
    /// signature entry (spec's dependency-marker edges).
    fn is_dependency_marker(&self) -> bool {
        false
    }
}

/// Projects element `index` out of a node's multi-valued return (an
/// [`ArgumentValue::List`]/[`ArgumentValue::Set`]), or passes the whole value through when the
/// dependency returns a single value and `index` is `None`.
#[derive(Debug, Clone)]
pub struct ReturnSelectorLink {
    dependency: NodeHandle,
    index: Option<usize>,
}

impl ReturnSelectorLink {
    /// References `dependency`'s whole return value.
    #[must_use]
    pub fn whole(dependency: NodeHandle) -> Self {
        Self {
            dependency,
            index: None,
        }
    }

    /// References element `index` of `dependency`'s tuple-like return value.
    #[must_use]
    pub fn indexed(dependency: NodeHandle, index: usize) -> Self {
        Self {
            dependency,
            index: Some(index),
        }
    }
}

impl Link for ReturnSelectorLink {
    fn dependency(&self) -> NodeHandle {
        self.dependency.clone()
    }

    fn resolve(&self) -> Result<ArgumentValue, WorkflowError> {
        let output = self.dependency.last_output().ok_or_else(|| {
            WorkflowError::binding_at(
                self.dependency.name(),
                "dependency has no cached output to select from",
                self.dependency.location(),
            )
        })?;
        match self.index {
            None => Ok(output),
            Some(index) => match output {
                ArgumentValue::List(items) => items.into_iter().nth(index).ok_or_else(|| {
                    WorkflowError::binding_at(
                        self.dependency.name(),
                        format!("return index {index} out of range"),
                        self.dependency.location(),
                    )
                }),
                other => {
                    if index == 0 {
                        Ok(other)
                    } else {
                        Err(WorkflowError::binding_at(
                            self.dependency.name(),
                            "dependency does not return a tuple-like value",
                            self.dependency.location(),
                        ))
                    }
                }
            },
        }
    }

    fn signature_token(&self) -> Result<ArgumentValue, WorkflowError> {
        self.dependency.resource_hash_token()
    }
}

/// References another node's `resource` slot directly, for use as a node's own resource or as a
/// plain argument value elsewhere.
#[derive(Debug, Clone)]
pub struct ResourceProjectorLink {
    dependency: NodeHandle,
}

impl ResourceProjectorLink {
    /// Projects `dependency`'s resource.
    #[must_use]
    pub fn new(dependency: NodeHandle) -> Self {
        Self { dependency }
    }

    /// The projected resource, if the dependency has one.
    #[must_use]
    pub fn resource(&self) -> Option<Rc<dyn Resource>> {
        self.dependency.resource()
    }
}

impl Link for ResourceProjectorLink {
    fn dependency(&self) -> NodeHandle {
        self.dependency.clone()
    }

    fn resolve(&self) -> Result<ArgumentValue, WorkflowError> {
        self.dependency.resource_hash_token()
    }

    fn signature_token(&self) -> Result<ArgumentValue, WorkflowError> {
        self.dependency.resource_hash_token()
    }
}

/// An ordering-only edge: forces `dependency` to be brought up to date before the depending
/// node runs, but contributes no value and no signature entry.
#[derive(Debug, Clone)]
pub struct DependencyMarkerLink {
    dependency: NodeHandle,
}

impl DependencyMarkerLink {
    /// Orders execution after `dependency` without binding any value.
    #[must_use]
    pub fn new(dependency: NodeHandle) -> Self {
        Self { dependency }
    }
}

impl Link for DependencyMarkerLink {
    fn dependency(&self) -> NodeHandle {
        self.dependency.clone()
    }

    fn resolve(&self) -> Result<ArgumentValue, WorkflowError> {
        Ok(ArgumentValue::Unit)
    }

    fn signature_token(&self) -> Result<ArgumentValue, WorkflowError> {
        Ok(ArgumentValue::Unit)
    }

    fn is_dependency_marker(&self) -> bool {
        true
    }
}
