//! The fixed named argument namespace bound to a node (spec §3, `ArgNamespace`).
//!
//! Slots are declared once from a node's parameter list and can only ever be reassigned, never
//! added to or removed, and a dedicated `resource` slot always exists alongside the declared
//! parameters without being part of them.

use crate::access::ArgSlotValue;
use crate::error::WorkflowError;
use crate::value::ArgumentValue;

/// A node's declared arguments, in declaration order.
///
/// Every slot starts [`ArgSlotValue::Uninitialized`]. Assigning to a name that was not declared
/// is a [`WorkflowError::Schema`] error.
#[derive(Debug, Clone)]
pub struct ArgNamespace {
    slots: Vec<(String, ArgSlotValue)>,
    non_collateral: std::collections::HashSet<String>,
    resource: Option<std::rc::Rc<dyn crate::resource::Resource>>,
}

impl ArgNamespace {
    /// Declares a namespace with one uninitialized slot per name, in the given order.
    pub fn new(names: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            slots: names
                .into_iter()
                .map(|name| (name.into(), ArgSlotValue::Uninitialized))
                .collect(),
            non_collateral: std::collections::HashSet::new(),
            resource: None,
        }
    }

    /// The declared slot names, in declaration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.slots.iter().map(|(name, _)| name.as_str())
    }

    fn index_of(&self, name: &str) -> Option<usize> {
        self.slots.iter().position(|(n, _)| n == name)
    }

    /// Binds `name` to `value`.
    ///
    /// `location` is attributed to the owning node's declaration site, so a schema error here
    /// points at the workflow file that declared the node rather than somewhere inside this
    /// crate.
    ///
    /// # Errors
    /// Returns [`WorkflowError::Schema`] if `name` was not among the declared parameter names.
    pub fn set(
        &mut self,
        owner: impl Into<crate::access::NodeName>,
        name: &str,
        value: ArgSlotValue,
        location: &'static std::panic::Location<'static>,
    ) -> Result<(), WorkflowError> {
        let index = self.index_of(name).ok_or_else(|| {
            WorkflowError::schema_at(owner, format!("no such argument `{name}`"), location)
        })?;
        self.slots[index].1 = value;
        Ok(())
    }

    /// Reads the current binding for `name`, or `None` if `name` is not declared.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ArgSlotValue> {
        self.index_of(name).map(|i| &self.slots[i].1)
    }

    /// Iterates over every declared slot, in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ArgSlotValue)> {
        self.slots.iter().map(|(n, v)| (n.as_str(), v))
    }

    /// Marks `name` as non-collateral: its value is still resolved and passed to
    /// `evaluate`/`load`, but it is excluded from the node's signature, so changes to it never
    /// make the node dirty (spec §4's non-collateral argument rule).
    pub fn mark_non_collateral(&mut self, name: &str) {
        self.non_collateral.insert(name.to_owned());
    }

    /// Whether `name` was marked non-collateral.
    #[must_use]
    pub fn is_non_collateral(&self, name: &str) -> bool {
        self.non_collateral.contains(name)
    }

    /// The node's own durable output resource, if any. Kept outside the declared-slot list: it
    /// is never iterated as part of signature construction.
    #[must_use]
    pub fn resource(&self) -> Option<&std::rc::Rc<dyn crate::resource::Resource>> {
        self.resource.as_ref()
    }

    /// Sets the node's resource.
    pub fn set_resource(&mut self, resource: std::rc::Rc<dyn crate::resource::Resource>) {
        self.resource = Some(resource);
    }

    /// Checks that every declared slot that is not defaultable is bound, returning the first
    /// unbound name found.
    #[must_use]
    pub fn first_unbound(&self) -> Option<&str> {
        self.slots
            .iter()
            .find(|(_, v)| matches!(v, ArgSlotValue::Uninitialized))
            .map(|(n, _)| n.as_str())
    }
}

/// The resolved, literal values passed to a user `evaluate`/`load` closure for one call — as
/// opposed to [`ArgNamespace`], whose slots may still hold node/resource references.
#[derive(Debug, Clone, Default)]
pub struct ResolvedArgs {
    values: std::collections::BTreeMap<String, ArgumentValue>,
}

impl ResolvedArgs {
    /// An empty set of resolved arguments.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `name` to its resolved value.
    pub fn insert(&mut self, name: impl Into<String>, value: ArgumentValue) {
        self.values.insert(name.into(), value);
    }

    /// Reads the resolved value for `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ArgumentValue> {
        self.values.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[track_caller]
    fn loc() -> &'static std::panic::Location<'static> {
        std::panic::Location::caller()
    }

    #[test]
    fn setting_an_undeclared_name_is_a_schema_error() {
        let mut ns = ArgNamespace::new(["a", "b"]);
        let err = ns
            .set("node", "c", ArgSlotValue::Literal(ArgumentValue::Int(1)), loc())
            .unwrap_err();
        assert!(matches!(err, WorkflowError::Schema { .. }));
    }

    #[test]
    fn first_unbound_reports_declaration_order() {
        let mut ns = ArgNamespace::new(["a", "b"]);
        ns.set("node", "b", ArgSlotValue::Literal(ArgumentValue::Int(1)), loc())
            .unwrap();
        assert_eq!(ns.first_unbound(), Some("a"));
    }

    #[test]
    fn non_collateral_marking_is_independent_of_binding() {
        let mut ns = ArgNamespace::new(["a"]);
        ns.mark_non_collateral("a");
        assert!(ns.is_non_collateral("a"));
        assert!(!ns.is_non_collateral("missing"));
    }
}
