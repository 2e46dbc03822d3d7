//! The node lifecycle: `call`, `update`, `touch`, `clear` (spec §4.5).
//!
//! A node's `evaluate`/`load` dispatch is a user-supplied closure rather than a compiled
//! operation, and dirtiness is decided by the signature diff in [`crate::signature`] rather than
//! any external dependency tracker.
//!
//! `update` and `call` are deliberately separate passes. `update` recomputes the current
//! signature and diffs it against what is persisted, recursing into upstream nodes' own `update`
//! — it never invokes `evaluate`/`load` on anything. `call` uses that verdict to decide whether it
//! can return a cached value, load, or must evaluate, and only then resolves real argument values,
//! which is the one place a dependency's own `call` runs.

use std::cell::RefCell;
use std::fmt;
use std::path::Path;
use std::rc::{Rc, Weak};

use crate::access::{ArgSlotValue, NodeName};
use crate::args::{ArgNamespace, ResolvedArgs};
use crate::error::WorkflowError;
use crate::resource::Resource;
use crate::signature::{is_dirty, Signature, SignatureStore};
use crate::value::ArgumentValue;
use crate::workdir::WorkDirGuard;

/// What a node knows about its owning graph: enough to persist its signature and run its
/// `evaluate`/`load` with the right working directory. Implemented by
/// [`crate::graph::GraphInner`]; kept as a trait here so this module does not depend on the
/// graph's own bookkeeping.
pub trait GraphContext: fmt::Debug {
    /// The graph's name, used as half of the signature store's key.
    fn graph_name(&self) -> &str;

    /// The directory `evaluate`/`load`/`touch` run in.
    fn work_dir(&self) -> &Path;

    /// The store backing this graph's persisted signatures and measurements.
    fn store(&self) -> &dyn SignatureStore;
}

/// A node's lifecycle state (spec §4.5.5). Purely informational bookkeeping for `help`/`viz-dag`
/// and diagnostics — `call`'s own load/evaluate/cached decision is driven by the signature diff
/// and the in-memory cache, not by this field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    /// Never run this process, nothing persisted either.
    Fresh,
    /// Known to need re-evaluation.
    Dirty,
    /// Ran this process; no resource, or a resource that only lives for the process lifetime.
    CleanCached,
    /// Ran (or loaded, or touched) this process with a resource on disk matching the persisted
    /// signature.
    CleanPersisted,
}

/// One dependency edge from a node to another, as reported by [`NodeHandle::edges`].
#[derive(Debug, Clone)]
pub struct Edge {
    /// The argument slot name this edge is bound to, or empty for an explicit
    /// [`NodeHandle::require`] dependency that is not bound to any argument.
    pub arg_name: String,
    /// The node depended on.
    pub dependency: NodeName,
    /// Whether this edge carries a value into the depending node or only orders execution.
    pub kind: EdgeKind,
}

/// What kind of edge [`Edge`] describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeKind {
    /// Contributes a value (and, unless non-collateral, a signature entry).
    Argument,
    /// Orders execution only; contributes neither a value nor a signature entry.
    DependencyMarker,
}

/// Context handed to a user `evaluate`/`load` closure for one call.
pub struct NodeContext<'a> {
    name: &'a NodeName,
    args: &'a ResolvedArgs,
    store: &'a dyn SignatureStore,
    graph_name: &'a str,
}

impl<'a> NodeContext<'a> {
    /// The node being run.
    #[must_use]
    pub fn name(&self) -> &NodeName {
        self.name
    }

    /// Reads the resolved value bound to `name` for this call.
    #[must_use]
    pub fn arg(&self, name: &str) -> Option<&ArgumentValue> {
        self.args.get(name)
    }

    /// Persists `value` as this node's measurement, independent of whether this call evaluated
    /// or loaded.
    ///
    /// # Errors
    /// Returns an error if the underlying store fails to write.
    pub fn save_measurement(&self, value: ArgumentValue) -> Result<(), WorkflowError> {
        self.store
            .put_measurement(self.graph_name, self.name.as_str(), &value)
    }

    /// Builds a [`WorkflowError::User`] for this node, for a closure to return via `?` when it
    /// wants to abort without a Rust-level error value of its own (the supplemented `fail`
    /// operation).
    #[must_use]
    pub fn fail(&self, message: impl Into<String>) -> WorkflowError {
        WorkflowError::user(self.name.clone(), message)
    }
}

/// A user `evaluate` or `load` closure.
pub type NodeFn = dyn Fn(&NodeContext<'_>) -> Result<ArgumentValue, WorkflowError>;

struct NodeInner {
    name: NodeName,
    view_name: Option<String>,
    help_text: Option<String>,
    location: &'static std::panic::Location<'static>,
    args: ArgNamespace,
    explicit_dependencies: Vec<NodeHandle>,
    evaluate: Option<Rc<NodeFn>>,
    load: Option<Rc<NodeFn>>,
    load_arg_names: Vec<String>,
    state: NodeState,
    cached_output: Option<ArgumentValue>,
    context: Option<Weak<dyn GraphContext>>,
    always_dirty: bool,
}

impl fmt::Debug for NodeInner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeInner")
            .field("name", &self.name)
            .field("state", &self.state)
            .field("location", &self.location)
            .finish_non_exhaustive()
    }
}

/// A shared handle to one node. Cheap to clone; every clone refers to the same underlying node.
#[derive(Clone)]
pub struct NodeHandle(Rc<RefCell<NodeInner>>);

impl fmt::Debug for NodeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.borrow().fmt(f)
    }
}

impl NodeHandle {
    /// Declares a new, unattached node named `name` with the given argument slot names.
    #[track_caller]
    pub fn new(
        name: impl Into<NodeName>,
        arg_names: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self(Rc::new(RefCell::new(NodeInner {
            name: name.into(),
            view_name: None,
            help_text: None,
            location: std::panic::Location::caller(),
            args: ArgNamespace::new(arg_names),
            explicit_dependencies: Vec::new(),
            evaluate: None,
            load: None,
            load_arg_names: Vec::new(),
            state: NodeState::Fresh,
            cached_output: None,
            context: None,
            always_dirty: false,
        })))
    }

    /// Marks the node as always dirty: every `call` re-evaluates regardless of what the
    /// signature comparison would say. Used for user-argument leaf nodes (spec C8), whose value
    /// may change between runs with no upstream edge to detect it.
    pub fn set_always_dirty(&self, always_dirty: bool) {
        self.0.borrow_mut().always_dirty = always_dirty;
    }

    /// The node's name within its graph.
    #[must_use]
    pub fn name(&self) -> NodeName {
        self.0.borrow().name.clone()
    }

    /// The name shown in `help`/`viz-dag` output: [`Self::set_view_name`]'s value, or the node's
    /// name if none was set.
    #[must_use]
    pub fn view_name(&self) -> String {
        let inner = self.0.borrow();
        inner.view_name.clone().unwrap_or_else(|| inner.name.to_string())
    }

    /// Overrides the display name used by `help`/`viz-dag`.
    pub fn set_view_name(&self, name: impl Into<String>) {
        self.0.borrow_mut().view_name = Some(name.into());
    }

    /// Text shown by `graph_cli help <node>`.
    #[must_use]
    pub fn help_text(&self) -> Option<String> {
        self.0.borrow().help_text.clone()
    }

    /// Sets the text shown by `graph_cli help <node>`.
    pub fn set_help_text(&self, text: impl Into<String>) {
        self.0.borrow_mut().help_text = Some(text.into());
    }

    /// Where this node was constructed, for schema/binding error provenance.
    #[must_use]
    pub fn location(&self) -> &'static std::panic::Location<'static> {
        self.0.borrow().location
    }

    /// Whether `self` and `other` are the same underlying node.
    #[must_use]
    pub fn same_node(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Sets the closure run when the node is dirty.
    pub fn set_evaluate(
        &self,
        f: impl Fn(&NodeContext<'_>) -> Result<ArgumentValue, WorkflowError> + 'static,
    ) {
        self.0.borrow_mut().evaluate = Some(Rc::new(f));
    }

    /// Sets the closure run when the node is clean and its resource is present on disk.
    ///
    /// By default `load` is bound no arguments at all; declare the subset it actually reads with
    /// [`Self::set_load_arg_names`].
    pub fn set_load(
        &self,
        f: impl Fn(&NodeContext<'_>) -> Result<ArgumentValue, WorkflowError> + 'static,
    ) {
        self.0.borrow_mut().load = Some(Rc::new(f));
    }

    /// Declares the subset of this node's argument names that `load` reads (spec §3: `load`'s
    /// parameter names are a subset of `evaluate`'s). Only this subset is resolved — and only this
    /// subset's upstream nodes are brought up to date — when the node loads. Defaults to empty if
    /// never called.
    ///
    /// # Errors
    /// Returns [`WorkflowError::Schema`] if any name was not declared when the node was created.
    pub fn set_load_arg_names(
        &self,
        names: impl IntoIterator<Item = impl Into<String>>,
    ) -> Result<(), WorkflowError> {
        let node_name = self.name();
        let names: Vec<String> = names.into_iter().map(Into::into).collect();
        {
            let inner = self.0.borrow();
            for name in &names {
                if inner.args.get(name).is_none() {
                    return Err(WorkflowError::schema_at(
                        node_name.clone(),
                        format!("`{name}` is not a declared argument, so `load` cannot bind it"),
                        inner.location,
                    ));
                }
            }
        }
        self.0.borrow_mut().load_arg_names = names;
        Ok(())
    }

    /// Binds this node's own durable output.
    pub fn set_resource(&self, resource: Rc<dyn Resource>) {
        self.0.borrow_mut().args.set_resource(resource);
    }

    /// The node's resource, if any.
    #[must_use]
    pub fn resource(&self) -> Option<Rc<dyn Resource>> {
        self.0.borrow().args.resource().cloned()
    }

    /// Binds argument slot `name`.
    ///
    /// # Errors
    /// Returns [`WorkflowError::Schema`] if `name` was not declared when the node was created.
    pub fn set_arg(&self, name: &str, value: ArgSlotValue) -> Result<(), WorkflowError> {
        let node_name = self.name();
        let location = self.location();
        self.0.borrow_mut().args.set(node_name, name, value, location)
    }

    /// Marks argument `name` as non-collateral (spec §4): it is resolved and passed to
    /// `evaluate`/`load` as usual but excluded from the node's signature.
    pub fn mark_non_collateral(&self, name: &str) {
        self.0.borrow_mut().args.mark_non_collateral(name);
    }

    /// Adds `other` as an ordering-only dependency: `other` is brought up to date before this
    /// node evaluates, but `other`'s output is never bound to any of this node's arguments.
    /// Adding the same dependency twice is a no-op.
    pub fn require(&self, other: Self) {
        let mut inner = self.0.borrow_mut();
        if !inner.explicit_dependencies.iter().any(|existing| existing.same_node(&other)) {
            inner.explicit_dependencies.push(other);
        }
    }

    /// The output cached from the most recent `call` in this process, if any.
    #[must_use]
    pub fn last_output(&self) -> Option<ArgumentValue> {
        self.0.borrow().cached_output.clone()
    }

    /// The node's current lifecycle state.
    #[must_use]
    pub fn state(&self) -> NodeState {
        self.0.borrow().state
    }

    /// Attaches this node to a graph, letting it persist signatures and resolve its working
    /// directory. Called once by [`crate::graph::Graph::add_node`].
    pub fn attach(&self, context: &Rc<dyn GraphContext>) {
        self.0.borrow_mut().context = Some(Rc::downgrade(context));
    }

    /// Builds a [`WorkflowError::User`] for this node (the supplemented explicit-failure
    /// operation, usable outside a running `evaluate`/`load` closure).
    #[must_use]
    pub fn fail(&self, message: impl Into<String>) -> WorkflowError {
        WorkflowError::user(self.name(), message)
    }

    /// The signature token this node's resource contributes to a dependent's signature: the
    /// resource's hash, or `ResourceHash(None)` if the node has no resource.
    ///
    /// # Errors
    /// Returns an error if the resource exists but its hash cannot be read.
    pub fn resource_hash_token(&self) -> Result<ArgumentValue, WorkflowError> {
        match self.resource() {
            None => Ok(ArgumentValue::ResourceHash(None)),
            Some(resource) => Ok(ArgumentValue::ResourceHash(
                resource.hash().map_err(WorkflowError::Io)?,
            )),
        }
    }

    fn context(&self) -> Result<Rc<dyn GraphContext>, WorkflowError> {
        let inner = self.0.borrow();
        inner
            .context
            .as_ref()
            .and_then(Weak::upgrade)
            .ok_or_else(|| {
                WorkflowError::schema_at(
                    inner.name.clone(),
                    "node is not attached to a graph",
                    inner.location,
                )
            })
    }

    fn declared_slots(&self) -> Vec<(String, ArgSlotValue)> {
        let inner = self.0.borrow();
        inner.args.iter().map(|(n, v)| (n.to_owned(), v.clone())).collect()
    }

    /// Refreshes and diffs the node's signature against what is persisted, recursing into
    /// upstream nodes' own `update` (spec §4.5.2). Never runs `evaluate`/`load` on this node or
    /// any of its dependencies.
    ///
    /// # Errors
    /// Returns [`WorkflowError::Binding`] if a declared argument was never bound, or an error from
    /// hashing a resource or reading the persisted signature.
    pub fn update(&self) -> Result<bool, WorkflowError> {
        if let Some(resource) = self.resource() {
            if !resource.exists() {
                return Ok(true);
            }
        }

        let node_name = self.name();
        let slots = self.declared_slots();

        for (name, slot) in &slots {
            if matches!(slot, ArgSlotValue::Uninitialized) {
                return Err(WorkflowError::binding_at(
                    node_name.clone(),
                    format!("argument `{name}` was never bound"),
                    self.location(),
                ));
            }
        }

        for (name, slot) in &slots {
            if self.0.borrow().args.is_non_collateral(name) {
                continue;
            }
            if let ArgSlotValue::Node(link) = slot {
                if link.is_dependency_marker() {
                    continue;
                }
                if link.dependency().update()? {
                    return Ok(true);
                }
            }
        }

        let signature = self.build_signature(&slots)?;
        let context = self.context()?;
        let persisted = context
            .store()
            .get_signature(context.graph_name(), node_name.as_str())?;
        Ok(match persisted {
            None => true,
            Some(previous) => is_dirty(&signature, &previous),
        })
    }

    /// Builds the collateral signature for `slots` as they currently stand: literal values,
    /// resource hashes, and — for a `Node` edge whose dependency has a resource — that resource's
    /// hash token. Never invokes `call`/`evaluate`/`load`; every slot is assumed already resolved
    /// or resolvable without execution.
    fn build_signature(&self, slots: &[(String, ArgSlotValue)]) -> Result<Signature, WorkflowError> {
        let mut signature = Signature::new();
        for (name, slot) in slots {
            if self.0.borrow().args.is_non_collateral(name) {
                continue;
            }
            match slot {
                ArgSlotValue::Uninitialized => {}
                ArgSlotValue::Literal(value) => {
                    signature.insert(name.clone(), value.clone());
                }
                ArgSlotValue::Node(link) => {
                    if link.is_dependency_marker() {
                        continue;
                    }
                    if link.dependency().resource().is_some() {
                        signature.insert(name.clone(), link.signature_token()?);
                    }
                }
                ArgSlotValue::Resource(resource) => {
                    let token = resource.hash().map_err(WorkflowError::Io)?;
                    signature.insert(name.clone(), ArgumentValue::ResourceHash(token));
                }
            }
        }
        Ok(signature)
    }

    /// Resolves `names` to their actual values for this call, calling `call` on any `Node`-typed
    /// dependency among them. Only the requested subset is touched — the full declared list for
    /// `evaluate`, or `load`'s declared subset for `load`.
    fn resolve_selected_args(&self, names: &[String]) -> Result<ResolvedArgs, WorkflowError> {
        let node_name = self.name();
        let mut resolved = ResolvedArgs::new();
        for name in names {
            let slot = self.0.borrow().args.get(name).cloned();
            match slot {
                None => {}
                Some(ArgSlotValue::Uninitialized) => {
                    return Err(WorkflowError::binding_at(
                        node_name.clone(),
                        format!("argument `{name}` was never bound"),
                        self.location(),
                    ));
                }
                Some(ArgSlotValue::Literal(value)) => {
                    resolved.insert(name.clone(), value);
                }
                Some(ArgSlotValue::Node(link)) => {
                    link.dependency().call(false)?;
                    let value = link.resolve()?;
                    resolved.insert(name.clone(), value);
                }
                Some(ArgSlotValue::Resource(resource)) => {
                    let token = resource.hash().map_err(WorkflowError::Io)?;
                    resolved.insert(name.clone(), ArgumentValue::ResourceHash(token));
                }
            }
        }
        Ok(resolved)
    }

    /// Brings the node up to date and returns its output, per spec §4.5.4's execution protocol.
    ///
    /// `redo` forces re-evaluation even if the signature would otherwise say the node is clean.
    ///
    /// # Errors
    /// Returns [`WorkflowError::Binding`] for an unbound argument, a `load` declared without a
    /// resource, or a missing `evaluate`, [`WorkflowError::User`] if the closure itself fails, and
    /// I/O or store errors as they occur.
    pub fn call(&self, redo: bool) -> Result<ArgumentValue, WorkflowError> {
        let node_name = self.name();

        {
            let inner = self.0.borrow();
            if inner.load.is_some() && inner.args.resource().is_none() {
                return Err(WorkflowError::binding_at(
                    node_name.clone(),
                    "load declared without resource",
                    inner.location,
                ));
            }
        }

        let context = self.context()?;
        let graph_name = context.graph_name().to_owned();
        let work_dir = context.work_dir().to_owned();
        let _span = crate::ui::call_span(&graph_name, node_name.as_str()).entered();

        let structurally_dirty = self.update()?;
        let is_dirty = redo || self.0.borrow().always_dirty || structurally_dirty;

        // Idempotence (spec invariant #1): a clean node with a cached value returns it untouched,
        // whether or not it carries a resource.
        if !is_dirty {
            if let Some(output) = self.0.borrow().cached_output.clone() {
                crate::ui::report_decision(node_name.as_str(), crate::ui::Decision::Cached);
                return Ok(output);
            }
        }

        let resource = self.resource();
        let loadable = !is_dirty
            && self.0.borrow().load.is_some()
            && resource.as_ref().is_some_and(|r| r.exists());

        let _workdir_guard = WorkDirGuard::enter(&work_dir)?;

        if loadable {
            crate::ui::report_decision(node_name.as_str(), crate::ui::Decision::Load);
            let load_names = self.0.borrow().load_arg_names.clone();
            let resolved = self.resolve_selected_args(&load_names)?;
            let load = self.0.borrow().load.clone().expect("checked by loadable");
            let node_ctx = NodeContext {
                name: &node_name,
                args: &resolved,
                store: context.store(),
                graph_name: &graph_name,
            };
            let output = load(&node_ctx)?;
            self.0.borrow_mut().cached_output = Some(output.clone());
            self.0.borrow_mut().state = NodeState::CleanCached;
            return Ok(output);
        }

        crate::ui::report_decision(node_name.as_str(), crate::ui::Decision::Evaluate);

        let all_names: Vec<String> = self.0.borrow().args.names().map(str::to_owned).collect();
        let resolved = self.resolve_selected_args(&all_names)?;

        let explicit_deps = self.0.borrow().explicit_dependencies.clone();
        for dep in explicit_deps {
            if dep.update()? {
                dep.call(false)?;
            }
        }

        context.store().clear_measurement(&graph_name, node_name.as_str())?;

        if let Some(resource) = &resource {
            if !resource.rewritable() {
                resource.erase().map_err(WorkflowError::Io)?;
            }
        }

        let evaluate = self.0.borrow().evaluate.clone().ok_or_else(|| {
            WorkflowError::binding_at(node_name.clone(), "node has no evaluate function", self.location())
        })?;

        let node_ctx = NodeContext {
            name: &node_name,
            args: &resolved,
            store: context.store(),
            graph_name: &graph_name,
        };

        match evaluate(&node_ctx) {
            Ok(output) => {
                let slots = self.declared_slots();
                let signature = self.build_signature(&slots)?;
                context
                    .store()
                    .put_signature(&graph_name, node_name.as_str(), &signature)?;
                self.0.borrow_mut().cached_output = Some(output.clone());
                self.0.borrow_mut().state = NodeState::CleanCached;
                Ok(output)
            }
            Err(err) => {
                crate::ui::report_failure(node_name.as_str(), &err.to_string());
                if let Some(resource) = &resource {
                    let _ = resource.erase();
                }
                self.0.borrow_mut().state = NodeState::Dirty;
                self.0.borrow_mut().cached_output = None;
                Err(err)
            }
        }
    }

    /// Records the node as up to date without running `evaluate`/`load`, by persisting its
    /// current signature directly. Used to tell the engine that an out-of-band edit (e.g. a
    /// manually placed file) should be treated as already accounted for.
    ///
    /// # Errors
    /// Returns an error if an upstream dependency cannot be resolved or the store cannot be
    /// written.
    pub fn touch(&self) -> Result<(), WorkflowError> {
        let _ = self.update()?;

        let node_name = self.name();
        let context = self.context()?;
        let graph_name = context.graph_name().to_owned();

        let slots = self.declared_slots();
        let signature = self.build_signature(&slots)?;
        context
            .store()
            .put_signature(&graph_name, node_name.as_str(), &signature)?;

        self.0.borrow_mut().state = match self.resource() {
            Some(resource) if resource.exists() => NodeState::CleanPersisted,
            _ => NodeState::CleanCached,
        };
        Ok(())
    }

    /// Erases the node's resource (if any), removes its persisted signature and measurement, and
    /// marks it dirty.
    ///
    /// # Errors
    /// Returns an error if erasing the resource or clearing the store fails.
    pub fn clear(&self) -> Result<(), WorkflowError> {
        if let Some(resource) = self.resource() {
            resource.erase().map_err(WorkflowError::Io)?;
        }
        let context = self.context()?;
        context.store().clear(context.graph_name(), self.name().as_str())?;
        self.0.borrow_mut().cached_output = None;
        self.0.borrow_mut().state = NodeState::Dirty;
        Ok(())
    }

    /// Renames the node in place. Used by [`crate::graph::Subgraph`] to apply a prefix before a
    /// node is attached to its owning graph; never called on an already-attached node.
    pub(crate) fn rename(&self, new_name: NodeName) {
        self.0.borrow_mut().name = new_name;
    }

    /// Drops this node's in-memory cache and marks it dirty, without touching anything
    /// persisted. Used by [`crate::graph::Graph::clear_cache`], which forgets what has run in
    /// this process without discarding the on-disk signature/resource history.
    pub fn reset_in_memory_state(&self) {
        let mut inner = self.0.borrow_mut();
        inner.cached_output = None;
        inner.state = if inner.args.resource().is_some() {
            NodeState::CleanPersisted
        } else {
            NodeState::Dirty
        };
    }

    /// Every edge this node has to another node: one per `Node`-bound argument slot, plus one
    /// per explicit [`Self::require`] dependency. Used by `graph_cli`'s `viz-dag` rendering.
    #[must_use]
    pub fn edges(&self) -> Vec<Edge> {
        let inner = self.0.borrow();
        let mut edges: Vec<Edge> = inner
            .args
            .iter()
            .filter_map(|(name, slot)| match slot {
                ArgSlotValue::Node(link) => Some(Edge {
                    arg_name: name.to_owned(),
                    dependency: link.dependency().name(),
                    kind: if link.is_dependency_marker() {
                        EdgeKind::DependencyMarker
                    } else {
                        EdgeKind::Argument
                    },
                }),
                _ => None,
            })
            .collect();
        edges.extend(inner.explicit_dependencies.iter().map(|dep| Edge {
            arg_name: String::new(),
            dependency: dep.name(),
            kind: EdgeKind::DependencyMarker,
        }));
        edges
    }

    /// Reads the last measurement saved for this node, regardless of whether the most recent run
    /// evaluated or loaded (the resolved reading of spec §9's open question on measurement
    /// semantics).
    ///
    /// # Errors
    /// Returns an error if the underlying store fails to read.
    pub fn get_measurement(&self) -> Result<Option<ArgumentValue>, WorkflowError> {
        let context = self.context()?;
        context.store().get_measurement(context.graph_name(), self.name().as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signature::MemorySignatureStore;
    use std::path::PathBuf;

    #[derive(Debug)]
    struct TestContext {
        name: String,
        dir: PathBuf,
        store: MemorySignatureStore,
    }

    impl GraphContext for TestContext {
        fn graph_name(&self) -> &str {
            &self.name
        }
        fn work_dir(&self) -> &Path {
            &self.dir
        }
        fn store(&self) -> &dyn SignatureStore {
            &self.store
        }
    }

    fn attach(node: &NodeHandle, dir: &Path) -> Rc<dyn GraphContext> {
        let ctx: Rc<dyn GraphContext> = Rc::new(TestContext {
            name: "g".to_owned(),
            dir: dir.to_owned(),
            store: MemorySignatureStore::new(),
        });
        node.attach(&ctx);
        ctx
    }

    #[test]
    fn rerun_without_changes_does_not_reevaluate() {
        let dir = tempfile::tempdir().unwrap();
        let node = NodeHandle::new("n", ["x"]);
        let _ctx = attach(&node, dir.path());
        node.set_arg("x", ArgSlotValue::Literal(ArgumentValue::Int(1)))
            .unwrap();

        let calls = Rc::new(RefCell::new(0));
        let calls_clone = calls.clone();
        node.set_evaluate(move |nc| {
            *calls_clone.borrow_mut() += 1;
            Ok(nc.arg("x").cloned().unwrap())
        });

        let first = node.call(false).unwrap();
        assert_eq!(first, ArgumentValue::Int(1));
        assert_eq!(*calls.borrow(), 1);

        // The in-process cache is still warm, so a second call must not re-evaluate.
        let second = node.call(false).unwrap();
        assert_eq!(second, ArgumentValue::Int(1));
        assert_eq!(*calls.borrow(), 1);

        // Nor should a third, fourth, ... call — idempotence holds across repeated reentry.
        node.call(false).unwrap();
        node.call(false).unwrap();
        assert_eq!(*calls.borrow(), 1);
    }

    #[test]
    fn changing_a_collateral_argument_triggers_reevaluation() {
        let dir = tempfile::tempdir().unwrap();
        let node = NodeHandle::new("n", ["x"]);
        let _ctx = attach(&node, dir.path());
        node.set_arg("x", ArgSlotValue::Literal(ArgumentValue::Int(1)))
            .unwrap();

        let calls = Rc::new(RefCell::new(0));
        let calls_clone = calls.clone();
        node.set_evaluate(move |nc| {
            *calls_clone.borrow_mut() += 1;
            Ok(nc.arg("x").cloned().unwrap())
        });

        node.call(false).unwrap();
        node.clear().unwrap(); // drop in-process cache to force signature comparison
        node.set_arg("x", ArgSlotValue::Literal(ArgumentValue::Int(2)))
            .unwrap();
        let second = node.call(false).unwrap();
        assert_eq!(second, ArgumentValue::Int(2));
        assert_eq!(*calls.borrow(), 2);
    }

    #[test]
    fn unbound_argument_is_a_binding_error() {
        let dir = tempfile::tempdir().unwrap();
        let node = NodeHandle::new("n", ["x"]);
        let _ctx = attach(&node, dir.path());
        node.set_evaluate(|_| Ok(ArgumentValue::Unit));
        let err = node.call(false).unwrap_err();
        assert!(matches!(err, WorkflowError::Binding { .. }));
    }

    #[test]
    fn load_declared_without_resource_is_a_binding_error() {
        let dir = tempfile::tempdir().unwrap();
        let node = NodeHandle::new("n", Vec::<String>::new());
        let _ctx = attach(&node, dir.path());
        node.set_evaluate(|_| Ok(ArgumentValue::Unit));
        node.set_load(|_| Ok(ArgumentValue::Unit));
        let err = node.call(false).unwrap_err();
        assert!(matches!(err, WorkflowError::Binding { .. }));
    }

    #[test]
    fn clear_erases_persisted_signature() {
        let dir = tempfile::tempdir().unwrap();
        let node = NodeHandle::new("n", ["x"]);
        let _ctx = attach(&node, dir.path());
        node.set_arg("x", ArgSlotValue::Literal(ArgumentValue::Int(1)))
            .unwrap();
        node.set_evaluate(|nc| Ok(nc.arg("x").cloned().unwrap()));
        node.call(false).unwrap();
        node.clear().unwrap();
        assert_eq!(node.state(), NodeState::Dirty);
        assert_eq!(node.last_output(), None);
    }

    #[test]
    fn duplicate_require_is_deduplicated() {
        let dir = tempfile::tempdir().unwrap();
        let node = NodeHandle::new("n", Vec::<String>::new());
        let _ctx = attach(&node, dir.path());
        node.set_evaluate(|_| Ok(ArgumentValue::Unit));

        let upstream = NodeHandle::new("u", Vec::<String>::new());
        attach(&upstream, dir.path());
        upstream.set_evaluate(|_| Ok(ArgumentValue::Unit));

        node.require(upstream.clone());
        node.require(upstream);
        assert_eq!(node.edges().len(), 1);
    }
}
