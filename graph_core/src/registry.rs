//! The process-wide graph registry (spec §4, C6) and scoped acquisition.
//!
//! Keyed by `(absolute working directory, graph name)` so that two callers pointing at the same
//! on-disk workflow always share one [`crate::graph::Graph`] and one open signature store, rather
//! than racing to open the same `sled` database twice.

use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::WorkflowError;
use crate::graph::Graph;
use crate::workdir::WorkDirGuard;

type RegistryKey = (PathBuf, String);

thread_local! {
    // The engine is single-threaded (spec §5): reentrant calls happen on one thread, so a
    // thread-local map is the process-wide registry without requiring `Graph`'s `Rc`-based
    // internals to be `Send`.
    static REGISTRY: RefCell<HashMap<RegistryKey, Graph>> = RefCell::new(HashMap::new());
}

/// Returns the graph named `name` rooted at `work_dir`, creating and registering it on first
/// use (spec §4.7, C6).
///
/// `existing` and `overwrite` are mutually refining: `overwrite` always opens a fresh `Graph` and
/// replaces whatever was registered, regardless of whether one already existed; otherwise, if
/// `existing` is set and nothing is registered yet, this is a [`WorkflowError::Schema`] error
/// rather than a silent create.
///
/// # Errors
/// Returns an error if `work_dir` cannot be canonicalized, a new graph's signature store cannot
/// be opened, or `existing` is set and no graph is registered under `name`.
pub fn get_or_create(
    name: &str,
    work_dir: &Path,
    existing: bool,
    overwrite: bool,
) -> Result<Graph, WorkflowError> {
    let canonical = work_dir.canonicalize().map_err(WorkflowError::Io)?;
    let key = (canonical.clone(), name.to_owned());

    if !overwrite {
        if let Some(graph) = REGISTRY.with(|r| r.borrow().get(&key).cloned()) {
            return Ok(graph);
        }
        if existing {
            return Err(WorkflowError::schema(
                name,
                "no graph named this exists in this working directory",
            ));
        }
    }

    let graph = Graph::open(name, canonical)?;
    REGISTRY.with(|r| r.borrow_mut().insert(key, graph.clone()));
    Ok(graph)
}

/// Removes every registered graph. Used by tests to get a clean registry between cases; a
/// long-running embedder has no ordinary reason to call this.
pub fn clear_registry() {
    REGISTRY.with(|r| r.borrow_mut().clear());
}

/// A scoped acquisition of a registered graph: looks the graph up (creating it if needed),
/// switches the process's working directory to it, and restores the previous directory when the
/// returned guard is dropped.
///
/// # Errors
/// Returns an error if the graph cannot be opened or the working directory cannot be entered.
pub fn begin_graph(name: &str, work_dir: &Path) -> Result<(Graph, WorkDirGuard), WorkflowError> {
    let graph = get_or_create(name, work_dir, false, false)?;
    let guard = WorkDirGuard::enter(graph.work_dir())?;
    Ok((graph, guard))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_lookups_return_the_same_graph() {
        clear_registry();
        let dir = tempfile::tempdir().unwrap();
        let a = get_or_create("g", dir.path(), false, false).unwrap();
        let b = get_or_create("g", dir.path(), false, false).unwrap();
        assert_eq!(a.name(), b.name());
        assert_eq!(a.work_dir(), b.work_dir());
    }

    #[test]
    fn distinct_names_in_the_same_directory_are_distinct_graphs() {
        clear_registry();
        let dir = tempfile::tempdir().unwrap();
        let a = get_or_create("a", dir.path(), false, false).unwrap();
        let b = get_or_create("b", dir.path(), false, false).unwrap();
        assert_ne!(a.name(), b.name());
    }

    #[test]
    fn existing_true_on_an_absent_graph_is_a_schema_error() {
        clear_registry();
        let dir = tempfile::tempdir().unwrap();
        let err = get_or_create("g", dir.path(), true, false).unwrap_err();
        assert!(matches!(err, WorkflowError::Schema { .. }));
    }

    #[test]
    fn overwrite_true_replaces_the_registered_graph() {
        clear_registry();
        let dir = tempfile::tempdir().unwrap();
        let first = get_or_create("g", dir.path(), false, false).unwrap();
        let second = get_or_create("g", dir.path(), false, true).unwrap();
        assert_eq!(first.name(), second.name());
        let third = get_or_create("g", dir.path(), false, false).unwrap();
        assert_eq!(second.work_dir(), third.work_dir());
    }

    #[test]
    fn begin_graph_restores_working_directory() {
        clear_registry();
        let before = std::env::current_dir().unwrap();
        let dir = tempfile::tempdir().unwrap();
        {
            let (_graph, _guard) = begin_graph("g", dir.path()).unwrap();
            assert_eq!(
                std::env::current_dir().unwrap().canonicalize().unwrap(),
                dir.path().canonicalize().unwrap()
            );
        }
        assert_eq!(std::env::current_dir().unwrap(), before);
    }
}
