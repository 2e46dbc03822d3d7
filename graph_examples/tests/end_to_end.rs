//! End-to-end scenarios over the sample workflows, each grounded in one of the reentrancy
//! behaviors the engine promises.

use graph_core::{ArgSlotValue, ArgumentValue, Graph, MemorySignatureStore, NodeHandle};

fn memory_graph(name: &str, dir: &std::path::Path) -> Graph {
    Graph::new(name, dir, Box::new(MemorySignatureStore::new()))
}

#[test]
fn basic_chain_computes_expected_values() {
    let dir = tempfile::tempdir().unwrap();
    let graph = memory_graph("g", dir.path());
    let (sum, diff) = graph_examples::add_sub_chain(&graph, 2, 3);
    assert_eq!(sum.call(false).unwrap(), ArgumentValue::Int(5));
    assert_eq!(diff.call(false).unwrap(), ArgumentValue::Int(2));
}

#[test]
fn clean_persisted_node_loads_instead_of_reevaluating() {
    let dir = tempfile::tempdir().unwrap();
    let graph = Graph::open("g", dir.path()).unwrap();
    let node = graph_examples::training_style_node(&graph, dir.path(), 3);

    let first = node.call(false).unwrap();
    assert_eq!(first, ArgumentValue::Str("trained for 3 epochs".to_owned()));

    graph.clear_cache();
    let second = node.call(false).unwrap();
    assert_eq!(second, ArgumentValue::Str("loaded from checkpoint".to_owned()));
}

#[test]
fn measurement_survives_a_load_and_reflects_the_last_evaluate() {
    let dir = tempfile::tempdir().unwrap();
    let graph = Graph::open("g", dir.path()).unwrap();
    let node = graph_examples::training_style_node(&graph, dir.path(), 4);
    node.call(false).unwrap();

    graph.clear_cache();
    node.call(false).unwrap(); // loads this time, does not call save_measurement again

    let measurement = node.get_measurement().unwrap();
    assert_eq!(measurement, Some(ArgumentValue::Float(0.4)));
}

#[test]
fn non_collateral_argument_does_not_trigger_reevaluation() {
    let dir = tempfile::tempdir().unwrap();
    let graph = Graph::open("g", dir.path()).unwrap();
    let node = graph_examples::node_with_non_collateral_argument(&graph, dir.path(), 1, false);
    assert_eq!(node.call(false).unwrap(), ArgumentValue::Int(1));

    graph.clear_cache();
    node.set_arg(
        "extra_logging",
        ArgSlotValue::Literal(ArgumentValue::Bool(true)),
    )
    .unwrap();

    // With the in-process cache dropped and only the non-collateral flag changed, the node's
    // resource is still present and its signature still matches, so this loads (returning the
    // load function's sentinel) instead of re-evaluating.
    assert_eq!(node.call(false).unwrap(), ArgumentValue::Int(-1));
}

#[test]
fn unbound_argument_surfaces_as_a_binding_error() {
    let dir = tempfile::tempdir().unwrap();
    let graph = memory_graph("g", dir.path());
    let node = graph
        .add_node(NodeHandle::new("incomplete", ["x"]))
        .unwrap();
    node.set_evaluate(|_| Ok(ArgumentValue::Unit));
    let err = node.call(false).unwrap_err();
    assert!(matches!(err, graph_core::WorkflowError::Binding { .. }));
}

#[test]
fn touch_lets_a_manually_placed_resource_be_loaded_instead_of_evaluated() {
    let dir = tempfile::tempdir().unwrap();
    let graph = Graph::open("g", dir.path()).unwrap();
    let node = graph_examples::training_style_node(&graph, dir.path(), 5);

    // Simulate the checkpoint having been produced out of band (e.g. copied in from elsewhere)
    // rather than by this node's own `evaluate`.
    std::fs::write(dir.path().join("checkpoint.txt"), "placed by hand").unwrap();
    node.touch().unwrap();

    let output = node.call(false).unwrap();
    assert_eq!(output, ArgumentValue::Str("loaded from checkpoint".to_owned()));
}

#[test]
fn loading_downstream_never_calls_upstream_again() {
    let dir = tempfile::tempdir().unwrap();
    let graph = Graph::open("g", dir.path()).unwrap();
    let (_upstream, downstream, upstream_calls) =
        graph_examples::resource_chain_with_call_counter(&graph, dir.path(), 7);

    assert_eq!(downstream.call(false).unwrap(), ArgumentValue::Int(7));
    assert_eq!(upstream_calls.get(), 1);

    graph.clear_cache();
    // downstream's resource is present and its signature still matches, so this load must bind
    // only downstream's own declared load subset (empty) and never reach upstream at all.
    assert_eq!(downstream.call(false).unwrap(), ArgumentValue::Int(-1));
    assert_eq!(upstream_calls.get(), 1);
}

#[test]
fn prefixed_subgraphs_do_not_collide() {
    let dir = tempfile::tempdir().unwrap();
    let graph = memory_graph("g", dir.path());
    let (left, right) = graph_examples::two_prefixed_copies(&graph, 3);

    assert_eq!(left.call(false).unwrap(), ArgumentValue::Int(3 * 3 + 1));
    assert_eq!(right.call(false).unwrap(), ArgumentValue::Int(4 * 4 + 1));
    assert!(graph.get("left.square").is_some());
    assert!(graph.get("right.square").is_some());
}
