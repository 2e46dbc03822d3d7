//! Sample workflows exercising the engine end to end.
//!
//! Each builder wires a small graph of [`graph_core`] nodes and returns handles to it, so both
//! the runnable examples under `examples/` and the integration tests under `tests/` can share the
//! same workflow shapes instead of re-deriving them.

use std::path::Path;
use std::rc::Rc;

use graph_core::{
    ArgSlotValue, ArgumentValue, FsResource, Graph, NodeHandle, ReturnSelectorLink,
};
use std::cell::Cell;

/// Builds the canonical `add`/`sub` chain: `sum = a + b`, `diff = sum - b`.
///
/// `a` and `b` are plain literal arguments, so this workflow is dirty exactly when either input
/// literal changes.
pub fn add_sub_chain(graph: &Graph, a: i64, b: i64) -> (NodeHandle, NodeHandle) {
    let sum = graph.add_node(NodeHandle::new("sum", ["a", "b"])).unwrap();
    sum.set_arg("a", ArgSlotValue::Literal(ArgumentValue::Int(a)))
        .unwrap();
    sum.set_arg("b", ArgSlotValue::Literal(ArgumentValue::Int(b)))
        .unwrap();
    sum.set_evaluate(|nc| {
        let a = as_int(nc.arg("a").unwrap());
        let b = as_int(nc.arg("b").unwrap());
        Ok(ArgumentValue::Int(a + b))
    });

    let diff = graph.add_node(NodeHandle::new("diff", ["sum", "b"])).unwrap();
    diff.set_arg(
        "sum",
        ArgSlotValue::Node(Rc::new(ReturnSelectorLink::whole(sum.clone()))),
    )
    .unwrap();
    diff.set_arg("b", ArgSlotValue::Literal(ArgumentValue::Int(b)))
        .unwrap();
    diff.set_evaluate(|nc| {
        let sum = as_int(nc.arg("sum").unwrap());
        let b = as_int(nc.arg("b").unwrap());
        Ok(ArgumentValue::Int(sum - b))
    });

    (sum, diff)
}

/// Builds a node that writes its output to a file on disk, with a matching `load` that reads it
/// back without recomputing — the resource-backed reentrancy scenario.
pub fn training_style_node(graph: &Graph, work_dir: &Path, epochs: i64) -> NodeHandle {
    let checkpoint_path = work_dir.join("checkpoint.txt");
    let node = graph
        .add_node(NodeHandle::new("train", ["epochs"]))
        .unwrap();
    node.set_arg("epochs", ArgSlotValue::Literal(ArgumentValue::Int(epochs)))
        .unwrap();
    node.set_resource(Rc::new(FsResource::new(checkpoint_path.clone())));
    node.set_evaluate(move |nc| {
        let epochs = as_int(nc.arg("epochs").unwrap());
        std::fs::write(&checkpoint_path, format!("trained for {epochs} epochs")).map_err(
            |err| nc.fail(format!("failed to write checkpoint: {err}")),
        )?;
        nc.save_measurement(ArgumentValue::Float(f64::from(epochs as i32) * 0.1))?;
        Ok(ArgumentValue::Str(format!("trained for {epochs} epochs")))
    });
    node.set_load(|_nc| Ok(ArgumentValue::Str("loaded from checkpoint".to_owned())));
    node
}

/// Builds a resource-backed node whose `extra_logging` argument is marked non-collateral:
/// flipping it never makes the node dirty on its own, so a later run with the flag changed but
/// `value` unchanged loads from the resource rather than re-evaluating.
pub fn node_with_non_collateral_argument(
    graph: &Graph,
    work_dir: &Path,
    value: i64,
    extra_logging: bool,
) -> NodeHandle {
    let output_path = work_dir.join("report.txt");
    let node = graph
        .add_node(NodeHandle::new("report", ["value", "extra_logging"]))
        .unwrap();
    node.set_arg("value", ArgSlotValue::Literal(ArgumentValue::Int(value)))
        .unwrap();
    node.set_arg(
        "extra_logging",
        ArgSlotValue::Literal(ArgumentValue::Bool(extra_logging)),
    )
    .unwrap();
    node.mark_non_collateral("extra_logging");
    node.set_resource(Rc::new(FsResource::new(output_path.clone())));
    node.set_evaluate(move |nc| {
        let value = as_int(nc.arg("value").unwrap());
        std::fs::write(&output_path, value.to_string())
            .map_err(|err| nc.fail(format!("failed to write report: {err}")))?;
        Ok(ArgumentValue::Int(value))
    });
    node.set_load(|_nc| Ok(ArgumentValue::Int(-1)));
    node
}

/// Builds a two-node resource-backed chain (`upstream` feeding `downstream`'s resource) and
/// returns both nodes along with a shared counter of how many times `upstream`'s `evaluate` ran.
///
/// `downstream`'s `load` ignores `upstream` entirely (its `load` parameter subset is empty), so
/// once `downstream` has a matching resource on disk its second `call` must load without ever
/// calling `upstream` again.
pub fn resource_chain_with_call_counter(
    graph: &Graph,
    work_dir: &Path,
    input: i64,
) -> (NodeHandle, NodeHandle, Rc<Cell<u32>>) {
    let upstream_calls = Rc::new(Cell::new(0));
    let counter = upstream_calls.clone();

    let upstream = graph.add_node(NodeHandle::new("upstream", ["x"])).unwrap();
    upstream
        .set_arg("x", ArgSlotValue::Literal(ArgumentValue::Int(input)))
        .unwrap();
    upstream.set_evaluate(move |nc| {
        counter.set(counter.get() + 1);
        Ok(nc.arg("x").cloned().unwrap())
    });

    let downstream_path = work_dir.join("downstream.txt");
    let downstream = graph
        .add_node(NodeHandle::new("downstream", ["upstream"]))
        .unwrap();
    downstream
        .set_arg(
            "upstream",
            ArgSlotValue::Node(Rc::new(ReturnSelectorLink::whole(upstream.clone()))),
        )
        .unwrap();
    downstream.set_resource(Rc::new(FsResource::new(downstream_path.clone())));
    downstream.set_evaluate(move |nc| {
        let value = as_int(nc.arg("upstream").unwrap());
        std::fs::write(&downstream_path, value.to_string())
            .map_err(|err| nc.fail(format!("failed to write: {err}")))?;
        Ok(ArgumentValue::Int(value))
    });
    downstream.set_load(|_nc| Ok(ArgumentValue::Int(-1)));

    (upstream, downstream, upstream_calls)
}

/// Builds a reusable two-node sub-workflow (`square`, then `add_one`) and attaches two copies of
/// it into `graph` under distinct prefixes, demonstrating `Graph::prefix`.
pub fn two_prefixed_copies(graph: &Graph, input: i64) -> (NodeHandle, NodeHandle) {
    let left = build_square_and_increment(&graph.prefix("left."), input);
    let right = build_square_and_increment(&graph.prefix("right."), input + 1);
    (left, right)
}

fn build_square_and_increment(scope: &graph_core::Subgraph, input: i64) -> NodeHandle {
    let square = scope
        .add_node(NodeHandle::new("square", ["x"]))
        .unwrap();
    square
        .set_arg("x", ArgSlotValue::Literal(ArgumentValue::Int(input)))
        .unwrap();
    square.set_evaluate(|nc| {
        let x = as_int(nc.arg("x").unwrap());
        Ok(ArgumentValue::Int(x * x))
    });

    let increment = scope
        .add_node(NodeHandle::new("add_one", ["x"]))
        .unwrap();
    increment
        .set_arg(
            "x",
            ArgSlotValue::Node(Rc::new(ReturnSelectorLink::whole(square))),
        )
        .unwrap();
    increment.set_evaluate(|nc| Ok(ArgumentValue::Int(as_int(nc.arg("x").unwrap()) + 1)));
    increment
}

fn as_int(value: &ArgumentValue) -> i64 {
    match value {
        ArgumentValue::Int(n) => *n,
        other => panic!("expected an int, got {other:?}"),
    }
}
