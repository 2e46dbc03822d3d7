//! Runs the `add`/`sub` chain twice from a fresh signature store, showing the second run reuse
//! its persisted signature instead of recomputing.

fn main() {
    tracing_subscriber::fmt::init();

    let dir = tempfile::tempdir().expect("create scratch working directory");
    let graph = graph_core::Graph::open("add_sub_chain", dir.path()).expect("open graph");

    let (sum, diff) = graph_examples::add_sub_chain(&graph, 2, 3);
    println!("sum = {:?}", sum.call(false).unwrap());
    println!("diff = {:?}", diff.call(false).unwrap());

    graph.clear_cache();
    println!("after clear_cache, same inputs:");
    println!("sum = {:?}", sum.call(false).unwrap());
    println!("diff = {:?}", diff.call(false).unwrap());
}
