//! A reusable `run`/`clean`/`touch`/`help`/`viz-dag` command surface for a [`graph_core::Graph`].
//!
//! A small, generic dispatcher that any workflow author's own binary can call against the
//! [`graph_core::Graph`] they built, rather than an engine-provided binary baking in a particular
//! workflow. `graph_cli`'s own `main.rs` is one such caller, wired to the sample workflows in
//! `graph_examples`.

use std::io::Write;

use clap::{Parser, Subcommand};
use graph_core::{Graph, NodeHandle, WorkflowError};

/// Command-line arguments for one invocation of the front end.
#[derive(Debug, Parser)]
#[command(name = "graph-cli", about = "Run, inspect and visualize a workflow graph")]
pub struct Cli {
    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Command,
}

/// The five operations the front end exposes (spec §6).
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Brings a node up to date and prints its output.
    Run {
        /// The node to bring up to date.
        node: String,
        /// Force re-evaluation even if the node's signature would say it is clean.
        #[arg(long)]
        redo: bool,
    },
    /// Erases a node's resource and forgets its persisted signature and measurement.
    Clean {
        /// The node to clear.
        node: String,
    },
    /// Records a node as clean without running `evaluate`/`load`.
    Touch {
        /// The node to touch.
        node: String,
    },
    /// Prints a node's declared help text.
    Help {
        /// The node to describe. Omit to list every node in the graph.
        node: Option<String>,
    },
    /// Renders the graph's node/edge structure as Graphviz DOT.
    VizDag {
        /// Where to write the rendered DOT source. Defaults to stdout.
        #[arg(long)]
        output: Option<std::path::PathBuf>,
    },
}

/// Runs `cli`'s command against `graph`.
///
/// # Errors
/// Returns an error if the named node does not exist, or if running it fails.
pub fn dispatch(graph: &Graph, cli: &Cli) -> Result<(), WorkflowError> {
    match &cli.command {
        Command::Run { node, redo } => {
            let node = lookup(graph, node)?;
            let output = node.call(*redo)?;
            println!("{output:?}");
            Ok(())
        }
        Command::Clean { node } => lookup(graph, node)?.clear(),
        Command::Touch { node } => lookup(graph, node)?.touch(),
        Command::Help { node } => {
            match node {
                Some(name) => {
                    let node = lookup(graph, name)?;
                    println!("{}", node.help_text().unwrap_or_else(|| "(no help text set)".to_owned()));
                }
                None => {
                    for name in graph.node_names() {
                        println!("{name}");
                    }
                }
            }
            Ok(())
        }
        Command::VizDag { output } => render_viz_dag(graph, output.as_deref()),
    }
}

fn lookup(graph: &Graph, name: &str) -> Result<NodeHandle, WorkflowError> {
    graph
        .get(name)
        .ok_or_else(|| WorkflowError::schema(name, "no such node in this graph"))
}

fn render_viz_dag(graph: &Graph, output: Option<&std::path::Path>) -> Result<(), WorkflowError> {
    let dot_graph = DotGraph::from_graph(graph);
    let mut bytes = Vec::new();
    dot::render(&dot_graph, &mut bytes)
        .map_err(|err| WorkflowError::Codec(format!("failed to render dot: {err}")))?;

    match output {
        Some(path) => std::fs::write(path, bytes).map_err(WorkflowError::Io),
        None => std::io::stdout().write_all(&bytes).map_err(WorkflowError::Io),
    }
}

struct DotGraph {
    name: String,
    nodes: Vec<String>,
    edges: Vec<(String, String, bool)>,
}

impl DotGraph {
    fn from_graph(graph: &Graph) -> Self {
        let mut nodes = Vec::new();
        let mut edges = Vec::new();
        for name in graph.node_names() {
            let node = graph.get(name.as_str()).expect("name came from node_names");
            nodes.push(name.to_string());
            for edge in node.edges() {
                let is_marker = edge.kind == graph_core::EdgeKind::DependencyMarker;
                edges.push((edge.dependency.to_string(), name.to_string(), is_marker));
            }
        }
        Self {
            name: graph.name().to_owned(),
            nodes,
            edges,
        }
    }
}

impl<'a> dot::Labeller<'a, String, (String, String, bool)> for DotGraph {
    fn graph_id(&'a self) -> dot::Id<'a> {
        dot::Id::new(sanitize(&self.name)).unwrap()
    }

    fn node_id(&'a self, n: &String) -> dot::Id<'a> {
        dot::Id::new(sanitize(n)).unwrap()
    }

    fn edge_style(&'a self, edge: &(String, String, bool)) -> dot::Style {
        if edge.2 {
            dot::Style::Dashed
        } else {
            dot::Style::None
        }
    }
}

impl<'a> dot::GraphWalk<'a, String, (String, String, bool)> for DotGraph {
    fn nodes(&'a self) -> dot::Nodes<'a, String> {
        self.nodes.clone().into()
    }

    fn edges(&'a self) -> dot::Edges<'a, (String, String, bool)> {
        self.edges.clone().into()
    }

    fn source(&self, edge: &(String, String, bool)) -> String {
        edge.0.clone()
    }

    fn target(&self, edge: &(String, String, bool)) -> String {
        edge.1.clone()
    }
}

fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_alphanumeric() { c } else { '_' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use graph_core::{ArgSlotValue, ArgumentValue, MemorySignatureStore};

    fn test_graph(dir: &std::path::Path) -> Graph {
        Graph::new("g", dir, Box::new(MemorySignatureStore::new()))
    }

    #[test]
    fn run_prints_node_output_and_persists_signature() {
        let dir = tempfile::tempdir().unwrap();
        let graph = test_graph(dir.path());
        let node = graph.add_node(NodeHandle::new("n", ["x"])).unwrap();
        node.set_arg("x", ArgSlotValue::Literal(ArgumentValue::Int(1)))
            .unwrap();
        node.set_evaluate(|nc| Ok(nc.arg("x").cloned().unwrap()));

        let cli = Cli {
            command: Command::Run {
                node: "n".to_owned(),
                redo: false,
            },
        };
        dispatch(&graph, &cli).unwrap();
    }

    #[test]
    fn run_on_unknown_node_is_a_schema_error() {
        let dir = tempfile::tempdir().unwrap();
        let graph = test_graph(dir.path());
        let cli = Cli {
            command: Command::Run {
                node: "missing".to_owned(),
                redo: false,
            },
        };
        let err = dispatch(&graph, &cli).unwrap_err();
        assert!(matches!(err, WorkflowError::Schema { .. }));
    }

    #[test]
    fn viz_dag_renders_valid_utf8_dot_source() {
        let dir = tempfile::tempdir().unwrap();
        let graph = test_graph(dir.path());
        let _ = graph_examples::add_sub_chain(&graph, 1, 2);

        let dot_graph = DotGraph::from_graph(&graph);
        let mut bytes = Vec::new();
        dot::render(&dot_graph, &mut bytes).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.contains("digraph"));
        assert!(text.contains("sum"));
        assert!(text.contains("diff"));
    }
}
