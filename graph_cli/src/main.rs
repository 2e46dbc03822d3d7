//! Demo binary wiring [`graph_cli`]'s front end to the sample `add`/`sub` workflow from
//! `graph_examples`. A real workflow author's own binary would build their own
//! [`graph_core::Graph`] and call [`graph_cli::dispatch`] the same way.

use clap::Parser;
use graph_core::Graph;

/// Controls whether an error exits tersely or re-raises with a full backtrace.
const DEBUG_ENV_VAR: &str = "GRAPH_DEBUG";

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = graph_cli::Cli::parse();
    let debug = std::env::var(DEBUG_ENV_VAR).is_ok_and(|v| v != "0");

    let work_dir = std::env::current_dir().expect("read current directory");
    let graph = match Graph::open("graph_examples_demo", &work_dir) {
        Ok(graph) => graph,
        Err(err) => {
            eprintln!("error: failed to open graph at {}: {err}", work_dir.display());
            std::process::exit(1);
        }
    };
    graph_examples::add_sub_chain(&graph, 2, 3);

    if let Err(err) = graph_cli::dispatch(&graph, &cli) {
        if debug {
            panic!("{err}");
        }
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}
