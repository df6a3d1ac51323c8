// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # static-rt
//!
//! Command-line interface for the static inference runtime.
//!
//! ## Usage
//! ```bash
//! # Run a graph once and print its outputs
//! static-rt run --graph ./model/graph.json --shapes 1x64
//!
//! # Benchmark: per-node timings, arena stats, optional parallel lanes
//! static-rt benchmark --graph ./model/graph.json --shapes 1x64 --warmup 3 --runs 100
//!
//! # Inspect: graph structure, dispatch table, analysis summary
//! static-rt inspect --graph ./model/graph.json
//! ```

mod commands;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "static-rt",
    about = "Static inference runtime for frozen dataflow graphs",
    version
)]
struct Cli {
    /// Path to a TOML file with module options (overridden by flags).
    #[arg(short, long, global = true)]
    config: Option<std::path::PathBuf>,

    /// Enable verbose logging (repeat for more: -v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

/// Option flags shared by `run` and `benchmark`.
#[derive(clap::Args)]
struct OptionFlags {
    /// Disable per-run activation cleanup (and with it the planner).
    #[arg(long)]
    no_cleanup: bool,

    /// Disable out-variant kernel dispatch.
    #[arg(long)]
    no_out_variant: bool,

    /// Disable the liveness/storage-sharing analysis.
    #[arg(long)]
    no_optimize_memory: bool,

    /// Also plan storage for graph-escape tensors.
    #[arg(long)]
    optimize_graph_output_memory: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a graph once and print its outputs.
    Run {
        /// Path to the graph manifest (JSON).
        #[arg(short, long)]
        graph: std::path::PathBuf,

        /// Input tensor shapes, comma-separated (e.g. "4,2x3"); inputs
        /// are filled with ones unless --inputs is given.
        #[arg(short, long, default_value = "")]
        shapes: String,

        /// JSON file with explicit inputs: [{"shape": [...], "data": [...]}].
        #[arg(short, long)]
        inputs: Option<std::path::PathBuf>,

        #[command(flatten)]
        options: OptionFlags,
    },

    /// Benchmark a graph: whole-model and per-node timings.
    Benchmark {
        /// Path to the graph manifest (JSON).
        #[arg(short, long)]
        graph: std::path::PathBuf,

        /// Input tensor shapes, comma-separated (e.g. "4,2x3").
        #[arg(short, long, default_value = "")]
        shapes: String,

        /// JSON file with explicit inputs.
        #[arg(short, long)]
        inputs: Option<std::path::PathBuf>,

        /// Unmeasured warmup iterations.
        #[arg(long, default_value_t = 3)]
        warmup: usize,

        /// Measured iterations.
        #[arg(long, default_value_t = 100)]
        runs: usize,

        /// Concurrent runtimes sharing the compiled module.
        #[arg(long, default_value_t = 1)]
        lanes: usize,

        #[command(flatten)]
        options: OptionFlags,
    },

    /// Print graph structure, dispatch table, and analysis summary.
    Inspect {
        /// Path to the graph manifest (JSON).
        #[arg(short, long)]
        graph: std::path::PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    commands::init_tracing(cli.verbose);

    let base_options = commands::load_options(cli.config.as_deref())?;

    match cli.command {
        Commands::Run {
            graph,
            shapes,
            inputs,
            options,
        } => {
            let opts = commands::apply_flags(base_options, &options);
            commands::run::execute(graph, shapes, inputs, opts).await
        }
        Commands::Benchmark {
            graph,
            shapes,
            inputs,
            warmup,
            runs,
            lanes,
            options,
        } => {
            let opts = commands::apply_flags(base_options, &options);
            commands::benchmark::execute(graph, shapes, inputs, warmup, runs, lanes, opts).await
        }
        Commands::Inspect { graph } => commands::inspect::execute(graph, base_options).await,
    }
}
