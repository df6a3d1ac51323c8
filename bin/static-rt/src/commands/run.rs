// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! `static-rt run`: compile a graph and execute it once.

use graph_ir::GraphLoader;
use static_runtime::{StaticModule, StaticModuleOptions};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Instant;

pub async fn execute(
    graph_path: PathBuf,
    shapes: String,
    inputs_file: Option<PathBuf>,
    options: StaticModuleOptions,
) -> anyhow::Result<()> {
    let graph = GraphLoader::load(&graph_path)?;
    println!("{graph}");

    let compile_start = Instant::now();
    let mut module = StaticModule::from_graph(graph, options)?;
    tracing::info!(
        elapsed_ms = compile_start.elapsed().as_secs_f64() * 1000.0,
        "module compiled"
    );

    let args = super::build_inputs(&shapes, inputs_file.as_deref())?;
    if args.len() != module.num_inputs() {
        anyhow::bail!(
            "graph wants {} inputs, got {} (use --shapes or --inputs)",
            module.num_inputs(),
            args.len()
        );
    }

    let start = Instant::now();
    let output = module.invoke(args, &HashMap::new())?;
    let elapsed = start.elapsed();

    println!();
    println!("Output: {}", super::render_output(&output));
    println!("First run took {:.3} ms", elapsed.as_secs_f64() * 1000.0);

    if let Some(planner) = module.runtime().planner() {
        println!(
            "Arena: {} bytes managed, {} storage classes, {} managed tensors",
            planner.total_managed(),
            planner.num_storage_classes(),
            planner.num_managed_tensors(),
        );
    }

    Ok(())
}
