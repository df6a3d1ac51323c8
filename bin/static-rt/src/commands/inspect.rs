// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! `static-rt inspect`: print graph structure, dispatch table, and
//! analysis summary without running anything.

use graph_ir::{AliasDb, GraphLoader};
use static_runtime::{analysis, can_enable_static_runtime, StaticModule, StaticModuleOptions};
use std::collections::HashSet;
use std::path::PathBuf;

pub async fn execute(graph_path: PathBuf, options: StaticModuleOptions) -> anyhow::Result<()> {
    let graph = GraphLoader::load(&graph_path)?;
    println!("{graph}");

    if !can_enable_static_runtime(&graph) {
        println!("Graph is NOT supported by the static runtime.");
        return Ok(());
    }

    // Analysis summary, computed the same way module compilation does.
    let db = AliasDb::new(&graph);
    let always_alive = analysis::always_alive_values(&graph, &db);
    let liveness = analysis::liveness_map(&graph, &always_alive, &db);
    let candidates = analysis::memory_planning_candidates(&graph);
    let same_storage = analysis::same_storage_values(&liveness, &always_alive, &candidates, &db);

    let mut cluster_reprs: HashSet<Vec<graph_ir::ValueId>> = HashSet::new();
    let mut shared_clusters = 0usize;
    for cluster in same_storage.values() {
        if cluster_reprs.insert(cluster.clone()) && cluster.len() > 1 {
            shared_clusters += 1;
        }
    }

    println!("Analysis:");
    println!("  values:            {}", graph.num_values());
    println!("  always-alive:      {}", always_alive.len());
    println!("  reuse candidates:  {}", candidates.0.len());
    println!("  shared clusters:   {shared_clusters}");
    println!();

    let module = StaticModule::from_graph(graph, options)?;
    println!("Dispatch:");
    for (i, node) in module.nodes().iter().enumerate() {
        println!("  node #{i:<3} {:<16} {}", node.kind().as_str(), node.dispatch_kind());
    }
    println!();
    println!(
        "Module: {} nodes, {} constants, {} inputs, {} outputs",
        module.nodes().len(),
        module.constants().len(),
        module.num_inputs(),
        module.num_outputs(),
    );

    Ok(())
}
