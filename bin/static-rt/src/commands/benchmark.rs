// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! `static-rt benchmark`: whole-model and per-node timings, optionally
//! across several concurrent lanes sharing one compiled module.

use graph_ir::GraphLoader;
use static_runtime::{StaticModule, StaticModuleOptions};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Instant;
use tensor_core::IValue;

#[allow(clippy::too_many_arguments)]
pub async fn execute(
    graph_path: PathBuf,
    shapes: String,
    inputs_file: Option<PathBuf>,
    warmup: usize,
    runs: usize,
    lanes: usize,
    options: StaticModuleOptions,
) -> anyhow::Result<()> {
    let graph = GraphLoader::load(&graph_path)?;
    let mut module = StaticModule::from_graph(graph, options)?;

    let args = super::build_inputs(&shapes, inputs_file.as_deref())?;
    if args.len() != module.num_inputs() {
        anyhow::bail!(
            "graph wants {} inputs, got {} (use --shapes or --inputs)",
            module.num_inputs(),
            args.len()
        );
    }

    println!("── Per-node benchmark ──────────────────────────────────");
    let report = module
        .runtime()
        .benchmark(args.clone(), &HashMap::new(), warmup, runs)?;
    print!("{report}");

    if lanes > 1 {
        println!();
        println!("── {lanes} concurrent lanes ─────────────────────────────");
        lane_sweep(&module, args, warmup, runs, lanes).await?;
    }

    Ok(())
}

/// Runs `lanes` independent runtimes over the shared module and reports
/// aggregate throughput. One runtime per task; the module itself is
/// immutable and shared.
async fn lane_sweep(
    module: &StaticModule,
    args: Vec<IValue>,
    warmup: usize,
    runs: usize,
    lanes: usize,
) -> anyhow::Result<()> {
    let start = Instant::now();
    let mut handles = Vec::with_capacity(lanes);
    for lane in 0..lanes {
        let mut runtime = module.new_runtime();
        let lane_args = args.clone();
        handles.push(tokio::task::spawn_blocking(move || {
            for _ in 0..warmup {
                runtime.invoke(lane_args.clone(), &HashMap::new())?;
            }
            let lane_start = Instant::now();
            for _ in 0..runs {
                runtime.invoke(lane_args.clone(), &HashMap::new())?;
            }
            Ok::<_, static_runtime::RuntimeError>((lane, lane_start.elapsed()))
        }));
    }

    for handle in handles {
        let (lane, elapsed) = handle.await??;
        println!(
            "  lane {lane}: {:.4} ms/iter",
            elapsed.as_secs_f64() * 1000.0 / runs as f64
        );
    }

    let wall = start.elapsed().as_secs_f64();
    let total_invocations = (lanes * (warmup + runs)) as f64;
    println!(
        "  aggregate: {:.1} invocations/s over {lanes} lanes",
        total_invocations / wall
    );
    Ok(())
}
