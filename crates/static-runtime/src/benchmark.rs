// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Benchmark harness: whole-model and per-node timings.
//!
//! Not part of the hot path. [`StaticRuntime::benchmark`] measures
//! ms-per-iteration over the full invocation, then re-runs with per-node
//! instrumentation to break the time down by node and by operator kind,
//! including the memory planner's allocate/deallocate cost and arena
//! statistics. A benchmark run follows exactly the same execution and
//! cleanup discipline as a plain invocation, so the runtime's observable
//! state afterwards matches `invoke`.

use crate::{RuntimeError, StaticRuntime};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::time::Instant;
use tensor_core::{IValue, InferenceMode};

/// Per-node and per-kind timing breakdown of one benchmark run.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct IndividualMetrics {
    /// Time to bind inputs, in milliseconds.
    pub setup_time_ms: f64,
    /// Arena allocation time per iteration.
    pub memory_alloc_time_ms: f64,
    /// Planner deallocate (and input cleanup) time per iteration.
    pub memory_dealloc_time_ms: f64,
    /// Output extraction and release time per iteration.
    pub output_dealloc_time_ms: f64,
    /// Sum of per-node times.
    pub total_time_ms: f64,
    /// Average milliseconds per node, indexed like the node vector.
    pub time_per_node_ms: Vec<f64>,
    /// Milliseconds accumulated per operator kind.
    pub time_per_node_kind: BTreeMap<String, f64>,
    /// Percentage of total time per operator kind.
    pub percent_per_node_kind: BTreeMap<String, f64>,
    /// Node count per operator kind.
    pub instances_per_node_kind: BTreeMap<String, usize>,
    /// Kinds that dispatched to an out-variant kernel.
    pub out_kinds: BTreeSet<String>,
    /// Number of out-variant nodes.
    pub out_nodes_count: usize,
    /// Total number of nodes.
    pub total_nodes_count: usize,
}

/// Everything `benchmark` measured, ready for display.
#[derive(Debug, Clone, serde::Serialize)]
pub struct BenchmarkReport {
    /// Whole-invocation milliseconds per iteration.
    pub ms_per_iter: f64,
    /// Per-node breakdown.
    pub metrics: IndividualMetrics,
    /// One description line per node (kind and dispatch path).
    pub node_descriptions: Vec<String>,
    /// Arena bytes under management, when a planner exists.
    pub total_managed_bytes: Option<usize>,
    /// Tensors sharing a region with another tensor, when memory
    /// optimization is on.
    pub reused_tensors: Option<usize>,
}

impl StaticRuntime {
    /// Measures whole-model time: `warmup_runs` unmeasured invocations,
    /// then the average over `main_runs`. Returns milliseconds per
    /// iteration.
    pub fn benchmark_model(
        &mut self,
        args: Vec<IValue>,
        kwargs: &HashMap<String, IValue>,
        warmup_runs: usize,
        main_runs: usize,
    ) -> Result<f64, RuntimeError> {
        if main_runs < 1 {
            return Err(RuntimeError::InvalidOptions(
                "benchmark requires main_runs >= 1".into(),
            ));
        }
        for _ in 0..warmup_runs {
            self.invoke(args.clone(), kwargs)?;
        }
        let start = Instant::now();
        for _ in 0..main_runs {
            self.invoke(args.clone(), kwargs)?;
        }
        Ok(start.elapsed().as_secs_f64() * 1000.0 / main_runs as f64)
    }

    /// Per-node instrumented benchmark. Mirrors `invoke` step for step,
    /// timing each phase separately.
    pub fn benchmark_individual_ops(
        &mut self,
        args: Vec<IValue>,
        kwargs: &HashMap<String, IValue>,
        warmup_runs: usize,
        main_runs: usize,
    ) -> Result<IndividualMetrics, RuntimeError> {
        if main_runs < 1 {
            return Err(RuntimeError::InvalidOptions(
                "benchmark requires main_runs >= 1".into(),
            ));
        }
        let _inference = InferenceMode::guard();

        let mut metrics = IndividualMetrics {
            time_per_node_ms: vec![0.0; self.nodes().len()],
            ..IndividualMetrics::default()
        };

        let timer = Instant::now();
        self.set_inputs(args.clone(), kwargs)?;
        metrics.setup_time_ms = timer.elapsed().as_secs_f64() * 1000.0;

        for _ in 0..warmup_runs {
            self.invoke(args.clone(), kwargs)?;
        }

        let cleanup = self.cleanup_enabled();

        for _ in 0..main_runs {
            self.set_inputs(args.clone(), kwargs)?;

            let timer = Instant::now();
            self.planner_allocate();
            metrics.memory_alloc_time_ms += timer.elapsed().as_secs_f64() * 1000.0;

            for idx in 0..self.nodes().len() {
                let timer = Instant::now();
                self.run_node(idx)?;
                metrics.time_per_node_ms[idx] += timer.elapsed().as_secs_f64() * 1000.0;
            }

            let timer = Instant::now();
            if cleanup {
                self.ensure_planner();
                self.planner_deallocate();
            }
            metrics.memory_dealloc_time_ms += timer.elapsed().as_secs_f64() * 1000.0;

            let timer = Instant::now();
            let output = self.gather_outputs();
            if cleanup {
                self.clean_up_input_ivalues();
            }
            drop(output);
            metrics.output_dealloc_time_ms += timer.elapsed().as_secs_f64() * 1000.0;
        }

        // Post-processing: averages and per-kind aggregation.
        for (idx, per_node) in metrics.time_per_node_ms.iter_mut().enumerate() {
            *per_node /= main_runs as f64;
            let kind = self.nodes()[idx].kind().as_str().to_string();
            *metrics.time_per_node_kind.entry(kind.clone()).or_default() += *per_node;
            *metrics
                .instances_per_node_kind
                .entry(kind.clone())
                .or_default() += 1;
            if self.nodes()[idx].has_out_variant() {
                metrics.out_kinds.insert(kind);
                metrics.out_nodes_count += 1;
            }
            metrics.total_time_ms += *per_node;
        }
        metrics.total_nodes_count = self.nodes().len();
        metrics.memory_alloc_time_ms /= main_runs as f64;
        metrics.memory_dealloc_time_ms /= main_runs as f64;
        metrics.output_dealloc_time_ms /= main_runs as f64;
        for (kind, ms) in &metrics.time_per_node_kind {
            let percent = if metrics.total_time_ms > 0.0 {
                ms / metrics.total_time_ms * 100.0
            } else {
                0.0
            };
            metrics
                .percent_per_node_kind
                .insert(kind.clone(), percent);
        }

        Ok(metrics)
    }

    /// Full benchmark: whole-model timing plus the per-node breakdown and
    /// arena statistics, packaged for display.
    pub fn benchmark(
        &mut self,
        args: Vec<IValue>,
        kwargs: &HashMap<String, IValue>,
        warmup_runs: usize,
        main_runs: usize,
    ) -> Result<BenchmarkReport, RuntimeError> {
        let ms_per_iter = self.benchmark_model(args.clone(), kwargs, warmup_runs, main_runs)?;
        let metrics = self.benchmark_individual_ops(args, kwargs, warmup_runs, main_runs)?;

        let node_descriptions = self
            .nodes()
            .iter()
            .map(|n| format!("{} ({})", n.kind(), n.dispatch_kind()))
            .collect();

        let (total_managed_bytes, reused_tensors) = match self.planner() {
            Some(planner) => (
                Some(planner.total_managed()),
                Some(planner.total_reused_tensors()),
            ),
            None => (None, None),
        };

        self.check_for_memory_leak(false)?;

        Ok(BenchmarkReport {
            ms_per_iter,
            metrics,
            node_descriptions,
            total_managed_bytes,
            reused_tensors,
        })
    }

}

impl fmt::Display for BenchmarkReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Static runtime ms per iter: {:.4}. Iters per second: {:.1}",
            self.ms_per_iter,
            if self.ms_per_iter > 0.0 {
                1000.0 / self.ms_per_iter
            } else {
                0.0
            }
        )?;

        for (i, desc) in self.node_descriptions.iter().enumerate() {
            writeln!(
                f,
                "Node #{i}: {:.4} ms/iter, {desc}",
                self.metrics.time_per_node_ms.get(i).copied().unwrap_or(0.0)
            )?;
        }

        // Per-kind table, slowest first.
        let mut by_kind: Vec<(&String, &f64)> = self.metrics.time_per_node_kind.iter().collect();
        by_kind.sort_by(|a, b| b.1.partial_cmp(a.1).unwrap_or(std::cmp::Ordering::Equal));
        writeln!(f, "Time per node kind:")?;
        for (kind, ms) in by_kind {
            let percent = self
                .metrics
                .percent_per_node_kind
                .get(kind)
                .copied()
                .unwrap_or(0.0);
            let instances = self
                .metrics
                .instances_per_node_kind
                .get(kind)
                .copied()
                .unwrap_or(0);
            let out_tag = if self.metrics.out_kinds.contains(kind) {
                ", out variant"
            } else {
                ""
            };
            writeln!(
                f,
                "{ms:>12.4} ms. {percent:>8.2}%. {kind} ({instances} nodes{out_tag})"
            )?;
        }
        writeln!(f, "{:>12.4} ms. in Total", self.metrics.total_time_ms)?;
        writeln!(f, "StaticRuntime setup time: {:.4} ms", self.metrics.setup_time_ms)?;
        writeln!(
            f,
            "Memory allocation time: {:.4} ms",
            self.metrics.memory_alloc_time_ms
        )?;
        writeln!(
            f,
            "Memory deallocation time: {:.4} ms",
            self.metrics.memory_dealloc_time_ms
        )?;
        writeln!(
            f,
            "Outputs deallocation time: {:.4} ms",
            self.metrics.output_dealloc_time_ms
        )?;

        if let Some(managed) = self.total_managed_bytes {
            writeln!(f, "Total memory managed: {managed} bytes")?;
        }
        if let Some(reused) = self.reused_tensors {
            writeln!(f, "Total number of reused tensors: {reused}")?;
        }
        writeln!(
            f,
            "Total number of 'out' variant nodes/total number of nodes: {}/{} ({:.2}%)",
            self.metrics.out_nodes_count,
            self.metrics.total_nodes_count,
            if self.metrics.total_nodes_count > 0 {
                100.0 * self.metrics.out_nodes_count as f64
                    / self.metrics.total_nodes_count as f64
            } else {
                0.0
            }
        )
    }
}
