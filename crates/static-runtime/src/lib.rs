// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # static-runtime
//!
//! A static inference runtime for frozen dataflow graphs.
//!
//! Given a frozen, block-free graph, the runtime executes it as a flat
//! sequence of prepared nodes — no per-operation dispatch machinery, no
//! gradient bookkeeping — while a memory planner folds all intermediate
//! tensor storage into one contiguous arena whose size is learned across
//! runs. Steady-state inference performs essentially no heap allocation
//! for activations.
//!
//! # Architecture
//!
//! ```text
//! Graph ──► StaticModule ──────────► StaticRuntime ──► invoke()
//!            │  constants pool        │  input slots
//!            │  ProcessedNode         │  per-lane node copies
//!            │    templates           │  MemoryPlanner
//!            │  SSA wiring            │    (arena + learned sizes)
//!            └─ analysis results
//!               (always-alive set,
//!                same-storage clusters)
//! ```
//!
//! - [`StaticModule`] is the immutable compiled artifact, shareable
//!   across threads.
//! - [`StaticRuntime`] is one execution lane: single-threaded, reusable,
//!   never entered concurrently.
//! - [`MemoryPlanner`] assigns arena offsets to the outputs of
//!   out-variant kernels, guided by the liveness and same-storage
//!   analyses in [`analysis`].
//!
//! # Example
//! ```
//! use graph_ir::{GraphBuilder, OpKind, ValueKind};
//! use static_runtime::{StaticModule, StaticModuleOptions};
//! use tensor_core::{IValue, Shape, Tensor};
//!
//! let mut b = GraphBuilder::new("double");
//! let x = b.input("x", ValueKind::Tensor);
//! let y = b.op(OpKind::Add, vec![x, x]);
//! b.output(y);
//!
//! let mut module =
//!     StaticModule::from_graph(b.finish().unwrap(), StaticModuleOptions::default()).unwrap();
//! let t = Tensor::from_f32(Shape::vector(2), &[1.0, 2.0]).unwrap();
//! let out = module.runtime().invoke_tensors(vec![t]).unwrap();
//! assert_eq!(out[0].as_f32_slice(), &[2.0, 4.0]);
//! ```

pub mod analysis;
mod benchmark;
mod error;
mod module;
mod options;
mod planner;
mod processed_node;
mod runtime;

pub use benchmark::{BenchmarkReport, IndividualMetrics};
pub use error::RuntimeError;
pub use module::{can_enable_static_runtime, StaticModule, ValueSource};
pub use options::StaticModuleOptions;
pub use planner::{compute_aligned_tensor_size, MemoryPlanner};
pub use processed_node::ProcessedNode;
pub use runtime::StaticRuntime;
