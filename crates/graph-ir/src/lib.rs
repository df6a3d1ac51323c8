// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # graph-ir
//!
//! Frozen SSA dataflow graphs for the static inference runtime.
//!
//! This crate provides:
//! - [`Graph`] — an immutable, block-free sequence of [`Node`]s over SSA
//!   [`Value`]s, built via [`GraphBuilder`] or loaded from a JSON manifest.
//! - [`OpKind`] — the bounded operator vocabulary with per-op
//!   [`NodeSchema`]s (argument names, mutability, variadic arity).
//! - [`FunctionSchema`] — the graph-level calling convention used for
//!   kwargs normalization and self-argument handling.
//! - [`AliasDb`] — a narrow façade over alias analysis exposing the two
//!   predicates the runtime consumes: `may_alias` and `may_contain_alias`.
//! - [`FrozenModule`] — a graph bundled with its schema and self value.
//!
//! Graph *optimization* (constant folding, DCE, fusion) happens upstream;
//! everything here is already frozen. A graph is validated once at
//! construction: every node input must be defined by a graph input, a
//! constant, or an earlier node, which is the topological guarantee the
//! runtime's flat interpreter relies on.

mod alias;
mod error;
mod graph;
mod loader;
mod module;
mod node;
mod schema;
mod value;

pub use alias::AliasDb;
pub use error::{GraphError, SchemaError};
pub use graph::{Graph, GraphBuilder};
pub use loader::{GraphLoader, GraphManifest, ManifestConstant, ManifestInput, ManifestNode};
pub use module::FrozenModule;
pub use node::{Node, NodeId, NodeSchema, OpKind};
pub use schema::{Argument, FunctionSchema};
pub use value::{Use, Value, ValueId, ValueKind};
