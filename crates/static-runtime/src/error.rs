// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for module compilation and invocation.
//!
//! Construction errors are terminal for the module; invocation errors
//! propagate to the caller and leave the runtime in a state where the
//! next invocation must still succeed.

/// Errors raised by the static runtime.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    /// The graph cannot be executed by the static runtime (sub-blocks or
    /// unresolvable operators).
    #[error("unsupported graph: {0}")]
    UnsupportedGraph(String),

    /// The option combination is contradictory.
    #[error("invalid options: {0}")]
    InvalidOptions(String),

    /// Keyword-argument invocation was used but the module carries no
    /// schema.
    #[error(
        "schema is not available; construct the module from a FrozenModule to invoke with kwargs"
    )]
    MissingSchema,

    /// The module or its inputs are malformed (e.g., self-removal
    /// failure, non-tensor value where a tensor is required).
    #[error("malformed input: {0}")]
    MalformedInput(String),

    /// The positional input count disagrees with the graph.
    #[error("arity mismatch: expected {expected} inputs, got {actual}")]
    ArityMismatch { expected: usize, actual: usize },

    /// Kwargs normalization failed (arity or type disagreement with the
    /// schema).
    #[error(transparent)]
    Schema(#[from] graph_ir::SchemaError),

    /// A kernel failed while executing a node.
    #[error("kernel failure at node {node} ({kind}): {source}")]
    Kernel {
        node: usize,
        kind: &'static str,
        #[source]
        source: op_registry::KernelError,
    },

    /// A slot other than a graph output survived cleanup (debug check).
    #[error("memory leak: {0}")]
    MemoryLeak(String),

    /// Graph loading or mutation failed.
    #[error(transparent)]
    Graph(#[from] graph_ir::GraphError),
}
