// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for graph construction and schema handling.

/// Errors that can occur while building or loading a graph.
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    /// The graph as a whole is malformed.
    #[error("invalid graph: {0}")]
    InvalidGraph(String),

    /// A node disagrees with its operator schema.
    #[error("invalid node '{kind}': {detail}")]
    InvalidNode { kind: String, detail: String },

    /// A manifest referenced a value name that was never defined.
    #[error("unknown value '{0}'")]
    UnknownValue(String),

    /// A manifest defined the same value name twice.
    #[error("duplicate value '{0}'")]
    DuplicateValue(String),

    /// Reading the manifest or a data blob failed.
    #[error("manifest I/O error: {0}")]
    Io(String),

    /// The manifest JSON could not be parsed.
    #[error("manifest parse error: {0}")]
    Parse(String),

    /// A constant entry in the manifest is unusable.
    #[error("bad constant '{name}': {detail}")]
    BadConstant { name: String, detail: String },

    /// A tensor payload could not be materialized.
    #[error(transparent)]
    Tensor(#[from] tensor_core::TensorError),
}

/// Errors raised while normalizing call arguments against a
/// [`crate::FunctionSchema`].
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    /// The number of provided arguments disagrees with the schema.
    #[error("arity mismatch: schema expects {expected} arguments, got {actual}")]
    ArityMismatch { expected: usize, actual: usize },

    /// A provided value has the wrong type for its argument slot.
    #[error("type mismatch for argument '{arg}': expected {expected}, got {actual}")]
    TypeMismatch {
        arg: String,
        expected: &'static str,
        actual: &'static str,
    },

    /// A keyword argument does not name any schema argument.
    #[error("unknown keyword argument '{0}'")]
    UnknownKwarg(String),

    /// A schema argument received no value.
    #[error("missing argument '{0}'")]
    MissingArgument(String),

    /// The schema's leading argument is not `self` where one is required.
    #[error("schema has no leading 'self' argument")]
    NoSelfArgument,
}
