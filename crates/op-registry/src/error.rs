// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for kernel execution.

/// Errors raised by operator kernels.
#[derive(Debug, thiserror::Error)]
pub enum KernelError {
    /// An input slot held the wrong value type.
    #[error("operator {op}: input {index} expected {expected}, got {actual}")]
    WrongInputType {
        op: &'static str,
        index: usize,
        expected: &'static str,
        actual: &'static str,
    },

    /// The operator received the wrong number of inputs.
    #[error("operator {op}: expected {expected} inputs, got {actual}")]
    WrongArity {
        op: &'static str,
        expected: usize,
        actual: usize,
    },

    /// An argument value is invalid for the operator.
    #[error("operator {op}: {detail}")]
    BadArgument { op: &'static str, detail: String },

    /// The underlying tensor operation failed.
    #[error("operator {op}: {source}")]
    Tensor {
        op: &'static str,
        #[source]
        source: tensor_core::TensorError,
    },
}
