// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! A frozen module: a graph bundled with its calling convention.

use crate::{FunctionSchema, Graph};
use tensor_core::IValue;

/// A frozen module ready for static-runtime compilation.
///
/// Freezing (attribute inlining, eval-mode cleanup) happens upstream;
/// this type only carries the result: the `forward` graph, its schema,
/// and the module-self value to bind when the graph's first input is
/// `self`.
#[derive(Debug, Clone)]
pub struct FrozenModule {
    /// The frozen `forward` graph.
    pub graph: Graph,
    /// Calling convention, including the leading `self` argument.
    pub schema: FunctionSchema,
    /// The value bound to a used `self` input at invocation time.
    pub self_value: IValue,
}

impl FrozenModule {
    /// Wraps an already-frozen graph and schema.
    pub fn new(graph: Graph, schema: FunctionSchema) -> Self {
        Self {
            graph,
            schema,
            self_value: IValue::None,
        }
    }

    /// Sets the module-self value.
    pub fn with_self_value(mut self, value: IValue) -> Self {
        self.self_value = value;
        self
    }
}
