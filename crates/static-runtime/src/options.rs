// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Module compilation options.

use crate::RuntimeError;

/// Options controlling how a [`crate::StaticModule`] is compiled and how
/// its runtimes manage memory.
#[derive(Debug, Clone, Copy, serde::Serialize, serde::Deserialize)]
pub struct StaticModuleOptions {
    /// Run the memory planner: deallocate intermediate activations at the
    /// end of every invocation and reuse a learned-size arena.
    #[serde(default = "default_true")]
    pub cleanup_activations: bool,
    /// Permit dispatching to out-variant kernels.
    #[serde(default = "default_true")]
    pub enable_out_variant: bool,
    /// Run the liveness/alias analyses and share storage between
    /// non-overlapping intermediates. Requires `enable_out_variant`.
    #[serde(default = "default_true")]
    pub optimize_memory: bool,
    /// Additionally plan storage for graph-escape tensors. Requires both
    /// flags above. Accepted and validated; the planner currently always
    /// keeps graph outputs out of the arena.
    #[serde(default)]
    pub optimize_graph_output_memory: bool,
}

fn default_true() -> bool {
    true
}

impl Default for StaticModuleOptions {
    fn default() -> Self {
        Self {
            cleanup_activations: true,
            enable_out_variant: true,
            optimize_memory: true,
            optimize_graph_output_memory: false,
        }
    }
}

impl StaticModuleOptions {
    /// Checks the inter-option implications.
    pub fn validate(&self) -> Result<(), RuntimeError> {
        if self.optimize_graph_output_memory && !(self.enable_out_variant && self.optimize_memory) {
            return Err(RuntimeError::InvalidOptions(
                "optimize_graph_output_memory requires enable_out_variant and optimize_memory"
                    .into(),
            ));
        }
        if self.optimize_memory && !self.enable_out_variant {
            return Err(RuntimeError::InvalidOptions(
                "optimize_memory requires enable_out_variant".into(),
            ));
        }
        Ok(())
    }
}
