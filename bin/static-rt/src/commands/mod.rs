// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Shared command plumbing: logging, option loading, input parsing.

pub mod benchmark;
pub mod inspect;
pub mod run;

use static_runtime::StaticModuleOptions;
use std::path::Path;
use tensor_core::{IValue, Shape, Tensor};

/// Initializes tracing based on the `-v` count.
pub fn init_tracing(verbosity: u8) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(verbosity >= 2)
        .init();
}

/// Loads module options from a TOML file, or returns the defaults.
pub fn load_options(config: Option<&Path>) -> anyhow::Result<StaticModuleOptions> {
    match config {
        Some(path) => {
            let content = std::fs::read_to_string(path)
                .map_err(|e| anyhow::anyhow!("cannot read config '{}': {e}", path.display()))?;
            let options: StaticModuleOptions = toml::from_str(&content)
                .map_err(|e| anyhow::anyhow!("config parse error: {e}"))?;
            Ok(options)
        }
        None => Ok(StaticModuleOptions::default()),
    }
}

/// Applies command-line flag overrides on top of the loaded options.
pub fn apply_flags(
    mut options: StaticModuleOptions,
    flags: &crate::OptionFlags,
) -> StaticModuleOptions {
    if flags.no_cleanup {
        options.cleanup_activations = false;
    }
    if flags.no_out_variant {
        options.enable_out_variant = false;
        options.optimize_memory = false;
        options.optimize_graph_output_memory = false;
    }
    if flags.no_optimize_memory {
        options.optimize_memory = false;
        options.optimize_graph_output_memory = false;
    }
    if flags.optimize_graph_output_memory {
        options.optimize_graph_output_memory = true;
    }
    options
}

/// One explicit input tensor in an `--inputs` JSON file.
#[derive(serde::Deserialize)]
pub struct InputSpec {
    pub shape: Vec<usize>,
    pub data: Vec<f32>,
}

/// Builds input tensors from an explicit JSON file or from `--shapes`
/// (ones-filled).
pub fn build_inputs(
    shapes: &str,
    inputs_file: Option<&Path>,
) -> anyhow::Result<Vec<IValue>> {
    if let Some(path) = inputs_file {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("cannot read inputs '{}': {e}", path.display()))?;
        let specs: Vec<InputSpec> = serde_json::from_str(&content)
            .map_err(|e| anyhow::anyhow!("inputs parse error: {e}"))?;
        return specs
            .into_iter()
            .map(|spec| {
                Tensor::from_f32(Shape::new(spec.shape), &spec.data)
                    .map(IValue::Tensor)
                    .map_err(|e| anyhow::anyhow!("bad input tensor: {e}"))
            })
            .collect();
    }

    if shapes.trim().is_empty() {
        return Ok(Vec::new());
    }
    shapes
        .split(',')
        .map(|spec| {
            let dims: Result<Vec<usize>, _> = spec
                .trim()
                .split('x')
                .map(|d| d.parse::<usize>())
                .collect();
            let dims = dims.map_err(|e| anyhow::anyhow!("bad shape '{spec}': {e}"))?;
            let shape = Shape::new(dims);
            let ones = vec![1.0f32; shape.num_elements()];
            Ok(IValue::Tensor(
                Tensor::from_f32(shape, &ones).map_err(|e| anyhow::anyhow!("{e}"))?,
            ))
        })
        .collect()
}

/// Renders an output value for the terminal.
pub fn render_output(value: &IValue) -> String {
    match value {
        IValue::Tensor(t) => {
            let data = t.as_f32_slice();
            let preview: Vec<String> = data.iter().take(16).map(|v| format!("{v}")).collect();
            let ellipsis = if data.len() > 16 { ", …" } else { "" };
            format!("tensor {} [{}{}]", t.shape(), preview.join(", "), ellipsis)
        }
        IValue::Tuple(values) => {
            let inner: Vec<String> = values.iter().map(render_output).collect();
            format!("({})", inner.join(", "))
        }
        other => other.summary(),
    }
}
