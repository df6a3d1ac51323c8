// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Graph loading from a JSON manifest.
//!
//! The manifest names every value and wires nodes by name:
//!
//! ```json
//! {
//!   "name": "two_step_add",
//!   "inputs": [{ "name": "x", "kind": "tensor" }],
//!   "constants": [
//!     { "name": "c", "shape": [2], "data": [1.0, 2.0] },
//!     { "name": "s", "ints": [2, 2] }
//!   ],
//!   "nodes": [
//!     { "kind": "add", "inputs": ["x", "x"], "output": "y" },
//!     { "kind": "add", "inputs": ["y", "y"], "output": "z" }
//!   ],
//!   "outputs": ["z"]
//! }
//! ```
//!
//! Constant tensor payloads are either inline (`data`) or live in a
//! sidecar binary blob (`data_file` + `offset`, little-endian f32, read
//! via memory-mapped I/O so large constant pools are not copied through
//! a parse buffer).

use crate::{Graph, GraphBuilder, GraphError, OpKind, ValueId, ValueKind};
use std::collections::HashMap;
use std::path::Path;
use tensor_core::{IValue, Shape, Tensor};

/// A graph input declaration in the manifest.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ManifestInput {
    /// Value name.
    pub name: String,
    /// Static type of the input.
    pub kind: ValueKind,
}

/// A constant declaration in the manifest.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ManifestConstant {
    /// Value name.
    pub name: String,
    /// Tensor shape; required for tensor constants.
    #[serde(default)]
    pub shape: Option<Vec<usize>>,
    /// Inline f32 payload.
    #[serde(default)]
    pub data: Option<Vec<f32>>,
    /// Sidecar blob holding the payload, relative to the manifest.
    #[serde(default)]
    pub data_file: Option<String>,
    /// Byte offset of the payload within `data_file`.
    #[serde(default)]
    pub offset: u64,
    /// Integer-list payload (shape arguments and the like).
    #[serde(default)]
    pub ints: Option<Vec<i64>>,
}

/// A node declaration in the manifest.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ManifestNode {
    /// Operator kind.
    pub kind: OpKind,
    /// Input value names.
    pub inputs: Vec<String>,
    /// Output value name.
    pub output: String,
}

/// The JSON graph manifest.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct GraphManifest {
    /// Graph name.
    pub name: String,
    /// Graph inputs.
    pub inputs: Vec<ManifestInput>,
    /// Constants, materialized before any node executes.
    #[serde(default)]
    pub constants: Vec<ManifestConstant>,
    /// Nodes in program order.
    pub nodes: Vec<ManifestNode>,
    /// Graph output names.
    pub outputs: Vec<String>,
}

/// Loads a [`Graph`] from a JSON manifest file.
pub struct GraphLoader;

impl GraphLoader {
    /// Reads and parses `path`, then builds the graph. Sidecar blobs are
    /// resolved relative to the manifest's directory.
    pub fn load(path: &Path) -> Result<Graph, GraphError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| GraphError::Io(format!("cannot read '{}': {e}", path.display())))?;
        let manifest: GraphManifest =
            serde_json::from_str(&content).map_err(|e| GraphError::Parse(e.to_string()))?;
        let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
        Self::from_manifest(&manifest, base_dir)
    }

    /// Builds a graph from an in-memory manifest.
    pub fn from_manifest(manifest: &GraphManifest, base_dir: &Path) -> Result<Graph, GraphError> {
        let mut builder = GraphBuilder::new(&manifest.name);
        let mut by_name: HashMap<String, ValueId> = HashMap::new();

        fn define(
            by_name: &mut HashMap<String, ValueId>,
            name: &str,
            id: ValueId,
        ) -> Result<(), GraphError> {
            if by_name.insert(name.to_string(), id).is_some() {
                return Err(GraphError::DuplicateValue(name.to_string()));
            }
            Ok(())
        }

        for input in &manifest.inputs {
            let id = builder.input(&input.name, input.kind);
            define(&mut by_name, &input.name, id)?;
        }

        for constant in &manifest.constants {
            let value = materialize_constant(constant, base_dir)?;
            let id = builder.constant(&constant.name, value);
            define(&mut by_name, &constant.name, id)?;
        }

        for node in &manifest.nodes {
            let mut inputs = Vec::with_capacity(node.inputs.len());
            for name in &node.inputs {
                let id = *by_name
                    .get(name)
                    .ok_or_else(|| GraphError::UnknownValue(name.clone()))?;
                inputs.push(id);
            }
            let out = builder.op_named(node.kind, inputs, Some(&node.output));
            define(&mut by_name, &node.output, out)?;
        }

        for name in &manifest.outputs {
            let id = *by_name
                .get(name)
                .ok_or_else(|| GraphError::UnknownValue(name.clone()))?;
            builder.output(id);
        }

        let graph = builder.finish()?;
        tracing::info!(
            name = %graph.name(),
            nodes = graph.nodes().len(),
            inputs = graph.inputs().len(),
            outputs = graph.outputs().len(),
            "graph loaded"
        );
        Ok(graph)
    }
}

/// Materializes one manifest constant into an [`IValue`].
fn materialize_constant(c: &ManifestConstant, base_dir: &Path) -> Result<IValue, GraphError> {
    if let Some(ints) = &c.ints {
        return Ok(IValue::IntList(ints.clone()));
    }

    let shape = Shape::new(c.shape.clone().ok_or_else(|| GraphError::BadConstant {
        name: c.name.clone(),
        detail: "tensor constant without a shape".into(),
    })?);

    if let Some(data) = &c.data {
        return Ok(Tensor::from_f32(shape, data)?.into());
    }

    let file = c.data_file.as_ref().ok_or_else(|| GraphError::BadConstant {
        name: c.name.clone(),
        detail: "constant has neither inline data nor a data file".into(),
    })?;
    let path = base_dir.join(file);
    let file = std::fs::File::open(&path)
        .map_err(|e| GraphError::Io(format!("cannot open '{}': {e}", path.display())))?;

    // Memory-map the blob; only the requested window is copied out.
    let mmap = unsafe { memmap2::Mmap::map(&file) }
        .map_err(|e| GraphError::Io(format!("mmap failed for '{}': {e}", path.display())))?;

    let nbytes = shape.size_bytes(tensor_core::DType::F32);
    let start = c.offset as usize;
    let end = start.checked_add(nbytes).filter(|&e| e <= mmap.len()).ok_or_else(|| {
        GraphError::BadConstant {
            name: c.name.clone(),
            detail: format!(
                "payload window {start}..{} exceeds blob of {} bytes",
                start + nbytes,
                mmap.len()
            ),
        }
    })?;

    Ok(Tensor::from_bytes(shape, tensor_core::DType::F32, mmap[start..end].to_vec())?.into())
}
