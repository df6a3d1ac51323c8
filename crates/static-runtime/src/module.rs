// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The compiled module: the immutable artifact shared by all runtimes.
//!
//! Compilation walks the frozen graph once, materializing constants into
//! an append-only pool, selecting a dispatch path per node, and wiring
//! every node input to its definition site as a `(origin, index)` record.
//! The wiring is pure data — a runtime resolves it against its own slot
//! arrays at call time, so any number of runtimes can share one module.

use crate::analysis;
use crate::{ProcessedNode, RuntimeError, StaticModuleOptions, StaticRuntime};
use graph_ir::{AliasDb, FrozenModule, FunctionSchema, Graph, OpKind, ValueId};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tensor_core::IValue;

/// Where a node input (or graph output) gets its value from.
///
/// The three origins mirror the runtime's three slot arrays: its own
/// input slots, the module's constant pool, and earlier nodes' output
/// slots. A `Node` reference always points at a strictly earlier node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueSource {
    /// The runtime's input slot at this index.
    Input(usize),
    /// The module's constant cell at this index.
    Constant(usize),
    /// Output `output` of the node at index `node`.
    Node { node: usize, output: usize },
}

/// Returns `true` if the static runtime can execute this graph: no
/// sub-blocks, and every non-constant operator resolvable through the
/// kernel registry.
pub fn can_enable_static_runtime(graph: &Graph) -> bool {
    let mut can_support = true;
    for node in graph.nodes() {
        if node.kind.has_sub_blocks() {
            tracing::warn!(node = node.id.index(), "found nested sub-blocks in graph");
            can_support = false;
        }
        if node.kind == OpKind::Constant {
            continue;
        }
        if !op_registry::is_registered(node.kind) {
            tracing::warn!(op = %node.kind, "found unsupported op");
            can_support = false;
        }
    }
    can_support
}

/// Everything a runtime needs from its module, immutable after
/// construction.
pub(crate) struct ModuleData {
    pub(crate) graph: Graph,
    pub(crate) opts: StaticModuleOptions,
    pub(crate) schema: Option<FunctionSchema>,
    pub(crate) self_value: IValue,
    pub(crate) first_input_is_self: bool,
    /// Constants pool; append-only during construction, addresses stable
    /// for the module's lifetime.
    pub(crate) constants: Vec<IValue>,
    /// Prepared node templates in execution order (constants excluded).
    pub(crate) templates: Vec<ProcessedNode>,
    /// Where each graph output comes from.
    pub(crate) output_sources: Vec<ValueSource>,
    /// Values whose live range exceeds one invocation.
    pub(crate) always_alive: HashSet<ValueId>,
    /// Storage-sharing clusters (empty unless `optimize_memory`).
    pub(crate) same_storage: analysis::SameStorageMap,
}

/// The immutable compiled artifact.
///
/// Construct once from a frozen graph or module; invoke through the
/// cached [`runtime()`](StaticModule::runtime), or create independent
/// runtimes with [`new_runtime()`](StaticModule::new_runtime) for
/// parallel lanes.
pub struct StaticModule {
    data: Arc<ModuleData>,
    cached_runtime: Option<StaticRuntime>,
}

impl StaticModule {
    /// Compiles an already-frozen graph.
    pub fn from_graph(graph: Graph, opts: StaticModuleOptions) -> Result<Self, RuntimeError> {
        Self::build(graph, None, opts)
    }

    /// Compiles a frozen module, keeping its schema for kwargs invocation
    /// and handling the leading `self` input.
    pub fn from_module(module: FrozenModule, opts: StaticModuleOptions) -> Result<Self, RuntimeError> {
        let FrozenModule {
            graph,
            schema,
            self_value,
        } = module;
        Self::build(graph, Some((schema, self_value)), opts)
    }

    fn build(
        mut graph: Graph,
        module: Option<(FunctionSchema, IValue)>,
        opts: StaticModuleOptions,
    ) -> Result<Self, RuntimeError> {
        opts.validate()?;
        tracing::info!(
            cleanup_activations = opts.cleanup_activations,
            enable_out_variant = opts.enable_out_variant,
            optimize_memory = opts.optimize_memory,
            optimize_graph_output_memory = opts.optimize_graph_output_memory,
            "compiling static module"
        );

        if !can_enable_static_runtime(&graph) {
            return Err(RuntimeError::UnsupportedGraph(format!(
                "graph '{}' has sub-blocks or unresolvable operators",
                graph.name()
            )));
        }

        // Handle the module-self input: erase it when dangling, otherwise
        // remember to bind it at invocation time.
        let mut schema = None;
        let mut self_value = IValue::None;
        let mut first_input_is_self = false;
        if let Some((module_schema, module_self)) = module {
            let first_is_module = graph
                .inputs()
                .first()
                .map(|&v| graph.value(v).kind == graph_ir::ValueKind::Module)
                .unwrap_or(false);
            if first_is_module {
                if graph.value(graph.inputs()[0]).has_uses() {
                    first_input_is_self = true;
                    schema = Some(module_schema);
                } else {
                    graph
                        .remove_unused_input(0)
                        .map_err(|e| RuntimeError::MalformedInput(e.to_string()))?;
                    schema = Some(
                        module_schema
                            .without_self()
                            .map_err(|e| RuntimeError::MalformedInput(e.to_string()))?,
                    );
                }
            } else {
                schema = Some(module_schema);
            }
            self_value = module_self;
        }

        let mut value_sources: HashMap<ValueId, ValueSource> = HashMap::new();
        for (i, &input) in graph.inputs().iter().enumerate() {
            value_sources.insert(input, ValueSource::Input(i));
        }

        // Fill constants first so the pool is complete before any node
        // template references it.
        let mut constants: Vec<IValue> = Vec::new();
        for node in graph.nodes() {
            if node.kind != OpKind::Constant {
                continue;
            }
            let payload = node
                .constant
                .clone()
                .ok_or_else(|| RuntimeError::MalformedInput("constant without payload".into()))?;
            value_sources.insert(node.output(), ValueSource::Constant(constants.len()));
            constants.push(payload);
        }

        // Build templates for non-constant nodes, wiring inputs to the
        // sources accumulated so far.
        let mut templates: Vec<ProcessedNode> = Vec::new();
        for node in graph.nodes() {
            if node.kind == OpKind::Constant {
                continue;
            }
            let node_idx = templates.len();
            let mut inputs = Vec::with_capacity(node.inputs.len());
            for &input in &node.inputs {
                let source = value_sources.get(&input).copied().ok_or_else(|| {
                    RuntimeError::MalformedInput(format!(
                        "node input {input} has no definition"
                    ))
                })?;
                inputs.push(source);
            }
            templates.push(ProcessedNode::new(node, inputs, opts.enable_out_variant)?);
            for (i, &output) in node.outputs.iter().enumerate() {
                value_sources.insert(
                    output,
                    ValueSource::Node {
                        node: node_idx,
                        output: i,
                    },
                );
            }
        }

        let mut output_sources = Vec::with_capacity(graph.outputs().len());
        for &output in graph.outputs() {
            let source = value_sources.get(&output).copied().ok_or_else(|| {
                RuntimeError::MalformedInput(format!("graph output {output} has no definition"))
            })?;
            output_sources.push(source);
        }

        // Prepare for memory planning.
        let alias_db = AliasDb::new(&graph);
        let always_alive = analysis::always_alive_values(&graph, &alias_db);

        let same_storage = if opts.optimize_memory {
            let lm = analysis::liveness_map(&graph, &always_alive, &alias_db);
            let candidates = analysis::memory_planning_candidates(&graph);
            analysis::same_storage_values(&lm, &always_alive, &candidates, &alias_db)
        } else {
            analysis::SameStorageMap::new()
        };

        tracing::info!(
            nodes = templates.len(),
            constants = constants.len(),
            always_alive = always_alive.len(),
            "static module compiled"
        );

        Ok(Self {
            data: Arc::new(ModuleData {
                graph,
                opts,
                schema,
                self_value,
                first_input_is_self,
                constants,
                templates,
                output_sources,
                always_alive,
                same_storage,
            }),
            cached_runtime: None,
        })
    }

    /// Returns the compilation options.
    pub fn opts(&self) -> &StaticModuleOptions {
        &self.data.opts
    }

    /// Returns the underlying graph.
    pub fn graph(&self) -> &Graph {
        &self.data.graph
    }

    /// Returns the number of graph inputs (after any self erasure).
    pub fn num_inputs(&self) -> usize {
        self.data.graph.inputs().len()
    }

    /// Returns the number of graph outputs.
    pub fn num_outputs(&self) -> usize {
        self.data.graph.outputs().len()
    }

    /// Returns the constants pool.
    pub fn constants(&self) -> &[IValue] {
        &self.data.constants
    }

    /// Returns the function schema, if the module was built from a
    /// [`FrozenModule`].
    pub fn schema(&self) -> Option<&FunctionSchema> {
        self.data.schema.as_ref()
    }

    /// Returns the always-alive value set.
    pub fn always_alive(&self) -> &HashSet<ValueId> {
        &self.data.always_alive
    }

    /// Returns the storage-sharing cluster map.
    pub fn same_storage(&self) -> &analysis::SameStorageMap {
        &self.data.same_storage
    }

    /// Returns the prepared node templates.
    pub fn nodes(&self) -> &[ProcessedNode] {
        &self.data.templates
    }

    /// Returns the cached runtime, creating it on first use.
    pub fn runtime(&mut self) -> &mut StaticRuntime {
        if self.cached_runtime.is_none() {
            self.cached_runtime = Some(StaticRuntime::new(Arc::clone(&self.data)));
        }
        self.cached_runtime
            .as_mut()
            .expect("runtime was just created")
    }

    /// Creates an independent runtime over this module.
    ///
    /// Use one runtime per thread; a single runtime must never be entered
    /// concurrently.
    pub fn new_runtime(&self) -> StaticRuntime {
        StaticRuntime::new(Arc::clone(&self.data))
    }

    /// Convenience: invoke through the cached runtime.
    pub fn invoke(
        &mut self,
        args: Vec<IValue>,
        kwargs: &HashMap<String, IValue>,
    ) -> Result<IValue, RuntimeError> {
        self.runtime().invoke(args, kwargs)
    }
}
