// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The per-lane executor.
//!
//! A [`StaticRuntime`] owns everything one invocation mutates: the input
//! slot array, its own copy of the prepared nodes, and the memory
//! planner. The module it was created from stays immutable and shared.
//!
//! An invocation is a straight line:
//!
//! ```text
//! allocate → bind inputs → run each node in order → learn/deallocate
//!          → extract outputs
//! ```
//!
//! A runtime must never be entered concurrently; for parallel serving,
//! pool several runtimes over one module.

use crate::module::ModuleData;
use crate::{MemoryPlanner, ProcessedNode, RuntimeError, ValueSource};
use std::collections::{HashMap, HashSet};
use std::fmt::Write as _;
use std::sync::Arc;
use tensor_core::{IValue, InferenceMode, Tensor};

/// One execution lane over a compiled module.
pub struct StaticRuntime {
    module: Arc<ModuleData>,
    /// Input slots; bound per invocation, cleared by cleanup.
    inputs: Vec<IValue>,
    /// This lane's copies of the node templates.
    nodes: Vec<ProcessedNode>,
    /// Where each graph output comes from.
    output_sources: Vec<ValueSource>,
    /// Created after the first cleanup run; reused thereafter.
    planner: Option<MemoryPlanner>,
}

impl StaticRuntime {
    pub(crate) fn new(module: Arc<ModuleData>) -> Self {
        let inputs = vec![IValue::None; module.graph.inputs().len()];
        let nodes = module.templates.clone();
        let output_sources = module.output_sources.clone();
        Self {
            module,
            inputs,
            nodes,
            output_sources,
            planner: None,
        }
    }

    /// Executes one invocation with positional and keyword arguments.
    ///
    /// Returns the single graph output, or a tuple when the graph has
    /// several.
    pub fn invoke(
        &mut self,
        args: Vec<IValue>,
        kwargs: &HashMap<String, IValue>,
    ) -> Result<IValue, RuntimeError> {
        // Inference workloads need no gradient bookkeeping; flagging the
        // whole invocation saves per-op dispatch work in the tensor
        // layer.
        let _inference = InferenceMode::guard();

        if let Some(planner) = &mut self.planner {
            planner.allocate(&mut self.nodes);
        }

        self.set_inputs(args, kwargs)?;

        for idx in 0..self.nodes.len() {
            self.run_node(idx)?;
        }

        let cleanup = self.module.opts.cleanup_activations;
        if cleanup {
            // The planner is created after the first invocation on
            // purpose: it learns tensor sizes from this run to plan the
            // next one.
            self.ensure_planner();
            self.planner_deallocate();
        }

        // Outputs escape before the input slots are released, so a graph
        // output that is also a graph input survives extraction.
        let result = self.gather_outputs();

        if cleanup {
            self.clean_up_input_ivalues();
        }

        #[cfg(debug_assertions)]
        self.check_for_memory_leak(true)?;

        Ok(result)
    }

    /// Convenience overload: tensors in, tensors out.
    pub fn invoke_tensors(&mut self, inputs: Vec<Tensor>) -> Result<Vec<Tensor>, RuntimeError> {
        let args: Vec<IValue> = inputs.into_iter().map(IValue::Tensor).collect();
        let result = self.invoke(args, &HashMap::new())?;

        fn into_tensor(value: IValue) -> Result<Tensor, RuntimeError> {
            match value {
                IValue::Tensor(t) => Ok(t),
                other => Err(RuntimeError::MalformedInput(format!(
                    "graph output is {}, not a tensor",
                    other.type_tag()
                ))),
            }
        }

        match result {
            IValue::Tuple(values) => values.into_iter().map(into_tensor).collect(),
            single => Ok(vec![into_tensor(single)?]),
        }
    }

    /// Returns the memory planner, if one has been constructed yet.
    pub fn planner(&self) -> Option<&MemoryPlanner> {
        self.planner.as_ref()
    }

    /// Returns this lane's prepared nodes.
    pub fn nodes(&self) -> &[ProcessedNode] {
        &self.nodes
    }

    /// Returns the number of input slots.
    pub fn num_inputs(&self) -> usize {
        self.inputs.len()
    }

    // ── Invocation steps ───────────────────────────────────────────

    /// Binds call arguments into the input slots, normalizing kwargs via
    /// the schema and prepending the module-self value where required.
    pub(crate) fn set_inputs(
        &mut self,
        args: Vec<IValue>,
        kwargs: &HashMap<String, IValue>,
    ) -> Result<(), RuntimeError> {
        if !kwargs.is_empty() {
            let schema = self
                .module
                .schema
                .as_ref()
                .ok_or(RuntimeError::MissingSchema)?;
            let mut stack = Vec::with_capacity(self.inputs.len());
            if self.module.first_input_is_self {
                stack.push(self.module.self_value.clone());
            }
            stack.extend(args);
            schema.check_and_normalize(&mut stack, kwargs)?;
            if stack.len() != self.inputs.len() {
                return Err(RuntimeError::ArityMismatch {
                    expected: self.inputs.len(),
                    actual: stack.len(),
                });
            }
            for (slot, value) in self.inputs.iter_mut().zip(stack) {
                *slot = value;
            }
        } else if self.module.first_input_is_self {
            if args.len() + 1 != self.inputs.len() {
                return Err(RuntimeError::ArityMismatch {
                    expected: self.inputs.len() - 1,
                    actual: args.len(),
                });
            }
            self.inputs[0] = self.module.self_value.clone();
            for (slot, value) in self.inputs[1..].iter_mut().zip(args) {
                *slot = value;
            }
        } else {
            if args.len() != self.inputs.len() {
                return Err(RuntimeError::ArityMismatch {
                    expected: self.inputs.len(),
                    actual: args.len(),
                });
            }
            for (slot, value) in self.inputs.iter_mut().zip(args) {
                *slot = value;
            }
        }
        Ok(())
    }

    /// Executes node `idx`, resolving its wired inputs against this
    /// lane's slots. Inputs only ever reference strictly earlier nodes,
    /// which is what makes the split borrow below sound.
    pub(crate) fn run_node(&mut self, idx: usize) -> Result<(), RuntimeError> {
        let (prior, rest) = self.nodes.split_at_mut(idx);
        let pnode = &mut rest[0];
        let kind = pnode.kind().as_str();

        let mut resolved: Vec<&IValue> = Vec::with_capacity(pnode.inputs().len());
        for source in pnode.inputs() {
            resolved.push(match *source {
                ValueSource::Input(i) => &self.inputs[i],
                ValueSource::Constant(i) => &self.module.constants[i],
                ValueSource::Node { node, output } => &prior[node].outputs()[output],
            });
        }

        pnode.run(&resolved).map_err(|source| RuntimeError::Kernel {
            node: idx,
            kind,
            source,
        })
    }

    pub(crate) fn cleanup_enabled(&self) -> bool {
        self.module.opts.cleanup_activations
    }

    pub(crate) fn ensure_planner(&mut self) {
        if self.planner.is_none() {
            self.planner = Some(MemoryPlanner::new(&self.module, &self.nodes));
        }
    }

    pub(crate) fn planner_allocate(&mut self) {
        if let Some(planner) = &mut self.planner {
            planner.allocate(&mut self.nodes);
        }
    }

    pub(crate) fn planner_deallocate(&mut self) {
        if let Some(planner) = &mut self.planner {
            planner.deallocate(&mut self.nodes);
        }
    }

    /// Moves every graph output out of its slot, packaging multiple
    /// outputs as a tuple. Constants are cloned so the pool stays intact.
    pub(crate) fn gather_outputs(&mut self) -> IValue {
        if self.output_sources.len() > 1 {
            let sources = self.output_sources.clone();
            let outputs = sources.into_iter().map(|s| self.take_output(s)).collect();
            IValue::Tuple(outputs)
        } else {
            self.take_output(self.output_sources[0])
        }
    }

    fn take_output(&mut self, source: ValueSource) -> IValue {
        match source {
            ValueSource::Input(i) => self.inputs[i].take(),
            ValueSource::Constant(i) => self.module.constants[i].clone(),
            ValueSource::Node { node, output } => self.nodes[node].output_mut(output).take(),
        }
    }

    /// Releases the owning references held in the input slots.
    pub(crate) fn clean_up_input_ivalues(&mut self) {
        for slot in &mut self.inputs {
            *slot = IValue::None;
        }
    }

    // ── Diagnostics ────────────────────────────────────────────────

    /// Verifies that cleanup left no slot owning data it should not:
    /// inputs and unmanaged intermediates must be `None`, managed tensors
    /// must hold reset storage, and (when `output_returned`) output slots
    /// must have been moved out.
    pub fn check_for_memory_leak(&self, output_returned: bool) -> Result<(), RuntimeError> {
        if !self.module.opts.cleanup_activations {
            return Ok(());
        }

        for (i, input) in self.inputs.iter().enumerate() {
            if !input.is_none() {
                return Err(RuntimeError::MemoryLeak(format!(
                    "input {i} was not cleaned up"
                )));
            }
        }

        let output_slots: HashSet<(usize, usize)> = self
            .output_sources
            .iter()
            .filter_map(|s| match s {
                ValueSource::Node { node, output } => Some((*node, *output)),
                _ => None,
            })
            .collect();

        for (n, pnode) in self.nodes.iter().enumerate() {
            let graph_node = self.module.graph.node(pnode.node_id());
            for (i, ival) in pnode.outputs().iter().enumerate() {
                let name = &self.module.graph.value(graph_node.outputs[i]).name;
                let error =
                    || format!("output {i}, %{name} of node {n} was not cleaned up");
                if output_slots.contains(&(n, i)) {
                    if output_returned && !ival.is_none() {
                        return Err(RuntimeError::MemoryLeak(error()));
                    }
                } else if !ival.is_none() {
                    let leaked_container =
                        op_registry::is_optimizable_container_type(pnode.kind());
                    if !ival.is_tensor() && !leaked_container {
                        return Err(RuntimeError::MemoryLeak(error()));
                    }
                    if let Some(tensor) = ival.as_tensor() {
                        if tensor.has_data() {
                            return Err(RuntimeError::MemoryLeak(error()));
                        }
                    }
                }
            }
        }
        tracing::debug!("finished checking for memory leak");
        Ok(())
    }

    /// Runs one invocation and renders every node with its input and
    /// output values. Debug aid; follows the same cleanup discipline as
    /// [`invoke`](StaticRuntime::invoke) but discards the outputs.
    pub fn display_nodes(
        &mut self,
        args: Vec<IValue>,
        kwargs: &HashMap<String, IValue>,
    ) -> Result<String, RuntimeError> {
        let _inference = InferenceMode::guard();
        self.planner_allocate();
        self.set_inputs(args, kwargs)?;

        let mut rendered = String::new();
        for idx in 0..self.nodes.len() {
            self.run_node(idx)?;
            let pnode = &self.nodes[idx];
            let _ = writeln!(
                rendered,
                "Node #{idx}: {} ({})",
                pnode.kind(),
                pnode.dispatch_kind()
            );
            for (i, source) in pnode.inputs().iter().enumerate() {
                let _ = writeln!(rendered, "\ti{i}: {}", self.peek(*source).summary());
            }
            for (i, output) in pnode.outputs().iter().enumerate() {
                let _ = writeln!(rendered, "\to{i}: {}", output.summary());
            }
        }

        if self.module.opts.cleanup_activations {
            self.ensure_planner();
            self.planner_deallocate();
            self.clean_up_input_ivalues();
        }
        Ok(rendered)
    }

    fn peek(&self, source: ValueSource) -> &IValue {
        match source {
            ValueSource::Input(i) => &self.inputs[i],
            ValueSource::Constant(i) => &self.module.constants[i],
            ValueSource::Node { node, output } => &self.nodes[node].outputs()[output],
        }
    }
}

impl std::fmt::Debug for StaticRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticRuntime")
            .field("graph", &self.module.graph.name())
            .field("nodes", &self.nodes.len())
            .field("inputs", &self.inputs.len())
            .field("has_planner", &self.planner.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use crate::{StaticModule, StaticModuleOptions};
    use graph_ir::{GraphBuilder, OpKind, ValueKind};
    use tensor_core::{IValue, Shape, Tensor};

    /// y = add(x, x); z = add(y, y); return z
    fn two_step_module(opts: StaticModuleOptions) -> StaticModule {
        let mut b = GraphBuilder::new("two_step_add");
        let x = b.input("x", ValueKind::Tensor);
        let y = b.op(OpKind::Add, vec![x, x]);
        let z = b.op(OpKind::Add, vec![y, y]);
        b.output(z);
        StaticModule::from_graph(b.finish().unwrap(), opts).unwrap()
    }

    fn vec4(values: [f32; 4]) -> Tensor {
        Tensor::from_f32(Shape::vector(4), &values).unwrap()
    }

    #[test]
    fn test_slots_clean_after_cleanup_run() {
        let mut module = two_step_module(StaticModuleOptions::default());
        let rt = module.runtime();
        rt.invoke_tensors(vec![vec4([1.0, 2.0, 3.0, 4.0])]).unwrap();

        // Inputs are reset.
        for i in 0..rt.num_inputs() {
            assert_eq!(rt.inputs[i], IValue::None);
        }
        // The managed intermediate (y) keeps its tensor object with
        // reset storage; the output slot (z) was moved out.
        let y_slot = &rt.nodes()[0].outputs()[0];
        assert!(y_slot.is_tensor());
        assert!(!y_slot.as_tensor().unwrap().has_data());
        assert!(rt.nodes()[1].outputs()[0].is_none());

        rt.check_for_memory_leak(true).unwrap();
    }

    #[test]
    fn test_allocate_deallocate_without_run_keeps_managed_bytes() {
        let mut module = two_step_module(StaticModuleOptions::default());
        let rt = module.runtime();
        rt.invoke_tensors(vec![vec4([1.0; 4])]).unwrap();

        let before = rt.planner().unwrap().total_managed();
        assert!(before > 0);

        rt.planner_allocate();
        rt.planner_deallocate();
        assert_eq!(rt.planner().unwrap().total_managed(), before);
    }

    #[test]
    fn test_arena_binding_on_warm_run() {
        let mut module = two_step_module(StaticModuleOptions::default());
        let rt = module.runtime();
        rt.invoke_tensors(vec![vec4([1.0; 4])]).unwrap();

        // Warm run: the managed intermediate must land in the arena.
        rt.planner_allocate();
        let y = rt.nodes()[0].outputs()[0].as_tensor().unwrap();
        assert!(y.storage().is_arena());
        rt.planner_deallocate();
        assert!(!rt.nodes()[0].outputs()[0].as_tensor().unwrap().has_data());
    }

    #[test]
    fn test_no_cleanup_keeps_slots() {
        let mut module = two_step_module(StaticModuleOptions {
            cleanup_activations: false,
            ..StaticModuleOptions::default()
        });
        let rt = module.runtime();
        rt.invoke_tensors(vec![vec4([1.0; 4])]).unwrap();

        // Without cleanup there is no planner and intermediates persist.
        assert!(rt.planner().is_none());
        assert!(rt.nodes()[0].outputs()[0].as_tensor().unwrap().has_data());
        // The leak check is a no-op in this configuration.
        rt.check_for_memory_leak(true).unwrap();
    }

    #[test]
    fn test_arity_mismatch() {
        let mut module = two_step_module(StaticModuleOptions::default());
        let err = module.runtime().invoke_tensors(vec![]);
        assert!(matches!(
            err,
            Err(crate::RuntimeError::ArityMismatch {
                expected: 1,
                actual: 0
            })
        ));
    }

    #[test]
    fn test_kwargs_without_schema() {
        let mut module = two_step_module(StaticModuleOptions::default());
        let kwargs = std::collections::HashMap::from([(
            "x".to_string(),
            IValue::Tensor(vec4([1.0; 4])),
        )]);
        let err = module.runtime().invoke(vec![], &kwargs);
        assert!(matches!(err, Err(crate::RuntimeError::MissingSchema)));
    }

    #[test]
    fn test_failed_run_does_not_poison_next() {
        let mut module = two_step_module(StaticModuleOptions::default());
        let rt = module.runtime();
        rt.invoke_tensors(vec![vec4([1.0; 4])]).unwrap();

        // A bad input makes the first node fail mid-run.
        let err = rt.invoke(vec![IValue::Int(3)], &std::collections::HashMap::new());
        assert!(matches!(err, Err(crate::RuntimeError::Kernel { .. })));

        // The next invocation must still succeed.
        let out = rt.invoke_tensors(vec![vec4([1.0, 1.0, 1.0, 1.0])]).unwrap();
        assert_eq!(out[0].as_f32_slice(), &[4.0, 4.0, 4.0, 4.0]);
    }

    #[test]
    fn test_display_nodes_renders_every_node() {
        let mut module = two_step_module(StaticModuleOptions::default());
        let rendered = module
            .runtime()
            .display_nodes(
                vec![IValue::Tensor(vec4([1.0; 4]))],
                &std::collections::HashMap::new(),
            )
            .unwrap();
        assert!(rendered.contains("Node #0: add"));
        assert!(rendered.contains("Node #1: add"));
        assert!(rendered.contains("Tensor f32 [4]"));
    }
}
