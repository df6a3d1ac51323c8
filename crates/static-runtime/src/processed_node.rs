// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Prepared execution records.
//!
//! A [`ProcessedNode`] is one graph node made ready to run: its inputs
//! reduced to [`ValueSource`] records, its outputs held as owned slots,
//! and exactly one of three dispatch handles selected at compile time —
//! out-variant, native, or the boxed fallback. The runtime resolves the
//! sources against its slot arrays and calls [`run`](ProcessedNode::run);
//! nothing is looked up per invocation.

use crate::{RuntimeError, ValueSource};
use graph_ir::{Node, NodeId, OpKind};
use op_registry::{BoxedFn, KernelFn};
use tensor_core::IValue;

/// The dispatch handle selected for a node at compile time.
#[derive(Clone, Copy)]
enum Dispatch {
    /// Writes into preallocated output slots; feeds the memory planner.
    OutVariant(KernelFn),
    /// Same calling convention, own allocation discipline.
    Native(KernelFn),
    /// Stack-convention fallback.
    Boxed(BoxedFn),
}

/// A prepared node: wired inputs, owned output slots, one dispatch handle.
#[derive(Clone)]
pub struct ProcessedNode {
    /// Back-reference to the source graph node (for schema and
    /// diagnostics).
    node_id: NodeId,
    kind: OpKind,
    inputs: Vec<ValueSource>,
    outputs: Vec<IValue>,
    dispatch: Dispatch,
}

impl ProcessedNode {
    /// Selects the dispatch handle and prepares the record.
    ///
    /// Selection order: out-variant (when enabled), then native, then the
    /// boxed operator.
    pub(crate) fn new(
        node: &Node,
        inputs: Vec<ValueSource>,
        enable_out_variant: bool,
    ) -> Result<Self, RuntimeError> {
        let dispatch = if enable_out_variant {
            op_registry::out_variant_for(node.kind).map(Dispatch::OutVariant)
        } else {
            None
        };
        let dispatch = dispatch
            .or_else(|| op_registry::native_for(node.kind).map(Dispatch::Native))
            .or_else(|| op_registry::boxed_op_for(node.kind).map(Dispatch::Boxed))
            .ok_or_else(|| {
                RuntimeError::UnsupportedGraph(format!("operator '{}' is unresolvable", node.kind))
            })?;

        match dispatch {
            Dispatch::OutVariant(_) => {
                tracing::debug!(op = %node.kind, "switch to out variant for node")
            }
            Dispatch::Native(_) => {
                tracing::debug!(op = %node.kind, "switch to native impl for node")
            }
            Dispatch::Boxed(_) => {
                tracing::debug!(op = %node.kind, "fallback interpreter for node")
            }
        }

        Ok(Self {
            node_id: node.id,
            kind: node.kind,
            inputs,
            outputs: vec![IValue::None; node.outputs.len()],
            dispatch,
        })
    }

    /// Returns the id of the source graph node.
    pub fn node_id(&self) -> NodeId {
        self.node_id
    }

    /// Returns the operator kind.
    pub fn kind(&self) -> OpKind {
        self.kind
    }

    /// Returns the input wiring.
    pub fn inputs(&self) -> &[ValueSource] {
        &self.inputs
    }

    /// Returns the owned output slots.
    pub fn outputs(&self) -> &[IValue] {
        &self.outputs
    }

    /// Returns output slot `i` mutably.
    pub fn output_mut(&mut self, i: usize) -> &mut IValue {
        &mut self.outputs[i]
    }

    /// Returns `true` if this node dispatches to an out-variant kernel.
    pub fn has_out_variant(&self) -> bool {
        matches!(self.dispatch, Dispatch::OutVariant(_))
    }

    /// Returns a short label for the selected dispatch path.
    pub fn dispatch_kind(&self) -> &'static str {
        match self.dispatch {
            Dispatch::OutVariant(_) => "out_variant",
            Dispatch::Native(_) => "native",
            Dispatch::Boxed(_) => "boxed",
        }
    }

    /// Executes the node against already-resolved input references.
    ///
    /// The caller guarantees `resolved` matches [`inputs`]
    /// (ProcessedNode::inputs) positionally.
    pub(crate) fn run(&mut self, resolved: &[&IValue]) -> Result<(), op_registry::KernelError> {
        debug_assert!(
            self.verify_no_input_output_overlap(resolved),
            "outputs of immutable node '{}' overlap its inputs",
            self.kind
        );
        match self.dispatch {
            Dispatch::OutVariant(f) | Dispatch::Native(f) => f(resolved, &mut self.outputs),
            Dispatch::Boxed(f) => {
                let mut stack: Vec<IValue> = Vec::with_capacity(resolved.len() + 1);
                for value in resolved {
                    stack.push((*value).clone());
                }
                // Variadic operators read their input count off the stack.
                let variadic = self
                    .kind
                    .schema()
                    .map(|s| s.is_variadic)
                    .unwrap_or(false);
                if variadic {
                    stack.push(IValue::Int(resolved.len() as i64));
                }

                f(&mut stack)?;

                debug_assert_eq!(
                    stack.len(),
                    self.outputs.len(),
                    "boxed op '{}' left a malformed stack",
                    self.kind
                );
                for (slot, value) in self.outputs.iter_mut().zip(stack.into_iter()) {
                    *slot = value;
                }
                Ok(())
            }
        }
    }

    /// Debug probe: for an immutable schema, no tensor output may share
    /// storage bytes with any tensor input.
    fn verify_no_input_output_overlap(&self, resolved: &[&IValue]) -> bool {
        let mutable = self
            .kind
            .schema()
            .map(|s| s.is_mutable)
            .unwrap_or(true);
        if mutable {
            return true;
        }
        for input in resolved {
            let Some(in_t) = input.as_tensor() else {
                continue;
            };
            for output in &self.outputs {
                let Some(out_t) = output.as_tensor() else {
                    continue;
                };
                if storages_overlap(in_t, out_t) {
                    return false;
                }
            }
        }
        true
    }
}

/// Byte-range overlap probe over two tensors' storages.
fn storages_overlap(a: &tensor_core::Tensor, b: &tensor_core::Tensor) -> bool {
    let (pa, na) = (a.storage().data_ptr() as usize, a.storage().nbytes());
    let (pb, nb) = (b.storage().data_ptr() as usize, b.storage().nbytes());
    if pa == 0 || pb == 0 || na == 0 || nb == 0 {
        return false;
    }
    pa < pb + nb && pb < pa + na
}

impl std::fmt::Debug for ProcessedNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let dispatch = match self.dispatch {
            Dispatch::OutVariant(_) => "out_variant",
            Dispatch::Native(_) => "native",
            Dispatch::Boxed(_) => "boxed",
        };
        f.debug_struct("ProcessedNode")
            .field("kind", &self.kind.as_str())
            .field("dispatch", &dispatch)
            .field("inputs", &self.inputs.len())
            .field("outputs", &self.outputs.len())
            .finish()
    }
}
