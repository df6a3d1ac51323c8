// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The frozen dataflow graph and its builder.
//!
//! A [`Graph`] is immutable once built (the single exception is
//! [`Graph::remove_unused_input`], used during module construction to
//! erase a dangling self input). [`GraphBuilder`] enforces SSA by
//! construction — it only hands out [`ValueId`]s it created — and
//! `finish()` validates operator arities and computes use chains.

use crate::{GraphError, Node, NodeId, OpKind, Use, Value, ValueId, ValueKind};
use std::fmt;
use tensor_core::IValue;

/// An immutable, block-free SSA graph.
#[derive(Debug, Clone)]
pub struct Graph {
    name: String,
    values: Vec<Value>,
    nodes: Vec<Node>,
    inputs: Vec<ValueId>,
    outputs: Vec<ValueId>,
}

impl Graph {
    /// Returns the graph's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the graph inputs in declaration order.
    pub fn inputs(&self) -> &[ValueId] {
        &self.inputs
    }

    /// Returns the graph outputs in declaration order.
    pub fn outputs(&self) -> &[ValueId] {
        &self.outputs
    }

    /// Returns all nodes in program order (constants included).
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Returns the node with the given id.
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    /// Returns the value with the given id.
    pub fn value(&self, id: ValueId) -> &Value {
        &self.values[id.index()]
    }

    /// Returns the total number of values (inputs + all node outputs).
    pub fn num_values(&self) -> usize {
        self.values.len()
    }

    /// Iterates over all value ids in creation order.
    pub fn value_ids(&self) -> impl Iterator<Item = ValueId> + '_ {
        (0..self.values.len() as u32).map(ValueId)
    }

    /// Erases the graph input at `index`.
    ///
    /// Fails if the input still has uses. Used to drop a dangling
    /// module-self input; the orphaned value stays allocated but is no
    /// longer reachable from the input list.
    pub fn remove_unused_input(&mut self, index: usize) -> Result<(), GraphError> {
        let id = *self
            .inputs
            .get(index)
            .ok_or_else(|| GraphError::InvalidGraph(format!("no input at index {index}")))?;
        if self.value(id).has_uses() {
            return Err(GraphError::InvalidGraph(format!(
                "input '{}' still has uses",
                self.value(id).name
            )));
        }
        self.inputs.remove(index);
        Ok(())
    }
}

impl fmt::Display for Graph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "graph {}(", self.name)?;
        for (i, v) in self.inputs.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            let val = self.value(*v);
            write!(f, "{v} {}: {}", val.name, val.kind.as_str())?;
        }
        writeln!(f, "):")?;
        for node in &self.nodes {
            write!(f, "  ")?;
            for (i, o) in node.outputs.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{o} {}", self.value(*o).name)?;
            }
            write!(f, " = {}(", node.kind)?;
            for (i, v) in node.inputs.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{v}")?;
            }
            writeln!(f, ")")?;
        }
        write!(f, "  return (")?;
        for (i, v) in self.outputs.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{v}")?;
        }
        writeln!(f, ")")
    }
}

/// Incrementally builds a [`Graph`].
///
/// # Example
/// ```
/// use graph_ir::{GraphBuilder, OpKind, ValueKind};
///
/// let mut b = GraphBuilder::new("double");
/// let x = b.input("x", ValueKind::Tensor);
/// let y = b.op(OpKind::Add, vec![x, x]);
/// b.output(y);
/// let graph = b.finish().unwrap();
/// assert_eq!(graph.nodes().len(), 1);
/// ```
pub struct GraphBuilder {
    name: String,
    values: Vec<Value>,
    nodes: Vec<Node>,
    inputs: Vec<ValueId>,
    outputs: Vec<ValueId>,
}

impl GraphBuilder {
    /// Creates a builder for a graph with the given name.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            values: Vec::new(),
            nodes: Vec::new(),
            inputs: Vec::new(),
            outputs: Vec::new(),
        }
    }

    fn new_value(&mut self, name: String, kind: ValueKind, producer: Option<NodeId>) -> ValueId {
        let id = ValueId(self.values.len() as u32);
        self.values.push(Value {
            name,
            kind,
            producer,
            uses: Vec::new(),
        });
        id
    }

    /// Declares a graph input.
    pub fn input(&mut self, name: &str, kind: ValueKind) -> ValueId {
        let id = self.new_value(name.to_string(), kind, None);
        self.inputs.push(id);
        id
    }

    /// Adds a constant node materializing `value`.
    pub fn constant(&mut self, name: &str, value: IValue) -> ValueId {
        let kind = match &value {
            IValue::Tensor(_) => ValueKind::Tensor,
            IValue::IntList(_) => ValueKind::IntList,
            IValue::TensorList(_) => ValueKind::TensorList,
            IValue::Tuple(_) => ValueKind::Tuple,
            IValue::Bool(_) | IValue::Int(_) | IValue::Double(_) => ValueKind::Scalar,
            IValue::None => ValueKind::Other,
        };
        let node_id = NodeId(self.nodes.len() as u32);
        let out = self.new_value(name.to_string(), kind, Some(node_id));
        self.nodes.push(Node {
            id: node_id,
            kind: OpKind::Constant,
            inputs: vec![],
            outputs: vec![out],
            constant: Some(value),
        });
        out
    }

    /// Adds a single-output operation and returns its output value.
    pub fn op(&mut self, kind: OpKind, inputs: Vec<ValueId>) -> ValueId {
        self.op_named(kind, inputs, None)
    }

    /// Adds a single-output operation with an explicit output name.
    pub fn op_named(&mut self, kind: OpKind, inputs: Vec<ValueId>, name: Option<&str>) -> ValueId {
        let node_id = NodeId(self.nodes.len() as u32);
        let out_name = name
            .map(str::to_string)
            .unwrap_or_else(|| format!("%{}", self.values.len()));
        let out = self.new_value(out_name, kind.output_kind(), Some(node_id));
        self.nodes.push(Node {
            id: node_id,
            kind,
            inputs,
            outputs: vec![out],
            constant: None,
        });
        out
    }

    /// Marks a value as a graph output. A value may appear more than once.
    pub fn output(&mut self, value: ValueId) {
        self.outputs.push(value);
    }

    /// Validates the graph and freezes it.
    ///
    /// # Checks
    /// - At least one graph output.
    /// - Every node input references a value created before the node.
    /// - Non-variadic operators carry exactly their schema arity.
    /// - Constant nodes carry a payload.
    pub fn finish(mut self) -> Result<Graph, GraphError> {
        if self.outputs.is_empty() {
            return Err(GraphError::InvalidGraph(
                "graph declares no outputs".into(),
            ));
        }

        for node in &self.nodes {
            for &input in &node.inputs {
                // Values are created either as graph inputs or as outputs
                // of earlier nodes; an input created by a later node
                // breaks the flat-interpreter ordering.
                if let Some(producer) = self.values[input.index()].producer {
                    if producer.index() >= node.id.index() {
                        return Err(GraphError::InvalidGraph(format!(
                            "node {} consumes {} before its definition",
                            node.id.index(),
                            input,
                        )));
                    }
                }
            }
            if let Some(schema) = node.kind.schema() {
                if !schema.is_variadic && node.inputs.len() != schema.args.len() {
                    return Err(GraphError::InvalidNode {
                        kind: node.kind.as_str().to_string(),
                        detail: format!(
                            "expected {} inputs, got {}",
                            schema.args.len(),
                            node.inputs.len()
                        ),
                    });
                }
            }
            if node.kind == OpKind::Constant && node.constant.is_none() {
                return Err(GraphError::InvalidNode {
                    kind: "constant".into(),
                    detail: "constant node without payload".into(),
                });
            }
        }

        for &output in &self.outputs {
            if output.index() >= self.values.len() {
                return Err(GraphError::InvalidGraph(format!(
                    "output {output} does not exist"
                )));
            }
        }

        // Compute use chains in program order.
        for node in &self.nodes {
            for (i, &input) in node.inputs.iter().enumerate() {
                self.values[input.index()].uses.push(Use {
                    node: node.id,
                    input_index: i,
                });
            }
        }

        Ok(Graph {
            name: self.name,
            values: self.values,
            nodes: self.nodes,
            inputs: self.inputs,
            outputs: self.outputs,
        })
    }
}
