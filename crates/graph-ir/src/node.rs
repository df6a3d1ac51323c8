// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Graph nodes and the operator vocabulary.

use crate::{ValueId, ValueKind};
use tensor_core::IValue;

/// Identifies a [`Node`] within one [`crate::Graph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    /// Returns the dense index of this node in program order.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// The operator vocabulary.
///
/// `If` and `Loop` exist so that control-flow graphs can be *represented*
/// and then rejected: they carry sub-blocks, which the static runtime
/// does not support.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpKind {
    /// Materializes a compile-time constant.
    Constant,
    /// Elementwise addition.
    Add,
    /// Elementwise multiplication.
    Mul,
    /// 2-D matrix multiplication.
    Matmul,
    /// Rectified linear unit.
    Relu,
    /// Logistic sigmoid.
    Sigmoid,
    /// Reshape; output may alias input 0.
    View,
    /// Concatenation along dimension 0 (variadic).
    Concat,
    /// Builds a tensor list from its inputs (variadic).
    ListConstruct,
    /// Builds a tuple from its inputs (variadic).
    TupleConstruct,
    /// Conditional with sub-blocks; unsupported at runtime.
    If,
    /// Loop with a sub-block; unsupported at runtime.
    Loop,
}

impl OpKind {
    /// Returns the canonical operator name.
    pub fn as_str(self) -> &'static str {
        match self {
            OpKind::Constant => "constant",
            OpKind::Add => "add",
            OpKind::Mul => "mul",
            OpKind::Matmul => "matmul",
            OpKind::Relu => "relu",
            OpKind::Sigmoid => "sigmoid",
            OpKind::View => "view",
            OpKind::Concat => "concat",
            OpKind::ListConstruct => "list_construct",
            OpKind::TupleConstruct => "tuple_construct",
            OpKind::If => "if",
            OpKind::Loop => "loop",
        }
    }

    /// Returns `true` for operators that carry nested sub-blocks.
    pub fn has_sub_blocks(self) -> bool {
        matches!(self, OpKind::If | OpKind::Loop)
    }

    /// Returns the operator schema, or `None` for kinds without one
    /// (constants and sub-block operators).
    pub fn schema(self) -> Option<&'static NodeSchema> {
        match self {
            OpKind::Add => Some(&ADD_SCHEMA),
            OpKind::Mul => Some(&MUL_SCHEMA),
            OpKind::Matmul => Some(&MATMUL_SCHEMA),
            OpKind::Relu => Some(&RELU_SCHEMA),
            OpKind::Sigmoid => Some(&SIGMOID_SCHEMA),
            OpKind::View => Some(&VIEW_SCHEMA),
            OpKind::Concat => Some(&CONCAT_SCHEMA),
            OpKind::ListConstruct => Some(&LIST_CONSTRUCT_SCHEMA),
            OpKind::TupleConstruct => Some(&TUPLE_CONSTRUCT_SCHEMA),
            OpKind::Constant | OpKind::If | OpKind::Loop => None,
        }
    }

    /// Returns the static type of this operator's output.
    pub fn output_kind(self) -> ValueKind {
        match self {
            OpKind::ListConstruct => ValueKind::TensorList,
            OpKind::TupleConstruct => ValueKind::Tuple,
            OpKind::If | OpKind::Loop => ValueKind::Other,
            _ => ValueKind::Tensor,
        }
    }
}

impl std::fmt::Display for OpKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Describes one operator's calling convention: argument names, whether
/// any argument is mutated, and whether the argument list is variadic.
#[derive(Debug, Clone)]
pub struct NodeSchema {
    /// Operator name.
    pub name: &'static str,
    /// Argument names in positional order (the repeated element for
    /// variadic operators).
    pub args: &'static [&'static str],
    /// `true` if the operator mutates any input in place. The whole
    /// vocabulary here is immutable; the flag gates the debug-time
    /// input/output overlap probe.
    pub is_mutable: bool,
    /// `true` if the operator accepts any number of inputs.
    pub is_variadic: bool,
}

static ADD_SCHEMA: NodeSchema = NodeSchema {
    name: "add",
    args: &["self", "other"],
    is_mutable: false,
    is_variadic: false,
};
static MUL_SCHEMA: NodeSchema = NodeSchema {
    name: "mul",
    args: &["self", "other"],
    is_mutable: false,
    is_variadic: false,
};
static MATMUL_SCHEMA: NodeSchema = NodeSchema {
    name: "matmul",
    args: &["self", "other"],
    is_mutable: false,
    is_variadic: false,
};
static RELU_SCHEMA: NodeSchema = NodeSchema {
    name: "relu",
    args: &["self"],
    is_mutable: false,
    is_variadic: false,
};
static SIGMOID_SCHEMA: NodeSchema = NodeSchema {
    name: "sigmoid",
    args: &["self"],
    is_mutable: false,
    is_variadic: false,
};
static VIEW_SCHEMA: NodeSchema = NodeSchema {
    name: "view",
    args: &["self", "size"],
    is_mutable: false,
    is_variadic: false,
};
static CONCAT_SCHEMA: NodeSchema = NodeSchema {
    name: "concat",
    args: &["tensors"],
    is_mutable: false,
    is_variadic: true,
};
static LIST_CONSTRUCT_SCHEMA: NodeSchema = NodeSchema {
    name: "list_construct",
    args: &["elements"],
    is_mutable: false,
    is_variadic: true,
};
static TUPLE_CONSTRUCT_SCHEMA: NodeSchema = NodeSchema {
    name: "tuple_construct",
    args: &["elements"],
    is_mutable: false,
    is_variadic: true,
};

/// One operation in the graph.
#[derive(Debug, Clone)]
pub struct Node {
    /// This node's id (== its program-order index among all nodes,
    /// constants included).
    pub id: NodeId,
    /// Operator kind.
    pub kind: OpKind,
    /// Ordered input values.
    pub inputs: Vec<ValueId>,
    /// Ordered output values.
    pub outputs: Vec<ValueId>,
    /// The materialized payload for `Constant` nodes.
    pub constant: Option<IValue>,
}

impl Node {
    /// Returns the sole output of a single-output node.
    ///
    /// # Panics
    /// Panics if the node has more or fewer than one output.
    pub fn output(&self) -> ValueId {
        assert_eq!(
            self.outputs.len(),
            1,
            "node '{}' has {} outputs",
            self.kind,
            self.outputs.len()
        );
        self.outputs[0]
    }

    /// Returns the operator schema, if the kind has one.
    pub fn schema(&self) -> Option<&'static NodeSchema> {
        self.kind.schema()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_arity() {
        assert_eq!(OpKind::Add.schema().unwrap().args.len(), 2);
        assert_eq!(OpKind::Relu.schema().unwrap().args.len(), 1);
        assert!(OpKind::Concat.schema().unwrap().is_variadic);
        assert!(OpKind::Constant.schema().is_none());
    }

    #[test]
    fn test_sub_blocks() {
        assert!(OpKind::If.has_sub_blocks());
        assert!(OpKind::Loop.has_sub_blocks());
        assert!(!OpKind::Add.has_sub_blocks());
    }

    #[test]
    fn test_output_kinds() {
        assert_eq!(OpKind::Add.output_kind(), ValueKind::Tensor);
        assert_eq!(OpKind::ListConstruct.output_kind(), ValueKind::TensorList);
        assert_eq!(OpKind::TupleConstruct.output_kind(), ValueKind::Tuple);
    }

    #[test]
    fn test_kind_roundtrip_serde() {
        let json = serde_json::to_string(&OpKind::ListConstruct).unwrap();
        assert_eq!(json, "\"list_construct\"");
        let back: OpKind = serde_json::from_str(&json).unwrap();
        assert_eq!(back, OpKind::ListConstruct);
    }
}
