// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! SSA values: the edges of the dataflow graph.

use crate::NodeId;

/// Identifies a [`Value`] within one [`crate::Graph`].
///
/// Ids are dense indices assigned in creation order, which doubles as the
/// deterministic iteration order used throughout the analysis layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ValueId(pub(crate) u32);

impl ValueId {
    /// Returns the dense index of this value.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for ValueId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "%{}", self.0)
    }
}

/// The static type tag of a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    /// A tensor.
    Tensor,
    /// A numeric or boolean scalar.
    Scalar,
    /// A list of integers (shape arguments and the like).
    IntList,
    /// A list of tensors.
    TensorList,
    /// A tuple.
    Tuple,
    /// The module-self value.
    Module,
    /// Anything else.
    Other,
}

impl ValueKind {
    /// Returns a human-readable label.
    pub fn as_str(self) -> &'static str {
        match self {
            ValueKind::Tensor => "tensor",
            ValueKind::Scalar => "scalar",
            ValueKind::IntList => "int_list",
            ValueKind::TensorList => "tensor_list",
            ValueKind::Tuple => "tuple",
            ValueKind::Module => "module",
            ValueKind::Other => "other",
        }
    }
}

/// One use of a value: the consuming node and the input position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Use {
    /// The consuming node.
    pub node: NodeId,
    /// Position within that node's input list.
    pub input_index: usize,
}

/// An SSA value: produced once, consumed by zero or more nodes.
#[derive(Debug, Clone)]
pub struct Value {
    /// Debug name (`x`, `y`, or a generated `%n`).
    pub name: String,
    /// Static type tag.
    pub kind: ValueKind,
    /// Producing node, or `None` for graph inputs.
    pub producer: Option<NodeId>,
    /// All uses, in program order. Populated when the graph is frozen.
    pub(crate) uses: Vec<Use>,
}

impl Value {
    /// Returns this value's uses in program order.
    pub fn uses(&self) -> &[Use] {
        &self.uses
    }

    /// Returns `true` if any node consumes this value.
    pub fn has_uses(&self) -> bool {
        !self.uses.is_empty()
    }
}
