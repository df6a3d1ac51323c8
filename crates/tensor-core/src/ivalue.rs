// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Boxed runtime values.
//!
//! [`IValue`] is the sum type flowing through every execution slot:
//! graph inputs, constant cells, and node outputs. A slot that has been
//! cleaned up holds [`IValue::None`], which releases whatever the slot
//! previously owned.

use crate::Tensor;

/// A boxed value held in an execution slot.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum IValue {
    /// Nothing; the state of a cleaned-up slot.
    #[default]
    None,
    /// A boolean scalar.
    Bool(bool),
    /// An integer scalar.
    Int(i64),
    /// A double-precision scalar.
    Double(f64),
    /// A tensor.
    Tensor(Tensor),
    /// A list of integers (shape arguments and the like).
    IntList(Vec<i64>),
    /// A list of tensors.
    TensorList(Vec<Tensor>),
    /// A tuple of arbitrary values.
    Tuple(Vec<IValue>),
}

impl IValue {
    /// Returns `true` if this is [`IValue::None`].
    pub fn is_none(&self) -> bool {
        matches!(self, IValue::None)
    }

    /// Returns `true` if this value holds a tensor.
    pub fn is_tensor(&self) -> bool {
        matches!(self, IValue::Tensor(_))
    }

    /// Returns the contained tensor, if any.
    pub fn as_tensor(&self) -> Option<&Tensor> {
        match self {
            IValue::Tensor(t) => Some(t),
            _ => None,
        }
    }

    /// Returns the contained tensor mutably, if any.
    pub fn as_tensor_mut(&mut self) -> Option<&mut Tensor> {
        match self {
            IValue::Tensor(t) => Some(t),
            _ => None,
        }
    }

    /// Returns the contained integer list, if any.
    pub fn as_int_list(&self) -> Option<&[i64]> {
        match self {
            IValue::IntList(v) => Some(v),
            _ => None,
        }
    }

    /// Returns the contained tensor list, if any.
    pub fn as_tensor_list(&self) -> Option<&[Tensor]> {
        match self {
            IValue::TensorList(v) => Some(v),
            _ => None,
        }
    }

    /// Returns the contained tuple elements, if any.
    pub fn as_tuple(&self) -> Option<&[IValue]> {
        match self {
            IValue::Tuple(v) => Some(v),
            _ => None,
        }
    }

    /// Returns a static tag naming this value's type, for diagnostics.
    pub fn type_tag(&self) -> &'static str {
        match self {
            IValue::None => "none",
            IValue::Bool(_) => "bool",
            IValue::Int(_) => "int",
            IValue::Double(_) => "double",
            IValue::Tensor(_) => "tensor",
            IValue::IntList(_) => "int_list",
            IValue::TensorList(_) => "tensor_list",
            IValue::Tuple(_) => "tuple",
        }
    }

    /// Takes the value out of the slot, leaving [`IValue::None`].
    pub fn take(&mut self) -> IValue {
        std::mem::take(self)
    }

    /// Short one-line description (shape for tensors, length for lists).
    pub fn summary(&self) -> String {
        match self {
            IValue::None => "None".to_string(),
            IValue::Bool(b) => format!("bool {{{b}}}"),
            IValue::Int(i) => format!("int {{{i}}}"),
            IValue::Double(d) => format!("double {{{d}}}"),
            IValue::Tensor(t) => format!("Tensor {} {}", t.dtype().as_str(), t.shape()),
            IValue::IntList(v) => format!("IntList {{{}}}", v.len()),
            IValue::TensorList(v) => format!("TensorList {{{}}}", v.len()),
            IValue::Tuple(v) => format!("Tuple {{{}}}", v.len()),
        }
    }
}

impl From<Tensor> for IValue {
    fn from(t: Tensor) -> Self {
        IValue::Tensor(t)
    }
}

impl From<i64> for IValue {
    fn from(i: i64) -> Self {
        IValue::Int(i)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{DType, Shape};

    #[test]
    fn test_default_is_none() {
        assert!(IValue::default().is_none());
    }

    #[test]
    fn test_take_leaves_none() {
        let mut slot = IValue::Int(7);
        let taken = slot.take();
        assert_eq!(taken, IValue::Int(7));
        assert!(slot.is_none());
    }

    #[test]
    fn test_tensor_accessors() {
        let mut v: IValue = Tensor::zeros(Shape::vector(2), DType::F32).into();
        assert!(v.is_tensor());
        assert_eq!(v.as_tensor().unwrap().shape(), &Shape::vector(2));
        v.as_tensor_mut().unwrap().fill_f32(1.0);
        assert_eq!(v.as_tensor().unwrap().as_f32_slice(), &[1.0, 1.0]);
    }

    #[test]
    fn test_type_tags() {
        assert_eq!(IValue::None.type_tag(), "none");
        assert_eq!(IValue::IntList(vec![1]).type_tag(), "int_list");
        assert_eq!(IValue::Tuple(vec![]).type_tag(), "tuple");
    }

    #[test]
    fn test_summary() {
        let t: IValue = Tensor::zeros(Shape::matrix(2, 2), DType::F32).into();
        assert_eq!(t.summary(), "Tensor f32 [2, 2]");
        assert_eq!(IValue::TensorList(vec![]).summary(), "TensorList {0}");
    }
}
