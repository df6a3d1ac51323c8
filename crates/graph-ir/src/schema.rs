// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The graph-level calling convention.
//!
//! A [`FunctionSchema`] names the graph's arguments so that callers can
//! pass keyword arguments; [`check_and_normalize`]
//! (FunctionSchema::check_and_normalize) merges positional and keyword
//! arguments into one positional stack and type-checks the result.

use crate::{SchemaError, ValueKind};
use std::collections::HashMap;
use tensor_core::IValue;

/// One named argument of a graph.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Argument {
    /// Argument name, used for kwargs lookup.
    pub name: String,
    /// Expected static type.
    pub kind: ValueKind,
}

/// The calling convention of a graph: ordered, named arguments.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct FunctionSchema {
    /// Function name (usually `forward`).
    pub name: String,
    /// Arguments in positional order.
    pub arguments: Vec<Argument>,
}

impl FunctionSchema {
    /// Creates a schema from `(name, kind)` pairs.
    pub fn new(name: &str, arguments: Vec<(&str, ValueKind)>) -> Self {
        Self {
            name: name.to_string(),
            arguments: arguments
                .into_iter()
                .map(|(n, kind)| Argument {
                    name: n.to_string(),
                    kind,
                })
                .collect(),
        }
    }

    /// Returns a copy of this schema with the leading `self` argument
    /// removed.
    ///
    /// Fails with [`SchemaError::NoSelfArgument`] if the first argument is
    /// not named `self`.
    pub fn without_self(&self) -> Result<FunctionSchema, SchemaError> {
        match self.arguments.first() {
            Some(first) if first.name == "self" => Ok(FunctionSchema {
                name: self.name.clone(),
                arguments: self.arguments[1..].to_vec(),
            }),
            _ => Err(SchemaError::NoSelfArgument),
        }
    }

    /// Merges keyword arguments into the positional `stack` and
    /// type-checks every slot.
    ///
    /// On success the stack holds exactly one value per schema argument,
    /// in positional order.
    pub fn check_and_normalize(
        &self,
        stack: &mut Vec<IValue>,
        kwargs: &HashMap<String, IValue>,
    ) -> Result<(), SchemaError> {
        if stack.len() + kwargs.len() != self.arguments.len() {
            return Err(SchemaError::ArityMismatch {
                expected: self.arguments.len(),
                actual: stack.len() + kwargs.len(),
            });
        }

        for kwarg in kwargs.keys() {
            if !self.arguments.iter().any(|a| &a.name == kwarg) {
                return Err(SchemaError::UnknownKwarg(kwarg.clone()));
            }
        }

        let positional = stack.len();
        for arg in &self.arguments[positional..] {
            let value = kwargs
                .get(&arg.name)
                .ok_or_else(|| SchemaError::MissingArgument(arg.name.clone()))?;
            stack.push(value.clone());
        }

        for (arg, value) in self.arguments.iter().zip(stack.iter()) {
            if !kind_accepts(arg.kind, value) {
                return Err(SchemaError::TypeMismatch {
                    arg: arg.name.clone(),
                    expected: arg.kind.as_str(),
                    actual: value.type_tag(),
                });
            }
        }
        Ok(())
    }
}

/// Returns `true` if a value of this runtime type is acceptable for an
/// argument declared with the given static kind.
fn kind_accepts(kind: ValueKind, value: &IValue) -> bool {
    match kind {
        ValueKind::Tensor => value.is_tensor(),
        ValueKind::Scalar => matches!(
            value,
            IValue::Bool(_) | IValue::Int(_) | IValue::Double(_)
        ),
        ValueKind::IntList => matches!(value, IValue::IntList(_)),
        ValueKind::TensorList => matches!(value, IValue::TensorList(_)),
        ValueKind::Tuple => matches!(value, IValue::Tuple(_)),
        // The self slot and opaque values accept anything, including None.
        ValueKind::Module | ValueKind::Other => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tensor_core::{DType, Shape, Tensor};

    fn tensor() -> IValue {
        Tensor::zeros(Shape::vector(2), DType::F32).into()
    }

    #[test]
    fn test_positional_only() {
        let schema = FunctionSchema::new(
            "forward",
            vec![("a", ValueKind::Tensor), ("b", ValueKind::Tensor)],
        );
        let mut stack = vec![tensor(), tensor()];
        schema
            .check_and_normalize(&mut stack, &HashMap::new())
            .unwrap();
        assert_eq!(stack.len(), 2);
    }

    #[test]
    fn test_kwargs_fill_tail() {
        let schema = FunctionSchema::new(
            "forward",
            vec![("a", ValueKind::Tensor), ("n", ValueKind::Scalar)],
        );
        let mut stack = vec![tensor()];
        let kwargs = HashMap::from([("n".to_string(), IValue::Int(3))]);
        schema.check_and_normalize(&mut stack, &kwargs).unwrap();
        assert_eq!(stack.len(), 2);
        assert_eq!(stack[1], IValue::Int(3));
    }

    #[test]
    fn test_arity_mismatch() {
        let schema = FunctionSchema::new("forward", vec![("a", ValueKind::Tensor)]);
        let mut stack = vec![tensor(), tensor()];
        assert!(matches!(
            schema.check_and_normalize(&mut stack, &HashMap::new()),
            Err(SchemaError::ArityMismatch {
                expected: 1,
                actual: 2
            })
        ));
    }

    #[test]
    fn test_unknown_kwarg() {
        let schema = FunctionSchema::new("forward", vec![("a", ValueKind::Tensor)]);
        let mut stack = vec![];
        let kwargs = HashMap::from([("bogus".to_string(), IValue::Int(1))]);
        assert!(matches!(
            schema.check_and_normalize(&mut stack, &kwargs),
            Err(SchemaError::UnknownKwarg(_))
        ));
    }

    #[test]
    fn test_type_mismatch() {
        let schema = FunctionSchema::new("forward", vec![("a", ValueKind::Tensor)]);
        let mut stack = vec![IValue::Int(1)];
        assert!(matches!(
            schema.check_and_normalize(&mut stack, &HashMap::new()),
            Err(SchemaError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_without_self() {
        let schema = FunctionSchema::new(
            "forward",
            vec![("self", ValueKind::Module), ("x", ValueKind::Tensor)],
        );
        let stripped = schema.without_self().unwrap();
        assert_eq!(stripped.arguments.len(), 1);
        assert_eq!(stripped.arguments[0].name, "x");

        let no_self = FunctionSchema::new("forward", vec![("x", ValueKind::Tensor)]);
        assert!(no_self.without_self().is_err());
    }
}
