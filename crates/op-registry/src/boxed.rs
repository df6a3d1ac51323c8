// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Boxed fallback kernels.
//!
//! Boxed handlers use the interpreter stack convention: inputs are pushed
//! in order, variadic operators additionally find their input count
//! pushed last, and the handler replaces all of it with its outputs.
//! Every output is freshly allocated — this path never reuses storage,
//! which is exactly why it is the fallback.

use crate::{tensor_err, KernelError};
use tensor_core::{ops, IValue, Tensor};

fn pop_tensor(op: &'static str, stack: &mut Vec<IValue>) -> Result<Tensor, KernelError> {
    let value = stack.pop().ok_or(KernelError::WrongArity {
        op,
        expected: 1,
        actual: 0,
    })?;
    match value {
        IValue::Tensor(t) => Ok(t),
        other => Err(KernelError::WrongInputType {
            op,
            index: 0,
            expected: "tensor",
            actual: other.type_tag(),
        }),
    }
}

fn pop_arity(op: &'static str, stack: &mut Vec<IValue>) -> Result<usize, KernelError> {
    match stack.pop() {
        Some(IValue::Int(n)) if n >= 0 => Ok(n as usize),
        Some(other) => Err(KernelError::WrongInputType {
            op,
            index: 0,
            expected: "int (variadic arity)",
            actual: other.type_tag(),
        }),
        None => Err(KernelError::WrongArity {
            op,
            expected: 1,
            actual: 0,
        }),
    }
}

fn binary(
    op: &'static str,
    stack: &mut Vec<IValue>,
    f: fn(&Tensor, &Tensor, &mut Tensor) -> Result<(), tensor_core::TensorError>,
) -> Result<(), KernelError> {
    let b = pop_tensor(op, stack)?;
    let a = pop_tensor(op, stack)?;
    let mut out = Tensor::zeros(a.shape().clone(), a.dtype());
    f(&a, &b, &mut out).map_err(tensor_err(op))?;
    stack.push(out.into());
    Ok(())
}

fn unary(
    op: &'static str,
    stack: &mut Vec<IValue>,
    f: fn(&Tensor, &mut Tensor) -> Result<(), tensor_core::TensorError>,
) -> Result<(), KernelError> {
    let x = pop_tensor(op, stack)?;
    let mut out = Tensor::zeros(x.shape().clone(), x.dtype());
    f(&x, &mut out).map_err(tensor_err(op))?;
    stack.push(out.into());
    Ok(())
}

pub(crate) fn add(stack: &mut Vec<IValue>) -> Result<(), KernelError> {
    binary("add", stack, ops::add)
}

pub(crate) fn mul(stack: &mut Vec<IValue>) -> Result<(), KernelError> {
    binary("mul", stack, ops::mul)
}

pub(crate) fn matmul(stack: &mut Vec<IValue>) -> Result<(), KernelError> {
    let b = pop_tensor("matmul", stack)?;
    let a = pop_tensor("matmul", stack)?;
    if !a.shape().is_matmul_compatible(b.shape()) {
        return Err(KernelError::Tensor {
            op: "matmul",
            source: tensor_core::TensorError::ShapeMismatch {
                op: "matmul",
                lhs: a.shape().clone(),
                rhs: b.shape().clone(),
            },
        });
    }
    let mut out = Tensor::zeros(
        tensor_core::Shape::matrix(a.shape().dims()[0], b.shape().dims()[1]),
        a.dtype(),
    );
    ops::matmul(&a, &b, &mut out).map_err(tensor_err("matmul"))?;
    stack.push(out.into());
    Ok(())
}

pub(crate) fn relu(stack: &mut Vec<IValue>) -> Result<(), KernelError> {
    unary("relu", stack, ops::relu)
}

pub(crate) fn sigmoid(stack: &mut Vec<IValue>) -> Result<(), KernelError> {
    unary("sigmoid", stack, ops::sigmoid)
}

pub(crate) fn view(stack: &mut Vec<IValue>) -> Result<(), KernelError> {
    let size = stack.pop().unwrap_or(IValue::None);
    let x = stack.pop().unwrap_or(IValue::None);
    let mut outputs = vec![IValue::None];
    crate::native::view(&[&x, &size], &mut outputs)?;
    stack.push(outputs.pop().expect("view produces one output"));
    Ok(())
}

pub(crate) fn concat(stack: &mut Vec<IValue>) -> Result<(), KernelError> {
    let arity = pop_arity("concat", stack)?;
    if arity == 0 || stack.len() < arity {
        return Err(KernelError::WrongArity {
            op: "concat",
            expected: arity.max(1),
            actual: stack.len(),
        });
    }
    let mut tensors = Vec::with_capacity(arity);
    for _ in 0..arity {
        tensors.push(pop_tensor("concat", stack)?);
    }
    tensors.reverse();

    let refs: Vec<&Tensor> = tensors.iter().collect();
    let out_shape = ops::concat_shape(&refs).map_err(tensor_err("concat"))?;
    let mut out = Tensor::zeros(out_shape, tensors[0].dtype());
    ops::concat(&refs, &mut out).map_err(tensor_err("concat"))?;
    stack.push(out.into());
    Ok(())
}

pub(crate) fn list_construct(stack: &mut Vec<IValue>) -> Result<(), KernelError> {
    let arity = pop_arity("list_construct", stack)?;
    if stack.len() < arity {
        return Err(KernelError::WrongArity {
            op: "list_construct",
            expected: arity,
            actual: stack.len(),
        });
    }
    let mut tensors = Vec::with_capacity(arity);
    for _ in 0..arity {
        tensors.push(pop_tensor("list_construct", stack)?);
    }
    tensors.reverse();
    stack.push(IValue::TensorList(tensors));
    Ok(())
}

pub(crate) fn tuple_construct(stack: &mut Vec<IValue>) -> Result<(), KernelError> {
    let arity = pop_arity("tuple_construct", stack)?;
    if stack.len() < arity {
        return Err(KernelError::WrongArity {
            op: "tuple_construct",
            expected: arity,
            actual: stack.len(),
        });
    }
    let elements: Vec<IValue> = stack.split_off(stack.len() - arity);
    stack.push(IValue::Tuple(elements));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tensor_core::Shape;

    fn t(values: &[f32]) -> IValue {
        Tensor::from_f32(Shape::vector(values.len()), values)
            .unwrap()
            .into()
    }

    #[test]
    fn test_boxed_add() {
        let mut stack = vec![t(&[1.0, 2.0]), t(&[3.0, 4.0])];
        add(&mut stack).unwrap();
        assert_eq!(stack.len(), 1);
        assert_eq!(stack[0].as_tensor().unwrap().as_f32_slice(), &[4.0, 6.0]);
    }

    #[test]
    fn test_boxed_concat_variadic() {
        let mut stack = vec![t(&[1.0]), t(&[2.0, 3.0]), IValue::Int(2)];
        concat(&mut stack).unwrap();
        assert_eq!(stack.len(), 1);
        assert_eq!(
            stack[0].as_tensor().unwrap().as_f32_slice(),
            &[1.0, 2.0, 3.0]
        );
    }

    #[test]
    fn test_boxed_concat_preserves_order() {
        let mut stack = vec![t(&[10.0]), t(&[20.0]), t(&[30.0]), IValue::Int(3)];
        concat(&mut stack).unwrap();
        assert_eq!(
            stack[0].as_tensor().unwrap().as_f32_slice(),
            &[10.0, 20.0, 30.0]
        );
    }

    #[test]
    fn test_boxed_concat_empty_rejected() {
        let mut stack = vec![IValue::Int(0)];
        assert!(concat(&mut stack).is_err());
    }

    #[test]
    fn test_boxed_tuple_construct() {
        let mut stack = vec![IValue::Int(7), t(&[1.0]), IValue::Int(2)];
        tuple_construct(&mut stack).unwrap();
        let tuple = stack[0].as_tuple().unwrap();
        assert_eq!(tuple.len(), 2);
        assert_eq!(tuple[0], IValue::Int(7));
    }

    #[test]
    fn test_boxed_list_construct() {
        let mut stack = vec![t(&[1.0]), t(&[2.0]), IValue::Int(2)];
        list_construct(&mut stack).unwrap();
        let list = stack[0].as_tensor_list().unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].as_f32_slice(), &[1.0]);
    }

    #[test]
    fn test_boxed_view() {
        let mut stack = vec![t(&[1.0, 2.0, 3.0, 4.0]), IValue::IntList(vec![2, 2])];
        view(&mut stack).unwrap();
        assert_eq!(
            stack[0].as_tensor().unwrap().shape(),
            &Shape::matrix(2, 2)
        );
    }

    #[test]
    fn test_wrong_type_on_stack() {
        let mut stack = vec![t(&[1.0]), IValue::Bool(true)];
        assert!(matches!(
            add(&mut stack),
            Err(KernelError::WrongInputType { .. })
        ));
    }
}
