// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Out-variant kernels.
//!
//! Each handler shapes its output slot in place via
//! [`resize_tensor_output`](crate::resize_tensor_output) — keeping the
//! existing storage whenever it is large enough — and then writes through
//! the destination-passing tensor ops. This is the path the memory
//! planner manages: on warm runs the output tensor is already bound to an
//! arena region of learned size and no allocation happens here.

use crate::{expect_tensor, resize_tensor_output, tensor_err, KernelError};
use tensor_core::{ops, IValue, Shape, TensorError};

pub(crate) fn add_out(inputs: &[&IValue], outputs: &mut [IValue]) -> Result<(), KernelError> {
    let a = expect_tensor("add", inputs, 0)?;
    let b = expect_tensor("add", inputs, 1)?;
    let out = resize_tensor_output(&mut outputs[0], a.shape().clone(), a.dtype());
    ops::add(a, b, out).map_err(tensor_err("add"))
}

pub(crate) fn mul_out(inputs: &[&IValue], outputs: &mut [IValue]) -> Result<(), KernelError> {
    let a = expect_tensor("mul", inputs, 0)?;
    let b = expect_tensor("mul", inputs, 1)?;
    let out = resize_tensor_output(&mut outputs[0], a.shape().clone(), a.dtype());
    ops::mul(a, b, out).map_err(tensor_err("mul"))
}

pub(crate) fn matmul_out(inputs: &[&IValue], outputs: &mut [IValue]) -> Result<(), KernelError> {
    let a = expect_tensor("matmul", inputs, 0)?;
    let b = expect_tensor("matmul", inputs, 1)?;
    if !a.shape().is_matmul_compatible(b.shape()) {
        return Err(KernelError::Tensor {
            op: "matmul",
            source: TensorError::ShapeMismatch {
                op: "matmul",
                lhs: a.shape().clone(),
                rhs: b.shape().clone(),
            },
        });
    }
    let out_shape = Shape::matrix(a.shape().dims()[0], b.shape().dims()[1]);
    let out = resize_tensor_output(&mut outputs[0], out_shape, a.dtype());
    ops::matmul(a, b, out).map_err(tensor_err("matmul"))
}

pub(crate) fn relu_out(inputs: &[&IValue], outputs: &mut [IValue]) -> Result<(), KernelError> {
    let x = expect_tensor("relu", inputs, 0)?;
    let out = resize_tensor_output(&mut outputs[0], x.shape().clone(), x.dtype());
    ops::relu(x, out).map_err(tensor_err("relu"))
}

pub(crate) fn sigmoid_out(inputs: &[&IValue], outputs: &mut [IValue]) -> Result<(), KernelError> {
    let x = expect_tensor("sigmoid", inputs, 0)?;
    let out = resize_tensor_output(&mut outputs[0], x.shape().clone(), x.dtype());
    ops::sigmoid(x, out).map_err(tensor_err("sigmoid"))
}

/// Rebuilds the output tensor list in place. The list allocation itself
/// is retained across runs (the planner leaks it on purpose); only the
/// element handles are refreshed.
pub(crate) fn list_construct_out(
    inputs: &[&IValue],
    outputs: &mut [IValue],
) -> Result<(), KernelError> {
    for (i, value) in inputs.iter().enumerate() {
        if !value.is_tensor() {
            return Err(KernelError::WrongInputType {
                op: "list_construct",
                index: i,
                expected: "tensor",
                actual: value.type_tag(),
            });
        }
    }
    if !matches!(outputs[0], IValue::TensorList(_)) {
        outputs[0] = IValue::TensorList(Vec::with_capacity(inputs.len()));
    }
    let IValue::TensorList(list) = &mut outputs[0] else {
        unreachable!("output slot was just set to a tensor list");
    };
    list.clear();
    for value in inputs {
        // The list outlives the run (it is leaked, not reset), so its
        // elements must not share arena-bound storage.
        let tensor = value.as_tensor().expect("inputs were checked above");
        list.push(tensor.owned_copy());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tensor_core::{DType, Shape, Tensor};

    fn t(values: &[f32]) -> IValue {
        Tensor::from_f32(Shape::vector(values.len()), values)
            .unwrap()
            .into()
    }

    #[test]
    fn test_add_out_fresh_slot() {
        let a = t(&[1.0, 2.0]);
        let b = t(&[3.0, 4.0]);
        let mut outputs = vec![IValue::None];

        add_out(&[&a, &b], &mut outputs).unwrap();
        assert_eq!(
            outputs[0].as_tensor().unwrap().as_f32_slice(),
            &[4.0, 6.0]
        );
    }

    #[test]
    fn test_add_out_reuses_storage() {
        let a = t(&[1.0, 2.0]);
        let b = t(&[3.0, 4.0]);
        let mut outputs = vec![IValue::None];

        add_out(&[&a, &b], &mut outputs).unwrap();
        let ptr = outputs[0].as_tensor().unwrap().storage().data_ptr();

        add_out(&[&a, &b], &mut outputs).unwrap();
        assert_eq!(outputs[0].as_tensor().unwrap().storage().data_ptr(), ptr);
    }

    #[test]
    fn test_matmul_out() {
        let a: IValue = Tensor::from_f32(Shape::matrix(1, 2), &[1.0, 2.0]).unwrap().into();
        let b: IValue = Tensor::from_f32(Shape::matrix(2, 1), &[3.0, 4.0]).unwrap().into();
        let mut outputs = vec![IValue::None];

        matmul_out(&[&a, &b], &mut outputs).unwrap();
        let out = outputs[0].as_tensor().unwrap();
        assert_eq!(out.shape(), &Shape::matrix(1, 1));
        assert_eq!(out.as_f32_slice(), &[11.0]);
    }

    #[test]
    fn test_matmul_out_incompatible() {
        let a: IValue = Tensor::zeros(Shape::matrix(2, 3), DType::F32).into();
        let b: IValue = Tensor::zeros(Shape::matrix(4, 2), DType::F32).into();
        let mut outputs = vec![IValue::None];
        assert!(matmul_out(&[&a, &b], &mut outputs).is_err());
    }

    #[test]
    fn test_relu_out_wrong_type() {
        let x = IValue::Int(1);
        let mut outputs = vec![IValue::None];
        assert!(matches!(
            relu_out(&[&x], &mut outputs),
            Err(KernelError::WrongInputType { op: "relu", .. })
        ));
    }

    #[test]
    fn test_list_construct_refreshes_in_place() {
        let a = t(&[1.0]);
        let b = t(&[2.0]);
        let mut outputs = vec![IValue::None];

        list_construct_out(&[&a, &b], &mut outputs).unwrap();
        assert_eq!(outputs[0].as_tensor_list().unwrap().len(), 2);

        // Second run reuses the list allocation.
        list_construct_out(&[&a], &mut outputs).unwrap();
        assert_eq!(outputs[0].as_tensor_list().unwrap().len(), 1);
    }
}
