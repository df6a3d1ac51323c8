// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Elementwise binary and unary operations.

use super::require_f32;
use crate::{Tensor, TensorError};

/// Elementwise addition: `out[i] = lhs[i] + rhs[i]`.
///
/// Both inputs and the output must share one shape; broadcasting is not
/// supported.
///
/// # Errors
/// Returns [`TensorError::ShapeMismatch`] on shape disagreement and
/// [`TensorError::UnsupportedDType`] for non-F32 inputs.
pub fn add(lhs: &Tensor, rhs: &Tensor, out: &mut Tensor) -> Result<(), TensorError> {
    binary_op("add", lhs, rhs, out, |a, b| a + b)
}

/// Elementwise multiplication: `out[i] = lhs[i] * rhs[i]`.
pub fn mul(lhs: &Tensor, rhs: &Tensor, out: &mut Tensor) -> Result<(), TensorError> {
    binary_op("mul", lhs, rhs, out, |a, b| a * b)
}

/// Rectified linear unit: `out[i] = max(input[i], 0)`.
pub fn relu(input: &Tensor, out: &mut Tensor) -> Result<(), TensorError> {
    unary_op("relu", input, out, |x| x.max(0.0))
}

/// Logistic sigmoid: `out[i] = 1 / (1 + exp(-input[i]))`.
pub fn sigmoid(input: &Tensor, out: &mut Tensor) -> Result<(), TensorError> {
    unary_op("sigmoid", input, out, |x| 1.0 / (1.0 + (-x).exp()))
}

fn binary_op(
    op: &'static str,
    lhs: &Tensor,
    rhs: &Tensor,
    out: &mut Tensor,
    f: impl Fn(f32, f32) -> f32,
) -> Result<(), TensorError> {
    require_f32(op, lhs)?;
    require_f32(op, rhs)?;
    if lhs.shape() != rhs.shape() {
        return Err(TensorError::ShapeMismatch {
            op,
            lhs: lhs.shape().clone(),
            rhs: rhs.shape().clone(),
        });
    }
    if out.shape() != lhs.shape() {
        return Err(TensorError::ShapeMismatch {
            op,
            lhs: lhs.shape().clone(),
            rhs: out.shape().clone(),
        });
    }

    let a = lhs.as_f32_slice();
    let b = rhs.as_f32_slice();
    let c = out.as_f32_slice_mut();
    for i in 0..c.len() {
        c[i] = f(a[i], b[i]);
    }
    Ok(())
}

fn unary_op(
    op: &'static str,
    input: &Tensor,
    out: &mut Tensor,
    f: impl Fn(f32) -> f32,
) -> Result<(), TensorError> {
    require_f32(op, input)?;
    if out.shape() != input.shape() {
        return Err(TensorError::ShapeMismatch {
            op,
            lhs: input.shape().clone(),
            rhs: out.shape().clone(),
        });
    }

    let a = input.as_f32_slice();
    let c = out.as_f32_slice_mut();
    for i in 0..c.len() {
        c[i] = f(a[i]);
    }
    Ok(())
}
