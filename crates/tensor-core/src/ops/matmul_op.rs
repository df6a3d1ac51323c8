// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Matrix multiplication operation.

use super::require_f32;
use crate::{DType, Shape, Tensor, TensorError};

/// Performs matrix multiplication: `out = lhs @ rhs`.
///
/// Both inputs must be 2-D tensors with compatible inner dimensions:
/// `lhs` is `[M, K]`, `rhs` is `[K, N]`, and `out` must be `[M, N]`.
///
/// # Errors
/// Returns [`TensorError::ShapeMismatch`] if dimensions are incompatible.
/// Returns [`TensorError::UnsupportedDType`] if the dtype is not `F32`.
pub fn matmul(lhs: &Tensor, rhs: &Tensor, out: &mut Tensor) -> Result<(), TensorError> {
    require_f32("matmul", lhs)?;
    require_f32("matmul", rhs)?;

    if !lhs.shape().is_matmul_compatible(rhs.shape()) {
        return Err(TensorError::ShapeMismatch {
            op: "matmul",
            lhs: lhs.shape().clone(),
            rhs: rhs.shape().clone(),
        });
    }

    let m = lhs.shape().dims()[0];
    let k = lhs.shape().dims()[1];
    let n = rhs.shape().dims()[1];

    let expected_shape = Shape::matrix(m, n);
    if out.shape() != &expected_shape || out.dtype() != DType::F32 {
        return Err(TensorError::ShapeMismatch {
            op: "matmul (output)",
            lhs: expected_shape,
            rhs: out.shape().clone(),
        });
    }

    let a = lhs.as_f32_slice();
    let b = rhs.as_f32_slice();
    let c = out.as_f32_slice_mut();

    matmul_f32_generic(a, b, c, m, k, n);

    Ok(())
}

/// Generic (portable) f32 matrix multiplication.
///
/// Uses an ikj loop order for better cache locality on the `b` matrix:
/// the inner loop is a saxpy on a row of `c`, sequential in memory.
fn matmul_f32_generic(a: &[f32], b: &[f32], c: &mut [f32], m: usize, k: usize, n: usize) {
    c.iter_mut().for_each(|x| *x = 0.0);

    for i in 0..m {
        for p in 0..k {
            let a_ip = a[i * k + p];
            let c_row = &mut c[i * n..(i + 1) * n];
            let b_row = &b[p * n..(p + 1) * n];
            for j in 0..n {
                c_row[j] += a_ip * b_row[j];
            }
        }
    }
}
