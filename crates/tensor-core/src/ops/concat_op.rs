// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Concatenation along the leading dimension.

use super::require_f32;
use crate::{Shape, Tensor, TensorError};

/// Concatenates `inputs` along dimension 0 into `out`.
///
/// All inputs must share rank, trailing dimensions, and dtype `F32`.
/// `out` must already carry the concatenated shape.
///
/// # Errors
/// Returns [`TensorError::ShapeMismatch`] if any input disagrees on the
/// trailing dimensions or `out` has the wrong shape.
pub fn concat(inputs: &[&Tensor], out: &mut Tensor) -> Result<(), TensorError> {
    let first = inputs.first().ok_or(TensorError::ShapeMismatch {
        op: "concat",
        lhs: Shape::scalar(),
        rhs: Shape::scalar(),
    })?;
    require_f32("concat", first)?;
    if first.shape().rank() == 0 {
        return Err(TensorError::ShapeMismatch {
            op: "concat",
            lhs: first.shape().clone(),
            rhs: Shape::scalar(),
        });
    }

    let tail = &first.shape().dims()[1..];
    let mut rows = 0usize;
    for t in inputs {
        require_f32("concat", t)?;
        if t.shape().rank() != first.shape().rank() || &t.shape().dims()[1..] != tail {
            return Err(TensorError::ShapeMismatch {
                op: "concat",
                lhs: first.shape().clone(),
                rhs: t.shape().clone(),
            });
        }
        rows += t.shape().dims()[0];
    }

    let mut expected = vec![rows];
    expected.extend_from_slice(tail);
    let expected = Shape::new(expected);
    if out.shape() != &expected {
        return Err(TensorError::ShapeMismatch {
            op: "concat (output)",
            lhs: expected,
            rhs: out.shape().clone(),
        });
    }

    let dst = out.as_bytes_mut();
    let mut offset = 0;
    for t in inputs {
        let src = t.as_bytes();
        dst[offset..offset + src.len()].copy_from_slice(src);
        offset += src.len();
    }
    Ok(())
}

/// Computes the output shape of a leading-dimension concat without
/// running it.
pub fn concat_shape(inputs: &[&Tensor]) -> Result<Shape, TensorError> {
    let first = inputs.first().ok_or(TensorError::ShapeMismatch {
        op: "concat",
        lhs: Shape::scalar(),
        rhs: Shape::scalar(),
    })?;
    if first.shape().rank() == 0 {
        return Err(TensorError::ShapeMismatch {
            op: "concat",
            lhs: first.shape().clone(),
            rhs: Shape::scalar(),
        });
    }
    let tail = &first.shape().dims()[1..];
    let rows = inputs.iter().map(|t| t.shape().dims()[0]).sum();
    let mut dims = vec![rows];
    dims.extend_from_slice(tail);
    Ok(Shape::new(dims))
}
