// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Native kernels.
//!
//! Native handlers share the out-variant calling convention but own their
//! allocation discipline: their outputs never enter the arena. `view` is
//! the canonical case — the alias database treats its output as aliasing
//! the input, which keeps both out of storage-reuse planning entirely.

use crate::{expect_tensor, KernelError};
use tensor_core::{IValue, Shape, Tensor};

/// Reshape. The element count must be preserved; dimensions must be
/// positive (no `-1` inference).
pub(crate) fn view(inputs: &[&IValue], outputs: &mut [IValue]) -> Result<(), KernelError> {
    let x = expect_tensor("view", inputs, 0)?;
    let size = inputs
        .get(1)
        .and_then(|v| v.as_int_list())
        .ok_or(KernelError::WrongInputType {
            op: "view",
            index: 1,
            expected: "int_list",
            actual: inputs.get(1).map(|v| v.type_tag()).unwrap_or("missing"),
        })?;

    let mut dims = Vec::with_capacity(size.len());
    for &d in size {
        if d <= 0 {
            return Err(KernelError::BadArgument {
                op: "view",
                detail: format!("non-positive dimension {d}"),
            });
        }
        dims.push(d as usize);
    }
    let shape = Shape::new(dims);
    if shape.num_elements() != x.shape().num_elements() {
        return Err(KernelError::BadArgument {
            op: "view",
            detail: format!(
                "cannot view {} elements as {shape}",
                x.shape().num_elements()
            ),
        });
    }

    let mut out = Tensor::from_bytes(x.shape().clone(), x.dtype(), x.as_bytes().to_vec())
        .expect("byte count matches the source tensor");
    out.set_shape(shape)
        .expect("element count was checked above");
    outputs[0] = IValue::Tensor(out);
    Ok(())
}

/// Builds a tuple from the input values.
pub(crate) fn tuple_construct(
    inputs: &[&IValue],
    outputs: &mut [IValue],
) -> Result<(), KernelError> {
    outputs[0] = IValue::Tuple(inputs.iter().map(|v| (*v).clone()).collect());
    Ok(())
}
