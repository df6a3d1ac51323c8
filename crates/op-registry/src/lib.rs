// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # op-registry
//!
//! The kernel library behind the static runtime. For every operator kind
//! it answers three lookups and two predicates:
//!
//! - [`out_variant_for`] — a handler writing into preallocated output
//!   slots, reusing their storage whenever the capacity suffices. These
//!   handlers feed the memory planner.
//! - [`native_for`] — a handler with the same shape that owns its own
//!   allocation discipline and never participates in the arena.
//! - [`boxed_op_for`] — the stack-calling-convention fallback; variadic
//!   operators find their arity pushed after the last input.
//! - [`can_reuse_inputs_outputs`] — `true` when every value flowing
//!   through the operator is eligible for storage reuse.
//! - [`is_optimizable_container_type`] — container outputs that are
//!   expensive to reallocate and therefore intentionally leaked between
//!   runs.

mod boxed;
mod error;
mod native;
mod out_variant;

pub use error::KernelError;

use graph_ir::OpKind;
use tensor_core::{DType, IValue, Shape, Tensor};

/// An out-variant or native handler: reads resolved input slots, writes
/// the node's owned output slots.
pub type KernelFn = fn(&[&IValue], &mut [IValue]) -> Result<(), KernelError>;

/// A boxed handler: pops its inputs off the stack and pushes its outputs.
pub type BoxedFn = fn(&mut Vec<IValue>) -> Result<(), KernelError>;

/// Returns the out-variant handler for `kind`, if one exists.
pub fn out_variant_for(kind: OpKind) -> Option<KernelFn> {
    match kind {
        OpKind::Add => Some(out_variant::add_out),
        OpKind::Mul => Some(out_variant::mul_out),
        OpKind::Matmul => Some(out_variant::matmul_out),
        OpKind::Relu => Some(out_variant::relu_out),
        OpKind::Sigmoid => Some(out_variant::sigmoid_out),
        OpKind::ListConstruct => Some(out_variant::list_construct_out),
        _ => None,
    }
}

/// Returns the native handler for `kind`, if one exists.
pub fn native_for(kind: OpKind) -> Option<KernelFn> {
    match kind {
        OpKind::View => Some(native::view),
        OpKind::TupleConstruct => Some(native::tuple_construct),
        _ => None,
    }
}

/// Returns the boxed fallback for `kind`, if the operator is resolvable
/// at all.
pub fn boxed_op_for(kind: OpKind) -> Option<BoxedFn> {
    match kind {
        OpKind::Add => Some(boxed::add),
        OpKind::Mul => Some(boxed::mul),
        OpKind::Matmul => Some(boxed::matmul),
        OpKind::Relu => Some(boxed::relu),
        OpKind::Sigmoid => Some(boxed::sigmoid),
        OpKind::View => Some(boxed::view),
        OpKind::Concat => Some(boxed::concat),
        OpKind::ListConstruct => Some(boxed::list_construct),
        OpKind::TupleConstruct => Some(boxed::tuple_construct),
        OpKind::Constant | OpKind::If | OpKind::Loop => None,
    }
}

/// Returns `true` if the operator is resolvable through any of the three
/// dispatch surfaces.
pub fn is_registered(kind: OpKind) -> bool {
    out_variant_for(kind).is_some() || native_for(kind).is_some() || boxed_op_for(kind).is_some()
}

/// Returns `true` when the values read and produced by this operator may
/// share storage with other values (the operator neither views its inputs
/// nor retains references past the call).
pub fn can_reuse_inputs_outputs(kind: OpKind) -> bool {
    matches!(
        kind,
        OpKind::Add | OpKind::Mul | OpKind::Matmul | OpKind::Relu | OpKind::Sigmoid
    )
}

/// Returns `true` for container outputs that are expensive to reallocate
/// and therefore kept alive between runs instead of being freed.
pub fn is_optimizable_container_type(kind: OpKind) -> bool {
    matches!(kind, OpKind::ListConstruct | OpKind::TupleConstruct)
}

// ── Shared kernel helpers ──────────────────────────────────────────

/// Fetches input `index` as a tensor or reports the actual type.
pub(crate) fn expect_tensor<'a>(
    op: &'static str,
    inputs: &'a [&IValue],
    index: usize,
) -> Result<&'a Tensor, KernelError> {
    let value = inputs.get(index).ok_or(KernelError::WrongArity {
        op,
        expected: index + 1,
        actual: inputs.len(),
    })?;
    value.as_tensor().ok_or(KernelError::WrongInputType {
        op,
        index,
        expected: "tensor",
        actual: value.type_tag(),
    })
}

/// Shapes an output slot for an out-variant write.
///
/// Reuses the slot's existing tensor (and storage) whenever the dtype
/// matches and the capacity suffices; grows onto fresh heap storage
/// otherwise. The returned tensor always carries `shape`.
pub(crate) fn resize_tensor_output(slot: &mut IValue, shape: Shape, dtype: DType) -> &mut Tensor {
    let needed = shape.size_bytes(dtype);
    match &mut *slot {
        IValue::Tensor(t) if t.dtype() == dtype => {
            t.storage_mut().ensure_capacity(needed);
            t.set_shape(shape)
                .expect("capacity was just ensured for this shape");
        }
        other => {
            *other = IValue::Tensor(Tensor::zeros(shape, dtype));
        }
    }
    slot.as_tensor_mut()
        .expect("slot holds a tensor after resize")
}

/// Wraps a tensor-level failure with the operator name.
pub(crate) fn tensor_err(
    op: &'static str,
) -> impl Fn(tensor_core::TensorError) -> KernelError {
    move |source| KernelError::Tensor { op, source }
}
