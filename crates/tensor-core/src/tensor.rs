// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Core tensor type built on a detachable [`Storage`].
//!
//! `Tensor` is the primary data carrier in the inference pipeline. Unlike
//! a plain buffer-owning tensor, its storage can be reset (freed) and
//! later re-bound to an arena region while the tensor object — shape,
//! dtype, identity — stays alive. The memory planner relies on exactly
//! this split.
//!
//! # Memory Layout
//! Data is stored in row-major (C) order as a flat byte buffer. Typed
//! access is provided via [`as_f32_slice`](Tensor::as_f32_slice) and
//! friends.

use crate::{DType, Shape, Storage, TensorError};

/// An owned, n-dimensional tensor in contiguous memory.
#[derive(Debug, Clone)]
pub struct Tensor {
    shape: Shape,
    dtype: DType,
    storage: Storage,
}

impl Tensor {
    /// Creates a new tensor filled with zeros.
    ///
    /// # Examples
    /// ```
    /// use tensor_core::{Tensor, Shape, DType};
    /// let t = Tensor::zeros(Shape::matrix(2, 3), DType::F32);
    /// assert_eq!(t.nbytes(), 24); // 2 * 3 * 4 bytes
    /// ```
    pub fn zeros(shape: Shape, dtype: DType) -> Self {
        let size = shape.size_bytes(dtype);
        Self {
            shape,
            dtype,
            storage: Storage::with_capacity(size),
        }
    }

    /// Creates a tensor from raw bytes.
    ///
    /// Returns an error if the buffer size does not match
    /// `shape.size_bytes(dtype)`.
    pub fn from_bytes(shape: Shape, dtype: DType, data: Vec<u8>) -> Result<Self, TensorError> {
        let expected = shape.size_bytes(dtype);
        if data.len() != expected {
            return Err(TensorError::BufferSizeMismatch {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            shape,
            dtype,
            storage: Storage::from_vec(data),
        })
    }

    /// Creates a tensor from a slice of `f32` values.
    ///
    /// # Examples
    /// ```
    /// use tensor_core::{Tensor, Shape};
    /// let t = Tensor::from_f32(Shape::vector(3), &[1.0, 2.0, 3.0]).unwrap();
    /// assert_eq!(t.as_f32_slice(), &[1.0, 2.0, 3.0]);
    /// ```
    pub fn from_f32(shape: Shape, values: &[f32]) -> Result<Self, TensorError> {
        let expected_elements = shape.num_elements();
        if values.len() != expected_elements {
            return Err(TensorError::BufferSizeMismatch {
                expected: expected_elements * DType::F32.size_bytes(),
                actual: values.len() * DType::F32.size_bytes(),
            });
        }
        // SAFETY: reinterpreting &[f32] as &[u8] is safe for Copy types.
        let byte_slice =
            unsafe { std::slice::from_raw_parts(values.as_ptr() as *const u8, values.len() * 4) };
        Ok(Self {
            shape,
            dtype: DType::F32,
            storage: Storage::from_vec(byte_slice.to_vec()),
        })
    }

    /// Returns the tensor's shape.
    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    /// Returns the tensor's data type.
    pub fn dtype(&self) -> DType {
        self.dtype
    }

    /// Returns the logical size of this tensor in bytes
    /// (`shape × dtype`, independent of storage capacity).
    pub fn nbytes(&self) -> usize {
        self.shape.size_bytes(self.dtype)
    }

    /// Returns a reference to the backing storage.
    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    /// Returns a mutable reference to the backing storage.
    ///
    /// Used by the memory planner to reset and re-bind activation
    /// storages between runs.
    pub fn storage_mut(&mut self) -> &mut Storage {
        &mut self.storage
    }

    /// Returns `true` if the storage currently holds data.
    pub fn has_data(&self) -> bool {
        !self.storage.is_empty()
    }

    /// Re-shapes the tensor in place without touching storage.
    ///
    /// Fails if the new logical size exceeds the storage capacity; callers
    /// that may grow must go through
    /// [`Storage::ensure_capacity`](crate::Storage::ensure_capacity) first.
    pub fn set_shape(&mut self, shape: Shape) -> Result<(), TensorError> {
        let needed = shape.size_bytes(self.dtype);
        if needed > self.storage.nbytes() {
            return Err(TensorError::StorageTooSmall {
                shape,
                needed,
                capacity: self.storage.nbytes(),
            });
        }
        self.shape = shape;
        Ok(())
    }

    /// Returns the logical bytes of this tensor.
    pub fn as_bytes(&self) -> &[u8] {
        self.storage.as_slice(self.nbytes())
    }

    /// Returns the logical bytes of this tensor, mutably.
    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        let len = self.nbytes();
        self.storage.as_mut_slice(len)
    }

    /// Interprets the buffer as a slice of `f32`.
    ///
    /// # Panics
    /// Panics if `self.dtype() != DType::F32` or the storage is empty.
    pub fn as_f32_slice(&self) -> &[f32] {
        assert_eq!(
            self.dtype,
            DType::F32,
            "as_f32_slice called on {:?} tensor",
            self.dtype
        );
        let bytes = self.as_bytes();
        // SAFETY: the buffer was written as f32 data; allocations from
        // Vec<u8> and the arena are sufficiently aligned in practice
        // (arena offsets are 64-byte aligned).
        unsafe {
            std::slice::from_raw_parts(bytes.as_ptr() as *const f32, self.shape.num_elements())
        }
    }

    /// Interprets the buffer as a mutable slice of `f32`.
    ///
    /// # Panics
    /// Panics if `self.dtype() != DType::F32` or the storage is empty.
    pub fn as_f32_slice_mut(&mut self) -> &mut [f32] {
        assert_eq!(
            self.dtype,
            DType::F32,
            "as_f32_slice_mut called on {:?} tensor",
            self.dtype
        );
        let n = self.shape.num_elements();
        let bytes = self.as_bytes_mut();
        // SAFETY: as above.
        unsafe { std::slice::from_raw_parts_mut(bytes.as_mut_ptr() as *mut f32, n) }
    }

    /// Fills the tensor with a constant `f32` value.
    ///
    /// # Panics
    /// Panics if `self.dtype() != DType::F32`.
    pub fn fill_f32(&mut self, value: f32) {
        let slice = self.as_f32_slice_mut();
        slice.iter_mut().for_each(|x| *x = value);
    }

    /// Returns a copy on freshly heap-allocated storage.
    ///
    /// Unlike `clone()`, which shallowly shares an arena binding, the
    /// result is independent of this tensor's storage and may outlive
    /// the run that produced it.
    pub fn owned_copy(&self) -> Tensor {
        Tensor::from_bytes(self.shape.clone(), self.dtype, self.as_bytes().to_vec())
            .expect("byte count matches the source tensor")
    }
}

impl PartialEq for Tensor {
    /// Tensors compare by shape, dtype, and logical bytes. Tensors with
    /// reset storage compare equal only to other reset tensors of the
    /// same shape and dtype.
    fn eq(&self, other: &Self) -> bool {
        if self.shape != other.shape || self.dtype != other.dtype {
            return false;
        }
        match (self.has_data(), other.has_data()) {
            (true, true) => self.as_bytes() == other.as_bytes(),
            (false, false) => true,
            _ => false,
        }
    }
}
