// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The free-list allocator.
//!
//! Returned buffers are binned by "size class" (rounded up to the nearest
//! power of 2, with a floor). A new request first checks its size class in
//! the free list; only on a miss does it touch the heap. This trades a
//! small amount of memory waste for an allocation-free steady state.
//!
//! # Thread Safety
//! `CachingAllocator` is `Send + Sync` — all interior mutability sits
//! behind `Mutex` or atomics, so one allocator can back several runtimes
//! via `Arc<CachingAllocator>` if desired. The usual deployment is one
//! allocator per runtime.

use crate::{AllocationStats, BufferGuard};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Minimum size class: 4 KB. Anything smaller is rounded up.
const MIN_SIZE_CLASS: usize = 4096;

/// Internal allocator state, shared with buffer guards via `Arc`.
pub struct AllocatorInner {
    /// Currently allocated bytes (live, not yet returned).
    allocated_bytes: AtomicUsize,
    /// Free buffer cache: size_class → available buffers.
    free_buffers: Mutex<HashMap<usize, Vec<Vec<u8>>>>,
    /// Total bytes held in the free list.
    free_list_bytes: AtomicUsize,
    /// Statistics (behind a Mutex since updates are infrequent).
    stats: Mutex<AllocationStats>,
}

impl AllocatorInner {
    /// Called by `BufferGuard::drop` to return a buffer to the free list.
    pub(crate) fn return_buffer(&self, buffer: Vec<u8>, size_bytes: usize) {
        self.allocated_bytes.fetch_sub(size_bytes, Ordering::Release);

        if let Ok(mut stats) = self.stats.lock() {
            stats.record_deallocation();
        }

        let size_class = size_class_for(size_bytes);
        self.free_list_bytes
            .fetch_add(buffer.capacity(), Ordering::Release);

        if let Ok(mut free) = self.free_buffers.lock() {
            free.entry(size_class).or_default().push(buffer);
        }
    }
}

/// The arena-backing allocator.
///
/// # Example
/// ```
/// use caching_allocator::CachingAllocator;
///
/// let alloc = CachingAllocator::new();
///
/// let guard = alloc.allocate(1024 * 1024);
/// assert_eq!(alloc.allocated_bytes(), 1024 * 1024);
///
/// // The buffer is cached when the guard is dropped…
/// drop(guard);
/// assert_eq!(alloc.allocated_bytes(), 0);
///
/// // …so the next same-size request is a cache hit.
/// let _again = alloc.allocate(1024 * 1024);
/// assert_eq!(alloc.stats().cache_hits, 1);
/// ```
pub struct CachingAllocator {
    inner: Arc<AllocatorInner>,
}

impl CachingAllocator {
    /// Creates a new allocator with an empty free list.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(AllocatorInner {
                allocated_bytes: AtomicUsize::new(0),
                free_buffers: Mutex::new(HashMap::new()),
                free_list_bytes: AtomicUsize::new(0),
                stats: Mutex::new(AllocationStats::default()),
            }),
        }
    }

    /// Allocates a buffer of `size_bytes`.
    ///
    /// A cached buffer of the right size class is reused when available
    /// (its contents are unspecified); otherwise a fresh `Vec<u8>` is
    /// allocated. The returned [`BufferGuard`] gives the buffer back to
    /// the free list when dropped.
    pub fn allocate(&self, size_bytes: usize) -> BufferGuard {
        let size_class = size_class_for(size_bytes);
        let mut buffer = None;

        if let Ok(mut free) = self.inner.free_buffers.lock() {
            if let Some(class_buffers) = free.get_mut(&size_class) {
                if let Some(mut buf) = class_buffers.pop() {
                    self.inner
                        .free_list_bytes
                        .fetch_sub(buf.capacity(), Ordering::Release);
                    // The class may have been cached by a smaller request
                    // in the same bin.
                    if buf.len() < size_bytes {
                        buf.resize(size_bytes, 0);
                    }
                    buffer = Some(buf);
                }
            }
        }

        let is_hit = buffer.is_some();
        let data = buffer.unwrap_or_else(|| vec![0u8; size_bytes]);

        self.inner
            .allocated_bytes
            .fetch_add(size_bytes, Ordering::Release);

        if let Ok(mut stats) = self.inner.stats.lock() {
            if is_hit {
                stats.record_cache_hit(size_bytes);
            } else {
                stats.record_cache_miss(size_bytes);
            }
            let new_total = self.inner.allocated_bytes.load(Ordering::Acquire);
            stats.update_peak(new_total);
        }

        tracing::trace!(size_bytes, is_hit, "arena buffer acquired");
        BufferGuard::new(data, Arc::clone(&self.inner), size_bytes)
    }

    /// Returns the number of bytes currently allocated (live, not yet
    /// returned).
    pub fn allocated_bytes(&self) -> usize {
        self.inner.allocated_bytes.load(Ordering::Acquire)
    }

    /// Returns a snapshot of allocation statistics.
    pub fn stats(&self) -> AllocationStats {
        self.inner
            .stats
            .lock()
            .map(|s| s.clone())
            .unwrap_or_default()
    }

    /// Evicts all cached free buffers, releasing memory back to the OS.
    ///
    /// Currently-allocated buffers are unaffected — only the free list is
    /// cleared.
    pub fn shrink(&self) {
        if let Ok(mut free) = self.inner.free_buffers.lock() {
            free.clear();
            self.inner.free_list_bytes.store(0, Ordering::Release);
        }
    }

    /// Returns the approximate number of bytes held in the free list.
    pub fn free_list_bytes(&self) -> usize {
        self.inner.free_list_bytes.load(Ordering::Acquire)
    }
}

impl Default for CachingAllocator {
    fn default() -> Self {
        Self::new()
    }
}

/// Computes the size class for a given allocation size.
///
/// Returns the smallest power of 2 that is ≥ `size` and ≥ `MIN_SIZE_CLASS`.
fn size_class_for(size: usize) -> usize {
    let min = size.max(MIN_SIZE_CLASS);
    min.next_power_of_two()
}

impl std::fmt::Debug for CachingAllocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachingAllocator")
            .field("allocated_bytes", &self.allocated_bytes())
            .field("free_list_bytes", &self.free_list_bytes())
            .finish()
    }
}
