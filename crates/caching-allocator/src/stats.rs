// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Allocation statistics for profiling and diagnostics.

/// Cumulative statistics about allocator usage.
///
/// A steady-state inference loop should converge to a 100% hit rate after
/// warmup; anything else means arena sizes are still being learned.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct AllocationStats {
    /// Total number of allocation requests.
    pub total_allocations: u64,
    /// Number of allocations served from the free list (cache hits).
    pub cache_hits: u64,
    /// Number of allocations that required fresh memory.
    pub cache_misses: u64,
    /// Peak memory usage in bytes.
    pub peak_allocated_bytes: usize,
    /// Total bytes ever requested (including reused buffers).
    pub cumulative_allocated_bytes: u64,
    /// Total number of buffer returns (drops).
    pub total_deallocations: u64,
}

impl AllocationStats {
    /// Returns the cache hit ratio as a fraction in `[0.0, 1.0]`.
    ///
    /// Returns `0.0` if no allocations have been made.
    pub fn cache_hit_ratio(&self) -> f64 {
        let total = self.cache_hits + self.cache_misses;
        if total == 0 {
            return 0.0;
        }
        self.cache_hits as f64 / total as f64
    }

    pub(crate) fn record_cache_hit(&mut self, size: usize) {
        self.total_allocations += 1;
        self.cache_hits += 1;
        self.cumulative_allocated_bytes += size as u64;
    }

    pub(crate) fn record_cache_miss(&mut self, size: usize) {
        self.total_allocations += 1;
        self.cache_misses += 1;
        self.cumulative_allocated_bytes += size as u64;
    }

    pub(crate) fn record_deallocation(&mut self) {
        self.total_deallocations += 1;
    }

    pub(crate) fn update_peak(&mut self, current_bytes: usize) {
        if current_bytes > self.peak_allocated_bytes {
            self.peak_allocated_bytes = current_bytes;
        }
    }

    /// Returns a human-readable summary.
    pub fn summary(&self) -> String {
        let peak_kb = self.peak_allocated_bytes as f64 / 1024.0;
        format!(
            "Allocations: {} total ({} hits, {} misses, {:.0}% hit rate), \
             peak {:.1} KB, {} deallocations",
            self.total_allocations,
            self.cache_hits,
            self.cache_misses,
            self.cache_hit_ratio() * 100.0,
            peak_kb,
            self.total_deallocations,
        )
    }
}
