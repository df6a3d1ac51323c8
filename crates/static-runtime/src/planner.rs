// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The memory planner: one arena for all managed activations.
//!
//! The planner is created after the first invocation completes, because
//! tensor sizes are not statically known — it learns them by observing
//! the run. From then on every invocation brackets execution with:
//!
//! - [`allocate`](MemoryPlanner::allocate): acquire one buffer of the
//!   learned total size and bind every managed tensor's storage to its
//!   cluster's region.
//! - [`deallocate`](MemoryPlanner::deallocate): fold each tensor's
//!   observed size into its cluster's learned size (monotonically
//!   growing), reset managed storages, clear unmanaged slots, release
//!   the buffer.
//!
//! The learned sizes converge after a few warmups, after which each run
//! costs exactly one free-list hit for the arena and nothing else.
//!
//! Node outputs fall into three disjoint groups:
//! - **managed**: tensor outputs of out-variant nodes, arena-planned;
//! - **leaked**: container outputs of out-variant nodes that are
//!   expensive to reallocate and survive between runs on purpose;
//! - **unmanaged**: everything else, reset to `None` each run.
//!
//! Graph outputs appear in none of the groups: they escape the run and
//! must outlive `deallocate`.

use crate::module::ModuleData;
use crate::{ProcessedNode, ValueSource};
use caching_allocator::{BufferGuard, CachingAllocator};
use graph_ir::ValueId;
use std::collections::{HashMap, HashSet};
use tensor_core::ALIGNMENT;

/// Rounds `nbytes` up to the platform alignment boundary.
pub fn compute_aligned_tensor_size(nbytes: usize) -> usize {
    (nbytes + ALIGNMENT - 1) & !(ALIGNMENT - 1)
}

/// Coordinates of one output slot in the runtime's node vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct SlotRef {
    node: usize,
    output: usize,
}

/// One storage class: tensors sharing a single arena region, and the
/// largest aligned size observed for any of them so far.
struct ManagedStorage {
    learned_size: usize,
    tensors: Vec<SlotRef>,
}

/// Arena allocator for managed activations. One per runtime; see the
/// module docs for the lifecycle.
pub struct MemoryPlanner {
    managed: Vec<ManagedStorage>,
    unmanaged: Vec<SlotRef>,
    allocator: CachingAllocator,
    buffer: Option<BufferGuard>,
    managed_bytes: usize,
    reused_tensors: usize,
}

impl MemoryPlanner {
    /// Partitions node outputs into managed/leaked/unmanaged and snapshots
    /// the managed tensor slots. Called once, after the first run, when
    /// every output slot holds a materialized value.
    pub(crate) fn new(module: &ModuleData, nodes: &[ProcessedNode]) -> Self {
        let mut managed_values: HashSet<ValueId> = HashSet::new();
        let mut leaked_values: HashSet<ValueId> = HashSet::new();

        if module.opts.enable_out_variant {
            for pnode in nodes {
                if !pnode.has_out_variant() {
                    continue;
                }
                let graph_node = module.graph.node(pnode.node_id());
                for &out_v in &graph_node.outputs {
                    if module.always_alive.contains(&out_v) {
                        continue;
                    }
                    if module.graph.value(out_v).kind == graph_ir::ValueKind::Tensor {
                        managed_values.insert(out_v);
                    } else if op_registry::is_optimizable_container_type(pnode.kind()) {
                        // Leaked on purpose: reallocating these containers
                        // costs more than the memory they pin.
                        leaked_values.insert(out_v);
                    }
                }
            }
        }

        // Everything else is unmanaged and gets reset per run.
        let mut unmanaged: Vec<SlotRef> = Vec::new();
        for (node_idx, pnode) in nodes.iter().enumerate() {
            let graph_node = module.graph.node(pnode.node_id());
            for (i, &out_v) in graph_node.outputs.iter().enumerate() {
                if managed_values.contains(&out_v) || leaked_values.contains(&out_v) {
                    continue;
                }
                unmanaged.push(SlotRef {
                    node: node_idx,
                    output: i,
                });
            }
        }

        // Graph outputs escape the run: drop them from both groups so
        // deallocate neither frees nor resets them.
        let mut output_slots: HashSet<SlotRef> = HashSet::new();
        for source in &module.output_sources {
            if let ValueSource::Node { node, output } = source {
                output_slots.insert(SlotRef {
                    node: *node,
                    output: *output,
                });
            }
        }
        for &out_v in module.graph.outputs() {
            managed_values.remove(&out_v);
        }
        unmanaged.retain(|slot| !output_slots.contains(slot));

        let managed = if module.opts.enable_out_variant {
            assign_storage_to_managed_tensors(module, nodes, &managed_values)
        } else {
            Vec::new()
        };

        tracing::debug!(
            storage_classes = managed.len(),
            managed_tensors = managed.iter().map(|m| m.tensors.len()).sum::<usize>(),
            unmanaged = unmanaged.len(),
            leaked = leaked_values.len(),
            "memory planner constructed"
        );

        Self {
            managed,
            unmanaged,
            allocator: CachingAllocator::new(),
            buffer: None,
            managed_bytes: 0,
            reused_tensors: 0,
        }
    }

    /// Acquires the arena and binds every managed tensor to its cluster's
    /// region. A no-op until sizes have been learned.
    pub(crate) fn allocate(&mut self, nodes: &mut [ProcessedNode]) {
        if self.managed_bytes == 0 {
            return;
        }
        let mut buffer = self.allocator.allocate(self.managed_bytes);
        let base = buffer.as_mut_ptr();

        let mut offset = 0usize;
        self.reused_tensors = 0;
        for ms in &self.managed {
            if ms.learned_size == 0 {
                continue;
            }
            debug_assert!(offset + ms.learned_size <= self.managed_bytes);
            // SAFETY: the region [base + offset, base + offset + learned)
            // lies inside the buffer we hold until deallocate(), and
            // distinct clusters get disjoint regions. Cluster members
            // share one region by design; their live ranges are disjoint.
            let region = unsafe { base.add(offset) };
            for slot in &ms.tensors {
                let tensor = nodes[slot.node]
                    .output_mut(slot.output)
                    .as_tensor_mut()
                    .expect("managed slots hold tensors after the first run");
                unsafe { tensor.storage_mut().bind_arena(region, ms.learned_size) };
                self.reused_tensors += 1;
            }
            self.reused_tensors -= 1;

            offset += ms.learned_size;
        }
        debug_assert_eq!(offset, self.managed_bytes, "arena layout must be exact");
        self.buffer = Some(buffer);
    }

    /// Learns sizes from the finished run, resets managed storages and
    /// unmanaged slots, and releases the arena.
    ///
    /// Idempotent on already-clean state: resetting a `None` slot or an
    /// empty storage changes nothing, so a failed run does not poison the
    /// next one.
    pub(crate) fn deallocate(&mut self, nodes: &mut [ProcessedNode]) {
        self.managed_bytes = 0;

        // Free the bytes of managed tensors but keep the tensor objects,
        // recording the largest aligned size seen per cluster. Storage
        // size from the previous run becomes the allocation size for the
        // next one.
        for ms in &mut self.managed {
            let mut max = ms.learned_size;
            for slot in &ms.tensors {
                let tensor = nodes[slot.node]
                    .output_mut(slot.output)
                    .as_tensor_mut()
                    .expect("managed slots hold tensors after the first run");
                let current = compute_aligned_tensor_size(tensor.storage().nbytes());
                tensor.storage_mut().reset();
                max = max.max(current);
            }
            ms.learned_size = max;
            self.managed_bytes += max;
        }

        // Unmanaged slots are reset so whatever they owned is released.
        for slot in &self.unmanaged {
            *nodes[slot.node].output_mut(slot.output) = tensor_core::IValue::None;
        }

        self.buffer = None;
    }

    /// Total bytes managed by the arena (learned so far).
    pub fn total_managed(&self) -> usize {
        self.managed_bytes
    }

    /// Number of storage classes (clusters with at least one tensor).
    pub fn num_storage_classes(&self) -> usize {
        self.managed.len()
    }

    /// Number of managed tensors across all clusters.
    pub fn num_managed_tensors(&self) -> usize {
        self.managed.iter().map(|m| m.tensors.len()).sum()
    }

    /// Tensors that shared a region with another tensor last `allocate`.
    pub fn total_reused_tensors(&self) -> usize {
        self.reused_tensors
    }

    /// Arena allocator statistics (hits converge to 100% at steady
    /// state).
    pub fn allocator_stats(&self) -> caching_allocator::AllocationStats {
        self.allocator.stats()
    }
}

/// Walks nodes in order, grouping managed output tensors into storage
/// classes: cluster members map to one class, everything else gets its
/// own.
fn assign_storage_to_managed_tensors(
    module: &ModuleData,
    nodes: &[ProcessedNode],
    managed_values: &HashSet<ValueId>,
) -> Vec<ManagedStorage> {
    let mut managed: Vec<ManagedStorage> = Vec::new();
    let mut value_to_class: HashMap<ValueId, usize> = HashMap::new();

    for (node_idx, pnode) in nodes.iter().enumerate() {
        let graph_node = module.graph.node(pnode.node_id());
        for (i, &out_v) in graph_node.outputs.iter().enumerate() {
            if !managed_values.contains(&out_v) {
                continue;
            }
            debug_assert!(
                pnode.outputs()[i].is_tensor(),
                "managed value {out_v} is not a tensor after the first run"
            );
            let slot = SlotRef {
                node: node_idx,
                output: i,
            };
            if let Some(&class) = value_to_class.get(&out_v) {
                managed[class].tensors.push(slot);
            } else {
                managed.push(ManagedStorage {
                    learned_size: 0,
                    tensors: vec![slot],
                });
                // First of its cluster: point every member at this class.
                if let Some(cluster) = module.same_storage.get(&out_v) {
                    let class = managed.len() - 1;
                    for &member in cluster {
                        value_to_class.insert(member, class);
                    }
                }
            }
        }
    }
    managed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alignment() {
        assert_eq!(compute_aligned_tensor_size(0), 0);
        assert_eq!(compute_aligned_tensor_size(1), 64);
        assert_eq!(compute_aligned_tensor_size(64), 64);
        assert_eq!(compute_aligned_tensor_size(65), 128);
        assert_eq!(compute_aligned_tensor_size(1000), 1024);
    }
}
