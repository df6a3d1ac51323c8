// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Liveness and storage-sharing analysis.
//!
//! Four passes run over a frozen graph at module-compilation time:
//!
//! 1. [`always_alive_values`] — values whose live range exceeds a single
//!    invocation: graph inputs, graph outputs, constants, and anything
//!    that may alias them.
//! 2. [`liveness_map`] — the pairwise concurrent-liveness relation over
//!    the remaining values.
//! 3. [`memory_planning_candidates`] — values that flow exclusively
//!    through storage-reuse-eligible operators, in a deterministic order.
//! 4. [`same_storage_values`] — greedy first-fit clustering of the
//!    candidates; every cluster shares one arena region at runtime.
//!
//! Determinism matters here: candidate order and cluster assignment feed
//! directly into arena layout, and a stable layout is what makes plans
//! debuggable and benchmarks comparable. All iteration that affects
//! output order runs over creation-ordered vectors, never hash maps.

use graph_ir::{AliasDb, Graph, NodeId, OpKind, ValueId};
use std::collections::{BTreeSet, HashMap, HashSet};

/// For each value, the set of values whose live ranges overlap its own.
pub type LivenessMap = HashMap<ValueId, BTreeSet<ValueId>>;

/// Map from a value to every member of its storage-sharing cluster
/// (including itself). Values absent from the map are singletons.
pub type SameStorageMap = HashMap<ValueId, Vec<ValueId>>;

/// Computes the set of values that must outlive any single invocation:
/// graph inputs, graph outputs, constant outputs, and every node output
/// that may alias into that set.
///
/// One expansion pass suffices: alias closure over the seeded set is
/// already captured by the containment predicate.
pub fn always_alive_values(graph: &Graph, db: &AliasDb) -> HashSet<ValueId> {
    let mut always_alive: HashSet<ValueId> = HashSet::new();

    for &input in graph.inputs() {
        always_alive.insert(input);
    }
    for &output in graph.outputs() {
        always_alive.insert(output);
    }
    for node in graph.nodes() {
        if node.kind == OpKind::Constant {
            for &v in &node.outputs {
                always_alive.insert(v);
            }
        }
    }

    for node in graph.nodes() {
        if node.kind == OpKind::Constant {
            continue;
        }
        for &v in &node.outputs {
            if db.may_contain_alias_sets([v], always_alive.iter().copied()) {
                always_alive.insert(v);
            }
        }
    }
    always_alive
}

/// Walks the graph in program order tracking which values are live, and
/// records every pair of values whose live ranges overlap.
///
/// A value becomes live when its producing node runs and dies after its
/// last consuming node. Aliases complicate the death edge: when a freshly
/// produced value may alias a *later-created* value, the alias's
/// consumers are spliced into the original's use chain so that reading
/// the alias keeps the original alive. Aliases created earlier are
/// deliberately not considered — a new tensor cannot become an alias of
/// something that already existed.
pub fn liveness_map(
    graph: &Graph,
    always_alive: &HashSet<ValueId>,
    db: &AliasDb,
) -> LivenessMap {
    let mut liveness: LivenessMap = HashMap::new();

    // Node outputs in creation order, and each value's position in it.
    let mut creation_order: Vec<ValueId> = Vec::new();
    let mut creation_idx: HashMap<ValueId, usize> = HashMap::new();
    for node in graph.nodes() {
        for &v in &node.outputs {
            creation_idx.insert(v, creation_order.len());
            creation_order.push(v);
        }
    }

    // Presence in `use_chain` means the value is live; the entry maps to
    // the nodes that may still consume it.
    let mut use_chain: HashMap<ValueId, BTreeSet<NodeId>> = HashMap::new();
    // Per node, the values whose chains it retires.
    let mut def_chain: HashMap<NodeId, BTreeSet<ValueId>> = HashMap::new();

    struct Activate<'a> {
        graph: &'a Graph,
        db: &'a AliasDb,
        creation_order: &'a [ValueId],
        creation_idx: &'a HashMap<ValueId, usize>,
    }

    impl Activate<'_> {
        fn run(
            &self,
            v: ValueId,
            liveness: &mut LivenessMap,
            use_chain: &mut HashMap<ValueId, BTreeSet<NodeId>>,
            def_chain: &mut HashMap<NodeId, BTreeSet<ValueId>>,
        ) {
            if liveness.contains_key(&v) {
                return;
            }
            liveness.insert(v, BTreeSet::new());

            let active: Vec<ValueId> = use_chain.keys().copied().collect();
            for w in active {
                liveness
                    .get_mut(&v)
                    .expect("entry inserted above")
                    .insert(w);
                liveness
                    .get_mut(&w)
                    .expect("live values were activated earlier")
                    .insert(v);
            }

            // Values with no consumers die immediately and never enter
            // the live set.
            if self.graph.value(v).has_uses() {
                use_chain.insert(v, BTreeSet::new());
            }
            for u in self.graph.value(v).uses() {
                use_chain
                    .get_mut(&v)
                    .expect("chain inserted for values with uses")
                    .insert(u.node);
                def_chain.entry(u.node).or_default().insert(v);
            }

            // Refine aliases of v considering only values created at or
            // after it.
            let start = self.creation_idx[&v];
            let mut refined: Vec<ValueId> = Vec::new();
            for &candidate in &self.creation_order[start..] {
                if self.db.may_contain_alias(v, candidate) {
                    refined.push(candidate);
                }
            }
            for aliased in refined {
                self.run(aliased, liveness, use_chain, def_chain);
                // Track the alias's consumers as if they were our own.
                for u in self.graph.value(aliased).uses() {
                    use_chain.entry(v).or_default().insert(u.node);
                    def_chain.entry(u.node).or_default().insert(v);
                }
            }
        }
    }

    let activate = Activate {
        graph,
        db,
        creation_order: &creation_order,
        creation_idx: &creation_idx,
    };

    for node in graph.nodes() {
        for &v in &node.outputs {
            if !always_alive.contains(&v) {
                activate.run(v, &mut liveness, &mut use_chain, &mut def_chain);
            }
        }

        // Retire values whose last consumer was this node.
        let mut dead: Vec<ValueId> = Vec::new();
        if let Some(consumed) = def_chain.get(&node.id) {
            for &v in consumed {
                if let Some(chain) = use_chain.get_mut(&v) {
                    chain.remove(&node.id);
                    if chain.is_empty() {
                        dead.push(v);
                    }
                }
            }
        }
        for v in dead {
            use_chain.remove(&v);
        }
    }

    for v in use_chain.keys() {
        debug_assert!(
            always_alive.contains(v),
            "value {v} still live at graph end but not always-alive"
        );
    }

    // Boundary case: a node's inputs and outputs are live simultaneously
    // while the node runs.
    for node in graph.nodes() {
        for &input in &node.inputs {
            for &output in &node.outputs {
                if liveness.contains_key(&input) && liveness.contains_key(&output) {
                    liveness
                        .get_mut(&input)
                        .expect("presence checked")
                        .insert(output);
                    liveness
                        .get_mut(&output)
                        .expect("presence checked")
                        .insert(input);
                }
            }
        }
    }

    liveness
}

/// Collects the values eligible for storage planning.
///
/// A value qualifies only if *every* node that reads or produces it is
/// storage-reuse-eligible; one ineligible touch anywhere disqualifies it.
///
/// Returns `(candidates, all_values)`, both in first-appearance order so
/// downstream clustering is deterministic.
pub fn memory_planning_candidates(graph: &Graph) -> (Vec<ValueId>, Vec<ValueId>) {
    let mut seen: HashSet<ValueId> = HashSet::new();
    let mut all_values: Vec<ValueId> = Vec::new();
    let mut can_reuse: HashSet<ValueId> = HashSet::new();
    let mut cannot_reuse: HashSet<ValueId> = HashSet::new();

    for node in graph.nodes() {
        let reusable = op_registry::can_reuse_inputs_outputs(node.kind);
        for &v in &node.inputs {
            if seen.insert(v) {
                all_values.push(v);
            }
            if reusable {
                can_reuse.insert(v);
            } else {
                cannot_reuse.insert(v);
            }
        }
        for &v in &node.outputs {
            if seen.insert(v) {
                all_values.push(v);
            }
            if reusable {
                can_reuse.insert(v);
            } else {
                cannot_reuse.insert(v);
            }
        }
    }
    for v in &cannot_reuse {
        can_reuse.remove(v);
    }

    let candidates: Vec<ValueId> = all_values
        .iter()
        .copied()
        .filter(|v| can_reuse.contains(v))
        .collect();
    (candidates, all_values)
}

/// Greedy first-fit clustering of planning candidates into storage
/// classes.
///
/// Two phases, both deterministic:
/// 1. Merge every value into the cluster of any earlier value it may
///    alias. This is a conservative over-approximation — values the
///    alias database cannot separate end up sharing storage even when a
///    sharper analysis could keep them apart.
/// 2. Walk candidates in order; merge each into the first earlier
///    candidate whose cluster is disjoint from everything live during
///    the candidate's own cluster's lifetime.
pub fn same_storage_values(
    liveness: &LivenessMap,
    always_alive: &HashSet<ValueId>,
    candidates: &(Vec<ValueId>, Vec<ValueId>),
    db: &AliasDb,
) -> SameStorageMap {
    let (optimizable, all_values) = candidates;
    let mut same: SameStorageMap = HashMap::new();

    fn share_storage(same: &mut SameStorageMap, new_v: ValueId, old_v: ValueId) {
        if new_v == old_v {
            return;
        }
        debug_assert!(same.contains_key(&old_v), "cluster for {old_v} must exist");
        let mut seen: BTreeSet<ValueId> = BTreeSet::new();
        let mut merged: Vec<ValueId> = Vec::new();
        for &v in &same[&old_v] {
            if seen.insert(v) {
                merged.push(v);
            }
        }
        for &v in &same[&new_v] {
            if seen.insert(v) {
                merged.push(v);
            }
        }
        for &v in &merged {
            same.insert(v, merged.clone());
        }
    }

    // Phase 1: union clusters along may-alias edges.
    for (i, &v) in all_values.iter().enumerate() {
        same.entry(v).or_insert_with(|| vec![v]);
        if always_alive.contains(&v) {
            continue;
        }
        for &p in &all_values[..i] {
            if db.may_alias(p, v) {
                share_storage(&mut same, v, p);
            }
        }
    }

    // Phase 2: first-fit against previously seen candidates.
    let mut seen_order: Vec<ValueId> = Vec::new();
    for &v in optimizable {
        if always_alive.contains(&v) {
            continue;
        }
        // Everything live while any member of v's cluster is live.
        let mut live: BTreeSet<ValueId> = BTreeSet::new();
        for &member in &same[&v] {
            if let Some(l) = liveness.get(&member) {
                live.extend(l.iter().copied());
            }
        }
        live.extend(always_alive.iter().copied());

        for &s in &seen_order {
            let intersects = same[&s].iter().any(|m| live.contains(m));
            if !intersects {
                share_storage(&mut same, v, s);
                // s was folded into v's cluster; the live set is stale
                // now, so stop scanning.
                break;
            }
        }
        seen_order.push(v);
    }

    same
}
