// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Alias analysis façade.
//!
//! The runtime only ever asks two questions about aliasing, so [`AliasDb`]
//! exposes exactly two predicates:
//!
//! - [`may_alias`](AliasDb::may_alias): can two values share memory?
//! - [`may_contain_alias`](AliasDb::may_contain_alias): can two values, or
//!   anything they contain, share memory?
//!
//! Internally the database is computed in one pass over the frozen graph:
//! view-like operators union their output with the viewed input
//! (union-find), and container constructors record containment edges from
//! the container to its elements. Both relations are conservative
//! over-approximations; the answer "may" is never a guarantee.

use crate::{Graph, OpKind, ValueId};
use std::collections::BTreeSet;

/// Alias database over one [`Graph`]. Immutable once constructed.
pub struct AliasDb {
    /// Flattened union-find leader per value.
    leader: Vec<u32>,
    /// Directly contained values per value (container → elements).
    contains: Vec<Vec<ValueId>>,
}

impl AliasDb {
    /// Analyzes `graph` and builds the database.
    pub fn new(graph: &Graph) -> Self {
        let n = graph.num_values();
        let mut parent: Vec<u32> = (0..n as u32).collect();
        let mut contains: Vec<Vec<ValueId>> = vec![Vec::new(); n];

        fn find(parent: &mut [u32], v: u32) -> u32 {
            let mut root = v;
            while parent[root as usize] != root {
                root = parent[root as usize];
            }
            // Path compression.
            let mut cur = v;
            while parent[cur as usize] != root {
                let next = parent[cur as usize];
                parent[cur as usize] = root;
                cur = next;
            }
            root
        }

        for node in graph.nodes() {
            match node.kind {
                OpKind::View => {
                    // The reshaped output may alias the viewed tensor.
                    let out = node.output();
                    let src = node.inputs[0];
                    let a = find(&mut parent, out.0);
                    let b = find(&mut parent, src.0);
                    parent[a as usize] = b;
                }
                OpKind::ListConstruct | OpKind::TupleConstruct => {
                    let out = node.output();
                    contains[out.index()].extend(node.inputs.iter().copied());
                }
                _ => {}
            }
        }

        let leader = (0..n as u32).map(|v| find(&mut parent, v)).collect();
        tracing::debug!(values = n, "alias database built");
        Self { leader, contains }
    }

    fn leader_of(&self, v: ValueId) -> u32 {
        self.leader[v.index()]
    }

    /// Returns `true` if `a` and `b` may share memory directly.
    pub fn may_alias(&self, a: ValueId, b: ValueId) -> bool {
        self.leader_of(a) == self.leader_of(b)
    }

    /// The set of alias leaders reachable from `v` through containment.
    fn closure_into(&self, v: ValueId, out: &mut BTreeSet<u32>) {
        if !out.insert(self.leader_of(v)) {
            return;
        }
        for &c in &self.contains[v.index()] {
            self.closure_into(c, out);
        }
    }

    /// Returns `true` if `a` and `b`, or anything they transitively
    /// contain, may share memory.
    pub fn may_contain_alias(&self, a: ValueId, b: ValueId) -> bool {
        self.may_contain_alias_sets([a], [b])
    }

    /// Set form of [`may_contain_alias`](AliasDb::may_contain_alias):
    /// `true` if any member of `a` (or its contents) may alias any member
    /// of `b` (or its contents).
    pub fn may_contain_alias_sets(
        &self,
        a: impl IntoIterator<Item = ValueId>,
        b: impl IntoIterator<Item = ValueId>,
    ) -> bool {
        let mut ca = BTreeSet::new();
        for v in a {
            self.closure_into(v, &mut ca);
        }
        if ca.is_empty() {
            return false;
        }
        let mut cb = BTreeSet::new();
        for v in b {
            self.closure_into(v, &mut cb);
        }
        !ca.is_disjoint(&cb)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{GraphBuilder, ValueKind};
    use tensor_core::IValue;

    #[test]
    fn test_fresh_outputs_do_not_alias() {
        let mut b = GraphBuilder::new("fresh");
        let x = b.input("x", ValueKind::Tensor);
        let y = b.op(OpKind::Relu, vec![x]);
        let z = b.op(OpKind::Add, vec![y, y]);
        b.output(z);
        let g = b.finish().unwrap();
        let db = AliasDb::new(&g);

        assert!(!db.may_alias(x, y));
        assert!(!db.may_alias(y, z));
        assert!(db.may_alias(x, x));
    }

    #[test]
    fn test_view_aliases_source() {
        let mut b = GraphBuilder::new("view");
        let x = b.input("x", ValueKind::Tensor);
        let shape = b.constant("shape", IValue::IntList(vec![4]));
        let v = b.op(OpKind::View, vec![x, shape]);
        let z = b.op(OpKind::Relu, vec![v]);
        b.output(z);
        let g = b.finish().unwrap();
        let db = AliasDb::new(&g);

        assert!(db.may_alias(x, v));
        assert!(db.may_alias(v, x));
        assert!(!db.may_alias(v, z));
        assert!(db.may_contain_alias(v, x));
    }

    #[test]
    fn test_chained_views_collapse() {
        let mut b = GraphBuilder::new("views");
        let x = b.input("x", ValueKind::Tensor);
        let s1 = b.constant("s1", IValue::IntList(vec![4]));
        let s2 = b.constant("s2", IValue::IntList(vec![2, 2]));
        let v1 = b.op(OpKind::View, vec![x, s1]);
        let v2 = b.op(OpKind::View, vec![v1, s2]);
        b.output(v2);
        let g = b.finish().unwrap();
        let db = AliasDb::new(&g);

        assert!(db.may_alias(x, v2));
        assert!(db.may_alias(v1, v2));
    }

    #[test]
    fn test_container_containment() {
        let mut b = GraphBuilder::new("list");
        let x = b.input("x", ValueKind::Tensor);
        let y = b.op(OpKind::Relu, vec![x]);
        let l = b.op(OpKind::ListConstruct, vec![x, y]);
        b.output(l);
        let g = b.finish().unwrap();
        let db = AliasDb::new(&g);

        // The list does not *alias* its elements, but it may contain them.
        assert!(!db.may_alias(l, x));
        assert!(db.may_contain_alias(l, x));
        assert!(db.may_contain_alias(l, y));
        assert!(db.may_contain_alias_sets([x], [l]));
    }

    #[test]
    fn test_containment_through_view() {
        let mut b = GraphBuilder::new("list_of_view");
        let x = b.input("x", ValueKind::Tensor);
        let s = b.constant("s", IValue::IntList(vec![4]));
        let v = b.op(OpKind::View, vec![x, s]);
        let l = b.op(OpKind::ListConstruct, vec![v]);
        b.output(l);
        let g = b.finish().unwrap();
        let db = AliasDb::new(&g);

        // l contains v, and v aliases x, so l may contain an alias of x.
        assert!(db.may_contain_alias(l, x));
    }

    #[test]
    fn test_disjoint_sets() {
        let mut b = GraphBuilder::new("disjoint");
        let x = b.input("x", ValueKind::Tensor);
        let y = b.op(OpKind::Relu, vec![x]);
        let z = b.op(OpKind::Sigmoid, vec![x]);
        b.output(y);
        b.output(z);
        let g = b.finish().unwrap();
        let db = AliasDb::new(&g);

        assert!(!db.may_contain_alias_sets([y], [z]));
        assert!(db.may_contain_alias_sets([x, y], [x]));
    }
}
