//! Static upper bounds on node values.
//!
//! The analyzer walks the graph backwards from an output and asks each
//! operator for a bound given the bounds of its inputs. Nothing is executed;
//! the only data consulted is what Constant nodes embed. Results are sound
//! but conservative: anything an operator cannot reason about is unbounded.

use std::collections::HashMap;

use crate::graph::{Graph, Output};
use crate::operator::BoundCtx;
use crate::registry::OpRegistry;

/// Upper bound on the runtime value of an output.
///
/// `value` is `None` when no bound is known. Concat additionally records the
/// bound of every input along `slice_axis` so that a later reduction over
/// that axis can do better than the overall maximum. A slice entry is only
/// `Some` when that slice is known to be non-empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaxValue {
    pub value: Option<u64>,
    pub slices: Vec<Option<u64>>,
    pub slice_axis: Option<usize>,
}

impl MaxValue {
    pub const fn unbounded() -> Self {
        MaxValue {
            value: None,
            slices: Vec::new(),
            slice_axis: None,
        }
    }

    pub const fn bounded(value: u64) -> Self {
        MaxValue {
            value: Some(value),
            slices: Vec::new(),
            slice_axis: None,
        }
    }

    /// Per-slice bounds along `axis`. The overall bound is the largest slice
    /// bound, unbounded if any slice is.
    pub fn sliced(axis: usize, slices: Vec<Option<u64>>) -> Self {
        let value = if slices.is_empty() {
            None
        } else {
            slices
                .iter()
                .copied()
                .collect::<Option<Vec<u64>>>()
                .and_then(|v| v.into_iter().max())
        };
        MaxValue {
            value,
            slices,
            slice_axis: Some(axis),
        }
    }

    pub fn is_bounded(&self) -> bool {
        self.value.is_some()
    }

    /// Bound of `min(a, b)`: the tighter of the known sides.
    pub fn min(&self, other: &MaxValue) -> MaxValue {
        match (self.value, other.value) {
            (Some(a), Some(b)) => MaxValue::bounded(a.min(b)),
            (Some(v), None) | (None, Some(v)) => MaxValue::bounded(v),
            (None, None) => MaxValue::unbounded(),
        }
    }

    /// Bound of `max(a, b)`.
    pub fn max(&self, other: &MaxValue) -> MaxValue {
        match (self.value, other.value) {
            (Some(a), Some(b)) => MaxValue::bounded(a.max(b)),
            _ => MaxValue::unbounded(),
        }
    }

    /// Bound of `a + b`, saturating at `u64::MAX`.
    pub fn saturating_add(&self, other: &MaxValue) -> MaxValue {
        match (self.value, other.value) {
            (Some(a), Some(b)) => MaxValue::bounded(a.saturating_add(b)),
            _ => MaxValue::unbounded(),
        }
    }

    /// Minimum over the recorded slices if they lie along `axis`.
    ///
    /// Unbounded slices are skipped; the result is unbounded only if every
    /// slice is.
    pub fn slice_min(&self, axis: usize) -> Option<MaxValue> {
        if self.slice_axis != Some(axis) || self.slices.is_empty() {
            return None;
        }
        let min = self.slices.iter().flatten().copied().min();
        Some(min.map_or_else(MaxValue::unbounded, MaxValue::bounded))
    }

    /// The overall bound with slice information dropped.
    pub fn without_slices(&self) -> MaxValue {
        MaxValue {
            value: self.value,
            slices: Vec::new(),
            slice_axis: None,
        }
    }

    /// `(true, bound)` when bounded, `(false, u64::MAX)` otherwise.
    pub fn as_pair(&self) -> (bool, u64) {
        match self.value {
            Some(v) => (true, v),
            None => (false, u64::MAX),
        }
    }
}

impl Default for MaxValue {
    fn default() -> Self {
        MaxValue::unbounded()
    }
}

/// Computes [`MaxValue`]s over one graph, memoizing every output it visits.
pub struct BoundAnalyzer<'a> {
    graph: &'a Graph,
    registry: &'a OpRegistry,
    memo: HashMap<Output, MaxValue>,
}

impl<'a> BoundAnalyzer<'a> {
    pub fn new(graph: &'a Graph, registry: &'a OpRegistry) -> Self {
        Self {
            graph,
            registry,
            memo: HashMap::new(),
        }
    }

    /// Number of outputs whose bound has been computed so far.
    pub fn cached(&self) -> usize {
        self.memo.len()
    }

    /// Upper bound on `output`. Outputs that do not exist are unbounded.
    pub fn maximum_value(&mut self, output: Output) -> MaxValue {
        if let Some(bound) = self.memo.get(&output) {
            return bound.clone();
        }
        if self.graph.output_info(output).is_err() {
            return MaxValue::unbounded();
        }

        let order = match self.graph.dependency_order([output.node]) {
            Ok(order) => order,
            Err(_) => return MaxValue::unbounded(),
        };

        for id in order {
            if self.memo.contains_key(&Output::new(id, 0)) {
                continue;
            }
            let Ok(node) = self.graph.node(id) else {
                continue;
            };
            let bounds: Vec<MaxValue> = {
                let ctx = BoundCtx::new(self.graph, node, &self.memo);
                let op = self.registry.get(&node.op_type);
                (0..node.output_count())
                    .map(|index| match op {
                        Some(op) => op.maximum_value(&ctx, index),
                        None => MaxValue::unbounded(),
                    })
                    .collect()
            };
            for (index, bound) in bounds.into_iter().enumerate() {
                tracing::trace!(
                    node = %id,
                    op_type = %node.op_type,
                    index,
                    bound = ?bound.value,
                    "computed maximum value"
                );
                self.memo.insert(Output::new(id, index), bound);
            }
        }

        self.memo
            .get(&output)
            .cloned()
            .unwrap_or_else(MaxValue::unbounded)
    }
}

/// Upper bound on the value of `output` as a `(bounded, bound)` pair.
///
/// Unbounded outputs report `(false, u64::MAX)`.
pub fn maximum_value(graph: &Graph, registry: &OpRegistry, output: Output) -> (bool, u64) {
    BoundAnalyzer::new(graph, registry)
        .maximum_value(output)
        .as_pair()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_unbounded_pair() {
        assert_eq!(MaxValue::unbounded().as_pair(), (false, u64::MAX));
        assert_eq!(MaxValue::bounded(5).as_pair(), (true, 5));
    }

    #[test]
    fn test_min_prefers_known_side() {
        let a = MaxValue::bounded(27);
        let u = MaxValue::unbounded();
        assert_eq!(a.min(&u), MaxValue::bounded(27));
        assert_eq!(u.min(&a), MaxValue::bounded(27));
        assert_eq!(u.min(&u), MaxValue::unbounded());
        assert_eq!(a.min(&MaxValue::bounded(3)), MaxValue::bounded(3));
    }

    #[test]
    fn test_max_and_add_need_both_sides() {
        let a = MaxValue::bounded(7);
        let u = MaxValue::unbounded();
        assert_eq!(a.max(&MaxValue::bounded(9)), MaxValue::bounded(9));
        assert!(!a.max(&u).is_bounded());
        assert_eq!(
            a.saturating_add(&MaxValue::bounded(u64::MAX)),
            MaxValue::bounded(u64::MAX)
        );
        assert!(!u.saturating_add(&a).is_bounded());
    }

    #[test]
    fn test_sliced() {
        let s = MaxValue::sliced(0, vec![None, Some(37)]);
        assert!(!s.is_bounded());
        assert_eq!(s.slice_min(0), Some(MaxValue::bounded(37)));
        assert_eq!(s.slice_min(1), None);
        assert_eq!(s.without_slices(), MaxValue::unbounded());

        let all = MaxValue::sliced(1, vec![Some(4), Some(9)]);
        assert_eq!(all.value, Some(9));
        assert_eq!(all.slice_min(1), Some(MaxValue::bounded(4)));

        let none = MaxValue::sliced(0, vec![None, None]);
        assert_eq!(none.slice_min(0), Some(MaxValue::unbounded()));
    }

    #[test]
    fn test_missing_output_is_unbounded() {
        let graph = Graph::new();
        let registry = OpRegistry::with_defaults();
        let output = Output::new(crate::graph::NodeId(0), 0);
        assert_eq!(maximum_value(&graph, &registry, output), (false, u64::MAX));
    }

    proptest! {
        #[test]
        fn prop_min_never_exceeds_inputs(a in any::<u64>(), b in any::<u64>()) {
            let m = MaxValue::bounded(a).min(&MaxValue::bounded(b));
            prop_assert!(m.value.unwrap() <= a && m.value.unwrap() <= b);
        }

        #[test]
        fn prop_max_and_add_dominate_inputs(a in any::<u64>(), b in any::<u64>()) {
            let x = MaxValue::bounded(a);
            let y = MaxValue::bounded(b);
            let m = x.max(&y).value.unwrap();
            let s = x.saturating_add(&y).value.unwrap();
            prop_assert!(m >= a && m >= b);
            prop_assert!(s >= m);
        }

        #[test]
        fn prop_slice_min_within_overall(slices in proptest::collection::vec(any::<u64>(), 1..8)) {
            let bound = MaxValue::sliced(0, slices.iter().copied().map(Some).collect());
            let overall = bound.value.unwrap();
            let min = bound.slice_min(0).unwrap().value.unwrap();
            prop_assert!(min <= overall);
            prop_assert_eq!(overall, *slices.iter().max().unwrap());
        }
    }
}
