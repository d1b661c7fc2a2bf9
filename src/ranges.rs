//! The overlapping-range registry
//!
//! A [`RangeMap`] stores position ranges with attached data (highlight regions, fold markers,
//! diagnostics) over a sequence it does not itself contain. Ranges may nest and overlap
//! arbitrarily. The backing [`Tree`] keeps entries in (start, length) order via the engine's
//! key-ordered insertion mode, and its summary carries the classic interval-tree augmentation:
//! the maximum range end within each subtree. That single extra field is what lets stabbing
//! queries skip every subtree that provably ends before the probe.
//!
//! The registry does not watch the underlying sequence; whoever edits it reports the edits
//! through [`on_insert`](RangeMap::on_insert) and [`on_erase`](RangeMap::on_erase), which
//! re-index every affected range in one pass.

use crate::sum::{Summarize, Summary};
use crate::tree::{InsertSelector, NodeId, Side, Tree};
use log::debug;
use std::ops::Range;

struct Span<D> {
    start: usize,
    len: usize,
    data: D,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct SpanSummary {
    pub count: usize,
    /// The greatest `start + len` in the subtree
    pub max_end: usize,
}

impl Summary for SpanSummary {
    fn add(&mut self, other: &Self) {
        self.count += other.count;
        self.max_end = self.max_end.max(other.max_end);
    }
}

impl<D> Summarize for Span<D> {
    type Summary = SpanSummary;

    fn summarize(&self) -> SpanSummary {
        SpanSummary {
            count: 1,
            max_end: self.start + self.len,
        }
    }
}

// Key ordering by (start, len); equal keys land to the right, preserving insertion order
// among duplicates.
struct StartOrder;

impl<D> InsertSelector<Span<D>> for StartOrder {
    fn select_insert(&mut self, tree: &Tree<Span<D>>, current: NodeId, new: NodeId) -> Side {
        let c = tree.value(current);
        let n = tree.value(new);
        if (n.start, n.len) < (c.start, c.len) {
            Side::Left
        } else {
            Side::Right
        }
    }
}

/// A set of possibly-overlapping ranges with attached data; see the
/// [module documentation](self)
pub struct RangeMap<D> {
    tree: Tree<Span<D>>,
}

impl<D> RangeMap<D> {
    pub fn new() -> Self {
        RangeMap { tree: Tree::new() }
    }

    /// The number of stored ranges
    pub fn len(&self) -> usize {
        self.tree.summary().count
    }

    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    /// Stores a range, returning a handle for later [`get`](Self::get)/[`remove`](Self::remove)
    ///
    /// ## Panics
    ///
    /// Panics if the range's end precedes its start.
    pub fn insert(&mut self, range: Range<usize>, data: D) -> NodeId {
        assert!(
            range.start <= range.end,
            "cannot store range {}..{}: end precedes start",
            range.start,
            range.end,
        );
        self.tree.insert_custom(
            &mut StartOrder,
            Span {
                start: range.start,
                len: range.end - range.start,
                data,
            },
        )
    }

    pub fn get(&self, id: NodeId) -> (Range<usize>, &D) {
        let s = self.tree.value(id);
        (s.start..s.start + s.len, &s.data)
    }

    pub fn remove(&mut self, id: NodeId) -> (Range<usize>, D) {
        let s = self.tree.erase(id);
        (s.start..s.start + s.len, s.data)
    }

    /// Iterates over all ranges in start order
    pub fn iter(&self) -> impl Iterator<Item = (Range<usize>, &D)> {
        self.tree.iter().map(|(_, s)| (s.start..s.start + s.len, &s.data))
    }

    /// All ranges containing position `pos`, in start order
    pub fn query_point(&self, pos: usize) -> Vec<(Range<usize>, &D)> {
        self.query_range(pos..pos + 1)
    }

    /// All ranges overlapping `range`, in start order
    ///
    /// O(log n + m) for m reported ranges: a subtree is only entered when its `max_end` reaches
    /// past the probe's start, and right subtrees are skipped once starts pass the probe's end.
    pub fn query_range(&self, range: Range<usize>) -> Vec<(Range<usize>, &D)> {
        let mut out = Vec::new();
        let root = match self.tree.root() {
            Some(r) => r,
            None => return out,
        };

        // In-order walk; the `bool` marks whether the node's left side is already handled.
        let mut stack: Vec<(NodeId, bool)> = vec![(root, false)];
        while let Some((id, expanded)) = stack.pop() {
            if !expanded {
                stack.push((id, true));
                if let Some(l) = self.tree.left(id) {
                    if self.tree.total_summary(l).max_end > range.start {
                        stack.push((l, false));
                    }
                }
                continue;
            }

            let span = self.tree.value(id);
            if span.start < range.end && span.start + span.len > range.start {
                out.push((span.start..span.start + span.len, &span.data));
            }
            if let Some(r) = self.tree.right(id) {
                // Everything to the right starts no earlier than this span.
                if span.start < range.end && self.tree.total_summary(r).max_end > range.start {
                    stack.push((r, false));
                }
            }
        }
        out
    }

    /// Re-indexes all ranges after `len` positions were inserted at `at` in the underlying
    /// sequence
    ///
    /// Ranges starting at or after the insertion point shift right; ranges strictly covering it
    /// lengthen.
    pub fn on_insert(&mut self, at: usize, len: usize) {
        if len == 0 || self.tree.is_empty() {
            return;
        }
        debug!("re-indexing {} span(s) after insert of {} at {}", self.len(), len, at);
        self.tree.update_values(|span| {
            if at <= span.start {
                span.start += len;
            } else if at < span.start + span.len {
                span.len += len;
            }
        });
    }

    /// Re-indexes all ranges after the underlying sequence's `range` was erased
    ///
    /// Overlapping ranges shorten by the overlap; ranges entirely inside the erased span are
    /// dropped; ranges past it shift left. A range that was empty to begin with is kept (as a
    /// point marker) and only shifted.
    pub fn on_erase(&mut self, range: Range<usize>) {
        let k = range.end - range.start;
        if k == 0 || self.tree.is_empty() {
            return;
        }

        let dead: Vec<NodeId> = self
            .tree
            .iter()
            .filter(|(_, s)| {
                s.len > 0 && range.start <= s.start && s.start + s.len <= range.end
            })
            .map(|(id, _)| id)
            .collect();
        debug!(
            "re-indexing {} span(s) after erase of {}..{} ({} dropped)",
            self.len(),
            range.start,
            range.end,
            dead.len(),
        );

        self.tree.update_values(|span| {
            let end = span.start + span.len;
            let overlap = end.min(range.end).saturating_sub(span.start.max(range.start));
            span.len -= overlap;
            span.start = if span.start >= range.end {
                span.start - k
            } else if span.start > range.start {
                range.start
            } else {
                span.start
            };
        });

        for id in dead {
            self.tree.erase(id);
        }
    }

    #[cfg(test)]
    fn assert_valid(&self) {
        self.tree.assert_valid();
        // Start ordering must survive re-indexing (queries prune on it); the length tiebreak
        // is only guaranteed at insertion time, since erasure can clamp several spans onto the
        // same start.
        let mut prev = None;
        for (_, s) in self.tree.iter() {
            if let Some(p) = prev {
                assert!(p <= s.start, "span order violated: start {} before {}", p, s.start);
            }
            prev = Some(s.start);
        }
    }
}

impl<D> Default for RangeMap<D> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::RangeMap;
    use rand::rngs::SmallRng;
    use rand::{Rng, SeedableRng};
    use std::ops::Range;

    fn map(spans: &[Range<usize>]) -> RangeMap<usize> {
        let mut m = RangeMap::new();
        for (i, r) in spans.iter().enumerate() {
            m.insert(r.clone(), i);
        }
        m
    }

    fn hits(m: &RangeMap<usize>, range: Range<usize>) -> Vec<usize> {
        m.query_range(range).into_iter().map(|(_, &d)| d).collect()
    }

    #[test]
    fn point_queries_on_nested_and_overlapping_spans() {
        //   0: 0........20
        //   1:    5..10
        //   2:      7......15
        //   3:              15..18
        let m = map(&[0..20, 5..10, 7..15, 15..18]);
        m.assert_valid();

        assert_eq!(hits(&m, 0..1), vec![0]);
        assert_eq!(hits(&m, 6..7), vec![0, 1]);
        assert_eq!(hits(&m, 8..9), vec![0, 1, 2]);
        assert_eq!(hits(&m, 12..13), vec![0, 2]);
        assert_eq!(hits(&m, 16..17), vec![0, 3]);
        assert_eq!(hits(&m, 25..26), Vec::<usize>::new());
    }

    #[test]
    fn range_queries_come_back_in_start_order() {
        let m = map(&[10..12, 0..3, 5..30, 8..9, 20..25]);
        m.assert_valid();
        assert_eq!(hits(&m, 9..21), vec![2, 0, 4]);
        assert_eq!(hits(&m, 0..100), vec![1, 2, 3, 0, 4]);
        assert_eq!(hits(&m, 3..5), Vec::<usize>::new());
    }

    #[test]
    fn get_and_remove_by_handle() {
        let mut m = RangeMap::new();
        let a = m.insert(2..8, "a");
        let b = m.insert(4..6, "b");

        assert_eq!(m.get(b), (4..6, &"b"));
        assert_eq!(m.remove(a), (2..8, "a"));
        m.assert_valid();
        assert_eq!(m.len(), 1);
        assert_eq!(m.query_point(5), vec![(4..6, &"b")]);
    }

    #[test]
    fn on_insert_shifts_and_lengthens() {
        // Spans before, covering, starting at, and after the insertion point of 10 units at
        // position 6. Starting exactly at the point counts as "after": the span shifts whole.
        let mut m = map(&[0..4, 2..9, 6..12, 8..15]);
        m.on_insert(6, 10);
        m.assert_valid();

        let spans: Vec<Range<usize>> = m.iter().map(|(r, _)| r).collect();
        assert_eq!(spans, vec![0..4, 2..19, 16..22, 18..25]);
    }

    #[test]
    fn insertion_at_a_span_start_shifts_it() {
        let mut m = map(&[5..9]);
        m.on_insert(5, 3);
        assert_eq!(m.iter().next().unwrap().0, 8..12);
    }

    #[test]
    fn on_erase_shortens_drops_and_shifts() {
        //  erased:     4..........10
        //   0: 0..3                    (untouched)
        //   1: 2......6                (right end shortened)
        //   2:     5..7                (consumed: dropped)
        //   3:        6........12      (left end shortened, start clamps)
        //   4:                 12..15  (shifted left)
        let mut m = map(&[0..3, 2..6, 5..7, 6..12, 12..15]);
        m.on_erase(4..10);
        m.assert_valid();

        let spans: Vec<(Range<usize>, &usize)> = m.iter().collect();
        assert_eq!(
            spans,
            vec![(0..3, &0), (2..4, &1), (4..6, &3), (6..9, &4)],
        );
    }

    #[test]
    fn empty_spans_survive_erasure_as_points() {
        let mut m = RangeMap::new();
        m.insert(8..8, ());
        m.on_erase(2..5);
        m.assert_valid();
        assert_eq!(m.iter().next().unwrap().0, 5..5);
        assert_eq!(m.len(), 1);
    }

    #[test]
    fn randomized_queries_match_naive_scan() {
        let mut rng = SmallRng::seed_from_u64(0xca11);
        let mut m = RangeMap::new();
        let mut model: Vec<(usize, usize, usize)> = Vec::new();

        for i in 0..200 {
            let start = rng.gen_range(0..500);
            let len = rng.gen_range(1..60);
            m.insert(start..start + len, i);
            model.push((start, len, i));
        }
        m.assert_valid();
        model.sort_by_key(|&(s, l, _)| (s, l));

        for _ in 0..100 {
            let a = rng.gen_range(0..600);
            let b = a + rng.gen_range(1..80);
            let expect: Vec<usize> = model
                .iter()
                .filter(|&&(s, l, _)| s < b && s + l > a)
                .map(|&(_, _, d)| d)
                .collect();
            assert_eq!(hits(&m, a..b), expect, "query {}..{}", a, b);
        }
    }

    #[test]
    fn reindex_soak_matches_model() {
        let mut rng = SmallRng::seed_from_u64(0xfade);
        let mut m = RangeMap::new();
        let mut model: Vec<(usize, usize, usize)> = Vec::new();

        for i in 0..80 {
            let start = rng.gen_range(0..300);
            let len = rng.gen_range(1..40);
            m.insert(start..start + len, i);
            model.push((start, len, i));
        }

        for _ in 0..60 {
            if rng.gen_bool(0.5) {
                let at = rng.gen_range(0..350);
                let n = rng.gen_range(1..20);
                m.on_insert(at, n);
                for s in &mut model {
                    if at <= s.0 {
                        s.0 += n;
                    } else if at < s.0 + s.1 {
                        s.1 += n;
                    }
                }
            } else {
                let a = rng.gen_range(0..350);
                let k = rng.gen_range(1..20);
                m.on_erase(a..a + k);
                for s in &mut model {
                    let end = s.0 + s.1;
                    let overlap = end.min(a + k).saturating_sub(s.0.max(a));
                    s.1 -= overlap;
                    s.0 = if s.0 >= a + k {
                        s.0 - k
                    } else if s.0 > a {
                        a
                    } else {
                        s.0
                    };
                }
                model.retain(|&(_, l, _)| l > 0);
            }

            m.assert_valid();
            // Tie order among spans clamped onto one start is unspecified; compare sorted.
            let mut got: Vec<(usize, usize)> =
                m.iter().map(|(r, _)| (r.start, r.end - r.start)).collect();
            let mut want: Vec<(usize, usize)> = model.iter().map(|&(s, l, _)| (s, l)).collect();
            got.sort_unstable();
            want.sort_unstable();
            assert_eq!(got, want);
        }
    }
}
