//! Summaries, metrics, and the index finder
//!
//! This module is the declarative half of the tree engine: it defines *what* gets aggregated over
//! each subtree, while [`crate::tree`] defines *how* those aggregates are kept consistent under
//! structural changes.
//!
//! The model is intentionally simple. A payload type implements [`Summarize`], producing a
//! [`Summary`]: a plain struct whose fields are the individual aggregated properties (total byte
//! length, codepoint count, number of linebreaks, and so on). Because the properties are just
//! fields of one struct, any number of them are synthesized together in a single tree walk.
//!
//! [`Metric`] then provides a *view* of one property inside a summary, which is what allows
//! [`IndexFinder`] to be generic over "find the node containing the k-th byte" versus "... the
//! k-th codepoint" versus "... the k-th line" without separate search routines.

use crate::tree::{FindSelector, NodeId, Search, Tree};
use std::marker::PhantomData;

/// A subtree-wide aggregate value
///
/// `Default` must produce the identity for [`add`], and `add` must be associative. Commutativity
/// is *not* required: `add` is always called with `other` taken from a higher in-order position
/// than everything already folded into `self`.
///
/// [`add`]: Self::add
pub trait Summary: Default + Clone {
    /// Folds `other` into `self`; `other` covers the positions directly following `self`
    fn add(&mut self, other: &Self);
}

/// Types that can report a [`Summary`] of their own contents
///
/// This is the customization point that every payload stored in a [`Tree`] must provide. The
/// engine caches the result per node (the node-local value) and combines it with both children's
/// cached subtree values to maintain the per-subtree aggregate.
pub trait Summarize {
    type Summary: Summary;

    /// Computes this value's own contribution, excluding any children
    fn summarize(&self) -> Self::Summary;
}

/// A read-only view of a single property inside a summary
///
/// Implementations are unit structs; `Metric` is only ever used at the type level, to pick which
/// field of a summary a search should count.
pub trait Metric<S> {
    fn measure(summary: &S) -> usize;
}

/// A branch selector locating the node that owns a given cumulative offset
///
/// The tree is treated as a sequence of variable-length blocks, one block per node, with each
/// block's length given by the metric `M`. Searching with an `IndexFinder` built from offset `k`
/// stops at the node whose block covers `k`; afterwards, [`offset`] holds the offset *within*
/// that block and [`before`] holds the full summary of everything preceding the block. The latter
/// is how, e.g., "codepoints before this byte offset" is answered in a single descent.
///
/// A finder built with [`clamped`] resolves an offset exactly equal to the total length to the
/// *last* block (with an intra-block offset equal to its length) instead of failing. This is needed so
/// that end-of-buffer positions map to a real node.
///
/// [`offset`]: Self::offset
/// [`before`]: Self::before
/// [`clamped`]: Self::clamped
pub struct IndexFinder<T: Summarize, M> {
    target: usize,
    clamp: bool,
    before: T::Summary,
    _metric: PhantomData<fn() -> M>,
}

impl<T: Summarize, M: Metric<T::Summary>> IndexFinder<T, M> {
    /// Creates a finder for the block containing `target`
    ///
    /// The search fails (returns `None` from [`Tree::find_custom`]) if `target` is greater than
    /// or equal to the tree's total measure.
    pub fn new(target: usize) -> Self {
        IndexFinder {
            target,
            clamp: false,
            before: T::Summary::default(),
            _metric: PhantomData,
        }
    }

    /// Like [`new`], but an offset equal to the total measure resolves to the final block
    ///
    /// [`new`]: Self::new
    pub fn clamped(target: usize) -> Self {
        IndexFinder {
            target,
            clamp: true,
            before: T::Summary::default(),
            _metric: PhantomData,
        }
    }

    /// The offset within the found node's block
    ///
    /// Only meaningful after a successful [`Tree::find_custom`] with this finder.
    pub fn offset(&self) -> usize {
        self.target
    }

    /// The summary of everything in-order before the found node
    ///
    /// Note that this stops at node granularity: the found node's own contribution is not
    /// included, even partially. Callers wanting sub-block precision combine this with
    /// [`offset`](Self::offset) themselves.
    pub fn before(&self) -> &T::Summary {
        &self.before
    }
}

impl<T: Summarize, M: Metric<T::Summary>> FindSelector<T> for IndexFinder<T, M> {
    fn select_find(&mut self, tree: &Tree<T>, current: NodeId) -> Search {
        let left = tree.left(current);
        let left_total = left.map_or(0, |l| M::measure(tree.total_summary(l)));

        if self.target < left_total {
            return Search::Left;
        }

        if let Some(l) = left {
            self.before.add(tree.total_summary(l));
        }
        self.target -= left_total;

        let own = M::measure(tree.own_summary(current));

        // The clamp case: an offset landing exactly past the final block stays on it, so that
        // end-of-sequence positions resolve to a real node. "Final" is structural, not
        // measured: a right subtree of zero measure still holds in-order successors (e.g. a
        // trailing zero-length block), and the descent must fall through to them.
        if self.target < own || (self.clamp && self.target == own && tree.right(current).is_none())
        {
            return Search::Found;
        }

        self.before.add(tree.own_summary(current));
        self.target -= own;
        Search::Right
    }
}
