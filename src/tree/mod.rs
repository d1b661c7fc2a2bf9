//! The augmented binary tree engine
//!
//! This is the single structure backing every sequence store in the crate: a binary tree with
//! parent pointers where each node carries an opaque payload plus a cached [`Summary`] of its
//! entire subtree. The higher-level stores (chunked byte/text buffers, the line-break and
//! overlapping-range registries) are all thin layers of payload types and branch selectors
//! over this one engine.
//!
//! ## Representation
//!
//! Nodes live in an arena (`Vec` of slots plus a free list) and are referred to by [`NodeId`], a
//! stable index. Parent and child links are `Option<NodeId>`. This buys a few things over owned
//! pointers:
//!
//! * rotations and splices stay O(1) pointer swaps,
//! * `Clone` is a flat copy of the arena (structure-preserving by construction),
//! * dropping the tree never recurses, no matter how degenerate its shape.
//!
//! A `NodeId` keeps denoting the same logical element across rotations and splays; it dangles
//! only once the node is erased.
//!
//! ## Ordering
//!
//! Binary-search-tree ordering is *not* an inherent invariant here. Callers choose between two
//! structurally distinct modes:
//!
//! * key ordering, supplied through an [`InsertSelector`] passed to [`insert_custom`], or
//! * pure sequence semantics, where [`insert_before`]/[`insert_seq_before`] splice values at an
//!   in-order position and searches go through a [`FindSelector`] such as
//!   [`IndexFinder`](crate::sum::IndexFinder).
//!
//! A tree only satisfies BST key ordering if it is mutated exclusively through the first mode.
//!
//! ## Balance
//!
//! The tree is not globally height-balanced. Splaying is used internally by the range operations
//! (which gives them amortized O(log n) behavior), and [`from_values`] bulk-builds perfectly
//! balanced trees, but a long run of single insertions can produce a degenerate shape. Everything
//! that walks whole subtrees therefore uses explicit stacks rather than recursion.
//!
//! ## Failure semantics
//!
//! Precondition violations (dangling `NodeId`s, malformed ranges, splay targets that are not
//! ancestors) are programmer errors and panic; there is no recoverable-error path.
//!
//! [`insert_custom`]: Tree::insert_custom
//! [`insert_before`]: Tree::insert_before
//! [`insert_seq_before`]: Tree::insert_seq_before
//! [`from_values`]: Tree::from_values

use crate::sum::{Summarize, Summary};
use smallvec::SmallVec;
use std::fmt::Write;

/// A stable handle to a node in a [`Tree`]
///
/// Handles are plain arena indices: comparing two of them says nothing about in-order position.
/// A handle stays valid across every structural operation except the erasure of its own node,
/// after which any use of it panics (or, if the slot has since been reused, silently denotes the
/// new occupant; erased handles must simply not be kept).
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct NodeId(u32);

/// Which child to descend into during an insertion
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Side {
    Left,
    Right,
}

/// The outcome of one step of a [`FindSelector`] descent
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Search {
    Found,
    Left,
    Right,
}

/// A caller-supplied policy deciding where a new node is attached
///
/// [`Tree::insert_custom`] descends from the root, calling [`select_insert`] at each node until
/// the chosen side has no child, and attaches the new node there. The selector may keep state
/// between steps.
///
/// [`select_insert`]: Self::select_insert
pub trait InsertSelector<T: Summarize> {
    fn select_insert(&mut self, tree: &Tree<T>, current: NodeId, new: NodeId) -> Side;
}

/// A caller-supplied policy deciding where a search descends
///
/// The selector may mutate its own state as the descent progresses; this is how
/// [`IndexFinder`](crate::sum::IndexFinder) reports "units before this point" without a second
/// pass.
pub trait FindSelector<T: Summarize> {
    fn select_find(&mut self, tree: &Tree<T>, current: NodeId) -> Search;
}

#[derive(Clone)]
struct Node<T: Summarize> {
    value: T,
    // The node's own contribution, cached so that summary maintenance never has to touch the
    // payload of untouched nodes.
    own: T::Summary,
    // own + left.total + right.total
    total: T::Summary,
    parent: Option<NodeId>,
    left: Option<NodeId>,
    right: Option<NodeId>,
}

/// The augmented binary tree
///
/// See the [module documentation](self) for the full contract.
pub struct Tree<T: Summarize> {
    slots: Vec<Option<Node<T>>>,
    free: Vec<u32>,
    root: Option<NodeId>,
    count: usize,
}

impl<T: Summarize + Clone> Clone for Tree<T> {
    fn clone(&self) -> Self {
        // NodeIds are arena indices, so a flat copy preserves both structure and handle
        // validity. No traversal required.
        Tree {
            slots: self.slots.clone(),
            free: self.free.clone(),
            root: self.root,
            count: self.count,
        }
    }
}

impl<T: Summarize> Default for Tree<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Summarize> Tree<T> {
    /// Creates an empty tree
    pub fn new() -> Self {
        Tree {
            slots: Vec::new(),
            free: Vec::new(),
            root: None,
            count: 0,
        }
    }

    /// Builds a balanced tree from an in-order sequence of values
    ///
    /// Runs in O(n): the sequence is split at its midpoint recursively, and each node's summary
    /// is computed bottom-up exactly once during construction.
    pub fn from_values<I: IntoIterator<Item = T>>(values: I) -> Self {
        let mut tree = Tree::new();
        let ids: Vec<NodeId> = values.into_iter().map(|v| tree.alloc(v)).collect();
        if !ids.is_empty() {
            let root = tree.build_balanced(&ids);
            tree.root = Some(root);
        }
        tree
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// The number of nodes currently in the tree
    pub fn node_count(&self) -> usize {
        self.count
    }

    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    /// The summary of the entire tree (the identity if the tree is empty)
    pub fn summary(&self) -> T::Summary {
        match self.root {
            Some(r) => self.node(r).total.clone(),
            None => T::Summary::default(),
        }
    }

    pub fn value(&self, id: NodeId) -> &T {
        &self.node(id).value
    }

    /// The cached summary of the node's own value, excluding children
    pub fn own_summary(&self, id: NodeId) -> &T::Summary {
        &self.node(id).own
    }

    /// The summary of the whole subtree rooted at `id`
    pub fn total_summary(&self, id: NodeId) -> &T::Summary {
        &self.node(id).total
    }

    pub fn left(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).left
    }

    pub fn right(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).right
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).parent
    }

    /// Mutates a node's payload, then restores the summary invariant along the root path
    pub fn update_value<R>(&mut self, id: NodeId, f: impl FnOnce(&mut T) -> R) -> R {
        let node = self.node_mut(id);
        let out = f(&mut node.value);
        node.own = node.value.summarize();
        self.refresh_path(id);
        out
    }

    ///////////////////////////////////
    // In-order navigation & queries //
    ///////////////////////////////////

    /// The first node in in-order sequence
    pub fn first(&self) -> Option<NodeId> {
        self.root.map(|r| self.leftmost(r))
    }

    /// The last node in in-order sequence
    pub fn last(&self) -> Option<NodeId> {
        self.root.map(|r| self.rightmost(r))
    }

    /// The in-order successor, in O(log n) amortized via parent pointers
    pub fn next(&self, id: NodeId) -> Option<NodeId> {
        if let Some(r) = self.node(id).right {
            return Some(self.leftmost(r));
        }

        let mut cur = id;
        loop {
            let p = self.node(cur).parent?;
            if self.node(p).left == Some(cur) {
                return Some(p);
            }
            cur = p;
        }
    }

    /// The in-order predecessor; counterpart to [`next`](Self::next)
    pub fn prev(&self, id: NodeId) -> Option<NodeId> {
        if let Some(l) = self.node(id).left {
            return Some(self.rightmost(l));
        }

        let mut cur = id;
        loop {
            let p = self.node(cur).parent?;
            if self.node(p).right == Some(cur) {
                return Some(p);
            }
            cur = p;
        }
    }

    /// Iterates over the tree in in-order sequence
    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            tree: self,
            next: self.first(),
        }
    }

    /// Iterates from `start` (inclusive) to the end; `None` gives an empty iterator
    pub fn iter_from(&self, start: Option<NodeId>) -> Iter<'_, T> {
        Iter {
            tree: self,
            next: start,
        }
    }

    /// Searches for a node by descending with the given selector
    ///
    /// Returns `None` if the descent steps into a missing child. The tree is not splayed or
    /// otherwise modified by a search.
    pub fn find_custom<S: FindSelector<T>>(&self, sel: &mut S) -> Option<NodeId> {
        let mut cur = self.root?;
        loop {
            match sel.select_find(self, cur) {
                Search::Found => return Some(cur),
                Search::Left => cur = self.node(cur).left?,
                Search::Right => cur = self.node(cur).right?,
            }
        }
    }

    ///////////////
    // Insertion //
    ///////////////

    /// Inserts a value at the position chosen by the selector, in O(depth)
    ///
    /// This is the key-ordered insertion mode; see the module docs for how it relates to the
    /// splice-based mode.
    pub fn insert_custom<S: InsertSelector<T>>(&mut self, sel: &mut S, value: T) -> NodeId {
        let id = self.alloc(value);

        let mut cur = match self.root {
            Some(r) => r,
            None => {
                self.root = Some(id);
                return id;
            }
        };

        loop {
            let side = sel.select_insert(self, cur, id);
            let child = match side {
                Side::Left => self.node(cur).left,
                Side::Right => self.node(cur).right,
            };
            match child {
                Some(c) => cur = c,
                None => {
                    match side {
                        Side::Left => self.node_mut(cur).left = Some(id),
                        Side::Right => self.node_mut(cur).right = Some(id),
                    }
                    self.node_mut(id).parent = Some(cur);
                    self.refresh_path(cur);
                    return id;
                }
            }
        }
    }

    /// Splices a value immediately before `before` in in-order sequence
    ///
    /// `None` means "at the end". Runs in O(depth); this is the sequence-mode insertion and makes
    /// no use of key ordering.
    pub fn insert_before(&mut self, before: Option<NodeId>, value: T) -> NodeId {
        let id = self.alloc(value);
        self.attach_before(before, id);
        id
    }

    /// Splices a whole sequence of values immediately before `before`
    ///
    /// The values are bulk-built into a balanced subtree first (O(k)), then attached with a
    /// single O(depth) splice, so inserting n values this way costs O(n + depth), not
    /// O(n · depth).
    pub fn insert_seq_before(&mut self, before: Option<NodeId>, values: Vec<T>) {
        if values.is_empty() {
            return;
        }
        let ids: Vec<NodeId> = values.into_iter().map(|v| self.alloc(v)).collect();
        let sub = self.build_balanced(&ids);
        self.attach_before(before, sub);
    }

    /////////////
    // Erasure //
    /////////////

    /// Removes a single node, returning its payload
    ///
    /// A node with two children first has its in-order successor splayed up to become its direct
    /// right child, then rotated into its place; the node is then left with at most one child and
    /// detached. Amortized O(log n).
    pub fn erase(&mut self, id: NodeId) -> T {
        let has_both = {
            let n = self.node(id);
            n.left.is_some() && n.right.is_some()
        };

        if has_both {
            let succ = self.next(id).expect("node with a right child has a successor");
            self.splay(succ, Some(id));
            debug_assert_eq!(self.node(id).right, Some(succ));
            debug_assert!(self.node(succ).left.is_none());
            // The successor takes this node's place; `id` drops down with at most one child.
            self.rotate_left(id);
        }

        let parent = self.node(id).parent;
        let child = self.node(id).left.or(self.node(id).right);

        if let Some(c) = child {
            self.node_mut(c).parent = parent;
        }
        match parent {
            None => self.root = child,
            Some(p) => {
                let pn = self.node_mut(p);
                if pn.left == Some(id) {
                    pn.left = child;
                } else {
                    debug_assert_eq!(pn.right, Some(id));
                    pn.right = child;
                }
                self.refresh_path(p);
            }
        }

        self.dealloc(id).value
    }

    /// Removes the contiguous in-order range `[begin, end)`, returning its payloads in order
    ///
    /// `begin = None` means "from the start"; `end = None` means "to the end". The range is cut
    /// out by the standard split-via-splay technique: `begin`'s predecessor is splayed to the
    /// root, `end` is splayed to be its right child, and the middle subtree is lifted out whole.
    /// Amortized O(log n + k) for k removed nodes.
    ///
    /// `begin` must not come after `end` in in-order sequence.
    pub fn erase_range(&mut self, begin: Option<NodeId>, end: Option<NodeId>) -> Vec<T> {
        if self.root.is_none() || (begin.is_some() && begin == end) {
            return Vec::new();
        }

        let pred = match begin {
            Some(b) => self.prev(b),
            None => None,
        };

        let middle = match (pred, end) {
            (None, None) => self.root.take(),
            (None, Some(e)) => {
                self.splay(e, None);
                let m = self.node_mut(e).left.take();
                if let Some(m) = m {
                    self.node_mut(m).parent = None;
                }
                self.recompute(e);
                m
            }
            (Some(p), None) => {
                self.splay(p, None);
                let m = self.node_mut(p).right.take();
                if let Some(m) = m {
                    self.node_mut(m).parent = None;
                }
                self.recompute(p);
                m
            }
            (Some(p), Some(e)) => {
                self.splay(p, None);
                self.splay(e, Some(p));
                debug_assert_eq!(self.node(p).right, Some(e));
                let m = self.node_mut(e).left.take();
                if let Some(m) = m {
                    self.node_mut(m).parent = None;
                }
                self.recompute(e);
                self.recompute(p);
                m
            }
        };

        match middle {
            None => Vec::new(),
            Some(m) => self.take_values(m),
        }
    }

    /// Removes every node
    pub fn clear(&mut self) {
        self.slots.clear();
        self.free.clear();
        self.root = None;
        self.count = 0;
    }

    /// Mutates every payload in in-order sequence, then rebuilds all summaries
    ///
    /// This is the bulk-update path for callers whose edits touch most of the tree (e.g.
    /// re-indexing every stored range after a position shift): one full
    /// [`refresh_all`](Self::refresh_all) is cheaper and simpler than per-node path refreshes.
    ///
    /// `f` must not change values in a way that breaks whatever ordering the caller's selectors
    /// rely on.
    pub fn update_values(&mut self, mut f: impl FnMut(&mut T)) {
        let mut stack: Vec<NodeId> = Vec::new();
        let mut cur = self.root;
        while cur.is_some() || !stack.is_empty() {
            while let Some(c) = cur {
                stack.push(c);
                cur = self.node(c).left;
            }
            let id = stack.pop().unwrap();
            f(&mut self.node_mut(id).value);
            cur = self.node(id).right;
        }
        self.refresh_all();
    }

    /////////////////////////
    // Summary maintenance //
    /////////////////////////

    /// Recomputes the subtree summaries of `id` and every ancestor
    ///
    /// Call after any raw pointer surgery below `id`'s parent. O(depth).
    pub fn refresh_path(&mut self, id: NodeId) {
        let mut cur = Some(id);
        while let Some(c) = cur {
            self.recompute(c);
            cur = self.node(c).parent;
        }
    }

    /// Recomputes every node's summary (both the node-local cache and the subtree value)
    ///
    /// Iterative post-order with an explicit stack, as tree depth is unbounded and recursion is
    /// not an option here.
    pub fn refresh_all(&mut self) {
        enum Step {
            Enter(NodeId),
            Exit(NodeId),
        }

        let root = match self.root {
            Some(r) => r,
            None => return,
        };

        let mut stack: Vec<Step> = vec![Step::Enter(root)];
        while let Some(step) = stack.pop() {
            match step {
                Step::Enter(id) => {
                    stack.push(Step::Exit(id));
                    let n = self.node(id);
                    if let Some(r) = n.right {
                        stack.push(Step::Enter(r));
                    }
                    if let Some(l) = n.left {
                        stack.push(Step::Enter(l));
                    }
                }
                Step::Exit(id) => {
                    let own = self.node(id).value.summarize();
                    self.node_mut(id).own = own;
                    self.recompute(id);
                }
            }
        }
    }

    ///////////////
    // Internals //
    ///////////////

    fn node(&self, id: NodeId) -> &Node<T> {
        self.slots[id.0 as usize]
            .as_ref()
            .expect("dangling NodeId: node has been erased")
    }

    fn node_mut(&mut self, id: NodeId) -> &mut Node<T> {
        self.slots[id.0 as usize]
            .as_mut()
            .expect("dangling NodeId: node has been erased")
    }

    fn alloc(&mut self, value: T) -> NodeId {
        let own = value.summarize();
        let node = Node {
            total: own.clone(),
            own,
            value,
            parent: None,
            left: None,
            right: None,
        };

        self.count += 1;
        match self.free.pop() {
            Some(i) => {
                debug_assert!(self.slots[i as usize].is_none());
                self.slots[i as usize] = Some(node);
                NodeId(i)
            }
            None => {
                self.slots.push(Some(node));
                NodeId((self.slots.len() - 1) as u32)
            }
        }
    }

    fn dealloc(&mut self, id: NodeId) -> Node<T> {
        let node = self.slots[id.0 as usize]
            .take()
            .expect("dangling NodeId: node has been erased");
        self.free.push(id.0);
        self.count -= 1;
        node
    }

    fn leftmost(&self, mut id: NodeId) -> NodeId {
        while let Some(l) = self.node(id).left {
            id = l;
        }
        id
    }

    fn rightmost(&self, mut id: NodeId) -> NodeId {
        while let Some(r) = self.node(id).right {
            id = r;
        }
        id
    }

    // Recomputes `id`'s subtree summary from its cached own value and its children. Does not
    // touch the payload.
    fn recompute(&mut self, id: NodeId) {
        let (left, right) = {
            let n = self.node(id);
            (n.left, n.right)
        };

        let mut total = T::Summary::default();
        if let Some(l) = left {
            total.add(&self.node(l).total);
        }
        total.add(&self.node(id).own);
        if let Some(r) = right {
            total.add(&self.node(r).total);
        }
        self.node_mut(id).total = total;
    }

    // Builds a balanced subtree over `ids` (in-order), returning its root. The root's parent
    // link is left unset. Recursion depth is log(n) by construction.
    fn build_balanced(&mut self, ids: &[NodeId]) -> NodeId {
        let mid = ids.len() / 2;
        let root = ids[mid];

        if mid > 0 {
            let l = self.build_balanced(&ids[..mid]);
            self.node_mut(root).left = Some(l);
            self.node_mut(l).parent = Some(root);
        }
        if mid + 1 < ids.len() {
            let r = self.build_balanced(&ids[mid + 1..]);
            self.node_mut(root).right = Some(r);
            self.node_mut(r).parent = Some(root);
        }

        self.recompute(root);
        root
    }

    // Attaches a detached subtree (with internally-correct summaries) immediately before
    // `before` in in-order sequence, via the predecessor chain.
    fn attach_before(&mut self, before: Option<NodeId>, sub: NodeId) {
        debug_assert!(self.node(sub).parent.is_none());

        let root = match self.root {
            Some(r) => r,
            None => {
                self.root = Some(sub);
                return;
            }
        };

        let anchor = match before {
            // `before`'s in-order predecessor position is either its empty left slot or the
            // right slot of the rightmost node of its left subtree.
            Some(b) => match self.node(b).left {
                None => {
                    self.node_mut(b).left = Some(sub);
                    b
                }
                Some(l) => {
                    let p = self.rightmost(l);
                    self.node_mut(p).right = Some(sub);
                    p
                }
            },
            None => {
                let p = self.rightmost(root);
                self.node_mut(p).right = Some(sub);
                p
            }
        };

        self.node_mut(sub).parent = Some(anchor);
        self.refresh_path(anchor);
    }

    // In-order traversal of the subtree at `root`, deallocating every node and collecting the
    // payloads. Iterative: the subtree may be arbitrarily deep.
    fn take_values(&mut self, root: NodeId) -> Vec<T> {
        let mut out = Vec::new();
        let mut stack: SmallVec<[NodeId; 32]> = SmallVec::new();
        let mut cur = Some(root);

        while cur.is_some() || !stack.is_empty() {
            while let Some(c) = cur {
                stack.push(c);
                cur = self.node(c).left;
            }
            let id = stack.pop().unwrap();
            let node = self.dealloc(id);
            cur = node.right;
            out.push(node.value);
        }

        out
    }

    ///////////////
    // Rotations //
    ///////////////

    fn rotate_left(&mut self, x: NodeId) {
        let y = self
            .node(x)
            .right
            .expect("rotate_left: node has no right child");
        let y_left = self.node(y).left;
        let parent = self.node(x).parent;

        self.node_mut(x).right = y_left;
        if let Some(c) = y_left {
            self.node_mut(c).parent = Some(x);
        }
        self.node_mut(y).left = Some(x);
        self.node_mut(x).parent = Some(y);
        self.node_mut(y).parent = parent;
        match parent {
            None => self.root = Some(y),
            Some(p) => {
                let pn = self.node_mut(p);
                if pn.left == Some(x) {
                    pn.left = Some(y);
                } else {
                    debug_assert_eq!(pn.right, Some(x));
                    pn.right = Some(y);
                }
            }
        }

        // The new subtree root covers exactly what the old one did, so it inherits the old
        // total outright; only the demoted node needs a fresh recompute.
        let old_total = self.node(x).total.clone();
        self.node_mut(y).total = old_total;
        self.recompute(x);
    }

    fn rotate_right(&mut self, x: NodeId) {
        let y = self
            .node(x)
            .left
            .expect("rotate_right: node has no left child");
        let y_right = self.node(y).right;
        let parent = self.node(x).parent;

        self.node_mut(x).left = y_right;
        if let Some(c) = y_right {
            self.node_mut(c).parent = Some(x);
        }
        self.node_mut(y).right = Some(x);
        self.node_mut(x).parent = Some(y);
        self.node_mut(y).parent = parent;
        match parent {
            None => self.root = Some(y),
            Some(p) => {
                let pn = self.node_mut(p);
                if pn.left == Some(x) {
                    pn.left = Some(y);
                } else {
                    debug_assert_eq!(pn.right, Some(x));
                    pn.right = Some(y);
                }
            }
        }

        let old_total = self.node(x).total.clone();
        self.node_mut(y).total = old_total;
        self.recompute(x);
    }

    // Rotates `child` up over `parent`, whichever side it is on.
    fn rotate_up(&mut self, child: NodeId, parent: NodeId) {
        if self.node(parent).left == Some(child) {
            self.rotate_right(parent);
        } else {
            debug_assert_eq!(self.node(parent).right, Some(child));
            self.rotate_left(parent);
        }
    }

    // Splays `x` upward until its parent is `target` (`None`: until it is the root), with the
    // usual zig / zig-zig / zig-zag cases. `target` must be an ancestor of `x`.
    fn splay(&mut self, x: NodeId, target: Option<NodeId>) {
        loop {
            let p = match self.node(x).parent {
                p if p == target => return,
                Some(p) => p,
                None => panic!("splay: target is not an ancestor of the node"),
            };

            let g = self.node(p).parent;
            if g == target {
                // zig
                self.rotate_up(x, p);
                return;
            }
            let g = match g {
                Some(g) => g,
                None => panic!("splay: target is not an ancestor of the node"),
            };

            let x_is_left = self.node(p).left == Some(x);
            let p_is_left = self.node(g).left == Some(p);
            if x_is_left == p_is_left {
                // zig-zig: the grandparent rotates first
                self.rotate_up(p, g);
                self.rotate_up(x, p);
            } else {
                // zig-zag
                self.rotate_up(x, p);
                self.rotate_up(x, g);
            }
        }
    }

    /////////////////
    // Diagnostics //
    /////////////////

    /// Renders the tree's structure for debugging
    pub fn print_tree(&self) -> String
    where
        T: std::fmt::Debug,
    {
        let mut out = String::new();
        let root = match self.root {
            Some(r) => r,
            None => return "<empty>\n".to_owned(),
        };

        // preorder, explicit stack
        let mut stack: Vec<(NodeId, usize)> = vec![(root, 0)];
        while let Some((id, depth)) = stack.pop() {
            let n = self.node(id);
            let _ = writeln!(out, "{:indent$}{:?}: {:?}", "", id, n.value, indent = depth * 2);
            if let Some(r) = n.right {
                stack.push((r, depth + 1));
            }
            if let Some(l) = n.left {
                stack.push((l, depth + 1));
            }
        }
        out
    }

    /// Checks every structural and summary invariant, panicking on the first violation
    ///
    /// Test support only: this is a full O(n) recompute-and-compare.
    #[cfg(test)]
    pub(crate) fn assert_valid(&self)
    where
        T::Summary: PartialEq + std::fmt::Debug,
    {
        let root = match self.root {
            Some(r) => r,
            None => {
                assert_eq!(self.count, 0, "empty tree with nonzero node count");
                return;
            }
        };
        assert_eq!(self.node(root).parent, None, "root has a parent");

        let mut seen = 0;
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            seen += 1;
            let n = self.node(id);

            assert!(
                n.own == n.value.summarize(),
                "stale own summary at {:?}: cached {:?}, actual {:?}",
                id,
                n.own,
                n.value.summarize(),
            );

            let mut total = T::Summary::default();
            if let Some(l) = n.left {
                assert_eq!(self.node(l).parent, Some(id), "broken parent link at {:?}", l);
                total.add(&self.node(l).total);
                stack.push(l);
            }
            total.add(&n.own);
            if let Some(r) = n.right {
                assert_eq!(self.node(r).parent, Some(id), "broken parent link at {:?}", r);
                total.add(&self.node(r).total);
                stack.push(r);
            }
            assert!(
                total == n.total,
                "stale subtree summary at {:?}: cached {:?}, recomputed {:?}",
                id,
                n.total,
                total,
            );
        }

        assert_eq!(seen, self.count, "node count out of sync");
    }
}

/// An in-order iterator over a [`Tree`]
///
/// Produced by [`Tree::iter`] and [`Tree::iter_from`]. Total iteration cost is O(n); individual
/// steps are O(log n) amortized.
pub struct Iter<'a, T: Summarize> {
    tree: &'a Tree<T>,
    next: Option<NodeId>,
}

impl<'a, T: Summarize> Iterator for Iter<'a, T> {
    type Item = (NodeId, &'a T);

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.next?;
        self.next = self.tree.next(id);
        Some((id, self.tree.value(id)))
    }
}
