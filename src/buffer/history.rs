//! Edit history and position patching
//!
//! Everything here is deliberately ignorant of *how* edits are applied; it only records what they
//! were. [`History`] is a linear undo stack with a redo cursor, storing [`Edit`]s: batches of
//! [`Modification`]s committed together by a [`Modifier`](super::Modifier). [`PositionPatcher`]
//! is the read side: given the shape of an edit, it maps positions taken *before* the edit to
//! positions *after* it, which is what anything holding offsets into the buffer (cursors, marks,
//! stored ranges) needs when the buffer changes underneath them.
//!
//! The payload type `O` is the buffer's owned data (`Vec<u8>` for byte buffers, `String` for text
//! buffers); the history itself never inspects it.

use log::debug;

/// A single contiguous replacement: at position `at`, `removed` was replaced by `added`
///
/// Either side may be empty, giving a pure insertion or a pure deletion. The position is
/// expressed in the buffer's coordinates *at the moment the modification was applied*; within
/// an [`Edit`], each modification's `at` already accounts for the modifications before it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Modification<O> {
    pub at: usize,
    pub removed: O,
    pub added: O,
}

impl<O: Clone> Modification<O> {
    /// The modification that exactly reverses this one
    pub fn inverted(&self) -> Self {
        Modification {
            at: self.at,
            removed: self.added.clone(),
            added: self.removed.clone(),
        }
    }
}

/// One undoable unit: the batch of modifications committed by a single `Modifier`
#[derive(Clone, Debug)]
pub struct Edit<O> {
    mods: Vec<Modification<O>>,
}

impl<O> Edit<O> {
    pub(super) fn new(mods: Vec<Modification<O>>) -> Self {
        Edit { mods }
    }

    /// The modifications in application order
    pub fn modifications(&self) -> &[Modification<O>] {
        &self.mods
    }
}

/// A linear edit history with a redo cursor
///
/// `applied` counts how many stored edits are currently reflected in the buffer; everything past
/// it is the redo tail. Recording a fresh edit while a redo tail exists discards the tail: the
/// history is a line, not a tree.
pub struct History<O> {
    edits: Vec<Edit<O>>,
    applied: usize,
}

impl<O> History<O> {
    pub fn new() -> Self {
        History {
            edits: Vec::new(),
            applied: 0,
        }
    }

    pub fn can_undo(&self) -> bool {
        self.applied != 0
    }

    pub fn can_redo(&self) -> bool {
        self.applied != self.edits.len()
    }

    /// Records a freshly-applied edit, discarding any redo tail
    pub fn record(&mut self, edit: Edit<O>) {
        if self.applied < self.edits.len() {
            debug!(
                "discarding {} redo edit(s) after new edit",
                self.edits.len() - self.applied,
            );
            self.edits.truncate(self.applied);
        }
        self.edits.push(edit);
        self.applied += 1;
    }

    /// Steps the cursor back, returning the edit the caller must now reverse
    pub fn undo(&mut self) -> Option<&Edit<O>> {
        if self.applied == 0 {
            return None;
        }
        self.applied -= 1;
        Some(&self.edits[self.applied])
    }

    /// Steps the cursor forward, returning the edit the caller must now re-apply
    pub fn redo(&mut self) -> Option<&Edit<O>> {
        if self.applied == self.edits.len() {
            return None;
        }
        self.applied += 1;
        Some(&self.edits[self.applied - 1])
    }
}

impl<O> Default for History<O> {
    fn default() -> Self {
        Self::new()
    }
}

/// How a position *inside* a replaced span should be re-anchored
///
/// Positions before or after the span are unambiguous; these policies only decide the fate of
/// positions the edit swallowed.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum AnchorBias {
    /// Snap to the start of the replacement
    Front,
    /// Snap to the end of the replacement
    Back,
    /// Keep the same offset into the span, clamped to the replacement's end
    TryKeep,
}

/// Maps positions across one edit
///
/// Built from the edit's shape (`(at, old_len, new_len)` per modification, in application
/// order) and applied by folding a position through each step. [`inverted`](Self::inverted)
/// produces the patcher for the reverse direction, so the same machinery serves undo.
pub struct PositionPatcher {
    steps: Vec<(usize, usize, usize)>,
}

impl PositionPatcher {
    pub fn new(steps: impl IntoIterator<Item = (usize, usize, usize)>) -> Self {
        PositionPatcher {
            steps: steps.into_iter().collect(),
        }
    }

    /// The patcher for the opposite direction: steps reversed, lengths swapped
    pub fn inverted(&self) -> Self {
        PositionPatcher {
            steps: self
                .steps
                .iter()
                .rev()
                .map(|&(at, old, new)| (at, new, old))
                .collect(),
        }
    }

    /// Maps `pos` from before the edit to after it
    pub fn patch(&self, mut pos: usize, bias: AnchorBias) -> usize {
        for &(at, old, new) in &self.steps {
            pos = if pos < at {
                pos
            } else if pos >= at + old {
                pos - old + new
            } else {
                match bias {
                    AnchorBias::Front => at,
                    AnchorBias::Back => at + new,
                    AnchorBias::TryKeep => at + (pos - at).min(new),
                }
            };
        }
        pos
    }
}
