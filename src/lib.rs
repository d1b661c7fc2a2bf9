//! Augmented-tree storage for large mutable sequences
//!
//! This crate provides the sequence-storage layer of a text editor: data structures that keep
//! random access, edits, and position arithmetic logarithmic no matter how large the content
//! grows. Everything is built on one engine, an arena-backed binary [`Tree`] whose nodes carry
//! cached [`Summary`] aggregates, with the interesting behavior expressed as payload types and
//! branch selectors rather than as separate tree implementations:
//!
//! * [`ByteBuffer`] / [`TextBuffer`]: chunked byte and UTF-8 content with grouped undo/redo
//!   ([`buffer`]);
//! * [`LinebreakRegistry`]: line records enabling line/char/codepoint conversions ([`lines`]);
//! * [`RangeMap`]: overlapping position ranges with pruned stabbing queries ([`ranges`]).
//!
//! All structures are plain owned data: single-threaded by design, `Send` for free, no interior
//! mutability. Invariant violations and caller contract breaches are fatal panics rather than
//! recoverable errors; see the individual modules for the exact contracts.

pub mod buffer;
pub mod lines;
pub mod ranges;
pub mod sum;
pub mod tree;

pub use buffer::bytes::{ByteBuffer, ByteChunk, MAX_CHUNK_BYTES};
pub use buffer::history::{AnchorBias, Edit, History, Modification, PositionPatcher};
pub use buffer::text::{StrChunk, TextBuffer, MAX_CHUNK_CHARS};
pub use buffer::{ChunkedSeq, Modifier, Piece};
pub use lines::{segments, LineEnding, LineInfo, LinebreakRegistry};
pub use ranges::RangeMap;
pub use sum::{IndexFinder, Metric, Summarize, Summary};
pub use tree::{FindSelector, InsertSelector, NodeId, Search, Side, Tree};
