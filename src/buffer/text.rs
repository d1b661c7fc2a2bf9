//! UTF-8 text chunks and the text buffer
//!
//! Positions in a [`TextBuffer`] are *codepoint* offsets, not byte offsets. The chunk type keeps
//! a cached codepoint count alongside its bytes and only ever splits at `char` boundaries, so a
//! multi-byte codepoint is never divided across two chunks. Every chunk is independently valid
//! UTF-8 by construction, at the type level.

use super::{ChunkedSeq, Piece};
use crate::sum::{IndexFinder, Metric, Summarize, Summary};
use smallstr::SmallString;
use std::ops::Range;

/// The most codepoints a single [`StrChunk`] will hold
pub const MAX_CHUNK_CHARS: usize = 1000;

/// A buffer of UTF-8 text; positions are codepoint offsets
pub type TextBuffer = ChunkedSeq<StrChunk>;

/// A bounded run of UTF-8 text with a cached codepoint count
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StrChunk {
    data: SmallString<[u8; 32]>,
    // data.chars().count(), cached so `units` is O(1)
    chars: usize,
}

impl StrChunk {
    fn of(s: &str) -> Self {
        StrChunk {
            data: SmallString::from_str(s),
            chars: s.chars().count(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.data
    }
}

// The byte index of the `ch`-th codepoint; `s.len()` when `ch` is the codepoint count.
fn byte_of_char(s: &str, ch: usize) -> usize {
    s.char_indices().nth(ch).map(|(i, _)| i).unwrap_or_else(|| s.len())
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct TextSummary {
    pub chars: usize,
    pub bytes: usize,
}

impl Summary for TextSummary {
    fn add(&mut self, other: &Self) {
        self.chars += other.chars;
        self.bytes += other.bytes;
    }
}

impl Summarize for StrChunk {
    type Summary = TextSummary;

    fn summarize(&self) -> TextSummary {
        TextSummary {
            chars: self.chars,
            bytes: self.data.len(),
        }
    }
}

/// The codepoint-count metric
pub struct Chars;

impl Metric<TextSummary> for Chars {
    fn measure(s: &TextSummary) -> usize {
        s.chars
    }
}

/// The encoded-byte-count metric
pub struct Utf8Bytes;

impl Metric<TextSummary> for Utf8Bytes {
    fn measure(s: &TextSummary) -> usize {
        s.bytes
    }
}

impl Piece for StrChunk {
    type Owned = String;
    type Unit = char;
    type Units = Chars;

    const MAX_UNITS: usize = MAX_CHUNK_CHARS;

    fn units(&self) -> usize {
        self.chars
    }

    fn owned_units(owned: &String) -> usize {
        owned.chars().count()
    }

    fn chunked(owned: String) -> Vec<Self> {
        let mut out = Vec::new();
        let mut rest = owned.as_str();
        while !rest.is_empty() {
            let split = byte_of_char(rest, MAX_CHUNK_CHARS);
            let (head, tail) = rest.split_at(split);
            out.push(StrChunk::of(head));
            rest = tail;
        }
        out
    }

    fn split_off(&mut self, at: usize) -> Self {
        let b = byte_of_char(&self.data, at);
        let tail = StrChunk::of(&self.data[b..]);
        self.data.truncate(b);
        self.chars = at;
        tail
    }

    fn append(&mut self, other: Self) {
        self.data.push_str(&other.data);
        self.chars += other.chars;
    }

    fn unit_at(&self, idx: usize) -> char {
        self.data.chars().nth(idx).expect("char index out of chunk bounds")
    }

    fn push_range(&self, out: &mut String, range: Range<usize>) {
        let b1 = byte_of_char(&self.data, range.start);
        let b2 = byte_of_char(&self.data, range.end);
        out.push_str(&self.data[b1..b2]);
    }

    fn remove_range(&mut self, range: Range<usize>) {
        let b1 = byte_of_char(&self.data, range.start);
        let b2 = byte_of_char(&self.data, range.end);
        let tail: SmallString<[u8; 32]> = SmallString::from_str(&self.data[b2..]);
        self.data.truncate(b1);
        self.data.push_str(&tail);
        self.chars -= range.end - range.start;
    }
}

impl ChunkedSeq<StrChunk> {
    pub fn from_text(text: &str) -> Self {
        Self::from_owned(text.to_owned())
    }

    /// Inserts borrowed text at codepoint position `at`
    pub fn insert_str(&mut self, at: usize, text: &str) {
        self.insert(at, text.to_owned());
    }

    /// The total length in encoded bytes (the [`len`](ChunkedSeq::len) of this buffer is in
    /// codepoints)
    pub fn byte_len(&self) -> usize {
        Utf8Bytes::measure(&self.tree.summary())
    }

    /// Converts a codepoint position to its byte offset, in one tree descent
    ///
    /// ## Panics
    ///
    /// Panics if `pos` is greater than the buffer's codepoint length.
    pub fn char_to_byte(&self, pos: usize) -> usize {
        let mut finder = IndexFinder::<StrChunk, Chars>::clamped(pos);
        let id = match self.tree.find_custom(&mut finder) {
            Some(id) => id,
            None if pos == 0 => return 0,
            None => panic!(
                "cannot convert char position {}: buffer length is {}",
                pos,
                self.len(),
            ),
        };
        let s = self.tree.value(id).as_str();
        finder.before().bytes + byte_of_char(s, finder.offset())
    }

    /// Converts a byte offset to its codepoint position; counterpart to
    /// [`char_to_byte`](Self::char_to_byte)
    ///
    /// ## Panics
    ///
    /// Panics if `pos` exceeds the byte length, or does not fall on a codepoint boundary.
    pub fn byte_to_char(&self, pos: usize) -> usize {
        let mut finder = IndexFinder::<StrChunk, Utf8Bytes>::clamped(pos);
        let id = match self.tree.find_custom(&mut finder) {
            Some(id) => id,
            None if pos == 0 => return 0,
            None => panic!(
                "cannot convert byte position {}: buffer byte length is {}",
                pos,
                self.byte_len(),
            ),
        };
        let s = self.tree.value(id).as_str();
        let off = finder.offset();
        assert!(
            s.is_char_boundary(off),
            "byte position {} is not on a codepoint boundary",
            pos,
        );
        finder.before().chars + s[..off].chars().count()
    }
}

#[cfg(test)]
mod tests {
    use super::{Piece, StrChunk, TextBuffer, MAX_CHUNK_CHARS};

    fn content(b: &TextBuffer) -> String {
        b.get_clip(0..b.len())
    }

    #[test]
    fn positions_are_codepoints() {
        let mut b = TextBuffer::from_text("héllo wörld");
        assert_eq!(b.len(), 11);
        assert_eq!(b.at(1), Some('é'));
        assert_eq!(b.at(7), Some('ö'));

        b.insert_str(5, "œœ");
        assert_eq!(content(&b), "hélloœœ wörld");
        assert_eq!(b.get_clip(5..8), "œœ ");
    }

    #[test]
    fn codepoints_never_split_across_chunks() {
        // 2500 two-byte codepoints: bulk chunking must split on char counts, and every
        // resulting chunk is valid UTF-8 with a correct cached count.
        let text: String = std::iter::repeat('é').take(2500).collect();
        let b = TextBuffer::from_text(&text);
        b.tree.assert_valid();
        assert_eq!(b.len(), 2500);
        assert_eq!(b.byte_len(), 5000);
        for chunk in b.chunks() {
            assert!(chunk.units() <= MAX_CHUNK_CHARS);
            assert_eq!(chunk.as_str().chars().count(), chunk.units());
        }
    }

    #[test]
    fn splitting_inside_multibyte_text() {
        let mut b = TextBuffer::from_text(&"é".repeat(10));
        b.insert_str(5, "X");
        b.tree.assert_valid();
        assert_eq!(content(&b), format!("{}X{}", "é".repeat(5), "é".repeat(5)));

        let removed = b.erase(3..8);
        assert_eq!(removed, "ééXéé");
        assert_eq!(content(&b), "é".repeat(6));
    }

    #[test]
    fn char_byte_conversions() {
        // 1-, 2-, 3-, and 4-byte codepoints in one buffer.
        let b = TextBuffer::from_text("aé€𝄞b");
        assert_eq!(b.len(), 5);
        assert_eq!(b.byte_len(), 11);

        let byte_offsets = [0, 1, 3, 6, 10, 11];
        for (ch, &by) in byte_offsets.iter().enumerate() {
            assert_eq!(b.char_to_byte(ch), by, "char_to_byte({})", ch);
            assert_eq!(b.byte_to_char(by), ch, "byte_to_char({})", by);
        }
    }

    #[test]
    fn conversions_on_empty_buffer() {
        let b = TextBuffer::new();
        assert_eq!(b.char_to_byte(0), 0);
        assert_eq!(b.byte_to_char(0), 0);
    }

    #[test]
    #[should_panic(expected = "not on a codepoint boundary")]
    fn byte_to_char_rejects_interior_bytes() {
        let b = TextBuffer::from_text("aé");
        b.byte_to_char(2);
    }

    #[test]
    fn undo_restores_text() {
        let mut b = TextBuffer::from_text("start");
        b.insert_str(5, " über");
        b.erase(0..2);
        assert_eq!(content(&b), "art über");

        b.undo().unwrap();
        assert_eq!(content(&b), "start über");
        b.undo().unwrap();
        assert_eq!(content(&b), "start");
        assert!(b.undo().is_none());

        b.redo().unwrap();
        b.redo().unwrap();
        assert_eq!(content(&b), "art über");
    }

    #[test]
    fn chunk_split_and_merge_keep_counts() {
        let mut chunk = StrChunk::of("aé€𝄞b");
        let tail = chunk.split_off(2);
        assert_eq!(chunk.as_str(), "aé");
        assert_eq!(chunk.units(), 2);
        assert_eq!(tail.as_str(), "€𝄞b");
        assert_eq!(tail.units(), 3);

        let mut merged = chunk;
        merged.append(tail);
        assert_eq!(merged.as_str(), "aé€𝄞b");
        assert_eq!(merged.units(), 5);

        merged.remove_range(1..4);
        assert_eq!(merged.as_str(), "ab");
        assert_eq!(merged.units(), 2);
    }
}
