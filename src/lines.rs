//! The line-break registry
//!
//! A [`LinebreakRegistry`] tracks where the lines are in a text it does not itself store: one
//! record per line, each carrying the line's content length and how it ends. Because the records
//! live in a [`Tree`] whose summary carries lines, characters, codepoints, and break counts all
//! at once, every conversion between the three coordinate systems is a single O(log n) descent.
//!
//! ## Characters versus codepoints
//!
//! The two units differ only at CRLF: an editor treats `\r\n` as *one* character (one column)
//! even though it is *two* codepoints. `Cr` and `Lf` alone are one of each. Within a line's
//! content the units coincide.
//!
//! ## Invariants
//!
//! The registry always holds at least one line, and the final line always has ending
//! [`LineEnding::None`], since a trailing break implies an empty line after it. Both hold from
//! construction and are preserved by every edit.

use crate::sum::{IndexFinder, Metric, Summarize, Summary};
use crate::tree::Tree;
use std::ops::Range;

/// How a line terminates
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum LineEnding {
    /// No terminator; only ever the final line
    None,
    Cr,
    Lf,
    CrLf,
}

impl LineEnding {
    /// The character width of the terminator (CRLF counts as one)
    pub fn chars(self) -> usize {
        match self {
            LineEnding::None => 0,
            _ => 1,
        }
    }

    /// The codepoint width of the terminator (CRLF counts as two)
    pub fn codepoints(self) -> usize {
        match self {
            LineEnding::None => 0,
            LineEnding::CrLf => 2,
            _ => 1,
        }
    }
}

/// One line: its content length in characters, and its terminator
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct LineInfo {
    pub len: usize,
    pub ending: LineEnding,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct LineSummary {
    pub lines: usize,
    pub chars: usize,
    pub codepoints: usize,
    pub breaks: usize,
}

impl Summary for LineSummary {
    fn add(&mut self, other: &Self) {
        self.lines += other.lines;
        self.chars += other.chars;
        self.codepoints += other.codepoints;
        self.breaks += other.breaks;
    }
}

impl Summarize for LineInfo {
    type Summary = LineSummary;

    fn summarize(&self) -> LineSummary {
        LineSummary {
            lines: 1,
            chars: self.len + self.ending.chars(),
            codepoints: self.len + self.ending.codepoints(),
            breaks: (self.ending != LineEnding::None) as usize,
        }
    }
}

struct Lines;

impl Metric<LineSummary> for Lines {
    fn measure(s: &LineSummary) -> usize {
        s.lines
    }
}

struct Chars;

impl Metric<LineSummary> for Chars {
    fn measure(s: &LineSummary) -> usize {
        s.chars
    }
}

struct Codepoints;

impl Metric<LineSummary> for Codepoints {
    fn measure(s: &LineSummary) -> usize {
        s.codepoints
    }
}

/// Derives the per-line segment list of a piece of text
///
/// Every break produces a segment carrying its ending; the final segment has ending `None` (and
/// may be empty). This is the form [`LinebreakRegistry::insert`] consumes, and concatenating
/// segment lists composes the way text concatenation does.
pub fn segments(text: &str) -> Vec<LineInfo> {
    let mut out = Vec::new();
    let mut len = 0;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        let ending = match c {
            '\n' => LineEnding::Lf,
            '\r' if chars.peek() == Some(&'\n') => {
                chars.next();
                LineEnding::CrLf
            }
            '\r' => LineEnding::Cr,
            _ => {
                len += 1;
                continue;
            }
        };
        out.push(LineInfo { len, ending });
        len = 0;
    }

    out.push(LineInfo {
        len,
        ending: LineEnding::None,
    });
    out
}

/// The registry of line records; see the [module documentation](self)
pub struct LinebreakRegistry {
    tree: Tree<LineInfo>,
}

impl LinebreakRegistry {
    /// Creates a registry for empty text: one empty line, no ending
    pub fn new() -> Self {
        LinebreakRegistry {
            tree: Tree::from_values(Some(LineInfo {
                len: 0,
                ending: LineEnding::None,
            })),
        }
    }

    pub fn from_text(text: &str) -> Self {
        LinebreakRegistry {
            tree: Tree::from_values(segments(text)),
        }
    }

    pub fn num_lines(&self) -> usize {
        self.tree.summary().lines
    }

    pub fn num_linebreaks(&self) -> usize {
        self.tree.summary().breaks
    }

    pub fn num_chars(&self) -> usize {
        self.tree.summary().chars
    }

    pub fn num_codepoints(&self) -> usize {
        self.tree.summary().codepoints
    }

    /// The record for line `line`
    ///
    /// ## Panics
    ///
    /// Panics if `line >= num_lines()`.
    pub fn line(&self, line: usize) -> LineInfo {
        let mut finder = IndexFinder::<LineInfo, Lines>::new(line);
        match self.tree.find_custom(&mut finder) {
            Some(id) => *self.tree.value(id),
            None => panic!("line {} out of range: registry has {} lines", line, self.num_lines()),
        }
    }

    /// The character position at which line `line` starts
    pub fn line_start(&self, line: usize) -> usize {
        let mut finder = IndexFinder::<LineInfo, Lines>::new(line);
        match self.tree.find_custom(&mut finder) {
            Some(_) => finder.before().chars,
            None => panic!("line {} out of range: registry has {} lines", line, self.num_lines()),
        }
    }

    /// The line containing character position `pos`, and the column within it
    ///
    /// A position on a line's break reports that line with column `len`; the end-of-text
    /// position reports the final line.
    pub fn line_of_char(&self, pos: usize) -> (usize, usize) {
        let mut finder = IndexFinder::<LineInfo, Chars>::clamped(pos);
        match self.tree.find_custom(&mut finder) {
            Some(_) => (finder.before().lines, finder.offset()),
            None => panic!(
                "char position {} out of range: registry covers {} chars",
                pos,
                self.num_chars(),
            ),
        }
    }

    /// Converts a character position to a codepoint position
    ///
    /// The two only drift apart across CRLF endings. O(log n).
    pub fn char_to_codepoint(&self, pos: usize) -> usize {
        let mut finder = IndexFinder::<LineInfo, Chars>::clamped(pos);
        match self.tree.find_custom(&mut finder) {
            // Within one line, content chars map 1:1 and a position on the break maps to the
            // break's first codepoint.
            Some(_) => finder.before().codepoints + finder.offset(),
            None => panic!(
                "char position {} out of range: registry covers {} chars",
                pos,
                self.num_chars(),
            ),
        }
    }

    /// Converts a codepoint position to a character position; counterpart to
    /// [`char_to_codepoint`](Self::char_to_codepoint)
    ///
    /// A codepoint position inside a CRLF pair (on its LF half) resolves to the break's single
    /// character position.
    pub fn codepoint_to_char(&self, pos: usize) -> usize {
        let mut finder = IndexFinder::<LineInfo, Codepoints>::clamped(pos);
        match self.tree.find_custom(&mut finder) {
            Some(id) => {
                // Offsets past the content are on the break; both halves of a CRLF clamp to
                // the break's single character position.
                let line = self.tree.value(id);
                finder.before().chars + finder.offset().min(line.len)
            }
            None => panic!(
                "codepoint position {} out of range: registry covers {} codepoints",
                pos,
                self.num_codepoints(),
            ),
        }
    }

    /// Records an insertion of text at character position `at`
    ///
    /// `segs` is the inserted text's segment list (see [`segments`]): every segment but the last
    /// must carry a break, and the last must not. The line containing `at` splits or grows
    /// accordingly.
    ///
    /// ## Panics
    ///
    /// Panics on a malformed segment list or a position past the end.
    pub fn insert(&mut self, at: usize, segs: Vec<LineInfo>) {
        let (last, init) = match segs.split_last() {
            None => return,
            Some(x) => x,
        };
        assert_eq!(
            last.ending,
            LineEnding::None,
            "segment list must end without a linebreak",
        );
        assert!(
            init.iter().all(|s| s.ending != LineEnding::None),
            "only the final segment may lack a linebreak",
        );
        if init.is_empty() && last.len == 0 {
            return;
        }

        let mut finder = IndexFinder::<LineInfo, Chars>::clamped(at);
        let id = match self.tree.find_custom(&mut finder) {
            Some(id) => id,
            None => panic!(
                "cannot insert at char {}: registry covers {} chars",
                at,
                self.num_chars(),
            ),
        };
        let col = finder.offset();

        if init.is_empty() {
            // No breaks in the inserted text: the line just grows.
            self.tree.update_value(id, |l| l.len += last.len);
            return;
        }

        // The located line splits: its head joins the first inserted segment, its tail (and its
        // original ending) joins the last.
        let (old_len, old_ending) = {
            let l = self.tree.value(id);
            (l.len, l.ending)
        };
        let first = init[0];
        self.tree.update_value(id, |l| {
            l.len = col + first.len;
            l.ending = first.ending;
        });

        let mut spliced: Vec<LineInfo> = init[1..].to_vec();
        spliced.push(LineInfo {
            len: last.len + (old_len - col),
            ending: old_ending,
        });
        let next = self.tree.next(id);
        self.tree.insert_seq_before(next, spliced);
    }

    /// Records an insertion of raw text; convenience over [`insert`](Self::insert)
    pub fn insert_str(&mut self, at: usize, text: &str) {
        self.insert(at, segments(text));
    }

    /// Records a removal of the characters in `range`
    ///
    /// Breaks inside the range disappear, joining the surrounding lines into one.
    ///
    /// ## Panics
    ///
    /// Panics if `range.end` exceeds the registry's character count.
    pub fn remove(&mut self, range: Range<usize>) {
        if range.start >= range.end {
            return;
        }
        assert!(
            range.end <= self.num_chars(),
            "cannot remove chars {}..{}: registry covers {}",
            range.start,
            range.end,
            self.num_chars(),
        );

        let mut fa = IndexFinder::<LineInfo, Chars>::clamped(range.start);
        let ida = self.tree.find_custom(&mut fa).unwrap();
        let col_a = fa.offset();

        let mut fb = IndexFinder::<LineInfo, Chars>::clamped(range.end);
        let idb = self.tree.find_custom(&mut fb).unwrap();
        let col_b = fb.offset();

        if ida == idb {
            // Content-only removal within a single line.
            self.tree.update_value(ida, |l| l.len -= col_b - col_a);
            return;
        }

        // Lines strictly after A, up to and including B, fold into A.
        let (len_b, ending_b) = {
            let l = self.tree.value(idb);
            (l.len, l.ending)
        };
        let begin = self.tree.next(ida);
        let end = self.tree.next(idb);
        self.tree.erase_range(begin, end);
        self.tree.update_value(ida, |l| {
            l.len = col_a + (len_b - col_b);
            l.ending = ending_b;
        });
    }

    #[cfg(test)]
    fn assert_valid(&self) {
        self.tree.assert_valid();
        assert!(self.num_lines() >= 1, "registry must always hold a line");
        let last = self.tree.last().unwrap();
        assert_eq!(
            self.tree.value(last).ending,
            LineEnding::None,
            "final line must not carry a break",
        );
    }
}

impl Default for LinebreakRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::{segments, LineEnding, LineInfo, LinebreakRegistry};

    fn line(len: usize, ending: LineEnding) -> LineInfo {
        LineInfo { len, ending }
    }

    #[test]
    fn fresh_registry_is_one_empty_line() {
        let reg = LinebreakRegistry::new();
        reg.assert_valid();
        assert_eq!(reg.num_lines(), 1);
        assert_eq!(reg.num_linebreaks(), 0);
        assert_eq!(reg.num_chars(), 0);
        assert_eq!(reg.line(0), line(0, LineEnding::None));
    }

    #[test]
    fn insert_two_segments_into_empty() {
        let mut reg = LinebreakRegistry::new();
        reg.insert(0, vec![line(5, LineEnding::Lf), line(3, LineEnding::None)]);
        reg.assert_valid();

        assert_eq!(reg.num_linebreaks(), 1);
        assert_eq!(reg.num_lines(), 2);
        assert_eq!(reg.line(0), line(5, LineEnding::Lf));
        assert_eq!(reg.line(1), line(3, LineEnding::None));
    }

    #[test]
    fn segment_parsing() {
        assert_eq!(segments(""), vec![line(0, LineEnding::None)]);
        assert_eq!(
            segments("ab\r\ncd\néf\rx"),
            vec![
                line(2, LineEnding::CrLf),
                line(2, LineEnding::Lf),
                line(2, LineEnding::Cr),
                line(1, LineEnding::None),
            ],
        );
        // A trailing break still yields a final (empty) unterminated segment.
        assert_eq!(
            segments("a\n"),
            vec![line(1, LineEnding::Lf), line(0, LineEnding::None)],
        );
    }

    #[test]
    fn crlf_counts_one_char_two_codepoints() {
        let reg = LinebreakRegistry::from_text("ab\r\ncd\nef");
        reg.assert_valid();
        assert_eq!(reg.num_lines(), 3);
        assert_eq!(reg.num_linebreaks(), 2);
        assert_eq!(reg.num_chars(), 8);
        assert_eq!(reg.num_codepoints(), 9);
    }

    #[test]
    fn char_codepoint_round_trip() {
        let reg = LinebreakRegistry::from_text("ab\r\ncd\r\ne");

        // Direct computation: chars 0..=2 on line 0 (break at 2), then the drift grows by one
        // per CRLF crossed.
        let expect_cp = [0, 1, 2, 4, 5, 6, 8, 9];
        for (ch, &cp) in expect_cp.iter().enumerate() {
            assert_eq!(reg.char_to_codepoint(ch), cp, "char_to_codepoint({})", ch);
            assert_eq!(reg.codepoint_to_char(cp), ch, "codepoint_to_char({})", cp);
        }
        // The LF half of a CRLF pair resolves back to the break's character.
        assert_eq!(reg.codepoint_to_char(3), 2);
        assert_eq!(reg.codepoint_to_char(7), 5);

        // Round trips agree everywhere in range, including EOF.
        for ch in 0..=reg.num_chars() {
            assert_eq!(reg.codepoint_to_char(reg.char_to_codepoint(ch)), ch);
        }
    }

    #[test]
    fn line_of_char_and_line_start() {
        let reg = LinebreakRegistry::from_text("abc\ndefg\nhi");

        assert_eq!(reg.line_of_char(0), (0, 0));
        assert_eq!(reg.line_of_char(2), (0, 2));
        assert_eq!(reg.line_of_char(3), (0, 3)); // on the break
        assert_eq!(reg.line_of_char(4), (1, 0));
        assert_eq!(reg.line_of_char(10), (2, 1));
        assert_eq!(reg.line_of_char(11), (2, 2)); // EOF

        assert_eq!(reg.line_start(0), 0);
        assert_eq!(reg.line_start(1), 4);
        assert_eq!(reg.line_start(2), 9);
    }

    #[test]
    fn eof_conversions_with_trailing_newline() {
        // Text ending in a break has an empty final line; EOF positions must resolve to it.
        let reg = LinebreakRegistry::from_text("x\ny\n");
        reg.assert_valid();
        assert_eq!(reg.num_lines(), 3);
        assert_eq!(reg.line_of_char(4), (2, 0));
        assert_eq!(reg.char_to_codepoint(4), 4);
        assert_eq!(reg.codepoint_to_char(4), 4);

        let crlf = LinebreakRegistry::from_text("a\r\nb\r\n");
        assert_eq!(crlf.num_chars(), 4);
        assert_eq!(crlf.line_of_char(4), (2, 0));
        assert_eq!(crlf.char_to_codepoint(4), 6);
        assert_eq!(crlf.codepoint_to_char(6), 4);
        for ch in 0..=crlf.num_chars() {
            assert_eq!(crlf.codepoint_to_char(crlf.char_to_codepoint(ch)), ch);
        }
    }

    #[test]
    fn remove_through_a_trailing_newline() {
        let mut reg = LinebreakRegistry::from_text("x\ny\n");
        // Removes "y\n", folding the empty final line into line 1.
        reg.remove(2..4);
        reg.assert_valid();
        assert_eq!(reg.num_lines(), 2);
        assert_eq!(reg.line(0), line(1, LineEnding::Lf));
        assert_eq!(reg.line(1), line(0, LineEnding::None));
    }

    #[test]
    fn insert_at_eof_after_trailing_newline() {
        let mut reg = LinebreakRegistry::from_text("x\n");
        reg.insert_str(2, "tail");
        reg.assert_valid();
        assert_eq!(reg.num_lines(), 2);
        assert_eq!(reg.line(1), line(4, LineEnding::None));
    }

    #[test]
    fn insert_without_breaks_grows_the_line() {
        let mut reg = LinebreakRegistry::from_text("abc\ndef");
        reg.insert_str(5, "XY");
        reg.assert_valid();
        assert_eq!(reg.line(0), line(3, LineEnding::Lf));
        assert_eq!(reg.line(1), line(5, LineEnding::None));
    }

    #[test]
    fn insert_with_breaks_splits_the_line() {
        let mut reg = LinebreakRegistry::from_text("abcdef\nrest");
        // Insert "XX\nYYY\rZ" at column 2 of line 0.
        reg.insert_str(2, "XX\nYYY\rZ");
        reg.assert_valid();

        assert_eq!(reg.num_lines(), 4);
        assert_eq!(reg.line(0), line(4, LineEnding::Lf)); // "abXX\n"
        assert_eq!(reg.line(1), line(3, LineEnding::Cr)); // "YYY\r"
        assert_eq!(reg.line(2), line(5, LineEnding::Lf)); // "Zcdef\n"
        assert_eq!(reg.line(3), line(4, LineEnding::None)); // "rest"
    }

    #[test]
    fn insert_at_eof() {
        let mut reg = LinebreakRegistry::from_text("abc");
        reg.insert_str(3, "\nnew");
        reg.assert_valid();
        assert_eq!(reg.num_lines(), 2);
        assert_eq!(reg.line(0), line(3, LineEnding::Lf));
        assert_eq!(reg.line(1), line(3, LineEnding::None));
    }

    #[test]
    fn remove_within_one_line() {
        let mut reg = LinebreakRegistry::from_text("abcdef\nrest");
        reg.remove(1..4);
        reg.assert_valid();
        assert_eq!(reg.line(0), line(3, LineEnding::Lf));
        assert_eq!(reg.num_lines(), 2);
    }

    #[test]
    fn remove_break_joins_lines() {
        let mut reg = LinebreakRegistry::from_text("abc\ndef");
        // Removing exactly the break character.
        reg.remove(3..4);
        reg.assert_valid();
        assert_eq!(reg.num_lines(), 1);
        assert_eq!(reg.line(0), line(6, LineEnding::None));
    }

    #[test]
    fn remove_across_many_lines() {
        let mut reg = LinebreakRegistry::from_text("aaa\nbbb\nccc\nddd");
        // From column 1 of line 0 through column 1 of line 3.
        reg.remove(1..13);
        reg.assert_valid();
        assert_eq!(reg.num_lines(), 1);
        assert_eq!(reg.line(0), line(3, LineEnding::None)); // "a" + "dd"
    }

    #[test]
    fn remove_to_eof() {
        let mut reg = LinebreakRegistry::from_text("aaa\nbbb");
        reg.remove(2..7);
        reg.assert_valid();
        assert_eq!(reg.num_lines(), 1);
        assert_eq!(reg.line(0), line(2, LineEnding::None));
    }

    #[test]
    fn edits_mirror_text_edits() {
        // The registry's state after edits must match re-deriving from the edited text.
        let mut text = String::from("one\ntwo\r\nthree");
        let mut reg = LinebreakRegistry::from_text(&text);

        // Insert at char 6 (line 1, column 2). Char 6 of the text is byte 6 here.
        reg.insert_str(6, "X\nY");
        text.insert_str(6, "X\nY");
        reg.assert_valid();
        assert_eq!(
            reg.num_lines(),
            LinebreakRegistry::from_text(&text).num_lines(),
        );
        assert_eq!(
            reg.num_chars(),
            LinebreakRegistry::from_text(&text).num_chars(),
        );

        for l in 0..reg.num_lines() {
            assert_eq!(reg.line(l), LinebreakRegistry::from_text(&text).line(l));
        }
    }
}
