//! Byte chunks and the byte buffer

use super::{ChunkedSeq, Piece};
use crate::sum::{Metric, Summarize, Summary};
use smallvec::SmallVec;
use std::ops::Range;

/// The most bytes a single [`ByteChunk`] will hold
pub const MAX_CHUNK_BYTES: usize = 4096;

/// A buffer of raw bytes; positions are byte offsets
pub type ByteBuffer = ChunkedSeq<ByteChunk>;

/// A bounded run of contiguous bytes
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ByteChunk {
    data: SmallVec<[u8; 32]>,
}

impl ByteChunk {
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct ByteSummary {
    pub bytes: usize,
}

impl Summary for ByteSummary {
    fn add(&mut self, other: &Self) {
        self.bytes += other.bytes;
    }
}

impl Summarize for ByteChunk {
    type Summary = ByteSummary;

    fn summarize(&self) -> ByteSummary {
        ByteSummary {
            bytes: self.data.len(),
        }
    }
}

/// The byte-count metric
pub struct Bytes;

impl Metric<ByteSummary> for Bytes {
    fn measure(s: &ByteSummary) -> usize {
        s.bytes
    }
}

impl Piece for ByteChunk {
    type Owned = Vec<u8>;
    type Unit = u8;
    type Units = Bytes;

    const MAX_UNITS: usize = MAX_CHUNK_BYTES;

    fn units(&self) -> usize {
        self.data.len()
    }

    fn owned_units(owned: &Vec<u8>) -> usize {
        owned.len()
    }

    fn chunked(owned: Vec<u8>) -> Vec<Self> {
        owned
            .chunks(MAX_CHUNK_BYTES)
            .map(|c| ByteChunk {
                data: SmallVec::from_slice(c),
            })
            .collect()
    }

    fn split_off(&mut self, at: usize) -> Self {
        ByteChunk {
            data: self.data.drain(at..).collect(),
        }
    }

    fn append(&mut self, other: Self) {
        self.data.extend_from_slice(&other.data);
    }

    fn unit_at(&self, idx: usize) -> u8 {
        self.data[idx]
    }

    fn push_range(&self, out: &mut Vec<u8>, range: Range<usize>) {
        out.extend_from_slice(&self.data[range]);
    }

    fn remove_range(&mut self, range: Range<usize>) {
        self.data.drain(range);
    }
}

impl ChunkedSeq<ByteChunk> {
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self::from_owned(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::{ByteBuffer, ByteChunk, MAX_CHUNK_BYTES};
    use crate::buffer::history::History;
    use crate::buffer::{ChunkedSeq, Piece};
    use crate::tree::Tree;
    use rand::rngs::SmallRng;
    use rand::{Rng, SeedableRng};
    use smallvec::SmallVec;

    // Builds a buffer with an exact chunk layout, bypassing the usual bulk chunking.
    fn from_chunks(parts: &[&[u8]]) -> ByteBuffer {
        ChunkedSeq {
            tree: Tree::from_values(parts.iter().map(|p| ByteChunk {
                data: SmallVec::from_slice(p),
            })),
            history: History::new(),
        }
    }

    fn content(b: &ByteBuffer) -> Vec<u8> {
        b.get_clip(0..b.len())
    }

    #[test]
    fn insert_into_chunk_interior() {
        let mut b = from_chunks(&[b"He", b"llo"]);
        b.insert(2, b"XX".to_vec());
        b.tree.assert_valid();
        assert_eq!(b.len(), 7);
        assert_eq!(content(&b), b"HeXXllo");
    }

    #[test]
    fn erase_across_chunk_boundaries_merges_remainders() {
        let parts: Vec<Vec<u8>> = (0..5).map(|i| vec![i as u8; 100]).collect();
        let refs: Vec<&[u8]> = parts.iter().map(|p| p.as_slice()).collect();
        let mut b = from_chunks(&refs);
        assert_eq!(b.len(), 500);

        // 150..350 crosses two chunk boundaries: a partial trim at each end, one whole chunk
        // lifted out of the middle.
        let removed = b.erase(150..350);
        b.tree.assert_valid();
        assert_eq!(removed.len(), 200);
        assert_eq!(b.len(), 300);

        let mut expect: Vec<u8> = parts.concat();
        expect.drain(150..350);
        assert_eq!(content(&b), expect);

        // All surviving chunks are far below the merge threshold, so they collapse together.
        assert_eq!(b.chunks().count(), 1);
    }

    #[test]
    fn left_seam_fragment_merges_into_predecessor() {
        let a = vec![1u8; 1000];
        let b = vec![2u8; 1000];
        let mut buf = from_chunks(&[&a, &b]);

        // Inserting a full-size run at offset 1100 splits the second chunk, leaving a
        // 100-byte fragment just left of the insertion. The inserted chunk is too big to
        // absorb it, so the fragment has to merge backwards into the first chunk.
        buf.insert(1100, vec![3u8; 4096]);
        buf.tree.assert_valid();

        let sizes: Vec<usize> = buf.chunks().map(|c| c.units()).collect();
        assert_eq!(sizes, vec![1100, 4096, 900]);
        assert_eq!(buf.len(), 6096);
    }

    #[test]
    fn bulk_insert_respects_chunk_bound() {
        let data = vec![7u8; MAX_CHUNK_BYTES * 3 + 100];
        let b = ByteBuffer::from_bytes(&data);
        b.tree.assert_valid();
        assert_eq!(b.len(), data.len());
        assert!(b.chunks().all(|c| c.units() <= MAX_CHUNK_BYTES));
        assert_eq!(content(&b), data);
    }

    #[test]
    fn at_reads_single_bytes() {
        let b = from_chunks(&[b"abc", b"def"]);
        assert_eq!(b.at(0), Some(b'a'));
        assert_eq!(b.at(2), Some(b'c'));
        assert_eq!(b.at(3), Some(b'd'));
        assert_eq!(b.at(5), Some(b'f'));
        assert_eq!(b.at(6), None);
    }

    #[test]
    fn clip_round_trip_at_arbitrary_split_points() {
        let data: Vec<u8> = (0..10_000u32).map(|i| (i % 251) as u8).collect();
        let b = ByteBuffer::from_bytes(&data);

        for &(lo, hi) in &[(0, 10_000), (0, 1), (4095, 4097), (4096, 8192), (9999, 10_000), (37, 8641)] {
            assert_eq!(b.get_clip(lo..hi), data[lo..hi].to_vec(), "clip {}..{}", lo, hi);
        }
        assert_eq!(b.get_clip(5..5), Vec::<u8>::new());
    }

    #[test]
    fn merge_pass_is_idempotent() {
        let parts: Vec<Vec<u8>> = (0..10).map(|i| vec![i as u8; 600]).collect();
        let refs: Vec<&[u8]> = parts.iter().map(|p| p.as_slice()).collect();
        let mut b = from_chunks(&refs);
        let before = content(&b);

        b.merge_small_chunks();
        b.tree.assert_valid();
        let chunk_count = b.chunks().count();
        assert_eq!(content(&b), before);

        // A second pass without intervening edits must change nothing.
        b.merge_small_chunks();
        b.tree.assert_valid();
        assert_eq!(b.chunks().count(), chunk_count);
        assert_eq!(content(&b), before);
    }

    #[test]
    fn erase_everything() {
        let mut b = ByteBuffer::from_bytes(&vec![1u8; 5000]);
        let removed = b.erase(0..5000);
        b.tree.assert_valid();
        assert_eq!(removed.len(), 5000);
        assert!(b.is_empty());
        assert_eq!(b.len(), 0);
    }

    #[test]
    fn randomized_soak_against_vec_model() {
        let mut rng = SmallRng::seed_from_u64(0xb0b);
        let mut b = ByteBuffer::new();
        let mut model: Vec<u8> = Vec::new();

        for step in 0..300 {
            if model.is_empty() || rng.gen_bool(0.6) {
                let n = rng.gen_range(1..1200);
                let data: Vec<u8> = (0..n).map(|_| rng.gen()).collect();
                let at = rng.gen_range(0..=model.len());
                b.insert(at, data.clone());
                model.splice(at..at, data);
            } else {
                let a = rng.gen_range(0..model.len());
                let len = rng.gen_range(0..=(model.len() - a).min(900));
                let removed = b.erase(a..a + len);
                let expect: Vec<u8> = model.drain(a..a + len).collect();
                assert_eq!(removed, expect, "erase mismatch at step {}", step);
            }

            b.tree.assert_valid();
            assert_eq!(b.len(), model.len(), "length diverged at step {}", step);
            assert!(b.chunks().all(|c| c.units() <= MAX_CHUNK_BYTES));
        }

        assert_eq!(content(&b), model);
    }
}
