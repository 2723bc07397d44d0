//! Mapping between read offsets and reference coordinates, driven by the CIGAR.

use crate::md::MdTag;
use rust_htslib::bam::record::{Cigar, CigarString};
use serde::Serialize;
use std::fmt;

/// A zero-based coordinate on a reference sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct ReferencePosition {
    pub reference_id: i32,
    pub pos: i64,
}

impl ReferencePosition {
    pub fn new(reference_id: i32, pos: i64) -> Self {
        Self { reference_id, pos }
    }
}

impl fmt::Display for ReferencePosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.reference_id, self.pos)
    }
}

/// What the reference looks like underneath one aligned read base.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceSequenceContext {
    pub position: ReferencePosition,
    /// Reference base, when the MD tag lets us recover it.
    pub reference_base: Option<u8>,
    /// The CIGAR operation covering this base.
    pub cigar_op: Cigar,
    /// Offset of this base within `cigar_op`.
    pub op_offset: u32,
}

fn consumes_read(op: &Cigar) -> bool {
    matches!(
        op,
        Cigar::Match(_) | Cigar::Equal(_) | Cigar::Diff(_) | Cigar::Ins(_) | Cigar::SoftClip(_)
    )
}

fn consumes_reference(op: &Cigar) -> bool {
    matches!(
        op,
        Cigar::Match(_) | Cigar::Equal(_) | Cigar::Diff(_) | Cigar::Del(_) | Cigar::RefSkip(_)
    )
}

/// Number of read bases the CIGAR describes.
pub fn query_length(cigar: &CigarString) -> usize {
    cigar
        .iter()
        .filter(|op| consumes_read(op))
        .map(|op| op.len() as usize)
        .sum()
}

/// Number of reference bases the CIGAR spans, including deletions and skips.
pub fn reference_length(cigar: &CigarString) -> i64 {
    cigar
        .iter()
        .filter(|op| consumes_reference(op))
        .map(|op| i64::from(op.len()))
        .sum()
}

/// Walks the CIGAR and yields, for every read-consuming base, the CIGAR op,
/// the offset within it, and the reference coordinate (if the op has one).
fn walk(cigar: &CigarString, start: i64) -> impl Iterator<Item = (Cigar, u32, Option<i64>)> + '_ {
    let mut ref_pos = start;
    cigar.iter().flat_map(move |&op| {
        let op_start = ref_pos;
        if consumes_reference(&op) {
            ref_pos += i64::from(op.len());
        }
        let aligned = matches!(op, Cigar::Match(_) | Cigar::Equal(_) | Cigar::Diff(_));
        let len = if consumes_read(&op) { op.len() } else { 0 };
        (0..len).map(move |i| {
            let pos = aligned.then(|| op_start + i64::from(i));
            (op, i, pos)
        })
    })
}

/// Reference coordinate of every read offset, `None` for insertions and
/// soft clips. The result has one entry per read base the CIGAR describes.
pub fn reference_positions(cigar: &CigarString, start: i64) -> Vec<Option<i64>> {
    walk(cigar, start).map(|(_, _, pos)| pos).collect()
}

/// Reference context of every read offset; `None` wherever
/// [`reference_positions`] is `None`.
pub fn reference_contexts(
    cigar: &CigarString,
    start: i64,
    reference_id: i32,
    sequence: &[u8],
    md: Option<&MdTag>,
) -> Vec<Option<ReferenceSequenceContext>> {
    walk(cigar, start)
        .enumerate()
        .map(|(offset, (cigar_op, op_offset, pos))| {
            pos.map(|pos| {
                let reference_base = md.and_then(|md| match md.is_match(pos) {
                    Some(true) => sequence.get(offset).map(u8::to_ascii_uppercase),
                    Some(false) => md.mismatched_base(pos),
                    None => None,
                });
                ReferenceSequenceContext {
                    position: ReferencePosition::new(reference_id, pos),
                    reference_base,
                    cigar_op,
                    op_offset,
                }
            })
        })
        .collect()
}
