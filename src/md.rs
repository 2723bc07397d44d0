//! Parsing of the SAM `MD` tag into per-position mismatch verdicts.

use anyhow::{anyhow, bail, Result};
use rust_htslib::bam::record::{Cigar, CigarString};
use std::collections::BTreeMap;
use std::ops::Range;

/// A parsed MD tag anchored at the read's alignment start.
///
/// Positions are zero-based reference coordinates. The tag covers
/// `[start, end)`, which includes deleted reference bases.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MdTag {
    start: i64,
    end: i64,
    mismatches: BTreeMap<i64, u8>,
    deletions: BTreeMap<i64, u8>,
    skips: Vec<Range<i64>>,
}

fn overflow(md: &str) -> anyhow::Error {
    anyhow!("MD tag '{}' overflows", md)
}

fn advance(pos: i64, by: i64, md: &str) -> Result<i64> {
    pos.checked_add(by).ok_or_else(|| overflow(md))
}

impl MdTag {
    pub fn parse(md: &str, start: i64) -> Result<Self> {
        if md.is_empty() {
            bail!("Empty MD tag");
        }

        let mut pos = start;
        let mut run: Option<i64> = None;
        let mut mismatches = BTreeMap::new();
        let mut deletions = BTreeMap::new();
        let mut bytes = md.bytes().peekable();

        while let Some(c) = bytes.next() {
            match c {
                b'0'..=b'9' => {
                    let digit = i64::from(c - b'0');
                    run = Some(
                        run.unwrap_or(0)
                            .checked_mul(10)
                            .and_then(|r| r.checked_add(digit))
                            .ok_or_else(|| overflow(md))?,
                    );
                }
                b'^' => {
                    pos = advance(pos, run.take().unwrap_or(0), md)?;
                    let mut deleted = 0;
                    while let Some(&base) = bytes.peek() {
                        if !base.is_ascii_alphabetic() {
                            break;
                        }
                        deletions.insert(pos, base.to_ascii_uppercase());
                        pos = advance(pos, 1, md)?;
                        deleted += 1;
                        bytes.next();
                    }
                    if deleted == 0 {
                        bail!("MD tag '{}' has a deletion without bases", md);
                    }
                }
                c if c.is_ascii_alphabetic() => {
                    pos = advance(pos, run.take().unwrap_or(0), md)?;
                    mismatches.insert(pos, c.to_ascii_uppercase());
                    pos = advance(pos, 1, md)?;
                }
                other => bail!(
                    "MD tag '{}' contains unexpected character '{}'",
                    md,
                    other as char
                ),
            }
        }
        pos = advance(pos, run.unwrap_or(0), md)?;

        Ok(Self {
            start,
            end: pos,
            mismatches,
            deletions,
            skips: Vec::new(),
        })
    }

    /// Lays the tag out along the reference using the read's CIGAR.
    ///
    /// MD does not describe reference skips (`N`), so positions after each
    /// skip are shifted by its length. Fails if the tag and the CIGAR
    /// disagree on how many reference bases are aligned.
    pub fn align_to(self, cigar: &CigarString) -> Result<Self> {
        let mut md_span = 0i64;
        let mut skips = Vec::new();
        for op in cigar.iter() {
            match op {
                Cigar::Match(len) | Cigar::Equal(len) | Cigar::Diff(len) | Cigar::Del(len) => {
                    md_span += i64::from(*len)
                }
                Cigar::RefSkip(len) => skips.push((md_span, i64::from(*len))),
                _ => {}
            }
        }
        if md_span != self.reference_length() {
            bail!(
                "MD tag spans {} reference bases but the CIGAR aligns {}",
                self.reference_length(),
                md_span
            );
        }
        if skips.is_empty() {
            return Ok(self);
        }

        let start = self.start;
        let shift = |pos: i64| {
            pos + skips
                .iter()
                .filter(|(at, _)| *at <= pos - start)
                .map(|(_, len)| len)
                .sum::<i64>()
        };
        let mut skipped = 0;
        let skip_ranges = skips
            .iter()
            .map(|&(at, len)| {
                let from = start + at + skipped;
                skipped += len;
                from..from + len
            })
            .collect();

        Ok(Self {
            start,
            end: self.end + skipped,
            mismatches: self.mismatches.iter().map(|(&p, &b)| (shift(p), b)).collect(),
            deletions: self.deletions.iter().map(|(&p, &b)| (shift(p), b)).collect(),
            skips: skip_ranges,
        })
    }

    pub fn start(&self) -> i64 {
        self.start
    }

    /// One past the last reference position the tag describes.
    pub fn end(&self) -> i64 {
        self.end
    }

    /// Number of reference bases the tag covers, deletions included.
    pub fn reference_length(&self) -> i64 {
        self.end - self.start
    }

    /// `Some(true)` if the read matches the reference at `pos`,
    /// `Some(false)` on a mismatch, `None` outside the tag or inside a
    /// deletion or skip.
    pub fn is_match(&self, pos: i64) -> Option<bool> {
        if pos < self.start
            || pos >= self.end
            || self.deletions.contains_key(&pos)
            || self.skips.iter().any(|skip| skip.contains(&pos))
        {
            return None;
        }
        Some(!self.mismatches.contains_key(&pos))
    }

    /// Reference base at a mismatched position.
    pub fn mismatched_base(&self, pos: i64) -> Option<u8> {
        self.mismatches.get(&pos).copied()
    }

    pub fn has_mismatches(&self) -> bool {
        !self.mismatches.is_empty()
    }

    pub fn mismatches(&self) -> impl Iterator<Item = (i64, u8)> + '_ {
        self.mismatches.iter().map(|(&pos, &base)| (pos, base))
    }

    pub fn deletions(&self) -> impl Iterator<Item = (i64, u8)> + '_ {
        self.deletions.iter().map(|(&pos, &base)| (pos, base))
    }
}

/// The annotation's answer for a single read offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Mismatch,
    Match,
    /// The offset has no reference base to compare against (insertion,
    /// soft clip).
    NoVerdict,
}

impl Verdict {
    /// `Some(true)` for a mismatch, `Some(false)` for a match.
    pub fn is_mismatch(self) -> Option<bool> {
        match self {
            Verdict::Mismatch => Some(true),
            Verdict::Match => Some(false),
            Verdict::NoVerdict => None,
        }
    }
}

/// Mismatch verdicts for every offset of an aligned read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MismatchAnnotation {
    md: MdTag,
    verdicts: Vec<Verdict>,
}

impl MismatchAnnotation {
    /// Combines an MD tag with the read's per-offset reference positions.
    pub fn new(md: MdTag, positions: &[Option<i64>]) -> Self {
        let verdicts = positions
            .iter()
            .map(|pos| match pos.and_then(|pos| md.is_match(pos)) {
                Some(true) => Verdict::Match,
                Some(false) => Verdict::Mismatch,
                None => Verdict::NoVerdict,
            })
            .collect();
        Self { md, verdicts }
    }

    /// Verdict at a read offset; offsets past the end have no verdict.
    pub fn verdict(&self, offset: usize) -> Verdict {
        self.verdicts
            .get(offset)
            .copied()
            .unwrap_or(Verdict::NoVerdict)
    }

    pub fn md_tag(&self) -> &MdTag {
        &self.md
    }

    pub fn len(&self) -> usize {
        self.verdicts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.verdicts.is_empty()
    }

    pub fn mismatch_count(&self) -> usize {
        self.verdicts
            .iter()
            .filter(|&&v| v == Verdict::Mismatch)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::TryFrom;

    #[test]
    fn test_parse_all_matches() {
        let md = MdTag::parse("10", 100).unwrap();
        assert_eq!(md.start(), 100);
        assert_eq!(md.end(), 110);
        assert!(!md.has_mismatches());
        assert_eq!(md.is_match(100), Some(true));
        assert_eq!(md.is_match(109), Some(true));
        assert_eq!(md.is_match(110), None);
        assert_eq!(md.is_match(99), None);
    }

    #[test]
    fn test_parse_mismatches_and_deletions() {
        // 3 matches, mismatch (ref G), 2 matches, deletion of AC, 4 matches
        let md = MdTag::parse("3G2^AC4", 0).unwrap();
        assert_eq!(md.reference_length(), 12);
        assert_eq!(md.is_match(2), Some(true));
        assert_eq!(md.is_match(3), Some(false));
        assert_eq!(md.mismatched_base(3), Some(b'G'));
        assert_eq!(md.is_match(6), None);
        assert_eq!(md.is_match(7), None);
        assert_eq!(md.deletions().collect::<Vec<_>>(), vec![(6, b'A'), (7, b'C')]);
        assert_eq!(md.is_match(8), Some(true));
    }

    #[test]
    fn test_parse_adjacent_mismatches() {
        let md = MdTag::parse("0A0C5", 10).unwrap();
        assert_eq!(md.mismatches().collect::<Vec<_>>(), vec![(10, b'A'), (11, b'C')]);
        assert_eq!(md.end(), 17);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(MdTag::parse("", 0).is_err());
        assert!(MdTag::parse("3^5", 0).is_err());
        assert!(MdTag::parse("3*4", 0).is_err());
    }

    #[test]
    fn test_parse_rejects_overflow() {
        let err = MdTag::parse("99999999999999999999", 0).unwrap_err();
        assert!(err.to_string().contains("overflows"));
        assert!(MdTag::parse("4", i64::MAX - 2).is_err());
        assert!(MdTag::parse("A", i64::MAX).is_err());
        assert!(MdTag::parse("4", i64::MAX - 4).is_ok());
    }

    #[test]
    fn test_align_to_shifts_past_skips() {
        let cigar = CigarString::try_from("2M10N3M").unwrap();
        let md = MdTag::parse("3A1", 100).unwrap().align_to(&cigar).unwrap();
        assert_eq!(md.end(), 115);
        assert_eq!(md.is_match(101), Some(true));
        assert_eq!(md.is_match(105), None);
        assert_eq!(md.is_match(112), Some(true));
        assert_eq!(md.is_match(113), Some(false));
        assert_eq!(md.mismatched_base(113), Some(b'A'));
    }

    #[test]
    fn test_align_to_rejects_span_mismatch() {
        let cigar = CigarString::try_from("4M").unwrap();
        assert!(MdTag::parse("5", 0).unwrap().align_to(&cigar).is_err());
        assert!(MdTag::parse("2^T2", 0).unwrap().align_to(&cigar).is_err());
        let cigar = CigarString::try_from("2M1D2M").unwrap();
        assert!(MdTag::parse("2^T2", 0).unwrap().align_to(&cigar).is_ok());
    }

    #[test]
    fn test_annotation_verdicts() {
        let md = MdTag::parse("1T2", 50).unwrap();
        // read: 2M 1I 2M starting at 50
        let positions = vec![Some(50), Some(51), None, Some(52), Some(53)];
        let annotation = MismatchAnnotation::new(md, &positions);

        assert_eq!(annotation.len(), 5);
        assert_eq!(annotation.verdict(0), Verdict::Match);
        assert_eq!(annotation.verdict(1), Verdict::Mismatch);
        assert_eq!(annotation.verdict(2), Verdict::NoVerdict);
        assert_eq!(annotation.verdict(3), Verdict::Match);
        assert_eq!(annotation.verdict(99), Verdict::NoVerdict);
        assert_eq!(annotation.mismatch_count(), 1);
        assert_eq!(Verdict::NoVerdict.is_mismatch(), None);
    }
}
