//! A validated read and its per-base residue view.

use crate::coordinates::{
    reference_contexts, reference_length, reference_positions, ReferencePosition,
    ReferenceSequenceContext,
};
use crate::error::{Invariant, ReadError};
use crate::md::{MdTag, MismatchAnnotation, Verdict};
use crate::quality::QualityScore;
use crate::record::{AlignmentRecord, MAPQ_UNAVAILABLE};
use anyhow::{anyhow, Context};
use log::debug;
use rust_htslib::bam::record::CigarString;
use std::fmt;
use std::ops::Range;
use std::sync::OnceLock;

/// Highest mapping quality a record may carry (255 means "unavailable").
pub const MAX_MAPPING_QUALITY: i32 = 93;

/// A read record that passed validation.
///
/// Derived values are computed on first use and cached; the wrapped record is
/// never modified and can be taken back with [`Read::into_record`].
#[derive(Clone)]
pub struct Read<R> {
    record: R,
    cigar: CigarString,
    positions: Vec<Option<i64>>,
    md_tag: Option<MdTag>,
    name: OnceLock<String>,
    sequence: OnceLock<Vec<u8>>,
    read_group: OnceLock<Option<String>>,
    mismatches: OnceLock<Option<MismatchAnnotation>>,
    contexts: OnceLock<Vec<Option<ReferenceSequenceContext>>>,
}

impl<R: AlignmentRecord> Read<R> {
    /// Validates `record` and wraps it.
    ///
    /// Checks, in order: a primary alignment must be aligned; sequence and
    /// quality lengths agree; mapping quality (if any) is within [0, 93];
    /// an aligned read starts at a non-negative coordinate; the CIGAR yields
    /// one reference position per base. Any other problem found on the way
    /// (bad CIGAR, bad MD tag) fails construction the same way.
    pub fn new(record: R) -> Result<Self, ReadError> {
        Self::validate(record).map_err(|(name, source)| {
            debug!("Rejected read {}: {}", name, source);
            ReadError::InvalidRead { name, source }
        })
    }

    fn validate(record: R) -> Result<Self, (String, Invariant)> {
        match Self::check(&record) {
            Ok((cigar, positions, md_tag)) => Ok(Self {
                record,
                cigar,
                positions,
                md_tag,
                name: OnceLock::new(),
                sequence: OnceLock::new(),
                read_group: OnceLock::new(),
                mismatches: OnceLock::new(),
                contexts: OnceLock::new(),
            }),
            Err(e) => Err((record.name().into_owned(), e)),
        }
    }

    #[allow(clippy::type_complexity)]
    fn check(record: &R) -> Result<(CigarString, Vec<Option<i64>>, Option<MdTag>), Invariant> {
        let mapped = record.is_mapped();
        if record.is_primary() && !mapped {
            return Err(Invariant::PrimaryNotAligned);
        }

        let sequence_len = record.sequence().len();
        let quality_len = record.qualities().len();
        if sequence_len != quality_len {
            return Err(Invariant::LengthMismatch {
                sequence: sequence_len,
                qualities: quality_len,
            });
        }

        if let Some(mapq) = record.mapping_quality().filter(|&q| q != MAPQ_UNAVAILABLE) {
            if !(0..=MAX_MAPPING_QUALITY).contains(&mapq) {
                return Err(Invariant::MappingQualityOutOfRange(mapq));
            }
        }

        let start = record.start();
        if mapped && start < 0 {
            return Err(Invariant::NegativeStart(start));
        }

        let cigar = record.cigar()?;
        if mapped && start.checked_add(reference_length(&cigar)).is_none() {
            return Err(anyhow!("alignment end overflows (start {})", start).into());
        }
        let positions = if mapped {
            reference_positions(&cigar, start)
        } else {
            vec![None; sequence_len]
        };
        if positions.len() != sequence_len {
            return Err(Invariant::ReferencePositionCount {
                positions: positions.len(),
                sequence: sequence_len,
            });
        }

        let md_tag = if mapped {
            record
                .mismatch_tag()?
                .map(|md| {
                    MdTag::parse(&md, start)
                        .and_then(|tag| tag.align_to(&cigar))
                        .with_context(|| format!("Malformed MD tag '{}'", md))
                })
                .transpose()?
        } else {
            None
        };

        Ok((cigar, positions, md_tag))
    }

    pub fn record(&self) -> &R {
        &self.record
    }

    pub fn into_record(self) -> R {
        self.record
    }

    pub fn name(&self) -> &str {
        self.name.get_or_init(|| self.record.name().into_owned())
    }

    /// The base sequence as ASCII bytes.
    pub fn sequence(&self) -> &[u8] {
        self.sequence
            .get_or_init(|| self.record.sequence().into_owned())
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn cigar(&self) -> &CigarString {
        &self.cigar
    }

    pub fn is_aligned(&self) -> bool {
        self.record.is_mapped()
    }

    /// Fails with [`ReadError::NotAligned`] unless the read is aligned.
    pub fn ensure_aligned(&self) -> Result<(), ReadError> {
        if self.is_aligned() {
            Ok(())
        } else {
            Err(ReadError::NotAligned {
                name: self.name().to_string(),
            })
        }
    }

    pub fn is_primary_alignment(&self) -> bool {
        self.is_aligned() && self.record.is_primary()
    }

    pub fn is_duplicate(&self) -> bool {
        self.record.is_duplicate()
    }

    pub fn is_paired(&self) -> bool {
        self.record.is_paired()
    }

    pub fn is_first_of_pair(&self) -> bool {
        self.is_paired() && self.record.is_first_of_pair()
    }

    pub fn is_second_of_pair(&self) -> bool {
        self.is_paired() && self.record.is_second_of_pair()
    }

    pub fn is_negative_read(&self) -> bool {
        self.record.is_negative_strand()
    }

    /// True for the one record that represents the physical read: the
    /// primary alignment, not marked as a duplicate.
    pub fn is_canonical_record(&self) -> bool {
        self.is_primary_alignment() && !self.is_duplicate()
    }

    pub fn passed_quality_checks(&self) -> bool {
        !self.record.failed_vendor_checks()
    }

    /// Mapping quality, `None` when the record has none or carries 255.
    pub fn alignment_quality(&self) -> Result<Option<QualityScore>, ReadError> {
        self.ensure_aligned()?;
        Ok(self
            .record
            .mapping_quality()
            .filter(|&q| q != MAPQ_UNAVAILABLE)
            .and_then(|q| u8::try_from(q).ok())
            .map(QualityScore::new))
    }

    pub fn start(&self) -> Option<i64> {
        self.is_aligned().then(|| self.record.start())
    }

    pub fn read_group(&self) -> Option<&str> {
        self.read_group
            .get_or_init(|| self.record.read_group())
            .as_deref()
    }

    pub fn mismatches_option(&self) -> Option<&MismatchAnnotation> {
        self.mismatches
            .get_or_init(|| {
                let md = self.md_tag.clone()?;
                debug!("Building mismatch annotation for {}", self.name());
                Some(MismatchAnnotation::new(md, &self.positions))
            })
            .as_ref()
    }

    pub fn mismatches(&self) -> Result<&MismatchAnnotation, ReadError> {
        self.mismatches_option()
            .ok_or_else(|| ReadError::NoMismatchAnnotation {
                name: self.name().to_string(),
            })
    }

    /// Reference coordinate of each read offset; all `None` when unaligned.
    pub fn reference_positions(&self) -> &[Option<i64>] {
        &self.positions
    }

    fn reference_contexts(&self) -> &[Option<ReferenceSequenceContext>] {
        self.contexts.get_or_init(|| {
            if !self.is_aligned() {
                return vec![None; self.len()];
            }
            reference_contexts(
                &self.cigar,
                self.record.start(),
                self.record.reference_id(),
                self.sequence(),
                self.md_tag.as_ref(),
            )
        })
    }

    fn verdict(&self, offset: usize) -> Verdict {
        self.mismatches_option()
            .map_or(Verdict::NoVerdict, |m| m.verdict(offset))
    }

    /// The per-base view of this read, ordered by offset.
    pub fn residues(&self) -> Residues<'_, R> {
        Residues { read: self }
    }
}

impl<R: PartialEq> PartialEq for Read<R> {
    fn eq(&self, other: &Self) -> bool {
        self.record == other.record
    }
}

impl<R: AlignmentRecord> fmt::Debug for Read<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Read")
            .field("name", &self.name())
            .field("aligned", &self.is_aligned())
            .field("length", &self.len())
            .field("cigar", &self.cigar.to_string())
            .finish()
    }
}

/// The ordered residues of a read.
pub struct Residues<'a, R> {
    read: &'a Read<R>,
}

impl<'a, R: AlignmentRecord> Residues<'a, R> {
    pub fn len(&self) -> usize {
        self.read.len()
    }

    pub fn is_empty(&self) -> bool {
        self.read.is_empty()
    }

    pub fn get(&self, offset: usize) -> Option<Residue<'a, R>> {
        (offset < self.len()).then_some(Residue {
            offset,
            read: self.read,
        })
    }

    pub fn iter(&self) -> ResidueIter<'a, R> {
        ResidueIter {
            read: self.read,
            range: 0..self.read.len(),
        }
    }
}

impl<'a, R: AlignmentRecord> IntoIterator for Residues<'a, R> {
    type Item = Residue<'a, R>;
    type IntoIter = ResidueIter<'a, R>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

pub struct ResidueIter<'a, R> {
    read: &'a Read<R>,
    range: Range<usize>,
}

impl<'a, R> Iterator for ResidueIter<'a, R> {
    type Item = Residue<'a, R>;

    fn next(&mut self) -> Option<Self::Item> {
        let read = self.read;
        self.range.next().map(|offset| Residue { offset, read })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.range.size_hint()
    }
}

impl<R> DoubleEndedIterator for ResidueIter<'_, R> {
    fn next_back(&mut self) -> Option<Self::Item> {
        let read = self.read;
        self.range.next_back().map(|offset| Residue { offset, read })
    }
}

impl<R> ExactSizeIterator for ResidueIter<'_, R> {}

/// One base of a read.
pub struct Residue<'a, R> {
    offset: usize,
    read: &'a Read<R>,
}

impl<R> Clone for Residue<'_, R> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<R> Copy for Residue<'_, R> {}

impl<'a, R: AlignmentRecord> Residue<'a, R> {
    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn read(&self) -> &'a Read<R> {
        self.read
    }

    pub fn base(&self) -> u8 {
        self.read.sequence()[self.offset]
    }

    pub fn quality(&self) -> QualityScore {
        QualityScore::new(self.read.record.qualities()[self.offset])
    }

    /// `true` for A/C/G/T, `false` for N, an error for anything else.
    pub fn is_regular_base(&self) -> Result<bool, ReadError> {
        match self.base() {
            b'A' | b'C' | b'G' | b'T' => Ok(true),
            b'N' => Ok(false),
            other => Err(ReadError::UnexpectedBase {
                name: self.read.name().to_string(),
                offset: self.offset,
                base: char::from(other),
            }),
        }
    }

    /// Whether this base disagrees with the reference.
    ///
    /// Offsets the MD tag cannot describe (insertions, soft clips, reads
    /// without an MD tag) report `include_insertions`.
    pub fn is_mismatch(&self, include_insertions: bool) -> Result<bool, ReadError> {
        self.read.ensure_aligned()?;
        Ok(self
            .read
            .verdict(self.offset)
            .is_mismatch()
            .unwrap_or(include_insertions))
    }

    /// [`Residue::is_mismatch`] with insertions counted as mismatches.
    pub fn is_mismatch_default(&self) -> Result<bool, ReadError> {
        self.is_mismatch(true)
    }

    pub fn is_snp(&self) -> Result<bool, ReadError> {
        self.is_mismatch(false)
    }

    pub fn is_insertion(&self) -> Result<bool, ReadError> {
        self.read.ensure_aligned()?;
        Ok(self.read.verdict(self.offset) == Verdict::NoVerdict)
    }

    pub fn reference_position_option(&self) -> Result<Option<ReferencePosition>, ReadError> {
        self.read.ensure_aligned()?;
        Ok(self.read.positions[self.offset]
            .map(|pos| ReferencePosition::new(self.read.record.reference_id(), pos)))
    }

    pub fn reference_position(&self) -> Result<ReferencePosition, ReadError> {
        self.reference_position_option()?
            .ok_or_else(|| ReadError::NoReferenceLocation {
                name: self.read.name().to_string(),
                offset: self.offset,
            })
    }

    pub fn reference_sequence_context(
        &self,
    ) -> Result<Option<&'a ReferenceSequenceContext>, ReadError> {
        self.read.ensure_aligned()?;
        Ok(self.read.reference_contexts()[self.offset].as_ref())
    }
}

impl<R: AlignmentRecord> fmt::Debug for Residue<'_, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Residue")
            .field("read", &self.read.name())
            .field("offset", &self.offset)
            .field("base", &char::from(self.base()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::RawRead;

    #[test]
    fn test_flags_on_unaligned_read() {
        let read = Read::new(RawRead::unaligned("u1", "ACGT", &[20; 4])).unwrap();
        assert!(!read.is_aligned());
        assert!(!read.is_primary_alignment());
        assert!(!read.is_canonical_record());
        assert!(read.passed_quality_checks());
        assert_eq!(read.start(), None);
        assert_eq!(read.reference_positions(), &[None, None, None, None]);
        assert!(read.mismatches_option().is_none());
    }

    #[test]
    fn test_pair_flags_require_pairing() {
        let raw = RawRead {
            first_of_pair: true,
            second_of_pair: true,
            ..RawRead::unaligned("p1", "AC", &[20; 2])
        };
        let read = Read::new(raw.clone()).unwrap();
        assert!(!read.is_first_of_pair());
        assert!(!read.is_second_of_pair());

        let paired = Read::new(RawRead {
            paired: true,
            second_of_pair: false,
            ..raw
        })
        .unwrap();
        assert!(paired.is_paired());
        assert!(paired.is_first_of_pair());
        assert!(!paired.is_second_of_pair());
    }

    #[test]
    fn test_md_span_must_agree_with_cigar() {
        let raw = RawRead::aligned("m1", "ACGT", &[30; 4], 0, "4M", Some("5"));
        let err = Read::new(raw).unwrap_err();
        assert!(matches!(err.invariant(), Some(Invariant::Malformed(_))));
    }

    #[test]
    fn test_md_span_ignores_reference_skips() {
        let raw = RawRead::aligned("s1", "ACGT", &[30; 4], 0, "2M50N2M", Some("1G2"));
        let read = Read::new(raw).unwrap();
        let residues = read.residues();
        assert!(residues.get(1).unwrap().is_snp().unwrap());
        let third = residues.get(2).unwrap();
        assert_eq!(third.reference_position().unwrap().pos, 52);
        assert!(!third.is_insertion().unwrap());
        assert!(!third.is_mismatch(true).unwrap());
    }

    #[test]
    fn test_overflowing_md_tag_is_malformed() {
        let raw = RawRead::aligned("o1", "ACGT", &[30; 4], 0, "4M", Some("99999999999999999999"));
        let err = Read::new(raw).unwrap_err();
        assert!(matches!(err.invariant(), Some(Invariant::Malformed(_))));

        let raw = RawRead::aligned("o2", "ACGT", &[30; 4], i64::MAX - 1, "4M", Some("4"));
        let err = Read::new(raw).unwrap_err();
        assert!(matches!(err.invariant(), Some(Invariant::Malformed(_))));
    }

    #[test]
    fn test_reference_context_bases() {
        let raw = RawRead::aligned("c1", "ACGT", &[30; 4], 10, "4M", Some("2A1"));
        let read = Read::new(raw).unwrap();
        let residues = read.residues();
        let context = residues.get(2).unwrap().reference_sequence_context().unwrap().unwrap();
        assert_eq!(context.reference_base, Some(b'A'));
        assert_eq!(context.position.pos, 12);
        let context = residues.get(3).unwrap().reference_sequence_context().unwrap().unwrap();
        assert_eq!(context.reference_base, Some(b'T'));
    }

    #[test]
    fn test_unexpected_base_is_an_error() {
        let read = Read::new(RawRead::unaligned("b1", "ANX", &[20; 3])).unwrap();
        let residues: Vec<_> = read.residues().into_iter().collect();
        assert!(residues[0].is_regular_base().unwrap());
        assert!(!residues[1].is_regular_base().unwrap());
        assert!(matches!(
            residues[2].is_regular_base(),
            Err(ReadError::UnexpectedBase { offset: 2, base: 'X', .. })
        ));
    }
}
