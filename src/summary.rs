use crate::coordinates::reference_length;
use crate::error::ReadError;
use crate::read::Read;
use crate::record::AlignmentRecord;
use serde::Serialize;

/// Per-read classification counts, as written by the `inspect` command.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReadSummary {
    pub name: String,
    pub length: usize,
    pub aligned: bool,
    pub canonical: bool,
    pub negative_strand: bool,
    pub passed_quality_checks: bool,
    pub read_group: Option<String>,
    pub mapping_quality: Option<u8>,
    pub start: Option<i64>,
    /// Exclusive end of the aligned reference span.
    pub reference_end: Option<i64>,
    pub cigar: Option<String>,
    pub has_mismatch_annotation: bool,
    pub mismatches: usize,
    pub snps: usize,
    pub insertions: usize,
    pub ambiguous_bases: usize,
    /// SNPs whose base quality is at least the configured minimum.
    pub high_quality_snps: usize,
    pub mean_base_quality: f64,
}

impl ReadSummary {
    pub fn from_read<R: AlignmentRecord>(
        read: &Read<R>,
        min_base_quality: u8,
    ) -> Result<Self, ReadError> {
        let mut summary = ReadSummary {
            name: read.name().to_string(),
            length: read.len(),
            aligned: read.is_aligned(),
            canonical: read.is_canonical_record(),
            negative_strand: read.is_negative_read(),
            passed_quality_checks: read.passed_quality_checks(),
            read_group: read.read_group().map(str::to_string),
            start: read.start(),
            has_mismatch_annotation: read.mismatches_option().is_some(),
            ..Default::default()
        };

        let mut quality_sum = 0u64;
        for residue in read.residues() {
            quality_sum += u64::from(residue.quality().value());
            if !residue.is_regular_base()? {
                summary.ambiguous_bases += 1;
            }
        }
        if !read.is_empty() {
            summary.mean_base_quality = quality_sum as f64 / read.len() as f64;
        }

        if !read.is_aligned() {
            return Ok(summary);
        }

        summary.mapping_quality = read.alignment_quality()?.map(|q| q.value());
        summary.cigar = Some(read.cigar().to_string());
        summary.reference_end = read.start().map(|start| start + reference_length(read.cigar()));

        // Without an MD tag every base would count as an insertion.
        if summary.has_mismatch_annotation {
            for residue in read.residues() {
                if residue.is_insertion()? {
                    summary.insertions += 1;
                } else if residue.is_snp()? {
                    summary.snps += 1;
                    if residue.quality().value() >= min_base_quality {
                        summary.high_quality_snps += 1;
                    }
                }
                if residue.is_mismatch_default()? {
                    summary.mismatches += 1;
                }
            }
        }

        Ok(summary)
    }
}
