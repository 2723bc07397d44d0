use anyhow::{bail, Context, Result};
use rust_htslib::bam::{
    self,
    record::{Aux, CigarString},
};
use rust_htslib::errors::Error as HtsError;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::convert::TryFrom;

/// Mapping quality value meaning "not available" in SAM/BAM.
pub const MAPQ_UNAVAILABLE: i32 = 255;

/// The raw fields of a sequenced read that [`crate::read::Read`] is built from.
///
/// Implemented for htslib's `bam::Record` and for the owned [`RawRead`].
pub trait AlignmentRecord {
    fn name(&self) -> Cow<'_, str>;

    /// Base sequence, one ASCII character per base.
    fn sequence(&self) -> Cow<'_, [u8]>;

    /// Phred-scaled qualities without the +33 offset.
    fn qualities(&self) -> &[u8];

    fn is_mapped(&self) -> bool;
    fn is_primary(&self) -> bool;
    fn is_duplicate(&self) -> bool;
    fn is_paired(&self) -> bool;
    fn is_first_of_pair(&self) -> bool;
    fn is_second_of_pair(&self) -> bool;
    fn is_negative_strand(&self) -> bool;
    fn failed_vendor_checks(&self) -> bool;

    /// Zero-based leftmost reference coordinate. Only meaningful when mapped.
    fn start(&self) -> i64;

    fn reference_id(&self) -> i32;

    /// Raw mapping quality; may be [`MAPQ_UNAVAILABLE`].
    fn mapping_quality(&self) -> Option<i32>;

    fn cigar(&self) -> Result<CigarString>;

    /// The `MD` auxiliary field, if present.
    fn mismatch_tag(&self) -> Result<Option<String>>;

    /// The `RG` auxiliary field, if present.
    fn read_group(&self) -> Option<String>;
}

/// An owned read record, convenient for JSON input and for tests.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawRead {
    pub name: String,
    pub sequence: String,
    pub qualities: Vec<u8>,
    pub read_mapped: bool,
    pub primary_alignment: bool,
    pub duplicate: bool,
    pub paired: bool,
    pub first_of_pair: bool,
    pub second_of_pair: bool,
    pub negative_strand: bool,
    pub failed_vendor_quality_checks: bool,
    pub start: i64,
    pub reference_id: i32,
    pub mapping_quality: Option<i32>,
    /// CIGAR string; `None` or `"*"` when unavailable.
    pub cigar: Option<String>,
    /// The MD tag.
    pub mismatching_positions: Option<String>,
    pub read_group: Option<String>,
}

impl RawRead {
    pub fn unaligned(name: &str, sequence: &str, qualities: &[u8]) -> Self {
        Self {
            name: name.to_string(),
            sequence: sequence.to_string(),
            qualities: qualities.to_vec(),
            reference_id: -1,
            start: -1,
            ..Self::default()
        }
    }

    /// A mapped, primary record with the given CIGAR and MD tag.
    pub fn aligned(
        name: &str,
        sequence: &str,
        qualities: &[u8],
        start: i64,
        cigar: &str,
        md: Option<&str>,
    ) -> Self {
        Self {
            name: name.to_string(),
            sequence: sequence.to_string(),
            qualities: qualities.to_vec(),
            read_mapped: true,
            primary_alignment: true,
            start,
            reference_id: 0,
            mapping_quality: Some(60),
            cigar: Some(cigar.to_string()),
            mismatching_positions: md.map(str::to_string),
            ..Self::default()
        }
    }
}

impl AlignmentRecord for RawRead {
    fn name(&self) -> Cow<'_, str> {
        Cow::Borrowed(&self.name)
    }

    fn sequence(&self) -> Cow<'_, [u8]> {
        Cow::Borrowed(self.sequence.as_bytes())
    }

    fn qualities(&self) -> &[u8] {
        &self.qualities
    }

    fn is_mapped(&self) -> bool {
        self.read_mapped
    }

    fn is_primary(&self) -> bool {
        self.primary_alignment
    }

    fn is_duplicate(&self) -> bool {
        self.duplicate
    }

    fn is_paired(&self) -> bool {
        self.paired
    }

    fn is_first_of_pair(&self) -> bool {
        self.first_of_pair
    }

    fn is_second_of_pair(&self) -> bool {
        self.second_of_pair
    }

    fn is_negative_strand(&self) -> bool {
        self.negative_strand
    }

    fn failed_vendor_checks(&self) -> bool {
        self.failed_vendor_quality_checks
    }

    fn start(&self) -> i64 {
        self.start
    }

    fn reference_id(&self) -> i32 {
        self.reference_id
    }

    fn mapping_quality(&self) -> Option<i32> {
        self.mapping_quality
    }

    fn cigar(&self) -> Result<CigarString> {
        match self.cigar.as_deref() {
            None | Some("*") | Some("") => Ok(CigarString(Vec::new())),
            Some(cigar) => CigarString::try_from(cigar)
                .with_context(|| format!("Invalid CIGAR string '{}'", cigar)),
        }
    }

    fn mismatch_tag(&self) -> Result<Option<String>> {
        Ok(self.mismatching_positions.clone())
    }

    fn read_group(&self) -> Option<String> {
        self.read_group.clone()
    }
}

impl AlignmentRecord for bam::Record {
    fn name(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(self.qname())
    }

    fn sequence(&self) -> Cow<'_, [u8]> {
        Cow::Owned(self.seq().as_bytes())
    }

    fn qualities(&self) -> &[u8] {
        self.qual()
    }

    fn is_mapped(&self) -> bool {
        !self.is_unmapped()
    }

    // Only mapped records carry a primary alignment.
    fn is_primary(&self) -> bool {
        !self.is_unmapped() && !self.is_secondary() && !self.is_supplementary()
    }

    fn is_duplicate(&self) -> bool {
        bam::Record::is_duplicate(self)
    }

    fn is_paired(&self) -> bool {
        bam::Record::is_paired(self)
    }

    fn is_first_of_pair(&self) -> bool {
        self.is_first_in_template()
    }

    fn is_second_of_pair(&self) -> bool {
        self.is_last_in_template()
    }

    fn is_negative_strand(&self) -> bool {
        self.is_reverse()
    }

    fn failed_vendor_checks(&self) -> bool {
        self.is_quality_check_failed()
    }

    fn start(&self) -> i64 {
        self.pos()
    }

    fn reference_id(&self) -> i32 {
        self.tid()
    }

    fn mapping_quality(&self) -> Option<i32> {
        Some(i32::from(self.mapq()))
    }

    fn cigar(&self) -> Result<CigarString> {
        Ok(bam::Record::cigar(self).take())
    }

    fn mismatch_tag(&self) -> Result<Option<String>> {
        match self.aux(b"MD") {
            Ok(Aux::String(md)) => Ok(Some(md.to_string())),
            Ok(other) => bail!("MD tag has unexpected type: {:?}", other),
            Err(HtsError::BamAuxTagNotFound) => Ok(None),
            Err(e) => Err(e).context("Failed to read MD tag"),
        }
    }

    fn read_group(&self) -> Option<String> {
        match self.aux(b"RG") {
            Ok(Aux::String(rg)) => Some(rg.to_string()),
            _ => None,
        }
    }
}
