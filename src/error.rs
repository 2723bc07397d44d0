use thiserror::Error;

/// Errors surfaced by [`crate::read::Read`] and its residues.
#[derive(Debug, Error)]
pub enum ReadError {
    /// The record failed validation and no read was built from it.
    #[error("Invalid read '{name}': {source}")]
    InvalidRead {
        name: String,
        #[source]
        source: Invariant,
    },

    #[error("Read '{name}' is not aligned")]
    NotAligned { name: String },

    #[error("Read '{name}' has no mismatch annotation (MD tag)")]
    NoMismatchAnnotation { name: String },

    #[error("Residue {offset} of read '{name}' has no reference location (may be an insertion)")]
    NoReferenceLocation { name: String, offset: usize },

    /// A base other than A/C/G/T/N was found in the sequence.
    #[error("Encountered unexpected base '{base}' at offset {offset} of read '{name}'")]
    UnexpectedBase {
        name: String,
        offset: usize,
        base: char,
    },
}

/// The construction check a record failed.
///
/// Anything that goes wrong while the checks run (an unparseable CIGAR, a
/// malformed MD tag) is reported as [`Invariant::Malformed`].
#[derive(Debug, Error)]
pub enum Invariant {
    #[error("read is flagged as a primary alignment but is not aligned")]
    PrimaryNotAligned,

    #[error("sequence length ({sequence}) does not match quality length ({qualities})")]
    LengthMismatch { sequence: usize, qualities: usize },

    #[error("mapping quality {0} is outside [0, 93]")]
    MappingQualityOutOfRange(i32),

    #[error("aligned read has negative start ({0})")]
    NegativeStart(i64),

    #[error("derived {positions} reference positions for a sequence of length {sequence}")]
    ReferencePositionCount { positions: usize, sequence: usize },

    #[error(transparent)]
    Malformed(#[from] anyhow::Error),
}

impl ReadError {
    /// The construction check that failed, if this is a construction error.
    pub fn invariant(&self) -> Option<&Invariant> {
        match self {
            ReadError::InvalidRead { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl Invariant {
    /// Short label used when tallying failures.
    pub fn kind(&self) -> &'static str {
        match self {
            Invariant::PrimaryNotAligned => "primary-not-aligned",
            Invariant::LengthMismatch { .. } => "length-mismatch",
            Invariant::MappingQualityOutOfRange(_) => "mapping-quality-range",
            Invariant::NegativeStart(_) => "negative-start",
            Invariant::ReferencePositionCount { .. } => "reference-position-count",
            Invariant::Malformed(_) => "malformed",
        }
    }
}
