pub mod cli;
pub mod commands;
pub mod config;
pub mod convert;
pub mod coordinates;
pub mod error;
pub mod md;
pub mod quality;
pub mod read;
pub mod record;
pub mod summary;
pub mod utils;

// Re-export the read model
pub use coordinates::{ReferencePosition, ReferenceSequenceContext};
pub use error::{Invariant, ReadError};
pub use md::{MdTag, MismatchAnnotation, Verdict};
pub use quality::QualityScore;
pub use read::{Read, Residue, Residues};
pub use record::{AlignmentRecord, RawRead};
