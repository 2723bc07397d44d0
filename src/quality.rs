use bio::stats::{PHREDProb, Prob};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A Phred-scaled quality score, used both for base qualities and for
/// mapping quality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct QualityScore(u8);

impl QualityScore {
    pub const fn new(phred: u8) -> Self {
        Self(phred)
    }

    pub const fn value(self) -> u8 {
        self.0
    }

    /// Probability that the call this score belongs to is wrong.
    pub fn error_probability(self) -> f64 {
        *Prob::from(PHREDProb(f64::from(self.0)))
    }

    /// The score as a FASTQ/SAM quality character (Phred+33).
    pub fn to_ascii(self) -> char {
        char::from(self.0.saturating_add(33))
    }
}

impl From<u8> for QualityScore {
    fn from(phred: u8) -> Self {
        Self(phred)
    }
}

impl fmt::Display for QualityScore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Q{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_probability() {
        assert!((QualityScore::new(10).error_probability() - 0.1).abs() < 1e-9);
        assert!((QualityScore::new(30).error_probability() - 0.001).abs() < 1e-9);
        assert!((QualityScore::new(0).error_probability() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_ascii_and_display() {
        assert_eq!(QualityScore::new(40).to_ascii(), 'I');
        assert_eq!(QualityScore::new(0).to_ascii(), '!');
        assert_eq!(QualityScore::new(20).to_string(), "Q20");
    }
}
