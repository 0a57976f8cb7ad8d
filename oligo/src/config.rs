//! Run configuration shared by counting and scoring

use crate::error::Error;
use crate::{Result, MAX_WORD_LENGTH};

/// Settings shared by the counter and the scorer for one run.
///
/// Built once from the command line and passed by value; nothing in the crate keeps
/// process-wide option state.
///
/// ```rust
/// use oligo::config::CountOptions;
///
/// let options = CountOptions::new(6, true, false).unwrap();
/// assert_eq!(options.word_length(), 6);
/// assert!(CountOptions::new(15, true, false).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CountOptions {
    word_length: usize,
    fold_strands: bool,
    no_overlap: bool,
}

impl CountOptions {
    /// Validates the oligomer length and bundles the strand and overlap flags
    pub fn new(word_length: usize, fold_strands: bool, no_overlap: bool) -> Result<Self> {
        if word_length == 0 || word_length > MAX_WORD_LENGTH {
            return Err(Error::InvalidWordLength(word_length));
        }
        Ok(Self {
            word_length,
            fold_strands,
            no_overlap,
        })
    }

    /// Oligomer length `k`
    pub fn word_length(&self) -> usize {
        self.word_length
    }

    /// Whether each occurrence also counts for the reverse complement
    pub fn fold_strands(&self) -> bool {
        self.fold_strands
    }

    /// Whether the scan jumps `k` positions after a counted occurrence
    pub fn no_overlap(&self) -> bool {
        self.no_overlap
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn word_length_bounds() {
        assert!(CountOptions::new(1, false, false).is_ok());
        assert!(CountOptions::new(MAX_WORD_LENGTH, false, false).is_ok());
        match CountOptions::new(0, true, false) {
            Err(Error::InvalidWordLength(0)) => {}
            other => panic!("Expected InvalidWordLength, got {:?}", other),
        }
        match CountOptions::new(15, true, false) {
            Err(e) => assert!(e.to_string().contains("15")),
            Ok(_) => panic!("Length 15 should be rejected"),
        }
    }

    #[test]
    fn flags_are_kept() {
        let options = CountOptions::new(3, false, true).unwrap();
        assert!(!options.fold_strands());
        assert!(options.no_overlap());
    }
}
