//! Error type of the library

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
/// Errors raised while configuring a run, reading sequences or loading a background model
pub enum Error {
    #[error("Could not read sequence record")]
    /// Could not read an entry of the sequence stream
    SequenceRecordError(#[from] std::io::Error),
    #[error("Oligomer length must be between 1 and {} but got {0}", crate::MAX_WORD_LENGTH)]
    /// Oligomer length outside the indexable range
    InvalidWordLength(usize),
    #[error("Only A, C, G and T nucleotides are allowed but got {0}")]
    /// Incorrect nucleotide supplied
    IncorrectNuc(String),
    #[error("Could not open background file {}", .path.display())]
    /// Background frequency file missing or unreadable
    BackgroundFileError {
        /// Path of the background file
        path: PathBuf,
        /// Underlying reader error
        source: niffler::Error,
    },
    #[error("Could not read background file {} at line {line}", .path.display())]
    /// Background frequency file cannot be read past some line, e.g. it is not text
    BackgroundReadError {
        /// Path of the background file
        path: PathBuf,
        /// 1-based number of the line that failed
        line: usize,
        /// Underlying I/O error
        source: std::io::Error,
    },
    #[error("Malformed background file {} at line {line}: {reason}", .path.display())]
    /// Background frequency file has an entry that cannot be used
    MalformedBackground {
        /// Path of the background file
        path: PathBuf,
        /// 1-based line number, 0 when the problem concerns the whole file
        line: usize,
        /// What is wrong with the entry
        reason: String,
    },
    #[error("Could not allocate count table for oligomers of length {0}")]
    /// Count table of 4^k entries does not fit in memory
    AllocationError(usize),
}
