use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
/// Errors of which majority are related to I/O issues or incorrect file format errors
pub enum Error {
    #[error(transparent)]
    /// Counting, background model or configuration error
    Oligo(#[from] oligo::Error),
    #[error("Could not read from file {}", .path.display())]
    /// Input sequences cannot be opened
    InputFileError {
        /// Path of the input file
        path: PathBuf,
        /// Underlying reader error
        source: niffler::Error,
    },
    #[error("Could not read sequences from stdin")]
    /// Standard input cannot be read
    StdinError(#[source] niffler::Error),
    #[error("Could not write to file {}", .path.display())]
    /// Output file cannot be created
    OutputFileError {
        /// Path of the output file
        path: PathBuf,
        /// Underlying I/O error
        source: std::io::Error,
    },
    #[error("Could not write results")]
    /// Writing a row failed
    OutputError(#[from] std::io::Error),
    #[error("Could not spawn threads")]
    /// Create thread pools erorr
    ThreadError,
}
