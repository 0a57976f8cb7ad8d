#![warn(missing_debug_implementations, rust_2018_idioms, missing_docs)]

//! Crate for detecting over-represented oligomers in a set of nucleotide sequences.
//! Every word of a fixed length `k` is counted, optionally folding both strands together,
//! and its count is compared with the number expected under a Markov background model
//! using the exact binomial tail probability, corrected for the number of words tested.
//!
//! ```rust
//! use oligo::{config::CountOptions, count::count_sequences, markov::Markov, score::Scorer};
//!
//! let options = CountOptions::new(2, false, false).unwrap();
//! let table = count_sequences(vec![Ok::<_, oligo::Error>("ACGTACGT")], options, 1).unwrap();
//! let model = Markov::uniform();
//! let scores = Scorer::new(&table, &model).scores().collect::<Vec<_>>();
//! assert_eq!(scores.len(), 4);
//! assert_eq!(scores[0].word, "ac");
//! ```

pub mod binomial;
pub mod config;
pub mod count;
pub mod error;
pub mod kmer;
pub mod markov;
pub mod score;

pub use error::Error;

/// Longest oligomer that can be indexed, `4^14` words already take gigabytes of counts
pub const MAX_WORD_LENGTH: usize = 14;
/// Nucleotide alphabet in radix order
pub const NUCLEOTIDES: [u8; 4] = [b'a', b'c', b'g', b't'];

/// Result alias of the crate
pub type Result<T> = std::result::Result<T, Error>;
