//! Markov background models for expected oligomer frequencies.
//!
//! A model of order `m` stores the marginal probability of every `m`-residue prefix and the
//! transition probability of every residue given the `m` residues before it. The probability of
//! a longer word is the prefix probability times the chain of transitions.

use crate::error::Error;
use crate::kmer::{encode, index_space, nuc_to_digit, reverse_complement_index};
use crate::{Result, MAX_WORD_LENGTH};
use log::{debug, info};
use std::io::BufRead;
use std::path::Path;

/// Initial mass of every prefix and transition cell before frequencies are added
pub const PSEUDO_FREQUENCY: f64 = 1e-100;

/// Anything able to tell how likely a stretch of sequence is under the null model
pub trait Background {
    /// Probability of the `length` residues of `seq` starting at `offset`
    fn probability(&self, seq: &[u8], offset: usize, length: usize) -> f64;

    /// Probability of a whole word
    fn word_probability(&self, word: &[u8]) -> f64 {
        self.probability(word, 0, word.len())
    }
}

/// Order-`m` Markov chain over `ACGT`
#[derive(Debug, Clone, PartialEq)]
pub struct Markov {
    order: usize,
    /// marginal probability of each prefix of length `order`, indexed like words
    prefix: Vec<f64>,
    /// `4 * prefix index + residue` -> P(residue | prefix)
    transition: Vec<f64>,
}

impl Markov {
    fn with_pseudo_frequencies(order: usize) -> Self {
        let size = index_space(order);
        Self {
            order,
            prefix: vec![PSEUDO_FREQUENCY; size],
            transition: vec![PSEUDO_FREQUENCY; size * 4],
        }
    }

    /// Order-0 model in which every residue has probability 1/4
    pub fn uniform() -> Self {
        Self {
            order: 0,
            prefix: vec![1.0],
            transition: vec![0.25; 4],
        }
    }

    /// Reads an oligo frequency table, optionally compressed, from `path`
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!("Loading background model from {}", path.display());
        let (rdr, format) = niffler::from_path(path).map_err(|source| Error::BackgroundFileError {
            path: path.to_path_buf(),
            source,
        })?;
        debug!("Background file compression is {:?}", format);
        Self::from_reader(std::io::BufReader::new(rdr), path)
    }

    /// Reads an oligo frequency table; `path` is only used to label errors.
    ///
    /// Each data line holds a word followed by its frequency, either as `word freq` or in the
    /// oligo-analysis layout `word id freq ...`. Lines starting with `;` or `#` are comments.
    /// The model order is the word length minus one.
    pub fn from_reader<R: BufRead, P: AsRef<Path>>(rdr: R, path: P) -> Result<Self> {
        let path = path.as_ref();
        let malformed = |line: usize, reason: String| Error::MalformedBackground {
            path: path.to_path_buf(),
            line,
            reason,
        };

        let mut model: Option<Markov> = None;
        let mut entries = 0;

        for (i, line) in rdr.lines().enumerate() {
            let line_nb = i + 1;
            let line = line.map_err(|source| Error::BackgroundReadError {
                path: path.to_path_buf(),
                line: line_nb,
                source,
            })?;
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with(';') || trimmed.starts_with('#') {
                continue;
            }

            let (word, freq) = parse_entry(trimmed).map_err(|reason| malformed(line_nb, reason))?;
            let word = word.as_bytes();

            if model.is_none() && word.len() > MAX_WORD_LENGTH {
                return Err(malformed(
                    line_nb,
                    format!("word length {} is not supported", word.len()),
                ));
            }
            let markov = model.get_or_insert_with(|| Self::with_pseudo_frequencies(word.len() - 1));

            if word.len() != markov.order + 1 {
                return Err(malformed(
                    line_nb,
                    format!(
                        "word '{}' does not have the expected length {}",
                        String::from_utf8_lossy(word),
                        markov.order + 1
                    ),
                ));
            }

            let (prefix, last) = word.split_at(markov.order);
            let (prefix_idx, residue) = match (encode(prefix), nuc_to_digit(last[0])) {
                (Some(prefix_idx), Some(residue)) => (prefix_idx, residue),
                _ => {
                    return Err(malformed(
                        line_nb,
                        Error::IncorrectNuc(String::from_utf8_lossy(word).into_owned()).to_string(),
                    ))
                }
            };

            markov.prefix[prefix_idx] += freq;
            markov.transition[4 * prefix_idx + residue] = freq;
            entries += 1;
        }

        let mut model = model.ok_or_else(|| malformed(0, "no frequency entries".to_string()))?;
        model.normalize();
        info!(
            "Loaded order {} background model from {} entries",
            model.order, entries
        );
        Ok(model)
    }

    fn normalize(&mut self) {
        let total: f64 = self.prefix.iter().sum();
        self.prefix.iter_mut().for_each(|p| *p /= total);

        for row in self.transition.chunks_mut(4) {
            let total: f64 = row.iter().sum();
            row.iter_mut().for_each(|p| *p /= total);
        }
    }

    /// Markov order, the number of preceding residues a transition is conditioned on
    pub fn order(&self) -> usize {
        self.order
    }

    /// Marginal probability of the prefix with index `prefix_idx`
    pub fn prefix_probability(&self, prefix_idx: usize) -> f64 {
        self.prefix[prefix_idx]
    }

    /// Probability of `residue` (radix digit) following the prefix with index `prefix_idx`
    pub fn transition_probability(&self, prefix_idx: usize, residue: usize) -> f64 {
        self.transition[4 * prefix_idx + residue]
    }

    /// Marginal probability of a word shorter than the order, summed over all completions
    fn partial_prefix_probability(&self, word_idx: usize, length: usize) -> f64 {
        let completions = index_space(self.order - length);
        let start = word_idx * completions;
        self.prefix[start..start + completions].iter().sum()
    }

    /// Checks if every `order + 1` word is as likely as its reverse complement
    pub fn is_strand_symmetric(&self, tolerance: f64) -> bool {
        let k = self.order + 1;
        (0..index_space(k)).all(|idx| {
            let rc_idx = reverse_complement_index(idx, k);
            let p = self.prefix[idx >> 2] * self.transition[idx];
            let p_rc = self.prefix[rc_idx >> 2] * self.transition[rc_idx];
            (p - p_rc).abs() <= tolerance * p.max(p_rc)
        })
    }
}

impl Background for Markov {
    fn probability(&self, seq: &[u8], offset: usize, length: usize) -> f64 {
        let word = &seq[offset..offset + length];
        let head = self.order.min(length);

        let mut p = match encode(&word[..head]) {
            Some(idx) if head == self.order => self.prefix[idx],
            Some(idx) => self.partial_prefix_probability(idx, head),
            None => return 0.0,
        };

        for i in self.order..length {
            let residue = match nuc_to_digit(word[i]) {
                Some(residue) => residue,
                None => return 0.0,
            };
            // the window of preceding residues is valid, it was checked as prefix or residue
            let prefix_idx = encode(&word[i - self.order..i]).unwrap_or(0);
            p *= self.transition[4 * prefix_idx + residue];
        }
        p
    }
}

fn parse_entry(line: &str) -> std::result::Result<(String, f64), String> {
    let columns = line.split_whitespace().collect::<Vec<&str>>();
    let word = columns[0].to_ascii_lowercase();

    let freq = match columns.len() {
        1 => return Err(format!("no frequency for word '{}'", word)),
        2 => columns[1].parse::<f64>(),
        _ => columns[1].parse::<f64>().or_else(|_| columns[2].parse::<f64>()),
    }
    .map_err(|_| format!("could not read a frequency for word '{}'", word))?;

    if !freq.is_finite() || freq < 0.0 {
        return Err(format!("frequency {} of word '{}' is not valid", freq, word));
    }
    Ok((word, freq))
}
