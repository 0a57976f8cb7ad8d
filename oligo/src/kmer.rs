//! Radix-4 indexing of oligomers.
//!
//! A word of length `k` is read as a base-4 numeral, most significant residue first, with
//! `a = 0`, `c = 1`, `g = 2` and `t = 3`. Complementing a residue is then `3 - digit`, so the
//! reverse complement of an index can be computed without going through a string.

use crate::{MAX_WORD_LENGTH, NUCLEOTIDES};
use bio::alphabets::dna;

/// Number of distinct words of length `k`, i.e. `4^k`
pub fn index_space(k: usize) -> usize {
    1 << (2 * k)
}

/// Radix digit of a residue, `None` for anything outside `ACGT` (case-insensitive)
#[inline]
pub fn nuc_to_digit(nuc: u8) -> Option<usize> {
    match nuc {
        b'A' | b'a' => Some(0),
        b'C' | b'c' => Some(1),
        b'G' | b'g' => Some(2),
        b'T' | b't' => Some(3),
        _ => None,
    }
}

/// Index of `word`, or `None` when it contains a residue that cannot be indexed
pub fn encode(word: &[u8]) -> Option<usize> {
    word.iter()
        .try_fold(0usize, |index, nuc| Some((index << 2) | nuc_to_digit(*nuc)?))
}

/// Lowercase word of length `k` with the given index
pub fn decode(index: usize, k: usize) -> String {
    check_index(index, k);
    (0..k)
        .rev()
        .map(|pos| NUCLEOTIDES[(index >> (2 * pos)) & 0b11] as char)
        .collect()
}

/// Decodes the word and its reverse complement
pub fn decode_with_identifier(index: usize, k: usize) -> (String, String) {
    let word = decode(index, k);
    let revcomp = dna::revcomp(word.as_bytes())
        .into_iter()
        .map(char::from)
        .collect();
    (word, revcomp)
}

/// Index of the reverse complement of the word with index `index`
pub fn reverse_complement_index(index: usize, k: usize) -> usize {
    check_index(index, k);
    let mut index = index;
    let mut rc_index = 0;
    for _ in 0..k {
        rc_index = (rc_index << 2) | (3 - (index & 0b11));
        index >>= 2;
    }
    rc_index
}

/// Checks if a word equals its own reverse complement
pub fn is_palindrome(index: usize, k: usize) -> bool {
    index == reverse_complement_index(index, k)
}

fn check_index(index: usize, k: usize) {
    assert!(
        k >= 1 && k <= MAX_WORD_LENGTH,
        "oligomer length {} outside 1..={}",
        k,
        MAX_WORD_LENGTH
    );
    assert!(
        index < index_space(k),
        "index {} outside the {}-mer index space",
        index,
        k
    );
}
