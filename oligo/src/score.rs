//! Binomial over-representation scores of observed words.
//!
//! Every word with a non-zero count is tested against its expected frequency under the
//! background model. The tail probability is corrected for the number of distinct words
//! observed (`occ_E`) and reported on a `-log10` scale (`occ_sig`).

use crate::binomial::ln_upper_tail;
use crate::count::CountTable;
use crate::kmer::{decode, decode_with_identifier};
use crate::markov::Background;
use std::f64::consts::LN_10;

/// Header of the scored table
pub const SCORE_HEADER: &str = "#seq\tid\texp_freq\tocc\texp_occ\tocc_P\tocc_E\tocc_sig";
/// Header of the count-only table
pub const COUNT_HEADER: &str = "#seq\tid\tobserved_freq\tocc";

/// Significant digits of `%G`-style columns
const G_PRECISION: usize = 6;

/// Statistics of one observed word
#[derive(Debug, Clone, PartialEq)]
pub struct WordScore {
    /// Lowercase word
    pub word: String,
    /// Word, or `word|revcomp` when strands are folded
    pub id: String,
    /// Background probability, doubled for folded non-palindromes
    pub probability: f64,
    /// Observed occurrences
    pub occurrences: u64,
    /// Expected occurrences, `position_count * probability`
    pub expected: f64,
    /// Binomial upper-tail probability of observing at least `occurrences`
    pub pvalue: f64,
    /// `pvalue * test_count`
    pub evalue: f64,
    /// `-log10(evalue)`
    pub significance: f64,
}

impl WordScore {
    /// Tab-delimited row matching [`SCORE_HEADER`]
    pub fn to_tsv_row(&self) -> String {
        format!(
            "{}\t{}\t{:.13}\t{}\t{}\t{}\t{}\t{}",
            self.word,
            self.id,
            self.probability,
            self.occurrences,
            format_g(self.expected),
            format_g(self.pvalue),
            format_g(self.evalue),
            format_g(self.significance),
        )
    }
}

/// Observed frequency of one word
#[derive(Debug, Clone, PartialEq)]
pub struct WordCount {
    /// Lowercase word
    pub word: String,
    /// Word, or `word|revcomp` when strands are folded
    pub id: String,
    /// Occurrences per counted position
    pub frequency: f64,
    /// Observed occurrences
    pub occurrences: u64,
}

impl WordCount {
    /// Tab-delimited row matching [`COUNT_HEADER`]
    pub fn to_tsv_row(&self) -> String {
        format!(
            "{}\t{}\t{:.13}\t{}",
            self.word, self.id, self.frequency, self.occurrences
        )
    }
}

/// Word string and identifier of an index as they appear in the output
fn word_and_id(table: &CountTable, index: usize) -> (String, String) {
    let k = table.word_length();
    if table.options().fold_strands() && !table.is_palindrome(index) {
        let (word, revcomp) = decode_with_identifier(index, k);
        let id = format!("{}|{}", word, revcomp);
        (word, id)
    } else {
        let word = decode(index, k);
        (word.clone(), word)
    }
}

/// Tests every observed word of a count table against a background model
#[derive(Debug)]
pub struct Scorer<'a, B: Background> {
    table: &'a CountTable,
    background: &'a B,
}

impl<'a, B: Background> Scorer<'a, B> {
    /// Creates a scorer over a frozen count table
    pub fn new(table: &'a CountTable, background: &'a B) -> Self {
        Self { table, background }
    }

    /// Scores the word with index `index`, `None` when it was never observed
    pub fn score(&self, index: usize) -> Option<WordScore> {
        let occurrences = self.table.count(index);
        if occurrences == 0 {
            return None;
        }
        let (word, id) = word_and_id(self.table, index);

        let mut probability = self.background.word_probability(word.as_bytes());
        if self.table.options().fold_strands() && !self.table.is_palindrome(index) {
            probability *= 2.0;
        }
        let probability = probability.min(1.0);

        let trials = self.table.position_count();
        let expected = trials as f64 * probability;

        let ln_pvalue = ln_upper_tail(occurrences, trials, probability);
        let ln_evalue = ln_pvalue + (self.table.test_count() as f64).ln();
        let pvalue = ln_pvalue.exp();
        let evalue = pvalue * self.table.test_count() as f64;
        // from the log so the scale stays finite after the e-value underflows
        let significance = -ln_evalue / LN_10;

        debug_assert!((0.0..=1.0).contains(&pvalue), "p-value {} of {}", pvalue, word);
        debug_assert!(!significance.is_nan(), "significance of {} is NaN", word);

        Some(WordScore {
            word,
            id,
            probability,
            occurrences,
            expected,
            pvalue,
            evalue,
            significance,
        })
    }

    /// Scores of all observed words in index order
    pub fn scores(&self) -> impl Iterator<Item = WordScore> + '_ {
        self.table
            .observed()
            .filter_map(move |(index, _)| self.score(index))
    }
}

/// Observed frequencies of all observed words in index order
pub fn word_counts(table: &CountTable) -> impl Iterator<Item = WordCount> + '_ {
    let positions = table.position_count() as f64;
    table.observed().map(move |(index, occurrences)| {
        let (word, id) = word_and_id(table, index);
        WordCount {
            word,
            id,
            frequency: occurrences as f64 / positions,
            occurrences,
        }
    })
}

/// Formats a float like C's `%G`: six significant digits, trailing zeros removed, and
/// scientific notation for exponents below -4 or from 6 up.
pub fn format_g(value: f64) -> String {
    if value.is_nan() {
        return "NAN".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "INF" } else { "-INF" }.to_string();
    }
    if value == 0.0 {
        return if value.is_sign_negative() { "-0" } else { "0" }.to_string();
    }

    let scientific = format!("{:.*E}", G_PRECISION - 1, value);
    let (mantissa, exponent) = match scientific.split_once('E') {
        Some((mantissa, exponent)) => (mantissa, exponent.parse::<i32>().unwrap_or(0)),
        None => (scientific.as_str(), 0),
    };

    if exponent < -4 || exponent >= G_PRECISION as i32 {
        format!(
            "{}E{}{:02}",
            trim_fraction(mantissa),
            if exponent < 0 { '-' } else { '+' },
            exponent.abs()
        )
    } else {
        let decimals = (G_PRECISION as i32 - 1 - exponent).max(0) as usize;
        trim_fraction(&format!("{:.*}", decimals, value)).to_string()
    }
}

fn trim_fraction(number: &str) -> &str {
    if number.contains('.') {
        number.trim_end_matches('0').trim_end_matches('.')
    } else {
        number
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binomial::upper_tail;
    use crate::config::CountOptions;
    use crate::count::count_sequences;
    use crate::error::Error;
    use crate::kmer::encode;
    use crate::markov::Markov;

    fn table(seq: &str, k: usize, fold: bool) -> CountTable {
        let options = CountOptions::new(k, fold, false).unwrap();
        count_sequences(vec![Ok::<_, Error>(seq)], options, 1).unwrap()
    }

    /// Background in which nothing but `a` can happen
    struct OnlyA;

    impl Background for OnlyA {
        fn probability(&self, seq: &[u8], offset: usize, length: usize) -> f64 {
            if seq[offset..offset + length].iter().all(|nuc| *nuc == b'a') {
                1.0
            } else {
                0.0
            }
        }
    }

    #[test]
    fn acgtacgt_single_strand() {
        let table = table("ACGTACGT", 2, false);
        let model = Markov::uniform();
        let scorer = Scorer::new(&table, &model);

        let scores = scorer.scores().collect::<Vec<WordScore>>();
        assert_eq!(
            scores.iter().map(|s| s.word.as_str()).collect::<Vec<&str>>(),
            vec!["ac", "cg", "gt", "ta"]
        );

        let ac = &scores[0];
        assert_eq!(ac.id, "ac");
        assert_eq!(ac.occurrences, 2);
        assert!((ac.probability - 0.0625).abs() < 1e-12);
        assert!((ac.expected - 0.4375).abs() < 1e-12);
        assert!((ac.pvalue - upper_tail(2, 7, 0.0625)).abs() < 1e-12);
        assert_eq!(ac.evalue, ac.pvalue * 4.0);
        assert!((ac.significance + ac.evalue.log10()).abs() < 1e-9);
        assert_eq!(scorer.score(encode(b"aa").unwrap()), None);
    }

    #[test]
    fn folded_probability_is_doubled_for_non_palindromes() {
        let table = table("ACGTACGT", 2, true);
        let model = Markov::uniform();
        let scorer = Scorer::new(&table, &model);

        let ac = scorer.score(encode(b"ac").unwrap()).unwrap();
        assert_eq!(ac.id, "ac|gt");
        assert_eq!(ac.occurrences, 4);
        assert!((ac.probability - 0.125).abs() < 1e-12);
        assert!((ac.expected - 11.0 * 0.125).abs() < 1e-12);

        let cg = scorer.score(encode(b"cg").unwrap()).unwrap();
        assert_eq!(cg.id, "cg");
        assert!((cg.probability - 0.0625).abs() < 1e-12);
    }

    #[test]
    fn impossible_words_are_maximally_significant() {
        let table = table("AAAC", 2, false);
        let scorer = Scorer::new(&table, &OnlyA);

        let ac = scorer.score(encode(b"ac").unwrap()).unwrap();
        assert_eq!(ac.expected, 0.0);
        assert_eq!(ac.pvalue, 0.0);
        assert_eq!(ac.evalue, 0.0);
        assert_eq!(ac.significance, f64::INFINITY);
        assert!(ac.to_tsv_row().ends_with("\t0\t0\t0\tINF"));

        let aa = scorer.score(encode(b"aa").unwrap()).unwrap();
        assert_eq!(aa.pvalue, 1.0);
    }

    #[test]
    fn count_rows() {
        let table = table("ACGTACGT", 2, false);
        let rows = word_counts(&table)
            .map(|row| row.to_tsv_row())
            .collect::<Vec<String>>();
        assert_eq!(
            rows,
            vec![
                "ac\tac\t0.2857142857143\t2",
                "cg\tcg\t0.2857142857143\t2",
                "gt\tgt\t0.2857142857143\t2",
                "ta\tta\t0.1428571428571\t1",
            ]
        );
    }

    #[test]
    fn score_row_layout() {
        let table = table("ACGTACGT", 2, false);
        let model = Markov::uniform();
        let row = Scorer::new(&table, &model)
            .score(encode(b"ta").unwrap())
            .unwrap()
            .to_tsv_row();
        let columns = row.split('\t').collect::<Vec<&str>>();
        assert_eq!(columns.len(), SCORE_HEADER.split('\t').count());
        assert_eq!(&columns[..5], &["ta", "ta", "0.0625000000000", "1", "0.4375"]);
    }

    #[test]
    fn g_formatting() {
        assert_eq!(format_g(0.4375), "0.4375");
        assert_eq!(format_g(100.0), "100");
        assert_eq!(format_g(0.0001), "0.0001");
        assert_eq!(format_g(0.00001), "1E-05");
        assert_eq!(format_g(1234567.0), "1.23457E+06");
        assert_eq!(format_g(-2.5e-12), "-2.5E-12");
        assert_eq!(format_g(999999.7), "1E+06");
        assert_eq!(format_g(0.0), "0");
        assert_eq!(format_g(f64::INFINITY), "INF");
        assert_eq!(format_g(f64::NEG_INFINITY), "-INF");
    }
}
