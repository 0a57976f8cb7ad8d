//! Occurrence counting over a stream of sequences.
//!
//! A [`Counter`] owns a dense table of `4^k` counts and is mutated while sequences are scanned.
//! Once the stream is exhausted it is frozen into a read-only [`CountTable`], which also knows
//! how many distinct words were observed and therefore how many tests the scorer performs.

use crate::config::CountOptions;
use crate::error::Error;
use crate::kmer::{encode, index_space, is_palindrome, reverse_complement_index};
use crate::Result;
use log::{debug, info};
use rayon::prelude::*;

/// Sequences buffered before a parallel counting round
pub const BATCH_RECORDS: usize = 4_096;
/// Residues buffered before a parallel counting round
pub const BATCH_RESIDUES: usize = 16 * 1024 * 1024;

#[inline]
const fn bit_position(index: usize) -> (usize, u64) {
    (index >> 6, 1 << (index & 0x3f))
}

/// One bit per word index, set when the word is its own reverse complement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Palindromes(Vec<u64>);

impl Palindromes {
    fn new(k: usize) -> Result<Self> {
        let size = index_space(k);
        let mut bitmap = zeroed::<u64>((size + 63) / 64, k)?;
        // odd words have a middle residue that cannot match its complement
        if k % 2 == 0 {
            for index in (0..size).filter(|index| is_palindrome(*index, k)) {
                let (word, mask) = bit_position(index);
                bitmap[word] |= mask;
            }
        }
        Ok(Self(bitmap))
    }

    /// Checks the flag of the word with index `index`
    pub fn contains(&self, index: usize) -> bool {
        let (word, mask) = bit_position(index);
        self.0[word] & mask != 0
    }
}

fn zeroed<T: Clone + Default>(len: usize, k: usize) -> Result<Vec<T>> {
    let mut table = Vec::new();
    table
        .try_reserve_exact(len)
        .map_err(|_| Error::AllocationError(k))?;
    table.resize(len, T::default());
    Ok(table)
}

/// Mutable count table filled while scanning sequences
#[derive(Debug, Clone)]
pub struct Counter {
    options: CountOptions,
    counts: Vec<u64>,
    palindromes: Palindromes,
    position_count: u64,
    skipped_windows: u64,
    sequence_count: u64,
}

impl Counter {
    /// Allocates a zeroed table of `4^k` counts and flags palindromic words
    pub fn new(options: CountOptions) -> Result<Self> {
        let k = options.word_length();
        debug!("Allocating count table for {} words of length {}", index_space(k), k);
        Ok(Self {
            options,
            counts: zeroed(index_space(k), k)?,
            palindromes: Palindromes::new(k)?,
            position_count: 0,
            skipped_windows: 0,
            sequence_count: 0,
        })
    }

    /// Slides a window of length `k` along `seq` and counts every window made only of `ACGT`.
    ///
    /// Windows with any other residue are skipped and never reach `position_count`. With strand
    /// folding, a word that is not its own reverse complement is counted for both strands. With
    /// `no_overlap`, the scan resumes `k` residues after a counted window and one residue after
    /// a skipped one.
    pub fn count_occurrences(&mut self, seq: &[u8]) {
        let k = self.options.word_length();
        let step = if self.options.no_overlap() { k } else { 1 };
        let fold = self.options.fold_strands();
        let mut skipped = 0;
        let mut offset = 0;

        while offset + k <= seq.len() {
            match encode(&seq[offset..offset + k]) {
                Some(index) => {
                    self.counts[index] += 1;
                    self.position_count += 1;
                    if fold && !self.palindromes.contains(index) {
                        let rc_index = reverse_complement_index(index, k);
                        self.counts[rc_index] += 1;
                        self.position_count += 1;
                    }
                    offset += step;
                }
                None => {
                    skipped += 1;
                    offset += 1;
                }
            }
        }

        if skipped > 0 {
            debug!(
                "Skipped {} windows with residues other than A, C, G and T in a sequence of length {}",
                skipped,
                seq.len()
            );
        }
        self.skipped_windows += skipped;
        self.sequence_count += 1;
    }

    /// Adds the counts of another counter built with the same options
    pub fn merge(mut self, other: Counter) -> Counter {
        assert_eq!(self.options, other.options, "cannot merge counters of different runs");
        self.counts
            .iter_mut()
            .zip(other.counts.iter())
            .for_each(|(count, other)| *count += other);
        self.position_count += other.position_count;
        self.skipped_windows += other.skipped_windows;
        self.sequence_count += other.sequence_count;
        self
    }

    /// Freezes the counts and records the number of distinct words observed
    pub fn finish(self) -> CountTable {
        let test_count = self.counts.iter().filter(|count| **count > 0).count() as u64;
        info!(
            "Counted {} positions in {} sequences, {} distinct words, {} windows skipped",
            self.position_count, self.sequence_count, test_count, self.skipped_windows
        );
        CountTable {
            options: self.options,
            counts: self.counts,
            palindromes: self.palindromes,
            position_count: self.position_count,
            test_count,
            skipped_windows: self.skipped_windows,
            sequence_count: self.sequence_count,
        }
    }
}

/// Read-only counts after all sequences were scanned
#[derive(Debug, Clone)]
pub struct CountTable {
    options: CountOptions,
    counts: Vec<u64>,
    palindromes: Palindromes,
    position_count: u64,
    test_count: u64,
    skipped_windows: u64,
    sequence_count: u64,
}

impl CountTable {
    /// Options the table was counted with
    pub fn options(&self) -> CountOptions {
        self.options
    }

    /// Oligomer length `k`
    pub fn word_length(&self) -> usize {
        self.options.word_length()
    }

    /// Number of occurrences of the word with index `index`
    pub fn count(&self, index: usize) -> u64 {
        self.counts[index]
    }

    /// Checks if no position was counted at all
    pub fn is_empty(&self) -> bool {
        self.position_count == 0
    }

    /// Checks if the word with index `index` is its own reverse complement
    pub fn is_palindrome(&self, index: usize) -> bool {
        self.palindromes.contains(index)
    }

    /// Number of counted positions, the number of binomial trials
    pub fn position_count(&self) -> u64 {
        self.position_count
    }

    /// Number of distinct words observed, the number of tests performed
    pub fn test_count(&self) -> u64 {
        self.test_count
    }

    /// Windows skipped because they held a residue other than `ACGT`
    pub fn skipped_windows(&self) -> u64 {
        self.skipped_windows
    }

    /// Number of sequences scanned
    pub fn sequence_count(&self) -> u64 {
        self.sequence_count
    }

    /// `(index, count)` of every observed word, in index order
    pub fn observed(&self) -> impl Iterator<Item = (usize, u64)> + '_ {
        self.counts
            .iter()
            .enumerate()
            .filter(|(_, count)| **count > 0)
            .map(|(index, count)| (index, *count))
    }
}

/// Counts every sequence of the stream.
///
/// With `threads > 1` the stream is read in batches on the calling thread and each batch is
/// spread round-robin over one counter per thread of the current rayon pool; the counters are
/// merged at the end, so the result does not depend on the number of threads.
pub fn count_sequences<I, S, E>(sequences: I, options: CountOptions, threads: usize) -> Result<CountTable>
where
    I: IntoIterator<Item = std::result::Result<S, E>>,
    S: AsRef<[u8]> + Sync,
    E: Into<Error>,
{
    let counter = if threads > 1 {
        count_sharded(sequences, options, threads)?
    } else {
        let mut counter = Counter::new(options)?;
        for seq in sequences {
            counter.count_occurrences(seq.map_err(Into::into)?.as_ref());
        }
        counter
    };
    Ok(counter.finish())
}

fn count_sharded<I, S, E>(sequences: I, options: CountOptions, threads: usize) -> Result<Counter>
where
    I: IntoIterator<Item = std::result::Result<S, E>>,
    S: AsRef<[u8]> + Sync,
    E: Into<Error>,
{
    debug!("Counting with {} shards", threads);
    let mut shards = (0..threads)
        .map(|_| Counter::new(options))
        .collect::<Result<Vec<Counter>>>()?;

    let mut batch = Vec::with_capacity(BATCH_RECORDS);
    let mut batch_residues = 0;

    for seq in sequences {
        let seq = seq.map_err(Into::into)?;
        batch_residues += seq.as_ref().len();
        batch.push(seq);
        if batch.len() >= BATCH_RECORDS || batch_residues >= BATCH_RESIDUES {
            count_batch(&mut shards, &batch);
            batch.clear();
            batch_residues = 0;
        }
    }
    count_batch(&mut shards, &batch);

    let mut shards = shards.into_iter();
    match shards.next() {
        Some(first) => Ok(shards.fold(first, Counter::merge)),
        None => Counter::new(options),
    }
}

fn count_batch<S: AsRef<[u8]> + Sync>(shards: &mut [Counter], batch: &[S]) {
    let nb_shards = shards.len();
    shards.par_iter_mut().enumerate().for_each(|(i, shard)| {
        batch
            .iter()
            .skip(i)
            .step_by(nb_shards)
            .for_each(|seq| shard.count_occurrences(seq.as_ref()))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kmer::decode;

    fn count(seq: &str, k: usize, fold: bool, noov: bool) -> CountTable {
        let options = CountOptions::new(k, fold, noov).unwrap();
        count_sequences(vec![Ok::<_, Error>(seq)], options, 1).unwrap()
    }

    fn count_of(table: &CountTable, word: &str) -> u64 {
        table.count(encode(word.as_bytes()).unwrap())
    }

    #[test]
    fn palindrome_bitmap() {
        let palindromes = Palindromes::new(4).unwrap();
        for index in 0..index_space(4) {
            assert_eq!(palindromes.contains(index), is_palindrome(index, 4));
        }
        assert!(palindromes.contains(encode(b"gatc").unwrap()));
        let odd = Palindromes::new(3).unwrap();
        assert!((0..index_space(3)).all(|index| !odd.contains(index)));
    }

    #[test]
    fn count_conservation() {
        let seq = "GATTACAGGCTTAGCCATAGGCATTACGATCGAT";
        for k in 1..=6 {
            let table = count(seq, k, false, false);
            let total: u64 = table.observed().map(|(_, count)| count).sum();
            assert_eq!(total, (seq.len() - k + 1) as u64);
            assert_eq!(table.position_count(), (seq.len() - k + 1) as u64);
        }
    }

    #[test]
    fn dinucleotides_of_acgtacgt() {
        let table = count("ACGTACGT", 2, false, false);
        assert_eq!(table.position_count(), 7);
        assert_eq!(count_of(&table, "ac"), 2);
        assert_eq!(count_of(&table, "cg"), 2);
        assert_eq!(count_of(&table, "gt"), 2);
        assert_eq!(count_of(&table, "ta"), 1);
        assert_eq!(count_of(&table, "aa"), 0);
        assert_eq!(table.test_count(), 4);
        let observed = table
            .observed()
            .map(|(index, _)| decode(index, 2))
            .collect::<Vec<String>>();
        assert_eq!(observed, vec!["ac", "cg", "gt", "ta"]);
    }

    #[test]
    fn strand_folding_doubles_non_palindromes() {
        let table = count("AAC", 3, true, false);
        assert_eq!(count_of(&table, "aac"), 1);
        assert_eq!(count_of(&table, "gtt"), 1);
        assert_eq!(table.position_count(), 2);
        assert_eq!(table.test_count(), 2);

        let table = count("ACGTACGT", 2, true, false);
        assert_eq!(count_of(&table, "ac"), 4);
        assert_eq!(count_of(&table, "gt"), 4);
        // palindromes are counted once per occurrence
        assert_eq!(count_of(&table, "cg"), 2);
        assert_eq!(count_of(&table, "ta"), 1);
        assert_eq!(table.position_count(), 11);
    }

    #[test]
    fn invalid_residues_are_skipped() {
        let table = count("ACNGT", 2, false, false);
        assert_eq!(count_of(&table, "ac"), 1);
        assert_eq!(count_of(&table, "gt"), 1);
        assert_eq!(table.position_count(), 2);
        assert_eq!(table.skipped_windows(), 2);
        assert_eq!(table.test_count(), 2);
    }

    #[test]
    fn case_is_ignored() {
        let upper = count("GATTACA", 3, true, false);
        let lower = count("gattaca", 3, true, false);
        let mixed = count("GaTtAcA", 3, true, false);
        assert_eq!(upper.counts, lower.counts);
        assert_eq!(upper.counts, mixed.counts);
    }

    #[test]
    fn short_sequences_count_nothing() {
        let table = count("ACG", 4, true, false);
        assert!(table.is_empty());
        assert_eq!(table.test_count(), 0);
        assert_eq!(table.sequence_count(), 1);
    }

    #[test]
    fn no_overlap_jumps_after_hits() {
        let table = count("AAAAAA", 2, false, true);
        assert_eq!(count_of(&table, "aa"), 3);
        assert_eq!(table.position_count(), 3);

        let table = count("AAAAAA", 2, false, false);
        assert_eq!(count_of(&table, "aa"), 5);

        // hit at 0, skip "NA" at 2, hits at 3 and 5
        let table = count("AANAAAA", 2, false, true);
        assert_eq!(count_of(&table, "aa"), 3);
        assert_eq!(table.position_count(), 3);
        assert_eq!(table.skipped_windows(), 1);
    }

    #[test]
    fn no_overlap_with_folding() {
        let table = count("AACAAC", 3, true, true);
        assert_eq!(count_of(&table, "aac"), 2);
        assert_eq!(count_of(&table, "gtt"), 2);
        assert_eq!(table.position_count(), 4);
    }

    #[test]
    fn sharded_counting_matches_sequential() {
        let seqs = vec![
            "GATTACAGGCTTAGCCATAG",
            "GCATTACGATCGATNNNACGT",
            "ttttgggcccaaa",
            "AC",
            "",
            "ACGTACGTACGTNACGT",
            "CCCCGGGGAATT",
        ];
        let options = CountOptions::new(3, true, false).unwrap();
        let sequential = count_sequences(seqs.iter().map(|s| Ok::<_, Error>(*s)), options, 1).unwrap();
        for threads in 2..=4 {
            let sharded =
                count_sequences(seqs.iter().map(|s| Ok::<_, Error>(*s)), options, threads).unwrap();
            assert_eq!(sharded.counts, sequential.counts);
            assert_eq!(sharded.position_count(), sequential.position_count());
            assert_eq!(sharded.test_count(), sequential.test_count());
            assert_eq!(sharded.skipped_windows(), sequential.skipped_windows());
            assert_eq!(sharded.sequence_count(), seqs.len() as u64);
        }
    }

    #[test]
    fn stream_errors_are_propagated() {
        let options = CountOptions::new(2, true, false).unwrap();
        let stream = vec![
            Ok("ACGT"),
            Err(std::io::Error::new(std::io::ErrorKind::InvalidData, "truncated record")),
        ];
        match count_sequences(stream, options, 1) {
            Err(Error::SequenceRecordError(_)) => {}
            other => panic!("Expected a sequence record error, got {:?}", other),
        }
    }
}
