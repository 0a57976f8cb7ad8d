#![warn(missing_debug_implementations, rust_2018_idioms, missing_docs)]

//! Oligomer frequency analysis: counts all words of a given length in a set of sequences and
//! scores their over-representation against a Markov background model.
mod cli;
mod error;

use crate::error::Error;
use log::{debug, error, info, warn};
use oligo::config::CountOptions;
use oligo::count::{count_sequences, CountTable};
use oligo::markov::Markov;
use oligo::score::{word_counts, Scorer, COUNT_HEADER, SCORE_HEADER};
use std::io::{BufReader, BufWriter, Cursor, Read, Write};
use std::path::Path;

type Result<T> = std::result::Result<T, Error>;

/// Relative tolerance when checking that a loaded model treats both strands alike
const STRAND_SYMMETRY_TOLERANCE: f64 = 1e-6;
/// Bytes niffler reads to recognise a compression format
const MAGIC_LENGTH: usize = 5;

fn main() {
    let opt = cli::OligoStat::from_env();
    opt.set_logging();

    if let Err(e) = run(&opt) {
        error!("{}", e);
        let mut source = std::error::Error::source(&e);
        while let Some(cause) = source {
            error!("Caused by: {}", cause);
            source = std::error::Error::source(cause);
        }
        std::process::exit(1);
    }
}

fn run(opt: &cli::OligoStat) -> Result<()> {
    let options = CountOptions::new(opt.length, opt.fold_strands(), opt.no_overlap)?;
    debug!("Running with {:?}", options);

    if opt.threads > 1 {
        rayon::ThreadPoolBuilder::new()
            .num_threads(opt.threads)
            .build_global()
            .map_err(|_| Error::ThreadError)?;
    }

    let background = match opt.expfreq {
        Some(ref path) => {
            let model = Markov::from_path(path)?;
            if options.fold_strands() && !model.is_strand_symmetric(STRAND_SYMMETRY_TOLERANCE) {
                warn!(
                    "Background model {} differs between strands, expected frequencies of folded words assume it does not",
                    path.display()
                );
            }
            model
        }
        None => {
            info!("Using a uniform background model");
            Markov::uniform()
        }
    };

    let input_error = |path: &Path, source| Error::InputFileError {
        path: path.to_path_buf(),
        source,
    };
    let input = match opt.input {
        Some(ref path) => {
            let path = path.as_path();
            let file = std::fs::File::open(path)
                .map_err(|e| input_error(path, niffler::Error::from(e)))?;
            Some((file, path))
        }
        None => None,
    };

    let out: Box<dyn Write> = match opt.output {
        Some(ref path) => Box::new(std::fs::File::create(path).map_err(|source| {
            Error::OutputFileError {
                path: path.to_path_buf(),
                source,
            }
        })?),
        None => Box::new(std::io::stdout()),
    };
    let mut out = BufWriter::new(out);

    // nothing is read before the output is known to be writable
    let rdr = match input {
        Some((file, path)) => open_sequences(Box::new(BufReader::new(file)))
            .map_err(|source| input_error(path, source))?,
        None => open_sequences(Box::new(std::io::stdin())).map_err(Error::StdinError)?,
    };
    let records = bio::io::fasta::Reader::new(rdr)
        .records()
        .map(|record| record.map(|record| record.seq().to_vec()));
    let table = count_sequences(records, options, opt.threads)?;

    if opt.count_only {
        write_counts(&mut out, &table)?;
    } else {
        write_scores(&mut out, &table, &background)?;
    }
    out.flush()?;
    Ok(())
}

/// Decompresses the stream when needed. Streams too short to carry a compression magic number
/// (an empty input among them) are passed on as plain text.
fn open_sequences(mut rdr: Box<dyn Read>) -> std::result::Result<Box<dyn Read>, niffler::Error> {
    let mut head = Vec::with_capacity(MAGIC_LENGTH);
    rdr.by_ref().take(MAGIC_LENGTH as u64).read_to_end(&mut head)?;
    if head.len() < MAGIC_LENGTH {
        debug!("Input of {} bytes read as plain text", head.len());
        return Ok(Box::new(Cursor::new(head)));
    }
    let (rdr, format) = niffler::get_reader(Box::new(Cursor::new(head).chain(rdr)))?;
    debug!("Input compression is {:?}", format);
    Ok(rdr)
}

fn write_counts<W: Write>(out: &mut W, table: &CountTable) -> Result<()> {
    writeln!(out, "{}", COUNT_HEADER)?;
    for row in word_counts(table) {
        writeln!(out, "{}", row.to_tsv_row())?;
    }
    Ok(())
}

fn write_scores<W: Write>(out: &mut W, table: &CountTable, background: &Markov) -> Result<()> {
    writeln!(out, "{}", SCORE_HEADER)?;
    let scorer = Scorer::new(table, background);
    for row in scorer.scores() {
        writeln!(out, "{}", row.to_tsv_row())?;
    }
    info!(
        "Scored {} words against {} positions",
        table.test_count(),
        table.position_count()
    );
    Ok(())
}
