use log::LevelFilter;
use std::ffi::OsString;
use std::path::PathBuf;
use structopt::StructOpt;

/// Options historically written with a single dash, e.g. `-noov`
const LEGACY_LONG_OPTIONS: [&str; 6] = ["expfreq", "1str", "2str", "noov", "count", "threads"];

#[derive(Debug, StructOpt)]
#[structopt(
    name = "oligostat",
    about = "Calculates oligomer frequencies in a set of sequences and detects over-represented oligomers"
)]
pub(crate) struct OligoStat {
    #[structopt(
        short = "l",
        long = "length",
        help = "Oligomer length (1 to 14)"
    )]
    pub length: usize,
    #[structopt(
        short = "i",
        long = "input",
        help = "FASTA sequences, optionally gzipped [default: stdin]",
        parse(from_os_str)
    )]
    pub input: Option<PathBuf>,
    #[structopt(
        short = "o",
        long = "output",
        help = "Output file [default: stdout]",
        parse(from_os_str)
    )]
    pub output: Option<PathBuf>,
    #[structopt(
        long = "expfreq",
        help = "Background model as an oligo frequency table (oligo-analysis format) [default: uniform]",
        parse(from_os_str)
    )]
    pub expfreq: Option<PathBuf>,
    #[structopt(
        name = "1str",
        long = "1str",
        help = "Do not add the reverse complement",
        overrides_with = "2str"
    )]
    pub single_strand: bool,
    #[structopt(
        name = "2str",
        long = "2str",
        help = "Add the reverse complement (default)",
        overrides_with = "1str"
    )]
    pub both_strands: bool,
    #[structopt(long = "noov", help = "Do not allow overlapping occurrences")]
    pub no_overlap: bool,
    #[structopt(long = "count", help = "Only report oligomer counts and frequencies")]
    pub count_only: bool,
    #[structopt(
        short = "v",
        long = "verbosity",
        help = "Verbosity level",
        default_value = "0",
        possible_values = &["0", "1", "2"]
    )]
    pub verbosity: u8,
    #[structopt(
        short = "t",
        long = "threads",
        help = "Number of threads used for counting",
        default_value = "1"
    )]
    pub threads: usize,
}

impl OligoStat {
    /// Parses the process arguments, accepting the single-dash long options
    pub(crate) fn from_env() -> Self {
        Self::from_iter(normalize_args(std::env::args_os()))
    }

    /// Strand folding is on unless `-1str` was the last strand option given
    pub(crate) fn fold_strands(&self) -> bool {
        self.both_strands || !self.single_strand
    }

    pub(crate) fn set_logging(&self) {
        let level = match self.verbosity {
            0 => LevelFilter::Warn,
            1 => LevelFilter::Info,
            _ => LevelFilter::Debug,
        };
        env_logger::Builder::new().filter_level(level).init();
    }
}

/// Rewrites `-noov` style options to `--noov`, leaving everything else untouched
pub(crate) fn normalize_args<I: IntoIterator<Item = OsString>>(args: I) -> Vec<OsString> {
    args.into_iter()
        .map(|arg| match arg.to_str() {
            Some(s)
                if s.starts_with('-')
                    && !s.starts_with("--")
                    && LEGACY_LONG_OPTIONS.contains(&&s[1..]) =>
            {
                OsString::from(format!("-{}", s))
            }
            _ => arg,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> OligoStat {
        OligoStat::from_iter(normalize_args(args.iter().map(OsString::from)))
    }

    #[test]
    fn legacy_options() {
        let opt = parse(&["oligostat", "-l", "6", "-noov", "-count", "-expfreq", "bg.freq"]);
        assert_eq!(opt.length, 6);
        assert!(opt.no_overlap);
        assert!(opt.count_only);
        assert_eq!(opt.expfreq, Some(PathBuf::from("bg.freq")));
        assert!(opt.fold_strands());
    }

    #[test]
    fn last_strand_option_wins() {
        assert!(!parse(&["oligostat", "-l", "2", "-1str"]).fold_strands());
        assert!(parse(&["oligostat", "-l", "2", "-1str", "-2str"]).fold_strands());
        assert!(!parse(&["oligostat", "-l", "2", "--2str", "--1str"]).fold_strands());
    }

    #[test]
    fn values_are_not_rewritten() {
        let args = normalize_args(
            ["oligostat", "-i", "-count.fa", "-l", "3"]
                .iter()
                .map(OsString::from),
        );
        assert_eq!(args[2], OsString::from("-count.fa"));
        assert_eq!(args[4], OsString::from("3"));
    }

    #[test]
    fn missing_length() {
        let args = normalize_args(["oligostat", "-noov"].iter().map(OsString::from));
        assert!(OligoStat::from_iter_safe(args).is_err());
    }
}
