use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::process;

use plagcheck_core::pipeline::{self, FilePair};
use plagcheck_core::{BatchReport, CompareConfig, Error, MissingFilePolicy, OutputFormat, Result};
use tracing_subscriber::EnvFilter;

/// plagcheck: checks Python code for plagiarism
///
/// Scores every file pair listed in INPUT and writes one similarity score
/// per pair to OUTPUT. Lower is more similar; 0.0 means the files are
/// identical after normalization.
#[derive(Parser)]
#[command(name = "plagcheck", version, about, long_about = None)]
#[command(subcommand_negates_reqs = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// File with pairs of filenames required for check
    #[arg(value_name = "INPUT", required = true)]
    input: Option<PathBuf>,

    /// Output file for similarity score for each pair
    #[arg(value_name = "OUTPUT", required = true)]
    output: Option<PathBuf>,

    #[command(flatten)]
    options: CompareArgs,

    /// More log output (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Only report errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,
}

#[derive(Args)]
struct CompareArgs {
    /// JSON config file; flags below override its values
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Skip pairs whose files cannot be read instead of failing
    #[arg(long)]
    skip_missing: bool,

    /// Worker threads (0 = all cores)
    #[arg(short, long, value_name = "N")]
    jobs: Option<usize>,

    /// Output line format
    #[arg(long, value_enum)]
    format: Option<FormatArg>,

    /// Fixed number of fractional digits in scores
    #[arg(long, value_name = "N")]
    precision: Option<usize>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the canonical form a file is scored on
    Canonical {
        /// Path to .py file
        file: PathBuf,
    },

    /// Score a single pair of files
    Score {
        /// First .py file
        file_a: PathBuf,
        /// Second .py file
        file_b: PathBuf,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum FormatArg {
    Text,
    Jsonl,
}

impl From<FormatArg> for OutputFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Text => OutputFormat::Text,
            FormatArg::Jsonl => OutputFormat::Jsonl,
        }
    }
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    let exit_code = match run(cli) {
        Ok(()) => 0,
        Err(err) => {
            eprintln!("{} {}", "error:".red().bold(), err);
            2
        }
    };

    process::exit(exit_code);
}

fn init_logging(verbose: u8, quiet: bool) {
    let stderr_is_terminal = std::io::stderr().is_terminal();
    if !stderr_is_terminal {
        colored::control::set_override(false);
    }

    let level = match (quiet, verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "info",
        (false, _) => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_ansi(stderr_is_terminal)
        .without_time()
        .init();
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Some(Commands::Canonical { file }) => {
            let source = read_file(&file)?;
            print!("{}", plagcheck_core::canonicalize(&source)?);
            Ok(())
        }
        Some(Commands::Score { file_a, file_b }) => {
            let config = build_config(&cli.options)?;
            let scored = pipeline::score_pair(&FilePair {
                line: 1,
                left: file_a,
                right: file_b,
            })?;
            println!("{}", config.format_score(scored.score));
            Ok(())
        }
        None => {
            let (Some(input), Some(output)) = (cli.input, cli.output) else {
                return Err(Error::ConfigError("INPUT and OUTPUT are required".to_string()));
            };
            let config = build_config(&cli.options)?;
            let report = pipeline::run(&input, &output, &config)?;
            if !cli.quiet {
                print_summary(&report, &output);
            }
            Ok(())
        }
    }
}

fn build_config(args: &CompareArgs) -> Result<CompareConfig> {
    let mut config = match &args.config {
        Some(path) => CompareConfig::load(path)?,
        None => CompareConfig::default(),
    };
    if args.skip_missing {
        config.missing_files = MissingFilePolicy::Skip;
    }
    if let Some(jobs) = args.jobs {
        config.jobs = jobs;
    }
    if let Some(format) = args.format {
        config.format = format.into();
    }
    if args.precision.is_some() {
        config.precision = args.precision;
    }
    config.validate()?;
    tracing::debug!(?config, "effective configuration");
    Ok(config)
}

fn read_file(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|source| Error::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn print_summary(report: &BatchReport, output: &Path) {
    let skipped = report.skipped_lines.len() + report.skipped_pairs.len();
    let mut line = format!(
        "{} {} pair(s) scored → {}",
        "done:".green().bold(),
        report.scored,
        output.display()
    );
    if skipped > 0 {
        line.push_str(&format!(", {}", format!("{} skipped", skipped).yellow()));
    }
    if report.raw_fallbacks > 0 {
        line.push_str(&format!(
            ", {} file(s) compared as raw text",
            report.raw_fallbacks
        ));
    }
    eprintln!("{}", line);
}
