// Output checker for functional test suites

use clap::Parser;
use expecta_harness::{check, logging};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "expecta-check")]
#[command(
    about = "Check that a test suite's output matches the CHECK lines of an expected file",
    long_about = None
)]
struct Cli {
    /// File containing the actual output
    actual: PathBuf,

    /// File containing the expected check lines
    expected: PathBuf,

    /// Prefix marking a check line in the expected file
    #[arg(short = 'p', long, default_value = check::DEFAULT_CHECK_PREFIX)]
    check_prefix: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "warn" };
    logging::init(log_level)?;

    tracing::debug!(
        actual = %cli.actual.display(),
        expected = %cli.expected.display(),
        prefix = %cli.check_prefix,
        "checking output"
    );
    check::compare_files(&cli.actual, &cli.expected, &cli.check_prefix)?;
    Ok(())
}
