//! Output checking for functional tests
//!
//! A functional test prints its results, and the expected file carries the
//! patterns the output must satisfy. Every expected line starting with the
//! check prefix is a regular expression matched against the start of the
//! next actual output line. Lines without the prefix are ignored.
//!
//! ```text
//! // CHECK: Test Case 'returnFalse' started at \d+
//! // CHECK: .*error: Asynchronous wait failed - Exceeded timeout of 0\.1 seconds.*
//! ```

use crate::error::{HarnessError, Result};
use regex::Regex;
use std::path::Path;

/// Default prefix marking a check line in an expected file
pub const DEFAULT_CHECK_PREFIX: &str = "// CHECK: ";

/// A mismatch between actual output and expected check lines
#[derive(Debug, thiserror::Error)]
pub enum CheckError {
    /// An actual line did not match its check pattern
    #[error("{expected_file}:{line}: error: expected {expected:?}, actual {actual:?}")]
    Mismatch {
        /// Name of the expected file
        expected_file: String,
        /// 1-based line of the check in the expected file
        line: usize,
        /// Check pattern
        expected: String,
        /// Actual output line
        actual: String,
    },

    /// The actual output has lines left after every check matched
    #[error("{actual_file}:{line}: error: unexpected output {actual:?}")]
    ExpectedExhausted {
        /// Name of the actual output file
        actual_file: String,
        /// 1-based line of the first surplus actual line
        line: usize,
        /// First surplus actual line
        actual: String,
    },

    /// The actual output ended before every check matched
    #[error("{expected_file}:{line}: error: no output left to match {expected:?}")]
    ActualExhausted {
        /// Name of the expected file
        expected_file: String,
        /// 1-based line of the first unmatched check
        line: usize,
        /// Unmatched check pattern
        expected: String,
    },

    /// A check line is not a valid regular expression
    #[error("{expected_file}:{line}: error: invalid check pattern: {source}")]
    InvalidPattern {
        /// Name of the expected file
        expected_file: String,
        /// 1-based line of the check in the expected file
        line: usize,
        /// Regex compile error
        #[source]
        source: regex::Error,
    },
}

struct Check {
    line: usize,
    source: String,
    pattern: Regex,
}

fn parse_checks(
    expected: &str,
    expected_file: &str,
    prefix: &str,
) -> std::result::Result<Vec<Check>, CheckError> {
    expected
        .lines()
        .enumerate()
        .filter_map(|(index, line)| {
            line.trim_end_matches('\r')
                .strip_prefix(prefix)
                .map(|source| (index + 1, source))
        })
        .map(|(line, source)| {
            let pattern = Regex::new(&format!("^(?:{source})"))
                .map_err(|source| CheckError::InvalidPattern {
                    expected_file: expected_file.to_string(),
                    line,
                    source,
                })?;
            Ok(Check {
                line,
                source: source.to_string(),
                pattern,
            })
        })
        .collect()
}

/// Compare `actual` output against the checks in `expected`
///
/// `actual_file` and `expected_file` name the two inputs in error messages.
pub fn compare(
    actual: &str,
    actual_file: &str,
    expected: &str,
    expected_file: &str,
    prefix: &str,
) -> std::result::Result<(), CheckError> {
    let checks = parse_checks(expected, expected_file, prefix)?;
    let mut actual_lines = actual
        .lines()
        .map(|l| l.trim_end_matches('\r'))
        .enumerate();
    let mut checks = checks.into_iter();

    loop {
        match (actual_lines.next(), checks.next()) {
            (None, None) => return Ok(()),
            (Some((index, actual)), None) => {
                return Err(CheckError::ExpectedExhausted {
                    actual_file: actual_file.to_string(),
                    line: index + 1,
                    actual: actual.to_string(),
                })
            }
            (None, Some(check)) => {
                return Err(CheckError::ActualExhausted {
                    expected_file: expected_file.to_string(),
                    line: check.line,
                    expected: check.source,
                })
            }
            (Some((_, actual)), Some(check)) => {
                if !check.pattern.is_match(actual) {
                    return Err(CheckError::Mismatch {
                        expected_file: expected_file.to_string(),
                        line: check.line,
                        expected: check.source,
                        actual: actual.to_string(),
                    });
                }
                tracing::trace!(line = check.line, "check matched");
            }
        }
    }
}

/// Compare the file at `actual` against the checks in the file at `expected`
pub fn compare_files(actual: &Path, expected: &Path, prefix: &str) -> Result<()> {
    let actual_text =
        std::fs::read_to_string(actual).map_err(|e| HarnessError::io(actual, e))?;
    let expected_text =
        std::fs::read_to_string(expected).map_err(|e| HarnessError::io(expected, e))?;
    compare(
        &actual_text,
        &display_name(actual),
        &expected_text,
        &display_name(expected),
        prefix,
    )?;
    Ok(())
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
