//! Output formatting for CLI commands.
//!
//! Provides abstraction layer for outputting results in text or JSON
//! format, plus the coloured `donut` prefixes used in text mode.

use anyhow::Result;
use serde::Serialize;
use std::io::{self, Write};

const CYAN: &str = "\x1b[36m";
const GREEN: &str = "\x1b[32m";
const RED: &str = "\x1b[31m";
const RESET: &str = "\x1b[0m";

fn paint(text: &str, colour: &str, stream: atty::Stream) -> String {
    if atty::is(stream) {
        format!("{colour}{text}{RESET}")
    } else {
        text.to_string()
    }
}

/// Neutral `donut:` prefix for informational lines.
pub fn tag() -> String {
    paint("donut:", CYAN, atty::Stream::Stdout)
}

/// Green prefix for success lines.
pub fn ok_tag() -> String {
    paint("donut ok:", GREEN, atty::Stream::Stdout)
}

/// Red prefix for error lines (stderr).
pub fn err_tag() -> String {
    paint("donut error:", RED, atty::Stream::Stderr)
}

/// Output format selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

/// Writer for command output with format abstraction.
pub struct OutputWriter {
    format: OutputFormat,
    stdout: io::Stdout,
}

impl OutputWriter {
    /// Create a new OutputWriter.
    pub fn new(json: bool) -> Self {
        Self {
            format: if json {
                OutputFormat::Json
            } else {
                OutputFormat::Text
            },
            stdout: io::stdout(),
        }
    }

    /// Write output using the configured format.
    ///
    /// The `data` parameter must be a serializable struct that includes
    /// `success: bool` and `result_code: u8` fields.
    ///
    /// The `text_fn` closure is called only in text mode to generate the
    /// human-readable output.
    pub fn write<T: Serialize>(&self, data: &T, text_fn: impl FnOnce() -> String) -> Result<()> {
        match self.format {
            OutputFormat::Json => {
                let json = serde_json::to_string_pretty(data)?;
                writeln!(&self.stdout, "{}", json)?;
            }
            OutputFormat::Text => {
                let text = text_fn();
                if !text.is_empty() {
                    write!(&self.stdout, "{}", text)?;
                }
            }
        }
        Ok(())
    }

    /// Write an error message to stderr.
    ///
    /// In JSON mode, writes a JSON error object with success=false.
    /// In text mode, writes the error message with the red prefix.
    pub fn write_error(&self, error: &anyhow::Error, result_code: u8) {
        match self.format {
            OutputFormat::Json => {
                let error_output = ErrorOutput {
                    success: false,
                    result_code,
                    error: error.to_string(),
                };
                if let Ok(json) = serde_json::to_string_pretty(&error_output) {
                    let _ = writeln!(io::stderr(), "{}", json);
                }
            }
            OutputFormat::Text => {
                let _ = writeln!(io::stderr(), "{} {}", err_tag(), error);
            }
        }
    }
}

// ============================================================================
// Data Transfer Objects (DTOs) for JSON output
// ============================================================================

/// Error output structure.
#[derive(Debug, Serialize)]
pub struct ErrorOutput {
    pub success: bool,
    pub result_code: u8,
    pub error: String,
}

/// Output for `init` command.
#[derive(Debug, Serialize)]
pub struct InitOutput {
    pub success: bool,
    pub result_code: u8,
    pub root: String,
}

/// One file processed by `chkin`.
#[derive(Debug, Clone, Serialize)]
pub struct ChkinFile {
    pub source: String,
    pub id: String,
    pub stored: bool,
}

/// Output for `chkin` command.
#[derive(Debug, Serialize)]
pub struct ChkinOutput {
    pub success: bool,
    pub result_code: u8,
    pub dataframe: String,
    pub stored: usize,
    pub duplicates: usize,
    pub files: Vec<ChkinFile>,
}

/// One stored file listed by `ls-data`.
#[derive(Debug, Clone, Serialize)]
pub struct LsDataEntry {
    pub name: String,
    pub size: u64,
    pub modified: String,
}

/// Output for `ls-data` command.
#[derive(Debug, Serialize)]
pub struct LsDataOutput {
    pub success: bool,
    pub result_code: u8,
    pub dataframe: String,
    pub entries: Vec<LsDataEntry>,
}

/// One doctor finding.
#[derive(Debug, Clone, Serialize)]
pub struct DoctorIssueOutput {
    pub dataframe: String,
    pub name: String,
    pub problem: String,
}

/// Output for `doctor` command.
#[derive(Debug, Serialize)]
pub struct DoctorOutput {
    pub success: bool,
    pub result_code: u8,
    pub healthy: bool,
    pub checked: usize,
    pub issues: Vec<DoctorIssueOutput>,
}

/// Output for `conf` command.
#[derive(Debug, Serialize)]
pub struct ConfOutput {
    pub success: bool,
    pub result_code: u8,
    pub page_size: usize,
    pub cache_line: usize,
    pub slot_width: usize,
    pub slots_per_page: usize,
    pub id_width: usize,
    pub digest_size: usize,
    pub block_size: usize,
}
