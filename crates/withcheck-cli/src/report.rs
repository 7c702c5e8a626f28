use std::io::Write;

use serde::{Deserialize, Serialize};
use withcheck::{Bindings, CheckError, ErrorKind, Finding};

use crate::error::CliResult;

#[derive(
    Debug, Clone, Copy, Default, Hash, PartialEq, Eq, clap::ValueEnum, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum Format {
    /// One `path:line:col: message` line per finding.
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FindingRecord {
    pub path: String,
    /// Tree the `with` belongs to: the file itself or a `define`/`block` name.
    pub template: String,
    pub line: usize,
    pub column: usize,
    pub kind: ErrorKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bindings: Option<Bindings>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorRecord {
    pub path: String,
    pub message: String,
}

/// Everything a run produced, in the order files were checked.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Report {
    pub checked: usize,
    pub findings: Vec<FindingRecord>,
    pub errors: Vec<ErrorRecord>,
}

impl Report {
    pub fn add_findings(&mut self, path: &str, findings: impl IntoIterator<Item = Finding>) {
        for finding in findings {
            let bindings = match &finding.error {
                CheckError::NotFound { bindings, .. } => Some(bindings.clone()),
                _ => None,
            };
            self.findings.push(FindingRecord {
                path: path.to_string(),
                template: finding.template,
                line: finding.location.line,
                column: finding.location.column,
                kind: finding.error.kind(),
                message: finding.error.to_string(),
                bindings,
            });
        }
    }

    pub fn add_error(&mut self, path: &str, err: &dyn std::fmt::Display) {
        self.errors.push(ErrorRecord {
            path: path.to_string(),
            message: err.to_string(),
        });
    }

    /// 0 when clean, 1 when findings were reported, 2 when a file could not
    /// be read or parsed.
    #[must_use]
    pub fn exit_code(&self) -> u8 {
        if !self.errors.is_empty() {
            2
        } else if !self.findings.is_empty() {
            1
        } else {
            0
        }
    }

    pub fn write(&self, format: Format, out: &mut dyn Write) -> CliResult<()> {
        match format {
            Format::Text => self.write_text(out)?,
            Format::Json => {
                serde_json::to_writer_pretty(&mut *out, self)?;
                writeln!(out)?;
            }
        }
        Ok(())
    }

    fn write_text(&self, out: &mut dyn Write) -> std::io::Result<()> {
        for finding in &self.findings {
            write!(
                out,
                "{}:{}:{}: {}",
                finding.path, finding.line, finding.column, finding.message
            )?;
            if finding.template != finding.path {
                write!(out, " (in template {:?})", finding.template)?;
            }
            writeln!(out)?;
        }
        for error in &self.errors {
            writeln!(out, "{}: error: {}", error.path, error.message)?;
        }
        Ok(())
    }
}
