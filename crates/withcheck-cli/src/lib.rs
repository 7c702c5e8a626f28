mod config;
mod discover;
mod error;
pub mod logging;
mod report;

use std::io::Write;
use std::path::PathBuf;

use clap::{Args, Parser};
use vfs::VfsPath;
use withcheck::{Checker, Mode, Policy};
use withcheck_ast::{RustParser, TemplateParser};

pub use config::{CONFIG_FILE_NAME, Config, DEFAULT_EXTENSIONS};
pub use discover::{Target, discover_templates};
pub use error::{CliError, CliResult};
pub use report::{ErrorRecord, FindingRecord, Format, Report};

#[derive(Parser, Debug, Clone)]
#[command(
    name = "withcheck",
    version,
    about = "Report Go template with blocks whose binding is never used"
)]
pub struct Cli {
    /// Template files or directories to check
    #[arg(value_name = "PATH")]
    pub paths: Vec<PathBuf>,

    /// Config file (defaults to ./withcheck.yaml if present)
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[command(flatten)]
    pub check: CheckArgs,

    #[command(flatten)]
    pub output: OutputArgs,

    #[command(flatten)]
    pub log: LogArgs,
}

#[derive(Args, Debug, Clone, Default)]
pub struct CheckArgs {
    /// Binding policy: permissive or strict
    #[arg(long)]
    pub policy: Option<Policy>,

    /// Stop at the first finding (fail-fast) or report all (accumulate)
    #[arg(long)]
    pub mode: Option<Mode>,

    #[arg(long)]
    pub left_delim: Option<String>,

    #[arg(long)]
    pub right_delim: Option<String>,

    /// Extensions to pick up when walking directories
    #[arg(long = "ext", value_name = "EXT", value_delimiter = ',')]
    pub extensions: Vec<String>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct OutputArgs {
    #[arg(long, value_enum)]
    pub format: Option<Format>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct LogArgs {
    #[arg(long)]
    pub log_level: Option<tracing::metadata::Level>,

    #[arg(long, value_enum)]
    pub log_format: Option<logging::LogFormat>,

    #[arg(long, value_enum, default_value_t)]
    pub color: logging::Color,
}

/// Run the CLI against `cwd` and write the report to `out`.
///
/// Files that cannot be read or parsed are recorded in the report and do not
/// stop the run; the returned [`Report::exit_code`] reflects them.
///
/// # Errors
///
/// Returns an error if the config file is invalid, a path argument does not
/// exist, or the report cannot be written.
pub fn run(cli: &Cli, cwd: &VfsPath, out: &mut dyn Write) -> CliResult<Report> {
    let config = Config::load(cwd, cli.config.as_deref())?.merge(cli);
    let targets = discover_templates(cwd, &cli.paths, &config.extensions)?;
    tracing::info!(
        files = targets.len(),
        policy = %config.policy,
        mode = %config.mode,
        "checking templates"
    );

    let parser =
        RustParser::default().with_delims(config.left_delim.clone(), config.right_delim.clone());
    let checker = Checker::new(config.check_options());
    let mut report = Report::default();

    for target in &targets {
        report.checked += 1;
        let src = match target.path.read_to_string() {
            Ok(src) => src,
            Err(err) => {
                tracing::warn!(path = %target.display, %err, "failed to read template");
                report.add_error(&target.display, &err);
                continue;
            }
        };
        match parser.parse(&target.display, &src) {
            Ok(template) => {
                let findings = checker.check_template(&template);
                tracing::debug!(path = %target.display, findings = findings.len(), "checked");
                report.add_findings(&target.display, findings);
            }
            Err(err) => {
                tracing::warn!(path = %target.display, %err, "failed to parse template");
                report.add_error(&target.display, &err);
            }
        }
        if config.mode == Mode::FailFast && !report.findings.is_empty() {
            tracing::debug!("stopping at first finding");
            break;
        }
    }

    report.write(config.format, out)?;
    Ok(report)
}
