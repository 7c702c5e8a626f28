use std::process::ExitCode;

use clap::Parser;
use color_eyre::eyre;
use vfs::VfsPath;
use withcheck_cli::{Cli, logging};

fn main() -> eyre::Result<ExitCode> {
    color_eyre::install()?;
    let cli = Cli::parse();
    logging::setup_logging(cli.log.log_level, cli.log.log_format, cli.log.color.into())?;

    let root = VfsPath::new(vfs::PhysicalFS::new("/"));
    let cwd = std::env::current_dir()?;
    let cwd = root.join(cwd.to_string_lossy().trim_start_matches('/'))?;

    let mut stdout = std::io::stdout().lock();
    match withcheck_cli::run(&cli, &cwd, &mut stdout) {
        Ok(report) => Ok(ExitCode::from(report.exit_code())),
        Err(err) => {
            eprintln!("error: {err}");
            Ok(ExitCode::from(2))
        }
    }
}
