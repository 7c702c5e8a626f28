use std::path::PathBuf;
use std::sync::Once;

use color_eyre::eyre;
use vfs::VfsPath;

pub mod prelude {
    pub use crate::matchers::*;
    pub use crate::write;
    pub use crate::{Builder, LogLevel};
    pub use googletest::{assert_that, matcher::MatcherBase, matchers::*};
    pub use similar_asserts::assert_eq as sim_assert_eq;
}

/// Returns the workspace root directory via the `CARGO_WORKSPACE_DIR` env var
/// set in `.cargo/config.toml`.
///
/// # Panics
///
/// Panics if `CARGO_WORKSPACE_DIR` is not set.
#[must_use]
pub fn workspace_root() -> PathBuf {
    PathBuf::from(
        std::env::var("CARGO_WORKSPACE_DIR")
            .expect("CARGO_WORKSPACE_DIR must be set in .cargo/config.toml"),
    )
}

/// Returns the path to the workspace `testdata/` directory.
#[must_use]
pub fn workspace_testdata() -> PathBuf {
    workspace_root().join("testdata")
}

/// Reads a file relative to the workspace `testdata/` directory.
///
/// # Panics
///
/// Panics if the file cannot be read.
#[must_use]
pub fn read_testdata(relative_path: &str) -> String {
    let path = workspace_testdata().join(relative_path);
    std::fs::read_to_string(&path).unwrap_or_else(|e| panic!("read {}: {e}", path.display()))
}

/// Reads all files with the given extension from a directory relative to
/// the workspace `testdata/` directory, sorted by file name.
///
/// Returns an empty `Vec` if the directory does not exist.
#[must_use]
pub fn read_testdata_dir(relative_dir: &str, extension: &str) -> Vec<String> {
    let dir = workspace_testdata().join(relative_dir);
    let Ok(entries) = std::fs::read_dir(&dir) else {
        return Vec::new();
    };
    let mut paths: Vec<_> = entries
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| path.extension().is_some_and(|e| e == extension))
        .collect();
    paths.sort();
    paths
        .into_iter()
        .filter_map(|path| std::fs::read_to_string(path).ok())
        .collect()
}

/// Write `data` into the virtual filesystem at `path`, creating parent directories as needed.
///
/// # Errors
///
/// Returns an error if the file cannot be created or written to.
pub fn write(path: &VfsPath, data: impl AsRef<[u8]>) -> eyre::Result<VfsPath> {
    let _ = path.parent().create_dir_all();
    let mut file = path.create_file()?;
    file.write_all(data.as_ref())?;
    Ok(path.clone())
}

pub type LogLevel = tracing::metadata::Level;

static INIT_EYRE: Once = Once::new();
static INIT_TRACING: Once = Once::new();

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Builder {
    env_filter: Option<String>,
    log_level: LogLevel,
}

impl Default for Builder {
    fn default() -> Self {
        Self {
            env_filter: None,
            log_level: LogLevel::DEBUG,
        }
    }
}

impl Builder {
    /// Initialize test.
    ///
    /// This ensures `color_eyre` and the tracing subscriber are set up once
    /// per test binary.
    ///
    /// # Panics
    ///
    /// Panics if `color_eyre` installation fails.
    pub fn build(self) {
        INIT_EYRE.call_once(|| {
            color_eyre::install().expect("failed to install eyre");
        });
        INIT_TRACING.call_once(|| {
            let filter = self
                .env_filter
                .clone()
                .or_else(|| std::env::var("RUST_LOG").ok())
                .unwrap_or_else(|| self.log_level.to_string().to_lowercase());
            // another harness may already own the global subscriber
            let _ = tracing_subscriber::fmt()
                .with_env_filter(tracing_subscriber::EnvFilter::new(filter))
                .with_test_writer()
                .without_time()
                .compact()
                .try_init();
        });
    }

    /// Toggle log level for tracing inside the test.
    #[must_use]
    pub fn with_log_level(mut self, log_level: impl Into<LogLevel>) -> Self {
        self.log_level = log_level.into();
        self
    }

    /// Configure the tracing subscribers env filter. Takes precedence over
    /// `RUST_LOG` and the log level.
    #[must_use]
    pub fn with_env_filter(mut self, filter: impl Into<String>) -> Self {
        self.env_filter = Some(filter.into());
        self
    }
}

pub mod matchers {
    use googletest::matchers::{ContainsMatcher, contains, predicate};
    use vfs::VfsPath;

    #[must_use]
    pub fn contains_path(
        path: &str,
    ) -> ContainsMatcher<impl googletest::matcher::Matcher<&VfsPath>> {
        contains(matches_path(path))
    }

    #[must_use]
    pub fn matches_path(path: &str) -> impl googletest::matcher::Matcher<&VfsPath> {
        predicate(move |p: &VfsPath| p.as_str() == path)
    }
}
