use std::path::Path;

use serde::{Deserialize, Serialize};
use vfs::VfsPath;
use withcheck::{CheckOptions, Mode, Policy};
use withcheck_ast::{DEFAULT_LEFT_DELIM, DEFAULT_RIGHT_DELIM};

use crate::error::{CliError, CliResult};
use crate::{Cli, Format};

pub const CONFIG_FILE_NAME: &str = "withcheck.yaml";

pub const DEFAULT_EXTENSIONS: [&str; 3] = ["tmpl", "tpl", "gotmpl"];

/// Contents of `withcheck.yaml`. Command line flags take precedence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub struct Config {
    pub policy: Policy,
    pub mode: Mode,
    pub format: Format,
    pub left_delim: String,
    pub right_delim: String,
    /// File extensions picked up when walking directories, without the dot.
    pub extensions: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            policy: Policy::default(),
            mode: Mode::default(),
            format: Format::default(),
            left_delim: DEFAULT_LEFT_DELIM.to_string(),
            right_delim: DEFAULT_RIGHT_DELIM.to_string(),
            extensions: DEFAULT_EXTENSIONS.map(String::from).to_vec(),
        }
    }
}

impl Config {
    pub fn from_yaml(path: &str, src: &str) -> CliResult<Self> {
        // an empty file deserializes to unit, not to a mapping
        if src.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(src).map_err(|source| CliError::Config {
            path: path.to_string(),
            source,
        })
    }

    /// Load `explicit` if given, otherwise `withcheck.yaml` in `cwd` if it
    /// exists, otherwise the defaults.
    pub fn load(cwd: &VfsPath, explicit: Option<&Path>) -> CliResult<Self> {
        let (shown, path) = match explicit {
            Some(path) => {
                let shown = path.to_string_lossy().to_string();
                let resolved = crate::discover::resolve(cwd, &shown)?;
                if !resolved.exists()? {
                    return Err(CliError::ConfigNotFound { path: shown });
                }
                (shown, resolved)
            }
            None => {
                let resolved = cwd.join(CONFIG_FILE_NAME)?;
                if !resolved.exists()? {
                    tracing::debug!("no {CONFIG_FILE_NAME} found, using defaults");
                    return Ok(Self::default());
                }
                (CONFIG_FILE_NAME.to_string(), resolved)
            }
        };
        let src = path.read_to_string()?;
        let config = Self::from_yaml(&shown, &src)?;
        tracing::debug!(path = %shown, ?config, "loaded config");
        Ok(config)
    }

    /// Apply command line overrides.
    #[must_use]
    pub fn merge(mut self, cli: &Cli) -> Self {
        if let Some(policy) = cli.check.policy {
            self.policy = policy;
        }
        if let Some(mode) = cli.check.mode {
            self.mode = mode;
        }
        if let Some(format) = cli.output.format {
            self.format = format;
        }
        if let Some(left) = &cli.check.left_delim {
            self.left_delim.clone_from(left);
        }
        if let Some(right) = &cli.check.right_delim {
            self.right_delim.clone_from(right);
        }
        if !cli.check.extensions.is_empty() {
            self.extensions.clone_from(&cli.check.extensions);
        }
        self
    }

    #[must_use]
    pub fn check_options(&self) -> CheckOptions {
        CheckOptions {
            policy: self.policy,
            mode: self.mode,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Config;
    use crate::{CliError, Format};
    use color_eyre::eyre;
    use std::path::Path;
    use test_util::prelude::*;
    use vfs::VfsPath;
    use withcheck::{Mode, Policy};

    #[test]
    fn parses_partial_config() -> eyre::Result<()> {
        let config = Config::from_yaml(
            "withcheck.yaml",
            "policy: strict\nformat: json\nextensions: [gotmpl]\n",
        )?;
        assert_eq!(config.policy, Policy::Strict);
        assert_eq!(config.mode, Mode::FailFast);
        assert_eq!(config.format, Format::Json);
        assert_eq!(config.left_delim, "{{");
        assert_eq!(config.extensions, vec!["gotmpl"]);
        Ok(())
    }

    #[test]
    fn loads_default_and_explicit_config_files() -> eyre::Result<()> {
        Builder::default().build();
        let root = VfsPath::new(vfs::MemoryFS::new());
        let cwd = root.join("project")?;
        assert_eq!(Config::load(&cwd.join("missing")?, None)?, Config::default());

        write(&cwd.join("withcheck.yaml")?, "mode: accumulate\n")?;
        write(&root.join("shared/strict.yaml")?, "policy: strict\n")?;

        let config = Config::load(&cwd, None)?;
        assert_eq!(config.mode, Mode::Accumulate);
        assert_eq!(config.policy, Policy::Permissive);

        let config = Config::load(&cwd, Some(Path::new("/shared/strict.yaml")))?;
        assert_eq!(config.mode, Mode::FailFast);
        assert_eq!(config.policy, Policy::Strict);

        let err = Config::load(&cwd, Some(Path::new("nope.yaml"))).expect_err("missing");
        assert!(matches!(err, CliError::ConfigNotFound { ref path } if path == "nope.yaml"));
        Ok(())
    }

    #[test]
    fn empty_config_is_default() -> eyre::Result<()> {
        assert_eq!(Config::from_yaml("withcheck.yaml", "\n")?, Config::default());
        Ok(())
    }

    #[test]
    fn rejects_unknown_keys() {
        let err = Config::from_yaml("withcheck.yaml", "polcy: strict\n").expect_err("typo");
        assert!(matches!(err, CliError::Config { ref path, .. } if path == "withcheck.yaml"));
    }

    #[test]
    fn rejects_unknown_policy() {
        let err = Config::from_yaml("withcheck.yaml", "policy: loose\n").expect_err("bad value");
        assert!(matches!(err, CliError::Config { .. }));
    }
}
