use serde::{Deserialize, Serialize};
use withcheck_ast::{BranchNode, LineCol, NodeRef, Pos, Template, Tree, Visit, inspect};

use crate::{CheckError, check_usage, extract_bindings};

/// How a `with` pipeline is turned into bindings.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum Policy {
    /// Every declared variable and every field or `.` argument is a binding.
    #[default]
    Permissive,
    /// Historical behaviour: at most one declaration, a single field or `.`
    /// argument in the first command, anything else is an error.
    Strict,
}

/// Whether checking stops at the first finding.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum Mode {
    #[default]
    FailFast,
    Accumulate,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid {option} {value:?}, expected one of: {expected}")]
pub struct InvalidOption {
    option: &'static str,
    value: String,
    expected: &'static str,
}

impl Policy {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Permissive => "permissive",
            Self::Strict => "strict",
        }
    }
}

impl std::fmt::Display for Policy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Policy {
    type Err = InvalidOption;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "permissive" => Ok(Self::Permissive),
            "strict" => Ok(Self::Strict),
            _ => Err(InvalidOption {
                option: "policy",
                value: s.to_string(),
                expected: "permissive, strict",
            }),
        }
    }
}

impl Mode {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::FailFast => "fail-fast",
            Self::Accumulate => "accumulate",
        }
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Mode {
    type Err = InvalidOption;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "fail-fast" | "failfast" => Ok(Self::FailFast),
            "accumulate" | "all" => Ok(Self::Accumulate),
            _ => Err(InvalidOption {
                option: "mode",
                value: s.to_string(),
                expected: "fail-fast, accumulate",
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct CheckOptions {
    pub policy: Policy,
    pub mode: Mode,
}

/// A `with` construct that failed the check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finding {
    /// Name of the tree the construct lives in: the template itself or a
    /// `define`/`block` name.
    pub template: String,
    /// Position of the `with` keyword.
    pub pos: Pos,
    pub location: LineCol,
    pub error: CheckError,
}

impl std::fmt::Display for Finding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}: {}", self.template, self.location, self.error)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Checker {
    options: CheckOptions,
}

impl Checker {
    #[must_use]
    pub fn new(options: CheckOptions) -> Self {
        Self { options }
    }

    /// Check every `with` in `tree`, returning the first failure.
    pub fn check(&self, tree: &Tree) -> Result<(), CheckError> {
        match self.scan(tree, true).into_iter().next() {
            Some((_, err)) => Err(err),
            None => Ok(()),
        }
    }

    /// Check every `with` in `tree`, returning one error per failing
    /// construct in pre-order.
    #[must_use]
    pub fn check_all(&self, tree: &Tree) -> Vec<CheckError> {
        self.scan(tree, false)
            .into_iter()
            .map(|(_, err)| err)
            .collect()
    }

    /// Check the main tree and every associated tree of `template`.
    ///
    /// In [`Mode::FailFast`] at most one finding is returned.
    #[must_use]
    pub fn check_template(&self, template: &Template) -> Vec<Finding> {
        let fail_fast = self.options.mode == Mode::FailFast;
        let mut findings = Vec::new();
        for tree in template.trees() {
            for (pos, error) in self.scan(tree, fail_fast) {
                findings.push(Finding {
                    template: tree.name.clone(),
                    pos,
                    location: template.line_col(pos),
                    error,
                });
            }
            if fail_fast && !findings.is_empty() {
                break;
            }
        }
        tracing::debug!(
            template = %template.name,
            trees = template.associated.len() + 1,
            findings = findings.len(),
            "checked template"
        );
        findings
    }

    /// Visit every `with` node, nested ones and `else with` chains included.
    fn scan(&self, tree: &Tree, stop_at_first: bool) -> Vec<(Pos, CheckError)> {
        let mut errors = Vec::new();
        inspect(tree.root_ref(), &mut |node| {
            if stop_at_first && !errors.is_empty() {
                return Visit::Skip;
            }
            if let NodeRef::With(with) = node
                && let Err(err) = self.check_with(with)
            {
                tracing::debug!(tree = %tree.name, pos = %with.pos, %err, "unused with binding");
                errors.push((with.pos, err));
            }
            Visit::Descend
        });
        errors
    }

    fn check_with(&self, with: &BranchNode) -> Result<(), CheckError> {
        let bindings = extract_bindings(&with.pipe, self.options.policy)?;
        if bindings.is_empty() {
            tracing::debug!(pos = %with.pos, "with pipeline binds nothing checkable, skipping");
            return Ok(());
        }
        tracing::trace!(pos = %with.pos, %bindings, "checking with body");
        check_usage(&with.list, &bindings)
    }
}

/// Check `tree` with the default options: permissive, stopping at the first
/// failure.
pub fn check(tree: &Tree) -> Result<(), CheckError> {
    Checker::default().check(tree)
}
