use serde::Serialize;
use withcheck_ast::{NodeKind, Pos};

use crate::Bindings;

/// Context-free discriminant of a [`CheckError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorKind {
    NotFound,
    TooManyVariables,
    InvalidNode,
}

impl ErrorKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotFound => "not-found",
            Self::TooManyVariables => "too-many-variables",
            Self::InvalidNode => "invalid-node",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CheckError {
    /// None of the bindings is referenced in the `with` body, or the pipeline
    /// binds nothing at all.
    #[error("none of {bindings} is used in the with body")]
    NotFound { bindings: Bindings, pos: Pos },

    #[error("too many variables in with pipeline: found {count}, expected at most 1")]
    TooManyVariables { count: usize, pos: Pos },

    #[error("invalid node in with pipeline: cannot narrow to {kind}")]
    InvalidNode { kind: NodeKind, pos: Pos },
}

impl CheckError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::TooManyVariables { .. } => ErrorKind::TooManyVariables,
            Self::InvalidNode { .. } => ErrorKind::InvalidNode,
        }
    }

    #[must_use]
    pub fn pos(&self) -> Pos {
        match self {
            Self::NotFound { pos, .. }
            | Self::TooManyVariables { pos, .. }
            | Self::InvalidNode { pos, .. } => *pos,
        }
    }
}
