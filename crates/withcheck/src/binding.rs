use serde::Serialize;
use withcheck_ast::{Node, PipeNode};

use crate::{CheckError, Policy};

/// Marker binding for the value `.` refers to inside a `with` body.
pub const CURRENT_CONTEXT: &str = ".";

/// Ordered names a `with` body is expected to reference.
///
/// A variable binding keeps its `$` sigil (`$x`); a narrowed field is stored
/// as its dotted path (`.Foo.Bar`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Bindings(Vec<String>);

impl Bindings {
    #[must_use]
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        names.into_iter().map(Into::into).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    /// Append `name` unless it is already bound.
    fn push(&mut self, name: impl Into<String>) {
        let name = name.into();
        if !self.0.contains(&name) {
            self.0.push(name);
        }
    }
}

impl<S: Into<String>> FromIterator<S> for Bindings {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut bindings = Self::default();
        for name in iter {
            bindings.push(name);
        }
        bindings
    }
}

impl std::fmt::Display for Bindings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("[")?;
        for (i, name) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{name:?}")?;
        }
        f.write_str("]")
    }
}

/// Collect the names the body of a `with` controlled by `pipe` should use.
///
/// Under [`Policy::Permissive`] an empty result is not an error: the caller
/// skips the construct.
pub fn extract_bindings(pipe: &PipeNode, policy: Policy) -> Result<Bindings, CheckError> {
    if !pipe.decl.is_empty() {
        if policy == Policy::Strict && pipe.decl.len() > 1 {
            return Err(CheckError::TooManyVariables {
                count: pipe.decl.len(),
                pos: pipe.pos,
            });
        }
        let mut bindings: Bindings = pipe.decl.iter().map(|decl| decl.name()).collect();
        bindings.push(CURRENT_CONTEXT);
        return Ok(bindings);
    }

    if pipe.cmds.is_empty() {
        return Err(CheckError::NotFound {
            bindings: Bindings::default(),
            pos: pipe.pos,
        });
    }

    match policy {
        Policy::Strict => strict_command_bindings(pipe),
        Policy::Permissive => Ok(permissive_command_bindings(pipe)),
    }
}

/// Only the first command counts, and it must be a single field or `.`.
fn strict_command_bindings(pipe: &PipeNode) -> Result<Bindings, CheckError> {
    let cmd = &pipe.cmds[0];
    if cmd.args.len() > 1 {
        return Err(CheckError::TooManyVariables {
            count: cmd.args.len(),
            pos: cmd.pos,
        });
    }
    match cmd.args.first() {
        Some(Node::Field(_) | Node::Dot(_)) => Ok(Bindings::new([CURRENT_CONTEXT])),
        Some(other) => Err(CheckError::InvalidNode {
            kind: other.kind(),
            pos: other.pos(),
        }),
        None => Err(CheckError::NotFound {
            bindings: Bindings::default(),
            pos: cmd.pos,
        }),
    }
}

fn permissive_command_bindings(pipe: &PipeNode) -> Bindings {
    let mut bindings = Bindings::default();
    for arg in pipe.cmds.iter().flat_map(|cmd| cmd.args.iter()) {
        match arg {
            Node::Field(field) => bindings.push(format!(".{}", field.ident.join("."))),
            Node::Dot(_) => bindings.push(CURRENT_CONTEXT),
            other => {
                tracing::trace!(kind = %other.kind(), pos = %other.pos(), "ignoring pipeline argument");
            }
        }
    }
    bindings
}
