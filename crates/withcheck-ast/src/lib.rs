//! Syntax tree and parser for Go `text/template` source.

mod inspect;
mod lexer;
mod node;
mod parser;
mod sexpr;
mod source_map;

pub use inspect::{Visit, any, inspect};
pub use node::{
    ActionNode, BoolNode, BranchNode, ChainNode, CommandNode, CommentNode, FieldNode,
    IdentifierNode, ListNode, Node, NodeKind, NodeRef, NumberNode, PipeNode, Pos, StringNode,
    TemplateNode, TextNode, VariableNode,
};
pub use parser::{DEFAULT_LEFT_DELIM, DEFAULT_RIGHT_DELIM, RustParser};
pub use sexpr::to_sexpr;
pub use source_map::{LineCol, SourceMap};

use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("template: {name}:{location}: {message}")]
    Lex {
        name: String,
        pos: Pos,
        location: LineCol,
        message: String,
    },

    #[error("template: {name}:{location}: {message}")]
    Syntax {
        name: String,
        pos: Pos,
        location: LineCol,
        message: String,
    },

    #[error("template: multiple definition of template {0:?}")]
    MultipleDefinition(String),
}

impl ParseError {
    #[must_use]
    pub fn location(&self) -> Option<LineCol> {
        match self {
            Self::Lex { location, .. } | Self::Syntax { location, .. } => Some(*location),
            Self::MultipleDefinition(_) => None,
        }
    }
}

/// A single parsed tree: the main template or one `define`/`block` body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tree {
    pub name: String,
    pub root: ListNode,
}

impl Tree {
    #[must_use]
    pub fn root_ref(&self) -> NodeRef<'_> {
        NodeRef::List(&self.root)
    }

    /// Render the tree as an indented S-expression.
    #[must_use]
    pub fn to_sexpr(&self) -> String {
        to_sexpr(self.root_ref())
    }
}

/// A parsed template source with its associated named templates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    pub name: String,
    pub source: String,
    pub tree: Tree,
    /// Trees introduced by `define` and `block`, keyed by name.
    pub associated: BTreeMap<String, Tree>,
    source_map: SourceMap,
}

impl Template {
    /// The main tree followed by the associated trees in name order.
    pub fn trees(&self) -> impl Iterator<Item = &Tree> {
        std::iter::once(&self.tree).chain(self.associated.values())
    }

    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<&Tree> {
        if name == self.tree.name {
            return Some(&self.tree);
        }
        self.associated.get(name)
    }

    #[must_use]
    pub fn line_col(&self, pos: Pos) -> LineCol {
        self.source_map.resolve(&self.source, pos)
    }
}

/// Trait for parsing template source into a [`Template`].
pub trait TemplateParser {
    fn parse(&self, name: &str, src: &str) -> Result<Template, ParseError>;
}

#[cfg(test)]
mod tests;
