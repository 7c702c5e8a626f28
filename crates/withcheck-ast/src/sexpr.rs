use std::fmt::Write;

use crate::node::NodeRef;

const INDENT: &str = "  ";

/// Format a node as an indented S-expression.
///
/// Leaves carry their text as a quoted attribute, e.g. `(Field ".Foo.Bar")`.
/// The else list of `if`/`range`/`with` is wrapped in an `(else ...)` form.
#[must_use]
pub fn to_sexpr(node: NodeRef<'_>) -> String {
    let mut out = String::new();
    write_node(&mut out, node, 0);
    out
}

fn attribute(node: NodeRef<'_>) -> Option<String> {
    match node {
        NodeRef::Text(n) => Some(n.text.clone()),
        NodeRef::Comment(n) => Some(n.text.clone()),
        NodeRef::Template(n) => Some(n.name.clone()),
        NodeRef::Field(n) => Some(format!(".{}", n.ident.join("."))),
        NodeRef::Identifier(n) => Some(n.ident.clone()),
        NodeRef::Variable(n) => Some(n.ident.join(".")),
        NodeRef::Chain(n) => Some(format!(".{}", n.field.join("."))),
        NodeRef::Bool(n) => Some(n.value.to_string()),
        NodeRef::Number(n) => Some(n.text.clone()),
        NodeRef::String(n) => Some(n.text.clone()),
        NodeRef::Pipe(n) if n.is_assign => Some("=".to_string()),
        _ => None,
    }
}

fn write_node(out: &mut String, node: NodeRef<'_>, depth: usize) {
    out.push('(');
    out.push_str(node.kind().as_str());
    if let Some(attr) = attribute(node) {
        let _ = write!(out, " {attr:?}");
    }

    match node {
        NodeRef::If(branch) | NodeRef::Range(branch) | NodeRef::With(branch) => {
            write_child(out, NodeRef::Pipe(&branch.pipe), depth + 1);
            write_child(out, NodeRef::List(&branch.list), depth + 1);
            if let Some(else_list) = &branch.else_list {
                newline(out, depth + 1);
                out.push_str("(else");
                write_child(out, NodeRef::List(else_list), depth + 2);
                out.push(')');
            }
        }
        _ => {
            for child in node.children() {
                write_child(out, child, depth + 1);
            }
        }
    }
    out.push(')');
}

fn write_child(out: &mut String, node: NodeRef<'_>, depth: usize) {
    newline(out, depth);
    write_node(out, node, depth);
}

fn newline(out: &mut String, depth: usize) {
    out.push('\n');
    for _ in 0..depth {
        out.push_str(INDENT);
    }
}
