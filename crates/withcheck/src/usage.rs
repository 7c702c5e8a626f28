use withcheck_ast::{ListNode, NodeRef, any};

use crate::{Bindings, CheckError};

/// Succeeds if any node below `body` satisfies at least one binding.
pub fn check_usage(body: &ListNode, bindings: &Bindings) -> Result<(), CheckError> {
    let used = bindings.iter().find(|target| {
        let root = NodeRef::List(body);
        any(root, |node| satisfies(node, target))
    });
    match used {
        Some(target) => {
            tracing::trace!(target, "binding used");
            Ok(())
        }
        None => Err(CheckError::NotFound {
            bindings: bindings.clone(),
            pos: body.pos,
        }),
    }
}

/// Whether `node` counts as a use of `target`.
///
/// Paths compare by plain string prefix, so `.Foobar` satisfies `.Foo`.
/// Template invocations must match the name exactly.
#[must_use]
pub fn satisfies(node: NodeRef<'_>, target: &str) -> bool {
    match node {
        NodeRef::Field(field) => dotted(&field.ident).starts_with(target),
        NodeRef::Identifier(ident) => ident.ident.starts_with(target),
        NodeRef::Variable(variable) => variable.ident.join(".").starts_with(target),
        NodeRef::Chain(chain) => dotted(&chain.field).starts_with(target),
        NodeRef::Dot(_) => target == ".",
        NodeRef::Template(template) => template.name == target,
        _ => false,
    }
}

fn dotted(segments: &[String]) -> String {
    format!(".{}", segments.join("."))
}
