use crate::node::NodeRef;

/// What [`inspect`] should do after visiting a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visit {
    Descend,
    /// Do not visit the children of this node.
    Skip,
}

/// Depth-first pre-order walk over `root` and its descendants.
///
/// `f` is called for every node before its children; returning
/// [`Visit::Skip`] prunes the subtree below that node.
pub fn inspect<'a, F>(root: NodeRef<'a>, f: &mut F)
where
    F: FnMut(NodeRef<'a>) -> Visit,
{
    if f(root) == Visit::Skip {
        return;
    }
    for child in root.children() {
        inspect(child, f);
    }
}

/// Returns `true` if `pred` holds for `root` or any of its descendants.
///
/// Stops walking at the first match.
pub fn any<'a, P>(root: NodeRef<'a>, mut pred: P) -> bool
where
    P: FnMut(NodeRef<'a>) -> bool,
{
    let mut found = false;
    inspect(root, &mut |node| {
        if found {
            return Visit::Skip;
        }
        found = pred(node);
        if found { Visit::Skip } else { Visit::Descend }
    });
    found
}

#[cfg(test)]
mod tests {
    use super::{Visit, any, inspect};
    use crate::{NodeKind, RustParser, TemplateParser};
    use color_eyre::eyre;

    #[test]
    fn visits_in_pre_order() -> eyre::Result<()> {
        let tmpl = RustParser::default().parse("t", "{{ with .Foo }}{{ .Bar }}{{ end }}")?;
        let mut kinds = Vec::new();
        inspect(tmpl.tree.root_ref(), &mut |node| {
            kinds.push(node.kind());
            Visit::Descend
        });
        similar_asserts::assert_eq!(
            kinds,
            vec![
                NodeKind::List,
                NodeKind::With,
                NodeKind::Pipe,
                NodeKind::Command,
                NodeKind::Field,
                NodeKind::List,
                NodeKind::Action,
                NodeKind::Pipe,
                NodeKind::Command,
                NodeKind::Field,
            ]
        );
        Ok(())
    }

    #[test]
    fn skip_prunes_children() -> eyre::Result<()> {
        let tmpl = RustParser::default().parse("t", "{{ with .Foo }}{{ .Bar }}{{ end }}")?;
        let mut kinds = Vec::new();
        inspect(tmpl.tree.root_ref(), &mut |node| {
            kinds.push(node.kind());
            if node.kind() == NodeKind::With {
                Visit::Skip
            } else {
                Visit::Descend
            }
        });
        similar_asserts::assert_eq!(kinds, vec![NodeKind::List, NodeKind::With]);
        Ok(())
    }

    #[test]
    fn any_finds_nested_dot() -> eyre::Result<()> {
        let tmpl = RustParser::default().parse("t", "{{ if true }}{{ printf \"%v\" . }}{{ end }}")?;
        assert!(any(tmpl.tree.root_ref(), |node| node.kind() == NodeKind::Dot));
        assert!(!any(tmpl.tree.root_ref(), |node| node.kind() == NodeKind::Field));
        Ok(())
    }
}
