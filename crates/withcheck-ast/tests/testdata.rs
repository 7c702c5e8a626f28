use color_eyre::eyre::{self, OptionExt};
use test_util::prelude::*;
use withcheck_ast::{LineCol, NodeKind, ParseError, RustParser, TemplateParser, any};

const GREETING_MAIN_EXPECTED_SEXPR: &str = r#"(List
  (With
    (Pipe
      (Command
        (Field ".User")))
    (List
      (Template "greeting"
        (Pipe
          (Command
            (Dot))))))
  (Text "\n"))"#;

const GREETING_DEFINE_EXPECTED_SEXPR: &str = r#"(List
  (Text "Hello ")
  (Action
    (Pipe
      (Command
        (Field ".Name")))))"#;

#[test]
fn greeting_trees() -> eyre::Result<()> {
    Builder::default().build();
    let src = test_util::read_testdata("templates/greeting.tmpl");
    let tmpl = RustParser::default().parse("greeting.tmpl", &src)?;

    sim_assert_eq!(have: tmpl.tree.to_sexpr(), want: GREETING_MAIN_EXPECTED_SEXPR);
    let define = tmpl.lookup("greeting").ok_or_eyre("missing define")?;
    sim_assert_eq!(have: define.to_sexpr(), want: GREETING_DEFINE_EXPECTED_SEXPR);
    Ok(())
}

#[test]
fn configmap_parses_with_else_with_chain() -> eyre::Result<()> {
    Builder::default().build();
    let src = test_util::read_testdata("templates/configmap.tpl");
    let tmpl = RustParser::default().parse("configmap.tpl", &src)?;

    assert_that!(tmpl.associated.len(), eq(0));
    let kinds: Vec<_> = tmpl.tree.root.nodes.iter().map(|n| n.kind()).collect();
    assert_that!(kinds, contains(eq(&NodeKind::With)));
    assert_that!(kinds, contains(eq(&NodeKind::Range)));
    assert_that!(kinds, contains(eq(&NodeKind::Comment)));
    assert!(!any(tmpl.tree.root_ref(), |n| n.kind() == NodeKind::Chain));
    Ok(())
}

#[test]
fn nested_defines_become_associated_trees() -> eyre::Result<()> {
    Builder::default().build();
    let src = test_util::read_testdata("templates/nested/partials.gotmpl");
    let tmpl = RustParser::default().parse("partials.gotmpl", &src)?;

    let names: Vec<_> = tmpl.trees().map(|tree| tree.name.as_str()).collect();
    sim_assert_eq!(names, vec!["partials.gotmpl", "footer", "header"]);
    for tree in tmpl.trees().skip(1) {
        assert!(any(tree.root_ref(), |n| n.kind() == NodeKind::With));
    }
    Ok(())
}

#[test]
fn broken_template_reports_location() {
    Builder::default().build();
    let src = test_util::read_testdata("templates/nested/broken.tmpl");
    let err = RustParser::default()
        .parse("broken.tmpl", &src)
        .expect_err("undefined variable");

    assert!(matches!(err, ParseError::Syntax { .. }));
    assert_that!(err.location(), some(eq(LineCol { line: 2, column: 4 })));
    sim_assert_eq!(
        err.to_string(),
        "template: broken.tmpl:2:4: undefined variable \"$undefined\""
    );
}

#[test]
fn every_well_formed_fixture_parses() -> eyre::Result<()> {
    Builder::default().build();
    let sources = test_util::read_testdata_dir("templates", "tmpl")
        .into_iter()
        .chain(test_util::read_testdata_dir("templates", "tpl"));
    for src in sources {
        RustParser::default().parse("fixture", &src)?;
    }
    Ok(())
}
