use crate::{
    LineCol, Node, NodeKind, ParseError, RustParser, Template, TemplateParser, any,
};
use color_eyre::eyre::{self, OptionExt};

fn parse(src: &str) -> Result<Template, ParseError> {
    RustParser::default().parse("test", src)
}

fn syntax_message(err: &ParseError) -> &str {
    match err {
        ParseError::Syntax { message, .. } | ParseError::Lex { message, .. } => message,
        ParseError::MultipleDefinition(name) => name,
    }
}

// ===========================================================================
// tree shape
// ===========================================================================

const WITH_FIELD_EXPECTED_SEXPR: &str = r#"(List
  (With
    (Pipe
      (Command
        (Field ".Foo")))
    (List
      (Action
        (Pipe
          (Command
            (Field ".Foo.Bar")))))))"#;

#[test]
fn with_field_sexpr() -> eyre::Result<()> {
    let tmpl = parse("{{ with .Foo }}{{ .Foo.Bar }}{{ end }}")?;
    similar_asserts::assert_eq!(tmpl.tree.to_sexpr(), WITH_FIELD_EXPECTED_SEXPR);
    Ok(())
}

const WITH_ELSE_EXPECTED_SEXPR: &str = r#"(List
  (With
    (Pipe
      (Variable "$x")
      (Command
        (String "a")))
    (List
      (Text "x"))
    (else
      (List
        (Text "y")))))"#;

#[test]
fn with_declaration_and_else_sexpr() -> eyre::Result<()> {
    let tmpl = parse(r#"{{ with $x := "a" }}x{{ else }}y{{ end }}"#)?;
    similar_asserts::assert_eq!(tmpl.tree.to_sexpr(), WITH_ELSE_EXPECTED_SEXPR);
    Ok(())
}

#[test]
fn variable_fields_keep_sigil_segment() -> eyre::Result<()> {
    let tmpl = parse("{{ with $x := . }}{{ $x.Y.Z }}{{ end }}")?;
    let Node::With(with) = &tmpl.tree.root.nodes[0] else {
        eyre::bail!("expected with node");
    };
    assert_eq!(with.pipe.decl.len(), 1);
    assert_eq!(with.pipe.decl[0].name(), "$x");
    assert!(!with.pipe.is_assign);

    let Node::Action(action) = &with.list.nodes[0] else {
        eyre::bail!("expected action node");
    };
    let Node::Variable(variable) = &action.pipe.cmds[0].args[0] else {
        eyre::bail!("expected variable node");
    };
    assert_eq!(variable.ident, vec!["$x", "Y", "Z"]);
    Ok(())
}

#[test]
fn parenthesized_term_with_fields_is_a_chain() -> eyre::Result<()> {
    let tmpl = parse(r#"{{ (index . "a").Foo.Bar }}"#)?;
    let Node::Action(action) = &tmpl.tree.root.nodes[0] else {
        eyre::bail!("expected action node");
    };
    let Node::Chain(chain) = &action.pipe.cmds[0].args[0] else {
        eyre::bail!("expected chain node");
    };
    assert_eq!(chain.field, vec!["Foo", "Bar"]);
    assert_eq!(chain.node.kind(), NodeKind::Pipe);
    Ok(())
}

#[test]
fn pipeline_commands_and_arguments() -> eyre::Result<()> {
    let tmpl = parse(r#"{{ with .Foo .Bar | println "Bar" }}{{ end }}"#)?;
    let Node::With(with) = &tmpl.tree.root.nodes[0] else {
        eyre::bail!("expected with node");
    };
    assert_eq!(with.pipe.cmds.len(), 2);
    let kinds: Vec<_> = with.pipe.cmds[0].args.iter().map(Node::kind).collect();
    assert_eq!(kinds, vec![NodeKind::Field, NodeKind::Field]);
    let kinds: Vec<_> = with.pipe.cmds[1].args.iter().map(Node::kind).collect();
    assert_eq!(kinds, vec![NodeKind::Identifier, NodeKind::String]);
    Ok(())
}

#[test]
fn else_with_chains_share_one_end() -> eyre::Result<()> {
    let tmpl = parse("{{ with .A }}a{{ else with .B }}b{{ else }}c{{ end }}")?;
    assert_eq!(tmpl.tree.root.nodes.len(), 1);
    let Node::With(outer) = &tmpl.tree.root.nodes[0] else {
        eyre::bail!("expected with node");
    };
    let else_list = outer.else_list.as_ref().ok_or_eyre("missing else list")?;
    let Node::With(inner) = &else_list.nodes[0] else {
        eyre::bail!("expected nested with node");
    };
    let inner_else = inner.else_list.as_ref().ok_or_eyre("missing inner else")?;
    assert!(matches!(&inner_else.nodes[0], Node::Text(t) if t.text == "c"));
    Ok(())
}

#[test]
fn define_and_block_create_associated_trees() -> eyre::Result<()> {
    let tmpl = parse(concat!(
        r#"{{ define "x" }}{{ .Foo }}{{ end }}"#,
        r#"{{ block "y" . }}{{ . }}{{ end }}"#,
        r#"{{ template "x" . }}"#,
    ))?;
    let names: Vec<_> = tmpl.trees().map(|t| t.name.as_str()).collect();
    assert_eq!(names, vec!["test", "x", "y"]);

    let kinds: Vec<_> = tmpl.tree.root.nodes.iter().map(Node::kind).collect();
    assert_eq!(kinds, vec![NodeKind::Template, NodeKind::Template]);
    let defined = tmpl.lookup("x").ok_or_eyre("missing define")?;
    assert!(any(defined.root_ref(), |n| n.kind() == NodeKind::Field));
    Ok(())
}

#[test]
fn empty_redefinition_keeps_the_first_body() -> eyre::Result<()> {
    let tmpl = parse(r#"{{ define "a" }}x{{ end }}{{ define "a" }} {{ end }}"#)?;
    let tree = tmpl.lookup("a").ok_or_eyre("missing define")?;
    assert!(matches!(&tree.root.nodes[0], Node::Text(t) if t.text == "x"));

    let err = parse(r#"{{ define "a" }}x{{ end }}{{ define "a" }}y{{ end }}"#)
        .expect_err("redefinition");
    assert_eq!(err, ParseError::MultipleDefinition("a".to_string()));
    Ok(())
}

#[test]
fn trim_markers_and_comments() -> eyre::Result<()> {
    let tmpl = parse("a  {{- .A -}}  b {{/* note */}}")?;
    let kinds: Vec<_> = tmpl.tree.root.nodes.iter().map(Node::kind).collect();
    assert_eq!(
        kinds,
        vec![
            NodeKind::Text,
            NodeKind::Action,
            NodeKind::Text,
            NodeKind::Comment
        ]
    );
    assert!(matches!(&tmpl.tree.root.nodes[2], Node::Text(t) if t.text == "b "));
    Ok(())
}

#[test]
fn string_escapes_are_decoded() -> eyre::Result<()> {
    let tmpl = parse(r#"{{ printf "a\tbé" `raw\n` }}"#)?;
    let Node::Action(action) = &tmpl.tree.root.nodes[0] else {
        eyre::bail!("expected action node");
    };
    let texts: Vec<_> = action.pipe.cmds[0]
        .args
        .iter()
        .filter_map(|n| match n {
            Node::String(s) => Some(s.text.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(texts, vec!["a\tb\u{e9}", "raw\\n"]);
    Ok(())
}

#[test]
fn range_allows_two_declarations_and_loop_control() -> eyre::Result<()> {
    let tmpl = parse(
        "{{ range $i, $e := . }}{{ if $i }}{{ break }}{{ end }}{{ continue }}{{ end }}",
    )?;
    let Node::Range(range) = &tmpl.tree.root.nodes[0] else {
        eyre::bail!("expected range node");
    };
    let names: Vec<_> = range.pipe.decl.iter().map(|d| d.name()).collect();
    assert_eq!(names, vec!["$i", "$e"]);
    Ok(())
}

#[test]
fn with_accepts_two_declarations() -> eyre::Result<()> {
    let tmpl = parse("{{ with $a, $b := . }}{{ $b }}{{ end }}")?;
    let Node::With(with) = &tmpl.tree.root.nodes[0] else {
        eyre::bail!("expected with node");
    };
    assert_eq!(with.pipe.decl.len(), 2);
    Ok(())
}

#[test]
fn custom_delimiters() -> eyre::Result<()> {
    let parser = RustParser::default().with_delims("[[", "]]");
    let tmpl = parser.parse("t", "[[ with .A ]]{{ .B }}[[ end ]]")?;
    let Node::With(with) = &tmpl.tree.root.nodes[0] else {
        eyre::bail!("expected with node");
    };
    assert!(matches!(&with.list.nodes[0], Node::Text(t) if t.text == "{{ .B }}"));
    assert_eq!(RustParser::default().with_delims("", "").delims(), ("{{", "}}"));
    Ok(())
}

// ===========================================================================
// errors
// ===========================================================================

#[test]
fn rejects_malformed_templates() {
    let cases = [
        ("{{ $x }}", "undefined variable \"$x\""),
        ("{{ end }}", "unexpected {{end}}"),
        ("{{ else }}", "unexpected {{else}}"),
        ("{{ with }}{{ end }}", "missing value for with"),
        ("{{ with .A }}", "unexpected EOF"),
        ("{{ break }}", "{{break}} outside {{range}}"),
        ("{{ if $a, $b := . }}{{ end }}", "too many declarations in if"),
        ("{{ with $a, $b, $c := . }}{{ end }}", "too many declarations in with"),
        ("{{ .A | \"x\" }}", "non executable command in pipeline stage 2"),
        ("{{ with .A }}{{ else }}{{ else }}{{ end }}", "expected end; found {{else}}"),
        ("{{ \"a\".B }}", "unexpected . after term String"),
        ("{{ template .A }}", "unexpected \".A\" in template clause"),
    ];
    for (src, expected) in cases {
        let err = parse(src).expect_err(src);
        similar_asserts::assert_eq!(syntax_message(&err), expected, "source: {src}");
    }
}

#[test]
fn rejects_malformed_literals() {
    let cases = [
        (r#"{{ "\777" }}"#, r#"invalid syntax in string "\777""#),
        (r"{{ '\777' }}", r"malformed character constant: '\777'"),
        ("{{ 'ab' }}", "malformed character constant: 'ab'"),
        ("{{ '' }}", "malformed character constant: ''"),
        ("{{ 1e }}", "bad number syntax: \"1e\""),
        ("{{ 2.5E+ }}", "bad number syntax: \"2.5E+\""),
    ];
    for (src, expected) in cases {
        let err = parse(src).expect_err(src);
        similar_asserts::assert_eq!(syntax_message(&err), expected, "source: {src}");
    }

    let tmpl = parse(r#"{{ "\377" }}{{ '\101' }}{{ 1e3 }}{{ 0x1p-2 }}"#)
        .expect("in-range literals parse");
    let Node::Action(action) = &tmpl.tree.root.nodes[0] else {
        panic!("expected action node");
    };
    let Node::String(string) = &action.pipe.cmds[0].args[0] else {
        panic!("expected string node");
    };
    assert_eq!(string.text, "\u{ff}");
}

#[test]
fn declared_variables_go_out_of_scope_after_end() {
    let err = parse("{{ with $x := . }}{{ $x }}{{ end }}{{ $x }}").expect_err("out of scope");
    assert_eq!(syntax_message(&err), "undefined variable \"$x\"");
}

#[test]
fn errors_carry_line_and_column() {
    let err = parse("a\n{{ end }}").expect_err("stray end");
    assert_eq!(err.location(), Some(LineCol { line: 2, column: 4 }));
    assert_eq!(err.to_string(), "template: test:2:4: unexpected {{end}}");

    let err = parse("{{ \"abc }}").expect_err("unterminated");
    assert!(matches!(err, ParseError::Lex { .. }));
}
