use std::collections::BTreeMap;

use crate::lexer::{Keyword, LexError, Lexer, Token, TokenKind};
use crate::node::{
    ActionNode, BoolNode, BranchNode, ChainNode, CommandNode, CommentNode, FieldNode,
    IdentifierNode, ListNode, Node, NumberNode, PipeNode, Pos, StringNode, TemplateNode, TextNode,
    VariableNode,
};
use crate::source_map::SourceMap;
use crate::{ParseError, Template, TemplateParser, Tree};

pub const DEFAULT_LEFT_DELIM: &str = "{{";
pub const DEFAULT_RIGHT_DELIM: &str = "}}";

/// Pure-Rust parser for Go `text/template` source.
///
/// Function names are not resolved: any identifier is accepted as a
/// function, since templates are linted without their function map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RustParser {
    left_delim: String,
    right_delim: String,
}

impl Default for RustParser {
    fn default() -> Self {
        Self {
            left_delim: DEFAULT_LEFT_DELIM.to_string(),
            right_delim: DEFAULT_RIGHT_DELIM.to_string(),
        }
    }
}

impl RustParser {
    /// Use custom action delimiters. An empty delimiter selects the default.
    #[must_use]
    pub fn with_delims(mut self, left: impl Into<String>, right: impl Into<String>) -> Self {
        let (left, right) = (left.into(), right.into());
        self.left_delim = if left.is_empty() {
            DEFAULT_LEFT_DELIM.to_string()
        } else {
            left
        };
        self.right_delim = if right.is_empty() {
            DEFAULT_RIGHT_DELIM.to_string()
        } else {
            right
        };
        self
    }

    #[must_use]
    pub fn delims(&self) -> (&str, &str) {
        (&self.left_delim, &self.right_delim)
    }
}

impl TemplateParser for RustParser {
    fn parse(&self, name: &str, src: &str) -> Result<Template, ParseError> {
        let source_map = SourceMap::new(src);
        let tokens = Lexer::new(src, &self.left_delim, &self.right_delim)
            .tokenize()
            .map_err(|LexError { pos, message }| ParseError::Lex {
                name: name.to_string(),
                pos,
                location: source_map.resolve(src, pos),
                message,
            })?;

        let mut parser = Parser {
            name,
            src,
            source_map: &source_map,
            tokens,
            idx: 0,
            vars: vec!["$".to_string()],
            range_depth: 0,
            associated: BTreeMap::new(),
        };
        let root = parser.parse_root()?;
        tracing::trace!(
            template = name,
            nodes = root.nodes.len(),
            associated = parser.associated.len(),
            "parsed template"
        );

        let associated = std::mem::take(&mut parser.associated);
        Ok(Template {
            name: name.to_string(),
            source: src.to_string(),
            tree: Tree {
                name: name.to_string(),
                root,
            },
            associated,
            source_map,
        })
    }
}

/// Marker returned by `item_list` for the token that closed the list.
enum ListEnd {
    End,
    Else(Pos),
}

enum Item {
    Node(Node),
    End(Pos),
    Else(Pos),
}

struct Parser<'a> {
    name: &'a str,
    src: &'a str,
    source_map: &'a SourceMap,
    tokens: Vec<Token>,
    idx: usize,
    /// Variables in scope, innermost last.
    vars: Vec<String>,
    range_depth: usize,
    associated: BTreeMap<String, Tree>,
}

type PResult<T> = Result<T, ParseError>;

impl<'a> Parser<'a> {
    fn error<T>(&self, pos: Pos, message: impl Into<String>) -> PResult<T> {
        Err(ParseError::Syntax {
            name: self.name.to_string(),
            pos,
            location: self.source_map.resolve(self.src, pos),
            message: message.into(),
        })
    }

    fn unexpected<T>(&self, token: &Token, context: &str) -> PResult<T> {
        self.error(
            token.pos,
            format!("unexpected {} in {context}", token.describe()),
        )
    }

    fn peek(&self) -> &Token {
        // the token stream always ends with Eof
        let last = self.tokens.len() - 1;
        &self.tokens[self.idx.min(last)]
    }

    fn next(&mut self) -> Token {
        let token = self.peek().clone();
        if self.idx < self.tokens.len() - 1 {
            self.idx += 1;
        }
        token
    }

    fn backup(&mut self) {
        self.idx = self.idx.saturating_sub(1);
    }

    fn skip_space(&mut self) {
        while self.peek().kind == TokenKind::Space {
            self.idx += 1;
        }
    }

    fn next_non_space(&mut self) -> Token {
        self.skip_space();
        self.next()
    }

    fn peek_non_space(&mut self) -> &Token {
        self.skip_space();
        self.peek()
    }

    fn expect(&mut self, kind: TokenKind, context: &str) -> PResult<Token> {
        let token = self.next_non_space();
        if token.kind != kind {
            return self.unexpected(&token, context);
        }
        Ok(token)
    }

    fn parse_root(&mut self) -> PResult<ListNode> {
        let mut root = ListNode::new(Pos(0));
        while self.peek().kind != TokenKind::Eof {
            if self.peek().kind == TokenKind::LeftDelim {
                let save = self.idx;
                self.next();
                if self.next_non_space().kind == TokenKind::Keyword(Keyword::Define) {
                    self.parse_definition()?;
                    continue;
                }
                self.idx = save;
            }
            match self.text_or_action()? {
                Item::Node(node) => root.nodes.push(node),
                Item::End(pos) => return self.error(pos, "unexpected {{end}}"),
                Item::Else(pos) => return self.error(pos, "unexpected {{else}}"),
            }
        }
        Ok(root)
    }

    /// `{{define "name"}} list {{end}}`, with the `define` keyword consumed.
    fn parse_definition(&mut self) -> PResult<()> {
        let context = "define clause";
        let token = self.next_non_space();
        let name = self.parse_template_name(&token, context)?;
        self.expect(TokenKind::RightDelim, context)?;
        let root = self.parse_body(context)?;
        self.add_tree(token.pos, name, root)
    }

    /// Body of a `define` or `block`, parsed with a fresh variable scope.
    fn parse_body(&mut self, context: &str) -> PResult<ListNode> {
        let vars = std::mem::replace(&mut self.vars, vec!["$".to_string()]);
        let range_depth = std::mem::take(&mut self.range_depth);
        let (list, end) = self.item_list()?;
        self.vars = vars;
        self.range_depth = range_depth;
        match end {
            ListEnd::End => Ok(list),
            ListEnd::Else(pos) => self.error(pos, format!("unexpected {{{{else}}}} in {context}")),
        }
    }

    fn add_tree(&mut self, pos: Pos, name: String, root: ListNode) -> PResult<()> {
        if let Some(existing) = self.associated.get(&name) {
            if is_empty_list(&root) {
                return Ok(());
            }
            if !is_empty_list(&existing.root) {
                tracing::debug!(template = %name, ?pos, "template defined twice");
                return Err(ParseError::MultipleDefinition(name));
            }
        }
        self.associated.insert(name.clone(), Tree { name, root });
        Ok(())
    }

    fn parse_template_name(&self, token: &Token, context: &str) -> PResult<String> {
        match token.kind {
            TokenKind::String | TokenKind::RawString => self.unquote(token),
            _ => self.unexpected(token, context),
        }
    }

    fn item_list(&mut self) -> PResult<(ListNode, ListEnd)> {
        let mut list = ListNode::new(self.peek_non_space().pos);
        while self.peek_non_space().kind != TokenKind::Eof {
            match self.text_or_action()? {
                Item::Node(node) => list.nodes.push(node),
                Item::End(_) => return Ok((list, ListEnd::End)),
                Item::Else(pos) => return Ok((list, ListEnd::Else(pos))),
            }
        }
        let pos = self.peek().pos;
        self.error(pos, "unexpected EOF")
    }

    fn text_or_action(&mut self) -> PResult<Item> {
        let token = self.next_non_space();
        match token.kind {
            TokenKind::Text => Ok(Item::Node(Node::Text(TextNode {
                pos: token.pos,
                text: token.val,
            }))),
            TokenKind::Comment => Ok(Item::Node(Node::Comment(CommentNode {
                pos: token.pos,
                text: token.val,
            }))),
            TokenKind::LeftDelim => self.action(),
            _ => self.unexpected(&token, "input"),
        }
    }

    /// Everything after the left delimiter of an action.
    fn action(&mut self) -> PResult<Item> {
        let token = self.next_non_space();
        let pos = token.pos;
        let node = match token.kind {
            TokenKind::Keyword(Keyword::Block) => self.block_control(pos)?,
            TokenKind::Keyword(Keyword::Break) => self.loop_control(pos, Keyword::Break)?,
            TokenKind::Keyword(Keyword::Continue) => self.loop_control(pos, Keyword::Continue)?,
            TokenKind::Keyword(Keyword::Else) => return self.else_control(),
            TokenKind::Keyword(Keyword::End) => {
                self.expect(TokenKind::RightDelim, "end")?;
                return Ok(Item::End(pos));
            }
            TokenKind::Keyword(Keyword::If) => Node::If(self.parse_control(pos, Keyword::If)?),
            TokenKind::Keyword(Keyword::Range) => {
                Node::Range(self.parse_control(pos, Keyword::Range)?)
            }
            TokenKind::Keyword(Keyword::Template) => self.template_control(pos)?,
            TokenKind::Keyword(Keyword::With) => {
                Node::With(self.parse_control(pos, Keyword::With)?)
            }
            TokenKind::Keyword(Keyword::Define) => return self.unexpected(&token, "command"),
            _ => {
                self.backup();
                Node::Action(ActionNode {
                    pos,
                    pipe: self.pipeline("command", TokenKind::RightDelim)?,
                })
            }
        };
        Ok(Item::Node(node))
    }

    fn loop_control(&mut self, pos: Pos, keyword: Keyword) -> PResult<Node> {
        let context = format!("{{{{{}}}}}", keyword.as_str());
        let token = self.next_non_space();
        if token.kind != TokenKind::RightDelim {
            return self.unexpected(&token, &context);
        }
        if self.range_depth == 0 {
            return self.error(pos, format!("{context} outside {{{{range}}}}"));
        }
        Ok(match keyword {
            Keyword::Break => Node::Break(pos),
            _ => Node::Continue(pos),
        })
    }

    fn else_control(&mut self) -> PResult<Item> {
        let peek = self.peek_non_space();
        // `{{else if ...}}` and `{{else with ...}}` read as `{{else}}{{if ...}}`
        if matches!(
            peek.kind,
            TokenKind::Keyword(Keyword::If | Keyword::With)
        ) {
            return Ok(Item::Else(peek.pos));
        }
        let token = self.expect(TokenKind::RightDelim, "else")?;
        Ok(Item::Else(token.pos))
    }

    fn parse_control(&mut self, pos: Pos, keyword: Keyword) -> PResult<BranchNode> {
        let context = keyword.as_str();
        let scope = self.vars.len();
        let pipe = self.pipeline(context, TokenKind::RightDelim)?;

        if keyword == Keyword::Range {
            self.range_depth += 1;
        }
        let (list, end) = self.item_list()?;
        if keyword == Keyword::Range {
            self.range_depth -= 1;
        }

        let else_list = match end {
            ListEnd::End => None,
            ListEnd::Else(else_pos) => {
                let chained = matches!(
                    (keyword, self.peek().kind),
                    (Keyword::If, TokenKind::Keyword(Keyword::If))
                        | (Keyword::With, TokenKind::Keyword(Keyword::With))
                );
                if chained {
                    // the nested control consumes the single shared {{end}}
                    let token = self.next();
                    let nested = self.parse_control(token.pos, keyword)?;
                    let mut list = ListNode::new(else_pos);
                    list.nodes.push(match keyword {
                        Keyword::If => Node::If(nested),
                        _ => Node::With(nested),
                    });
                    Some(list)
                } else {
                    let (list, end) = self.item_list()?;
                    if let ListEnd::Else(pos) = end {
                        return self.error(pos, "expected end; found {{else}}");
                    }
                    Some(list)
                }
            }
        };

        self.vars.truncate(scope);
        Ok(BranchNode {
            pos,
            pipe,
            list,
            else_list,
        })
    }

    fn block_control(&mut self, pos: Pos) -> PResult<Node> {
        let context = "block clause";
        let token = self.next_non_space();
        let name = self.parse_template_name(&token, context)?;
        let pipe = self.pipeline(context, TokenKind::RightDelim)?;
        let root = self.parse_body(context)?;
        self.add_tree(token.pos, name.clone(), root)?;
        Ok(Node::Template(TemplateNode {
            pos,
            name,
            pipe: Some(pipe),
        }))
    }

    fn template_control(&mut self, pos: Pos) -> PResult<Node> {
        let context = "template clause";
        let token = self.next_non_space();
        let name = self.parse_template_name(&token, context)?;
        let pipe = if self.next_non_space().kind == TokenKind::RightDelim {
            None
        } else {
            self.backup();
            Some(self.pipeline(context, TokenKind::RightDelim)?)
        };
        Ok(Node::Template(TemplateNode { pos, name, pipe }))
    }

    fn pipeline(&mut self, context: &str, end: TokenKind) -> PResult<PipeNode> {
        let mut pipe = PipeNode {
            pos: self.peek_non_space().pos,
            ..PipeNode::default()
        };

        while self.peek_non_space().kind == TokenKind::Variable {
            let save = self.idx;
            let variable = self.next();
            let next = self.peek_non_space().clone();
            let decl = VariableNode {
                pos: variable.pos,
                ident: vec![variable.val.clone()],
            };
            match next.kind {
                TokenKind::Assign | TokenKind::Declare => {
                    self.next();
                    pipe.is_assign = next.kind == TokenKind::Assign;
                    pipe.decl.push(decl);
                    self.vars.push(variable.val);
                    break;
                }
                TokenKind::Comma => {
                    self.next();
                    pipe.decl.push(decl);
                    self.vars.push(variable.val);
                    let multi = matches!(context, "range" | "with");
                    if !multi || pipe.decl.len() > 1 {
                        return self.error(next.pos, format!("too many declarations in {context}"));
                    }
                    if self.peek_non_space().kind != TokenKind::Variable {
                        let token = self.peek().clone();
                        return self.unexpected(&token, context);
                    }
                }
                _ => {
                    self.idx = save;
                    break;
                }
            }
        }

        loop {
            let token = self.next_non_space();
            match token.kind {
                kind if kind == end => {
                    self.check_pipeline(&pipe, context, token.pos)?;
                    return Ok(pipe);
                }
                TokenKind::Bool
                | TokenKind::CharConstant
                | TokenKind::Dot
                | TokenKind::Field
                | TokenKind::Identifier
                | TokenKind::Number
                | TokenKind::Nil
                | TokenKind::RawString
                | TokenKind::String
                | TokenKind::Variable
                | TokenKind::LeftParen => {
                    self.backup();
                    let cmd = self.command()?;
                    pipe.cmds.push(cmd);
                }
                _ => return self.unexpected(&token, context),
            }
        }
    }

    fn check_pipeline(&self, pipe: &PipeNode, context: &str, pos: Pos) -> PResult<()> {
        if pipe.cmds.is_empty() {
            return self.error(pos, format!("missing value for {context}"));
        }
        for (i, cmd) in pipe.cmds.iter().enumerate().skip(1) {
            if let Some(first) = cmd.args.first()
                && matches!(
                    first,
                    Node::Bool(_) | Node::Dot(_) | Node::Nil(_) | Node::Number(_) | Node::String(_)
                )
            {
                return self.error(
                    first.pos(),
                    format!("non executable command in pipeline stage {}", i + 1),
                );
            }
        }
        Ok(())
    }

    fn command(&mut self) -> PResult<CommandNode> {
        let mut cmd = CommandNode {
            pos: self.peek_non_space().pos,
            args: Vec::new(),
        };
        loop {
            self.skip_space();
            if let Some(operand) = self.operand()? {
                cmd.args.push(operand);
            }
            let token = self.next();
            match token.kind {
                TokenKind::Space => continue,
                TokenKind::RightDelim | TokenKind::RightParen => self.backup(),
                TokenKind::Pipe => {}
                _ => return self.unexpected(&token, "operand"),
            }
            break;
        }
        if cmd.args.is_empty() {
            return self.error(cmd.pos, "empty command");
        }
        Ok(cmd)
    }

    /// A term followed by any number of chained field accesses.
    fn operand(&mut self) -> PResult<Option<Node>> {
        let Some(term) = self.term()? else {
            return Ok(None);
        };
        if self.peek().kind != TokenKind::Field {
            return Ok(Some(term));
        }

        let chain_pos = self.peek().pos;
        let mut fields = Vec::new();
        while self.peek().kind == TokenKind::Field {
            let token = self.next();
            fields.push(token.val[1..].to_string());
        }
        let node = match term {
            Node::Field(mut field) => {
                field.ident.extend(fields);
                Node::Field(field)
            }
            Node::Variable(mut variable) => {
                variable.ident.extend(fields);
                Node::Variable(variable)
            }
            Node::Bool(_) | Node::String(_) | Node::Number(_) | Node::Nil(_) | Node::Dot(_) => {
                return self.error(chain_pos, format!("unexpected . after term {}", term.kind()));
            }
            term => Node::Chain(ChainNode {
                pos: chain_pos,
                node: Box::new(term),
                field: fields,
            }),
        };
        Ok(Some(node))
    }

    fn term(&mut self) -> PResult<Option<Node>> {
        let token = self.next_non_space();
        let pos = token.pos;
        let node = match token.kind {
            TokenKind::Identifier => Node::Identifier(IdentifierNode {
                pos,
                ident: token.val,
            }),
            TokenKind::Dot => Node::Dot(pos),
            TokenKind::Nil => Node::Nil(pos),
            TokenKind::Variable => {
                if !self.vars.iter().any(|v| *v == token.val) {
                    return self.error(pos, format!("undefined variable {:?}", token.val));
                }
                Node::Variable(VariableNode {
                    pos,
                    ident: vec![token.val],
                })
            }
            TokenKind::Field => Node::Field(FieldNode {
                pos,
                ident: vec![token.val[1..].to_string()],
            }),
            TokenKind::Bool => Node::Bool(BoolNode {
                pos,
                value: token.val == "true",
            }),
            TokenKind::CharConstant => {
                self.char_constant(&token)?;
                Node::Number(NumberNode {
                    pos,
                    text: token.val,
                })
            }
            TokenKind::Number => Node::Number(NumberNode {
                pos,
                text: token.val,
            }),
            TokenKind::LeftParen => {
                Node::Pipe(self.pipeline("parenthesized pipeline", TokenKind::RightParen)?)
            }
            TokenKind::String | TokenKind::RawString => {
                let text = self.unquote(&token)?;
                Node::String(StringNode {
                    pos,
                    quoted: token.val,
                    text,
                })
            }
            _ => {
                self.backup();
                return Ok(None);
            }
        };
        Ok(Some(node))
    }

    fn char_constant(&self, token: &Token) -> PResult<()> {
        let quoted = token.val.as_str();
        let decoded = unescape(&quoted[1..quoted.len() - 1]);
        let mut chars = decoded.as_deref().unwrap_or_default().chars();
        match (chars.next(), chars.next()) {
            (Some(_), None) => Ok(()),
            _ => self.error(token.pos, format!("malformed character constant: {quoted}")),
        }
    }

    fn unquote(&self, token: &Token) -> PResult<String> {
        let quoted = token.val.as_str();
        if token.kind == TokenKind::RawString {
            return Ok(quoted.trim_matches('`').to_string());
        }
        match unescape(&quoted[1..quoted.len() - 1]) {
            Some(text) => Ok(text),
            None => self.error(token.pos, format!("invalid syntax in string {quoted}")),
        }
    }
}

/// A tree holding only whitespace text and comments counts as empty, so an
/// empty `define` can be overridden.
fn is_empty_list(list: &ListNode) -> bool {
    list.nodes.iter().all(|node| match node {
        Node::Text(text) => text.text.trim().is_empty(),
        Node::Comment(_) => true,
        _ => false,
    })
}

fn unescape(s: &str) -> Option<String> {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        let escaped = match chars.next()? {
            'a' => '\u{07}',
            'b' => '\u{08}',
            'f' => '\u{0C}',
            'n' => '\n',
            'r' => '\r',
            't' => '\t',
            'v' => '\u{0B}',
            '\\' => '\\',
            '\'' => '\'',
            '"' => '"',
            'x' => hex_char(&mut chars, 2)?,
            'u' => hex_char(&mut chars, 4)?,
            'U' => hex_char(&mut chars, 8)?,
            d @ '0'..='7' => {
                let mut value = d.to_digit(8)?;
                for _ in 0..2 {
                    value = value * 8 + chars.next()?.to_digit(8)?;
                }
                if value > 0xFF {
                    return None;
                }
                char::from_u32(value)?
            }
            _ => return None,
        };
        out.push(escaped);
    }
    Some(out)
}

fn hex_char(chars: &mut std::str::Chars<'_>, len: usize) -> Option<char> {
    let mut value = 0u32;
    for _ in 0..len {
        value = value * 16 + chars.next()?.to_digit(16)?;
    }
    char::from_u32(value)
}
