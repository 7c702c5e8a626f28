//! Tokenizer for Go `text/template` source.
//!
//! Text outside of actions becomes a single [`TokenKind::Text`] token (with
//! trim markers already applied). Inside an action every token, including
//! runs of whitespace, is emitted so that the parser can tell `.Foo.Bar`
//! (one chained field) from `.Foo .Bar` (two arguments).

use crate::node::Pos;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Keyword {
    Block,
    Break,
    Continue,
    Define,
    Else,
    End,
    If,
    Range,
    Template,
    With,
}

impl Keyword {
    fn from_ident(ident: &str) -> Option<Self> {
        Some(match ident {
            "block" => Self::Block,
            "break" => Self::Break,
            "continue" => Self::Continue,
            "define" => Self::Define,
            "else" => Self::Else,
            "end" => Self::End,
            "if" => Self::If,
            "range" => Self::Range,
            "template" => Self::Template,
            "with" => Self::With,
            _ => return None,
        })
    }

    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::Block => "block",
            Self::Break => "break",
            Self::Continue => "continue",
            Self::Define => "define",
            Self::Else => "else",
            Self::End => "end",
            Self::If => "if",
            Self::Range => "range",
            Self::Template => "template",
            Self::With => "with",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TokenKind {
    Text,
    Comment,
    LeftDelim,
    RightDelim,
    Space,
    Identifier,
    Keyword(Keyword),
    Field,
    Variable,
    Dot,
    /// `:=`
    Declare,
    /// `=`
    Assign,
    Comma,
    Pipe,
    LeftParen,
    RightParen,
    String,
    RawString,
    CharConstant,
    Number,
    Bool,
    Nil,
    Eof,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Token {
    pub kind: TokenKind,
    pub pos: Pos,
    pub val: String,
}

impl Token {
    pub(crate) fn describe(&self) -> String {
        match self.kind {
            TokenKind::Eof => "EOF".to_string(),
            TokenKind::Keyword(kw) => format!("<{}>", kw.as_str()),
            TokenKind::Space => "space".to_string(),
            TokenKind::Text if self.val.chars().count() > 10 => {
                format!("{:?}...", self.val.chars().take(10).collect::<String>())
            }
            _ => format!("{:?}", self.val),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct LexError {
    pub pos: Pos,
    pub message: String,
}

const SPACE_CHARS: &[char] = &[' ', '\t', '\r', '\n'];

fn is_space(c: char) -> bool {
    SPACE_CHARS.contains(&c)
}

fn is_alphanumeric(c: char) -> bool {
    c == '_' || c.is_alphanumeric()
}

fn has_left_trim_marker(s: &str) -> bool {
    let mut chars = s.chars();
    chars.next() == Some('-') && chars.next().is_some_and(is_space)
}

fn has_right_trim_marker(s: &str) -> bool {
    let mut chars = s.chars();
    chars.next().is_some_and(is_space) && chars.next() == Some('-')
}

pub(crate) struct Lexer<'a> {
    src: &'a str,
    left_delim: &'a str,
    right_delim: &'a str,
    pos: usize,
    paren_depth: usize,
    trim_next_text: bool,
    tokens: Vec<Token>,
}

impl<'a> Lexer<'a> {
    pub(crate) fn new(src: &'a str, left_delim: &'a str, right_delim: &'a str) -> Self {
        Self {
            src,
            left_delim,
            right_delim,
            pos: 0,
            paren_depth: 0,
            trim_next_text: false,
            tokens: Vec::new(),
        }
    }

    pub(crate) fn tokenize(mut self) -> Result<Vec<Token>, LexError> {
        while self.pos < self.src.len() {
            self.lex_text()?;
        }
        self.tokens.push(Token {
            kind: TokenKind::Eof,
            pos: Pos(self.src.len()),
            val: String::new(),
        });
        Ok(self.tokens)
    }

    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn peek_char(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn peek_char_at(&self, n: usize) -> Option<char> {
        self.rest().chars().nth(n)
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek_char()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn emit(&mut self, kind: TokenKind, start: usize) {
        self.tokens.push(Token {
            kind,
            pos: Pos(start),
            val: self.src[start..self.pos].to_string(),
        });
    }

    fn error<T>(&self, pos: usize, message: impl Into<String>) -> Result<T, LexError> {
        Err(LexError {
            pos: Pos(pos),
            message: message.into(),
        })
    }

    /// Lex plain text up to (and including) the next action.
    fn lex_text(&mut self) -> Result<(), LexError> {
        let text_start = self.pos;
        let (text_end, action) = match self.rest().find(self.left_delim) {
            Some(idx) => (self.pos + idx, true),
            None => (self.src.len(), false),
        };
        let after_delim = text_end + self.left_delim.len();
        let trim_left = action && has_left_trim_marker(&self.src[after_delim..]);

        let mut text = &self.src[text_start..text_end];
        let mut start = text_start;
        if self.trim_next_text {
            let trimmed = text.trim_start_matches(SPACE_CHARS);
            start += text.len() - trimmed.len();
            text = trimmed;
            self.trim_next_text = false;
        }
        if trim_left {
            text = text.trim_end_matches(SPACE_CHARS);
        }
        if !text.is_empty() {
            self.tokens.push(Token {
                kind: TokenKind::Text,
                pos: Pos(start),
                val: text.to_string(),
            });
        }

        self.pos = text_end;
        if !action {
            return Ok(());
        }
        self.lex_left_delim(trim_left)
    }

    fn lex_left_delim(&mut self, trim_left: bool) -> Result<(), LexError> {
        let start = self.pos;
        self.pos += self.left_delim.len();
        if trim_left {
            self.pos += 2;
        }
        if self.rest().starts_with("/*") {
            return self.lex_comment(start);
        }
        self.tokens.push(Token {
            kind: TokenKind::LeftDelim,
            pos: Pos(start),
            val: self.left_delim.to_string(),
        });
        self.paren_depth = 0;
        self.lex_inside_action()
    }

    fn lex_comment(&mut self, delim_start: usize) -> Result<(), LexError> {
        let start = self.pos;
        let Some(end) = self.rest()[2..].find("*/") else {
            return self.error(delim_start, "unclosed comment");
        };
        self.pos += 2 + end + 2;
        let text = self.src[start..self.pos].to_string();
        let (delim, trim) = self.at_right_delim();
        if !delim {
            return self.error(delim_start, "comment ends before closing delimiter");
        }
        if trim {
            self.pos += 2;
        }
        self.pos += self.right_delim.len();
        self.trim_next_text = trim;
        self.tokens.push(Token {
            kind: TokenKind::Comment,
            pos: Pos(start),
            val: text,
        });
        Ok(())
    }

    fn at_right_delim(&self) -> (bool, bool) {
        let rest = self.rest();
        if has_right_trim_marker(rest) && rest[2..].starts_with(self.right_delim) {
            return (true, true);
        }
        (rest.starts_with(self.right_delim), false)
    }

    fn at_terminator(&self) -> bool {
        match self.peek_char() {
            None => true,
            Some(c) if is_space(c) => true,
            Some('.' | ',' | '|' | ':' | ')' | '(' | '=') => true,
            Some(_) => self.rest().starts_with(self.right_delim),
        }
    }

    fn lex_inside_action(&mut self) -> Result<(), LexError> {
        loop {
            let (delim, trim) = self.at_right_delim();
            if delim {
                let start = self.pos;
                if self.paren_depth > 0 {
                    return self.error(start, "unclosed left paren");
                }
                if trim {
                    self.pos += 2;
                }
                self.pos += self.right_delim.len();
                self.trim_next_text = trim;
                self.tokens.push(Token {
                    kind: TokenKind::RightDelim,
                    pos: Pos(start),
                    val: self.right_delim.to_string(),
                });
                return Ok(());
            }

            let start = self.pos;
            let Some(c) = self.peek_char() else {
                return self.error(start, "unclosed action");
            };
            match c {
                c if is_space(c) => self.lex_space(),
                '=' => {
                    self.bump();
                    self.emit(TokenKind::Assign, start);
                }
                ':' => {
                    self.bump();
                    if self.bump() != Some('=') {
                        return self.error(start, "expected :=");
                    }
                    self.emit(TokenKind::Declare, start);
                }
                '|' => {
                    self.bump();
                    self.emit(TokenKind::Pipe, start);
                }
                ',' => {
                    self.bump();
                    self.emit(TokenKind::Comma, start);
                }
                '"' => self.lex_quote()?,
                '`' => self.lex_raw_quote()?,
                '\'' => self.lex_char()?,
                '$' => self.lex_field_or_variable(TokenKind::Variable)?,
                '.' if self.peek_char_at(1).is_some_and(|c| c.is_ascii_digit()) => {
                    self.lex_number()?;
                }
                '.' => self.lex_field_or_variable(TokenKind::Field)?,
                '+' | '-' | '0'..='9' => self.lex_number()?,
                '(' => {
                    self.bump();
                    self.paren_depth += 1;
                    self.emit(TokenKind::LeftParen, start);
                }
                ')' => {
                    self.bump();
                    if self.paren_depth == 0 {
                        return self.error(start, "unexpected right paren");
                    }
                    self.paren_depth -= 1;
                    self.emit(TokenKind::RightParen, start);
                }
                c if is_alphanumeric(c) => self.lex_identifier()?,
                c => {
                    return self.error(start, format!("unrecognized character in action: {c:?}"));
                }
            }
        }
    }

    fn lex_space(&mut self) {
        let start = self.pos;
        while let Some(c) = self.peek_char() {
            if !is_space(c) {
                break;
            }
            // a trim-marked closing delimiter starts with a space
            if has_right_trim_marker(self.rest())
                && self.rest()[2..].starts_with(self.right_delim)
            {
                break;
            }
            self.bump();
        }
        if self.pos > start {
            self.emit(TokenKind::Space, start);
        }
    }

    fn lex_identifier(&mut self) -> Result<(), LexError> {
        let start = self.pos;
        while self.peek_char().is_some_and(is_alphanumeric) {
            self.bump();
        }
        if !self.at_terminator() {
            return self.error(self.pos, format!("bad character {:?}", self.peek_char().unwrap_or(' ')));
        }
        let word = &self.src[start..self.pos];
        let kind = match word {
            "true" | "false" => TokenKind::Bool,
            "nil" => TokenKind::Nil,
            _ => Keyword::from_ident(word).map_or(TokenKind::Identifier, TokenKind::Keyword),
        };
        self.emit(kind, start);
        Ok(())
    }

    /// `kind` is `Field` for a leading `.` and `Variable` for a leading `$`.
    fn lex_field_or_variable(&mut self, kind: TokenKind) -> Result<(), LexError> {
        let start = self.pos;
        self.bump();
        if self.at_terminator() {
            let kind = if kind == TokenKind::Variable {
                TokenKind::Variable
            } else {
                TokenKind::Dot
            };
            self.emit(kind, start);
            return Ok(());
        }
        while self.peek_char().is_some_and(is_alphanumeric) {
            self.bump();
        }
        if !self.at_terminator() {
            return self.error(self.pos, format!("bad character {:?}", self.peek_char().unwrap_or(' ')));
        }
        self.emit(kind, start);
        Ok(())
    }

    fn lex_quote(&mut self) -> Result<(), LexError> {
        let start = self.pos;
        self.bump();
        loop {
            match self.bump() {
                Some('\\') => {
                    if matches!(self.bump(), None | Some('\n')) {
                        return self.error(start, "unterminated quoted string");
                    }
                }
                None | Some('\n') => return self.error(start, "unterminated quoted string"),
                Some('"') => break,
                Some(_) => {}
            }
        }
        self.emit(TokenKind::String, start);
        Ok(())
    }

    fn lex_raw_quote(&mut self) -> Result<(), LexError> {
        let start = self.pos;
        self.bump();
        loop {
            match self.bump() {
                None => return self.error(start, "unterminated raw quoted string"),
                Some('`') => break,
                Some(_) => {}
            }
        }
        self.emit(TokenKind::RawString, start);
        Ok(())
    }

    fn lex_char(&mut self) -> Result<(), LexError> {
        let start = self.pos;
        self.bump();
        loop {
            match self.bump() {
                Some('\\') => {
                    if matches!(self.bump(), None | Some('\n')) {
                        return self.error(start, "unterminated character constant");
                    }
                }
                None | Some('\n') => return self.error(start, "unterminated character constant"),
                Some('\'') => break,
                Some(_) => {}
            }
        }
        self.emit(TokenKind::CharConstant, start);
        Ok(())
    }

    fn accept_run(&mut self, valid: impl Fn(char) -> bool) -> usize {
        let mut n = 0;
        while self.peek_char().is_some_and(&valid) {
            self.bump();
            n += 1;
        }
        n
    }

    fn lex_number(&mut self) -> Result<(), LexError> {
        let start = self.pos;
        if matches!(self.peek_char(), Some('+' | '-')) {
            self.bump();
        }
        let mut digits = 0;
        let rest = self.rest();
        let hex = rest.starts_with("0x") || rest.starts_with("0X");
        if hex
            || rest.starts_with("0o")
            || rest.starts_with("0O")
            || rest.starts_with("0b")
            || rest.starts_with("0B")
        {
            self.bump();
            self.bump();
            digits += self.accept_run(|c| c == '_' || c.is_ascii_hexdigit());
        } else {
            digits += self.accept_run(|c| c == '_' || c.is_ascii_digit());
        }
        if self.peek_char() == Some('.') {
            self.bump();
            digits += self.accept_run(|c| c == '_' || c.is_ascii_hexdigit() && (hex || c.is_ascii_digit()));
        }
        if digits > 0 {
            let exponent = if hex { ['p', 'P'] } else { ['e', 'E'] };
            if self.peek_char().is_some_and(|c| exponent.contains(&c)) {
                self.bump();
                if matches!(self.peek_char(), Some('+' | '-')) {
                    self.bump();
                }
                if self.accept_run(|c| c == '_' || c.is_ascii_digit()) == 0 {
                    return self.error(
                        start,
                        format!("bad number syntax: {:?}", &self.src[start..self.pos]),
                    );
                }
            }
            if self.peek_char() == Some('i') {
                self.bump();
            }
        }
        if digits == 0 || self.peek_char().is_some_and(is_alphanumeric) {
            self.bump();
            return self.error(start, format!("bad number syntax: {:?}", &self.src[start..self.pos]));
        }
        self.emit(TokenKind::Number, start);
        Ok(())
    }
}
