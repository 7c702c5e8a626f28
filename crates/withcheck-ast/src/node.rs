use std::fmt;

/// Byte offset of a node or token in the template source.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Pos(pub usize);

impl Pos {
    #[must_use]
    pub fn offset(self) -> usize {
        self.0
    }
}

impl fmt::Display for Pos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "offset {}", self.0)
    }
}

/// Discriminant of a template node, without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum NodeKind {
    Text,
    Comment,
    Action,
    If,
    Range,
    With,
    Template,
    Break,
    Continue,
    List,
    Pipe,
    Command,
    Field,
    Identifier,
    Variable,
    Chain,
    Dot,
    Nil,
    Bool,
    Number,
    String,
}

impl NodeKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Text => "Text",
            Self::Comment => "Comment",
            Self::Action => "Action",
            Self::If => "If",
            Self::Range => "Range",
            Self::With => "With",
            Self::Template => "Template",
            Self::Break => "Break",
            Self::Continue => "Continue",
            Self::List => "List",
            Self::Pipe => "Pipe",
            Self::Command => "Command",
            Self::Field => "Field",
            Self::Identifier => "Identifier",
            Self::Variable => "Variable",
            Self::Chain => "Chain",
            Self::Dot => "Dot",
            Self::Nil => "Nil",
            Self::Bool => "Bool",
            Self::Number => "Number",
            Self::String => "String",
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A node of a parsed template tree.
///
/// Structural parts that always have a fixed type (the pipe of an action,
/// the commands of a pipe, ...) are stored as their concrete struct. Use
/// [`NodeRef`] to look at any of them uniformly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Text(TextNode),
    Comment(CommentNode),
    /// `{{ pipeline }}`
    Action(ActionNode),
    If(BranchNode),
    Range(BranchNode),
    /// `{{ with pipeline }} list {{ else }} list {{ end }}`
    With(BranchNode),
    /// `{{ template "name" pipeline }}`
    Template(TemplateNode),
    Break(Pos),
    Continue(Pos),
    /// A parenthesized pipeline used as an argument.
    Pipe(PipeNode),
    Field(FieldNode),
    Identifier(IdentifierNode),
    Variable(VariableNode),
    Chain(ChainNode),
    Dot(Pos),
    Nil(Pos),
    Bool(BoolNode),
    Number(NumberNode),
    String(StringNode),
}

impl Node {
    #[must_use]
    pub fn view(&self) -> NodeRef<'_> {
        NodeRef::from(self)
    }

    #[must_use]
    pub fn kind(&self) -> NodeKind {
        self.view().kind()
    }

    #[must_use]
    pub fn pos(&self) -> Pos {
        self.view().pos()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextNode {
    pub pos: Pos,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentNode {
    pub pos: Pos,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionNode {
    pub pos: Pos,
    pub pipe: PipeNode,
}

/// Shared shape of `if`, `range` and `with`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchNode {
    pub pos: Pos,
    pub pipe: PipeNode,
    pub list: ListNode,
    pub else_list: Option<ListNode>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateNode {
    pub pos: Pos,
    pub name: String,
    pub pipe: Option<PipeNode>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListNode {
    pub pos: Pos,
    pub nodes: Vec<Node>,
}

impl ListNode {
    #[must_use]
    pub fn new(pos: Pos) -> Self {
        Self {
            pos,
            nodes: Vec::new(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// A pipeline with optional variable declarations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipeNode {
    pub pos: Pos,
    /// `$x = ...` rather than `$x := ...`.
    pub is_assign: bool,
    pub decl: Vec<VariableNode>,
    pub cmds: Vec<CommandNode>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandNode {
    pub pos: Pos,
    pub args: Vec<Node>,
}

/// `.Foo.Bar`, stored without the leading dots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldNode {
    pub pos: Pos,
    pub ident: Vec<String>,
}

/// A function name such as `printf`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentifierNode {
    pub pos: Pos,
    pub ident: String,
}

/// `$x.Foo`; the first segment keeps the `$` sigil.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableNode {
    pub pos: Pos,
    pub ident: Vec<String>,
}

impl VariableNode {
    /// The variable itself, without trailing field accesses.
    #[must_use]
    pub fn name(&self) -> &str {
        self.ident.first().map_or("", String::as_str)
    }
}

/// `(pipeline).Foo.Bar`: field access on an arbitrary term.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainNode {
    pub pos: Pos,
    pub node: Box<Node>,
    pub field: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoolNode {
    pub pos: Pos,
    pub value: bool,
}

/// Numbers and character constants, kept as written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NumberNode {
    pub pos: Pos,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StringNode {
    pub pos: Pos,
    /// The literal as written, including quotes.
    pub quoted: String,
    pub text: String,
}

/// Borrowed view over every kind of node in a tree.
#[derive(Debug, Clone, Copy)]
pub enum NodeRef<'a> {
    Text(&'a TextNode),
    Comment(&'a CommentNode),
    Action(&'a ActionNode),
    If(&'a BranchNode),
    Range(&'a BranchNode),
    With(&'a BranchNode),
    Template(&'a TemplateNode),
    Break(Pos),
    Continue(Pos),
    List(&'a ListNode),
    Pipe(&'a PipeNode),
    Command(&'a CommandNode),
    Field(&'a FieldNode),
    Identifier(&'a IdentifierNode),
    Variable(&'a VariableNode),
    Chain(&'a ChainNode),
    Dot(Pos),
    Nil(Pos),
    Bool(&'a BoolNode),
    Number(&'a NumberNode),
    String(&'a StringNode),
}

impl<'a> From<&'a Node> for NodeRef<'a> {
    fn from(node: &'a Node) -> Self {
        match node {
            Node::Text(n) => Self::Text(n),
            Node::Comment(n) => Self::Comment(n),
            Node::Action(n) => Self::Action(n),
            Node::If(n) => Self::If(n),
            Node::Range(n) => Self::Range(n),
            Node::With(n) => Self::With(n),
            Node::Template(n) => Self::Template(n),
            Node::Break(pos) => Self::Break(*pos),
            Node::Continue(pos) => Self::Continue(*pos),
            Node::Pipe(n) => Self::Pipe(n),
            Node::Field(n) => Self::Field(n),
            Node::Identifier(n) => Self::Identifier(n),
            Node::Variable(n) => Self::Variable(n),
            Node::Chain(n) => Self::Chain(n),
            Node::Dot(pos) => Self::Dot(*pos),
            Node::Nil(pos) => Self::Nil(*pos),
            Node::Bool(n) => Self::Bool(n),
            Node::Number(n) => Self::Number(n),
            Node::String(n) => Self::String(n),
        }
    }
}

impl<'a> From<&'a ListNode> for NodeRef<'a> {
    fn from(list: &'a ListNode) -> Self {
        Self::List(list)
    }
}

impl<'a> From<&'a PipeNode> for NodeRef<'a> {
    fn from(pipe: &'a PipeNode) -> Self {
        Self::Pipe(pipe)
    }
}

impl<'a> NodeRef<'a> {
    #[must_use]
    pub fn kind(&self) -> NodeKind {
        match self {
            Self::Text(_) => NodeKind::Text,
            Self::Comment(_) => NodeKind::Comment,
            Self::Action(_) => NodeKind::Action,
            Self::If(_) => NodeKind::If,
            Self::Range(_) => NodeKind::Range,
            Self::With(_) => NodeKind::With,
            Self::Template(_) => NodeKind::Template,
            Self::Break(_) => NodeKind::Break,
            Self::Continue(_) => NodeKind::Continue,
            Self::List(_) => NodeKind::List,
            Self::Pipe(_) => NodeKind::Pipe,
            Self::Command(_) => NodeKind::Command,
            Self::Field(_) => NodeKind::Field,
            Self::Identifier(_) => NodeKind::Identifier,
            Self::Variable(_) => NodeKind::Variable,
            Self::Chain(_) => NodeKind::Chain,
            Self::Dot(_) => NodeKind::Dot,
            Self::Nil(_) => NodeKind::Nil,
            Self::Bool(_) => NodeKind::Bool,
            Self::Number(_) => NodeKind::Number,
            Self::String(_) => NodeKind::String,
        }
    }

    #[must_use]
    pub fn pos(&self) -> Pos {
        match self {
            Self::Break(pos) | Self::Continue(pos) | Self::Dot(pos) | Self::Nil(pos) => *pos,
            Self::Text(n) => n.pos,
            Self::Comment(n) => n.pos,
            Self::Action(n) => n.pos,
            Self::If(n) | Self::Range(n) | Self::With(n) => n.pos,
            Self::Template(n) => n.pos,
            Self::List(n) => n.pos,
            Self::Pipe(n) => n.pos,
            Self::Command(n) => n.pos,
            Self::Field(n) => n.pos,
            Self::Identifier(n) => n.pos,
            Self::Variable(n) => n.pos,
            Self::Chain(n) => n.pos,
            Self::Bool(n) => n.pos,
            Self::Number(n) => n.pos,
            Self::String(n) => n.pos,
        }
    }

    /// Direct children in source order.
    #[must_use]
    pub fn children(&self) -> Vec<NodeRef<'a>> {
        match *self {
            Self::List(list) => list.nodes.iter().map(NodeRef::from).collect(),
            Self::Action(action) => vec![Self::Pipe(&action.pipe)],
            Self::If(branch) | Self::Range(branch) | Self::With(branch) => {
                let mut out = vec![Self::Pipe(&branch.pipe), Self::List(&branch.list)];
                if let Some(else_list) = &branch.else_list {
                    out.push(Self::List(else_list));
                }
                out
            }
            Self::Template(template) => template.pipe.iter().map(Self::Pipe).collect(),
            Self::Pipe(pipe) => pipe
                .decl
                .iter()
                .map(Self::Variable)
                .chain(pipe.cmds.iter().map(Self::Command))
                .collect(),
            Self::Command(cmd) => cmd.args.iter().map(NodeRef::from).collect(),
            Self::Chain(chain) => vec![NodeRef::from(chain.node.as_ref())],
            Self::Text(_)
            | Self::Comment(_)
            | Self::Break(_)
            | Self::Continue(_)
            | Self::Field(_)
            | Self::Identifier(_)
            | Self::Variable(_)
            | Self::Dot(_)
            | Self::Nil(_)
            | Self::Bool(_)
            | Self::Number(_)
            | Self::String(_) => Vec::new(),
        }
    }
}
