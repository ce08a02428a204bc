//! Abstract Syntax Tree types for shot templates

/// Byte range in source text
pub type Span = std::ops::Range<usize>;

/// AST node with source location
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned<T> {
    pub node: T,
    pub span: Span,
}

impl<T> Spanned<T> {
    pub fn new(node: T, span: Span) -> Self {
        Self { node, span }
    }
}

/// Valid identifier (alphanumeric + underscore, starts with letter/_)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identifier(pub String);

impl Identifier {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Identifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Literal values that can appear directly in an expression
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Nil,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    /// `!x` or `not x`
    Not,
    /// `-x`
    Neg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    NotEq,
    Less,
    LessOrEqual,
    Greater,
    GreaterOrEqual,
    And,
    Or,
}

impl BinaryOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
            BinaryOp::Eq => "==",
            BinaryOp::NotEq => "!=",
            BinaryOp::Less => "<",
            BinaryOp::LessOrEqual => "<=",
            BinaryOp::Greater => ">",
            BinaryOp::GreaterOrEqual => ">=",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
        }
    }
}

/// Expression evaluated inside `{{ }}` markers and directive conditions
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Literal),
    /// Variable lookup: `name`
    Variable(Identifier),
    /// Invoke the trailing block: `yield`
    Yield,
    /// Property access: `user.name`, `items.0`
    Property {
        target: Box<Spanned<Expr>>,
        name: Spanned<String>,
    },
    /// Index access: `items[0]`, `user["name"]`
    Index {
        target: Box<Spanned<Expr>>,
        index: Box<Spanned<Expr>>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Spanned<Expr>>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Spanned<Expr>>,
        right: Box<Spanned<Expr>>,
    },
}

/// Loop variable binding: `for item in ...` or `for key, value in ...`
#[derive(Debug, Clone, PartialEq)]
pub enum LoopBinding {
    Single(Spanned<Identifier>),
    Pair(Spanned<Identifier>, Spanned<Identifier>),
}

/// A single directive line, parsed but not yet nested
#[derive(Debug, Clone, PartialEq)]
pub enum Directive {
    /// Comment-only or empty directive: contributes nothing
    Comment,
    If(Spanned<Expr>),
    Elsif(Spanned<Expr>),
    Unless(Spanned<Expr>),
    Else,
    End,
    For {
        binding: LoopBinding,
        iterable: Spanned<Expr>,
    },
    /// `% yield` emits the block content as its own output line
    Yield,
}

impl Directive {
    /// Keyword used in error messages
    pub fn keyword(&self) -> &'static str {
        match self {
            Directive::Comment => "#",
            Directive::If(_) => "if",
            Directive::Elsif(_) => "elsif",
            Directive::Unless(_) => "unless",
            Directive::Else => "else",
            Directive::End => "end",
            Directive::For { .. } => "for",
            Directive::Yield => "yield",
        }
    }
}

/// A piece of an output line
#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    /// Text emitted verbatim
    Text(String),
    /// `{{ expr }}` marker
    Expr(Spanned<Expr>),
}

/// An output line split into verbatim text and markers
#[derive(Debug, Clone, PartialEq)]
pub struct OutputLine {
    pub segments: Vec<Segment>,
}

impl OutputLine {
    /// True when the line has no markers to evaluate
    pub fn is_static(&self) -> bool {
        self.segments.iter().all(|s| matches!(s, Segment::Text(_)))
    }
}

/// One arm of a conditional
#[derive(Debug, Clone, PartialEq)]
pub struct Branch {
    pub condition: Spanned<Expr>,
    pub body: Vec<Node>,
}

/// Compiled template tree
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Output(OutputLine),
    Conditional {
        branches: Vec<Branch>,
        otherwise: Option<Vec<Node>>,
    },
    Loop {
        binding: LoopBinding,
        iterable: Spanned<Expr>,
        body: Vec<Node>,
    },
    Yield(Span),
}
