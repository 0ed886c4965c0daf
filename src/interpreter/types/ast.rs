//! AST types for the Cadence DSL

use serde::{Deserialize, Serialize};
use std::fmt;

/// Source location of a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Span {
    /// Start byte offset
    pub start: usize,
    /// End byte offset
    pub end: usize,
    /// Start line (0-indexed)
    pub start_line: usize,
    /// Start column (0-indexed)
    pub start_col: usize,
    /// End line (0-indexed)
    pub end_line: usize,
    /// End column (0-indexed)
    pub end_col: usize,
}

impl Span {
    pub fn new(
        start: usize,
        end: usize,
        start_line: usize,
        start_col: usize,
        end_line: usize,
        end_col: usize,
    ) -> Self {
        Self {
            start,
            end,
            start_line,
            start_col,
            end_line,
            end_col,
        }
    }

    /// Create a span that covers both self and other
    pub fn merge(&self, other: &Span) -> Span {
        let first = if self.start <= other.start { self } else { other };
        let last = if self.end >= other.end { self } else { other };
        Span {
            start: first.start,
            end: last.end,
            start_line: first.start_line,
            start_col: first.start_col,
            end_line: last.end_line,
            end_col: last.end_col,
        }
    }

    /// `line:col` of the start, 1-based
    pub fn start_label(&self) -> String {
        format!("{}:{}", self.start_line + 1, self.start_col + 1)
    }
}

/// Renders as `line L:C - EL:EC` (1-based), the format used in diagnostics
impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "line {}:{} - {}:{}",
            self.start_line + 1,
            self.start_col + 1,
            self.end_line + 1,
            self.end_col + 1
        )
    }
}

pub(crate) fn is_default_span(span: &Span) -> bool {
    *span == Span::default()
}

/// Numeric literal
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Number {
    Int(i64),
    Real(f64),
}

/// Binary operators, including the non-short-circuiting logical ones
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
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
            BinaryOp::Mod => "%",
            BinaryOp::Pow => "^",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::And => "and",
            BinaryOp::Or => "or",
        }
    }
}

/// `type:name` pair used by function parameters and return projections
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypedName {
    pub type_name: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "is_default_span")]
    pub span: Span,
}

/// Keyword argument of a call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KwArg {
    pub name: String,
    pub value: Node,
}

/// AST node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "t", rename_all = "snake_case")]
pub enum Node {
    Number {
        v: Number,
        #[serde(default, skip_serializing_if = "is_default_span")]
        span: Span,
    },
    #[serde(rename = "string")]
    Str {
        v: String,
        #[serde(default, skip_serializing_if = "is_default_span")]
        span: Span,
    },
    Bool {
        v: bool,
        #[serde(default, skip_serializing_if = "is_default_span")]
        span: Span,
    },
    /// The wildcard literal `*`
    Any {
        #[serde(default, skip_serializing_if = "is_default_span")]
        span: Span,
    },
    /// Plain or dotted identifier
    Var {
        name: String,
        #[serde(default, skip_serializing_if = "is_default_span")]
        span: Span,
    },
    Tuple {
        items: Vec<Node>,
        #[serde(default, skip_serializing_if = "is_default_span")]
        span: Span,
    },
    List {
        items: Vec<Node>,
        #[serde(default, skip_serializing_if = "is_default_span")]
        span: Span,
    },
    /// Items are `Pair` or `Declaration` nodes, in source order
    Dict {
        items: Vec<Node>,
        #[serde(default, skip_serializing_if = "is_default_span")]
        span: Span,
    },
    Declaration {
        declared_type: String,
        name: String,
        value: Box<Node>,
        #[serde(default, skip_serializing_if = "is_default_span")]
        span: Span,
    },
    Pair {
        key: Box<Node>,
        value: Box<Node>,
        #[serde(default, skip_serializing_if = "is_default_span")]
        span: Span,
    },
    Call {
        name: String,
        args: Vec<Node>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        kwargs: Vec<KwArg>,
        #[serde(default, skip_serializing_if = "is_default_span")]
        span: Span,
    },
    Binop {
        op: BinaryOp,
        left: Box<Node>,
        right: Box<Node>,
        #[serde(default, skip_serializing_if = "is_default_span")]
        span: Span,
    },
    Not {
        value: Box<Node>,
        #[serde(default, skip_serializing_if = "is_default_span")]
        span: Span,
    },
    Pipe {
        steps: Vec<Node>,
        #[serde(default, skip_serializing_if = "is_default_span")]
        span: Span,
    },
    FunctionDef {
        params: Vec<TypedName>,
        body: Box<Node>,
        returns: Vec<TypedName>,
        #[serde(default, skip_serializing_if = "is_default_span")]
        span: Span,
    },
}

impl Node {
    pub fn span(&self) -> Span {
        match self {
            Node::Number { span, .. } => *span,
            Node::Str { span, .. } => *span,
            Node::Bool { span, .. } => *span,
            Node::Any { span } => *span,
            Node::Var { span, .. } => *span,
            Node::Tuple { span, .. } => *span,
            Node::List { span, .. } => *span,
            Node::Dict { span, .. } => *span,
            Node::Declaration { span, .. } => *span,
            Node::Pair { span, .. } => *span,
            Node::Call { span, .. } => *span,
            Node::Binop { span, .. } => *span,
            Node::Not { span, .. } => *span,
            Node::Pipe { span, .. } => *span,
            Node::FunctionDef { span, .. } => *span,
        }
    }

    /// Tag name used in stack traces
    pub fn tag(&self) -> &'static str {
        match self {
            Node::Number { .. } => "number",
            Node::Str { .. } => "string",
            Node::Bool { .. } => "bool",
            Node::Any { .. } => "any",
            Node::Var { .. } => "var",
            Node::Tuple { .. } => "tuple",
            Node::List { .. } => "list",
            Node::Dict { .. } => "dict",
            Node::Declaration { .. } => "declaration",
            Node::Pair { .. } => "pair",
            Node::Call { .. } => "call",
            Node::Binop { .. } => "binop",
            Node::Not { .. } => "not",
            Node::Pipe { .. } => "pipe",
            Node::FunctionDef { .. } => "function_def",
        }
    }
}
