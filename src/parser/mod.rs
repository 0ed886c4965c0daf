//! PEST-based parser for the Cadence DSL
//!
//! Produces the `Node` AST used by the interpreter, with span information on
//! every node for error reporting. Synthesised nodes (operator chains, pipes,
//! inline tuples) take the merged span of their children.

use pest::iterators::Pair;
use pest::Parser;
use pest_derive::Parser;
use thiserror::Error;

use crate::interpreter::types::{BinaryOp, KwArg, Node, Number, Span, TypedName};


/* ===================== PEST Parser ===================== */

#[derive(Parser)]
#[grammar = "parser/dsl.pest"]
struct DslParser;

/* ===================== Error Types ===================== */

#[derive(Debug, Clone, Error)]
pub enum ParseError {
    /// Text did not match the grammar
    #[error("Syntax error: {0}")]
    Syntax(String, Option<Span>),
    /// Text matched but could not be turned into an AST
    #[error("{0}")]
    Build(String, Option<Span>),
}

impl ParseError {
    pub fn span(&self) -> Option<Span> {
        match self {
            ParseError::Syntax(_, span) => *span,
            ParseError::Build(_, span) => *span,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            ParseError::Syntax(msg, _) => msg,
            ParseError::Build(msg, _) => msg,
        }
    }
}

impl From<pest::error::Error<Rule>> for ParseError {
    fn from(err: pest::error::Error<Rule>) -> Self {
        let span = match err.line_col {
            pest::error::LineColLocation::Pos((line, col)) => Some(Span {
                start: 0,
                end: 0,
                start_line: line.saturating_sub(1),
                start_col: col.saturating_sub(1),
                end_line: line.saturating_sub(1),
                end_col: col,
            }),
            pest::error::LineColLocation::Span((start_line, start_col), (end_line, end_col)) => {
                Some(Span {
                    start: 0,
                    end: 0,
                    start_line: start_line.saturating_sub(1),
                    start_col: start_col.saturating_sub(1),
                    end_line: end_line.saturating_sub(1),
                    end_col: end_col.saturating_sub(1),
                })
            }
        };
        ParseError::Syntax(err.to_string(), span)
    }
}

pub type ParseResult<T> = Result<T, ParseError>;

/* ===================== Span Helpers ===================== */

/// Line-start table built once per parse
struct LineIndex<'s> {
    text: &'s str,
    line_starts: Vec<usize>,
}

impl<'s> LineIndex<'s> {
    fn new(text: &'s str) -> Self {
        let line_starts = std::iter::once(0)
            .chain(text.match_indices('\n').map(|(index, _)| index + 1))
            .collect();
        Self { text, line_starts }
    }

    /// Convert byte offset to (line, column) - 0-indexed, columns in chars
    fn line_col(&self, offset: usize) -> (usize, usize) {
        let line = self
            .line_starts
            .partition_point(|&start| start <= offset)
            .saturating_sub(1);
        let line_start = self.line_starts.get(line).copied().unwrap_or(0);
        let col = self
            .text
            .get(line_start..offset)
            .map_or(0, |prefix| prefix.chars().count());
        (line, col)
    }
}

/// Convert a PEST pair's span to our Span type
fn pair_to_span(pair: &Pair<Rule>, source: &LineIndex) -> Span {
    let pest_span = pair.as_span();
    let start = pest_span.start();
    let end = pest_span.end();

    let (start_line, start_col) = source.line_col(start);
    let (end_line, end_col) = source.line_col(end);

    Span::new(start, end, start_line, start_col, end_line, end_col)
}

fn unexpected(pair: &Pair<Rule>, source: &LineIndex, what: &str) -> ParseError {
    ParseError::Build(
        format!("Unexpected {} rule: {:?}", what, pair.as_rule()),
        Some(pair_to_span(pair, source)),
    )
}

/// Next child of a pair whose shape the grammar guarantees
fn next_inner<'i>(
    inner: &mut pest::iterators::Pairs<'i, Rule>,
    parent: Span,
    what: &str,
) -> ParseResult<Pair<'i, Rule>> {
    inner
        .next()
        .ok_or_else(|| ParseError::Build(format!("Missing {what}"), Some(parent)))
}

/* ===================== Public API ===================== */

/// Parse a whole program; the result is always a `Node::Dict`
pub fn parse_program(text: &str) -> ParseResult<Node> {
    let mut pairs = DslParser::parse(Rule::program, text)?;
    let source = &LineIndex::new(text);
    let program = next_inner(&mut pairs, Span::default(), "program")?;
    let program_span = pair_to_span(&program, source);
    let content = next_inner(&mut program.into_inner(), program_span, "program body")?;

    match content.as_rule() {
        Rule::dict | Rule::implicit_dict => build_dict(content, source),
        Rule::EOI => Ok(Node::Dict {
            items: vec![],
            span: program_span,
        }),
        _ => Err(unexpected(&content, source, "program")),
    }
}

/// Parse a single expression (guard conditions, `cadence eval`)
pub fn parse_expression(text: &str) -> ParseResult<Node> {
    let mut pairs = DslParser::parse(Rule::expression_program, text)?;
    let source = &LineIndex::new(text);
    let program = next_inner(&mut pairs, Span::default(), "expression")?;
    let program_span = pair_to_span(&program, source);
    let expr = next_inner(&mut program.into_inner(), program_span, "expression")?;
    build_node(expr, source)
}

/* ===================== AST Builder ===================== */

fn build_node(pair: Pair<Rule>, source: &LineIndex) -> ParseResult<Node> {
    let span = pair_to_span(&pair, source);

    match pair.as_rule() {
        Rule::inline_tuple => {
            let items = build_all(pair, source)?;
            Ok(Node::Tuple { items, span })
        }
        Rule::unit => build_pipe(pair, source),
        Rule::logic | Rule::comparison | Rule::sum | Rule::term => {
            build_binary_chain(pair, source)
        }
        Rule::negation => {
            let mut inner = pair.into_inner();
            let first = next_inner(&mut inner, span, "negation operand")?;
            match first.as_rule() {
                Rule::op_not => {
                    let operand = next_inner(&mut inner, span, "negation operand")?;
                    Ok(Node::Not {
                        value: Box::new(build_node(operand, source)?),
                        span,
                    })
                }
                _ => build_node(first, source),
            }
        }
        Rule::power => {
            let mut inner = pair.into_inner();
            let base = build_node(next_inner(&mut inner, span, "power base")?, source)?;
            match inner.next() {
                Some(_op) => {
                    let exponent =
                        build_node(next_inner(&mut inner, span, "exponent")?, source)?;
                    Ok(Node::Binop {
                        op: BinaryOp::Pow,
                        left: Box::new(base),
                        right: Box::new(exponent),
                        span,
                    })
                }
                None => Ok(base),
            }
        }
        Rule::juxtaposed => build_node(next_inner(&mut pair.into_inner(), span, "operand")?, source),
        Rule::function_value => build_function_value(pair, source),
        Rule::call => build_call(pair, source),
        Rule::paren => build_paren(pair, source),
        Rule::list => {
            let items = build_all(pair, source)?;
            Ok(Node::List { items, span })
        }
        Rule::dict | Rule::implicit_dict => build_dict(pair, source),
        Rule::declaration => build_declaration(pair, source),
        Rule::pair => {
            let mut inner = pair.into_inner();
            let key = build_node(next_inner(&mut inner, span, "pair key")?, source)?;
            let value = build_node(next_inner(&mut inner, span, "pair value")?, source)?;
            Ok(Node::Pair {
                key: Box::new(key),
                value: Box::new(value),
                span,
            })
        }
        Rule::number => build_number(pair.as_str(), span),
        Rule::string => {
            let content = next_inner(&mut pair.into_inner(), span, "string content")?;
            let v = match content.as_rule() {
                Rule::dq_inner => unescape(content.as_str()),
                _ => content.as_str().to_string(),
            };
            Ok(Node::Str { v, span })
        }
        Rule::boolean => Ok(Node::Bool {
            v: pair.as_str().eq_ignore_ascii_case("true"),
            span,
        }),
        Rule::wildcard => Ok(Node::Any { span }),
        Rule::name => Ok(Node::Var {
            name: pair.as_str().to_string(),
            span,
        }),
        _ => Err(unexpected(&pair, source, "expression")),
    }
}

fn build_all(pair: Pair<Rule>, source: &LineIndex) -> ParseResult<Vec<Node>> {
    pair.into_inner()
        .map(|child| build_node(child, source))
        .collect()
}

fn build_pipe(pair: Pair<Rule>, source: &LineIndex) -> ParseResult<Node> {
    let span = pair_to_span(&pair, source);
    let steps: Vec<Node> = pair
        .into_inner()
        .filter(|child| child.as_rule() != Rule::op_pipe)
        .map(|child| build_node(child, source))
        .collect::<ParseResult<_>>()?;

    if steps.len() == 1 {
        return Ok(steps.into_iter().next().unwrap_or(Node::Any { span }));
    }
    Ok(Node::Pipe { steps, span })
}

fn operator_for(rule: Rule) -> Option<BinaryOp> {
    let op = match rule {
        Rule::op_and => BinaryOp::And,
        Rule::op_or => BinaryOp::Or,
        Rule::op_eq => BinaryOp::Eq,
        Rule::op_ne => BinaryOp::Ne,
        Rule::op_ge => BinaryOp::Ge,
        Rule::op_le => BinaryOp::Le,
        Rule::op_gt => BinaryOp::Gt,
        Rule::op_lt => BinaryOp::Lt,
        Rule::op_add => BinaryOp::Add,
        Rule::op_sub => BinaryOp::Sub,
        Rule::op_mul => BinaryOp::Mul,
        Rule::op_div => BinaryOp::Div,
        Rule::op_mod => BinaryOp::Mod,
        _ => return None,
    };
    Some(op)
}

/// Left-associative chain `operand (op operand)*`; a juxtaposed operand
/// multiplies
fn build_binary_chain(pair: Pair<Rule>, source: &LineIndex) -> ParseResult<Node> {
    let span = pair_to_span(&pair, source);
    let mut inner = pair.into_inner();
    let mut left = build_node(next_inner(&mut inner, span, "left operand")?, source)?;

    while let Some(next) = inner.next() {
        let (op, right) = match operator_for(next.as_rule()) {
            Some(op) => {
                let operand = next_inner(&mut inner, span, "right operand")?;
                (op, build_node(operand, source)?)
            }
            None if next.as_rule() == Rule::juxtaposed => (BinaryOp::Mul, build_node(next, source)?),
            None => return Err(unexpected(&next, source, "operator")),
        };
        let new_span = left.span().merge(&right.span());
        left = Node::Binop {
            op,
            left: Box::new(left),
            right: Box::new(right),
            span: new_span,
        };
    }

    Ok(left)
}

fn build_dict(pair: Pair<Rule>, source: &LineIndex) -> ParseResult<Node> {
    let span = pair_to_span(&pair, source);
    let items = build_all(pair, source)?;
    Ok(Node::Dict { items, span })
}

fn build_declaration(pair: Pair<Rule>, source: &LineIndex) -> ParseResult<Node> {
    let span = pair_to_span(&pair, source);
    let mut inner = pair.into_inner();
    let declared_type = next_inner(&mut inner, span, "declared type")?
        .as_str()
        .to_string();
    let name = next_inner(&mut inner, span, "declared name")?
        .as_str()
        .to_string();
    let value = build_node(next_inner(&mut inner, span, "declared value")?, source)?;

    Ok(Node::Declaration {
        declared_type,
        name,
        value: Box::new(value),
        span,
    })
}

fn build_typed_names(pair: Pair<Rule>, source: &LineIndex) -> ParseResult<Vec<TypedName>> {
    pair.into_inner()
        .map(|typed| {
            let span = pair_to_span(&typed, source);
            let mut inner = typed.into_inner();
            let type_name = next_inner(&mut inner, span, "type")?.as_str().to_string();
            let name = next_inner(&mut inner, span, "name")?.as_str().to_string();
            Ok(TypedName {
                type_name,
                name,
                span,
            })
        })
        .collect()
}

fn build_function_value(pair: Pair<Rule>, source: &LineIndex) -> ParseResult<Node> {
    let span = pair_to_span(&pair, source);
    let mut inner = pair.into_inner();
    let params = build_typed_names(next_inner(&mut inner, span, "parameters")?, source)?;
    let body = build_node(next_inner(&mut inner, span, "function body")?, source)?;
    let returns = build_typed_names(next_inner(&mut inner, span, "return spec")?, source)?;

    Ok(Node::FunctionDef {
        params,
        body: Box::new(body),
        returns,
        span,
    })
}

fn build_call(pair: Pair<Rule>, source: &LineIndex) -> ParseResult<Node> {
    let span = pair_to_span(&pair, source);
    let mut inner = pair.into_inner();
    let name = next_inner(&mut inner, span, "callee")?.as_str().to_string();

    let mut args = Vec::new();
    let mut kwargs = Vec::new();
    for arg in inner {
        match arg.as_rule() {
            Rule::kwarg => {
                let arg_span = pair_to_span(&arg, source);
                let mut kw = arg.into_inner();
                let kw_name = next_inner(&mut kw, arg_span, "keyword")?.as_str().to_string();
                let value = build_node(next_inner(&mut kw, arg_span, "keyword value")?, source)?;
                kwargs.push(KwArg {
                    name: kw_name,
                    value,
                });
            }
            _ => {
                if !kwargs.is_empty() {
                    return Err(ParseError::Build(
                        format!("Positional argument after keyword arguments in call to '{name}'"),
                        Some(pair_to_span(&arg, source)),
                    ));
                }
                args.push(build_node(arg, source)?);
            }
        }
    }

    Ok(Node::Call {
        name,
        args,
        kwargs,
        span,
    })
}

/// `()` and `(a,)` and `(a, b)` are tuples, `(a)` is grouping
fn build_paren(pair: Pair<Rule>, source: &LineIndex) -> ParseResult<Node> {
    let span = pair_to_span(&pair, source);
    let mut trailing_comma = false;
    let mut items = Vec::new();
    for child in pair.into_inner() {
        match child.as_rule() {
            Rule::trailing_comma => trailing_comma = true,
            _ => items.push(build_node(child, source)?),
        }
    }

    if items.len() == 1 && !trailing_comma {
        return Ok(items.remove(0));
    }
    Ok(Node::Tuple { items, span })
}

fn build_number(text: &str, span: Span) -> ParseResult<Node> {
    let is_real = text.contains(['.', 'e', 'E']);
    let v = if is_real {
        text.parse::<f64>().map(Number::Real).map_err(|e| {
            ParseError::Build(format!("Failed to parse number '{text}': {e}"), Some(span))
        })?
    } else {
        text.parse::<i64>().map(Number::Int).map_err(|e| {
            ParseError::Build(format!("Failed to parse number '{text}': {e}"), Some(span))
        })?
    };
    Ok(Node::Number { v, span })
}

fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}
