//! Parser implementation using chumsky

use chumsky::input::{Stream, ValueInput};
use chumsky::prelude::*;

use crate::error::ParseError;
use crate::parser::ast::*;
use crate::parser::lexer::{tokenize, Token};

/// Parse an inline expression (the inside of a `{{ }}` marker)
///
/// `offset` is the byte position of `input` within the template so spans
/// in the result and in any errors point into the full source. An empty
/// expression is a `nil` literal.
pub fn parse_expression(input: &str, offset: usize) -> Result<Spanned<Expr>, Vec<ParseError>> {
    let tokens = tokenize(input, offset)?;
    if tokens.is_empty() {
        return Ok(Spanned::new(
            Expr::Literal(Literal::Nil),
            offset..offset + input.len(),
        ));
    }

    let eoi = offset + input.len();
    let token_iter = tokens.into_iter().map(|(tok, span)| (tok, span.into()));
    let token_stream = Stream::from_iter(token_iter).map((eoi..eoi).into(), |(t, s): (_, _)| (t, s));

    expr_parser()
        .then_ignore(end())
        .parse(token_stream)
        .into_result()
        .map_err(|errs| errs.into_iter().map(|e| e.into()).collect())
}

/// Parse the code portion of a directive line
///
/// Code that is empty once comments are stripped is a `Directive::Comment`.
pub fn parse_directive(input: &str, offset: usize) -> Result<Directive, Vec<ParseError>> {
    let tokens = tokenize(input, offset)?;
    if tokens.is_empty() {
        return Ok(Directive::Comment);
    }

    let eoi = offset + input.len();
    let token_iter = tokens.into_iter().map(|(tok, span)| (tok, span.into()));
    let token_stream = Stream::from_iter(token_iter).map((eoi..eoi).into(), |(t, s): (_, _)| (t, s));

    directive_parser()
        .then_ignore(end())
        .parse(token_stream)
        .into_result()
        .map_err(|errs| errs.into_iter().map(|e| e.into()).collect())
}

/// Helper to extract span range from chumsky's MapExtra
fn span_range(e: &impl chumsky::span::Span<Offset = usize>) -> std::ops::Range<usize> {
    e.start()..e.end()
}

/// Postfix operation applied after an atom
#[derive(Debug, Clone)]
enum Postfix {
    Property(Spanned<String>),
    Index(Spanned<Expr>),
}

/// One left-associative precedence level: `operand (op operand)*`
fn binary_level<'a, I, P, O>(
    operand: P,
    op: O,
) -> impl Parser<'a, I, Spanned<Expr>, extra::Err<Rich<'a, Token>>> + Clone
where
    I: ValueInput<'a, Token = Token, Span = SimpleSpan>,
    P: Parser<'a, I, Spanned<Expr>, extra::Err<Rich<'a, Token>>> + Clone,
    O: Parser<'a, I, BinaryOp, extra::Err<Rich<'a, Token>>> + Clone,
{
    operand
        .clone()
        .then(op.then(operand).repeated().collect::<Vec<_>>())
        .map(|(first, rest)| {
            rest.into_iter().fold(first, |left, (op, right)| {
                let span = left.span.start..right.span.end;
                Spanned::new(
                    Expr::Binary {
                        op,
                        left: Box::new(left),
                        right: Box::new(right),
                    },
                    span,
                )
            })
        })
}

fn expr_parser<'a, I>() -> impl Parser<'a, I, Spanned<Expr>, extra::Err<Rich<'a, Token>>> + Clone
where
    I: ValueInput<'a, Token = Token, Span = SimpleSpan>,
{
    recursive(|expr| {
        let literal = select! {
            Token::Nil => Literal::Nil,
            Token::True => Literal::Bool(true),
            Token::False => Literal::Bool(false),
            Token::Int(n) => Literal::Int(n),
            Token::Float(n) => Literal::Float(n),
            Token::String(s) => Literal::String(s),
        }
        .map(Expr::Literal);

        let variable = select! {
            Token::Ident(s) => Expr::Variable(Identifier::new(s)),
        };

        let simple = choice((literal, variable, just(Token::Yield).to(Expr::Yield)))
            .map_with(|node, e| Spanned::new(node, span_range(&e.span())));

        // Parentheses widen the span but leave the inner node alone
        let grouped = expr
            .clone()
            .delimited_by(just(Token::ParenOpen), just(Token::ParenClose))
            .map_with(|inner: Spanned<Expr>, e| Spanned::new(inner.node, span_range(&e.span())));

        let atom = choice((simple, grouped));

        // `items.0` reads as an index, so integers are valid property names
        let property_name = select! {
            Token::Ident(s) => s,
            Token::Int(n) => n.to_string(),
        }
        .map_with(|s, e| Spanned::new(s, span_range(&e.span())));

        let postfix = choice((
            just(Token::Dot)
                .ignore_then(property_name)
                .map(Postfix::Property),
            expr.clone()
                .delimited_by(just(Token::BracketOpen), just(Token::BracketClose))
                .map(Postfix::Index),
        ))
        .map_with(|op, e| (op, span_range(&e.span())));

        let access = atom
            .then(postfix.repeated().collect::<Vec<_>>())
            .map(|(base, ops)| {
                ops.into_iter().fold(base, |target, (op, span)| {
                    let full = target.span.start..span.end;
                    let node = match op {
                        Postfix::Property(name) => Expr::Property {
                            target: Box::new(target),
                            name,
                        },
                        Postfix::Index(index) => Expr::Index {
                            target: Box::new(target),
                            index: Box::new(index),
                        },
                    };
                    Spanned::new(node, full)
                })
            })
            .boxed();

        let unary_op = choice((
            just(Token::Bang).to(UnaryOp::Not),
            just(Token::Not).to(UnaryOp::Not),
            just(Token::Minus).to(UnaryOp::Neg),
        ))
        .map_with(|op, e| (op, span_range(&e.span())));

        let unary = unary_op
            .repeated()
            .collect::<Vec<_>>()
            .then(access)
            .map(|(ops, operand)| {
                ops.into_iter().rev().fold(operand, |operand, (op, span)| {
                    let full = span.start..operand.span.end;
                    Spanned::new(
                        Expr::Unary {
                            op,
                            operand: Box::new(operand),
                        },
                        full,
                    )
                })
            })
            .boxed();

        let product = binary_level(
            unary,
            choice((
                just(Token::Star).to(BinaryOp::Mul),
                just(Token::Slash).to(BinaryOp::Div),
                just(Token::Percent).to(BinaryOp::Rem),
            )),
        )
        .boxed();

        let sum = binary_level(
            product,
            choice((
                just(Token::Plus).to(BinaryOp::Add),
                just(Token::Minus).to(BinaryOp::Sub),
            )),
        )
        .boxed();

        let comparison = binary_level(
            sum,
            choice((
                just(Token::LessOrEqual).to(BinaryOp::LessOrEqual),
                just(Token::GreaterOrEqual).to(BinaryOp::GreaterOrEqual),
                just(Token::Less).to(BinaryOp::Less),
                just(Token::Greater).to(BinaryOp::Greater),
            )),
        )
        .boxed();

        let equality = binary_level(
            comparison,
            choice((
                just(Token::EqEq).to(BinaryOp::Eq),
                just(Token::NotEq).to(BinaryOp::NotEq),
            )),
        )
        .boxed();

        let conjunction = binary_level(
            equality,
            choice((
                just(Token::AmpAmp).to(BinaryOp::And),
                just(Token::And).to(BinaryOp::And),
            )),
        )
        .boxed();

        binary_level(
            conjunction,
            choice((
                just(Token::PipePipe).to(BinaryOp::Or),
                just(Token::Or).to(BinaryOp::Or),
            )),
        )
        .boxed()
    })
}

fn directive_parser<'a, I>() -> impl Parser<'a, I, Directive, extra::Err<Rich<'a, Token>>> + Clone
where
    I: ValueInput<'a, Token = Token, Span = SimpleSpan>,
{
    let expr = expr_parser();

    let identifier = select! {
        Token::Ident(s) => Identifier::new(s),
    }
    .map_with(|id, e| Spanned::new(id, span_range(&e.span())));

    let binding = identifier
        .clone()
        .then(just(Token::Comma).ignore_then(identifier).or_not())
        .map(|(first, second)| match second {
            Some(second) => LoopBinding::Pair(first, second),
            None => LoopBinding::Single(first),
        });

    let for_loop = just(Token::For)
        .ignore_then(binding)
        .then_ignore(just(Token::In))
        .then(expr.clone())
        .map(|(binding, iterable)| Directive::For { binding, iterable });

    choice((
        just(Token::If).ignore_then(expr.clone()).map(Directive::If),
        just(Token::Elsif).ignore_then(expr.clone()).map(Directive::Elsif),
        just(Token::Unless).ignore_then(expr).map(Directive::Unless),
        just(Token::Else).to(Directive::Else),
        just(Token::End).to(Directive::End),
        just(Token::Yield).to(Directive::Yield),
        for_loop,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expr(input: &str) -> Expr {
        parse_expression(input, 0).expect("Should parse").node
    }

    fn var(name: &str) -> Box<Spanned<Expr>> {
        Box::new(Spanned::new(Expr::Variable(Identifier::new(name)), 0..0))
    }

    /// Drop spans so trees can be compared structurally
    fn strip(e: &Expr) -> Expr {
        match e {
            Expr::Property { target, name } => Expr::Property {
                target: Box::new(Spanned::new(strip(&target.node), 0..0)),
                name: Spanned::new(name.node.clone(), 0..0),
            },
            Expr::Index { target, index } => Expr::Index {
                target: Box::new(Spanned::new(strip(&target.node), 0..0)),
                index: Box::new(Spanned::new(strip(&index.node), 0..0)),
            },
            Expr::Unary { op, operand } => Expr::Unary {
                op: *op,
                operand: Box::new(Spanned::new(strip(&operand.node), 0..0)),
            },
            Expr::Binary { op, left, right } => Expr::Binary {
                op: *op,
                left: Box::new(Spanned::new(strip(&left.node), 0..0)),
                right: Box::new(Spanned::new(strip(&right.node), 0..0)),
            },
            other => other.clone(),
        }
    }

    #[test]
    fn test_parse_variable() {
        assert_eq!(expr("name"), Expr::Variable(Identifier::new("name")));
    }

    #[test]
    fn test_parse_literals() {
        assert_eq!(expr("nil"), Expr::Literal(Literal::Nil));
        assert_eq!(expr("true"), Expr::Literal(Literal::Bool(true)));
        assert_eq!(expr("12"), Expr::Literal(Literal::Int(12)));
        assert_eq!(expr("1.5"), Expr::Literal(Literal::Float(1.5)));
        assert_eq!(
            expr("'hi'"),
            Expr::Literal(Literal::String("hi".to_string()))
        );
    }

    #[test]
    fn test_parse_empty_expression_is_nil() {
        let parsed = parse_expression("   ", 4).expect("Should parse");
        assert_eq!(parsed.node, Expr::Literal(Literal::Nil));
        assert_eq!(parsed.span, 4..7);
    }

    #[test]
    fn test_parse_yield() {
        assert_eq!(expr("yield"), Expr::Yield);
    }

    #[test]
    fn test_parse_property_chain() {
        assert_eq!(
            strip(&expr("user.address.city")),
            Expr::Property {
                target: Box::new(Spanned::new(
                    Expr::Property {
                        target: var("user"),
                        name: Spanned::new("address".to_string(), 0..0),
                    },
                    0..0
                )),
                name: Spanned::new("city".to_string(), 0..0),
            }
        );
    }

    #[test]
    fn test_parse_numeric_property() {
        assert_eq!(
            strip(&expr("items.0")),
            Expr::Property {
                target: var("items"),
                name: Spanned::new("0".to_string(), 0..0),
            }
        );
    }

    #[test]
    fn test_parse_index() {
        match expr("items[i + 1]") {
            Expr::Index { target, index } => {
                assert_eq!(target.node, Expr::Variable(Identifier::new("items")));
                assert!(matches!(
                    index.node,
                    Expr::Binary {
                        op: BinaryOp::Add,
                        ..
                    }
                ));
            }
            other => panic!("Expected Index, got {:?}", other),
        }
    }

    #[test]
    fn test_multiplication_binds_tighter_than_addition() {
        match expr("a + b * c") {
            Expr::Binary { op, right, .. } => {
                assert_eq!(op, BinaryOp::Add);
                assert!(matches!(
                    right.node,
                    Expr::Binary {
                        op: BinaryOp::Mul,
                        ..
                    }
                ));
            }
            other => panic!("Expected Binary, got {:?}", other),
        }
    }

    #[test]
    fn test_and_binds_tighter_than_or() {
        match expr("a or b and c") {
            Expr::Binary { op, right, .. } => {
                assert_eq!(op, BinaryOp::Or);
                assert!(matches!(
                    right.node,
                    Expr::Binary {
                        op: BinaryOp::And,
                        ..
                    }
                ));
            }
            other => panic!("Expected Binary, got {:?}", other),
        }
    }

    #[test]
    fn test_comparison_inside_equality() {
        match expr("a < b == true") {
            Expr::Binary { op, left, .. } => {
                assert_eq!(op, BinaryOp::Eq);
                assert!(matches!(
                    left.node,
                    Expr::Binary {
                        op: BinaryOp::Less,
                        ..
                    }
                ));
            }
            other => panic!("Expected Binary, got {:?}", other),
        }
    }

    #[test]
    fn test_subtraction_is_left_associative() {
        match strip(&expr("a - b - c")) {
            Expr::Binary { op, left, right } => {
                assert_eq!(op, BinaryOp::Sub);
                assert_eq!(right.node, Expr::Variable(Identifier::new("c")));
                assert!(matches!(
                    left.node,
                    Expr::Binary {
                        op: BinaryOp::Sub,
                        ..
                    }
                ));
            }
            other => panic!("Expected Binary, got {:?}", other),
        }
    }

    #[test]
    fn test_unary_not_and_negation() {
        assert_eq!(
            strip(&expr("!admin")),
            Expr::Unary {
                op: UnaryOp::Not,
                operand: var("admin"),
            }
        );
        assert_eq!(
            strip(&expr("not admin")),
            Expr::Unary {
                op: UnaryOp::Not,
                operand: var("admin"),
            }
        );
        assert_eq!(
            strip(&expr("-count")),
            Expr::Unary {
                op: UnaryOp::Neg,
                operand: var("count"),
            }
        );
    }

    #[test]
    fn test_parenthesised_group_widens_span() {
        let parsed = parse_expression("(a + b)", 0).expect("Should parse");
        assert_eq!(parsed.span, 0..7);
        assert!(matches!(
            parsed.node,
            Expr::Binary {
                op: BinaryOp::Add,
                ..
            }
        ));
    }

    #[test]
    fn test_spans_are_absolute() {
        let parsed = parse_expression("user.name", 20).expect("Should parse");
        assert_eq!(parsed.span, 20..29);
        match parsed.node {
            Expr::Property { target, name } => {
                assert_eq!(target.span, 20..24);
                assert_eq!(name.span, 25..29);
            }
            other => panic!("Expected Property, got {:?}", other),
        }
    }

    #[test]
    fn test_trailing_operator_is_an_error() {
        let errors = parse_expression("a +", 0).unwrap_err();
        assert!(!errors.is_empty());
    }

    #[test]
    fn test_unbalanced_paren_is_an_error() {
        assert!(parse_expression("(a", 0).is_err());
    }

    #[test]
    fn test_parse_if_directive() {
        match parse_directive("if admin", 0).expect("Should parse") {
            Directive::If(cond) => {
                assert_eq!(cond.node, Expr::Variable(Identifier::new("admin")));
                assert_eq!(cond.span, 3..8);
            }
            other => panic!("Expected If, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_simple_directives() {
        assert_eq!(parse_directive("else", 0).unwrap(), Directive::Else);
        assert_eq!(parse_directive("end", 0).unwrap(), Directive::End);
        assert_eq!(parse_directive("yield", 0).unwrap(), Directive::Yield);
        assert!(matches!(
            parse_directive("elsif x > 1", 0).unwrap(),
            Directive::Elsif(_)
        ));
        assert!(matches!(
            parse_directive("unless done", 0).unwrap(),
            Directive::Unless(_)
        ));
    }

    #[test]
    fn test_parse_comment_directive() {
        assert_eq!(
            parse_directive("# a note", 0).unwrap(),
            Directive::Comment
        );
        assert_eq!(parse_directive("", 0).unwrap(), Directive::Comment);
    }

    #[test]
    fn test_parse_for_single_binding() {
        match parse_directive("for item in items", 0).expect("Should parse") {
            Directive::For { binding, iterable } => {
                match binding {
                    LoopBinding::Single(id) => assert_eq!(id.node.as_str(), "item"),
                    other => panic!("Expected single binding, got {:?}", other),
                }
                assert_eq!(iterable.node, Expr::Variable(Identifier::new("items")));
            }
            other => panic!("Expected For, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_for_pair_binding() {
        match parse_directive("for key, value in settings", 0).expect("Should parse") {
            Directive::For {
                binding: LoopBinding::Pair(k, v),
                ..
            } => {
                assert_eq!(k.node.as_str(), "key");
                assert_eq!(v.node.as_str(), "value");
            }
            other => panic!("Expected pair For, got {:?}", other),
        }
    }

    #[test]
    fn test_for_without_in_is_an_error() {
        assert!(parse_directive("for item items", 0).is_err());
    }

    #[test]
    fn test_trailing_tokens_after_else_are_an_error() {
        assert!(parse_directive("else if x", 0).is_err());
    }

    #[test]
    fn test_unknown_statement_is_an_error() {
        let errors = parse_directive("items.each do |item|", 0).unwrap_err();
        assert!(!errors.is_empty());
    }
}
