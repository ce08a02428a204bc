//! Nesting directive lines into a node tree

use std::mem;

use crate::error::ParseError;
use crate::parser::ast::{
    Branch, Directive, Expr, LoopBinding, Node, OutputLine, Segment, Span, Spanned, UnaryOp,
};
use crate::parser::{parse_directive, parse_expression};

use super::line::{Line, LineMatcher, Piece};

/// An open block waiting for its `end`
enum Frame {
    Conditional {
        keyword: &'static str,
        opened: Span,
        branches: Vec<Branch>,
        /// Condition of the branch currently collecting lines; `None` once in `else`
        condition: Option<Spanned<Expr>>,
        body: Vec<Node>,
    },
    Loop {
        opened: Span,
        binding: LoopBinding,
        iterable: Spanned<Expr>,
        body: Vec<Node>,
    },
    /// Stands in for an opening directive that failed to parse, so its `end`
    /// does not report a second error
    Broken { body: Vec<Node> },
}

impl Frame {
    fn body_mut(&mut self) -> &mut Vec<Node> {
        match self {
            Frame::Conditional { body, .. } | Frame::Loop { body, .. } | Frame::Broken { body } => {
                body
            }
        }
    }
}

struct Builder {
    root: Vec<Node>,
    stack: Vec<Frame>,
    errors: Vec<ParseError>,
}

/// Compile template text into nodes, collecting every error found
pub(crate) fn compile(text: &str, matcher: &LineMatcher) -> Result<Vec<Node>, Vec<ParseError>> {
    let mut builder = Builder {
        root: Vec::new(),
        stack: Vec::new(),
        errors: Vec::new(),
    };

    let mut offset = 0;
    for line in text.split('\n') {
        match matcher.classify(line, offset) {
            Line::Directive { code, offset } => builder.directive(code, offset),
            Line::Output(pieces) => builder.output(pieces),
        }
        offset += line.len() + 1;
    }

    builder.finish()
}

impl Builder {
    fn current(&mut self) -> &mut Vec<Node> {
        match self.stack.last_mut() {
            Some(frame) => frame.body_mut(),
            None => &mut self.root,
        }
    }

    fn error(&mut self, span: Span, message: impl Into<String>) {
        self.errors.push(ParseError::Structure {
            span,
            message: message.into(),
        });
    }

    fn output(&mut self, pieces: Vec<Piece<'_>>) {
        let mut segments = Vec::with_capacity(pieces.len());
        for piece in pieces {
            match piece {
                Piece::Text(text) => segments.push(Segment::Text(text.to_string())),
                Piece::Marker { code, offset } => match parse_expression(code, offset) {
                    Ok(expr) => segments.push(Segment::Expr(expr)),
                    Err(errs) => self.errors.extend(errs),
                },
            }
        }
        self.current().push(Node::Output(OutputLine { segments }));
    }

    fn directive(&mut self, code: &str, offset: usize) {
        let trimmed = code.trim_start();
        let start = offset + (code.len() - trimmed.len());
        let span = start..start + trimmed.len();

        let directive = match parse_directive(code, offset) {
            Ok(directive) => directive,
            Err(errs) => {
                self.errors.extend(errs);
                let keyword = trimmed.split_whitespace().next().unwrap_or("");
                if matches!(keyword, "if" | "unless" | "for") {
                    self.stack.push(Frame::Broken { body: Vec::new() });
                }
                return;
            }
        };
        log::trace!("directive `{}` at {:?}", directive.keyword(), span);

        match directive {
            Directive::Comment => {}
            Directive::If(condition) => self.stack.push(Frame::Conditional {
                keyword: "if",
                opened: span,
                branches: Vec::new(),
                condition: Some(condition),
                body: Vec::new(),
            }),
            Directive::Unless(condition) => {
                let condition_span = condition.span.clone();
                let negated = Spanned::new(
                    Expr::Unary {
                        op: UnaryOp::Not,
                        operand: Box::new(condition),
                    },
                    condition_span,
                );
                self.stack.push(Frame::Conditional {
                    keyword: "unless",
                    opened: span,
                    branches: Vec::new(),
                    condition: Some(negated),
                    body: Vec::new(),
                });
            }
            Directive::Elsif(next) => self.elsif(next, span),
            Directive::Else => self.otherwise(span),
            Directive::For { binding, iterable } => self.stack.push(Frame::Loop {
                opened: span,
                binding,
                iterable,
                body: Vec::new(),
            }),
            Directive::Yield => self.current().push(Node::Yield(span)),
            Directive::End => self.end(span),
        }
    }

    fn elsif(&mut self, next: Spanned<Expr>, span: Span) {
        let message = match self.stack.last_mut() {
            Some(Frame::Conditional {
                keyword: "unless", ..
            }) => "`elsif` cannot follow `unless`",
            Some(Frame::Conditional {
                branches,
                condition,
                body,
                ..
            }) => match condition.take() {
                Some(done) => {
                    branches.push(Branch {
                        condition: done,
                        body: mem::take(body),
                    });
                    *condition = Some(next);
                    return;
                }
                None => "`elsif` after `else`",
            },
            Some(Frame::Broken { .. }) => return,
            _ => "`elsif` without a matching `if`",
        };
        self.error(span, message);
    }

    fn otherwise(&mut self, span: Span) {
        let message = match self.stack.last_mut() {
            Some(Frame::Conditional {
                branches,
                condition,
                body,
                ..
            }) => match condition.take() {
                Some(done) => {
                    branches.push(Branch {
                        condition: done,
                        body: mem::take(body),
                    });
                    return;
                }
                None => "duplicate `else`",
            },
            Some(Frame::Broken { .. }) => return,
            Some(Frame::Loop { .. }) => "`else` is not allowed in a `for` block",
            None => "`else` without a matching `if`",
        };
        self.error(span, message);
    }

    fn end(&mut self, span: Span) {
        let node = match self.stack.pop() {
            Some(Frame::Conditional {
                mut branches,
                condition,
                body,
                ..
            }) => {
                let otherwise = match condition {
                    Some(condition) => {
                        branches.push(Branch { condition, body });
                        None
                    }
                    None => Some(body),
                };
                Node::Conditional {
                    branches,
                    otherwise,
                }
            }
            Some(Frame::Loop {
                binding,
                iterable,
                body,
                ..
            }) => Node::Loop {
                binding,
                iterable,
                body,
            },
            Some(Frame::Broken { .. }) => return,
            None => {
                self.error(span, "`end` without an open block");
                return;
            }
        };
        self.current().push(node);
    }

    fn finish(mut self) -> Result<Vec<Node>, Vec<ParseError>> {
        while let Some(frame) = self.stack.pop() {
            match frame {
                Frame::Conditional {
                    keyword, opened, ..
                } => self.error(opened, format!("`{}` block is never closed with `end`", keyword)),
                Frame::Loop { opened, .. } => {
                    self.error(opened, "`for` block is never closed with `end`")
                }
                Frame::Broken { .. } => {}
            }
        }

        if self.errors.is_empty() {
            Ok(self.root)
        } else {
            self.errors.sort_by_key(|e| e.span().start);
            Err(self.errors)
        }
    }
}
