//! Tree-walking interpreter producing output lines

use indexmap::IndexMap;

use crate::parser::ast::{Branch, Expr, LoopBinding, Node, OutputLine, Segment, Spanned};

use super::context::{BlockSlot, Context};
use super::error::EvalError;
use super::eval::evaluate;
use super::value::Value;

pub(crate) struct Interpreter<'l, 'b> {
    ctx: Context<'l>,
    block: BlockSlot<'b>,
    output: Vec<String>,
}

impl<'l, 'b> Interpreter<'l, 'b> {
    pub(crate) fn new(ctx: Context<'l>, block: BlockSlot<'b>) -> Self {
        Self {
            ctx,
            block,
            output: Vec::new(),
        }
    }

    /// Run the program and return the emitted lines
    pub(crate) fn run(mut self, nodes: &[Node]) -> Result<Vec<String>, EvalError> {
        self.exec_all(nodes)?;
        if self.block.is_unused() {
            log::debug!("trailing block was supplied but the template never yielded");
        }
        Ok(self.output)
    }

    fn exec_all(&mut self, nodes: &[Node]) -> Result<(), EvalError> {
        for node in nodes {
            self.exec(node)?;
        }
        Ok(())
    }

    fn exec(&mut self, node: &Node) -> Result<(), EvalError> {
        match node {
            Node::Output(line) => {
                let text = self.substitute(line)?;
                self.output.push(text);
            }
            Node::Conditional {
                branches,
                otherwise,
            } => self.exec_conditional(branches, otherwise.as_deref())?,
            Node::Loop {
                binding,
                iterable,
                body,
            } => self.exec_loop(binding, iterable, body)?,
            Node::Yield(span) => {
                let content = self.block.invoke(span)?;
                self.output.push(content);
            }
        }
        Ok(())
    }

    fn substitute(&mut self, line: &OutputLine) -> Result<String, EvalError> {
        let mut text = String::new();
        for segment in &line.segments {
            match segment {
                Segment::Text(s) => text.push_str(s),
                Segment::Expr(expr) => {
                    let value = evaluate(expr, &self.ctx, &mut self.block)?;
                    text.push_str(&value.to_string());
                }
            }
        }
        Ok(text)
    }

    fn exec_conditional(
        &mut self,
        branches: &[Branch],
        otherwise: Option<&[Node]>,
    ) -> Result<(), EvalError> {
        for branch in branches {
            if evaluate(&branch.condition, &self.ctx, &mut self.block)?.is_truthy() {
                return self.exec_all(&branch.body);
            }
        }
        match otherwise {
            Some(body) => self.exec_all(body),
            None => Ok(()),
        }
    }

    fn exec_loop(
        &mut self,
        binding: &LoopBinding,
        iterable: &Spanned<Expr>,
        body: &[Node],
    ) -> Result<(), EvalError> {
        let collection = evaluate(iterable, &self.ctx, &mut self.block)?;
        let over_map = matches!(collection, Value::Map(_));
        let items: Vec<(Value, Value)> = match collection {
            Value::List(items) => items
                .into_iter()
                .enumerate()
                .map(|(i, item)| (Value::from(i), item))
                .collect(),
            Value::Map(entries) => entries
                .into_iter()
                .map(|(k, v)| (Value::String(k), v))
                .collect(),
            Value::Nil => Vec::new(),
            other => {
                return Err(EvalError::NotIterable {
                    type_name: other.type_name(),
                    span: iterable.span.clone(),
                })
            }
        };

        let length = items.len();
        log::trace!("loop over {} item(s)", length);

        for (position, (key, item)) in items.into_iter().enumerate() {
            let mut scope = IndexMap::new();
            match binding {
                // A single name over a list gets the item, over a map the key
                LoopBinding::Single(name) => {
                    let value = if over_map { key } else { item };
                    scope.insert(name.node.0.clone(), value);
                }
                LoopBinding::Pair(first, second) => {
                    scope.insert(first.node.0.clone(), key);
                    scope.insert(second.node.0.clone(), item);
                }
            }
            scope.insert("loop".to_string(), loop_info(position, length));

            self.ctx.push_scope(scope);
            let result = self.exec_all(body);
            self.ctx.pop_scope();
            result?;
        }
        Ok(())
    }
}

/// The `loop` variable available inside `for` bodies
fn loop_info(position: usize, length: usize) -> Value {
    let mut info = IndexMap::new();
    info.insert("index".to_string(), Value::from(position));
    info.insert("index1".to_string(), Value::from(position + 1));
    info.insert("first".to_string(), Value::Bool(position == 0));
    info.insert("last".to_string(), Value::Bool(position + 1 == length));
    info.insert("length".to_string(), Value::from(length));
    Value::Map(info)
}
