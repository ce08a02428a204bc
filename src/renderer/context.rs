//! Variable bindings visible during a render

use indexmap::IndexMap;

use crate::config::UndefinedBehavior;
use crate::parser::ast::Span;

use super::error::EvalError;
use super::value::Value;

/// Caller-supplied bindings for a single render call
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Locals {
    values: IndexMap<String, Value>,
}

impl Locals {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a name, returning the updated set (builder style)
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(name, value);
        self
    }

    /// Bind a name, replacing any previous value
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.values.insert(name.into(), value.into())
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Use the entries of a map value as locals; `None` for any other value
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Map(values) => Some(Self { values }),
            _ => None,
        }
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Locals {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self {
            values: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl<K: Into<String>, V: Into<Value>> Extend<(K, V)> for Locals {
    fn extend<T: IntoIterator<Item = (K, V)>>(&mut self, iter: T) {
        for (k, v) in iter {
            self.insert(k, v);
        }
    }
}

/// Scoped environment: locals at the bottom, one scope per loop iteration above
pub(crate) struct Context<'l> {
    locals: &'l Locals,
    scopes: Vec<IndexMap<String, Value>>,
    undefined: UndefinedBehavior,
}

impl<'l> Context<'l> {
    pub(crate) fn new(locals: &'l Locals, undefined: UndefinedBehavior) -> Self {
        Self {
            locals,
            scopes: Vec::new(),
            undefined,
        }
    }

    pub(crate) fn is_lenient(&self) -> bool {
        self.undefined == UndefinedBehavior::Lenient
    }

    pub(crate) fn push_scope(&mut self, bindings: IndexMap<String, Value>) {
        self.scopes.push(bindings);
    }

    pub(crate) fn pop_scope(&mut self) {
        self.scopes.pop();
    }

    /// Innermost binding wins
    pub(crate) fn get(&self, name: &str) -> Option<&Value> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.get(name))
            .or_else(|| self.locals.get(name))
    }

    /// Look up a variable, applying the undefined-name policy
    pub(crate) fn lookup(&self, name: &str, span: &Span) -> Result<Value, EvalError> {
        match self.get(name) {
            Some(value) => Ok(value.clone()),
            None if self.is_lenient() => Ok(Value::Nil),
            None => Err(EvalError::undefined(
                name,
                span.clone(),
                self.suggestions(name, 2),
            )),
        }
    }

    /// Bound names within `max_distance` edits of `target`, closest first
    fn suggestions(&self, target: &str, max_distance: usize) -> Vec<String> {
        let names = self
            .scopes
            .iter()
            .flat_map(|scope| scope.keys())
            .chain(self.locals.values.keys());

        let mut candidates: Vec<(usize, &String)> = names
            .filter_map(|name| {
                let dist = edit_distance(name, target);
                (dist > 0 && dist <= max_distance).then_some((dist, name))
            })
            .collect();

        candidates.sort();
        candidates.dedup();
        candidates
            .into_iter()
            .map(|(_, name)| name.clone())
            .take(3)
            .collect()
    }
}

/// Levenshtein distance over chars, single-row table
fn edit_distance(a: &str, b: &str) -> usize {
    let b_chars: Vec<char> = b.chars().collect();
    let mut row: Vec<usize> = (0..=b_chars.len()).collect();

    for (i, ca) in a.chars().enumerate() {
        let mut diagonal = row[0];
        row[0] = i + 1;
        for (j, cb) in b_chars.iter().enumerate() {
            let substitution = diagonal + usize::from(ca != *cb);
            diagonal = row[j + 1];
            row[j + 1] = substitution.min(row[j] + 1).min(diagonal + 1);
        }
    }

    row[b_chars.len()]
}

/// The optional trailing block, invoked at most once per render
pub(crate) enum BlockSlot<'b> {
    Absent,
    Pending(Box<dyn FnOnce() -> String + 'b>),
    Ready(String),
}

impl<'b> BlockSlot<'b> {
    pub(crate) fn new(block: Option<Box<dyn FnOnce() -> String + 'b>>) -> Self {
        match block {
            Some(block) => BlockSlot::Pending(block),
            None => BlockSlot::Absent,
        }
    }

    /// Content of the block; the first call runs it, later calls reuse the result
    pub(crate) fn invoke(&mut self, span: &Span) -> Result<String, EvalError> {
        if let BlockSlot::Ready(content) = self {
            return Ok(content.clone());
        }
        match std::mem::replace(self, BlockSlot::Absent) {
            BlockSlot::Pending(block) => {
                log::trace!("invoking trailing block");
                let content = block();
                *self = BlockSlot::Ready(content.clone());
                Ok(content)
            }
            _ => Err(EvalError::MissingBlock { span: span.clone() }),
        }
    }

    pub(crate) fn is_unused(&self) -> bool {
        matches!(self, BlockSlot::Pending(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_edit_distance() {
        assert_eq!(edit_distance("hello", "hello"), 0);
        assert_eq!(edit_distance("server", "servr"), 1);
        assert_eq!(edit_distance("server", "servar"), 1);
        assert_eq!(edit_distance("cat", "dog"), 3);
        assert_eq!(edit_distance("", "abc"), 3);
    }

    #[test]
    fn test_locals_builder_and_iteration_order() {
        let locals = Locals::new().with("b", 1i64).with("a", "x");
        let names: Vec<&str> = locals.iter().map(|(k, _)| k).collect();
        assert_eq!(names, vec!["b", "a"]);
        assert_eq!(locals.get("a"), Some(&Value::from("x")));
        assert_eq!(locals.len(), 2);
    }

    #[test]
    fn test_locals_from_iterator() {
        let locals: Locals = vec![("name", "Ann"), ("role", "admin")].into_iter().collect();
        assert!(locals.contains("role"));
    }

    #[test]
    fn test_locals_from_value_requires_map() {
        assert!(Locals::from_value(Value::Int(1)).is_none());
        let mut map = IndexMap::new();
        map.insert("x".to_string(), Value::Bool(true));
        let locals = Locals::from_value(Value::Map(map)).expect("map converts");
        assert_eq!(locals.get("x"), Some(&Value::Bool(true)));
    }

    #[test]
    fn test_inner_scope_shadows_locals() {
        let locals = Locals::new().with("item", "outer");
        let mut ctx = Context::new(&locals, UndefinedBehavior::Strict);
        let mut scope = IndexMap::new();
        scope.insert("item".to_string(), Value::from("inner"));
        ctx.push_scope(scope);
        assert_eq!(ctx.lookup("item", &(0..4)).unwrap(), Value::from("inner"));
        ctx.pop_scope();
        assert_eq!(ctx.lookup("item", &(0..4)).unwrap(), Value::from("outer"));
    }

    #[test]
    fn test_strict_lookup_suggests_similar_names() {
        let locals = Locals::new().with("username", "ann").with("title", "Hi");
        let ctx = Context::new(&locals, UndefinedBehavior::Strict);
        match ctx.lookup("usernme", &(5..12)) {
            Err(EvalError::UndefinedVariable {
                name,
                span,
                suggestions,
            }) => {
                assert_eq!(name, "usernme");
                assert_eq!(span, 5..12);
                assert_eq!(suggestions, vec!["username".to_string()]);
            }
            other => panic!("Expected undefined variable, got {:?}", other),
        }
    }

    #[test]
    fn test_lenient_lookup_yields_nil() {
        let locals = Locals::new();
        let ctx = Context::new(&locals, UndefinedBehavior::Lenient);
        assert_eq!(ctx.lookup("missing", &(0..7)).unwrap(), Value::Nil);
    }

    #[test]
    fn test_block_runs_once_and_is_reused() {
        let calls = Cell::new(0);
        let mut slot = BlockSlot::new(Some(Box::new(|| {
            calls.set(calls.get() + 1);
            "body".to_string()
        })));
        assert!(slot.is_unused());
        assert_eq!(slot.invoke(&(0..5)).unwrap(), "body");
        assert_eq!(slot.invoke(&(0..5)).unwrap(), "body");
        assert_eq!(calls.get(), 1);
        assert!(!slot.is_unused());
    }

    #[test]
    fn test_absent_block_is_an_error() {
        let mut slot = BlockSlot::new(None);
        assert_eq!(
            slot.invoke(&(3..8)),
            Err(EvalError::MissingBlock { span: 3..8 })
        );
    }
}
