//! Expression evaluation

use std::cmp::Ordering;

use crate::parser::ast::{BinaryOp, Expr, Literal, Span, Spanned, UnaryOp};

use super::context::{BlockSlot, Context};
use super::error::EvalError;
use super::value::Value;

/// Evaluate an expression against the current scope
pub(crate) fn evaluate(
    expr: &Spanned<Expr>,
    ctx: &Context<'_>,
    block: &mut BlockSlot<'_>,
) -> Result<Value, EvalError> {
    match &expr.node {
        Expr::Literal(lit) => Ok(literal_value(lit)),
        Expr::Variable(name) => ctx.lookup(name.as_str(), &expr.span),
        Expr::Yield => block.invoke(&expr.span).map(Value::String),
        Expr::Property { target, name } => {
            let value = evaluate(target, ctx, block)?;
            property(value, &name.node, &expr.span, ctx.is_lenient())
        }
        Expr::Index { target, index } => {
            let value = evaluate(target, ctx, block)?;
            let key = evaluate(index, ctx, block)?;
            index_value(value, key, &expr.span, ctx.is_lenient())
        }
        Expr::Unary { op, operand } => {
            let value = evaluate(operand, ctx, block)?;
            unary(*op, value, &expr.span)
        }
        // Short-circuit, returning the deciding operand like Ruby's && and ||
        Expr::Binary {
            op: BinaryOp::And,
            left,
            right,
        } => {
            let lhs = evaluate(left, ctx, block)?;
            if lhs.is_truthy() {
                evaluate(right, ctx, block)
            } else {
                Ok(lhs)
            }
        }
        Expr::Binary {
            op: BinaryOp::Or,
            left,
            right,
        } => {
            let lhs = evaluate(left, ctx, block)?;
            if lhs.is_truthy() {
                Ok(lhs)
            } else {
                evaluate(right, ctx, block)
            }
        }
        Expr::Binary { op, left, right } => {
            let lhs = evaluate(left, ctx, block)?;
            let rhs = evaluate(right, ctx, block)?;
            binary(*op, lhs, rhs, &expr.span)
        }
    }
}

fn literal_value(lit: &Literal) -> Value {
    match lit {
        Literal::Nil => Value::Nil,
        Literal::Bool(b) => Value::Bool(*b),
        Literal::Int(n) => Value::Int(*n),
        Literal::Float(n) => Value::Float(*n),
        Literal::String(s) => Value::String(s.clone()),
    }
}

/// Resolve `value.name`; map keys take precedence over built-in properties
fn property(value: Value, name: &str, span: &Span, lenient: bool) -> Result<Value, EvalError> {
    let no_such = |value: &Value| EvalError::NoSuchProperty {
        type_name: value.type_name(),
        property: name.to_string(),
        span: span.clone(),
    };

    match &value {
        Value::Map(entries) => {
            if let Some(found) = entries.get(name) {
                return Ok(found.clone());
            }
            Ok(match name {
                "size" | "length" => Value::from(entries.len()),
                "empty" => Value::Bool(entries.is_empty()),
                "keys" => Value::List(entries.keys().cloned().map(Value::String).collect()),
                "values" => Value::List(entries.values().cloned().collect()),
                _ => Value::Nil,
            })
        }
        Value::List(items) => {
            if let Ok(index) = name.parse::<i64>() {
                return Ok(list_get(items, index));
            }
            match name {
                "size" | "length" => Ok(Value::from(items.len())),
                "empty" => Ok(Value::Bool(items.is_empty())),
                "first" => Ok(items.first().cloned().unwrap_or_default()),
                "last" => Ok(items.last().cloned().unwrap_or_default()),
                _ => Err(no_such(&value)),
            }
        }
        Value::String(s) => match name {
            "size" | "length" => Ok(Value::from(s.chars().count())),
            "empty" => Ok(Value::Bool(s.is_empty())),
            "upcase" => Ok(Value::String(s.to_uppercase())),
            "downcase" => Ok(Value::String(s.to_lowercase())),
            "strip" => Ok(Value::String(s.trim().to_string())),
            _ => Err(no_such(&value)),
        },
        Value::Nil if lenient => Ok(Value::Nil),
        _ => Err(no_such(&value)),
    }
}

/// Ruby-style list access: negative indices count from the end, misses are nil
fn list_get(items: &[Value], index: i64) -> Value {
    let len = items.len() as i64;
    let resolved = if index < 0 { len + index } else { index };
    if (0..len).contains(&resolved) {
        items[resolved as usize].clone()
    } else {
        Value::Nil
    }
}

fn index_value(value: Value, key: Value, span: &Span, lenient: bool) -> Result<Value, EvalError> {
    match (&value, &key) {
        (Value::List(items), Value::Int(i)) => Ok(list_get(items, *i)),
        (Value::Map(entries), Value::String(k)) => Ok(entries.get(k).cloned().unwrap_or_default()),
        (Value::String(s), Value::Int(i)) => {
            let chars: Vec<Value> = s.chars().map(|c| Value::String(c.to_string())).collect();
            Ok(list_get(&chars, *i))
        }
        (Value::Nil, _) if lenient => Ok(Value::Nil),
        _ => Err(EvalError::mismatch(
            format!("cannot index {} with {}", value.type_name(), key.type_name()),
            span.clone(),
        )),
    }
}

fn unary(op: UnaryOp, value: Value, span: &Span) -> Result<Value, EvalError> {
    match (op, value) {
        (UnaryOp::Not, v) => Ok(Value::Bool(!v.is_truthy())),
        (UnaryOp::Neg, Value::Int(n)) => n
            .checked_neg()
            .map(Value::Int)
            .ok_or(EvalError::Overflow { span: span.clone() }),
        (UnaryOp::Neg, Value::Float(n)) => Ok(Value::Float(-n)),
        (UnaryOp::Neg, v) => Err(EvalError::mismatch(
            format!("cannot negate {}", v.type_name()),
            span.clone(),
        )),
    }
}

/// Numeric-aware equality: `1 == 1.0`
pub(crate) fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Int(x), Value::Float(y)) | (Value::Float(y), Value::Int(x)) => (*x as f64) == *y,
        (Value::List(xs), Value::List(ys)) => {
            xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| values_equal(x, y))
        }
        _ => a == b,
    }
}

fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Int(x), Value::Int(y)) => Some(x.cmp(y)),
        (Value::Int(x), Value::Float(y)) => (*x as f64).partial_cmp(y),
        (Value::Float(x), Value::Int(y)) => x.partial_cmp(&(*y as f64)),
        (Value::Float(x), Value::Float(y)) => x.partial_cmp(y),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

fn as_float(v: &Value) -> Option<f64> {
    match v {
        Value::Int(n) => Some(*n as f64),
        Value::Float(n) => Some(*n),
        _ => None,
    }
}

/// Longest string `*` may build, in bytes
const MAX_REPEAT_LEN: usize = 1 << 24;

/// Integer division rounding toward negative infinity
fn floor_div(a: i64, b: i64) -> Option<i64> {
    let q = a.checked_div(b)?;
    if a % b != 0 && ((a < 0) != (b < 0)) {
        Some(q - 1)
    } else {
        Some(q)
    }
}

/// Remainder taking the sign of the divisor
fn floor_rem(a: i64, b: i64) -> Option<i64> {
    // `i64::MIN % -1` overflows in hardware but is exactly zero
    if b == -1 {
        return Some(0);
    }
    let r = a.checked_rem(b)?;
    if r != 0 && ((r < 0) != (b < 0)) {
        Some(r + b)
    } else {
        Some(r)
    }
}

fn binary(op: BinaryOp, lhs: Value, rhs: Value, span: &Span) -> Result<Value, EvalError> {
    let mismatch = |lhs: &Value, rhs: &Value| {
        EvalError::mismatch(
            format!(
                "cannot apply '{}' to {} and {}",
                op.symbol(),
                lhs.type_name(),
                rhs.type_name()
            ),
            span.clone(),
        )
    };
    let overflow = || EvalError::Overflow { span: span.clone() };

    match op {
        BinaryOp::Eq => Ok(Value::Bool(values_equal(&lhs, &rhs))),
        BinaryOp::NotEq => Ok(Value::Bool(!values_equal(&lhs, &rhs))),
        BinaryOp::Less | BinaryOp::LessOrEqual | BinaryOp::Greater | BinaryOp::GreaterOrEqual => {
            let ordering = compare(&lhs, &rhs).ok_or_else(|| mismatch(&lhs, &rhs))?;
            Ok(Value::Bool(match op {
                BinaryOp::Less => ordering == Ordering::Less,
                BinaryOp::LessOrEqual => ordering != Ordering::Greater,
                BinaryOp::Greater => ordering == Ordering::Greater,
                _ => ordering != Ordering::Less,
            }))
        }
        BinaryOp::Add => match (&lhs, &rhs) {
            (Value::Int(a), Value::Int(b)) => a.checked_add(*b).map(Value::Int).ok_or_else(overflow),
            (Value::String(a), Value::String(b)) => Ok(Value::String(format!("{}{}", a, b))),
            (Value::List(a), Value::List(b)) => {
                Ok(Value::List(a.iter().chain(b.iter()).cloned().collect()))
            }
            _ => match (as_float(&lhs), as_float(&rhs)) {
                (Some(a), Some(b)) => Ok(Value::Float(a + b)),
                _ => Err(mismatch(&lhs, &rhs)),
            },
        },
        BinaryOp::Sub => match (&lhs, &rhs) {
            (Value::Int(a), Value::Int(b)) => a.checked_sub(*b).map(Value::Int).ok_or_else(overflow),
            _ => match (as_float(&lhs), as_float(&rhs)) {
                (Some(a), Some(b)) => Ok(Value::Float(a - b)),
                _ => Err(mismatch(&lhs, &rhs)),
            },
        },
        BinaryOp::Mul => match (&lhs, &rhs) {
            (Value::Int(a), Value::Int(b)) => a.checked_mul(*b).map(Value::Int).ok_or_else(overflow),
            (Value::String(s), Value::Int(n)) => match usize::try_from(*n) {
                Ok(n) => match s.len().checked_mul(n) {
                    Some(len) if len <= MAX_REPEAT_LEN => Ok(Value::String(s.repeat(n))),
                    _ => Err(overflow()),
                },
                Err(_) => Err(EvalError::mismatch(
                    "cannot repeat a string a negative number of times",
                    span.clone(),
                )),
            },
            _ => match (as_float(&lhs), as_float(&rhs)) {
                (Some(a), Some(b)) => Ok(Value::Float(a * b)),
                _ => Err(mismatch(&lhs, &rhs)),
            },
        },
        BinaryOp::Div | BinaryOp::Rem => match (&lhs, &rhs) {
            (Value::Int(_), Value::Int(0)) => Err(EvalError::DivisionByZero { span: span.clone() }),
            (Value::Int(a), Value::Int(b)) => {
                let result = if op == BinaryOp::Div {
                    floor_div(*a, *b)
                } else {
                    floor_rem(*a, *b)
                };
                result.map(Value::Int).ok_or_else(overflow)
            }
            _ => match (as_float(&lhs), as_float(&rhs)) {
                (Some(a), Some(b)) if op == BinaryOp::Div => Ok(Value::Float(a / b)),
                (Some(a), Some(b)) => Ok(Value::Float(a - b * (a / b).floor())),
                _ => Err(mismatch(&lhs, &rhs)),
            },
        },
        // Handled with short-circuiting in `evaluate`
        BinaryOp::And | BinaryOp::Or => Ok(Value::Nil),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::UndefinedBehavior;
    use crate::parser::parse_expression;
    use crate::renderer::context::Locals;

    fn eval_with(source: &str, locals: &Locals, undefined: UndefinedBehavior) -> Result<Value, EvalError> {
        let expr = parse_expression(source, 0).expect("Should parse");
        let ctx = Context::new(locals, undefined);
        let mut block = BlockSlot::new(None);
        evaluate(&expr, &ctx, &mut block)
    }

    fn eval(source: &str, locals: &Locals) -> Result<Value, EvalError> {
        eval_with(source, locals, UndefinedBehavior::Strict)
    }

    fn people() -> Locals {
        let json: serde_json::Value = serde_json::from_str(
            r#"{
                "users": [{"name": "ann", "admin": true}, {"name": "bob", "admin": false}],
                "title": "Team",
                "count": 7
            }"#,
        )
        .unwrap();
        Locals::from_value(Value::from(json)).unwrap()
    }

    #[test]
    fn test_arithmetic() {
        let locals = Locals::new();
        assert_eq!(eval("1 + 2 * 3", &locals).unwrap(), Value::Int(7));
        assert_eq!(eval("(1 + 2) * 3", &locals).unwrap(), Value::Int(9));
        assert_eq!(eval("7 / 2", &locals).unwrap(), Value::Int(3));
        assert_eq!(eval("-7 / 2", &locals).unwrap(), Value::Int(-4));
        assert_eq!(eval("-7 % 3", &locals).unwrap(), Value::Int(2));
        assert_eq!(eval("1 + 0.5", &locals).unwrap(), Value::Float(1.5));
        assert_eq!(eval("7.0 / 2", &locals).unwrap(), Value::Float(3.5));
    }

    #[test]
    fn test_string_operations() {
        let locals = Locals::new();
        assert_eq!(eval("'ab' + 'cd'", &locals).unwrap(), Value::from("abcd"));
        assert_eq!(eval("'-' * 3", &locals).unwrap(), Value::from("---"));
        assert_eq!(eval("'Hi'.upcase", &locals).unwrap(), Value::from("HI"));
        assert_eq!(eval("'héllo'.size", &locals).unwrap(), Value::Int(5));
        assert_eq!(eval("'abc'[-1]", &locals).unwrap(), Value::from("c"));
    }

    #[test]
    fn test_comparisons_and_equality() {
        let locals = Locals::new();
        assert_eq!(eval("1 == 1.0", &locals).unwrap(), Value::Bool(true));
        assert_eq!(eval("2 >= 3", &locals).unwrap(), Value::Bool(false));
        assert_eq!(eval("'a' < 'b'", &locals).unwrap(), Value::Bool(true));
        assert_eq!(eval("nil == nil", &locals).unwrap(), Value::Bool(true));
        assert_eq!(eval("'1' != 1", &locals).unwrap(), Value::Bool(true));
    }

    #[test]
    fn test_logical_operators_return_operands() {
        let locals = Locals::new().with("nick", Value::Nil).with("name", "Ann");
        assert_eq!(eval("nick || name", &locals).unwrap(), Value::from("Ann"));
        assert_eq!(eval("name && 'yes'", &locals).unwrap(), Value::from("yes"));
        assert_eq!(eval("nick and missing", &locals).unwrap(), Value::Nil);
        assert_eq!(eval("not nick", &locals).unwrap(), Value::Bool(true));
    }

    #[test]
    fn test_short_circuit_skips_undefined_right_side() {
        let locals = Locals::new().with("ok", true);
        assert_eq!(eval("ok || undefined_name", &locals).unwrap(), Value::Bool(true));
    }

    #[test]
    fn test_property_and_index_access() {
        let locals = people();
        assert_eq!(eval("users.0.name", &locals).unwrap(), Value::from("ann"));
        assert_eq!(eval("users[1]['name']", &locals).unwrap(), Value::from("bob"));
        assert_eq!(eval("users.last.admin", &locals).unwrap(), Value::Bool(false));
        assert_eq!(eval("users.size", &locals).unwrap(), Value::Int(2));
        assert_eq!(eval("users[5]", &locals).unwrap(), Value::Nil);
        assert_eq!(eval("users.0.missing", &locals).unwrap(), Value::Nil);
    }

    #[test]
    fn test_map_key_shadows_builtin_property() {
        let locals = Locals::new().with(
            "box",
            Value::from(serde_json::json!({"size": "large"})),
        );
        assert_eq!(eval("box.size", &locals).unwrap(), Value::from("large"));
    }

    #[test]
    fn test_undefined_variable_is_an_error() {
        let err = eval("titel", &people()).unwrap_err();
        match err {
            EvalError::UndefinedVariable {
                name, suggestions, ..
            } => {
                assert_eq!(name, "titel");
                assert_eq!(suggestions, vec!["title".to_string()]);
            }
            other => panic!("Expected undefined variable, got {:?}", other),
        }
    }

    #[test]
    fn test_lenient_mode_allows_nil_chains() {
        let locals = Locals::new();
        assert_eq!(
            eval_with("missing.name[0]", &locals, UndefinedBehavior::Lenient).unwrap(),
            Value::Nil
        );
    }

    #[test]
    fn test_property_on_nil_is_an_error_in_strict_mode() {
        let locals = Locals::new().with("user", Value::Nil);
        assert!(matches!(
            eval("user.name", &locals),
            Err(EvalError::NoSuchProperty {
                type_name: "nil",
                ..
            })
        ));
    }

    #[test]
    fn test_type_mismatch() {
        let err = eval("'a' + 1", &Locals::new()).unwrap_err();
        assert!(matches!(err, EvalError::TypeMismatch { .. }));
        assert_eq!(err.span(), &(0..7));
    }

    #[test]
    fn test_division_by_zero() {
        assert!(matches!(
            eval("1 / 0", &Locals::new()),
            Err(EvalError::DivisionByZero { .. })
        ));
        assert!(matches!(
            eval("1 % 0", &Locals::new()),
            Err(EvalError::DivisionByZero { .. })
        ));
    }

    #[test]
    fn test_overflow() {
        let locals = Locals::new().with("big", i64::MAX);
        assert!(matches!(
            eval("big + 1", &locals),
            Err(EvalError::Overflow { .. })
        ));
    }

    #[test]
    fn test_string_repeat_is_bounded() {
        let locals = Locals::new().with("n", i64::MAX);
        assert!(matches!(
            eval("'ab' * n", &locals),
            Err(EvalError::Overflow { .. })
        ));
        let locals = Locals::new().with("n", (MAX_REPEAT_LEN / 2 + 1) as i64);
        assert!(matches!(
            eval("'ab' * n", &locals),
            Err(EvalError::Overflow { .. })
        ));
        assert_eq!(
            eval("'ab' * 0", &Locals::new()).unwrap(),
            Value::from("")
        );
    }

    #[test]
    fn test_min_rem_minus_one_is_zero() {
        let locals = Locals::new().with("min", i64::MIN);
        assert_eq!(eval("min % -1", &locals).unwrap(), Value::Int(0));
        assert_eq!(eval("7 % -1", &locals).unwrap(), Value::Int(0));
        assert!(matches!(
            eval("min / -1", &locals),
            Err(EvalError::Overflow { .. })
        ));
    }

    #[test]
    fn test_yield_without_block() {
        assert_eq!(
            eval("yield", &Locals::new()),
            Err(EvalError::MissingBlock { span: 0..5 })
        );
    }
}
