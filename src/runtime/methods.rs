//! String, array and object methods

use super::evaluator::{Evaluator, Exec, ExecError};
use super::value::Value;
use crate::diagnostics::Range;
use crate::syntax::ast::{Expr, ExprKind};

const STRING_METHODS: &[&str] = &[
    "toUpperCase",
    "toLowerCase",
    "trim",
    "split",
    "includes",
    "indexOf",
    "slice",
];

const ARRAY_METHODS: &[&str] = &[
    "push", "pop", "join", "includes", "indexOf", "slice", "map", "filter", "forEach",
];

/// Whether `name` is a callable method of `receiver`. Object keys shadow
/// the `keys` method.
pub(super) fn is_method(receiver: &Value, name: &str) -> bool {
    match receiver {
        Value::Text(_) => STRING_METHODS.contains(&name),
        Value::Array(_) => ARRAY_METHODS.contains(&name),
        Value::Object(map) => name == "keys" && !map.contains_key(name),
        _ => false,
    }
}

/// Resolve negative and out-of-range `slice` bounds against `len`
fn slice_bounds(args: &[Value], len: usize) -> (usize, usize) {
    let clamp = |value: Option<&Value>, default: usize| -> usize {
        match value.and_then(Value::as_number) {
            None => default,
            Some(n) if n < 0.0 => len.saturating_sub((-n) as usize),
            Some(n) => (n as usize).min(len),
        }
    };
    let start = clamp(args.first(), 0);
    let end = clamp(args.get(1).filter(|v| !v.is_null()), len);
    (start, end.max(start))
}

fn is_place(expr: &Expr) -> bool {
    matches!(
        expr.kind,
        ExprKind::Identifier(_)
            | ExprKind::Namespaced { .. }
            | ExprKind::Member { .. }
            | ExprKind::Index { .. }
    )
}

impl Evaluator<'_> {
    pub(super) fn call_method(
        &mut self,
        receiver: Value,
        name: &str,
        args: Vec<Value>,
        receiver_expr: &Expr,
        range: Range,
    ) -> Exec<Value> {
        match receiver {
            Value::Text(s) => Ok(string_method(&s, name, &args)),
            Value::Object(map) => Ok(Value::Array(
                map.keys().map(|k| Value::Text(k.clone())).collect(),
            )),
            Value::Array(mut items) => match name {
                "push" => {
                    items.extend(args);
                    let len = items.len();
                    if is_place(receiver_expr) {
                        self.store_into(receiver_expr, Value::Array(items), true)?;
                    }
                    Ok(Value::Number(len as f64))
                }
                "pop" => {
                    let last = items.pop().unwrap_or(Value::Null);
                    if is_place(receiver_expr) {
                        self.store_into(receiver_expr, Value::Array(items), true)?;
                    }
                    Ok(last)
                }
                "map" | "filter" | "forEach" => {
                    let callback = args.into_iter().next().unwrap_or(Value::Null);
                    let mut mapped = Vec::new();
                    for (index, item) in items.into_iter().enumerate() {
                        let result = self.call_value(
                            callback.clone(),
                            vec![item.clone(), Value::Number(index as f64)],
                            range,
                        )?;
                        match name {
                            "map" => mapped.push(result),
                            "filter" if result.is_truthy() => mapped.push(item),
                            _ => {}
                        }
                    }
                    if name == "forEach" {
                        Ok(Value::Null)
                    } else {
                        Ok(Value::Array(mapped))
                    }
                }
                _ => Ok(array_method(items, name, &args)),
            },
            other => Err(ExecError::new(
                format!("'{}' is not a method of {}", name, other.type_name()),
                range,
            )
            .into()),
        }
    }
}

fn string_method(s: &str, name: &str, args: &[Value]) -> Value {
    let arg_text = |i: usize| args.get(i).map(Value::as_text).unwrap_or_default();
    match name {
        "toUpperCase" => Value::Text(s.to_uppercase()),
        "toLowerCase" => Value::Text(s.to_lowercase()),
        "trim" => Value::Text(s.trim().to_string()),
        "split" => {
            let separator = arg_text(0);
            let parts: Vec<Value> = if separator.is_empty() {
                s.chars().map(|c| Value::Text(c.to_string())).collect()
            } else {
                s.split(separator.as_str())
                    .map(|p| Value::Text(p.to_string()))
                    .collect()
            };
            Value::Array(parts)
        }
        "includes" => Value::Boolean(s.contains(arg_text(0).as_str())),
        "indexOf" => {
            let needle = arg_text(0);
            let index = s
                .find(needle.as_str())
                .map(|byte| s[..byte].chars().count() as f64)
                .unwrap_or(-1.0);
            Value::Number(index)
        }
        _ => {
            let chars: Vec<char> = s.chars().collect();
            let (start, end) = slice_bounds(args, chars.len());
            Value::Text(chars[start..end].iter().collect())
        }
    }
}

fn array_method(items: Vec<Value>, name: &str, args: &[Value]) -> Value {
    let needle = args.first().cloned().unwrap_or(Value::Null);
    match name {
        "join" => {
            let separator = args
                .first()
                .map(Value::as_text)
                .unwrap_or_else(|| ",".to_string());
            let parts: Vec<String> = items.iter().map(Value::as_text).collect();
            Value::Text(parts.join(&separator))
        }
        "includes" => Value::Boolean(items.iter().any(|v| v.strict_equals(&needle))),
        "indexOf" => Value::Number(
            items
                .iter()
                .position(|v| v.strict_equals(&needle))
                .map_or(-1.0, |i| i as f64),
        ),
        _ => {
            let (start, end) = slice_bounds(args, items.len());
            Value::Array(items[start..end].to_vec())
        }
    }
}
