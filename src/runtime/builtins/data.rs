//! Regex, JSON and DateTime

use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, SecondsFormat, Utc};
use regex::Regex;

use super::{number_arg, optional_number, require_args, text_arg, unknown, BuiltinResult, EvalError};
use crate::runtime::evaluator::Evaluator;
use crate::runtime::value::Value;

fn compile(pattern: &str) -> Result<Regex, EvalError> {
    Regex::new(pattern).map_err(|e| EvalError::new(format!("invalid pattern: {}", e)))
}

pub(super) fn call_regex(name: &str, args: &[Value]) -> BuiltinResult {
    require_args(args, 2)?;
    let pattern = compile(&text_arg(args, 0)?)?;
    let text = text_arg(args, 1)?;
    match name {
        "test" => Ok(Value::Boolean(pattern.is_match(&text))),
        "match" => {
            let matches: Vec<Value> = pattern
                .find_iter(&text)
                .map(|m| Value::Text(m.as_str().to_string()))
                .collect();
            if matches.is_empty() {
                Ok(Value::Null)
            } else {
                Ok(Value::Array(matches))
            }
        }
        "replace" => {
            let replacement = text_arg(args, 2)?;
            Ok(Value::Text(
                pattern.replace_all(&text, replacement.as_str()).into_owned(),
            ))
        }
        _ => Err(unknown(name)),
    }
}

pub(super) fn call_json(name: &str, args: &[Value]) -> BuiltinResult {
    match name {
        "parse" => {
            let text = text_arg(args, 0)?;
            let json: serde_json::Value = serde_json::from_str(&text)
                .map_err(|e| EvalError::new(format!("invalid JSON: {}", e)))?;
            Ok(Value::from_json(&json))
        }
        "stringify" => {
            let json = args.first().map_or(serde_json::Value::Null, Value::to_json);
            let pretty = optional_number(args, 1)?.is_some_and(|indent| indent > 0.0);
            let text = if pretty {
                serde_json::to_string_pretty(&json)
            } else {
                serde_json::to_string(&json)
            }
            .map_err(|e| EvalError::new(e.to_string()))?;
            Ok(Value::Text(text))
        }
        _ => Err(unknown(name)),
    }
}

fn timestamp(ms: i64) -> Result<DateTime<Utc>, EvalError> {
    DateTime::<Utc>::from_timestamp_millis(ms)
        .ok_or_else(|| EvalError::new(format!("timestamp {} is out of range", ms)))
}

/// strftime formatting that reports bad patterns instead of panicking
fn format_timestamp(ms: i64, pattern: &str) -> Result<String, EvalError> {
    let items: Vec<Item<'_>> = StrftimeItems::new(pattern).collect();
    if items.iter().any(|item| matches!(item, Item::Error)) {
        return Err(EvalError::new(format!("invalid format pattern '{}'", pattern)));
    }
    Ok(timestamp(ms)?
        .format_with_items(items.into_iter())
        .to_string())
}

impl Evaluator<'_> {
    pub(super) fn call_datetime(&mut self, name: &str, args: &[Value]) -> BuiltinResult {
        match name {
            "now" => {
                let now = timestamp(self.host.now_ms())?;
                Ok(Value::Text(now.to_rfc3339_opts(SecondsFormat::Millis, true)))
            }
            "format" => {
                let ms = number_arg(args, 0)?;
                let pattern = text_arg(args, 1)?;
                Ok(Value::Text(format_timestamp(ms as i64, &pattern)?))
            }
            "timestamp" => Ok(Value::Number(self.host.now_ms() as f64)),
            _ => Err(unknown(name)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RunOptions;
    use crate::runtime::host::MemoryHost;

    #[test]
    fn test_regex_builtins() {
        let args = |p: &str, t: &str| vec![Value::text(p), Value::text(t)];
        assert_eq!(call_regex("test", &args(r"\d+", "a1")).unwrap(), Value::Boolean(true));
        assert_eq!(
            call_regex("match", &args(r"\d", "a1b2")).unwrap().as_text(),
            "['1', '2']"
        );
        assert_eq!(call_regex("match", &args(r"\d", "ab")).unwrap(), Value::Null);
        let mut replace = args("o", "foo");
        replace.push(Value::text("0"));
        assert_eq!(call_regex("replace", &replace).unwrap(), Value::text("f00"));
        assert!(call_regex("test", &args("(", "x")).is_err());
    }

    #[test]
    fn test_json_builtins() {
        let parsed = call_json("parse", &[Value::text("[1, \"two\", null]")]).unwrap();
        assert_eq!(parsed.as_text(), "[1, 'two', null]");
        assert_eq!(
            call_json("stringify", &[parsed]).unwrap(),
            Value::text("[1,\"two\",null]")
        );
        assert!(call_json("parse", &[Value::text("{oops")]).is_err());
    }

    #[test]
    fn test_datetime_uses_host_clock() {
        let mut host = MemoryHost::new();
        let mut evaluator = Evaluator::new(&mut host, &RunOptions::default());
        assert_eq!(
            evaluator.call_datetime("now", &[]).unwrap(),
            Value::text("2023-11-14T22:13:20.000Z")
        );
        let formatted = evaluator
            .call_datetime("format", &[Value::Number(0.0), Value::text("%Y-%m-%d")])
            .unwrap();
        assert_eq!(formatted, Value::text("1970-01-01"));
        assert!(evaluator
            .call_datetime("format", &[Value::Number(0.0), Value::text("%Q")])
            .is_err());
    }
}
