//! console.text, console.prompt, console.check

use super::{arg, join_args, unknown, BuiltinResult};
use crate::runtime::evaluator::Evaluator;
use crate::runtime::value::Value;

const YES: &[&str] = &["true", "yes", "y", "on", "1"];

/// Trimmed answer with control characters removed
fn clean_input(raw: &str) -> String {
    raw.chars()
        .filter(|c| !c.is_control())
        .collect::<String>()
        .trim()
        .to_string()
}

fn is_yes(answer: &str) -> bool {
    YES.contains(&answer.trim().to_lowercase().as_str())
}

fn check_bool(value: &Value) -> bool {
    match value {
        Value::Text(s) => is_yes(s),
        other => other.is_truthy(),
    }
}

impl Evaluator<'_> {
    pub(super) fn call_console(&mut self, name: &str, args: &[Value]) -> BuiltinResult {
        match name {
            "text.var" | "text.print" => {
                self.print(join_args(args));
                Ok(Value::Null)
            }
            "text.error" => {
                self.print_error(join_args(args));
                Ok(Value::Null)
            }
            "prompt.input" | "prompt.clean" | "prompt.confirm" => {
                let question = match arg(args, 0) {
                    Value::Null => String::new(),
                    other => other.as_text(),
                };
                let answer = self.host.read_line(&question)?.unwrap_or_default();
                Ok(match name {
                    "prompt.input" => Value::Text(answer),
                    "prompt.clean" => Value::Text(clean_input(&answer)),
                    _ => Value::Boolean(is_yes(&answer)),
                })
            }
            "check.bool" => Ok(Value::Boolean(check_bool(&arg(args, 0)))),
            _ => Err(unknown(name)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_input() {
        assert_eq!(clean_input("  Fuffy\u{7}\t "), "Fuffy");
    }

    #[test]
    fn test_check_bool() {
        assert!(check_bool(&Value::text("Yes")));
        assert!(check_bool(&Value::text(" on ")));
        assert!(!check_bool(&Value::text("nope")));
        assert!(check_bool(&Value::Number(2.0)));
        assert!(!check_bool(&Value::Null));
    }
}
