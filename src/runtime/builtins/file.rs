//! File: filesystem access, JSON and CSV helpers

use indexmap::IndexMap;

use super::{arg, require_args, text_arg, unknown, BuiltinResult, EvalError};
use crate::runtime::evaluator::Evaluator;
use crate::runtime::value::Value;

/// Naive CSV: one row per non-empty line, cells split on commas
pub(super) fn parse_csv(text: &str) -> Value {
    let rows = text
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| {
            Value::Array(
                line.split(',')
                    .map(|cell| Value::Text(cell.trim().to_string()))
                    .collect(),
            )
        })
        .collect();
    Value::Array(rows)
}

pub(super) fn format_csv(rows: &Value) -> Result<String, EvalError> {
    let Value::Array(rows) = rows else {
        return Err(EvalError::new("rows must be an array"));
    };
    let mut out = String::new();
    for row in rows {
        let cells: Vec<String> = match row {
            Value::Array(cells) => cells.iter().map(Value::as_text).collect(),
            Value::Object(map) => map.values().map(Value::as_text).collect(),
            other => vec![other.as_text()],
        };
        out.push_str(&cells.join(","));
        out.push('\n');
    }
    Ok(out)
}

impl Evaluator<'_> {
    pub(super) fn call_file(&mut self, name: &str, args: &[Value]) -> BuiltinResult {
        let path = text_arg(args, 0)?;
        match name {
            "read" => Ok(Value::Text(self.host.read_file(&path)?)),
            "write" | "append" => {
                require_args(args, 2)?;
                let content = arg(args, 1).as_text();
                self.host.write_file(&path, &content, name == "append")?;
                Ok(Value::Null)
            }
            "delete" => Ok(Value::Boolean(self.host.delete_file(&path)?)),
            "exists" => Ok(Value::Boolean(self.host.exists(&path))),
            "info" => {
                let info = self.host.file_info(&path)?;
                let mut map = IndexMap::new();
                map.insert("size".to_string(), Value::Number(info.size as f64));
                map.insert("isFile".to_string(), Value::Boolean(info.is_file));
                map.insert("isDirectory".to_string(), Value::Boolean(info.is_dir));
                map.insert(
                    "modified".to_string(),
                    info.modified
                        .map_or(Value::Null, |ms| Value::Number(ms as f64)),
                );
                Ok(Value::Object(map))
            }
            "copy" | "move" => {
                let target = text_arg(args, 1)?;
                if name == "copy" {
                    self.host.copy_file(&path, &target)?;
                } else {
                    self.host.move_file(&path, &target)?;
                }
                Ok(Value::Null)
            }
            "mkdir" => {
                self.host.create_dir(&path)?;
                Ok(Value::Null)
            }
            "list" => Ok(Value::Array(
                self.host
                    .list_dir(&path)?
                    .into_iter()
                    .map(Value::Text)
                    .collect(),
            )),
            "readJson" => {
                let text = self.host.read_file(&path)?;
                let json: serde_json::Value = serde_json::from_str(&text)
                    .map_err(|e| EvalError::new(format!("invalid JSON in {}: {}", path, e)))?;
                Ok(Value::from_json(&json))
            }
            "writeJson" => {
                require_args(args, 2)?;
                let text = serde_json::to_string_pretty(&arg(args, 1).to_json())
                    .map_err(|e| EvalError::new(e.to_string()))?;
                self.host.write_file(&path, &text, false)?;
                Ok(Value::Null)
            }
            "readCsv" => Ok(parse_csv(&self.host.read_file(&path)?)),
            "writeCsv" => {
                require_args(args, 2)?;
                let text = format_csv(&arg(args, 1))?;
                self.host.write_file(&path, &text, false)?;
                Ok(Value::Null)
            }
            _ => Err(unknown(name)),
        }
    }
}
