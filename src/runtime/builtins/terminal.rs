//! Terminal: progress bars, banners, tables, trees, spinners, forms

use indexmap::IndexMap;

use super::{number_arg, optional_number, text_arg, unknown, BuiltinResult, EvalError};
use crate::runtime::evaluator::Evaluator;
use crate::runtime::value::Value;

const DEFAULT_BAR_WIDTH: usize = 30;
const MAX_BAR_WIDTH: usize = 200;
const DEFAULT_SPINNER_FRAMES: usize = 10;
const MAX_SPINNER_FRAMES: usize = 1000;
const SPINNER: [char; 4] = ['|', '/', '-', '\\'];

pub(super) fn progress_line(current: f64, total: f64, width: usize) -> String {
    let width = width.min(MAX_BAR_WIDTH);
    let ratio = if total > 0.0 {
        (current / total).clamp(0.0, 1.0)
    } else {
        1.0
    };
    let filled = (ratio * width as f64).round() as usize;
    format!(
        "[{}{}] {:>3}%",
        "█".repeat(filled),
        "░".repeat(width - filled),
        (ratio * 100.0).round() as u32
    )
}

pub(super) fn banner_lines(text: &str) -> Vec<String> {
    let width = text.lines().map(|l| l.chars().count()).max().unwrap_or(0);
    let mut lines = vec![format!("╔{}╗", "═".repeat(width + 2))];
    for line in text.lines() {
        let pad = width - line.chars().count();
        lines.push(format!("║ {}{} ║", line, " ".repeat(pad)));
    }
    lines.push(format!("╚{}╝", "═".repeat(width + 2)));
    lines
}

/// Header and cell texts. Object rows share the union of their keys.
fn table_cells(rows: &[Value]) -> (Vec<String>, Vec<Vec<String>>) {
    let mut headers: Vec<String> = Vec::new();
    for row in rows {
        if let Value::Object(map) = row {
            for key in map.keys() {
                if !headers.contains(key) {
                    headers.push(key.clone());
                }
            }
        }
    }
    let cells = rows
        .iter()
        .map(|row| match row {
            Value::Object(map) => headers
                .iter()
                .map(|h| map.get(h).map(Value::as_text).unwrap_or_default())
                .collect(),
            Value::Array(items) => items.iter().map(Value::as_text).collect(),
            other => vec![other.as_text()],
        })
        .collect();
    (headers, cells)
}

pub(super) fn table_lines(rows: &[Value]) -> Vec<String> {
    let (headers, cells) = table_cells(rows);
    let columns = cells
        .iter()
        .map(Vec::len)
        .chain(std::iter::once(headers.len()))
        .max()
        .unwrap_or(0);
    let mut widths = vec![0usize; columns];
    for row in std::iter::once(&headers).chain(cells.iter()) {
        for (i, cell) in row.iter().enumerate() {
            widths[i] = widths[i].max(cell.chars().count());
        }
    }
    let render = |row: &[String]| -> String {
        let padded: Vec<String> = widths
            .iter()
            .enumerate()
            .map(|(i, w)| {
                let cell = row.get(i).map(String::as_str).unwrap_or("");
                format!("{}{}", cell, " ".repeat(w - cell.chars().count()))
            })
            .collect();
        format!("│ {} │", padded.join(" │ "))
    };
    let rule = |left: &str, mid: &str, right: &str| -> String {
        let parts: Vec<String> = widths.iter().map(|w| "─".repeat(w + 2)).collect();
        format!("{}{}{}", left, parts.join(mid), right)
    };

    let mut lines = vec![rule("┌", "┬", "┐")];
    if !headers.is_empty() {
        lines.push(render(&headers));
        lines.push(rule("├", "┼", "┤"));
    }
    for row in &cells {
        lines.push(render(row));
    }
    lines.push(rule("└", "┴", "┘"));
    lines
}

fn is_container(value: &Value) -> bool {
    matches!(value, Value::Object(_) | Value::Array(_))
}

fn tree_children(value: &Value) -> Vec<(String, &Value)> {
    match value {
        Value::Object(map) => map.iter().map(|(k, v)| (k.clone(), v)).collect(),
        Value::Array(items) => items
            .iter()
            .enumerate()
            .map(|(i, v)| (format!("[{}]", i), v))
            .collect(),
        _ => Vec::new(),
    }
}

fn push_tree(value: &Value, prefix: &str, lines: &mut Vec<String>) {
    let children = tree_children(value);
    let count = children.len();
    for (i, (label, child)) in children.into_iter().enumerate() {
        let last = i + 1 == count;
        let branch = if last { "└── " } else { "├── " };
        if is_container(child) {
            lines.push(format!("{}{}{}", prefix, branch, label));
            let next = format!("{}{}", prefix, if last { "    " } else { "│   " });
            push_tree(child, &next, lines);
        } else {
            lines.push(format!("{}{}{}: {}", prefix, branch, label, child.as_text()));
        }
    }
}

pub(super) fn tree_lines(value: &Value) -> Vec<String> {
    if !is_container(value) {
        return vec![value.as_text()];
    }
    let mut lines = Vec::new();
    push_tree(value, "", &mut lines);
    lines
}

impl Evaluator<'_> {
    pub(super) fn call_terminal(&mut self, name: &str, args: &[Value]) -> BuiltinResult {
        match name {
            "progress" => {
                let current = number_arg(args, 0)?;
                let total = number_arg(args, 1)?;
                let width = optional_number(args, 2)?
                    .filter(|w| *w >= 1.0)
                    .map_or(DEFAULT_BAR_WIDTH, |w| w.min(MAX_BAR_WIDTH as f64) as usize);
                self.print(progress_line(current, total, width));
            }
            "banner" => {
                for line in banner_lines(&text_arg(args, 0)?) {
                    self.print(line);
                }
            }
            "table" => {
                let rows = match args.first() {
                    Some(Value::Array(rows)) => rows.clone(),
                    Some(other) => {
                        return Err(EvalError::new(format!(
                            "expects an array of rows, got {}",
                            other.type_name()
                        )))
                    }
                    None => Vec::new(),
                };
                for line in table_lines(&rows) {
                    self.print(line);
                }
            }
            "tree" => {
                let value = args.first().cloned().unwrap_or(Value::Null);
                for line in tree_lines(&value) {
                    self.print(line);
                }
            }
            "spinner" => {
                let label = text_arg(args, 0)?;
                let frames = optional_number(args, 1)?
                    .filter(|f| *f >= 1.0)
                    .map_or(DEFAULT_SPINNER_FRAMES, |f| {
                        f.min(MAX_SPINNER_FRAMES as f64) as usize
                    });
                let delay = (1000.0 / self.fps).round() as u64;
                for frame in 0..frames {
                    // Frames go to the host only, not the captured output
                    self.host
                        .write_out(&format!("{} {}", SPINNER[frame % SPINNER.len()], label));
                    self.host.sleep(delay);
                }
                self.print(format!("✔ {}", label));
            }
            "form" => {
                let fields: Vec<String> = match args.first() {
                    Some(Value::Array(items)) => items.iter().map(Value::as_text).collect(),
                    _ => return Err(EvalError::new("expects an array of field names")),
                };
                let mut answers = IndexMap::new();
                for field in fields {
                    let answer = self
                        .host
                        .read_line(&format!("{}: ", field))?
                        .unwrap_or_default();
                    answers.insert(field, Value::Text(answer.trim().to_string()));
                }
                return Ok(Value::Object(answers));
            }
            _ => return Err(unknown(name)),
        }
        Ok(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RunOptions;
    use crate::runtime::host::MemoryHost;

    #[test]
    fn test_progress_line() {
        assert_eq!(progress_line(5.0, 10.0, 10), "[█████░░░░░]  50%");
        assert_eq!(progress_line(20.0, 10.0, 4), "[████] 100%");
    }

    #[test]
    fn test_progress_width_is_clamped() {
        let mut host = MemoryHost::new();
        let mut evaluator = Evaluator::new(&mut host, &RunOptions::default());
        evaluator
            .call_terminal(
                "progress",
                &[Value::Number(1.0), Value::Number(2.0), Value::Number(f64::INFINITY)],
            )
            .unwrap();
        let line = evaluator.output().last().cloned().unwrap_or_default();
        assert_eq!(line.chars().filter(|c| *c == '█').count(), MAX_BAR_WIDTH / 2);
        assert!(line.ends_with(" 50%"));
        assert_eq!(progress_line(1.0, 1.0, usize::MAX).chars().count(), MAX_BAR_WIDTH + 7);
    }

    #[test]
    fn test_banner() {
        assert_eq!(banner_lines("Hi"), vec!["╔════╗", "║ Hi ║", "╚════╝"]);
    }

    #[test]
    fn test_table_from_objects() {
        let row = |name: &str, age: f64| {
            let mut map = IndexMap::new();
            map.insert("name".to_string(), Value::text(name));
            map.insert("age".to_string(), Value::Number(age));
            Value::Object(map)
        };
        let lines = table_lines(&[row("Fuffy", 3.0), row("Rex", 11.0)]);
        assert_eq!(
            lines,
            vec![
                "┌───────┬─────┐",
                "│ name  │ age │",
                "├───────┼─────┤",
                "│ Fuffy │ 3   │",
                "│ Rex   │ 11  │",
                "└───────┴─────┘",
            ]
        );
    }

    #[test]
    fn test_tree() {
        let value = Value::from_json(&serde_json::json!({"pets": ["Fuffy"], "owner": "Ann"}));
        let lines = tree_lines(&value);
        assert_eq!(lines, vec!["├── owner: Ann", "└── pets", "    └── [0]: Fuffy"]);
    }

    #[test]
    fn test_form_and_spinner() {
        let mut host = MemoryHost::new().with_input(["  Fuffy ", "3"]);
        {
            let mut evaluator = Evaluator::new(&mut host, &RunOptions::default());
            let fields = Value::Array(vec![Value::text("name"), Value::text("age")]);
            let answers = evaluator.call_terminal("form", &[fields]).unwrap();
            assert_eq!(answers.as_text(), "{ name: 'Fuffy', age: '3' }");

            evaluator
                .call_terminal("spinner", &[Value::text("Loading"), Value::Number(3.0)])
                .unwrap();
            assert_eq!(evaluator.output().last().map(String::as_str), Some("✔ Loading"));
        }
        assert_eq!(host.prompts, vec!["name: ", "age: "]);
        assert_eq!(host.sleeps, vec![100, 100, 100]);
    }
}
