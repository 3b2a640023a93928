//! Diagnostic model shared by every stage
//!
//! A diagnostic is created once and never edited afterwards. The only
//! sanctioned change is a severity downgrade applied by the pipeline
//! (see [`Diagnostic::downgraded`]).

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// A point in the source text (all fields 0-based)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Position {
    pub offset: usize,
    pub line: u32,
    pub column: u32,
}

impl Position {
    pub const fn new(offset: usize, line: u32, column: u32) -> Self {
        Self {
            offset,
            line,
            column,
        }
    }
}

/// Half-open source span; `end.offset >= start.offset`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Range {
    pub start: Position,
    pub end: Position,
}

impl Range {
    pub fn new(start: Position, end: Position) -> Self {
        if end.offset < start.offset {
            Self { start: end, end: start }
        } else {
            Self { start, end }
        }
    }

    /// Smallest range covering both `self` and `other`
    pub fn cover(self, other: Range) -> Range {
        let start = if other.start.offset < self.start.offset {
            other.start
        } else {
            self.start
        };
        let end = if other.end.offset > self.end.offset {
            other.end
        } else {
            self.end
        };
        Range { start, end }
    }

    pub fn contains_offset(&self, offset: usize) -> bool {
        self.start.offset <= offset && offset <= self.end.offset
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl Severity {
    /// Higher rank sorts first among diagnostics at the same offset
    pub fn rank(self) -> u8 {
        match self {
            Severity::Error => 3,
            Severity::Warning => 2,
            Severity::Info => 1,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Info => "info",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pipeline stage that produced a diagnostic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Lex,
    Parse,
    Resolve,
    Lint,
    Run,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Lex => "lex",
            Stage::Parse => "parse",
            Stage::Resolve => "resolve",
            Stage::Lint => "lint",
            Stage::Run => "run",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub code: String,
    pub message: String,
    pub range: Range,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<Stage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl Diagnostic {
    pub fn new(
        severity: Severity,
        code: impl Into<String>,
        message: impl Into<String>,
        range: Range,
    ) -> Self {
        Self {
            severity,
            code: code.into(),
            message: message.into(),
            range,
            stage: None,
            hint: None,
        }
    }

    pub fn error(code: impl Into<String>, message: impl Into<String>, range: Range) -> Self {
        Self::new(Severity::Error, code, message, range)
    }

    pub fn warning(code: impl Into<String>, message: impl Into<String>, range: Range) -> Self {
        Self::new(Severity::Warning, code, message, range)
    }

    pub fn info(code: impl Into<String>, message: impl Into<String>, range: Range) -> Self {
        Self::new(Severity::Info, code, message, range)
    }

    pub fn with_stage(mut self, stage: Stage) -> Self {
        self.stage = Some(stage);
        self
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }

    /// Copy of this diagnostic with a lower severity. A request to raise
    /// the severity returns the diagnostic unchanged.
    pub fn downgraded(&self, to: Severity) -> Self {
        let mut copy = self.clone();
        if to.rank() < self.severity.rank() {
            copy.severity = to;
        }
        copy
    }

    /// Editor-facing shape: 0-based line/character and the hint folded into the message
    pub fn to_wire(&self) -> WireDiagnostic {
        let message = match &self.hint {
            Some(hint) => format!("{}\n{}", self.message, hint),
            None => self.message.clone(),
        };
        WireDiagnostic {
            severity: self.severity,
            range: WireRange {
                start: WirePosition::from(self.range.start),
                end: WirePosition::from(self.range.end),
            },
            message,
            code: self.code.clone(),
            source: "forge".to_string(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}: {} [{}] {}",
            self.range.start.line + 1,
            self.range.start.column + 1,
            self.severity,
            self.code,
            self.message
        )?;
        if let Some(hint) = &self.hint {
            write!(f, " ({})", hint)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WirePosition {
    pub line: u32,
    pub character: u32,
}

impl From<Position> for WirePosition {
    fn from(pos: Position) -> Self {
        Self {
            line: pos.line,
            character: pos.column,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireRange {
    pub start: WirePosition,
    pub end: WirePosition,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireDiagnostic {
    pub severity: Severity,
    pub range: WireRange,
    pub message: String,
    pub code: String,
    pub source: String,
}

/// Total order: start offset, then severity (errors first), then code
fn compare(a: &Diagnostic, b: &Diagnostic) -> Ordering {
    a.range
        .start
        .offset
        .cmp(&b.range.start.offset)
        .then_with(|| b.severity.rank().cmp(&a.severity.rank()))
        .then_with(|| a.code.cmp(&b.code))
}

fn same_report(a: &Diagnostic, b: &Diagnostic) -> bool {
    a.code == b.code
        && a.severity == b.severity
        && a.range.start.offset == b.range.start.offset
        && a.range.end.offset == b.range.end.offset
        && a.message == b.message
}

/// Stable sort by the diagnostic total order
pub fn sort(mut list: Vec<Diagnostic>) -> Vec<Diagnostic> {
    list.sort_by(compare);
    list
}

/// Drop later duplicates. Diagnostics with equal identity always sort
/// next to each other, so the list is sorted first.
pub fn dedupe(list: Vec<Diagnostic>) -> Vec<Diagnostic> {
    let mut out: Vec<Diagnostic> = Vec::with_capacity(list.len());
    for diag in sort(list) {
        let duplicate = out
            .iter()
            .rev()
            .take_while(|d| compare(d, &diag) == Ordering::Equal)
            .any(|d| same_report(d, &diag));
        if !duplicate {
            out.push(diag);
        }
    }
    out
}

/// Concatenate lists and return them sorted
pub fn merge<I>(lists: I) -> Vec<Diagnostic>
where
    I: IntoIterator<Item = Vec<Diagnostic>>,
{
    sort(lists.into_iter().flatten().collect())
}

pub fn has_errors(list: &[Diagnostic]) -> bool {
    list.iter().any(Diagnostic::is_error)
}

pub fn has_warnings(list: &[Diagnostic]) -> bool {
    list.iter().any(|d| d.severity == Severity::Warning)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(offset: usize) -> Range {
        Range::new(
            Position::new(offset, 0, offset as u32),
            Position::new(offset + 1, 0, offset as u32 + 1),
        )
    }

    #[test]
    fn test_sort_by_offset_then_severity_then_code() {
        let list = vec![
            Diagnostic::info("B", "b", at(3)),
            Diagnostic::error("Z", "z", at(3)),
            Diagnostic::warning("A", "a", at(0)),
            Diagnostic::error("A", "a", at(3)),
        ];
        let sorted = sort(list);
        let codes: Vec<(&str, Severity)> = sorted
            .iter()
            .map(|d| (d.code.as_str(), d.severity))
            .collect();
        assert_eq!(
            codes,
            vec![
                ("A", Severity::Warning),
                ("A", Severity::Error),
                ("Z", Severity::Error),
                ("B", Severity::Info),
            ]
        );
    }

    #[test]
    fn test_dedupe_keeps_first() {
        let list = vec![
            Diagnostic::error("X", "same", at(1)).with_hint("first"),
            Diagnostic::error("X", "same", at(1)).with_hint("second"),
            Diagnostic::error("X", "different", at(1)),
        ];
        let out = dedupe(list);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].hint.as_deref(), Some("first"));
    }

    #[test]
    fn test_sort_and_dedupe_commute_and_are_idempotent() {
        let list = vec![
            Diagnostic::warning("W", "w", at(5)),
            Diagnostic::error("E", "e", at(2)),
            Diagnostic::warning("W", "w", at(5)),
            Diagnostic::info("I", "i", at(2)),
            Diagnostic::error("E", "e", at(2)),
        ];
        let a = sort(dedupe(list.clone()));
        let b = dedupe(sort(list));
        assert_eq!(a, b);
        assert_eq!(sort(a.clone()), a);
        assert_eq!(dedupe(b.clone()), b);
    }

    #[test]
    fn test_downgrade_never_upgrades() {
        let warn = Diagnostic::warning("W", "w", at(0));
        assert_eq!(warn.downgraded(Severity::Error).severity, Severity::Warning);
        assert_eq!(warn.downgraded(Severity::Info).severity, Severity::Info);
    }

    #[test]
    fn test_wire_shape_appends_hint() {
        let diag = Diagnostic::error("MODULE_NOT_ENABLED", "Sys is not enabled", at(4))
            .with_hint("add able 'Sys';");
        let wire = diag.to_wire();
        assert_eq!(wire.message, "Sys is not enabled\nadd able 'Sys';");
        assert_eq!(wire.range.start.character, 4);
        assert_eq!(wire.source, "forge");
    }

    #[test]
    fn test_range_new_normalizes_order() {
        let r = Range::new(Position::new(9, 0, 9), Position::new(2, 0, 2));
        assert_eq!(r.start.offset, 2);
        assert_eq!(r.end.offset, 9);
    }
}
