use crate::config::{ForgeConfig, RunOptions};
use crate::diagnostics::{Diagnostic, Severity, WireDiagnostic};
use crate::error::{ForgeError, ForgeResult};
use crate::intel::{self, CompletionItem};
use crate::pipeline::Analyzer;
use crate::runtime::{Executor, SystemHost};
use colored::Colorize;
use std::fs;
use std::path::Path;
use tracing::debug;

fn read_source(file: &Path) -> ForgeResult<String> {
    debug!(file = %file.display(), "reading source");
    Ok(fs::read_to_string(file)?)
}

/// One colored line per diagnostic: `file:line:col severity[code] message`
pub fn render_diagnostic(file: &Path, diag: &Diagnostic) -> String {
    let location = format!(
        "{}:{}:{}",
        file.display(),
        diag.range.start.line + 1,
        diag.range.start.column + 1
    );
    let label = match diag.severity {
        Severity::Error => format!("error[{}]", diag.code).red().bold(),
        Severity::Warning => format!("warning[{}]", diag.code).yellow().bold(),
        Severity::Info => format!("info[{}]", diag.code).blue(),
    };
    let mut line = format!("{} {} {}", location.bold(), label, diag.message);
    if let Some(hint) = &diag.hint {
        line.push_str(&format!("\n    {} {}", "hint:".cyan(), hint));
    }
    line
}

pub fn wire_diagnostics(diagnostics: &[Diagnostic]) -> Vec<WireDiagnostic> {
    diagnostics.iter().map(Diagnostic::to_wire).collect()
}

fn summary(diagnostics: &[Diagnostic]) -> (usize, usize, usize) {
    let count = |severity| diagnostics.iter().filter(|d| d.severity == severity).count();
    (
        count(Severity::Error),
        count(Severity::Warning),
        count(Severity::Info),
    )
}

/// Analyze a file and print its diagnostics; returns whether it is error-free
pub fn check(file: &Path, config: &ForgeConfig, json: bool) -> ForgeResult<bool> {
    let source = read_source(file)?;
    let result = Analyzer::new(config.clone()).analyze(&source);

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&wire_diagnostics(&result.diagnostics))?
        );
        return Ok(result.ok);
    }

    for diag in &result.diagnostics {
        println!("{}", render_diagnostic(file, diag));
    }
    let (errors, warnings, infos) = summary(&result.diagnostics);
    let line = format!(
        "{} error(s), {} warning(s), {} info",
        errors, warnings, infos
    );
    if result.ok {
        println!("{} {}", "✅".green(), line.green());
    } else {
        println!("{} {}", "❌".red(), line.red().bold());
    }
    debug!(total_ms = result.timings.total_ms, "check finished");
    Ok(result.ok)
}

/// Execute a file against the real system; returns the exit code
pub fn run(file: &Path, config: &ForgeConfig, options: RunOptions) -> ForgeResult<i32> {
    let source = read_source(file)?;
    let verbose = options.verbose;
    let executor = Executor::new(config.clone(), options);
    let mut host = SystemHost::new();
    let result = executor.run(&source, &mut host);

    for diag in &result.diagnostics {
        if diag.severity == Severity::Error || verbose {
            eprintln!("{}", render_diagnostic(file, diag));
        }
    }
    if verbose {
        for skipped in &result.skipped {
            eprintln!(
                "{} line {}: {}",
                "skipped".yellow(),
                skipped.range.start.line + 1,
                skipped.reason
            );
        }
        eprintln!(
            "{}",
            format!(
                "analysis {:.2} ms, execution {:.2} ms",
                result.timings.total_ms, result.duration_ms
            )
            .dimmed()
        );
    }
    Ok(result.exit_code)
}

/// Completion items at a 0-based position
pub fn completions(
    file: &Path,
    config: &ForgeConfig,
    line: u32,
    column: u32,
) -> ForgeResult<Vec<CompletionItem>> {
    let source = read_source(file)?;
    let result = Analyzer::new(config.clone()).analyze(&source);
    Ok(intel::complete(
        &source,
        result.semantic.as_deref(),
        line,
        column,
        config,
    ))
}

pub fn complete(
    file: &Path,
    config: &ForgeConfig,
    line: u32,
    column: u32,
    json: bool,
) -> ForgeResult<()> {
    let items = completions(file, config, line, column)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&items)?);
        return Ok(());
    }
    for item in &items {
        match &item.detail {
            Some(detail) => println!("{}  {}", item.label.bold(), detail.dimmed()),
            None => println!("{}", item.label.bold()),
        }
    }
    Ok(())
}

pub fn hover(file: &Path, config: &ForgeConfig, line: u32, column: u32) -> ForgeResult<()> {
    let source = read_source(file)?;
    let result = Analyzer::new(config.clone()).analyze(&source);
    match intel::hover(&source, result.semantic.as_deref(), line, column) {
        Some(text) => {
            println!("{}", text);
            Ok(())
        }
        None => Err(ForgeError::Runtime(format!(
            "nothing to describe at {}:{}",
            line, column
        ))),
    }
}

/// Outline of a file's declarations
pub fn symbols(file: &Path, config: &ForgeConfig, json: bool) -> ForgeResult<()> {
    let source = read_source(file)?;
    let result = Analyzer::new(config.clone()).analyze(&source);
    let outline = result
        .semantic
        .as_deref()
        .map(|state| intel::document_symbols(&state.symbols))
        .unwrap_or_default();
    if json {
        println!("{}", serde_json::to_string_pretty(&outline)?);
        return Ok(());
    }
    for symbol in &outline {
        println!(
            "{:>4}  {}",
            symbol.range.start.line + 1,
            symbol.detail.bright_blue()
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::Range;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn source_file(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_render_diagnostic() {
        colored::control::set_override(false);
        let diag = Diagnostic::error("UNDEFINED_VARIABLE", "'x' is not defined", Range::default())
            .with_hint("Declare it first");
        let text = render_diagnostic(Path::new("main.forge"), &diag);
        assert_eq!(
            text,
            "main.forge:1:1 error[UNDEFINED_VARIABLE] 'x' is not defined\n    hint: Declare it first"
        );
    }

    #[test]
    fn test_check_reports_status() {
        let good = source_file("let dog = 'Fuffy';");
        assert!(check(good.path(), &ForgeConfig::default(), true).unwrap());
        let bad = source_file("missing;");
        assert!(!check(bad.path(), &ForgeConfig::default(), false).unwrap());
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = check(Path::new("/no/such/file.forge"), &ForgeConfig::default(), false)
            .unwrap_err();
        assert!(matches!(err, ForgeError::Io(_)));
    }

    #[test]
    fn test_completions_from_file() {
        let file = source_file("let dog = 'Fuffy';\nl.d");
        let items = completions(file.path(), &ForgeConfig::default(), 1, 3).unwrap();
        assert!(items.iter().any(|i| i.label == "dog"));
    }

    #[test]
    fn test_summary_counts() {
        let diags = vec![
            Diagnostic::error("A", "a", Range::default()),
            Diagnostic::warning("B", "b", Range::default()),
            Diagnostic::warning("C", "c", Range::default()),
        ];
        assert_eq!(summary(&diags), (1, 2, 0));
    }
}
